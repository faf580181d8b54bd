use kube::api::ObjectMeta;
use sledge_core::CloudSqlInstanceSpec;
use tracing::{debug, info, instrument};

use crate::{
    sledge::{Deletion, InstanceManager},
    InstanceEvent,
};

use super::{Error, Result, State};

// Consts

pub const FINALIZER: &str = "cloudsql.sledge.dev/finalizer";

// Finalizer

/// Cleanup obligation recorded on a resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Finalizer {
    /// The external instance must be deleted before the resource goes away.
    Cleanup,
    /// Obligation owned by someone else, kept untouched.
    Foreign(String),
}

impl Finalizer {
    fn as_str(&self) -> &str {
        match self {
            Self::Cleanup => FINALIZER,
            Self::Foreign(token) => token,
        }
    }
}

impl From<String> for Finalizer {
    fn from(token: String) -> Self {
        if token == FINALIZER {
            Self::Cleanup
        } else {
            Self::Foreign(token)
        }
    }
}

// Finalizers

/// Ordered set of finalizers.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Finalizers(Vec<Finalizer>);

impl Finalizers {
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        meta.finalizers
            .iter()
            .flatten()
            .cloned()
            .map(Finalizer::from)
            .collect()
    }

    pub fn has_cleanup(&self) -> bool {
        self.0.contains(&Finalizer::Cleanup)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().map(|fin| fin.as_str().into()).collect()
    }

    pub fn with_cleanup(mut self) -> Self {
        if !self.has_cleanup() {
            self.0.push(Finalizer::Cleanup);
        }
        self
    }

    pub fn without_cleanup(mut self) -> Self {
        self.0.retain(|fin| *fin != Finalizer::Cleanup);
        self
    }
}

impl FromIterator<Finalizer> for Finalizers {
    fn from_iter<ITER: IntoIterator<Item = Finalizer>>(iter: ITER) -> Self {
        let mut fins: Vec<Finalizer> = vec![];
        for fin in iter {
            if !fins.contains(&fin) {
                fins.push(fin);
            }
        }
        Self(fins)
    }
}

// Functions

/// State that registers the cleanup obligation, if it is missing.
pub fn ensure(finalizers: Finalizers) -> Option<State> {
    if finalizers.has_cleanup() {
        None
    } else {
        info!("adding finalizer");
        Some(State {
            finalizers: Some(finalizers.with_cleanup()),
            ..Default::default()
        })
    }
}

/// Deletes the external instance then releases the cleanup obligation.
///
/// The obligation is kept if the deletion fails, so the next pass retries it.
#[instrument(skip(mgr, spec, finalizers), fields(instance.name = spec.instance_name, instance.project = spec.project_id))]
pub async fn teardown<MANAGER: InstanceManager>(
    mgr: &MANAGER,
    spec: &CloudSqlInstanceSpec,
    finalizers: Finalizers,
) -> Result {
    if !finalizers.has_cleanup() {
        debug!("cleanup already done");
        return Ok(State::default());
    }
    let deletion = mgr
        .delete(&spec.project_id, &spec.instance_name)
        .await
        .map_err(Error::Deletion)?;
    if deletion == Deletion::AlreadyGone {
        debug!("instance was deleted by a previous pass");
    }
    info!("removing finalizer");
    Ok(State {
        event: Some(InstanceEvent::Deleted),
        finalizers: Some(finalizers.without_cleanup()),
        ..Default::default()
    })
}

// Tests
