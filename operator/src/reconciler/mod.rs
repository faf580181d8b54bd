use std::{future::Future, time::Duration};

use sledge_core::{CloudSqlInstance, CloudSqlInstanceStatus, Phase};

use crate::{sledge::ObservedInstance, status, InstanceEvent};

use self::finalizer::Finalizers;

// Mods

pub mod drift;
pub mod finalizer;
pub mod instance;

// Consts

pub const UPDATE_RETRY_DELAY: Duration = Duration::from_secs(30);

// Types

pub type Result<VALUE = State> = std::result::Result<VALUE, Error>;

// Error

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create instance: {0}")]
    Creation(#[source] crate::err::Error),
    #[error("failed to delete instance: {0}")]
    Deletion(#[source] crate::err::Error),
    #[error("failed to describe instance: {0}")]
    Describe(#[source] crate::err::Error),
    #[error("failed to update instance: {source}")]
    Update {
        observed: ObservedInstance,
        #[source]
        source: crate::err::Error,
    },
}

impl Error {
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::Update { .. } => Some(UPDATE_RETRY_DELAY),
            _ => None,
        }
    }

    /// What the pass must persist before the error is surfaced.
    pub fn state(&self) -> State {
        let msg = self.to_string();
        match self {
            Self::Creation(_) => State {
                event: Some(InstanceEvent::CreationFailed(msg.clone())),
                status: Some(status::without_observations(Phase::ErrorCreating, msg)),
                ..Default::default()
            },
            Self::Deletion(_) => State {
                event: Some(InstanceEvent::DeletionFailed(msg)),
                ..Default::default()
            },
            Self::Describe(_) => State {
                event: Some(InstanceEvent::DescribeFailed(msg.clone())),
                status: Some(status::without_observations(Phase::ErrorDescribe, msg)),
                ..Default::default()
            },
            Self::Update { observed, .. } => State {
                event: Some(InstanceEvent::UpdateFailed(msg.clone())),
                requeue_after: self.requeue_after(),
                status: Some(status::project(observed, Phase::ErrorUpdating, msg)),
                ..Default::default()
            },
        }
    }
}

// Data structs

/// Outcome of a pass.
///
/// A state never carries both a finalizer change and a status: each write is checked against the
/// version read at the start of the pass.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct State {
    pub event: Option<InstanceEvent>,
    pub finalizers: Option<Finalizers>,
    pub requeue_after: Option<Duration>,
    pub status: Option<CloudSqlInstanceStatus>,
}

// Traits

#[cfg_attr(test, mockall::automock)]
pub trait Reconciler: Send + Sync {
    fn reconcile(
        &self,
        ns: &str,
        name: &str,
        instance: &CloudSqlInstance,
    ) -> impl Future<Output = Result> + Send;
}

// Tests
