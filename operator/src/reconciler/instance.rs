use kube::Resource;
use sledge_core::{CloudSqlInstance, Phase};
use tracing::{debug, info, instrument, warn};

use crate::{
    sledge::{InstanceManager, Lookup, ObservedInstance},
    status::{self, InstanceState, PENDING_RECHECK_DELAY},
    InstanceEvent,
};

use super::{
    drift::needs_update,
    finalizer::{self, Finalizers},
    Error, Reconciler, Result, State,
};

// InstanceReconciler

pub struct InstanceReconciler<MANAGER: InstanceManager> {
    manager: MANAGER,
}

impl<MANAGER: InstanceManager> InstanceReconciler<MANAGER> {
    pub fn new(mgr: MANAGER) -> Self {
        Self { manager: mgr }
    }

    async fn create(&self, instance: &CloudSqlInstance) -> Result {
        info!("instance doesn't exist yet");
        self.manager
            .create(&instance.spec)
            .await
            .map_err(Error::Creation)?;
        Ok(State {
            event: Some(InstanceEvent::Created),
            status: Some(status::without_observations(
                Phase::Ready,
                "Instance created".into(),
            )),
            ..Default::default()
        })
    }

    async fn converge(&self, instance: &CloudSqlInstance, observed: ObservedInstance) -> Result {
        let state = InstanceState::from(observed.state.as_str());
        let status = status::classify(&observed);
        if state.is_transient() {
            debug!(instance.state = observed.state, "instance is busy");
            return Ok(State {
                requeue_after: Some(PENDING_RECHECK_DELAY),
                status: Some(status),
                ..Default::default()
            });
        }
        if state != InstanceState::Runnable {
            warn!(instance.state = observed.state, "unexpected instance state");
            return Ok(State {
                status: Some(status),
                ..Default::default()
            });
        }
        if !needs_update(&instance.spec, &observed) {
            debug!("instance is in sync");
            return Ok(State {
                status: Some(status),
                ..Default::default()
            });
        }
        if let Err(err) = self.manager.update(&instance.spec).await {
            return Err(Error::Update {
                observed,
                source: err,
            });
        }
        Ok(State {
            event: Some(InstanceEvent::Updated),
            status: Some(status::project(
                &observed,
                Phase::Ready,
                "Instance updated".into(),
            )),
            ..Default::default()
        })
    }
}

impl<MANAGER: InstanceManager> Reconciler for InstanceReconciler<MANAGER> {
    #[instrument(skip(self, ns, name, instance), fields(resource.api_version = %CloudSqlInstance::api_version(&()), resource.kind = %CloudSqlInstance::kind(&()), resource.name = name, resource.namespace = ns))]
    async fn reconcile(&self, ns: &str, name: &str, instance: &CloudSqlInstance) -> Result {
        let finalizers = Finalizers::from_meta(&instance.metadata);
        if instance.metadata.deletion_timestamp.is_some() {
            return finalizer::teardown(&self.manager, &instance.spec, finalizers).await;
        }
        if let Some(state) = finalizer::ensure(finalizers) {
            return Ok(state);
        }
        let lookup = self
            .manager
            .describe(&instance.spec.project_id, &instance.spec.instance_name)
            .await
            .map_err(Error::Describe)?;
        match lookup {
            Lookup::Found(observed) => self.converge(instance, observed).await,
            Lookup::NotFound => self.create(instance).await,
        }
    }
}

// Tests
