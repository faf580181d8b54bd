use std::{future::Future, sync::Arc, time::Duration};

use futures::StreamExt;
use kube::{
    api::ObjectMeta,
    runtime::{controller::Action, Controller},
    Api, Resource,
};
use sledge_core::{kube::KubeClient, CloudSqlInstance};
use tokio::sync::broadcast::Receiver;
use tracing::{debug, error, warn};

use crate::{
    err::Error,
    reconciler::{Reconciler, State},
};

// Context

struct Context<KUBE: KubeClient, RECONCILER: Reconciler> {
    kube: Arc<KUBE>,
    reconciler: RECONCILER,
    requeue_delay: Duration,
}

// Functions

pub fn controller<KUBE: KubeClient + 'static, RECONCILER: Reconciler + 'static>(
    requeue_delay: Duration,
    api: Api<CloudSqlInstance>,
    kube: Arc<KUBE>,
    reconciler: RECONCILER,
    mut stop_rx: Receiver<()>,
) -> impl Future<Output = ()> {
    let ctx = Arc::new(Context {
        kube,
        reconciler,
        requeue_delay,
    });
    Controller::new(api, Default::default())
        .graceful_shutdown_on(async move {
            stop_rx.recv().await.ok();
            debug!("controller stopped");
        })
        .run(reconcile, on_error, ctx)
        .for_each(|_| async {})
}

fn on_error<KUBE: KubeClient, RECONCILER: Reconciler>(
    _instance: Arc<CloudSqlInstance>,
    err: &kube::Error,
    ctx: Arc<Context<KUBE, RECONCILER>>,
) -> Action {
    let kube::Error::Service(err) = err else {
        error!("{err}");
        return Action::requeue(ctx.requeue_delay);
    };
    if let Some(err) = err.downcast_ref::<Error>() {
        match err {
            Error::Conflict => {
                debug!("{err}");
                Action::requeue(Duration::ZERO)
            }
            Error::UnnamedResource | Error::UnnamespacedResource => {
                warn!("{err}");
                Action::await_change()
            }
            _ => {
                error!("{err}");
                Action::requeue(ctx.requeue_delay)
            }
        }
    } else if let Some(err) = err.downcast_ref::<crate::reconciler::Error>() {
        Action::requeue(err.requeue_after().unwrap_or(ctx.requeue_delay))
    } else {
        error!("{err}");
        Action::requeue(ctx.requeue_delay)
    }
}

async fn persist<KUBE: KubeClient, RECONCILER: Reconciler>(
    ns: &str,
    name: &str,
    instance: &CloudSqlInstance,
    state: State,
    ctx: &Context<KUBE, RECONCILER>,
) -> Result<(), Error> {
    let version = instance.meta().resource_version.clone();
    if let Some(fins) = state.finalizers {
        let meta = ObjectMeta {
            finalizers: Some(fins.to_vec()),
            resource_version: version.clone(),
            ..Default::default()
        };
        ctx.kube
            .patch_metadata_from::<CloudSqlInstance>(ns, name, meta)
            .await?;
    }
    if let Some(status) = &state.status {
        ctx.kube
            .patch_status_from::<CloudSqlInstance, _>(ns, name, version, status)
            .await?;
    }
    if let Some(evt) = state.event {
        if let Err(err) = ctx.kube.publish_event(evt.into(), instance).await {
            warn!("failed to publish event: {err}");
        }
    }
    Ok(())
}

async fn reconcile<KUBE: KubeClient, RECONCILER: Reconciler>(
    instance: Arc<CloudSqlInstance>,
    ctx: Arc<Context<KUBE, RECONCILER>>,
) -> kube::Result<Action> {
    let meta = instance.meta();
    let name = meta.name.as_ref().ok_or(Error::UnnamedResource)?;
    let ns = meta.namespace.as_ref().ok_or(Error::UnnamespacedResource)?;
    let instance = ctx
        .kube
        .get_from::<CloudSqlInstance>(ns, name)
        .await
        .map_err(Error::from)?;
    let Some(instance) = instance else {
        debug!(resource.name = name, resource.namespace = ns, "resource is gone");
        return Ok(Action::await_change());
    };
    match ctx.reconciler.reconcile(ns, name, &instance).await {
        Ok(state) => {
            let action = state
                .requeue_after
                .map(Action::requeue)
                .unwrap_or_else(Action::await_change);
            persist(ns, name, &instance, state, &ctx).await?;
            Ok(action)
        }
        Err(err) => {
            error!(resource.name = name, resource.namespace = ns, "{err}");
            persist(ns, name, &instance, err.state(), &ctx).await?;
            Err(err.into())
        }
    }
}

// kube::Error

impl From<Error> for kube::Error {
    fn from(err: Error) -> Self {
        Self::Service(Box::new(err))
    }
}

impl From<crate::reconciler::Error> for kube::Error {
    fn from(err: crate::reconciler::Error) -> Self {
        Self::Service(Box::new(err))
    }
}

// Tests
