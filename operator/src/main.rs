use std::{sync::Arc, time::Duration};

use clap::Parser;
use ctrl::controller;
use kube::{
    runtime::events::{Event, EventType},
    Api, Client,
};
use reconciler::instance::InstanceReconciler;
use regex::Regex;
use sledge::SledgeInstanceManager;
use sledge_core::{
    kube::DefaultKubeClient,
    process::shutdown_signal,
    tracer::{init_tracer, LogFormat},
    CloudSqlInstance,
};
use tokio::{sync::broadcast::channel, task::JoinSet};
use tracing::{debug, info, warn};

// Main

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (stop_tx, stop_rx) = channel(1);
    let mut jobs = JoinSet::new();
    let args = Args::parse();
    init_tracer(args.log_filter, args.log_format)?;
    let not_found = args
        .sledge_not_found_pattern
        .as_deref()
        .map(Regex::new)
        .transpose()?;
    if not_found.is_none() {
        debug!("every failed describe is treated as not found");
    }
    let requeue_delay = Duration::from_secs(args.requeue_delay);
    let kube = Client::try_default().await?;
    let api: Api<CloudSqlInstance> = Api::all(kube.clone());
    let kube = Arc::new(DefaultKubeClient::new(args.pod_name, kube));
    let mgr = SledgeInstanceManager::new(args.sledge_bin, not_found);
    let reconciler = InstanceReconciler::new(mgr);
    let ctrl = controller(requeue_delay, api, kube, reconciler, stop_rx);
    jobs.spawn(ctrl);
    info!("operator started");
    shutdown_signal().await?;
    stop_tx.send(()).ok();
    info!("waiting for controller to stop");
    while let Some(res) = jobs.join_next().await {
        if let Err(err) = res {
            warn!("{err}");
        }
    }
    info!("operator stopped");
    Ok(())
}

// Mods

mod cmd;
mod ctrl;
mod err;
mod reconciler;
mod sledge;
mod status;

// Consts

const ACTION_CREATING: &str = "Creating";
const ACTION_DELETING: &str = "Deleting";
const ACTION_DESCRIBING: &str = "Describing";
const ACTION_UPDATING: &str = "Updating";

const REASON_CREATED: &str = "Created";
const REASON_DELETED: &str = "Deleted";
const REASON_FAILED: &str = "Failed";
const REASON_UPDATED: &str = "Updated";

// Args

#[derive(Clone, Debug, Eq, Parser, PartialEq)]
#[command(version)]
struct Args {
    #[arg(
        long,
        env,
        default_value = "sledge_core=info,sledge_operator=info,warn",
        long_help = "Log filter (https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html#directives)"
    )]
    log_filter: String,
    #[arg(long, env, value_enum, default_value_t, long_help = "Log format")]
    log_format: LogFormat,
    #[arg(long, env, long_help = "Name of the current pod")]
    pod_name: Option<String>,
    #[arg(
        long,
        env,
        default_value_t = 30,
        long_help = "Fixed number of seconds before retrying a failed reconciliation (no exponential backoff)"
    )]
    requeue_delay: u64,
    #[arg(long, env, default_value = "sledge", long_help = "Path to sledge binary")]
    sledge_bin: String,
    #[arg(
        long,
        env,
        long_help = "Regex matched against the output of a failed describe or delete to detect a missing instance (describe: any failure if unset; delete: never if unset)"
    )]
    sledge_not_found_pattern: Option<String>,
}

// Events

#[derive(Clone, Debug, Eq, PartialEq)]
enum InstanceEvent {
    Created,
    CreationFailed(String),
    Deleted,
    DeletionFailed(String),
    DescribeFailed(String),
    Updated,
    UpdateFailed(String),
}

// Event

impl From<InstanceEvent> for Event {
    fn from(evt: InstanceEvent) -> Self {
        match evt {
            InstanceEvent::Created => Self {
                action: ACTION_CREATING.into(),
                note: Some("Successfully created".into()),
                reason: REASON_CREATED.into(),
                type_: EventType::Normal,
                secondary: None,
            },
            InstanceEvent::CreationFailed(err) => Self {
                action: ACTION_CREATING.into(),
                note: Some(format!("Failed to create: {err}")),
                reason: REASON_FAILED.into(),
                type_: EventType::Warning,
                secondary: None,
            },
            InstanceEvent::Deleted => Self {
                action: ACTION_DELETING.into(),
                note: Some("Successfully deleted".into()),
                reason: REASON_DELETED.into(),
                type_: EventType::Normal,
                secondary: None,
            },
            InstanceEvent::DeletionFailed(err) => Self {
                action: ACTION_DELETING.into(),
                note: Some(format!("Failed to delete: {err}")),
                reason: REASON_FAILED.into(),
                type_: EventType::Warning,
                secondary: None,
            },
            InstanceEvent::DescribeFailed(err) => Self {
                action: ACTION_DESCRIBING.into(),
                note: Some(format!("Failed to describe: {err}")),
                reason: REASON_FAILED.into(),
                type_: EventType::Warning,
                secondary: None,
            },
            InstanceEvent::Updated => Self {
                action: ACTION_UPDATING.into(),
                note: Some("Successfully updated".into()),
                reason: REASON_UPDATED.into(),
                type_: EventType::Normal,
                secondary: None,
            },
            InstanceEvent::UpdateFailed(err) => Self {
                action: ACTION_UPDATING.into(),
                note: Some(format!("Failed to update: {err}")),
                reason: REASON_FAILED.into(),
                type_: EventType::Warning,
                secondary: None,
            },
        }
    }
}
