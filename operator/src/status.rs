use std::time::Duration;

use sledge_core::{CloudSqlInstanceStatus, Phase};

use crate::sledge::ObservedInstance;

// Consts

pub const PENDING_RECHECK_DELAY: Duration = Duration::from_secs(20);

// InstanceState

/// Lifecycle label reported by sledge.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceState {
    BackupInProgress,
    Maintenance,
    PendingCreate,
    Runnable,
    Unrecognized(String),
}

impl InstanceState {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::BackupInProgress | Self::Maintenance | Self::PendingCreate
        )
    }
}

impl From<&str> for InstanceState {
    fn from(label: &str) -> Self {
        match label {
            "BACKUP_IN_PROGRESS" => Self::BackupInProgress,
            "MAINTENANCE" => Self::Maintenance,
            "PENDING_CREATE" => Self::PendingCreate,
            "RUNNABLE" => Self::Runnable,
            label => Self::Unrecognized(label.into()),
        }
    }
}

// Functions

/// Status carrying the observed facts of the instance.
pub fn project(
    observed: &ObservedInstance,
    phase: Phase,
    message: String,
) -> CloudSqlInstanceStatus {
    CloudSqlInstanceStatus {
        phase,
        message,
        observed_ip_address: observed.first_ip_address().map(String::from),
        observed_state: Some(observed.state.clone()),
        observed_version: Some(observed.database_version.clone()),
    }
}

/// Status for a pass that ended before anything could be observed.
///
/// Observed fields are left out so the last known observations survive the merge patch.
pub fn without_observations(phase: Phase, message: String) -> CloudSqlInstanceStatus {
    CloudSqlInstanceStatus {
        phase,
        message,
        observed_ip_address: None,
        observed_state: None,
        observed_version: None,
    }
}

/// Classifies the observed lifecycle label.
pub fn classify(observed: &ObservedInstance) -> CloudSqlInstanceStatus {
    let state = InstanceState::from(observed.state.as_str());
    let (phase, message) = match state {
        state if state.is_transient() => (
            Phase::Pending,
            format!(
                "Instance is in {} state; re-checking in {}s",
                observed.state,
                PENDING_RECHECK_DELAY.as_secs()
            ),
        ),
        InstanceState::Runnable => (Phase::Ready, "Instance is fully operational".into()),
        InstanceState::Unrecognized(label) if label.is_empty() => (
            Phase::Error,
            "Instance state could not be observed".into(),
        ),
        _ => (
            Phase::Error,
            format!("Unexpected instance state: {}", observed.state),
        ),
    };
    project(observed, phase, message)
}

// Tests
