use sledge_core::CloudSqlInstanceSpec;
use tracing::debug;

use crate::sledge::ObservedInstance;

// Consts

/// Fields enforced by the operator. Anything else reported by sledge is ignored.
const ENFORCED_FIELDS: &[Field] = &[Field::DatabaseVersion, Field::Tier];

// Field

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Field {
    DatabaseVersion,
    Tier,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Self::DatabaseVersion => "databaseVersion",
            Self::Tier => "tier",
        }
    }

    fn desired(self, spec: &CloudSqlInstanceSpec) -> &str {
        match self {
            Self::DatabaseVersion => &spec.database_version,
            Self::Tier => &spec.tier,
        }
    }

    fn observed(self, observed: &ObservedInstance) -> &str {
        match self {
            Self::DatabaseVersion => &observed.database_version,
            Self::Tier => &observed.settings.tier,
        }
    }
}

// Functions

pub fn needs_update(spec: &CloudSqlInstanceSpec, observed: &ObservedInstance) -> bool {
    ENFORCED_FIELDS.iter().any(|field| {
        let desired = field.desired(spec);
        let actual = field.observed(observed);
        let drifted = desired != actual;
        if drifted {
            debug!(
                drift.field = field.name(),
                drift.desired = desired,
                drift.observed = actual,
                "drift detected"
            );
        }
        drifted
    })
}

// Tests
