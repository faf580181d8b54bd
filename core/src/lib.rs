use std::fmt::{self, Display, Formatter};

use ::kube::CustomResource;
use enum_display::EnumDisplay;
use schemars::{
    gen::SchemaGenerator,
    schema::{InstanceType, Schema, SchemaObject},
    JsonSchema,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

// Mods

pub mod kube;
pub mod process;
pub mod tracer;

// Specs

#[derive(Clone, CustomResource, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "cloudsql.sledge.dev",
    version = "v1alpha1",
    kind = "CloudSqlInstance",
    doc = "A Cloud SQL instance managed through sledge",
    plural = "cloudsqlinstances",
    namespaced,
    shortname = "sqlinst",
    status = "CloudSqlInstanceStatus",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.observedState"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.observedVersion"}"#,
    printcolumn = r#"{"name":"IP","type":"string","jsonPath":".status.observedIPAddress"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlInstanceSpec {
    /// Database engine version (e.g. `POSTGRES_14`).
    pub database_version: String,
    /// Name of the instance.
    #[schemars(schema_with = "property_immutable")]
    pub instance_name: String,
    /// GCP project that owns the instance.
    #[serde(rename = "projectID")]
    #[schemars(schema_with = "property_immutable")]
    pub project_id: String,
    #[schemars(schema_with = "property_immutable")]
    pub region: String,
    /// Machine tier (e.g. `db-f1-micro`).
    pub tier: String,
}

// Statuses

#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlInstanceStatus {
    pub phase: Phase,
    /// Human-readable explanation of the phase.
    pub message: String,
    #[serde(
        default,
        rename = "observedIPAddress",
        skip_serializing_if = "Option::is_none"
    )]
    pub observed_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_version: Option<String>,
}

impl Display for CloudSqlInstanceStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phase)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, EnumDisplay, Eq, JsonSchema, PartialEq, Serialize)]
pub enum Phase {
    Pending,
    Ready,
    Error,
    ErrorCreating,
    ErrorDescribe,
    ErrorUpdating,
}

// Properties

fn property_immutable(_: &mut SchemaGenerator) -> Schema {
    let mut schema = SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        ..Default::default()
    };
    schema.extensions.insert(
        "x-kubernetes-validations".into(),
        json!([
            {
                "message": "field is immutable",
                "rule": "self == oldSelf",
            },
        ]),
    );
    Schema::Object(schema)
}

// Tests
