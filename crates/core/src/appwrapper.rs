//! Read-only view of the `workload.codeflare.dev/v1beta2` AppWrapper resource.
//!
//! Only the parts the status projector looks at are typed; `spec` is kept as
//! raw JSON.

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

pub const GROUP: &str = "workload.codeflare.dev";
pub const VERSION: &str = "v1beta2";
pub const KIND: &str = "AppWrapper";
pub const PLURAL: &str = "appwrappers";
pub const CRD_NAME: &str = "appwrappers.workload.codeflare.dev";

/// Label the controller puts on every pod it owns.
pub const APPWRAPPER_LABEL: &str = "workload.codeflare.dev/appwrapper";

pub const CONDITION_QUOTA_RESERVED: &str = "QuotaReserved";
pub const CONDITION_RESOURCES_DEPLOYED: &str = "ResourcesDeployed";
pub const CONDITION_PODS_READY: &str = "PodsReady";
pub const CONDITION_UNHEALTHY: &str = "Unhealthy";
pub const CONDITION_DELETING_RESOURCES: &str = "DeletingResources";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppWrapper {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: serde_json::Value,
    #[serde(default)]
    pub status: AppWrapperStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppWrapperStatus {
    #[serde(default)]
    pub phase: AppWrapperPhase,
    #[serde(default, rename = "resettingCount")]
    pub retries: i32,
    #[serde(default)]
    pub conditions: Vec<AppWrapperCondition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppWrapperPhase {
    #[default]
    #[serde(rename = "")]
    Empty,
    Suspended,
    Resuming,
    Running,
    Resetting,
    Suspending,
    Succeeded,
    Failed,
    Terminating,
    #[serde(other)]
    Unknown,
}

impl AppWrapperPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::Suspended => "Suspended",
            Self::Resuming => "Resuming",
            Self::Running => "Running",
            Self::Resetting => "Resetting",
            Self::Suspending => "Suspending",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Terminating => "Terminating",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppWrapperCondition {
    #[serde(default, rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl AppWrapper {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    pub fn creation_timestamp(&self) -> Option<DateTime<Utc>> {
        self.metadata.creation_timestamp.as_ref().map(|t| t.0)
    }

    /// First condition of the given type, in list order.
    pub fn condition(&self, type_: &str) -> Option<&AppWrapperCondition> {
        self.status.conditions.iter().find(|c| c.type_ == type_)
    }

    pub fn condition_is_true(&self, type_: &str) -> bool {
        self.condition(type_).is_some_and(|c| c.status == ConditionStatus::True)
    }
}
