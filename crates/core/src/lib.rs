//! awjob core: spec types, the small string grammars (toleration, quantity,
//! duration) and the envelope schema view shared by the builder and the
//! status projector.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

pub mod appwrapper;
pub mod duration;
pub mod error;
pub mod quantity;
pub mod toleration;
pub mod types;

pub use duration::parse_duration;
pub use error::{Error, Result};
pub use quantity::parse_quantity;
pub use toleration::{parse_toleration, TaintEffect, TolerationArgs, TolerationError, TolerationOperator};
pub use types::{
    CommonSubmitArgs, DataDirVolume, InnerJobType, SubmitAppWrapperJobArgs, SubmitSyncCodeArgs, SubmitTensorboardArgs,
};

/// Trainer kind recorded on submitted jobs and used in the legacy `app=` pod label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TrainingJobType {
    #[default]
    #[serde(rename = "appwrapperjob")]
    AppWrapperJob,
}

impl TrainingJobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppWrapperJob => "appwrapperjob",
        }
    }
}

impl std::fmt::Display for TrainingJobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Externally visible lifecycle status of a training job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Queuing,
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queuing => "QUEUING",
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }

    /// Succeeded and Failed are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod prelude {
    pub use super::appwrapper::{AppWrapper, AppWrapperCondition, AppWrapperPhase, ConditionStatus};
    pub use super::{Error, JobStatus, SubmitAppWrapperJobArgs, TolerationArgs, TrainingJobType};
}
