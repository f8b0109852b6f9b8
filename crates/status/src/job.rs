use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;

use awjob_core::appwrapper::{AppWrapper, ConditionStatus, CONDITION_PODS_READY};
use awjob_core::{JobStatus, TrainingJobType};

use crate::chief::{is_appwrapper_pod, select_chief};
use crate::gpu::{gpu_in_active_pod, gpu_in_pod, requested_gpus_from_annotation};
use crate::projection::project_status;

/// An envelope together with the member pods observed alongside it.
#[derive(Debug, Clone)]
pub struct AppWrapperJob {
    appwrapper: AppWrapper,
    pods: Vec<Pod>,
    chief: Option<usize>,
}

impl AppWrapperJob {
    /// Keeps only the pods that belong to `appwrapper` and picks the chief.
    pub fn new(appwrapper: AppWrapper, candidates: Vec<Pod>) -> Self {
        let (name, ns) = (appwrapper.name().to_string(), appwrapper.namespace().to_string());
        let pods: Vec<Pod> = candidates.into_iter().filter(|p| is_appwrapper_pod(&name, &ns, p)).collect();
        let chief = select_chief(&pods).and_then(|c| pods.iter().position(|p| std::ptr::eq(p, c)));
        Self { appwrapper, pods, chief }
    }

    pub fn name(&self) -> &str { self.appwrapper.name() }
    pub fn namespace(&self) -> &str { self.appwrapper.namespace() }
    pub fn uid(&self) -> &str { self.appwrapper.metadata.uid.as_deref().unwrap_or_default() }
    pub fn trainer(&self) -> TrainingJobType { TrainingJobType::AppWrapperJob }
    pub fn appwrapper(&self) -> &AppWrapper { &self.appwrapper }
    pub fn all_pods(&self) -> &[Pod] { &self.pods }
    pub fn chief_pod(&self) -> Option<&Pod> { self.chief.map(|i| &self.pods[i]) }
    pub fn retries(&self) -> i32 { self.appwrapper.status.retries }

    pub fn labels(&self) -> BTreeMap<String, String> {
        self.appwrapper.metadata.labels.clone().unwrap_or_default()
    }

    pub fn status(&self) -> JobStatus { project_status(&self.appwrapper) }

    /// Message of the first condition of this type; empty if none.
    pub fn condition_message(&self, type_: &str) -> &str {
        self.appwrapper.condition(type_).map(|c| c.message.as_str()).unwrap_or_default()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> { self.appwrapper.creation_timestamp() }

    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        self.start_time().map(|t| now - t).unwrap_or_else(Duration::zero)
    }

    pub fn age(&self) -> Duration { self.age_at(Utc::now()) }

    /// Creation until pods became ready; for jobs that never reported ready,
    /// time since creation while running or after success, otherwise zero.
    pub fn duration_at(&self, now: DateTime<Utc>) -> Duration {
        let Some(created) = self.start_time() else { return Duration::zero() };
        let ready = self
            .appwrapper
            .status
            .conditions
            .iter()
            .filter(|c| c.type_ == CONDITION_PODS_READY && c.status == ConditionStatus::True)
            .find_map(|c| c.last_transition_time);
        if let Some(at) = ready {
            return at - created;
        }
        match self.status() {
            JobStatus::Running | JobStatus::Succeeded => now - created,
            _ => Duration::zero(),
        }
    }

    pub fn duration(&self) -> Duration { self.duration_at(Utc::now()) }

    pub fn requested_gpu(&self) -> i64 {
        requested_gpus_from_annotation(&self.pods).unwrap_or_else(|| self.pods.iter().map(gpu_in_pod).sum())
    }

    pub fn allocated_gpu(&self) -> i64 { self.pods.iter().map(gpu_in_active_pod).sum() }

    /// Chief host IP while running, `N/A` otherwise.
    pub fn host_ip_of_chief(&self) -> String {
        if self.status() != JobStatus::Running {
            return "N/A".into();
        }
        self.chief_pod()
            .and_then(|p| p.status.as_ref()?.host_ip.clone())
            .unwrap_or_else(|| "N/A".into())
    }

    pub fn priority_class(&self) -> String {
        self.chief_pod()
            .and_then(|p| p.spec.as_ref()?.priority_class_name.clone())
            .unwrap_or_default()
    }

    /// Dashboard log link for the chief's first container.
    pub fn chief_log_url(&self, dashboard: &str) -> Option<String> {
        let chief = self.chief_pod()?;
        let container = chief.spec.as_ref()?.containers.first()?;
        let ns = chief.metadata.namespace.as_deref()?;
        let pod = chief.metadata.name.as_deref()?;
        Some(format!("{}/#!/log/{ns}/{pod}/{}?namespace={ns}", dashboard.trim_end_matches('/'), container.name))
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> JobSummary {
        JobSummary {
            name: self.name().to_string(),
            namespace: self.namespace().to_string(),
            trainer: self.trainer(),
            status: self.status(),
            age_seconds: self.age_at(now).num_seconds(),
            duration_seconds: self.duration_at(now).num_seconds(),
            chief: self.chief_pod().and_then(|p| p.metadata.name.clone()),
            pods: self.pods.len(),
            requested_gpus: self.requested_gpu(),
            allocated_gpus: self.allocated_gpu(),
            host_ip: self.host_ip_of_chief(),
            priority_class: self.priority_class(),
            retries: self.retries(),
        }
    }
}

/// Flat, serializable view for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub name: String,
    pub namespace: String,
    pub trainer: TrainingJobType,
    pub status: JobStatus,
    pub age_seconds: i64,
    pub duration_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chief: Option<String>,
    pub pods: usize,
    pub requested_gpus: i64,
    pub allocated_gpus: i64,
    pub host_ip: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub priority_class: String,
    pub retries: i32,
}
