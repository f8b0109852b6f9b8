//! Cluster access for AppWrapper jobs: fetch the envelope and its pods and
//! hand them to the status projector.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::time::Instant;

use k8s_openapi::api::core::v1::Pod;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use awjob_core::appwrapper::{AppWrapper, APPWRAPPER_LABEL};
use awjob_core::TrainingJobType;
use awjob_status::AppWrapperJob;

mod kube_accessor;
mod mock;

pub use kube_accessor::KubeAccessor;
pub use mock::MockAccessor;

/// Searched for the log viewer after the job's own and the arena namespace.
pub const DASHBOARD_FALLBACK_NAMESPACE: &str = "kube-system";
pub const DASHBOARD_SERVICE: &str = "kubernetes-dashboard";

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("training job {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error("decoding appwrapper: {0}")]
    Decode(#[from] serde_json::Error),
}

impl LookupError {
    pub fn not_found(namespace: &str, name: &str) -> Self {
        Self::NotFound { namespace: namespace.to_string(), name: name.to_string() }
    }

    pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }
}

pub type LookupResult<T> = std::result::Result<T, LookupError>;

/// Read access to envelopes, pods and the cluster add-ons around them.
/// `namespace: None` means all namespaces.
#[async_trait::async_trait]
pub trait JobAccessor: Send + Sync {
    async fn get_appwrapper(&self, namespace: &str, name: &str) -> LookupResult<AppWrapper>;
    async fn list_appwrappers(&self, namespace: Option<&str>, label_selector: &str) -> LookupResult<Vec<AppWrapper>>;
    async fn list_pods(&self, namespace: Option<&str>, label_selector: &str) -> LookupResult<Vec<Pod>>;
    /// Whether the AppWrapper CRD is served.
    async fn crd_installed(&self) -> bool;
    /// Base URL of the dashboard service in `namespace`, if one is reachable.
    async fn dashboard_url(&self, namespace: &str) -> Option<String>;
}

fn trainer_selector() -> String {
    format!("app={}", TrainingJobType::AppWrapperJob)
}

fn legacy_pod_selector(name: &str) -> String {
    format!("release={name},app={}", TrainingJobType::AppWrapperJob)
}

/// Envelopes created for this trainer carry `app=appwrapperjob`.
fn is_owned_by_trainer(aw: &AppWrapper) -> bool {
    aw.metadata
        .labels
        .as_ref()
        .and_then(|l| l.get("app"))
        .is_some_and(|v| v == TrainingJobType::AppWrapperJob.as_str())
}

/// Trainer for AppWrapper jobs over any [`JobAccessor`].
pub struct AppWrapperTrainer<A> {
    accessor: A,
}

impl<A: JobAccessor> AppWrapperTrainer<A> {
    pub fn new(accessor: A) -> Self { Self { accessor } }

    pub fn accessor(&self) -> &A { &self.accessor }

    pub fn trainer_type(&self) -> TrainingJobType { TrainingJobType::AppWrapperJob }

    pub async fn is_enabled(&self) -> bool {
        let on = self.accessor.crd_installed().await;
        debug!(enabled = on, "appwrapper trainer");
        on
    }

    pub async fn get_training_job(&self, name: &str, namespace: &str) -> LookupResult<AppWrapperJob> {
        let t0 = Instant::now();
        let res = self.lookup(name, namespace).await;
        histogram!("appwrapper_lookup_ms", t0.elapsed().as_secs_f64() * 1000.0);
        if let Err(LookupError::NotFound { .. }) = &res {
            counter!("appwrapper_not_found", 1u64);
        }
        res
    }

    async fn lookup(&self, name: &str, namespace: &str) -> LookupResult<AppWrapperJob> {
        let aw = self.accessor.get_appwrapper(namespace, name).await?;
        if !is_owned_by_trainer(&aw) {
            debug!(%namespace, %name, "appwrapper not created by this trainer");
            return Err(LookupError::not_found(namespace, name));
        }
        let mut pods = self.accessor.list_pods(Some(namespace), &format!("{APPWRAPPER_LABEL}={name}")).await?;
        if pods.is_empty() {
            debug!(%namespace, %name, "no pods under controller label, trying release labels");
            pods = self.accessor.list_pods(Some(namespace), &legacy_pod_selector(name)).await?;
        }
        Ok(AppWrapperJob::new(aw, pods))
    }

    pub async fn list_training_jobs(&self, namespace: Option<&str>) -> LookupResult<Vec<AppWrapperJob>> {
        let t0 = Instant::now();
        let selector = trainer_selector();
        let wrappers = self.accessor.list_appwrappers(namespace, &selector).await?;

        let mut pods = self.accessor.list_pods(namespace, APPWRAPPER_LABEL).await?;
        let mut seen: BTreeSet<(String, String)> = pods.iter().map(pod_key).collect();
        for p in self.accessor.list_pods(namespace, &selector).await? {
            if seen.insert(pod_key(&p)) {
                pods.push(p);
            }
        }

        let jobs: Vec<AppWrapperJob> = wrappers.into_iter().map(|aw| AppWrapperJob::new(aw, pods.clone())).collect();
        info!(count = jobs.len(), ns = %namespace.unwrap_or("(all)"), took_ms = %t0.elapsed().as_millis(), "listed appwrapper jobs");
        Ok(jobs)
    }

    pub async fn is_supported(&self, name: &str, namespace: &str) -> bool {
        self.is_enabled().await && self.get_training_job(name, namespace).await.is_ok()
    }

    /// Log viewer link for the chief, searching the job namespace, then
    /// `arena_namespace`, then `kube-system` for the dashboard.
    pub async fn job_dashboard(&self, job: &AppWrapperJob, arena_namespace: &str) -> Option<String> {
        for ns in [job.namespace(), arena_namespace, DASHBOARD_FALLBACK_NAMESPACE] {
            if let Some(base) = self.accessor.dashboard_url(ns).await {
                return job.chief_log_url(&base);
            }
            debug!(%ns, "no dashboard");
        }
        warn!(job = %job.name(), "no log viewer installed");
        None
    }
}

fn pod_key(p: &Pod) -> (String, String) {
    (p.metadata.namespace.clone().unwrap_or_default(), p.metadata.name.clone().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use awjob_core::appwrapper::AppWrapperPhase;
    use awjob_core::JobStatus;
    use std::collections::BTreeMap;

    fn envelope(name: &str, ns: &str, phase: AppWrapperPhase) -> AppWrapper {
        let mut aw = AppWrapper::default();
        aw.metadata.name = Some(name.into());
        aw.metadata.namespace = Some(ns.into());
        aw.metadata.labels = Some(BTreeMap::from([("app".to_string(), "appwrapperjob".to_string())]));
        aw.status.phase = phase;
        aw
    }

    fn pod(name: &str, ns: &str, labels: &[(&str, &str)]) -> Pod {
        let mut p = Pod::default();
        p.metadata.name = Some(name.into());
        p.metadata.namespace = Some(ns.into());
        p.metadata.labels = Some(labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
        p
    }

    #[tokio::test]
    async fn get_translates_missing_to_not_found() {
        let trainer = AppWrapperTrainer::new(MockAccessor::new());
        let err = trainer.get_training_job("ghost", "ml").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "training job ml/ghost not found");
    }

    #[tokio::test]
    async fn foreign_envelopes_are_not_found() {
        let mut aw = envelope("demo", "ml", AppWrapperPhase::Running);
        aw.metadata.labels = None;
        let trainer = AppWrapperTrainer::new(MockAccessor::new().with_appwrapper(aw));
        assert!(trainer.get_training_job("demo", "ml").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn get_collects_pods_and_status() {
        let mock = MockAccessor::new()
            .with_appwrapper(envelope("demo", "ml", AppWrapperPhase::Running))
            .with_pod(pod("demo-worker-0", "ml", &[(APPWRAPPER_LABEL, "demo")]))
            .with_pod(pod("demo-worker-1", "ml", &[(APPWRAPPER_LABEL, "demo")]))
            .with_pod(pod("x-worker-0", "ml", &[(APPWRAPPER_LABEL, "x")]));
        let trainer = AppWrapperTrainer::new(mock);
        let job = trainer.get_training_job("demo", "ml").await.unwrap();
        assert_eq!(job.status(), JobStatus::Running);
        assert_eq!(job.all_pods().len(), 2);
        assert!(trainer.is_supported("demo", "ml").await);
    }

    #[tokio::test]
    async fn falls_back_to_release_labels() {
        let mock = MockAccessor::new()
            .with_appwrapper(envelope("demo", "ml", AppWrapperPhase::Running))
            .with_pod(pod("demo-master-0", "ml", &[("release", "demo"), ("app", "appwrapperjob")]));
        let trainer = AppWrapperTrainer::new(mock);
        let job = trainer.get_training_job("demo", "ml").await.unwrap();
        assert_eq!(job.all_pods().len(), 1);
        assert_eq!(job.chief_pod().and_then(|p| p.metadata.name.as_deref()), Some("demo-master-0"));
        assert_eq!(trainer.accessor().pod_queries(), vec![format!("{APPWRAPPER_LABEL}=demo"), legacy_pod_selector("demo")]);
    }

    #[tokio::test]
    async fn list_assigns_pods_per_envelope() {
        let mock = MockAccessor::new()
            .with_appwrapper(envelope("a", "ml", AppWrapperPhase::Running))
            .with_appwrapper(envelope("b", "ml", AppWrapperPhase::Suspended))
            .with_pod(pod("a-worker-0", "ml", &[(APPWRAPPER_LABEL, "a"), ("app", "appwrapperjob")]))
            .with_pod(pod("b-master-0", "ml", &[("release", "b"), ("app", "appwrapperjob")]));
        let trainer = AppWrapperTrainer::new(mock);
        let jobs = trainer.list_training_jobs(Some("ml")).await.unwrap();
        assert_eq!(jobs.len(), 2);
        let a = jobs.iter().find(|j| j.name() == "a").unwrap();
        let b = jobs.iter().find(|j| j.name() == "b").unwrap();
        assert_eq!(a.all_pods().len(), 1);
        assert_eq!(b.all_pods().len(), 1);
        assert_eq!(b.status(), JobStatus::Queuing);
    }

    #[tokio::test]
    async fn dashboard_search_order() {
        let mut chief = pod("demo-worker-0", "ml", &[(APPWRAPPER_LABEL, "demo")]);
        chief.spec = Some(k8s_openapi::api::core::v1::PodSpec {
            containers: vec![k8s_openapi::api::core::v1::Container { name: "pytorch".into(), ..Default::default() }],
            ..Default::default()
        });
        let mock = MockAccessor::new()
            .with_appwrapper(envelope("demo", "ml", AppWrapperPhase::Running))
            .with_pod(chief)
            .with_dashboard("kube-system", "http://10.0.0.5:9090");
        let trainer = AppWrapperTrainer::new(mock);
        let job = trainer.get_training_job("demo", "ml").await.unwrap();
        assert_eq!(
            trainer.job_dashboard(&job, "arena-system").await.as_deref(),
            Some("http://10.0.0.5:9090/#!/log/ml/demo-worker-0/pytorch?namespace=ml")
        );

        let trainer = AppWrapperTrainer::new(MockAccessor::new());
        assert!(trainer.job_dashboard(&job, "arena-system").await.is_none());
        assert!(!trainer.is_enabled().await);
    }
}
