use std::collections::BTreeMap;
use std::sync::Mutex;

use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use awjob_core::appwrapper::AppWrapper;

use crate::{JobAccessor, LookupError, LookupResult};

/// In-memory accessor with canned envelopes, pods and dashboards.
/// Understands equality (`k=v`) and existence (`k`) selector terms.
#[derive(Debug, Default)]
pub struct MockAccessor {
    pub appwrappers: Vec<AppWrapper>,
    pub pods: Vec<Pod>,
    pub dashboards: BTreeMap<String, String>,
    pod_queries: Mutex<Vec<String>>,
}

impl MockAccessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_appwrapper(mut self, aw: AppWrapper) -> Self {
        self.appwrappers.push(aw);
        self
    }

    pub fn with_pod(mut self, pod: Pod) -> Self {
        self.pods.push(pod);
        self
    }

    pub fn with_dashboard(mut self, namespace: &str, url: &str) -> Self {
        self.dashboards.insert(namespace.to_string(), url.to_string());
        self
    }

    /// Selectors passed to `list_pods`, in call order.
    pub fn pod_queries(&self) -> Vec<String> {
        self.pod_queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

fn selects(meta: &ObjectMeta, namespace: Option<&str>, selector: &str) -> bool {
    if namespace.is_some_and(|ns| meta.namespace.as_deref() != Some(ns)) {
        return false;
    }
    let empty = BTreeMap::new();
    let labels = meta.labels.as_ref().unwrap_or(&empty);
    selector.split(',').filter(|t| !t.is_empty()).all(|term| match term.split_once('=') {
        Some((k, v)) => labels.get(k).is_some_and(|have| have == v),
        None => labels.contains_key(term),
    })
}

#[async_trait::async_trait]
impl JobAccessor for MockAccessor {
    async fn get_appwrapper(&self, namespace: &str, name: &str) -> LookupResult<AppWrapper> {
        self.appwrappers
            .iter()
            .find(|aw| aw.name() == name && aw.namespace() == namespace)
            .cloned()
            .ok_or_else(|| LookupError::not_found(namespace, name))
    }

    async fn list_appwrappers(&self, namespace: Option<&str>, label_selector: &str) -> LookupResult<Vec<AppWrapper>> {
        Ok(self.appwrappers.iter().filter(|aw| selects(&aw.metadata, namespace, label_selector)).cloned().collect())
    }

    async fn list_pods(&self, namespace: Option<&str>, label_selector: &str) -> LookupResult<Vec<Pod>> {
        if let Ok(mut q) = self.pod_queries.lock() {
            q.push(label_selector.to_string());
        }
        Ok(self.pods.iter().filter(|p| selects(&p.metadata, namespace, label_selector)).cloned().collect())
    }

    async fn crd_installed(&self) -> bool { !self.appwrappers.is_empty() }

    async fn dashboard_url(&self, namespace: &str) -> Option<String> { self.dashboards.get(namespace).cloned() }
}
