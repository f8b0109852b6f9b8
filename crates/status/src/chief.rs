//! Member-pod filtering and chief replica selection.

use k8s_openapi::api::core::v1::Pod;
use once_cell::sync::Lazy;
use regex::Regex;

use awjob_core::appwrapper::APPWRAPPER_LABEL;
use awjob_core::TrainingJobType;

// a non-digit before "-0" keeps job-worker-10 out
static ZERO_ORDINAL_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]-0$").expect("valid chief name regex"));

pub(crate) fn label<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata.labels.as_ref()?.get(key).map(String::as_str)
}

pub(crate) fn annotation<'a>(pod: &'a Pod, key: &str) -> Option<&'a str> {
    pod.metadata.annotations.as_ref()?.get(key).map(String::as_str)
}

fn is_master_replica(pod: &Pod) -> bool {
    label(pod, "pytorch-replica-type") == Some("master")
        || label(pod, "training.kubeflow.org/replica-type") == Some("master")
}

fn is_volcano_driver(pod: &Pod) -> bool {
    label(pod, "volcano-role") == Some("driver")
}

fn is_first_task(pod: &Pod) -> bool {
    annotation(pod, "volcano.sh/task-index") == Some("0")
}

fn has_zero_ordinal_name(pod: &Pod) -> bool {
    pod.metadata.name.as_deref().is_some_and(|n| ZERO_ORDINAL_NAME.is_match(n))
}

/// Rules in priority order. A higher rule matching any pod beats a lower rule
/// matching an earlier pod.
const CHIEF_RULES: &[fn(&Pod) -> bool] = &[is_master_replica, is_volcano_driver, is_first_task, has_zero_ordinal_name];

pub fn select_chief(pods: &[Pod]) -> Option<&Pod> {
    CHIEF_RULES.iter().find_map(|rule| pods.iter().find(|&p| rule(p)))
}

/// Whether a pod belongs to the named envelope: the controller label, or the
/// `release`/`app` pair older submissions carry.
pub fn is_appwrapper_pod(name: &str, namespace: &str, pod: &Pod) -> bool {
    if pod.metadata.namespace.as_deref() != Some(namespace) {
        return false;
    }
    if label(pod, APPWRAPPER_LABEL) == Some(name) {
        return true;
    }
    label(pod, "release") == Some(name) && label(pod, "app") == Some(TrainingJobType::AppWrapperJob.as_str())
}
