use k8s_openapi::api::core::v1::Pod;

use awjob_core::parse_quantity;
use awjob_core::types::REQUEST_GPUS_ANNO_KEY;

use crate::chief::annotation;

pub const NVIDIA_GPU_RESOURCE: &str = "nvidia.com/gpu";

/// Sum of `nvidia.com/gpu` limits over the pod's containers.
pub fn gpu_in_pod(pod: &Pod) -> i64 {
    let Some(spec) = pod.spec.as_ref() else { return 0 };
    spec.containers
        .iter()
        .filter_map(|c| c.resources.as_ref()?.limits.as_ref()?.get(NVIDIA_GPU_RESOURCE))
        .filter_map(|q| parse_quantity(&q.0).ok())
        .map(|q| q.value as i64)
        .sum()
}

/// GPUs held by a pod that has started and not yet finished.
pub fn gpu_in_active_pod(pod: &Pod) -> i64 {
    let Some(status) = pod.status.as_ref() else { return 0 };
    if status.start_time.is_none() {
        return 0;
    }
    match status.phase.as_deref() {
        Some("Succeeded") | Some("Failed") => 0,
        _ => gpu_in_pod(pod),
    }
}

/// The job-wide request recorded on any member pod, if positive.
pub fn requested_gpus_from_annotation(pods: &[Pod]) -> Option<i64> {
    pods.iter()
        .filter_map(|p| annotation(p, REQUEST_GPUS_ANNO_KEY)?.parse::<i64>().ok())
        .find(|n| *n > 0)
}
