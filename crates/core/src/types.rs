use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::toleration::TolerationArgs;
use crate::TrainingJobType;

/// Prefix of the envelope fault-tolerance annotations.
pub const ANNOTATION_PREFIX: &str = "workload.codeflare.dev.appwrapper/";
/// Pod/job annotation carrying the total GPU request of the owning job.
pub const REQUEST_GPUS_ANNO_KEY: &str = "requestGPUsOfJobOwner";
/// Bag keys published by pre-build for other sub-builders start with this.
pub const SHARE_DATA_PREFIX: &str = "share-data-";
/// Label the envelope (never its children) carries for queue admission.
pub const QUEUE_NAME_LABEL: &str = "kueue.x-k8s.io/queue-name";

/// Workload wrapped by the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InnerJobType {
    #[default]
    Pytorch,
    Volcano,
}

impl InnerJobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pytorch => "pytorch",
            Self::Volcano => "volcano",
        }
    }
}

impl fmt::Display for InnerJobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InnerJobType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pytorch" => Ok(Self::Pytorch),
            "volcano" => Ok(Self::Volcano),
            other => Err(format!(
                "unsupported inner job type {other}, supported types are 'pytorch' and 'volcano'"
            )),
        }
    }
}

/// Fields shared by every trainer's submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonSubmitArgs {
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub image_pull_policy: String,
    pub command: String,
    pub shell: String,
    pub working_dir: String,
    pub gpu_count: i32,
    pub worker_count: i32,
    pub envs: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub node_selectors: BTreeMap<String, String>,
    pub tolerations: Vec<TolerationArgs>,
    /// pvc name -> mount path
    pub data_set: BTreeMap<String, String>,
    pub data_dirs: Vec<DataDirVolume>,
    pub image_pull_secrets: Vec<String>,
    /// chip resource name -> count, e.g. `nvidia.com/gpu=2`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub devices: BTreeMap<String, String>,
    /// local file -> container path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config_files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub priority_class_name: String,
    pub enable_rdma: bool,
    pub coscheduling: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_group_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_group_min_available: String,
    pub scheduler_name: String,
    pub training_type: TrainingJobType,
}

impl Default for CommonSubmitArgs {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: "default".into(),
            image: String::new(),
            image_pull_policy: "IfNotPresent".into(),
            command: String::new(),
            shell: "sh".into(),
            working_dir: "/root".into(),
            gpu_count: 0,
            worker_count: 1,
            envs: BTreeMap::new(),
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
            node_selectors: BTreeMap::new(),
            tolerations: Vec::new(),
            data_set: BTreeMap::new(),
            data_dirs: Vec::new(),
            image_pull_secrets: Vec::new(),
            devices: BTreeMap::new(),
            config_files: BTreeMap::new(),
            priority_class_name: String::new(),
            enable_rdma: false,
            coscheduling: false,
            pod_group_name: String::new(),
            pod_group_min_available: String::new(),
            scheduler_name: "volcano".into(),
            training_type: TrainingJobType::AppWrapperJob,
        }
    }
}

/// Host directory mounted into the job containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataDirVolume {
    pub name: String,
    pub host_path: String,
    pub container_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSyncCodeArgs {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sync_mode: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sync_source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sync_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sync_git_project_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTensorboardArgs {
    pub use_tensorboard: bool,
    pub tensorboard_image: String,
    pub training_logdir: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_log_path: String,
    pub is_local_logging: bool,
}

impl Default for SubmitTensorboardArgs {
    fn default() -> Self {
        Self {
            use_tensorboard: false,
            tensorboard_image: "registry.cn-zhangjiakou.aliyuncs.com/tensorflow-samples/tensorflow:1.12.0-devel".into(),
            training_logdir: "/training_logs".into(),
            host_log_path: String::new(),
            is_local_logging: false,
        }
    }
}

/// The full submission record for an envelope-wrapped training job.
///
/// Created with the defaults below, mutated by the builder stages in a fixed
/// order and consumed once by the manifest generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAppWrapperJobArgs {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cpu: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory: String,

    #[serde(flatten)]
    pub common: CommonSubmitArgs,
    #[serde(flatten)]
    pub tensorboard: SubmitTensorboardArgs,
    #[serde(flatten)]
    pub sync: SubmitSyncCodeArgs,

    /// None, Running or All
    pub clean_pod_policy: String,
    pub active_deadline_seconds: i64,
    pub ttl_seconds_after_finished: i32,
    pub share_memory: String,
    /// auto, cpu, gpu or an integer
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nproc_per_node: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kueue_queue_name: String,
    pub retry_limit: i32,
    pub admission_grace_period: String,
    pub warmup_grace_period: String,
    pub failure_grace_period: String,
    pub retry_pause_period: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub success_ttl: String,
    /// Kept as a string so an unsupported value reaches validation intact.
    pub inner_job_type: String,

    // volcano task
    pub min_available: i32,
    pub task_name: String,
    pub max_retry: i32,
    pub replicas: i32,
    pub master_port: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_svc_plugin: Option<bool>,

    // network topology
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub network_topology_mode: String,
    pub highest_tier_allowed: i32,

    // partition policy
    pub total_partitions: i32,
    pub partition_size: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub partition_network_topology_mode: String,
    pub partition_highest_tier_allowed: i32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ring_controller: String,
}

impl Default for SubmitAppWrapperJobArgs {
    fn default() -> Self {
        Self {
            cpu: String::new(),
            memory: String::new(),
            common: CommonSubmitArgs::default(),
            tensorboard: SubmitTensorboardArgs::default(),
            sync: SubmitSyncCodeArgs::default(),
            clean_pod_policy: "Running".into(),
            active_deadline_seconds: 0,
            ttl_seconds_after_finished: 0,
            share_memory: "2Gi".into(),
            nproc_per_node: String::new(),
            kueue_queue_name: String::new(),
            retry_limit: 3,
            admission_grace_period: "1m".into(),
            warmup_grace_period: "5m".into(),
            failure_grace_period: "1m".into(),
            retry_pause_period: "90s".into(),
            success_ttl: String::new(),
            inner_job_type: InnerJobType::Pytorch.as_str().into(),
            min_available: 0,
            task_name: "worker".into(),
            max_retry: 10000,
            replicas: 1,
            master_port: 23456,
            use_svc_plugin: None,
            network_topology_mode: String::new(),
            highest_tier_allowed: 0,
            total_partitions: 0,
            partition_size: 0,
            partition_network_topology_mode: String::new(),
            partition_highest_tier_allowed: 0,
            ring_controller: String::new(),
        }
    }
}

impl SubmitAppWrapperJobArgs {
    pub fn is_volcano(&self) -> bool {
        self.inner_job_type == InnerJobType::Volcano.as_str()
    }

    /// Parsed inner type; `None` when the string is not a supported type.
    pub fn inner_type(&self) -> Option<InnerJobType> {
        self.inner_job_type.parse().ok()
    }
}
