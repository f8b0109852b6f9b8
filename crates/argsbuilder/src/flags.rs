//! Command-line surface for `submit`. Each group mirrors one fragment; the
//! defaults here are the same as `SubmitAppWrapperJobArgs::default()`.

use clap::{ArgAction, Args};

use awjob_core::parse_duration;

use crate::SubmitAppWrapperJobArgsBuilder;

#[derive(Args, Debug, Clone)]
pub struct CommonFlags {
    /// Job name, must be a DNS-1035 label
    #[arg(long)]
    pub name: Option<String>,
    /// Container image
    #[arg(long)]
    pub image: Option<String>,
    #[arg(long = "image-pull-policy", default_value = "IfNotPresent")]
    pub image_pull_policy: String,
    /// GPUs per worker
    #[arg(long = "gpus", default_value_t = 0, allow_negative_numbers = true)]
    pub gpus: i32,
    #[arg(long = "workers", default_value_t = 1)]
    pub workers: i32,
    /// Container env, KEY=VALUE (repeatable)
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,
    /// Node selector, KEY=VALUE (repeatable)
    #[arg(long = "selector")]
    pub selector: Vec<String>,
    /// Taint toleration, `all`, `key`, `key:effect[:operator[:seconds]]` or `key=value:effect[:operator[:seconds]]`
    #[arg(long = "toleration")]
    pub toleration: Vec<String>,
    #[arg(long = "annotation")]
    pub annotation: Vec<String>,
    #[arg(short = 'l', long = "label")]
    pub label: Vec<String>,
    /// PVC mount, <pvc>:<path>
    #[arg(long = "data")]
    pub data: Vec<String>,
    /// Host dir mount, <host path>:<container path>
    #[arg(long = "data-dir")]
    pub data_dir: Vec<String>,
    #[arg(long = "image-pull-secret")]
    pub image_pull_secret: Vec<String>,
    /// Chip resource and count, <resource>=<count>
    #[arg(long = "device")]
    pub device: Vec<String>,
    /// Local file mapped into the containers, <local path>:<container path>
    #[arg(long = "config-file")]
    pub config_file: Vec<String>,
    /// Priority class name
    #[arg(long = "priority")]
    pub priority: Option<String>,
    #[arg(long = "rdma", action = ArgAction::SetTrue)]
    pub rdma: bool,
    /// Gang scheduling
    #[arg(long = "gang", action = ArgAction::SetTrue)]
    pub gang: bool,
    #[arg(long = "working-dir", default_value = "/root")]
    pub working_dir: String,
    #[arg(long = "shell", default_value = "sh")]
    pub shell: String,
}

impl CommonFlags {
    pub fn apply(self, b: &mut SubmitAppWrapperJobArgsBuilder) {
        {
            let a = &mut b.args_mut().common;
            if let Some(name) = self.name { a.name = name; }
            if let Some(image) = self.image { a.image = image; }
            if let Some(p) = self.priority { a.priority_class_name = p; }
            a.image_pull_policy = self.image_pull_policy;
            a.gpu_count = self.gpus;
            a.worker_count = self.workers;
            a.enable_rdma = self.rdma;
            a.coscheduling = self.gang;
            a.working_dir = self.working_dir;
            a.shell = self.shell;
        }
        b.add_arg_value("env", self.env)
            .add_arg_value("selector", self.selector)
            .add_arg_value("toleration", self.toleration)
            .add_arg_value("annotation", self.annotation)
            .add_arg_value("label", self.label)
            .add_arg_value("data", self.data)
            .add_arg_value("data-dir", self.data_dir)
            .add_arg_value("image-pull-secret", self.image_pull_secret)
            .add_arg_value("device", self.device)
            .add_arg_value("config-file", self.config_file);
    }
}

#[derive(Args, Debug, Clone)]
pub struct SyncCodeFlags {
    /// rsync or git
    #[arg(long = "sync-mode")]
    pub sync_mode: Option<String>,
    #[arg(long = "sync-source")]
    pub sync_source: Option<String>,
    #[arg(long = "sync-image")]
    pub sync_image: Option<String>,
}

impl SyncCodeFlags {
    pub fn apply(self, b: &mut SubmitAppWrapperJobArgsBuilder) {
        let s = &mut b.args_mut().sync;
        if let Some(m) = self.sync_mode { s.sync_mode = m; }
        if let Some(src) = self.sync_source { s.sync_source = src; }
        if let Some(img) = self.sync_image { s.sync_image = img; }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TensorboardFlags {
    #[arg(long = "tensorboard", action = ArgAction::SetTrue)]
    pub tensorboard: bool,
    #[arg(long = "tensorboard-image")]
    pub tensorboard_image: Option<String>,
    #[arg(long = "logdir", default_value = "/training_logs")]
    pub logdir: String,
}

impl TensorboardFlags {
    pub fn apply(self, b: &mut SubmitAppWrapperJobArgsBuilder) {
        let t = &mut b.args_mut().tensorboard;
        t.use_tensorboard = self.tensorboard;
        if let Some(img) = self.tensorboard_image { t.tensorboard_image = img; }
        t.training_logdir = self.logdir;
    }
}

#[derive(Args, Debug, Clone)]
pub struct AppWrapperFlags {
    /// How to clean tasks after training is done: None, Running or All
    #[arg(long = "clean-task-policy", default_value = "Running")]
    pub clean_task_policy: String,
    /// CPU per replica, e.g. 1 or 500m
    #[arg(long = "cpu")]
    pub cpu: Option<String>,
    /// Memory per replica, e.g. 1Gi
    #[arg(long = "memory")]
    pub memory: Option<String>,
    /// Active deadline since start time, e.g. 5s, 1m, 2h22m
    #[arg(long = "running-timeout", value_parser = parse_duration, default_value = "0s", allow_hyphen_values = true)]
    pub running_timeout: chrono::Duration,
    /// TTL for cleaning up finished jobs
    #[arg(long = "ttl-after-finished", value_parser = parse_duration, default_value = "0s", allow_hyphen_values = true)]
    pub ttl_after_finished: chrono::Duration,
    #[arg(long = "share-memory", default_value = "2Gi")]
    pub share_memory: String,
    /// auto, cpu, gpu or a number
    #[arg(long = "nproc-per-node")]
    pub nproc_per_node: Option<String>,

    /// Kueue LocalQueue for quota management
    #[arg(long = "kueue-queue")]
    pub kueue_queue: Option<String>,
    /// Resets before the envelope is marked Failed
    #[arg(long = "retry-limit", default_value_t = 3, allow_negative_numbers = true)]
    pub retry_limit: i32,
    #[arg(long = "admission-grace-period", default_value = "1m")]
    pub admission_grace_period: String,
    #[arg(long = "warmup-grace-period", default_value = "5m")]
    pub warmup_grace_period: String,
    #[arg(long = "failure-grace-period", default_value = "1m")]
    pub failure_grace_period: String,
    #[arg(long = "retry-pause-period", default_value = "90s")]
    pub retry_pause_period: String,
    /// Delete a succeeded envelope after this long; unset keeps it
    #[arg(long = "success-ttl")]
    pub success_ttl: Option<String>,
    /// pytorch or volcano
    #[arg(long = "inner-type", default_value = "pytorch")]
    pub inner_type: String,

    #[arg(long = "min-available", default_value_t = 0)]
    pub min_available: i32,
    #[arg(long = "scheduler-name", default_value = "volcano")]
    pub scheduler_name: String,
    #[arg(long = "task-name", default_value = "worker")]
    pub task_name: String,
    #[arg(long = "max-retry", default_value_t = 10000)]
    pub max_retry: i32,
    #[arg(long = "replicas", default_value_t = 1)]
    pub replicas: i32,
    #[arg(long = "master-port", default_value_t = 23456, allow_negative_numbers = true)]
    pub master_port: i32,
    /// Requires the volcano svc plugin; disable for manual headless services
    #[arg(long = "use-svc-plugin")]
    pub use_svc_plugin: Option<bool>,

    /// hard or soft
    #[arg(long = "network-topology-mode")]
    pub network_topology_mode: Option<String>,
    #[arg(long = "highest-tier-allowed", default_value_t = 0)]
    pub highest_tier_allowed: i32,
    #[arg(long = "total-partitions", default_value_t = 0)]
    pub total_partitions: i32,
    #[arg(long = "partition-size", default_value_t = 0)]
    pub partition_size: i32,
    #[arg(long = "partition-topology-mode")]
    pub partition_topology_mode: Option<String>,
    #[arg(long = "partition-highest-tier", default_value_t = 0)]
    pub partition_highest_tier: i32,
    /// Ring controller label for hardware affinity, e.g. ascend-1980
    #[arg(long = "ring-controller")]
    pub ring_controller: Option<String>,
}

impl AppWrapperFlags {
    pub fn apply(self, b: &mut SubmitAppWrapperJobArgsBuilder) {
        {
            let a = b.args_mut();
            a.clean_pod_policy = self.clean_task_policy;
            a.cpu = self.cpu.unwrap_or_default();
            a.memory = self.memory.unwrap_or_default();
            a.share_memory = self.share_memory;
            a.nproc_per_node = self.nproc_per_node.unwrap_or_default();
            a.kueue_queue_name = self.kueue_queue.unwrap_or_default();
            a.retry_limit = self.retry_limit;
            a.admission_grace_period = self.admission_grace_period;
            a.warmup_grace_period = self.warmup_grace_period;
            a.failure_grace_period = self.failure_grace_period;
            a.retry_pause_period = self.retry_pause_period;
            a.success_ttl = self.success_ttl.unwrap_or_default();
            a.inner_job_type = self.inner_type;
            a.min_available = self.min_available;
            a.common.scheduler_name = self.scheduler_name;
            a.task_name = self.task_name;
            a.max_retry = self.max_retry;
            a.replicas = self.replicas;
            a.master_port = self.master_port;
            a.use_svc_plugin = self.use_svc_plugin;
            a.network_topology_mode = self.network_topology_mode.unwrap_or_default();
            a.highest_tier_allowed = self.highest_tier_allowed;
            a.total_partitions = self.total_partitions;
            a.partition_size = self.partition_size;
            a.partition_network_topology_mode = self.partition_topology_mode.unwrap_or_default();
            a.partition_highest_tier_allowed = self.partition_highest_tier;
            a.ring_controller = self.ring_controller.unwrap_or_default();
        }
        b.add_arg_value("running-timeout", self.running_timeout)
            .add_arg_value("ttl-after-finished", self.ttl_after_finished);
    }
}

/// Every option `submit` accepts.
#[derive(Args, Debug, Clone)]
pub struct SubmitFlags {
    #[command(flatten)]
    pub common: CommonFlags,
    #[command(flatten)]
    pub sync: SyncCodeFlags,
    #[command(flatten)]
    pub tensorboard: TensorboardFlags,
    #[command(flatten)]
    pub appwrapper: AppWrapperFlags,
}

impl SubmitFlags {
    /// Load the parsed flags into a fresh builder. `command` is joined with spaces.
    pub fn into_builder(self, namespace: &str, command: &[String]) -> SubmitAppWrapperJobArgsBuilder {
        let mut b = SubmitAppWrapperJobArgsBuilder::new(Default::default());
        b.args_mut().common.namespace = namespace.to_string();
        b.args_mut().common.command = command.join(" ");
        self.common.apply(&mut b);
        self.sync.apply(&mut b);
        self.tensorboard.apply(&mut b);
        self.appwrapper.apply(&mut b);
        b
    }
}
