//! Programmatic construction of a submission.
//!
//! ```
//! use awjob_args::AppWrapperJobBuilder;
//!
//! let job = AppWrapperJobBuilder::new()
//!     .name("mnist")
//!     .image("pytorch/pytorch:2.3.0")
//!     .command(["python", "train.py"])
//!     .gpu_count(2)
//!     .kueue_queue_name("team-a")
//!     .build()
//!     .unwrap();
//! assert_eq!(job.queue_label(), Some(("kueue.x-k8s.io/queue-name", "team-a")));
//! ```

use std::fmt::Display;

use serde::Serialize;

use awjob_core::types::QUEUE_NAME_LABEL;
use awjob_core::{Result, SubmitAppWrapperJobArgs, TrainingJobType};

use crate::{ArgValues, SubmitAppWrapperJobArgsBuilder};

/// A validated submission, ready for the manifest generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    name: String,
    trainer: TrainingJobType,
    args: SubmitAppWrapperJobArgs,
}

impl Job {
    pub fn new(name: impl Into<String>, trainer: TrainingJobType, args: SubmitAppWrapperJobArgs) -> Self {
        Self { name: name.into(), trainer, args }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn trainer(&self) -> TrainingJobType { self.trainer }
    pub fn args(&self) -> &SubmitAppWrapperJobArgs { &self.args }
    pub fn into_args(self) -> SubmitAppWrapperJobArgs { self.args }

    /// Queue admission label for the envelope object only.
    pub fn queue_label(&self) -> Option<(&'static str, &str)> {
        let q = self.args.kueue_queue_name.as_str();
        if q.is_empty() { None } else { Some((QUEUE_NAME_LABEL, q)) }
    }
}

fn joined<I, K, V>(pairs: I, sep: char) -> Vec<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Display,
    V: Display,
{
    pairs.into_iter().map(|(k, v)| format!("{k}{sep}{v}")).collect()
}

/// Fluent builder. Empty strings and non-positive counts leave the default.
#[derive(Debug, Clone, Default)]
pub struct AppWrapperJobBuilder {
    args: SubmitAppWrapperJobArgs,
    values: ArgValues,
}

macro_rules! string_setter {
    ($(#[$m:meta])* $fn:ident => $($field:ident).+) => {
        $(#[$m])*
        pub fn $fn(mut self, v: impl Into<String>) -> Self {
            let v = v.into();
            if !v.is_empty() {
                self.args.$($field).+ = v;
            }
            self
        }
    };
}

macro_rules! positive_setter {
    ($(#[$m:meta])* $fn:ident => $($field:ident).+) => {
        $(#[$m])*
        pub fn $fn(mut self, v: i32) -> Self {
            if v > 0 {
                self.args.$($field).+ = v;
            }
            self
        }
    };
}

impl AppWrapperJobBuilder {
    pub fn new() -> Self { Self::default() }

    string_setter!(name => common.name);
    string_setter!(namespace => common.namespace);
    string_setter!(image => common.image);
    string_setter!(shell => common.shell);
    string_setter!(working_dir => common.working_dir);
    string_setter!(priority => common.priority_class_name);
    string_setter!(scheduler_name => common.scheduler_name);
    string_setter!(sync_mode => sync.sync_mode);
    string_setter!(sync_source => sync.sync_source);
    string_setter!(sync_image => sync.sync_image);
    string_setter!(tensorboard_image => tensorboard.tensorboard_image);
    string_setter!(log_dir => tensorboard.training_logdir);
    string_setter!(cpu => cpu);
    string_setter!(memory => memory);
    string_setter!(share_memory => share_memory);
    string_setter!(clean_pod_policy => clean_pod_policy);
    string_setter!(nproc_per_node => nproc_per_node);
    string_setter!(kueue_queue_name => kueue_queue_name);
    string_setter!(admission_grace_period => admission_grace_period);
    string_setter!(warmup_grace_period => warmup_grace_period);
    string_setter!(failure_grace_period => failure_grace_period);
    string_setter!(retry_pause_period => retry_pause_period);
    string_setter!(success_ttl => success_ttl);
    string_setter!(
        /// `pytorch` or `volcano`
        inner_job_type => inner_job_type
    );
    string_setter!(task_name => task_name);
    string_setter!(network_topology_mode => network_topology_mode);
    string_setter!(partition_network_topology_mode => partition_network_topology_mode);
    string_setter!(ring_controller => ring_controller);

    positive_setter!(gpu_count => common.gpu_count);
    positive_setter!(worker_count => common.worker_count);
    positive_setter!(min_available => min_available);
    positive_setter!(replicas => replicas);
    positive_setter!(master_port => master_port);
    positive_setter!(highest_tier_allowed => highest_tier_allowed);
    positive_setter!(total_partitions => total_partitions);
    positive_setter!(partition_size => partition_size);
    positive_setter!(partition_highest_tier_allowed => partition_highest_tier_allowed);

    /// Only the first call takes effect.
    pub fn command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.args.common.command.is_empty() {
            self.args.common.command = args.into_iter().map(|s| s.as_ref().to_string()).collect::<Vec<_>>().join(" ");
        }
        self
    }

    pub fn enable_rdma(mut self) -> Self {
        self.args.common.enable_rdma = true;
        self
    }

    pub fn enable_gang_scheduling(mut self) -> Self {
        self.args.common.coscheduling = true;
        self
    }

    pub fn enable_tensorboard(mut self) -> Self {
        self.args.tensorboard.use_tensorboard = true;
        self
    }

    pub fn use_svc_plugin(mut self, on: bool) -> Self {
        self.args.use_svc_plugin = Some(on);
        self
    }

    /// Zero is a valid limit.
    pub fn retry_limit(mut self, limit: i32) -> Self {
        if limit >= 0 {
            self.args.retry_limit = limit;
        }
        self
    }

    pub fn max_retry(mut self, n: i32) -> Self {
        if n >= 0 {
            self.args.max_retry = n;
        }
        self
    }

    pub fn active_deadline_seconds(mut self, secs: i64) -> Self {
        if secs > 0 {
            self.args.active_deadline_seconds = secs;
        }
        self
    }

    pub fn ttl_seconds_after_finished(mut self, secs: i32) -> Self {
        if secs > 0 {
            self.args.ttl_seconds_after_finished = secs;
        }
        self
    }

    fn pairs<I, K, V>(mut self, key: &str, pairs: I, sep: char) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Display,
        V: Display,
    {
        let v = joined(pairs, sep);
        if !v.is_empty() {
            self.values.insert(key, v);
        }
        self
    }

    pub fn envs<I: IntoIterator<Item = (K, V)>, K: Display, V: Display>(self, envs: I) -> Self {
        self.pairs("env", envs, '=')
    }

    pub fn node_selectors<I: IntoIterator<Item = (K, V)>, K: Display, V: Display>(self, selectors: I) -> Self {
        self.pairs("selector", selectors, '=')
    }

    pub fn annotations<I: IntoIterator<Item = (K, V)>, K: Display, V: Display>(self, annotations: I) -> Self {
        self.pairs("annotation", annotations, '=')
    }

    pub fn labels<I: IntoIterator<Item = (K, V)>, K: Display, V: Display>(self, labels: I) -> Self {
        self.pairs("label", labels, '=')
    }

    /// pvc name -> mount path
    pub fn datas<I: IntoIterator<Item = (K, V)>, K: Display, V: Display>(self, volumes: I) -> Self {
        self.pairs("data", volumes, ':')
    }

    /// host path -> container path
    pub fn data_dirs<I: IntoIterator<Item = (K, V)>, K: Display, V: Display>(self, volumes: I) -> Self {
        self.pairs("data-dir", volumes, ':')
    }

    /// chip resource name -> count
    pub fn devices<I: IntoIterator<Item = (K, V)>, K: Display, V: Display>(self, devices: I) -> Self {
        self.pairs("device", devices, '=')
    }

    /// local file -> container path
    pub fn config_files<I: IntoIterator<Item = (K, V)>, K: Display, V: Display>(self, files: I) -> Self {
        self.pairs("config-file", files, ':')
    }

    pub fn tolerations<I: IntoIterator<Item = S>, S: Into<String>>(mut self, tolerations: I) -> Self {
        self.values.insert("toleration", tolerations.into_iter().map(Into::into).collect::<Vec<String>>());
        self
    }

    pub fn image_pull_secrets<I: IntoIterator<Item = S>, S: Into<String>>(mut self, secrets: I) -> Self {
        self.values.insert("image-pull-secret", secrets.into_iter().map(Into::into).collect::<Vec<String>>());
        self
    }

    pub fn build(self) -> Result<Job> {
        let mut b = SubmitAppWrapperJobArgsBuilder::new(self.args);
        for (k, v) in self.values.into_iter() {
            b.add_arg_value(k, v);
        }
        b.pre_build()?;
        b.build()?;
        let args = b.into_args();
        Ok(Job::new(args.common.name.clone(), TrainingJobType::AppWrapperJob, args))
    }
}
