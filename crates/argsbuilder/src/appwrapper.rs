//! Composite builder for AppWrapper submissions.

use metrics::counter;
use tracing::{debug, info, warn};

use awjob_core::types::{ANNOTATION_PREFIX, SHARE_DATA_PREFIX};
use awjob_core::{Result, SubmitAppWrapperJobArgs, TrainingJobType};

use crate::{check, common, sync_code, tensorboard, ArgValue, ArgValues, SubBuilder};

/// Sub-builders in the order they run.
pub const SUB_BUILDERS: [SubBuilder; 3] = [
    SubBuilder {
        name: "common",
        pre_build: |a, v| common::pre_build(&mut a.common, v),
        build: |a, v| common::build(&mut a.common, v),
    },
    SubBuilder {
        name: "sync_code",
        pre_build: |a, v| sync_code::pre_build(&mut a.sync, v),
        build: |a, v| sync_code::build(&mut a.sync, v),
    },
    SubBuilder {
        name: "tensorboard",
        pre_build: |a, v| tensorboard::pre_build(&mut a.tensorboard, v),
        build: |a, v| tensorboard::build(&mut a.tensorboard, &a.common.name, v),
    },
];

#[derive(Debug)]
pub struct SubmitAppWrapperJobArgsBuilder {
    args: SubmitAppWrapperJobArgs,
    values: ArgValues,
}

impl SubmitAppWrapperJobArgsBuilder {
    pub fn new(mut args: SubmitAppWrapperJobArgs) -> Self {
        args.common.training_type = TrainingJobType::AppWrapperJob;
        Self { args, values: ArgValues::default() }
    }

    pub fn args(&self) -> &SubmitAppWrapperJobArgs { &self.args }
    pub fn args_mut(&mut self) -> &mut SubmitAppWrapperJobArgs { &mut self.args }
    pub fn values(&self) -> &ArgValues { &self.values }
    pub fn into_args(self) -> SubmitAppWrapperJobArgs { self.args }

    pub fn add_arg_value(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> &mut Self {
        self.values.insert(key, value);
        self
    }

    pub fn pre_build(&mut self) -> Result<()> {
        for sb in &SUB_BUILDERS {
            (sb.pre_build)(&mut self.args, &self.values)?;
        }
        let datasets = self.args.common.data_set.clone();
        self.add_arg_value(format!("{SHARE_DATA_PREFIX}dataset"), datasets);
        Ok(())
    }

    pub fn build(&mut self) -> Result<()> {
        match self.build_stages() {
            Ok(()) => {
                counter!("submit_build_ok", 1u64);
                info!(job = %self.args.common.name, inner_type = %self.args.inner_job_type, "submission built");
                Ok(())
            }
            Err(e) => {
                counter!("submit_build_failed", 1u64);
                warn!(job = %self.args.common.name, error = %e, "submission rejected");
                Err(e)
            }
        }
    }

    fn build_stages(&mut self) -> Result<()> {
        for sb in &SUB_BUILDERS {
            debug!(sub_builder = sb.name, "build");
            (sb.build)(&mut self.args, &self.values)?;
        }
        // sub-builders derived env/pod-group/gpu values from the old worker count
        sync_volcano_worker_count(&mut self.args);
        set_run_policy(&mut self.args, &self.values);
        check::check(&self.args)?;
        set_appwrapper_annotations(&mut self.args);
        add_env(&mut self.args);
        Ok(())
    }
}

fn sync_volcano_worker_count(args: &mut SubmitAppWrapperJobArgs) {
    if !args.is_volcano() {
        return;
    }
    let c = &mut args.common;
    c.worker_count = args.replicas;
    c.envs.insert("workers".into(), c.worker_count.to_string());
    if c.coscheduling {
        c.pod_group_min_available = c.worker_count.to_string();
    }
    common::add_request_gpus_to_annotation(c);
}

fn set_run_policy(args: &mut SubmitAppWrapperJobArgs, values: &ArgValues) {
    if let Some(d) = values.duration("running-timeout") {
        args.active_deadline_seconds = d.num_seconds();
    }
    if let Some(d) = values.duration("ttl-after-finished") {
        args.ttl_seconds_after_finished = i32::try_from(d.num_seconds()).unwrap_or(i32::MAX);
    }
}

/// Fault-tolerance settings travel as annotations. The queue name is kept off
/// the label map so it never propagates to child resources.
fn set_appwrapper_annotations(args: &mut SubmitAppWrapperJobArgs) {
    let anns = &mut args.common.annotations;
    let mut put = |suffix: &str, value: String| {
        anns.insert(format!("{ANNOTATION_PREFIX}{suffix}"), value);
    };
    if args.retry_limit > 0 {
        put("retryLimit", args.retry_limit.to_string());
    }
    for (suffix, value) in [
        ("admissionGracePeriodDuration", &args.admission_grace_period),
        ("warmupGracePeriodDuration", &args.warmup_grace_period),
        ("failureGracePeriodDuration", &args.failure_grace_period),
        ("retryPausePeriodDuration", &args.retry_pause_period),
        ("successTTLDuration", &args.success_ttl),
    ] {
        if !value.is_empty() {
            put(suffix, value.clone());
        }
    }
}

fn add_env(args: &mut SubmitAppWrapperJobArgs) {
    // volcano jobs get MASTER_ADDR from their service DNS name
    if args.common.enable_rdma && !args.is_volcano() {
        let addr = format!("{}-master-0", args.common.name);
        args.common.envs.insert("MASTER_ADDR".into(), addr);
    }
    if !args.nproc_per_node.is_empty() {
        args.common.envs.insert("PET_NPROC_PER_NODE".into(), args.nproc_per_node.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awjob_core::types::{QUEUE_NAME_LABEL, REQUEST_GPUS_ANNO_KEY};

    fn base() -> SubmitAppWrapperJobArgs {
        let mut a = SubmitAppWrapperJobArgs::default();
        a.common.name = "demo".into();
        a.common.image = "pytorch:2.3".into();
        a
    }

    fn run(args: SubmitAppWrapperJobArgs) -> Result<SubmitAppWrapperJobArgs> {
        let mut b = SubmitAppWrapperJobArgsBuilder::new(args);
        b.pre_build()?;
        b.build()?;
        Ok(b.into_args())
    }

    fn ann(a: &SubmitAppWrapperJobArgs, suffix: &str) -> Option<String> {
        a.common.annotations.get(&format!("{ANNOTATION_PREFIX}{suffix}")).cloned()
    }

    #[test]
    fn sub_builders_run_in_fixed_order() {
        let names: Vec<_> = SUB_BUILDERS.iter().map(|s| s.name).collect();
        assert_eq!(names, ["common", "sync_code", "tensorboard"]);
    }

    #[test]
    fn volcano_sync_grid() {
        for replicas in [1, 2, 4, 8] {
            for gpus in [0, 1, 8] {
                let mut a = base();
                a.inner_job_type = "volcano".into();
                a.replicas = replicas;
                a.common.worker_count = 3;
                a.common.gpu_count = gpus;
                a.common.coscheduling = true;
                let a = run(a).unwrap();
                assert_eq!(a.common.worker_count, replicas);
                assert_eq!(a.common.envs["workers"], replicas.to_string());
                assert_eq!(a.common.pod_group_min_available, replicas.to_string());
                assert_eq!(a.common.annotations[REQUEST_GPUS_ANNO_KEY], (replicas * gpus).to_string());
            }
        }
    }

    #[test]
    fn volcano_sync_at_count_limits() {
        for (replicas, gpus) in [(70_000, 70_000), (i32::MAX, 1), (i32::MAX, i32::MAX), (i32::MAX, 0)] {
            let mut a = base();
            a.inner_job_type = "volcano".into();
            a.replicas = replicas;
            a.common.gpu_count = gpus;
            let a = run(a).unwrap();
            assert_eq!(a.common.worker_count, replicas);
            let expected = i64::from(replicas) * i64::from(gpus);
            assert_eq!(a.common.annotations[REQUEST_GPUS_ANNO_KEY], expected.to_string());
        }
    }

    #[test]
    fn pytorch_keeps_worker_count() {
        let mut a = base();
        a.replicas = 5;
        a.common.worker_count = 2;
        a.common.gpu_count = 4;
        let a = run(a).unwrap();
        assert_eq!(a.common.worker_count, 2);
        assert_eq!(a.common.envs["workers"], "2");
        assert_eq!(a.common.annotations[REQUEST_GPUS_ANNO_KEY], "8");
    }

    #[test]
    fn annotations_follow_settings() {
        let mut a = base();
        a.success_ttl = "24h".into();
        a.kueue_queue_name = "team-q".into();
        let a = run(a).unwrap();
        assert_eq!(ann(&a, "retryLimit").as_deref(), Some("3"));
        assert_eq!(ann(&a, "admissionGracePeriodDuration").as_deref(), Some("1m"));
        assert_eq!(ann(&a, "warmupGracePeriodDuration").as_deref(), Some("5m"));
        assert_eq!(ann(&a, "failureGracePeriodDuration").as_deref(), Some("1m"));
        assert_eq!(ann(&a, "retryPausePeriodDuration").as_deref(), Some("90s"));
        assert_eq!(ann(&a, "successTTLDuration").as_deref(), Some("24h"));
        assert!(!a.common.labels.contains_key(QUEUE_NAME_LABEL));

        let mut a = base();
        a.retry_limit = 0;
        a.retry_pause_period.clear();
        let a = run(a).unwrap();
        assert_eq!(ann(&a, "retryLimit"), None);
        assert_eq!(ann(&a, "retryPausePeriodDuration"), None);
        assert_eq!(ann(&a, "successTTLDuration"), None);
    }

    #[test]
    fn env_master_addr_and_nproc() {
        let mut a = base();
        a.common.enable_rdma = true;
        a.nproc_per_node = "gpu".into();
        let a = run(a).unwrap();
        assert_eq!(a.common.envs["MASTER_ADDR"], "demo-master-0");
        assert_eq!(a.common.envs["PET_NPROC_PER_NODE"], "gpu");

        let mut a = base();
        a.common.enable_rdma = true;
        a.inner_job_type = "volcano".into();
        let a = run(a).unwrap();
        assert!(!a.common.envs.contains_key("MASTER_ADDR"));
        assert!(!a.common.envs.contains_key("PET_NPROC_PER_NODE"));
    }

    #[test]
    fn run_policy_comes_from_the_bag() {
        let mut b = SubmitAppWrapperJobArgsBuilder::new(base());
        b.add_arg_value("running-timeout", chrono::Duration::minutes(2))
            .add_arg_value("ttl-after-finished", chrono::Duration::hours(1));
        b.pre_build().unwrap();
        b.build().unwrap();
        assert_eq!(b.args().active_deadline_seconds, 120);
        assert_eq!(b.args().ttl_seconds_after_finished, 3600);

        let mut a = base();
        a.active_deadline_seconds = 30;
        let a = run(a).unwrap();
        assert_eq!(a.active_deadline_seconds, 30);
    }

    #[test]
    fn datasets_are_published_for_tensorboard() {
        let mut a = base();
        a.tensorboard.use_tensorboard = true;
        a.tensorboard.training_logdir = "/data/logs".into();
        let mut b = SubmitAppWrapperJobArgsBuilder::new(a);
        b.add_arg_value("data", vec!["pvc-a:/data".to_string()]);
        b.pre_build().unwrap();
        assert_eq!(b.values().map("share-data-dataset").map(|m| m.len()), Some(1));
        b.build().unwrap();
        assert!(!b.args().tensorboard.is_local_logging);
    }

    #[test]
    fn validation_failure_returns_error() {
        let mut a = base();
        a.retry_limit = -1;
        let err = run(a).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "--retry-limit must be >= 0");
    }
}
