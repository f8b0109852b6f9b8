//! Validation chain run after synchronization. Fail-fast: the first rejected
//! check is the error returned.

use awjob_core::{parse_duration, parse_quantity, Error, Result, SubmitAppWrapperJobArgs};
use tracing::debug;

type Check = fn(&SubmitAppWrapperJobArgs) -> Result<()>;

const CHECKS: &[Check] = &[
    check_image,
    check_clean_pod_policy,
    check_gpus,
    check_quantities,
    check_run_policy,
    check_nproc_per_node,
    check_retry_limit,
    check_durations,
    check_inner_job_type,
    check_volcano,
];

pub fn check(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    CHECKS.iter().try_for_each(|c| c(args))
}

fn check_image(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    if args.common.image.is_empty() {
        return Err(Error::validation("--image must be set"));
    }
    Ok(())
}

fn check_clean_pod_policy(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    match args.clean_pod_policy.as_str() {
        "None" | "Running" | "All" => {
            debug!(policy = %args.clean_pod_policy, "supported cleanTaskPolicy");
            Ok(())
        }
        other => Err(Error::validation(format!("unsupported cleanTaskPolicy {other}"))),
    }
}

fn check_gpus(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    if args.common.gpu_count < 0 {
        return Err(Error::validation("--gpus is invalid"));
    }
    Ok(())
}

fn check_quantities(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    for (flag, value) in [("cpu", &args.cpu), ("memory", &args.memory), ("share-memory", &args.share_memory)] {
        if !value.is_empty() && parse_quantity(value).is_err() {
            return Err(Error::validation(format!("--{flag} is invalid")));
        }
    }
    Ok(())
}

fn check_run_policy(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    if args.active_deadline_seconds < 0 {
        return Err(Error::validation("--running-timeout is invalid"));
    }
    if args.ttl_seconds_after_finished < 0 {
        return Err(Error::validation("--ttl-after-finished is invalid"));
    }
    Ok(())
}

fn check_nproc_per_node(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    match args.nproc_per_node.as_str() {
        "" => debug!("--nproc-per-node is not set"),
        "auto" | "cpu" | "gpu" => debug!(nproc = %args.nproc_per_node, "supported nprocPerNode"),
        n => {
            let n: i64 = n.parse().map_err(|_| Error::validation("--nproc-per-node is invalid"))?;
            debug!(nproc = n, "supported nprocPerNode");
        }
    }
    Ok(())
}

fn check_retry_limit(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    if args.retry_limit < 0 {
        return Err(Error::validation("--retry-limit must be >= 0"));
    }
    Ok(())
}

fn check_durations(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    let params = [
        ("admission-grace-period", &args.admission_grace_period),
        ("warmup-grace-period", &args.warmup_grace_period),
        ("failure-grace-period", &args.failure_grace_period),
        ("retry-pause-period", &args.retry_pause_period),
        ("success-ttl", &args.success_ttl),
    ];
    for (flag, value) in params {
        if value.is_empty() {
            continue;
        }
        if let Err(e) = parse_duration(value) {
            return Err(Error::validation(format!("--{flag} is invalid: {e}")));
        }
    }
    Ok(())
}

fn check_inner_job_type(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    let t = args.inner_type().ok_or_else(|| {
        Error::validation(format!(
            "unsupported inner job type {}, supported types are 'pytorch' and 'volcano'",
            args.inner_job_type
        ))
    })?;
    debug!(inner_type = %t, "supported innerJobType");
    Ok(())
}

fn check_volcano(args: &SubmitAppWrapperJobArgs) -> Result<()> {
    if !args.is_volcano() {
        return Ok(());
    }
    if !(1..=65535).contains(&args.master_port) {
        return Err(Error::validation(format!("--master-port must be between 1 and 65535, got {}", args.master_port)));
    }
    check_topology_mode("network-topology-mode", &args.network_topology_mode)?;
    check_topology_mode("partition-topology-mode", &args.partition_network_topology_mode)?;
    if args.total_partitions > 0 && args.partition_size <= 0 {
        return Err(Error::validation("--partition-size must be specified when --total-partitions is set"));
    }
    if args.partition_size > 0 && args.total_partitions <= 0 {
        return Err(Error::validation("--total-partitions must be specified when --partition-size is set"));
    }
    Ok(())
}

fn check_topology_mode(flag: &str, mode: &str) -> Result<()> {
    match mode {
        "" | "hard" | "soft" => Ok(()),
        other => Err(Error::validation(format!("--{flag} must be 'hard' or 'soft', got '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SubmitAppWrapperJobArgs {
        let mut a = SubmitAppWrapperJobArgs::default();
        a.common.name = "demo".into();
        a.common.image = "pytorch:2.3".into();
        a
    }

    fn volcano() -> SubmitAppWrapperJobArgs {
        let mut a = valid();
        a.inner_job_type = "volcano".into();
        a
    }

    fn err_of(a: &SubmitAppWrapperJobArgs) -> String {
        check(a).unwrap_err().to_string()
    }

    #[test]
    fn defaults_pass() {
        check(&valid()).unwrap();
        check(&volcano()).unwrap();
    }

    #[test]
    fn image_is_checked_first() {
        let mut a = valid();
        a.common.image.clear();
        a.retry_limit = -1;
        assert_eq!(err_of(&a), "--image must be set");
    }

    #[test]
    fn retry_limit_must_be_non_negative() {
        let mut a = valid();
        a.retry_limit = -1;
        assert_eq!(err_of(&a), "--retry-limit must be >= 0");
        a.retry_limit = 0;
        check(&a).unwrap();
    }

    #[test]
    fn enumerations_and_quantities() {
        let mut a = valid();
        a.clean_pod_policy = "Sometimes".into();
        assert_eq!(err_of(&a), "unsupported cleanTaskPolicy Sometimes");

        let mut a = valid();
        a.memory = "lots".into();
        assert_eq!(err_of(&a), "--memory is invalid");

        let mut a = valid();
        a.nproc_per_node = "four".into();
        assert_eq!(err_of(&a), "--nproc-per-node is invalid");
        a.nproc_per_node = "4".into();
        check(&a).unwrap();

        let mut a = valid();
        a.inner_job_type = "tfjob".into();
        assert!(err_of(&a).contains("unsupported inner job type tfjob"));
    }

    #[test]
    fn durations_are_parsed() {
        let mut a = valid();
        a.warmup_grace_period = "5 minutes".into();
        assert!(err_of(&a).starts_with("--warmup-grace-period is invalid"));

        let mut a = valid();
        a.success_ttl = "24h".into();
        check(&a).unwrap();
        a.success_ttl = "1d".into();
        assert!(err_of(&a).starts_with("--success-ttl is invalid"));
    }

    #[test]
    fn master_port_range_only_for_volcano() {
        for port in [0, 65536, -1] {
            let mut a = volcano();
            a.master_port = port;
            assert!(err_of(&a).contains("--master-port must be between 1 and 65535"), "{port}");
        }
        let mut a = volcano();
        a.master_port = 65535;
        check(&a).unwrap();

        let mut a = valid();
        a.master_port = 0;
        check(&a).unwrap();
    }

    #[test]
    fn topology_modes() {
        let mut a = volcano();
        a.network_topology_mode = "strict".into();
        assert_eq!(err_of(&a), "--network-topology-mode must be 'hard' or 'soft', got 'strict'");

        let mut a = volcano();
        a.partition_network_topology_mode = "hard".into();
        check(&a).unwrap();
    }

    #[test]
    fn partition_fields_come_in_pairs() {
        let mut a = volcano();
        a.total_partitions = 2;
        assert_eq!(err_of(&a), "--partition-size must be specified when --total-partitions is set");

        let mut a = volcano();
        a.partition_size = 4;
        assert_eq!(err_of(&a), "--total-partitions must be specified when --partition-size is set");

        a.total_partitions = 2;
        check(&a).unwrap();
    }
}
