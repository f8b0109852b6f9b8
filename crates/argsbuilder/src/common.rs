//! Common fragment: identity, image, counts, maps, tolerations and volumes.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use awjob_core::types::REQUEST_GPUS_ANNO_KEY;
use awjob_core::{parse_toleration, CommonSubmitArgs, DataDirVolume, Error, Result, TolerationArgs};

use crate::{transform_slice_to_map, ArgValues};

static DNS1035_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("valid dns-1035 regex"));

const MAX_NAME_LEN: usize = 63;

pub fn pre_build(args: &mut CommonSubmitArgs, values: &ArgValues) -> Result<()> {
    for entry in values.strings("data") {
        let (pvc, path) = entry
            .split_once(':')
            .ok_or_else(|| Error::validation(format!("invalid --data {entry}, expected <pvc name>:<mount path>")))?;
        args.data_set.insert(pvc.to_string(), path.to_string());
    }
    Ok(())
}

pub fn build(args: &mut CommonSubmitArgs, values: &ArgValues) -> Result<()> {
    check_name(&args.name)?;
    args.envs.extend(transform_slice_to_map(values.strings("env"), '='));
    args.node_selectors.extend(transform_slice_to_map(values.strings("selector"), '='));
    args.annotations.extend(transform_slice_to_map(values.strings("annotation"), '='));
    args.labels.extend(transform_slice_to_map(values.strings("label"), '='));
    set_tolerations(args, values.strings("toleration"))?;
    set_data_dirs(args, values.strings("data-dir"))?;
    args.image_pull_secrets.extend(values.strings("image-pull-secret").iter().cloned());
    args.devices.extend(transform_slice_to_map(values.strings("device"), '='));
    set_config_files(args, values.strings("config-file"))?;
    set_job_info_to_env(args);
    add_pod_group_label(args);
    add_request_gpus_to_annotation(args);
    Ok(())
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::validation("--name must be set"));
    }
    if name.len() > MAX_NAME_LEN || !DNS1035_LABEL.is_match(name) {
        return Err(Error::validation(format!(
            "--name={name} is invalid: must consist of lower case alphanumeric characters or '-', start with a letter, end with an alphanumeric character and be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn set_tolerations(args: &mut CommonSubmitArgs, raw: &[String]) -> Result<()> {
    for t in raw {
        if t == "all" {
            args.tolerations.push(TolerationArgs::tolerate_all());
            continue;
        }
        let parsed = parse_toleration(t)?;
        debug!(toleration = %t, key = %parsed.key, "parsed toleration");
        args.tolerations.push(parsed);
    }
    Ok(())
}

fn set_data_dirs(args: &mut CommonSubmitArgs, raw: &[String]) -> Result<()> {
    for (i, entry) in raw.iter().enumerate() {
        let (host, container) = entry.split_once(':').ok_or_else(|| {
            Error::validation(format!("invalid --data-dir {entry}, expected <host path>:<container path>"))
        })?;
        args.data_dirs.push(DataDirVolume {
            name: format!("training-data-{i}"),
            host_path: host.to_string(),
            container_path: container.to_string(),
        });
    }
    Ok(())
}

fn set_config_files(args: &mut CommonSubmitArgs, raw: &[String]) -> Result<()> {
    for entry in raw {
        let (local, container) = entry.split_once(':').ok_or_else(|| {
            Error::validation(format!("invalid --config-file {entry}, expected <local path>:<container path>"))
        })?;
        args.config_files.insert(local.to_string(), container.to_string());
    }
    Ok(())
}

fn set_job_info_to_env(args: &mut CommonSubmitArgs) {
    args.envs.insert("workers".into(), args.worker_count.to_string());
    args.envs.insert("gpus".into(), args.gpu_count.to_string());
}

fn add_pod_group_label(args: &mut CommonSubmitArgs) {
    if args.coscheduling {
        args.pod_group_name = format!("group-{}", args.name);
        args.pod_group_min_available = args.worker_count.to_string();
    }
}

/// Job-wide GPU request. Widened so any pair of non-negative counts fits.
pub(crate) fn requested_gpus(workers: i32, gpus_per_worker: i32) -> i64 {
    i64::from(workers) * i64::from(gpus_per_worker)
}

pub(crate) fn add_request_gpus_to_annotation(args: &mut CommonSubmitArgs) {
    let total = requested_gpus(args.worker_count, args.gpu_count);
    args.annotations.insert(REQUEST_GPUS_ANNO_KEY.into(), total.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use awjob_core::TolerationOperator;

    fn named(name: &str) -> CommonSubmitArgs {
        CommonSubmitArgs { name: name.into(), ..Default::default() }
    }

    #[test]
    fn name_must_be_a_dns_label() {
        let values = ArgValues::default();
        assert!(build(&mut named(""), &values).unwrap_err().to_string().contains("--name must be set"));
        assert!(build(&mut named("Bad_Name"), &values).is_err());
        assert!(build(&mut named("1job"), &values).is_err());
        assert!(build(&mut named(&"a".repeat(64)), &values).is_err());
        assert!(build(&mut named("train-01"), &values).is_ok());
    }

    #[test]
    fn bag_maps_and_derived_fields() {
        let mut values = ArgValues::default();
        values.insert("env", vec!["LR=0.1".to_string(), "junk".to_string()]);
        values.insert("label", vec!["team=ml".to_string()]);
        values.insert("selector", vec!["zone=a".to_string()]);
        values.insert("image-pull-secret", vec!["regcred".to_string()]);
        let mut args = named("demo");
        args.worker_count = 3;
        args.gpu_count = 2;
        args.coscheduling = true;
        build(&mut args, &values).unwrap();

        assert_eq!(args.envs["LR"], "0.1");
        assert!(!args.envs.contains_key("junk"));
        assert_eq!(args.envs["workers"], "3");
        assert_eq!(args.envs["gpus"], "2");
        assert_eq!(args.labels["team"], "ml");
        assert_eq!(args.node_selectors["zone"], "a");
        assert_eq!(args.image_pull_secrets, vec!["regcred"]);
        assert_eq!(args.pod_group_name, "group-demo");
        assert_eq!(args.pod_group_min_available, "3");
        assert_eq!(args.annotations[REQUEST_GPUS_ANNO_KEY], "6");
    }

    #[test]
    fn devices_and_config_files() {
        let mut values = ArgValues::default();
        values.insert("device", vec!["amd.com/gpu=2".to_string()]);
        values.insert("config-file", vec!["/tmp/a.yaml:/etc/a.yaml".to_string()]);
        let mut args = named("demo");
        build(&mut args, &values).unwrap();
        assert_eq!(args.devices["amd.com/gpu"], "2");
        assert_eq!(args.config_files["/tmp/a.yaml"], "/etc/a.yaml");

        values.insert("config-file", vec!["/tmp/a.yaml".to_string()]);
        let err = build(&mut named("demo"), &values).unwrap_err();
        assert!(err.to_string().contains("invalid --config-file /tmp/a.yaml"));
    }

    #[test]
    fn gpu_request_does_not_overflow() {
        let mut args = named("demo");
        args.worker_count = 50_000;
        args.gpu_count = 50_000;
        build(&mut args, &ArgValues::default()).unwrap();
        assert_eq!(args.annotations[REQUEST_GPUS_ANNO_KEY], "2500000000");
        assert_eq!(requested_gpus(i32::MAX, i32::MAX), 4_611_686_014_132_420_609);
    }

    #[test]
    fn tolerations_go_through_the_grammar() {
        let mut values = ArgValues::default();
        values.insert("toleration", vec!["all".to_string(), "gpu_node".to_string()]);
        let mut args = named("demo");
        build(&mut args, &values).unwrap();
        assert_eq!(args.tolerations.len(), 2);
        assert_eq!(args.tolerations[0].key, "");
        assert_eq!(args.tolerations[0].operator, Some(TolerationOperator::Exists));
        assert_eq!(args.tolerations[1].key, "gpu_node");

        values.insert("toleration", vec!["k=v:NoSchedule:Exists".to_string()]);
        let err = build(&mut named("demo"), &values).unwrap_err();
        assert!(matches!(err, Error::Toleration(_)));
    }

    #[test]
    fn data_and_data_dir_need_a_colon() {
        let mut values = ArgValues::default();
        values.insert("data", vec!["pvc-a:/data".to_string()]);
        values.insert("data-dir", vec!["/mnt/host:/mnt/c".to_string()]);
        let mut args = named("demo");
        pre_build(&mut args, &values).unwrap();
        build(&mut args, &values).unwrap();
        assert_eq!(args.data_set["pvc-a"], "/data");
        assert_eq!(args.data_dirs[0].host_path, "/mnt/host");
        assert_eq!(args.data_dirs[0].name, "training-data-0");

        values.insert("data", vec!["pvc-only".to_string()]);
        assert!(pre_build(&mut named("demo"), &values).is_err());
    }
}
