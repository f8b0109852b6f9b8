//! Dashboard fragment. Reads the dataset mounts published under
//! `share-data-dataset` to decide whether logs live on a shared volume.

use std::path::Path;

use awjob_core::types::SHARE_DATA_PREFIX;
use awjob_core::{Error, Result, SubmitTensorboardArgs};
use tracing::debug;

use crate::ArgValues;

pub const DEFAULT_LOGDIR: &str = "/training_logs";

pub fn pre_build(_args: &mut SubmitTensorboardArgs, _values: &ArgValues) -> Result<()> { Ok(()) }

pub fn build(args: &mut SubmitTensorboardArgs, job_name: &str, values: &ArgValues) -> Result<()> {
    if !args.use_tensorboard {
        return Ok(());
    }
    if args.training_logdir.is_empty() {
        args.training_logdir = DEFAULT_LOGDIR.into();
    }
    if !Path::new(&args.training_logdir).is_absolute() {
        return Err(Error::validation(format!("--logdir={} must be an absolute path", args.training_logdir)));
    }

    let key = format!("{SHARE_DATA_PREFIX}dataset");
    let on_shared_volume = values
        .map(&key)
        .is_some_and(|mounts| mounts.values().any(|mount| Path::new(&args.training_logdir).starts_with(mount)));
    if on_shared_volume {
        debug!(logdir = %args.training_logdir, "tensorboard logs on a dataset volume");
        args.is_local_logging = false;
    } else {
        args.is_local_logging = true;
        args.host_log_path = format!("/arena_logs/training-{job_name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn enabled(logdir: &str) -> SubmitTensorboardArgs {
        SubmitTensorboardArgs { use_tensorboard: true, training_logdir: logdir.into(), ..Default::default() }
    }

    #[test]
    fn disabled_is_a_no_op() {
        let mut args = SubmitTensorboardArgs::default();
        build(&mut args, "demo", &ArgValues::default()).unwrap();
        assert!(!args.is_local_logging);
        assert!(args.host_log_path.is_empty());
    }

    #[test]
    fn local_logging_without_dataset_mount() {
        let mut args = enabled("");
        build(&mut args, "demo", &ArgValues::default()).unwrap();
        assert_eq!(args.training_logdir, DEFAULT_LOGDIR);
        assert!(args.is_local_logging);
        assert_eq!(args.host_log_path, "/arena_logs/training-demo");
    }

    #[test]
    fn logdir_under_dataset_is_shared() {
        let mut values = ArgValues::default();
        values.insert("share-data-dataset", BTreeMap::from([("pvc".to_string(), "/data".to_string())]));
        let mut args = enabled("/data/logs");
        build(&mut args, "demo", &values).unwrap();
        assert!(!args.is_local_logging);

        let mut args = enabled("/database/logs");
        build(&mut args, "demo", &values).unwrap();
        assert!(args.is_local_logging);
    }

    #[test]
    fn relative_logdir_is_rejected() {
        assert!(build(&mut enabled("logs"), "demo", &ArgValues::default()).is_err());
    }
}
