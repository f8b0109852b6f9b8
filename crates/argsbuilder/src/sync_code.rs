//! Code-sync fragment: fetch sources into the job before it starts.

use awjob_core::{Error, Result, SubmitSyncCodeArgs};

use crate::ArgValues;

pub const DEFAULT_RSYNC_IMAGE: &str = "registry.cn-zhangjiakou.aliyuncs.com/acs/rsync:v3.1.0-aliyun";
pub const DEFAULT_GIT_SYNC_IMAGE: &str = "registry.cn-zhangjiakou.aliyuncs.com/acs/git-sync:v3.3.5";

pub fn pre_build(_args: &mut SubmitSyncCodeArgs, _values: &ArgValues) -> Result<()> { Ok(()) }

pub fn build(args: &mut SubmitSyncCodeArgs, _values: &ArgValues) -> Result<()> {
    match args.sync_mode.as_str() {
        "" => return Ok(()),
        "rsync" => {
            require_source(args)?;
            if args.sync_image.is_empty() {
                args.sync_image = DEFAULT_RSYNC_IMAGE.into();
            }
        }
        "git" => {
            require_source(args)?;
            if args.sync_image.is_empty() {
                args.sync_image = DEFAULT_GIT_SYNC_IMAGE.into();
            }
            args.sync_git_project_name = git_project_name(&args.sync_source)?;
        }
        other => {
            return Err(Error::validation(format!("--sync-mode={other} is unsupported, only rsync and git are supported")))
        }
    }
    Ok(())
}

fn require_source(args: &SubmitSyncCodeArgs) -> Result<()> {
    if args.sync_source.is_empty() {
        return Err(Error::validation(format!("--sync-source must be set when --sync-mode={}", args.sync_mode)));
    }
    Ok(())
}

/// `https://host/org/repo.git` -> `repo`
fn git_project_name(source: &str) -> Result<String> {
    let last = source.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        return Err(Error::validation(format!("--sync-source={source} has no project name")));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync(mode: &str, source: &str) -> SubmitSyncCodeArgs {
        SubmitSyncCodeArgs { sync_mode: mode.into(), sync_source: source.into(), ..Default::default() }
    }

    #[test]
    fn unset_mode_is_a_no_op() {
        let mut args = SubmitSyncCodeArgs::default();
        build(&mut args, &ArgValues::default()).unwrap();
        assert_eq!(args, SubmitSyncCodeArgs::default());
    }

    #[test]
    fn git_derives_project_and_image() {
        let mut args = sync("git", "https://github.com/kubeflow/arena.git");
        build(&mut args, &ArgValues::default()).unwrap();
        assert_eq!(args.sync_git_project_name, "arena");
        assert_eq!(args.sync_image, DEFAULT_GIT_SYNC_IMAGE);
    }

    #[test]
    fn rsync_keeps_explicit_image() {
        let mut args = sync("rsync", "10.0.0.1::backup/code");
        args.sync_image = "my/rsync:1".into();
        build(&mut args, &ArgValues::default()).unwrap();
        assert_eq!(args.sync_image, "my/rsync:1");
    }

    #[test]
    fn rejects_missing_source_and_unknown_mode() {
        assert!(build(&mut sync("git", ""), &ArgValues::default()).is_err());
        assert!(build(&mut sync("ftp", "x"), &ArgValues::default()).unwrap_err().to_string().contains("rsync and git"));
    }
}
