use awjob_core::appwrapper::{AppWrapper, AppWrapperPhase, CONDITION_QUOTA_RESERVED, CONDITION_UNHEALTHY};
use awjob_core::JobStatus;
use tracing::debug;

/// Collapse the envelope phase and conditions into a lifecycle status.
///
/// `Resuming` only counts as pending once quota is reserved; whether
/// resources are already deployed does not change the answer.
pub fn project_status(aw: &AppWrapper) -> JobStatus {
    let status = match aw.status.phase {
        AppWrapperPhase::Empty | AppWrapperPhase::Suspended => JobStatus::Queuing,
        AppWrapperPhase::Resuming => {
            if aw.condition_is_true(CONDITION_QUOTA_RESERVED) { JobStatus::Pending } else { JobStatus::Queuing }
        }
        AppWrapperPhase::Running => {
            if aw.condition_is_true(CONDITION_UNHEALTHY) { JobStatus::Failed } else { JobStatus::Running }
        }
        AppWrapperPhase::Succeeded => JobStatus::Succeeded,
        AppWrapperPhase::Failed => JobStatus::Failed,
        AppWrapperPhase::Resetting
        | AppWrapperPhase::Suspending
        | AppWrapperPhase::Terminating
        | AppWrapperPhase::Unknown => JobStatus::Pending,
    };
    debug!(appwrapper = aw.name(), phase = aw.status.phase.as_str(), %status, "projected status");
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use awjob_core::appwrapper::{AppWrapperCondition, ConditionStatus, CONDITION_RESOURCES_DEPLOYED};

    fn aw(phase: AppWrapperPhase, conds: &[(&str, ConditionStatus)]) -> AppWrapper {
        let mut aw = AppWrapper::default();
        aw.metadata.name = Some("demo".into());
        aw.status.phase = phase;
        aw.status.conditions = conds
            .iter()
            .map(|(t, s)| AppWrapperCondition { type_: t.to_string(), status: *s, ..Default::default() })
            .collect();
        aw
    }

    use ConditionStatus::{False, True, Unknown};

    #[test]
    fn phase_table() {
        let cases = [
            (AppWrapperPhase::Empty, JobStatus::Queuing),
            (AppWrapperPhase::Suspended, JobStatus::Queuing),
            (AppWrapperPhase::Resuming, JobStatus::Queuing),
            (AppWrapperPhase::Running, JobStatus::Running),
            (AppWrapperPhase::Resetting, JobStatus::Pending),
            (AppWrapperPhase::Suspending, JobStatus::Pending),
            (AppWrapperPhase::Succeeded, JobStatus::Succeeded),
            (AppWrapperPhase::Failed, JobStatus::Failed),
            (AppWrapperPhase::Terminating, JobStatus::Pending),
            (AppWrapperPhase::Unknown, JobStatus::Pending),
        ];
        for (phase, want) in cases {
            assert_eq!(project_status(&aw(phase, &[])), want, "{phase:?}");
        }
    }

    #[test]
    fn terminal_phases_ignore_conditions() {
        let noisy = [(CONDITION_UNHEALTHY, True), (CONDITION_QUOTA_RESERVED, False), (CONDITION_RESOURCES_DEPLOYED, Unknown)];
        assert_eq!(project_status(&aw(AppWrapperPhase::Succeeded, &noisy)), JobStatus::Succeeded);
        assert_eq!(project_status(&aw(AppWrapperPhase::Failed, &noisy)), JobStatus::Failed);
    }

    #[test]
    fn resuming_waits_for_quota() {
        let q = CONDITION_QUOTA_RESERVED;
        assert_eq!(project_status(&aw(AppWrapperPhase::Resuming, &[(q, True)])), JobStatus::Pending);
        assert_eq!(project_status(&aw(AppWrapperPhase::Resuming, &[(q, False)])), JobStatus::Queuing);
        assert_eq!(project_status(&aw(AppWrapperPhase::Resuming, &[(q, Unknown)])), JobStatus::Queuing);
        let deployed = aw(AppWrapperPhase::Resuming, &[(q, True), (CONDITION_RESOURCES_DEPLOYED, False)]);
        assert_eq!(project_status(&deployed), JobStatus::Pending);
    }

    #[test]
    fn unhealthy_running_is_failed() {
        let u = CONDITION_UNHEALTHY;
        assert_eq!(project_status(&aw(AppWrapperPhase::Running, &[(u, True)])), JobStatus::Failed);
        assert_eq!(project_status(&aw(AppWrapperPhase::Running, &[(u, False)])), JobStatus::Running);
        // first entry of a type decides
        assert_eq!(project_status(&aw(AppWrapperPhase::Running, &[(u, False), (u, True)])), JobStatus::Running);
    }

    #[test]
    fn unnamed_envelope_still_projects() {
        let mut a = aw(AppWrapperPhase::Succeeded, &[]);
        a.metadata.name = None;
        assert_eq!(project_status(&a), JobStatus::Succeeded);
    }
}
