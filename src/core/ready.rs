//! Requisite evaluation — decides whether a step may start given the
//! current completion map.
//!
//! A step's requisite groups are implicitly ANDed. Each group either is
//! satisfied, is not yet decidable (re-check on the next completion), or is
//! unambiguously violated by a terminal referent — a hard failure that is
//! permanent and becomes the step's own Failed completion.

use super::types::{CompletionStatus, Requisite, RequisiteCondition, Step, StepCompletion};
use std::collections::HashMap;
use thiserror::Error;

/// A hard failure of the evaluator. Once returned for a step it will be
/// returned for every later completion map: the violating referents are
/// terminal and never change state again.
#[derive(Debug, Error)]
pub enum RequisiteError {
    #[error("requisite {condition} on [{referents}] can never be satisfied: {reason}")]
    Unsatisfiable {
        condition: RequisiteCondition,
        referents: String,
        reason: String,
    },

    #[error("requisite references step '{0}' with no completion record")]
    UnknownStep(String),
}

enum GroupState {
    Satisfied,
    Pending,
}

/// True when every requisite group of `step` is satisfied; false when some
/// group is still waiting on a non-terminal referent. Every group is
/// inspected on every call so a violated group surfaces even while an
/// earlier group is merely pending.
pub fn is_ready(
    step: &Step,
    completions: &HashMap<String, StepCompletion>,
) -> Result<bool, RequisiteError> {
    let mut ready = true;
    for group in &step.requisites {
        match evaluate_group(group, completions)? {
            GroupState::Satisfied => {}
            GroupState::Pending => ready = false,
        }
    }
    Ok(ready)
}

fn evaluate_group(
    group: &Requisite,
    completions: &HashMap<String, StepCompletion>,
) -> Result<GroupState, RequisiteError> {
    use CompletionStatus::{Completed, Failed};
    use GroupState::{Pending, Satisfied};

    // A group with no referents constrains nothing. Vacuously satisfied for
    // the ANY kinds too, keeping them consistent with their ALL pairs.
    if group.step_ids.is_empty() {
        return Ok(GroupState::Satisfied);
    }

    let mut records: Vec<&StepCompletion> = Vec::with_capacity(group.step_ids.len());
    for id in &group.step_ids {
        let record = completions
            .get(id)
            .ok_or_else(|| RequisiteError::UnknownStep(id.clone()))?;
        records.push(record);
    }

    let all_terminal = records.iter().all(|c| c.status.is_terminal());

    match group.condition {
        RequisiteCondition::Require => {
            if let Some(failed) = records.iter().find(|c| c.status == Failed) {
                return Err(violated(group, format!("'{}' failed", failed.id)));
            }
            if records.iter().all(|c| c.status == Completed) {
                Ok(Satisfied)
            } else {
                Ok(Pending)
            }
        }
        RequisiteCondition::RequireAny => {
            if records.iter().any(|c| c.status == Completed) {
                Ok(Satisfied)
            } else if all_terminal {
                Err(violated(group, "every referenced step failed".to_string()))
            } else {
                Ok(Pending)
            }
        }
        RequisiteCondition::OnChanges => {
            if let Some(still) = records
                .iter()
                .find(|c| c.status.is_terminal() && !c.changes_made)
            {
                return Err(violated(
                    group,
                    format!("'{}' finished without making changes", still.id),
                ));
            }
            if all_terminal {
                Ok(Satisfied)
            } else {
                Ok(Pending)
            }
        }
        RequisiteCondition::OnChangesAny => {
            if records.iter().any(|c| c.status.is_terminal() && c.changes_made) {
                Ok(Satisfied)
            } else if all_terminal {
                Err(violated(
                    group,
                    "no referenced step made a change".to_string(),
                ))
            } else {
                Ok(Pending)
            }
        }
        RequisiteCondition::OnFail => {
            if let Some(succeeded) = records.iter().find(|c| c.status == Completed) {
                return Err(violated(
                    group,
                    format!("'{}' completed successfully", succeeded.id),
                ));
            }
            if records.iter().all(|c| c.status == Failed) {
                Ok(Satisfied)
            } else {
                Ok(Pending)
            }
        }
        RequisiteCondition::OnFailAny => {
            if records.iter().any(|c| c.status == Failed) {
                Ok(Satisfied)
            } else if all_terminal {
                Err(violated(
                    group,
                    "every referenced step completed successfully".to_string(),
                ))
            } else {
                Ok(Pending)
            }
        }
    }
}

fn violated(group: &Requisite, reason: String) -> RequisiteError {
    RequisiteError::Unsatisfiable {
        condition: group.condition,
        referents: group.step_ids.join(", "),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RequisiteCondition::*;
    use crate::core::types::Step;

    fn record(id: &str, status: CompletionStatus, changed: bool) -> StepCompletion {
        StepCompletion {
            id: id.to_string(),
            status,
            changes_made: changed,
            changes: Vec::new(),
            error: None,
        }
    }

    fn map(records: &[StepCompletion]) -> HashMap<String, StepCompletion> {
        records.iter().map(|c| (c.id.clone(), c.clone())).collect()
    }

    #[test]
    fn test_empty_requisites_always_ready() {
        let step = Step::new("a", "cmd", "run");
        assert!(is_ready(&step, &HashMap::new()).unwrap());
    }

    #[test]
    fn test_empty_groups_vacuously_satisfied() {
        // Both ALL and ANY kinds: a group with no referents never blocks
        // and never hard-fails.
        for condition in [Require, RequireAny, OnChanges, OnChangesAny, OnFail, OnFailAny] {
            let step = Step::new("a", "cmd", "run").with_requisite(condition, &[]);
            assert!(
                is_ready(&step, &HashMap::new()).unwrap(),
                "empty {} group must be satisfied",
                condition
            );
        }
    }

    #[test]
    fn test_require_pending_then_ready() {
        let step = Step::new("a", "cmd", "run").with_requisite(Require, &["b", "c"]);
        let pending = map(&[
            record("b", CompletionStatus::Completed, false),
            record("c", CompletionStatus::InProgress, false),
        ]);
        assert!(!is_ready(&step, &pending).unwrap());

        let done = map(&[
            record("b", CompletionStatus::Completed, false),
            record("c", CompletionStatus::Completed, true),
        ]);
        assert!(is_ready(&step, &done).unwrap());
    }

    #[test]
    fn test_require_failed_is_hard_failure() {
        let step = Step::new("a", "cmd", "run").with_requisite(Require, &["b"]);
        let completions = map(&[record("b", CompletionStatus::Failed, false)]);
        let err = is_ready(&step, &completions).unwrap_err();
        assert!(err.to_string().contains("'b' failed"));
    }

    #[test]
    fn test_require_hard_failure_is_monotonic() {
        // Once unsatisfiable, every later map still reports failure: the
        // failed referent is terminal and other referents completing cannot
        // repair the group.
        let step = Step::new("a", "cmd", "run").with_requisite(Require, &["b", "c"]);
        let first = map(&[
            record("b", CompletionStatus::Failed, false),
            record("c", CompletionStatus::InProgress, false),
        ]);
        assert!(is_ready(&step, &first).is_err());

        let later = map(&[
            record("b", CompletionStatus::Failed, false),
            record("c", CompletionStatus::Completed, true),
        ]);
        assert!(is_ready(&step, &later).is_err());
    }

    #[test]
    fn test_require_any_one_completed_one_in_progress_is_ready() {
        let step = Step::new("x", "cmd", "run")
            .with_requisite(RequireAny, &["succeeded", "inprogress"]);
        let completions = map(&[
            record("succeeded", CompletionStatus::Completed, false),
            record("inprogress", CompletionStatus::InProgress, false),
        ]);
        assert!(is_ready(&step, &completions).unwrap());
    }

    #[test]
    fn test_require_any_all_failed_is_hard_failure() {
        let step = Step::new("x", "cmd", "run").with_requisite(RequireAny, &["b", "c"]);
        let completions = map(&[
            record("b", CompletionStatus::Failed, false),
            record("c", CompletionStatus::Failed, false),
        ]);
        assert!(is_ready(&step, &completions).is_err());
    }

    #[test]
    fn test_require_any_some_pending_not_yet_failed() {
        let step = Step::new("x", "cmd", "run").with_requisite(RequireAny, &["b", "c"]);
        let completions = map(&[
            record("b", CompletionStatus::Failed, false),
            record("c", CompletionStatus::NotStarted, false),
        ]);
        assert!(!is_ready(&step, &completions).unwrap());
    }

    #[test]
    fn test_onchanges_requires_change() {
        let step = Step::new("restart", "cmd", "run").with_requisite(OnChanges, &["conf"]);
        let changed = map(&[record("conf", CompletionStatus::Completed, true)]);
        assert!(is_ready(&step, &changed).unwrap());

        let unchanged = map(&[record("conf", CompletionStatus::Completed, false)]);
        let err = is_ready(&step, &unchanged).unwrap_err();
        assert!(err.to_string().contains("without making changes"));
    }

    #[test]
    fn test_onchanges_pending_while_running() {
        let step = Step::new("restart", "cmd", "run").with_requisite(OnChanges, &["conf"]);
        let completions = map(&[record("conf", CompletionStatus::InProgress, false)]);
        assert!(!is_ready(&step, &completions).unwrap());
    }

    #[test]
    fn test_onchanges_any_single_change_suffices() {
        let step =
            Step::new("restart", "cmd", "run").with_requisite(OnChangesAny, &["a", "b", "c"]);
        let completions = map(&[
            record("a", CompletionStatus::Completed, false),
            record("b", CompletionStatus::Failed, true),
            record("c", CompletionStatus::InProgress, false),
        ]);
        assert!(is_ready(&step, &completions).unwrap());
    }

    #[test]
    fn test_onchanges_any_all_terminal_no_change_fails() {
        let step = Step::new("restart", "cmd", "run").with_requisite(OnChangesAny, &["a", "b"]);
        let completions = map(&[
            record("a", CompletionStatus::Completed, false),
            record("b", CompletionStatus::Failed, false),
        ]);
        assert!(is_ready(&step, &completions).is_err());
    }

    #[test]
    fn test_onfail_completed_referent_is_hard_failure() {
        // Step y requires(onfail) z; z completed -> y can never run.
        let step = Step::new("y", "cmd", "run").with_requisite(OnFail, &["z"]);
        let completions = map(&[record("z", CompletionStatus::Completed, true)]);
        let err = is_ready(&step, &completions).unwrap_err();
        assert!(err.to_string().contains("'z' completed successfully"));
    }

    #[test]
    fn test_onfail_satisfied_by_failure() {
        let step = Step::new("y", "cmd", "run").with_requisite(OnFail, &["z"]);
        let completions = map(&[record("z", CompletionStatus::Failed, false)]);
        assert!(is_ready(&step, &completions).unwrap());
    }

    #[test]
    fn test_onfail_any_waits_for_terminal() {
        let step = Step::new("y", "cmd", "run").with_requisite(OnFailAny, &["a", "b"]);
        let waiting = map(&[
            record("a", CompletionStatus::Completed, false),
            record("b", CompletionStatus::InProgress, false),
        ]);
        assert!(!is_ready(&step, &waiting).unwrap());

        let one_failed = map(&[
            record("a", CompletionStatus::Completed, false),
            record("b", CompletionStatus::Failed, false),
        ]);
        assert!(is_ready(&step, &one_failed).unwrap());

        let all_succeeded = map(&[
            record("a", CompletionStatus::Completed, false),
            record("b", CompletionStatus::Completed, false),
        ]);
        assert!(is_ready(&step, &all_succeeded).is_err());
    }

    #[test]
    fn test_groups_are_anded() {
        let step = Step::new("a", "cmd", "run")
            .with_requisite(Require, &["b"])
            .with_requisite(OnChanges, &["c"]);
        let half = map(&[
            record("b", CompletionStatus::Completed, false),
            record("c", CompletionStatus::InProgress, false),
        ]);
        assert!(!is_ready(&step, &half).unwrap());

        let both = map(&[
            record("b", CompletionStatus::Completed, false),
            record("c", CompletionStatus::Completed, true),
        ]);
        assert!(is_ready(&step, &both).unwrap());
    }

    #[test]
    fn test_violation_reported_even_when_other_group_pending() {
        let step = Step::new("a", "cmd", "run")
            .with_requisite(Require, &["slow"])
            .with_requisite(OnFail, &["done"]);
        let completions = map(&[
            record("slow", CompletionStatus::InProgress, false),
            record("done", CompletionStatus::Completed, false),
        ]);
        assert!(is_ready(&step, &completions).is_err());
    }

    #[test]
    fn test_unknown_referent_is_hard_failure() {
        let step = Step::new("a", "cmd", "run").with_requisite(Require, &["ghost"]);
        let err = is_ready(&step, &HashMap::new()).unwrap_err();
        assert!(matches!(err, RequisiteError::UnknownStep(ref id) if id == "ghost"));
    }
}
