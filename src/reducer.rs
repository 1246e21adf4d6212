//! Run state reducer
//!
//! Folds one lifecycle event at a time into a [`RunState`]. The reducer is a
//! pure function: no IO, no clock reads, same inputs give the same output.
//!
//! Completion events (`pass`, `fail`, `pending`) address the most recently
//! started record. The runner executes tests sequentially, so the last record
//! is the only one that can be in flight.

use crate::models::{RunEvent, RunState, RunStatus, TestRecord, TestState};

/// Protocol violations detected while reducing an event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReduceError {
    #[error("'{event}' event received before any 'test' event")]
    NoTestInFlight { event: String },

    #[error("'suite end' event received with no open suite")]
    SuiteUnderflow,

    #[error("'suite end' for '{found}' does not match the innermost open suite '{expected}'")]
    SuiteMismatch { expected: String, found: String },

    #[error("'pending' event for test '{title}' which already finished with '{state}'")]
    PendingAfterVerdict { title: String, state: TestState },
}

/// Apply one event to the state.
///
/// `None` produces the initial state before applying the event. On error no
/// state is returned at all, so a caller holding the previous state never
/// observes a partial update.
pub fn reduce(state: Option<RunState>, event: &RunEvent) -> Result<RunState, ReduceError> {
    let mut state = state.unwrap_or_default();
    apply_event(&mut state, event)?;
    Ok(state)
}

/// Apply one event in place and report whether the state changed.
///
/// Every protocol check runs before the first mutation, so on error `state`
/// is exactly what it was before the call.
pub fn apply_event(state: &mut RunState, event: &RunEvent) -> Result<bool, ReduceError> {
    let changed = match event {
        RunEvent::Start => set_status(state, RunStatus::Started),
        RunEvent::End => set_status(state, RunStatus::Ended),
        RunEvent::Suite { title } => {
            state.path.push(title.clone());
            true
        }
        RunEvent::SuiteEnd { title } => {
            let innermost = state.path.last().ok_or(ReduceError::SuiteUnderflow)?;
            if let Some(found) = title {
                if found != innermost {
                    return Err(ReduceError::SuiteMismatch {
                        expected: innermost.clone(),
                        found: found.clone(),
                    });
                }
            }
            state.path.pop();
            true
        }
        RunEvent::Test { title } => {
            let record = TestRecord::started(state.path.clone(), title.clone());
            state.tests.push(record);
            true
        }
        RunEvent::Pass { duration } => {
            let test = last_test(state, event)?;
            let changed = test.state != TestState::Pass || test.duration != Some(*duration);
            test.state = TestState::Pass;
            test.duration = Some(*duration);
            changed
        }
        RunEvent::Fail { duration, error } => {
            let test = last_test(state, event)?;
            let changed = test.state != TestState::Fail
                || test.duration != Some(*duration)
                || test.error.as_ref() != Some(error);
            test.state = TestState::Fail;
            test.duration = Some(*duration);
            test.error = Some(error.clone());
            changed
        }
        RunEvent::Pending { .. } => {
            let test = last_test(state, event)?;
            if test.state.is_verdict() {
                return Err(ReduceError::PendingAfterVerdict {
                    title: test.title.clone(),
                    state: test.state,
                });
            }
            let changed = test.state != TestState::Pending;
            test.state = TestState::Pending;
            changed
        }
        RunEvent::TestEnd | RunEvent::Hook | RunEvent::HookEnd | RunEvent::Unknown { .. } => false,
    };

    Ok(changed)
}

/// Fold a whole event sequence starting from the initial state
pub fn replay<'a, I>(events: I) -> Result<RunState, ReduceError>
where
    I: IntoIterator<Item = &'a RunEvent>,
{
    events
        .into_iter()
        .try_fold(RunState::new(), |state, event| reduce(Some(state), event))
}

fn set_status(state: &mut RunState, status: RunStatus) -> bool {
    let changed = state.status != status;
    state.status = status;
    changed
}

fn last_test<'s>(state: &'s mut RunState, event: &RunEvent) -> Result<&'s mut TestRecord, ReduceError> {
    state.tests.last_mut().ok_or_else(|| ReduceError::NoTestInFlight {
        event: event.kind().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestError;

    fn suite(title: &str) -> RunEvent {
        RunEvent::Suite { title: title.to_string() }
    }

    fn test(title: &str) -> RunEvent {
        RunEvent::Test { title: title.to_string() }
    }

    fn suite_end() -> RunEvent {
        RunEvent::SuiteEnd { title: None }
    }

    #[test]
    fn test_initial_state_from_none() {
        let state = reduce(None, &RunEvent::Unknown { kind: "noop".to_string() }).unwrap();
        assert_eq!(state, RunState::new());
        assert_eq!(state.status, RunStatus::NotStarted);
    }

    #[test]
    fn test_single_passing_test_scenario() {
        let events = vec![
            suite("A"),
            test("t1"),
            RunEvent::Pass { duration: 5 },
            suite_end(),
            RunEvent::End,
        ];

        let state = replay(&events).unwrap();

        assert_eq!(state.status, RunStatus::Ended);
        assert!(state.path.is_empty());
        assert_eq!(state.tests.len(), 1);
        let record = &state.tests[0];
        assert_eq!(record.path, vec!["A".to_string()]);
        assert_eq!(record.title, "t1");
        assert_eq!(record.state, TestState::Pass);
        assert_eq!(record.duration, Some(5));
    }

    #[test]
    fn test_fail_preserves_error_verbatim() {
        let stack = "AssertionError: nope\n    at Context.<anonymous> (spec.js:4:12)\n\t  ";
        let mut error = TestError::new(stack);
        error.extra.insert("code".to_string(), serde_json::json!("ERR_ASSERTION"));

        let events = vec![
            test("breaks"),
            RunEvent::Fail { duration: 12, error: error.clone() },
        ];
        let state = replay(&events).unwrap();

        let record = &state.tests[0];
        assert_eq!(record.state, TestState::Fail);
        assert_eq!(record.duration, Some(12));
        assert_eq!(record.error.as_ref(), Some(&error));
        assert_eq!(record.error.as_ref().unwrap().stack, stack);
    }

    #[test]
    fn test_record_path_is_a_snapshot() {
        let events = vec![
            suite("outer"),
            test("first"),
            RunEvent::Pass { duration: 1 },
            suite("inner"),
            test("second"),
            RunEvent::Pass { duration: 2 },
            suite_end(),
            suite_end(),
        ];
        let state = replay(&events).unwrap();

        assert_eq!(state.tests[0].path, vec!["outer".to_string()]);
        assert_eq!(
            state.tests[1].path,
            vec!["outer".to_string(), "inner".to_string()]
        );
        assert!(state.path.is_empty());
    }

    #[test]
    fn test_pending_leaves_duration_unset() {
        let events = vec![test("later"), RunEvent::Pending { duration: Some(9) }];
        let state = replay(&events).unwrap();

        assert_eq!(state.tests[0].state, TestState::Pending);
        assert!(state.tests[0].duration.is_none());
    }

    #[test]
    fn test_ignored_events_leave_state_unchanged() {
        let before = replay(&[RunEvent::Start, suite("A"), test("t")]).unwrap();

        for event in [
            RunEvent::TestEnd,
            RunEvent::Hook,
            RunEvent::HookEnd,
            RunEvent::Unknown { kind: "retry".to_string() },
        ] {
            let after = reduce(Some(before.clone()), &event).unwrap();
            assert_eq!(after, before, "event '{}' changed state", event.kind());
        }
    }

    #[test]
    fn test_completion_without_test_is_an_error() {
        let err = reduce(None, &RunEvent::Pass { duration: 1 }).unwrap_err();
        assert_eq!(err, ReduceError::NoTestInFlight { event: "pass".to_string() });
        assert!(err.to_string().contains("before any 'test' event"));

        let err = reduce(Some(RunState::new()), &RunEvent::Pending { duration: None }).unwrap_err();
        assert!(matches!(err, ReduceError::NoTestInFlight { .. }));
    }

    #[test]
    fn test_suite_underflow_is_an_error() {
        let err = reduce(Some(RunState::new()), &suite_end()).unwrap_err();
        assert_eq!(err, ReduceError::SuiteUnderflow);
    }

    #[test]
    fn test_suite_end_title_must_match() {
        let state = replay(&[suite("outer"), suite("inner")]).unwrap();

        let err = reduce(
            Some(state.clone()),
            &RunEvent::SuiteEnd { title: Some("outer".to_string()) },
        )
        .unwrap_err();
        assert_eq!(
            err,
            ReduceError::SuiteMismatch {
                expected: "inner".to_string(),
                found: "outer".to_string(),
            }
        );

        let ok = reduce(
            Some(state),
            &RunEvent::SuiteEnd { title: Some("inner".to_string()) },
        )
        .unwrap();
        assert_eq!(ok.path, vec!["outer".to_string()]);
    }

    #[test]
    fn test_verdict_never_regresses_to_pending() {
        let state = replay(&[test("done"), RunEvent::Pass { duration: 3 }]).unwrap();
        let err = reduce(Some(state), &RunEvent::Pending { duration: None }).unwrap_err();
        assert!(matches!(
            err,
            ReduceError::PendingAfterVerdict { state: TestState::Pass, .. }
        ));
    }

    #[test]
    fn test_apply_event_reports_changes() {
        let mut state = RunState::new();

        assert!(apply_event(&mut state, &RunEvent::Start).unwrap());
        assert!(!apply_event(&mut state, &RunEvent::Start).unwrap());
        assert!(apply_event(&mut state, &test("t")).unwrap());
        assert!(!apply_event(&mut state, &RunEvent::Hook).unwrap());
        assert!(!apply_event(&mut state, &RunEvent::Pending { duration: None }).unwrap());
        assert!(apply_event(&mut state, &RunEvent::Pass { duration: 2 }).unwrap());
        assert!(!apply_event(&mut state, &RunEvent::Pass { duration: 2 }).unwrap());
        assert!(apply_event(&mut state, &RunEvent::Pass { duration: 3 }).unwrap());
    }

    #[test]
    fn test_apply_event_error_leaves_state_untouched() {
        let mut state = replay(&[suite("outer"), test("done"), RunEvent::Pass { duration: 1 }]).unwrap();
        let before = state.clone();

        let mismatch = RunEvent::SuiteEnd { title: Some("inner".to_string()) };
        assert!(apply_event(&mut state, &mismatch).is_err());
        assert!(apply_event(&mut state, &RunEvent::Pending { duration: None }).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let events = vec![
            RunEvent::Start,
            suite("spec.js"),
            suite("Math"),
            test("adds"),
            RunEvent::Pass { duration: 4 },
            test("divides"),
            RunEvent::Fail { duration: 7, error: TestError::new("boom") },
            suite_end(),
            suite_end(),
            RunEvent::End,
        ];

        assert_eq!(replay(&events).unwrap(), replay(&events).unwrap());
    }

    #[test]
    fn test_counts_match_event_counts() {
        let events = vec![
            suite("a"),
            test("1"),
            RunEvent::Pass { duration: 1 },
            suite("b"),
            test("2"),
            RunEvent::Pass { duration: 1 },
            test("3"),
            suite_end(),
        ];
        let state = replay(&events).unwrap();

        let test_events = events.iter().filter(|e| matches!(e, RunEvent::Test { .. })).count();
        assert_eq!(state.tests.len(), test_events);
        assert_eq!(state.path.len(), 1);
        assert!(state.tests[2].is_in_flight());
    }
}
