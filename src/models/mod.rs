//! Data models module
//!
//! Defines core data structures:
//! - RunState: Accumulated state of one test run (suite stack, records, status)
//! - TestRecord: One executed test and its verdict
//! - RunEvent: Typed lifecycle event decoded from the runner's stream
//! - Stats: Aggregated pass/fail/pending counts
//! - Visibility: Set of test states a render surface should show

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    EVENT_END, EVENT_FAIL, EVENT_HOOK, EVENT_HOOK_END, EVENT_PASS, EVENT_PENDING, EVENT_START,
    EVENT_SUITE, EVENT_SUITE_END, EVENT_TEST, EVENT_TEST_END,
};

/// Verdict of a single test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestState {
    Pending,
    Pass,
    Fail,
    Skip,
}

impl TestState {
    /// All states, in display order
    pub const ALL: [TestState; 4] = [
        TestState::Pass,
        TestState::Fail,
        TestState::Pending,
        TestState::Skip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestState::Pending => "pending",
            TestState::Pass => "pass",
            TestState::Fail => "fail",
            TestState::Skip => "skip",
        }
    }

    /// Whether the test has received a pass/fail verdict
    pub fn is_verdict(&self) -> bool {
        matches!(self, TestState::Pass | TestState::Fail)
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a state name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown test state '{0}'. Expected one of: pass, fail, pending, skip")]
pub struct ParseStateError(pub String);

impl FromStr for TestState {
    type Err = ParseStateError;

    /// Accepts both the state words and the toggle labels ("passed", "skipped", ...)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" | "passed" | "passing" => Ok(TestState::Pass),
            "fail" | "failed" | "failing" => Ok(TestState::Fail),
            "pending" => Ok(TestState::Pending),
            "skip" | "skipped" => Ok(TestState::Skip),
            _ => Err(ParseStateError(s.to_string())),
        }
    }
}

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    #[default]
    NotStarted,
    Started,
    Ended,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::NotStarted => "not-started",
            RunStatus::Started => "started",
            RunStatus::Ended => "ended",
        })
    }
}

/// Failure payload attached to a failed test.
///
/// `stack` is kept verbatim; fields the runner sends beyond `stack` and
/// `message` are carried in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestError {
    pub stack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TestError {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            message: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// One executed test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Suite titles enclosing the test when it began, outermost first
    pub path: Vec<String>,
    /// Test name
    pub title: String,
    /// Current verdict
    pub state: TestState,
    /// Duration in milliseconds, set on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Failure payload, set only when `state` is `fail`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
}

impl TestRecord {
    /// Create an in-flight record
    pub fn started(path: Vec<String>, title: impl Into<String>) -> Self {
        Self {
            path,
            title: title.into(),
            state: TestState::Pending,
            duration: None,
            error: None,
        }
    }

    /// In flight means pending and not yet timed
    pub fn is_in_flight(&self) -> bool {
        self.state == TestState::Pending && self.duration.is_none()
    }
}

/// Accumulated state of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Stack of currently open suites, outermost first
    pub path: Vec<String>,
    /// Records in execution order; append-only
    pub tests: Vec<TestRecord>,
    pub status: RunStatus,
}

impl RunState {
    /// Empty state for a run that has not started
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently started record, if any
    pub fn current_test(&self) -> Option<&TestRecord> {
        self.tests.last()
    }
}

/// A lifecycle event from the test runner, decoded into its typed form
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Start,
    End,
    Suite { title: String },
    SuiteEnd { title: Option<String> },
    Test { title: String },
    TestEnd,
    Hook,
    HookEnd,
    Pass { duration: u64 },
    Fail { duration: u64, error: TestError },
    Pending { duration: Option<u64> },
    /// An event type this version does not understand
    Unknown { kind: String },
}

impl RunEvent {
    /// Wire name of the event
    pub fn kind(&self) -> &str {
        match self {
            RunEvent::Start => EVENT_START,
            RunEvent::End => EVENT_END,
            RunEvent::Suite { .. } => EVENT_SUITE,
            RunEvent::SuiteEnd { .. } => EVENT_SUITE_END,
            RunEvent::Test { .. } => EVENT_TEST,
            RunEvent::TestEnd => EVENT_TEST_END,
            RunEvent::Hook => EVENT_HOOK,
            RunEvent::HookEnd => EVENT_HOOK_END,
            RunEvent::Pass { .. } => EVENT_PASS,
            RunEvent::Fail { .. } => EVENT_FAIL,
            RunEvent::Pending { .. } => EVENT_PENDING,
            RunEvent::Unknown { kind } => kind.as_str(),
        }
    }
}

/// Aggregated counts by verdict. Skipped tests are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub pass: usize,
    pub fail: usize,
    pub pending: usize,
}

impl Stats {
    pub fn counted(&self) -> usize {
        self.pass + self.fail + self.pending
    }
}

/// Set of states a render surface shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Visibility(BTreeSet<TestState>);

impl Visibility {
    /// Show every state
    pub fn all() -> Self {
        Self(TestState::ALL.into_iter().collect())
    }

    /// Show nothing
    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, state: TestState) -> bool {
        self.0.contains(&state)
    }

    pub fn show(&mut self, state: TestState) {
        self.0.insert(state);
    }

    pub fn hide(&mut self, state: TestState) {
        self.0.remove(&state);
    }

    /// Set one toggle on or off
    pub fn toggle(&mut self, state: TestState, visible: bool) {
        if visible {
            self.show(state);
        } else {
            self.hide(state);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TestState> + '_ {
        self.0.iter().copied()
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<TestState> for Visibility {
    fn from_iter<I: IntoIterator<Item = TestState>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
