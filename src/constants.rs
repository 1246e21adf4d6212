//! Global constants for runboard
//!
//! Centralized location for event names and application-wide defaults

/// Application name used for the config directory and CLI
pub const APP_NAME: &str = "runboard";

/// Config file name inside the per-user config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

// Lifecycle event names as emitted by the test runner
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_SUITE: &str = "suite";
pub const EVENT_SUITE_END: &str = "suite end";
pub const EVENT_TEST: &str = "test";
pub const EVENT_TEST_END: &str = "test end";
pub const EVENT_HOOK: &str = "hook";
pub const EVENT_HOOK_END: &str = "hook end";
pub const EVENT_PASS: &str = "pass";
pub const EVENT_FAIL: &str = "fail";
pub const EVENT_PENDING: &str = "pending";

/// Every event name the runner emits, in lifecycle order
pub const RUNNER_EVENTS: &[&str] = &[
    EVENT_START,
    EVENT_END,
    EVENT_SUITE,
    EVENT_SUITE_END,
    EVENT_TEST,
    EVENT_TEST_END,
    EVENT_HOOK,
    EVENT_HOOK_END,
    EVENT_PASS,
    EVENT_FAIL,
    EVENT_PENDING,
];

/// Separator between nested suite titles in a display name
pub const DEFAULT_TITLE_SEPARATOR: &str = " - ";

/// Query parameter used by grep hrefs to re-run a single suite
pub const GREP_QUERY_PARAM: &str = "grep";

/// Exit status when at least one test failed
pub const EXIT_TESTS_FAILED: i32 = 1;

/// Exit status for protocol violations, malformed input and bad config
pub const EXIT_USAGE_ERROR: i32 = 2;
