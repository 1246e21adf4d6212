//! View projector
//!
//! Pure derivations over an immutable [`RunState`] snapshot: verdict counts,
//! visibility filtering, grouping by suite path, suite display names and grep
//! links. Everything here is recomputed from scratch on every state change.

use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::constants::{DEFAULT_TITLE_SEPARATOR, GREP_QUERY_PARAM};
use crate::models::{RunState, RunStatus, Stats, TestRecord, TestState, Visibility};

/// Characters that carry meaning in a regular expression
const REGEX_METACHARACTERS: &[char] = &[
    '-', '/', '\\', '^', '$', '*', '+', '?', '.', '(', ')', '|', '[', ']', '{', '}',
];

/// Bytes a URI component leaves unescaped besides ASCII alphanumerics
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Count records by verdict. Skipped records are not counted.
pub fn compute_stats<'a, I>(tests: I) -> Stats
where
    I: IntoIterator<Item = &'a TestRecord>,
{
    tests.into_iter().fold(Stats::default(), |mut stats, test| {
        match test.state {
            TestState::Pass => stats.pass += 1,
            TestState::Fail => stats.fail += 1,
            TestState::Pending => stats.pending += 1,
            TestState::Skip => {}
        }
        stats
    })
}

/// Keep only records whose state is visible
pub fn filter_by_visibility<'a, I>(tests: I, visible: &Visibility) -> Vec<&'a TestRecord>
where
    I: IntoIterator<Item = &'a TestRecord>,
{
    tests
        .into_iter()
        .filter(|test| visible.contains(test.state))
        .collect()
}

/// Partition records by their suite path.
///
/// Paths appear in the order they were first seen; records keep their
/// execution order within each group.
pub fn group_by_suite_path<'a, I>(tests: I) -> IndexMap<&'a [String], Vec<&'a TestRecord>>
where
    I: IntoIterator<Item = &'a TestRecord>,
{
    let mut groups: IndexMap<&'a [String], Vec<&'a TestRecord>> = IndexMap::new();
    for test in tests {
        groups.entry(test.path.as_slice()).or_default().push(test);
    }
    groups
}

/// Human readable name of a suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteName {
    /// Originating file, the first non-empty path segment
    pub file: Option<String>,
    /// Remaining segments joined with the separator
    pub title: String,
}

/// Display name using the default `" - "` separator
pub fn suite_display_name(path: &[String]) -> SuiteName {
    suite_display_name_with(path, DEFAULT_TITLE_SEPARATOR)
}

/// Display name with a custom separator between nested titles
pub fn suite_display_name_with(path: &[String], separator: &str) -> SuiteName {
    let mut fragments = non_empty_segments(path);
    let file = fragments.next().map(str::to_string);
    let title = fragments.collect::<Vec<_>>().join(separator);
    SuiteName { file, title }
}

/// Prefix every regular expression metacharacter with a backslash
pub fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if REGEX_METACHARACTERS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Relative link that re-runs only the tests under `path`
pub fn grep_href(path: &[String]) -> String {
    grep_href_with_base("", path)
}

/// Link that re-runs only the tests under `path`, prefixed with `base`
pub fn grep_href_with_base(base: &str, path: &[String]) -> String {
    let pattern = escape_regex(&non_empty_segments(path).collect::<Vec<_>>().join(" "));
    let encoded = utf8_percent_encode(&pattern, URI_COMPONENT);

    let joiner = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", base, joiner, GREP_QUERY_PARAM, encoded)
}

fn non_empty_segments(path: &[String]) -> impl Iterator<Item = &str> {
    path.iter().map(String::as_str).filter(|segment| !segment.is_empty())
}

/// Knobs the render surface controls
#[derive(Debug, Clone)]
pub struct ProjectionOptions {
    pub visibility: Visibility,
    pub separator: String,
    pub base_url: String,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            visibility: Visibility::all(),
            separator: DEFAULT_TITLE_SEPARATOR.to_string(),
            base_url: String::new(),
        }
    }
}

/// One suite card: its name, grep link and visible records
#[derive(Debug, Clone, Serialize)]
pub struct SuiteView<'a> {
    pub path: &'a [String],
    pub file: Option<String>,
    pub title: String,
    pub href: String,
    pub tests: Vec<&'a TestRecord>,
}

/// Everything a render surface needs to draw one frame
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView<'a> {
    pub status: RunStatus,
    /// Number of records, visible or not
    pub total: usize,
    /// Counts over all records, ignoring visibility
    pub stats: Stats,
    pub suites: Vec<SuiteView<'a>>,
}

/// Derive the full view model for one state snapshot
pub fn project<'a>(state: &'a RunState, options: &ProjectionOptions) -> DashboardView<'a> {
    let visible = filter_by_visibility(&state.tests, &options.visibility);

    let suites = group_by_suite_path(visible)
        .into_iter()
        .map(|(path, tests)| {
            let name = suite_display_name_with(path, &options.separator);
            SuiteView {
                path,
                file: name.file,
                title: name.title,
                href: grep_href_with_base(&options.base_url, path),
                tests,
            }
        })
        .collect();

    DashboardView {
        status: state.status,
        total: state.tests.len(),
        stats: compute_stats(&state.tests),
        suites,
    }
}
