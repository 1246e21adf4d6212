//! Live progress line for a running test run
//!
//! Redraws a single stderr line after every state change: a spinner frame,
//! the verdict counts and the innermost open suite.

use std::io::{self, Write};

use crate::models::{RunState, RunStatus, Stats};
use crate::view::compute_stats;

/// Characters for the spinning animation
const SPINNER_CHARS: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Progress indicator for a test run
pub struct RunProgress {
    current_suite: Option<String>,
    stats: Stats,
    total_tests: usize,
    frame: usize,
    last_width: usize,
    quiet_mode: bool,
    active: bool,
}

impl RunProgress {
    /// Create a new progress indicator
    pub fn new(quiet_mode: bool) -> Self {
        Self {
            current_suite: None,
            stats: Stats::default(),
            total_tests: 0,
            frame: 0,
            last_width: 0,
            quiet_mode,
            active: false,
        }
    }

    /// Take the counts and innermost suite from a new state and redraw
    pub fn update(&mut self, state: &RunState) {
        if self.quiet_mode {
            return;
        }

        self.stats = compute_stats(&state.tests);
        self.total_tests = state.tests.len();
        self.current_suite = state
            .path
            .iter()
            .rev()
            .find(|title| !title.is_empty())
            .cloned();
        self.frame = (self.frame + 1) % SPINNER_CHARS.len();
        self.active = state.status != RunStatus::Ended;

        let line = self.status_line();
        self.draw(&line);
    }

    /// The text of the progress line without the spinner
    pub fn status_line(&self) -> String {
        let suite_info = match self.current_suite {
            Some(ref suite) => format!(" [{}]", suite),
            None => String::new(),
        };

        format!(
            "{} tests (pass: {}, fail: {}, pending: {}){}",
            self.total_tests, self.stats.pass, self.stats.fail, self.stats.pending, suite_info
        )
    }

    /// Replace the progress line with a completion line
    pub fn complete(&mut self, interrupted: bool) {
        if self.quiet_mode {
            return;
        }

        let (mark, outcome) = if interrupted {
            ('!', "interrupted")
        } else if self.stats.fail > 0 {
            ('✗', "completed with failures")
        } else {
            ('✓', "completed")
        };

        self.clear_line();
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "{} {} - {}", mark, self.status_line(), outcome);
        stderr.flush().unwrap_or(());
        self.active = false;
    }

    fn draw(&mut self, line: &str) {
        let spinner = SPINNER_CHARS[self.frame];
        let text = format!("{} {}", spinner, line);
        let width = text.chars().count();

        // Pad with spaces so a shorter line fully covers the previous one
        let padding = self.last_width.saturating_sub(width);
        let mut stderr = io::stderr();
        let _ = write!(stderr, "\r{}{}", text, " ".repeat(padding));
        stderr.flush().unwrap_or(());
        self.last_width = width;
    }

    fn clear_line(&mut self) {
        if self.last_width > 0 {
            let mut stderr = io::stderr();
            let _ = write!(stderr, "\r{}\r", " ".repeat(self.last_width));
            stderr.flush().unwrap_or(());
            self.last_width = 0;
        }
    }
}

impl Drop for RunProgress {
    fn drop(&mut self) {
        // Leave the terminal on a clean line if the run never completed
        if self.active && !self.quiet_mode {
            self.clear_line();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunEvent, TestState};
    use crate::reducer::replay;

    #[test]
    fn test_progress_creation() {
        let progress = RunProgress::new(true);
        assert!(progress.current_suite.is_none());
        assert_eq!(progress.status_line(), "0 tests (pass: 0, fail: 0, pending: 0)");
    }

    #[test]
    fn test_progress_tracks_innermost_suite() {
        let state = replay(&[
            RunEvent::Start,
            RunEvent::Suite { title: "".to_string() },
            RunEvent::Suite { title: "Math".to_string() },
            RunEvent::Test { title: "adds".to_string() },
            RunEvent::Pass { duration: 1 },
            RunEvent::Test { title: "subtracts".to_string() },
        ])
        .unwrap();

        let mut progress = RunProgress::new(false);
        progress.update(&state);

        assert_eq!(progress.current_suite.as_deref(), Some("Math"));
        assert_eq!(progress.stats.pass, 1);
        assert_eq!(progress.stats.pending, 1);
        assert_eq!(
            progress.status_line(),
            "2 tests (pass: 1, fail: 0, pending: 1) [Math]"
        );
        assert!(progress.active);

        progress.complete(false);
        assert!(!progress.active);
        assert_eq!(state.tests[1].state, TestState::Pending);
    }

    #[test]
    fn test_quiet_progress_ignores_updates() {
        let state = replay(&[RunEvent::Test { title: "t".to_string() }]).unwrap();
        let mut progress = RunProgress::new(true);
        progress.update(&state);
        assert_eq!(progress.total_tests, 0);
    }
}
