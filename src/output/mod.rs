//! Output formatting module
//!
//! Render surfaces subscribed to the run store:
//! - Human-readable dashboard: suite cards with per-test verdicts
//! - JSON view snapshots, one object per line
//! - Live progress line on stderr while events stream in

use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::config::EmitMode;
use crate::models::{RunState, TestRecord, TestState};
use crate::store::StateListener;
use crate::view::{project, DashboardView, ProjectionOptions};

pub mod progress;

use progress::RunProgress;

/// Glyph shown in front of a test title
pub fn state_glyph(state: TestState) -> char {
    match state {
        TestState::Pass => '✓',
        TestState::Fail => '✗',
        TestState::Pending => '…',
        TestState::Skip => '-',
    }
}

/// Format one test line, with the failure stack indented beneath it
pub fn format_test_human(test: &TestRecord) -> String {
    let mut line = format!("  {} {}", state_glyph(test.state), test.title);
    if let Some(duration) = test.duration {
        line.push_str(&format!(" ({} ms)", duration));
    }

    if let (TestState::Fail, Some(error)) = (test.state, test.error.as_ref()) {
        for stack_line in error.stack.lines() {
            line.push_str("\n      ");
            line.push_str(stack_line);
        }
    }
    line
}

/// Format a whole dashboard frame as human-readable text
pub fn format_human(view: &DashboardView<'_>) -> Result<String> {
    let mut out = String::new();

    // Stats first, as compact JSON
    out.push_str(&serde_json::to_string(&view.stats)?);
    out.push_str("\n\n");

    if view.suites.is_empty() {
        out.push_str("No tests to show.\n");
    }

    for suite in &view.suites {
        let title = if suite.title.is_empty() {
            "(root)"
        } else {
            suite.title.as_str()
        };
        out.push_str(title);
        out.push('\n');
        if let Some(ref file) = suite.file {
            out.push_str(&format!("  {}\n", file));
        }
        out.push_str(&format!("  {}\n", suite.href));

        for test in &suite.tests {
            out.push_str(&format_test_human(test));
            out.push('\n');
        }
        out.push('\n');
    }

    Ok(out)
}

/// Format the closing summary block
pub fn format_summary(view: &DashboardView<'_>, interrupted: bool) -> String {
    let mut out = String::from("Run Summary:\n");
    out.push_str(&format!("  Status: {}\n", view.status));
    out.push_str(&format!("  Tests: {}\n", view.total));
    out.push_str(&format!("  Passed: {}\n", view.stats.pass));
    out.push_str(&format!("  Failed: {}\n", view.stats.fail));
    out.push_str(&format!("  Pending: {}\n", view.stats.pending));

    let skipped = view.total - view.stats.counted();
    if skipped > 0 {
        out.push_str(&format!("  Skipped: {}\n", skipped));
    }
    if interrupted {
        out.push_str("  Interrupted by user\n");
    }
    out
}

/// Terminal dashboard: live progress while running, full cards at the end
pub struct HumanRenderer<W: Write> {
    out: W,
    options: ProjectionOptions,
    progress: Option<RunProgress>,
}

impl<W: Write> HumanRenderer<W> {
    /// `show_progress` draws the live line on stderr
    pub fn new(out: W, options: ProjectionOptions, show_progress: bool) -> Self {
        Self {
            out,
            options,
            progress: show_progress.then(|| RunProgress::new(false)),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StateListener for HumanRenderer<W> {
    fn state_changed(&mut self, state: &RunState) -> Result<()> {
        if let Some(ref mut progress) = self.progress {
            progress.update(state);
        }
        Ok(())
    }

    fn run_finished(&mut self, state: &RunState, interrupted: bool) -> Result<()> {
        if let Some(ref mut progress) = self.progress {
            progress.complete(interrupted);
        }

        let view = project(state, &self.options);
        write!(self.out, "{}", format_human(&view)?)?;
        write!(self.out, "{}", format_summary(&view, interrupted))?;
        self.out.flush()?;
        Ok(())
    }
}

/// One line of JSON output
#[derive(Serialize)]
struct JsonSnapshot<'a> {
    timestamp: String,
    #[serde(rename = "final")]
    is_final: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    interrupted: bool,
    #[serde(flatten)]
    view: DashboardView<'a>,
}

/// Format a view as a single JSON line
pub fn format_json(view: DashboardView<'_>, is_final: bool, interrupted: bool) -> Result<String> {
    let snapshot = JsonSnapshot {
        timestamp: chrono::Utc::now().to_rfc3339(),
        is_final,
        interrupted,
        view,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

/// Machine-readable surface: JSON view snapshots, one per line
pub struct JsonRenderer<W: Write> {
    out: W,
    options: ProjectionOptions,
    emit: EmitMode,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W, options: ProjectionOptions, emit: EmitMode) -> Self {
        Self { out, options, emit }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StateListener for JsonRenderer<W> {
    fn state_changed(&mut self, state: &RunState) -> Result<()> {
        if self.emit == EmitMode::Every {
            let line = format_json(project(state, &self.options), false, false)?;
            writeln!(self.out, "{}", line)?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn run_finished(&mut self, state: &RunState, interrupted: bool) -> Result<()> {
        let line = format_json(project(state, &self.options), true, interrupted)?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}
