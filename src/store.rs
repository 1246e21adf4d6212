//! Run store
//!
//! The single mutable cell holding the current [`RunState`]. The store owns
//! nothing global: the caller creates it, feeds it events, and subscribes
//! render surfaces that are notified after every state change.

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::events::EventStream;
use crate::models::{RunEvent, RunState, RunStatus};
use crate::reducer::{apply_event, ReduceError};
use crate::view::compute_stats;

/// Render surface notification interface
pub trait StateListener {
    /// Called after each event that changed the state
    fn state_changed(&mut self, state: &RunState) -> Result<()>;

    /// Called once when the event stream is exhausted or interrupted
    fn run_finished(&mut self, _state: &RunState, _interrupted: bool) -> Result<()> {
        Ok(())
    }
}

/// Holds the state of the current run and fans out changes
#[derive(Default)]
pub struct RunStore {
    state: RunState,
    listeners: Vec<Box<dyn StateListener>>,
    events_applied: usize,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a render surface
    pub fn subscribe(&mut self, listener: Box<dyn StateListener>) {
        self.listeners.push(listener);
    }

    /// Read-only view of the current state
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Number of events applied since the current run began
    pub fn events_applied(&self) -> usize {
        self.events_applied
    }

    /// Reduce one event into the state without notifying listeners.
    ///
    /// Returns whether the state changed. On a protocol violation the
    /// previous state is kept.
    pub fn apply(&mut self, event: &RunEvent) -> Result<bool, ReduceError> {
        let changed = apply_event(&mut self.state, event)?;
        self.events_applied += 1;

        match event {
            RunEvent::Start => info!("Run started"),
            RunEvent::End => info!("Run ended after {} tests", self.state.tests.len()),
            RunEvent::Unknown { kind } => debug!("Ignoring unknown event '{}'", kind),
            _ => debug!("Applied '{}' event", event.kind()),
        }

        Ok(changed)
    }

    /// Reduce one event and notify listeners if the state changed
    pub fn dispatch(&mut self, event: &RunEvent) -> Result<()> {
        if self.apply(event)? {
            self.notify()?;
        }
        Ok(())
    }

    /// Discard the current run and start over from an empty state
    pub fn begin_run(&mut self) -> Result<()> {
        self.state = RunState::new();
        self.events_applied = 0;
        self.notify()
    }

    /// Tell every listener the stream is over
    pub fn finish(&mut self, interrupted: bool) -> Result<()> {
        for listener in &mut self.listeners {
            listener
                .run_finished(&self.state, interrupted)
                .context("Failed to render final run summary")?;
        }
        Ok(())
    }

    fn notify(&mut self) -> Result<()> {
        for listener in &mut self.listeners {
            listener
                .state_changed(&self.state)
                .context("Failed to render state change")?;
        }
        Ok(())
    }
}

/// Result of pumping a whole stream through the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Runs seen in the stream, including the one still held by the store
    pub runs: usize,
    /// Failed tests across all runs
    pub failures: usize,
    /// Whether the interrupt flag stopped the pump early
    pub interrupted: bool,
}

/// Feed every event of `stream` into `store`, one at a time.
///
/// A `start` event arriving after the current run ended closes that run
/// (listeners get `run_finished`) and begins a fresh one. The interrupt flag
/// is checked once the next line has been read, so an interrupt during a
/// blocking read takes effect when that line arrives; that line is
/// discarded. Decode errors and protocol violations stop the
/// pump immediately. The last run is left for the caller to finish.
pub fn drive<R: BufRead>(
    store: &mut RunStore,
    stream: &mut EventStream<R>,
    interrupted: &AtomicBool,
) -> Result<StreamOutcome> {
    let mut outcome = StreamOutcome {
        runs: 1,
        ..StreamOutcome::default()
    };

    while let Some(item) = stream.next() {
        if interrupted.load(Ordering::Relaxed) {
            warn!("Interrupted; discarding the event at line {}", stream.line());
            outcome.interrupted = true;
            break;
        }

        let event = item.context("Failed to decode event stream")?;

        if event == RunEvent::Start && store.state().status == RunStatus::Ended {
            outcome.failures += compute_stats(&store.state().tests).fail;
            store.finish(false)?;
            store.begin_run()?;
            outcome.runs += 1;
            info!("Starting run {}", outcome.runs);
        }

        if let Err(err) = store.dispatch(&event) {
            error!("Protocol violation at line {}: {:#}", stream.line(), err);
            return Err(err.context(format!("Protocol violation at line {}", stream.line())));
        }
    }

    outcome.failures += compute_stats(&store.state().tests).fail;
    Ok(outcome)
}
