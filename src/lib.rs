//! runboard - live dashboard for test-runner event streams
//!
//! This library exposes the run state reducer, the view projector and the
//! store that connects a runner's event stream to render surfaces.
//!
//! # Example
//!
//! ```rust
//! use runboard::models::RunEvent;
//! use runboard::reducer::replay;
//! use runboard::view::{compute_stats, grep_href};
//!
//! let state = replay(&[
//!     RunEvent::Suite { title: "Math".to_string() },
//!     RunEvent::Test { title: "adds".to_string() },
//!     RunEvent::Pass { duration: 5 },
//!     RunEvent::SuiteEnd { title: None },
//! ])
//! .unwrap();
//!
//! assert_eq!(compute_stats(&state.tests).pass, 1);
//! assert_eq!(grep_href(&state.tests[0].path), "?grep=Math");
//! ```

pub mod config;
pub mod constants;
pub mod events;
pub mod models;
pub mod output;
pub mod reducer;
pub mod store;
pub mod view;

pub use models::{RunEvent, RunState, RunStatus, Stats, TestError, TestRecord, TestState, Visibility};
pub use reducer::{apply_event, reduce, replay, ReduceError};
pub use store::{RunStore, StateListener};
