//! Practice session state machine
//!
//! This module provides the `SessionController` that drives one attempt:
//! - Instruction → Capturing → Review → Submitting → Result, plus Locked
//! - Evaluation slot creation and scoring submission
//! - The per-second countdown with automatic stop at the time limit
//! - Capture resource ownership (released exactly once per acquisition)
//! - Read-only snapshots for the UI

mod config;
mod controller;
mod countdown;
mod error;
mod phase;
mod preview;
mod snapshot;

pub use config::{Clock, SessionConfig};
pub use controller::SessionController;
pub use countdown::Countdown;
pub use error::{ErrorKind, SessionError};
pub use phase::Phase;
pub use preview::PreviewFile;
pub use snapshot::SessionSnapshot;
