//! Per-participant session lifecycle
//!
//! This module tracks the state of each participant while they are part
//! of the meeting:
//! - `Session`: one participant's state machine (active, idle-paused, absent)
//! - `SessionRegistry`: all live sessions, with batch pause/resume for
//!   the all-or-nothing idle policy

mod registry;
mod state;

pub use registry::SessionRegistry;
pub use state::{Session, SessionState};
