//! Protocol record types
//!
//! The ordered, immutable events that make up one meeting's protocol,
//! and the statistics accumulated from them.

mod event;
mod stats;

pub use event::{word_count, LifecycleKind, ProtocolEvent};
pub use stats::{
    ParticipantReport, ParticipantStats, ProtocolReport, ProtocolStats, UnknownParticipant,
};
