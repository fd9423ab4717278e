//! Serialized protocol output
//!
//! One logical writer commits every event, in arrival order, to all
//! configured sinks: a plain-text transcript and a newline-delimited
//! JSON event log, plus a statistics document at finalization.

mod sink;
mod writer;

pub use sink::{EventLogSink, ProtocolSink, TranscriptSink};
pub use writer::ProtocolWriter;
