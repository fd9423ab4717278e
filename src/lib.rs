pub mod config;
pub mod coordinator;
pub mod idle;
pub mod ingest;
pub mod protocol;
pub mod session;
pub mod writer;

pub use config::{OutputFormat, ProtocolConfig};
pub use coordinator::{Phase, ProtocolCoordinator};
pub use ingest::RoomEvent;
pub use protocol::{
    LifecycleKind, ParticipantReport, ParticipantStats, ProtocolEvent, ProtocolReport,
    ProtocolStats, UnknownParticipant,
};
pub use session::{Session, SessionRegistry, SessionState};
pub use writer::{EventLogSink, ProtocolSink, ProtocolWriter, TranscriptSink};
