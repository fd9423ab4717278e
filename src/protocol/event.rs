use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a participant lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleKind {
    Joined,
    Left,
    /// Transcription suspended after the global idle timeout
    Paused,
    /// Transcription reactivated by new speech
    Resumed,
}

impl LifecycleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleKind::Joined => "joined",
            LifecycleKind::Left => "left",
            LifecycleKind::Paused => "paused",
            LifecycleKind::Resumed => "resumed",
        }
    }
}

/// One immutable record in the protocol's ordered event sequence.
///
/// Events are created once, at the serialization point, and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    /// A completed, recognized speech turn
    Utterance {
        timestamp: DateTime<Utc>,
        identity: String,
        name: String,
        text: String,
        word_count: usize,
        char_count: usize,
    },
    /// A participant lifecycle change
    Lifecycle {
        timestamp: DateTime<Utc>,
        identity: String,
        name: String,
        kind: LifecycleKind,
    },
}

impl ProtocolEvent {
    /// Build an utterance event, deriving word and character counts
    pub fn utterance(
        timestamp: DateTime<Utc>,
        identity: impl Into<String>,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        Self::Utterance {
            timestamp,
            identity: identity.into(),
            name: name.into(),
            word_count: word_count(&text),
            char_count: text.chars().count(),
            text,
        }
    }

    pub fn lifecycle(
        timestamp: DateTime<Utc>,
        identity: impl Into<String>,
        name: impl Into<String>,
        kind: LifecycleKind,
    ) -> Self {
        Self::Lifecycle {
            timestamp,
            identity: identity.into(),
            name: name.into(),
            kind,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ProtocolEvent::Utterance { timestamp, .. } => *timestamp,
            ProtocolEvent::Lifecycle { timestamp, .. } => *timestamp,
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            ProtocolEvent::Utterance { identity, .. } => identity,
            ProtocolEvent::Lifecycle { identity, .. } => identity,
        }
    }
}

/// Word count by whitespace tokenization
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
