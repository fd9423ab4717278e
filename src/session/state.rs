use chrono::{DateTime, Utc};

/// Lifecycle state of a participant's transcription session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Participant is not present (initial and terminal state)
    Absent,
    /// Participant is present and within the idle window
    Active,
    /// Participant is present but transcription is suspended after a
    /// global idle timeout
    IdlePaused,
}

/// Per-participant session tracked while that participant is part of
/// the meeting.
///
/// A session is created on join and never reused after a leave; a
/// rejoining identity gets a fresh session with a new join timestamp.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable participant identity
    pub identity: String,
    /// Display name used for transcript rendering
    pub name: String,
    /// Current lifecycle state
    pub state: SessionState,
    /// When the participant joined
    pub joined_at: DateTime<Utc>,
    /// When the participant last produced recognized speech
    pub last_speech_at: Option<DateTime<Utc>>,
    /// When the participant left, set once on leave
    pub left_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session for a participant that just joined
    pub fn join(
        identity: impl Into<String>,
        name: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            identity: identity.into(),
            name: name.into(),
            state: SessionState::Active,
            joined_at: timestamp,
            last_speech_at: None,
            left_at: None,
        }
    }

    /// Record recognized speech, refreshing the activity timestamp.
    ///
    /// Returns `true` when this speech reactivated a paused session.
    pub fn mark_speech(&mut self, timestamp: DateTime<Utc>) -> bool {
        let resumed = self.state == SessionState::IdlePaused;
        self.last_speech_at = Some(timestamp);
        if self.state != SessionState::Absent {
            self.state = SessionState::Active;
        }
        resumed
    }

    /// Suspend transcription for this session. Returns `false` if the
    /// session was not active.
    pub fn pause(&mut self) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.state = SessionState::IdlePaused;
        true
    }

    /// Reactivate a paused session. Returns `false` if the session was
    /// not paused.
    pub fn resume(&mut self) -> bool {
        if self.state != SessionState::IdlePaused {
            return false;
        }
        self.state = SessionState::Active;
        true
    }

    /// Mark the participant as left. Returns `false` on a duplicate
    /// leave (already absent).
    pub fn leave(&mut self, timestamp: DateTime<Utc>) -> bool {
        if self.state == SessionState::Absent {
            return false;
        }
        self.state = SessionState::Absent;
        self.left_at = Some(timestamp);
        true
    }

    /// Last speech timestamp, or the join timestamp if the participant
    /// has not spoken yet
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_speech_at.unwrap_or(self.joined_at)
    }

    /// Whether the participant is still part of the meeting
    pub fn is_present(&self) -> bool {
        self.state != SessionState::Absent
    }
}
