use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::state::{Session, SessionState};

/// Registry of live sessions, keyed by participant identity.
///
/// At most one session per identity is live at a time. Leaving removes
/// the session; a rejoin creates a fresh one. The batch pause/resume
/// operations exist so the idle policy is all-or-nothing: a single
/// transition over the whole registry, never per-session timers.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a joining participant. Returns `false` on a duplicate
    /// join for an identity that is already present.
    pub fn join(&mut self, identity: &str, name: &str, timestamp: DateTime<Utc>) -> bool {
        if self.sessions.contains_key(identity) {
            return false;
        }
        self.sessions
            .insert(identity.to_string(), Session::join(identity, name, timestamp));
        true
    }

    /// Remove a leaving participant and return the finished session.
    /// Returns `None` on a leave for an identity that is not present.
    pub fn leave(&mut self, identity: &str, timestamp: DateTime<Utc>) -> Option<Session> {
        let mut session = self.sessions.remove(identity)?;
        session.leave(timestamp);
        Some(session)
    }

    /// Record recognized speech for a participant. Returns `false` if
    /// the identity has no live session.
    pub fn mark_speech(&mut self, identity: &str, timestamp: DateTime<Utc>) -> bool {
        match self.sessions.get_mut(identity) {
            Some(session) => {
                session.mark_speech(timestamp);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.sessions.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<&Session> {
        self.sessions.get(identity)
    }

    /// Pause every active session as one batch. Returns the affected
    /// identities in sorted order (for deterministic event output).
    pub fn pause_all(&mut self) -> Vec<String> {
        let mut paused: Vec<String> = self
            .sessions
            .values_mut()
            .filter_map(|s| s.pause().then(|| s.identity.clone()))
            .collect();
        paused.sort();
        paused
    }

    /// Resume every paused session as one batch. Returns the affected
    /// identities in sorted order.
    pub fn resume_all(&mut self) -> Vec<String> {
        let mut resumed: Vec<String> = self
            .sessions
            .values_mut()
            .filter_map(|s| s.resume().then(|| s.identity.clone()))
            .collect();
        resumed.sort();
        resumed
    }

    pub fn any_paused(&self) -> bool {
        self.sessions
            .values()
            .any(|s| s.state == SessionState::IdlePaused)
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::Active)
            .count()
    }

    /// Most recent activity (speech, or join if no speech yet) across
    /// all active sessions. `None` when no session is active.
    pub fn latest_activity(&self) -> Option<DateTime<Utc>> {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::Active)
            .map(|s| s.last_activity())
            .max()
    }

    /// Remove every remaining session, marking each as left at the
    /// given time. Used for synthetic leaves at shutdown. Returned in
    /// sorted identity order.
    pub fn drain_present(&mut self, timestamp: DateTime<Utc>) -> Vec<Session> {
        let mut drained: Vec<Session> = self
            .sessions
            .drain()
            .map(|(_, mut session)| {
                session.leave(timestamp);
                session
            })
            .collect();
        drained.sort_by(|a, b| a.identity.cmp(&b.identity));
        drained
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
