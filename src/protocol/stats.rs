use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use super::event::word_count;

/// Utterance recorded for an identity with no statistics entry.
///
/// Recoverable: callers synthesize a late join record rather than
/// dropping the utterance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no statistics entry for participant '{0}'")]
pub struct UnknownParticipant(pub String);

/// Accumulated statistics for a single participant
#[derive(Debug, Clone)]
pub struct ParticipantStats {
    pub identity: String,
    pub name: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub word_count: u64,
    pub turn_count: u64,
    pub characters: u64,
}

impl ParticipantStats {
    /// Average words per turn, rounded to one decimal, 0 when the
    /// participant has no turns
    pub fn avg_words_per_turn(&self) -> f64 {
        if self.turn_count == 0 {
            return 0.0;
        }
        (self.word_count as f64 / self.turn_count as f64 * 10.0).round() / 10.0
    }
}

/// Statistics for the entire meeting, keyed by participant identity.
///
/// Counts accumulate under the identity key across rejoins; only the
/// join/leave markers reset.
#[derive(Debug, Clone)]
pub struct ProtocolStats {
    room_name: String,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    participants: HashMap<String, ParticipantStats>,
    total_turns: u64,
    total_words: u64,
}

impl ProtocolStats {
    pub fn new(room_name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            room_name: room_name.into(),
            started_at,
            ended_at: None,
            participants: HashMap::new(),
            total_turns: 0,
            total_words: 0,
        }
    }

    /// Create or re-open the entry for a joining participant. A rejoin
    /// keeps accumulated counts but gets a fresh join timestamp.
    pub fn record_join(&mut self, identity: &str, name: &str, timestamp: DateTime<Utc>) {
        match self.participants.get_mut(identity) {
            Some(entry) => {
                entry.name = name.to_string();
                entry.joined_at = timestamp;
                entry.left_at = None;
            }
            None => {
                self.participants.insert(
                    identity.to_string(),
                    ParticipantStats {
                        identity: identity.to_string(),
                        name: name.to_string(),
                        joined_at: timestamp,
                        left_at: None,
                        word_count: 0,
                        turn_count: 0,
                        characters: 0,
                    },
                );
            }
        }
    }

    /// Set the leave timestamp on an open entry. No-op if the identity
    /// has no entry.
    pub fn record_leave(&mut self, identity: &str, timestamp: DateTime<Utc>) {
        if let Some(entry) = self.participants.get_mut(identity) {
            entry.left_at = Some(timestamp);
        }
    }

    /// Count a completed speech turn for an identity. Fails when no
    /// entry exists; the caller must have recorded a join first.
    pub fn record_utterance(&mut self, identity: &str, text: &str) -> Result<(), UnknownParticipant> {
        let entry = self
            .participants
            .get_mut(identity)
            .ok_or_else(|| UnknownParticipant(identity.to_string()))?;

        let words = word_count(text) as u64;
        entry.word_count += words;
        entry.turn_count += 1;
        entry.characters += text.chars().count() as u64;

        self.total_turns += 1;
        self.total_words += words;

        Ok(())
    }

    /// Set the end timestamp, once
    pub fn close(&mut self, ended_at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(ended_at);
        }
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn total_turns(&self) -> u64 {
        self.total_turns
    }

    pub fn total_words(&self) -> u64 {
        self.total_words
    }

    pub fn participant(&self, identity: &str) -> Option<&ParticipantStats> {
        self.participants.get(identity)
    }

    /// Read-only snapshot for finalization and reporting
    pub fn report(&self) -> ProtocolReport {
        let participants: BTreeMap<String, ParticipantReport> = self
            .participants
            .iter()
            .map(|(identity, stats)| {
                (
                    identity.clone(),
                    ParticipantReport {
                        identity: stats.identity.clone(),
                        name: stats.name.clone(),
                        joined_at: stats.joined_at,
                        left_at: stats.left_at,
                        word_count: stats.word_count,
                        turn_count: stats.turn_count,
                        characters: stats.characters,
                        avg_words_per_turn: stats.avg_words_per_turn(),
                    },
                )
            })
            .collect();

        ProtocolReport {
            room_name: self.room_name.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
            total_participants: participants.len(),
            total_turns: self.total_turns,
            total_words: self.total_words,
            participants,
        }
    }
}

/// Per-participant entry in the emitted statistics document
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantReport {
    pub identity: String,
    pub name: String,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub word_count: u64,
    pub turn_count: u64,
    pub characters: u64,
    pub avg_words_per_turn: f64,
}

/// Snapshot of the meeting statistics, written once at finalization
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolReport {
    pub room_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_participants: usize,
    pub total_turns: u64,
    pub total_words: u64,
    pub participants: BTreeMap<String, ParticipantReport>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 29, 10, 0, 0).unwrap() + chrono::Duration::seconds(secs as i64)
    }

    #[test]
    fn records_meeting_scenario() {
        // Alice joins at 00:00 and speaks at 00:05; Bob joins at 00:02,
        // speaks at 00:08 and leaves at 00:10.
        let mut stats = ProtocolStats::new("standup", ts(0));
        stats.record_join("alice", "Alice", ts(0));
        stats.record_join("bob", "Bob", ts(2));
        stats.record_utterance("alice", "Hello everyone").unwrap();
        stats.record_utterance("bob", "Hi Alice").unwrap();
        stats.record_leave("bob", ts(10));

        let report = stats.report();
        assert_eq!(report.total_participants, 2);
        assert_eq!(report.total_turns, 2);
        assert_eq!(report.total_words, 4);
        assert_eq!(report.participants["alice"].word_count, 2);
        assert_eq!(report.participants["bob"].word_count, 2);
        assert_eq!(report.participants["bob"].left_at, Some(ts(10)));
        assert_eq!(report.participants["alice"].left_at, None);
    }

    #[test]
    fn totals_match_per_participant_sums() {
        let mut stats = ProtocolStats::new("room", ts(0));
        stats.record_join("a", "A", ts(0));
        stats.record_join("b", "B", ts(0));
        stats.record_utterance("a", "one two three").unwrap();
        stats.record_utterance("b", "four").unwrap();
        stats.record_utterance("a", "five six").unwrap();

        let report = stats.report();
        let word_sum: u64 = report.participants.values().map(|p| p.word_count).sum();
        let turn_sum: u64 = report.participants.values().map(|p| p.turn_count).sum();
        assert_eq!(report.total_words, word_sum);
        assert_eq!(report.total_turns, turn_sum);
    }

    #[test]
    fn unknown_participant_is_reported_and_harmless() {
        let mut stats = ProtocolStats::new("room", ts(0));
        stats.record_join("alice", "Alice", ts(0));
        stats.record_utterance("alice", "hello").unwrap();

        let err = stats.record_utterance("ghost", "boo").unwrap_err();
        assert_eq!(err, UnknownParticipant("ghost".to_string()));

        // Other participants' counts are untouched
        assert_eq!(stats.participant("alice").unwrap().word_count, 1);
        assert_eq!(stats.total_turns(), 1);
    }

    #[test]
    fn leave_without_entry_is_silent() {
        let mut stats = ProtocolStats::new("room", ts(0));
        stats.record_leave("ghost", ts(5));
        assert!(stats.participant("ghost").is_none());
    }

    #[test]
    fn rejoin_accumulates_under_same_identity() {
        let mut stats = ProtocolStats::new("room", ts(0));
        stats.record_join("alice", "Alice", ts(0));
        stats.record_utterance("alice", "first visit").unwrap();
        stats.record_leave("alice", ts(10));

        stats.record_join("alice", "Alice", ts(20));
        stats.record_utterance("alice", "second visit here").unwrap();

        let entry = stats.participant("alice").unwrap();
        assert_eq!(entry.word_count, 5, "counts accumulate across rejoin");
        assert_eq!(entry.joined_at, ts(20), "join timestamp is refreshed");
        assert_eq!(entry.left_at, None, "leave marker is cleared");
    }

    #[test]
    fn avg_words_per_turn_rounds_to_one_decimal() {
        let mut stats = ProtocolStats::new("room", ts(0));
        stats.record_join("a", "A", ts(0));
        stats.record_utterance("a", "one two three four").unwrap();
        stats.record_utterance("a", "five").unwrap();
        stats.record_utterance("a", "six seven").unwrap();

        // 7 words over 3 turns = 2.333... -> 2.3
        assert_eq!(stats.participant("a").unwrap().avg_words_per_turn(), 2.3);
    }

    #[test]
    fn avg_words_per_turn_is_zero_without_turns() {
        let mut stats = ProtocolStats::new("room", ts(0));
        stats.record_join("a", "A", ts(0));
        assert_eq!(stats.participant("a").unwrap().avg_words_per_turn(), 0.0);
    }

    #[test]
    fn close_sets_end_timestamp_once() {
        let mut stats = ProtocolStats::new("room", ts(0));
        stats.close(ts(100));
        stats.close(ts(200));
        assert_eq!(stats.report().ended_at, Some(ts(100)));
    }
}
