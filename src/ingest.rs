//! Inbound event feed from the transport/STT boundary
//!
//! The core consumes exactly three event kinds from the room layer.
//! This module reads them as newline-delimited JSON and drives the
//! coordinator; malformed lines are logged and skipped so a glitchy
//! upstream never terminates the recording.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

use crate::coordinator::ProtocolCoordinator;

/// One event as delivered by the room transport layer
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoomEvent {
    ParticipantJoined {
        identity: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    ParticipantLeft {
        identity: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    UtteranceCompleted {
        identity: String,
        text: String,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
}

/// Deliver one transport event to the coordinator
pub async fn dispatch(coordinator: &ProtocolCoordinator, event: RoomEvent) -> Result<()> {
    match event {
        RoomEvent::ParticipantJoined {
            identity,
            name,
            timestamp,
        } => {
            let ts = timestamp.unwrap_or_else(Utc::now);
            let name = name.unwrap_or_else(|| identity.clone());
            coordinator.on_participant_joined(&identity, &name, ts).await
        }
        RoomEvent::ParticipantLeft {
            identity,
            timestamp,
        } => {
            let ts = timestamp.unwrap_or_else(Utc::now);
            coordinator.on_participant_left(&identity, ts).await
        }
        RoomEvent::UtteranceCompleted {
            identity,
            text,
            timestamp,
        } => {
            let ts = timestamp.unwrap_or_else(Utc::now);
            coordinator.on_utterance(&identity, &text, ts).await
        }
    }
}

/// Read newline-delimited events until EOF, returning how many were
/// delivered
pub async fn run_feed<R>(reader: R, coordinator: &ProtocolCoordinator) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut delivered = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<RoomEvent>(line) {
            Ok(event) => {
                dispatch(coordinator, event).await?;
                delivered += 1;
            }
            Err(e) => warn!("Skipping malformed event line: {}", e),
        }
    }

    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::coordinator::ProtocolCoordinator;
    use tempfile::TempDir;
    use tokio::io::BufReader;

    #[test]
    fn parses_each_event_kind() {
        let joined: RoomEvent = serde_json::from_str(
            r#"{"kind":"participant_joined","identity":"alice","name":"Alice"}"#,
        )
        .unwrap();
        assert!(matches!(
            joined,
            RoomEvent::ParticipantJoined { ref identity, .. } if identity == "alice"
        ));

        let left: RoomEvent =
            serde_json::from_str(r#"{"kind":"participant_left","identity":"bob"}"#).unwrap();
        assert!(matches!(left, RoomEvent::ParticipantLeft { .. }));

        let utterance: RoomEvent = serde_json::from_str(
            r#"{"kind":"utterance_completed","identity":"alice","text":"Hello everyone","timestamp":"2026-01-29T10:00:05Z"}"#,
        )
        .unwrap();
        match utterance {
            RoomEvent::UtteranceCompleted {
                text, timestamp, ..
            } => {
                assert_eq!(text, "Hello everyone");
                assert!(timestamp.is_some());
            }
            _ => panic!("expected utterance"),
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let result = serde_json::from_str::<RoomEvent>(r#"{"kind":"screen_shared","identity":"x"}"#);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn feed_skips_malformed_lines_and_keeps_going() -> Result<()> {
        let dir = TempDir::new()?;
        let cfg = ProtocolConfig {
            protocols_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let coordinator = ProtocolCoordinator::initialize(&cfg, "feed-room").await?;

        // Valid events interleaved with garbage, an unknown kind, and
        // a blank line; none of the bad lines may terminate the feed
        let input = concat!(
            r#"{"kind":"participant_joined","identity":"alice","name":"Alice","timestamp":"2026-01-29T10:00:00Z"}"#,
            "\n",
            "{not json at all\n",
            "\n",
            r#"{"kind":"screen_shared","identity":"alice"}"#,
            "\n",
            r#"{"kind":"utterance_completed","identity":"alice","text":"Hello everyone","timestamp":"2026-01-29T10:00:05Z"}"#,
            "\n",
            r#"{"kind":"participant_left","identity":"alice","timestamp":"2026-01-29T10:00:10Z"}"#,
            "\n",
        );

        let delivered = run_feed(BufReader::new(input.as_bytes()), &coordinator).await?;
        assert_eq!(delivered, 3, "only the well-formed events count");

        // The valid events all reached the coordinator
        let report = coordinator.statistics().await;
        assert_eq!(report.total_participants, 1);
        assert_eq!(report.participants["alice"].word_count, 2);
        assert_eq!(report.participants["alice"].turn_count, 1);
        assert!(report.participants["alice"].left_at.is_some());

        coordinator.shutdown().await?;
        Ok(())
    }
}
