use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::protocol::{LifecycleKind, ProtocolEvent, ProtocolReport};

const RULE: &str =
    "================================================================================";

/// A durable, append-only output destination for protocol events.
///
/// Implementations must not interleave partial writes; each call
/// commits one complete record.
#[async_trait::async_trait]
pub trait ProtocolSink: Send {
    /// Sink name for logging
    fn name(&self) -> &'static str;

    /// Write the opening record (room, start time, provider)
    async fn write_header(
        &mut self,
        room: &str,
        started_at: DateTime<Utc>,
        provider: &str,
    ) -> Result<()>;

    /// Append one event
    async fn write_event(&mut self, event: &ProtocolEvent) -> Result<()>;

    /// Write the closing record. `report` is `None` when statistics
    /// are disabled.
    async fn write_footer(
        &mut self,
        ended_at: DateTime<Utc>,
        report: Option<&ProtocolReport>,
    ) -> Result<()>;
}

/// Human-readable transcript sink (plain text, one line per event)
pub struct TranscriptSink {
    file: BufWriter<File>,
}

impl TranscriptSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .with_context(|| format!("Failed to create transcript file: {}", path.display()))?;
        Ok(Self {
            file: BufWriter::new(file),
        })
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.file
            .write_all(line.as_bytes())
            .context("Failed to write transcript line")?;
        // Flush per record so a crash loses at most the in-flight event
        self.file.flush().context("Failed to flush transcript")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProtocolSink for TranscriptSink {
    fn name(&self) -> &'static str {
        "transcript"
    }

    async fn write_header(
        &mut self,
        room: &str,
        started_at: DateTime<Utc>,
        provider: &str,
    ) -> Result<()> {
        let header = format!(
            "{RULE}\nMeeting Protocol - {}\nRoom: {}\nSTT Provider: {}\n{RULE}\n\n",
            started_at.format("%Y-%m-%d %H:%M:%S"),
            room,
            provider
        );
        self.write_line(&header)
    }

    async fn write_event(&mut self, event: &ProtocolEvent) -> Result<()> {
        let line = match event {
            ProtocolEvent::Utterance {
                timestamp,
                name,
                text,
                ..
            } => format!("[{}] {}: {}\n", timestamp.format("%H:%M:%S"), name, text),
            ProtocolEvent::Lifecycle {
                timestamp,
                name,
                kind,
                ..
            } => {
                let ts = timestamp.format("%H:%M:%S");
                match kind {
                    LifecycleKind::Joined => format!("[{ts}] >>> {name} joined the meeting\n\n"),
                    LifecycleKind::Left => format!("\n[{ts}] <<< {name} left the meeting\n\n"),
                    LifecycleKind::Paused => {
                        format!("\n[{ts}] ⏸ {name} session paused (idle timeout)\n\n")
                    }
                    LifecycleKind::Resumed => format!("[{ts}] ▶ {name} session resumed\n\n"),
                }
            }
        };
        self.write_line(&line)
    }

    async fn write_footer(
        &mut self,
        ended_at: DateTime<Utc>,
        report: Option<&ProtocolReport>,
    ) -> Result<()> {
        let mut footer = format!(
            "\n{RULE}\nMeeting ended - {}\n",
            ended_at.format("%Y-%m-%d %H:%M:%S")
        );

        if let Some(report) = report {
            footer.push_str("\n--- Statistics ---\n");
            footer.push_str(&format!(
                "Total participants: {}\n",
                report.total_participants
            ));
            footer.push_str(&format!("Total turns: {}\n", report.total_turns));
            footer.push_str(&format!("Total words: {}\n", report.total_words));
            footer.push_str("\nPer participant:\n");
            for (identity, stats) in &report.participants {
                footer.push_str(&format!(
                    "  {}: {} words, {} turns\n",
                    identity, stats.word_count, stats.turn_count
                ));
            }
        }

        footer.push_str(RULE);
        footer.push('\n');
        self.write_line(&footer)
    }
}

/// Machine-readable event log sink: one JSON object per line
pub struct EventLogSink {
    file: BufWriter<File>,
}

/// Wire format of one event log line
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LogRecord<'a> {
    Header {
        room: &'a str,
        started_at: String,
        stt_provider: &'a str,
    },
    Event {
        timestamp: String,
        participant: &'a str,
        event: LifecycleKind,
    },
    Transcript {
        timestamp: String,
        participant: &'a str,
        text: &'a str,
        word_count: usize,
    },
    Footer {
        ended_at: String,
    },
}

impl EventLogSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path)
            .with_context(|| format!("Failed to create event log file: {}", path.display()))?;
        Ok(Self {
            file: BufWriter::new(file),
        })
    }

    fn write_record(&mut self, record: &LogRecord<'_>) -> Result<()> {
        let mut line = serde_json::to_string(record).context("Failed to serialize event log record")?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .context("Failed to write event log line")?;
        self.file.flush().context("Failed to flush event log")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProtocolSink for EventLogSink {
    fn name(&self) -> &'static str {
        "event-log"
    }

    async fn write_header(
        &mut self,
        room: &str,
        started_at: DateTime<Utc>,
        provider: &str,
    ) -> Result<()> {
        self.write_record(&LogRecord::Header {
            room,
            started_at: started_at.format("%H:%M:%S").to_string(),
            stt_provider: provider,
        })
    }

    async fn write_event(&mut self, event: &ProtocolEvent) -> Result<()> {
        let record = match event {
            ProtocolEvent::Utterance {
                timestamp,
                identity,
                text,
                word_count,
                ..
            } => LogRecord::Transcript {
                timestamp: timestamp.format("%H:%M:%S").to_string(),
                participant: identity,
                text,
                word_count: *word_count,
            },
            ProtocolEvent::Lifecycle {
                timestamp,
                identity,
                kind,
                ..
            } => LogRecord::Event {
                timestamp: timestamp.format("%H:%M:%S").to_string(),
                participant: identity,
                event: *kind,
            },
        };
        self.write_record(&record)
    }

    async fn write_footer(
        &mut self,
        ended_at: DateTime<Utc>,
        _report: Option<&ProtocolReport>,
    ) -> Result<()> {
        self.write_record(&LogRecord::Footer {
            ended_at: ended_at.format("%H:%M:%S").to_string(),
        })
    }
}
