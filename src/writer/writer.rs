use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::sink::{EventLogSink, ProtocolSink, TranscriptSink};
use crate::config::ProtocolConfig;
use crate::protocol::{ProtocolEvent, ProtocolReport};

/// Consecutive write failures after which a sink is taken out of
/// service (fatal for that sink only)
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

struct SinkSlot {
    sink: Box<dyn ProtocolSink>,
    consecutive_failures: u32,
    disabled: bool,
}

/// Single logical writer for all protocol sinks.
///
/// Accepts ordered append requests and commits each one to every live
/// sink before returning, so concurrent events can never appear on
/// different sinks in different relative order. Callers provide the
/// total order (the coordinator holds its lock across each append).
pub struct ProtocolWriter {
    slots: Vec<SinkSlot>,
    transcript_path: Option<PathBuf>,
    event_log_path: Option<PathBuf>,
    stats_path: Option<PathBuf>,
    include_stats: bool,
    finalized: bool,
}

impl ProtocolWriter {
    /// Create the configured sinks and write their headers.
    ///
    /// Fails fatally when a sink cannot be created: no meeting can
    /// proceed without durable output.
    pub async fn create(
        config: &ProtocolConfig,
        room: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        fs::create_dir_all(&config.protocols_dir).with_context(|| {
            format!(
                "Failed to create protocols directory: {}",
                config.protocols_dir.display()
            )
        })?;

        let base_name = format!("protocol_{}_{}", room, started_at.format("%Y%m%d_%H%M%S"));

        let mut slots = Vec::new();
        let mut transcript_path = None;
        let mut event_log_path = None;

        if config.output_format.wants_txt() {
            let path = config.protocols_dir.join(format!("{base_name}.txt"));
            let mut sink = TranscriptSink::create(&path)?;
            sink.write_header(room, started_at, &config.stt_provider)
                .await?;
            transcript_path = Some(path);
            slots.push(SinkSlot {
                sink: Box::new(sink),
                consecutive_failures: 0,
                disabled: false,
            });
        }

        if config.output_format.wants_json() {
            let path = config.protocols_dir.join(format!("{base_name}.jsonl"));
            let mut sink = EventLogSink::create(&path)?;
            sink.write_header(room, started_at, &config.stt_provider)
                .await?;
            event_log_path = Some(path);
            slots.push(SinkSlot {
                sink: Box::new(sink),
                consecutive_failures: 0,
                disabled: false,
            });
        }

        let stats_path = config
            .enable_statistics
            .then(|| config.protocols_dir.join(format!("{base_name}_stats.json")));

        info!("Protocol files created: {}", base_name);

        Ok(Self {
            slots,
            transcript_path,
            event_log_path,
            stats_path,
            include_stats: config.enable_statistics,
            finalized: false,
        })
    }

    #[cfg(test)]
    fn from_sinks(sinks: Vec<Box<dyn ProtocolSink>>) -> Self {
        Self {
            slots: sinks
                .into_iter()
                .map(|sink| SinkSlot {
                    sink,
                    consecutive_failures: 0,
                    disabled: false,
                })
                .collect(),
            transcript_path: None,
            event_log_path: None,
            stats_path: None,
            include_stats: true,
            finalized: false,
        }
    }

    /// Append one event to every live sink, in the order accepted.
    ///
    /// A failing sink is logged and skipped, never blocking the
    /// others, and is disabled after repeated failure. Errors only
    /// when no live sink remains.
    pub async fn append(&mut self, event: &ProtocolEvent) -> Result<()> {
        if self.finalized {
            bail!("protocol writer is already finalized");
        }

        for slot in self.slots.iter_mut().filter(|s| !s.disabled) {
            match slot.sink.write_event(event).await {
                Ok(()) => slot.consecutive_failures = 0,
                Err(e) => {
                    slot.consecutive_failures += 1;
                    warn!(
                        "Write to {} sink failed ({}/{}): {e:#}",
                        slot.sink.name(),
                        slot.consecutive_failures,
                        MAX_CONSECUTIVE_FAILURES
                    );
                    if slot.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        error!(
                            "Disabling {} sink after repeated write failures",
                            slot.sink.name()
                        );
                        slot.disabled = true;
                    }
                }
            }
        }

        if self.slots.iter().all(|s| s.disabled) {
            bail!("all protocol sinks have failed");
        }

        Ok(())
    }

    /// Write closing markers to every live sink and save the final
    /// statistics snapshot. Idempotent: a second call is a no-op.
    pub async fn finalize(&mut self, report: &ProtocolReport, ended_at: DateTime<Utc>) -> Result<()> {
        if self.finalized {
            debug!("Protocol writer already finalized, skipping");
            return Ok(());
        }
        self.finalized = true;

        let footer_report = self.include_stats.then_some(report);
        for slot in self.slots.iter_mut().filter(|s| !s.disabled) {
            if let Err(e) = slot.sink.write_footer(ended_at, footer_report).await {
                warn!("Footer write to {} sink failed: {e:#}", slot.sink.name());
            }
        }

        if let Some(path) = &self.stats_path {
            let json = serde_json::to_string_pretty(report)
                .context("Failed to serialize statistics snapshot")?;
            fs::write(path, json)
                .with_context(|| format!("Failed to write statistics file: {}", path.display()))?;
            info!("Statistics saved to: {}", path.display());
        }

        Ok(())
    }

    /// Number of sinks still accepting writes
    pub fn live_sinks(&self) -> usize {
        self.slots.iter().filter(|s| !s.disabled).count()
    }

    pub fn transcript_path(&self) -> Option<&Path> {
        self.transcript_path.as_deref()
    }

    pub fn event_log_path(&self) -> Option<&Path> {
        self.event_log_path.as_deref()
    }

    pub fn stats_path(&self) -> Option<&Path> {
        self.stats_path.as_deref()
    }
}
