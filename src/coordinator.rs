use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ProtocolConfig;
use crate::idle::IdleMonitor;
use crate::protocol::{LifecycleKind, ProtocolEvent, ProtocolReport, ProtocolStats};
use crate::session::SessionRegistry;
use crate::writer::ProtocolWriter;

/// Lifecycle phase of the whole meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    Closing,
    Closed,
}

/// Shared state behind the coordinator's single serialization point.
///
/// Every event runs its (state transition, statistics update, durable
/// append) triplet while this is locked, so the triplet is atomic with
/// respect to every other event.
struct Inner {
    phase: Phase,
    registry: SessionRegistry,
    stats: ProtocolStats,
    writer: ProtocolWriter,
    idle_timeout: chrono::Duration,
}

/// Top-level owner of one meeting's protocol recording.
///
/// Cheap to clone; concurrent producer tasks may call the event
/// handlers from independent contexts and the coordinator serializes
/// them.
#[derive(Clone)]
pub struct ProtocolCoordinator {
    inner: Arc<Mutex<Inner>>,
    idle_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ProtocolCoordinator {
    /// Open the configured sinks, write headers, and enter `Running`.
    ///
    /// Fails fatally when sinks cannot be created: no meeting can
    /// proceed without durable output.
    pub async fn initialize(config: &ProtocolConfig, room: &str) -> Result<Self> {
        Self::initialize_at(config, room, Utc::now()).await
    }

    /// Like [`initialize`](Self::initialize) with an explicit start
    /// time (the transport layer may know the true meeting start)
    pub async fn initialize_at(
        config: &ProtocolConfig,
        room: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        let writer = ProtocolWriter::create(config, room, started_at)
            .await
            .context("Failed to initialize protocol sinks")?;

        info!(
            "Protocol coordinator initialized: room={}, provider={}",
            room, config.stt_provider
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                phase: Phase::Running,
                registry: SessionRegistry::new(),
                stats: ProtocolStats::new(room, started_at),
                writer,
                idle_timeout: chrono::Duration::seconds(config.idle_timeout_secs as i64),
            })),
            idle_task: Arc::new(Mutex::new(None)),
        })
    }

    /// Start the idle timeout monitor. A zero timeout disables the
    /// feature entirely.
    pub async fn start(&self, config: &ProtocolConfig) {
        let timeout = config.idle_timeout();
        if timeout.is_zero() {
            info!("Idle timeout disabled");
            return;
        }

        let mut task = self.idle_task.lock().await;
        if task.is_some() {
            warn!("Idle monitor already started");
            return;
        }
        *task = Some(IdleMonitor::spawn(self.clone(), timeout));
        info!("Idle timeout enabled: {}s", timeout.as_secs());
    }

    /// A participant joined the room
    pub async fn on_participant_joined(
        &self,
        identity: &str,
        name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.accepting(identity) {
            return Ok(());
        }
        inner.handle_join(identity, name, timestamp).await
    }

    /// A participant left the room
    pub async fn on_participant_left(
        &self,
        identity: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.accepting(identity) {
            return Ok(());
        }
        inner.handle_leave(identity, timestamp).await
    }

    /// A completed, recognized utterance arrived for a participant
    pub async fn on_utterance(
        &self,
        identity: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.accepting(identity) {
            return Ok(());
        }
        inner.handle_utterance(identity, text, timestamp).await
    }

    /// A transport or provider error was reported for one session.
    ///
    /// Recoverable errors leave the session untouched (upstream
    /// retries); unrecoverable ones force that session alone to leave.
    pub async fn on_session_error(
        &self,
        identity: &str,
        reason: &str,
        recoverable: bool,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        if recoverable {
            warn!("Recoverable session error for {}: {}", identity, reason);
            return Ok(());
        }

        error!(
            "Unrecoverable session error for {}: {}, closing session",
            identity, reason
        );
        let mut inner = self.inner.lock().await;
        if !inner.accepting(identity) {
            return Ok(());
        }
        inner.handle_leave(identity, timestamp).await
    }

    /// Evaluate the global silence condition, pausing every active
    /// session as one batch when it holds. Driven periodically by the
    /// idle monitor.
    pub async fn evaluate_idle(&self, now: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.phase != Phase::Running {
            return Ok(());
        }
        inner.evaluate_idle(now).await
    }

    /// Close the meeting: synthesize leaves for everyone still
    /// present, finalize all sinks, and stop the idle monitor.
    /// Idempotent: a second call is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_at(Utc::now()).await
    }

    pub async fn shutdown_at(&self, timestamp: DateTime<Utc>) -> Result<()> {
        if let Some(task) = self.idle_task.lock().await.take() {
            task.abort();
        }

        // Acquiring the lock drains any in-flight event first
        let mut inner = self.inner.lock().await;
        if matches!(inner.phase, Phase::Closing | Phase::Closed) {
            debug!("Shutdown already performed, skipping");
            return Ok(());
        }
        inner.phase = Phase::Closing;
        info!("Closing protocol...");

        for session in inner.registry.drain_present(timestamp) {
            inner.stats.record_leave(&session.identity, timestamp);
            inner
                .append(ProtocolEvent::lifecycle(
                    timestamp,
                    &session.identity,
                    &session.name,
                    LifecycleKind::Left,
                ))
                .await;
        }

        inner.stats.close(timestamp);
        let report = inner.stats.report();
        if let Err(e) = inner.writer.finalize(&report, timestamp).await {
            error!("Failed to finalize protocol files: {e:#}");
        }

        inner.phase = Phase::Closed;
        info!("Protocol closed");
        Ok(())
    }

    pub async fn phase(&self) -> Phase {
        self.inner.lock().await.phase
    }

    pub(crate) async fn is_running(&self) -> bool {
        self.inner.lock().await.phase == Phase::Running
    }

    /// Read-only snapshot of the current statistics
    pub async fn statistics(&self) -> ProtocolReport {
        self.inner.lock().await.stats.report()
    }

    pub async fn transcript_path(&self) -> Option<PathBuf> {
        self.inner
            .lock()
            .await
            .writer
            .transcript_path()
            .map(PathBuf::from)
    }

    pub async fn event_log_path(&self) -> Option<PathBuf> {
        self.inner
            .lock()
            .await
            .writer
            .event_log_path()
            .map(PathBuf::from)
    }

    pub async fn stats_path(&self) -> Option<PathBuf> {
        self.inner
            .lock()
            .await
            .writer
            .stats_path()
            .map(PathBuf::from)
    }
}

impl Inner {
    /// Whether new events are accepted in the current phase
    fn accepting(&self, identity: &str) -> bool {
        if self.phase != Phase::Running {
            warn!(
                "Event for {} refused: protocol is {:?}",
                identity, self.phase
            );
            return false;
        }
        true
    }

    async fn handle_join(
        &mut self,
        identity: &str,
        name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        if !self.registry.join(identity, name, timestamp) {
            debug!("Duplicate join for {} ignored", identity);
            return Ok(());
        }

        info!("Participant joined: {}", identity);
        self.stats.record_join(identity, name, timestamp);
        self.append(ProtocolEvent::lifecycle(
            timestamp,
            identity,
            name,
            LifecycleKind::Joined,
        ))
        .await;
        Ok(())
    }

    async fn handle_leave(&mut self, identity: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let Some(session) = self.registry.leave(identity, timestamp) else {
            debug!("Leave for absent participant {} ignored", identity);
            return Ok(());
        };

        info!("Participant left: {}", identity);
        self.stats.record_leave(identity, timestamp);
        self.append(ProtocolEvent::lifecycle(
            timestamp,
            identity,
            &session.name,
            LifecycleKind::Left,
        ))
        .await;
        Ok(())
    }

    async fn handle_utterance(
        &mut self,
        identity: &str,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        if text.trim().is_empty() {
            debug!("Empty transcript for {}, ignoring", identity);
            return Ok(());
        }

        // Late join: the utterance must never be dropped
        if !self.registry.contains(identity) {
            warn!(
                "Utterance from unknown participant {}, synthesizing join",
                identity
            );
            self.handle_join(identity, identity, timestamp).await?;
        }

        // One utterance from anyone resumes every paused session
        if self.registry.any_paused() {
            self.resume_all(timestamp).await;
        }

        self.registry.mark_speech(identity, timestamp);
        let name = self
            .registry
            .get(identity)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| identity.to_string());

        if self.stats.record_utterance(identity, text).is_err() {
            // Registry and statistics are kept in lockstep, so this
            // only fires if a join was missed entirely
            warn!("Late statistics entry synthesized for {}", identity);
            self.stats.record_join(identity, &name, timestamp);
            let _ = self.stats.record_utterance(identity, text);
        }

        info!("[{}] {}: {}", timestamp.format("%H:%M:%S"), name, text);
        self.append(ProtocolEvent::utterance(timestamp, identity, name, text))
            .await;
        Ok(())
    }

    async fn evaluate_idle(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.idle_timeout <= chrono::Duration::zero() {
            return Ok(());
        }
        if self.registry.active_count() == 0 {
            return Ok(());
        }
        let Some(latest) = self.registry.latest_activity() else {
            return Ok(());
        };
        if now.signed_duration_since(latest) < self.idle_timeout {
            return Ok(());
        }

        let paused = self.registry.pause_all();
        warn!(
            "All participants idle for {}s+, pausing transcription ({} sessions)",
            self.idle_timeout.num_seconds(),
            paused.len()
        );
        for (identity, name) in self.names_of(&paused) {
            self.append(ProtocolEvent::lifecycle(
                now,
                identity,
                name,
                LifecycleKind::Paused,
            ))
            .await;
        }
        Ok(())
    }

    async fn resume_all(&mut self, timestamp: DateTime<Utc>) {
        let resumed = self.registry.resume_all();
        if resumed.is_empty() {
            return;
        }
        info!("Transcription resumed ({} sessions)", resumed.len());
        for (identity, name) in self.names_of(&resumed) {
            self.append(ProtocolEvent::lifecycle(
                timestamp,
                identity,
                name,
                LifecycleKind::Resumed,
            ))
            .await;
        }
    }

    fn names_of(&self, identities: &[String]) -> Vec<(String, String)> {
        identities
            .iter()
            .map(|id| {
                let name = self
                    .registry
                    .get(id)
                    .map(|s| s.name.clone())
                    .unwrap_or_else(|| id.clone());
                (id.clone(), name)
            })
            .collect()
    }

    /// Durable append. Write failures are reported, never rolled back
    /// into session or statistics state.
    async fn append(&mut self, event: ProtocolEvent) {
        if let Err(e) = self.writer.append(&event).await {
            error!("Protocol write failed: {e:#}");
        }
    }
}
