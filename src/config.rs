use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const KNOWN_PROVIDERS: &[&str] = &["deepgram", "speechmatics", "openai"];
const DEFAULT_PROVIDER: &str = "deepgram";

/// Which protocol files to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Plain-text transcript only
    Txt,
    /// JSONL event log only
    Json,
    /// Both transcript and event log
    Both,
}

impl OutputFormat {
    pub fn wants_txt(self) -> bool {
        matches!(self, OutputFormat::Txt | OutputFormat::Both)
    }

    pub fn wants_json(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}

/// Configuration for the protocol agent
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Directory where protocol files are written (created on demand)
    pub protocols_dir: PathBuf,

    /// Which output sinks to create
    pub output_format: OutputFormat,

    /// STT provider name, recorded in file headers
    pub stt_provider: String,

    /// Whether to render the statistics block and write the
    /// statistics file at finalization
    pub enable_statistics: bool,

    /// Pause transcription after this many seconds of global silence.
    /// Zero disables idle pausing entirely.
    pub idle_timeout_secs: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            protocols_dir: PathBuf::from("protocols"),
            output_format: OutputFormat::Both,
            stt_provider: DEFAULT_PROVIDER.to_string(),
            enable_statistics: true,
            idle_timeout_secs: 300, // 5 minutes
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from an optional file plus `PROTOCOL_*`
    /// environment variables (environment wins)
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("PROTOCOL"));

        let mut cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate();
        Ok(cfg)
    }

    /// Fall back to defaults on unsupported values instead of refusing
    /// to start
    pub fn validate(&mut self) {
        if !KNOWN_PROVIDERS.contains(&self.stt_provider.as_str()) {
            warn!(
                "Unknown STT provider '{}', defaulting to '{}'",
                self.stt_provider, DEFAULT_PROVIDER
            );
            self.stt_provider = DEFAULT_PROVIDER.to_string();
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let cfg = ProtocolConfig::default();
        assert_eq!(cfg.protocols_dir, PathBuf::from("protocols"));
        assert_eq!(cfg.output_format, OutputFormat::Both);
        assert_eq!(cfg.stt_provider, "deepgram");
        assert!(cfg.enable_statistics);
        assert_eq!(cfg.idle_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn unknown_provider_falls_back() {
        let mut cfg = ProtocolConfig {
            stt_provider: "whisper-self-hosted".to_string(),
            ..Default::default()
        };
        cfg.validate();
        assert_eq!(cfg.stt_provider, "deepgram");
    }

    #[test]
    fn known_provider_is_kept() {
        let mut cfg = ProtocolConfig {
            stt_provider: "speechmatics".to_string(),
            ..Default::default()
        };
        cfg.validate();
        assert_eq!(cfg.stt_provider, "speechmatics");
    }

    #[test]
    fn output_format_selects_sinks() {
        assert!(OutputFormat::Both.wants_txt());
        assert!(OutputFormat::Both.wants_json());
        assert!(OutputFormat::Txt.wants_txt());
        assert!(!OutputFormat::Txt.wants_json());
        assert!(!OutputFormat::Json.wants_txt());
        assert!(OutputFormat::Json.wants_json());
    }
}
