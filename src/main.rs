use anyhow::Result;
use clap::Parser;
use protocol_agent::{ingest, ProtocolConfig, ProtocolCoordinator};
use tokio::io::BufReader;
use tracing::{error, info};

/// Records meeting protocols from a live transcription event feed
#[derive(Parser, Debug)]
#[command(name = "protocol-agent", version)]
struct Args {
    /// Room identifier to record (random if omitted)
    #[arg(long)]
    room: Option<String>,

    /// Config file path (any format the config crate understands)
    #[arg(long)]
    config: Option<String>,

    /// Override the idle timeout in seconds (0 disables pausing)
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = ProtocolConfig::load(args.config.as_deref())?;
    if let Some(secs) = args.idle_timeout_secs {
        cfg.idle_timeout_secs = secs;
    }

    let room = args
        .room
        .unwrap_or_else(|| format!("room-{}", uuid::Uuid::new_v4()));

    info!(
        "Starting protocol agent: room={}, provider={}, format={:?}",
        room, cfg.stt_provider, cfg.output_format
    );

    let coordinator = ProtocolCoordinator::initialize(&cfg, &room).await?;
    coordinator.start(&cfg).await;

    if let Some(path) = coordinator.transcript_path().await {
        info!("Transcript: {}", path.display());
    }
    if let Some(path) = coordinator.event_log_path().await {
        info!("Event log: {}", path.display());
    }

    // Events arrive as newline-delimited JSON on stdin; EOF or Ctrl-C
    // ends the meeting
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = ingest::run_feed(stdin, &coordinator) => match result {
            Ok(count) => info!("Event feed closed after {} events", count),
            Err(e) => error!("Event feed failed: {e:#}"),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    coordinator.shutdown().await?;
    Ok(())
}
