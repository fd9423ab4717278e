// Integration tests for the serialized protocol writer
//
// These tests verify that events are committed to every configured
// sink in the same relative order, and that finalization produces
// exactly one footer and statistics snapshot.

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use protocol_agent::{
    LifecycleKind, OutputFormat, ProtocolConfig, ProtocolEvent, ProtocolStats, ProtocolWriter,
};
use std::fs;
use tempfile::TempDir;

fn ts(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 29, 10, 0, 0).unwrap() + chrono::Duration::seconds(secs as i64)
}

fn config(dir: &TempDir, format: OutputFormat) -> ProtocolConfig {
    ProtocolConfig {
        protocols_dir: dir.path().to_path_buf(),
        output_format: format,
        ..Default::default()
    }
}

fn jsonl_records(path: &std::path::Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_both_sinks_receive_events_in_the_same_order() -> Result<()> {
    let dir = TempDir::new()?;
    let cfg = config(&dir, OutputFormat::Both);
    let mut writer = ProtocolWriter::create(&cfg, "standup", ts(0)).await?;

    writer
        .append(&ProtocolEvent::lifecycle(
            ts(0),
            "alice",
            "Alice",
            LifecycleKind::Joined,
        ))
        .await?;
    writer
        .append(&ProtocolEvent::utterance(
            ts(5),
            "alice",
            "Alice",
            "Hello everyone",
        ))
        .await?;
    writer
        .append(&ProtocolEvent::lifecycle(
            ts(10),
            "alice",
            "Alice",
            LifecycleKind::Left,
        ))
        .await?;

    let mut stats = ProtocolStats::new("standup", ts(0));
    stats.record_join("alice", "Alice", ts(0));
    stats.record_utterance("alice", "Hello everyone").unwrap();
    stats.record_leave("alice", ts(10));
    stats.close(ts(20));
    writer.finalize(&stats.report(), ts(20)).await?;

    // Transcript sink
    let txt = fs::read_to_string(writer.transcript_path().unwrap())?;
    assert!(txt.contains("Meeting Protocol"));
    assert!(txt.contains("Room: standup"));
    assert!(txt.contains("[10:00:00] >>> Alice joined the meeting"));
    assert!(txt.contains("[10:00:05] Alice: Hello everyone"));
    assert!(txt.contains("[10:00:10] <<< Alice left the meeting"));
    assert!(txt.contains("Meeting ended"));
    let joined_pos = txt.find(">>> Alice joined").unwrap();
    let spoke_pos = txt.find("Alice: Hello everyone").unwrap();
    let left_pos = txt.find("<<< Alice left").unwrap();
    assert!(joined_pos < spoke_pos && spoke_pos < left_pos);

    // Event log sink carries the same events in the same order
    let records = jsonl_records(writer.event_log_path().unwrap());
    let types: Vec<&str> = records
        .iter()
        .map(|r| r["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["header", "event", "transcript", "event", "footer"]);
    assert_eq!(records[1]["event"], "joined");
    assert_eq!(records[2]["participant"], "alice");
    assert_eq!(records[2]["text"], "Hello everyone");
    assert_eq!(records[2]["word_count"], 2);
    assert_eq!(records[3]["event"], "left");

    // Statistics snapshot
    let stats_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(writer.stats_path().unwrap())?)?;
    assert_eq!(stats_json["room_name"], "standup");
    assert_eq!(stats_json["total_turns"], 1);
    assert_eq!(stats_json["total_words"], 2);
    assert_eq!(stats_json["participants"]["alice"]["avg_words_per_turn"], 2.0);

    Ok(())
}

#[tokio::test]
async fn test_txt_format_creates_only_the_transcript() -> Result<()> {
    let dir = TempDir::new()?;
    let cfg = config(&dir, OutputFormat::Txt);
    let writer = ProtocolWriter::create(&cfg, "solo", ts(0)).await?;

    assert!(writer.transcript_path().is_some());
    assert!(writer.event_log_path().is_none());
    Ok(())
}

#[tokio::test]
async fn test_json_format_creates_only_the_event_log() -> Result<()> {
    let dir = TempDir::new()?;
    let cfg = config(&dir, OutputFormat::Json);
    let writer = ProtocolWriter::create(&cfg, "solo", ts(0)).await?;

    assert!(writer.transcript_path().is_none());
    assert!(writer.event_log_path().is_some());
    Ok(())
}

#[tokio::test]
async fn test_finalize_twice_writes_one_footer_and_one_stats_file() -> Result<()> {
    let dir = TempDir::new()?;
    let cfg = config(&dir, OutputFormat::Both);
    let mut writer = ProtocolWriter::create(&cfg, "standup", ts(0)).await?;

    let stats = ProtocolStats::new("standup", ts(0));
    writer.finalize(&stats.report(), ts(50)).await?;
    writer.finalize(&stats.report(), ts(99)).await?;

    let txt = fs::read_to_string(writer.transcript_path().unwrap())?;
    assert_eq!(txt.matches("Meeting ended").count(), 1);

    let records = jsonl_records(writer.event_log_path().unwrap());
    let footers = records.iter().filter(|r| r["type"] == "footer").count();
    assert_eq!(footers, 1);

    // Footer carries the first finalize time
    let footer = records.iter().find(|r| r["type"] == "footer").unwrap();
    assert_eq!(footer["ended_at"], "10:00:50");
    Ok(())
}

#[tokio::test]
async fn test_disabled_statistics_skip_the_snapshot_and_summary() -> Result<()> {
    let dir = TempDir::new()?;
    let cfg = ProtocolConfig {
        protocols_dir: dir.path().to_path_buf(),
        enable_statistics: false,
        ..Default::default()
    };
    let mut writer = ProtocolWriter::create(&cfg, "standup", ts(0)).await?;

    assert!(writer.stats_path().is_none());

    let stats = ProtocolStats::new("standup", ts(0));
    writer.finalize(&stats.report(), ts(50)).await?;

    let txt = fs::read_to_string(writer.transcript_path().unwrap())?;
    assert!(txt.contains("Meeting ended"));
    assert!(!txt.contains("--- Statistics ---"));
    Ok(())
}

#[tokio::test]
async fn test_transcript_renders_pause_and_resume_markers() -> Result<()> {
    let dir = TempDir::new()?;
    let cfg = config(&dir, OutputFormat::Both);
    let mut writer = ProtocolWriter::create(&cfg, "standup", ts(0)).await?;

    writer
        .append(&ProtocolEvent::lifecycle(
            ts(300),
            "alice",
            "Alice",
            LifecycleKind::Paused,
        ))
        .await?;
    writer
        .append(&ProtocolEvent::lifecycle(
            ts(400),
            "alice",
            "Alice",
            LifecycleKind::Resumed,
        ))
        .await?;

    let txt = fs::read_to_string(writer.transcript_path().unwrap())?;
    assert!(txt.contains("⏸ Alice session paused (idle timeout)"));
    assert!(txt.contains("▶ Alice session resumed"));

    let records = jsonl_records(writer.event_log_path().unwrap());
    assert_eq!(records[1]["event"], "paused");
    assert_eq!(records[2]["event"], "resumed");
    Ok(())
}
