// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use anyhow::Result;
use numbers_server_rs::{cfg::config::OutputConfig, pipeline::writer::NumberLog};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn output_cfg(path: PathBuf, append: bool) -> OutputConfig {
    OutputConfig { path, append }
}

#[tokio::test]
async fn test_writes_one_line_per_entry() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("numbers.log");

    let log = NumberLog::open(&output_cfg(path.clone(), false)).await?;
    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(log.run(CancellationToken::new(), rx));

    tx.send("42".to_string()).await?;
    tx.send("7007009".to_string()).await?;
    drop(tx);
    task.await?;

    assert_eq!(std::fs::read_to_string(&path)?, "42\n7007009\n");
    Ok(())
}

#[tokio::test]
async fn test_truncates_unless_append() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("numbers.log");
    std::fs::write(&path, "stale\n")?;

    let log = NumberLog::open(&output_cfg(path.clone(), false)).await?;
    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(log.run(CancellationToken::new(), rx));
    tx.send("1".to_string()).await?;
    drop(tx);
    task.await?;

    assert_eq!(std::fs::read_to_string(&path)?, "1\n");
    Ok(())
}

#[tokio::test]
async fn test_append_keeps_existing_lines() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("numbers.log");
    std::fs::write(&path, "13\n")?;

    let log = NumberLog::open(&output_cfg(path.clone(), true)).await?;
    let (tx, rx) = mpsc::channel(16);
    let task = tokio::spawn(log.run(CancellationToken::new(), rx));
    tx.send("14".to_string()).await?;
    drop(tx);
    task.await?;

    assert_eq!(std::fs::read_to_string(&path)?, "13\n14\n");
    Ok(())
}

#[tokio::test]
async fn test_cancellation_flushes_queued_entries() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("numbers.log");

    let log = NumberLog::open(&output_cfg(path.clone(), false)).await?;
    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(16);

    // Queue entries, then fire the token before the consumer starts: what
    // was published before cancellation must still reach the file.
    tx.send("1".to_string()).await?;
    tx.send("2".to_string()).await?;
    tx.send("3".to_string()).await?;
    shutdown.cancel();

    log.run(shutdown, rx).await;

    assert_eq!(std::fs::read_to_string(&path)?, "1\n2\n3\n");
    // The sender side stays open; the writer exits on the token alone,
    // and late publishes are refused instead of silently dropped.
    assert!(tx.send("4".to_string()).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_open_fails_on_missing_directory() {
    let cfg = output_cfg(PathBuf::from("/definitely/missing/dir/numbers.log"), false);
    let err = NumberLog::open(&cfg).await.expect_err("open must fail");
    assert!(format!("{err:#}").contains("failed to open log file"));
}
