// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use serial_test::serial;
use tokio::time::sleep;

use crate::integration_tests::common::{send_lines, spawn_server};

#[tokio::test]
#[serial]
async fn test_cap_defers_accept_without_refusing() -> Result<()> {
    let mut server = spawn_server(2).await?;

    let mut first = server.connect().await?;
    let mut second = server.connect().await?;

    // Prove both slots are actually claimed before the third client shows
    // up, otherwise the accept order would be at the scheduler's mercy.
    send_lines(&mut first, &["000000001"]).await?;
    send_lines(&mut second, &["000000002"]).await?;
    server.wait_for_stats(|r| r.cumulative_unique == 2).await?;

    // The third connection completes at the TCP layer (backlog) but is not
    // served while the cap is reached: its line stays unread.
    let mut third = server.connect().await?;
    send_lines(&mut third, &["000000003"]).await?;
    sleep(Duration::from_millis(300)).await;
    assert_eq!(server.stats.snapshot().cumulative_unique, 2);

    // Releasing one slot lets the parked connection through.
    drop(first);
    server.wait_for_stats(|r| r.cumulative_unique == 3).await?;

    send_lines(&mut third, &["terminate"]).await?;
    server.finished().await?;

    let mut lines = server.read_log()?;
    lines.sort();
    assert_eq!(lines, vec!["1".to_string(), "2".to_string(), "3".to_string()]);
    Ok(())
}
