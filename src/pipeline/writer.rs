// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::cfg::config::OutputConfig;

/// The single writer of the number log.
///
/// Opening happens before the server binds its port, so a bad log path
/// aborts startup instead of failing mid-stream. All serialization is
/// implicit: exactly one consumer task owns the file handle.
#[derive(Debug)]
pub struct NumberLog {
    file: File,
    path: PathBuf,
    buf: String,
}

impl NumberLog {
    /// Opens the file, creating it if needed; truncates unless `append`.
    pub async fn open(cfg: &OutputConfig) -> Result<Self> {
        let mut opts = OpenOptions::new();
        opts.write(true).create(true);
        if cfg.append {
            opts.append(true);
        } else {
            opts.truncate(true);
        }
        let file = opts
            .open(&cfg.path)
            .await
            .with_context(|| format!("failed to open log file {:?}", cfg.path))?;
        debug!("number log open at {:?} (append={})", cfg.path, cfg.append);

        Ok(Self {
            file,
            path: cfg.path.clone(),
            buf: String::with_capacity(16),
        })
    }

    /// Consumes the merged number stream, one line per entry, in arrival
    /// order. Exits when the stream closes (all producers gone, fully
    /// drained) or when the token fires (closes the stream to further
    /// publishes, writes everything already accepted, then stops). A
    /// failed write fires the token itself: a broken log file is fatal
    /// for the whole server. Flushes before returning.
    pub async fn run(
        mut self,
        shutdown: CancellationToken,
        mut numbers: mpsc::Receiver<String>,
    ) {
        loop {
            tokio::select! {
                entry = numbers.recv() => match entry {
                    Some(number) => {
                        if self.append_line(&number).await.is_err() {
                            shutdown.cancel();
                            return;
                        }
                    },
                    None => break,
                },
                _ = shutdown.cancelled() => {
                    // Refuse further publishes, then drain every entry
                    // that was accepted before the cut: a counted number
                    // must never miss the file.
                    numbers.close();
                    while let Some(number) = numbers.recv().await {
                        if self.append_line(&number).await.is_err() {
                            return;
                        }
                    }
                    break;
                },
            }
        }

        if let Err(e) = self.file.flush().await {
            error!("failed to flush {:?}: {e}", self.path);
        }
    }

    async fn append_line(&mut self, number: &str) -> io::Result<()> {
        self.buf.clear();
        self.buf.push_str(number);
        self.buf.push('\n');
        if let Err(e) = self.file.write_all(self.buf.as_bytes()).await {
            error!("write to {:?} failed: {e}", self.path);
            return Err(e);
        }
        Ok(())
    }
}
