// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    net::TcpListener,
    sync::{Semaphore, mpsc},
    task::JoinHandle,
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    cfg::config::Config,
    pipeline::{stats::Statistics, tracker::NumberTracker, writer::NumberLog},
    server::{connection::Handler, scanner::LineScanner, validate::LineValidator},
};

/// Depth of the merged number stream between handlers and the log writer.
/// When the disk cannot keep up the channel fills and handlers block in
/// their publish step, throttling ingest instead of dropping data.
const SINK_QUEUE_DEPTH: usize = 1024;

/// A started, not-yet-serving server: log open, port bound, writer running.
pub struct Server {
    listener: TcpListener,
    limit_connections: Arc<Semaphore>,
    validator: Arc<LineValidator>,
    tracker: Arc<NumberTracker>,
    stats: Arc<Statistics>,
    shutdown: CancellationToken,
    sink_tx: mpsc::Sender<String>,
    writer_task: JoinHandle<()>,
    report_interval: Option<Duration>,
    digits: u8,
}

impl Server {
    /// Ordered startup: dedup set and statistics, number log open and
    /// writer spawn, connection slots, TCP bind. A log that cannot be
    /// opened aborts startup before the port is bound.
    pub async fn start(cfg: &Config, shutdown: CancellationToken) -> Result<Self> {
        cfg.validate()?;

        let tracker = Arc::new(NumberTracker::new(cfg.ingest.digits)?);
        let stats = Arc::new(Statistics::default());
        let validator = Arc::new(LineValidator::new(
            &cfg.ingest.termination,
            cfg.ingest.digits,
        ));

        let log = NumberLog::open(&cfg.log).await?;
        let (sink_tx, sink_rx) = mpsc::channel(SINK_QUEUE_DEPTH);
        let writer_task = tokio::spawn(log.run(shutdown.clone(), sink_rx));

        let limit_connections = Arc::new(Semaphore::new(cfg.server.max_connections));

        let listener = TcpListener::bind(("0.0.0.0", cfg.server.port))
            .await
            .with_context(|| format!("failed to bind port {}", cfg.server.port))?;

        Ok(Self {
            listener,
            limit_connections,
            validator,
            tracker,
            stats,
            shutdown,
            sink_tx,
            writer_task,
            report_interval: cfg.report.interval(),
            digits: cfg.ingest.digits,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("listener has no local address")
    }

    /// Shared statistics handle for callers that observe the counters.
    pub fn stats(&self) -> Arc<Statistics> {
        Arc::clone(&self.stats)
    }

    /// Runs the accept loop until the shutdown token fires, then completes
    /// the teardown: handlers drain, the merged stream closes, the writer
    /// flushes, and a final report prints.
    pub async fn serve(self) -> Result<()> {
        if let Some(every) = self.report_interval {
            tokio::spawn(report_loop(
                Arc::clone(&self.stats),
                every,
                self.shutdown.clone(),
            ));
        }

        let (done_tx, mut done_rx) = mpsc::channel::<()>(1);

        loop {
            // Slot first, accept second: the cap bounds live handlers
            // without refusing anyone at the TCP layer.
            let slot = tokio::select! {
                // Token first: once cancelled, no further slot is claimed.
                biased;
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&self.limit_connections).acquire_owned() => {
                    match permit {
                        Ok(p) => p,
                        // The semaphore is never closed; treat as shutdown.
                        Err(_) => break,
                    }
                },
            };

            let (socket, peer) = tokio::select! {
                // Token first: no accept can win against the shutdown.
                biased;
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        if self.shutdown.is_cancelled() {
                            break;
                        }
                        error!("accept failed: {e}");
                        self.shutdown.cancel();
                        break;
                    },
                },
            };

            debug!(%peer, "connection accepted");
            let handler = Handler {
                socket,
                peer,
                scanner: LineScanner::new(self.digits),
                validator: Arc::clone(&self.validator),
                tracker: Arc::clone(&self.tracker),
                stats: Arc::clone(&self.stats),
                sink: self.sink_tx.clone(),
                shutdown: self.shutdown.clone(),
                _slot: slot,
                _done: done_tx.clone(),
            };
            tokio::spawn(handler.run());
        }

        // Every handler holds a clone of `done_tx`; recv returns `None`
        // once the last one has exited and released its slot.
        drop(done_tx);
        let _ = done_rx.recv().await;

        // Closing the merged stream lets the writer drain and flush.
        drop(self.sink_tx);
        if let Err(e) = self.writer_task.await {
            warn!("log writer task failed: {e}");
        }

        println!("{}", self.stats.report_and_reset());
        info!("server stopped");
        Ok(())
    }
}

/// First SIGINT or SIGTERM fires the token. The token is idempotent, so a
/// signal racing the termination keyword is harmless.
pub fn spawn_signal_watcher(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                info!("shutdown signal received");
                shutdown.cancel();
            },
            Err(e) => warn!("signal watcher unavailable: {e}"),
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

async fn report_loop(
    stats: Arc<Statistics>,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut tick = time::interval(every);
    // The first tick completes immediately; skip it.
    tick.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => println!("{}", stats.report_and_reset()),
        }
    }
}
