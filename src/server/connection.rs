// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::SocketAddr, sync::Arc};

use tokio::{
    net::TcpStream,
    sync::{OwnedSemaphorePermit, mpsc},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    pipeline::{
        stats::Statistics,
        tracker::{NumberTracker, Sighting},
    },
    server::{
        scanner::LineScanner,
        validate::{LineValidator, Verdict},
    },
};

/// One task per accepted connection.
///
/// Reads lines in socket order, classifies them, feeds first sightings to
/// the merged stream and counts the rest. The only state shared with peer
/// handlers is the tracker, the statistics, the stream sender and the
/// shutdown token. Dropping the struct releases the connection slot and,
/// through the completion sender, tells the supervisor this handler is
/// gone.
pub(crate) struct Handler {
    pub socket: TcpStream,
    pub peer: SocketAddr,
    pub scanner: LineScanner,
    pub validator: Arc<LineValidator>,
    pub tracker: Arc<NumberTracker>,
    pub stats: Arc<Statistics>,
    pub sink: mpsc::Sender<String>,
    pub shutdown: CancellationToken,
    pub _slot: OwnedSemaphorePermit,
    pub _done: mpsc::Sender<()>,
}

impl Handler {
    pub(crate) async fn run(mut self) {
        loop {
            let scanned = tokio::select! {
                // Token first: no new line is started after cancellation.
                biased;
                _ = self.shutdown.cancelled() => break,
                scanned = self.scanner.next_line(&mut self.socket) => scanned,
            };

            let line = match scanned {
                Ok(Some(line)) => line,
                // Peer closed its end cleanly.
                Ok(None) => break,
                Err(e) => {
                    debug!(peer = %self.peer, "dropping connection: {e}");
                    break;
                },
            };

            match self.validator.classify(&line) {
                Verdict::Terminate => {
                    info!(peer = %self.peer, "termination keyword received");
                    self.shutdown.cancel();
                    break;
                },
                Verdict::Reject => {
                    // Wire-protocol violation; there is no error frame.
                    debug!(peer = %self.peer, "dropping connection: malformed line");
                    break;
                },
                Verdict::Number(value) => match self.tracker.observe(value) {
                    Sighting::Duplicate => self.stats.note_duplicate(),
                    Sighting::First => {
                        // Count only after a successful publish so the
                        // cumulative counter never exceeds what reaches
                        // the log; never publish once cancellation has
                        // been observed.
                        tokio::select! {
                            biased;
                            _ = self.shutdown.cancelled() => break,
                            sent = self.sink.send(value.to_string()) => match sent {
                                Ok(()) => self.stats.note_unique(),
                                // Stream already closed: shutdown under way.
                                Err(_) => break,
                            },
                        }
                    },
                },
            }
        }
    }
}
