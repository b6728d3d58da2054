// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Room beyond the digit width for the line break and client slop.
const FRAME_SLACK: usize = 16;
/// Absolute ceiling on a single frame, whatever the configured width.
const MAX_FRAME: usize = 64;

/// Bounded line framing over a byte stream.
///
/// Frames are LF-terminated; a CR directly before the LF is stripped so
/// Windows clients interoperate. The buffer bound makes every oversized
/// line an error before any of it is interpreted.
pub struct LineScanner {
    buf: BytesMut,
    limit: usize,
}

impl LineScanner {
    pub fn new(digits: u8) -> Self {
        let limit = (usize::from(digits) + FRAME_SLACK).min(MAX_FRAME);
        Self {
            buf: BytesMut::with_capacity(limit * 2),
            limit,
        }
    }

    /// Returns the next line with its break stripped, or `None` on clean
    /// EOF. Oversized frames and bytes left unterminated at EOF are
    /// protocol violations and surface as `InvalidData`.
    pub async fn next_line<R>(&mut self, reader: &mut R) -> io::Result<Option<BytesMut>>
    where R: AsyncRead + Unpin {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                if pos > self.limit {
                    return Err(oversized());
                }
                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                if line.ends_with(b"\r") {
                    line.truncate(pos - 1);
                }
                return Ok(Some(line));
            }

            if self.buf.len() > self.limit {
                return Err(oversized());
            }

            if reader.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "connection closed mid-line",
                ));
            }
        }
    }
}

fn oversized() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "line exceeds frame limit")
}
