// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::debug;

use crate::network::{RequestFrame, ResponseFrame};
use crate::{AppError, AppResult};

/// Represents a connection to a client.
///
/// The `TcpStream` is wrapped in a `BufWriter` for writing, reads pass through it into
/// `buffer`. The buffer lives as long as the connection, so a peer that sends several
/// messages in one transmission gets every one of them processed in order.
#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
    max_message_size: usize,
    peer: Option<SocketAddr>,
}

impl Connection {
    pub fn new(socket: TcpStream, read_buffer_size: usize, max_message_size: usize) -> Connection {
        let peer = socket.peer_addr().ok();
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(read_buffer_size),
            max_message_size,
            peer,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Reads one message from the connection.
    ///
    /// Returns `None` once the peer has closed its side. A peer that closes in the middle
    /// of a message is treated the same way, the partial bytes are dropped. A message
    /// that outgrows the size limit is an error and the connection should be closed.
    pub async fn read_message(&mut self) -> AppResult<Option<RequestFrame>> {
        loop {
            if let Some(frame) = RequestFrame::parse(&mut self.buffer, self.max_message_size)? {
                return Ok(Some(frame));
            }
            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                if !self.buffer.is_empty() {
                    debug!(
                        "peer {:?} closed with {} bytes of an unterminated message",
                        self.peer,
                        self.buffer.len()
                    );
                    self.buffer.clear();
                }
                return Ok(None);
            }
        }
    }

    /// Writes `response` plus the delimiter and flushes, returning only after every byte
    /// has been handed to the socket.
    pub async fn write_message(&mut self, response: &str) -> AppResult<()> {
        let frame = ResponseFrame::encode(response);
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| AppError::DetailedIoError(format!("write response error: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| AppError::DetailedIoError(format!("flush response error: {}", e)))?;
        Ok(())
    }

    /// Closes the write side. Dropping the connection releases the socket as well, this
    /// only lets the peer see a clean end of stream first.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("shutdown of {:?} failed: {}", self.peer, e);
        }
    }
}
