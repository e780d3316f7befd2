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
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error, info};

use crate::network::Connection;
use crate::request::RequestProcessor;
use crate::storage::SqlDatabase;
use crate::AppError;
use crate::AppResult;

use super::config::NetworkConfig;
use super::Shutdown;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// accept retries double the wait each time up to this many seconds
const MAX_ACCEPT_BACKOFF_SECS: u64 = 64;

// handler for each connection
struct ConnectionHandler {
    connection_id: u64,
    connection: Connection,
    database: Arc<SqlDatabase>,
    notify_shutdown: broadcast::Sender<()>,
}

impl ConnectionHandler {
    /// read -> dispatch -> write, strictly one request at a time, until the peer goes
    /// away, the relay shuts down, or an error ends this connection.
    async fn handle_connection(&mut self) -> AppResult<()> {
        let mut shutdown = Shutdown::new(self.notify_shutdown.subscribe());
        while !shutdown.is_shutdown() {
            // Ok(None) when the client closed its side, Err on a broken or abusive stream
            let maybe_frame = tokio::select! {
                res = self.connection.read_message() => res?,
                _ = shutdown.recv() => {
                    debug!(
                        "connection {} exit read loop after recv shutdown signal",
                        self.connection_id
                    );
                    continue;
                }
            };

            let frame = match maybe_frame {
                Some(frame) => frame,
                None => break,
            };
            debug!(
                "connection {} received: {}",
                self.connection_id, frame.message
            );

            let response =
                RequestProcessor::process_request(&frame.message, &self.database).await?;
            self.connection.write_message(&response.to_string()).await?;
        }
        debug!("connection {} exit read loop", self.connection_id);

        Ok(())
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        debug!("connection handler {} dropped", self.connection_id);
    }
}

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
    database: Arc<SqlDatabase>,
    network: NetworkConfig,
}

impl Server {
    pub fn new(
        listener: TcpListener,
        limit_connections: Arc<Semaphore>,
        notify_shutdown: broadcast::Sender<()>,
        database: Arc<SqlDatabase>,
        network: NetworkConfig,
    ) -> Self {
        Server {
            listener,
            limit_connections,
            notify_shutdown,
            database,
            network,
        }
    }

    /// Binds a listener with `SO_REUSEADDR` set, so a restart does not trip over a port
    /// still in TIME_WAIT.
    pub async fn bind(address: &str, backlog: u32) -> AppResult<TcpListener> {
        let addr = lookup_host(address).await?.next().ok_or_else(|| {
            AppError::InvalidValue(format!("listen address {} resolves to nothing", address))
        })?;
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        Ok(socket.listen(backlog)?)
    }

    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the future is dropped.
    ///
    /// Every connection gets its own task and the loop goes straight back to accepting,
    /// so a slow or silent client never holds up the others. A permit from
    /// `limit_connections` is taken before accepting and released when the handler
    /// finishes, whichever way it finishes. Errors inside a handler are logged there and
    /// never reach this loop.
    ///
    /// Dropping the returned future stops accepting. Running handlers are not joined,
    /// they stop at their next read once the shutdown notice is sent.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> AppResult<()> {
        loop {
            let permit = self
                .limit_connections
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::IllegalStateError(format!("connection limiter: {}", e)))?;

            let (socket, peer) = self.accept().await;

            let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
            let mut handler = ConnectionHandler {
                connection_id,
                connection: Connection::new(
                    socket,
                    self.network.conn_read_buffer_size,
                    self.network.max_message_size,
                ),
                database: self.database.clone(),
                notify_shutdown: self.notify_shutdown.clone(),
            };

            tokio::spawn(async move {
                info!("Client connected from {}", peer);
                if let Err(err) = handler.handle_connection().await {
                    error!("Error handling client {}: {}", peer, err);
                }
                // whether gracefully or unexpectedly closed, release connection
                handler.connection.shutdown().await;
                drop(handler);
                drop(permit);
                info!("Client {} disconnected", peer);
            });
        }
    }

    /// Waits for the next connection. A failing accept (running out of descriptors,
    /// say) is logged and retried with a doubling wait capped at
    /// `MAX_ACCEPT_BACKOFF_SECS`; it never stops the relay.
    async fn accept(&self) -> (TcpStream, SocketAddr) {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => return (socket, peer),
                Err(err) => {
                    error!("accept failed, retry in {}s: {}", backoff, err);
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff = next_accept_backoff(backoff);
        }
    }
}

fn next_accept_backoff(backoff: u64) -> u64 {
    backoff.saturating_mul(2).min(MAX_ACCEPT_BACKOFF_SECS)
}

impl Drop for Server {
    fn drop(&mut self) {
        debug!("tcp server dropped");
    }
}
