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

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tokio::{runtime, signal};
use tracing::{error, info};

use crate::service::Server;
use crate::storage::SqlDatabase;
use crate::AppError::IllegalStateError;
use crate::{AppResult, RelayConfig};

pub const SERVER_NAME: &str = "sqlrelay";

/// Owns the startup sequence: open the database, bind, serve until Ctrl-C.
pub struct Relay {
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Relay { config }
    }

    pub fn start(&self, rt: &runtime::Runtime) -> AppResult<()> {
        rt.block_on(self.run())?;
        info!("[{}] shutdown complete", SERVER_NAME);
        Ok(())
    }

    /// Failing to open the database or to bind the socket is fatal. Anything that goes
    /// wrong on a single connection is not.
    pub async fn run(&self) -> AppResult<()> {
        let database_conf = &self.config.database;
        let database = SqlDatabase::open(
            &database_conf.path,
            Duration::from_millis(database_conf.busy_timeout_ms),
        )
        .map_err(|err| {
            let error_msg = format!(
                "Failed to open database {} - Error: {}",
                database_conf.path, err
            );
            error!("{}", error_msg);
            IllegalStateError(error_msg)
        })?;

        let (notify_shutdown, _) = broadcast::channel(1);
        let network_conf = &self.config.network;
        let listen_address = self.config.listen_address();

        let listener = match Server::bind(&listen_address, network_conf.listen_backlog).await {
            Ok(listener) => listener,
            Err(err) => {
                let error_msg = format!(
                    "Failed to bind server to address: {} - Error: {}",
                    listen_address, err
                );
                error!("{}", error_msg);
                return Err(IllegalStateError(error_msg));
            }
        };
        info!("[{}] Server started on {}", SERVER_NAME, &listen_address);
        info!("[{}] Waiting for connections...", SERVER_NAME);

        let server = Server::new(
            listener,
            Arc::new(Semaphore::new(network_conf.max_connection)),
            notify_shutdown.clone(),
            Arc::new(database),
            network_conf.clone(),
        );
        let result = tokio::select! {
          res = server.run() => {
              if let Err(err) = &res {
                  error!(cause = %err, "failed to accept");
              }
              res
          }
          _ = signal::ctrl_c() => {
              info!("[{}] Shutting down server...", SERVER_NAME);
              Ok(())
          }
        };

        // release the listening socket, then tell idle handlers to stop
        drop(server);
        let _ = notify_shutdown.send(());
        result
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::AppError;

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = occupied.local_addr().unwrap().port();

        let mut config = RelayConfig::default();
        config.network.port = port;
        config.database.path = dir.path().join("relay.db").to_string_lossy().into_owned();

        let result = Relay::new(config).run().await;
        assert!(matches!(result, Err(AppError::IllegalStateError(_))));
    }

    #[tokio::test]
    async fn test_unopenable_database_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = RelayConfig::default();
        config.network.port = 0;
        // a directory cannot be opened as a database file
        config.database.path = dir.path().to_string_lossy().into_owned();

        let result = Relay::new(config).run().await;
        assert!(matches!(result, Err(AppError::IllegalStateError(_))));
    }
}
