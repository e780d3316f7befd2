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

use tokio::net::{TcpStream, ToSocketAddrs};

use crate::network::Connection;
use crate::request::Response;
use crate::{AppError, AppResult};

const CLIENT_READ_BUFFER_SIZE: usize = 4 * 1024;
const CLIENT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// A client for the relay. The framing is symmetric, so the client reuses the
/// server side `Connection`.
#[derive(Debug)]
pub struct SqlClient {
    connection: Connection,
}

impl SqlClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> AppResult<SqlClient> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;
        Ok(SqlClient {
            connection: Connection::new(socket, CLIENT_READ_BUFFER_SIZE, CLIENT_MAX_MESSAGE_SIZE),
        })
    }

    /// Sends one statement and returns the reply exactly as received, minus the delimiter.
    pub async fn send_raw(&mut self, sql: &str) -> AppResult<String> {
        self.connection.write_message(sql).await?;
        match self.connection.read_message().await? {
            Some(frame) => Ok(frame.message),
            None => Err(AppError::DetailedIoError(
                "connection closed by relay before reply".to_string(),
            )),
        }
    }

    pub async fn execute(&mut self, sql: &str) -> AppResult<Response> {
        let raw = self.send_raw(sql).await?;
        Response::parse(&raw)
            .ok_or_else(|| AppError::MalformedProtocol(format!("unexpected reply: {}", raw)))
    }

    pub async fn close(mut self) {
        self.connection.shutdown().await;
    }
}
