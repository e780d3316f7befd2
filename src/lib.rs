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

//! sqlrelay executes SQL text sent over TCP against one shared SQLite database.
//!
//! Each message is a NUL-terminated statement. A message starting with `SELECT` runs
//! as a query, anything else as a command. The reply is `SUCCESS`,
//! `SUCCESS|<row>|<row>...` or `ERROR:<engine message>`, also NUL-terminated.

mod client;
mod network;
mod request;
mod service;
mod storage;

pub use client::SqlClient;
pub use network::{Connection, RequestFrame, ResponseFrame, MESSAGE_DELIMITER};
pub use request::{RequestKind, RequestProcessor, Response};
pub use service::{
    resolve_port, setup_local_tracing, setup_tracing, AppError, AppResult, DatabaseConfig,
    LogConfig, NetworkConfig, Relay, RelayConfig, Server, Shutdown, DEFAULT_DB_FILE,
    DEFAULT_PORT, SERVER_NAME,
};
pub use storage::{DbOutcome, SqlDatabase, SQLITE_INIT, SQLITE_PRAGMAS};
