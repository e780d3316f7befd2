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

extern crate config as _;

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

pub const DEFAULT_PORT: u16 = 7778;
pub const DEFAULT_DB_FILE: &str = "stomp_server.db";

/// environment variables with this prefix override the config file,
/// e.g. `SQLRELAY__NETWORK__PORT=7000`
const ENV_PREFIX: &str = "SQLRELAY";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    pub ip: String,
    pub port: u16,
    /// upper bound of concurrently served connections
    pub max_connection: usize,
    /// a message that grows beyond this size without a delimiter closes the connection
    pub max_message_size: usize,
    pub conn_read_buffer_size: usize,
    pub listen_backlog: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            ip: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_connection: 1024,
            max_message_size: 16 * 1024 * 1024,
            conn_read_buffer_size: 4 * 1024,
            listen_backlog: 1024,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// sqlite database file, created if absent
    pub path: String,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: DEFAULT_DB_FILE.to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    pub dir: String,
    pub file_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            dir: "logs".to_string(),
            file_name: "sqlrelay.log".to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl RelayConfig {
    /// Loads the config file at `path` (optional, missing file means built-in defaults),
    /// then applies `SQLRELAY__*` environment overrides.
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<RelayConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or(AppError::InvalidValue(format!(
                "config file path: {}",
                path.as_ref().to_string_lossy()
            )))?;

        let defaults = NetworkConfig::default();
        let db_defaults = DatabaseConfig::default();
        let log_defaults = LogConfig::default();

        let config = config::Config::builder()
            .set_default("network.ip", defaults.ip)?
            .set_default("network.port", defaults.port as i64)?
            .set_default("network.max_connection", defaults.max_connection as i64)?
            .set_default("network.max_message_size", defaults.max_message_size as i64)?
            .set_default(
                "network.conn_read_buffer_size",
                defaults.conn_read_buffer_size as i64,
            )?
            .set_default("network.listen_backlog", defaults.listen_backlog as i64)?
            .set_default("database.path", db_defaults.path)?
            .set_default("database.busy_timeout_ms", db_defaults.busy_timeout_ms as i64)?
            .set_default("log.dir", log_defaults.dir)?
            .set_default("log.file_name", log_defaults.file_name)?
            .add_source(config::File::with_name(path_str).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let relay_config: RelayConfig = config.try_deserialize()?;
        relay_config.validate()?;

        Ok(relay_config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.network.max_connection == 0 {
            return Err(AppError::InvalidValue(
                "network.max_connection must be greater than 0".to_string(),
            ));
        }
        if self.network.conn_read_buffer_size == 0 {
            return Err(AppError::InvalidValue(
                "network.conn_read_buffer_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.network.ip, self.network.port)
    }
}

/// Parses the optional positional port argument. An unusable value is reported and
/// the default port is used instead.
pub fn resolve_port(raw_port: Option<&str>, default_port: u16) -> u16 {
    match raw_port.map(str::trim) {
        None => default_port,
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                tracing::warn!(
                    "Invalid port '{}', falling back to default {}",
                    raw,
                    default_port
                );
                default_port
            }
        },
    }
}
