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

use clap::Parser;
use sqlrelay::{setup_local_tracing, AppResult, SqlClient, DEFAULT_PORT};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Sends SQL statements to a running sqlrelay and prints the raw replies.
///
/// Without `--execute`, statements are read from stdin, one per line.
#[derive(Parser)]
#[command(version, about)]
pub struct CommandLine {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// run a single statement and exit
    #[arg(short, long)]
    pub execute: Option<String>,
}

#[tokio::main]
async fn main() -> AppResult<()> {
    setup_local_tracing()?;
    let commandline = CommandLine::parse();

    let mut client = SqlClient::connect((commandline.host.as_str(), commandline.port)).await?;

    if let Some(sql) = commandline.execute {
        println!("{}", client.send_raw(&sql).await?);
        client.close().await;
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        println!("{}", client.send_raw(&line).await?);
    }
    client.close().await;

    Ok(())
}
