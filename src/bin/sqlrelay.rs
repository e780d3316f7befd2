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
use dotenv::dotenv;
use sqlrelay::{resolve_port, setup_tracing, AppResult, Relay, RelayConfig};
use std::path::PathBuf;
use tokio::runtime;

#[derive(Parser)]
#[command(version, about)]
pub struct CommandLine {
    /// listening port, overrides the config file; an unusable value falls back to the default
    pub port: Option<String>,
    /// path to config file
    #[arg(short, long)]
    pub conf: Option<String>,
    /// print the effective configuration and exit
    #[arg(long)]
    pub print_config: bool,
    /// log level (v: info, vv: debug, vvv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn main() -> AppResult<()> {
    // load .env before reading SQLRELAY__* overrides
    dotenv().ok();

    let commandline: CommandLine = CommandLine::parse();
    let config_path = commandline.conf.as_ref().map_or_else(
        || {
            let mut path = PathBuf::from("./");
            path.push("conf.toml");
            path
        },
        PathBuf::from,
    );
    let mut relay_config = RelayConfig::set_up_config(config_path)?;

    // startup tokio runtime
    let rt = runtime::Builder::new_multi_thread().enable_all().build()?;

    let _log_guard = setup_tracing(&relay_config.log, commandline.verbose)?;

    relay_config.network.port =
        resolve_port(commandline.port.as_deref(), relay_config.network.port);

    if commandline.print_config {
        println!("{:#?}", relay_config);
        return Ok(());
    }

    let relay = Relay::new(relay_config);
    relay.start(&rt)?;

    Ok(())
}
