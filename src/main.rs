// Copyright 2025 dentsusoken
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

use clap::{Parser, Subcommand};
use kvlock::commands::config::ConfigCommand;
use kvlock::commands::exec::{ExecCommand, ExecOptions};
use kvlock::config::LockerConfig;
use kvlock::error::{Result, format_error_chain, format_error_with_color, get_exit_code};
use kvlock::logging;
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kvlock")]
#[command(author, version, about = "Run commands under a distributed lock", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to $KVLOCK_CONFIG or ./kvlock.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire a lock, run a command, then release the lock
    Exec {
        /// Lock key, shared by every process that must not run concurrently
        key: String,

        /// How long to wait for the lock ("30", "5s", "250ms" or "infinite")
        #[arg(long, value_name = "DURATION", conflicts_with = "no_wait")]
        timeout: Option<String>,

        /// Fail immediately if another owner holds the lock
        #[arg(long)]
        no_wait: bool,

        /// Lock record lifetime; must exceed the command's run time
        #[arg(long, value_name = "DURATION")]
        ttl: Option<String>,

        /// Key namespace, joined as PREFIX:KEY
        #[arg(long, value_name = "PREFIX")]
        prefix: Option<String>,

        /// Redis connection URL
        #[arg(long, value_name = "URL")]
        redis_url: Option<String>,

        /// Command and arguments to run while holding the lock
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    // Load configuration once at startup
    let config = match LockerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error_chain(&e));
            std::process::exit(get_exit_code(&e));
        }
    };

    let result: Result<i32> = (|| match cli.command {
        Commands::Exec {
            key,
            timeout,
            no_wait,
            ttl,
            prefix,
            redis_url,
            command,
        } => {
            let exec = ExecCommand::new(&config)?;
            exec.execute(ExecOptions {
                key,
                timeout,
                no_wait,
                ttl,
                prefix,
                redis_url,
                command,
            })
        }
        Commands::Config { json } => {
            let command = ConfigCommand::new(&config)?;
            command.execute(json)?;
            Ok(0)
        }
    })();

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let use_color = std::io::stderr().is_terminal();
            eprint!("{}", format_error_with_color(&e, use_color));
            std::process::exit(get_exit_code(&e));
        }
    }
}
