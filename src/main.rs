// Copyright 2025 interaction-store contributors
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

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use interaction_store::config::{apply_env_overrides, load_config};
use interaction_store::{ChatContext, InteractionRecord, StoreConfig, StoreRouter};

/// interaction-store - route chat interactions across storage backends
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.yaml")]
    config: PathBuf,

    /// Data directory (overrides config file)
    #[arg(long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record one interaction
    Record {
        #[arg(long)]
        user: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        response: String,
        /// Chat context: private, group or channel
        #[arg(long, default_value = "private")]
        context: ChatContext,
        #[arg(long)]
        group: Option<String>,
    },
    /// Show the most recent interactions for a user
    Query {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Show the most recent interactions in a group chat
    GroupQuery {
        #[arg(long)]
        group: String,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Re-probe all backends and print their health
    Stats,
    /// Force a specific backend to become active
    Switch { name: String },
    /// Print the name of the active backend
    Active,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration, falling back to defaults when no file exists
    let mut config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        StoreConfig::default()
    };
    apply_env_overrides(&mut config);

    // Apply CLI overrides
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    // Initialize tracing with configured level
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting interaction-store");
    info!("Data directory: {}", config.data_dir);
    info!("Configured backends: {}", config.backends.len());

    let mut router = StoreRouter::from_config(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize router: {}", e))?;

    info!("Active backend: {}", router.active_backend_name());

    match args.command {
        Command::Record {
            user,
            message,
            response,
            context,
            group,
        } => {
            let mut record = InteractionRecord::conversation(user, &message, &response, context);
            if let Some(group_id) = group {
                record = record.with_group(group_id);
            }
            router.record(record).await;
            println!("recorded via {}", router.active_backend_name());
        }
        Command::Query { user, limit } => {
            let records = router.query(&user, limit).await;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::GroupQuery { group, limit } => {
            let records = router.query_group(&group, limit).await;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Stats => {
            let stats = router.get_stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Switch { name } => match router.switch_active_backend(&name) {
            Ok(()) => println!("active backend is now {}", name),
            Err(e) => {
                eprintln!("switch failed: {}", e);
                std::process::exit(1);
            }
        },
        Command::Active => {
            println!("{}", router.active_backend_name());
        }
    }

    Ok(())
}
