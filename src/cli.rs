use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cctray_status::cctray::{enumerate, ProjectStatus, ReconciliationEngine, StatusCache};
use cctray_status::config::Config;

#[derive(Parser)]
#[command(name = "cctray")]
#[command(author, version, about = "CCTray status cache tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./cctray.{toml,json,yaml,yml})
    #[arg(short, long, global = true, env = "CCTRAY_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List feed identifiers of the configured topology in feed order
    Names,

    /// Rebuild cache entries for the configured topology
    Reconcile {
        /// Entries of a previous run to start from (JSON array)
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Override the history file location
        #[arg(long)]
        history: Option<PathBuf>,
    },
}

impl Cli {
    fn execute_names(&self, config: &Config) -> Result<()> {
        let names = enumerate(&config.topology);
        info!("Topology has {} feed entries", names.len());
        self.write_json(&names)
    }

    async fn execute_reconcile(
        &self,
        mut config: Config,
        previous: Option<&Path>,
        history: Option<&Path>,
    ) -> Result<()> {
        if let Some(history) = history {
            config.history.path = Some(history.to_path_buf());
        }

        let store = config.history_store()?;
        info!("Reading stage history from: {}", store.path().display());

        let cache = Arc::new(StatusCache::new());
        if let Some(previous) = previous {
            let contents = std::fs::read_to_string(previous)
                .with_context(|| format!("Failed to read previous entries: {}", previous.display()))?;
            let entries: Vec<ProjectStatus> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse previous entries: {}", previous.display()))?;
            info!("Starting from {} previous entries", entries.len());
            cache.replace_all_entries_in_cache_with(entries);
        }

        let engine = ReconciliationEngine::new(Arc::clone(&cache), store);
        let topology = config.topology;
        tokio::task::spawn_blocking(move || engine.reconcile(&topology))
            .await
            .context("Reconciliation task aborted")?
            .context("Reconciliation failed")?;

        self.write_json(&cache.all_entries_in_order())
    }

    fn write_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        let json_output = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, json_output)?;
            info!("Output written to: {}", output_path.display());
        } else {
            println!("{}", json_output);
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Names => self.execute_names(&config),
            Commands::Reconcile { previous, history } => {
                self.execute_reconcile(config, previous.as_deref(), history.as_deref())
                    .await
            }
        }
    }
}
