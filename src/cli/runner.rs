//! CLI runner - executes commands

use crate::cli::commands::{parse_streams, Cli, Commands};
use crate::config::SourceConfig;
use crate::connectors::list_builtin;
use crate::engine::{SyncConfig, SyncEngine};
use crate::error::{Error, Result};
use crate::loader::{load_connector, ConnectorDefinition};
use crate::output::MessageWriter;
use crate::state::StateManager;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

/// CLI runner
#[derive(Debug)]
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Check => self.check().await,
            Commands::Discover => self.discover(),
            Commands::Read {
                streams,
                output,
                validate_primary_keys,
                full_refresh,
            } => {
                let config = SyncConfig::new()
                    .with_primary_key_validation(*validate_primary_keys)
                    .with_full_refresh(*full_refresh);
                self.read(streams.as_deref(), output.as_deref(), config)
                    .await
            }
            Commands::List => self.list_connectors(),
        }
    }

    /// Load the stream catalog
    fn load_connector(&self) -> Result<ConnectorDefinition> {
        load_connector(&self.cli.connector)
    }

    /// Load the source configuration; inline JSON wins over a file
    fn load_config(&self) -> Result<SourceConfig> {
        if let Some(ref json_str) = self.cli.config_json {
            let value = serde_json::from_str(json_str)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
            return SourceConfig::from_value(value);
        }

        match self.cli.config {
            Some(ref path) => SourceConfig::from_file(path),
            None => Err(Error::config(
                "No configuration given (use --config or --config-json)",
            )),
        }
    }

    /// Load state
    fn load_state(&self) -> Result<StateManager> {
        match self.cli.state {
            Some(ref path) => StateManager::from_file(path),
            None => Ok(StateManager::in_memory()),
        }
    }

    fn engine(&self) -> Result<SyncEngine> {
        SyncEngine::new(self.load_connector()?, self.load_config()?, self.load_state()?)
    }

    /// Check connection
    async fn check(&self) -> Result<()> {
        let engine = self.engine()?;
        let mut out = MessageWriter::stdout(self.cli.format);

        let status = match engine.check().await {
            Ok(()) => json!({
                "type": "CONNECTION_STATUS",
                "status": "SUCCEEDED",
                "message": format!("Connected to {}", engine.definition().name),
            }),
            Err(e) => json!({
                "type": "CONNECTION_STATUS",
                "status": "FAILED",
                "kind": e.kind(),
                "message": format!("Connection failed: {e}"),
            }),
        };
        out.write_json(&status)?;
        out.flush()
    }

    /// Describe streams
    fn discover(&self) -> Result<()> {
        let connector = self.load_connector()?;
        let mut out = MessageWriter::stdout(self.cli.format);
        out.write_json(&json!({
            "type": "CATALOG",
            "connector": connector.name,
            "streams": crate::engine::discover(&connector),
        }))?;
        out.flush()
    }

    /// Read streams
    async fn read(
        &self,
        streams: Option<&str>,
        output: Option<&Path>,
        config: SyncConfig,
    ) -> Result<()> {
        let engine = self.engine()?.with_config(config);

        let token = engine.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping sync");
                token.cancel();
            }
        });

        let selection = parse_streams(streams);
        let selection: Vec<&str> = selection.iter().map(String::as_str).collect();
        let mut run = engine.read(&selection)?;

        match output {
            Some(path) => {
                let mut out = MessageWriter::create(path, self.cli.format)?;
                while let Some(message) = run.next_message().await {
                    out.write(&message)?;
                }
                out.flush()?;
            }
            None => {
                let mut out = MessageWriter::stdout(self.cli.format);
                while let Some(message) = run.next_message().await {
                    out.write(&message)?;
                }
                out.flush()?;
            }
        }

        let stats = run.stats();
        info!(
            "Synced {} records ({} pages) from {} streams in {}ms",
            stats.records_synced, stats.pages_fetched, stats.streams_synced, stats.duration_ms
        );
        Ok(())
    }

    /// List built-in catalogs
    fn list_connectors(&self) -> Result<()> {
        let connectors = list_builtin()
            .into_iter()
            .map(|name| {
                let def = load_connector(name)?;
                Ok(json!({
                    "name": def.name,
                    "version": def.version,
                    "streams": def.stream_names(),
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = MessageWriter::stdout(self.cli.format);
        out.write_json(&json!({
            "type": "CONNECTORS",
            "connectors": connectors,
        }))?;
        out.flush()
    }
}
