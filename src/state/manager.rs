//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::cursor::CursorValue;
use super::types::{State, StreamCheckpoint};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// State manager for persisting and loading state
#[derive(Debug)]
pub struct StateManager {
    /// Path to the state file
    path: PathBuf,
    /// Current state (cached)
    state: Arc<RwLock<State>>,
    /// Whether to save on every stream update
    auto_save: bool,
}

impl StateManager {
    /// Create a new state manager with the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(RwLock::new(State::new())),
            auto_save: true,
        }
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(State::new())),
            auto_save: false,
        }
    }

    /// Create an in-memory state manager seeded with a state
    pub fn with_state(state: State) -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(state)),
            auto_save: false,
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse_state(&contents)?
        } else {
            State::new()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
            auto_save: true,
        })
    }

    /// Create a state manager from inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::with_state(parse_state(json)?))
    }

    /// Load state from file
    pub async fn load(&self) -> Result<()> {
        if self.is_in_memory() || !self.path.exists() {
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
        let loaded = parse_state(&contents)?;

        *self.state.write().await = loaded;
        Ok(())
    }

    /// Save current state to file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        let contents = self.to_json_pretty().await?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        debug!("State saved to {}", self.path.display());
        Ok(())
    }

    /// Get a read lock on the current state
    pub async fn state(&self) -> tokio::sync::RwLockReadGuard<'_, State> {
        self.state.read().await
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Get the checkpoint value for a stream
    pub async fn get_cursor(&self, stream: &str) -> Option<CursorValue> {
        self.state.read().await.get_cursor(stream).cloned()
    }

    /// Record a terminated stream's checkpoint, saving if auto-save is on
    pub async fn set_stream_state(&self, stream: &str, checkpoint: StreamCheckpoint) -> Result<()> {
        self.state.write().await.set_stream(stream, checkpoint);

        if self.auto_save {
            self.save().await?;
        }

        Ok(())
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
            auto_save: self.auto_save,
        }
    }
}

fn parse_state(contents: &str) -> Result<State> {
    if contents.trim().is_empty() {
        return Ok(State::new());
    }
    serde_json::from_str(contents).map_err(|e| Error::state(format!("Failed to parse state: {e}")))
}
