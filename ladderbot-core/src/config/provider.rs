//! Configuration providers polled once per cycle.
//!
//! A config change is just a new input to the next cycle: the orchestrator
//! swaps it in and keeps every symbol's rung state.

use std::path::PathBuf;
use std::time::SystemTime;

use tracing::{debug, warn};

use super::BotConfig;
use crate::error::Result;

pub trait ConfigProvider {
    /// Returns `Some` only when the configuration has changed since the last
    /// successful poll.
    fn poll(&mut self) -> Result<Option<BotConfig>>;
}

/// Hands out one config once, then never changes.
pub struct StaticProvider {
    pending: Option<BotConfig>,
}

impl StaticProvider {
    pub fn new(config: BotConfig) -> Self {
        Self {
            pending: Some(config),
        }
    }
}

impl ConfigProvider for StaticProvider {
    fn poll(&mut self) -> Result<Option<BotConfig>> {
        Ok(self.pending.take())
    }
}

/// Re-reads a TOML file when its modification time moves and reports a new
/// config only if the content fingerprint changed.
///
/// Invalid edits are logged and ignored; the last good config stays live.
pub struct FileProvider {
    path: PathBuf,
    last_modified: Option<SystemTime>,
    last_fingerprint: Option<String>,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_modified: None,
            last_fingerprint: None,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ConfigProvider for FileProvider {
    fn poll(&mut self) -> Result<Option<BotConfig>> {
        let modified = std::fs::metadata(&self.path)?.modified()?;
        if self.last_modified == Some(modified) {
            return Ok(None);
        }
        self.last_modified = Some(modified);

        let config = match BotConfig::load(&self.path) {
            Ok(config) => config,
            Err(err) if self.last_fingerprint.is_some() => {
                warn!(path = %self.path.display(), error = %err, "config reload rejected");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let fingerprint = config.fingerprint();
        if self.last_fingerprint.as_deref() == Some(fingerprint.as_str()) {
            debug!(path = %self.path.display(), "config rewritten without changes");
            return Ok(None);
        }
        self.last_fingerprint = Some(fingerprint);
        Ok(Some(config))
    }
}
