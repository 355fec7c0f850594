//! Planner configuration structures.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::{AppResult, EngineConfig, RuleSet, DEFAULT_WORKLOAD_CAP};

/// Environment variable naming the JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "CREW_ROTA_CONFIG";
/// Environment variable overriding the workload cap.
pub const WORKLOAD_CAP_ENV: &str = "CREW_ROTA_WORKLOAD_CAP";

/// Store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendConfig {
    /// In-memory store for development/testing.
    InMemory,
    /// JSON file shared by every session.
    File {
        /// File location.
        path: PathBuf,
    },
}

impl Default for StoreBackendConfig {
    fn default() -> Self {
        Self::InMemory
    }
}

/// Save debounce and remote-change polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Quiet window before a save, in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Interval between remote-change polls, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

const fn default_debounce_ms() -> u64 {
    2_000
}

const fn default_poll_interval_secs() -> u64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl SyncConfig {
    /// Debounce window.
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Poll interval.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Rule sets by resource type and by resource id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Reject resource types without rules instead of using the permissive default.
    #[serde(default)]
    pub strict: bool,
    /// Rules keyed by resource type.
    #[serde(default)]
    pub types: HashMap<String, RuleSet>,
    /// Rules keyed by resource id.
    #[serde(default)]
    pub resources: HashMap<String, RuleSet>,
}

/// Root planner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Placements per employee per day.
    #[serde(default = "default_workload_cap")]
    pub workload_cap: u32,
    /// Persistence timing.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Store backend.
    #[serde(default)]
    pub store: StoreBackendConfig,
    /// Staffing rules.
    #[serde(default)]
    pub catalog: CatalogConfig,
}

const fn default_workload_cap() -> u32 {
    DEFAULT_WORKLOAD_CAP
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            workload_cap: DEFAULT_WORKLOAD_CAP,
            sync: SyncConfig::default(),
            store: StoreBackendConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.workload_cap == 0 {
            return Err("workload_cap must be greater than 0".into());
        }
        if self.sync.poll_interval_secs == 0 {
            return Err("poll_interval_secs must be greater than 0".into());
        }
        if let StoreBackendConfig::File { path } = &self.store {
            if path.as_os_str().is_empty() {
                return Err("file store needs a path".into());
            }
        }
        let rules = self
            .catalog
            .types
            .iter()
            .map(|(name, rules)| ("type", name, rules))
            .chain(self.catalog.resources.iter().map(|(name, rules)| ("resource", name, rules)));
        for (scope, name, rules) in rules {
            rules
                .validate()
                .map_err(|e| format!("{scope} `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Engine settings derived from this configuration.
    pub const fn engine(&self) -> EngineConfig {
        EngineConfig {
            workload_cap: self.workload_cap,
        }
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from the environment: `.env` is honoured, `CREW_ROTA_CONFIG` points
    /// to a JSON file (defaults apply without it) and `CREW_ROTA_WORKLOAD_CAP`
    /// overrides the cap.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {CONFIG_PATH_ENV}={path}"))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?
            }
            Err(_) => Self::default(),
        };
        if let Ok(cap) = std::env::var(WORKLOAD_CAP_ENV) {
            cfg.workload_cap = cap
                .parse()
                .with_context(|| format!("{WORKLOAD_CAP_ENV} must be an integer"))?;
        }
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }
}
