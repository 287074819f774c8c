//! Application configuration

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::migration::Migrate;

/// Bounded worker pool and dispatcher tunables for the job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    pub dispatch_interval_ms: u64,
    pub default_max_retries: u32,
    pub retry_backoff_base_secs: u64,
    pub retry_backoff_cap_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            dispatch_interval_ms: 1_000,
            default_max_retries: 3,
            retry_backoff_base_secs: 2,
            retry_backoff_cap_secs: 300,
        }
    }
}

/// Per-file sub-pipeline tunables shared by index/reindex/incremental_update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub progress_every_n_files: usize,
    pub per_call_deadline_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            progress_every_n_files: 5,
            per_call_deadline_secs: 60,
        }
    }
}

/// Default watcher tunables; a collection's own `debounce_ms` takes
/// precedence when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    pub default_debounce_ms: u64,
    pub default_scan_interval_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            default_debounce_ms: 2_000,
            default_scan_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    pub subscriber_buffer: usize,
    pub heartbeat_secs: u64,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
            heartbeat_secs: 30,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config schema version
    pub version: u32,

    /// Data directory path: holds collections.db, jobs.db, vectors/, watcher/
    pub data_dir: PathBuf,

    /// Logging level
    pub log_level: String,

    pub queue: QueueConfig,
    pub pipeline: PipelineConfig,
    pub watcher: WatcherConfig,
    pub events: EventBusConfig,
}

impl AppConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let data_dir = default_data_dir()?;
        Self::load_from(&data_dir)
    }

    /// Load configuration from a specific data directory
    pub fn load_from(data_dir: &PathBuf) -> Result<Self> {
        let config_path = data_dir.join("vaultdex.json");

        if config_path.exists() {
            info!("Loading config from {:?}", config_path);
            let json = fs::read_to_string(&config_path)?;
            let mut config: AppConfig = serde_json::from_str(&json)?;

            if config.version < Self::target_version() {
                info!(
                    "Migrating config from v{} to v{}",
                    config.version,
                    Self::target_version()
                );
                config.migrate()?;
                config.save()?;
            }

            Ok(config)
        } else {
            warn!("No config found, creating default at {:?}", config_path);
            let config = Self::default_with_dir(data_dir.clone());
            config.save()?;
            Ok(config)
        }
    }

    /// Load or create configuration
    pub fn load_or_create(data_dir: &PathBuf) -> Result<Self> {
        Self::load_from(data_dir).or_else(|_| {
            let config = Self::default_with_dir(data_dir.clone());
            config.save()?;
            Ok(config)
        })
    }

    /// Create default configuration with specific data directory
    pub fn default_with_dir(data_dir: PathBuf) -> Self {
        Self {
            version: Self::target_version(),
            data_dir,
            log_level: "info".to_string(),
            queue: QueueConfig::default(),
            pipeline: PipelineConfig::default(),
            watcher: WatcherConfig::default(),
            events: EventBusConfig::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;

        let config_path = self.data_dir.join("vaultdex.json");
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, json)?;
        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    pub fn collections_db_path(&self) -> PathBuf {
        self.data_dir.join("collections.db")
    }

    pub fn jobs_db_path(&self) -> PathBuf {
        self.data_dir.join("jobs.db")
    }

    pub fn vectors_dir(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    pub fn watcher_state_dir(&self) -> PathBuf {
        self.data_dir.join("watcher")
    }

    pub fn watcher_state_path(&self, collection: &str) -> PathBuf {
        self.watcher_state_dir().join(format!("{collection}.json"))
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(self.vectors_dir())?;
        fs::create_dir_all(self.watcher_state_dir())?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::default_with_dir(data_dir)
    }
}

impl Migrate for AppConfig {
    fn current_version(&self) -> u32 {
        self.version
    }

    fn target_version() -> u32 {
        1
    }

    fn migrate(&mut self) -> Result<()> {
        match self.version {
            0 => {
                self.version = 1;
                Ok(())
            }
            1 => Ok(()),
            v => Err(anyhow!("Unknown config version: {}", v)),
        }
    }
}

/// The platform data directory, `<data-dir>/vaultdex`.
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("vaultdex"))
        .ok_or_else(|| anyhow!("could not determine platform data directory"))
}
