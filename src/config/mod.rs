//! Configuration: a single versioned JSON document under the data directory.

pub mod app_config;
pub mod migration;

pub use app_config::{
    default_data_dir, AppConfig, EventBusConfig, PipelineConfig, QueueConfig, WatcherConfig,
};
pub use migration::Migrate;
