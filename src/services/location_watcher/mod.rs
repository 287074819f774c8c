pub mod utils;
pub mod watcher;

pub use watcher::{ChangeWatcher, WatcherError, WatcherResult};
