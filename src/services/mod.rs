//! Long-running services that sit above the core operations: right now just
//! the filesystem change watcher.

pub mod location_watcher;

pub use location_watcher::ChangeWatcher;
