//! The change watcher: a native filesystem watcher per collection plus a
//! periodic scan, debounced and coalesced before anything reaches the queue.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use globset::GlobSet;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::domain::change_event::{ChangeEvent, ChangeKind};
use crate::domain::job::{JobPayload, JobPriority};
use crate::infrastructure::jobs::JobQueue;
use crate::operations::collections::CollectionRegistry;
use crate::operations::indexing::filters::{build_ignore_set, is_indexable};

use super::utils::{load_snapshots, save_snapshots, snapshot_file};

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error(transparent)]
    Notify(#[from] notify::Error),
    #[error("collection not found: {0}")]
    NotFound(String),
    #[error("collection already watched: {0}")]
    AlreadyWatched(String),
}

pub type WatcherResult<T> = Result<T, WatcherError>;

struct PendingChange {
    kind: ChangeKind,
    debounce: Duration,
    first_seen: Instant,
}

struct WatchedCollection {
    path: PathBuf,
    debounce: Duration,
    scan_interval: Duration,
    ignore: GlobSet,
    _fs_watcher: RecommendedWatcher,
}

pub struct ChangeWatcher {
    registry: Arc<CollectionRegistry>,
    queue: Arc<JobQueue>,
    data_dir: PathBuf,
    watched: Mutex<HashMap<String, WatchedCollection>>,
    pending: Mutex<HashMap<(String, PathBuf), PendingChange>>,
}

impl ChangeWatcher {
    pub fn new(registry: Arc<CollectionRegistry>, queue: Arc<JobQueue>, data_dir: PathBuf) -> Arc<Self> {
        let watcher = Arc::new(Self {
            registry,
            queue,
            data_dir,
            watched: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        });
        let flusher = watcher.clone();
        tokio::spawn(async move { flusher.debounce_flush_loop().await });
        watcher
    }

    fn snapshot_path(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("{collection}.json"))
    }

    pub async fn add(
        self: &Arc<Self>,
        collection: &str,
        path: PathBuf,
        debounce_ms: u64,
        scan_interval_secs: u64,
        ignore_patterns: &[String],
    ) -> WatcherResult<()> {
        let mut watched = self.watched.lock().await;
        if watched.contains_key(collection) {
            return Err(WatcherError::AlreadyWatched(collection.to_string()));
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let mut fs_watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = tx.send(event);
                }
            },
            Config::default(),
        )?;
        fs_watcher.watch(&path, RecursiveMode::Recursive)?;

        let ignore = build_ignore_set(ignore_patterns);
        let root = path.clone();
        let debounce = Duration::from_millis(debounce_ms);
        let consumer_name = collection.to_string();
        let watcher = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                watcher.record_pending(&consumer_name, &root, event).await;
            }
        });

        watched.insert(
            collection.to_string(),
            WatchedCollection {
                path: path.clone(),
                debounce,
                scan_interval: Duration::from_secs(scan_interval_secs.max(1)),
                ignore,
                _fs_watcher: fs_watcher,
            },
        );
        drop(watched);

        self.spawn_scan_loop(collection.to_string(), path, Duration::from_secs(scan_interval_secs.max(1)));
        Ok(())
    }

    pub async fn remove(&self, collection: &str) -> WatcherResult<()> {
        self.watched
            .lock()
            .await
            .remove(collection)
            .map(|_| ())
            .ok_or_else(|| WatcherError::NotFound(collection.to_string()))
    }

    pub async fn update(&self, collection: &str, debounce_ms: u64, ignore_patterns: &[String]) -> WatcherResult<()> {
        let mut watched = self.watched.lock().await;
        let entry = watched.get_mut(collection).ok_or_else(|| WatcherError::NotFound(collection.to_string()))?;
        entry.debounce = Duration::from_millis(debounce_ms);
        entry.ignore = build_ignore_set(ignore_patterns);
        Ok(())
    }

    pub async fn list(&self) -> Vec<String> {
        self.watched.lock().await.keys().cloned().collect()
    }

    /// Looks up the collection's *current* debounce/ignore settings on every
    /// call so an `update()` takes effect on the next event, not just on
    /// collections added afterwards.
    async fn record_pending(&self, collection: &str, root: &Path, event: Event) {
        let watched = self.watched.lock().await;
        let Some(entry) = watched.get(collection) else { return };
        let debounce = entry.debounce;
        let ignore = entry.ignore.clone();
        drop(watched);

        let changes = classify(root, &ignore, &event);
        if changes.is_empty() {
            return;
        }
        let mut pending = self.pending.lock().await;
        for (path, kind) in changes {
            let key = (collection.to_string(), path);
            pending.insert(key, PendingChange { kind, debounce, first_seen: Instant::now() });
        }
    }

    fn spawn_scan_loop(self: &Arc<Self>, collection: String, root: PathBuf, interval: Duration) {
        let watcher = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let ignore = {
                    let watched = watcher.watched.lock().await;
                    match watched.get(&collection) {
                        Some(entry) => entry.ignore.clone(),
                        None => return,
                    }
                };
                if let Err(e) = watcher.scan_now(&collection, &root, &ignore).await {
                    error!(collection = %collection, error = %e, "periodic scan failed");
                }
            }
        });
    }

    /// Compare the vault against its persisted snapshot, looking for drift
    /// that happened while nothing was watching (e.g. a restart).
    pub async fn scan_now(&self, collection: &str, root: &Path, ignore: &GlobSet) -> WatcherResult<()> {
        let snap_path = self.snapshot_path(collection);
        let mut previous = load_snapshots(&snap_path).await;
        let mut current = HashMap::new();
        let mut added = Vec::new();
        let mut modified = Vec::new();

        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else { continue };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let Ok(rel) = path.strip_prefix(root) else { continue };
                if !is_indexable(rel, ignore) {
                    continue;
                }
                let Ok(snapshot) = snapshot_file(&path).await else { continue };
                match previous.remove(rel) {
                    Some(old) if old == snapshot => {}
                    Some(_) => modified.push(path.clone()),
                    None => added.push(path.clone()),
                }
                current.insert(rel.to_path_buf(), snapshot);
            }
        }
        let deleted: Vec<PathBuf> = previous.keys().map(|rel| root.join(rel)).collect();

        if let Err(e) = save_snapshots(&snap_path, &current).await {
            warn!(error = %e, "failed to persist watcher snapshot");
        }

        if !added.is_empty() || !modified.is_empty() || !deleted.is_empty() {
            self.enqueue_incremental(collection, added, modified, deleted).await;
        }
        Ok(())
    }

    async fn debounce_flush_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        loop {
            ticker.tick().await;
            self.flush_due().await;
        }
    }

    async fn flush_due(&self) {
        let now = Instant::now();
        let mut due: HashMap<String, (Vec<PathBuf>, Vec<PathBuf>, Vec<PathBuf>)> = HashMap::new();

        let mut pending = self.pending.lock().await;
        pending.retain(|(collection, path), change| {
            if now.duration_since(change.first_seen) < change.debounce {
                return true;
            }
            let bucket = due.entry(collection.clone()).or_default();
            match change.kind {
                ChangeKind::Added => bucket.0.push(path.clone()),
                ChangeKind::Modified => bucket.1.push(path.clone()),
                ChangeKind::Deleted => bucket.2.push(path.clone()),
            }
            false
        });
        drop(pending);

        for (collection, (added, modified, deleted)) in due {
            self.enqueue_incremental(&collection, added, modified, deleted).await;
        }
    }

    async fn enqueue_incremental(&self, collection: &str, added: Vec<PathBuf>, modified: Vec<PathBuf>, deleted: Vec<PathBuf>) {
        let payload = JobPayload::IncrementalUpdate {
            collection: collection.to_string(),
            added,
            modified,
            deleted,
        };
        match self.queue.create(payload, JobPriority::NORMAL).await {
            Ok(id) => info!(job = %id, collection, "enqueued incremental_update from watcher"),
            Err(e) => warn!(collection, error = %e, "could not enqueue incremental_update, will retry on next scan"),
        }
    }
}

/// Map a raw notify event onto zero or more `(relative_path, kind)` pairs.
/// A rename/move becomes `deleted(old)` + `added(new)` per §4.4.
fn classify(root: &Path, ignore: &GlobSet, event: &Event) -> Vec<(PathBuf, ChangeKind)> {
    let relevant = |p: &Path| p.strip_prefix(root).ok().filter(|rel| is_indexable(rel, ignore)).map(|rel| rel.to_path_buf());

    match &event.kind {
        EventKind::Create(_) => event.paths.iter().filter_map(|p| relevant(p)).map(|p| (p, ChangeKind::Added)).collect(),
        EventKind::Remove(_) => event.paths.iter().filter_map(|p| relevant(p)).map(|p| (p, ChangeKind::Deleted)).collect(),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) if event.paths.len() == 2 => {
            let mut out = Vec::new();
            if let Some(old) = relevant(&event.paths[0]) {
                out.push((old, ChangeKind::Deleted));
            }
            if let Some(new) = relevant(&event.paths[1]) {
                out.push((new, ChangeKind::Added));
            }
            out
        }
        EventKind::Modify(_) => event.paths.iter().filter_map(|p| relevant(p)).map(|p| (p, ChangeKind::Modified)).collect(),
        _ => Vec::new(),
    }
}

/// Turn a classified change into the `ChangeEvent` shape published on the
/// event bus, for callers that want to observe raw detections.
pub fn to_change_event(collection: &str, path: PathBuf, kind: ChangeKind) -> ChangeEvent {
    ChangeEvent { collection: collection.to_string(), path, kind, detected_at: chrono::Utc::now() }
}
