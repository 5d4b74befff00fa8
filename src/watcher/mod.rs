//! File Watcher Module
//!
//! Watches the backend source tree and entry point and turns bursts of
//! filesystem writes into debounced [`ChangeEvent`]s.
//! Uses notify-rs for cross-platform file system events.

mod debounce;
mod filter;

pub use filter::{FilterResult, PathFilter, PathFilterConfig};

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::Stream;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::error::WatchSetupError;

/// Paths to monitor plus the debounce window. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSet {
    paths: BTreeSet<PathBuf>,
    debounce: Duration,
}

impl WatchSet {
    pub fn new<I, P>(paths: I, debounce: Duration) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            debounce,
        }
    }

    pub fn paths(&self) -> &BTreeSet<PathBuf> {
        &self.paths
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }
}

/// One coalesced burst of filesystem modifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Unique event ID
    pub id: Uuid,
    /// When the debounce window closed
    pub timestamp: DateTime<Utc>,
    /// Every path touched during the window
    pub affected_paths: BTreeSet<PathBuf>,
}

impl ChangeEvent {
    pub fn new(affected_paths: BTreeSet<PathBuf>) -> Self {
        Self {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            affected_paths,
        }
    }

    /// Short description for status lines: first path plus a count
    pub fn summary(&self) -> String {
        let mut paths = self.affected_paths.iter();
        match paths.next() {
            None => "no paths".to_string(),
            Some(first) => {
                let rest = self.affected_paths.len() - 1;
                if rest == 0 {
                    first.display().to_string()
                } else {
                    format!("{} (+{} more)", first.display(), rest)
                }
            }
        }
    }
}

/// Buffered debounced events not yet taken by the supervisor
const EVENT_BUFFER: usize = 64;

/// Which raw paths belong to the watch set
#[derive(Debug, Default)]
struct WatchScope {
    /// Recursively watched directories
    dirs: Vec<PathBuf>,
    /// Individually watched files (observed through their parent)
    files: HashSet<PathBuf>,
}

impl WatchScope {
    fn contains(&self, path: &Path) -> bool {
        self.files.contains(path) || self.dirs.iter().any(|dir| path.starts_with(dir))
    }
}

/// Builds the debounced change stream for a [`WatchSet`]
pub struct FileWatcher {
    watch_set: WatchSet,
    filter: Arc<PathFilter>,
}

impl FileWatcher {
    /// Create a watcher with the default ignore list
    pub fn new(watch_set: WatchSet) -> Result<Self, WatchSetupError> {
        Ok(Self::with_filter(watch_set, PathFilter::with_defaults()?))
    }

    pub fn with_filter(watch_set: WatchSet, filter: PathFilter) -> Self {
        Self {
            watch_set,
            filter: Arc::new(filter),
        }
    }

    /// Start watching. Every configured path must exist now; paths that
    /// disappear later are tolerated. The returned stream ends once
    /// `cancel` fires or the stream is closed.
    pub fn watch(self, cancel: CancellationToken) -> Result<ChangeStream, WatchSetupError> {
        if self.watch_set.paths.is_empty() {
            return Err(WatchSetupError::EmptyWatchSet);
        }

        let mut scope = WatchScope::default();
        let mut targets: Vec<(PathBuf, RecursiveMode)> = Vec::new();
        for path in &self.watch_set.paths {
            let canonical = path
                .canonicalize()
                .map_err(|_| WatchSetupError::PathNotFound { path: path.clone() })?;

            if canonical.is_dir() {
                scope.dirs.push(canonical.clone());
                targets.push((canonical, RecursiveMode::Recursive));
            } else {
                let parent = canonical
                    .parent()
                    .map(Path::to_path_buf)
                    .ok_or_else(|| WatchSetupError::PathNotFound { path: path.clone() })?;
                scope.files.insert(canonical);
                targets.push((parent, RecursiveMode::NonRecursive));
            }
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<PathBuf>();
        let scope = Arc::new(scope);
        let filter = Arc::clone(&self.filter);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if !is_modification(&event.kind) {
                        return;
                    }
                    for path in event.paths {
                        if scope.contains(&path)
                            && filter.should_filter(&path) == FilterResult::Include
                        {
                            let _ = raw_tx.send(path);
                        }
                    }
                }
                Err(e) => tracing::debug!("watch backend error: {}", e),
            },
        )
        .map_err(|e| WatchSetupError::Notify {
            path: PathBuf::new(),
            source: e,
        })?;

        for (target, mode) in &targets {
            watcher
                .watch(target, *mode)
                .map_err(|e| WatchSetupError::Notify {
                    path: target.clone(),
                    source: e,
                })?;
        }

        tracing::info!(
            "[watcher] watching {} (debounce {:?})",
            self.watch_set
                .paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            self.watch_set.debounce
        );

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(debounce::run_debouncer(
            raw_rx,
            self.watch_set.debounce,
            event_tx,
            cancel.clone(),
        ));

        Ok(ChangeStream {
            events: event_rx,
            cancel,
            watcher: Some(watcher),
        })
    }
}

/// Content and namespace changes count; access and metadata-only do not
fn is_modification(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Any => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        EventKind::Access(_) | EventKind::Other => false,
    }
}

/// Lazy, infinite sequence of debounced change events.
///
/// Ends only when cancelled; dropping the stream cancels it and releases
/// the OS watch.
pub struct ChangeStream {
    events: mpsc::Receiver<ChangeEvent>,
    cancel: CancellationToken,
    watcher: Option<RecommendedWatcher>,
}

impl ChangeStream {
    /// Stream fed directly from a channel, without an OS watch
    pub fn from_receiver(events: mpsc::Receiver<ChangeEvent>, cancel: CancellationToken) -> Self {
        Self {
            events,
            cancel,
            watcher: None,
        }
    }

    /// Next debounced event, or `None` once cancelled
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        if self.cancel.is_cancelled() {
            self.release();
            return None;
        }
        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => Some(event),
        };
        match next {
            Some(event) => event,
            None => {
                self.release();
                None
            }
        }
    }

    /// Stop watching; no further events are delivered
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.release();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn release(&mut self) {
        if self.watcher.take().is_some() {
            tracing::info!("[watcher] stopped");
        }
        self.events.close();
    }
}

impl Stream for ChangeStream {
    type Item = ChangeEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ChangeEvent>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            this.release();
            return Poll::Ready(None);
        }
        this.events.poll_recv(cx)
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
