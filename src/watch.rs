//! File system watcher for live rebuild.
//!
//! Any change to a watched input triggers a full rebuild.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌──────────────┐    ┌────────────────┐
//! │  notify  │───▶│ Debouncer │───▶│ RebuildQueue │───▶│ rebuild worker │
//! │  events  │    │  (300ms)  │    │ (one slot)   │    │  build_site()  │
//! └──────────┘    └───────────┘    └──────────────┘    └───────┬────────┘
//!       ▲                                                      │
//!       └──────────── refresh watch set ◀──────────────────────┘
//! ```
//!
//! Watched: the config file, the templates directory and every file in the
//! last manifest. Requests that arrive while a rebuild runs collapse into a
//! single follow-up rebuild.

use crate::{
    build::build_site,
    config::SiteConfig,
    crawl::SourceManifest,
    log,
    reload::ReloadServer,
};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        mpsc::{self, RecvTimeoutError, Sender},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;

// =============================================================================
// Rebuild Queue
// =============================================================================

#[derive(Default)]
struct QueueState {
    pending: bool,
    closed: bool,
}

/// One-slot rebuild request queue drained by a single worker.
///
/// At most one rebuild runs at a time. Any number of requests made while it
/// runs result in exactly one more rebuild.
#[derive(Default)]
pub struct RebuildQueue {
    state: Mutex<QueueState>,
    wake: Condvar,
}

impl RebuildQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request(&self) {
        let mut state = self.state.lock();
        state.pending = true;
        self.wake.notify_one();
    }

    /// Stop the worker once its current rebuild (if any) finishes.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.wake.notify_one();
    }

    /// Block until a request is pending. Returns `false` once closed.
    fn next(&self) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return false;
            }
            if state.pending {
                state.pending = false;
                return true;
            }
            self.wake.wait(&mut state);
        }
    }

    /// Spawn the worker thread that runs `rebuild` for each request.
    pub fn spawn_worker<F>(self: &Arc<Self>, mut rebuild: F) -> JoinHandle<()>
    where
        F: FnMut() + Send + 'static,
    {
        let queue = Arc::clone(self);
        thread::spawn(move || {
            while queue.next() {
                rebuild();
            }
        })
    }
}

// =============================================================================
// Debounce State
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}

/// Batches rapid file events.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        self.pending.drain().collect()
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_secs(60)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Watch Set
// =============================================================================

/// Inputs to watch for one build.
pub fn watch_paths(config: &SiteConfig, manifest: &SourceManifest) -> Vec<(PathBuf, RecursiveMode)> {
    let mut paths = vec![(config.config_path(), RecursiveMode::NonRecursive)];

    let templates = config.templates_path();
    if templates.is_dir() {
        paths.push((templates, RecursiveMode::Recursive));
    }

    paths.extend(
        manifest
            .all()
            .map(|rel| (config.root.join(rel), RecursiveMode::NonRecursive)),
    );
    paths
}

/// Replace everything `watcher` watches with `paths`.
fn refresh(
    watcher: &mut RecommendedWatcher,
    watched: &mut Vec<PathBuf>,
    paths: Vec<(PathBuf, RecursiveMode)>,
) {
    for path in watched.drain(..) {
        let _ = watcher.unwatch(&path);
    }
    for (path, mode) in paths {
        match watcher.watch(&path, mode) {
            Ok(()) => watched.push(path),
            Err(err) => log!("watch"; "cannot watch {}: {err}", path.display()),
        }
    }
}

// =============================================================================
// Event Loop
// =============================================================================

enum Message {
    Fs(notify::Result<Event>),
    Refresh(Vec<(PathBuf, RecursiveMode)>),
}

/// Rebuild with a freshly loaded config; server settings stay fixed.
fn rebuild(base: &SiteConfig) -> Result<crate::build::Build> {
    let mut config = SiteConfig::load(&base.root, &base.config_file)?;
    config.serve = base.serve.clone();
    config.validate()?;
    build_site(&config)
}

/// Start watching and rebuilding in background threads.
///
/// Returns once the initial watch set is installed.
pub fn watch_site(
    config: &SiteConfig,
    manifest: &SourceManifest,
    reload: Option<ReloadServer>,
) -> Result<()> {
    let (tx, rx) = mpsc::channel();

    let fs_tx = tx.clone();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = fs_tx.send(Message::Fs(res));
    })
    .context("Failed to create file watcher")?;

    let mut watched = Vec::new();
    refresh(&mut watcher, &mut watched, watch_paths(config, manifest));
    log!("watch"; "watching {} paths", watched.len());

    let queue = RebuildQueue::new();
    queue.spawn_worker(rebuild_job(config.clone(), tx, reload));

    thread::spawn(move || {
        let mut debouncer = Debouncer::new();
        loop {
            match rx.recv_timeout(debouncer.timeout()) {
                Ok(Message::Fs(Ok(event))) if is_relevant(&event) => debouncer.add(event),
                Ok(Message::Fs(Err(err))) => log!("watch"; "error: {err}"),
                Ok(Message::Refresh(paths)) => refresh(&mut watcher, &mut watched, paths),
                Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                    let changed = debouncer.take();
                    log_changes(&changed);
                    queue.request();
                }
                Err(RecvTimeoutError::Disconnected) => break,
                _ => {}
            }
        }
        queue.close();
    });

    Ok(())
}

fn rebuild_job(
    config: SiteConfig,
    tx: Sender<Message>,
    reload: Option<ReloadServer>,
) -> impl FnMut() + Send + 'static {
    move || match rebuild(&config) {
        Ok(build) => {
            let paths = watch_paths(&config, &build.manifest);
            let _ = tx.send(Message::Refresh(paths));
            if let Some(reload) = &reload {
                let clients = reload.broadcast();
                log!("reload"; "notified {clients} pages");
            }
        }
        Err(err) => {
            log!("error"; "rebuild failed: {err:#}");
            log!("watch"; "still watching");
        }
    }
}

fn log_changes(paths: &[PathBuf]) {
    match paths {
        [] => {}
        [one] => log!("watch"; "{} changed, rebuilding...", one.display()),
        [first, rest @ ..] => {
            log!("watch"; "{} and {} more changed, rebuilding...", first.display(), rest.len());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
