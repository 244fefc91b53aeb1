//! Re-run support for `--watch`.
//!
//! Watches the replay script's parent directory with notify and reports a
//! change once events for the script have settled for the debounce window.
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{trace, warn};

/// Debounced change notifications for one script file.
pub struct ScriptWatcher {
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
    root: PathBuf,
    script: PathBuf,
    script_name: Option<OsString>,
    debounce: Duration,
    last_event: Option<Instant>,
}

impl ScriptWatcher {
    /// Start watching `path`.
    ///
    /// # Errors
    /// Returns an error if the platform watcher cannot be created or the
    /// script's directory cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        // OS events carry canonical paths.
        let script = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let script_name = script.file_name().map(std::ffi::OsStr::to_os_string);
        let root = parent_dir(&script);

        let (tx, events) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        // Editors often save by rename, so watch the directory, not the file.
        watcher.watch(&root, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            events,
            root,
            script,
            script_name,
            debounce,
            last_event: None,
        })
    }

    pub fn script_path(&self) -> &Path {
        &self.script
    }

    /// Drain pending events. Returns `true` once the script changed and the
    /// debounce window has passed since the last relevant event.
    pub fn poll(&mut self) -> bool {
        let mut relevant = 0u32;
        while let Ok(event) = self.events.try_recv() {
            match event {
                Ok(ev) if self.concerns_script(&ev) => relevant += 1,
                Ok(ev) => trace!(kind = ?ev.kind, paths = ?ev.paths, "ignoring watch event"),
                Err(err) => warn!(%err, "watch error"),
            }
        }
        if relevant > 0 {
            trace!(relevant, script = %self.script.display(), "script touched");
            self.last_event = Some(Instant::now());
        }

        match self.last_event {
            Some(at) if at.elapsed() >= self.debounce => {
                self.last_event = None;
                true
            }
            _ => false,
        }
    }

    fn concerns_script(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.root
                || path == &self.script
                || self
                    .script_name
                    .as_ref()
                    .is_some_and(|name| path.file_name() == Some(name.as_os_str()))
        })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
