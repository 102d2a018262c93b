//! Hot-reload watch loop.
//!
//! Polls a file's modification time on a fixed interval. When it changes the
//! full text is re-read on a worker thread and handed back through a channel
//! that belongs to the session, so disarming drops the receiver and a read
//! that finishes afterwards has nowhere to deliver its result.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

/// Default poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Contents of a file at one point in time
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    pub text: String,
    pub modified: SystemTime,
}

/// A re-readable reference to a file on disk
pub trait FileRef: Send + Sync {
    fn name(&self) -> String;

    /// Cheap poll that does not read the body
    fn modified(&self) -> io::Result<SystemTime>;

    fn read(&self) -> io::Result<FileSnapshot>;
}

/// [`FileRef`] backed by a filesystem path
#[derive(Debug, Clone)]
pub struct PathRef {
    path: PathBuf,
}

impl PathRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FileRef for PathRef {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn modified(&self) -> io::Result<SystemTime> {
        fs::metadata(&self.path)?.modified()
    }

    fn read(&self) -> io::Result<FileSnapshot> {
        // Read as bytes so invalid UTF-8 degrades instead of failing
        let bytes = fs::read(&self.path)?;
        let modified = self.modified()?;
        if std::str::from_utf8(&bytes).is_err() {
            log::warn!("File {:?} contains invalid UTF-8", self.path);
        }
        Ok(FileSnapshot {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            modified,
        })
    }
}

/// Something the UI layer should hear about
#[derive(Debug)]
pub enum WatchEvent {
    Changed(FileSnapshot),
    Error {
        message: String,
        /// Errors seen in a row, reset by the next successful tick
        consecutive: u32,
    },
}

struct WatchSession {
    handle: Arc<dyn FileRef>,
    last_modified: SystemTime,
    interval: Duration,
    next_tick: Instant,
    pending: Option<Receiver<io::Result<FileSnapshot>>>,
    consecutive_errors: u32,
}

impl WatchSession {
    fn error(&mut self, err: io::Error) -> WatchEvent {
        self.consecutive_errors += 1;
        log::warn!(
            "File watch error on {} (#{}): {}",
            self.handle.name(),
            self.consecutive_errors,
            err
        );
        WatchEvent::Error {
            message: err.to_string(),
            consecutive: self.consecutive_errors,
        }
    }
}

/// Disarmed when `session` is `None`
#[derive(Default)]
pub struct WatchLoop {
    session: Option<WatchSession>,
}

impl WatchLoop {
    pub fn is_armed(&self) -> bool {
        self.session.is_some()
    }

    /// Whether a changed file is being re-read right now
    pub fn is_reading(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.pending.is_some())
    }

    /// Start watching `handle`, replacing any running session
    pub fn arm(&mut self, handle: Arc<dyn FileRef>, interval: Duration, now: Instant) -> io::Result<()> {
        self.disarm();

        let last_modified = handle.modified()?;
        log::info!("Started watching file: {} (every {:?})", handle.name(), interval);
        self.session = Some(WatchSession {
            handle,
            last_modified,
            interval,
            next_tick: now + interval,
            pending: None,
            consecutive_errors: 0,
        });
        Ok(())
    }

    /// Stop watching. Does nothing when already disarmed.
    pub fn disarm(&mut self) {
        if let Some(session) = self.session.take() {
            log::info!("Stopped watching file: {}", session.handle.name());
        }
    }

    /// Time until the next tick is due
    pub fn time_to_next_tick(&self, now: Instant) -> Option<Duration> {
        self.session
            .as_ref()
            .map(|s| s.next_tick.saturating_duration_since(now))
    }

    /// Drive the loop: deliver a finished read, or tick when due
    pub fn poll(&mut self, now: Instant) -> Option<WatchEvent> {
        let session = self.session.as_mut()?;

        if let Some(rx) = &session.pending {
            match rx.try_recv() {
                Ok(Ok(snapshot)) => {
                    session.pending = None;
                    session.consecutive_errors = 0;
                    // The file may have moved on again while it was being read
                    session.last_modified = snapshot.modified;
                    log::info!("Reloaded file: {}", session.handle.name());
                    return Some(WatchEvent::Changed(snapshot));
                }
                Ok(Err(err)) => {
                    session.pending = None;
                    return Some(session.error(err));
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    session.pending = None;
                    return Some(session.error(io::Error::other("file reader exited unexpectedly")));
                }
            }
        }

        if now < session.next_tick {
            return None;
        }
        session.next_tick = now + session.interval;

        if session.pending.is_some() {
            log::debug!("Skipping watch tick: previous read still pending");
            return None;
        }

        match session.handle.modified() {
            Ok(modified) if modified == session.last_modified => {
                session.consecutive_errors = 0;
                None
            }
            Ok(modified) => {
                log::debug!("File change detected: {}", session.handle.name());
                session.last_modified = modified;

                let (tx, rx) = mpsc::channel();
                let handle = Arc::clone(&session.handle);
                thread::spawn(move || {
                    // Receiver is gone if the loop was disarmed meanwhile
                    let _ = tx.send(handle.read());
                });
                session.pending = Some(rx);
                None
            }
            Err(err) => Some(session.error(err)),
        }
    }
}
