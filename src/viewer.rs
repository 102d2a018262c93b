//! Viewer controller.
//!
//! Owns the current document, its outline, collapse state and the hot-reload
//! loop. Every content change goes through [`Viewer::replace_content`], so the
//! outline and the active heading are rebuilt in the same step as the text.
//! The UI learns about outcomes by draining [`ViewerEvent`]s.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::collapse::{self, CollapseState, SectionVisibility};
use crate::config::ViewerConfig;
use crate::diagram;
use crate::error::{RenderError, ViewerError};
use crate::export;
use crate::render::{self, Placement, RenderedDocument};
use crate::session::{unix_millis, SessionSnapshot};
use crate::toc::Toc;
use crate::watch::{FileRef, PathRef, WatchEvent, WatchLoop};

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

#[derive(Debug)]
pub enum ViewerEvent {
    Loaded { name: String },
    ContentChanged { name: String },
    WatchArmed { name: String },
    WatchDisarmed,
    WatchError { message: String, consecutive: u32 },
    Failed(ViewerError),
}

pub struct LoadedDocument {
    pub name: String,
    pub path: Option<PathBuf>,
    pub source: String,
    pub rendered: Result<RenderedDocument, RenderError>,
}

pub struct Viewer {
    config: ViewerConfig,
    document: Option<LoadedDocument>,
    toc: Toc,
    collapse: CollapseState,
    watch: WatchLoop,
    /// Bumped on every content replacement
    revision: u64,
    events: Vec<ViewerEvent>,
}

impl Viewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            toc: Toc::new(config.lookahead),
            config,
            document: None,
            collapse: CollapseState::default(),
            watch: WatchLoop::default(),
            revision: 0,
            events: Vec::new(),
        }
    }

    pub fn is_markdown_file(path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                MARKDOWN_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn toc(&self) -> &Toc {
        &self.toc
    }

    pub fn toc_mut(&mut self) -> &mut Toc {
        &mut self.toc
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_armed()
    }

    pub fn watch(&self) -> &WatchLoop {
        &self.watch
    }

    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Surface an error to the UI layer
    pub fn report(&mut self, err: ViewerError) {
        log::error!("{}", err);
        self.events.push(ViewerEvent::Failed(err));
    }

    /// Open a markdown file from disk, optionally arming hot reload.
    ///
    /// On failure the previous document stays on screen.
    pub fn open_path(&mut self, path: &Path, hot_reload: bool, now: Instant) -> bool {
        if !Self::is_markdown_file(path) {
            self.report(ViewerError::UnsupportedFile(path.to_path_buf()));
            return false;
        }

        let handle = PathRef::new(path);
        let snapshot = match handle.read() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.report(ViewerError::read(path, e));
                return false;
            }
        };

        // The old session watches the old file
        self.disarm_watch();

        let name = handle.name();
        log::info!("Loaded file: {:?}", path);
        self.replace_content(name.clone(), Some(path.to_path_buf()), snapshot.text);
        self.events.push(ViewerEvent::Loaded { name });

        if hot_reload {
            self.arm_watch(now);
        }
        true
    }

    /// Swap in new document text; the only path that changes content
    pub fn replace_content(&mut self, name: String, path: Option<PathBuf>, source: String) {
        let rendered = render::render(&source);
        match &rendered {
            Ok(doc) => self.toc.build(doc.headings()),
            Err(e) => {
                self.toc.fail(e.to_string());
                self.report(ViewerError::Render(e.clone()));
            }
        }
        self.collapse.reset();
        self.revision += 1;
        self.document = Some(LoadedDocument {
            name,
            path,
            source,
            rendered,
        });
    }

    /// Arm hot reload for the current document's file
    pub fn arm_watch(&mut self, now: Instant) {
        let Some(path) = self.document.as_ref().and_then(|d| d.path.clone()) else {
            log::warn!("Cannot start watching: no file loaded");
            return;
        };

        let handle: Arc<dyn FileRef> = Arc::new(PathRef::new(&path));
        let name = handle.name();
        match self.watch.arm(handle, self.config.poll_interval, now) {
            Ok(()) => self.events.push(ViewerEvent::WatchArmed { name }),
            Err(source) => self.report(ViewerError::Watch { path, source }),
        }
    }

    pub fn disarm_watch(&mut self) {
        if self.watch.is_armed() {
            self.watch.disarm();
            self.events.push(ViewerEvent::WatchDisarmed);
        }
    }

    pub fn toggle_watch(&mut self, now: Instant) {
        if self.watch.is_armed() {
            self.disarm_watch();
        } else {
            self.arm_watch(now);
        }
    }

    /// Drive the hot-reload loop; call once per frame
    pub fn poll_watch(&mut self, now: Instant) {
        match self.watch.poll(now) {
            Some(WatchEvent::Changed(snapshot)) => {
                let Some(document) = self.document.as_ref() else {
                    return;
                };
                let name = document.name.clone();
                let path = document.path.clone();
                self.replace_content(name.clone(), path, snapshot.text);
                self.events.push(ViewerEvent::ContentChanged { name });
            }
            Some(WatchEvent::Error {
                message,
                consecutive,
            }) => {
                self.events.push(ViewerEvent::WatchError {
                    message,
                    consecutive,
                });
            }
            None => {}
        }
    }

    fn rendered(&self) -> Option<&RenderedDocument> {
        self.document.as_ref()?.rendered.as_ref().ok()
    }

    /// Follow an outline link. Stale ids are ignored.
    ///
    /// Returns the outline index; any collapsed section hiding the heading is
    /// opened first.
    pub fn navigate(&mut self, id: &str) -> Option<usize> {
        let index = self.toc.navigate(id)?;
        let Some(doc) = self.document.as_ref().and_then(|d| d.rendered.as_ref().ok()) else {
            return Some(index);
        };
        let sections = doc.section_headings();
        match doc.placement(index) {
            Some(Placement::Heading(section)) => self.collapse.reveal(&sections, section),
            Some(Placement::Body(section)) => {
                self.collapse.reveal(&sections, section);
                if let Some(owner) = sections.get(section) {
                    self.collapse.expand(&owner.id);
                }
            }
            Some(Placement::Preamble) | None => {}
        }
        Some(index)
    }

    pub fn toggle_section(&mut self, id: &str) -> bool {
        self.collapse.toggle(id)
    }

    /// Visibility of each section of the current document
    pub fn section_visibility(&self) -> Vec<SectionVisibility> {
        match self.rendered() {
            Some(doc) => collapse::visibility(&doc.section_headings(), &self.collapse),
            None => Vec::new(),
        }
    }

    /// HTML of the whole document with every section expanded.
    ///
    /// Collapse state is forced open for the snapshot and put back afterwards.
    pub fn print_html(&mut self) -> Option<String> {
        let expansion = self.collapse.expand_for_print();
        let html = self
            .rendered()
            .map(|doc| {
                export::document_html(doc, &self.section_visibility(), &|source| {
                    diagram::render_svg(source).ok()
                })
            });
        self.collapse.restore(expansion);
        html
    }

    /// Reset to the empty viewer
    pub fn close(&mut self) {
        self.disarm_watch();
        self.document = None;
        self.toc.clear();
        self.collapse.reset();
        self.revision += 1;
    }

    pub fn session_snapshot(&self, now: SystemTime) -> Option<SessionSnapshot> {
        let document = self.document.as_ref()?;
        Some(SessionSnapshot {
            file_name: document.name.clone(),
            path: document.path.clone(),
            content: document.source.clone(),
            hot_reload: self.watch.is_armed(),
            timestamp_ms: unix_millis(now),
        })
    }

    /// Bring back a cached session. Watched files are re-read from disk.
    pub fn restore_session(&mut self, session: SessionSnapshot, now: Instant) {
        if session.hot_reload {
            if let Some(path) = session.path.as_deref() {
                if path.exists() && self.open_path(path, true, now) {
                    return;
                }
            }
        }
        log::info!("Restoring cached session for {}", session.file_name);
        self.replace_content(session.file_name.clone(), session.path, session.content);
        self.events.push(ViewerEvent::Loaded {
            name: session.file_name,
        });
    }
}
