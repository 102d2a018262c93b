//! Table of contents and active-heading tracking.

use crate::render::HeadingEntry;

/// Default distance below the scroll position at which a heading counts as active
pub const DEFAULT_LOOKAHEAD_PX: f32 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub enum OutlineStatus {
    Ready,
    /// The document has no headings
    Empty,
    /// The render pipeline failed; the outline is unavailable
    Failed(String),
}

/// Outline of the current document plus the active-heading highlight
#[derive(Debug)]
pub struct Toc {
    outline: Vec<HeadingEntry>,
    /// Drawn y offset of each heading; `None` while hidden or not yet drawn
    offsets: Vec<Option<f32>>,
    active: Option<String>,
    lookahead: f32,
    /// Latest scroll offset seen since the last frame
    pending_scroll: Option<f32>,
    /// Scroll offset of the previous frame; `None` until the first frame after a build
    last_scroll: Option<f32>,
    status: OutlineStatus,
}

impl Default for Toc {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD_PX)
    }
}

impl Toc {
    pub fn new(lookahead: f32) -> Self {
        Self {
            outline: Vec::new(),
            offsets: Vec::new(),
            active: None,
            lookahead,
            pending_scroll: None,
            last_scroll: None,
            status: OutlineStatus::Empty,
        }
    }

    /// Replace the outline with the headings of a new render
    pub fn build(&mut self, headings: Vec<HeadingEntry>) {
        self.offsets = vec![None; headings.len()];
        self.status = if headings.is_empty() {
            OutlineStatus::Empty
        } else {
            OutlineStatus::Ready
        };
        self.outline = headings;
        self.active = None;
        self.pending_scroll = None;
        self.last_scroll = None;
    }

    /// Drop the outline after a render failure
    pub fn fail(&mut self, message: impl Into<String>) {
        self.build(Vec::new());
        self.status = OutlineStatus::Failed(message.into());
    }

    /// Forget the document entirely
    pub fn clear(&mut self) {
        self.build(Vec::new());
    }

    pub fn outline(&self) -> &[HeadingEntry] {
        &self.outline
    }

    pub fn status(&self) -> &OutlineStatus {
        &self.status
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.outline.iter().position(|h| h.id == id)
    }

    /// Make `id` the active heading; returns its index, or `None` for a stale id
    pub fn navigate(&mut self, id: &str) -> Option<usize> {
        let Some(index) = self.index_of(id) else {
            log::debug!("Ignoring navigation to missing heading: {}", id);
            return None;
        };
        self.active = Some(id.to_string());
        Some(index)
    }

    pub fn set_offset(&mut self, index: usize, offset: Option<f32>) {
        if let Some(slot) = self.offsets.get_mut(index) {
            *slot = offset;
        }
    }

    /// Recompute the active heading for `scroll_offset`.
    ///
    /// Scans from the last heading backwards and picks the first one whose
    /// offset is within `scroll_offset + lookahead`. When none qualifies the
    /// current highlight is kept. Returns whether the active heading changed.
    pub fn update_active_on_scroll(&mut self, scroll_offset: f32) -> bool {
        let threshold = scroll_offset + self.lookahead;
        let found = self
            .outline
            .iter()
            .zip(&self.offsets)
            .rev()
            .find(|(_, offset)| offset.is_some_and(|y| y <= threshold))
            .map(|(heading, _)| heading);

        match found {
            Some(heading) if self.active.as_deref() != Some(heading.id.as_str()) => {
                self.active = Some(heading.id.clone());
                true
            }
            _ => false,
        }
    }

    /// Record a scroll observation; bursts collapse into one recompute in [`Toc::on_frame`]
    pub fn note_scroll(&mut self, scroll_offset: f32) {
        self.pending_scroll = Some(scroll_offset);
    }

    /// Feed the view's scroll offset once per frame.
    ///
    /// Only a change from the previous frame counts as a scroll. The first
    /// frame after a build just records where the view starts.
    pub fn observe_scroll(&mut self, scroll_offset: f32) {
        if self.last_scroll.is_some_and(|last| last != scroll_offset) {
            self.note_scroll(scroll_offset);
        }
        self.last_scroll = Some(scroll_offset);
    }

    /// Run the pending scroll recompute, at most once per frame
    pub fn on_frame(&mut self) -> bool {
        match self.pending_scroll.take() {
            Some(offset) => self.update_active_on_scroll(offset),
            None => false,
        }
    }
}
