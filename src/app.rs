use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use eframe::egui;
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};
use serde::{Deserialize, Serialize};

use crate::config::ViewerConfig;
use crate::diagram::{self, DiagramState, Diagrams};
use crate::error::ViewerError;
use crate::export;
use crate::lightbox::{self, Lightbox, LightboxContent};
use crate::render::{Block, Placement, RenderedDocument};
use crate::session::SessionManager;
use crate::toast::Toasts;
use crate::toc::OutlineStatus;
use crate::viewer::{Viewer, ViewerEvent};

const APP_KEY: &str = "ohp-viewer-state";
/// A dropped file opens read-only if the prompt is left alone this long
const DROP_PROMPT_TIMEOUT: Duration = Duration::from_secs(6);
const MAX_TOC_TITLE_CHARS: usize = 40;
const MAX_IMAGE_WIDTH: f32 = 800.0;

/// Persisted view preferences
#[derive(Serialize, Deserialize, Default)]
struct PersistedState {
    dark_mode: Option<bool>,
    zoom_level: Option<f32>,
    show_toc: Option<bool>,
}

/// A dropped file waiting for the user to pick hot reload or read-only
struct PendingDrop {
    path: PathBuf,
    shown_at: Instant,
}

impl PendingDrop {
    fn remaining(&self, now: Instant) -> Duration {
        DROP_PROMPT_TIMEOUT.saturating_sub(now.saturating_duration_since(self.shown_at))
    }

    fn expired(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn toc_label(level: u8, text: &str) -> String {
    let indent = " ".repeat(level.saturating_sub(1) as usize * 3);
    if text.chars().count() > MAX_TOC_TITLE_CHARS {
        let short: String = text.chars().take(MAX_TOC_TITLE_CHARS - 3).collect();
        format!("{}{}...", indent, short)
    } else {
        format!("{}{}", indent, text)
    }
}

fn content_viewer<'f>() -> CommonMarkViewer<'f> {
    CommonMarkViewer::new()
        .max_image_width(Some(MAX_IMAGE_WIDTH as usize))
        .indentation_spaces(2)
        .show_alt_text_on_hover(true)
        .syntax_theme_dark("base16-ocean.dark")
        .syntax_theme_light("base16-ocean.light")
}

pub struct MarkdownApp {
    viewer: Viewer,
    cache: CommonMarkCache,
    /// Viewer revision the render cache belongs to
    cache_revision: u64,
    sessions: SessionManager,
    toasts: Toasts,
    dark_mode: bool,
    zoom_level: f32,
    show_toc: bool,
    is_dragging: bool,
    pending_drop: Option<PendingDrop>,
    /// Outline index to bring into view on the next frame
    scroll_target: Option<usize>,
    diagrams: Diagrams,
    lightbox: Lightbox,
}

impl MarkdownApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: ViewerConfig,
        file: Option<PathBuf>,
        watch: bool,
    ) -> Self {
        let persisted: PersistedState = cc
            .storage
            .and_then(|s| eframe::get_value(s, APP_KEY))
            .unwrap_or_default();

        let dark_mode = persisted
            .dark_mode
            .unwrap_or_else(|| cc.egui_ctx.style().visuals.dark_mode);
        let zoom_level = persisted.zoom_level.unwrap_or(1.0).clamp(0.5, 3.0);
        // The command line wins over the remembered preference
        let show_toc = config.show_toc && persisted.show_toc.unwrap_or(true);

        let sessions = SessionManager::default();
        let mut app = Self {
            viewer: Viewer::new(config),
            cache: CommonMarkCache::default(),
            cache_revision: 0,
            sessions,
            toasts: Toasts::default(),
            dark_mode,
            zoom_level,
            show_toc,
            is_dragging: false,
            pending_drop: None,
            scroll_target: None,
            diagrams: Diagrams::default(),
            lightbox: Lightbox::default(),
        };

        let now = Instant::now();
        if let Some(path) = file {
            app.viewer.open_path(&path, watch, now);
        } else if let Some(session) = cc
            .storage
            .and_then(|s| app.sessions.load(s, SystemTime::now()))
        {
            app.viewer.restore_session(session, now);
        }

        app
    }

    fn window_title(&self) -> String {
        match self.viewer.document() {
            Some(doc) => format!("{} - Markdown Viewer", doc.name),
            None => "Markdown Viewer".to_string(),
        }
    }

    fn open_file_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Markdown", &["md", "markdown"])
            .pick_file()
        {
            let watch = self.viewer.config().watch_on_open;
            self.viewer.open_path(&path, watch, Instant::now());
        }
    }

    fn close_document(&mut self) {
        self.viewer.close();
        self.pending_drop = None;
        self.scroll_target = None;
        self.lightbox.close();
    }

    fn export_pdf(&mut self) {
        let Some(html) = self.viewer.print_html() else {
            log::warn!("Nothing to export");
            return;
        };
        let title = self
            .viewer
            .document()
            .map(|d| d.name.clone())
            .unwrap_or_else(|| "document".to_string());

        match export::write_print_html(&title, &html, &std::env::temp_dir()) {
            Err(e) => self.viewer.report(ViewerError::Export(e)),
            // The platform opener takes a path, so nothing needs URL escaping
            Ok(path) => match open::that(&path) {
                Ok(()) => self.toasts.success("Opened print preview", Instant::now()),
                Err(e) => self.viewer.report(ViewerError::Export(e)),
            },
        }
    }

    /// Turn viewer events into notifications
    fn process_events(&mut self, now: Instant) {
        for event in self.viewer.drain_events() {
            match event {
                ViewerEvent::Loaded { name } => log::info!("Showing {}", name),
                ViewerEvent::ContentChanged { .. } => self.toasts.success("File updated", now),
                ViewerEvent::WatchArmed { .. } => self.toasts.success("Hot reload enabled", now),
                ViewerEvent::WatchDisarmed => self.toasts.success("Hot reload disabled", now),
                ViewerEvent::WatchError {
                    message,
                    consecutive,
                } => {
                    // A missing file fails every tick; say so once
                    if consecutive == 1 {
                        self.toasts.error(format!("File watch error: {}", message), now);
                    }
                }
                ViewerEvent::Failed(err) => self.toasts.error(err.to_string(), now),
            }
        }
    }

    fn show_drop_prompt(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(pending) = &self.pending_drop else {
            return;
        };
        let name = file_name(&pending.path);
        let remaining = pending.remaining(now);
        let mut choice: Option<bool> = if pending.expired(now) { Some(false) } else { None };

        egui::Window::new("Open dropped file")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_BOTTOM, egui::vec2(0.0, -40.0))
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(&name).strong());
                ui.label("Open this file with hot reload?");
                ui.label(
                    egui::RichText::new(format!(
                        "Opening read-only in {}s",
                        remaining.as_secs() + 1
                    ))
                    .small()
                    .color(ui.visuals().weak_text_color()),
                );
                ui.horizontal(|ui| {
                    if ui.button("Open read-only").clicked() {
                        choice = Some(false);
                    }
                    if ui.button("Open with hot reload").clicked() {
                        choice = Some(true);
                    }
                });
            });

        match choice {
            Some(hot_reload) => {
                if let Some(pending) = self.pending_drop.take() {
                    self.viewer.open_path(&pending.path, hot_reload, now);
                }
            }
            None => ctx.request_repaint_after(Duration::from_millis(250)),
        }
    }

    fn show_toc_panel(&mut self, ctx: &egui::Context) {
        let Some(document) = self.viewer.document() else {
            return;
        };
        let title = document.name.clone();
        let toc = self.viewer.toc();
        let mut clicked: Option<String> = None;
        // Ignore clicks while the panel edge is being dragged
        let pointer_down = ctx.input(|i| i.pointer.any_down());

        egui::SidePanel::left("toc")
            .resizable(true)
            .default_width(220.0)
            .min_width(120.0)
            .max_width(400.0)
            .show(ctx, |ui| {
                ui.add_space(4.0);
                ui.horizontal(|ui| {
                    ui.set_max_width(ui.available_width());
                    ui.add_space(6.0);
                    ui.add(egui::Label::new(egui::RichText::new(&title).heading()).truncate());
                });
                ui.separator();

                match toc.status() {
                    OutlineStatus::Failed(message) => {
                        ui.label(
                            egui::RichText::new(format!("Outline unavailable: {}", message))
                                .color(ui.visuals().warn_fg_color),
                        );
                    }
                    OutlineStatus::Empty => {
                        ui.label(
                            egui::RichText::new("No headings")
                                .italics()
                                .color(ui.visuals().weak_text_color()),
                        );
                    }
                    OutlineStatus::Ready => {
                        egui::ScrollArea::vertical()
                            .scroll_bar_visibility(
                                egui::scroll_area::ScrollBarVisibility::AlwaysHidden,
                            )
                            .show(ui, |ui| {
                                for heading in toc.outline() {
                                    let is_active = toc.active() == Some(heading.id.as_str());
                                    let response = ui.selectable_label(
                                        is_active,
                                        toc_label(heading.level, &heading.text),
                                    );
                                    if !pointer_down && response.clicked() {
                                        clicked = Some(heading.id.clone());
                                    }
                                }
                            });
                    }
                }
            });

        if let Some(id) = clicked {
            if let Some(index) = self.viewer.navigate(&id) {
                self.scroll_target = Some(index);
            }
        }
    }

    fn show_welcome(&mut self, ui: &mut egui::Ui) {
        let mut open = false;
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() * 0.3);
            ui.label(egui::RichText::new("Markdown Viewer").size(24.0).strong());
            ui.add_space(12.0);
            ui.label("Drop a .md file here, or");
            ui.add_space(8.0);
            if ui.button("📁 Open File").clicked() {
                open = true;
            }
        });
        if open {
            self.open_file_dialog();
        }
    }

    fn show_content(&mut self, ui: &mut egui::Ui) {
        let visibility = self.viewer.section_visibility();
        let scroll_target = self.scroll_target.take();
        let cache = &mut self.cache;
        let diagrams = &mut self.diagrams;
        let Some(document) = self.viewer.document() else {
            return;
        };
        let doc = match &document.rendered {
            Ok(doc) => doc,
            Err(e) => {
                ui.vertical_centered(|ui| {
                    ui.add_space(40.0);
                    ui.label(
                        egui::RichText::new(format!("⚠ Could not render {}: {}", document.name, e))
                            .color(egui::Color32::from_rgb(255, 200, 100)),
                    );
                });
                return;
            }
        };
        let base_dir = document.path.as_deref().and_then(Path::parent);

        let mut heading_rects: Vec<Option<egui::Rect>> = vec![None; doc.sections.len()];
        let mut body_rects: Vec<Option<egui::Rect>> = vec![None; doc.sections.len()];
        let mut preamble_rect: Option<egui::Rect> = None;
        let mut toggled: Option<String> = None;
        let mut zoom: Option<LightboxContent> = None;
        let mut scroll_offset = 0.0;
        let mut origin = 0.0;

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .scroll_source(
                egui::scroll_area::ScrollSource::SCROLL_BAR
                    | egui::scroll_area::ScrollSource::MOUSE_WHEEL,
            )
            .show_viewport(ui, |ui, viewport| {
                scroll_offset = viewport.min.y;
                origin = ui.min_rect().top();

                egui::Frame::new()
                    .inner_margin(egui::Margin {
                        left: 20,
                        right: 8,
                        top: 0,
                        bottom: 24,
                    })
                    .show(ui, |ui| {
                        if !doc.preamble_blocks.is_empty() {
                            let rect = ui
                                .push_id("preamble", |ui| {
                                    show_blocks(ui, cache, diagrams, doc, &doc.preamble_blocks, base_dir, &mut zoom)
                                })
                                .inner;
                            preamble_rect = Some(rect);
                        }

                        for (index, (section, vis)) in
                            doc.sections.iter().zip(&visibility).enumerate()
                        {
                            if !vis.heading {
                                continue;
                            }
                            let id = &section.heading.id;

                            let rect = ui
                                .push_id(id, |ui| {
                                    content_viewer()
                                        .show(ui, cache, &doc.with_links(&section.heading_source))
                                        .response
                                        .rect
                                })
                                .inner;
                            heading_rects[index] = Some(rect);

                            let toggle = ui
                                .interact(rect, ui.id().with((id, "toggle")), egui::Sense::click())
                                .on_hover_cursor(egui::CursorIcon::PointingHand);
                            if toggle.clicked() {
                                toggled = Some(id.clone());
                            }
                            ui.painter().text(
                                egui::pos2(rect.left() - 6.0, rect.center().y),
                                egui::Align2::RIGHT_CENTER,
                                if vis.body { "▾" } else { "▸" },
                                egui::FontId::proportional(12.0),
                                ui.visuals().weak_text_color(),
                            );

                            if vis.body {
                                let body = ui
                                    .push_id((id, "body"), |ui| {
                                        show_blocks(ui, cache, diagrams, doc, &section.blocks, base_dir, &mut zoom)
                                    })
                                    .inner;
                                body_rects[index] = Some(body);
                            }
                        }
                    });

                let target = scroll_target
                    .and_then(|index| doc.placement(index))
                    .and_then(|p| placement_rect(p, preamble_rect, &heading_rects, &body_rects));
                if let Some(rect) = target {
                    ui.scroll_to_rect(rect, Some(egui::Align::Min));
                }
            });

        let offsets: Vec<Option<f32>> = (0..self.viewer.toc().outline().len())
            .map(|index| {
                let placement = doc.placement(index)?;
                placement_rect(placement, preamble_rect, &heading_rects, &body_rects)
                    .map(|r| r.top() - origin)
            })
            .collect();

        let toc = self.viewer.toc_mut();
        for (index, offset) in offsets.into_iter().enumerate() {
            toc.set_offset(index, offset);
        }
        toc.observe_scroll(scroll_offset);
        // One active-heading recompute per frame, however many scroll events arrived
        toc.on_frame();

        if let Some(id) = toggled {
            self.viewer.toggle_section(&id);
        }
        if let Some(content) = zoom {
            self.lightbox.open(content);
        }
    }
}

/// Where a heading was drawn this frame. Nested headings take the top of the
/// block that holds them; hidden ones have no rect.
fn placement_rect(
    placement: Placement,
    preamble: Option<egui::Rect>,
    headings: &[Option<egui::Rect>],
    bodies: &[Option<egui::Rect>],
) -> Option<egui::Rect> {
    match placement {
        Placement::Preamble => preamble,
        Placement::Heading(n) => headings.get(n).copied().flatten(),
        Placement::Body(n) => bodies.get(n).copied().flatten(),
    }
}

/// Draw a preamble or section body; returns the space it took.
///
/// A click on a diagram or a standalone image is reported through `zoom`.
fn show_blocks(
    ui: &mut egui::Ui,
    cache: &mut CommonMarkCache,
    diagrams: &mut Diagrams,
    doc: &RenderedDocument,
    blocks: &[Block],
    base_dir: Option<&Path>,
    zoom: &mut Option<LightboxContent>,
) -> egui::Rect {
    ui.vertical(|ui| {
        for (index, block) in blocks.iter().enumerate() {
            ui.push_id(index, |ui| match block {
                Block::Markdown(source) => {
                    content_viewer().show(ui, cache, &doc.with_links(source));
                }
                Block::Diagram(source) => show_diagram(ui, diagrams, source, zoom),
                Block::Image { url, alt } => {
                    let uri = lightbox::image_uri(url, base_dir);
                    let mut response = ui
                        .add(
                            egui::Image::from_uri(uri.clone())
                                .max_width(MAX_IMAGE_WIDTH.min(ui.available_width()))
                                .sense(egui::Sense::click()),
                        )
                        .on_hover_cursor(egui::CursorIcon::ZoomIn);
                    if !alt.is_empty() {
                        response = response.on_hover_text(alt.as_str());
                    }
                    if response.clicked() {
                        *zoom = Some(LightboxContent::Image {
                            uri,
                            alt: alt.clone(),
                        });
                    }
                }
            });
        }
    })
    .response
    .rect
}

fn show_diagram(
    ui: &mut egui::Ui,
    diagrams: &mut Diagrams,
    source: &str,
    zoom: &mut Option<LightboxContent>,
) {
    let key = diagrams.request(source);
    match diagrams.state(key) {
        Some(DiagramState::Ready { texture, size }) => {
            let scale = (ui.available_width() / size.x.max(1.0)).min(1.0);
            let response = ui
                .add(
                    egui::Image::new(egui::load::SizedTexture::new(texture.id(), *size * scale))
                        .sense(egui::Sense::click()),
                )
                .on_hover_cursor(egui::CursorIcon::ZoomIn);
            if response.clicked() {
                *zoom = Some(LightboxContent::Diagram {
                    texture: texture.clone(),
                    size: *size,
                });
            }
        }
        Some(DiagramState::Failed(message)) => {
            let color = egui::Color32::from_rgb(220, 80, 80);
            ui.label(egui::RichText::new(format!("Diagram error: {}", message)).color(color));
            ui.label(egui::RichText::new(source).monospace().color(color));
        }
        Some(DiagramState::Rendering) | None => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(
                    egui::RichText::new("Rendering diagram...")
                        .color(ui.visuals().weak_text_color()),
                );
            });
        }
    }
}

/// Keys of every diagram in `doc`
fn diagram_keys(doc: &RenderedDocument) -> HashSet<u64> {
    doc.preamble_blocks
        .iter()
        .chain(doc.sections.iter().flat_map(|s| &s.blocks))
        .filter_map(|block| match block {
            Block::Diagram(source) => Some(diagram::key(source)),
            _ => None,
        })
        .collect()
}

impl eframe::App for MarkdownApp {
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let state = PersistedState {
            dark_mode: Some(self.dark_mode),
            zoom_level: Some(self.zoom_level),
            show_toc: Some(self.show_toc),
        };
        eframe::set_value(storage, APP_KEY, &state);

        match self.viewer.session_snapshot(SystemTime::now()) {
            Some(snapshot) => {
                self.sessions.save(storage, &snapshot);
            }
            None => self.sessions.clear(storage),
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        self.viewer.poll_watch(now);
        if self.viewer.watch().is_reading() {
            ctx.request_repaint_after(Duration::from_millis(16));
        } else if let Some(wait) = self.viewer.watch().time_to_next_tick(now) {
            ctx.request_repaint_after(wait.max(Duration::from_millis(16)));
        }

        // Content changed: the render cache belongs to the old document
        if self.cache_revision != self.viewer.revision() {
            self.cache = CommonMarkCache::default();
            self.cache_revision = self.viewer.revision();
            let keys = self
                .viewer
                .document()
                .and_then(|d| d.rendered.as_ref().ok())
                .map(diagram_keys)
                .unwrap_or_default();
            self.diagrams.retain(&keys);
        }

        self.diagrams.poll(ctx);
        if self.diagrams.is_busy() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }

        ctx.set_visuals(if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });
        ctx.style_mut(|style| {
            style.url_in_tooltip = true;
        });
        ctx.set_zoom_factor(self.zoom_level);
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(self.window_title()));

        // Keyboard shortcuts
        let mut open_dialog = false;
        let mut toggle_watch = false;
        let mut toggle_dark = false;
        let mut toggle_toc = false;
        let mut export_pdf = false;
        let mut quit_app = false;
        let mut zoom_delta: f32 = 0.0;

        // The lightbox keeps the keyboard while it is open
        ctx.input(|i| {
            if self.lightbox.is_open() {
                return;
            }
            // Ctrl+O: Open file
            if i.modifiers.ctrl && !i.modifiers.shift && i.key_pressed(egui::Key::O) {
                open_dialog = true;
            }
            // Ctrl+Shift+O: Toggle table of contents
            if i.modifiers.ctrl && i.modifiers.shift && i.key_pressed(egui::Key::O) {
                toggle_toc = true;
            }
            // Ctrl+W: Toggle hot reload
            if i.modifiers.ctrl && i.key_pressed(egui::Key::W) {
                toggle_watch = true;
            }
            // Ctrl+P: Export PDF
            if i.modifiers.ctrl && i.key_pressed(egui::Key::P) {
                export_pdf = true;
            }
            // Ctrl+D: Toggle dark mode
            if i.modifiers.ctrl && i.key_pressed(egui::Key::D) {
                toggle_dark = true;
            }
            // Ctrl+Q: Quit
            if i.modifiers.ctrl && i.key_pressed(egui::Key::Q) {
                quit_app = true;
            }
            // Ctrl+Plus or Ctrl+=: Zoom in
            if i.modifiers.ctrl && (i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals)) {
                zoom_delta = 0.1;
            }
            // Ctrl+Minus: Zoom out
            if i.modifiers.ctrl && i.key_pressed(egui::Key::Minus) {
                zoom_delta = -0.1;
            }
            // Ctrl+0: Reset zoom
            if i.modifiers.ctrl && i.key_pressed(egui::Key::Num0) {
                zoom_delta = 1.0 - self.zoom_level;
            }
        });

        if zoom_delta != 0.0 {
            self.zoom_level = (self.zoom_level + zoom_delta).clamp(0.5, 3.0);
        }
        if toggle_dark {
            self.dark_mode = !self.dark_mode;
        }
        if toggle_toc {
            self.show_toc = !self.show_toc;
        }
        if quit_app {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        // Handle drag and drop
        self.is_dragging = false;
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            self.is_dragging = !i.raw.hovered_files.is_empty();
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        // Last drop wins
        if let Some(path) = dropped.into_iter().last() {
            if Viewer::is_markdown_file(&path) {
                self.pending_drop = Some(PendingDrop { path, shown_at: now });
            } else {
                self.viewer.report(ViewerError::UnsupportedFile(path));
            }
        }

        // Menu bar
        let mut close_doc = false;
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.add(egui::Button::new("Open...").shortcut_text("Ctrl+O")).clicked() {
                        open_dialog = true;
                        ui.close();
                    }

                    let has_document = self.viewer.document().is_some();
                    if ui.add_enabled(has_document, egui::Button::new("Close")).clicked() {
                        close_doc = true;
                        ui.close();
                    }

                    ui.separator();

                    let is_watching = self.viewer.is_watching();
                    let watch_text = if is_watching { "✓ Hot Reload" } else { "Hot Reload" };
                    let can_watch = self
                        .viewer
                        .document()
                        .is_some_and(|d| d.path.is_some());
                    if ui
                        .add_enabled(can_watch, egui::Button::new(watch_text).shortcut_text("Ctrl+W"))
                        .clicked()
                    {
                        toggle_watch = true;
                        ui.close();
                    }

                    let can_export = self
                        .viewer
                        .document()
                        .is_some_and(|d| d.rendered.is_ok());
                    if ui
                        .add_enabled(can_export, egui::Button::new("Export PDF...").shortcut_text("Ctrl+P"))
                        .clicked()
                    {
                        export_pdf = true;
                        ui.close();
                    }

                    ui.separator();

                    if ui.add(egui::Button::new("Quit").shortcut_text("Ctrl+Q")).clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close();
                    }
                });

                ui.menu_button("View", |ui| {
                    let toc_text = if self.show_toc { "✓ Table of Contents" } else { "Table of Contents" };
                    if ui.add(egui::Button::new(toc_text).shortcut_text("Ctrl+Shift+O")).clicked() {
                        self.show_toc = !self.show_toc;
                        ui.close();
                    }

                    let theme_text = if self.dark_mode { "☀ Light Mode" } else { "🌙 Dark Mode" };
                    if ui.add(egui::Button::new(theme_text).shortcut_text("Ctrl+D")).clicked() {
                        self.dark_mode = !self.dark_mode;
                        ui.close();
                    }

                    ui.separator();

                    if ui.add(egui::Button::new("Zoom In").shortcut_text("Ctrl++")).clicked() {
                        self.zoom_level = (self.zoom_level + 0.1).min(3.0);
                        ui.close();
                    }
                    if ui.add(egui::Button::new("Zoom Out").shortcut_text("Ctrl+-")).clicked() {
                        self.zoom_level = (self.zoom_level - 0.1).max(0.5);
                        ui.close();
                    }
                    if ui.add(egui::Button::new("Reset Zoom").shortcut_text("Ctrl+0")).clicked() {
                        self.zoom_level = 1.0;
                        ui.close();
                    }
                });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if (self.zoom_level - 1.0).abs() > 0.01 {
                        ui.label(
                            egui::RichText::new(format!("{}%", (self.zoom_level * 100.0).round() as i32))
                                .small()
                                .color(ui.visuals().weak_text_color()),
                        );
                        ui.separator();
                    }

                    if self.viewer.is_watching() {
                        ui.label(egui::RichText::new("● LIVE").color(egui::Color32::from_rgb(100, 200, 100)));
                        ui.separator();
                    }

                    if let Some(path) = self.viewer.document().and_then(|d| d.path.as_ref()) {
                        ui.label(
                            egui::RichText::new(path.display().to_string())
                                .small()
                                .color(ui.visuals().weak_text_color()),
                        );
                    }
                });
            });
        });

        // Shortcut and menu actions run after the panel closure releases its borrows
        if open_dialog {
            self.open_file_dialog();
        }
        if close_doc {
            self.close_document();
        }
        if toggle_watch {
            self.viewer.toggle_watch(now);
        }
        if export_pdf {
            self.export_pdf();
        }

        if self.show_toc {
            self.show_toc_panel(ctx);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.viewer.document().is_some() {
                self.show_content(ui);
            } else {
                self.show_welcome(ui);
            }
        });

        self.lightbox.show(ctx);
        self.show_drop_prompt(ctx, now);
        self.process_events(now);
        self.toasts.show(ctx, now);

        // Drag and drop overlay
        if self.is_dragging {
            let screen_rect = ctx.available_rect();
            let painter = ctx.layer_painter(egui::LayerId::new(
                egui::Order::Foreground,
                egui::Id::new("drop_overlay"),
            ));

            painter.rect_filled(
                screen_rect,
                0.0,
                egui::Color32::from_rgba_unmultiplied(0, 0, 0, 180),
            );

            painter.text(
                screen_rect.center(),
                egui::Align2::CENTER_CENTER,
                "Drop markdown file here",
                egui::FontId::proportional(24.0),
                egui::Color32::WHITE,
            );
        }
    }
}
