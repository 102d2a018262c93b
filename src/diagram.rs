//! Mermaid diagrams.
//!
//! A diagram is laid out to SVG with merman and rasterized with resvg on a
//! worker thread. Only one diagram renders at a time, in the order the
//! diagrams were first requested, so the top of the document fills in first.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, LazyLock};
use std::thread;

use eframe::egui;

use crate::error::DiagramError;

/// Diagrams are rasterized at this multiple of their layout size so the
/// lightbox can enlarge them without blurring
const RASTER_SCALE: f32 = 2.0;

/// Families most Linux desktops have; the web fonts merman asks for usually are not installed
const FONT_FAMILIES_ATTR: &str = "DejaVu Sans, Noto Sans, Liberation Sans, sans-serif";
const FONT_FAMILIES_CSS: &str = "'DejaVu Sans', 'Noto Sans', 'Liberation Sans', sans-serif";

static FONT_DB: LazyLock<Arc<resvg::usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = resvg::usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

fn renderer() -> merman::render::HeadlessRenderer {
    merman::render::HeadlessRenderer::new().with_text_measurer(Arc::new(
        merman::render::DeterministicTextMeasurer {
            // Fallback fonts run wider than the metrics merman ships with
            char_width_factor: 0.65,
            line_height_factor: 0.0,
        },
    ))
}

/// Lay out mermaid `source` as an SVG document
pub fn render_svg(source: &str) -> Result<String, DiagramError> {
    match renderer().render_svg_readable_sync(source) {
        Ok(Some(svg)) => Ok(replace_font_families(&svg)),
        Ok(None) => Err(DiagramError::UnknownKind),
        Err(e) => Err(DiagramError::Syntax(e.to_string())),
    }
}

/// Point every `font-family` of `svg`, attribute or CSS, at installed fonts
fn replace_font_families(svg: &str) -> String {
    const KEY: &str = "font-family";

    let mut out = String::with_capacity(svg.len());
    let mut rest = svg;
    while let Some(pos) = rest.find(KEY) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + KEY.len()..];

        if let Some(value) = after.strip_prefix("=\"") {
            let end = value.find('"').map_or(value.len(), |i| i + 1);
            out.push_str(KEY);
            out.push_str("=\"");
            out.push_str(FONT_FAMILIES_ATTR);
            out.push('"');
            rest = &value[end..];
        } else if let Some(value) = after.strip_prefix(':') {
            let end = value.find([';', '}', '"']).unwrap_or(value.len());
            out.push_str(KEY);
            out.push_str(": ");
            out.push_str(FONT_FAMILIES_CSS);
            rest = &value[end..];
        } else {
            out.push_str(KEY);
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// A rasterized diagram
pub struct Raster {
    pub image: egui::ColorImage,
    /// Layout size in points
    pub size: egui::Vec2,
}

pub fn rasterize(svg: &[u8]) -> Result<Raster, DiagramError> {
    let options = resvg::usvg::Options {
        fontdb: Arc::clone(&FONT_DB),
        ..Default::default()
    };
    let tree = resvg::usvg::Tree::from_data(svg, &options).map_err(|e| {
        log::debug!("Unreadable diagram SVG: {}", e);
        DiagramError::Raster
    })?;

    let size = tree.size();
    let width = (size.width() * RASTER_SCALE) as u32;
    let height = (size.height() * RASTER_SCALE) as u32;
    let mut pixmap =
        resvg::tiny_skia::Pixmap::new(width, height).ok_or(DiagramError::Raster)?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(RASTER_SCALE, RASTER_SCALE),
        &mut pixmap.as_mut(),
    );

    Ok(Raster {
        image: egui::ColorImage::from_rgba_premultiplied(
            [width as usize, height as usize],
            pixmap.data(),
        ),
        size: egui::vec2(size.width(), size.height()),
    })
}

pub fn key(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

pub enum DiagramState {
    Rendering,
    Ready {
        texture: egui::TextureHandle,
        size: egui::Vec2,
    },
    Failed(String),
}

struct Finished {
    key: u64,
    result: Result<Raster, DiagramError>,
}

/// Rendered diagrams of the open document, keyed by source hash
pub struct Diagrams {
    states: HashMap<u64, DiagramState>,
    queue: VecDeque<(u64, String)>,
    in_flight: Option<u64>,
    tx: Sender<Finished>,
    rx: Receiver<Finished>,
}

impl Default for Diagrams {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            states: HashMap::new(),
            queue: VecDeque::new(),
            in_flight: None,
            tx,
            rx,
        }
    }
}

impl Diagrams {
    /// Ask for `source` to be drawn; returns its key. Repeated requests are free.
    pub fn request(&mut self, source: &str) -> u64 {
        let key = key(source);
        if !self.states.contains_key(&key) {
            self.states.insert(key, DiagramState::Rendering);
            self.queue.push_back((key, source.to_string()));
            self.start_next();
        }
        key
    }

    pub fn state(&self, key: u64) -> Option<&DiagramState> {
        self.states.get(&key)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some() || !self.queue.is_empty()
    }

    /// Forget diagrams that are not in `keys`, releasing their textures
    pub fn retain(&mut self, keys: &HashSet<u64>) {
        self.states.retain(|key, _| keys.contains(key));
        self.queue.retain(|(key, _)| keys.contains(key));
    }

    /// Collect finished renders; returns whether anything changed
    pub fn poll(&mut self, ctx: &egui::Context) -> bool {
        let mut changed = false;
        while let Ok(done) = self.rx.try_recv() {
            if self.in_flight == Some(done.key) {
                self.in_flight = None;
            }
            // Dropped by `retain` while rendering
            let Some(state) = self.states.get_mut(&done.key) else {
                continue;
            };
            *state = match done.result {
                Ok(raster) => DiagramState::Ready {
                    texture: ctx.load_texture(
                        format!("diagram-{}", done.key),
                        raster.image,
                        egui::TextureOptions::LINEAR,
                    ),
                    size: raster.size,
                },
                Err(e) => {
                    log::warn!("Diagram failed to render: {}", e);
                    DiagramState::Failed(e.to_string())
                }
            };
            changed = true;
        }
        self.start_next();
        changed
    }

    fn start_next(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some((key, source)) = self.queue.pop_front() else {
            return;
        };
        self.in_flight = Some(key);

        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = render_svg(&source).and_then(|svg| rasterize(svg.as_bytes()));
            // The receiver is gone once the app exits
            let _ = tx.send(Finished { key, result });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="4"><rect width="10" height="4" fill="red"/></svg>"#;

    #[test]
    fn test_rasterize_doubles_resolution() {
        let raster = rasterize(SQUARE.as_bytes()).unwrap();
        assert_eq!(raster.image.size, [20, 8]);
        assert_eq!(raster.size, egui::vec2(10.0, 4.0));
    }

    #[test]
    fn test_rasterize_rejects_garbage() {
        assert_eq!(rasterize(b"not svg").err(), Some(DiagramError::Raster));
    }

    #[test]
    fn test_font_families_are_replaced() {
        let svg = r#"<text font-family="Trebuchet MS">a</text><g style="font-family: arial; fill: red"/>"#;
        let out = replace_font_families(svg);
        assert_eq!(
            out,
            format!(
                r#"<text font-family="{}">a</text><g style="font-family: {}; fill: red"/>"#,
                FONT_FAMILIES_ATTR, FONT_FAMILIES_CSS
            )
        );
        assert_eq!(replace_font_families("<svg/>"), "<svg/>");
    }

    #[test]
    fn test_same_source_is_rendered_once() {
        let mut diagrams = Diagrams::default();
        let a = diagrams.request("graph TD\n  A --> B\n");
        let b = diagrams.request("graph TD\n  A --> B\n");
        assert_eq!(a, b);
        assert_eq!(diagrams.states.len(), 1);
        assert!(diagrams.queue.is_empty());
        assert!(diagrams.is_busy());
    }

    #[test]
    fn test_invalid_source_ends_failed() {
        let ctx = egui::Context::default();
        let mut diagrams = Diagrams::default();
        let key = diagrams.request("this is not a diagram");

        let deadline = Instant::now() + Duration::from_secs(10);
        while diagrams.is_busy() && Instant::now() < deadline {
            diagrams.poll(&ctx);
            thread::sleep(Duration::from_millis(10));
        }
        assert!(matches!(diagrams.state(key), Some(DiagramState::Failed(_))));
    }

    #[test]
    fn test_retain_drops_unused_diagrams() {
        let mut diagrams = Diagrams::default();
        let first = diagrams.request("graph TD\n  A --> B\n");
        let second = diagrams.request("graph TD\n  C --> D\n");

        diagrams.retain(&HashSet::from([second]));
        assert!(diagrams.state(first).is_none());
        assert!(diagrams.state(second).is_some());
    }
}
