//! Click-to-zoom view for images and diagrams.

use std::path::Path;

use eframe::egui;

/// Share of the window the enlarged image may cover
const MAX_SCREEN_SHARE: f32 = 0.9;

pub enum LightboxContent {
    Image {
        uri: String,
        alt: String,
    },
    Diagram {
        texture: egui::TextureHandle,
        size: egui::Vec2,
    },
}

/// Turn an image reference from a document into a URI the image loaders accept.
///
/// Relative paths are taken from the document's directory.
pub fn image_uri(url: &str, base_dir: Option<&Path>) -> String {
    if url.contains("://") || url.starts_with("data:") {
        return url.to_string();
    }
    let path = Path::new(url);
    match base_dir {
        Some(dir) if path.is_relative() => format!("file://{}", dir.join(path).display()),
        _ => format!("file://{}", path.display()),
    }
}

#[derive(Default)]
pub struct Lightbox {
    content: Option<LightboxContent>,
}

impl Lightbox {
    pub fn open(&mut self, content: LightboxContent) {
        self.content = Some(content);
    }

    pub fn close(&mut self) {
        self.content = None;
    }

    pub fn is_open(&self) -> bool {
        self.content.is_some()
    }

    /// Draw the enlarged image over everything. Escape, a click on the
    /// backdrop, the image, or the close button dismisses it.
    pub fn show(&mut self, ctx: &egui::Context) {
        let Some(content) = &self.content else {
            return;
        };
        let max_size = ctx.available_rect().size() * MAX_SCREEN_SHARE;
        let mut close = false;

        let modal = egui::Modal::new(egui::Id::new("lightbox"))
            .backdrop_color(egui::Color32::from_black_alpha(215))
            .frame(
                egui::Frame::new()
                    .fill(egui::Color32::WHITE)
                    .corner_radius(8.0)
                    .inner_margin(egui::Margin::same(12)),
            )
            .show(ctx, |ui| {
                let (image, alt) = match content {
                    LightboxContent::Image { uri, alt } => {
                        (egui::Image::from_uri(uri.as_str()), Some(alt.as_str()))
                    }
                    LightboxContent::Diagram { texture, size } => (
                        egui::Image::new(egui::load::SizedTexture::new(texture.id(), *size)),
                        None,
                    ),
                };

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                    if ui.button("✕").on_hover_text("Close (Esc)").clicked() {
                        close = true;
                    }
                });

                let response = ui.add(
                    image
                        .fit_to_exact_size(max_size)
                        .maintain_aspect_ratio(true)
                        .sense(egui::Sense::click()),
                );
                if response.clicked() {
                    close = true;
                }

                if let Some(alt) = alt.filter(|a| !a.is_empty()) {
                    ui.vertical_centered(|ui| {
                        ui.label(egui::RichText::new(alt).color(egui::Color32::DARK_GRAY));
                    });
                }
            });

        if close || modal.should_close() {
            self.close();
        }
    }
}
