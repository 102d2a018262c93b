//! Short-lived notification popups.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use eframe::egui;

const TOAST_LIFETIME: Duration = Duration::from_secs(3);
const MAX_TOASTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    created: Instant,
}

#[derive(Debug, Default)]
pub struct Toasts {
    items: VecDeque<Toast>,
}

impl Toasts {
    pub fn success(&mut self, message: impl Into<String>, now: Instant) {
        self.push(ToastKind::Success, message.into(), now);
    }

    pub fn error(&mut self, message: impl Into<String>, now: Instant) {
        self.push(ToastKind::Error, message.into(), now);
    }

    fn push(&mut self, kind: ToastKind, message: String, now: Instant) {
        if self.items.len() == MAX_TOASTS {
            self.items.pop_front();
        }
        self.items.push_back(Toast {
            kind,
            message,
            created: now,
        });
    }

    /// Drop expired toasts
    pub fn prune(&mut self, now: Instant) {
        self.items
            .retain(|t| now.saturating_duration_since(t.created) < TOAST_LIFETIME);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    /// Draw live toasts in the top-right corner
    pub fn show(&mut self, ctx: &egui::Context, now: Instant) {
        self.prune(now);
        if self.is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-20.0, 40.0))
            .order(egui::Order::Foreground)
            .interactable(false)
            .show(ctx, |ui| {
                for toast in self.iter() {
                    let fill = match toast.kind {
                        ToastKind::Success => egui::Color32::from_rgb(16, 185, 129),
                        ToastKind::Error => egui::Color32::from_rgb(239, 68, 68),
                    };
                    egui::Frame::new()
                        .fill(fill)
                        .corner_radius(6.0)
                        .inner_margin(egui::Margin::symmetric(24, 12))
                        .show(ui, |ui| {
                            ui.label(egui::RichText::new(&toast.message).color(egui::Color32::WHITE));
                        });
                    ui.add_space(8.0);
                }
            });

        // Keep repainting so toasts disappear on time
        ctx.request_repaint_after(Duration::from_millis(250));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toasts_expire() {
        let start = Instant::now();
        let mut toasts = Toasts::default();
        toasts.success("File updated", start);
        toasts.error("Watch error", start + Duration::from_secs(2));

        toasts.prune(start + Duration::from_millis(2500));
        assert_eq!(toasts.iter().count(), 2);

        toasts.prune(start + Duration::from_millis(3500));
        let left: Vec<_> = toasts.iter().map(|t| t.kind).collect();
        assert_eq!(left, vec![ToastKind::Error]);

        toasts.prune(start + Duration::from_secs(10));
        assert!(toasts.is_empty());
    }

    #[test]
    fn test_oldest_toast_dropped_when_full() {
        let now = Instant::now();
        let mut toasts = Toasts::default();
        for i in 0..MAX_TOASTS + 2 {
            toasts.success(format!("toast {}", i), now);
        }
        assert_eq!(toasts.iter().count(), MAX_TOASTS);
        assert_eq!(toasts.iter().next().map(|t| t.message.as_str()), Some("toast 2"));
    }
}
