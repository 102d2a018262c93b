#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod collapse;
mod config;
mod diagram;
mod error;
mod export;
mod lightbox;
mod render;
mod session;
mod toast;
mod toc;
mod viewer;
mod watch;

use clap::Parser;
use eframe::egui;

use crate::app::MarkdownApp;
use crate::config::{Args, ViewerConfig};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = ViewerConfig::from(&args);
    log::debug!("Starting with {:?}", config);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_min_inner_size([400.0, 300.0])
            .with_title("Markdown Viewer")
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "ohp-viewer",
        options,
        Box::new(move |cc| Ok(Box::new(MarkdownApp::new(cc, config, args.file, args.watch)))),
    )
}
