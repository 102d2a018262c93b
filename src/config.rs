//! Runtime settings assembled from the command line.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::toc::DEFAULT_LOOKAHEAD_PX;
use crate::watch::DEFAULT_POLL_INTERVAL;

#[derive(Parser, Debug)]
#[command(name = "ohp-viewer")]
#[command(about = "A markdown viewer with table of contents and hot reload", long_about = None)]
pub struct Args {
    /// Markdown file to open
    pub file: Option<PathBuf>,

    /// Enable hot reload (re-read the file when it changes on disk)
    #[arg(short, long)]
    pub watch: bool,

    /// Hot reload poll interval in milliseconds
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    pub interval: u64,

    /// How far below the top of the view a heading becomes active, in pixels
    #[arg(long, value_name = "PX", default_value_t = DEFAULT_LOOKAHEAD_PX)]
    pub lookahead: f32,

    /// Start with the table of contents hidden
    #[arg(long)]
    pub no_toc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub poll_interval: Duration,
    pub lookahead: f32,
    /// Arm hot reload for files opened through the picker
    pub watch_on_open: bool,
    pub show_toc: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            lookahead: DEFAULT_LOOKAHEAD_PX,
            watch_on_open: true,
            show_toc: true,
        }
    }
}

impl From<&Args> for ViewerConfig {
    fn from(args: &Args) -> Self {
        Self {
            // Polling faster than a frame buys nothing
            poll_interval: Duration::from_millis(args.interval.max(16)),
            lookahead: args.lookahead.max(0.0),
            watch_on_open: true,
            show_toc: !args.no_toc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let args = Args::parse_from(["ohp-viewer"]);
        assert_eq!(ViewerConfig::from(&args), ViewerConfig::default());
        assert!(args.file.is_none());
        assert!(!args.watch);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "ohp-viewer",
            "notes.md",
            "--watch",
            "--interval",
            "250",
            "--lookahead",
            "40",
            "--no-toc",
        ]);
        let config = ViewerConfig::from(&args);

        assert_eq!(args.file, Some(PathBuf::from("notes.md")));
        assert!(args.watch);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.lookahead, 40.0);
        assert!(!config.show_toc);
    }

    #[test]
    fn test_interval_has_a_floor() {
        let args = Args::parse_from(["ohp-viewer", "--interval", "0"]);
        assert_eq!(ViewerConfig::from(&args).poll_interval, Duration::from_millis(16));
    }
}
