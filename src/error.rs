//! Error types for loading, rendering and watching documents.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures of the render pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("document contains binary data and cannot be rendered as markdown")]
    Binary,
}

/// Why a mermaid block could not be drawn
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagramError {
    #[error("unknown diagram type")]
    UnknownKind,

    #[error("{0}")]
    Syntax(String),

    #[error("failed to rasterize diagram")]
    Raster,
}

/// Everything the viewer can report to the user
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("Unsupported file type: {}. Please open a markdown file (.md, .markdown)", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("Failed to load file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to render document: {0}")]
    Render(#[from] RenderError),

    #[error("Cannot watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to export document: {0}")]
    Export(#[source] io::Error),
}

impl ViewerError {
    /// Classify an I/O error raised while reading `path`
    pub fn read(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Read {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_errors_are_classified_by_kind() {
        let path = Path::new("notes.md");

        let err = ViewerError::read(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, ViewerError::NotFound(_)));
        assert_eq!(err.to_string(), "File not found: notes.md");

        let err = ViewerError::read(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.to_string(), "Permission denied: notes.md");

        let err = ViewerError::read(path, io::Error::other("disk on fire"));
        assert_eq!(err.to_string(), "Failed to load file notes.md: disk on fire");
    }

    #[test]
    fn render_error_converts() {
        let err: ViewerError = RenderError::Binary.into();
        assert!(err.to_string().starts_with("Failed to render document"));
    }
}
