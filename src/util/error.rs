//! Error types for the scene editor and path tracer core.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scene and renderer operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Mesh template name is not registered
    #[error("Unknown mesh template: {0}")]
    UnknownTemplate(String),

    /// Mesh handle does not index into the registry
    #[error("Mesh handle {handle} out of range (count: {count})")]
    InvalidMeshHandle { handle: usize, count: usize },

    /// Instance handle does not index into the scene
    #[error("Instance handle {handle} out of range (count: {count})")]
    InvalidHandle { handle: usize, count: usize },

    /// More primitives of one kind than the trace kernel can hold
    #[error("Capacity exceeded: at most {capacity} {kind} supported")]
    CapacityExceeded { kind: &'static str, capacity: usize },

    /// Scene file could not be opened, read or written
    #[error("Scene file {path}: {source}")]
    SceneFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scene graph structures disagree with each other
    #[error("Scene graph inconsistent: {0}")]
    Inconsistent(String),
}

impl Error {
    /// Create an inconsistency error.
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }

    /// Wrap an I/O error with the scene file it happened on.
    pub fn scene_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SceneFile { path: path.into(), source }
    }
}

/// Result type alias for scene operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::UnknownTemplate("Cylinder".into());
        assert!(e.to_string().contains("Cylinder"));

        let e = Error::InvalidHandle { handle: 5, count: 3 };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("3"));

        let e = Error::CapacityExceeded { kind: "spheres", capacity: 32 };
        assert!(e.to_string().contains("32 spheres"));
    }

    #[test]
    fn test_scene_file_error_keeps_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::scene_file("data/scenes/a.scene", io_err);
        assert!(err.to_string().contains("a.scene"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("denied"));
    }
}
