//! Error types for the reconstruction engine and the PLY codec.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while decoding or encoding PLY data.
#[derive(Error, Debug)]
pub enum PlyError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid PLY header: {0}")]
    Header(String),

    #[error("invalid PLY body: {0}")]
    Body(String),

    #[error("file ends before element '{element}' is complete")]
    UnexpectedEof { element: String },

    #[error("face references vertex {index}, but only {vertex_count} vertices exist")]
    IndexOutOfRange { index: i64, vertex_count: usize },
}

/// Errors that abort a reconstruction request.
///
/// There is no partial result: when one of these is returned, nothing has
/// been written to the destination path.
#[derive(Error, Debug)]
pub enum ReconstructionError {
    #[error("failed to read artifact {path}: {source}")]
    ArtifactRead {
        path: PathBuf,
        #[source]
        source: PlyError,
    },

    #[error("failed to write artifact {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: PlyError,
    },

    #[error("point cloud has {found} points, at least 3 are required")]
    InsufficientPoints { found: usize },
}

/// Convenience type alias for reconstruction results.
pub type ReconstructionResult<T> = Result<T, ReconstructionError>;
