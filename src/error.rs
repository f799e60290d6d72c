//! Error type shared by the pipeline, the I/O layer and the background jobs.
//!
//! Every job converts an `EditorError` into a status-bar line at its boundary,
//! so the `Display` text is what the user ends up reading.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The file could not be opened or decoded.
    #[error("Error loading image {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    /// A palette name outside the fixed set was requested.
    #[error("Unknown palette '{0}'")]
    UnknownPalette(String),

    /// No source image, an invalid parameter, or a failure inside the pipeline.
    #[error("Error processing image: {0}")]
    Processing(String),

    /// Encoding or writing the output file failed.
    #[error("Error saving image {}: {message}", .path.display())]
    Save { path: PathBuf, message: String },
}

impl EditorError {
    pub(crate) fn load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        EditorError::Load {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn save(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        EditorError::Save {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
