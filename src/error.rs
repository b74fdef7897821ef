use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong between a screenshot and a MIDI file.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Input file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid image file: {path}: {reason}")]
    InvalidImage { path: PathBuf, reason: String },

    /// Base64 read failure or a MIDI build/write failure.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Transport, auth, or rate-limit failure from the vision endpoint.
    #[error("Vision endpoint request failed: {0}")]
    Upstream(String),

    #[error("No JSON found in response")]
    NoJsonFound,

    #[error("Response was not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Invalid response structure: {0}")]
    SchemaViolation(String),
}
