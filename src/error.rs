use std::path::PathBuf;

/// Failure to write a task collection to its backing file.
///
/// The in-memory store stays authoritative when this is returned; callers
/// decide whether to surface it or keep going.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize task collection: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Why the external text generator could not produce a description.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("no API key configured for the text generator")]
    MissingApiKey,

    #[error("generator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generator returned a malformed response: {0}")]
    Malformed(String),

    #[error("generator returned an empty description")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("foreground application unavailable: {0}")]
    Unavailable(String),
}
