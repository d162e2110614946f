use std::path::PathBuf;

use thiserror::Error;

/// Error kinds surfaced by the drift-search pipeline, from malformed
/// spectrograms through worker-loop deadlines.
#[derive(Error, Debug)]
pub enum DriftscanError {
    #[error("{path}: does not look like a valid spectrogram ({reason})")]
    MalformedInput { path: PathBuf, reason: String },

    #[error("{path}: output already exists, skipping")]
    SkipIdempotent { path: PathBuf },

    #[error("accelerator memory pool could not be drained on stop")]
    ResourceExhausted,

    #[error("{path}: failed schema validation ({reason})")]
    SchemaMismatch { path: PathBuf, reason: String },

    #[error("sigma-clip mask grew instead of shrinking, this is a coding error")]
    FitDegenerate,

    #[error("cooperative stop signalled by the supervisor")]
    Deadline,

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {path}: {source}")]
    Encoding {
        path: PathBuf,
        #[source]
        source: Box<bincode::ErrorKind>,
    },
}

pub type Result<T> = std::result::Result<T, DriftscanError>;
