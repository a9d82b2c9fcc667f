use thiserror::Error;

/// Failure of one pipeline step. Nothing here is retried; the variant tells the caller which
/// collaborator gave up.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source unreachable: {0}")]
    Network(String),

    #[error("source returned HTTP {status}")]
    Http { status: u16 },

    #[error("failed to parse source page: {0}")]
    Parse(String),

    #[error("source table header mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("filesystem error at {path}: {source}")]
    FileSystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object store upload failed: {0}")]
    Storage(String),

    #[error("job trigger failed: {0}")]
    JobTrigger(String),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Network(_) => "network",
            IngestError::Http { .. } => "http",
            IngestError::Parse(_) => "parse",
            IngestError::SchemaMismatch { .. } => "schema_mismatch",
            IngestError::FileSystem { .. } => "filesystem",
            IngestError::Storage(_) => "storage",
            IngestError::JobTrigger(_) => "job_trigger",
        }
    }

    pub(crate) fn fs(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        IngestError::FileSystem {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
