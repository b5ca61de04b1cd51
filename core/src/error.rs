use thiserror::Error;

/// Errors raised by index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// IDF was requested for a term no indexed document contains.
    #[error("term '{term}' does not occur in any indexed document")]
    UnseenTerm { term: String },

    #[error("snapshot is empty: missing metadata line")]
    MissingMetadata,

    #[error("malformed snapshot line {line}: {source}")]
    MalformedSnapshot {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot io: {0}")]
    Io(#[from] std::io::Error),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;
