use thiserror::Error;

/// Errors reported by tree and cursor operations.
///
/// Every variant describes API misuse detected before the tree is touched,
/// except [`ArtError::Corrupted`], which only the structural checker produces.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArtError {
    #[error("cursor is not positioned on a key")]
    InvalidCursor,
    #[error("cursor was created for a different root handle")]
    ForeignCursor,
    #[error("cursors belong to different root handles")]
    CursorMismatch,
    #[error("root handle is read-only")]
    ReadOnly,
    #[error("root handle is already writable")]
    AlreadyWritable,
    #[error("root handles do not share the same tree")]
    RootMismatch,
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("key of {len} bytes exceeds the maximum key length")]
    KeyTooLong { len: usize },
    #[error("tree structure corrupted: {0}")]
    Corrupted(String),
}

pub type Result<T> = std::result::Result<T, ArtError>;
