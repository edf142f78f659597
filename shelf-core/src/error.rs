use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog at {} is corrupt: {source}", path.display())]
    CorruptCatalog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Files were already written or removed when the catalog save failed.
    #[error(
        "catalog update for \"{name}\" was not persisted ({source}); retrying the operation is safe"
    )]
    Persistence {
        name: String,
        #[source]
        source: Box<ShelfError>,
    },

    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("configuration error: {0}")]
    Config(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, ShelfError>;
