//! Errors for the core library.
use thiserror::Error;

/// Errors raised by the settings store and the blob store.
#[derive(Debug, Error)]
pub enum Error {
    /// The document database rejected or failed an operation.
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    /// A document could not be turned into BSON.
    #[error("BSON serialize error: {0}")]
    BsonSer(#[from] mongodb::bson::ser::Error),
    /// A stored document does not match the expected shape.
    #[error("BSON deserialize error: {0}")]
    BsonDe(#[from] mongodb::bson::de::Error),
    /// Filesystem failure in the blob store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// A signed URL token is expired, forged or issued for another object.
    #[error("Invalid signature: {0}")]
    Signature(#[from] jsonwebtoken::errors::Error),
    /// A settings payload has values the document database can't hold,
    /// e.g. integers above `i64::MAX`.
    #[error("Settings can't be stored: {0}")]
    Unstorable(String),
    /// Object path is empty, absolute or escapes the storage root.
    #[error("Invalid object path `{0}`")]
    InvalidPath(String),
    /// URL of a stored object could not be built.
    #[error("Unable to build url: {0}")]
    Url(#[from] url::ParseError),
    /// Any other failure reported by a backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;
