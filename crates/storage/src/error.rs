/// All errors that can be returned by a RequestStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A record with this request id was already written. Records are write-once.
    #[error("request already recorded: {request_id}")]
    AlreadyExists { request_id: String },

    /// No record with the given request id.
    #[error("request not found: {request_id}")]
    NotFound { request_id: String },

    /// The record already carries an outcome; outcomes are attached once.
    #[error("outcome already recorded for request {request_id}")]
    OutcomeAlreadyRecorded { request_id: String },

    /// The record could not be encoded or decoded.
    #[error("record serialization error: {0}")]
    Serialization(String),

    /// A backend-specific storage error (connection, throttling, permissions, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
