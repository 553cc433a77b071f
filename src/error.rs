use thiserror::Error;

/// Errors raised by the store and media layers.
///
/// Each variant maps onto one protocol error code, see [`PortalError::code`].
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{0}")]
    BadParams(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("media host error: {0}")]
    Media(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("transaction failed: {0}")]
    Tx(rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PortalError {
    pub fn code(&self) -> &'static str {
        match self {
            PortalError::BadParams(_) => "bad_params",
            PortalError::NotFound(_) => "not_found",
            PortalError::Conflict(_) => "conflict",
            PortalError::Forbidden(_) => "forbidden",
            PortalError::Media(_) => "media_failed",
            PortalError::Io(_) => "io_failed",
            PortalError::Db(_) => "db_query_failed",
            PortalError::Tx(_) => "db_tx_failed",
            PortalError::Json(_) => "bad_params",
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        PortalError::BadParams(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortalError::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        PortalError::Forbidden(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;
