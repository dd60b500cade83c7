use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("INVALID_REQUEST: {0}")]
    InvalidRequest(String),
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("STORAGE: {0}")]
    Storage(String),
    #[error("API_FAILURE: {0}")]
    Api(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl From<std::io::Error> for CoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
