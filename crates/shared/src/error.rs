use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    StoreWrite,
    StoreRead,
    UnknownEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactError {
    #[error("contact rejected: {field} must not be blank")]
    ValidationRejected { field: &'static str },
    #[error("store write failed: {0}")]
    StoreWriteFailed(String),
    #[error("store read failed: {0}")]
    StoreReadFailed(String),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

impl ContactError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ValidationRejected { .. } => ErrorCode::Validation,
            Self::StoreWriteFailed(_) => ErrorCode::StoreWrite,
            Self::StoreReadFailed(_) => ErrorCode::StoreRead,
            Self::UnknownEvent(_) => ErrorCode::UnknownEvent,
        }
    }
}
