use thiserror::Error;

use crate::contract::model::Id;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{model} not found: {id}")]
    NotFound { model: &'static str, id: Id },

    #[error("Task {id} is already closed")]
    TaskClosed { id: Id },

    #[error("Invalid image payload: {message}")]
    InvalidPayload { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Blob store error: {message}")]
    Blob { message: String },
}

impl DomainError {
    pub fn not_found(model: &'static str, id: Id) -> Self {
        Self::NotFound { model, id }
    }

    pub fn task_closed(id: Id) -> Self {
        Self::TaskClosed { id }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn blob(message: impl Into<String>) -> Self {
        Self::Blob {
            message: message.into(),
        }
    }
}
