use thiserror::Error;

use crate::contract::model::Id;

/// Errors that are safe to expose to other modules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationsError {
    #[error("{model} not found: {id}")]
    NotFound { model: &'static str, id: Id },

    #[error("Task {id} is already closed")]
    Closed { id: Id },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal error")]
    Internal,
}

impl AnnotationsError {
    pub fn not_found(model: &'static str, id: Id) -> Self {
        Self::NotFound { model, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self::Internal
    }
}

impl From<crate::domain::error::DomainError> for AnnotationsError {
    fn from(domain_error: crate::domain::error::DomainError) -> Self {
        use crate::domain::error::DomainError::*;
        match domain_error {
            NotFound { model, id } => Self::not_found(model, id),
            TaskClosed { id } => Self::Closed { id },
            InvalidPayload { message } => Self::validation(message),
            Storage { .. } | Blob { .. } => Self::internal(),
        }
    }
}
