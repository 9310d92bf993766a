use modkit::api::{ApiError, FieldError, Location};

use crate::domain::error::DomainError;

/// Map a domain error to the KO envelope.
pub fn map_domain_error(e: &DomainError) -> ApiError {
    match e {
        DomainError::NotFound { model, id } => ApiError::rejected(FieldError::not_found(
            Location::Url,
            Some("id"),
            format!("Unable to find {model} {id}"),
        )),
        DomainError::TaskClosed { .. } => ApiError::rejected(FieldError::status(e.to_string())),
        DomainError::InvalidPayload { message } => {
            ApiError::rejected(FieldError::new(Location::Body, None, message.clone()))
        }
        DomainError::Storage { .. } | DomainError::Blob { .. } => {
            // Log the internal error details; the response only carries them when exposure is on
            tracing::error!(error = %e, "Internal error occurred");
            ApiError::internal(e)
        }
    }
}
