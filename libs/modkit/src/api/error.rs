use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::api::envelope::Failure;
use crate::api::validate::{ErrorKind, FieldError, Location};

pub const INTERNAL_MESSAGE: &str = "Internal Server Error";
pub const NOT_IMPLEMENTED: &str = "not implemented";

/// Unified API error type that handles all errors at the API boundary.
///
/// Handlers return `ApiResult<T>` and use `?`; every variant renders the KO
/// envelope (or the plain-text HTML stub) with the matching status code.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Accumulated parameter/state failures. 404 when an url id did not resolve,
    /// 400 otherwise.
    #[error("request rejected: {} error(s)", .0.len())]
    Rejected(Vec<FieldError>),

    /// Store/blob failure or any unexpected error.
    #[error("{message}")]
    Internal { message: String, chain: Vec<String> },

    /// HTML was negotiated; only JSON is implemented.
    #[error("not implemented")]
    NotImplemented,

    /// Neither JSON nor HTML is acceptable to the client.
    #[error("not acceptable")]
    NotAcceptable,
}

/// Raw detail of an internal error, attached to the 500 response as an
/// extension so the exposure layer can decide what to reveal.
#[derive(Clone, Debug)]
pub struct InternalDetail {
    pub message: String,
    pub chain: Vec<String>,
}

impl ApiError {
    pub fn rejected(error: FieldError) -> Self {
        ApiError::Rejected(vec![error])
    }

    /// Capture `err` and its `source()` chain.
    pub fn internal(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut cur = err.source();
        while let Some(e) = cur {
            chain.push(e.to_string());
            cur = e.source();
        }
        ApiError::Internal {
            message: err.to_string(),
            chain,
        }
    }

    pub fn internal_msg(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
            chain: Vec::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected(errors) => {
                let url_not_found = errors
                    .iter()
                    .any(|e| e.kind == ErrorKind::NotFound && e.location == Location::Url);
                if url_not_found {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::BAD_REQUEST
                }
            }
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            ApiError::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
        }
    }
}

impl From<Vec<FieldError>> for ApiError {
    fn from(errors: Vec<FieldError>) -> Self {
        ApiError::Rejected(errors)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal {
            message: e.to_string(),
            chain: e.chain().skip(1).map(ToString::to_string).collect(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Rejected(errors) => (status, Json(Failure::new(&errors))).into_response(),
            ApiError::Internal { message, chain } => {
                let generic = [FieldError::new(Location::Internal, None, INTERNAL_MESSAGE)];
                let mut resp = (status, Json(Failure::new(&generic))).into_response();
                resp.extensions_mut().insert(InternalDetail { message, chain });
                resp
            }
            ApiError::NotImplemented => (status, NOT_IMPLEMENTED).into_response(),
            ApiError::NotAcceptable => (status, "not acceptable").into_response(),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
