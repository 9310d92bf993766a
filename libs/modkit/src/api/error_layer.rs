//! Internal-error exposure.
//!
//! `ApiError::Internal` always renders a generic 500 body. This middleware
//! rewrites that body when the host is configured to reveal the raw message
//! (`dump_exceptions`) and/or the error chain (`show_stack`).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::api::envelope::STATUS_KO;
use crate::api::error::{InternalDetail, INTERNAL_MESSAGE};
use crate::api::validate::Location;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorExposure {
    pub dump_exceptions: bool,
    pub show_stack: bool,
}

impl ErrorExposure {
    pub fn is_hidden(&self) -> bool {
        !self.dump_exceptions && !self.show_stack
    }
}

#[derive(Serialize)]
struct ExposedError {
    location: Location,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<String>,
}

#[derive(Serialize)]
struct ExposedBody {
    status: &'static str,
    errors: [ExposedError; 1],
}

pub async fn expose_internal_errors(
    State(exposure): State<ErrorExposure>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let Some(detail) = response.extensions_mut().remove::<InternalDetail>() else {
        return response;
    };

    tracing::error!(error = %detail.message, chain = ?detail.chain, "internal error");

    if exposure.is_hidden() {
        return response;
    }

    let message = if exposure.dump_exceptions {
        detail.message.clone()
    } else {
        INTERNAL_MESSAGE.to_string()
    };
    let stack = exposure.show_stack.then(|| {
        std::iter::once(detail.message.as_str())
            .chain(detail.chain.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\ncaused by: ")
    });

    let body = ExposedBody {
        status: STATUS_KO,
        errors: [ExposedError {
            location: Location::Internal,
            message,
            stack,
        }],
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
