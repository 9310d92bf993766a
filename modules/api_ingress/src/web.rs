use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use modkit::api::{ok, FieldError, Failure, Location, ResponseKind};
use serde::Serialize;

pub const UP_MESSAGE: &str = "Server Up and Running";

#[derive(Serialize)]
struct Message {
    message: &'static str,
}

/// `GET /`
pub async fn index(kind: ResponseKind) -> Response {
    match kind {
        ResponseKind::Json => ok(Message {
            message: UP_MESSAGE,
        })
        .into_response(),
        ResponseKind::Html => Html(UP_MESSAGE).into_response(),
        ResponseKind::Unacceptable => modkit::ApiError::NotAcceptable.into_response(),
    }
}

/// Fallback for every unknown method/path pair.
pub async fn invalid_route(kind: ResponseKind) -> Response {
    match kind {
        ResponseKind::Html => (StatusCode::NOT_FOUND, "invalid route").into_response(),
        _ => {
            let errors = [FieldError::new(Location::Url, None, "Invalid route")];
            (StatusCode::NOT_FOUND, Json(Failure::new(&errors))).into_response()
        }
    }
}
