//! `{status: "OK", ...}` / `{status: "KO", errors: [...]}` response envelopes.

use axum::Json;
use serde::Serialize;

use crate::api::validate::FieldError;

pub const STATUS_OK: &str = "OK";
pub const STATUS_KO: &str = "KO";

/// Success envelope; the payload's fields sit next to `status`.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub status: &'static str,
    #[serde(flatten)]
    pub body: T,
}

/// Failure envelope.
#[derive(Debug, Serialize)]
pub struct Failure<'a> {
    pub status: &'static str,
    pub errors: &'a [FieldError],
}

impl<'a> Failure<'a> {
    pub fn new(errors: &'a [FieldError]) -> Self {
        Self {
            status: STATUS_KO,
            errors,
        }
    }
}

/// Payload of update-style endpoints: just the status.
#[derive(Debug, Default, Serialize)]
pub struct Done {}

/// Payload of create endpoints.
#[derive(Debug, Serialize)]
pub struct Created {
    pub id: i64,
}

pub fn ok<T: Serialize>(body: T) -> Json<Success<T>> {
    Json(Success {
        status: STATUS_OK,
        body,
    })
}

pub fn done() -> Json<Success<Done>> {
    ok(Done {})
}

pub fn created(id: i64) -> Json<Success<Created>> {
    ok(Created { id })
}
