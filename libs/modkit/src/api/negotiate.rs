//! `Accept`-header negotiation between the JSON and HTML representations.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{header::ACCEPT, request::Parts, HeaderMap};

use crate::api::error::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Html,
    Unacceptable,
}

impl ResponseKind {
    /// Pick the preferred representation. Missing header, empty header and
    /// wildcards resolve to JSON; on equal quality JSON wins.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let accept = headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        Self::from_accept(&accept)
    }

    pub fn from_accept(accept: &str) -> Self {
        if accept.trim().is_empty() {
            return ResponseKind::Json;
        }

        let mut json_q = 0.0_f32;
        let mut html_q = 0.0_f32;
        for range in accept.split(',') {
            let mut parts = range.split(';');
            let media = parts.next().unwrap_or("").trim().to_ascii_lowercase();
            let q = parts
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);

            match media.as_str() {
                "application/json" | "application/*" | "text/json" => json_q = json_q.max(q),
                "text/html" | "application/xhtml+xml" | "text/*" => html_q = html_q.max(q),
                "*/*" => {
                    json_q = json_q.max(q);
                    html_q = html_q.max(q * 0.99);
                }
                _ => {}
            }
        }

        if json_q <= 0.0 && html_q <= 0.0 {
            ResponseKind::Unacceptable
        } else if json_q >= html_q {
            ResponseKind::Json
        } else {
            ResponseKind::Html
        }
    }

    /// Gate for JSON-only handlers: HTML is answered with 501, anything else with 406.
    pub fn require_json(self) -> Result<(), ApiError> {
        match self {
            ResponseKind::Json => Ok(()),
            ResponseKind::Html => Err(ApiError::NotImplemented),
            ResponseKind::Unacceptable => Err(ApiError::NotAcceptable),
        }
    }
}

impl<S> FromRequestParts<S> for ResponseKind
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    #[allow(clippy::manual_async_fn)]
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl core::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let kind = ResponseKind::from_headers(&parts.headers);
        async move { Ok(kind) }
    }
}
