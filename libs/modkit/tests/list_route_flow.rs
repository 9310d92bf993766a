use std::collections::HashMap;

use axum::{
    body::to_bytes,
    extract::Query,
    http::{header::ACCEPT, Request, StatusCode},
    routing::get,
    Json, Router,
};
use modkit::api::{
    ok, ApiResult, CursorParams, Inputs, Location, Need, ResponseKind, SearchMetadata, Success,
    Validator,
};
use serde::Serialize;
use serde_json::{json, Value};
use tower::ServiceExt;

#[derive(Serialize)]
struct Numbers {
    search_metadata: SearchMetadata,
    numbers: Vec<i64>,
}

/// Lists ids 10..=1 newest first, honoring the cursor window.
async fn list(kind: ResponseKind, Query(q): Query<HashMap<String, String>>) -> ApiResult<Json<Success<Numbers>>> {
    kind.require_json()?;
    let inputs = Inputs::new().with_query(q);
    let mut v = Validator::new(&inputs).tracking(["count", "odd"]);
    let cursor = CursorParams::parse(&mut v, 100, 100);
    let odd = v.boolean(Location::Query, "odd", Need::Optional);
    let checked = v.finish(|| Some((cursor?, odd.unwrap_or(false))))?;
    let (cursor, odd) = checked.params;

    let numbers: Vec<i64> = (1..=10)
        .rev()
        .filter(|n| cursor.since_id.map_or(true, |s| *n > s))
        .filter(|n| cursor.max_id.map_or(true, |m| *n <= m))
        .filter(|n| !odd || n % 2 == 1)
        .take(cursor.count as usize)
        .collect();

    Ok(ok(Numbers {
        search_metadata: SearchMetadata::build(&cursor, checked.search, &numbers),
        numbers,
    }))
}

async fn call(uri: &str, accept: Option<&str>) -> (StatusCode, Value) {
    let app = Router::new().route("/numbers", get(list));
    let mut req = Request::builder().uri(uri);
    if let Some(a) = accept {
        req = req.header(ACCEPT, a);
    }
    let resp = app.oneshot(req.body(axum::body::Body::empty()).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into()));
    (status, body)
}

#[tokio::test]
async fn first_page_and_continuation() {
    let (status, body) = call("/numbers?count=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["numbers"], json!([10, 9]));
    assert_eq!(body["search_metadata"]["count"], 2);
    assert_eq!(body["search_metadata"]["refresh_url"], "?since_id=10&count=2");
    assert_eq!(body["search_metadata"]["next_results"], "?max_id=8&count=2");

    let (_, next) = call("/numbers?max_id=8&count=2", None).await;
    assert_eq!(next["numbers"], json!([8, 7]));
    assert_eq!(next["search_metadata"]["max_id"], 8);
}

#[tokio::test]
async fn extra_tracked_params_are_echoed() {
    let (_, body) = call("/numbers?count=3&odd=1", None).await;
    assert_eq!(body["numbers"], json!([9, 7, 5]));
    assert_eq!(body["search_metadata"]["next_results"], "?max_id=4&count=3&odd=true");
}

#[tokio::test]
async fn all_errors_reported_together() {
    let (status, body) = call("/numbers?count=0&since_id=x", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "KO");
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    assert_eq!(body["errors"][0]["location"], "query");
}

#[tokio::test]
async fn html_is_not_implemented() {
    let (status, body) = call("/numbers", Some("text/html")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body, Value::String("not implemented".into()));
}
