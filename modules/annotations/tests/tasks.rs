mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{app, get, post, seed, TestApp};

async fn with_images(n: usize) -> TestApp {
    let t = app().await;
    let images: Vec<Value> = (0..n).map(|_| json!({"width": 10, "height": 10})).collect();
    seed(&t.store, "image", Value::Array(images)).await;
    t
}

fn ids(list: &Value) -> Vec<i64> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn task_requires_an_existing_image() {
    let t = with_images(1).await;

    let (status, body) = post(&t.router, "/tasks", json!({"image": 5})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"],
        json!([{"location": "body", "name": "image", "message": "Unable to find Image 5 in Body Parameter 'image'"}])
    );

    let (status, body) = post(&t.router, "/tasks", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["message"], "Missing Body Parameter 'image'");

    let (status, body) = post(&t.router, "/tasks", json!({"image": 0})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "OK", "id": 0}));
}

#[tokio::test]
async fn completing_a_task_closes_its_open_microtasks() {
    let t = with_images(1).await;
    post(&t.router, "/tasks", json!({"image": 0})).await;
    let (_, m0) = post(&t.router, "/microtasks", json!({"task": 0})).await;
    let (_, m1) = post(&t.router, "/microtasks", json!({"task": "0"})).await;
    assert_eq!((m0["id"].as_i64(), m1["id"].as_i64()), (Some(0), Some(1)));

    let (status, body) = post(&t.router, "/tasks/0/complete", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "OK"}));

    let (_, task) = get(&t.router, "/tasks/0").await;
    let completed_at = task["task"]["completed_at"].clone();
    assert!(completed_at.is_string());
    for id in [0, 1] {
        let (_, m) = get(&t.router, &format!("/microtasks/{id}")).await;
        assert_eq!(m["microtask"]["completed_at"], completed_at);
    }

    // Completing again is accepted and changes nothing.
    let (status, _) = post(&t.router, "/tasks/0/complete", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (_, again) = get(&t.router, "/tasks/0").await;
    assert_eq!(again["task"]["completed_at"], completed_at);
}

#[tokio::test]
async fn closed_task_rejects_new_microtasks() {
    let t = with_images(1).await;
    post(&t.router, "/tasks", json!({"image": 0})).await;
    post(&t.router, "/tasks/0/complete", json!({})).await;

    let (status, body) = post(&t.router, "/microtasks", json!({"task": 0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"status": "KO", "errors": [{"location": "status", "message": "Task 0 is already closed"}]})
    );
}

#[tokio::test]
async fn completing_unknown_task_is_not_found() {
    let t = with_images(0).await;
    let (status, body) = post(&t.router, "/tasks/3/complete", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"][0]["message"], "Unable to find Task 3");
}

#[tokio::test]
async fn adding_a_user_twice_keeps_one_entry() {
    let t = with_images(1).await;
    post(&t.router, "/tasks", json!({"image": 0})).await;
    let (_, user) = post(&t.router, "/users", json!({})).await;
    assert_eq!(user["id"], 0);

    for _ in 0..2 {
        let (status, body) = post(&t.router, "/tasks/0/users", json!({"user": 0})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "OK"}));
    }
    let (_, task) = get(&t.router, "/tasks/0").await;
    assert_eq!(task["task"]["users"], json!([0]));

    let (status, body) = post(&t.router, "/tasks/0/users", json!({"user": 7})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["message"], "Unable to find User 7 in Body Parameter 'user'");
}

#[tokio::test]
async fn populate_embeds_references() {
    let t = with_images(1).await;
    post(&t.router, "/tasks", json!({"image": 0})).await;
    post(&t.router, "/users", json!({})).await;
    post(&t.router, "/tasks/0/users", json!({"user": 0})).await;
    post(&t.router, "/microtasks", json!({"task": 0})).await;

    let (_, plain) = get(&t.router, "/tasks/0").await;
    assert_eq!(plain["task"]["image"], 0);
    assert_eq!(plain["task"]["users"], json!([0]));

    let (status, populated) = get(&t.router, "/tasks/0?populate=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(populated["task"]["image"]["id"], 0);
    assert_eq!(populated["task"]["image"]["width"], 10);
    assert_eq!(populated["task"]["users"][0]["id"], 0);
    assert_eq!(populated["task"]["microtasks"][0]["task"], 0);
    assert!(populated["task"].get("completed_at").is_none());
}

#[tokio::test]
async fn task_listing_filters() {
    let t = with_images(3).await;
    for image in [0, 1, 2, 1] {
        post(&t.router, "/tasks", json!({"image": image})).await;
    }
    post(&t.router, "/tasks/1/complete", json!({})).await;

    let (_, body) = get(&t.router, "/tasks?image=1").await;
    assert_eq!(ids(&body["tasks"]), vec![3, 1]);
    assert_eq!(body["search_metadata"]["image"], 1);

    let (_, body) = get(&t.router, "/tasks?completed=false").await;
    assert_eq!(ids(&body["tasks"]), vec![3, 2, 0]);

    let (_, body) = get(&t.router, "/tasks?completed=1&count=1").await;
    assert_eq!(ids(&body["tasks"]), vec![1]);
    assert_eq!(body["search_metadata"]["next_results"], "?max_id=0&completed=true&count=1");

    let (_, created) = post(&t.router, "/collections", json!({"images": [0, 2]})).await;
    let (_, body) = get(&t.router, &format!("/tasks?collection={}", created["id"])).await;
    assert_eq!(ids(&body["tasks"]), vec![2, 0]);
}

#[tokio::test]
async fn image_and_collection_filters_are_exclusive() {
    let t = with_images(1).await;
    post(&t.router, "/collections", json!({"images": [0]})).await;

    let (status, body) = get(&t.router, "/tasks?image=0&collection=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"],
        json!([{"location": "query", "name": "image|collection", "message": "Cannot set both Image and Collection as filter"}])
    );
}

#[tokio::test]
async fn empty_collection_lists_nothing_without_querying_tasks() {
    let t = with_images(1).await;
    post(&t.router, "/tasks", json!({"image": 0})).await;
    post(&t.router, "/collections", json!({"images": "[]"})).await;

    let (status, body) = get(&t.router, "/tasks?collection=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"], json!([]));
    assert_eq!(t.store.calls("find", "task"), 0);
}

#[tokio::test]
async fn collections_and_users_round_trip() {
    let t = with_images(0).await;

    let (status, body) = post(&t.router, "/collections", json!({"images": [3, 1, 3]})).await;
    assert_eq!(status, StatusCode::OK);
    let (_, c) = get(&t.router, &format!("/collections/{}", body["id"])).await;
    assert_eq!(c["collection"]["images"], json!([3, 1]));

    let (status, body) = post(&t.router, "/collections", json!({"images": "nope"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["message"], "Invalid Body Parameter 'images', it is not an Array");

    let (_, created) = post(&t.router, "/users", json!({})).await;
    let (status, user) = get(&t.router, &format!("/users/{}", created["id"])).await;
    assert_eq!(status, StatusCode::OK);
    assert!(user["user"]["created_at"].is_string());
}

#[tokio::test]
async fn segmentations_are_listed_and_fetched() {
    let t = with_images(0).await;
    seed(
        &t.store,
        "segmentation",
        json!([
            {"points": [{"x": 1.5, "y": 2, "color": {"r": 1, "g": 2, "b": 3}}]},
            {"points": [{"x": 0, "y": 0, "removed": true}]}
        ]),
    )
    .await;

    let (status, body) = get(&t.router, "/segmentations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["segmentations"]), vec![1, 0]);

    let (_, body) = get(&t.router, "/segmentations/0").await;
    assert_eq!(
        body["segmentation"],
        json!({"id": 0, "points": [{"x": 1.5, "y": 2.0, "color": {"r": 1, "g": 2, "b": 3}}]})
    );
}
