use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};

use crate::api::rest::handlers;
use crate::domain::service::Service;

pub fn register_routes(mut router: Router, service: Arc<Service>) -> anyhow::Result<Router> {
    router = router
        .route("/images", get(handlers::list_images).post(handlers::create_image))
        .route("/images/{id}", get(handlers::get_image))
        .route("/images/{id}/tags", get(handlers::list_image_tags));

    router = router
        .route("/choose", get(handlers::list_objects))
        .route("/choose/image", get(handlers::list_image_algorithms))
        .route("/choose/image/random", get(handlers::choose_random_image))
        .route("/choose/image/leastused", get(handlers::choose_least_used_image))
        .route("/choose/imageandtag", get(handlers::list_image_and_tag_algorithms))
        .route("/choose/imageandtag/random", get(handlers::choose_random_image_and_tag))
        .route("/choose/imageandtag/leastused", get(handlers::choose_least_used_image_and_tag))
        .route("/choose/imageandtag/mostused", get(handlers::choose_most_used_image_and_tag));

    router = router
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route("/tasks/{id}", get(handlers::get_task))
        .route("/tasks/{id}/complete", post(handlers::complete_task))
        .route("/tasks/{id}/users", post(handlers::add_task_user))
        .route("/microtasks", post(handlers::create_microtask))
        .route("/microtasks/{id}", get(handlers::get_microtask))
        .route("/users", post(handlers::create_user))
        .route("/users/{id}", get(handlers::get_user))
        .route("/collections", post(handlers::create_collection))
        .route("/collections/{id}", get(handlers::get_collection))
        .route("/segmentations", get(handlers::list_segmentations))
        .route("/segmentations/{id}", get(handlers::get_segmentation));

    router = router.layer(Extension(service));
    Ok(router)
}
