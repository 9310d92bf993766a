//! Per-route parameter parsing.
//!
//! Each function runs every check of its route against one [`Inputs`] and
//! either returns the typed parameters or all failures at once. Ids are
//! resolved through the service, so a parsed id is known to exist.

use std::future::Future;

use axum::body::Bytes;
use base64::Engine as _;
use modkit::api::validate::coerce_integer;
use modkit::api::{
    ApiError, Bounds, Checked, CursorParams, FieldError, Inputs, Location, Need, Validator,
};
use serde_json::Value as Json;

use crate::api::rest::error::map_domain_error;
use crate::contract::model::{Collection, Id, Image, NewImage, Scope, Task, TaskFilter, User};
use crate::domain::error::DomainError;
use crate::domain::service::Service;

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn resolved<T>(r: Result<Option<T>, DomainError>) -> Result<Option<T>, ApiError> {
    r.map_err(|e| map_domain_error(&e))
}

/// Request body as JSON. An empty body counts as no body.
pub fn body_json(bytes: &Bytes) -> Result<Json, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Json::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|_| ApiError::rejected(FieldError::new(Location::Body, None, "Invalid JSON body")))
}

/// `since_id` / `max_id` / `count` of a plain listing.
pub fn page(svc: &Service, inputs: &Inputs) -> Result<Checked<CursorParams>, ApiError> {
    let cfg = svc.config();
    let mut v = Validator::new(inputs).tracking(["count"]);
    let cursor = CursorParams::parse(&mut v, cfg.default_page_size, cfg.max_page_size);
    Ok(v.finish(|| cursor)?)
}

/// The record named by the `:id` url segment.
pub async fn url_record<R, F, Fut>(inputs: &Inputs, model: &str, resolve: F) -> Result<R, ApiError>
where
    F: FnOnce(i64) -> Fut,
    Fut: Future<Output = Result<Option<R>, DomainError>>,
{
    let mut v = Validator::new(inputs);
    let record = resolved(v.id(Location::Url, "id", model, Need::Mandatory, resolve).await)?;
    Ok(v.finish(|| record)?.params)
}

pub fn new_image(inputs: &Inputs) -> Result<NewImage, ApiError> {
    let mut v = Validator::new(inputs);
    let width = v.integer(Location::Body, "width", Need::Mandatory, Bounds::min(1));
    let height = v.integer(Location::Body, "height", Need::Mandatory, Bounds::min(1));
    let payload = match v.base64(Location::Body, "payload", Need::Mandatory) {
        Some(encoded) => match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(_) => {
                v.push(FieldError::new(
                    Location::Body,
                    Some("payload"),
                    "Invalid Body Parameter 'payload', it is not a valid Base64 String",
                ));
                None
            }
        },
        None => None,
    };
    let checked = v.finish(|| {
        Some(NewImage {
            width: width?,
            height: height?,
            payload: payload?,
        })
    })?;
    Ok(checked.params)
}

pub struct ImageTagsParams {
    pub image: Image,
    pub cursor: CursorParams,
}

pub async fn image_tags(svc: &Service, inputs: &Inputs) -> Result<Checked<ImageTagsParams>, ApiError> {
    let cfg = svc.config();
    let mut v = Validator::new(inputs).tracking(["count"]);
    let image = resolved(
        v.id(Location::Url, "id", "Image", Need::Mandatory, |id| svc.find_image(id))
            .await,
    )?;
    let cursor = CursorParams::parse(&mut v, cfg.default_page_size, cfg.max_page_size);
    Ok(v.finish(|| {
        Some(ImageTagsParams {
            image: image?,
            cursor: cursor?,
        })
    })?)
}

pub struct ChooseParams {
    pub limit: u64,
    pub scope: Scope,
}

/// `limit` and the optional `collection` restriction of a selection route.
pub async fn choose(svc: &Service, inputs: &Inputs) -> Result<ChooseParams, ApiError> {
    let cfg = svc.config();
    let mut v = Validator::new(inputs);
    let limit = v.integer(
        Location::Query,
        "limit",
        Need::OrDefault(to_i64(cfg.default_choose_limit)),
        Bounds::between(1, to_i64(cfg.max_choose_limit)),
    );
    let collection: Option<Collection> = resolved(
        v.id(Location::Query, "collection", "Collection", Need::Optional, |id| {
            svc.find_collection(id)
        })
        .await,
    )?;
    let checked = v.finish(|| {
        Some(ChooseParams {
            limit: u64::try_from(limit?).ok()?,
            scope: Scope::from_collection(collection.as_ref()),
        })
    })?;
    Ok(checked.params)
}

pub struct TaskListParams {
    pub filter: TaskFilter,
    pub cursor: CursorParams,
}

pub async fn task_list(svc: &Service, inputs: &Inputs) -> Result<Checked<TaskListParams>, ApiError> {
    let cfg = svc.config();
    let mut v = Validator::new(inputs).tracking(["count", "image", "collection", "completed"]);
    let cursor = CursorParams::parse(&mut v, cfg.default_page_size, cfg.max_page_size);
    let image: Option<Image> = resolved(
        v.id(Location::Query, "image", "Image", Need::Optional, |id| svc.find_image(id))
            .await,
    )?;
    let collection: Option<Collection> = resolved(
        v.id(Location::Query, "collection", "Collection", Need::Optional, |id| {
            svc.find_collection(id)
        })
        .await,
    )?;
    let completed = v.boolean(Location::Query, "completed", Need::Optional);
    let both = inputs.get(Location::Query, "image").is_some()
        && inputs.get(Location::Query, "collection").is_some();
    v.check(both, || {
        FieldError::new(
            Location::Query,
            Some("image|collection"),
            "Cannot set both Image and Collection as filter",
        )
    });

    Ok(v.finish(|| {
        Some(TaskListParams {
            filter: TaskFilter {
                image: image.map(|i| i.id),
                images: collection.map(|c| c.images),
                completed,
            },
            cursor: cursor?,
        })
    })?)
}

/// Body `image` of a new task.
pub async fn new_task(svc: &Service, inputs: &Inputs) -> Result<Id, ApiError> {
    let mut v = Validator::new(inputs);
    let image = resolved(
        v.id(Location::Body, "image", "Image", Need::Mandatory, |id| svc.find_image(id))
            .await,
    )?;
    Ok(v.finish(|| image.map(|i| i.id))?.params)
}

pub struct TaskGetParams {
    pub task: Task,
    pub populate: bool,
}

pub async fn task_get(svc: &Service, inputs: &Inputs) -> Result<TaskGetParams, ApiError> {
    let mut v = Validator::new(inputs);
    let task = resolved(
        v.id(Location::Url, "id", "Task", Need::Mandatory, |id| svc.find_task(id))
            .await,
    )?;
    let populate = v.boolean(Location::Query, "populate", Need::OrDefault(false));
    let checked = v.finish(|| {
        Some(TaskGetParams {
            task: task?,
            populate: populate.unwrap_or(false),
        })
    })?;
    Ok(checked.params)
}

pub async fn task_user(svc: &Service, inputs: &Inputs) -> Result<(Task, User), ApiError> {
    let mut v = Validator::new(inputs);
    let task = resolved(
        v.id(Location::Url, "id", "Task", Need::Mandatory, |id| svc.find_task(id))
            .await,
    )?;
    let user = resolved(
        v.id(Location::Body, "user", "User", Need::Mandatory, |id| svc.find_user(id))
            .await,
    )?;
    Ok(v.finish(|| Some((task?, user?)))?.params)
}

/// Body `task` of a new microtask.
pub async fn new_microtask(svc: &Service, inputs: &Inputs) -> Result<Task, ApiError> {
    let mut v = Validator::new(inputs);
    let task = resolved(
        v.id(Location::Body, "task", "Task", Need::Mandatory, |id| svc.find_task(id))
            .await,
    )?;
    Ok(v.finish(|| task)?.params)
}

/// Body `images` of a new collection: ids, as an array or a JSON string of one.
pub fn new_collection(inputs: &Inputs) -> Result<Vec<Id>, ApiError> {
    let mut v = Validator::new(inputs);
    let images = v.array(Location::Body, "images", Need::Mandatory, |item| {
        coerce_integer(item).filter(|id| *id >= 0)
    });
    Ok(v.finish(|| images)?.params)
}
