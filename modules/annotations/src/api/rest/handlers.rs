use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query},
    Extension, Json,
};
use modkit::api::{
    created, done, ok, ApiResult, Created, Done, Inputs, ResponseKind, SearchMetadata, Success,
};
use tracing::{error, info};

use crate::api::rest::dto::{
    AlgorithmsDto, ChoiceListDto, CollectionBody, ImageBody, ImageDto, ImageListDto,
    MicrotaskBody, ObjectsDto, SegmentationBody, SegmentationDto, SegmentationListDto, TagDto,
    TagListDto, TaskBody, TaskDto, TaskListDto, TaskView, UserBody,
};
use crate::api::rest::error::map_domain_error;
use crate::api::rest::params;
use crate::contract::model::Choice;
use crate::domain::error::DomainError;
use crate::domain::service::Service;

type Params = HashMap<String, String>;

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// --- images ---

pub async fn list_images(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<ImageListDto>>> {
    kind.require_json()?;
    info!("Listing images with query: {:?}", query);

    let inputs = Inputs::new().with_query(query);
    let checked = params::page(&svc, &inputs)?;
    match svc.list_images(&checked.params).await {
        Ok(images) => {
            let ids: Vec<i64> = images.iter().map(|i| i.id).collect();
            Ok(ok(ImageListDto {
                search_metadata: SearchMetadata::build(&checked.params, checked.search, &ids),
                images: images.into_iter().map(ImageDto::from).collect(),
            }))
        }
        Err(e) => {
            error!("Failed to list images: {}", e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn get_image(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Path(path): Path<Params>,
) -> ApiResult<Json<Success<ImageBody>>> {
    kind.require_json()?;
    info!("Getting image with id: {:?}", path.get("id"));

    let inputs = Inputs::new().with_url(path);
    let image = params::url_record(&inputs, "Image", |id| svc.find_image(id)).await?;
    Ok(ok(ImageBody {
        image: image.into(),
    }))
}

/// Upload an image: `{width, height, payload}` with a base64 payload.
pub async fn create_image(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    body: Bytes,
) -> ApiResult<Json<Success<Created>>> {
    kind.require_json()?;
    info!("Creating image from {} byte body", body.len());

    let inputs = Inputs::new().with_body(params::body_json(&body)?);
    let new_image = params::new_image(&inputs)?;
    match svc.create_image(new_image).await {
        Ok(image) => Ok(created(image.id)),
        Err(e) => {
            error!("Failed to create image: {}", e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn list_image_tags(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Path(path): Path<Params>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<TagListDto>>> {
    kind.require_json()?;
    info!("Listing tags of image {:?}", path.get("id"));

    let inputs = Inputs::new().with_url(path).with_query(query);
    let checked = params::image_tags(&svc, &inputs).await?;
    let p = &checked.params;
    match svc.image_tags(p.image.id, &p.cursor).await {
        Ok(tags) => {
            let ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
            Ok(ok(TagListDto {
                search_metadata: SearchMetadata::build(&p.cursor, checked.search.clone(), &ids),
                tags: tags.into_iter().map(TagDto::from).collect(),
            }))
        }
        Err(e) => {
            error!("Failed to list image tags: {}", e);
            Err(map_domain_error(&e))
        }
    }
}

// --- choose ---

pub async fn list_objects(kind: ResponseKind) -> ApiResult<Json<Success<ObjectsDto>>> {
    kind.require_json()?;
    Ok(ok(ObjectsDto {
        objects: &["image", "imageandtag"],
    }))
}

pub async fn list_image_algorithms(kind: ResponseKind) -> ApiResult<Json<Success<AlgorithmsDto>>> {
    kind.require_json()?;
    Ok(ok(AlgorithmsDto {
        algorithms: &["random", "leastused"],
    }))
}

pub async fn list_image_and_tag_algorithms(
    kind: ResponseKind,
) -> ApiResult<Json<Success<AlgorithmsDto>>> {
    kind.require_json()?;
    Ok(ok(AlgorithmsDto {
        algorithms: &["random", "leastused", "mostused"],
    }))
}

#[derive(Clone, Copy, Debug)]
enum Algorithm {
    RandomImage,
    LeastUsedImage,
    RandomImageAndTag,
    LeastUsedImageAndTag,
    MostUsedImageAndTag,
}

async fn choose(
    algorithm: Algorithm,
    kind: ResponseKind,
    svc: Arc<Service>,
    query: Params,
) -> ApiResult<Json<Success<ChoiceListDto>>> {
    let started = Instant::now();
    kind.require_json()?;
    info!("Choosing with {:?}, query: {:?}", algorithm, query);

    let inputs = Inputs::new().with_query(query);
    let p = params::choose(&svc, &inputs).await?;
    let picked: Result<Vec<Choice>, DomainError> = match algorithm {
        Algorithm::RandomImage => svc.random_images(&p.scope, p.limit).await,
        Algorithm::LeastUsedImage => svc.least_used_images(&p.scope, p.limit).await,
        Algorithm::RandomImageAndTag => svc.random_tag_pairs(&p.scope, p.limit).await,
        Algorithm::LeastUsedImageAndTag => svc.ranked_tag_pairs(&p.scope, p.limit, false).await,
        Algorithm::MostUsedImageAndTag => svc.ranked_tag_pairs(&p.scope, p.limit, true).await,
    };
    match picked {
        Ok(results) => Ok(ok(ChoiceListDto {
            completed_in: elapsed_ms(started),
            results: results.into_iter().map(Into::into).collect(),
        })),
        Err(e) => {
            error!("Selection {:?} failed: {}", algorithm, e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn choose_random_image(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<ChoiceListDto>>> {
    choose(Algorithm::RandomImage, kind, svc, query).await
}

pub async fn choose_least_used_image(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<ChoiceListDto>>> {
    choose(Algorithm::LeastUsedImage, kind, svc, query).await
}

pub async fn choose_random_image_and_tag(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<ChoiceListDto>>> {
    choose(Algorithm::RandomImageAndTag, kind, svc, query).await
}

pub async fn choose_least_used_image_and_tag(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<ChoiceListDto>>> {
    choose(Algorithm::LeastUsedImageAndTag, kind, svc, query).await
}

pub async fn choose_most_used_image_and_tag(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<ChoiceListDto>>> {
    choose(Algorithm::MostUsedImageAndTag, kind, svc, query).await
}

// --- tasks ---

pub async fn list_tasks(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<TaskListDto>>> {
    kind.require_json()?;
    info!("Listing tasks with query: {:?}", query);

    let inputs = Inputs::new().with_query(query);
    let checked = params::task_list(&svc, &inputs).await?;
    let p = &checked.params;
    match svc.list_tasks(&p.filter, &p.cursor).await {
        Ok(tasks) => {
            let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
            Ok(ok(TaskListDto {
                search_metadata: SearchMetadata::build(&p.cursor, checked.search.clone(), &ids),
                tasks: tasks.into_iter().map(TaskDto::from).collect(),
            }))
        }
        Err(e) => {
            error!("Failed to list tasks: {}", e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn create_task(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    body: Bytes,
) -> ApiResult<Json<Success<Created>>> {
    kind.require_json()?;
    info!("Creating task");

    let inputs = Inputs::new().with_body(params::body_json(&body)?);
    let image = params::new_task(&svc, &inputs).await?;
    match svc.create_task(image).await {
        Ok(task) => Ok(created(task.id)),
        Err(e) => {
            error!("Failed to create task: {}", e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn get_task(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Path(path): Path<Params>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<TaskBody>>> {
    kind.require_json()?;
    info!("Getting task with id: {:?}", path.get("id"));

    let inputs = Inputs::new().with_url(path).with_query(query);
    let p = params::task_get(&svc, &inputs).await?;
    if !p.populate {
        return Ok(ok(TaskBody {
            task: TaskView::Plain(p.task.into()),
        }));
    }
    match svc.get_task_details(p.task.id).await {
        Ok(details) => Ok(ok(TaskBody {
            task: TaskView::Populated(details.into()),
        })),
        Err(e) => {
            error!("Failed to populate task {}: {}", p.task.id, e);
            Err(map_domain_error(&e))
        }
    }
}

/// Complete a task and its open microtasks.
pub async fn complete_task(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Path(path): Path<Params>,
) -> ApiResult<Json<Success<Done>>> {
    kind.require_json()?;
    info!("Completing task with id: {:?}", path.get("id"));

    let inputs = Inputs::new().with_url(path);
    let task = params::url_record(&inputs, "Task", |id| svc.find_task(id)).await?;
    match svc.complete_task(task.id).await {
        Ok(()) => Ok(done()),
        Err(e) => {
            error!("Failed to complete task {}: {}", task.id, e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn add_task_user(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Path(path): Path<Params>,
    body: Bytes,
) -> ApiResult<Json<Success<Done>>> {
    kind.require_json()?;
    info!("Adding user to task {:?}", path.get("id"));

    let inputs = Inputs::new()
        .with_url(path)
        .with_body(params::body_json(&body)?);
    let (task, user) = params::task_user(&svc, &inputs).await?;
    match svc.add_user(task.id, user.id).await {
        Ok(()) => Ok(done()),
        Err(e) => {
            error!("Failed to add user {} to task {}: {}", user.id, task.id, e);
            Err(map_domain_error(&e))
        }
    }
}

// --- microtasks ---

pub async fn create_microtask(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    body: Bytes,
) -> ApiResult<Json<Success<Created>>> {
    kind.require_json()?;
    info!("Creating microtask");

    let inputs = Inputs::new().with_body(params::body_json(&body)?);
    let task = params::new_microtask(&svc, &inputs).await?;
    match svc.create_microtask(task.id).await {
        Ok(microtask) => Ok(created(microtask.id)),
        Err(e) => {
            error!("Failed to create microtask for task {}: {}", task.id, e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn get_microtask(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Path(path): Path<Params>,
) -> ApiResult<Json<Success<MicrotaskBody>>> {
    kind.require_json()?;
    info!("Getting microtask with id: {:?}", path.get("id"));

    let inputs = Inputs::new().with_url(path);
    let microtask = params::url_record(&inputs, "Microtask", |id| svc.find_microtask(id)).await?;
    Ok(ok(MicrotaskBody {
        microtask: microtask.into(),
    }))
}

// --- users ---

pub async fn create_user(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
) -> ApiResult<Json<Success<Created>>> {
    kind.require_json()?;
    info!("Creating user");

    match svc.create_user().await {
        Ok(user) => Ok(created(user.id)),
        Err(e) => {
            error!("Failed to create user: {}", e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn get_user(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Path(path): Path<Params>,
) -> ApiResult<Json<Success<UserBody>>> {
    kind.require_json()?;
    info!("Getting user with id: {:?}", path.get("id"));

    let inputs = Inputs::new().with_url(path);
    let user = params::url_record(&inputs, "User", |id| svc.find_user(id)).await?;
    Ok(ok(UserBody { user: user.into() }))
}

// --- collections ---

pub async fn create_collection(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    body: Bytes,
) -> ApiResult<Json<Success<Created>>> {
    kind.require_json()?;
    info!("Creating collection");

    let inputs = Inputs::new().with_body(params::body_json(&body)?);
    let images = params::new_collection(&inputs)?;
    match svc.create_collection(images).await {
        Ok(collection) => Ok(created(collection.id)),
        Err(e) => {
            error!("Failed to create collection: {}", e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn get_collection(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Path(path): Path<Params>,
) -> ApiResult<Json<Success<CollectionBody>>> {
    kind.require_json()?;
    info!("Getting collection with id: {:?}", path.get("id"));

    let inputs = Inputs::new().with_url(path);
    let collection = params::url_record(&inputs, "Collection", |id| svc.find_collection(id)).await?;
    Ok(ok(CollectionBody {
        collection: collection.into(),
    }))
}

// --- segmentations ---

pub async fn list_segmentations(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<Params>,
) -> ApiResult<Json<Success<SegmentationListDto>>> {
    kind.require_json()?;
    info!("Listing segmentations with query: {:?}", query);

    let inputs = Inputs::new().with_query(query);
    let checked = params::page(&svc, &inputs)?;
    match svc.list_segmentations(&checked.params).await {
        Ok(segmentations) => {
            let ids: Vec<i64> = segmentations.iter().map(|s| s.id).collect();
            Ok(ok(SegmentationListDto {
                search_metadata: SearchMetadata::build(&checked.params, checked.search, &ids),
                segmentations: segmentations.into_iter().map(SegmentationDto::from).collect(),
            }))
        }
        Err(e) => {
            error!("Failed to list segmentations: {}", e);
            Err(map_domain_error(&e))
        }
    }
}

pub async fn get_segmentation(
    kind: ResponseKind,
    Extension(svc): Extension<Arc<Service>>,
    Path(path): Path<Params>,
) -> ApiResult<Json<Success<SegmentationBody>>> {
    kind.require_json()?;
    info!("Getting segmentation with id: {:?}", path.get("id"));

    let inputs = Inputs::new().with_url(path);
    let segmentation =
        params::url_record(&inputs, "Segmentation", |id| svc.find_segmentation(id)).await?;
    Ok(ok(SegmentationBody {
        segmentation: segmentation.into(),
    }))
}
