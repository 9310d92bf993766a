use std::sync::Arc;

use chrono::Utc;
use modkit::api::CursorParams;
use tracing::{debug, info, instrument, warn};

use crate::contract::model::{
    Collection, Id, Image, Microtask, NewImage, Segmentation, Tag, Task, TaskDetails, TaskFilter,
    User,
};
use crate::domain::blob::{image_key, BlobStore};
use crate::domain::error::DomainError;
use crate::domain::repo::{AnnotationsRepository, SelectionRepository};

/// Domain service with the annotation workflow rules.
/// Depends only on the repository and blob ports, not on infra types.
#[derive(Clone)]
pub struct Service {
    pub(crate) repo: Arc<dyn AnnotationsRepository>,
    pub(crate) selection: Arc<dyn SelectionRepository>,
    blobs: Arc<dyn BlobStore>,
    config: ServiceConfig,
}

/// Limits applied by the REST layer when it parses paging and selection params.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub default_choose_limit: u64,
    pub max_choose_limit: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 100,
            default_choose_limit: 1,
            max_choose_limit: 100,
        }
    }
}

pub(crate) fn storage(e: anyhow::Error) -> DomainError {
    DomainError::storage(format!("{e:#}"))
}

impl Service {
    pub fn new(
        repo: Arc<dyn AnnotationsRepository>,
        selection: Arc<dyn SelectionRepository>,
        blobs: Arc<dyn BlobStore>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            repo,
            selection,
            blobs,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // --- images ---

    pub async fn find_image(&self, id: Id) -> Result<Option<Image>, DomainError> {
        self.repo.find_image(id).await.map_err(storage)
    }

    #[instrument(name = "annotations.service.get_image", skip(self), fields(image_id = id))]
    pub async fn get_image(&self, id: Id) -> Result<Image, DomainError> {
        debug!("Getting image by id");
        self.find_image(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Image", id))
    }

    #[instrument(name = "annotations.service.list_images", skip(self))]
    pub async fn list_images(&self, page: &CursorParams) -> Result<Vec<Image>, DomainError> {
        let images = self.repo.list_images(page).await.map_err(storage)?;
        debug!("Listed {} images", images.len());
        Ok(images)
    }

    /// Stores the image record, then its blob, then points the record at the blob.
    /// A failed blob write removes the record again.
    #[instrument(
        name = "annotations.service.create_image",
        skip(self, new_image),
        fields(width = new_image.width, height = new_image.height, bytes = new_image.payload.len())
    )]
    pub async fn create_image(&self, new_image: NewImage) -> Result<Image, DomainError> {
        info!("Creating new image");
        if new_image.width < 1 || new_image.height < 1 {
            return Err(DomainError::invalid_payload("width and height must be at least 1"));
        }
        if new_image.payload.is_empty() {
            return Err(DomainError::invalid_payload("empty payload"));
        }

        let mut image = self
            .repo
            .insert_image(new_image.width, new_image.height)
            .await
            .map_err(storage)?;

        let key = image_key(image.id);
        if let Err(e) = self.blobs.put(&key, new_image.payload).await {
            warn!(image_id = image.id, error = %e, "Blob write failed, removing image");
            if let Err(cleanup) = self.repo.delete_image(image.id).await {
                warn!(image_id = image.id, error = %cleanup, "Failed to remove image after blob failure");
            }
            return Err(DomainError::blob(format!("{e:#}")));
        }

        self.repo
            .set_media_locator(image.id, &key)
            .await
            .map_err(storage)?;
        image.media_locator = Some(key);

        info!("Successfully created image with id={}", image.id);
        Ok(image)
    }

    #[instrument(name = "annotations.service.image_tags", skip(self), fields(image_id = image))]
    pub async fn image_tags(&self, image: Id, page: &CursorParams) -> Result<Vec<Tag>, DomainError> {
        self.repo.image_tags(image, page).await.map_err(storage)
    }

    // --- tasks ---

    pub async fn find_task(&self, id: Id) -> Result<Option<Task>, DomainError> {
        self.repo.find_task(id).await.map_err(storage)
    }

    #[instrument(name = "annotations.service.get_task", skip(self), fields(task_id = id))]
    pub async fn get_task(&self, id: Id) -> Result<Task, DomainError> {
        self.find_task(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Task", id))
    }

    /// Task with its image, users and microtasks resolved.
    #[instrument(name = "annotations.service.get_task_details", skip(self), fields(task_id = id))]
    pub async fn get_task_details(&self, id: Id) -> Result<TaskDetails, DomainError> {
        let task = self.get_task(id).await?;
        let image = self.repo.find_image(task.image).await.map_err(storage)?;
        let users = self.repo.find_users(&task.users).await.map_err(storage)?;
        let microtasks = self.repo.microtasks_of(task.id).await.map_err(storage)?;
        Ok(TaskDetails {
            task,
            image,
            users,
            microtasks,
        })
    }

    #[instrument(name = "annotations.service.list_tasks", skip(self, filter))]
    pub async fn list_tasks(&self, filter: &TaskFilter, page: &CursorParams) -> Result<Vec<Task>, DomainError> {
        if matches!(&filter.images, Some(ids) if ids.is_empty()) {
            debug!("Empty collection filter, nothing to list");
            return Ok(Vec::new());
        }
        self.repo.list_tasks(filter, page).await.map_err(storage)
    }

    #[instrument(name = "annotations.service.create_task", skip(self), fields(image_id = image))]
    pub async fn create_task(&self, image: Id) -> Result<Task, DomainError> {
        info!("Creating new task");
        self.get_image(image).await?;
        let task = self
            .repo
            .insert_task(image, Utc::now())
            .await
            .map_err(storage)?;
        info!("Successfully created task with id={}", task.id);
        Ok(task)
    }

    /// Completes the task, then every microtask of it that is still open.
    /// Completing an already completed task changes nothing.
    #[instrument(name = "annotations.service.complete_task", skip(self), fields(task_id = id))]
    pub async fn complete_task(&self, id: Id) -> Result<(), DomainError> {
        let task = self.get_task(id).await?;
        if task.is_completed() {
            debug!("Task already completed");
            return Ok(());
        }

        let now = Utc::now();
        let changed = self
            .repo
            .mark_task_completed(id, now)
            .await
            .map_err(storage)?;
        if !changed {
            return Ok(());
        }
        let cascaded = self
            .repo
            .complete_open_microtasks(id, now)
            .await
            .map_err(storage)?;
        info!("Task completed, {} microtasks closed", cascaded);
        Ok(())
    }

    #[instrument(name = "annotations.service.add_user", skip(self), fields(task_id = task, user_id = user))]
    pub async fn add_user(&self, task: Id, user: Id) -> Result<(), DomainError> {
        let mut current = self.get_task(task).await?;
        self.get_user(user).await?;
        if current.users.contains(&user) {
            debug!("User already assigned");
            return Ok(());
        }
        current.users.push(user);
        self.repo
            .set_task_users(task, &current.users)
            .await
            .map_err(storage)
    }

    // --- microtasks ---

    pub async fn find_microtask(&self, id: Id) -> Result<Option<Microtask>, DomainError> {
        self.repo.find_microtask(id).await.map_err(storage)
    }

    #[instrument(name = "annotations.service.get_microtask", skip(self), fields(microtask_id = id))]
    pub async fn get_microtask(&self, id: Id) -> Result<Microtask, DomainError> {
        self.find_microtask(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Microtask", id))
    }

    #[instrument(name = "annotations.service.create_microtask", skip(self), fields(task_id = task))]
    pub async fn create_microtask(&self, task: Id) -> Result<Microtask, DomainError> {
        let parent = self.get_task(task).await?;
        if parent.is_completed() {
            return Err(DomainError::task_closed(task));
        }
        let microtask = self
            .repo
            .insert_microtask(task, Utc::now())
            .await
            .map_err(storage)?;
        info!("Successfully created microtask with id={}", microtask.id);
        Ok(microtask)
    }

    // --- users ---

    pub async fn find_user(&self, id: Id) -> Result<Option<User>, DomainError> {
        self.repo.find_user(id).await.map_err(storage)
    }

    #[instrument(name = "annotations.service.get_user", skip(self), fields(user_id = id))]
    pub async fn get_user(&self, id: Id) -> Result<User, DomainError> {
        self.find_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    #[instrument(name = "annotations.service.create_user", skip(self))]
    pub async fn create_user(&self) -> Result<User, DomainError> {
        let user = self.repo.insert_user(Utc::now()).await.map_err(storage)?;
        info!("Successfully created user with id={}", user.id);
        Ok(user)
    }

    // --- collections ---

    pub async fn find_collection(&self, id: Id) -> Result<Option<Collection>, DomainError> {
        self.repo.find_collection(id).await.map_err(storage)
    }

    #[instrument(name = "annotations.service.get_collection", skip(self), fields(collection_id = id))]
    pub async fn get_collection(&self, id: Id) -> Result<Collection, DomainError> {
        self.find_collection(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Collection", id))
    }

    /// Duplicate image ids are dropped; the set keeps first-seen order.
    #[instrument(name = "annotations.service.create_collection", skip(self, images), fields(size = images.len()))]
    pub async fn create_collection(&self, images: Vec<Id>) -> Result<Collection, DomainError> {
        let mut unique = Vec::with_capacity(images.len());
        for id in images {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        let collection = self
            .repo
            .insert_collection(&unique)
            .await
            .map_err(storage)?;
        info!("Successfully created collection with id={}", collection.id);
        Ok(collection)
    }

    // --- segmentations ---

    pub async fn find_segmentation(&self, id: Id) -> Result<Option<Segmentation>, DomainError> {
        self.repo.find_segmentation(id).await.map_err(storage)
    }

    #[instrument(name = "annotations.service.get_segmentation", skip(self), fields(segmentation_id = id))]
    pub async fn get_segmentation(&self, id: Id) -> Result<Segmentation, DomainError> {
        self.find_segmentation(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Segmentation", id))
    }

    #[instrument(name = "annotations.service.list_segmentations", skip(self))]
    pub async fn list_segmentations(&self, page: &CursorParams) -> Result<Vec<Segmentation>, DomainError> {
        self.repo.list_segmentations(page).await.map_err(storage)
    }
}
