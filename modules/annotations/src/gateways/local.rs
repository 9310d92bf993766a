use async_trait::async_trait;
use modkit::api::CursorParams;
use std::sync::Arc;

use crate::contract::{
    client::AnnotationsApi,
    error::AnnotationsError,
    model::{Choice, Id, Image, Microtask, NewImage, Scope, Task, TaskDetails, TaskFilter},
};
use crate::domain::service::Service;

/// Local implementation of the AnnotationsApi trait that delegates to the domain service
pub struct AnnotationsLocalClient {
    service: Arc<Service>,
}

impl AnnotationsLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl AnnotationsApi for AnnotationsLocalClient {
    async fn get_image(&self, id: Id) -> Result<Image, AnnotationsError> {
        self.service.get_image(id).await.map_err(Into::into)
    }

    async fn list_images(&self, page: CursorParams) -> Result<Vec<Image>, AnnotationsError> {
        self.service.list_images(&page).await.map_err(Into::into)
    }

    async fn create_image(&self, new_image: NewImage) -> Result<Image, AnnotationsError> {
        self.service
            .create_image(new_image)
            .await
            .map_err(Into::into)
    }

    async fn get_task(&self, id: Id) -> Result<TaskDetails, AnnotationsError> {
        self.service.get_task_details(id).await.map_err(Into::into)
    }

    async fn list_tasks(&self, filter: TaskFilter, page: CursorParams) -> Result<Vec<Task>, AnnotationsError> {
        self.service
            .list_tasks(&filter, &page)
            .await
            .map_err(Into::into)
    }

    async fn create_task(&self, image: Id) -> Result<Task, AnnotationsError> {
        self.service.create_task(image).await.map_err(Into::into)
    }

    async fn complete_task(&self, id: Id) -> Result<(), AnnotationsError> {
        self.service.complete_task(id).await.map_err(Into::into)
    }

    async fn create_microtask(&self, task: Id) -> Result<Microtask, AnnotationsError> {
        self.service.create_microtask(task).await.map_err(Into::into)
    }

    async fn random_images(&self, scope: Scope, limit: u64) -> Result<Vec<Choice>, AnnotationsError> {
        self.service
            .random_images(&scope, limit)
            .await
            .map_err(Into::into)
    }

    async fn least_used_images(&self, scope: Scope, limit: u64) -> Result<Vec<Choice>, AnnotationsError> {
        self.service
            .least_used_images(&scope, limit)
            .await
            .map_err(Into::into)
    }
}
