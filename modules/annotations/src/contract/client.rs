use async_trait::async_trait;
use modkit::api::CursorParams;

use crate::contract::{
    error::AnnotationsError,
    model::{Choice, Id, Image, Microtask, NewImage, Scope, Task, TaskDetails, TaskFilter},
};

/// Public API trait for the annotations module that other modules can use
#[async_trait]
pub trait AnnotationsApi: Send + Sync {
    async fn get_image(&self, id: Id) -> Result<Image, AnnotationsError>;

    /// Newest first, bounded by the cursor window.
    async fn list_images(&self, page: CursorParams) -> Result<Vec<Image>, AnnotationsError>;

    async fn create_image(&self, new_image: NewImage) -> Result<Image, AnnotationsError>;

    async fn get_task(&self, id: Id) -> Result<TaskDetails, AnnotationsError>;

    async fn list_tasks(&self, filter: TaskFilter, page: CursorParams) -> Result<Vec<Task>, AnnotationsError>;

    async fn create_task(&self, image: Id) -> Result<Task, AnnotationsError>;

    /// Complete a task and every open microtask of it. Idempotent.
    async fn complete_task(&self, id: Id) -> Result<(), AnnotationsError>;

    async fn create_microtask(&self, task: Id) -> Result<Microtask, AnnotationsError>;

    async fn random_images(&self, scope: Scope, limit: u64) -> Result<Vec<Choice>, AnnotationsError>;

    async fn least_used_images(&self, scope: Scope, limit: u64) -> Result<Vec<Choice>, AnnotationsError>;
}
