use async_trait::async_trait;
use chrono::{DateTime, Utc};
use modkit::api::CursorParams;

use crate::contract::model::{
    Choice, Collection, Id, Image, Microtask, Scope, Segmentation, Tag, Task, TaskFilter, User,
};

/// Port for the domain layer: persistence operations the domain needs.
/// Listing methods return one page, newest first.
#[async_trait]
pub trait AnnotationsRepository: Send + Sync {
    async fn find_image(&self, id: Id) -> anyhow::Result<Option<Image>>;
    async fn list_images(&self, page: &CursorParams) -> anyhow::Result<Vec<Image>>;
    async fn insert_image(&self, width: i64, height: i64) -> anyhow::Result<Image>;
    async fn set_media_locator(&self, id: Id, locator: &str) -> anyhow::Result<()>;
    /// Returns true if the image existed.
    async fn delete_image(&self, id: Id) -> anyhow::Result<bool>;
    /// Distinct tags used by tagging actions on `image`.
    async fn image_tags(&self, image: Id, page: &CursorParams) -> anyhow::Result<Vec<Tag>>;

    async fn find_task(&self, id: Id) -> anyhow::Result<Option<Task>>;
    async fn list_tasks(&self, filter: &TaskFilter, page: &CursorParams) -> anyhow::Result<Vec<Task>>;
    async fn insert_task(&self, image: Id, created_at: DateTime<Utc>) -> anyhow::Result<Task>;
    /// Sets `completed_at` unless already set. Returns true if the task changed.
    async fn mark_task_completed(&self, id: Id, at: DateTime<Utc>) -> anyhow::Result<bool>;
    async fn set_task_users(&self, id: Id, users: &[Id]) -> anyhow::Result<()>;

    async fn find_microtask(&self, id: Id) -> anyhow::Result<Option<Microtask>>;
    async fn insert_microtask(&self, task: Id, created_at: DateTime<Utc>) -> anyhow::Result<Microtask>;
    /// Microtasks of `task` in id order.
    async fn microtasks_of(&self, task: Id) -> anyhow::Result<Vec<Microtask>>;
    /// Completes every microtask of `task` that is still open. Returns how many changed.
    async fn complete_open_microtasks(&self, task: Id, at: DateTime<Utc>) -> anyhow::Result<u64>;

    async fn find_user(&self, id: Id) -> anyhow::Result<Option<User>>;
    async fn insert_user(&self, created_at: DateTime<Utc>) -> anyhow::Result<User>;
    async fn find_users(&self, ids: &[Id]) -> anyhow::Result<Vec<User>>;

    async fn find_collection(&self, id: Id) -> anyhow::Result<Option<Collection>>;
    async fn insert_collection(&self, images: &[Id]) -> anyhow::Result<Collection>;

    async fn find_segmentation(&self, id: Id) -> anyhow::Result<Option<Segmentation>>;
    async fn list_segmentations(&self, page: &CursorParams) -> anyhow::Result<Vec<Segmentation>>;
}

/// Queries behind the selection algorithms. `scope` is never an empty image set;
/// callers short-circuit that case.
#[async_trait]
pub trait SelectionRepository: Send + Sync {
    async fn count_images(&self, scope: &Scope) -> anyhow::Result<u64>;
    /// Image id at `offset` in id order.
    async fn image_at(&self, scope: &Scope, offset: u64) -> anyhow::Result<Option<Id>>;

    /// Number of distinct (image, tag) pairs with a valid tagging action.
    async fn count_tag_pairs(&self, scope: &Scope) -> anyhow::Result<u64>;
    /// Pair at `offset` in (image, tag) order.
    async fn tag_pair_at(&self, scope: &Scope, offset: u64) -> anyhow::Result<Option<(Id, Id)>>;

    /// Images by tag usage count ascending, ties by image id.
    async fn least_used_images(&self, scope: &Scope, limit: u64) -> anyhow::Result<Vec<Choice>>;
    /// One pair per image ranked by segmentation count (descending when `most_used`),
    /// ties by image id.
    async fn ranked_tag_pairs(&self, scope: &Scope, limit: u64, most_used: bool) -> anyhow::Result<Vec<Choice>>;
}
