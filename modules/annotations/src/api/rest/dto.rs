use chrono::{DateTime, Utc};
use modkit::api::SearchMetadata;
use serde::Serialize;

use crate::contract::model::{
    Choice, Collection, Id, Image, Microtask, Point, Segmentation, Tag, Task, TaskDetails, User,
};

/// REST DTO for image representation
#[derive(Debug, Clone, Serialize)]
pub struct ImageDto {
    pub id: Id,
    #[serde(rename = "mediaLocator", skip_serializing_if = "Option::is_none")]
    pub media_locator: Option<String>,
    pub width: i64,
    pub height: i64,
}

impl From<Image> for ImageDto {
    fn from(image: Image) -> Self {
        Self {
            id: image.id,
            media_locator: image.media_locator,
            width: image.width,
            height: image.height,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskDto {
    pub id: Id,
    pub image: Id,
    pub users: Vec<Id>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Task> for TaskDto {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            image: task.image,
            users: task.users,
            created_at: task.created_at,
            completed_at: task.completed_at,
        }
    }
}

/// Task with its references embedded.
#[derive(Debug, Clone, Serialize)]
pub struct PopulatedTaskDto {
    pub id: Id,
    pub image: Option<ImageDto>,
    pub users: Vec<UserDto>,
    pub microtasks: Vec<MicrotaskDto>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<TaskDetails> for PopulatedTaskDto {
    fn from(details: TaskDetails) -> Self {
        Self {
            id: details.task.id,
            image: details.image.map(Into::into),
            users: details.users.into_iter().map(Into::into).collect(),
            microtasks: details.microtasks.into_iter().map(Into::into).collect(),
            created_at: details.task.created_at,
            completed_at: details.task.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TaskView {
    Plain(TaskDto),
    Populated(PopulatedTaskDto),
}

#[derive(Debug, Clone, Serialize)]
pub struct MicrotaskDto {
    pub id: Id,
    pub task: Id,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Microtask> for MicrotaskDto {
    fn from(m: Microtask) -> Self {
        Self {
            id: m.id,
            task: m.task,
            created_at: m.created_at,
            completed_at: m.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: Id,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionDto {
    pub id: Id,
    pub images: Vec<Id>,
}

impl From<Collection> for CollectionDto {
    fn from(c: Collection) -> Self {
        Self {
            id: c.id,
            images: c.images,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColorDto {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointDto {
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
}

impl From<Point> for PointDto {
    fn from(p: Point) -> Self {
        Self {
            x: p.x,
            y: p.y,
            color: p.color.map(|c| ColorDto { r: c.r, g: c.g, b: c.b }),
            removed: p.removed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SegmentationDto {
    pub id: Id,
    pub points: Vec<PointDto>,
}

impl From<Segmentation> for SegmentationDto {
    fn from(s: Segmentation) -> Self {
        Self {
            id: s.id,
            points: s.points.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagDto {
    pub id: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<Tag> for TagDto {
    fn from(t: Tag) -> Self {
        Self { id: t.id, name: t.name }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChoiceDto {
    pub image: Id,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl From<Choice> for ChoiceDto {
    fn from(c: Choice) -> Self {
        Self {
            image: c.image,
            tag: c.tag,
            count: c.count,
        }
    }
}

// --- response payloads (wrapped in the OK envelope) ---

#[derive(Debug, Serialize)]
pub struct ImageListDto {
    pub search_metadata: SearchMetadata,
    pub images: Vec<ImageDto>,
}

#[derive(Debug, Serialize)]
pub struct ImageBody {
    pub image: ImageDto,
}

#[derive(Debug, Serialize)]
pub struct TagListDto {
    pub search_metadata: SearchMetadata,
    pub tags: Vec<TagDto>,
}

#[derive(Debug, Serialize)]
pub struct TaskListDto {
    pub search_metadata: SearchMetadata,
    pub tasks: Vec<TaskDto>,
}

#[derive(Debug, Serialize)]
pub struct TaskBody {
    pub task: TaskView,
}

#[derive(Debug, Serialize)]
pub struct MicrotaskBody {
    pub microtask: MicrotaskDto,
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub struct CollectionBody {
    pub collection: CollectionDto,
}

#[derive(Debug, Serialize)]
pub struct SegmentationListDto {
    pub search_metadata: SearchMetadata,
    pub segmentations: Vec<SegmentationDto>,
}

#[derive(Debug, Serialize)]
pub struct SegmentationBody {
    pub segmentation: SegmentationDto,
}

#[derive(Debug, Serialize)]
pub struct ObjectsDto {
    pub objects: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct AlgorithmsDto {
    pub algorithms: &'static [&'static str],
}

/// Selection result; `completed_in` is the handling time in milliseconds.
#[derive(Debug, Serialize)]
pub struct ChoiceListDto {
    pub completed_in: u64,
    pub results: Vec<ChoiceDto>,
}
