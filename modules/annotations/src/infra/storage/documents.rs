//! Stored document shapes and their mapping to contract models.
//!
//! Documents keep the store key in `_id`; unknown fields (revision markers and
//! the like) are ignored on read.

use anyhow::Context;
use chrono::{DateTime, Utc};
use docstore::Document;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::contract::model::{
    Collection, Color, Id, Image, Microtask, Point, Segmentation, Tag, Task, User,
};

pub const IMAGES: &str = "image";
pub const TASKS: &str = "task";
pub const MICROTASKS: &str = "microtask";
pub const USERS: &str = "user";
pub const COLLECTIONS: &str = "collection";
pub const SEGMENTATIONS: &str = "segmentation";
pub const ACTIONS: &str = "action";
pub const TAGS: &str = "tag";
/// Read model: per-image tag usage `{image, count}`.
pub const IMAGE_TAGS: &str = "image_tag";
/// Read model: per (image, tag) counts `{image, tag, tagging, segmentations}`.
pub const IMAGE_SEGMENTATIONS: &str = "image_segmentation";

pub fn decode<T: DeserializeOwned>(doc: Document) -> anyhow::Result<T> {
    serde_json::from_value(Json::Object(doc)).context("malformed document")
}

pub fn encode<T: Serialize>(value: &T) -> anyhow::Result<Document> {
    match serde_json::to_value(value).context("encode failed")? {
        Json::Object(map) => Ok(map),
        other => anyhow::bail!("expected an object, got {other}"),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImageDoc {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(rename = "mediaLocator", default, skip_serializing_if = "Option::is_none")]
    pub media_locator: Option<String>,
    pub width: i64,
    pub height: i64,
}

impl From<ImageDoc> for Image {
    fn from(d: ImageDoc) -> Self {
        Self {
            id: d.id,
            media_locator: d.media_locator,
            width: d.width,
            height: d.height,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewImageDoc {
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskDoc {
    #[serde(rename = "_id")]
    pub id: Id,
    pub image: Id,
    #[serde(default)]
    pub users: Vec<Id>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<TaskDoc> for Task {
    fn from(d: TaskDoc) -> Self {
        Self {
            id: d.id,
            image: d.image,
            users: d.users,
            created_at: d.created_at,
            completed_at: d.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewTaskDoc {
    pub image: Id,
    pub users: Vec<Id>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MicrotaskDoc {
    #[serde(rename = "_id")]
    pub id: Id,
    pub task: Id,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<MicrotaskDoc> for Microtask {
    fn from(d: MicrotaskDoc) -> Self {
        Self {
            id: d.id,
            task: d.task,
            created_at: d.created_at,
            completed_at: d.completed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NewMicrotaskDoc {
    pub task: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: Id,
    pub created_at: DateTime<Utc>,
}

impl From<UserDoc> for User {
    fn from(d: UserDoc) -> Self {
        Self {
            id: d.id,
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionDoc {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(default)]
    pub images: Vec<Id>,
}

impl From<CollectionDoc> for Collection {
    fn from(d: CollectionDoc) -> Self {
        Self {
            id: d.id,
            images: d.images,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ColorDoc {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PointDoc {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentationDoc {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(default)]
    pub points: Vec<PointDoc>,
}

impl From<SegmentationDoc> for Segmentation {
    fn from(d: SegmentationDoc) -> Self {
        Self {
            id: d.id,
            points: d
                .points
                .into_iter()
                .map(|p| Point {
                    x: p.x,
                    y: p.y,
                    color: p.color.map(|c| Color { r: c.r, g: c.g, b: c.b }),
                    removed: p.removed,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TagDoc {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<TagDoc> for Tag {
    fn from(d: TagDoc) -> Self {
        Self {
            id: d.id,
            name: d.name,
        }
    }
}

/// Output row of the selection pipelines.
#[derive(Debug, Deserialize)]
pub struct ChoiceRow {
    pub image: Id,
    #[serde(default)]
    pub tag: Option<Id>,
    #[serde(default)]
    pub count: Option<i64>,
}
