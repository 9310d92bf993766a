use chrono::{DateTime, Utc};

/// Entity identifier; non-negative, assigned by the store.
pub type Id = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub id: Id,
    pub media_locator: Option<String>,
    pub width: i64,
    pub height: i64,
}

/// Upload request: dimensions plus the decoded image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub width: i64,
    pub height: i64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: Id,
    pub image: Id,
    pub users: Vec<Id>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Task with its references resolved (`populate=true`).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetails {
    pub task: Task,
    pub image: Option<Image>,
    pub users: Vec<User>,
    pub microtasks: Vec<Microtask>,
}

/// Which tasks to list. `image` and `images` are mutually exclusive at the API level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub image: Option<Id>,
    /// Restrict to tasks whose image is in this set (a collection).
    pub images: Option<Vec<Id>>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Microtask {
    pub id: Id,
    pub task: Id,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: Id,
    pub images: Vec<Id>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub color: Option<Color>,
    pub removed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub id: Id,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: Id,
    pub name: Option<String>,
}

/// One selection result. `tag` is set for image-and-tag selections, `count`
/// for the ranked ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub image: Id,
    pub tag: Option<Id>,
    pub count: Option<i64>,
}

impl Choice {
    pub fn image(image: Id) -> Self {
        Self {
            image,
            tag: None,
            count: None,
        }
    }

    pub fn pair(image: Id, tag: Id) -> Self {
        Self {
            image,
            tag: Some(tag),
            count: None,
        }
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }
}

/// Restriction of a selection to a collection's images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Scope {
    #[default]
    All,
    Images(Vec<Id>),
}

impl Scope {
    pub fn from_collection(collection: Option<&Collection>) -> Self {
        match collection {
            Some(c) => Scope::Images(c.images.clone()),
            None => Scope::All,
        }
    }

    /// A collection without images selects nothing.
    pub fn is_empty(&self) -> bool {
        matches!(self, Scope::Images(ids) if ids.is_empty())
    }
}
