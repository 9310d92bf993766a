//! Document-store implementation of the domain ports.
//!
//! Every query is expressed with `query_core` filters so any `DocumentStore`
//! backend can serve it. Collection restrictions go through the range compiler.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docstore::{id_of, Accumulator, Document, DocumentStore, FindOptions, Group, Stage, UpdateOptions, ID_FIELD};
use modkit::api::CursorParams;
use query_core::ast::Expr;
use query_core::range::compile_range;
use query_core::{Filter, Order, OrderKey};
use serde_json::json;

use super::documents::{
    decode, encode, ChoiceRow, CollectionDoc, ImageDoc, MicrotaskDoc, NewImageDoc, NewMicrotaskDoc,
    NewTaskDoc, SegmentationDoc, TagDoc, TaskDoc, UserDoc, ACTIONS, COLLECTIONS, IMAGES,
    IMAGE_SEGMENTATIONS, IMAGE_TAGS, MICROTASKS, SEGMENTATIONS, TAGS, TASKS, USERS,
};
use crate::contract::model::{
    Choice, Collection, Id, Image, Microtask, Scope, Segmentation, Tag, Task, TaskFilter, User,
};
use crate::domain::repo::{AnnotationsRepository, SelectionRepository};

pub struct DocStoreRepository {
    store: Arc<dyn DocumentStore>,
}

impl DocStoreRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn find_by_id<D, T>(&self, collection: &str, id: Id) -> anyhow::Result<Option<T>>
    where
        D: serde::de::DeserializeOwned + Into<T>,
    {
        let found = self
            .store
            .find_one(collection, &Filter::some(Expr::eq(ID_FIELD, id)))
            .await
            .with_context(|| format!("find {collection} {id} failed"))?;
        found.map(|d| decode::<D>(d).map(Into::into)).transpose()
    }

    async fn page<D, T>(&self, collection: &str, filter: Filter, page: &CursorParams) -> anyhow::Result<Vec<T>>
    where
        D: serde::de::DeserializeOwned + Into<T>,
    {
        let opts = FindOptions::new()
            .order(CursorParams::order(ID_FIELD))
            .limit(page.count);
        let docs = self
            .store
            .find(collection, &filter.and_filter(page.window(ID_FIELD)), &opts)
            .await
            .with_context(|| format!("list {collection} failed"))?;
        docs.into_iter().map(|d| decode::<D>(d).map(Into::into)).collect()
    }

    async fn insert<T, D, R>(&self, collection: &str, fields: &T) -> anyhow::Result<R>
    where
        T: serde::Serialize,
        D: serde::de::DeserializeOwned + Into<R>,
    {
        let created = self
            .store
            .create(collection, encode(fields)?)
            .await
            .with_context(|| format!("insert into {collection} failed"))?;
        Ok(decode::<D>(created)?.into())
    }

    async fn set_by_id(&self, collection: &str, id: Id, patch: Document) -> anyhow::Result<u64> {
        self.store
            .update(
                collection,
                &Filter::some(Expr::eq(ID_FIELD, id)),
                patch,
                UpdateOptions::single(),
            )
            .await
            .with_context(|| format!("update {collection} {id} failed"))
    }
}

/// Restriction of `field` to the scope's images. `Scope::All` matches everything.
fn scope_filter(scope: &Scope, field: &str) -> Filter {
    match scope {
        Scope::All => Filter::none(),
        Scope::Images(ids) => compile_range(field, ids.iter().copied()),
    }
}

/// Valid tagging actions that carry a tag.
fn tagging_actions(scope: &Scope) -> Filter {
    Filter::all([
        Expr::eq("type", "tagging"),
        Expr::exists("tag", true),
        Expr::eq("validity", true),
    ])
    .and_filter(scope_filter(scope, "image"))
}

fn decode_rows(docs: Vec<Document>) -> anyhow::Result<Vec<ChoiceRow>> {
    docs.into_iter().map(decode::<ChoiceRow>).collect()
}

#[async_trait]
impl AnnotationsRepository for DocStoreRepository {
    async fn find_image(&self, id: Id) -> anyhow::Result<Option<Image>> {
        self.find_by_id::<ImageDoc, _>(IMAGES, id).await
    }

    async fn list_images(&self, page: &CursorParams) -> anyhow::Result<Vec<Image>> {
        self.page::<ImageDoc, _>(IMAGES, Filter::none(), page).await
    }

    async fn insert_image(&self, width: i64, height: i64) -> anyhow::Result<Image> {
        self.insert::<_, ImageDoc, _>(IMAGES, &NewImageDoc { width, height })
            .await
    }

    async fn set_media_locator(&self, id: Id, locator: &str) -> anyhow::Result<()> {
        self.set_by_id(IMAGES, id, encode(&json!({ "mediaLocator": locator }))?)
            .await?;
        Ok(())
    }

    async fn delete_image(&self, id: Id) -> anyhow::Result<bool> {
        let removed = self
            .store
            .remove(IMAGES, &Filter::some(Expr::eq(ID_FIELD, id)))
            .await
            .context("delete image failed")?;
        Ok(removed > 0)
    }

    async fn image_tags(&self, image: Id, page: &CursorParams) -> anyhow::Result<Vec<Tag>> {
        let used = self
            .store
            .aggregate(
                ACTIONS,
                &[
                    Stage::Match(Filter::all([
                        Expr::eq("type", "tagging"),
                        Expr::eq("image", image),
                        Expr::exists("tag", true),
                    ])),
                    Stage::Group(Group::by(["tag"])),
                ],
            )
            .await
            .context("image tag aggregation failed")?;
        let ids: Vec<Id> = used
            .iter()
            .filter_map(|d| d.get("tag").and_then(serde_json::Value::as_i64))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.page::<TagDoc, _>(TAGS, Filter::some(Expr::is_in(ID_FIELD, ids)), page)
            .await
    }

    async fn find_task(&self, id: Id) -> anyhow::Result<Option<Task>> {
        self.find_by_id::<TaskDoc, _>(TASKS, id).await
    }

    async fn list_tasks(&self, filter: &TaskFilter, page: &CursorParams) -> anyhow::Result<Vec<Task>> {
        let mut query = Filter::none();
        if let Some(image) = filter.image {
            query = query.and(Expr::eq("image", image));
        }
        if let Some(images) = &filter.images {
            query = query.and_filter(compile_range("image", images.iter().copied()));
        }
        if let Some(completed) = filter.completed {
            query = query.and(Expr::exists("completed_at", completed));
        }
        self.page::<TaskDoc, _>(TASKS, query, page).await
    }

    async fn insert_task(&self, image: Id, created_at: DateTime<Utc>) -> anyhow::Result<Task> {
        let fields = NewTaskDoc {
            image,
            users: Vec::new(),
            created_at,
        };
        self.insert::<_, TaskDoc, _>(TASKS, &fields).await
    }

    async fn mark_task_completed(&self, id: Id, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let open = Filter::all([Expr::eq(ID_FIELD, id), Expr::exists("completed_at", false)]);
        let touched = self
            .store
            .update(TASKS, &open, encode(&json!({ "completed_at": at }))?, UpdateOptions::single())
            .await
            .context("complete task failed")?;
        Ok(touched > 0)
    }

    async fn set_task_users(&self, id: Id, users: &[Id]) -> anyhow::Result<()> {
        self.set_by_id(TASKS, id, encode(&json!({ "users": users }))?)
            .await?;
        Ok(())
    }

    async fn find_microtask(&self, id: Id) -> anyhow::Result<Option<Microtask>> {
        self.find_by_id::<MicrotaskDoc, _>(MICROTASKS, id).await
    }

    async fn insert_microtask(&self, task: Id, created_at: DateTime<Utc>) -> anyhow::Result<Microtask> {
        self.insert::<_, MicrotaskDoc, _>(MICROTASKS, &NewMicrotaskDoc { task, created_at })
            .await
    }

    async fn microtasks_of(&self, task: Id) -> anyhow::Result<Vec<Microtask>> {
        let docs = self
            .store
            .find(
                MICROTASKS,
                &Filter::some(Expr::eq("task", task)),
                &FindOptions::new().order(Order::by(OrderKey::asc(ID_FIELD))),
            )
            .await
            .context("list microtasks failed")?;
        docs.into_iter()
            .map(|d| decode::<MicrotaskDoc>(d).map(Into::into))
            .collect()
    }

    async fn complete_open_microtasks(&self, task: Id, at: DateTime<Utc>) -> anyhow::Result<u64> {
        let open = Filter::all([Expr::eq("task", task), Expr::exists("completed_at", false)]);
        self.store
            .update(MICROTASKS, &open, encode(&json!({ "completed_at": at }))?, UpdateOptions::multi())
            .await
            .context("complete microtasks failed")
    }

    async fn find_user(&self, id: Id) -> anyhow::Result<Option<User>> {
        self.find_by_id::<UserDoc, _>(USERS, id).await
    }

    async fn insert_user(&self, created_at: DateTime<Utc>) -> anyhow::Result<User> {
        self.insert::<_, UserDoc, _>(USERS, &json!({ "created_at": created_at }))
            .await
    }

    /// Users in the order of `ids`; unknown ids are skipped.
    async fn find_users(&self, ids: &[Id]) -> anyhow::Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self
            .store
            .find(
                USERS,
                &Filter::some(Expr::is_in(ID_FIELD, ids.iter().copied())),
                &FindOptions::new(),
            )
            .await
            .context("find users failed")?;
        let mut found: Vec<User> = docs
            .into_iter()
            .map(|d| decode::<UserDoc>(d).map(Into::into))
            .collect::<anyhow::Result<_>>()?;
        found.sort_by_key(|u| ids.iter().position(|id| *id == u.id));
        Ok(found)
    }

    async fn find_collection(&self, id: Id) -> anyhow::Result<Option<Collection>> {
        self.find_by_id::<CollectionDoc, _>(COLLECTIONS, id).await
    }

    async fn insert_collection(&self, images: &[Id]) -> anyhow::Result<Collection> {
        self.insert::<_, CollectionDoc, _>(COLLECTIONS, &json!({ "images": images }))
            .await
    }

    async fn find_segmentation(&self, id: Id) -> anyhow::Result<Option<Segmentation>> {
        self.find_by_id::<SegmentationDoc, _>(SEGMENTATIONS, id).await
    }

    async fn list_segmentations(&self, page: &CursorParams) -> anyhow::Result<Vec<Segmentation>> {
        self.page::<SegmentationDoc, _>(SEGMENTATIONS, Filter::none(), page)
            .await
    }
}

#[async_trait]
impl SelectionRepository for DocStoreRepository {
    async fn count_images(&self, scope: &Scope) -> anyhow::Result<u64> {
        self.store
            .count(IMAGES, &scope_filter(scope, ID_FIELD))
            .await
            .context("count images failed")
    }

    async fn image_at(&self, scope: &Scope, offset: u64) -> anyhow::Result<Option<Id>> {
        let opts = FindOptions::new()
            .order(Order::by(OrderKey::asc(ID_FIELD)))
            .skip(offset)
            .limit(1);
        let docs = self
            .store
            .find(IMAGES, &scope_filter(scope, ID_FIELD), &opts)
            .await
            .context("draw image failed")?;
        Ok(docs.first().and_then(id_of))
    }

    async fn count_tag_pairs(&self, scope: &Scope) -> anyhow::Result<u64> {
        let out = self
            .store
            .aggregate(
                ACTIONS,
                &[
                    Stage::Match(tagging_actions(scope)),
                    Stage::Group(Group::by(["image", "tag"])),
                    Stage::Group(Group::by(Vec::<String>::new()).with("total", Accumulator::Count)),
                ],
            )
            .await
            .context("count tagged pairs failed")?;
        Ok(out
            .first()
            .and_then(|d| d.get("total"))
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0))
    }

    async fn tag_pair_at(&self, scope: &Scope, offset: u64) -> anyhow::Result<Option<(Id, Id)>> {
        let out = self
            .store
            .aggregate(
                ACTIONS,
                &[
                    Stage::Match(tagging_actions(scope)),
                    Stage::Group(Group::by(["image", "tag"])),
                    Stage::Sort(Order::by(OrderKey::asc("image")).then(OrderKey::asc("tag"))),
                    Stage::Skip(offset),
                    Stage::Limit(1),
                ],
            )
            .await
            .context("draw tagged pair failed")?;
        let row = decode_rows(out)?.into_iter().next();
        Ok(row.and_then(|r| r.tag.map(|tag| (r.image, tag))))
    }

    async fn least_used_images(&self, scope: &Scope, limit: u64) -> anyhow::Result<Vec<Choice>> {
        let opts = FindOptions::new()
            .order(Order::by(OrderKey::asc("count")).then(OrderKey::asc("image")))
            .limit(limit);
        let docs = self
            .store
            .find(IMAGE_TAGS, &scope_filter(scope, "image"), &opts)
            .await
            .context("least used images failed")?;
        Ok(decode_rows(docs)?
            .into_iter()
            .map(|r| Choice::image(r.image).with_count(r.count.unwrap_or(0)))
            .collect())
    }

    async fn ranked_tag_pairs(&self, scope: &Scope, limit: u64, most_used: bool) -> anyhow::Result<Vec<Choice>> {
        let ranked = |field: &str| {
            if most_used {
                OrderKey::desc(field)
            } else {
                OrderKey::asc(field)
            }
        };
        let pipeline = [
            Stage::Match(Filter::some(Expr::ne("tagging", 0_i64)).and_filter(scope_filter(scope, "image"))),
            Stage::Sort(
                Order::by(ranked("segmentations"))
                    .then(OrderKey::asc("image"))
                    .then(OrderKey::asc("tag")),
            ),
            Stage::Group(
                Group::by(["image"])
                    .with("tag", Accumulator::First("tag".into()))
                    .with("count", Accumulator::First("segmentations".into())),
            ),
            Stage::Sort(Order::by(ranked("count")).then(OrderKey::asc("image"))),
            Stage::Limit(limit),
            Stage::project([("image", "image"), ("tag", "tag"), ("count", "count")]),
        ];
        let out = self
            .store
            .aggregate(IMAGE_SEGMENTATIONS, &pipeline)
            .await
            .context("ranked tagged pairs failed")?;
        Ok(decode_rows(out)?
            .into_iter()
            .filter_map(|r| {
                r.tag
                    .map(|tag| Choice::pair(r.image, tag).with_count(r.count.unwrap_or(0)))
            })
            .collect())
    }
}
