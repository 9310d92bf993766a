use anyhow::Result;
use docstore::{
    id_of, Accumulator, Document, DocumentStore, FindOptions, Group, MemoryStore, Stage,
    UpdateOptions,
};
use query_core::ast::Expr;
use query_core::range::compile_range;
use query_core::{Filter, Order, OrderKey};
use serde_json::{json, Value};

fn obj(v: Value) -> Document {
    v.as_object().cloned().expect("object literal")
}

async fn seed(store: &MemoryStore, collection: &str, docs: Value) -> Result<()> {
    for d in docs.as_array().expect("array literal") {
        store.create(collection, obj(d.clone())).await?;
    }
    Ok(())
}

#[tokio::test]
async fn find_applies_filter_order_skip_and_limit() -> Result<()> {
    let store = MemoryStore::new();
    for w in 1..=10 {
        store.create("image", obj(json!({"width": w}))).await?;
    }

    let filter = Filter::all([Expr::gt("_id", 2), Expr::le("_id", 8)]);
    let opts = FindOptions::new()
        .order(Order::by(OrderKey::desc("_id")))
        .skip(1)
        .limit(3);
    let docs = store.find("image", &filter, &opts).await?;
    let ids: Vec<i64> = docs.iter().filter_map(id_of).collect();
    assert_eq!(ids, vec![7, 6, 5]);
    Ok(())
}

#[tokio::test]
async fn compiled_range_filters_documents() -> Result<()> {
    let store = MemoryStore::new();
    for _ in 0..12 {
        store.create("image", Document::new()).await?;
    }
    let filter = compile_range("_id", [1, 2, 3, 7, 8, 11]);
    assert_eq!(store.count("image", &filter).await?, 6);

    let docs = store.find("image", &filter, &FindOptions::new()).await?;
    let ids: Vec<i64> = docs.iter().filter_map(id_of).collect();
    assert_eq!(ids, vec![1, 2, 3, 7, 8, 11]);
    Ok(())
}

#[tokio::test]
async fn multi_update_only_touches_matches() -> Result<()> {
    let store = MemoryStore::new();
    seed(
        &store,
        "microtask",
        json!([
            {"task": 1},
            {"task": 1, "completed_at": "2020-01-01T00:00:00Z"},
            {"task": 2},
            {"task": 1},
        ]),
    )
    .await?;

    let filter = Filter::all([Expr::eq("task", 1), Expr::exists("completed_at", false)]);
    let patch = obj(json!({"completed_at": "2024-05-05T00:00:00Z"}));
    let n = store
        .update("microtask", &filter, patch, UpdateOptions::multi())
        .await?;
    assert_eq!(n, 2);

    let kept = store
        .find_one("microtask", &Filter::some(Expr::eq("_id", 1)))
        .await?
        .expect("doc 1");
    assert_eq!(kept["completed_at"], json!("2020-01-01T00:00:00Z"));

    let other = store
        .find_one("microtask", &Filter::some(Expr::eq("_id", 2)))
        .await?
        .expect("doc 2");
    assert!(other.get("completed_at").is_none());
    Ok(())
}

#[tokio::test]
async fn single_update_touches_first_match_only() -> Result<()> {
    let store = MemoryStore::new();
    seed(&store, "task", json!([{"k": 1}, {"k": 1}])).await?;
    let n = store
        .update(
            "task",
            &Filter::some(Expr::eq("k", 1)),
            obj(json!({"k": 2})),
            UpdateOptions::single(),
        )
        .await?;
    assert_eq!(n, 1);
    assert_eq!(store.count("task", &Filter::some(Expr::eq("k", 2))).await?, 1);
    Ok(())
}

#[tokio::test]
async fn update_rejects_id_changes() {
    let store = MemoryStore::new();
    let res = store
        .update(
            "task",
            &Filter::none(),
            obj(json!({"_id": 5})),
            UpdateOptions::multi(),
        )
        .await;
    assert!(res.is_err());
}

#[tokio::test]
async fn aggregate_groups_tagging_actions() -> Result<()> {
    let store = MemoryStore::new();
    seed(
        &store,
        "action",
        json!([
            {"type": "tagging", "image": 1, "tag": 5, "validity": true},
            {"type": "tagging", "image": 1, "tag": 5, "validity": true},
            {"type": "tagging", "image": 1, "tag": 6, "validity": true},
            {"type": "tagging", "image": 2, "tag": 5, "validity": false},
            {"type": "segmentation", "image": 3, "tag": 5, "validity": true},
            {"type": "tagging", "image": 4, "validity": true},
        ]),
    )
    .await?;

    let out = store
        .aggregate(
            "action",
            &[
                Stage::Match(Filter::all([
                    Expr::eq("type", "tagging"),
                    Expr::exists("tag", true),
                    Expr::eq("validity", true),
                ])),
                Stage::Group(Group::by(["image", "tag"]).with("count", Accumulator::Count)),
                Stage::Sort(Order::by(OrderKey::asc("image")).then(OrderKey::asc("tag"))),
            ],
        )
        .await?;

    let pairs: Vec<Value> = out.into_iter().map(Value::Object).collect();
    assert_eq!(
        pairs,
        vec![
            json!({"image": 1, "tag": 5, "count": 2}),
            json!({"image": 1, "tag": 6, "count": 1}),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn unknown_collection_is_empty() -> Result<()> {
    let store = MemoryStore::new();
    assert_eq!(store.count("nothing", &Filter::none()).await?, 0);
    assert!(store.find_one("nothing", &Filter::none()).await?.is_none());
    assert!(store.aggregate("nothing", &[]).await?.is_empty());
    Ok(())
}
