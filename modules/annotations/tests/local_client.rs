use std::sync::Arc;

use annotations::contract::error::AnnotationsError;
use annotations::contract::model::{NewImage, Scope, TaskFilter};
use annotations::Annotations;
use docstore::MemoryStore;
use modkit::api::CursorParams;
use modkit::{Module, ModuleCtxBuilder};
use tokio_util::sync::CancellationToken;

async fn module() -> (Annotations, tempfile::TempDir) {
    let home = tempfile::tempdir().unwrap();
    let module = Annotations::new(Arc::new(MemoryStore::new()), home.path());
    let ctx = ModuleCtxBuilder::new(CancellationToken::new())
        .build()
        .for_module("annotations");
    module.init(&ctx).await.unwrap();
    (module, home)
}

#[tokio::test]
async fn client_is_unavailable_before_init() {
    let module = Annotations::new(Arc::new(MemoryStore::new()), ".");
    assert!(module.client().is_err());
}

#[tokio::test]
async fn unknown_records_are_not_found() {
    let (module, _home) = module().await;
    let client = module.client().unwrap();

    assert_eq!(
        client.get_image(3).await.unwrap_err(),
        AnnotationsError::not_found("Image", 3)
    );
    assert_eq!(
        client.create_task(0).await.unwrap_err(),
        AnnotationsError::not_found("Image", 0)
    );
    assert_eq!(
        client.complete_task(8).await.unwrap_err(),
        AnnotationsError::not_found("Task", 8)
    );
}

#[tokio::test]
async fn closed_tasks_refuse_microtasks() {
    let (module, _home) = module().await;
    let client = module.client().unwrap();

    let image = client
        .create_image(NewImage {
            width: 4,
            height: 4,
            payload: vec![0xff, 0xd8],
        })
        .await
        .unwrap();
    assert_eq!(image.media_locator.as_deref(), Some("image/0.jpg"));

    let task = client.create_task(image.id).await.unwrap();
    let open = client.create_microtask(task.id).await.unwrap();
    client.complete_task(task.id).await.unwrap();

    assert_eq!(
        client.create_microtask(task.id).await.unwrap_err(),
        AnnotationsError::Closed { id: task.id }
    );

    let details = client.get_task(task.id).await.unwrap();
    assert_eq!(details.microtasks.len(), 1);
    assert_eq!(details.microtasks[0].id, open.id);
    assert_eq!(details.microtasks[0].completed_at, details.task.completed_at);
}

#[tokio::test]
async fn empty_payload_is_a_validation_error() {
    let (module, _home) = module().await;
    let client = module.client().unwrap();

    let err = client
        .create_image(NewImage {
            width: 1,
            height: 1,
            payload: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AnnotationsError::Validation { .. }));
    assert!(client.list_images(CursorParams::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_and_selection_through_the_client() {
    let (module, _home) = module().await;
    let client = module.client().unwrap();
    for _ in 0..3 {
        let image = client
            .create_image(NewImage {
                width: 1,
                height: 1,
                payload: vec![1],
            })
            .await
            .unwrap();
        client.create_task(image.id).await.unwrap();
    }

    let open = TaskFilter {
        completed: Some(false),
        ..Default::default()
    };
    let tasks = client.list_tasks(open, CursorParams::default()).await.unwrap();
    let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![2, 1, 0]);

    let picked = client.random_images(Scope::Images(vec![1]), 3).await.unwrap();
    assert_eq!(picked.iter().map(|c| c.image).collect::<Vec<_>>(), vec![1, 1, 1]);
    assert!(client.least_used_images(Scope::All, 5).await.unwrap().is_empty());
}
