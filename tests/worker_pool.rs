mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use batch_image_optimizer::{
    Configuration, ImageId, ImageTransform, OptimizerError, RawImage, Stage, WorkItem, WorkerPool,
};
use common::{Gate, MockTransform, images, wait_until};

fn items(raw: Vec<RawImage>) -> Vec<WorkItem> {
    let config = Arc::new(Configuration::default());
    raw.into_iter()
        .map(|image| WorkItem::new(ImageId::new(), image, Arc::clone(&config)))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn every_context_is_initialized_and_released_once() {
    let transform = Arc::new(MockTransform::new());
    let pool = WorkerPool::create(3, Arc::clone(&transform) as Arc<dyn ImageTransform>)
        .await
        .unwrap();

    assert_eq!(pool.size(), 3);
    assert_eq!(transform.inits(), 3);
    assert_eq!(transform.releases(), 0);

    pool.destroy().await;
    assert_eq!(transform.releases(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrency_never_exceeds_pool_size() {
    let transform = Arc::new(MockTransform::new().with_delay(Duration::from_millis(20)));
    let pool = WorkerPool::create(2, Arc::clone(&transform) as Arc<dyn ImageTransform>)
        .await
        .unwrap();

    let work = items(images(8));
    let expected: Vec<ImageId> = work.iter().map(|item| item.id).collect();
    let results = join_all(work.into_iter().map(|item| pool.execute(item))).await;

    let ids: Vec<ImageId> = results.into_iter().map(|r| r.unwrap().id).collect();
    assert_eq!(ids, expected);
    assert!(transform.peak() <= 2, "peak concurrency was {}", transform.peak());
    assert_eq!(pool.queued(), 0);

    pool.destroy().await;
}

#[tokio::test]
async fn init_failure_fails_creation_and_tears_down() {
    let transform = Arc::new(MockTransform::new().fail_init(1));
    let result = WorkerPool::create(3, Arc::clone(&transform) as Arc<dyn ImageTransform>).await;

    match result {
        Err(OptimizerError::PoolCreation(message)) => assert!(message.contains("worker 1")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("pool creation should have failed"),
    }
    assert_eq!(transform.releases(), 3);
}

#[tokio::test]
async fn zero_sized_pool_is_rejected() {
    let result = WorkerPool::create(0, Arc::new(MockTransform::new())).await;
    assert!(matches!(result, Err(OptimizerError::PoolCreation(_))));
}

#[tokio::test]
async fn panics_stay_inside_the_failing_item() {
    let transform = Arc::new(MockTransform::new().panic_on("image-0.png"));
    let pool = WorkerPool::create(1, Arc::clone(&transform) as Arc<dyn ImageTransform>)
        .await
        .unwrap();

    let mut work = items(images(2)).into_iter();
    let failed = pool.execute(work.next().unwrap()).await;
    match failed {
        Err(OptimizerError::ItemTransform { name, stage, message }) => {
            assert_eq!(name, "image-0.png");
            assert_eq!(stage, Stage::Transform);
            assert!(message.contains("corrupt scanline"), "{message}");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // Same context keeps serving
    let ok = pool.execute(work.next().unwrap()).await.unwrap();
    assert_eq!(ok.name, "image-1.jpg");

    pool.destroy().await;
    assert_eq!(transform.releases(), 1);
}

#[tokio::test]
async fn unreadable_sources_fail_at_the_read_stage() {
    let pool = WorkerPool::create(1, Arc::new(MockTransform::new())).await.unwrap();
    let missing = RawImage::from_path(PathBuf::from("/definitely/not/here.png"));

    let result = pool.execute(items(vec![missing]).remove(0)).await;
    match result {
        Err(error @ OptimizerError::ItemRead { .. }) => assert_eq!(error.stage(), Some(Stage::Read)),
        other => panic!("unexpected result: {other:?}"),
    }

    pool.destroy().await;
}

#[tokio::test]
async fn results_carry_sizes_and_identity() {
    let pool = WorkerPool::create(1, Arc::new(MockTransform::new())).await.unwrap();
    let item = items(images(1)).remove(0);
    let id = item.id;

    let processed = pool.execute(item).await.unwrap();
    assert_eq!(processed.id, id);
    assert_eq!(processed.original_size, 64);
    assert_eq!(processed.processed_size, 32);
    assert_eq!(processed.mime_type, "image/jpeg");

    pool.destroy().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn abandon_returns_while_contexts_are_busy() {
    let gate = Gate::default();
    let transform = Arc::new(MockTransform::new().gate("image-0.png", &gate));
    let pool = Arc::new(
        WorkerPool::create(2, Arc::clone(&transform) as Arc<dyn ImageTransform>)
            .await
            .unwrap(),
    );

    let busy = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.execute(items(images(1)).remove(0)).await }
    });
    let started = Arc::clone(&transform);
    wait_until(|| started.started() == 1).await;

    busy.abort();
    let _ = busy.await;
    let pool = Arc::into_inner(pool).expect("no other pool handles");

    pool.abandon();

    // The idle context exits, the busy one stays on its item
    let released = Arc::clone(&transform);
    wait_until(|| released.releases() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transform.releases(), 1);

    gate.open();
    wait_until(|| released.releases() == 2).await;
}
