mod common;

use std::sync::Arc;

use channel_vault::registry::ActorRegistry;
use channel_vault_core::vector::InMemoryVectorIndex;

use common::{channel, config, harness, record, VocabEmbedder};

#[tokio::test]
async fn handle_is_reused_for_the_same_owner() {
    let h = harness();
    let a = h.registry.handle("owner-1").await.unwrap();
    let b = h.registry.handle("owner-1").await.unwrap();
    b.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();

    assert_eq!(a.get_stats().await.unwrap().total_channels, 1);
    assert_eq!(h.registry.active_owners().await, 1);
}

#[tokio::test]
async fn stopped_actor_is_restarted_with_its_data() {
    let h = harness();
    let owner = h.registry.handle("owner-1").await.unwrap();
    owner.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();
    owner
        .sync_records("c1", vec![record("m1", "hello", 1)], None)
        .await
        .unwrap();

    owner.shutdown().await;
    assert!(owner.is_closed());
    assert!(owner.get_stats().await.is_err());

    let again = h.registry.handle("owner-1").await.unwrap();
    let stats = again.get_stats().await.unwrap();
    assert_eq!(stats.total_channels, 1);
    assert_eq!(stats.total_records, 1);
    // The embedding job was drained before the first actor stopped.
    assert_eq!(stats.embedded_records, 1);
}

#[tokio::test]
async fn data_survives_a_new_registry() {
    let h = harness();
    let owner = h.registry.handle("owner-1").await.unwrap();
    owner.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();
    h.registry.shutdown_all().await;
    assert_eq!(h.registry.active_owners().await, 0);

    let registry = ActorRegistry::new(
        config(&h.dir),
        Arc::new(VocabEmbedder::default()),
        Arc::new(InMemoryVectorIndex::new()),
    );
    let owner = registry.handle("owner-1").await.unwrap();
    assert_eq!(owner.get_stats().await.unwrap().total_channels, 1);
    registry.shutdown_all().await;
}

#[tokio::test]
async fn concurrent_syncs_for_one_owner_do_not_duplicate() {
    let h = harness();
    let owner = h.registry.handle("owner-1").await.unwrap();
    owner.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();

    let batch: Vec<_> = (0..20)
        .map(|i| record(&format!("m{i}"), "same text", i))
        .collect();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let owner = owner.clone();
        let batch = batch.clone();
        tasks.push(tokio::spawn(async move {
            owner.sync_records("c1", batch, None).await.unwrap()
        }));
    }

    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap();
    }
    assert_eq!(total, 20);
    assert_eq!(owner.get_stats().await.unwrap().total_records, 20);
}

#[tokio::test]
async fn different_owners_use_different_databases() {
    let h = harness();
    let a = h.registry.handle("a").await.unwrap();
    let b = h.registry.handle("b").await.unwrap();
    a.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();

    assert_eq!(a.get_stats().await.unwrap().total_channels, 1);
    assert_eq!(b.get_stats().await.unwrap().total_channels, 0);
    assert_eq!(h.registry.active_owners().await, 2);

    let files = std::fs::read_dir(h.dir.path().join("owners"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "sqlite"))
        .count();
    assert_eq!(files, 2);
}

#[tokio::test]
async fn concurrent_first_handles_share_one_actor() {
    let h = harness();
    let (a, b) = tokio::join!(h.registry.handle("owner-1"), h.registry.handle("owner-1"));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(h.registry.active_owners().await, 1);

    a.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();
    b.sync_records("c1", vec![record("m1", "hello", 1)], None)
        .await
        .unwrap();
    let stats = a.get_stats().await.unwrap();
    assert_eq!(stats.total_channels, 1);
    assert_eq!(stats.total_records, 1);

    // Both callers hold the same mailbox.
    b.shutdown().await;
    assert!(a.is_closed());
}

#[tokio::test]
async fn stopped_owners_are_not_counted_as_active() {
    let h = harness();
    let one = h.registry.handle("owner-1").await.unwrap();
    h.registry.handle("owner-2").await.unwrap();
    assert_eq!(h.registry.active_owners().await, 2);

    one.shutdown().await;
    assert_eq!(h.registry.active_owners().await, 1);

    h.registry.handle("owner-1").await.unwrap();
    assert_eq!(h.registry.active_owners().await, 2);
}
