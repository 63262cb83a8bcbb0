mod common;

use std::sync::Arc;

use channel_vault::search::SearchParams;
use channel_vault_core::vector::InMemoryVectorIndex;

use common::{channel, harness, harness_with, record, FailingEmbedder, FailingIndex, VocabEmbedder};

fn query(text: &str) -> SearchParams {
    SearchParams {
        query: text.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn end_to_end_sync_then_search() {
    let h = harness();
    let owner = h.registry.handle("owner-1").await.unwrap();

    owner.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();
    owner
        .sync_records("c1", vec![record("m1", "hello world", 1000)], None)
        .await
        .unwrap();
    owner.drain().await.unwrap();

    let resp = owner
        .search_records(SearchParams {
            top_k: Some(5),
            threshold: Some(0.1),
            ..query("hello")
        })
        .await
        .unwrap();

    assert!(resp.semantic_search_available);
    assert_eq!(resp.results.len(), 1);
    let group = &resp.results[0];
    assert_eq!(group.channel.channel_id, "c1");
    assert_eq!(group.channel.title, "Alpha");
    assert_eq!(group.records.len(), 1);
    let hit = &group.records[0];
    assert_eq!(hit.record.message_id, "m1");
    assert!(hit.is_match);
    assert!(hit.similarity.unwrap() >= 0.1);
}

#[tokio::test]
async fn threshold_excludes_weak_matches() {
    let h = harness();
    let owner = h.registry.handle("owner-1").await.unwrap();
    owner.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();
    owner
        .sync_records(
            "c1",
            vec![
                record("weak", "alpha", 1000),
                record("strong", "alpha beta gamma delta", 100_000),
            ],
            None,
        )
        .await
        .unwrap();
    owner.drain().await.unwrap();

    // cos("alpha beta gamma delta", "alpha") = 0.5
    let strict = owner
        .search_records(SearchParams {
            threshold: Some(0.9),
            context_window_secs: Some(0),
            ..query("alpha beta gamma delta")
        })
        .await
        .unwrap();
    let matched: Vec<&str> = strict
        .results
        .iter()
        .flat_map(|g| g.records.iter().filter(|r| r.is_match))
        .map(|r| r.record.message_id.as_str())
        .collect();
    assert_eq!(matched, vec!["strong"]);

    let loose = owner
        .search_records(SearchParams {
            threshold: Some(0.4),
            context_window_secs: Some(0),
            ..query("alpha beta gamma delta")
        })
        .await
        .unwrap();
    assert_eq!(loose.results.len(), 2);
    // Groups follow the index rank order.
    assert_eq!(loose.results[0].records[0].record.message_id, "strong");
    assert_eq!(loose.results[1].records[0].record.message_id, "weak");
}

#[tokio::test]
async fn context_window_is_inclusive_and_ascending() {
    let h = harness();
    let owner = h.registry.handle("owner-1").await.unwrap();
    owner.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();
    owner
        .sync_records(
            "c1",
            vec![
                record("early", "too early", 1939),
                record("left", "morning chatter", 1940),
                record("match", "target phrase", 2000),
                record("right", "later words", 2060),
                record("late", "too late", 2061),
            ],
            None,
        )
        .await
        .unwrap();
    owner.drain().await.unwrap();

    let resp = owner
        .search_records(SearchParams {
            threshold: Some(0.5),
            context_window_secs: Some(60),
            ..query("target phrase")
        })
        .await
        .unwrap();

    assert_eq!(resp.results.len(), 1);
    let records = &resp.results[0].records;
    let ts: Vec<i64> = records.iter().map(|r| r.record.timestamp).collect();
    assert_eq!(ts, vec![1940, 2000, 2060]);
    assert!(ts.iter().all(|t| (1940..=2060).contains(t)));

    let matches: Vec<_> = records.iter().filter(|r| r.is_match).collect();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].record.message_id, "match");
    assert!(records
        .iter()
        .filter(|r| !r.is_match)
        .all(|r| r.similarity.is_none()));
}

#[tokio::test]
async fn context_stays_within_the_matched_channel() {
    let h = harness();
    let owner = h.registry.handle("owner-1").await.unwrap();
    owner
        .sync_channels(vec![channel("c1", "Alpha"), channel("c2", "Beta")])
        .await
        .unwrap();
    owner
        .sync_records("c1", vec![record("m1", "unique needle", 1000)], None)
        .await
        .unwrap();
    owner
        .sync_records("c2", vec![record("m1", "neighbour noise", 1001)], None)
        .await
        .unwrap();
    owner.drain().await.unwrap();

    let resp = owner
        .search_records(SearchParams {
            threshold: Some(0.5),
            ..query("unique needle")
        })
        .await
        .unwrap();
    assert_eq!(resp.results.len(), 1);
    assert_eq!(resp.results[0].channel.channel_id, "c1");
    assert_eq!(resp.results[0].records.len(), 1);
}

#[tokio::test]
async fn channel_and_visibility_filters_apply() {
    let h = harness();
    let owner = h.registry.handle("owner-1").await.unwrap();
    let mut public = channel("pub", "Public");
    public.is_public = true;
    owner
        .sync_channels(vec![public, channel("priv", "Private")])
        .await
        .unwrap();
    owner
        .sync_records("pub", vec![record("m1", "shared topic", 1000)], None)
        .await
        .unwrap();
    owner
        .sync_records("priv", vec![record("m1", "shared topic", 1000)], None)
        .await
        .unwrap();
    owner.drain().await.unwrap();

    let all = owner
        .search_records(SearchParams {
            threshold: Some(0.5),
            ..query("shared topic")
        })
        .await
        .unwrap();
    assert_eq!(all.results.len(), 2);

    let public_only = owner
        .search_records(SearchParams {
            threshold: Some(0.5),
            is_public: Some(true),
            ..query("shared topic")
        })
        .await
        .unwrap();
    assert_eq!(public_only.results.len(), 1);
    assert_eq!(public_only.results[0].channel.channel_id, "pub");

    let scoped = owner
        .search_records(SearchParams {
            threshold: Some(0.5),
            channel_id: Some("priv".to_string()),
            ..query("shared topic")
        })
        .await
        .unwrap();
    assert_eq!(scoped.results.len(), 1);
    assert_eq!(scoped.results[0].channel.channel_id, "priv");
}

#[tokio::test]
async fn owners_do_not_see_each_other() {
    let h = harness();
    let alice = h.registry.handle("alice").await.unwrap();
    let bob = h.registry.handle("bob").await.unwrap();

    alice.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();
    alice
        .sync_records("c1", vec![record("m1", "secret plans", 1000)], None)
        .await
        .unwrap();
    alice.drain().await.unwrap();

    bob.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();

    let resp = bob
        .search_records(SearchParams {
            threshold: Some(0.1),
            ..query("secret plans")
        })
        .await
        .unwrap();
    assert!(resp.semantic_search_available);
    assert!(resp.results.is_empty());
    assert_eq!(bob.get_stats().await.unwrap().total_records, 0);
    assert_eq!(h.index.len(), 1);
}

#[tokio::test]
async fn search_degrades_when_embedding_fails() {
    let (_dir, registry) = harness_with(Arc::new(FailingEmbedder), Arc::new(InMemoryVectorIndex::new()));
    let owner = registry.handle("owner-1").await.unwrap();
    owner.sync_channels(vec![channel("c1", "Alpha")]).await.unwrap();

    let resp = owner.search_records(query("anything")).await.unwrap();
    assert!(!resp.semantic_search_available);
    assert!(resp.results.is_empty());
}

#[tokio::test]
async fn search_degrades_when_index_fails() {
    let (_dir, registry) = harness_with(Arc::new(VocabEmbedder::default()), Arc::new(FailingIndex));
    let owner = registry.handle("owner-1").await.unwrap();

    let resp = owner.search_records(query("anything")).await.unwrap();
    assert!(!resp.semantic_search_available);
    assert!(resp.results.is_empty());
}

#[tokio::test]
async fn empty_query_returns_no_results() {
    let h = harness();
    let owner = h.registry.handle("owner-1").await.unwrap();

    let resp = owner.search_records(query("   ")).await.unwrap();
    assert!(resp.semantic_search_available);
    assert!(resp.results.is_empty());
}
