//! Memory store integration tests

use std::sync::Arc;

use pluto::config::MemoryConfig;
use pluto::db::MemoryType;
use pluto::{MemoryStore, NewMemory, RecallQuery};

mod common;
use common::{FailingEmbedder, FakeEmbedder, setup_test_db};

fn store() -> MemoryStore {
    MemoryStore::new(setup_test_db(), MemoryConfig::default())
}

#[tokio::test]
async fn stored_content_is_recalled_active() {
    let store = store();
    for content in ["Dentist on Friday", "", "ünïcode ✓ note", "a\nmulti-line\nnote"] {
        let id = store
            .store(NewMemory::new("user-1", MemoryType::Note, content).without_reminder())
            .await
            .unwrap();

        let recalled = store
            .recall("user-1", &RecallQuery::default().with_limit(100))
            .await
            .unwrap();
        let found = recalled.iter().find(|m| m.id == id).expect("memory recalled");
        assert_eq!(found.content, content);
        assert!(found.is_active());
    }
}

#[tokio::test]
async fn forget_hides_memory_and_is_idempotent() {
    let store = store();
    let id = store
        .store(NewMemory::new("user-1", MemoryType::Sms, "secret plans"))
        .await
        .unwrap();

    assert!(store.forget("user-1", &id).await.unwrap());
    assert!(!store.forget("user-1", &id).await.unwrap());

    let recalled = store.recall("user-1", &RecallQuery::default()).await.unwrap();
    assert!(recalled.iter().all(|m| m.id != id));

    let recent = store.get_recent_context("user-1", 10).await.unwrap();
    assert!(recent.iter().all(|e| e.memory_id != id));
}

#[tokio::test]
async fn forget_is_scoped_to_owner() {
    let store = store();
    let id = store
        .store(NewMemory::new("user-1", MemoryType::Note, "mine"))
        .await
        .unwrap();

    assert!(!store.forget("user-2", &id).await.unwrap());
    assert!(store.get("user-1", &id).unwrap().is_some());
}

#[tokio::test]
async fn importance_grows_monotonically_and_caps() {
    let store = store();
    let anchor = store
        .store(NewMemory::new("user-1", MemoryType::Contact, "Alex").with_importance(0.6))
        .await
        .unwrap();

    let mut previous = store.get("user-1", &anchor).unwrap().unwrap().importance;
    for i in 0..8 {
        store
            .store(
                NewMemory::new("user-1", MemoryType::ContactInteraction, format!("talked {i}"))
                    .related_to([anchor.clone()]),
            )
            .await
            .unwrap();

        let current = store.get("user-1", &anchor).unwrap().unwrap().importance;
        assert!(current >= previous);
        assert!(current <= 1.0);
        previous = current;
    }
    assert!((previous - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn semantic_recall_ranks_by_similarity() {
    let store = store().with_embedder(Arc::new(FakeEmbedder));
    assert!(store.has_embedder());

    for content in [
        "Dentist appointment Tuesday",
        "Buy groceries and coffee",
        "Quarterly report meeting",
    ] {
        store
            .store(NewMemory::new("user-1", MemoryType::Note, content).without_reminder())
            .await
            .unwrap();
    }

    let recalled = store
        .recall("user-1", &RecallQuery::semantic("coffee and groceries").with_limit(2))
        .await
        .unwrap();
    assert_eq!(recalled.len(), 2);
    assert_eq!(recalled[0].content, "Buy groceries and coffee");
}

#[tokio::test]
async fn failing_embedder_falls_back_to_structured_recall() {
    let store = store().with_embedder(Arc::new(FailingEmbedder));
    let id = store
        .store(NewMemory::new("user-1", MemoryType::Note, "flight at noon").without_reminder())
        .await
        .unwrap();

    let stored = store.get("user-1", &id).unwrap().unwrap();
    assert!(stored.embedding.is_none());

    let recalled = store
        .recall("user-1", &RecallQuery::semantic("flight"))
        .await
        .unwrap();
    assert_eq!(recalled.len(), 1);
    assert_eq!(recalled[0].id, id);
}

#[tokio::test]
async fn summary_groups_by_type() {
    let store = store();
    for (memory_type, content, importance) in [
        (MemoryType::Sms, "hi", 0.2),
        (MemoryType::Sms, "on my way", 0.4),
        (MemoryType::Email, "invoice due", 0.9),
    ] {
        store
            .store(NewMemory::new("user-1", memory_type, content).with_importance(importance))
            .await
            .unwrap();
    }

    let summary = store.get_summary("user-1", 7).unwrap();
    assert_eq!(summary.total_memories, 3);
    assert_eq!(summary.top_memories[0].content, "invoice due");
    let sms = summary
        .by_type
        .iter()
        .find(|s| s.memory_type == MemoryType::Sms)
        .unwrap();
    assert_eq!(sms.count, 2);
    assert!((sms.avg_importance - 0.3).abs() < 1e-9);
}
