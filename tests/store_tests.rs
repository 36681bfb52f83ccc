use serde_json::{Value, json};
use study_companion::{Event, EventStore, ProgressDocument};

fn study(topic: &str) -> Event {
    Event::Study {
        topic: Some(topic.to_string()),
        notes: None,
        timestamp: None,
    }
}

fn read_file(store: &EventStore) -> Value {
    serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap()
}

#[tokio::test]
async fn test_ensure_initialized_creates_missing_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::new(dir.path().join("nested").join("data"));

    store.ensure_initialized().await.unwrap();

    assert!(store.path().exists());
    assert_eq!(read_file(&store), json!({"events": []}));
}

#[tokio::test]
async fn test_ensure_initialized_repairs_bad_content() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::new(dir.path());

    for bad in [
        "".as_bytes(),
        b"   \n",
        b"{\"events\": [",
        b"[1, 2, 3]",
        b"{\"history\": []}",
        b"{\"events\": {}}",
        &[0xff, 0xfe, 0x00],
    ] {
        std::fs::write(store.path(), bad).unwrap();
        store.ensure_initialized().await.unwrap();
        assert_eq!(read_file(&store), json!({"events": []}));
    }
}

#[tokio::test]
async fn test_ensure_initialized_is_idempotent_on_valid_log() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::new(dir.path());

    store.append(study("Math")).await.unwrap();
    let before = read_file(&store);

    store.ensure_initialized().await.unwrap();
    store.ensure_initialized().await.unwrap();

    assert_eq!(read_file(&store), before);
    assert_eq!(before["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_append_preserves_prior_events() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::new(dir.path());

    for topic in ["Math", "Biology", "History"] {
        store.append(study(topic)).await.unwrap();
    }
    let before = store.read_all().await.unwrap();

    let stored = store
        .append(Event::Quiz {
            topic: Some("Math".to_string()),
            score: Some(json!(4)),
            total: Some(json!(5)),
            answers: Some(json!([])),
            timestamp: None,
        })
        .await
        .unwrap();

    let after = store.read_all().await.unwrap();
    assert_eq!(after.events.len(), before.events.len() + 1);
    assert_eq!(after.events[..before.events.len()], before.events[..]);

    assert!(stored.timestamp().is_some());
    assert_eq!(after.events.last().unwrap(), &serde_json::to_value(&stored).unwrap());
}

#[tokio::test]
async fn test_read_all_after_append_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::new(dir.path());

    let stored = store
        .append(Event::Study {
            topic: Some("Chemistry".to_string()),
            notes: Some(json!("Balancing equations")),
            timestamp: Some(json!("2024-02-29T12:00:00")),
        })
        .await
        .unwrap();

    let document = store.read_all().await.unwrap();
    let last: Event = serde_json::from_value(document.events.last().unwrap().clone()).unwrap();
    assert_eq!(last, stored);
    assert_eq!(stored.timestamp(), Some(&json!("2024-02-29T12:00:00")));
}

#[tokio::test]
async fn test_append_keeps_non_string_values_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::new(dir.path());

    let stored = store
        .append(Event::Study {
            topic: Some("Math".to_string()),
            notes: Some(json!({"page": 3, "tags": ["algebra"]})),
            timestamp: Some(json!(1700000000)),
        })
        .await
        .unwrap();
    assert_eq!(stored.timestamp(), Some(&json!(1700000000)));

    let on_disk = read_file(&store);
    assert_eq!(on_disk["events"][0]["notes"], json!({"page": 3, "tags": ["algebra"]}));
    assert_eq!(on_disk["events"][0]["timestamp"], 1700000000);
}

#[tokio::test]
async fn test_append_keeps_foreign_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::new(dir.path());

    let legacy = json!({
        "events": [{"topic": "Old", "status": "generated", "quiz": {"topic": "Old"}}],
        "version": 1
    });
    std::fs::write(store.path(), legacy.to_string()).unwrap();

    store.append(study("New")).await.unwrap();

    let on_disk = read_file(&store);
    assert_eq!(on_disk["version"], 1);
    assert_eq!(on_disk["events"][0], legacy["events"][0]);
    assert_eq!(on_disk["events"][1]["topic"], "New");
}

#[tokio::test]
async fn test_concurrent_appends_through_one_store_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let store = EventStore::new(dir.path());

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.append(study(&format!("topic-{}", i))).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let document: ProgressDocument = store.read_all().await.unwrap();
    assert_eq!(document.events.len(), 20);
}
