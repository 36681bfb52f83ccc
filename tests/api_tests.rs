use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};
use study_companion::{AIGateway, AppState, EventStore, create_app};
use tempfile::TempDir;

fn create_test_server() -> (TestServer, TempDir) {
    let data_dir = tempfile::tempdir().unwrap();
    let state = AppState {
        gateway: AIGateway::offline(),
        store: EventStore::new(data_dir.path()),
        debug: false,
    };

    let server = TestServer::new(create_app(state)).unwrap();
    (server, data_dir)
}

/// A server whose data directory sits underneath a regular file, so every
/// store operation fails.
fn create_broken_store_server(debug: bool) -> (TestServer, TempDir) {
    let root = tempfile::tempdir().unwrap();
    let blocker = root.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();

    let state = AppState {
        gateway: AIGateway::offline(),
        store: EventStore::new(blocker.join("data")),
        debug,
    };

    let server = TestServer::new(create_app(state)).unwrap();
    (server, root)
}

#[tokio::test]
async fn test_health() {
    let (server, _dir) = create_test_server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({"status": "healthy"}));
}

#[tokio::test]
async fn test_chat_returns_placeholder_when_offline() {
    let (server, _dir) = create_test_server();

    let response = server
        .post("/api/chat/")
        .json(&json!({"message": "  What is a mitochondrion?  ", "topic": "Biology"}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "What is a mitochondrion?");
    let answer = body["response"].as_str().unwrap();
    assert!(answer.contains("What is a mitochondrion?"));
    assert!(answer.contains("Topic: 'Biology'"));
}

#[tokio::test]
async fn test_chat_without_trailing_slash_and_topic() {
    let (server, _dir) = create_test_server();

    let response = server.post("/api/chat").json(&json!({"message": "Explain gravity"})).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["response"].as_str().unwrap().contains("Topic: 'general'"));
}

#[tokio::test]
async fn test_chat_validation_errors() {
    let (server, _dir) = create_test_server();

    let response = server.post("/api/chat/").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>(), json!({"error": "Invalid or missing JSON body"}));

    let response = server.post("/api/chat/").text("{not json").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Invalid or missing JSON body");

    let response = server.post("/api/chat/").json(&json!({"message": "   "})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>(), json!({"error": "Message is required"}));

    let response = server.post("/api/chat/").json(&json!({"topic": "Math"})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Message is required");
}

#[tokio::test]
async fn test_chat_message_length_boundary() {
    let (server, _dir) = create_test_server();

    let at_limit = "a".repeat(5000);
    let response = server.post("/api/chat/").json(&json!({"message": at_limit})).await;
    response.assert_status_ok();

    let over_limit = "a".repeat(5001);
    let response = server.post("/api/chat/").json(&json!({"message": over_limit})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>(), json!({"error": "Message too long"}));

    // Characters, not bytes
    let multibyte = "é".repeat(5000);
    let response = server.post("/api/chat/").json(&json!({"message": multibyte})).await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_quiz_offline_scenario() {
    let (server, _dir) = create_test_server();

    let response = server
        .post("/api/quiz")
        .json(&json!({"topic": "Photosynthesis", "num_questions": 3}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["topic"], "Photosynthesis");
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    for question in questions {
        assert!(question["q"].as_str().unwrap().contains("Photosynthesis"));
        assert_eq!(question["options"].as_array().unwrap().len(), 4);
        assert_eq!(question["answer"], 0);
    }
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_quiz_defaults_and_audit_event() {
    let (server, _dir) = create_test_server();

    let response = server.post("/api/quiz").json(&json!({"topic": "  Algebra "})).await;
    response.assert_status_ok();
    let quiz: Value = response.json();
    assert_eq!(quiz["topic"], "Algebra");
    assert_eq!(quiz["questions"].as_array().unwrap().len(), 5);

    let progress: Value = server.get("/api/progress").await.json();
    let events = progress["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "generated");
    assert_eq!(events[0]["topic"], "Algebra");
    assert_eq!(events[0]["quiz"], quiz);
    assert!(events[0]["timestamp"].is_string());
}

#[tokio::test]
async fn test_quiz_validation_errors() {
    let (server, _dir) = create_test_server();

    let response = server.post("/api/quiz").json(&json!({"topic": "   "})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>(), json!({"error": "Topic is required"}));

    let response = server.post("/api/quiz").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"], "Topic is required");

    let response = server
        .post("/api/quiz")
        .json(&json!({"topic": "Algebra", "num_questions": "lots"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Nothing was recorded for rejected requests
    let progress: Value = server.get("/api/progress").await.json();
    assert_eq!(progress, json!({"events": []}));
}

#[tokio::test]
async fn test_quiz_count_from_string_and_minimum() {
    let (server, _dir) = create_test_server();

    let response = server
        .post("/api/quiz")
        .json(&json!({"topic": "Chemistry", "num_questions": "2"}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["questions"].as_array().unwrap().len(), 2);

    let response = server
        .post("/api/quiz")
        .json(&json!({"topic": "Chemistry", "num_questions": 0}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["questions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_quiz_count_above_default_is_honored() {
    let (server, _dir) = create_test_server();

    let response = server
        .post("/api/quiz")
        .json(&json!({"topic": "Photosynthesis", "num_questions": 60}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["questions"].as_array().unwrap().len(), 60);
}

#[tokio::test]
async fn test_study_event_scenario() {
    let (server, _dir) = create_test_server();

    let response = server.post("/api/progress/study").json(&json!({"topic": "Math"})).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    let event = &body["event"];
    assert_eq!(event["type"], "study");
    assert_eq!(event["topic"], "Math");
    assert_eq!(event["notes"], Value::Null);
    assert!(event["timestamp"].is_string());
    assert_eq!(event.as_object().unwrap().len(), 4);

    let progress: Value = server.get("/api/progress").await.json();
    let events = progress["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(&events[0], event);
}

#[tokio::test]
async fn test_study_event_keeps_caller_timestamp_and_accepts_empty_body() {
    let (server, _dir) = create_test_server();

    let response = server
        .post("/api/progress/study")
        .json(&json!({"topic": "History", "notes": "Read chapter 3", "timestamp": "2024-05-01T10:00:00"}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["event"]["timestamp"], "2024-05-01T10:00:00");

    let response = server.post("/api/progress/study").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["event"]["topic"], Value::Null);
    assert!(body["event"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_progress_events_keep_non_string_notes_and_timestamps() {
    let (server, _dir) = create_test_server();

    let response = server
        .post("/api/progress/study")
        .json(&json!({"topic": "Math", "timestamp": 1700000000}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["event"]["timestamp"], 1700000000);

    let response = server
        .post("/api/progress/study")
        .json(&json!({"topic": "Math", "notes": {"page": 3}, "timestamp": null}))
        .await;
    response.assert_status_ok();
    let event = response.json::<Value>()["event"].clone();
    assert_eq!(event["notes"], json!({"page": 3}));
    assert!(event["timestamp"].is_string());

    let response = server
        .post("/api/progress/quiz")
        .json(&json!({"topic": "Math", "score": 2, "total": 3, "timestamp": {"day": "monday"}}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["result"]["timestamp"], json!({"day": "monday"}));

    let progress: Value = server.get("/api/progress").await.json();
    let events = progress["events"].as_array().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["timestamp"], 1700000000);
    assert_eq!(events[1]["notes"], json!({"page": 3}));
}

#[tokio::test]
async fn test_quiz_result_recorded_in_order() {
    let (server, _dir) = create_test_server();

    server
        .post("/api/progress/study")
        .json(&json!({"topic": "Physics"}))
        .await
        .assert_status_ok();

    let answers = json!([
        {"q": "What is inertia?", "selected": 1, "correct": 1},
        {"q": "Unit of force?", "selected": 0, "correct": 2}
    ]);
    let response = server
        .post("/api/progress/quiz")
        .json(&json!({"topic": "Physics", "score": 1, "total": 2, "answers": answers}))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["result"]["type"], "quiz");
    assert_eq!(body["result"]["score"], 1);
    assert_eq!(body["result"]["total"], 2);
    assert_eq!(body["result"]["answers"], answers);

    let progress: Value = server.get("/api/progress").await.json();
    let events = progress["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "study");
    assert_eq!(events[1], body["result"]);
}

#[tokio::test]
async fn test_storage_failure_returns_generic_500() {
    let (server, _dir) = create_broken_store_server(false);

    let response = server.get("/api/progress").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert!(body["error"].is_string());
    assert!(body.get("traceback").is_none());

    let response = server.post("/api/progress/study").json(&json!({"topic": "Math"})).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_storage_failure_detail_in_debug_mode() {
    let (server, _dir) = create_broken_store_server(true);

    let response = server.post("/api/quiz").json(&json!({"topic": "Math"})).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["status"], "error");
    assert!(body["traceback"].as_str().unwrap().contains("Failed to create data directory"));
}
