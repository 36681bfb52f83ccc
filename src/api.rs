use axum::{
    Router,
    body::Bytes,
    extract::State,
    response::Json,
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    ai_gateway::AIGateway,
    api_error,
    errors::{ApiError, ErrorContext, ErrorResponse, panic_response},
    models::{Event, GeneratedQuiz, ProgressDocument},
    store::EventStore,
};

// Import logging macros
use crate::{log_api_error, log_api_start, log_api_success, log_api_warn, log_validation};

pub const MAX_MESSAGE_CHARS: usize = 5000;
pub const DEFAULT_QUIZ_QUESTIONS: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub gateway: AIGateway,
    pub store: EventStore,
    /// Expose diagnostic detail in 500 responses.
    pub debug: bool,
}

pub type ApiResult<T> = Result<Json<T>, ErrorResponse>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub response: String,
}

#[derive(Debug, Deserialize)]
pub struct QuizRequest {
    pub topic: Option<String>,
    /// Integer or numeric string.
    pub num_questions: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct StudyEventRequest {
    pub topic: Option<String>,
    pub notes: Option<Value>,
    pub timestamp: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct QuizResultRequest {
    pub topic: Option<String>,
    pub score: Option<Value>,
    pub total: Option<Value>,
    pub answers: Option<Value>,
    pub timestamp: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct StudyEventResponse {
    pub status: &'static str,
    pub event: Event,
}

#[derive(Debug, Serialize)]
pub struct QuizResultResponse {
    pub status: &'static str,
    pub result: Event,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// How to treat a request without a body.
#[derive(Debug, Clone, Copy, PartialEq)]
enum EmptyBody {
    Reject,
    AsEmptyObject,
}

/// Decode a JSON object body whatever the declared content type.
fn parse_json_body<T: DeserializeOwned>(body: &Bytes, empty: EmptyBody) -> Result<T, ApiError> {
    const INVALID_BODY: &str = "Invalid or missing JSON body";

    let value = if body.iter().all(u8::is_ascii_whitespace) {
        match empty {
            EmptyBody::Reject => return Err(ApiError::BadRequest(INVALID_BODY.to_string())),
            EmptyBody::AsEmptyObject => Value::Object(Default::default()),
        }
    } else {
        serde_json::from_slice::<Value>(body).map_err(|_| ApiError::BadRequest(INVALID_BODY.to_string()))?
    };

    let value = match value {
        Value::Null if empty == EmptyBody::AsEmptyObject => Value::Object(Default::default()),
        Value::Object(_) => value,
        _ => return Err(ApiError::BadRequest(INVALID_BODY.to_string())),
    };

    serde_json::from_value(value).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

/// Interpret `num_questions`: absent means the default, fractions are
/// truncated, and anything below one is raised to one.
fn resolve_question_count(raw: Option<&Value>) -> Result<usize, ApiError> {
    let invalid = || ApiError::ValidationError("num_questions must be an integer".to_string());

    let requested = match raw {
        None | Some(Value::Null) => return Ok(DEFAULT_QUIZ_QUESTIONS),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(invalid)?,
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };

    Ok(requested.max(1) as usize)
}

pub async fn chat(State(state): State<AppState>, body: Bytes) -> ApiResult<ChatResponse> {
    log_api_start!("chat");

    let request: ChatRequest = parse_json_body(&body, EmptyBody::Reject)
        .map_err(|e| e.to_response_with_context(ErrorContext::new("chat", "chat_message")))?;

    let message = request.message.as_deref().unwrap_or_default().trim();
    if message.is_empty() {
        log_validation!(failure, "chat_request", error = "Message is required");
        return Err(api_error!(validation, "chat", "chat_message", "Message is required"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        log_validation!(failure, "chat_request", error = "Message too long");
        return Err(api_error!(validation, "chat", "chat_message", "Message too long"));
    }

    let response = state.gateway.answer(message, request.topic.as_deref()).await;

    log_api_success!("chat", topic = request.topic, "answer produced");
    Ok(Json(ChatResponse {
        message: message.to_string(),
        response,
    }))
}

pub async fn generate_quiz(State(state): State<AppState>, body: Bytes) -> ApiResult<GeneratedQuiz> {
    let context = || ErrorContext::new("generate_quiz", "quiz").with_debug(state.debug);

    let request: QuizRequest = parse_json_body(&body, EmptyBody::AsEmptyObject)
        .map_err(|e| e.to_response_with_context(context()))?;

    let topic = request.topic.as_deref().unwrap_or_default().trim();
    log_api_start!("generate_quiz", topic = topic);
    if topic.is_empty() {
        log_validation!(failure, "quiz_request", error = "Topic is required");
        return Err(api_error!(validation, "generate_quiz", "quiz", "Topic is required"));
    }
    let count = resolve_question_count(request.num_questions.as_ref())
        .map_err(|e| e.to_response_with_context(context()))?;

    let quiz = state.gateway.generate_quiz(topic, count).await;
    if quiz.is_fallback() {
        log_api_warn!("generate_quiz", "serving fallback quiz");
    }

    let audit = Event::Generated {
        topic: topic.to_string(),
        quiz: quiz.to_value(),
        timestamp: None,
    };
    if let Err(e) = state.store.append(audit).await {
        log_api_error!("generate_quiz", error = format!("{:#}", e), "could not record generated quiz");
        return Err(api_error!(storage, "generate_quiz", "quiz", e, debug = state.debug));
    }

    log_api_success!("generate_quiz", count = quiz.question_count(), "quiz generated");
    Ok(Json(quiz))
}

pub async fn get_progress(State(state): State<AppState>) -> ApiResult<ProgressDocument> {
    log_api_start!("get_progress");

    match state.store.read_all().await {
        Ok(document) => {
            log_api_success!("get_progress", count = document.events.len(), "events returned");
            Ok(Json(document))
        }
        Err(e) => {
            log_api_error!("get_progress", error = format!("{:#}", e), "could not read event log");
            Err(api_error!(storage, "get_progress", "progress", e, debug = state.debug))
        }
    }
}

pub async fn add_study_event(State(state): State<AppState>, body: Bytes) -> ApiResult<StudyEventResponse> {
    log_api_start!("add_study_event");

    let request: StudyEventRequest = parse_json_body(&body, EmptyBody::AsEmptyObject)
        .map_err(|e| e.to_response_with_context(ErrorContext::new("add_study_event", "study_event")))?;

    let event = Event::Study {
        topic: request.topic,
        notes: request.notes,
        timestamp: request.timestamp,
    };

    match state.store.append(event).await {
        Ok(event) => {
            log_api_success!("add_study_event", topic = event.topic(), "study event recorded");
            Ok(Json(StudyEventResponse { status: "ok", event }))
        }
        Err(e) => Err(api_error!(storage, "add_study_event", "study_event", e, debug = state.debug)),
    }
}

pub async fn add_quiz_result(State(state): State<AppState>, body: Bytes) -> ApiResult<QuizResultResponse> {
    log_api_start!("add_quiz_result");

    let request: QuizResultRequest = parse_json_body(&body, EmptyBody::AsEmptyObject)
        .map_err(|e| e.to_response_with_context(ErrorContext::new("add_quiz_result", "quiz_result")))?;

    let event = Event::Quiz {
        topic: request.topic,
        score: request.score,
        total: request.total,
        answers: request.answers,
        timestamp: request.timestamp,
    };

    match state.store.append(event).await {
        Ok(result) => {
            log_api_success!("add_quiz_result", topic = result.topic(), "quiz result recorded");
            Ok(Json(QuizResultResponse { status: "ok", result }))
        }
        Err(e) => Err(api_error!(storage, "add_quiz_result", "quiz_result", e, debug = state.debug)),
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat routes
        .route("/api/chat/", post(chat))
        .route("/api/chat", post(chat))

        // Quiz routes
        .route("/api/quiz", post(generate_quiz))

        // Progress routes
        .route("/api/progress", get(get_progress))
        .route("/api/progress/study", post(add_study_event))
        .route("/api/progress/quiz", post(add_quiz_result))

        .route("/health", get(health))
        .with_state(state)
}

/// The router with CORS, request tracing and panic-to-500 mapping applied.
pub fn create_app(state: AppState) -> Router {
    let debug = state.debug;

    create_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send + 'static>| {
                panic_response(debug, panic)
            }))
            .layer(CorsLayer::permissive()),
    )
}
