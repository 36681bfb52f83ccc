//! Free-text answers and quiz generation backed by a remote completion
//! service, with deterministic offline fallbacks. Nothing here returns an
//! error: every remote failure is folded into a placeholder answer or a
//! fallback quiz.

use serde_json::Value;
use tracing::{debug, info};

use crate::llm_providers::{CompletionRequest, JsonResponseParser, LLMProvider, extract_completion_text};
use crate::models::{GeneratedQuiz, Question, QuizPayload};

// Import logging macros
use crate::log_llm_operation;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_QUIZ_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_TOPIC: &str = "general";

const ANSWER_SYSTEM_PROMPT: &str = "You are an AI Study Companion that explains clearly, step-by-step, \
     and adapts to a student's level. Use concise language and examples.";
const QUIZ_SYSTEM_PROMPT: &str = "Return strictly valid JSON. No extra commentary.";
const ANSWER_TEMPERATURE: f32 = 0.2;
const QUIZ_TEMPERATURE: f32 = 0.3;

/// Error text fragments meaning "the service won't serve us", as opposed to
/// an arbitrary failure. Matched case-insensitively.
const UNAVAILABLE_MARKERS: [&str; 7] = [
    "quota",
    "rate limit",
    "rate_limit",
    "insufficient_quota",
    "authentication",
    "401",
    "api key",
];

/// Whether the remote completion service may be called at all.
///
/// Decided once at startup and never revisited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAvailability {
    Available,
    Unavailable { reason: String },
}

impl RemoteAvailability {
    /// Usable only with a configured provider whose probe succeeds.
    pub async fn detect(provider: Option<&LLMProvider>) -> Self {
        let Some(provider) = provider else {
            return RemoteAvailability::Unavailable {
                reason: "no provider credential configured".to_string(),
            };
        };

        match provider.probe().await {
            Ok(()) => {
                info!(provider = provider.provider_name(), "Completion service probe succeeded");
                RemoteAvailability::Available
            }
            Err(e) => {
                log_llm_operation!(error, "probe", provider = provider.provider_name(), error = format!("{:#}", e));
                RemoteAvailability::Unavailable {
                    reason: format!("capability probe failed: {:#}", e),
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RemoteAvailability::Available)
    }
}

#[derive(Debug, Clone)]
pub struct AIGateway {
    provider: Option<LLMProvider>,
    availability: RemoteAvailability,
    chat_model: String,
    quiz_model: String,
}

impl AIGateway {
    pub fn new(provider: Option<LLMProvider>, availability: RemoteAvailability) -> Self {
        Self {
            provider,
            availability,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            quiz_model: DEFAULT_QUIZ_MODEL.to_string(),
        }
    }

    /// A gateway that never leaves the process.
    pub fn offline() -> Self {
        Self::new(
            None,
            RemoteAvailability::Unavailable {
                reason: "remote completion service disabled".to_string(),
            },
        )
    }

    pub fn with_models(mut self, chat_model: impl Into<String>, quiz_model: impl Into<String>) -> Self {
        self.chat_model = chat_model.into();
        self.quiz_model = quiz_model.into();
        self
    }

    pub fn availability(&self) -> &RemoteAvailability {
        &self.availability
    }

    /// The provider, but only when the startup decision allows calling it.
    fn remote(&self) -> Option<&LLMProvider> {
        if self.availability.is_available() {
            self.provider.as_ref()
        } else {
            None
        }
    }

    /// Answer a study question. Always produces text.
    pub async fn answer(&self, message: &str, topic: Option<&str>) -> String {
        let topic = topic.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TOPIC);

        let Some(provider) = self.remote() else {
            return placeholder_answer(message, topic);
        };

        let prompt = format!("Topic: {}\nQuestion: {}", topic, message);
        let request = CompletionRequest {
            model: &self.chat_model,
            system_message: ANSWER_SYSTEM_PROMPT,
            prompt: &prompt,
            temperature: ANSWER_TEMPERATURE,
        };

        log_llm_operation!(start, "answer", provider = provider.provider_name(), model = self.chat_model);
        match complete_text(provider, &request).await {
            Ok(text) => {
                log_llm_operation!(success, "answer", provider = provider.provider_name(), response_length = text.len());
                text
            }
            Err(e) => {
                let error_text = format!("{:#}", e);
                log_llm_operation!(error, "answer", provider = provider.provider_name(), error = error_text);
                answer_for_failure(&error_text)
            }
        }
    }

    /// Build a multiple-choice quiz with `count` questions on `topic`.
    pub async fn generate_quiz(&self, topic: &str, count: usize) -> GeneratedQuiz {
        let Some(provider) = self.remote() else {
            log_llm_operation!(fallback, "generate_quiz", reason = "remote service unavailable");
            return GeneratedQuiz::Fallback(placeholder_quiz(topic, count));
        };

        let prompt = format!(
            "Create a {}-question multiple-choice quiz on '{}'. \
             Return JSON ONLY with fields: topic, questions[]. Each question must have: \
             q, options (4), answer (index 0-3), explanation (1-2 sentences).",
            count, topic
        );
        let request = CompletionRequest {
            model: &self.quiz_model,
            system_message: QUIZ_SYSTEM_PROMPT,
            prompt: &prompt,
            temperature: QUIZ_TEMPERATURE,
        };

        log_llm_operation!(start, "generate_quiz", provider = provider.provider_name(), model = self.quiz_model);
        let quiz = match complete_text(provider, &request).await {
            Ok(text) => {
                debug!(response_content = %text, "Raw LLM response for quiz generation");
                parse_quiz_response(topic, &text)
            }
            Err(e) => {
                let error_text = format!("{:#}", e);
                log_llm_operation!(error, "generate_quiz", provider = provider.provider_name(), error = error_text);
                GeneratedQuiz::Fallback(fallback_quiz(topic, &error_text))
            }
        };

        if quiz.is_fallback() {
            log_llm_operation!(fallback, "generate_quiz", reason = "unusable quiz response");
        } else {
            log_llm_operation!(success, "generate_quiz", provider = provider.provider_name(), response_length = quiz.question_count());
        }
        quiz
    }
}

/// One remote call, normalized to trimmed text.
async fn complete_text(provider: &LLMProvider, request: &CompletionRequest<'_>) -> anyhow::Result<String> {
    let body = provider.make_request(request).await?;
    extract_completion_text(&body)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("No message content in {} response", provider.provider_name()))
}

pub fn placeholder_answer(message: &str, topic: &str) -> String {
    format!(
        "(AI placeholder) You asked: '{}'. Topic: '{}'. \
         Add your OPENAI_API_KEY in .env to get real AI responses.",
        message, topic
    )
}

pub fn is_unavailability_error(error_text: &str) -> bool {
    let lowered = error_text.to_lowercase();
    UNAVAILABLE_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// The answer text handed back when the remote call failed.
pub fn answer_for_failure(error_text: &str) -> String {
    if is_unavailability_error(error_text) {
        format!(
            "(AI placeholder) The AI service is unavailable: {}. Showing a local placeholder response.",
            error_text
        )
    } else {
        format!("Error from AI: {}", error_text)
    }
}

/// Offline quiz: `count` identical placeholder questions (at least one).
pub fn placeholder_quiz(topic: &str, count: usize) -> QuizPayload {
    let question = Question {
        q: format!("Placeholder: What is a key concept in {}?", topic),
        options: ["Concept A", "Concept B", "Concept C", "Concept D"]
            .map(String::from)
            .to_vec(),
        answer: 0,
        explanation: "Add OPENAI_API_KEY in .env for real AI-generated quizzes.".to_string(),
    };

    QuizPayload {
        topic: topic.to_string(),
        error: None,
        questions: vec![question; count.max(1)],
    }
}

/// Quiz returned when the remote service answered with something unusable.
pub fn fallback_quiz(topic: &str, reason: &str) -> QuizPayload {
    QuizPayload {
        topic: topic.to_string(),
        error: Some(format!("AI quiz generation failed: {}", reason)),
        questions: vec![Question {
            q: format!("Fallback: Which of the following relates to {}?", topic),
            options: ["A", "B", "C", "D"].map(String::from).to_vec(),
            answer: 0,
            explanation: "Quiz generated by fallback due to parsing error.".to_string(),
        }],
    }
}

/// Accept the model's reply only if it is a JSON object with both `topic`
/// and `questions`; the object is then passed through as-is.
pub fn parse_quiz_response(topic: &str, text: &str) -> GeneratedQuiz {
    let content = JsonResponseParser::strip_code_fence(text);

    match serde_json::from_str::<Value>(content) {
        Ok(value) if value.get("topic").is_some() && value.get("questions").is_some() => {
            GeneratedQuiz::Remote(value)
        }
        Ok(_) => GeneratedQuiz::Fallback(fallback_quiz(topic, "Invalid quiz structure")),
        Err(e) => GeneratedQuiz::Fallback(fallback_quiz(topic, &e.to_string())),
    }
}
