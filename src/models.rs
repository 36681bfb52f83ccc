use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One persisted record of study or quiz activity.
///
/// Serialized with a `type` tag. Absent optional fields are written as `null`
/// so every record of a given kind has the same keys. Caller-supplied notes
/// and timestamps are stored as whatever JSON value was sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Study {
        topic: Option<String>,
        notes: Option<Value>,
        timestamp: Option<Value>,
    },
    Quiz {
        topic: Option<String>,
        score: Option<Value>,
        total: Option<Value>,
        answers: Option<Value>,
        timestamp: Option<Value>,
    },
    /// Audit record written whenever a quiz is handed out.
    Generated {
        topic: String,
        quiz: Value,
        timestamp: Option<Value>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Study { .. } => "study",
            Event::Quiz { .. } => "quiz",
            Event::Generated { .. } => "generated",
        }
    }

    pub fn topic(&self) -> Option<&str> {
        match self {
            Event::Study { topic, .. } | Event::Quiz { topic, .. } => topic.as_deref(),
            Event::Generated { topic, .. } => Some(topic.as_str()),
        }
    }

    pub fn timestamp(&self) -> Option<&Value> {
        match self {
            Event::Study { timestamp, .. }
            | Event::Quiz { timestamp, .. }
            | Event::Generated { timestamp, .. } => timestamp.as_ref(),
        }
    }

    /// Fill in the timestamp unless the caller already supplied one. A JSON
    /// `null` decodes as `None` and is stamped too; any other value is kept.
    pub fn stamp_if_missing(&mut self, now: impl FnOnce() -> String) {
        let slot = match self {
            Event::Study { timestamp, .. }
            | Event::Quiz { timestamp, .. }
            | Event::Generated { timestamp, .. } => timestamp,
        };
        if slot.is_none() {
            *slot = Some(Value::String(now()));
        }
    }
}

/// The whole persisted event log.
///
/// Events are held as raw JSON so records this build did not write (or that
/// were edited by hand) survive a read-modify-write unchanged. Unknown
/// top-level keys are preserved the same way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressDocument {
    pub events: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub q: String,
    pub options: Vec<String>, // always four entries
    pub answer: u8,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizPayload {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub questions: Vec<Question>,
}

/// A quiz as handed back to the client.
///
/// Remote quizzes are passed through exactly as the completion service
/// produced them; only locally built fallbacks are typed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedQuiz {
    Remote(Value),
    Fallback(QuizPayload),
}

impl GeneratedQuiz {
    pub fn is_fallback(&self) -> bool {
        matches!(self, GeneratedQuiz::Fallback(_))
    }

    pub fn question_count(&self) -> usize {
        match self {
            GeneratedQuiz::Remote(value) => value
                .get("questions")
                .and_then(Value::as_array)
                .map_or(0, Vec::len),
            GeneratedQuiz::Fallback(payload) => payload.questions.len(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            GeneratedQuiz::Remote(value) => value.clone(),
            GeneratedQuiz::Fallback(payload) => serde_json::to_value(payload).unwrap_or_default(),
        }
    }
}
