use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::QuestionView;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    #[validate(length(min = 1, message = "subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "grade is required"))]
    pub grade: String,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    pub questions: Vec<QuestionView>,
    pub question_count: usize,
    pub started_at: DateTime<Utc>,
    pub max_duration_secs: u64,
}

/// Answer submission, either a multiple-choice pick by position or an
/// open-ended text for a question id. The variants are disjoint on their
/// field names, so an untagged enum resolves unambiguously.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SessionAnswerRequest {
    #[serde(rename_all = "camelCase")]
    MultipleChoice { position: usize, answer_index: usize },
    #[serde(rename_all = "camelCase")]
    OpenEnded { question_id: String, answer: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProgress {
    pub session_id: String,
    pub elapsed_secs: i64,
    pub time_warning: bool,
    pub answered: usize,
    pub total: usize,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicErrorRate {
    pub topic: String,
    pub total: usize,
    pub incorrect: usize,
    /// Incorrect share of the topic's questions, percent, rounded.
    pub error_rate: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub score: u32,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub unanswered_count: usize,
    pub total_questions: usize,
    pub time_taken_secs: i64,
    pub topic_error_rates: Vec<TopicErrorRate>,
}
