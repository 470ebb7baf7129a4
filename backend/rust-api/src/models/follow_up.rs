use serde::{Deserialize, Serialize};
use validator::Validate;

/// One prior question/answer exchange shown to the model as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// Follow-up grounded in a solved question.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    #[validate(length(min = 1, message = "questionText is required"))]
    pub question_text: String,
    /// Pre-rendered option block, one choice per line.
    #[serde(default)]
    pub choices: Option<String>,
    #[validate(length(min = 1, message = "correctAnswer is required"))]
    pub correct_answer: String,
    #[serde(default)]
    pub hints: Option<Vec<String>>,
    #[serde(default)]
    pub full_explanation: Option<String>,
    #[validate(length(min = 1, message = "followUpQuestion is required"))]
    pub follow_up_question: String,
    #[validate(length(min = 1, message = "subject is required"))]
    pub subject: String,
    #[serde(default)]
    pub previous_conversation: Option<Vec<ConversationTurn>>,
}

/// One prior exchange about a textbook page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicConversationTurn {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub page_number: Option<u32>,
}

/// Follow-up grounded in a textbook page, either by extracted text or by a
/// PDF reference.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TopicFollowUpRequest {
    #[validate(length(min = 1, message = "subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "grade is required"))]
    pub grade: String,
    pub page_number: u32,
    #[serde(default)]
    pub page_content: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[validate(length(min = 1, message = "followUpQuestion is required"))]
    pub follow_up_question: String,
    #[serde(default)]
    pub previous_conversation: Option<Vec<TopicConversationTurn>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateAnswerRequest {
    #[serde(default)]
    pub question_id: Option<String>,
    #[validate(length(min = 1, message = "questionText is required"))]
    pub question_text: String,
    #[validate(length(min = 1, message = "studentAnswer is required"))]
    pub student_answer: String,
    #[validate(length(min = 1, message = "correctAnswer is required"))]
    pub correct_answer: String,
}

/// Grading verdict for an open-ended answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// 1 when correct, 0 otherwise.
    pub is_correct: u8,
    pub explanation: String,
}
