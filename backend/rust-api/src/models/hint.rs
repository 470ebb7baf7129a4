use serde::{Deserialize, Serialize};
use validator::Validate;

/// Persisted, structured explanation for one question. Created once on the
/// first miss, then treated as immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintRecord {
    pub question_id: String,
    pub subject: String,
    /// Ordered instructional steps, 3-8 when model-generated.
    pub steps: Vec<String>,
    pub full_explanation: String,
    /// 1-2 common mistakes; empty for fallback records.
    #[serde(default)]
    pub misconceptions: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateHintsRequest {
    #[validate(length(min = 1, message = "questionId is required"))]
    pub question_id: String,
    #[validate(length(min = 1, message = "questionText is required"))]
    pub question_text: String,
    #[validate(length(min = 1, message = "options must not be empty"))]
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    #[validate(length(min = 1, message = "subject is required"))]
    pub subject: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintsQuery {
    pub question_id: Option<String>,
}
