use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AiConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::llm::{with_timeout, ChatModel, ChatRequest};
use crate::metrics::record_llm_call;
use crate::models::follow_up::Evaluation;

const PARSE_FAILURE_EXPLANATION: &str =
    "Yanıtınızı değerlendirirken bir hata oluştu. Lütfen tekrar deneyin.";

/// Score at or above which a graded answer counts as correct.
const CORRECT_THRESHOLD: f64 = 0.7;

const GRADING_SYSTEM_PROMPT: &str = "You are an educational AI assistant evaluating student answers to open-ended questions.
Grade the student's answer on a scale from 0 to 1, where 0 is completely wrong and 1 is completely correct.
When grading, focus on conceptual understanding rather than exact wording.
Provide a detailed explanation in Turkish for why the answer is correct or incorrect.

If the answer is incorrect or partially correct (score < 0.7):
1. Begin with a gentle acknowledgment of what parts are correct (if any)
2. Clearly explain the misconceptions or errors
3. Provide a detailed step-by-step explanation of the correct approach
4. Include any relevant formulas, principles, or concepts
5. Conclude with a summary of the key points to remember

If the answer is correct (score >= 0.7):
1. Acknowledge the correct answer
2. Reinforce why the approach was correct
3. Add any additional insights or alternative methods

Your explanation should be educational and help the student understand the concept better.
Format your response as JSON with the following schema:
{
  \"isCorrect\": number, // The score between 0 and 1
  \"explanation\": string // Detailed explanation in Turkish
}";

/// Grades open-ended answers. Unlike the hint and follow-up flows, upstream
/// transport failures propagate here so the session UI can show a transient
/// error and offer a retry.
pub struct EvaluationService {
    chat: Arc<dyn ChatModel>,
    ai: AiConfig,
}

impl EvaluationService {
    pub fn new(chat: Arc<dyn ChatModel>, ai: AiConfig) -> Self {
        Self { chat, ai }
    }

    pub async fn evaluate(
        &self,
        question_text: &str,
        student_answer: &str,
        correct_answer: &str,
    ) -> ServiceResult<Evaluation> {
        let request = ChatRequest {
            model: self.ai.evaluation_model.clone(),
            temperature: self.ai.evaluation_temperature,
            max_tokens: self.ai.evaluation_max_tokens,
            system: Some(GRADING_SYSTEM_PROMPT.to_string()),
            user: format!(
                "Question: {}\n\nCorrect answer: {}\n\nStudent answer: {}",
                question_text, correct_answer, student_answer
            ),
        };

        let timeout = Duration::from_millis(self.ai.evaluation_timeout_ms);
        let content = match with_timeout(timeout, self.chat.complete(&request)).await {
            Ok(content) => {
                record_llm_call("evaluation", "success");
                content
            }
            Err(e) => {
                record_llm_call("evaluation", "error");
                return Err(ServiceError::from(e));
            }
        };

        Ok(parse_evaluation(&content))
    }
}

/// The model replies with JSON content; anything unparsable grades as
/// incorrect with a fixed explanation rather than failing the request.
fn parse_evaluation(content: &str) -> Evaluation {
    match serde_json::from_str::<Value>(content) {
        Ok(value) => {
            let score = value
                .get("isCorrect")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let explanation = value
                .get("explanation")
                .and_then(Value::as_str)
                .unwrap_or(PARSE_FAILURE_EXPLANATION)
                .to_string();
            Evaluation {
                is_correct: if score >= CORRECT_THRESHOLD { 1 } else { 0 },
                explanation,
            }
        }
        Err(e) => {
            tracing::warn!("evaluation response was not JSON: {}", e);
            Evaluation {
                is_correct: 0,
                explanation: PARSE_FAILURE_EXPLANATION.to_string(),
            }
        }
    }
}
