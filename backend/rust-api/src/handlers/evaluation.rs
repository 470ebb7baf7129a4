use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::ServiceError;
use crate::extractors::AppJson;
use crate::models::follow_up::EvaluateAnswerRequest;
use crate::services::evaluation_service::EvaluationService;
use crate::services::AppState;

/// POST /api/evaluate-answer - grade an open-ended answer.
pub async fn evaluate_answer(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<EvaluateAnswerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if let Err(e) = req.validate() {
        return Err(ServiceError::Validation(format!("Missing required fields: {}", e)));
    }

    let service = EvaluationService::new(state.eval_chat.clone(), state.config.ai.clone());
    let evaluation = service
        .evaluate(&req.question_text, &req.student_answer, &req.correct_answer)
        .await?;

    Ok(Json(json!({
        "questionId": req.question_id,
        "isCorrect": evaluation.is_correct,
        "explanation": evaluation.explanation,
    })))
}
