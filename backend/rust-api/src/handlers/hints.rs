use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::error::ServiceError;
use crate::extractors::AppJson;
use crate::models::hint::{GenerateHintsRequest, HintsQuery};
use crate::services::hint_service::HintService;
use crate::services::AppState;

/// GET /api/hints?questionId= - fetch a stored hint record.
pub async fn get_hints(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HintsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let question_id = query
        .question_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ServiceError::Validation("Question ID is required".to_string()))?;

    let service = HintService::new(
        state.hint_store.clone(),
        state.chat.clone(),
        state.config.ai.clone(),
    );

    match service.lookup(&question_id) {
        Some(record) => Ok(Json(record)),
        None => Err(ServiceError::NotFound(
            "No hints found for this question".to_string(),
        )),
    }
}

/// POST /api/hints - fetch-or-generate a hint record for a question.
pub async fn generate_hints(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<GenerateHintsRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if let Err(e) = req.validate() {
        return Err(ServiceError::Validation(format!("Missing required fields: {}", e)));
    }

    tracing::info!("Hint generation requested for question {}", req.question_id);

    let service = HintService::new(
        state.hint_store.clone(),
        state.chat.clone(),
        state.config.ai.clone(),
    );

    let record = service.get_or_generate(&req).await;
    Ok(Json(record))
}
