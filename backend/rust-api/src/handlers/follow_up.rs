use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::ServiceError;
use crate::extractors::AppJson;
use crate::models::follow_up::{FollowUpRequest, TopicFollowUpRequest};
use crate::services::follow_up_service::FollowUpService;
use crate::services::AppState;

fn service(state: &AppState) -> FollowUpService {
    FollowUpService::new(
        state.chat.clone(),
        state.follow_up_cache.clone(),
        state.config.ai.clone(),
    )
}

/// POST /api/follow-up - answer a follow-up about a solved question.
pub async fn question_follow_up(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<FollowUpRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if let Err(e) = req.validate() {
        return Err(ServiceError::Validation(format!("Missing required parameters: {}", e)));
    }

    let response = service(&state).answer_question_follow_up(&req).await?;
    Ok(Json(json!({ "response": response })))
}

/// POST /api/topic-follow-up - answer a follow-up about a textbook page.
pub async fn topic_follow_up(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<TopicFollowUpRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if let Err(e) = req.validate() {
        tracing::warn!("topic follow-up validation failed: {}", e);
        return Err(ServiceError::Validation(
            "Gerekli alanlar eksik. Lütfen konu ve sınıf seçtiğinizden emin olun.".to_string(),
        ));
    }

    tracing::info!(
        "Topic follow-up request - subject: {}, grade: {}, page: {}",
        req.subject,
        req.grade,
        req.page_number
    );

    let answer = service(&state).answer_topic_follow_up(&req).await?;
    Ok(Json(json!({ "answer": answer, "pageNumber": req.page_number })))
}
