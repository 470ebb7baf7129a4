use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::ServiceError;
use crate::extractors::AppJson;
use crate::models::session::{SessionAnswerRequest, StartSessionRequest};
use crate::services::evaluation_service::EvaluationService;
use crate::services::session_service::SessionService;
use crate::services::AppState;

fn service(state: &AppState) -> SessionService {
    SessionService::new(state.sessions.clone(), state.config.test.clone())
}

/// POST /api/sessions - start a timed test session.
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<StartSessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if let Err(e) = req.validate() {
        return Err(ServiceError::Validation(format!("Missing required fields: {}", e)));
    }

    tracing::info!("Starting test session for {} grade {}", req.subject, req.grade);

    let response = service(&state).start(&state.selector, &req)?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/sessions/{id} - session progress snapshot.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let progress = service(&state).progress(&session_id)?;
    Ok(Json(progress))
}

/// POST /api/sessions/{id}/answers - submit an answer. Multiple-choice
/// picks are stored as-is; open-ended answers are stored first and then
/// graded, so an evaluation failure leaves the answer in place.
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<SessionAnswerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let sessions = service(&state);

    match req {
        SessionAnswerRequest::MultipleChoice {
            position,
            answer_index,
        } => {
            sessions.select_answer(&session_id, position, answer_index)?;
            Ok(Json(json!({ "recorded": true })).into_response())
        }
        SessionAnswerRequest::OpenEnded {
            question_id,
            answer,
        } => {
            let (question_text, correct_answer) =
                sessions.record_open_ended(&session_id, &question_id, &answer)?;

            // The answer is already stored; grading happens outside the
            // registry lock and its failure propagates to the client.
            let evaluator =
                EvaluationService::new(state.eval_chat.clone(), state.config.ai.clone());
            let evaluation = evaluator
                .evaluate(&question_text, &answer, &correct_answer)
                .await?;

            sessions.attach_evaluation(&session_id, &question_id, evaluation.clone())?;
            Ok(Json(json!({ "recorded": true, "evaluation": evaluation })).into_response())
        }
    }
}

/// POST /api/sessions/{id}/complete - manual completion with the
/// all-answered check.
pub async fn complete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let progress = service(&state).complete(&session_id)?;
    tracing::info!("Test session completed: {}", session_id);
    Ok(Json(progress))
}

/// GET /api/sessions/{id}/results - score and per-topic breakdown.
pub async fn session_results(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let results = service(&state).results(&session_id)?;
    Ok(Json(results))
}
