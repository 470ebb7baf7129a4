use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::models::Question;
use crate::services::question_selector::SelectionMode;
use crate::services::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionsQuery {
    pub subject: Option<String>,
    pub grade: Option<String>,
    pub topic: Option<String>,
    pub random: Option<String>,
    pub topics_only: Option<String>,
    pub page_mode: Option<String>,
    pub debug: Option<String>,
}

fn flag(value: &Option<String>) -> bool {
    value.as_deref() == Some("true")
}

/// GET /api/questions - list, filter, or draw questions from the bank.
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestionsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    tracing::info!(
        "Questions request - subject: {:?}, grade: {:?}, topic: {:?}, random: {:?}, topics_only: {:?}",
        query.subject,
        query.grade,
        query.topic,
        query.random,
        query.topics_only
    );

    let (subject, grade) = match (&query.subject, &query.grade) {
        (Some(subject), Some(grade)) if !subject.is_empty() && !grade.is_empty() => {
            (subject.as_str(), grade.as_str())
        }
        _ => {
            return Err(ServiceError::Validation(
                "Subject and grade are required parameters".to_string(),
            ))
        }
    };

    // Debug mode dumps the raw bank for troubleshooting.
    if flag(&query.debug) {
        let rows = state.bank.load_multiple_choice();
        let questions: Vec<Question> = rows
            .iter()
            .map(crate::services::question_bank::mc_question_from_row)
            .collect();
        return Ok(Json(json!({
            "allQuestions": questions,
            "count": questions.len(),
            "params": { "subject": subject, "grade": grade },
        }))
        .into_response());
    }

    if flag(&query.topics_only) {
        let topics = state.bank.topics(subject, grade);
        return Ok(Json(json!({ "topics": topics })).into_response());
    }

    if flag(&query.random) {
        return match state.selector.random_question(subject, grade) {
            Some(question) => Ok(Json(json!({ "question": question })).into_response()),
            None => {
                let available = state.bank.available_summary();
                Ok((
                    StatusCode::NOT_FOUND,
                    Json(json!({
                        "error": "No questions found for the given criteria",
                        "requested": { "subject": subject, "grade": grade },
                        "available": available,
                    })),
                )
                    .into_response())
            }
        };
    }

    let mode = SelectionMode::parse(query.page_mode.as_deref());
    let questions = state
        .selector
        .select(subject, grade, query.topic.as_deref(), mode);

    Ok(Json(json!({ "questions": questions })).into_response())
}
