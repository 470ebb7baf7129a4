use chrono::Utc;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::config::TestConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::metrics::{ANSWERS_SUBMITTED_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL};
use crate::models::follow_up::Evaluation;
use crate::models::session::{
    SessionProgress, StartSessionRequest, StartSessionResponse,
};
use crate::models::{Question, QuestionView};
use crate::services::question_selector::{QuestionSelector, SelectionMode};
use crate::session::{SessionError, TestSession};

/// Process-wide session registry. Sessions live in memory only and are
/// replaced wholesale when a student restarts.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, TestSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct SessionService {
    registry: SessionRegistry,
    test: TestConfig,
}

impl SessionService {
    pub fn new(registry: SessionRegistry, test: TestConfig) -> Self {
        Self { registry, test }
    }

    /// Draw a fresh batch and open a session. The question order is
    /// shuffled once here and never changes afterwards.
    pub fn start(
        &self,
        selector: &QuestionSelector,
        req: &StartSessionRequest,
    ) -> ServiceResult<StartSessionResponse> {
        let mut questions =
            selector.select(&req.subject, &req.grade, req.topic.as_deref(), SelectionMode::Test);
        if questions.is_empty() {
            return Err(ServiceError::NotFound(
                "Bu konu ve sınıf seviyesi için soru bulunamadı. Lütfen başka bir seçim yapın."
                    .to_string(),
            ));
        }

        let mut rng = rand::rng();
        questions.shuffle(&mut rng);
        questions.truncate(self.test.questions_per_test);

        let session = TestSession::new(
            Uuid::new_v4().to_string(),
            req.subject.clone(),
            req.grade.clone(),
            questions,
            Utc::now(),
            self.test.time_warning_secs,
            self.test.max_test_secs,
        );

        let response = StartSessionResponse {
            session_id: session.id.clone(),
            questions: session.questions.iter().map(QuestionView::from).collect(),
            question_count: session.questions.len(),
            started_at: session.started_at,
            max_duration_secs: session.max_duration_secs(),
        };

        let mut sessions = self
            .registry
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        sessions.insert(session.id.clone(), session);

        SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        SESSIONS_ACTIVE.inc();
        tracing::info!(
            "Test session created: {} ({} {} grade, {} questions)",
            response.session_id,
            req.subject,
            req.grade,
            response.question_count
        );

        Ok(response)
    }

    /// Run `op` against a session with the clock advanced first, so timeout
    /// completion happens even without a live client ticking.
    fn with_session<T>(
        &self,
        session_id: &str,
        op: impl FnOnce(&mut TestSession) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let mut sessions = self
            .registry
            .sessions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ServiceError::NotFound("Session not found".to_string()))?;

        let was_complete = session.is_complete;
        session.tick(Utc::now());
        let result = op(session);
        if !was_complete && session.is_complete {
            SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
            SESSIONS_ACTIVE.dec();
        }
        result
    }

    pub fn progress(&self, session_id: &str) -> ServiceResult<SessionProgress> {
        self.with_session(session_id, |session| {
            Ok(SessionProgress {
                session_id: session.id.clone(),
                elapsed_secs: session.elapsed_secs(Utc::now()),
                time_warning: session.time_warning_issued,
                answered: session.answered_count(),
                total: session.questions.len(),
                is_complete: session.is_complete,
            })
        })
    }

    pub fn select_answer(
        &self,
        session_id: &str,
        position: usize,
        answer_index: usize,
    ) -> ServiceResult<bool> {
        self.with_session(session_id, |session| {
            session
                .select_answer(position, answer_index)
                .map_err(map_session_error)?;
            let correct = matches!(
                &session.questions[position],
                Question::MultipleChoice(q) if q.correct_answer_index == answer_index
            );
            ANSWERS_SUBMITTED_TOTAL
                .with_label_values(&[if correct { "true" } else { "false" }])
                .inc();
            Ok(correct)
        })
    }

    /// Store the open-ended answer and hand back what the evaluator needs;
    /// the evaluation call happens outside the registry lock.
    pub fn record_open_ended(
        &self,
        session_id: &str,
        question_id: &str,
        answer: &str,
    ) -> ServiceResult<(String, String)> {
        self.with_session(session_id, |session| {
            session
                .record_open_ended(question_id, answer.to_string())
                .map_err(map_session_error)?;
            let question = session
                .questions
                .iter()
                .find_map(|q| match q {
                    Question::OpenEnded(oe) if oe.id == question_id => Some(oe),
                    _ => None,
                })
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("unknown question id {}", question_id))
                })?;
            Ok((question.text.clone(), question.correct_answer.clone()))
        })
    }

    pub fn attach_evaluation(
        &self,
        session_id: &str,
        question_id: &str,
        evaluation: Evaluation,
    ) -> ServiceResult<()> {
        let correct = evaluation.is_correct == 1;
        let result = self.with_session(session_id, |session| {
            session
                .attach_evaluation(question_id, evaluation)
                .map_err(map_session_error)
        });
        if result.is_ok() {
            ANSWERS_SUBMITTED_TOTAL
                .with_label_values(&[if correct { "true" } else { "false" }])
                .inc();
        }
        result
    }

    pub fn complete(&self, session_id: &str) -> ServiceResult<SessionProgress> {
        self.with_session(session_id, |session| {
            session.finish(Utc::now(), false).map_err(map_session_error)?;
            Ok(SessionProgress {
                session_id: session.id.clone(),
                elapsed_secs: session.elapsed_secs(Utc::now()),
                time_warning: session.time_warning_issued,
                answered: session.answered_count(),
                total: session.questions.len(),
                is_complete: session.is_complete,
            })
        })
    }

    pub fn results(&self, session_id: &str) -> ServiceResult<crate::models::session::TestResults> {
        self.with_session(session_id, |session| {
            session.results().ok_or_else(|| {
                ServiceError::Conflict("Sınav henüz tamamlanmadı.".to_string())
            })
        })
    }
}

fn map_session_error(error: SessionError) -> ServiceError {
    match error {
        SessionError::AlreadyComplete => ServiceError::Conflict(error.to_string()),
        SessionError::Unanswered | SessionError::EmptyAnswer => {
            ServiceError::Validation(error.to_string())
        }
        SessionError::InvalidPosition(_) | SessionError::InvalidAnswerIndex(_) => {
            ServiceError::Validation(error.to_string())
        }
        SessionError::UnknownQuestion(_) => ServiceError::NotFound(error.to_string()),
    }
}
