use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::follow_up::Evaluation;
use crate::models::session::{TestResults, TopicErrorRate};
use crate::models::Question;

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("Sınav tamamlandı, cevaplar artık değiştirilemez.")]
    AlreadyComplete,
    #[error("Lütfen tüm soruları cevaplayın.")]
    Unanswered,
    #[error("invalid question position {0}")]
    InvalidPosition(usize),
    #[error("answer index {0} is out of range")]
    InvalidAnswerIndex(usize),
    #[error("unknown question id {0}")]
    UnknownQuestion(String),
    #[error("answer must not be empty")]
    EmptyAnswer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenEndedAnswer {
    pub answer: String,
    pub evaluation: Option<Evaluation>,
}

/// One timed practice attempt over a fixed question batch.
///
/// Lifecycle: created in progress, completed exactly once, either manually
/// (all questions must be answered) or by the clock (whatever answers exist
/// stand). `ended_at` is set iff `is_complete`, and answers are frozen from
/// that point on.
#[derive(Debug, Clone)]
pub struct TestSession {
    pub id: String,
    pub subject: String,
    pub grade: String,
    pub questions: Vec<Question>,
    /// Selected option per question position; only multiple-choice
    /// positions are ever non-null.
    pub answers: Vec<Option<usize>>,
    pub open_ended_answers: HashMap<String, OpenEndedAnswer>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_complete: bool,
    pub time_warning_issued: bool,
    warning_after: Duration,
    max_duration: Duration,
}

impl TestSession {
    pub fn new(
        id: String,
        subject: String,
        grade: String,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
        warning_after_secs: u64,
        max_secs: u64,
    ) -> Self {
        let answers = vec![None; questions.len()];
        Self {
            id,
            subject,
            grade,
            questions,
            answers,
            open_ended_answers: HashMap::new(),
            started_at,
            ended_at: None,
            is_complete: false,
            time_warning_issued: false,
            warning_after: Duration::seconds(warning_after_secs as i64),
            max_duration: Duration::seconds(max_secs as i64),
        }
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        let end = self.ended_at.unwrap_or(now);
        (end - self.started_at).num_seconds().max(0)
    }

    pub fn max_duration_secs(&self) -> u64 {
        self.max_duration.num_seconds().max(0) as u64
    }

    /// Advance the clock: issue the one-time warning when the threshold is
    /// crossed and force completion once the maximum duration is reached,
    /// exactly as if the student had finished manually (minus the
    /// completeness check).
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if self.is_complete {
            return;
        }

        let elapsed = now - self.started_at;

        if elapsed >= self.warning_after && !self.time_warning_issued {
            self.time_warning_issued = true;
        }

        if elapsed >= self.max_duration {
            // Cap the recorded end time at the limit.
            let deadline = self.started_at + self.max_duration;
            self.ended_at = Some(deadline.min(now));
            self.is_complete = true;
        }
    }

    pub fn select_answer(&mut self, position: usize, index: usize) -> Result<(), SessionError> {
        if self.is_complete {
            return Err(SessionError::AlreadyComplete);
        }
        let question = self
            .questions
            .get(position)
            .ok_or(SessionError::InvalidPosition(position))?;
        let options = match question {
            Question::MultipleChoice(q) => &q.options,
            Question::OpenEnded(_) => return Err(SessionError::InvalidPosition(position)),
        };
        if index >= options.len() {
            return Err(SessionError::InvalidAnswerIndex(index));
        }
        // Overwrite allowed, no history kept.
        self.answers[position] = Some(index);
        Ok(())
    }

    /// Store an open-ended answer immediately; evaluation arrives later via
    /// `attach_evaluation` and may never arrive at all.
    pub fn record_open_ended(
        &mut self,
        question_id: &str,
        answer: String,
    ) -> Result<(), SessionError> {
        if self.is_complete {
            return Err(SessionError::AlreadyComplete);
        }
        if answer.trim().is_empty() {
            return Err(SessionError::EmptyAnswer);
        }
        let known = self
            .questions
            .iter()
            .any(|q| q.is_open_ended() && q.id() == question_id);
        if !known {
            return Err(SessionError::UnknownQuestion(question_id.to_string()));
        }
        self.open_ended_answers.insert(
            question_id.to_string(),
            OpenEndedAnswer {
                answer,
                evaluation: None,
            },
        );
        Ok(())
    }

    pub fn attach_evaluation(
        &mut self,
        question_id: &str,
        evaluation: Evaluation,
    ) -> Result<(), SessionError> {
        if self.is_complete {
            return Err(SessionError::AlreadyComplete);
        }
        let entry = self
            .open_ended_answers
            .get_mut(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
        entry.evaluation = Some(evaluation);
        Ok(())
    }

    fn is_answered(&self, position: usize) -> bool {
        match &self.questions[position] {
            Question::MultipleChoice(_) => self.answers[position].is_some(),
            Question::OpenEnded(q) => self
                .open_ended_answers
                .get(&q.id)
                .is_some_and(|entry| !entry.answer.trim().is_empty()),
        }
    }

    pub fn answered_count(&self) -> usize {
        (0..self.questions.len())
            .filter(|&i| self.is_answered(i))
            .count()
    }

    pub fn all_answered(&self) -> bool {
        self.answered_count() == self.questions.len()
    }

    /// Manual or forced completion. Manual completion requires every
    /// question to carry an answer; the forced path (timeout) takes the
    /// answers as they are.
    pub fn finish(&mut self, now: DateTime<Utc>, force: bool) -> Result<(), SessionError> {
        if self.is_complete {
            return Err(SessionError::AlreadyComplete);
        }
        if !force && !self.all_answered() {
            return Err(SessionError::Unanswered);
        }
        self.ended_at = Some(now);
        self.is_complete = true;
        Ok(())
    }

    fn outcome(&self, position: usize) -> Outcome {
        match &self.questions[position] {
            Question::MultipleChoice(q) => match self.answers[position] {
                Some(index) if index == q.correct_answer_index => Outcome::Correct,
                Some(_) => Outcome::Incorrect,
                None => Outcome::Unanswered,
            },
            Question::OpenEnded(q) => match self.open_ended_answers.get(&q.id) {
                Some(entry) => match &entry.evaluation {
                    Some(evaluation) if evaluation.is_correct == 1 => Outcome::Correct,
                    // Unevaluated answers cannot count as correct.
                    _ => Outcome::Incorrect,
                },
                None => Outcome::Unanswered,
            },
        }
    }

    /// Score and breakdown; only defined once the session is complete.
    pub fn results(&self) -> Option<TestResults> {
        let ended_at = self.ended_at?;
        let total = self.questions.len();
        if total == 0 {
            return Some(TestResults {
                score: 0,
                correct_count: 0,
                incorrect_count: 0,
                unanswered_count: 0,
                total_questions: 0,
                time_taken_secs: (ended_at - self.started_at).num_seconds().max(0),
                topic_error_rates: Vec::new(),
            });
        }

        let mut correct = 0usize;
        let mut incorrect = 0usize;
        let mut unanswered = 0usize;
        let mut topics: Vec<(String, usize, usize)> = Vec::new();

        for position in 0..total {
            let outcome = self.outcome(position);
            match outcome {
                Outcome::Correct => correct += 1,
                Outcome::Incorrect => incorrect += 1,
                Outcome::Unanswered => unanswered += 1,
            }

            let topic = self.questions[position].topic_segment().to_string();
            let index = match topics.iter().position(|(name, _, _)| *name == topic) {
                Some(index) => index,
                None => {
                    topics.push((topic, 0, 0));
                    topics.len() - 1
                }
            };
            topics[index].1 += 1;
            if outcome == Outcome::Incorrect {
                topics[index].2 += 1;
            }
        }

        let score = ((correct as f64 / total as f64) * 100.0).round() as u32;
        let topic_error_rates = topics
            .into_iter()
            .map(|(topic, questions, errors)| TopicErrorRate {
                topic,
                total: questions,
                incorrect: errors,
                error_rate: ((errors as f64 / questions as f64) * 100.0).round() as u32,
            })
            .collect();

        Some(TestResults {
            score,
            correct_count: correct,
            incorrect_count: incorrect,
            unanswered_count: unanswered,
            total_questions: total,
            time_taken_secs: (ended_at - self.started_at).num_seconds().max(0),
            topic_error_rates,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    Correct,
    Incorrect,
    Unanswered,
}
