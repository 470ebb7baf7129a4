use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::{
    AvailableSummary, MultipleChoiceQuestion, OpenEndedQuestion, Question,
};

/// One row of the multiple-choice CSV bank.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvQuestionRow {
    pub subject: String,
    pub grade: String,
    pub topic: String,
    pub question: String,
    pub correct_answer: String,
    #[serde(default)]
    pub choice_a: String,
    #[serde(default)]
    pub choice_b: String,
    #[serde(default)]
    pub choice_c: String,
    #[serde(default)]
    pub choice_d: String,
    #[serde(default)]
    pub choice_e: String,
}

impl CsvQuestionRow {
    /// Options in order, with empty trailing choices dropped.
    pub fn options(&self) -> Vec<String> {
        let mut options = vec![
            self.choice_a.clone(),
            self.choice_b.clone(),
            self.choice_c.clone(),
            self.choice_d.clone(),
            self.choice_e.clone(),
        ];
        while options.last().is_some_and(|o| o.trim().is_empty()) {
            options.pop();
        }
        options
    }

    /// Answer letter a..e to index; unknown letters fall back to 0.
    pub fn answer_index(&self) -> usize {
        match self.correct_answer.trim().to_lowercase().as_str() {
            "b" => 1,
            "c" => 2,
            "d" => 3,
            "e" => 4,
            _ => 0,
        }
    }
}

/// One entry of the open-ended JSON bank.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenEndedRow {
    pub subject: String,
    pub grade: String,
    pub topic: String,
    pub question: String,
    pub correct_answer: String,
}

/// Map UI subject codes to the labels used inside the bank files. Unknown
/// codes pass through unchanged.
pub fn map_subject(code: &str) -> &str {
    match code {
        "math" => "Math",
        "physics" => "Fizik",
        "chemistry" => "Kimya",
        "biology" => "Biyoloji",
        "social-studies" => "Sosyal Bilimler",
        "english" => "İngilizce",
        other => other,
    }
}

/// Stable question id: `{subject}-{grade}-{topic}-{hash6}` with a base-36
/// rendering of a 32-bit rolling hash over the question text. A pure
/// function of its inputs; hash collisions are a documented limitation.
pub fn question_id(subject: &str, grade: &str, topic: &str, text: &str) -> String {
    format!("{}-{}-{}-{}", subject, grade, topic, question_hash(text))
}

fn question_hash(text: &str) -> String {
    let mut hash: i32 = 0;
    for unit in text.encode_utf16() {
        hash = hash.wrapping_mul(31).wrapping_add(unit as i32);
    }
    let positive = (hash as i64).unsigned_abs();
    let encoded = to_base36(positive);
    encoded.chars().take(6).collect()
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ascii")
}

struct CacheSlot<T> {
    rows: Option<T>,
    read_at: Option<Instant>,
}

impl<T> CacheSlot<T> {
    fn empty() -> Self {
        Self {
            rows: None,
            read_at: None,
        }
    }
}

/// TTL-cached reader over the CSV (multiple-choice) and JSON (open-ended)
/// bank files. A failed read or parse logs the error and serves the last
/// known-good rows, or nothing; callers never see an error.
pub struct QuestionBank {
    csv_path: PathBuf,
    open_ended_path: PathBuf,
    ttl: Duration,
    mc_cache: Mutex<CacheSlot<Vec<CsvQuestionRow>>>,
    open_cache: Mutex<CacheSlot<Vec<OpenEndedRow>>>,
}

impl QuestionBank {
    pub fn new(
        csv_path: impl Into<PathBuf>,
        open_ended_path: impl Into<PathBuf>,
        ttl: Duration,
    ) -> Self {
        Self {
            csv_path: csv_path.into(),
            open_ended_path: open_ended_path.into(),
            ttl,
            mc_cache: Mutex::new(CacheSlot::empty()),
            open_cache: Mutex::new(CacheSlot::empty()),
        }
    }

    pub fn load_multiple_choice(&self) -> Vec<CsvQuestionRow> {
        let mut slot = self.mc_cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(rows) = Self::fresh(&slot, self.ttl) {
            return rows;
        }

        match Self::read_csv(&self.csv_path) {
            Ok(rows) => {
                slot.rows = Some(rows.clone());
                slot.read_at = Some(Instant::now());
                rows
            }
            Err(e) => {
                tracing::error!(
                    "failed to read question bank {}: {}",
                    self.csv_path.display(),
                    e
                );
                slot.rows.clone().unwrap_or_default()
            }
        }
    }

    pub fn load_open_ended(&self) -> Vec<OpenEndedRow> {
        let mut slot = self.open_cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(rows) = Self::fresh(&slot, self.ttl) {
            return rows;
        }

        match Self::read_open_ended(&self.open_ended_path) {
            Ok(rows) => {
                slot.rows = Some(rows.clone());
                slot.read_at = Some(Instant::now());
                rows
            }
            Err(e) => {
                tracing::warn!(
                    "failed to read open-ended bank {}: {}",
                    self.open_ended_path.display(),
                    e
                );
                slot.rows.clone().unwrap_or_default()
            }
        }
    }

    fn fresh<T: Clone>(slot: &CacheSlot<T>, ttl: Duration) -> Option<T> {
        match (&slot.rows, slot.read_at) {
            (Some(rows), Some(read_at)) if read_at.elapsed() < ttl => Some(rows.clone()),
            _ => None,
        }
    }

    fn read_csv(path: &Path) -> anyhow::Result<Vec<CsvQuestionRow>> {
        let data = std::fs::read_to_string(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data.as_bytes());
        let mut rows = Vec::new();
        for record in reader.deserialize::<CsvQuestionRow>() {
            rows.push(record?);
        }
        Ok(rows)
    }

    fn read_open_ended(path: &Path) -> anyhow::Result<Vec<OpenEndedRow>> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Unique topics (first-seen order) for a subject and grade.
    pub fn topics(&self, subject: &str, grade: &str) -> Vec<String> {
        let mapped = map_subject(subject);
        let mut topics: Vec<String> = Vec::new();
        for row in self.load_multiple_choice() {
            if row.subject == mapped && row.grade == grade && !topics.contains(&row.topic) {
                topics.push(row.topic);
            }
        }
        topics
    }

    /// What the bank holds overall; used in 404 payloads.
    pub fn available_summary(&self) -> AvailableSummary {
        let rows = self.load_multiple_choice();
        let mut subjects: Vec<String> = Vec::new();
        let mut grades: Vec<String> = Vec::new();
        for row in &rows {
            if !subjects.contains(&row.subject) {
                subjects.push(row.subject.clone());
            }
            if !grades.contains(&row.grade) {
                grades.push(row.grade.clone());
            }
        }
        AvailableSummary {
            subjects,
            grades,
            count: rows.len(),
        }
    }
}

pub fn mc_question_from_row(row: &CsvQuestionRow) -> Question {
    Question::MultipleChoice(MultipleChoiceQuestion {
        id: question_id(&row.subject, &row.grade, &row.topic, &row.question),
        subject: row.subject.clone(),
        grade: row.grade.clone(),
        topic: row.topic.clone(),
        text: row.question.clone(),
        options: row.options(),
        correct_answer_index: row.answer_index(),
    })
}

pub fn open_question_from_row(row: &OpenEndedRow) -> Question {
    Question::OpenEnded(OpenEndedQuestion {
        id: question_id(&row.subject, &row.grade, &row.topic, &row.question),
        subject: row.subject.clone(),
        grade: row.grade.clone(),
        topic: row.topic.clone(),
        text: row.question.clone(),
        correct_answer: row.correct_answer.clone(),
    })
}
