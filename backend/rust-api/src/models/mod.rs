use serde::{Deserialize, Serialize};

/// A question served to students. The two variants carry their own grading
/// data; `correct_answer_index`/`correct_answer` must never reach a client
/// before submission (see `QuestionView`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Question {
    MultipleChoice(MultipleChoiceQuestion),
    OpenEnded(OpenEndedQuestion),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceQuestion {
    pub id: String,
    pub subject: String,
    pub grade: String,
    pub topic: String,
    pub text: String,
    /// Up to five options, ordered a..e.
    pub options: Vec<String>,
    pub correct_answer_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenEndedQuestion {
    pub id: String,
    pub subject: String,
    pub grade: String,
    pub topic: String,
    pub text: String,
    /// Reference answer, used only to build grading prompts.
    pub correct_answer: String,
}

impl Question {
    pub fn id(&self) -> &str {
        match self {
            Question::MultipleChoice(q) => &q.id,
            Question::OpenEnded(q) => &q.id,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Question::MultipleChoice(q) => &q.text,
            Question::OpenEnded(q) => &q.text,
        }
    }

    pub fn is_open_ended(&self) -> bool {
        matches!(self, Question::OpenEnded(_))
    }

    /// Topic as encoded in the id's third hyphen-delimited segment.
    pub fn topic_segment(&self) -> &str {
        self.id().split('-').nth(2).unwrap_or("unknown")
    }
}

/// Client-facing projection of a question with all grading data stripped.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionView {
    MultipleChoice {
        id: String,
        text: String,
        options: Vec<String>,
    },
    OpenEnded {
        id: String,
        text: String,
    },
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        match question {
            Question::MultipleChoice(q) => QuestionView::MultipleChoice {
                id: q.id.clone(),
                text: q.text.clone(),
                options: q.options.clone(),
            },
            Question::OpenEnded(q) => QuestionView::OpenEnded {
                id: q.id.clone(),
                text: q.text.clone(),
            },
        }
    }
}

/// Summary of what the bank holds, returned alongside 404s so a client can
/// tell an empty bank apart from a bad filter.
#[derive(Debug, Clone, Serialize)]
pub struct AvailableSummary {
    pub subjects: Vec<String>,
    pub grades: Vec<String>,
    pub count: usize,
}

pub mod follow_up;
pub mod hint;
pub mod session;
