use rand::seq::{IndexedRandom, SliceRandom};
use std::sync::Arc;

use crate::cache::RecentQuestionCache;
use crate::config::MixConfig;
use crate::models::Question;
use crate::services::question_bank::{
    map_subject, mc_question_from_row, open_question_from_row, QuestionBank,
};

/// Selection context: practice pages and timed tests mix open-ended
/// questions at different rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionMode {
    Prep,
    Test,
}

impl SelectionMode {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("test") => SelectionMode::Test,
            _ => SelectionMode::Prep,
        }
    }
}

/// Filters the bank by subject/grade/topic and mixes question types by the
/// configured percentage. Selection is uniform without replacement followed
/// by a full shuffle.
#[derive(Clone)]
pub struct QuestionSelector {
    bank: Arc<QuestionBank>,
    recent: RecentQuestionCache,
    mix: MixConfig,
}

impl QuestionSelector {
    pub fn new(bank: Arc<QuestionBank>, recent: RecentQuestionCache, mix: MixConfig) -> Self {
        Self { bank, recent, mix }
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    fn filtered_multiple_choice(
        &self,
        subject: &str,
        grade: &str,
        topic: Option<&str>,
    ) -> Vec<Question> {
        let mapped = map_subject(subject);
        self.bank
            .load_multiple_choice()
            .iter()
            .filter(|row| row.subject == mapped && row.grade == grade)
            .filter(|row| match topic {
                Some(topic) => row.topic.eq_ignore_ascii_case(topic),
                None => true,
            })
            .map(mc_question_from_row)
            .collect()
    }

    fn filtered_open_ended(
        &self,
        subject: &str,
        grade: &str,
        topic: Option<&str>,
    ) -> Vec<Question> {
        let mapped = map_subject(subject);
        self.bank
            .load_open_ended()
            .iter()
            .filter(|row| row.subject == mapped && row.grade == grade)
            .filter(|row| match topic {
                Some(topic) => row.topic.eq_ignore_ascii_case(topic),
                None => true,
            })
            .map(open_question_from_row)
            .collect()
    }

    /// Desired counts for a mix: both are computed against the
    /// multiple-choice total, then capped by availability.
    fn mix_counts(&self, mc_total: usize, open_total: usize, mode: SelectionMode) -> (usize, usize) {
        let pct = match mode {
            SelectionMode::Prep => self.mix.prep_open_ended_percent,
            SelectionMode::Test => self.mix.test_open_ended_percent,
        } as f64;

        let base = mc_total as f64;
        let want_open = ((base * pct / 100.0).round() as usize).min(open_total);
        let want_mc = ((base * (100.0 - pct) / 100.0).round() as usize).min(mc_total);
        (want_mc, want_open)
    }

    pub fn select(
        &self,
        subject: &str,
        grade: &str,
        topic: Option<&str>,
        mode: SelectionMode,
    ) -> Vec<Question> {
        let mc = self.filtered_multiple_choice(subject, grade, topic);
        let open = self.filtered_open_ended(subject, grade, topic);

        // One side empty: hand back the other unmixed.
        if mc.is_empty() {
            return open;
        }
        if open.is_empty() {
            return mc;
        }

        let (want_mc, want_open) = self.mix_counts(mc.len(), open.len(), mode);
        if want_open == 0 {
            return mc;
        }

        let mut rng = rand::rng();
        let mut selected: Vec<Question> = mc
            .choose_multiple(&mut rng, want_mc)
            .cloned()
            .collect();
        selected.extend(open.choose_multiple(&mut rng, want_open).cloned());
        selected.shuffle(&mut rng);
        selected
    }

    /// One random multiple-choice question, avoiding recently served ids
    /// when other candidates exist. Served questions are recorded; a
    /// recorded entry is released (consumed) once every candidate has been
    /// seen recently.
    pub fn random_question(&self, subject: &str, grade: &str) -> Option<Question> {
        let candidates = self.filtered_multiple_choice(subject, grade, None);
        if candidates.is_empty() {
            return None;
        }

        let mut rng = rand::rng();
        let recent_ids = self.recent.recent_ids(subject, grade);
        let fresh: Vec<&Question> = candidates
            .iter()
            .filter(|q| !recent_ids.contains(q.id()))
            .collect();

        let chosen = if fresh.is_empty() {
            self.recent.take_oldest(subject, grade);
            candidates.choose(&mut rng)?.clone()
        } else {
            (*fresh.choose(&mut rng)?).clone()
        };

        self.recent.put(subject, grade, &chosen);
        Some(chosen)
    }
}
