use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AiConfig;
use crate::llm::{with_timeout, ChatModel, ChatRequest, FunctionSpec};
use crate::metrics::{record_cache_hit, record_cache_miss, record_llm_call, HINTS_SERVED_TOTAL};
use crate::models::hint::{GenerateHintsRequest, HintRecord};
use crate::storage::HintStore;

const MIN_STEPS: usize = 3;
const MAX_STEPS: usize = 8;
const MIN_MISCONCEPTIONS: usize = 1;
const MAX_MISCONCEPTIONS: usize = 2;

const DEFAULT_HINT: &str = "Bu soru için adım adım çözümü yüklerken bir sorun oluştu.";
const DEFAULT_EXPLANATION: &str = "Açıklama yüklenirken bir sorun oluştu. Lütfen tekrar deneyin.";

pub struct HintService {
    store: Arc<HintStore>,
    chat: Arc<dyn ChatModel>,
    ai: AiConfig,
}

impl HintService {
    pub fn new(store: Arc<HintStore>, chat: Arc<dyn ChatModel>, ai: AiConfig) -> Self {
        Self { store, chat, ai }
    }

    pub fn lookup(&self, question_id: &str) -> Option<HintRecord> {
        self.store.get(question_id)
    }

    /// Read-through generation: a stored record wins without touching the
    /// network; otherwise the model is asked once and whatever comes back
    /// (or the fallback) is persisted so the next call short-circuits.
    /// Upstream failures never surface to the caller.
    pub async fn get_or_generate(&self, req: &GenerateHintsRequest) -> HintRecord {
        if let Some(existing) = self.store.get(&req.question_id) {
            record_cache_hit();
            HINTS_SERVED_TOTAL.with_label_values(&["store"]).inc();
            return existing;
        }
        record_cache_miss();

        let record = match self.generate(req).await {
            Ok(record) => {
                record_llm_call("hints", "success");
                HINTS_SERVED_TOTAL.with_label_values(&["generated"]).inc();
                record
            }
            Err(e) => {
                record_llm_call("hints", "error");
                HINTS_SERVED_TOTAL.with_label_values(&["fallback"]).inc();
                tracing::warn!(
                    "hint generation failed for {}, persisting fallback: {}",
                    req.question_id,
                    e
                );
                self.default_record(req)
            }
        };

        self.store.insert(record.clone());
        record
    }

    async fn generate(&self, req: &GenerateHintsRequest) -> Result<HintRecord, crate::llm::LlmError> {
        let request = ChatRequest {
            model: self.ai.hints_model.clone(),
            temperature: self.ai.hints_temperature,
            max_tokens: self.ai.hints_max_tokens,
            system: None,
            user: build_prompt(req),
        };
        let function = explanation_function();

        let timeout = Duration::from_millis(self.ai.hints_timeout_ms);
        let arguments =
            with_timeout(timeout, self.chat.call_function(&request, &function)).await?;

        let steps = string_array(&arguments, "logical_steps");
        let misconceptions = string_array(&arguments, "common_misconceptions");
        let explanation = arguments
            .get("explanation")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_EXPLANATION)
            .to_string();

        Ok(HintRecord {
            question_id: req.question_id.clone(),
            subject: req.subject.clone(),
            steps: if steps.is_empty() {
                vec![DEFAULT_HINT.to_string()]
            } else {
                steps
            },
            full_explanation: explanation,
            misconceptions,
        })
    }

    fn default_record(&self, req: &GenerateHintsRequest) -> HintRecord {
        HintRecord {
            question_id: req.question_id.clone(),
            subject: req.subject.clone(),
            steps: vec![DEFAULT_HINT.to_string()],
            full_explanation: DEFAULT_EXPLANATION.to_string(),
            misconceptions: vec![],
        }
    }
}

/// Render options as "A) ..." lines, matching how they are shown on screen.
pub fn lettered_options(options: &[String]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}) {}", option_letter(i), option))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn option_letter(index: usize) -> char {
    (b'A' + (index as u8).min(25)) as char
}

fn build_prompt(req: &GenerateHintsRequest) -> String {
    format!(
        "Bir {subject} sorusunu çözmeye yardımcı olacaksın.\n\n\
         Soru: {question}\n\n\
         Seçenekler:\n{options}\n\n\
         Doğru cevap: {correct}\n\n\
         Lütfen öğrenciye yardımcı olmak için:\n\
         1. Soruyu çözmek için gereken mantıksal adımları listele (en az {min_steps}, en fazla {max_steps} adım)\n\
         2. Detaylı bir açıklama yaz (öğrencinin seviyesine uygun)\n\
         3. Bu konuda öğrencilerin sıkça yaptığı {min_mis}-{max_mis} hatayı belirt\n\n\
         Yanıtını Türkçe olarak ver ve öğretici bir dil kullan.",
        subject = req.subject,
        question = req.question_text,
        options = lettered_options(&req.options),
        correct = option_letter(req.correct_answer_index),
        min_steps = MIN_STEPS,
        max_steps = MAX_STEPS,
        min_mis = MIN_MISCONCEPTIONS,
        max_mis = MAX_MISCONCEPTIONS,
    )
}

fn explanation_function() -> FunctionSpec {
    FunctionSpec {
        name: "generate_explanation".to_string(),
        description: "Generate a structured explanation for a question with logical steps, \
                      detailed explanation, and common misconceptions"
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "logical_steps": {
                    "type": "array",
                    "description": format!(
                        "{}-{} clear, step-by-step instructions to teach a student to solve the problem",
                        MIN_STEPS, MAX_STEPS
                    ),
                    "items": { "type": "string" }
                },
                "explanation": {
                    "type": "string",
                    "description": "A detailed explanation of the solution in Turkish, suitable for the student's level."
                },
                "common_misconceptions": {
                    "type": "array",
                    "description": format!(
                        "{}-{} common mistakes or misconceptions students might have about this problem",
                        MIN_MISCONCEPTIONS, MAX_MISCONCEPTIONS
                    ),
                    "items": { "type": "string" }
                }
            },
            "required": ["logical_steps", "explanation"]
        }),
    }
}

fn string_array(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}
