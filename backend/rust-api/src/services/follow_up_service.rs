use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TtlCache;
use crate::config::AiConfig;
use crate::error::{is_rate_limit, ServiceError, ServiceResult};
use crate::llm::{with_timeout, ChatModel, ChatRequest, FunctionSpec, LlmError};
use crate::metrics::{record_cache_hit, record_cache_miss, record_llm_call};
use crate::models::follow_up::{FollowUpRequest, TopicFollowUpRequest};

pub const FOLLOW_UP_FALLBACK: &str =
    "Üzgünüm, sorunuzu işlerken bir hata oluştu. Lütfen tekrar deneyin.";

/// Only the most recent turns are replayed to the model.
const HISTORY_LIMIT: usize = 3;
/// Extracted page text shorter than this cannot ground an answer.
const MIN_PAGE_CONTENT_LEN: usize = 50;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static regex");
}

/// Cache key: first 100 chars of context and follow-up, whitespace runs
/// collapsed to hyphens.
fn cache_key(context: &str, follow_up: &str) -> String {
    let head = |s: &str| s.chars().take(100).collect::<String>();
    WHITESPACE
        .replace_all(&format!("{}-{}", head(context), head(follow_up)), "-")
        .into_owned()
}

fn subject_display_name(code: &str) -> &str {
    match code {
        "math" => "Matematik",
        "physics" => "Fizik",
        "chemistry" => "Kimya",
        "biology" => "Biyoloji",
        "social-studies" => "Sosyal Bilgiler",
        "english" => "İngilizce",
        other => other,
    }
}

fn uses_latex(subject: &str) -> bool {
    matches!(subject, "math" | "physics" | "chemistry")
}

pub struct FollowUpService {
    chat: Arc<dyn ChatModel>,
    cache: TtlCache<String>,
    ai: AiConfig,
}

impl FollowUpService {
    pub fn new(chat: Arc<dyn ChatModel>, cache: TtlCache<String>, ai: AiConfig) -> Self {
        Self { chat, cache, ai }
    }

    /// Follow-up about a solved question. Upstream failures degrade to the
    /// fixed apology; only detected rate limits surface as errors.
    pub async fn answer_question_follow_up(&self, req: &FollowUpRequest) -> ServiceResult<String> {
        let key = cache_key(&req.question_text, &req.follow_up_question);
        if let Some(cached) = self.cache.get(&key) {
            record_cache_hit();
            return Ok(cached);
        }
        record_cache_miss();

        let request = ChatRequest {
            model: self.ai.follow_up_model.clone(),
            temperature: self.ai.follow_up_temperature,
            max_tokens: self.ai.follow_up_max_tokens,
            system: None,
            user: build_question_prompt(req),
        };
        let function = follow_up_function();
        let timeout = Duration::from_millis(self.ai.follow_up_timeout_ms);

        match with_timeout(timeout, self.chat.call_function(&request, &function)).await {
            Ok(arguments) => {
                record_llm_call("follow_up", "success");
                let response = arguments
                    .get("response")
                    .and_then(|v| v.as_str())
                    .unwrap_or(FOLLOW_UP_FALLBACK)
                    .to_string();
                self.cache.put(key, response.clone());
                Ok(response)
            }
            Err(e) => self.degrade("follow_up", e),
        }
    }

    /// Follow-up about a textbook page. Grounding content is validated
    /// before any model call.
    pub async fn answer_topic_follow_up(&self, req: &TopicFollowUpRequest) -> ServiceResult<String> {
        let content = req
            .page_content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        if content.is_none() && req.pdf_url.is_none() {
            return Err(ServiceError::Validation(
                "Sayfa içeriği veya PDF URL'si sağlanmadı.".to_string(),
            ));
        }
        let content = match content {
            Some(text) if text.chars().count() >= MIN_PAGE_CONTENT_LEN => text.to_string(),
            Some(_) | None if req.pdf_url.is_some() => format!(
                "PDF sayfası: {} (sayfa {})",
                req.pdf_url.as_deref().unwrap_or_default(),
                req.page_number
            ),
            _ => {
                return Err(ServiceError::Validation(
                    "Sayfa içeriği çok kısa veya boş. Lütfen PDF'in doğru yüklendiğinden emin olun."
                        .to_string(),
                ))
            }
        };

        let key = cache_key(&content, &req.follow_up_question);
        if let Some(cached) = self.cache.get(&key) {
            record_cache_hit();
            return Ok(cached);
        }
        record_cache_miss();

        let request = ChatRequest {
            model: self.ai.follow_up_model.clone(),
            temperature: self.ai.follow_up_temperature,
            max_tokens: self.ai.follow_up_max_tokens,
            system: Some(
                "Sen yardımsever bir öğretmensin. Öğrencilerin sorularını sabırla ve açık bir \
                 şekilde yanıtlıyorsun. Yanıtların kısa, öz ve anlaşılır olmalı. Matematiksel \
                 ifadeleri LaTeX formatında yazmalısın."
                    .to_string(),
            ),
            user: build_topic_prompt(req, &content),
        };
        let timeout = Duration::from_millis(self.ai.follow_up_timeout_ms);

        match with_timeout(timeout, self.chat.complete(&request)).await {
            Ok(answer) => {
                record_llm_call("topic_follow_up", "success");
                self.cache.put(key, answer.clone());
                Ok(answer)
            }
            Err(e) => self.degrade("topic_follow_up", e),
        }
    }

    fn degrade(&self, call_type: &str, error: LlmError) -> ServiceResult<String> {
        if is_rate_limit(&error) {
            record_llm_call(call_type, "rate_limited");
            return Err(ServiceError::RateLimited { source: error });
        }
        record_llm_call(call_type, "error");
        tracing::warn!("{} call failed, serving fallback: {}", call_type, error);
        Ok(FOLLOW_UP_FALLBACK.to_string())
    }
}

fn render_history(turns: &[crate::models::follow_up::ConversationTurn]) -> String {
    let recent: Vec<String> = turns
        .iter()
        .rev()
        .take(HISTORY_LIMIT)
        .rev()
        .map(|turn| format!("Soru: {}\nCevap: {}", turn.question, turn.answer))
        .collect();
    if recent.is_empty() {
        String::new()
    } else {
        format!("\nÖnceki konuşma:\n{}", recent.join("\n\n"))
    }
}

fn build_question_prompt(req: &FollowUpRequest) -> String {
    let hints_block = match &req.hints {
        Some(hints) if !hints.is_empty() => {
            let lines: Vec<String> = hints
                .iter()
                .enumerate()
                .map(|(i, hint)| format!("{}. {}", i + 1, hint))
                .collect();
            format!("İpuçları:\n{}\n\n", lines.join("\n"))
        }
        _ => String::new(),
    };
    let explanation_block = match &req.full_explanation {
        Some(explanation) if !explanation.is_empty() => {
            format!("Tam açıklama:\n{}", explanation)
        }
        _ => String::new(),
    };
    let history = req
        .previous_conversation
        .as_deref()
        .map(render_history)
        .unwrap_or_default();

    format!(
        "Bir öğrenciye {subject} sorusunu anlamasına yardımcı oluyorsun. Kısa ve net yanıt ver.\n\n\
         Soru: {question}\n\n\
         Seçenekler:\n{choices}\n\n\
         Doğru cevap: {correct}\n\n\
         {hints}{explanation}{history}\n\n\
         Öğrencinin yeni sorusu: {follow_up}\n\n\
         Lütfen öğrencinin sorusuna net, anlaşılır ve öğretici şekilde yanıt ver.\n\
         Cevabını Türkçe olarak yaz ve öğrencinin seviyesine uygun bir dil kullan.\n\
         Seçeneklerden bahsederken \"A seçeneği\", \"B seçeneği\" gibi ifadeler kullan.\n\
         Matematiksel ifadeler için \\( ... \\) LaTeX ayraçlarını kullan.\n\
         Cevabın kısa ve öz olsun, gereksiz detaylardan kaçın.",
        subject = req.subject,
        question = req.question_text,
        choices = req.choices.as_deref().unwrap_or("-"),
        correct = req.correct_answer,
        hints = hints_block,
        explanation = explanation_block,
        history = history,
        follow_up = req.follow_up_question,
    )
}

fn build_topic_prompt(req: &TopicFollowUpRequest, content: &str) -> String {
    let history: Vec<String> = req
        .previous_conversation
        .as_deref()
        .unwrap_or_default()
        .iter()
        .rev()
        .take(HISTORY_LIMIT)
        .rev()
        .map(|turn| {
            format!(
                "Öğrenci (Sayfa {} hakkında): {}\nAsistan: {}",
                turn.page_number
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                turn.question,
                turn.answer
            )
        })
        .collect();
    let history_block = if history.is_empty() {
        String::new()
    } else {
        format!("\nÖnceki konuşma:\n{}\n", history.join("\n\n"))
    };

    let latex_block = if uses_latex(&req.subject) {
        "\nMatematiksel ifadeleri LaTeX formatında yazın. Örneğin:\n\
         - Kesirler için: \\(\\frac{a}{b}\\)\n\
         - Üs almak için: \\(a^b\\)\n\
         - Kök almak için: \\(\\sqrt{a}\\)\n\
         - Matematiksel denklemler için \\( ... \\) kullanın.\n\
         - Uzun denklemler için \\[ ... \\] kullanın.\n"
    } else {
        ""
    };

    format!(
        "Sen bir {grade}. sınıf {subject} öğretmenisin. Öğrencinin konuyu anlamasına yardımcı \
         oluyorsun.\n\n\
         Şu anda öğrenci {page}. sayfadaki içeriği inceliyor. Sayfa içeriği:\n\n\
         \"\"\"\n{content}\n\"\"\"\n\
         {history}\n\
         Öğrencinin yeni sorusu: {follow_up}\n\
         {latex}\n\
         Lütfen:\n\
         1. Soruyu sadece bu sayfadaki içeriğe dayanarak yanıtla. Eğer cevap sayfada yoksa, bunu dürüstçe belirt.\n\
         2. Yanıtı öğrencinin seviyesine ({grade}. sınıf) uygun, açık ve anlaşılır bir şekilde ver.\n\
         3. Gerektiğinde örnekler kullanarak açıkla.\n\
         4. Yanıtın kısa ve öz olsun, gereksiz uzatma.\n\n\
         Yanıtı:",
        grade = req.grade,
        subject = subject_display_name(&req.subject),
        page = req.page_number,
        content = content,
        history = history_block,
        follow_up = req.follow_up_question,
        latex = latex_block,
    )
}

fn follow_up_function() -> FunctionSpec {
    FunctionSpec {
        name: "generate_follow_up_response".to_string(),
        description: "Generate a structured follow-up response to a student's question".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "response": {
                    "type": "string",
                    "description": "A helpful, supportive response to the student's question in Turkish"
                }
            },
            "required": ["response"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::follow_up::ConversationTurn;

    #[test]
    fn cache_key_truncates_and_collapses_whitespace() {
        let long = "a".repeat(250);
        let key = cache_key(&long, "neden   böyle\toldu?");
        assert!(key.starts_with(&"a".repeat(100)));
        assert!(key.contains("neden-böyle-oldu?"));
        assert!(!key.contains(' '));
    }

    #[test]
    fn history_keeps_only_last_three_turns() {
        let turns: Vec<ConversationTurn> = (0..5)
            .map(|i| ConversationTurn {
                question: format!("soru {}", i),
                answer: format!("cevap {}", i),
            })
            .collect();
        let rendered = render_history(&turns);
        assert!(!rendered.contains("soru 1"));
        assert!(rendered.contains("soru 2"));
        assert!(rendered.contains("soru 4"));
    }

    #[test]
    fn topic_prompt_includes_latex_for_math_only() {
        let req = TopicFollowUpRequest {
            subject: "math".to_string(),
            grade: "9".to_string(),
            page_number: 12,
            page_content: Some("x".repeat(80)),
            pdf_url: None,
            follow_up_question: "bu nasıl çözülür?".to_string(),
            previous_conversation: None,
        };
        let prompt = build_topic_prompt(&req, req.page_content.as_deref().unwrap());
        assert!(prompt.contains("LaTeX"));
        assert!(prompt.contains("Matematik öğretmenisin"));

        let mut english = req;
        english.subject = "english".to_string();
        let prompt = build_topic_prompt(&english, english.page_content.as_deref().unwrap());
        assert!(!prompt.contains("Kesirler için"));
    }
}
