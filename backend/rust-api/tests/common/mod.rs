#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use etutabi_api::config::{
    AiConfig, BankConfig, CacheConfig, Config, MixConfig, TestConfig,
};
use etutabi_api::llm::{ChatModel, ChatRequest, FunctionSpec, LlmError};
use etutabi_api::{create_router, AppState};

/// Canned chat backend. Counts calls so tests can assert how many times the
/// upstream was actually hit.
pub struct StubChat {
    behavior: Behavior,
    calls: AtomicUsize,
}

pub enum Behavior {
    /// `call_function` returns this value; `complete` returns it stringified.
    Function(Value),
    /// `complete` returns this string.
    Content(String),
    Error { status: u16, body: String },
    /// Sleep before answering, to out-wait configured timeouts.
    Delay(Duration),
}

impl StubChat {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for StubChat {
    async fn call_function(
        &self,
        _request: &ChatRequest,
        _function: &FunctionSpec,
    ) -> Result<Value, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Function(value) => Ok(value.clone()),
            Behavior::Content(content) => Ok(json!({ "response": content })),
            Behavior::Error { status, body } => Err(LlmError::Status {
                status: *status,
                body: body.clone(),
            }),
            Behavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(json!({ "response": "late" }))
            }
        }
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Function(value) => Ok(value.to_string()),
            Behavior::Content(content) => Ok(content.clone()),
            Behavior::Error { status, body } => Err(LlmError::Status {
                status: *status,
                body: body.clone(),
            }),
            Behavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("late".to_string())
            }
        }
    }
}

pub struct TestApp {
    pub app: Router,
    pub chat: Arc<StubChat>,
    pub eval_chat: Arc<StubChat>,
    // Holds the bank and hint-store files alive for the test's duration.
    _dir: tempfile::TempDir,
}

pub const CSV_HEADER: &str =
    "subject,grade,topic,question,correct_answer,choice_a,choice_b,choice_c,choice_d,choice_e";

/// Twelve math rows plus two physics rows.
pub fn default_mc_rows() -> Vec<String> {
    let mut rows: Vec<String> = (0..12)
        .map(|i| {
            format!(
                "Math,9,{},{} sayısının karesi kaçtır?,b,{},{},{},{},",
                if i % 2 == 0 { "cebir" } else { "geometri" },
                i,
                i,
                i * i,
                i + 1,
                i + 2
            )
        })
        .collect();
    rows.push("Fizik,9,hareket,Hız birimi nedir?,a,m/s,kg,N,J,".to_string());
    rows.push("Fizik,9,kuvvet,Kuvvet birimi nedir?,c,kg,J,N,W,".to_string());
    rows
}

pub fn open_ended_rows(count: usize) -> String {
    let rows: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{"subject":"Math","grade":"9","topic":"cebir","question":"{} sayısını açıklayın","correct_answer":"örnek cevap {}"}}"#,
                i, i
            )
        })
        .collect();
    format!("[{}]", rows.join(","))
}

pub fn test_config(dir: &std::path::Path) -> Config {
    Config {
        port: 0,
        bank: BankConfig {
            csv_path: dir.join("qa_bank.csv").to_string_lossy().into_owned(),
            open_ended_path: dir.join("open_ended.json").to_string_lossy().into_owned(),
            hints_path: dir.join("hints.json").to_string_lossy().into_owned(),
        },
        ai: AiConfig {
            api_key: Some("test-key".to_string()),
            base_url: "http://127.0.0.1:0".to_string(),
            alt_api_key: None,
            alt_base_url: "http://127.0.0.1:0".to_string(),
            hints_model: "test-model".to_string(),
            follow_up_model: "test-model".to_string(),
            evaluation_model: "test-model".to_string(),
            hints_temperature: 0.2,
            follow_up_temperature: 0.3,
            evaluation_temperature: 0.2,
            hints_max_tokens: 800,
            follow_up_max_tokens: 400,
            evaluation_max_tokens: 800,
            hints_timeout_ms: 200,
            follow_up_timeout_ms: 200,
            evaluation_timeout_ms: 200,
            client_timeout_ms: 1000,
        },
        cache: CacheConfig {
            questions_ttl_secs: 300,
            hints_ttl_secs: 600,
            follow_up_ttl_secs: 1800,
            recent_questions_max: 20,
        },
        mix: MixConfig {
            prep_open_ended_percent: 20,
            test_open_ended_percent: 30,
        },
        test: TestConfig {
            questions_per_test: 10,
            time_warning_secs: 900,
            max_test_secs: 1200,
        },
    }
}

pub fn build_app(
    mc_rows: &[String],
    open_ended_json: &str,
    chat: Arc<StubChat>,
    eval_chat: Arc<StubChat>,
) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");

    let csv_path = dir.path().join("qa_bank.csv");
    let mut file = std::fs::File::create(&csv_path).expect("create csv");
    writeln!(file, "{}", CSV_HEADER).expect("write header");
    for row in mc_rows {
        writeln!(file, "{}", row).expect("write row");
    }
    std::fs::write(dir.path().join("open_ended.json"), open_ended_json).expect("write open-ended");

    let config = test_config(dir.path());
    let state = Arc::new(AppState::with_chat_models(
        config,
        chat.clone(),
        eval_chat.clone(),
    ));

    TestApp {
        app: create_router(state),
        chat,
        eval_chat,
        _dir: dir,
    }
}

/// App over the default bank with well-behaved stub models.
pub fn create_test_app() -> TestApp {
    let chat = StubChat::new(Behavior::Function(json!({
        "logical_steps": ["Adım 1", "Adım 2", "Adım 3"],
        "explanation": "Detaylı açıklama.",
        "common_misconceptions": ["Sık yapılan hata."],
        "response": "Yardımcı yanıt.",
    })));
    let eval_chat = StubChat::new(Behavior::Content(
        r#"{"isCorrect": 1, "explanation": "Doğru cevap."}"#.to_string(),
    ));
    build_app(&default_mc_rows(), "[]", chat, eval_chat)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}
