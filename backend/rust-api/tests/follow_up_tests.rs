use serde_json::json;
use std::time::{Duration, Instant};

mod common;

fn follow_up_body(question: &str, follow_up: &str) -> serde_json::Value {
    json!({
        "questionText": question,
        "choices": "A) 2\nB) 4\nC) 6\nD) 8",
        "correctAnswer": "B) 4",
        "hints": ["İlk adım", "İkinci adım"],
        "fullExplanation": "Denklemden x = 4 bulunur.",
        "followUpQuestion": follow_up,
        "subject": "math",
        "previousConversation": [
            { "question": "neden 4?", "answer": "çünkü 2x = 8" }
        ],
    })
}

#[tokio::test]
async fn follow_up_returns_model_response() {
    let test_app = common::create_test_app();

    let (status, body) = common::post(
        &test_app.app,
        "/api/follow-up",
        follow_up_body("2x + 5 = 13 ise x kaçtır?", "neden b seçeneği?"),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["response"], "Yardımcı yanıt.");
    assert_eq!(test_app.chat.calls(), 1);
}

#[tokio::test]
async fn repeated_follow_up_is_served_from_cache() {
    let test_app = common::create_test_app();

    let body = follow_up_body("2x + 5 = 13 ise x kaçtır?", "neden b seçeneği?");
    let (status, first) = common::post(&test_app.app, "/api/follow-up", body.clone()).await;
    assert_eq!(status, axum::http::StatusCode::OK);

    let (status, second) = common::post(&test_app.app, "/api/follow-up", body).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(first["response"], second["response"]);
    assert_eq!(test_app.chat.calls(), 1);
}

#[tokio::test]
async fn slow_upstream_still_answers_with_fallback() {
    let chat = common::StubChat::new(common::Behavior::Delay(Duration::from_millis(800)));
    let eval = common::StubChat::new(common::Behavior::Content("{}".to_string()));
    let test_app = common::build_app(&common::default_mc_rows(), "[]", chat, eval);

    let started = Instant::now();
    let (status, body) = common::post(
        &test_app.app,
        "/api/follow-up",
        follow_up_body("soru", "takip sorusu"),
    )
    .await;

    // The configured timeout is 200ms; the endpoint must answer well before
    // the stub's 800ms sleep settles.
    assert_eq!(status, axum::http::StatusCode::OK);
    assert!(started.elapsed() < Duration::from_millis(700));
    assert!(body["response"].as_str().unwrap().contains("Üzgünüm"));
}

#[tokio::test]
async fn upstream_error_degrades_to_apology() {
    let chat = common::StubChat::new(common::Behavior::Error {
        status: 500,
        body: "internal".to_string(),
    });
    let eval = common::StubChat::new(common::Behavior::Content("{}".to_string()));
    let test_app = common::build_app(&common::default_mc_rows(), "[]", chat, eval);

    let (status, body) = common::post(
        &test_app.app,
        "/api/follow-up",
        follow_up_body("soru", "takip"),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert!(body["response"].as_str().unwrap().contains("Üzgünüm"));
}

#[tokio::test]
async fn rate_limited_upstream_maps_to_429() {
    let chat = common::StubChat::new(common::Behavior::Error {
        status: 429,
        body: "rate limit exceeded".to_string(),
    });
    let eval = common::StubChat::new(common::Behavior::Content("{}".to_string()));
    let test_app = common::build_app(&common::default_mc_rows(), "[]", chat, eval);

    let (status, body) = common::post(
        &test_app.app,
        "/api/follow-up",
        follow_up_body("soru", "takip"),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("limiti"));
}

#[tokio::test]
async fn missing_required_fields_return_400() {
    let test_app = common::create_test_app();

    let (status, _) = common::post(
        &test_app.app,
        "/api/follow-up",
        json!({ "questionText": "soru", "subject": "math" }),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(test_app.chat.calls(), 0);
}

fn topic_body(page_content: Option<String>, pdf_url: Option<&str>) -> serde_json::Value {
    json!({
        "subject": "math",
        "grade": "9",
        "pageNumber": 42,
        "pageContent": page_content,
        "pdfUrl": pdf_url,
        "followUpQuestion": "kesirler nasıl toplanır?",
        "previousConversation": [
            { "question": "önceki soru", "answer": "önceki cevap", "pageNumber": 41 }
        ],
    })
}

#[tokio::test]
async fn topic_follow_up_answers_with_page_number() {
    let chat = common::StubChat::new(common::Behavior::Content(
        "Paydalar eşitlenir, paylar toplanır.".to_string(),
    ));
    let eval = common::StubChat::new(common::Behavior::Content("{}".to_string()));
    let test_app = common::build_app(&common::default_mc_rows(), "[]", chat, eval);

    let (status, body) = common::post(
        &test_app.app,
        "/api/topic-follow-up",
        topic_body(Some("kesir ".repeat(20)), None),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["answer"], "Paydalar eşitlenir, paylar toplanır.");
    assert_eq!(body["pageNumber"], 42);
}

#[tokio::test]
async fn topic_follow_up_without_content_or_pdf_is_rejected() {
    let test_app = common::create_test_app();

    let (status, body) = common::post(
        &test_app.app,
        "/api/topic-follow-up",
        topic_body(None, None),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("PDF"));
    assert_eq!(test_app.chat.calls(), 0);
}

#[tokio::test]
async fn short_page_content_without_pdf_is_rejected() {
    let test_app = common::create_test_app();

    let (status, _) = common::post(
        &test_app.app,
        "/api/topic-follow-up",
        topic_body(Some("çok kısa".to_string()), None),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(test_app.chat.calls(), 0);
}

#[tokio::test]
async fn short_content_with_pdf_reference_is_accepted() {
    let test_app = common::create_test_app();

    let (status, body) = common::post(
        &test_app.app,
        "/api/topic-follow-up",
        topic_body(Some("kısa".to_string()), Some("https://example.com/kitap.pdf")),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert!(body["answer"].is_string());
}

#[tokio::test]
async fn evaluate_answer_grades_with_the_eval_model() {
    let test_app = common::create_test_app();

    let (status, body) = common::post(
        &test_app.app,
        "/api/evaluate-answer",
        json!({
            "questionId": "Math-9-cebir-abc123",
            "questionText": "Fotosentez nedir?",
            "studentAnswer": "Bitkilerin besin üretmesi",
            "correctAnswer": "Işık enerjisiyle besin üretimi",
        }),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["isCorrect"], 1);
    assert_eq!(body["questionId"], "Math-9-cebir-abc123");
    assert_eq!(test_app.eval_chat.calls(), 1);
    assert_eq!(test_app.chat.calls(), 0);
}

#[tokio::test]
async fn evaluate_answer_propagates_upstream_failure() {
    let chat = common::StubChat::new(common::Behavior::Content("ok".to_string()));
    let eval = common::StubChat::new(common::Behavior::Error {
        status: 503,
        body: "unavailable".to_string(),
    });
    let test_app = common::build_app(&common::default_mc_rows(), "[]", chat, eval);

    let (status, body) = common::post(
        &test_app.app,
        "/api/evaluate-answer",
        json!({
            "questionText": "soru",
            "studentAnswer": "cevap",
            "correctAnswer": "doğru cevap",
        }),
    )
    .await;

    // Evaluation is the one flow where upstream failures surface.
    assert_eq!(status, axum::http::StatusCode::BAD_GATEWAY);
    assert!(body["details"].as_str().unwrap().contains("503"));
}
