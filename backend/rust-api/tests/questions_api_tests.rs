use serde_json::json;

mod common;

#[tokio::test]
async fn missing_subject_or_grade_is_rejected() {
    let test_app = common::create_test_app();

    let (status, body) = common::get(&test_app.app, "/api/questions?subject=math").await;
    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("grade"));
}

#[tokio::test]
async fn random_question_has_stable_id() {
    let test_app = common::create_test_app();

    let (status, body) =
        common::get(&test_app.app, "/api/questions?subject=math&grade=9&random=true").await;

    assert_eq!(status, axum::http::StatusCode::OK);
    let question = &body["question"];
    let id = question["id"].as_str().expect("question id");
    assert!(id.starts_with("Math-9-"));
    assert_eq!(question["type"], "multiple-choice");
    // Prep mode grades on the client, so the correct index ships along.
    assert!(question["correctAnswerIndex"].is_number());
}

#[tokio::test]
async fn random_miss_returns_available_summary() {
    let test_app = common::create_test_app();

    let (status, body) = common::get(
        &test_app.app,
        "/api/questions?subject=english&grade=11&random=true",
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(body["requested"]["subject"], "english");
    let available = &body["available"];
    assert_eq!(available["count"], 14);
    assert!(available["subjects"]
        .as_array()
        .unwrap()
        .iter()
        .any(|s| s == "Math"));
    assert!(available["grades"].as_array().unwrap().iter().any(|g| g == "9"));
}

#[tokio::test]
async fn topics_only_lists_unique_topics() {
    let test_app = common::create_test_app();

    let (status, body) = common::get(
        &test_app.app,
        "/api/questions?subject=math&grade=9&topics_only=true",
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    let topics = body["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 2);
    assert!(topics.iter().any(|t| t == "cebir"));
    assert!(topics.iter().any(|t| t == "geometri"));
}

#[tokio::test]
async fn topic_filter_narrows_the_list() {
    let test_app = common::create_test_app();

    let (status, body) = common::get(
        &test_app.app,
        "/api/questions?subject=math&grade=9&topic=cebir",
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 6);
    assert!(questions
        .iter()
        .all(|q| q["id"].as_str().unwrap().contains("-cebir-")));
}

#[tokio::test]
async fn test_mode_mixes_open_ended_by_percentage() {
    let chat = common::StubChat::new(common::Behavior::Content("ok".to_string()));
    let eval = common::StubChat::new(common::Behavior::Content("ok".to_string()));
    let math_rows: Vec<String> = common::default_mc_rows()
        .into_iter()
        .filter(|row| row.starts_with("Math"))
        .collect();
    let test_app = common::build_app(&math_rows, &common::open_ended_rows(5), chat, eval);

    let (status, body) = common::get(
        &test_app.app,
        "/api/questions?subject=math&grade=9&page_mode=test",
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::OK);
    let questions = body["questions"].as_array().unwrap();
    // 12 multiple-choice candidates at 30%: round(3.6) = 4 open-ended,
    // round(8.4) = 8 multiple-choice.
    let open_count = questions
        .iter()
        .filter(|q| q["type"] == "open-ended")
        .count();
    assert_eq!(open_count, 4);
    assert_eq!(questions.len(), 12);
}

#[tokio::test]
async fn prep_mode_uses_lower_open_ended_share() {
    let chat = common::StubChat::new(common::Behavior::Content("ok".to_string()));
    let eval = common::StubChat::new(common::Behavior::Content("ok".to_string()));
    let math_rows: Vec<String> = common::default_mc_rows()
        .into_iter()
        .filter(|row| row.starts_with("Math"))
        .collect();
    let test_app = common::build_app(&math_rows, &common::open_ended_rows(5), chat, eval);

    let (status, body) = common::get(&test_app.app, "/api/questions?subject=math&grade=9").await;

    assert_eq!(status, axum::http::StatusCode::OK);
    let questions = body["questions"].as_array().unwrap();
    // 20%: round(2.4) = 2 open-ended, round(9.6) = 10 multiple-choice.
    let open_count = questions
        .iter()
        .filter(|q| q["type"] == "open-ended")
        .count();
    assert_eq!(open_count, 2);
    assert_eq!(questions.len(), 12);
}

#[tokio::test]
async fn connectivity_check_answers_on_get_and_post() {
    let test_app = common::create_test_app();

    let (status, body) = common::get(&test_app.app, "/api/test").await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = common::post(&test_app.app, "/api/test", json!({ "ping": 1 })).await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["receivedData"]["ping"], 1);
}
