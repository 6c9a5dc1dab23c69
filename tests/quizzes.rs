use std::io::Write;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use coursehub::storage::Disk;
use serde_json::{Value, json};

mod common;
use common::*;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

fn docx(text: &str) -> Vec<u8> {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>{text}</w:t></w:r></w:p>
</w:body></w:document>"#
    );

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(body.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn generate_form(question_count: &'static str) -> MultipartForm {
    MultipartForm::new()
        .add_text("title", "Ownership check")
        .add_text("passing_score", "60")
        .add_text("question_count", question_count)
        .add_text("question_types", "multiple_choice,true_false")
        .add_part(
            "document",
            Part::bytes(docx("Each value in Rust has exactly one owner."))
                .file_name("notes.docx")
                .mime_type(DOCX_MIME),
        )
}

fn true_false(text: &str) -> Value {
    json!({
        "question": text,
        "type": "true_false",
        "answers": [
            { "text": "True", "is_correct": true },
            { "text": "False", "is_correct": false },
        ],
    })
}

fn temp_documents_left(storage: &coursehub::storage::Storage) -> usize {
    std::fs::read_dir(disk_path(storage, Disk::Local, "temp_documents"))
        .map(|dir| dir.count())
        .unwrap_or(0)
}

/// Instructor with a published course holding one lesson, saved as `lesson`.
fn authoring_setup(flow: Flow) -> Flow {
    flow.step(signup_instructor_action("lecturer", "password"))
        .step(create_course_action("course", "Rust Basics", true))
        .step(
            Action::new("lesson_create", "POST", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/courses/{}/lessons", ctx.field("course", "id")))
                .with_body(json!({ "title": "Ownership", "content": "One owner per value." }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("lesson"),
        )
}

fn quizzes_url(ctx: &FlowContext, suffix: &str) -> String {
    format!("/api/v1/lessons/{}/quizzes{}", ctx.field("lesson", "id"), suffix)
}

#[tokio::test]
async fn manual_quiz_flow() {
    let db = setup_test_db().await;
    let mut env = setup_server(db).await;

    authoring_setup(Flow::new())
        .step(
            Action::new("quiz_create", "POST", "dynamic")
                .with_dyn_path(|ctx| quizzes_url(ctx, ""))
                .with_body(json!({
                    "title": "Ownership basics",
                    "passing_score": 50,
                    "time_limit_minutes": 10,
                    "questions": [
                        {
                            "text": "Which keyword moves a closure's captures?",
                            "type": "multiple_choice",
                            "answers": [
                                { "text": "move", "is_correct": true },
                                { "text": "ref" },
                                { "text": "box" },
                            ],
                        },
                        true_false("A value can have two owners."),
                    ],
                }))
                .with_expect(StatusCode::CREATED)
                .with_save_as("quiz")
                .assert_body(|body| {
                    assert!(body.contains(r#""is_correct":true"#));
                    assert!(body.contains(r#""question_type":"multiple_choice""#));
                    assert!(body.contains(r#""order_index":1"#));
                }),
        )
        // a true/false question with three answers rejects the whole quiz
        .step(
            Action::new("quiz_create_bad_true_false", "POST", "dynamic")
                .with_dyn_path(|ctx| quizzes_url(ctx, ""))
                .with_body(json!({
                    "title": "Broken",
                    "passing_score": 50,
                    "questions": [{
                        "text": "Rust is fast.",
                        "type": "true_false",
                        "answers": [
                            { "text": "True", "is_correct": true },
                            { "text": "False" },
                            { "text": "Maybe" },
                        ],
                    }],
                }))
                .with_expect(StatusCode::UNPROCESSABLE_ENTITY)
                .assert_body(|body| assert!(body.contains(r#""field":"questions""#))),
        )
        .step(
            Action::new("quiz_create_no_correct", "POST", "dynamic")
                .with_dyn_path(|ctx| quizzes_url(ctx, ""))
                .with_body(json!({
                    "title": "Broken",
                    "passing_score": 50,
                    "questions": [{
                        "text": "Pick one",
                        "type": "multiple_choice",
                        "answers": [{ "text": "a" }, { "text": "b" }],
                    }],
                }))
                .with_expect(StatusCode::UNPROCESSABLE_ENTITY),
        )
        .step(
            Action::new("question_replace", "PUT", "dynamic")
                .with_dyn_path(|ctx| {
                    let question = ctx.get("quiz")["questions"][1]["id"].as_str().unwrap().to_string();
                    format!("/api/v1/quizzes/{}/questions/{question}", ctx.field("quiz", "id"))
                })
                .with_body(true_false("Ownership is checked at compile time."))
                .assert_body(|body| {
                    assert!(body.contains("compile time"));
                    assert!(body.contains(r#""order_index":1"#));
                }),
        )
        // enrolled students see the quiz without the answers
        .step(signup_action("learner", "password").with_clear_cookies(true))
        .step(
            Action::new("quiz_get_not_enrolled", "GET", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/quizzes/{}", ctx.field("quiz", "id")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(
            Action::new("enroll", "POST", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/courses/{}/enroll", ctx.field("course", "id")))
                .with_expect(StatusCode::CREATED),
        )
        .step(
            Action::new("quiz_get_student", "GET", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/quizzes/{}", ctx.field("quiz", "id")))
                .assert_body(|body| {
                    assert!(body.contains("compile time"));
                    assert!(!body.contains("is_correct"));
                }),
        )
        .step(
            Action::new("quiz_delete_student", "DELETE", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/quizzes/{}", ctx.field("quiz", "id")))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .step(signin_action("lecturer", "password").with_clear_cookies(true))
        .step(
            Action::new("quiz_get_owner", "GET", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/quizzes/{}", ctx.field("quiz", "id")))
                .assert_body(|body| assert!(body.contains(r#""is_correct":false"#))),
        )
        .step(
            Action::new("quiz_delete", "DELETE", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/quizzes/{}", ctx.field("quiz", "id"))),
        )
        .step(
            Action::new("quiz_get_deleted", "GET", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/quizzes/{}", ctx.field("quiz", "id")))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut env)
        .await;
}

#[tokio::test]
async fn generated_quiz_is_truncated_to_the_requested_count() {
    let db = setup_test_db().await;
    let mut env = setup_server(db).await;

    let drafts: Vec<Value> = (1..=7)
        .map(|i| true_false(&format!("Statement number {i} is true.")))
        .collect();
    env.set_generator_reply(format!("```json\n{}\n```", Value::Array(drafts)));

    authoring_setup(Flow::new())
        .step(
            Action::new("quiz_generate", "POST", "dynamic")
                .with_dyn_path(|ctx| quizzes_url(ctx, "/generate"))
                .with_multipart(|_| generate_form("5"))
                .with_expect(StatusCode::CREATED)
                .assert_body(|body| {
                    assert!(body.contains("Ownership check"));
                    assert!(body.contains("Statement number 5"));
                    assert!(!body.contains("Statement number 6"));
                    assert!(body.contains(r#""passing_score":60"#));
                })
                .assert_storage(|_, storage| assert_eq!(temp_documents_left(storage), 0)),
        )
        // out of range count never reaches the generator
        .step(
            Action::new("quiz_generate_too_many", "POST", "dynamic")
                .with_dyn_path(|ctx| quizzes_url(ctx, "/generate"))
                .with_multipart(|_| generate_form("31"))
                .with_expect(StatusCode::UNPROCESSABLE_ENTITY)
                .assert_body(|body| assert!(body.contains(r#""field":"question_count""#)))
                .assert_storage(|_, storage| assert_eq!(temp_documents_left(storage), 0)),
        )
        .step(
            Action::new("quiz_generate_without_document", "POST", "dynamic")
                .with_dyn_path(|ctx| quizzes_url(ctx, "/generate"))
                .with_multipart(|_| {
                    MultipartForm::new()
                        .add_text("title", "No document")
                        .add_text("passing_score", "60")
                        .add_text("question_count", "5")
                })
                .with_expect(StatusCode::UNPROCESSABLE_ENTITY)
                .assert_body(|body| assert!(body.contains(r#""field":"document""#))),
        )
        .step(
            Action::new("quiz_generate_wrong_kind", "POST", "dynamic")
                .with_dyn_path(|ctx| quizzes_url(ctx, "/generate"))
                .with_multipart(|_| {
                    MultipartForm::new()
                        .add_text("title", "Spreadsheet")
                        .add_text("passing_score", "60")
                        .add_part(
                            "document",
                            Part::bytes(b"a,b,c".to_vec())
                                .file_name("notes.csv")
                                .mime_type("text/csv"),
                        )
                })
                .with_expect(StatusCode::UNPROCESSABLE_ENTITY)
                .assert_body(|body| assert!(body.contains(r#""field":"document""#))),
        )
        // students can't generate
        .step(signup_action("learner", "password").with_clear_cookies(true))
        .step(
            Action::new("quiz_generate_student", "POST", "dynamic")
                .with_dyn_path(|ctx| quizzes_url(ctx, "/generate"))
                .with_multipart(|_| generate_form("5"))
                .with_expect(StatusCode::FORBIDDEN),
        )
        .run(&mut env)
        .await;
}

#[tokio::test]
async fn malformed_generator_output_is_rejected() {
    let db = setup_test_db().await;
    let mut env = setup_server(db).await;
    env.set_generator_reply("Sure! Here are some questions: 1. What is ownership?");

    authoring_setup(Flow::new())
        .step(
            Action::new("quiz_generate_malformed", "POST", "dynamic")
                .with_dyn_path(|ctx| quizzes_url(ctx, "/generate"))
                .with_multipart(|_| generate_form("5"))
                .with_expect(StatusCode::UNPROCESSABLE_ENTITY)
                .assert_body(|body| assert!(body.contains(r#""field":"document""#)))
                .assert_storage(|_, storage| assert_eq!(temp_documents_left(storage), 0)),
        )
        .step(
            Action::new("lesson_get", "GET", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/lessons/{}", ctx.field("lesson", "id"))),
        )
        .run(&mut env)
        .await;
}
