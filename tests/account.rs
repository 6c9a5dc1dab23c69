use axum::http::StatusCode;
use coursehub::web::UserRole;
use serde_json::json;

mod common;
use common::*;

#[tokio::test]
async fn account_flow() {
    let db = setup_test_db().await;
    db.seed_user("admin", "admin", UserRole::Admin).await;
    let mut env = setup_server(db).await;

    Flow::new()
        // signup: cookie issued, role defaults to student
        .step(
            signup_action("foobar", "password")
                .assert_cookie("SID", |cookie| {
                    assert!(cookie.http_only().unwrap_or(false));
                })
                .assert_body(|body| {
                    assert!(body.contains(r#""role":"student""#));
                    assert!(!body.contains("password"));
                })
                .with_save_as("foobar_user"),
        )
        .step(Action::new("verify", "GET", "/api/v1/account/verify"))
        // same name again
        .step(
            signup_action("foobar", "password")
                .with_clear_cookies(true)
                .with_expect(StatusCode::CONFLICT),
        )
        // nobody signs up as admin
        .step(
            Action::new("signup_admin", "POST", "/api/v1/account/signup")
                .with_body(json!({
                    "username": "sneaky",
                    "password": "password",
                    "role": "admin",
                }))
                .with_expect(StatusCode::BAD_REQUEST),
        )
        .step(
            signup_action("ab", "password")
                .with_expect(StatusCode::UNPROCESSABLE_ENTITY)
                .assert_body(|body| assert!(body.contains(r#""field":"username""#))),
        )
        .step(
            signup_instructor_action("lecturer", "password")
                .with_clear_cookies(true)
                .assert_body(|body| assert!(body.contains(r#""role":"instructor""#))),
        )
        // wrong password
        .step(
            signin_action("foobar", "not-the-password")
                .with_clear_cookies(true)
                .with_expect(StatusCode::UNAUTHORIZED),
        )
        .step(
            Action::new("verify_anonymous", "GET", "/api/v1/account/verify")
                .with_expect(StatusCode::UNAUTHORIZED),
        )
        .step(signin_action("foobar", "password"))
        // students can't list users
        .step(
            Action::new("user_list", "GET", "/api/v1/account/page")
                .with_expect(StatusCode::FORBIDDEN),
        )
        // rename self
        .step(
            Action::new("user_rename", "PUT", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/account/{}", ctx.field("foobar_user", "id")))
                .with_body(json!({ "username": "FOOBAR2" }))
                .assert_body(|body| assert!(body.contains("FOOBAR2"))),
        )
        // the name of another user is taken
        .step(
            Action::new("user_rename_conflict", "PUT", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/account/{}", ctx.field("foobar_user", "id")))
                .with_body(json!({ "username": "lecturer" }))
                .with_expect(StatusCode::CONFLICT),
        )
        .step(
            signin_action("lecturer", "password")
                .with_clear_cookies(true)
                .with_save_as("lecturer_user"),
        )
        // renaming somebody else
        .step(
            Action::new("user_rename_other", "PUT", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/account/{}", ctx.field("foobar_user", "id")))
                .with_body(json!({ "username": "hijacked" }))
                .with_expect(StatusCode::FORBIDDEN),
        )
        // admin sees everybody and may rename anyone
        .step(signin_admin_action())
        .step(
            Action::new("user_list", "GET", "/api/v1/account/page")
                .with_param("limit", "10")
                .assert_body(|body| {
                    assert!(body.contains("FOOBAR2"));
                    assert!(body.contains("lecturer"));
                    assert!(body.contains(r#""total":3"#));
                }),
        )
        .step(
            Action::new("user_rename_by_admin", "PUT", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/account/{}", ctx.field("lecturer_user", "id")))
                .with_body(json!({ "username": "professor" }))
                .assert_body(|body| {
                    assert!(body.contains("professor"));
                    assert!(body.contains(r#""role":"instructor""#));
                }),
        )
        .step(
            Action::new("user_delete", "DELETE", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/account/{}", ctx.field("foobar_user", "id"))),
        )
        .step(
            Action::new("user_delete_again", "DELETE", "dynamic")
                .with_dyn_path(|ctx| format!("/api/v1/account/{}", ctx.field("foobar_user", "id")))
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut env)
        .await;
}
