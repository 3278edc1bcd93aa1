mod common;

use axum::http::{Method, StatusCode};
use common::{app, error_type, Auth};
use serde_json::json;

#[tokio::test]
async fn health_answers_get_and_head() {
    let app = app();
    let (status, body) = app.get("/health", &Auth::None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "connected");

    let (status, _) = app.send(Method::HEAD, "/v1/ping", &Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_require_credentials() {
    let app = app();
    let (status, body) = app.get("/documents", &Auth::None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_type(&body), "unauthorized");
    assert_eq!(body["error"]["statusCode"], 401);

    let (status, _) = app
        .get("/documents", &Auth::Bearer("not-a-jwt".into()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_issues_a_working_session() {
    let app = app();
    app.session("ada").await;

    let (status, body) = app
        .post(
            "/auth/login",
            &Auth::None,
            json!({ "username": "ADA", "password": common::PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["user"].get("password_hash").is_none());

    let session = Auth::Bearer(body["token"].as_str().unwrap().to_string());
    let (status, me) = app.get("/auth/me", &session).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ada");

    let (status, _) = app
        .post(
            "/auth/login",
            &Auth::None,
            json!({ "username": "ada", "password": "wrong password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn edit_history_and_diff() {
    let app = app();
    let ada = app.session("ada").await;
    let project = app.project(&ada, "DOC").await;
    let id = app.document(&ada, &project, "hello").await;

    let (status, updated) = app
        .put(
            &format!("/documents/{id}"),
            &ada,
            json!({ "content": "hello world" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], "hello world");

    let (status, history) = app.get(&format!("/documents/{id}/versions"), &ada).await;
    assert_eq!(status, StatusCode::OK);
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["label"], "current");
    assert_eq!(entries[0]["content"], "hello world");
    assert_eq!(entries[1]["label"], "v1");
    assert_eq!(entries[1]["version_number"], 1);
    assert_eq!(entries[1]["content"], "hello");
    assert_eq!(entries[1]["created_by_username"], "ada");

    let (status, diff) = app
        .get(&format!("/documents/{id}/versions/current/diff"), &ada)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(diff["compared_to"], "v1");
    assert_eq!(
        diff["segments"],
        json!([
            { "kind": "unchanged", "text": "hello" },
            { "kind": "added", "text": " world" }
        ])
    );

    let (status, body) = app
        .get(&format!("/documents/{id}/versions/latest/diff"), &ada)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn restore_makes_a_new_version() {
    let app = app();
    let ada = app.session("ada").await;
    let project = app.project(&ada, "RST").await;
    let id = app.document(&ada, &project, "one").await;
    app.put(&format!("/documents/{id}"), &ada, json!({ "content": "two" }))
        .await;

    let (_, history) = app.get(&format!("/documents/{id}/versions"), &ada).await;
    let v1 = history[1]["version_id"].as_str().unwrap().to_string();

    let (status, restored) = app
        .post(
            &format!("/documents/{id}/versions/{v1}/restore"),
            &ada,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{restored}");
    assert_eq!(restored["content"], "one");

    let (_, history) = app.get(&format!("/documents/{id}/versions"), &ada).await;
    let labels: Vec<_> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["label"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(labels, ["current", "v2", "v1"]);
    assert_eq!(history[1]["content"], "two");
}

#[tokio::test]
async fn metadata_edits_leave_history_alone() {
    let app = app();
    let ada = app.session("ada").await;
    let project = app.project(&ada, "META").await;
    let id = app.document(&ada, &project, "body").await;

    let (status, _) = app
        .put(
            &format!("/documents/{id}"),
            &ada,
            json!({ "author": "Ada", "version": "1.2" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, history) = app.get(&format!("/documents/{id}/versions"), &ada).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn strangers_read_but_cannot_write() {
    let app = app();
    let ada = app.session("ada").await;
    let grace = app.session("grace").await;
    let project = app.project(&ada, "OWN").await;
    let id = app.document(&ada, &project, "mine").await;

    let (status, _) = app.get(&format!("/documents/{id}"), &grace).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .put(&format!("/documents/{id}"), &grace, json!({ "content": "yours" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error_type(&body), "forbidden");

    let (status, _) = app.delete(&format!("/documents/{id}"), &grace).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/documents",
            &grace,
            json!({ "project_id": project, "type": "tecnica", "title": "Mine", "content": "x" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let app = app();
    let ada = app.session("ada").await;

    let (status, body) = app.get("/documents/not-a-uuid", &ada).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_type(&body), "badRequest");

    let (status, _) = app.get("/documents?page=0", &ada).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .get(&format!("/documents/{}", uuid::Uuid::now_v7()), &ada)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn environment_with_projects_cannot_be_deleted() {
    let app = app();
    let ada = app.session("ada").await;
    let project = app.project(&ada, "ENV").await;
    let (_, body) = app.get(&format!("/projects/{project}"), &ada).await;
    let env = body["environment_id"].as_str().unwrap().to_string();

    let (status, body) = app.delete(&format!("/environments/{env}"), &ada).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(error_type(&body), "preconditionFailed");

    let (status, _) = app.delete(&format!("/projects/{project}"), &ada).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.delete(&format!("/environments/{env}"), &ada).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn project_codes_are_unique_ignoring_case() {
    let app = app();
    let ada = app.session("ada").await;
    app.project(&ada, "WEB").await;

    let (_, env) = app
        .post("/environments", &ada, json!({ "name": "Staging" }))
        .await;
    let (status, body) = app
        .post(
            "/projects",
            &ada,
            json!({ "environment_id": env["id"], "code": "web", "name": "Dup" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_type(&body), "conflict");
}
