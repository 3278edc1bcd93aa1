mod common;

use axum::http::StatusCode;
use common::{app, error_type, Auth, TestApp};
use serde_json::{json, Value};

fn petstore() -> Value {
    json!({
        "openapi": "3.0.0",
        "info": { "title": "Pets", "version": "1.0.0" },
        "paths": {
            "/pets": {
                "get": {
                    "summary": "List pets",
                    "responses": { "200": { "description": "OK" } }
                }
            }
        }
    })
}

async fn spec(app: &TestApp, auth: &Auth) -> String {
    let (status, body) = app
        .post(
            "/api-specs",
            auth,
            json!({ "name": "Pets", "spec_content": petstore() }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["source_type"], "json");
    body["id"].as_str().unwrap().to_string()
}

fn summaries(history: &Value) -> Vec<String> {
    history
        .as_array()
        .unwrap()
        .iter()
        .skip(1)
        .map(|e| e["change_summary"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn operation_edits_are_versioned() {
    let app = app();
    let ada = app.session("ada").await;
    let id = spec(&app, &ada).await;
    let ops = format!("/api-specs/{id}/operations");

    let (status, body) = app
        .post(
            &ops,
            &ada,
            json!({
                "path": "/pets",
                "method": "post",
                "summary": "Create pet",
                "responses": [{ "code": "201", "description": "Created" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(
        body["spec_content"]["paths"]["/pets"]["post"]["summary"],
        "Create pet"
    );

    let (status, body) = app
        .put(
            &ops,
            &ada,
            json!({
                "original": { "path": "/pets", "method": "post" },
                "path": "/animals",
                "method": "post",
                "summary": "Create animal",
                "responses": [{ "code": "201", "description": "Created" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["spec_content"]["paths"]["/pets"].get("post").is_none());
    assert_eq!(
        body["spec_content"]["paths"]["/animals"]["post"]["summary"],
        "Create animal"
    );

    let (status, body) = app
        .delete(&format!("{ops}?path=/pets&method=get"), &ada)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["spec_content"]["paths"].get("/pets").is_none());

    let (_, history) = app.get(&format!("/api-specs/{id}/versions"), &ada).await;
    assert_eq!(
        summaries(&history),
        [
            "Deleted GET /pets",
            "Moved POST /pets to POST /animals",
            "Added POST /pets",
        ]
    );
}

#[tokio::test]
async fn conflicting_operation_changes_nothing() {
    let app = app();
    let ada = app.session("ada").await;
    let id = spec(&app, &ada).await;

    let (status, body) = app
        .post(
            &format!("/api-specs/{id}/operations"),
            &ada,
            json!({ "path": "/pets", "method": "GET" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_type(&body), "conflict");

    let (status, _) = app
        .post(
            &format!("/api-specs/{id}/operations"),
            &ada,
            json!({ "path": "/pets", "method": "fetch" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, history) = app.get(&format!("/api-specs/{id}/versions"), &ada).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn history_keeps_four_versions() {
    let app = app();
    let ada = app.session("ada").await;
    let id = spec(&app, &ada).await;

    for n in 1..=6 {
        let mut content = petstore();
        content["info"]["version"] = json!(format!("1.0.{n}"));
        let (status, body) = app
            .put(
                &format!("/api-specs/{id}"),
                &ada,
                json!({ "spec_content": content, "change_summary": format!("rev {n}") }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let (_, history) = app.get(&format!("/api-specs/{id}/versions"), &ada).await;
    let numbers: Vec<_> = history
        .as_array()
        .unwrap()
        .iter()
        .skip(1)
        .map(|e| e["version_number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, [6, 5, 4, 3]);
    assert_eq!(history[0]["spec_content"]["info"]["version"], "1.0.6");

    let oldest = history[4]["version_id"].as_str().unwrap().to_string();
    let (status, version) = app
        .get(&format!("/api-specs/{id}/versions/{oldest}"), &ada)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(version["spec_content"]["info"]["version"], "1.0.2");

    let (status, restored) = app
        .post(
            &format!("/api-specs/{id}/versions/{oldest}/restore"),
            &ada,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["spec_content"]["info"]["version"], "1.0.2");
}

#[tokio::test]
async fn invalid_content_is_rejected() {
    let app = app();
    let ada = app.session("ada").await;
    let (status, body) = app
        .post(
            "/api-specs",
            &ada,
            json!({ "name": "Broken", "spec_content": { "paths": [] } }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn swagger_comments_become_a_spec() {
    let app = app();
    let ada = app.session("ada").await;
    let source = "/**\n * @openapi\n * /orders:\n *   get:\n *     summary: List orders\n *     responses:\n *       '200':\n *         description: OK\n */";
    let (status, body) = app
        .post(
            "/api-specs",
            &ada,
            json!({
                "name": "Orders",
                "source_type": "swagger-comments",
                "source_code": source
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["source_type"], "swagger-comments");
    assert_eq!(body["spec_content"]["info"]["title"], "Orders");
    assert_eq!(
        body["spec_content"]["paths"]["/orders"]["get"]["summary"],
        "List orders"
    );
}

#[tokio::test]
async fn enhancement_is_a_versioned_update() {
    let app = app();
    let ada = app.session("ada").await;
    let id = spec(&app, &ada).await;

    let (status, body) = app
        .post(&format!("/api-specs/{id}/enhance"), &ada, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["spec_content"]["info"]["description"],
        "Enhanced docs for Pets"
    );

    let (_, history) = app.get(&format!("/api-specs/{id}/versions"), &ada).await;
    assert_eq!(summaries(&history), ["Enhanced documentation"]);
}

#[tokio::test]
async fn unassigned_filter_and_detach() {
    let app = app();
    let ada = app.session("ada").await;
    let project = app.project(&ada, "API").await;
    let loose = spec(&app, &ada).await;
    let (_, attached) = app
        .post(
            "/api-specs",
            &ada,
            json!({ "name": "Attached", "project_id": project, "spec_content": petstore() }),
        )
        .await;

    let (_, listed) = app.get("/api-specs?unassigned=true", &ada).await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["id"], loose.as_str());

    let (_, listed) = app
        .get(&format!("/api-specs?project_id={project}"), &ada)
        .await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["id"], attached["id"]);

    // Deleting the project detaches its specs.
    app.delete(&format!("/projects/{project}"), &ada).await;
    let (_, listed) = app.get("/api-specs?unassigned=true", &ada).await;
    assert_eq!(listed["total"], 2);
}
