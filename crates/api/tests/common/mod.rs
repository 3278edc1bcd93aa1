#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use docshelf_api::config::AppConfig;
use docshelf_api::state::AppState;
use docshelf_core::source::{
    ProviderKind, RepoSummary, SourceFile, SourceProvider, SpecEnhancer,
};
use docshelf_core::store::memory::MemoryStore;
use docshelf_core::{CoreError, CoreResult, Shelf};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

/// How a request authenticates.
#[derive(Debug, Clone)]
pub enum Auth {
    None,
    Bearer(String),
    ApiKey(String),
}

pub struct TestApp {
    pub router: Router,
    pub shelf: Shelf,
}

/// Serves a single annotated repository.
pub struct FakeGitHub;

#[async_trait]
impl SourceProvider for FakeGitHub {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GitHub
    }

    async fn list_repos(&self, token: &str) -> CoreResult<Vec<RepoSummary>> {
        if token != "gh-token" {
            return Err(CoreError::Upstream("github answered 401".into()));
        }
        Ok(vec![RepoSummary {
            owner: "acme".into(),
            name: "shop".into(),
            full_name: "acme/shop".into(),
            default_branch: "main".into(),
            private: false,
            description: None,
        }])
    }

    async fn fetch_sources(
        &self,
        _token: &str,
        _owner: &str,
        repo: &str,
        _branch: Option<&str>,
    ) -> CoreResult<Vec<SourceFile>> {
        if repo == "empty" {
            return Ok(vec![SourceFile {
                path: "src/index.js".into(),
                content: "console.log('hi');".into(),
            }]);
        }
        Ok(vec![SourceFile {
            path: "src/pets.js".into(),
            content: [
                "/**",
                " * @swagger",
                " * /pets:",
                " *   get:",
                " *     summary: List pets",
                " *     responses:",
                " *       '200':",
                " *         description: OK",
                " */",
                "router.get('/pets', list);",
            ]
            .join("\n"),
        }])
    }
}

/// Adds a top-level description.
pub struct DescribingEnhancer;

#[async_trait]
impl SpecEnhancer for DescribingEnhancer {
    async fn enhance(&self, title: &str, spec: &Value) -> CoreResult<Value> {
        let mut spec = spec.clone();
        spec["info"]["description"] = json!(format!("Enhanced docs for {title}"));
        Ok(spec)
    }
}

pub fn app() -> TestApp {
    let config = AppConfig::for_memory();
    let shelf = docshelf_api::shelf_builder(&config, Arc::new(MemoryStore::new()))
        .provider(Arc::new(FakeGitHub))
        .enhancer(Arc::new(DescribingEnhancer))
        .build();
    let state = AppState::new(shelf.clone(), config);
    TestApp {
        router: docshelf_api::app(state),
        shelf,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        auth: &Auth,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        builder = match auth {
            Auth::None => builder,
            Auth::Bearer(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            Auth::ApiKey(key) => builder.header("x-api-key", key.as_str()),
        };
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, auth: &Auth) -> (StatusCode, Value) {
        self.send(Method::GET, uri, auth, None).await
    }

    pub async fn post(&self, uri: &str, auth: &Auth, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, auth, Some(body)).await
    }

    pub async fn put(&self, uri: &str, auth: &Auth, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, auth, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, auth: &Auth) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, auth, None).await
    }

    /// Register a user and return a session for them.
    pub async fn session(&self, username: &str) -> Auth {
        let (status, body) = self
            .post(
                "/auth/register",
                &Auth::None,
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        Auth::Bearer(body["token"].as_str().unwrap().to_string())
    }

    /// An environment plus a project in it; returns the project id.
    pub async fn project(&self, auth: &Auth, code: &str) -> String {
        let (status, env) = self
            .post(
                "/environments",
                auth,
                json!({ "name": format!("env-{code}") }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{env}");
        let (status, project) = self
            .post(
                "/projects",
                auth,
                json!({
                    "environment_id": env["id"],
                    "code": code,
                    "name": format!("Project {code}"),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{project}");
        project["id"].as_str().unwrap().to_string()
    }

    pub async fn document(&self, auth: &Auth, project_id: &str, content: &str) -> String {
        let (status, doc) = self
            .post(
                "/documents",
                auth,
                json!({
                    "project_id": project_id,
                    "type": "tecnica",
                    "title": "Guide",
                    "content": content,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{doc}");
        doc["id"].as_str().unwrap().to_string()
    }
}

/// The `error.type` of an error body.
pub fn error_type(body: &Value) -> &str {
    body["error"]["type"].as_str().unwrap_or_default()
}
