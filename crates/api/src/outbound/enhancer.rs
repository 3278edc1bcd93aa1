use async_trait::async_trait;
use docshelf_core::source::SpecEnhancer;
use docshelf_core::{CoreError, CoreResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ensure_success, upstream};

const SERVICE: &str = "enhancer";

const INSTRUCTIONS: &str = "You improve OpenAPI 3 documents. Add missing summaries, \
descriptions, parameter descriptions and examples. Never remove or rename paths, \
operations or schemas. Answer with the complete document as a single JSON object.";

/// Chat-completions style endpoint that rewrites a spec.
#[derive(Debug, Clone)]
pub struct HttpEnhancer {
    http: Client,
    url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// The document in the first choice. Models sometimes fence their JSON.
fn parse_reply(reply: ChatResponse) -> CoreResult<Value> {
    let content = reply
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| CoreError::Upstream("enhancer returned no content".into()))?;
    let body = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(body)
        .map_err(|e| CoreError::Upstream(format!("enhancer returned invalid JSON: {e}")))
}

impl HttpEnhancer {
    pub fn new(
        http: Client,
        url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            api_key,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SpecEnhancer for HttpEnhancer {
    async fn enhance(&self, title: &str, spec: &Value) -> CoreResult<Value> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: INSTRUCTIONS.into(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Document \"{title}\":\n{spec}"),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut call = self.http.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }
        let response = call.send().await.map_err(|e| upstream(SERVICE, e))?;
        let reply: ChatResponse = ensure_success(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| upstream(SERVICE, e))?;
        let enhanced = parse_reply(reply)?;
        tracing::debug!(%title, model = %self.model, "spec enhanced");
        Ok(enhanced)
    }
}
