//! Add, edit, move and delete single operations in an OpenAPI document.
//!
//! Every function takes the document by reference and returns an edited
//! copy; the input is never mutated, so discarding the result is a cancel.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::openapi::{HttpMethod, OpenApiDocument, Operation, OperationKey};

#[derive(Debug, Error)]
pub enum EditError {
    #[error("malformed spec: {0}")]
    Malformed(String),

    #[error("invalid path {0:?}: paths must start with '/'")]
    InvalidPath(String),

    #[error("operation {} {path} already exists", .method.as_upper())]
    OperationExists { path: String, method: HttpMethod },

    #[error("operation {} {path} does not exist", .method.as_upper())]
    OperationMissing { path: String, method: HttpMethod },

    #[error("response code {0:?} appears more than once")]
    DuplicateResponseCode(String),

    #[error("invalid response code {0:?}")]
    InvalidResponseCode(String),
}

/// One row of the responses list in the editing form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub code: String,
    #[serde(default)]
    pub description: String,
}

/// The editable fields of an operation, as held by the editing form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(default)]
    pub request_body: Option<Value>,
    #[serde(default)]
    pub responses: Vec<ResponseEntry>,
    #[serde(default)]
    pub security: Option<Vec<Value>>,
}

impl OperationFields {
    /// Take the editable fields out of an existing operation.
    pub fn from_operation(operation: &Operation) -> Self {
        Self {
            summary: operation.summary.clone(),
            description: operation.description.clone(),
            tags: operation.tags.clone().unwrap_or_default(),
            parameters: operation.parameters.clone().unwrap_or_default(),
            request_body: operation.request_body.clone(),
            responses: operation
                .responses
                .iter()
                .flatten()
                .map(|(code, response)| ResponseEntry {
                    code: code.clone(),
                    description: response
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect(),
            security: operation.security.clone(),
        }
    }

    /// Build the operation object, starting from `base` so that fields and
    /// response bodies the form does not edit are kept.
    pub fn into_operation(self, base: Option<&Operation>) -> Result<Operation, EditError> {
        let mut operation = base.cloned().unwrap_or_default();
        let previous_responses = operation.responses.take().unwrap_or_default();

        let mut responses = Map::new();
        for entry in self.responses {
            let code = entry.code.trim().to_string();
            if !is_valid_response_code(&code) {
                return Err(EditError::InvalidResponseCode(code));
            }
            if responses.contains_key(&code) {
                return Err(EditError::DuplicateResponseCode(code));
            }
            let mut response = match previous_responses.get(&code) {
                Some(Value::Object(existing)) => existing.clone(),
                _ => Map::new(),
            };
            response.insert("description".into(), Value::String(entry.description));
            responses.insert(code, Value::Object(response));
        }

        operation.summary = non_blank(self.summary);
        operation.description = non_blank(self.description);
        let tags: Vec<String> = self
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        operation.tags = present_unless_empty(tags, operation.tags.is_some());
        operation.parameters =
            present_unless_empty(self.parameters, operation.parameters.is_some());
        operation.request_body = self.request_body;
        operation.responses = Some(responses);
        operation.security = self.security;
        Ok(operation)
    }
}

/// `default`, a three digit status, or a range like `2XX`.
fn is_valid_response_code(code: &str) -> bool {
    if code == "default" {
        return true;
    }
    let bytes = code.as_bytes();
    if bytes.len() != 3 || !(b'1'..=b'5').contains(&bytes[0]) {
        return false;
    }
    let tail = &bytes[1..];
    tail.iter().all(u8::is_ascii_digit) || tail.iter().all(|b| *b == b'X' || *b == b'x')
}

/// An empty list is written only when the operation already carried one.
fn present_unless_empty<T>(items: Vec<T>, was_present: bool) -> Option<Vec<T>> {
    (was_present || !items.is_empty()).then_some(items)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_path(path: &str) -> Result<(), EditError> {
    if path.starts_with('/') && !path.chars().any(char::is_whitespace) {
        Ok(())
    } else {
        Err(EditError::InvalidPath(path.to_string()))
    }
}

/// Insert a new operation. Fails if `(path, method)` is already taken.
pub fn add_operation(
    spec: &OpenApiDocument,
    key: &OperationKey,
    fields: OperationFields,
) -> Result<OpenApiDocument, EditError> {
    validate_path(&key.path)?;
    if spec.operation(key).is_some() {
        return Err(EditError::OperationExists {
            path: key.path.clone(),
            method: key.method,
        });
    }
    let operation = fields.into_operation(None)?;
    let mut edited = spec.clone();
    edited.path_entry(&key.path).insert(key.method, operation)?;
    Ok(edited)
}

/// Replace the operation at `original`, moving it to `updated` when the path
/// or method changed. A move never overwrites another operation and never
/// leaves an empty path behind.
pub fn edit_operation(
    spec: &OpenApiDocument,
    original: &OperationKey,
    updated: &OperationKey,
    fields: OperationFields,
) -> Result<OpenApiDocument, EditError> {
    validate_path(&updated.path)?;
    let existing = spec
        .operation(original)
        .ok_or_else(|| EditError::OperationMissing {
            path: original.path.clone(),
            method: original.method,
        })?;
    let operation = fields.into_operation(Some(existing))?;

    let mut edited = spec.clone();
    if original == updated {
        edited.path_entry(&updated.path).insert(updated.method, operation)?;
        return Ok(edited);
    }

    if spec.operation(updated).is_some() {
        return Err(EditError::OperationExists {
            path: updated.path.clone(),
            method: updated.method,
        });
    }
    edited.path_entry(&updated.path).insert(updated.method, operation)?;
    remove_and_collapse(&mut edited, original);
    Ok(edited)
}

/// Remove an operation; removing one that does not exist is a no-op.
/// Returns the edited copy and whether anything was removed.
pub fn delete_operation(spec: &OpenApiDocument, key: &OperationKey) -> (OpenApiDocument, bool) {
    let mut edited = spec.clone();
    let removed = remove_and_collapse(&mut edited, key);
    (edited, removed)
}

/// Dropping the last operation removes the whole path key, path-level
/// fields included.
fn remove_and_collapse(spec: &mut OpenApiDocument, key: &OperationKey) -> bool {
    let Some(item) = spec.path_mut(&key.path) else {
        return false;
    };
    let removed = item.remove(key.method).is_some();
    if item.is_empty() {
        spec.remove_path(&key.path);
    }
    removed
}
