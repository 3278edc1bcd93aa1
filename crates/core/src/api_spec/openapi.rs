//! A validated view over the parts of an OpenAPI document that the editor
//! touches (`paths` → method → operation). Everything else is carried in
//! passthrough maps so unknown fields survive a round trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::editor::EditError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    /// The lowercase key used inside a path item.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
            HttpMethod::Trace => "trace",
        }
    }

    pub fn as_upper(&self) -> String {
        self.as_str().to_ascii_uppercase()
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown http method {s:?}"))
    }
}

/// Location of one operation inside `paths`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    pub path: String,
    pub method: HttpMethod,
}

impl OperationKey {
    pub fn new(path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_upper(), self.path)
    }
}

/// An operation object. Fields the editor does not model stay in `extra`;
/// optional lists stay absent when the stored operation had none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    /// Status code → response object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A path item kept exactly as stored. Operations are parsed for lookup,
/// but only the ones written through [`PathItem::insert`] are re-encoded, so
/// untouched operations and path-level fields keep their JSON and key
/// spelling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathItem {
    fields: Map<String, Value>,
    /// Parsed operations in document order, with the key that holds each.
    operations: Vec<(String, HttpMethod, Operation)>,
}

impl PathItem {
    pub fn get(&self, method: HttpMethod) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|(_, m, _)| *m == method)
            .map(|(_, _, op)| op)
    }

    /// Replace the operation stored for `method` under its existing key, or
    /// add it under the lowercase method name.
    pub fn insert(&mut self, method: HttpMethod, operation: Operation) -> Result<(), EditError> {
        let value =
            serde_json::to_value(&operation).map_err(|e| EditError::Malformed(e.to_string()))?;
        match self.operations.iter_mut().find(|(_, m, _)| *m == method) {
            Some((key, _, slot)) => {
                *slot = operation;
                self.fields.insert(key.clone(), value);
            }
            None => {
                let key = method.as_str().to_string();
                self.fields.insert(key.clone(), value);
                self.operations.push((key, method, operation));
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, method: HttpMethod) -> Option<Operation> {
        let index = self.operations.iter().position(|(_, m, _)| *m == method)?;
        let (key, _, operation) = self.operations.remove(index);
        self.fields = std::mem::take(&mut self.fields)
            .into_iter()
            .filter(|(k, _)| *k != key)
            .collect();
        Some(operation)
    }

    /// No operations left. Path-level fields do not count.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn methods(&self) -> impl Iterator<Item = HttpMethod> + '_ {
        self.operations.iter().map(|(_, m, _)| *m)
    }

    /// A path-level field such as `parameters` or `servers`.
    pub fn field(&self, key: &str) -> Option<&Value> {
        if self.operations.iter().any(|(k, _, _)| k == key) {
            return None;
        }
        self.fields.get(key)
    }

    fn from_value(path: &str, value: Value) -> Result<Self, EditError> {
        let Value::Object(fields) = value else {
            return Err(EditError::Malformed(format!("path item {path} is not an object")));
        };
        let mut operations = Vec::new();
        for (key, value) in &fields {
            let Ok(method) = key.parse::<HttpMethod>() else {
                continue;
            };
            let operation = serde_json::from_value(value.clone()).map_err(|e| {
                EditError::Malformed(format!(
                    "operation {} {path} is invalid: {e}",
                    method.as_upper()
                ))
            })?;
            operations.push((key.clone(), method, operation));
        }
        Ok(Self { fields, operations })
    }

    fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// An OpenAPI document split into the typed `paths` tree and the untouched
/// remainder of the root object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenApiDocument {
    pub paths: Vec<(String, PathItem)>,
    root: Map<String, Value>,
}

impl OpenApiDocument {
    pub fn from_value(value: Value) -> Result<Self, EditError> {
        let Value::Object(mut root) = value else {
            return Err(EditError::Malformed("spec content must be a JSON object".into()));
        };
        let paths = match root.get_mut("paths").map(Value::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(paths)) => paths
                .into_iter()
                .map(|(path, item)| PathItem::from_value(&path, item).map(|item| (path, item)))
                .collect::<Result<_, _>>()?,
            Some(_) => return Err(EditError::Malformed("`paths` must be an object".into())),
        };
        Ok(Self { paths, root })
    }

    pub fn into_value(self) -> Result<Value, EditError> {
        let paths: Map<String, Value> = self
            .paths
            .into_iter()
            .map(|(path, item)| (path, item.into_value()))
            .collect();
        let mut root = self.root;
        // Re-inserting an existing key keeps its position in the root object.
        root.insert("paths".to_string(), Value::Object(paths));
        Ok(Value::Object(root))
    }

    pub fn path(&self, path: &str) -> Option<&PathItem> {
        self.paths.iter().find(|(p, _)| p == path).map(|(_, item)| item)
    }

    pub fn path_mut(&mut self, path: &str) -> Option<&mut PathItem> {
        self.paths
            .iter_mut()
            .find(|(p, _)| p == path)
            .map(|(_, item)| item)
    }

    /// Get or create the item for `path`, appending new paths at the end.
    pub fn path_entry(&mut self, path: &str) -> &mut PathItem {
        let index = match self.paths.iter().position(|(p, _)| p == path) {
            Some(index) => index,
            None => {
                self.paths.push((path.to_string(), PathItem::default()));
                self.paths.len() - 1
            }
        };
        &mut self.paths[index].1
    }

    pub fn remove_path(&mut self, path: &str) -> Option<PathItem> {
        let index = self.paths.iter().position(|(p, _)| p == path)?;
        Some(self.paths.remove(index).1)
    }

    pub fn operation(&self, key: &OperationKey) -> Option<&Operation> {
        self.path(&key.path)?.get(key.method)
    }

    pub fn operation_keys(&self) -> Vec<OperationKey> {
        self.paths
            .iter()
            .flat_map(|(path, item)| {
                item.methods()
                    .map(move |method| OperationKey::new(path.clone(), method))
            })
            .collect()
    }

    pub fn root_field(&self, key: &str) -> Option<&Value> {
        if key == "paths" {
            return None;
        }
        self.root.get(key)
    }

    pub fn root_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": { "title": "Pets", "version": "1.0.0" },
            "paths": {
                "/pets": {
                    "parameters": [{ "name": "tenant", "in": "header" }],
                    "get": {
                        "summary": "List pets",
                        "operationId": "listPets",
                        "responses": { "200": { "description": "ok", "content": {} } }
                    }
                }
            },
            "x-internal": true
        })
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let doc = OpenApiDocument::from_value(petstore()).unwrap();
        let item = doc.path("/pets").unwrap();
        assert!(item.field("parameters").is_some());
        assert!(item.field("get").is_none());
        let op = doc
            .operation(&OperationKey::new("/pets", HttpMethod::Get))
            .unwrap();
        assert_eq!(op.extra["operationId"], "listPets");
        assert_eq!(doc.into_value().unwrap(), petstore());
    }

    #[test]
    fn writing_one_operation_leaves_its_neighbours_alone() {
        let stored = json!({
            "paths": {
                "/x": { "GET": { "summary": "s", "tags": [] } },
                "/y": { "get": { "parameters": [], "responses": {} } }
            }
        });
        let mut doc = OpenApiDocument::from_value(stored.clone()).unwrap();
        let op = Operation {
            summary: Some("create".into()),
            ..Default::default()
        };
        doc.path_entry("/y").insert(HttpMethod::Post, op).unwrap();

        let value = doc.into_value().unwrap();
        assert_eq!(value["paths"]["/x"], stored["paths"]["/x"]);
        assert_eq!(value["paths"]["/y"]["get"], stored["paths"]["/y"]["get"]);
        assert_eq!(value["paths"]["/y"]["post"], json!({ "summary": "create" }));
    }

    #[test]
    fn replacing_keeps_the_stored_key_spelling() {
        let mut doc = OpenApiDocument::from_value(json!({
            "paths": { "/x": { "GET": { "summary": "old" } } }
        }))
        .unwrap();
        let key = OperationKey::new("/x", HttpMethod::Get);
        assert_eq!(doc.operation(&key).unwrap().summary.as_deref(), Some("old"));

        let op = Operation {
            summary: Some("new".into()),
            ..Default::default()
        };
        doc.path_entry("/x").insert(HttpMethod::Get, op).unwrap();
        let value = doc.into_value().unwrap();
        assert_eq!(value["paths"]["/x"], json!({ "GET": { "summary": "new" } }));
    }

    #[test]
    fn missing_paths_becomes_empty() {
        let doc = OpenApiDocument::from_value(json!({ "openapi": "3.0.0" })).unwrap();
        assert!(doc.paths.is_empty());
        assert_eq!(
            doc.into_value().unwrap(),
            json!({ "openapi": "3.0.0", "paths": {} })
        );
    }

    #[test]
    fn rejects_non_object_paths() {
        assert!(OpenApiDocument::from_value(json!({ "paths": [] })).is_err());
        assert!(OpenApiDocument::from_value(json!("nope")).is_err());
    }

    #[test]
    fn method_parsing_is_case_insensitive() {
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(HttpMethod::Patch.as_upper(), "PATCH");
        assert!("connect".parse::<HttpMethod>().is_err());
    }
}
