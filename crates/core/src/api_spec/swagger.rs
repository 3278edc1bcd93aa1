//! Build an OpenAPI document from `@swagger` / `@openapi` YAML annotations
//! embedded in `/** ... */` comment blocks, the swagger-jsdoc convention.

use serde_json::{json, Map, Value};

use super::openapi::HttpMethod;
use crate::source::SourceFile;

const TAGS: [&str; 2] = ["@swagger", "@openapi"];

/// One annotated comment block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub origin: String,
    /// 1-based line of the comment opener.
    pub line: usize,
    /// The comment block exactly as written.
    pub raw: String,
    /// The YAML body below the tag, with comment decoration removed.
    pub yaml: String,
}

#[derive(Debug, Clone)]
pub struct ExtractedSpec {
    pub spec: Value,
    pub operation_count: usize,
    pub annotations: Vec<Annotation>,
    /// Annotations that could not be parsed, as `origin:line: reason`.
    pub warnings: Vec<String>,
}

impl ExtractedSpec {
    /// The original annotated blocks, labelled by origin, for `source_code`.
    pub fn source_code(&self) -> String {
        self.annotations
            .iter()
            .map(|a| format!("// {}:{}\n{}", a.origin, a.line, a.raw))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Find every annotated block comment in `source`.
pub fn extract_annotations(origin: &str, source: &str) -> Vec<Annotation> {
    let mut annotations = Vec::new();
    let mut rest = source;
    let mut consumed = 0;

    while let Some(start) = rest.find("/*") {
        let body_start = start + 2;
        let Some(len) = rest[body_start..].find("*/") else {
            break;
        };
        let end = body_start + len;
        let body = &rest[body_start..end];
        let raw = &rest[start..end + 2];
        let line = source[..consumed + start].matches('\n').count() + 1;

        if let Some(yaml) = annotated_yaml(body) {
            annotations.push(Annotation {
                origin: origin.to_string(),
                line,
                raw: raw.to_string(),
                yaml,
            });
        }
        consumed += end + 2;
        rest = &rest[end + 2..];
    }
    annotations
}

/// Strip `*` decoration, find the tag and return the dedented YAML after it.
fn annotated_yaml(body: &str) -> Option<String> {
    let lines: Vec<&str> = body
        .strip_prefix('*')
        .unwrap_or(body)
        .lines()
        .map(strip_decoration)
        .collect();

    let (tag_index, after_tag) = lines.iter().enumerate().find_map(|(i, line)| {
        let trimmed = line.trim_start();
        TAGS.iter()
            .find_map(|tag| trimmed.strip_prefix(tag))
            .map(|after| (i, after.trim()))
    })?;

    let mut body_lines: Vec<&str> = Vec::new();
    if !after_tag.is_empty() {
        body_lines.push(after_tag);
    }
    body_lines.extend(lines[tag_index + 1..].iter().copied());

    let indent = body_lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);
    let yaml = body_lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n");
    let yaml = yaml.trim_matches('\n').to_string();
    (!yaml.trim().is_empty()).then_some(yaml)
}

fn strip_decoration(line: &str) -> &str {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix('*') {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => line,
    }
}

/// Convert YAML into JSON, stringifying non-string mapping keys (status
/// codes are usually written as bare integers).
pub fn yaml_to_json(value: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Yaml;
    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| format!("unsupported number {n}"))?
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = Map::new();
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported mapping key {other:?}")),
                };
                object.insert(key, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

/// Merge `overlay` into `base`: objects recursively, arrays appended,
/// anything else replaced.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(overlay)) => {
            for item in overlay {
                if !base.contains(&item) {
                    base.push(item);
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// A minimal OpenAPI 3 document to merge annotations into.
pub fn base_document(title: &str) -> Value {
    json!({
        "openapi": "3.0.0",
        "info": { "title": title, "version": "1.0.0" },
        "paths": {}
    })
}

/// Merge one parsed annotation into `spec`. Top-level keys starting with
/// `/` are paths; a `paths` key is merged as a whole; anything else
/// (`components`, `tags`, ...) is merged at the root.
pub fn merge_annotation(spec: &mut Value, fragment: Value) -> Result<(), String> {
    let Value::Object(fragment) = fragment else {
        return Err("annotation is not a YAML mapping".into());
    };
    let Some(root) = spec.as_object_mut() else {
        return Err("spec root is not an object".into());
    };
    for (key, value) in fragment {
        if key.starts_with('/') {
            let paths = root
                .entry("paths")
                .or_insert_with(|| Value::Object(Map::new()));
            let mut item = Map::new();
            item.insert(key, value);
            deep_merge(paths, Value::Object(item));
        } else {
            match root.get_mut(&key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    root.insert(key, value);
                }
            }
        }
    }
    Ok(())
}

pub fn count_operations(spec: &Value) -> usize {
    spec.get("paths")
        .and_then(Value::as_object)
        .map(|paths| {
            paths
                .values()
                .filter_map(Value::as_object)
                .flat_map(|item| item.keys())
                .filter(|k| k.parse::<HttpMethod>().is_ok())
                .count()
        })
        .unwrap_or(0)
}

/// Extract and merge annotations from every file into one document.
pub fn build_spec(title: &str, files: &[SourceFile]) -> ExtractedSpec {
    let mut spec = base_document(title);
    let mut annotations = Vec::new();
    let mut warnings = Vec::new();

    for file in files {
        for annotation in extract_annotations(&file.path, &file.content) {
            let parsed = serde_yaml::from_str::<serde_yaml::Value>(&annotation.yaml)
                .map_err(|e| e.to_string())
                .and_then(yaml_to_json)
                .and_then(|fragment| merge_annotation(&mut spec, fragment));
            match parsed {
                Ok(()) => annotations.push(annotation),
                Err(reason) => {
                    tracing::warn!(origin = %annotation.origin, line = annotation.line, %reason, "skipping unparsable annotation");
                    warnings.push(format!("{}:{}: {reason}", annotation.origin, annotation.line));
                }
            }
        }
    }

    ExtractedSpec {
        operation_count: count_operations(&spec),
        spec,
        annotations,
        warnings,
    }
}
