//! Field validation shared by the entity services.

use crate::error::{CoreError, CoreResult};

pub const MAX_PROJECT_CODE_LEN: usize = 10;

/// Trim a required text field, rejecting blank input.
pub fn required_text(field: &str, value: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field, collapsing blank input to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Project codes are short identifiers, compared case-insensitively.
pub fn project_code(value: &str) -> CoreResult<String> {
    let code = required_text("code", value)?;
    if code.chars().count() > MAX_PROJECT_CODE_LEN {
        return Err(CoreError::validation(format!(
            "code must be at most {MAX_PROJECT_CODE_LEN} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CoreError::validation(
            "code may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(code)
}

/// Colors are CSS hex literals: `#rgb` or `#rrggbb`.
pub fn color(value: Option<String>) -> CoreResult<Option<String>> {
    let Some(color) = optional_text(value) else {
        return Ok(None);
    };
    let digits = color.strip_prefix('#').unwrap_or("");
    let valid = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(CoreError::validation(format!(
            "color must be a hex value like #1e90ff, got {color:?}"
        )));
    }
    Ok(Some(color.to_ascii_lowercase()))
}
