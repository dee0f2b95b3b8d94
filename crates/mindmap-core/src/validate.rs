//! Structural and bound-checked validation of extraction payloads.
//!
//! Two entry points with different contracts:
//!
//! - [`validate_partial`] checks only that fields which are present are
//!   well-typed. Short arrays, empty strings and missing fields pass.
//! - [`validate_complete`] additionally requires every field and enforces
//!   every count and length bound from [`crate::schema`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{
    CONTEXT_MAX, CONTEXT_MAX_CHARS, CONTEXT_MIN, ExtractionResult, KEY_POINTS_MAX, KEY_POINTS_MIN,
    KeyPoint, POINT_MAX_CHARS, PartialExtractionResult, PartialKeyPoint, TITLE_MAX_CHARS,
};

/// One failed check: where it failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Field path such as `title` or `keyPoints[2].context[0]`; `(root)` for the whole value.
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Join violations for single-line error messages.
pub fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

const ROOT: &str = "(root)";

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected(path: &str, want: &str, got: &Value) -> Violation {
    Violation::new(path, format!("Expected {want}, received {}", type_name(got)))
}

/// Absent and `null` both count as "not produced yet" while streaming.
fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

// ── Partial (structural only) ───────────────────────────────────────────

/// Validate a mid-stream snapshot. Only the types of present fields are checked.
pub fn validate_partial(value: &Value) -> Result<PartialExtractionResult, Vec<Violation>> {
    let mut violations = Vec::new();
    let Some(obj) = value.as_object() else {
        return Err(vec![expected(ROOT, "object", value)]);
    };

    let title = match present(obj, "title") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            violations.push(expected("title", "string", other));
            None
        }
    };

    let key_points = match present(obj, "keyPoints") {
        None => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| partial_key_point(i, item, &mut violations))
                .collect(),
        ),
        Some(other) => {
            violations.push(expected("keyPoints", "array", other));
            None
        }
    };

    if violations.is_empty() {
        Ok(PartialExtractionResult { title, key_points })
    } else {
        Err(violations)
    }
}

fn partial_key_point(
    index: usize,
    item: &Value,
    violations: &mut Vec<Violation>,
) -> Option<PartialKeyPoint> {
    let path = format!("keyPoints[{index}]");
    let obj = match item {
        Value::Null => return None,
        Value::Object(obj) => obj,
        other => {
            violations.push(expected(&path, "object", other));
            return None;
        }
    };

    let point = match present(obj, "point") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            violations.push(expected(&format!("{path}.point"), "string", other));
            None
        }
    };

    let context = match present(obj, "context") {
        None => None,
        Some(Value::Array(items)) => {
            let mut strings = Vec::with_capacity(items.len());
            for (j, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => strings.push(s.clone()),
                    other => violations.push(expected(
                        &format!("{path}.context[{j}]"),
                        "string",
                        other,
                    )),
                }
            }
            Some(strings)
        }
        Some(other) => {
            violations.push(expected(&format!("{path}.context"), "array", other));
            None
        }
    };

    Some(PartialKeyPoint { point, context })
}

// ── Complete (required fields + bounds) ─────────────────────────────────

/// Validate a payload believed complete. Every field is required and every bound enforced.
pub fn validate_complete(value: &Value) -> Result<ExtractionResult, Vec<Violation>> {
    let result = decode_complete(value)?;
    let violations = check_bounds(&result);
    if violations.is_empty() {
        Ok(result)
    } else {
        Err(violations)
    }
}

impl ExtractionResult {
    /// Bound violations of an already well-typed result.
    pub fn violations(&self) -> Vec<Violation> {
        check_bounds(self)
    }
}

fn required<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Option<&'a Value> {
    let v = obj.get(key);
    if v.is_none() {
        violations.push(Violation::new(path, "Required"));
    }
    v
}

fn required_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    violations: &mut Vec<Violation>,
) -> Option<String> {
    match required(obj, key, path, violations)? {
        Value::String(s) => Some(s.clone()),
        other => {
            violations.push(expected(path, "string", other));
            None
        }
    }
}

fn decode_complete(value: &Value) -> Result<ExtractionResult, Vec<Violation>> {
    let mut violations = Vec::new();
    let Some(obj) = value.as_object() else {
        return Err(vec![expected(ROOT, "object", value)]);
    };

    let title = required_string(obj, "title", "title", &mut violations);

    let mut key_points = Vec::new();
    match required(obj, "keyPoints", "keyPoints", &mut violations) {
        None => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                if let Some(kp) = complete_key_point(i, item, &mut violations) {
                    key_points.push(kp);
                }
            }
        }
        Some(other) => violations.push(expected("keyPoints", "array", other)),
    }

    match title {
        Some(title) if violations.is_empty() => Ok(ExtractionResult { title, key_points }),
        _ => Err(violations),
    }
}

fn complete_key_point(
    index: usize,
    item: &Value,
    violations: &mut Vec<Violation>,
) -> Option<KeyPoint> {
    let path = format!("keyPoints[{index}]");
    let Some(obj) = item.as_object() else {
        violations.push(expected(&path, "object", item));
        return None;
    };

    let point = required_string(obj, "point", &format!("{path}.point"), violations);

    let context_path = format!("{path}.context");
    let context = match required(obj, "context", &context_path, violations)? {
        Value::Array(items) => {
            let mut strings = Vec::with_capacity(items.len());
            for (j, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => strings.push(s.clone()),
                    other => {
                        violations.push(expected(&format!("{context_path}[{j}]"), "string", other))
                    }
                }
            }
            strings
        }
        other => {
            violations.push(expected(&context_path, "array", other));
            return None;
        }
    };

    Some(KeyPoint {
        point: point?,
        context,
    })
}

fn check_len(
    text: &str,
    max: usize,
    path: &str,
    empty_msg: &str,
    long_msg: &str,
    violations: &mut Vec<Violation>,
) {
    let len = text.chars().count();
    if len == 0 {
        violations.push(Violation::new(path, empty_msg));
    } else if len > max {
        violations.push(Violation::new(path, long_msg));
    }
}

fn check_bounds(result: &ExtractionResult) -> Vec<Violation> {
    let mut violations = Vec::new();

    check_len(
        &result.title,
        TITLE_MAX_CHARS,
        "title",
        "Title cannot be empty",
        "Title is too long",
        &mut violations,
    );

    let count = result.key_points.len();
    if count < KEY_POINTS_MIN {
        violations.push(Violation::new(
            "keyPoints",
            "At least one key point is required",
        ));
    } else if count > KEY_POINTS_MAX {
        violations.push(Violation::new("keyPoints", "Too many key points"));
    }

    for (i, kp) in result.key_points.iter().enumerate() {
        check_len(
            &kp.point,
            POINT_MAX_CHARS,
            &format!("keyPoints[{i}].point"),
            "Point cannot be empty",
            "Point is too long",
            &mut violations,
        );

        let context_path = format!("keyPoints[{i}].context");
        if kp.context.len() < CONTEXT_MIN {
            violations.push(Violation::new(
                &context_path,
                "At least 3 subpoints are required",
            ));
        } else if kp.context.len() > CONTEXT_MAX {
            violations.push(Violation::new(&context_path, "Too many subpoints"));
        }

        for (j, ctx) in kp.context.iter().enumerate() {
            check_len(
                ctx,
                CONTEXT_MAX_CHARS,
                &format!("{context_path}[{j}]"),
                "Context cannot be empty",
                "Context is too long",
                &mut violations,
            );
        }
    }

    violations
}
