//! Canonical shape of an extraction result and its bound-relaxed partial form.
//!
//! [`ExtractionResult`] is what a finished stream must satisfy. While the
//! provider is still generating, snapshots are [`PartialExtractionResult`]s:
//! every field is optional at every nesting level and key-point slots may be
//! `null`.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const TITLE_MAX_CHARS: usize = 500;
pub const KEY_POINTS_MIN: usize = 1;
pub const KEY_POINTS_MAX: usize = 20;
pub const POINT_MAX_CHARS: usize = 1000;
pub const CONTEXT_MIN: usize = 3;
pub const CONTEXT_MAX: usize = 10;
pub const CONTEXT_MAX_CHARS: usize = 500;

// Field descriptions are sent to the model as generation guidance.
pub const TITLE_DESCRIPTION: &str = "The document title";
pub const KEY_POINTS_DESCRIPTION: &str = "List of important points extracted from the document";
pub const POINT_DESCRIPTION: &str =
    "A key argument or point from the document, be very specific and detailed";
pub const CONTEXT_DESCRIPTION: &str =
    "Subarguments, including detailed context, details, statistics, anecdotes, etc.";
pub const CONTEXT_ITEM_DESCRIPTION: &str =
    "A detailed subargument, could be more nuance, details, statistics, anecdotes, etc.";

/// A fully generated, bound-checked extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub title: String,
    pub key_points: Vec<KeyPoint>,
}

/// A specific claim from the document with its supporting details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub point: String,
    pub context: Vec<String>,
}

/// A snapshot observed mid-stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialExtractionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `None` slots are array elements the provider has not produced yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_points: Option<Vec<Option<PartialKeyPoint>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialKeyPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Vec<String>>,
}

impl PartialExtractionResult {
    /// True once the snapshot carries a non-empty title or at least one key point slot.
    pub fn has_content(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.is_empty())
            || self.key_points.as_ref().is_some_and(|kp| !kp.is_empty())
    }
}

impl From<&KeyPoint> for PartialKeyPoint {
    fn from(kp: &KeyPoint) -> Self {
        Self {
            point: Some(kp.point.clone()),
            context: Some(kp.context.clone()),
        }
    }
}

impl From<&ExtractionResult> for PartialExtractionResult {
    fn from(result: &ExtractionResult) -> Self {
        Self {
            title: Some(result.title.clone()),
            key_points: Some(
                result
                    .key_points
                    .iter()
                    .map(|kp| Some(PartialKeyPoint::from(kp)))
                    .collect(),
            ),
        }
    }
}

impl From<ExtractionResult> for PartialExtractionResult {
    fn from(result: ExtractionResult) -> Self {
        Self::from(&result)
    }
}

/// The structured-output schema handed to the provider.
///
/// String length bounds are not expressible in the provider's schema dialect;
/// they are enforced by [`crate::validate::validate_complete`] at stream end.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": {
                "type": "STRING",
                "description": TITLE_DESCRIPTION,
            },
            "keyPoints": {
                "type": "ARRAY",
                "description": KEY_POINTS_DESCRIPTION,
                "minItems": KEY_POINTS_MIN,
                "maxItems": KEY_POINTS_MAX,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "point": {
                            "type": "STRING",
                            "description": POINT_DESCRIPTION,
                        },
                        "context": {
                            "type": "ARRAY",
                            "description": CONTEXT_DESCRIPTION,
                            "minItems": CONTEXT_MIN,
                            "maxItems": CONTEXT_MAX,
                            "items": {
                                "type": "STRING",
                                "description": CONTEXT_ITEM_DESCRIPTION,
                            },
                        },
                    },
                    "required": ["point", "context"],
                    "propertyOrdering": ["point", "context"],
                },
            },
        },
        "required": ["title", "keyPoints"],
        "propertyOrdering": ["title", "keyPoints"],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_are_camel_case() {
        let result = ExtractionResult {
            title: "T".into(),
            key_points: vec![KeyPoint {
                point: "p".into(),
                context: vec!["a".into()],
            }],
        };
        let v = serde_json::to_value(&result).unwrap();
        assert!(v.get("keyPoints").is_some());
        assert!(v.get("key_points").is_none());
    }

    #[test]
    fn partial_skips_absent_fields() {
        let partial = PartialExtractionResult {
            title: Some("Doc".into()),
            key_points: None,
        };
        assert_eq!(
            serde_json::to_string(&partial).unwrap(),
            r#"{"title":"Doc"}"#
        );
    }

    #[test]
    fn partial_accepts_null_slots() {
        let partial: PartialExtractionResult =
            serde_json::from_str(r#"{"keyPoints":[{"point":"a"},null]}"#).unwrap();
        let kps = partial.key_points.unwrap();
        assert_eq!(kps.len(), 2);
        assert!(kps[1].is_none());
    }

    #[test]
    fn has_content_requires_title_or_points() {
        assert!(!PartialExtractionResult::default().has_content());
        let empty_title = PartialExtractionResult {
            title: Some(String::new()),
            key_points: Some(vec![]),
        };
        assert!(!empty_title.has_content());
        let one_slot = PartialExtractionResult {
            title: None,
            key_points: Some(vec![None]),
        };
        assert!(one_slot.has_content());
    }

    #[test]
    fn schema_carries_descriptions_and_bounds() {
        let schema = response_schema();
        assert_eq!(
            schema["properties"]["title"]["description"],
            TITLE_DESCRIPTION
        );
        let context = &schema["properties"]["keyPoints"]["items"]["properties"]["context"];
        assert_eq!(context["minItems"], 3);
        assert_eq!(context["maxItems"], 10);
        assert_eq!(context["items"]["description"], CONTEXT_ITEM_DESCRIPTION);
    }
}
