use axum::response::sse::Event;
use mindmap_core::{ExtractionResult, Node, PartialExtractionResult};
use serde::Serialize;

// ── SSE Event Structs ───────────────────────────────────────────────────

/// Files refused by intake. Extraction is not started for them.
#[derive(Serialize)]
pub struct WarningEvent {
    pub message: String,
    pub details: Vec<String>,
}

/// A whole replacement tree, sent for every partial snapshot worth showing.
#[derive(Serialize)]
pub struct TreeEvent<'a> {
    pub tree: &'a Node,
    /// The snapshot behind `tree`, for the key point list.
    pub content: Option<&'a PartialExtractionResult>,
}

#[derive(Serialize)]
pub struct CompleteEvent<'a> {
    pub tree: &'a Node,
    pub result: &'a ExtractionResult,
}

#[derive(Serialize)]
pub struct ErrorEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ── SSE Helper ──────────────────────────────────────────────────────────

pub fn sse_event<T: Serialize>(event_type: &str, data: &T) -> Event {
    Event::default()
        .event(event_type)
        .data(serde_json::to_string(data).unwrap_or_default())
}
