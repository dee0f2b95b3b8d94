use axum::response::Html;
use mindmap_core::IntakePolicy;

const INDEX_HTML: &str = include_str!("../templates/index.html");

/// Render the index page, injecting the intake limits used by the file picker.
pub fn render_index(policy: &IntakePolicy) -> Html<String> {
    let notice = serde_json::to_string(&policy.rejection_notice()).unwrap_or_default();
    let html = INDEX_HTML
        .replace("{{ max_upload_bytes }}", &policy.max_bytes.to_string())
        .replace("{{ rejection_notice }}", &notice);
    Html(html)
}
