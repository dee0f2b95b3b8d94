use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Request bodies carry the document base64-encoded (JSON) or raw (multipart).
/// Leave room for the encoding so oversized files reach intake and get a
/// proper rejection message instead of a bare 413.
fn body_limit(max_document_bytes: usize) -> usize {
    max_document_bytes.saturating_mul(2).saturating_add(1024 * 1024)
}

pub fn router(state: Arc<AppState>) -> Router {
    let limit = body_limit(state.policy.max_bytes);

    Router::new()
        .route("/", get(handlers::index::index))
        .route("/healthz", get(handlers::index::healthz))
        .route("/api/generate", post(handlers::generate::generate))
        .route("/api/analyze/stream", post(handlers::stream::stream))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use mindmap_core::document::PDF_MEDIA_TYPE;
    use mindmap_core::{
        Document, Extractor, GenerationProvider, IntakePolicy, MockProvider, MockStep,
        REJECTION_NOTICE, TransportCause, USER_FAILURE_MESSAGE,
    };
    use std::time::Duration;
    use tower::ServiceExt; // for oneshot

    const GOOD: &str = r#"{"title":"Doc","keyPoints":[{"point":"Claim","context":["a","b","c"]}]}"#;
    const BOUNDARY: &str = "mindmap-test-boundary";

    fn create_test_state(mock: &Arc<MockProvider>, max_bytes: usize) -> Arc<AppState> {
        let provider: Arc<dyn GenerationProvider> = mock.clone();
        Arc::new(AppState {
            extractor: Extractor::new(provider, Duration::from_secs(60)),
            policy: IntakePolicy { max_bytes },
        })
    }

    fn pdf_document(len: usize) -> Document {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(len.max(bytes.len()), b'x');
        Document {
            name: "paper.pdf".into(),
            media_type: PDF_MEDIA_TYPE.into(),
            bytes,
        }
    }

    fn generate_request(files: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::json!({ "files": files }).to_string()))
            .unwrap()
    }

    fn multipart_request(filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/analyze/stream")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let mock = Arc::new(MockProvider::from_chunks(&[GOOD]));
        let app = router(create_test_state(&mock, 1024));

        let request = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("\"ok\""));
    }

    #[tokio::test]
    async fn test_index_page() {
        let mock = Arc::new(MockProvider::from_chunks(&[GOOD]));
        let app = router(create_test_state(&mock, 5 * 1024 * 1024));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Mind Map Maker"));
        assert!(html.contains("5242880"));
        assert!(html.contains(&format!("const REJECTION_NOTICE = \"{REJECTION_NOTICE}\";")));
        assert!(!html.contains("{{ max_upload_bytes }}"));
        assert!(!html.contains("{{ rejection_notice }}"));
    }

    #[tokio::test]
    async fn test_index_page_names_configured_ceiling() {
        let mock = Arc::new(MockProvider::from_chunks(&[GOOD]));
        let app = router(create_test_state(&mock, 20 * 1024 * 1024));

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let html = body_text(app.oneshot(request).await.unwrap()).await;
        assert!(html.contains("Only PDF files under 20MB are allowed."));
        assert!(!html.contains("5MB"));
    }

    #[tokio::test]
    async fn test_generate_streams_provider_text() {
        let mock = Arc::new(MockProvider::from_text(GOOD, 7));
        let app = router(create_test_state(&mock, 1024));

        let doc = pdf_document(64).encode();
        let response = app
            .oneshot(generate_request(serde_json::json!([doc])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, GOOD);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_generate_uses_first_file_only() {
        let mock = Arc::new(MockProvider::from_chunks(&[GOOD]));
        let app = router(create_test_state(&mock, 1024));

        let first = pdf_document(64).encode();
        let second = Document {
            name: "second.pdf".into(),
            ..pdf_document(32)
        }
        .encode();
        let response = app
            .oneshot(generate_request(serde_json::json!([first, second])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_text(response).await;
        assert_eq!(mock.last_request().unwrap().document.name, "paper.pdf");
    }

    #[tokio::test]
    async fn test_generate_without_files_is_bad_request() {
        let mock = Arc::new(MockProvider::from_chunks(&[GOOD]));
        let app = router(create_test_state(&mock, 1024));

        let response = app
            .oneshot(generate_request(serde_json::json!([])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_rejects_wrong_type_and_oversize() {
        let mock = Arc::new(MockProvider::from_chunks(&[GOOD]));
        let state = create_test_state(&mock, 1024);

        let text = Document {
            name: "notes.txt".into(),
            media_type: "text/plain".into(),
            bytes: b"plain text".to_vec(),
        }
        .encode();
        let response = router(state.clone())
            .oneshot(generate_request(serde_json::json!([text])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "Only PDF files under 1KB are allowed.");

        let big = pdf_document(2048).encode();
        let response = router(state)
            .oneshot(generate_request(serde_json::json!([big])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body: serde_json::Value =
            serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "Only PDF files under 1KB are allowed.");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_aborts_body_on_invalid_result() {
        let invalid = r#"{"title":"","keyPoints":[]}"#;
        let mock = Arc::new(MockProvider::from_chunks(&[invalid]));
        let app = router(create_test_state(&mock, 1024));

        let doc = pdf_document(64).encode();
        let response = app
            .oneshot(generate_request(serde_json::json!([doc])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await;
        assert!(body.is_err());
    }

    #[tokio::test]
    async fn test_analyze_stream_sends_trees_then_complete() {
        let mock = Arc::new(MockProvider::from_text(GOOD, 6));
        let app = router(create_test_state(&mock, 1024));

        let doc = pdf_document(64);
        let response = app
            .oneshot(multipart_request("paper.pdf", PDF_MEDIA_TYPE, &doc.bytes))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;

        let tree_at = body.find("event: tree").expect("tree event");
        let complete_at = body.find("event: complete").expect("complete event");
        assert!(tree_at < complete_at);
        assert!(body.contains("\"id\":\"context-0-2\""));
        assert!(!body.contains("event: error"));

        // Tree events carry the snapshot for the key point list.
        let first_tree = body[tree_at..]
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        let payload: serde_json::Value = serde_json::from_str(first_tree).unwrap();
        assert!(payload["content"].is_object());
        assert!(body.contains("\"result\":{\"title\":\"Doc\""));
    }

    #[tokio::test]
    async fn test_analyze_stream_warns_and_skips_extraction_for_non_pdf() {
        let mock = Arc::new(MockProvider::from_chunks(&[GOOD]));
        let app = router(create_test_state(&mock, 1024));

        let response = app
            .oneshot(multipart_request("notes.txt", "text/plain", b"just text"))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert!(body.contains("event: warning"));
        assert!(body.contains("Only PDF files under 1KB are allowed."));
        assert!(!body.contains("event: tree"));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_stream_reports_failure_once() {
        let mock = Arc::new(MockProvider::new(vec![
            MockStep::Delta(r#"{"title":"Do"#.into()),
            MockStep::Fail(TransportCause::Network("connection reset".into())),
        ]));
        let app = router(create_test_state(&mock, 1024));

        let doc = pdf_document(64);
        let response = app
            .oneshot(multipart_request("paper.pdf", PDF_MEDIA_TYPE, &doc.bytes))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert_eq!(body.matches("event: error").count(), 1);
        assert!(body.contains(USER_FAILURE_MESSAGE));
        assert!(!body.contains("event: complete"));
    }

    #[tokio::test]
    async fn test_analyze_stream_reports_crashed_extraction_as_failure() {
        let mock = Arc::new(MockProvider::new(vec![
            MockStep::Delta(r#"{"title":"Doc""#.into()),
            MockStep::Panic("provider bug".into()),
        ]));
        let app = router(create_test_state(&mock, 1024));

        let doc = pdf_document(64);
        let response = app
            .oneshot(multipart_request("paper.pdf", PDF_MEDIA_TYPE, &doc.bytes))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert_eq!(body.matches("event: error").count(), 1);
        assert!(body.contains(&format!("\"message\":\"{USER_FAILURE_MESSAGE}\"")));
        assert!(!body.contains("Extraction task error"));
        assert!(!body.contains("event: complete"));
    }
}
