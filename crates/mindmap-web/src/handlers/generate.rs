//! `POST /api/generate`: relay the provider's raw JSON text as it streams.
//!
//! The accumulated body is the extraction result once complete. If the final
//! result fails validation, or the provider fails, the body is aborted
//! instead of being ended cleanly, so clients never mistake a broken stream
//! for a finished one.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use mindmap_core::{ExtractionEvent, InputRejected, IntakePolicy, UploadPayload};

use crate::state::AppState;

pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UploadPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid request", rejection.body_text());
        }
    };

    let Some(first) = payload.files.into_iter().next() else {
        return rejected_response(&state.policy, &InputRejected::NoFile);
    };
    let document = match state.policy.admit_encoded(first) {
        Ok(document) => document,
        Err(rejected) => {
            tracing::info!(%rejected, "upload rejected");
            return rejected_response(&state.policy, &rejected);
        }
    };

    let (tx, rx) = mpsc::unbounded_channel::<Result<String, io::Error>>();

    tokio::spawn(async move {
        let cancel = CancellationToken::new();
        let cancel_for_disconnect = cancel.clone();
        let tx_progress = tx.clone();
        let extractor = state.extractor.clone();

        let extraction_handle = tokio::spawn(async move {
            extractor
                .extract(
                    document,
                    move |event| {
                        if let ExtractionEvent::Delta(text) = event {
                            let _ = tx_progress.send(Ok(text));
                        }
                    },
                    cancel,
                )
                .await
        });

        // Race between extraction completing and client disconnecting
        tokio::select! {
            outcome = extraction_handle => {
                let failure = match outcome {
                    Ok(Ok(_)) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(e) => Some(format!("Extraction task error: {}", e)),
                };
                if let Some(reason) = failure {
                    let _ = tx.send(Err(io::Error::other(reason)));
                }
            }
            _ = tx.closed() => {
                cancel_for_disconnect.cancel();
            }
        }
    });

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(UnboundedReceiverStream::new(rx)),
    )
        .into_response()
}

fn rejected_response(policy: &IntakePolicy, rejected: &InputRejected) -> Response {
    let (status, message) = match rejected {
        InputRejected::TooLarge { .. } => {
            (StatusCode::PAYLOAD_TOO_LARGE, policy.rejection_notice())
        }
        InputRejected::WrongType { .. } | InputRejected::Empty { .. } => {
            (StatusCode::BAD_REQUEST, policy.rejection_notice())
        }
        InputRejected::MalformedDataUrl { .. } | InputRejected::NoFile => {
            (StatusCode::BAD_REQUEST, "Invalid request".to_string())
        }
    };
    error_response(status, &message, rejected.to_string())
}

fn error_response(status: StatusCode, message: &str, detail: String) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message, "detail": detail })),
    )
        .into_response()
}
