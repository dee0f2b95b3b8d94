use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use mindmap_core::{ExtractionEvent, Notice, Shell, TransportCause};

use crate::models::*;
use crate::state::AppState;
use crate::upload;

pub async fn stream(State(state): State<Arc<AppState>>, multipart: Multipart) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(64);

    tokio::spawn(async move {
        if let Err(e) = handle_stream(state, multipart, tx.clone()).await {
            let _ = tx
                .send(Ok(sse_event(
                    "error",
                    &ErrorEvent {
                        message: e,
                        detail: None,
                    },
                )))
                .await;
        }
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default())
}

async fn handle_stream(
    state: Arc<AppState>,
    multipart: Multipart,
    tx: mpsc::Sender<Result<Event, Infallible>>,
) -> Result<(), String> {
    let candidates = upload::parse_multipart(multipart).await?;

    let mut shell = Shell::new(state.policy);
    let rejected = shell.select_files(candidates);
    for notice in shell.take_notices() {
        send(
            &tx,
            "warning",
            &WarningEvent {
                message: notice.message().to_string(),
                details: rejected.iter().map(ToString::to_string).collect(),
            },
        )
        .await?;
    }

    // Nothing usable was uploaded; the warning already said why.
    let Some(document) = shell.submit() else {
        return Ok(());
    };

    // Run extraction in a separate task so we can detect client disconnect
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ExtractionEvent>();
    let cancel = CancellationToken::new();
    let _cancel_on_exit = cancel.clone().drop_guard();
    let extractor = state.extractor.clone();

    let extraction_handle = tokio::spawn(async move {
        extractor
            .extract(
                document,
                move |event| {
                    let _ = event_tx.send(event);
                },
                cancel,
            )
            .await
    });

    // Fold progress into the shell until the extraction drops its sender
    loop {
        tokio::select! {
            event = event_rx.recv() => match event {
                Some(event) => {
                    if shell.apply(event) {
                        let event = TreeEvent {
                            tree: shell.mind_map(),
                            content: shell.content(),
                        };
                        send(&tx, "tree", &event).await?;
                    }
                }
                None => break,
            },
            _ = tx.closed() => {
                return Err("Client disconnected".to_string());
            }
        }
    }

    // A panicked task fails like any other extraction.
    let outcome = extraction_handle.await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "extraction task failed");
        Err(TransportCause::Upstream(format!("extraction task failed: {e}")).into())
    });

    let detail = outcome.as_ref().err().map(ToString::to_string);
    shell.apply(ExtractionEvent::from(outcome));

    match shell.result() {
        Some(result) => {
            send(
                &tx,
                "complete",
                &CompleteEvent {
                    tree: shell.mind_map(),
                    result,
                },
            )
            .await?;
        }
        None => {
            for notice in shell.take_notices() {
                if let Notice::Error(message) = notice {
                    send(
                        &tx,
                        "error",
                        &ErrorEvent {
                            message,
                            detail: detail.clone(),
                        },
                    )
                    .await?;
                }
            }
        }
    }

    Ok(())
}

/// Send an SSE event, returning Err if the client disconnected.
async fn send<T: serde::Serialize>(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    event_type: &str,
    data: &T,
) -> Result<(), String> {
    tx.send(Ok(sse_event(event_type, data)))
        .await
        .map_err(|_| "Client disconnected".to_string())
}
