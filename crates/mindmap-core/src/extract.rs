//! The extraction service client.
//!
//! One call to [`Extractor::extract`] sends one document to the provider and
//! follows its response stream. After every delta the accumulated text is
//! re-parsed; each new well-typed snapshot is reported through the progress
//! callback. The call resolves exactly once, with the strictly validated
//! result or an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::document::EncodedDocument;
use crate::error::{ExtractionError, TransportCause};
use crate::partial_json::{PartialParse, parse_partial};
use crate::prompt::GenerationRequest;
use crate::provider::{GeminiProvider, GenerationProvider};
use crate::schema::{ExtractionResult, PartialExtractionResult};
use crate::validate::{Violation, join_violations, validate_complete, validate_partial};

/// Events observed during one extraction.
///
/// `extract` reports `Delta` and `Partial` through its callback and returns
/// the terminal outcome; `Complete` and `Failed` are built from that return
/// value by whoever folds the events (see [`crate::shell::Shell::apply`]).
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionEvent {
    /// Raw text as received from the provider.
    Delta(String),
    /// A new well-typed snapshot, different from the previous one.
    Partial(PartialExtractionResult),
    Complete(ExtractionResult),
    Failed(ExtractionError),
}

impl ExtractionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExtractionEvent::Complete(_) | ExtractionEvent::Failed(_))
    }
}

impl From<Result<ExtractionResult, ExtractionError>> for ExtractionEvent {
    fn from(outcome: Result<ExtractionResult, ExtractionError>) -> Self {
        match outcome {
            Ok(result) => ExtractionEvent::Complete(result),
            Err(e) => ExtractionEvent::Failed(e),
        }
    }
}

/// Accumulates deltas and turns them into deduplicated snapshots.
#[derive(Debug, Default)]
pub struct PartialAccumulator {
    text: String,
    last: Option<PartialExtractionResult>,
    deltas: usize,
}

impl PartialAccumulator {
    /// Append `delta`. Returns a snapshot when the text now parses, is
    /// well-typed, and differs from the last snapshot returned.
    pub fn push(&mut self, delta: &str) -> Option<PartialExtractionResult> {
        self.text.push_str(delta);
        self.deltas += 1;

        let value = parse_partial(&self.text).value()?;
        let snapshot = match validate_partial(&value) {
            Ok(snapshot) => snapshot,
            Err(violations) => {
                tracing::debug!(
                    violations = %join_violations(&violations),
                    "skipping ill-typed snapshot"
                );
                return None;
            }
        };

        if self.last.as_ref() == Some(&snapshot) {
            return None;
        }
        self.last = Some(snapshot.clone());
        Some(snapshot)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Strictly validate the accumulated text once the stream has ended.
    pub fn finish(self) -> Result<ExtractionResult, ExtractionError> {
        let value = match parse_partial(&self.text) {
            PartialParse::Complete(value) => value,
            PartialParse::Repaired(value) => {
                tracing::warn!(
                    len = self.text.len(),
                    "stream ended inside an unfinished JSON document"
                );
                value
            }
            PartialParse::Failed => {
                let message = if self.text.trim().is_empty() {
                    "Response is empty"
                } else {
                    "Response is not valid JSON"
                };
                return Err(ExtractionError::Validation {
                    violations: vec![Violation {
                        path: "(root)".to_string(),
                        message: message.to_string(),
                    }],
                });
            }
        };

        validate_complete(&value).map_err(|violations| {
            tracing::warn!(
                deltas = self.deltas,
                violations = %join_violations(&violations),
                "final result failed validation"
            );
            ExtractionError::Validation { violations }
        })
    }
}

/// Sends documents to a [`GenerationProvider`] and follows the response.
#[derive(Clone)]
pub struct Extractor {
    provider: Arc<dyn GenerationProvider>,
    timeout: Duration,
}

impl Extractor {
    pub fn new(provider: Arc<dyn GenerationProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// An extractor backed by the hosted provider described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::new(
            Arc::new(GeminiProvider::new(client, config)),
            config.timeout,
        )
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one extraction.
    ///
    /// `progress` receives every delta and every new snapshot, in order. The
    /// whole call is bounded by the configured timeout, and `cancel` aborts it
    /// early. No retries: every failure is returned to the caller.
    pub async fn extract(
        &self,
        document: EncodedDocument,
        progress: impl Fn(ExtractionEvent) + Send + Sync,
        cancel: CancellationToken,
    ) -> Result<ExtractionResult, ExtractionError> {
        let request = GenerationRequest::for_document(document);
        let started = Instant::now();
        tracing::info!(
            provider = self.provider.name(),
            document = %request.document.name,
            encoded_len = request.document.data.len(),
            "extraction started"
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportCause::Cancelled.into()),
            res = tokio::time::timeout(self.timeout, self.run(&request, &progress)) => {
                res.unwrap_or_else(|_| Err(TransportCause::Timeout.into()))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(result) => tracing::info!(
                key_points = result.key_points.len(),
                elapsed_ms,
                "extraction complete"
            ),
            Err(e) if e.is_cancelled() => tracing::info!(elapsed_ms, "extraction cancelled"),
            Err(e) => tracing::warn!(error = %e, elapsed_ms, "extraction failed"),
        }
        outcome
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        progress: &(impl Fn(ExtractionEvent) + Send + Sync),
    ) -> Result<ExtractionResult, ExtractionError> {
        let mut deltas = self.provider.generate(request).await?;
        let mut acc = PartialAccumulator::default();

        while let Some(item) = deltas.next().await {
            let delta = item?;
            progress(ExtractionEvent::Delta(delta.clone()));
            if let Some(snapshot) = acc.push(&delta) {
                progress(ExtractionEvent::Partial(snapshot));
            }
        }

        tracing::debug!(deltas = acc.deltas, len = acc.text.len(), "provider stream ended");
        acc.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_reports_only_changes() {
        let mut acc = PartialAccumulator::default();
        assert_eq!(acc.push("{\"ti"), Some(PartialExtractionResult::default()));
        // Still inside the key: same repaired value.
        assert_eq!(acc.push("tl"), None);
        let snap = acc.push("e\":\"Do").unwrap();
        assert_eq!(snap.title.as_deref(), Some("Do"));
        assert_eq!(acc.push("c\"").unwrap().title.as_deref(), Some("Doc"));
        assert_eq!(acc.push(" "), None);
        assert_eq!(acc.text(), "{\"title\":\"Doc\" ");
    }

    #[test]
    fn accumulator_absorbs_unparsable_prefixes() {
        let mut acc = PartialAccumulator::default();
        assert_eq!(acc.push("  "), None);
        assert_eq!(acc.push("{\"title\": 4"), None);
    }

    #[test]
    fn finish_enforces_bounds() {
        let mut acc = PartialAccumulator::default();
        acc.push(r#"{"title":"","keyPoints":[{"point":"p","context":["a","b","c"]}]}"#);
        let Err(ExtractionError::Validation { violations }) = acc.finish() else {
            panic!("expected validation error");
        };
        assert_eq!(violations[0].path, "title");
        assert_eq!(violations[0].message, "Title cannot be empty");
    }

    #[test]
    fn finish_on_empty_stream() {
        let Err(ExtractionError::Validation { violations }) = PartialAccumulator::default().finish()
        else {
            panic!("expected validation error");
        };
        assert_eq!(violations[0].message, "Response is empty");
    }

    #[test]
    fn finish_accepts_truncated_but_valid_document() {
        let mut acc = PartialAccumulator::default();
        acc.push(r#"{"title":"T","keyPoints":[{"point":"p","context":["a","b","c"]}"#);
        let result = acc.finish().unwrap();
        assert_eq!(result.key_points[0].context.len(), 3);
    }

    #[test]
    fn terminal_event_from_outcome() {
        let event = ExtractionEvent::from(Err(TransportCause::Timeout.into()));
        assert!(event.is_terminal());
        assert!(!ExtractionEvent::Delta("x".into()).is_terminal());
    }
}
