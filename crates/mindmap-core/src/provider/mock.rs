//! Scripted provider for tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;

use super::{DeltaStream, GenerationProvider};
use crate::error::TransportCause;
use crate::prompt::GenerationRequest;

/// One scripted step of a mock response stream.
#[derive(Clone, Debug)]
pub enum MockStep {
    /// Yield a text delta.
    Delta(String),
    /// Yield a transport failure (e.g., a dropped connection).
    Fail(TransportCause),
    /// Panic inside the stream, as a provider bug would.
    Panic(String),
}

/// A hand-rolled [`GenerationProvider`] for tests.
///
/// Supports:
/// - A scripted sequence of deltas and failures, replayed on every call.
/// - Refusing the request before any body arrives (e.g., HTTP 500).
/// - Optional per-step latency.
/// - Call counting and capture of the last request.
pub struct MockProvider {
    steps: Vec<MockStep>,
    refusal: Option<TransportCause>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl MockProvider {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            steps,
            refusal: None,
            delay: None,
            call_count: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Stream `chunks` as deltas, in order.
    pub fn from_chunks<S: AsRef<str>>(chunks: &[S]) -> Self {
        Self::new(
            chunks
                .iter()
                .map(|c| MockStep::Delta(c.as_ref().to_string()))
                .collect(),
        )
    }

    /// Stream `text` in pieces of `size` characters.
    pub fn from_text(text: &str, size: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let chunks: Vec<String> = chars
            .chunks(size.max(1))
            .map(|c| c.iter().collect())
            .collect();
        Self::from_chunks(&chunks)
    }

    /// Fail before the stream opens.
    pub fn refusing(cause: TransportCause) -> Self {
        Self {
            refusal: Some(cause),
            ..Self::new(vec![])
        }
    }

    /// Set simulated latency before every step.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `generate()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<DeltaStream, TransportCause>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        let refusal = self.refusal.clone();
        let steps = self.steps.clone();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(cause) = refusal {
                return Err(cause);
            }
            let stream = futures_util::stream::iter(steps).then(move |step| async move {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                match step {
                    MockStep::Delta(text) => Ok(text),
                    MockStep::Fail(cause) => Err(cause),
                    MockStep::Panic(message) => panic!("{message}"),
                }
            });
            Ok(Box::pin(stream) as DeltaStream)
        })
    }
}
