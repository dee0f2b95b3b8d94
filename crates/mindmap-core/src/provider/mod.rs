//! Generation provider trait and implementations.
//!
//! A provider turns one [`GenerationRequest`] into a stream of text deltas.
//! Concatenated, the deltas form the JSON document the model generated.

pub mod gemini;
pub mod mock;
pub mod sse;

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use crate::error::TransportCause;
use crate::prompt::GenerationRequest;

pub use gemini::GeminiProvider;
pub use mock::{MockProvider, MockStep};

/// Text deltas in arrival order. An `Err` item ends the stream.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, TransportCause>> + Send>>;

/// A hosted model that can stream structured output.
pub trait GenerationProvider: Send + Sync {
    /// The name used in logs (e.g., "Gemini").
    fn name(&self) -> &str;

    /// Issue the request. Resolves once the response headers are in; the
    /// body is then consumed through the returned stream.
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<DeltaStream, TransportCause>> + Send + 'a>>;
}
