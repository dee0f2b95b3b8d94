//! Google Generative Language API (`streamGenerateContent`) provider.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use serde_json::{Value, json};

use super::sse::SseDecoder;
use super::{DeltaStream, GenerationProvider};
use crate::config::Config;
use crate::error::TransportCause;
use crate::prompt::GenerationRequest;

/// Finish reasons that mean the model stopped for policy reasons, not because it was done.
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Error bodies are echoed into logs; keep them short.
const MAX_ERROR_BODY_CHARS: usize = 500;

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    /// JSON body for one request: system instruction, user text plus the
    /// inline document, and the structured-output schema.
    pub fn request_body(request: &GenerationRequest) -> Value {
        json!({
            "systemInstruction": {
                "parts": [{ "text": request.system }],
            },
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": request.user },
                    {
                        "inlineData": {
                            "mimeType": request.document.media_type,
                            "data": request.document.base64_payload(),
                        },
                    },
                ],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": request.response_schema,
            },
        })
    }
}

impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<DeltaStream, TransportCause>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .client
                .post(self.endpoint())
                .header("x-goog-api-key", &self.api_key)
                .json(&Self::request_body(request))
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body: String = resp
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(MAX_ERROR_BODY_CHARS)
                    .collect();
                return Err(TransportCause::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            tracing::debug!(model = %self.model, "provider stream opened");
            Ok(deltas(resp.bytes_stream()))
        })
    }
}

/// Turn an SSE response body into text deltas.
///
/// The first error (transport or in-stream) is yielded once and ends the stream.
pub fn deltas<S, B, E>(body: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<TransportCause> + Send + 'static,
{
    struct State<S> {
        body: Pin<Box<S>>,
        decoder: SseDecoder,
        pending: VecDeque<Result<String, TransportCause>>,
        done: bool,
    }

    let state = State {
        body: Box::pin(body),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.done = true;
                    st.pending.clear();
                }
                return Some((item, st));
            }
            if st.done {
                return None;
            }

            let payloads = match st.body.next().await {
                Some(Ok(chunk)) => st.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    st.done = true;
                    st.pending.push_back(Err(e.into()));
                    continue;
                }
                None => {
                    st.done = true;
                    st.decoder.finish()
                }
            };

            for payload in payloads {
                match parse_chunk(&payload) {
                    Ok(Some(text)) => st.pending.push_back(Ok(text)),
                    Ok(None) => {}
                    Err(cause) => st.pending.push_back(Err(cause)),
                }
            }
        }
    }))
}

/// Extract the text delta from one `GenerateContentResponse` chunk.
pub fn parse_chunk(payload: &str) -> Result<Option<String>, TransportCause> {
    let v: Value = serde_json::from_str(payload)
        .map_err(|e| TransportCause::Upstream(format!("malformed stream chunk: {e}")))?;

    if let Some(err) = v.get("error") {
        let message = err["message"].as_str().unwrap_or("unknown error");
        return Err(TransportCause::Upstream(message.to_string()));
    }

    if let Some(reason) = v["promptFeedback"]["blockReason"].as_str() {
        return Err(TransportCause::Upstream(format!("prompt blocked: {reason}")));
    }

    let candidate = &v["candidates"][0];
    if let Some(reason) = candidate["finishReason"].as_str()
        && BLOCKING_FINISH_REASONS.contains(&reason)
    {
        return Err(TransportCause::Upstream(format!(
            "generation stopped: {reason}"
        )));
    }

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    Ok((!text.is_empty()).then_some(text))
}
