//! Protocol client for the running engine.
//!
//! Every call first asks its [`EngineEndpoint`] for the port of a running
//! engine. When there is none the call degrades to an empty result instead
//! of attempting a connection.
//!
//! At most one chat stream is tracked for [`EngineClient::abort_stream`].
//! Starting a new stream cancels the tracked one, which then ends with
//! [`StreamEnd::Aborted`].

mod error;
mod sse;
mod stream;
mod wire;

pub use error::ClientError;
pub use sse::{DONE_MARKER, SseDecoder, SseEvent};
pub use stream::{ChatStream, StreamEnd, StreamEvent};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use reqwest::Client;
use sidekick_core::{ChatMessage, ChatOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::supervisor::{ENGINE_HOST, EngineSupervisor};
use wire::{
    CHAT_COMPLETIONS_PATH, ChatRequest, ChatResponse, EMBEDDING_PATH, EmbeddingRequest,
    EmbeddingResponse,
};

/// Where the engine can be reached, if anywhere.
#[cfg_attr(test, mockall::automock)]
pub trait EngineEndpoint: Send + Sync {
    /// Port of a ready engine, or `None` when it is not running.
    fn running_port(&self) -> Option<u16>;
}

impl EngineEndpoint for EngineSupervisor {
    fn running_port(&self) -> Option<u16> {
        self.status().running_port()
    }
}

/// An engine known to listen on a fixed port.
#[derive(Debug, Clone, Copy)]
pub struct FixedEndpoint(pub u16);

impl EngineEndpoint for FixedEndpoint {
    fn running_port(&self) -> Option<u16> {
        Some(self.0)
    }
}

/// The stream currently tracked for abort.
#[derive(Debug)]
struct TrackedStream {
    id: u64,
    cancel: CancellationToken,
}

/// Client for the engine's embedding and chat endpoints.
#[derive(Clone)]
pub struct EngineClient {
    endpoint: Arc<dyn EngineEndpoint>,
    http: Client,
    active: Arc<Mutex<Option<TrackedStream>>>,
    next_stream_id: Arc<AtomicU64>,
}

impl EngineClient {
    pub fn new(endpoint: impl EngineEndpoint + 'static) -> Self {
        let http = Client::builder().no_proxy().build().unwrap_or_default();
        Self {
            endpoint: Arc::new(endpoint),
            http,
            active: Arc::new(Mutex::new(None)),
            next_stream_id: Arc::new(AtomicU64::new(0)),
        }
    }

    fn url(&self, path: &str) -> Option<String> {
        let port = self.endpoint.running_port()?;
        Some(format!("http://{ENGINE_HOST}:{port}{path}"))
    }

    /// Embedding vector for `text`, or `None` if the engine is not running
    /// or answered with anything unusable.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let url = self.url(EMBEDDING_PATH)?;
        let response = match self
            .http
            .post(&url)
            .json(&EmbeddingRequest { content: text })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Embedding request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Embedding request rejected");
            return None;
        }

        let body = response.bytes().await.ok()?;
        match serde_json::from_slice::<EmbeddingResponse>(&body) {
            Ok(parsed) => parsed.into_vector(),
            Err(e) => {
                debug!(error = %e, "Malformed embedding response");
                None
            }
        }
    }

    /// Single-shot chat completion.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
    ) -> Result<String, ClientError> {
        let url = self
            .url(CHAT_COMPLETIONS_PATH)
            .ok_or(ClientError::NotRunning)?;
        let request = ChatRequest::new(messages, options, false);

        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: ChatResponse = serde_json::from_slice(&body)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        parsed
            .into_content()
            .ok_or_else(|| ClientError::Protocol("response has no message content".to_string()))
    }

    /// Streamed chat completion.
    ///
    /// Never fails up front: problems are reported through the stream's
    /// single [`StreamEvent::End`].
    pub fn chat_stream(&self, messages: &[ChatMessage], options: ChatOptions) -> ChatStream {
        let Some(url) = self.url(CHAT_COMPLETIONS_PATH) else {
            return ChatStream::ended(StreamEnd::Failed(ClientError::NotRunning.to_string()));
        };

        let id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        if let Some(previous) = self.track(TrackedStream {
            id,
            cancel: cancel.clone(),
        }) {
            info!(previous = previous.id, "Replacing in-flight chat stream");
            previous.cancel.cancel();
        }

        let active = Arc::clone(&self.active);
        stream::spawn_stream(
            self.http.clone(),
            url,
            ChatRequest::new(messages, options, true),
            cancel,
            move || {
                if let Ok(mut slot) = active.lock() {
                    if slot.as_ref().is_some_and(|tracked| tracked.id == id) {
                        *slot = None;
                    }
                }
            },
        )
    }

    /// Callback form of [`Self::chat_stream`]. `on_end` runs exactly once.
    pub async fn chat_stream_with(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
        on_chunk: impl FnMut(String),
        on_end: impl FnOnce(StreamEnd),
    ) -> StreamEnd {
        self.chat_stream(messages, options)
            .for_each_event(on_chunk, on_end)
            .await
    }

    /// Cancel the tracked stream. Returns whether there was one.
    pub fn abort_stream(&self) -> bool {
        let tracked = self.active.lock().ok().and_then(|mut slot| slot.take());
        match tracked {
            Some(tracked) => {
                debug!(stream = tracked.id, "Aborting chat stream");
                tracked.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a stream is currently tracked.
    pub fn has_active_stream(&self) -> bool {
        self.active.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn track(&self, stream: TrackedStream) -> Option<TrackedStream> {
        match self.active.lock() {
            Ok(mut slot) => slot.replace(stream),
            Err(_) => None,
        }
    }
}

impl std::fmt::Debug for EngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineClient")
            .field("port", &self.endpoint.running_port())
            .field("has_active_stream", &self.has_active_stream())
            .finish_non_exhaustive()
    }
}
