//! Streamed chat completions as a [`Stream`] of events.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::sse::{SseDecoder, SseEvent};
use super::wire::ChatRequest;

const EVENT_BUFFER: usize = 64;

/// How a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// `[DONE]` was received or the body ended cleanly.
    Completed,
    /// The stream was cancelled.
    Aborted,
    /// Transport or status failure.
    Failed(String),
}

/// One item of a [`ChatStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    /// Always the last item, exactly once.
    End(StreamEnd),
}

/// Streamed chat completion.
///
/// Yields [`StreamEvent::Chunk`]s in the order the engine sent them, then
/// exactly one [`StreamEvent::End`], then finishes. Dropping the stream
/// cancels the request.
#[derive(Debug)]
pub struct ChatStream {
    events: ReceiverStream<StreamEvent>,
    cancel: CancellationToken,
    ended: bool,
}

impl ChatStream {
    fn new(events: mpsc::Receiver<StreamEvent>, cancel: CancellationToken) -> Self {
        Self {
            events: ReceiverStream::new(events),
            cancel,
            ended: false,
        }
    }

    /// A stream that ends immediately with `end`.
    pub(crate) fn ended(end: StreamEnd) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(StreamEvent::End(end));
        Self::new(rx, CancellationToken::new())
    }

    /// Cancel this stream. Its `End(Aborted)` is still delivered.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Drive the stream to its end through callbacks.
    pub async fn for_each_event(
        mut self,
        mut on_chunk: impl FnMut(String),
        on_end: impl FnOnce(StreamEnd),
    ) -> StreamEnd {
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Chunk(text) => on_chunk(text),
                StreamEvent::End(end) => {
                    on_end(end.clone());
                    return end;
                }
            }
        }
        // `poll_next` always yields an End before finishing.
        let end = StreamEnd::Failed("stream closed".to_string());
        on_end(end.clone());
        end
    }
}

impl Stream for ChatStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.ended {
            return Poll::Ready(None);
        }

        match self.events.poll_next_unpin(cx) {
            Poll::Ready(Some(event)) => {
                if matches!(event, StreamEvent::End(_)) {
                    self.ended = true;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                self.ended = true;
                Poll::Ready(Some(StreamEvent::End(StreamEnd::Failed(
                    "stream closed unexpectedly".to_string(),
                ))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ChatStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the request task and hand back its stream.
///
/// `on_finish` runs once the task is done, whatever the outcome.
pub(crate) fn spawn_stream(
    http: Client,
    url: String,
    request: ChatRequest,
    cancel: CancellationToken,
    on_finish: impl FnOnce() + Send + 'static,
) -> ChatStream {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        let end = tokio::select! {
            biased;
            () = task_cancel.cancelled() => StreamEnd::Aborted,
            () = tx.closed() => StreamEnd::Aborted,
            end = pump(&http, &url, &request, &tx) => end,
        };
        debug!(?end, "Chat stream finished");
        on_finish();
        let _ = tx.send(StreamEvent::End(end)).await;
    });

    ChatStream::new(rx, cancel)
}

async fn pump(
    http: &Client,
    url: &str,
    request: &ChatRequest,
    tx: &mpsc::Sender<StreamEvent>,
) -> StreamEnd {
    let response = match http.post(url).json(request).send().await {
        Ok(response) => response,
        Err(e) => return StreamEnd::Failed(e.to_string()),
    };
    let status = response.status();
    if !status.is_success() {
        return StreamEnd::Failed(format!("engine returned HTTP {}", status.as_u16()));
    }

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(next) = body.next().await {
        let bytes = match next {
            Ok(bytes) => bytes,
            Err(e) => return StreamEnd::Failed(e.to_string()),
        };
        for event in decoder.push(&bytes) {
            match event {
                SseEvent::Delta(text) => {
                    if tx.send(StreamEvent::Chunk(text)).await.is_err() {
                        return StreamEnd::Aborted;
                    }
                }
                SseEvent::Done => return StreamEnd::Completed,
            }
        }
    }

    match decoder.finish() {
        Some(SseEvent::Delta(text)) => {
            if tx.send(StreamEvent::Chunk(text)).await.is_err() {
                return StreamEnd::Aborted;
            }
        }
        Some(SseEvent::Done) | None => {}
    }
    StreamEnd::Completed
}
