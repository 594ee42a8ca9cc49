//! Streaming contracts and the SSE relay task.
//!
//! A streaming completion is owned by one background task. The task reads the response
//! body line by line and talks to the caller through exactly two channels: `events` for
//! incremental output and `errors` for the single terminal failure (read error or
//! cancellation). Both channels close when the task exits. A clean end is therefore
//! "events closed and errors closed without a value".
//!
//! ```rust
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use futures_util::stream;
//! use rgateway::{StreamEvent, spawn_sse_relay};
//! use tokio_util::sync::CancellationToken;
//!
//! let body = stream::iter(vec![Ok::<_, std::io::Error>(
//!     b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\ndata: [DONE]\n".to_vec(),
//! )]);
//! let mut handle = spawn_sse_relay(body, CancellationToken::new());
//!
//! assert_eq!(handle.events.recv().await, Some(StreamEvent::TextDelta("hi".into())));
//! assert_eq!(handle.events.recv().await, None);
//! assert!(handle.errors.recv().await.is_none());
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::wire::{ApiDeltaToolCall, ApiStreamChunk};
use crate::{GatewayError, TokenUsage, ToolInvocation};

/// Capacity of the event channel between the relay task and its consumer.
pub const EVENT_BUFFER: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty fragment of assistant text, in upstream order.
    TextDelta(String),
    /// Tool calls assembled from deltas; sent once, after the last text fragment.
    ToolCalls(Vec<ToolInvocation>),
    /// Usage reported by the upstream, when it sends any.
    Usage(TokenUsage),
}

/// Receiving side of a running stream.
#[derive(Debug)]
pub struct StreamHandle {
    pub events: mpsc::Receiver<StreamEvent>,
    pub errors: mpsc::Receiver<GatewayError>,
}

impl StreamHandle {
    /// A handle whose stream failed before any byte was read.
    pub fn failed(error: GatewayError) -> Self {
        let (_, events) = mpsc::channel(1);
        let (errors_tx, errors) = mpsc::channel(1);
        let _ = errors_tx.try_send(error);
        Self { events, errors }
    }
}

/// Spawns the relay task over an SSE response body.
///
/// Must be called from within a tokio runtime.
pub fn spawn_sse_relay<S, B, E>(body: S, cancel: CancellationToken) -> StreamHandle
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    spawn_stream_task(cancel, move |cancel, events| async move {
        relay_sse(body, &cancel, &events).await
    })
}

/// Runs `task` on a fresh background task wired to a new pair of channels. An `Err`
/// returned by the task becomes the single value on the error channel.
pub fn spawn_stream_task<F, Fut>(cancel: CancellationToken, task: F) -> StreamHandle
where
    F: FnOnce(CancellationToken, mpsc::Sender<StreamEvent>) -> Fut,
    Fut: Future<Output = Result<(), GatewayError>> + Send + 'static,
{
    let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
    let (errors_tx, errors) = mpsc::channel(1);
    let running = task(cancel, events_tx);

    tokio::spawn(async move {
        if let Err(error) = running.await {
            let _ = errors_tx.try_send(error);
        }
    });

    StreamHandle { events, errors }
}

/// Reads an SSE body to completion, forwarding events in upstream order.
pub async fn relay_sse<S, B, E>(
    body: S,
    cancel: &CancellationToken,
    events: &mpsc::Sender<StreamEvent>,
) -> Result<(), GatewayError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    SseRelay { cancel, events }.run(body).await
}

/// Splits a byte stream into SSE lines. Bytes are buffered until a newline so that
/// multi-byte characters split across reads stay intact.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line = self.buffer.drain(..=position).collect::<Vec<_>>();
            if let Some(line) = decode_line(&line) {
                lines.push(line);
            }
        }
        lines
    }

    /// Returns the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.is_empty() {
            return None;
        }
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    match std::str::from_utf8(raw) {
        Ok(text) => Some(text.trim_end_matches(['\r', '\n']).to_string()),
        Err(error) => {
            tracing::debug!(%error, "skipping non-utf8 stream line");
            None
        }
    }
}

/// Classification of one SSE line.
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
    Ignored,
}

pub fn classify_line(line: &str) -> SseLine<'_> {
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload == "[DONE]" {
        SseLine::Done
    } else if payload.trim().is_empty() {
        SseLine::Ignored
    } else {
        SseLine::Data(payload)
    }
}

enum Flow {
    Continue,
    Done,
}

struct SseRelay<'a> {
    cancel: &'a CancellationToken,
    events: &'a mpsc::Sender<StreamEvent>,
}

impl SseRelay<'_> {
    async fn run<S, B, E>(&self, body: S) -> Result<(), GatewayError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let mut body = std::pin::pin!(body);
        let mut decoder = SseLineDecoder::default();
        let mut tool_calls = ToolCallAccumulator::default();
        let mut usage = None;

        'read: loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled()),
                next = body.next() => next,
            };

            let lines = match next {
                Some(Ok(bytes)) => decoder.push(bytes.as_ref()),
                Some(Err(error)) => {
                    return Err(GatewayError::transport(format!(
                        "failed to read stream: {error}"
                    )));
                }
                None => {
                    let tail = decoder.finish().into_iter().collect::<Vec<_>>();
                    for line in &tail {
                        if let Flow::Done =
                            self.handle_line(line, &mut tool_calls, &mut usage).await?
                        {
                            break;
                        }
                    }
                    break 'read;
                }
            };

            for line in &lines {
                if self.cancel.is_cancelled() {
                    return Err(cancelled());
                }
                if let Flow::Done = self.handle_line(line, &mut tool_calls, &mut usage).await? {
                    break 'read;
                }
            }
        }

        let calls = tool_calls.finish();
        if !calls.is_empty() {
            self.deliver(StreamEvent::ToolCalls(calls)).await?;
        }
        if let Some(usage) = usage {
            self.deliver(StreamEvent::Usage(usage)).await?;
        }
        Ok(())
    }

    async fn handle_line(
        &self,
        line: &str,
        tool_calls: &mut ToolCallAccumulator,
        usage: &mut Option<TokenUsage>,
    ) -> Result<Flow, GatewayError> {
        let payload = match classify_line(line) {
            SseLine::Done => return Ok(Flow::Done),
            SseLine::Ignored => return Ok(Flow::Continue),
            SseLine::Data(payload) => payload,
        };

        let chunk = match serde_json::from_str::<ApiStreamChunk>(payload) {
            Ok(chunk) => chunk,
            Err(error) => {
                tracing::debug!(%error, "skipping malformed stream chunk");
                return Ok(Flow::Continue);
            }
        };

        if let Some(reported) = chunk.usage {
            *usage = Some(reported.into());
        }

        for choice in chunk.choices {
            let Some(delta) = choice.delta else {
                continue;
            };
            for call in delta.tool_calls.unwrap_or_default() {
                tool_calls.push(call);
            }
            if let Some(content) = delta.content
                && !content.is_empty()
            {
                self.deliver(StreamEvent::TextDelta(content)).await?;
            }
        }

        Ok(Flow::Continue)
    }

    /// Sends one event, giving up as soon as the token is cancelled. A dropped receiver
    /// is treated as cancellation.
    async fn deliver(&self, event: StreamEvent) -> Result<(), GatewayError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled()),
            sent = self.events.send(event) => sent.map_err(|_| cancelled()),
        }
    }
}

fn cancelled() -> GatewayError {
    GatewayError::cancelled("stream cancelled")
}

/// Merges tool-call deltas by their index.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    calls: BTreeMap<u32, ToolInvocation>,
}

impl ToolCallAccumulator {
    fn push(&mut self, delta: ApiDeltaToolCall) {
        let index = delta.index.unwrap_or(0);
        let entry = self.calls.entry(index).or_insert_with(|| {
            ToolInvocation::new(format!("call_{index}"), String::new(), String::new())
        });

        if let Some(id) = delta.id {
            entry.id = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                entry.name = name;
            }
            if let Some(arguments) = function.arguments {
                entry.arguments.push_str(&arguments);
            }
        }
    }

    fn finish(self) -> Vec<ToolInvocation> {
        self.calls
            .into_values()
            .filter(|call| !call.name.is_empty())
            .collect()
    }
}
