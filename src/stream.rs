use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tracing::debug;

use crate::error::LLMError;
use crate::http::HttpBodyStream;
use crate::types::{AssembledResponse, DeltaCallback, StreamEvent, UsageMode};

/// Result of decoding a single complete line of a streamed body.
#[derive(Debug)]
pub enum DecodedLine {
    /// Zero or more events carried by the line.
    Events(Vec<StreamEvent>),
    /// Framing or keep-alive line without payload.
    Ignored,
    /// Explicit end-of-stream marker; the remaining input is not read.
    Done,
    /// The payload could not be parsed; skipped.
    Malformed(String),
    /// The provider reported an error in-band; ends the stream.
    Failed(LLMError),
}

/// Per-provider interpretation of one line of a streamed body.
///
/// Implementations only see complete, UTF-8 decoded lines without the trailing
/// newline; byte buffering and chunk boundaries are handled by [`StreamDecoder`].
pub trait LineDecoder: Send {
    fn decode_line(&mut self, line: &str) -> DecodedLine;
}

/// Turns a raw HTTP body into [`StreamEvent`] values.
///
/// Bytes are buffered until a newline arrives, so a chunk boundary that splits a
/// multi-byte character or a JSON payload never corrupts the line. When the body
/// ends, a trailing line without newline is still decoded.
pub struct StreamDecoder<D> {
    body: HttpBodyStream,
    decoder: D,
    buffer: Vec<u8>,
    pending: VecDeque<Result<StreamEvent, LLMError>>,
    provider: &'static str,
    stream_closed: bool,
    finished: bool,
}

impl<D: LineDecoder> StreamDecoder<D> {
    pub fn new(body: HttpBodyStream, decoder: D, provider: &'static str) -> Self {
        Self {
            body,
            decoder,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            provider,
            stream_closed: false,
            finished: false,
        }
    }

    fn handle_line(&mut self, mut line: Vec<u8>) {
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        match self.decoder.decode_line(text) {
            DecodedLine::Events(events) => self.pending.extend(events.into_iter().map(Ok)),
            DecodedLine::Ignored => {}
            DecodedLine::Done => self.finished = true,
            DecodedLine::Malformed(reason) => {
                debug!(provider = self.provider, %reason, line = text, "skipping malformed stream line");
            }
            DecodedLine::Failed(err) => {
                self.pending.push_back(Err(err));
                self.finished = true;
            }
        }
    }

    fn drain_lines(&mut self) {
        while !self.finished {
            let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') else {
                break;
            };
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            self.handle_line(line);
        }
    }
}

impl<D: LineDecoder + Unpin> Stream for StreamDecoder<D> {
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }

            if this.finished {
                return Poll::Ready(None);
            }

            if this.stream_closed {
                if !this.buffer.is_empty() {
                    let line = std::mem::take(&mut this.buffer);
                    this.handle_line(line);
                }
                this.finished = true;
                continue;
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    this.drain_lines();
                }
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => this.stream_closed = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Folds stream events into an [`AssembledResponse`].
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    response: AssembledResponse,
}

impl ResponseAssembler {
    pub fn new(streamed: bool) -> Self {
        Self {
            response: AssembledResponse {
                streamed,
                ..AssembledResponse::default()
            },
        }
    }

    /// Applies one event, returning the text that should be forwarded to the delta
    /// callback, if any.
    pub fn apply(&mut self, event: StreamEvent) -> Option<String> {
        match event {
            StreamEvent::ContentDelta { text } => {
                if text.is_empty() {
                    return None;
                }
                self.response.text.push_str(&text);
                Some(text)
            }
            StreamEvent::UsageUpdate {
                input_tokens,
                output_tokens,
                mode,
            } => {
                merge_counter(&mut self.response.input_tokens, input_tokens, mode);
                merge_counter(&mut self.response.output_tokens, output_tokens, mode);
                None
            }
            StreamEvent::TerminalReason { reason } => {
                if reason.is_some() {
                    self.response.terminal_reason = reason;
                }
                None
            }
        }
    }

    pub fn snapshot(&self) -> AssembledResponse {
        self.response.clone()
    }

    pub fn finish(self) -> AssembledResponse {
        self.response
    }
}

fn merge_counter(slot: &mut Option<u64>, value: Option<u64>, mode: UsageMode) {
    let Some(value) = value else {
        return;
    };
    *slot = Some(match mode {
        UsageMode::Cumulative => value,
        UsageMode::Incremental => slot.unwrap_or(0) + value,
    });
}

/// A stream that failed after some content was already assembled.
#[derive(Debug)]
pub struct PartialFailure {
    pub error: LLMError,
    pub partial: AssembledResponse,
}

/// Drains `events`, invoking `on_delta` synchronously for every text fragment in
/// arrival order.
///
/// # Errors
///
/// On the first failed item the response assembled so far is returned alongside the
/// error instead of being discarded.
pub async fn assemble<S>(
    mut events: S,
    on_delta: Option<&DeltaCallback>,
) -> Result<AssembledResponse, PartialFailure>
where
    S: Stream<Item = Result<StreamEvent, LLMError>> + Unpin,
{
    let mut assembler = ResponseAssembler::new(true);
    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                if let Some(text) = assembler.apply(event) {
                    if let Some(callback) = on_delta {
                        callback(&text);
                    }
                }
            }
            Err(error) => {
                return Err(PartialFailure {
                    error,
                    partial: assembler.finish(),
                });
            }
        }
    }
    Ok(assembler.finish())
}

/// Extracts the payload of an event-stream `data:` line.
///
/// `event:`, `id:` and comment lines carry nothing the decoders need.
pub(crate) fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Extracts a standalone JSON object from a newline-delimited line.
///
/// Tolerates a `data:` marker and the punctuation of a JSON array emitted one
/// element per line.
pub(crate) fn ndjson_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    let line = line.strip_prefix("data:").map(str::trim).unwrap_or(line);
    let payload = line
        .trim_start_matches(['[', ','])
        .trim_end_matches([']', ','])
        .trim();
    if payload.is_empty() { None } else { Some(payload) }
}
