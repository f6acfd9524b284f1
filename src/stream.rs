use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tracing::trace;

use crate::error::LLMError;
use crate::http::HttpBodyStream;

/// How payload lines are framed inside a streaming body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Server-Sent Events: only `data:` lines carry payloads; `event:`, comments and
    /// blank separators are dropped.
    SseData,
    /// One JSON document per line with no prefix.
    JsonLines,
}

/// Splits a raw HTTP body stream into complete payload lines.
///
/// Bytes are buffered until a newline arrives, so a read boundary falling inside a line
/// (or inside a multi-byte character) never produces a partial payload. Lines that are not
/// valid UTF-8 are skipped.
pub struct LineDecoder {
    body: HttpBodyStream,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    framing: Framing,
    stream_closed: bool,
}

impl LineDecoder {
    /// Wraps a raw HTTP body stream.
    pub fn new(body: HttpBodyStream, framing: Framing) -> Self {
        Self {
            body,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            framing,
            stream_closed: false,
        }
    }

    fn handle_line(&mut self, line: Vec<u8>) {
        let text = match String::from_utf8(line) {
            Ok(text) => text,
            Err(err) => {
                trace!(error = %err, "skipping stream line with invalid UTF-8");
                return;
            }
        };
        let payload = match self.framing {
            Framing::SseData => match text.strip_prefix("data:") {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
                None => return,
            },
            Framing::JsonLines => text.as_str(),
        };
        let payload = payload.trim();
        if !payload.is_empty() {
            self.pending.push_back(payload.to_string());
        }
    }

    fn drain_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
        buffer.iter().position(|b| *b == b'\n').map(|pos| {
            let mut line: Vec<u8> = buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            line
        })
    }
}

impl Stream for LineDecoder {
    type Item = Result<String, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(line) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(line)));
            }

            if this.stream_closed {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                // Trailing line without a terminating newline.
                let line = std::mem::take(&mut this.buffer);
                this.handle_line(line);
                continue;
            }

            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.buffer.extend_from_slice(&bytes);
                    while let Some(line) = Self::drain_line(&mut this.buffer) {
                        this.handle_line(line);
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    // The body is unusable after a transport failure.
                    this.stream_closed = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => this.stream_closed = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
