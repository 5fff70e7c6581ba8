//! Decoder for the newline-delimited `/api/chat/stream` body.

use super::{ChatError, ChatResult};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::{debug, warn};

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_TOKEN: &str = "[DONE]";

/// Longest line held back waiting for its newline. Anything longer is
/// dropped up to the next newline.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Content(String),
    Done,
}

#[derive(Deserialize)]
struct ContentPayload {
    content: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Interprets one line of the body. Returns `None` for lines that carry no
/// fragment, including malformed `data:` payloads, which are logged.
pub fn parse_frame(line: &str) -> Option<Frame> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let data = line.strip_prefix(DATA_PREFIX)?;
    if data == DONE_TOKEN {
        return Some(Frame::Done);
    }

    match serde_json::from_str::<ContentPayload>(data) {
        Ok(ContentPayload {
            content: Some(content),
            ..
        }) => (!content.is_empty()).then_some(Frame::Content(content)),
        Ok(ContentPayload { error: Some(err), .. }) => {
            warn!("stream frame reported an upstream error: {}", err);
            None
        }
        Ok(_) => {
            warn!("skipping stream frame without content: {}", data);
            None
        }
        Err(err) => {
            warn!("skipping malformed stream frame ({}): {}", err, data);
            None
        }
    }
}

/// Line-buffering frame splitter with carry-over between reads.
///
/// Bytes are decoded to text only once a whole line is available, so a
/// multi-byte character split by a read boundary is reassembled first.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    discarding: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read and returns the frames completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut rest = chunk;
        while let Some(offset) = rest.iter().position(|b| *b == b'\n') {
            if self.discarding {
                self.discarding = false;
            } else {
                self.pending.extend_from_slice(&rest[..offset]);
                frames.extend(self.take_line());
            }
            rest = &rest[offset + 1..];
        }

        if !self.discarding {
            self.pending.extend_from_slice(rest);
            if self.pending.len() > MAX_LINE_BYTES {
                warn!(
                    "discarding stream line over {} bytes without a newline",
                    MAX_LINE_BYTES
                );
                self.pending.clear();
                self.discarding = true;
            }
        }
        frames
    }

    fn take_line(&mut self) -> Option<Frame> {
        let frame = if self.pending.len() > MAX_LINE_BYTES {
            warn!("discarding stream line of {} bytes", self.pending.len());
            None
        } else {
            parse_frame(&String::from_utf8_lossy(&self.pending))
        };
        self.pending.clear();
        frame
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Ends input. A trailing line that never got its newline is still
    /// interpreted as a frame.
    pub fn finish(&mut self) -> Option<Frame> {
        if std::mem::take(&mut self.discarding) || self.pending.is_empty() {
            self.pending.clear();
            return None;
        }
        self.take_line()
    }
}

struct DecodeState<S> {
    body: S,
    decoder: FrameDecoder,
    ready: VecDeque<String>,
    frames: usize,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn absorb(&mut self, frames: impl IntoIterator<Item = Frame>) {
        for frame in frames {
            if self.finished {
                break;
            }
            self.frames += 1;
            match frame {
                Frame::Content(content) => {
                    debug!("stream fragment #{}: {} bytes", self.frames, content.len());
                    self.ready.push_back(content);
                }
                Frame::Done => {
                    debug!("stream terminator after {} frames", self.frames);
                    self.finished = true;
                }
            }
        }
    }
}

/// Turns a chunked response body into its ordered content fragments.
///
/// The sequence ends at the `[DONE]` frame or at end of input, both of which
/// are a normal finish. A failed read yields one `Err` and ends the sequence.
pub fn decode_fragments<S, B, E>(body: S) -> impl Stream<Item = ChatResult<String>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ChatError> + Send + 'static,
{
    let state = DecodeState {
        body,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        frames: 0,
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.ready.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.push(chunk.as_ref());
                    state.absorb(frames);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    return Some((Err(err.into()), state));
                }
                None => {
                    let tail = state.decoder.finish();
                    state.absorb(tail);
                    state.finished = true;
                }
            }
        }
    })
}
