//! Incremental decoder for `data:`-framed completion streams.
//!
//! Both the chat relay (reading the gateway) and the chat consumer (reading the
//! relay) feed raw network reads through `FrameDecoder`. Reads never align with
//! line boundaries, so the decoder owns a text buffer that survives across
//! `feed` calls.
//!
//! A line that is newline-terminated but fails to parse as JSON is pushed back
//! onto the front of the buffer and decoding of the current read stops. The
//! line is retried on the next read.

use serde_json::{json, Value};

const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    /// Tail of a multi-byte UTF-8 sequence split across reads.
    partial_utf8: Vec<u8>,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` sentinel has been observed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feeds one network read and returns the content deltas it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.decode_utf8(chunk);

        let mut deltas = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let rest = self.buffer.split_off(newline + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.pop(); // '\n'
            if line.ends_with('\r') {
                line.pop();
            }

            if line.starts_with(':') || line.trim().is_empty() {
                continue;
            }
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let payload = payload.trim();

            if payload == DONE_SENTINEL {
                self.done = true;
                self.buffer.clear();
                break;
            }

            match serde_json::from_str::<Value>(payload) {
                Ok(frame) => {
                    if let Some(delta) = extract_delta(&frame) {
                        deltas.push(delta.to_string());
                    }
                }
                Err(_) => {
                    // Assume the frame was cut mid-read; retry it with the next one.
                    line.push('\n');
                    line.push_str(&self.buffer);
                    self.buffer = line;
                    break;
                }
            }
        }
        deltas
    }

    /// Ends the stream. Any unterminated remainder is discarded; returns its byte length.
    pub fn finish(self) -> usize {
        self.buffer.len() + self.partial_utf8.len()
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.partial_utf8);
        bytes.extend_from_slice(chunk);

        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.partial_utf8 = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Reads `choices[0].delta.content` from a decoded frame.
fn extract_delta(frame: &Value) -> Option<&str> {
    frame
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Builds the payload of a frame carrying one content delta.
pub fn encode_delta(delta: &str) -> String {
    json!({ "choices": [{ "delta": { "content": delta } }] }).to_string()
}
