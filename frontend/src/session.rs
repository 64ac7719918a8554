use std::borrow::Cow;

use crate::models::{ChatMessage, Role};

/// Shown in place of a reply when the request fails.
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    /// Submitted; the assistant placeholder exists but has no content yet.
    AwaitingFirstByte,
    /// The placeholder is being filled in place.
    Streaming,
}

/// Incremental UTF-8 decoder for a byte stream cut at arbitrary points.
///
/// An incomplete trailing sequence is held back until the next chunk; invalid
/// bytes become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Truncated sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    /// Ends the stream, turning any held-back bytes into replacement characters.
    pub fn flush(&mut self) -> String {
        let rest = match String::from_utf8_lossy(&self.pending) {
            Cow::Borrowed(text) => text.to_string(),
            Cow::Owned(text) => text,
        };
        self.pending.clear();
        rest
    }
}

/// Conversation state for one page load.
///
/// While a request is in flight the message list always ends with the
/// assistant placeholder, which is edited in place and never duplicated.
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    phase: Phase,
    decoder: Utf8Decoder,
}

impl ChatSession {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn can_submit(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Starts a new turn. Returns the message to send, or `None` when the input
    /// is blank or a reply is still streaming.
    pub fn submit(&mut self, input: &str) -> Option<String> {
        let message = input.trim();
        if message.is_empty() || !self.can_submit() {
            return None;
        }

        self.messages.push(ChatMessage::user(message));
        self.messages.push(ChatMessage::assistant(""));
        self.decoder = Utf8Decoder::default();
        self.phase = Phase::AwaitingFirstByte;
        Some(message.to_string())
    }

    /// Appends one raw body chunk to the placeholder.
    pub fn receive(&mut self, bytes: &[u8]) {
        if self.phase == Phase::Idle {
            return;
        }
        let text = self.decoder.decode(bytes);
        if self.append_to_placeholder(&text) {
            self.phase = Phase::Streaming;
        }
    }

    /// The response body ended normally.
    pub fn finish(&mut self) {
        if self.phase == Phase::Idle {
            return;
        }
        let rest = self.decoder.flush();
        self.append_to_placeholder(&rest);
        self.phase = Phase::Idle;
    }

    /// The request failed at the fetch level or the body broke off.
    pub fn fail(&mut self) {
        match self.messages.last_mut() {
            Some(last) if self.phase != Phase::Idle && last.role == Role::Assistant && last.content.is_empty() => {
                last.content = APOLOGY.to_string();
            }
            _ => self.messages.push(ChatMessage::assistant(APOLOGY)),
        }
        self.decoder = Utf8Decoder::default();
        self.phase = Phase::Idle;
    }

    /// Returns whether anything was appended.
    fn append_to_placeholder(&mut self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        match self.messages.last_mut().filter(|m| m.role == Role::Assistant) {
            Some(last) => {
                last.content.push_str(text);
                true
            }
            None => false,
        }
    }
}
