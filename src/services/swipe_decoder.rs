//! Magstripe track decoding from raw keystrokes
//!
//! Track format: `;` start sentinel, card digits, `=` separator, trailing
//! digits, `?` end sentinel. Example: `;123456=4567?` decodes to `123456`.
//!
//! Characters accumulate until the tail of the buffer matches a full track.
//! Anything typed before the start sentinel is ignored by the match, and the
//! buffer is dropped once it grows past the configured cap.

use crate::domain::CardId;
use tracing::{debug, trace};

const START_SENTINEL: char = ';';
const SEPARATOR: char = '=';
const END_SENTINEL: char = '?';

/// Default cap on characters held without a match
pub const DEFAULT_MAX_BUFFER_LEN: usize = 256;

#[derive(Debug)]
pub struct SwipeDecoder {
    buffer: String,
    max_len: usize,
}

impl Default for SwipeDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_LEN)
    }
}

impl SwipeDecoder {
    pub fn new(max_len: usize) -> Self {
        Self { buffer: String::with_capacity(64), max_len: max_len.max(1) }
    }

    /// Feed one character; returns the card id when a track completes
    pub fn feed(&mut self, c: char) -> Option<CardId> {
        self.buffer.push(c);

        if c == END_SENTINEL {
            if let Some(card_id) = Self::match_track(&self.buffer).map(str::to_string) {
                trace!(card_id = %card_id, "swipe_decoded");
                self.buffer.clear();
                return Some(CardId(card_id));
            }
        }

        if self.buffer.chars().count() > self.max_len {
            debug!(discarded = self.buffer.len(), "swipe_buffer_overflow");
            self.buffer.clear();
        }

        None
    }

    /// Characters currently buffered
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Match `;<digits>=<digits>?` ending at the last character of `buf`.
    /// Returns the card digits of the rightmost complete track.
    fn match_track(buf: &str) -> Option<&str> {
        let body = buf.strip_suffix(END_SENTINEL)?;

        // Trailing digits between `=` and `?`
        let trailing_start = digit_suffix_start(body);
        if trailing_start == body.len() {
            return None;
        }
        let head = &body[..trailing_start];
        let head = head.strip_suffix(SEPARATOR)?;

        // Card digits between `;` and `=`
        let card_start = digit_suffix_start(head);
        let card = &head[card_start..];
        if card.is_empty() || !head[..card_start].ends_with(START_SENTINEL) {
            return None;
        }

        Some(card)
    }
}

/// Byte offset where the run of ASCII digits at the end of `s` begins
fn digit_suffix_start(s: &str) -> usize {
    s.char_indices()
        .rev()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(0, |(i, c)| i + c.len_utf8())
}
