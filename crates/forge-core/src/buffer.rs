//! Per-task content buffers
//!
//! A [`ContentBuffer`] holds the raw text written once by the generation
//! pipeline, its normalized form, and the revealed prefix of the
//! normalized text. The reveal buffer only ever grows by the exact next
//! characters of its source.

use crate::error::BufferError;
use serde::{Deserialize, Serialize};

/// Raw, clean and revealed content of one task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBuffer {
    raw: Option<String>,
    clean: String,
    clean_chars: usize,
    revealed: String,
    revealed_chars: usize,
}

impl ContentBuffer {
    /// Create empty buffer
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store generated content; only the first write is accepted
    pub fn set_generated(&mut self, raw: String, clean: String) -> Result<(), BufferError> {
        if self.raw.is_some() {
            return Err(BufferError::AlreadyWritten);
        }
        self.clean_chars = clean.chars().count();
        self.clean = clean;
        self.raw = Some(raw);
        Ok(())
    }

    /// Append the next revealed chunk
    ///
    /// `cursor` is the char position of the source after the chunk. The
    /// chunk must start exactly at the current reveal position and match
    /// the source.
    pub fn append_reveal(&mut self, chunk: &str, cursor: usize) -> Result<(), BufferError> {
        if self.raw.is_none() {
            return Err(BufferError::NoSource);
        }
        let len = chunk.chars().count();
        if self.revealed_chars + len != cursor || cursor > self.clean_chars {
            return Err(BufferError::OutOfOrder {
                revealed: self.revealed_chars,
                cursor,
            });
        }
        let expected = self.clean[self.revealed.len()..].chars().take(len);
        if let Some(offset) = expected.zip(chunk.chars()).position(|(a, b)| a != b) {
            return Err(BufferError::Mismatch {
                at: self.revealed_chars + offset,
            });
        }
        self.revealed.push_str(chunk);
        self.revealed_chars = cursor;
        Ok(())
    }

    /// Reveal everything that is left; returns the number of chars added
    pub fn flush_reveal(&mut self) -> Result<usize, BufferError> {
        if self.raw.is_none() {
            return Err(BufferError::NoSource);
        }
        let rest = &self.clean[self.revealed.len()..];
        let added = self.clean_chars - self.revealed_chars;
        self.revealed.push_str(rest);
        self.revealed_chars = self.clean_chars;
        Ok(added)
    }

    /// Whether generated content has been stored
    #[inline]
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.raw.is_some()
    }

    /// Whether the whole clean content is revealed
    #[inline]
    #[must_use]
    pub fn is_fully_revealed(&self) -> bool {
        self.raw.is_some() && self.revealed_chars == self.clean_chars
    }

    /// Reveal progress, 0-100
    #[must_use]
    pub fn progress(&self) -> f64 {
        match (self.raw.is_some(), self.clean_chars) {
            (false, _) => 0.0,
            (true, 0) => 100.0,
            (true, total) => self.revealed_chars as f64 / total as f64 * 100.0,
        }
    }

    /// Raw generated content
    #[inline]
    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Normalized content
    #[inline]
    #[must_use]
    pub fn clean(&self) -> &str {
        &self.clean
    }

    /// Revealed prefix of the normalized content
    #[inline]
    #[must_use]
    pub fn revealed(&self) -> &str {
        &self.revealed
    }

    /// Revealed length in chars
    #[inline]
    #[must_use]
    pub fn revealed_chars(&self) -> usize {
        self.revealed_chars
    }

    /// Normalized length in chars
    #[inline]
    #[must_use]
    pub fn clean_chars(&self) -> usize {
        self.clean_chars
    }
}
