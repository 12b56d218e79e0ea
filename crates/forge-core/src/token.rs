//! Generation tokens
//!
//! Every task activation receives a fresh [`GenerationToken`]. Workers hold
//! the token they were started with and compare it against the session's
//! current token (published through a `watch` channel) before doing
//! anything observable. Invalidating the current token turns every
//! outstanding continuation for that task into a no-op.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Monotonically increasing activation token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenerationToken(u64);

impl GenerationToken {
    /// Raw value
    #[inline]
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Issues strictly increasing tokens
#[derive(Debug, Default)]
pub struct TokenIssuer {
    last: u64,
}

impl TokenIssuer {
    /// Create issuer; the first token is `#1`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next token
    pub fn issue(&mut self) -> GenerationToken {
        self.last += 1;
        GenerationToken(self.last)
    }
}

/// Writer side of the current-token cell, owned by the session driver
#[derive(Debug)]
pub struct TokenCell {
    issuer: TokenIssuer,
    tx: watch::Sender<Option<GenerationToken>>,
}

impl TokenCell {
    /// Create cell with no current token
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            issuer: TokenIssuer::new(),
            tx,
        }
    }

    /// Issue a fresh token and make it current
    pub fn activate(&mut self) -> GenerationToken {
        let token = self.issuer.issue();
        self.tx.send_replace(Some(token));
        token
    }

    /// Clear the current token; every holder becomes stale
    pub fn invalidate(&self) {
        self.tx.send_replace(None);
    }

    /// Token currently accepted, if any
    #[must_use]
    pub fn current(&self) -> Option<GenerationToken> {
        *self.tx.borrow()
    }

    /// Check a token against the current one
    #[must_use]
    pub fn is_current(&self, token: GenerationToken) -> bool {
        self.current() == Some(token)
    }

    /// Read-only view for workers
    #[must_use]
    pub fn reader(&self) -> CurrentToken {
        CurrentToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for TokenCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the current token
#[derive(Debug, Clone)]
pub struct CurrentToken {
    rx: watch::Receiver<Option<GenerationToken>>,
}

impl CurrentToken {
    /// Check whether `token` is still the current one
    #[must_use]
    pub fn is_current(&self, token: GenerationToken) -> bool {
        *self.rx.borrow() == Some(token)
    }
}
