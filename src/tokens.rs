//! Round-robin rotation over a pool of GitHub access tokens.
//!
//! Tokens the API rejects are invalidated in place and skipped by every
//! later pick. An empty pool hands out no token at all, so requests go out
//! unauthenticated.

use crate::error::{Result, StarHistoryError};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// A single GitHub token with a validity flag.
pub struct Token {
    key: String,
    valid: RwLock<bool>,
}

impl Token {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            valid: RwLock::new(true),
        }
    }

    /// The raw credential, for the `Authorization` header.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_valid(&self) -> bool {
        *self.valid.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the token as rejected. Requests already using it are not affected.
    pub fn invalidate(&self) {
        warn!(token = %self, "invalidated token");
        *self.valid.write().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

impl fmt::Display for Token {
    /// Shows only the last three characters of the key.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self
            .key
            .char_indices()
            .rev()
            .nth(2)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        write!(f, "...{}", &self.key[start..])
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("key", &format_args!("{}", self))
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Load-balances requests across tokens in rotating order.
#[derive(Debug, Default)]
pub struct TokenPool {
    tokens: Vec<Arc<Token>>,
    next: AtomicUsize,
}

impl TokenPool {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<Arc<Token>> = keys
            .into_iter()
            .map(|key| Arc::new(Token::new(key)))
            .collect();
        debug!("creating round robin with {} tokens", tokens.len());
        Self {
            tokens,
            next: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_valid()).count()
    }

    /// Picks the next valid token.
    ///
    /// Returns `Ok(None)` when the pool was built without tokens, and
    /// [`StarHistoryError::NoValidTokens`] once a full rotation finds every
    /// token invalidated.
    pub fn pick(&self) -> Result<Option<Arc<Token>>> {
        if self.tokens.is_empty() {
            return Ok(None);
        }

        for _ in 0..self.tokens.len() {
            let idx = self.advance();
            let token = &self.tokens[idx];
            if token.is_valid() {
                debug!(token = %token, "picked token");
                return Ok(Some(Arc::clone(token)));
            }
        }

        // Concurrent picks can steer this caller's attempts onto invalid
        // slots only; fail only if the pool really is exhausted.
        match self.tokens.iter().find(|t| t.is_valid()) {
            Some(token) => {
                debug!(token = %token, "picked token after full rotation");
                Ok(Some(Arc::clone(token)))
            }
            None => Err(StarHistoryError::NoValidTokens),
        }
    }

    /// Returns the current cursor and moves it one slot forward in a single
    /// atomic step.
    fn advance(&self) -> usize {
        let len = self.tokens.len();
        match self
            .next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |idx| {
                Some((idx + 1) % len)
            }) {
            Ok(idx) | Err(idx) => idx,
        }
    }
}
