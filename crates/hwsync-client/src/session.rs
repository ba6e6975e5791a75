//! Session token cache
//!
//! One cache per client, shared by every worker. Reads go through an
//! `RwLock`; a refresh is single-flight behind a `Mutex`, and every token
//! carries a generation so a worker holding a stale token only invalidates
//! that exact token.

use crate::error::HardwareResult;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// A session token as handed out by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    generation: u64,
}

impl SessionToken {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct SessionCache {
    token: RwLock<Option<SessionToken>>,
    refresh: Mutex<()>,
    generations: AtomicU64,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached token, if any
    pub async fn current(&self) -> Option<SessionToken> {
        self.token.read().await.clone()
    }

    /// Return the cached token or run `login` to obtain one.
    ///
    /// Concurrent callers that find the cache empty wait on the same refresh
    /// and `login` runs once.
    pub async fn get_or_refresh<F, Fut>(&self, login: F) -> HardwareResult<SessionToken>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HardwareResult<String>>,
    {
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        let value = login().await?;
        let token = SessionToken {
            value,
            generation: self.generations.fetch_add(1, Ordering::SeqCst) + 1,
        };
        *self.token.write().await = Some(token.clone());
        debug!(generation = token.generation, "Session token refreshed");
        Ok(token)
    }

    /// Drop `stale` if it is still the cached token.
    ///
    /// Returns false when another worker already replaced or dropped it.
    pub async fn invalidate(&self, stale: &SessionToken) -> bool {
        let mut token = self.token.write().await;
        match token.as_ref() {
            Some(current) if current.generation == stale.generation => {
                *token = None;
                true
            }
            _ => false,
        }
    }

    /// Number of logins performed so far
    pub fn refresh_count(&self) -> u64 {
        self.generations.load(Ordering::SeqCst)
    }
}
