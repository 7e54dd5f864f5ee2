// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bounded TTL cache for resolved verification keys.
//!
//! Entries are evicted oldest-inserted first once the cache is full. Reads
//! use `peek`, so a hit does not refresh an entry's position and the LRU
//! order stays equal to insertion order. An entry older than the TTL is
//! never returned: `get` drops it on access and the optional sweeper task
//! clears whatever is left.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::jwks::VerificationKey;

/// Default key TTL (120 seconds).
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(120);

/// Default sweep interval (240 seconds).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(240);

/// Default number of keys held.
pub const DEFAULT_CAPACITY: usize = 5;

/// Cached key + insertion timestamp.
#[derive(Clone)]
pub struct CachedKey {
    pub key: Arc<VerificationKey>,
    pub inserted_at: Instant,
}

/// In-process key cache shared by every request.
pub struct KeyCache {
    entries: Mutex<LruCache<String, CachedKey>>,
    ttl: Duration,
}

impl KeyCache {
    /// Create a new cache with the given capacity and TTL.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live key by id.
    ///
    /// Returns `None` if not cached or expired.
    pub fn get(&self, key_id: &str) -> Option<Arc<VerificationKey>> {
        let mut entries = self.entries.lock().ok()?;
        if let Some(entry) = entries.peek(key_id) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(Arc::clone(&entry.key));
            }
            entries.pop(key_id);
            tracing::debug!(key_id, "Dropped expired key on access");
        }
        None
    }

    /// Store a key, evicting the oldest entry when full.
    pub fn put(&self, key_id: &str, key: Arc<VerificationKey>) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        let evicted = entries.push(
            key_id.to_string(),
            CachedKey {
                key,
                inserted_at: Instant::now(),
            },
        );
        if let Some((evicted_id, _)) = evicted {
            if evicted_id != key_id {
                tracing::debug!(key_id = %evicted_id, "Evicted key at capacity");
            }
        }
    }

    /// Remove every entry older than the TTL. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= self.ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            entries.pop(id);
        }
        expired.len()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run [`KeyCache::evict_expired`] every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        let removed = self.evict_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired keys");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!("Key cache sweeper shutting down");
                        return;
                    }
                }
            }
        })
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_KEY_TTL)
    }
}
