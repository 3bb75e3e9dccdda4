//! Per-block response cache for the remote byte-range backend.
//!
//! The remote walk addresses whole data blocks: every fetch starts at a
//! block's absolute offset, first for the fixed prologue and then, once the
//! block's size fields are visible, expanded to its full `size()`. Responses
//! are therefore cached by block offset, not by aligned file position: an
//! expansion replaces the shorter prologue response under the same key, and
//! any later read of that block (full or prologue-sized) is served from the
//! cached response.
//!
//! Features:
//! - Responses keyed by block offset; a longer response replaces a shorter
//!   one, never the reverse
//! - LRU eviction at capacity
//! - Singleflight: concurrent fetches of one block share a single request

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};

use super::RangeReader;
use crate::error::IoError;

/// Default cache capacity in block responses. A structure walk touches one
/// response per data block plus one per image and annotation byte stream;
/// tile payloads never pass through the cache.
const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Block-response caching wrapper around a [`RangeReader`].
pub struct BlockCache<R> {
    inner: Arc<R>,
    cache: RwLock<LruCache<u64, Bytes>>,
    in_flight: Mutex<HashMap<u64, Arc<Notify>>>,
}

impl<R: RangeReader> BlockCache<R> {
    /// Wrap `inner` with the default capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_CAPACITY)
    }

    /// Wrap `inner`, keeping at most `capacity` block responses.
    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            inner: Arc::new(inner),
            cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("cache capacity must be nonzero"),
            )),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Serve `len` bytes of the block at `offset`, fetching or expanding its
    /// cached response as needed. Concurrent requests for one block share a
    /// single fetch.
    async fn get_block(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        loop {
            {
                let cache = self.cache.read().await;
                if let Some(response) = cache.peek(&offset) {
                    if response.len() >= len {
                        return Ok(response.slice(..len));
                    }
                    // The cached response covers only the block's prologue;
                    // this request expands the block to its full size.
                }
            }

            let notify = {
                let mut in_flight = self.in_flight.lock().await;
                if let Some(notify) = in_flight.get(&offset) {
                    // Another task is fetching this block. Its request may be
                    // shorter than ours, so re-check the cache afterwards.
                    let notify = notify.clone();
                    drop(in_flight);
                    notify.notified().await;
                    continue;
                }
                let notify = Arc::new(Notify::new());
                in_flight.insert(offset, notify.clone());
                notify
            };

            let result = self.inner.read_exact_at(offset, len).await;

            {
                let mut cache = self.cache.write().await;
                let mut in_flight = self.in_flight.lock().await;
                if let Ok(ref response) = result {
                    // Install unless an expansion already put a longer
                    // response under this block offset.
                    match cache.peek(&offset) {
                        Some(existing) if existing.len() >= response.len() => {}
                        _ => {
                            cache.put(offset, response.clone());
                        }
                    }
                }
                in_flight.remove(&offset);
            }
            notify.notify_waiters();

            return result;
        }
    }
}

#[async_trait]
impl<R: RangeReader + 'static> RangeReader for BlockCache<R> {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.inner.size();
        if offset + len as u64 > size {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }
        if len == 0 {
            return Ok(Bytes::new());
        }
        self.get_block(offset, len).await
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}

// =============================================================================
// Tests
// =============================================================================
