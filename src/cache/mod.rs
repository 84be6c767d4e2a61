//! Tile cache: computed tiles kept under a memory budget with LRU eviction.
//!
//! Every entry is either *computing* (a worker owns the computation) or
//! *cached*. [`TileCache::get_or_compute`] gives at-most-once computation
//! per key: concurrent requests for a key that is being computed wait on a
//! condition variable and receive the published buffer.
//!
//! ```text
//! absent --miss--> computing --publish--> cached --evict/invalidate--> absent
//!                      |
//!                      +--error/panic/invalidate--> absent
//! ```
//!
//! LRU order is a queue of `(timestamp, key)` access records. Promotion
//! pushes a new record; stale records are skipped during eviction and
//! compacted away when the queue grows.

use std::collections::{HashMap, VecDeque};
use std::ops::Deref;
use std::sync::Arc;

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::error::BakeResult;
use crate::mesh::ContentVersion;
use crate::render::tile::{TileBuffer, TileContentKey};

/// Shared read-only handle to a cached tile.
///
/// The cache owns its buffers; a view keeps the buffer it points at alive
/// after eviction, but it is never updated and never reinserted.
#[derive(Debug)]
pub struct TileView<T>(Arc<TileBuffer<T>>);

impl<T> Clone for TileView<T> {
    fn clone(&self) -> Self {
        TileView(Arc::clone(&self.0))
    }
}

impl<T> Deref for TileView<T> {
    type Target = TileBuffer<T>;

    fn deref(&self) -> &TileBuffer<T> {
        &self.0
    }
}

impl<T> TileView<T> {
    /// True if both views share one buffer.
    pub fn ptr_eq(&self, other: &TileView<T>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// How [`TileCache::get_or_compute`] obtained its tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSource {
    /// Already cached.
    Cached,
    /// Computed by this call.
    Computed,
    /// Computed by another caller this call waited for.
    Shared,
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub oversized_inserts: u64,
}

#[derive(Debug)]
struct CachedTile<T> {
    buffer: Arc<TileBuffer<T>>,
    last_access: u64,
    bytes: usize,
}

#[derive(Debug)]
enum Slot<T> {
    Computing { ticket: u64 },
    Cached(CachedTile<T>),
}

#[derive(Debug)]
struct CacheState<T> {
    entries: HashMap<TileContentKey, Slot<T>>,
    access_order: VecDeque<(u64, TileContentKey)>,
    timestamp: u64,
    resident_bytes: usize,
    next_ticket: u64,
    stats: CacheStats,
}

impl<T: Copy> CacheState<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            access_order: VecDeque::new(),
            timestamp: 0,
            resident_bytes: 0,
            next_ticket: 0,
            stats: CacheStats::default(),
        }
    }

    fn next_stamp(&mut self) -> u64 {
        self.timestamp += 1;
        self.timestamp
    }

    /// Promotes a cached entry to most recently used.
    fn touch(&mut self, key: &TileContentKey) -> Option<Arc<TileBuffer<T>>> {
        let stamp = self.next_stamp();
        let Some(Slot::Cached(tile)) = self.entries.get_mut(key) else {
            return None;
        };
        tile.last_access = stamp;
        let buffer = Arc::clone(&tile.buffer);
        self.access_order.push_back((stamp, *key));
        self.compact_access_order();
        Some(buffer)
    }

    fn is_current(&self, stamp: u64, key: &TileContentKey) -> bool {
        matches!(self.entries.get(key), Some(Slot::Cached(tile)) if tile.last_access == stamp)
    }

    fn compact_access_order(&mut self) {
        if self.access_order.len() <= 2 * self.entries.len() + 64 {
            return;
        }
        let entries = &self.entries;
        self.access_order.retain(|(stamp, key)| {
            matches!(entries.get(key), Some(Slot::Cached(tile)) if tile.last_access == *stamp)
        });
    }

    /// Inserts or replaces a cached entry, then evicts down to `budget`.
    fn store(&mut self, key: TileContentKey, buffer: Arc<TileBuffer<T>>, budget: usize) {
        let bytes = buffer.byte_size();
        let stamp = self.next_stamp();

        if let Some(Slot::Cached(old)) = self.entries.remove(&key) {
            self.resident_bytes -= old.bytes;
        }
        if bytes > budget {
            self.stats.oversized_inserts += 1;
            warn!(
                "tile {:?} needs {} bytes, more than the whole cache budget of {} bytes",
                key.coord, bytes, budget
            );
        }

        self.entries.insert(
            key,
            Slot::Cached(CachedTile {
                buffer,
                last_access: stamp,
                bytes,
            }),
        );
        self.resident_bytes += bytes;
        self.access_order.push_back((stamp, key));
        self.evict_until_under_budget(budget, &key);
        self.compact_access_order();
    }

    /// LRU eviction to stay under `budget`, never evicting `keep`.
    fn evict_until_under_budget(&mut self, budget: usize, keep: &TileContentKey) {
        let mut kept = None;
        while self.resident_bytes > budget {
            let Some((stamp, key)) = self.access_order.pop_front() else {
                break;
            };
            if !self.is_current(stamp, &key) {
                continue;
            }
            if key == *keep {
                kept = Some((stamp, key));
                continue;
            }
            if let Some(Slot::Cached(tile)) = self.entries.remove(&key) {
                self.resident_bytes -= tile.bytes;
                self.stats.evictions += 1;
                debug!("evicted tile {:?} ({} bytes)", key.coord, tile.bytes);
            }
        }
        if let Some(record) = kept {
            self.access_order.push_front(record);
        }
    }

    /// Removes every entry matching `predicate`, cached or computing.
    fn remove_where(&mut self, mut predicate: impl FnMut(&TileContentKey) -> bool) -> usize {
        let mut removed = 0;
        let mut freed = 0;
        self.entries.retain(|key, slot| {
            if !predicate(key) {
                return true;
            }
            removed += 1;
            if let Slot::Cached(tile) = slot {
                freed += tile.bytes;
            }
            false
        });
        self.resident_bytes -= freed;
        self.stats.invalidations += removed as u64;
        self.compact_access_order();
        removed
    }
}

/// Thread-safe tile cache bounded by `budget` bytes of tile memory.
///
/// One cache belongs to one [`crate::engine::Baker`]; there is no global
/// instance.
#[derive(Debug)]
pub struct TileCache<T> {
    state: Mutex<CacheState<T>>,
    computed: Condvar,
    budget: usize,
}

impl<T: Copy + Send + Sync> TileCache<T> {
    pub fn new(budget: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::new()),
            computed: Condvar::new(),
            budget,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Bytes of tile memory currently held.
    pub fn resident_bytes(&self) -> usize {
        self.state.lock().resident_bytes
    }

    /// Number of cached tiles. Tiles being computed are not counted.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .entries
            .values()
            .filter(|slot| matches!(slot, Slot::Cached(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Whether `key` is cached, without promoting it.
    pub fn contains(&self, key: &TileContentKey) -> bool {
        matches!(self.state.lock().entries.get(key), Some(Slot::Cached(_)))
    }

    /// Returns the cached tile for `key` and marks it most recently used.
    /// A tile that is still being computed is a miss.
    pub fn lookup(&self, key: &TileContentKey) -> Option<TileView<T>> {
        let mut state = self.state.lock();
        match state.touch(key) {
            Some(buffer) => {
                state.stats.hits += 1;
                trace!("cache hit for tile {:?}", key.coord);
                Some(TileView(buffer))
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Stores `buffer` under `key`, replacing any previous entry, and evicts
    /// least recently used tiles (never this one) until the budget holds.
    pub fn insert(&self, key: TileContentKey, buffer: TileBuffer<T>) -> TileView<T> {
        let buffer = Arc::new(buffer);
        self.state.lock().store(key, Arc::clone(&buffer), self.budget);
        self.computed.notify_all();
        TileView(buffer)
    }

    /// Drops `key`. A computation in flight for it will not be published.
    /// Returns whether anything was removed.
    pub fn invalidate(&self, key: &TileContentKey) -> bool {
        let removed = self.state.lock().remove_where(|k| k == key) > 0;
        if removed {
            debug!("invalidated tile {:?}", key.coord);
            self.computed.notify_all();
        }
        removed
    }

    /// Drops every tile produced from content `version`.
    pub fn invalidate_version(&self, version: ContentVersion) -> usize {
        let removed = self.state.lock().remove_where(|k| k.version == version);
        debug!("invalidated {} tiles of version {:?}", removed, version);
        self.computed.notify_all();
        removed
    }

    /// Drops everything.
    pub fn invalidate_all(&self) -> usize {
        let removed = self.state.lock().remove_where(|_| true);
        debug!("invalidated all {} tiles", removed);
        self.computed.notify_all();
        removed
    }

    /// Returns the tile for `key`, running `compute` only if no other caller
    /// has cached it or is computing it.
    ///
    /// If `compute` fails or panics the computing entry is removed and
    /// waiting callers retry, one of them taking over the computation. The
    /// failure goes to this caller only; the cache is left as if the key had
    /// never been requested.
    pub fn get_or_compute<F>(&self, key: TileContentKey, compute: F) -> BakeResult<(TileView<T>, TileSource)>
    where
        F: FnOnce() -> BakeResult<TileBuffer<T>>,
    {
        let mut waited = false;
        let ticket = {
            let mut state = self.state.lock();
            loop {
                let computing = state
                    .entries
                    .get(&key)
                    .map(|slot| matches!(slot, Slot::Computing { .. }));
                match computing {
                    Some(false) => {
                        if let Some(buffer) = state.touch(&key) {
                            state.stats.hits += 1;
                            let source = if waited {
                                TileSource::Shared
                            } else {
                                TileSource::Cached
                            };
                            return Ok((TileView(buffer), source));
                        }
                    }
                    Some(true) => {
                        waited = true;
                        self.computed.wait(&mut state);
                    }
                    None => {
                        state.stats.misses += 1;
                        let ticket = state.next_ticket;
                        state.next_ticket += 1;
                        state.entries.insert(key, Slot::Computing { ticket });
                        break ticket;
                    }
                }
            }
        };

        debug!("computing tile {:?}", key.coord);
        let guard = ComputingGuard {
            cache: self,
            key,
            ticket,
            armed: true,
        };
        let buffer = compute()?;
        Ok((guard.publish(buffer), TileSource::Computed))
    }
}

/// Owns a computing slot; removes it unless the result is published.
struct ComputingGuard<'a, T: Copy + Send + Sync> {
    cache: &'a TileCache<T>,
    key: TileContentKey,
    ticket: u64,
    armed: bool,
}

impl<T: Copy + Send + Sync> ComputingGuard<'_, T> {
    fn owns_slot(&self, state: &CacheState<T>) -> bool {
        matches!(state.entries.get(&self.key), Some(Slot::Computing { ticket }) if *ticket == self.ticket)
    }

    fn publish(mut self, buffer: TileBuffer<T>) -> TileView<T> {
        self.armed = false;
        let buffer = Arc::new(buffer);
        {
            let mut state = self.cache.state.lock();
            state.stats.computations += 1;
            if self.owns_slot(&state) {
                state.entries.remove(&self.key);
                state.store(self.key, Arc::clone(&buffer), self.cache.budget);
            } else {
                debug!("tile {:?} was invalidated while computing; not cached", self.key.coord);
            }
        }
        self.cache.computed.notify_all();
        TileView(buffer)
    }
}

impl<T: Copy + Send + Sync> Drop for ComputingGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut state = self.cache.state.lock();
            if self.owns_slot(&state) {
                state.entries.remove(&self.key);
            }
        }
        debug!("computation of tile {:?} abandoned", self.key.coord);
        self.cache.computed.notify_all();
    }
}
