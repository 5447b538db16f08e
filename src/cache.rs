use std::collections::HashMap;

use crate::layout::Layout;

/// 64-bit FNV-1a content hash of arbitrary payload bytes.
pub fn content_hash(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Cache key pairing the content hash of a layout's source tree with
/// the content hash of its evaluation context bindings.
///
/// Context hashes are pure functions of binding content, never of
/// context identity: two contexts with identical bindings are
/// cache-equivalent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tree: u64,
    pub ctx: u64,
}

impl CacheKey {
    pub const fn new(tree: u64, ctx: u64) -> Self {
        Self { tree, ctx }
    }
}

/// Same-pass memoization table for unchanged sub-layouts.
///
/// Populated and drained within a single refresh pass: layouts about to
/// be rebuilt move in via [`insert`], evaluation claims matches back via
/// [`take`], and whatever was not reclaimed drops when the top-level
/// refresh clears the cache. Ownership is transferred both ways, never
/// shared.
///
/// [`insert`]: LayoutCache::insert
/// [`take`]: LayoutCache::take
#[derive(Default)]
pub struct LayoutCache {
    entries: HashMap<CacheKey, Box<Layout>>,
}

impl LayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a layout under its own cache key, taking ownership.
    ///
    /// Returns false (and drops the layout) when it carries no key or
    /// the key is already occupied; the first entry wins.
    pub fn insert(&mut self, layout: Box<Layout>) -> bool {
        let Some(key) = layout.cache_key() else {
            return false;
        };
        if self.entries.contains_key(&key) {
            log::debug!(
                "layout cache: duplicate key tree={:016x} ctx={:016x}, keeping first entry",
                key.tree,
                key.ctx
            );
            return false;
        }
        self.entries.insert(key, layout);
        true
    }

    /// Remove and return the entry for `(tree, ctx)`, if any.
    pub fn take(&mut self, tree: u64, ctx: u64) -> Option<Box<Layout>> {
        self.entries.remove(&CacheKey::new(tree, ctx))
    }

    /// Drop all unreclaimed entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
