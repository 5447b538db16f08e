use crate::cache::LayoutCache;
use crate::layout::Layout;

/// Non-owning handle to a body tree node held by the evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TreeId(pub u64);

/// Non-owning handle to an evaluation context held by the evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

/// External evaluator that populates a layout's children by running its
/// body tree.
///
/// Implementations must be re-entrant with respect to nested layouts: a
/// body may itself create child layouts, each evaluated against its own
/// body and context. During refresh, evaluation should first offer each
/// child's cache key to [`EvalServices::take_cached`] and adopt a hit
/// instead of rebuilding.
pub trait Evaluator {
    fn evaluate(&mut self, body: TreeId, layout: &mut Layout, services: &mut EvalServices<'_>);

    /// Content hash of the tree rooted at `body`.
    fn tree_hash(&self, body: TreeId) -> u64;

    /// Content hash of the bindings of `ctx`.
    ///
    /// Must be a pure function of binding content, not context identity.
    fn context_hash(&self, ctx: ContextId) -> u64;
}

/// Cache access handed to the evaluator for the duration of one
/// evaluation call.
pub struct EvalServices<'a> {
    cache: &'a mut LayoutCache,
    cache_enabled: bool,
}

impl<'a> EvalServices<'a> {
    pub fn new(cache: &'a mut LayoutCache, cache_enabled: bool) -> Self {
        Self {
            cache,
            cache_enabled,
        }
    }

    /// True when child layouts should record cache keys this pass.
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Claim a cached layout for `(tree, ctx)` content hashes.
    ///
    /// Always misses when caching is disabled for this pass.
    pub fn take_cached(&mut self, tree: u64, ctx: u64) -> Option<Box<Layout>> {
        if !self.cache_enabled {
            return None;
        }
        self.cache.take(tree, ctx)
    }
}

/// Engine-wide refresh toggles, threaded explicitly per pass.
#[derive(Clone, Copy, Debug)]
pub struct RefreshOptions {
    /// Enable same-pass reuse of unchanged sub-layouts.
    pub cache_enabled: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
        }
    }
}

/// Everything a refresh pass needs besides the layout tree itself: the
/// evaluator, the sub-layout cache, and the pass options.
pub struct RefreshRuntime<'a> {
    pub evaluator: &'a mut dyn Evaluator,
    pub cache: LayoutCache,
    pub options: RefreshOptions,
}

impl<'a> RefreshRuntime<'a> {
    pub fn new(evaluator: &'a mut dyn Evaluator, options: RefreshOptions) -> Self {
        Self {
            evaluator,
            cache: LayoutCache::new(),
            options,
        }
    }
}
