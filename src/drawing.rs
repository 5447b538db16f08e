use std::sync::atomic::{AtomicUsize, Ordering};

use crate::geometry::Box3;
use crate::state::LayoutState;
use crate::surface::RenderPass;

static LIVE_DRAWINGS: AtomicUsize = AtomicUsize::new(0);

/// Number of drawing instances currently alive, for leak diagnostics.
pub fn live_drawings() -> usize {
    LIVE_DRAWINGS.load(Ordering::Relaxed)
}

/// RAII token counting live drawing instances.
#[derive(Debug)]
pub struct LiveToken(());

impl LiveToken {
    pub fn new() -> Self {
        LIVE_DRAWINGS.fetch_add(1, Ordering::Relaxed);
        LiveToken(())
    }
}

impl Default for LiveToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LiveToken {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        LIVE_DRAWINGS.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Ranked boundary kinds used to decide where content may be split.
///
/// Ordering is significant: a higher order is a stronger boundary, and
/// breaking prefers the strongest boundary available before the limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BreakOrder {
    NoBreak,
    CharBreak,
    WordBreak,
    SentenceBreak,
    LineBreak,
    ParaBreak,
    ColumnBreak,
    PageBreak,
}

/// Outcome of asking an item to split at its next boundary.
#[derive(Debug)]
pub enum BreakAction<T> {
    /// No boundary of the requested granularity exists; the item is one
    /// unit at this level.
    Fits,
    /// The item was split: the receiver now holds the leading fragment,
    /// `remainder` continues after the boundary (`None` when the
    /// boundary sits exactly at the end of the item).
    Cut {
        /// Order of the boundary actually used.
        order: BreakOrder,
        /// True when the boundary consumed separator content.
        separator: bool,
        remainder: Option<T>,
    },
}

/// Something placeable in a layout: drawable, measurable, breakable,
/// and identifiable for hit-testing.
///
/// `draw`, `draw_selection` and `identify` receive the owning layout's
/// attribute state and a per-render-pass context; leaf drawings render
/// at `state.offset` and advance it. `bounds`/`space` report extents the
/// same way, which is what makes sequential items union correctly.
pub trait Drawing: 'static {
    fn draw(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>);

    /// Render selection decoration; defaults to regular drawing.
    fn draw_selection(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        self.draw(state, pass);
    }

    /// Render hit-test geometry under the current selection name stack.
    fn identify(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        self.draw(state, pass);
    }

    /// Bounding box of the drawn content, advancing `state.offset` the
    /// way `draw` would.
    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        Box3::at(state.offset)
    }

    /// Space requirement; defaults to the drawn bounds.
    fn space(&mut self, state: &mut LayoutState) -> Box3 {
        self.bounds(state)
    }

    /// Natural advance along the flow axis, without side effects.
    fn advance(&mut self, state: &LayoutState) -> f32 {
        let _ = state;
        0.0
    }

    /// Collapsible separator space trailing the item.
    fn space_size(&mut self, state: &LayoutState) -> f32 {
        let _ = state;
        0.0
    }

    /// Vertical size contribution to the line holding this item.
    fn extent(&mut self, state: &LayoutState) -> f32 {
        let _ = state;
        0.0
    }

    /// Split at the first boundary of order at least `granularity`.
    ///
    /// On a split the receiver keeps the leading fragment (separator
    /// content included, so dissolved content re-breaks identically).
    fn break_up(
        &mut self,
        granularity: BreakOrder,
        state: &LayoutState,
    ) -> BreakAction<Box<dyn Drawing>> {
        let _ = (granularity, state);
        BreakAction::Fits
    }

    /// Page-level break this item demands before line justification.
    fn paginate(&self) -> BreakOrder {
        BreakOrder::NoBreak
    }

    /// Drop memoized measurements and computed sub-layout state.
    fn clear_caches(&mut self) {}

    /// True for drawings that only mutate layout state when drawn.
    fn is_attribute(&self) -> bool {
        false
    }

    /// True for right-to-left content, reordered visually after placement.
    fn is_rtl(&self) -> bool {
        false
    }

    /// True for pure separator items (explicit break marks).
    fn is_separator(&self) -> bool {
        false
    }

    /// Sub-unit count (e.g. characters) for spread justification.
    fn item_count(&self) -> usize {
        1
    }
}
