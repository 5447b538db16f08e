use crate::drawing::{BreakAction, BreakOrder, Drawing, LiveToken};
use crate::event::EventKind;
use crate::eval::RefreshRuntime;
use crate::geometry::{Box3, Point3};
use crate::justify::{Justifiable, Justifier, Place};
use crate::layout::{Layout, LayoutItem, Phase};
use crate::state::LayoutState;
use crate::surface::{RenderPass, RenderSurface};

/// One justified line of items, produced by glyph-level justification
/// and consumed by page-level justification.
///
/// A line owns the items placed in it; dissolving a line hands them
/// back in original order, so computed pages can always be restored to
/// their source item list.
pub struct LayoutLine {
    places: Vec<Place<LayoutItem>>,
    extent: f32,
    ends: BreakOrder,
    #[allow(dead_code)]
    live: LiveToken,
}

impl LayoutLine {
    /// Build a line from justified places.
    ///
    /// The line's page-break participation is the strongest of the
    /// boundary that terminated it and what its items request through
    /// [`Drawing::paginate`].
    pub fn build(mut places: Vec<Place<LayoutItem>>, ends: BreakOrder, state: &LayoutState) -> Self {
        let mut extent = 0.0f32;
        let mut page_order = ends;
        for place in &mut places {
            extent = extent.max(place.item.extent(state));
            page_order = page_order.max(place.item.paginate());
        }
        if extent <= 0.0 {
            extent = state.font.line_height_px();
        }
        Self {
            places,
            extent,
            ends: page_order,
            live: LiveToken::new(),
        }
    }

    pub fn places(&self) -> &[Place<LayoutItem>] {
        &self.places
    }

    /// Line height along the page axis.
    pub fn extent(&self) -> f32 {
        self.extent
    }

    /// Boundary order that terminated this line.
    pub fn ends(&self) -> BreakOrder {
        self.ends
    }

    /// Horizontal span covered by the placed items.
    pub fn width(&self) -> f32 {
        match (self.places.first(), self.places.last()) {
            (Some(first), Some(last)) => (last.position + last.size) - first.position,
            _ => 0.0,
        }
    }

    /// Hand the owned items back in original order.
    pub fn dissolve(self) -> Vec<LayoutItem> {
        self.places.into_iter().map(|place| place.item).collect()
    }

    pub(crate) fn render(
        &mut self,
        state: &mut LayoutState,
        pass: &mut RenderPass<'_>,
        anchor: Point3,
        y: f32,
        phase: Phase,
    ) {
        for place in &mut self.places {
            state.offset = Point3::new(anchor.x + place.position, anchor.y + y, anchor.z);
            match phase {
                Phase::Draw => place.item.draw(state, pass),
                Phase::Selection => place.item.draw_selection(state, pass),
                Phase::Identify => place.item.identify(state, pass),
            }
        }
    }
}

impl core::fmt::Debug for LayoutLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayoutLine")
            .field("places", &self.places.len())
            .field("extent", &self.extent)
            .field("ends", &self.ends)
            .finish()
    }
}

impl Justifiable for LayoutLine {
    fn size(&mut self, _state: &LayoutState) -> f32 {
        self.extent
    }

    fn is_separator(&self) -> bool {
        true
    }

    fn break_up(&mut self, granularity: BreakOrder, _state: &LayoutState) -> BreakAction<Self> {
        if self.ends >= granularity {
            BreakAction::Cut {
                order: self.ends,
                separator: true,
                remainder: None,
            }
        } else {
            BreakAction::Fits
        }
    }
}

/// Computed content of a page flow: placed lines plus whatever did not
/// fit the page box.
struct PageContent {
    lines: Vec<Place<LayoutLine>>,
    overflow: Vec<LayoutItem>,
}

/// Text/shape flow state of a page layout: a reserved page box, the
/// margins-inset flow region, and lazily computed line content.
pub struct PageFlow {
    space: Box3,
    computed: Option<PageContent>,
}

impl PageFlow {
    /// Create a flow over the given reserved page box.
    pub fn new(space: Box3) -> Self {
        Self {
            space,
            computed: None,
        }
    }

    /// Reserved page box, in layout-local coordinates.
    pub fn space(&self) -> Box3 {
        self.space
    }

    pub(crate) fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    /// Lay the pending items out into lines and place the lines on the
    /// page, if not already done.
    ///
    /// Items move from `items` into the computed lines; what does not
    /// fit the page box becomes the overflow claimed by
    /// [`Layout::remaining`].
    pub(crate) fn ensure(&mut self, items: &mut Vec<LayoutItem>, state: &LayoutState) {
        if self.computed.is_some() {
            return;
        }
        let left = self.space.lower.x + state.margins.left;
        let right = (self.space.upper.x - state.margins.right).max(left);
        let top = self.space.lower.y + state.margins.top;
        let bottom = (self.space.upper.y - state.margins.bottom).max(top);

        let mut liner = Justifier::new(BreakOrder::LineBreak);
        liner.extend(items.drain(..));
        let mut lines = Vec::new();
        loop {
            let more = liner.adjust(left, right, &state.justify_x, state);
            let places = liner.take_places();
            if places.is_empty() {
                break;
            }
            lines.push(LayoutLine::build(places, liner.last_cut(), state));
            if !more {
                break;
            }
        }

        let mut pager = Justifier::new(BreakOrder::ColumnBreak);
        pager.extend(lines);
        pager.adjust(top, bottom, &state.justify_y, state);
        let placed = pager.take_places();
        let mut overflow = Vec::new();
        for line in pager.take_items() {
            overflow.extend(line.dissolve());
        }
        self.computed = Some(PageContent {
            lines: placed,
            overflow,
        });
    }

    /// Dissolve computed content back into an item list, in original
    /// order, with unfitted overflow trailing.
    pub(crate) fn invalidate(&mut self) -> Vec<LayoutItem> {
        match self.computed.take() {
            Some(content) => {
                let mut out = Vec::new();
                for place in content.lines {
                    out.extend(place.item.dissolve());
                }
                out.extend(content.overflow);
                out
            }
            None => Vec::new(),
        }
    }

    /// Drop computed content entirely (used by full clears, where the
    /// items are being deleted anyway).
    pub(crate) fn discard(&mut self) {
        self.computed = None;
    }

    /// Claim the items that did not fit the page box.
    pub(crate) fn take_overflow(&mut self) -> Vec<LayoutItem> {
        match &mut self.computed {
            Some(content) => core::mem::take(&mut content.overflow),
            None => Vec::new(),
        }
    }

    pub(crate) fn render(
        &mut self,
        state: &mut LayoutState,
        pass: &mut RenderPass<'_>,
        phase: Phase,
    ) {
        let anchor = state.offset;
        if let Some(content) = &mut self.computed {
            for place in &mut content.lines {
                place.item.render(state, pass, anchor, place.position, phase);
            }
        }
        state.offset = anchor;
    }

    /// Union of the computed line boxes, anchored at the current offset.
    pub(crate) fn content_bounds(&mut self, state: &LayoutState) -> Option<Box3> {
        let anchor = state.offset;
        let content = self.computed.as_ref()?;
        let mut acc: Option<Box3> = None;
        for place in &content.lines {
            let line = &place.item;
            let Some(first) = line.places().first() else {
                continue;
            };
            let lower = Point3::new(
                anchor.x + first.position,
                anchor.y + place.position,
                anchor.z,
            );
            let b = Box3::from_size(lower, line.width(), line.extent(), 0.0);
            acc = Some(match acc {
                Some(a) => a | b,
                None => b,
            });
        }
        acc
    }

    pub(crate) fn refresh_children(
        &mut self,
        event: EventKind,
        now: f64,
        rt: &mut RefreshRuntime<'_>,
    ) -> bool {
        let mut changed = false;
        if let Some(content) = &mut self.computed {
            for place in &mut content.lines {
                for item_place in &mut place.item.places {
                    if let LayoutItem::Child(child) = &mut item_place.item {
                        changed |= child.refresh_inner(event, now, rt, true);
                    }
                }
            }
            for item in &mut content.overflow {
                if let LayoutItem::Child(child) = item {
                    changed |= child.refresh_inner(event, now, rt, true);
                }
            }
        }
        changed
    }

    pub(crate) fn children_selected(&self, surface: &dyn RenderSurface) -> u32 {
        let mut sum = 0;
        if let Some(content) = &self.computed {
            for place in &content.lines {
                for item_place in place.item.places() {
                    if let LayoutItem::Child(child) = &item_place.item {
                        sum += child.selected(surface);
                    }
                }
            }
            for item in &content.overflow {
                if let LayoutItem::Child(child) = item {
                    sum += child.selected(surface);
                }
            }
        }
        sum
    }
}

impl core::fmt::Debug for PageFlow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageFlow")
            .field("space", &self.space)
            .field("computed", &self.computed.is_some())
            .finish()
    }
}

/// Drawing that chains a page layout's unfitted content into another
/// spot in the scene.
pub struct PageOverflow {
    continuation: Option<Box<Layout>>,
    #[allow(dead_code)]
    live: LiveToken,
}

impl PageOverflow {
    pub fn new() -> Self {
        Self {
            continuation: None,
            live: LiveToken::new(),
        }
    }

    /// Pull the overflow of `source` into this drawing's continuation.
    ///
    /// Returns true when the source had unfitted content.
    pub fn capture(&mut self, source: &mut Layout) -> bool {
        if let Some(next) = source.remaining() {
            self.continuation = Some(next);
            return true;
        }
        false
    }

    pub fn continuation(&self) -> Option<&Layout> {
        self.continuation.as_deref()
    }

    /// Continue the chain: the overflow of this drawing's continuation.
    pub fn overflow_again(&mut self) -> Option<Box<Layout>> {
        self.continuation.as_mut().and_then(|layout| layout.remaining())
    }
}

impl Default for PageOverflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Drawing for PageOverflow {
    fn draw(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        if let Some(layout) = &mut self.continuation {
            layout.draw(state, pass);
        }
    }

    fn draw_selection(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        if let Some(layout) = &mut self.continuation {
            layout.draw_selection(state, pass);
        }
    }

    fn identify(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        if let Some(layout) = &mut self.continuation {
            layout.identify(state, pass);
        }
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        match &mut self.continuation {
            Some(layout) => layout.bounds(state),
            None => Box3::at(state.offset),
        }
    }

    fn advance(&mut self, state: &LayoutState) -> f32 {
        match &mut self.continuation {
            Some(layout) => layout.bounds(state).width(),
            None => 0.0,
        }
    }

    fn extent(&mut self, state: &LayoutState) -> f32 {
        match &mut self.continuation {
            Some(layout) => layout.bounds(state).height(),
            None => 0.0,
        }
    }

    fn clear_caches(&mut self) {
        if let Some(layout) = &mut self.continuation {
            layout.clear_caches();
        }
    }
}
