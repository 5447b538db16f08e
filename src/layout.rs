use smallvec::SmallVec;

use crate::cache::CacheKey;
use crate::drawing::{BreakAction, BreakOrder, Drawing, LiveToken};
use crate::eval::{ContextId, EvalServices, RefreshRuntime, TreeId};
use crate::event::EventKind;
use crate::geometry::Box3;
use crate::justify::Justifiable;
use crate::page::PageFlow;
use crate::state::LayoutState;
use crate::surface::{selection, RenderPass, RenderSurface};

/// Traversal mode shared by the draw-family operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Draw,
    Selection,
    Identify,
}

/// One entry in a layout's item list: either a leaf drawing or an owned
/// child layout.
///
/// The distinction is structural so refresh recursion and cache
/// hand-off never need downcasts; ownership moves between containers
/// only through explicit operations.
pub enum LayoutItem {
    Drawing(Box<dyn Drawing>),
    Child(Box<Layout>),
}

impl LayoutItem {
    pub fn draw(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        match self {
            LayoutItem::Drawing(drawing) => drawing.draw(state, pass),
            LayoutItem::Child(layout) => layout.draw(state, pass),
        }
    }

    pub fn draw_selection(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        match self {
            LayoutItem::Drawing(drawing) => drawing.draw_selection(state, pass),
            LayoutItem::Child(layout) => layout.draw_selection(state, pass),
        }
    }

    pub fn identify(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        match self {
            LayoutItem::Drawing(drawing) => drawing.identify(state, pass),
            LayoutItem::Child(layout) => layout.identify(state, pass),
        }
    }

    pub fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        match self {
            LayoutItem::Drawing(drawing) => drawing.bounds(state),
            LayoutItem::Child(layout) => layout.bounds(state),
        }
    }

    pub fn space(&mut self, state: &mut LayoutState) -> Box3 {
        match self {
            LayoutItem::Drawing(drawing) => drawing.space(state),
            LayoutItem::Child(layout) => layout.space(state),
        }
    }

    /// Natural advance along the flow axis.
    pub fn advance(&mut self, state: &LayoutState) -> f32 {
        match self {
            LayoutItem::Drawing(drawing) => drawing.advance(state),
            LayoutItem::Child(layout) => layout.bounds(state).width(),
        }
    }

    /// Vertical size contribution to a line.
    pub fn extent(&mut self, state: &LayoutState) -> f32 {
        match self {
            LayoutItem::Drawing(drawing) => drawing.extent(state),
            LayoutItem::Child(layout) => layout.bounds(state).height(),
        }
    }

    /// Page-level break participation.
    pub fn paginate(&self) -> BreakOrder {
        match self {
            LayoutItem::Drawing(drawing) => drawing.paginate(),
            LayoutItem::Child(_) => BreakOrder::NoBreak,
        }
    }

    pub fn is_attribute(&self) -> bool {
        match self {
            LayoutItem::Drawing(drawing) => drawing.is_attribute(),
            LayoutItem::Child(_) => false,
        }
    }

    pub fn clear_caches(&mut self) {
        match self {
            LayoutItem::Drawing(drawing) => drawing.clear_caches(),
            LayoutItem::Child(layout) => layout.clear_caches(),
        }
    }
}

impl core::fmt::Debug for LayoutItem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LayoutItem::Drawing(_) => f.write_str("LayoutItem::Drawing"),
            LayoutItem::Child(layout) => f
                .debug_tuple("LayoutItem::Child")
                .field(&layout.id())
                .finish(),
        }
    }
}

impl Justifiable for LayoutItem {
    fn size(&mut self, state: &LayoutState) -> f32 {
        self.advance(state)
    }

    fn space_size(&mut self, state: &LayoutState) -> f32 {
        match self {
            LayoutItem::Drawing(drawing) => drawing.space_size(state),
            LayoutItem::Child(_) => 0.0,
        }
    }

    fn item_count(&self) -> usize {
        match self {
            LayoutItem::Drawing(drawing) => drawing.item_count(),
            LayoutItem::Child(_) => 1,
        }
    }

    fn is_separator(&self) -> bool {
        match self {
            LayoutItem::Drawing(drawing) => drawing.is_separator(),
            LayoutItem::Child(_) => false,
        }
    }

    fn is_rtl(&self) -> bool {
        match self {
            LayoutItem::Drawing(drawing) => drawing.is_rtl(),
            LayoutItem::Child(_) => false,
        }
    }

    fn break_up(&mut self, granularity: BreakOrder, state: &LayoutState) -> BreakAction<Self> {
        match self {
            LayoutItem::Drawing(drawing) => match drawing.break_up(granularity, state) {
                BreakAction::Fits => BreakAction::Fits,
                BreakAction::Cut {
                    order,
                    separator,
                    remainder,
                } => BreakAction::Cut {
                    order,
                    separator,
                    remainder: remainder.map(LayoutItem::Drawing),
                },
            },
            LayoutItem::Child(_) => BreakAction::Fits,
        }
    }
}

/// Variant semantics of a layout container.
pub enum LayoutKind {
    /// Plain ordered container.
    Plain,
    /// 3D container widening its space report by a reserved box.
    Space(Box3),
    /// Selection group with open/closed semantics.
    Group,
    /// Flowed page of justified lines.
    Page(PageFlow),
}

impl LayoutKind {
    /// Kind for a freshly created child of this kind.
    fn child_kind(&self) -> LayoutKind {
        match self {
            LayoutKind::Plain => LayoutKind::Plain,
            LayoutKind::Space(reserve) => LayoutKind::Space(*reserve),
            LayoutKind::Group => LayoutKind::Group,
            LayoutKind::Page(flow) => LayoutKind::Page(PageFlow::new(flow.space())),
        }
    }
}

impl core::fmt::Debug for LayoutKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LayoutKind::Plain => f.write_str("Plain"),
            LayoutKind::Space(reserve) => f.debug_tuple("Space").field(reserve).finish(),
            LayoutKind::Group => f.write_str("Group"),
            LayoutKind::Page(flow) => f.debug_tuple("Page").field(flow).finish(),
        }
    }
}

/// A positioned container of drawable items plus inherited visual
/// state.
///
/// Layouts own their items exclusively; items move in through
/// `add`/`adopt`/`add_child` and out only through `clear` or the
/// refresh-pass cache hand-off. The `body`/`ctx` handles are borrowed
/// from the external evaluator and only used to re-run evaluation on
/// refresh.
pub struct Layout {
    kind: LayoutKind,
    items: Vec<LayoutItem>,
    pub state: LayoutState,
    id: u32,
    body: Option<TreeId>,
    ctx: Option<ContextId>,
    cache_key: Option<CacheKey>,
    refresh_events: SmallVec<[EventKind; 4]>,
    next_refresh: f64,
    #[allow(dead_code)]
    live: LiveToken,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Layout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Layout")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("items", &self.items.len())
            .field("refresh_events", &self.refresh_events)
            .finish_non_exhaustive()
    }
}

impl Layout {
    /// Plain container layout.
    pub fn new() -> Self {
        Self::with_kind(LayoutKind::Plain)
    }

    /// 3D layout reserving `reserve` (offset-relative) as navigable
    /// space beyond its drawn bounds.
    pub fn with_reserve(reserve: Box3) -> Self {
        Self::with_kind(LayoutKind::Space(reserve))
    }

    /// Selection group layout.
    pub fn group() -> Self {
        Self::with_kind(LayoutKind::Group)
    }

    /// Flowed page layout over the given page box.
    pub fn page(page_box: Box3) -> Self {
        Self::with_kind(LayoutKind::Page(PageFlow::new(page_box)))
    }

    pub fn with_kind(kind: LayoutKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            state: LayoutState::default(),
            id: 0,
            body: None,
            ctx: None,
            cache_key: None,
            refresh_events: SmallVec::new(),
            next_refresh: f64::INFINITY,
            live: LiveToken::new(),
        }
    }

    pub fn kind(&self) -> &LayoutKind {
        &self.kind
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn set_id(&mut self, id: u32) {
        self.id = id;
    }

    pub fn cache_key(&self) -> Option<CacheKey> {
        self.cache_key
    }

    pub fn set_cache_key(&mut self, key: Option<CacheKey>) {
        self.cache_key = key;
    }

    /// Record the body tree and context this layout evaluates from.
    pub fn attach_body(&mut self, body: TreeId, ctx: ContextId) {
        self.body = Some(body);
        self.ctx = Some(ctx);
    }

    pub fn body(&self) -> Option<TreeId> {
        self.body
    }

    pub fn context(&self) -> Option<ContextId> {
        self.ctx
    }

    /// Fresh layout of the same concrete kind, for child creation.
    pub fn new_child(&self) -> Layout {
        Layout::with_kind(self.kind.child_kind())
    }

    /// Create and append a child layout.
    ///
    /// Bookkeeping only: the child's body is not evaluated here. The
    /// cache key should be present exactly when the evaluating pass has
    /// layout caching enabled.
    pub fn add_child(
        &mut self,
        id: u32,
        body: TreeId,
        ctx: ContextId,
        cache_key: Option<CacheKey>,
    ) -> &mut Layout {
        let mut child = self.new_child();
        child.id = id;
        child.body = Some(body);
        child.ctx = Some(ctx);
        child.cache_key = cache_key;
        self.restore_page_content();
        self.items.push(LayoutItem::Child(Box::new(child)));
        match self.items.last_mut() {
            Some(LayoutItem::Child(layout)) => &mut **layout,
            _ => unreachable!("a child layout was just appended"),
        }
    }

    /// Append a leaf drawing.
    pub fn add(&mut self, drawing: Box<dyn Drawing>) {
        self.restore_page_content();
        self.items.push(LayoutItem::Drawing(drawing));
    }

    /// Adopt an already-built child layout (e.g. a cache hit or a page
    /// continuation).
    pub fn adopt(&mut self, child: Box<Layout>) {
        self.restore_page_content();
        self.items.push(LayoutItem::Child(child));
    }

    pub fn items(&self) -> &[LayoutItem] {
        &self.items
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Register refresh interest in an event kind.
    ///
    /// For `Time`, `when` advances the refresh deadline to the earliest
    /// requested instant; other kinds refresh on any occurrence.
    pub fn refresh_on(&mut self, kind: EventKind, when: f64) {
        if !self.refresh_events.contains(&kind) {
            self.refresh_events.push(kind);
        }
        if kind.is_time() && when < self.next_refresh {
            self.next_refresh = when;
        }
    }

    /// Remove refresh interest in an event kind.
    pub fn no_refresh_on(&mut self, kind: EventKind) {
        self.refresh_events.retain(|k| *k != kind);
        if kind.is_time() {
            self.next_refresh = f64::INFINITY;
        }
    }

    pub fn refresh_events(&self) -> &[EventKind] {
        &self.refresh_events
    }

    pub fn next_refresh(&self) -> f64 {
        self.next_refresh
    }

    /// Draw this layout's content through the render pass.
    pub fn draw(&mut self, parent: &LayoutState, pass: &mut RenderPass<'_>) {
        self.traverse(parent, pass, Phase::Draw);
    }

    /// Draw selection decoration for this layout's content.
    pub fn draw_selection(&mut self, parent: &LayoutState, pass: &mut RenderPass<'_>) {
        self.traverse(parent, pass, Phase::Selection);
    }

    /// Render hit-test geometry under the selection name stack.
    pub fn identify(&mut self, parent: &LayoutState, pass: &mut RenderPass<'_>) {
        self.traverse(parent, pass, Phase::Identify);
    }

    /// The strictly nested scope shared by the draw-family operations:
    /// state scope, inherited attributes, selection name, items, then
    /// everything unwound in reverse. Renderer state and the name stack
    /// are balanced by construction.
    fn traverse(&mut self, parent: &LayoutState, pass: &mut RenderPass<'_>, phase: Phase) {
        let bits = self.state.state_bits();
        if !bits.is_empty() {
            pass.surface.push_state(bits);
        }
        let saved_offset = self.state.offset;
        self.state.inherit(parent);
        if self.id != 0 {
            pass.surface.push_name(self.id);
        }

        let closed_group =
            matches!(self.kind, LayoutKind::Group) && !pass.surface.container_open(self.id);
        match phase {
            Phase::Draw => self.render_items(pass, phase),
            Phase::Selection => {
                if closed_group {
                    // Closed groups select as one unit: aggregate box
                    // instead of per-child decoration.
                    if pass.surface.selected(self.id) & selection::REGULAR_MASK != 0 {
                        let anchor = self.state.offset;
                        let aggregate = self.children_bounds().unwrap_or(Box3::at(anchor));
                        self.state.offset = anchor;
                        pass.surface.draw_selection_box(aggregate);
                    }
                } else {
                    self.render_items(pass, phase);
                }
            }
            Phase::Identify => {
                if closed_group {
                    let anchor = self.state.offset;
                    let aggregate = self.children_bounds().unwrap_or(Box3::at(anchor));
                    self.state.offset = anchor;
                    pass.surface.draw_rect(
                        aggregate,
                        self.state.fill_color,
                        self.state.line_color,
                        self.state.line_width,
                    );
                } else {
                    self.render_items(pass, phase);
                }
            }
        }

        if self.id != 0 {
            pass.surface.pop_name();
        }
        self.state.offset = saved_offset;
        if !bits.is_empty() {
            pass.surface.pop_state();
        }
    }

    fn render_items(&mut self, pass: &mut RenderPass<'_>, phase: Phase) {
        let Layout {
            kind, items, state, ..
        } = self;
        if let LayoutKind::Page(flow) = kind {
            flow.ensure(items, state);
            flow.render(state, pass, phase);
            return;
        }
        for item in items.iter_mut() {
            match phase {
                Phase::Draw => item.draw(state, pass),
                Phase::Selection => item.draw_selection(state, pass),
                Phase::Identify => item.identify(state, pass),
            }
        }
    }

    /// Bounding box of the drawn content.
    ///
    /// A layout with no items reports the degenerate box at its
    /// inherited offset, never an uninitialized extent.
    pub fn bounds(&mut self, parent: &LayoutState) -> Box3 {
        let saved_offset = self.state.offset;
        self.state.inherit(parent);
        let anchor = self.state.offset;
        let result = self.children_bounds().unwrap_or(Box3::at(anchor));
        self.state.offset = saved_offset;
        result
    }

    /// Space requirement: the union of the children's space reports,
    /// widened by any reserved box.
    pub fn space(&mut self, parent: &LayoutState) -> Box3 {
        let saved_offset = self.state.offset;
        self.state.inherit(parent);
        let anchor = self.state.offset;
        let children = self.children_space();
        self.state.offset = saved_offset;
        let base = children.unwrap_or(Box3::at(anchor));
        match &self.kind {
            LayoutKind::Space(reserve) => base | reserve.translate(anchor),
            LayoutKind::Page(flow) => base | flow.space().translate(anchor),
            _ => base,
        }
    }

    fn children_space(&mut self) -> Option<Box3> {
        let Layout {
            kind, items, state, ..
        } = self;
        if let LayoutKind::Page(flow) = kind {
            flow.ensure(items, state);
            return flow.content_bounds(state);
        }
        let mut acc: Option<Box3> = None;
        for item in items.iter_mut() {
            let b = item.space(state);
            acc = Some(match acc {
                Some(a) => a | b,
                None => b,
            });
        }
        acc
    }

    fn children_bounds(&mut self) -> Option<Box3> {
        let Layout {
            kind, items, state, ..
        } = self;
        if let LayoutKind::Page(flow) = kind {
            flow.ensure(items, state);
            return flow.content_bounds(state);
        }
        let mut acc: Option<Box3> = None;
        for item in items.iter_mut() {
            let b = item.bounds(state);
            acc = Some(match acc {
                Some(a) => a | b,
                None => b,
            });
        }
        acc
    }

    /// Ordinary selection count for this layout and its descendants.
    ///
    /// A shape and its group ancestors may be independently selected,
    /// hence summation rather than OR.
    pub fn selected(&self, surface: &dyn RenderSurface) -> u32 {
        let own = if self.id != 0 {
            surface.selected(self.id) & selection::REGULAR_MASK
        } else {
            0
        };
        own + self.children_selected(surface)
    }

    /// Summed selection counts of descendant layouts.
    pub fn children_selected(&self, surface: &dyn RenderSurface) -> u32 {
        let mut sum = 0;
        for item in &self.items {
            if let LayoutItem::Child(child) = item {
                sum += child.selected(surface);
            }
        }
        if let LayoutKind::Page(flow) = &self.kind {
            sum += flow.children_selected(surface);
        }
        sum
    }

    /// Incremental re-layout entry point for the tree root.
    ///
    /// Recursion decides per node whether its registered events fired;
    /// nodes without a matching registration are left untouched, so the
    /// cost is proportional to the subtree that depends on the change.
    /// The sub-layout cache lives exactly as long as this call.
    pub fn refresh(&mut self, event: EventKind, now: f64, rt: &mut RefreshRuntime<'_>) -> bool {
        let changed = self.refresh_inner(event, now, rt, false);
        if rt.options.cache_enabled {
            rt.cache.clear();
        }
        changed
    }

    pub(crate) fn refresh_inner(
        &mut self,
        event: EventKind,
        now: f64,
        rt: &mut RefreshRuntime<'_>,
        has_parent: bool,
    ) -> bool {
        let registered = self.refresh_events.contains(&event);
        let need_refresh = registered && (!event.is_time() || self.next_refresh <= now);
        let mut changed = false;

        if need_refresh {
            if has_parent {
                if event.is_time() {
                    // Re-registration happens during evaluation.
                    self.next_refresh = f64::INFINITY;
                }
                self.restore_page_content();
                let reclaimed: Vec<LayoutItem> = self.items.drain(..).collect();
                for item in reclaimed {
                    if let LayoutItem::Child(child) = item {
                        if rt.options.cache_enabled {
                            rt.cache.insert(child);
                        }
                    }
                }
                if let (Some(body), Some(_ctx)) = (self.body, self.ctx) {
                    self.clear();
                    let RefreshRuntime {
                        evaluator,
                        cache,
                        options,
                    } = rt;
                    let mut services = EvalServices::new(cache, options.cache_enabled);
                    evaluator.evaluate(body, self, &mut services);
                    changed = true;
                }
            } else {
                log::error!(
                    "refresh: layout {} is dirty at the root with no parent, skipping evaluation",
                    self.id
                );
            }
        }

        changed |= self.refresh_children(event, now, rt);
        changed
    }

    fn refresh_children(&mut self, event: EventKind, now: f64, rt: &mut RefreshRuntime<'_>) -> bool {
        let mut changed = false;
        for item in &mut self.items {
            if let LayoutItem::Child(child) = item {
                changed |= child.refresh_inner(event, now, rt, true);
            }
        }
        if let LayoutKind::Page(flow) = &mut self.kind {
            changed |= flow.refresh_children(event, now, rt);
        }
        changed
    }

    /// Delete all items and restore attribute state and refresh
    /// registrations to defaults. Identity (`id`, body, context, cache
    /// key) is kept.
    pub fn clear(&mut self) {
        if let LayoutKind::Page(flow) = &mut self.kind {
            flow.discard();
        }
        self.items.clear();
        self.state.reset();
        self.refresh_events.clear();
        self.next_refresh = f64::INFINITY;
    }

    /// Drop memoized measurements and computed page content, keeping
    /// the item list intact.
    pub fn clear_caches(&mut self) {
        self.restore_page_content();
        for item in &mut self.items {
            item.clear_caches();
        }
    }

    /// Continuation layout holding whatever did not fit this page.
    ///
    /// Only page layouts overflow; everything else returns `None`.
    pub fn remaining(&mut self) -> Option<Box<Layout>> {
        {
            let Layout {
                kind, items, state, ..
            } = self;
            let LayoutKind::Page(flow) = kind else {
                return None;
            };
            flow.ensure(items, state);
        }
        let overflow = match &mut self.kind {
            LayoutKind::Page(flow) => flow.take_overflow(),
            _ => Vec::new(),
        };
        if overflow.is_empty() {
            return None;
        }
        let mut next = self.new_child();
        next.state = self.state.clone();
        next.items = overflow;
        Some(Box::new(next))
    }

    /// Dissolve computed page content back into the item list so items
    /// are directly reachable again.
    fn restore_page_content(&mut self) {
        if let LayoutKind::Page(flow) = &mut self.kind {
            if flow.is_computed() {
                let mut restored = flow.invalidate();
                restored.append(&mut self.items);
                self.items = restored;
            }
        }
    }
}

impl Drawing for Layout {
    fn draw(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        Layout::draw(self, &*state, pass);
    }

    fn draw_selection(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        Layout::draw_selection(self, &*state, pass);
    }

    fn identify(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        Layout::identify(self, &*state, pass);
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        Layout::bounds(self, &*state)
    }

    fn space(&mut self, state: &mut LayoutState) -> Box3 {
        Layout::space(self, &*state)
    }

    fn advance(&mut self, state: &LayoutState) -> f32 {
        Layout::bounds(self, state).width()
    }

    fn extent(&mut self, state: &LayoutState) -> f32 {
        Layout::bounds(self, state).height()
    }

    fn clear_caches(&mut self) {
        Layout::clear_caches(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point3;

    #[test]
    fn empty_layout_bounds_degenerate_at_the_inherited_offset() {
        let mut parent = LayoutState::default();
        parent.offset = Point3::new(5.0, 7.0, -1.0);
        let mut layout = Layout::new();
        let b = layout.bounds(&parent);
        assert_eq!(b, Box3::at(parent.offset));
        assert_eq!(layout.space(&parent), b);
    }

    #[test]
    fn space_layout_widens_space_by_the_reserved_box() {
        let reserve = Box3::from_size(Point3::new(-10.0, -10.0, -10.0), 20.0, 20.0, 20.0);
        let mut parent = LayoutState::default();
        parent.offset = Point3::new(100.0, 0.0, 0.0);
        let mut layout = Layout::with_reserve(reserve);
        let bounds = layout.bounds(&parent);
        let space = layout.space(&parent);
        assert_eq!(bounds, Box3::at(parent.offset));
        assert_eq!(space, bounds | reserve.translate(parent.offset));
        assert_eq!(space.width(), 20.0);
    }

    #[test]
    fn refresh_registration_tracks_the_earliest_deadline() {
        let mut layout = Layout::new();
        assert_eq!(layout.next_refresh(), f64::INFINITY);
        layout.refresh_on(EventKind::Time, 5.0);
        layout.refresh_on(EventKind::Time, 2.0);
        layout.refresh_on(EventKind::Time, 9.0);
        assert_eq!(layout.next_refresh(), 2.0);
        assert_eq!(layout.refresh_events(), &[EventKind::Time]);
        layout.no_refresh_on(EventKind::Time);
        assert!(layout.refresh_events().is_empty());
        assert_eq!(layout.next_refresh(), f64::INFINITY);
    }

    #[test]
    fn new_child_preserves_the_concrete_kind() {
        let page_box = Box3::from_size(Point3::ZERO, 100.0, 50.0, 0.0);
        let layout = Layout::page(page_box);
        let child = layout.new_child();
        match child.kind() {
            LayoutKind::Page(flow) => assert_eq!(flow.space(), page_box),
            other => panic!("expected a page child, got {:?}", other),
        }
    }
}
