use std::collections::VecDeque;

use crate::drawing::{BreakAction, BreakOrder};
use crate::state::{Justification, LayoutState};

/// Tolerance for exact-fit comparisons along the flow axis.
const FIT_EPSILON: f32 = 1e-3;

/// Capability a sequence item needs to participate in justification.
///
/// Two concrete instantiations exist: layout items (glyph level, sized
/// by advance) and layout lines (line level, sized by extent).
pub trait Justifiable: Sized {
    /// Natural size along the justification axis.
    fn size(&mut self, state: &LayoutState) -> f32;

    /// Collapsible separator space trailing the item.
    fn space_size(&mut self, state: &LayoutState) -> f32 {
        let _ = state;
        0.0
    }

    /// Sub-unit count (e.g. characters) for spread justification.
    fn item_count(&self) -> usize {
        1
    }

    /// True for pure separator items.
    fn is_separator(&self) -> bool {
        false
    }

    /// True for right-to-left content.
    fn is_rtl(&self) -> bool {
        false
    }

    /// Split at the first boundary of order at least `granularity`.
    fn break_up(&mut self, granularity: BreakOrder, state: &LayoutState) -> BreakAction<Self>;
}

/// A computed placement along the justification axis.
///
/// `solid` marks places with no separator boundary after them; applied
/// slack at `spread = 0` is inserted only after non-solid places.
#[derive(Debug)]
pub struct Place<I> {
    pub item: I,
    pub size: f32,
    pub position: f32,
    pub item_count: usize,
    pub solid: bool,
}

impl<I: Justifiable> Place<I> {
    fn new(item: I, size: f32, solid: bool) -> Self {
        let item_count = item.item_count();
        Self {
            item,
            size,
            position: 0.0,
            item_count,
            solid,
        }
    }
}

/// Fits a run of items into an axis-aligned span, breaking at the best
/// available boundary on overflow and distributing justification slack.
///
/// Invariant: at every point each original item is reachable from
/// exactly one of the pending `items` queue and the `places` vector;
/// ownership moves between them, never duplicates.
pub struct Justifier<I: Justifiable> {
    items: VecDeque<I>,
    places: Vec<Place<I>>,
    /// Boundary order at or above which a run ends unconditionally.
    hard: BreakOrder,
    /// Boundary order that terminated the last `cut_up` run.
    cut: BreakOrder,
}

impl<I: Justifiable> Justifier<I> {
    /// Create a justifier whose runs end at boundaries of order `hard`
    /// or stronger (`LineBreak` for lines, `ColumnBreak` for pages).
    pub fn new(hard: BreakOrder) -> Self {
        Self {
            items: VecDeque::new(),
            places: Vec::new(),
            hard,
            cut: BreakOrder::NoBreak,
        }
    }

    /// Append an item to the pending queue.
    pub fn push(&mut self, item: I) {
        self.items.push_back(item);
    }

    /// Append several items to the pending queue.
    pub fn extend(&mut self, items: impl IntoIterator<Item = I>) {
        self.items.extend(items);
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn places(&self) -> &[Place<I>] {
        &self.places
    }

    /// Boundary order that terminated the last run (`NoBreak` when the
    /// queue ran dry).
    pub fn last_cut(&self) -> BreakOrder {
        self.cut
    }

    /// Drain the computed places, leaving pending items untouched.
    pub fn take_places(&mut self) -> Vec<Place<I>> {
        core::mem::take(&mut self.places)
    }

    /// Drain the unconsumed items.
    pub fn take_items(&mut self) -> Vec<I> {
        self.items.drain(..).collect()
    }

    /// Release places and pending items.
    pub fn clear(&mut self) {
        self.places.clear();
        self.items.clear();
    }

    /// Cut one run's worth of content into `places`.
    ///
    /// Returns true when the run ended because it was full (a break was
    /// forced by the span limit) and false when it ended at an explicit
    /// boundary or because the queue ran dry; the distinction selects
    /// `amount` versus `partial` during placement. Places from a prior
    /// run must be drained with [`take_places`] first.
    ///
    /// [`take_places`]: Justifier::take_places
    pub fn cut_up(
        &mut self,
        start: f32,
        end: f32,
        just: &Justification,
        state: &LayoutState,
    ) -> bool {
        self.cut = BreakOrder::NoBreak;
        let limit = end - just.after;
        let mut pos = start + just.before;

        while let Some(mut item) = self.items.pop_front() {
            loop {
                // Tokenize at word granularity; each fragment either
                // fits, ends the run at an explicit boundary, or takes
                // the overflow path.
                let (order, separator, mut remainder) =
                    match item.break_up(BreakOrder::WordBreak, state) {
                        BreakAction::Fits => (BreakOrder::NoBreak, item.is_separator(), None),
                        BreakAction::Cut {
                            order,
                            separator,
                            remainder,
                        } => (order, separator, remainder),
                    };

                let size = item.size(state);
                let space = item.space_size(state);
                let gap = if self.places.is_empty() {
                    0.0
                } else {
                    just.spacing
                };

                if pos + gap + size <= limit + FIT_EPSILON {
                    pos += gap + size + space;
                    self.places.push(Place::new(item, size, !separator));
                    if order >= self.hard {
                        if let Some(rem) = remainder.take() {
                            self.items.push_front(rem);
                        }
                        self.cut = order;
                        return false;
                    }
                    match remainder {
                        Some(rem) => {
                            item = rem;
                            continue;
                        }
                        None => break,
                    }
                }

                // The fragment does not fit. With earlier places on the
                // run, end it at the best boundary already seen: after
                // the last separator place when one exists, at the last
                // inter-item boundary otherwise. Character splitting is
                // the last resort, used only when the fragment is alone.
                if !self.places.is_empty() {
                    if let Some(rem) = remainder.take() {
                        self.items.push_front(rem);
                    }
                    self.items.push_front(item);
                    if self.places.iter().any(|p| !p.solid) {
                        while self.places.last().is_some_and(|p| p.solid) {
                            if let Some(place) = self.places.pop() {
                                self.items.push_front(place.item);
                            }
                        }
                    }
                    self.cut = BreakOrder::WordBreak;
                    return true;
                }

                if let Some(rem) = remainder.take() {
                    self.items.push_front(rem);
                }
                self.char_fill(item, &mut pos, limit, state);
                return true;
            }
        }
        false
    }

    /// Fill the run character by character from a fragment wider than
    /// the whole span. Guarantees progress: at least one unit is placed
    /// even when nothing fits.
    fn char_fill(&mut self, mut item: I, pos: &mut f32, limit: f32, state: &LayoutState) {
        self.cut = BreakOrder::CharBreak;
        let mut placed_any = false;
        loop {
            match item.break_up(BreakOrder::CharBreak, state) {
                BreakAction::Fits => {
                    // Unsplittable oversized unit: force-place it when
                    // the run would otherwise stay empty.
                    let size = item.size(state);
                    if placed_any && *pos + size > limit + FIT_EPSILON {
                        self.items.push_front(item);
                    } else {
                        *pos += size;
                        self.places.push(Place::new(item, size, true));
                    }
                    return;
                }
                BreakAction::Cut {
                    separator,
                    remainder,
                    ..
                } => {
                    let size = item.size(state);
                    if placed_any && *pos + size > limit + FIT_EPSILON {
                        if let Some(rem) = remainder {
                            self.items.push_front(rem);
                        }
                        self.items.push_front(item);
                        return;
                    }
                    *pos += size + item.space_size(state);
                    self.places.push(Place::new(item, size, !separator));
                    placed_any = true;
                    match remainder {
                        Some(rem) => item = rem,
                        None => return,
                    }
                }
            }
        }
    }

    /// Compute final positions for the current places.
    ///
    /// `full` selects `amount` (run ended by the span limit) versus
    /// `partial` (trailing, incompletely filled run).
    pub fn placing(
        &mut self,
        start: f32,
        end: f32,
        just: &Justification,
        state: &LayoutState,
        full: bool,
    ) {
        let n = self.places.len();
        if n == 0 {
            return;
        }
        let limit = end - just.after;
        let origin = start + just.before;

        // Natural positions with fixed gaps only; the trailing
        // separator space of the last place collapses at the run end.
        let mut cursor = origin;
        let mut content_end = origin;
        for (i, place) in self.places.iter_mut().enumerate() {
            if i > 0 {
                cursor += just.spacing;
            }
            place.position = cursor;
            content_end = cursor + place.size;
            cursor = content_end + place.item.space_size(state);
        }

        let slack = (limit - content_end).max(0.0);
        let seps = self.places[..n - 1].iter().filter(|p| !p.solid).count();
        let units: usize = self.places[..n - 1].iter().map(|p| p.item_count).sum();

        let amount = if full { just.amount } else { just.partial }.clamp(0.0, 1.0);
        let can_distribute = seps > 0 || units > 0;
        let applied = if can_distribute { slack * amount } else { 0.0 };
        let shift = (slack - applied) * just.centering.clamp(0.0, 1.0);

        let spread = just.spread.clamp(0.0, 1.0);
        let (per_sep, per_unit) = if seps > 0 && units > 0 {
            (
                (1.0 - spread) * applied / seps as f32,
                spread * applied / units as f32,
            )
        } else if seps > 0 {
            (applied / seps as f32, 0.0)
        } else if units > 0 {
            (0.0, applied / units as f32)
        } else {
            (0.0, 0.0)
        };

        let mut cursor = origin + shift;
        for (i, place) in self.places.iter_mut().enumerate() {
            if i > 0 {
                cursor += just.spacing;
            }
            place.position = cursor;
            cursor += place.size + place.item.space_size(state);
            if i + 1 < n {
                cursor += per_unit * place.item_count as f32;
                if !place.solid {
                    cursor += per_sep;
                }
            }
        }

        self.reorder_rtl_runs();
    }

    /// Orchestrate one run: cut then place. Returns true while content
    /// remains unconsumed (another run is needed).
    pub fn adjust(
        &mut self,
        start: f32,
        end: f32,
        just: &Justification,
        state: &LayoutState,
    ) -> bool {
        let full = self.cut_up(start, end, just, state);
        self.placing(start, end, just, state, full);
        self.has_items()
    }

    /// Mirror the positions of each maximal run of RTL places within
    /// the span that run occupies.
    fn reorder_rtl_runs(&mut self) {
        let n = self.places.len();
        let mut i = 0;
        while i < n {
            if !self.places[i].item.is_rtl() {
                i += 1;
                continue;
            }
            let mut j = i;
            while j + 1 < n && self.places[j + 1].item.is_rtl() {
                j += 1;
            }
            if j > i {
                let lo = self.places[i].position;
                let hi = self.places[j].position + self.places[j].size;
                for place in &mut self.places[i..=j] {
                    place.position = lo + (hi - (place.position + place.size));
                }
            }
            i = j + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal test item: an unbreakable block or an explicit break mark.
    #[derive(Debug, PartialEq)]
    enum TestItem {
        Solid { width: f32, id: u32, rtl: bool },
        Mark(BreakOrder),
    }

    impl TestItem {
        fn solid(width: f32, id: u32) -> Self {
            TestItem::Solid {
                width,
                id,
                rtl: false,
            }
        }

        fn rtl(width: f32, id: u32) -> Self {
            TestItem::Solid {
                width,
                id,
                rtl: true,
            }
        }
    }

    impl Justifiable for TestItem {
        fn size(&mut self, _state: &LayoutState) -> f32 {
            match self {
                TestItem::Solid { width, .. } => *width,
                TestItem::Mark(_) => 0.0,
            }
        }

        fn is_separator(&self) -> bool {
            matches!(self, TestItem::Mark(_))
        }

        fn is_rtl(&self) -> bool {
            matches!(self, TestItem::Solid { rtl: true, .. })
        }

        fn break_up(
            &mut self,
            granularity: BreakOrder,
            _state: &LayoutState,
        ) -> BreakAction<Self> {
            match self {
                TestItem::Mark(order) if *order >= granularity => BreakAction::Cut {
                    order: *order,
                    separator: true,
                    remainder: None,
                },
                _ => BreakAction::Fits,
            }
        }
    }

    fn ids(justifier: &Justifier<TestItem>) -> (Vec<u32>, Vec<u32>) {
        let placed = justifier
            .places()
            .iter()
            .filter_map(|p| match &p.item {
                TestItem::Solid { id, .. } => Some(*id),
                TestItem::Mark(_) => None,
            })
            .collect();
        let pending = justifier
            .items
            .iter()
            .filter_map(|item| match item {
                TestItem::Solid { id, .. } => Some(*id),
                TestItem::Mark(_) => None,
            })
            .collect();
        (placed, pending)
    }

    fn state() -> LayoutState {
        LayoutState::default()
    }

    #[test]
    fn cut_up_conserves_items_in_order() {
        let mut j = Justifier::new(BreakOrder::LineBreak);
        for (i, w) in [30.0, 25.0, 40.0, 10.0, 55.0].into_iter().enumerate() {
            j.push(TestItem::solid(w, i as u32));
            j.push(TestItem::Mark(BreakOrder::WordBreak));
        }
        let overflowed = j.cut_up(0.0, 110.0, &Justification::default(), &state());
        assert!(overflowed);
        let (placed, pending) = ids(&j);
        let mut all = placed.clone();
        all.extend(&pending);
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
        assert_eq!(placed, vec![0, 1, 2, 3]);
    }

    #[test]
    fn exact_fit_with_full_amount_leaves_no_slack() {
        let mut j = Justifier::new(BreakOrder::LineBreak);
        j.push(TestItem::solid(40.0, 0));
        j.push(TestItem::solid(50.0, 1));
        j.push(TestItem::solid(30.0, 2));
        let just = Justification {
            amount: 1.0,
            ..Justification::default()
        };
        let more = j.adjust(0.0, 120.0, &just, &state());
        assert!(!more);
        let positions: Vec<f32> = j.places().iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0.0, 40.0, 90.0]);
    }

    #[test]
    fn packed_run_shifts_uniformly_with_centering() {
        let sizes = [20.0, 30.0, 10.0];
        let span = 100.0;
        let total: f32 = sizes.iter().sum();

        let place_with = |centering: f32| -> Vec<f32> {
            let mut j = Justifier::new(BreakOrder::LineBreak);
            for (i, w) in sizes.into_iter().enumerate() {
                j.push(TestItem::solid(w, i as u32));
            }
            let just = Justification {
                amount: 0.0,
                centering,
                ..Justification::default()
            };
            j.adjust(0.0, span, &just, &state());
            j.places().iter().map(|p| p.position).collect()
        };

        let packed = place_with(0.0);
        let centered = place_with(0.5);
        let ended = place_with(1.0);
        let slack = span - total;
        for i in 0..sizes.len() {
            assert!((centered[i] - packed[i] - slack * 0.5).abs() < 1e-3);
            assert!((ended[i] - packed[i] - slack).abs() < 1e-3);
        }
    }

    #[test]
    fn full_justification_forces_the_trailing_edge_to_the_span_end() {
        let mut j = Justifier::new(BreakOrder::LineBreak);
        j.push(TestItem::solid(20.0, 0));
        j.push(TestItem::Mark(BreakOrder::WordBreak));
        j.push(TestItem::solid(30.0, 1));
        j.push(TestItem::Mark(BreakOrder::WordBreak));
        j.push(TestItem::solid(10.0, 2));
        let just = Justification {
            amount: 1.0,
            ..Justification::default()
        };
        let full = j.cut_up(0.0, 100.0, &just, &state());
        j.placing(0.0, 100.0, &just, &state(), true);
        assert!(!full);
        let last_solid = j
            .places()
            .iter()
            .rev()
            .find(|p| matches!(p.item, TestItem::Solid { .. }))
            .map(|p| p.position + p.size);
        assert!(matches!(last_solid, Some(edge) if (edge - 100.0).abs() < 1e-3));
    }

    #[test]
    fn explicit_hard_break_ends_the_run_without_overflow() {
        let mut j = Justifier::new(BreakOrder::LineBreak);
        j.push(TestItem::solid(10.0, 0));
        j.push(TestItem::Mark(BreakOrder::LineBreak));
        j.push(TestItem::solid(10.0, 1));
        let full = j.cut_up(0.0, 100.0, &Justification::default(), &state());
        assert!(!full);
        assert_eq!(j.last_cut(), BreakOrder::LineBreak);
        let (placed, pending) = ids(&j);
        assert_eq!(placed, vec![0]);
        assert_eq!(pending, vec![1]);
    }

    #[test]
    fn overflow_backs_up_to_the_last_separator() {
        let mut j = Justifier::new(BreakOrder::LineBreak);
        j.push(TestItem::solid(40.0, 0));
        j.push(TestItem::Mark(BreakOrder::WordBreak));
        j.push(TestItem::solid(30.0, 1));
        j.push(TestItem::solid(50.0, 2));
        let full = j.cut_up(0.0, 100.0, &Justification::default(), &state());
        assert!(full);
        // 40 fits, mark fits, 30 fits, 50 overflows; the run backs out
        // the solid 30 to end at the separator.
        let (placed, pending) = ids(&j);
        assert_eq!(placed, vec![0]);
        assert_eq!(pending, vec![1, 2]);
    }

    #[test]
    fn oversized_single_item_is_force_placed() {
        let mut j = Justifier::new(BreakOrder::LineBreak);
        j.push(TestItem::solid(500.0, 0));
        j.push(TestItem::solid(20.0, 1));
        let full = j.cut_up(0.0, 100.0, &Justification::default(), &state());
        assert!(full);
        let (placed, pending) = ids(&j);
        assert_eq!(placed, vec![0]);
        assert_eq!(pending, vec![1]);
    }

    #[test]
    fn spread_moves_slack_from_separators_to_every_unit() {
        let just_at = |spread: f32| -> Vec<f32> {
            let mut j = Justifier::new(BreakOrder::LineBreak);
            j.push(TestItem::solid(20.0, 0));
            j.push(TestItem::Mark(BreakOrder::WordBreak));
            j.push(TestItem::solid(20.0, 1));
            j.push(TestItem::solid(20.0, 2));
            let just = Justification {
                amount: 1.0,
                spread,
                ..Justification::default()
            };
            j.cut_up(0.0, 100.0, &just, &state());
            j.placing(0.0, 100.0, &just, &state(), true);
            j.places()
                .iter()
                .filter(|p| matches!(p.item, TestItem::Solid { .. }))
                .map(|p| p.position)
                .collect()
        };

        // All slack at the separator: the gap after item 0 absorbs it.
        let at_seps = just_at(0.0);
        assert!((at_seps[2] - at_seps[1] - 20.0).abs() < 1e-3);
        // Spread across every unit: both inter-item gaps widen.
        let spread_out = just_at(1.0);
        assert!(spread_out[2] - spread_out[1] > 20.0 + 1e-3);
    }

    #[test]
    fn empty_queue_adjusts_to_an_empty_run() {
        let mut j: Justifier<TestItem> = Justifier::new(BreakOrder::LineBreak);
        let more = j.adjust(0.0, 100.0, &Justification::default(), &state());
        assert!(!more);
        assert!(j.places().is_empty());
        assert_eq!(j.last_cut(), BreakOrder::NoBreak);
    }

    #[test]
    fn rtl_runs_are_mirrored_within_their_span() {
        let mut j = Justifier::new(BreakOrder::LineBreak);
        j.push(TestItem::solid(10.0, 0));
        j.push(TestItem::rtl(20.0, 1));
        j.push(TestItem::rtl(30.0, 2));
        j.push(TestItem::solid(10.0, 3));
        j.adjust(0.0, 100.0, &Justification::default(), &state());

        let positions: Vec<f32> = j.places().iter().map(|p| p.position).collect();
        // The LTR neighbors keep their packed positions; within the RTL
        // run the later item comes first visually.
        assert_eq!(positions[0], 0.0);
        assert_eq!(positions[3], 60.0);
        assert_eq!(positions[1], 40.0);
        assert_eq!(positions[2], 10.0);
    }

    #[test]
    fn zero_size_span_still_makes_progress() {
        let mut j = Justifier::new(BreakOrder::LineBreak);
        j.push(TestItem::solid(10.0, 0));
        j.push(TestItem::solid(10.0, 1));
        let full = j.cut_up(0.0, 0.0, &Justification::default(), &state());
        assert!(full);
        let (placed, pending) = ids(&j);
        assert_eq!(placed, vec![0]);
        assert_eq!(pending, vec![1]);
    }
}
