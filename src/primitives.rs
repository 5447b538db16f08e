use crate::drawing::{BreakAction, BreakOrder, Drawing, LiveToken};
use crate::geometry::{Box3, Point3};
use crate::state::{LayoutState, Rgba, TextFont, TextureId};
use crate::surface::RenderPass;

/// A run of text, split by the justifier at character, word, sentence,
/// line, paragraph and page boundaries found in its content.
///
/// Separator content stays attached to the end of the fragment it
/// terminates, so dissolved page content re-breaks identically on the
/// next computation.
pub struct TextSpan {
    text: String,
    cached_advance: Option<f32>,
    #[allow(dead_code)]
    live: LiveToken,
}

impl TextSpan {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cached_advance: None,
            live: LiveToken::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn visible(&self) -> &str {
        self.text.trim_end()
    }

    /// Order of a whitespace run given its content and the character
    /// preceding it.
    fn run_order(newlines: usize, form_feed: bool, prev: Option<char>) -> BreakOrder {
        if form_feed {
            BreakOrder::PageBreak
        } else if newlines >= 2 {
            BreakOrder::ParaBreak
        } else if newlines == 1 {
            BreakOrder::LineBreak
        } else if matches!(prev, Some('.') | Some('!') | Some('?')) {
            BreakOrder::SentenceBreak
        } else {
            BreakOrder::WordBreak
        }
    }

    fn split_off_tail(&mut self, at: usize) -> Option<Box<dyn Drawing>> {
        let rest = self.text.split_off(at);
        self.cached_advance = None;
        if rest.is_empty() {
            None
        } else {
            Some(Box::new(TextSpan::new(rest)))
        }
    }
}

impl core::fmt::Debug for TextSpan {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("TextSpan").field(&self.text).finish()
    }
}

impl Drawing for TextSpan {
    fn draw(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        let visible = self.visible();
        if !visible.is_empty() {
            let color = state.fill_color.faded(state.visibility);
            pass.surface
                .draw_text(state.offset, visible, &state.font, color);
        }
        state.offset.x += self.advance(state) + self.space_size(state);
    }

    fn identify(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        let height = state.font.line_height_px();
        let mut buf = [0u8; 4];
        let visible_len = self.visible().len();
        for ch in self.text[..visible_len].chars() {
            let glyph = ch.encode_utf8(&mut buf);
            let width = state.measure_text(glyph);
            let id = pass.next_char_id();
            pass.surface.push_name(id);
            pass.surface.draw_rect(
                Box3::from_size(state.offset, width, height, 0.0),
                state.fill_color,
                state.line_color,
                state.line_width,
            );
            pass.surface.pop_name();
            state.offset.x += width;
        }
        state.offset.x += self.space_size(state);
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        let width = self.advance(state);
        let b = Box3::from_size(state.offset, width, state.font.line_height_px(), 0.0);
        state.offset.x += width + self.space_size(state);
        b
    }

    fn advance(&mut self, state: &LayoutState) -> f32 {
        match self.cached_advance {
            Some(width) => width,
            None => {
                let width = state.measure_text(self.visible());
                self.cached_advance = Some(width);
                width
            }
        }
    }

    fn space_size(&mut self, state: &LayoutState) -> f32 {
        let trailing = &self.text[self.visible().len()..];
        if trailing.is_empty() {
            0.0
        } else {
            state.measure_text(trailing)
        }
    }

    fn extent(&mut self, state: &LayoutState) -> f32 {
        state.font.line_height_px()
    }

    fn break_up(
        &mut self,
        granularity: BreakOrder,
        _state: &LayoutState,
    ) -> BreakAction<Box<dyn Drawing>> {
        if self.text.is_empty() {
            return BreakAction::Fits;
        }

        if granularity <= BreakOrder::CharBreak {
            let mut indices = self.text.char_indices();
            let Some((_, first)) = indices.next() else {
                return BreakAction::Fits;
            };
            let split = indices.next().map(|(i, _)| i).unwrap_or(self.text.len());
            let remainder = self.split_off_tail(split);
            return BreakAction::Cut {
                order: BreakOrder::CharBreak,
                separator: first.is_whitespace(),
                remainder,
            };
        }

        let mut prev: Option<char> = None;
        let mut run_start: Option<usize> = None;
        let mut newlines = 0usize;
        let mut form_feed = false;
        let mut found: Option<(usize, BreakOrder)> = None;
        for (idx, ch) in self.text.char_indices() {
            if ch.is_whitespace() {
                if run_start.is_none() {
                    run_start = Some(idx);
                    newlines = 0;
                    form_feed = false;
                }
                if ch == '\n' {
                    newlines += 1;
                }
                if ch == '\u{000c}' {
                    form_feed = true;
                }
            } else {
                if run_start.take().is_some() {
                    let order = Self::run_order(newlines, form_feed, prev);
                    if order >= granularity {
                        found = Some((idx, order));
                        break;
                    }
                }
                prev = Some(ch);
            }
        }
        if found.is_none() && run_start.is_some() {
            let order = Self::run_order(newlines, form_feed, prev);
            if order >= granularity {
                found = Some((self.text.len(), order));
            }
        }
        match found {
            Some((idx, order)) => {
                let remainder = self.split_off_tail(idx);
                BreakAction::Cut {
                    order,
                    separator: true,
                    remainder,
                }
            }
            None => BreakAction::Fits,
        }
    }

    fn clear_caches(&mut self) {
        self.cached_advance = None;
    }

    fn is_rtl(&self) -> bool {
        self.text.chars().any(|ch| {
            matches!(ch as u32,
                0x0590..=0x08ff | 0xfb1d..=0xfdff | 0xfe70..=0xfeff)
        })
    }

    fn item_count(&self) -> usize {
        self.visible().chars().count().max(1)
    }
}

/// Explicit break opportunity of a fixed order.
///
/// Word-level marks are soft separators between non-text items; column
/// and page marks additionally participate in page-level breaking
/// through `paginate`.
#[derive(Debug)]
pub struct HardBreak {
    order: BreakOrder,
    #[allow(dead_code)]
    live: LiveToken,
}

impl HardBreak {
    pub fn new(order: BreakOrder) -> Self {
        Self {
            order,
            live: LiveToken::new(),
        }
    }

    pub fn order(&self) -> BreakOrder {
        self.order
    }
}

impl Drawing for HardBreak {
    fn draw(&mut self, _state: &mut LayoutState, _pass: &mut RenderPass<'_>) {}

    fn break_up(
        &mut self,
        granularity: BreakOrder,
        _state: &LayoutState,
    ) -> BreakAction<Box<dyn Drawing>> {
        if self.order >= granularity {
            BreakAction::Cut {
                order: self.order,
                separator: true,
                remainder: None,
            }
        } else {
            BreakAction::Fits
        }
    }

    fn paginate(&self) -> BreakOrder {
        if self.order >= BreakOrder::ColumnBreak {
            self.order
        } else {
            BreakOrder::NoBreak
        }
    }

    fn is_separator(&self) -> bool {
        true
    }

    fn item_count(&self) -> usize {
        0
    }
}

/// Filled rectangle of fixed extents, solid for line breaking.
#[derive(Debug)]
pub struct Rectangle {
    pub width: f32,
    pub height: f32,
    #[allow(dead_code)]
    live: LiveToken,
}

impl Rectangle {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            live: LiveToken::new(),
        }
    }
}

impl Drawing for Rectangle {
    fn draw(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        pass.surface.draw_rect(
            Box3::from_size(state.offset, self.width, self.height, 0.0),
            state.fill_color.faded(state.visibility),
            state.line_color,
            state.line_width,
        );
        state.offset.x += self.width;
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        let b = Box3::from_size(state.offset, self.width, self.height, 0.0);
        state.offset.x += self.width;
        b
    }

    fn advance(&mut self, _state: &LayoutState) -> f32 {
        self.width
    }

    fn extent(&mut self, _state: &LayoutState) -> f32 {
        self.height
    }
}

/// Attribute drawing: sets the fill color for subsequent items.
#[derive(Clone, Copy, Debug)]
pub struct FillColor(pub Rgba);

impl FillColor {
    fn apply(&self, state: &mut LayoutState) {
        state.fill_color = self.0;
        state.has_attributes = true;
    }
}

impl Drawing for FillColor {
    fn draw(&mut self, state: &mut LayoutState, _pass: &mut RenderPass<'_>) {
        self.apply(state);
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        self.apply(state);
        Box3::at(state.offset)
    }

    fn is_attribute(&self) -> bool {
        true
    }
}

/// Attribute drawing: sets the line color for subsequent items.
#[derive(Clone, Copy, Debug)]
pub struct LineColor(pub Rgba);

impl LineColor {
    fn apply(&self, state: &mut LayoutState) {
        state.line_color = self.0;
        state.has_attributes = true;
    }
}

impl Drawing for LineColor {
    fn draw(&mut self, state: &mut LayoutState, _pass: &mut RenderPass<'_>) {
        self.apply(state);
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        self.apply(state);
        Box3::at(state.offset)
    }

    fn is_attribute(&self) -> bool {
        true
    }
}

/// Attribute drawing: switches the current font.
#[derive(Clone, Debug)]
pub struct FontChange(pub TextFont);

impl FontChange {
    fn apply(&self, state: &mut LayoutState) {
        state.font = self.0.clone();
        state.has_attributes = true;
    }
}

impl Drawing for FontChange {
    fn draw(&mut self, state: &mut LayoutState, _pass: &mut RenderPass<'_>) {
        self.apply(state);
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        self.apply(state);
        Box3::at(state.offset)
    }

    fn is_attribute(&self) -> bool {
        true
    }
}

/// Attribute drawing: moves the drawing offset to an absolute point.
#[derive(Clone, Copy, Debug)]
pub struct MoveTo(pub Point3);

impl Drawing for MoveTo {
    fn draw(&mut self, state: &mut LayoutState, _pass: &mut RenderPass<'_>) {
        state.offset = self.0;
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        state.offset = self.0;
        Box3::at(state.offset)
    }

    fn is_attribute(&self) -> bool {
        true
    }
}

/// Attribute drawing: accumulates a planar rotation and scale.
#[derive(Clone, Copy, Debug)]
pub struct Transform2D {
    pub rotate: f32,
    pub scale: f32,
}

impl Transform2D {
    fn apply(&self, state: &mut LayoutState) {
        state.planar_rotation += self.rotate;
        state.planar_scale *= self.scale;
        state.has_matrix = true;
    }
}

impl Drawing for Transform2D {
    fn draw(&mut self, state: &mut LayoutState, _pass: &mut RenderPass<'_>) {
        self.apply(state);
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        self.apply(state);
        Box3::at(state.offset)
    }

    fn is_attribute(&self) -> bool {
        true
    }
}

/// Attribute drawing: binds a texture on a unit.
#[derive(Clone, Copy, Debug)]
pub struct TextureBind {
    pub unit: u32,
    pub texture: TextureId,
}

impl Drawing for TextureBind {
    fn draw(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        state.current_unit = self.unit;
        state.textures.insert(self.unit, self.texture);
        state.has_material = true;
        pass.surface.bind_texture(self.unit, self.texture);
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        state.current_unit = self.unit;
        state.textures.insert(self.unit, self.texture);
        state.has_material = true;
        Box3::at(state.offset)
    }

    fn is_attribute(&self) -> bool {
        true
    }
}

/// Attribute drawing: activates a shader program.
#[derive(Clone, Copy, Debug)]
pub struct ProgramChange(pub u32);

impl Drawing for ProgramChange {
    fn draw(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        state.program_id = self.0;
        state.has_material = true;
        pass.surface.set_program(self.0);
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        state.program_id = self.0;
        state.has_material = true;
        Box3::at(state.offset)
    }

    fn is_attribute(&self) -> bool {
        true
    }
}

/// Attribute drawing: activates a light.
#[derive(Clone, Copy, Debug)]
pub struct LightChange(pub u32);

impl Drawing for LightChange {
    fn draw(&mut self, state: &mut LayoutState, pass: &mut RenderPass<'_>) {
        state.light_id = self.0;
        state.has_lighting = true;
        pass.surface.set_light(self.0);
    }

    fn bounds(&mut self, state: &mut LayoutState) -> Box3 {
        state.light_id = self.0;
        state.has_lighting = true;
        Box3::at(state.offset)
    }

    fn is_attribute(&self) -> bool {
        true
    }
}
