use std::collections::HashMap;
use std::sync::Arc;

use crate::geometry::{Axis, Point3};

/// RGBA color with components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// The same color with alpha multiplied by `scale`.
    pub fn faded(self, scale: f32) -> Self {
        Self {
            a: (self.a * scale).clamp(0.0, 1.0),
            ..self
        }
    }
}

/// Opaque texture handle owned by the renderer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Resolved font selection used for measurement and text draw calls.
#[derive(Clone, Debug, PartialEq)]
pub struct TextFont {
    pub family: String,
    pub size_px: f32,
    pub line_height: f32,
    pub weight: u16,
    pub italic: bool,
}

impl TextFont {
    /// Line advance in pixels for this font.
    pub fn line_height_px(&self) -> f32 {
        (self.size_px * self.line_height).max(1.0)
    }
}

impl Default for TextFont {
    fn default() -> Self {
        Self {
            family: "serif".to_string(),
            size_px: 16.0,
            line_height: 1.2,
            weight: 400,
            italic: false,
        }
    }
}

/// Optional text measurement hook for glyph-accurate line fitting.
///
/// Widths must be additive over concatenation for break math to agree
/// with draw-time advances.
pub trait TextMeasurer: Send + Sync {
    /// Measure rendered text width for the provided font.
    fn measure_text_px(&self, text: &str, font: &TextFont) -> f32;
}

/// Policy controlling how slack space is distributed when fitting
/// content into a fixed span.
///
/// `amount` is the fraction of the slack applied at all (0 = packed,
/// 1 = trailing edge forced to the span end). `partial` plays the same
/// role for the final, incompletely filled line. `centering` shifts
/// whatever slack is left unapplied (0 = start, 0.5 = center, 1 = end).
/// `spread` selects where applied slack is inserted: 0 puts all of it
/// at separator boundaries, 1 spreads it between every placed unit.
/// `spacing` is a fixed extra gap between consecutive placed items,
/// `before`/`after` are fixed insets at the span edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Justification {
    pub amount: f32,
    pub partial: f32,
    pub centering: f32,
    pub spread: f32,
    pub spacing: f32,
    pub before: f32,
    pub after: f32,
}

impl Default for Justification {
    fn default() -> Self {
        Self {
            amount: 0.0,
            partial: 0.0,
            centering: 0.0,
            spread: 0.0,
            spacing: 0.0,
            before: 0.0,
            after: 0.0,
        }
    }
}

/// Margins applied to a page flow region, in layout units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Margins {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// Bit-mask of renderer state classes a layout touches.
///
/// Derived from the `has_*` flags so draw traversal only pushes/pops
/// the state scopes a subtree actually dirties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateBits(u32);

impl StateBits {
    pub const NONE: Self = Self(0);
    pub const COLOR: Self = Self(1 << 0);
    pub const BLUR: Self = Self(1 << 1);
    pub const TRANSFORM: Self = Self(1 << 2);
    pub const DEPTH: Self = Self(1 << 3);
    pub const TEXTURES: Self = Self(1 << 4);
    pub const LIGHTING: Self = Self(1 << 5);
    pub const MATERIAL: Self = Self(1 << 6);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: StateBits) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: StateBits) -> StateBits {
        StateBits(self.0 | other.0)
    }
}

/// Inherited visual attribute snapshot threaded through a layout tree.
///
/// A child layout adopts its parent's state through [`inherit`] before
/// evaluating its own body, so attribute changes stay scoped to the
/// subtree that made them.
///
/// [`inherit`]: LayoutState::inherit
#[derive(Clone)]
pub struct LayoutState {
    /// Current 3D drawing offset; leaf drawings advance `offset.x`.
    pub offset: Point3,
    /// Current font for text measurement and draw calls.
    pub font: TextFont,
    /// Horizontal justification policy.
    pub justify_x: Justification,
    /// Vertical justification policy.
    pub justify_y: Justification,
    /// Depth justification policy.
    pub justify_z: Justification,
    /// Page flow margins.
    pub margins: Margins,
    /// Visibility scale in `[0, 1]`, multiplied into draw alpha.
    pub visibility: f32,
    pub line_width: f32,
    pub line_color: Rgba,
    pub fill_color: Rgba,
    /// Active texture unit for subsequent binds.
    pub current_unit: u32,
    /// Textures bound per unit.
    pub textures: HashMap<u32, TextureId>,
    /// Active light id; 0 means none.
    pub light_id: u32,
    /// Active shader program id; 0 means none.
    pub program_id: u32,
    /// True while laying out for print output.
    pub printing: bool,
    /// Accumulated planar rotation in radians.
    pub planar_rotation: f32,
    /// Accumulated planar scale factor.
    pub planar_scale: f32,
    pub has_pixel_blur: bool,
    pub has_matrix: bool,
    pub has_3d: bool,
    pub has_attributes: bool,
    pub has_lighting: bool,
    pub has_material: bool,
    text_measurer: Option<Arc<dyn TextMeasurer>>,
}

impl Default for LayoutState {
    fn default() -> Self {
        Self {
            offset: Point3::ZERO,
            font: TextFont::default(),
            justify_x: Justification::default(),
            justify_y: Justification::default(),
            justify_z: Justification::default(),
            margins: Margins::default(),
            visibility: 1.0,
            line_width: 1.0,
            line_color: Rgba::BLACK,
            fill_color: Rgba::BLACK,
            current_unit: 0,
            textures: HashMap::new(),
            light_id: 0,
            program_id: 0,
            printing: false,
            planar_rotation: 0.0,
            planar_scale: 1.0,
            has_pixel_blur: false,
            has_matrix: false,
            has_3d: false,
            has_attributes: false,
            has_lighting: false,
            has_material: false,
            text_measurer: None,
        }
    }
}

impl core::fmt::Debug for LayoutState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayoutState")
            .field("offset", &self.offset)
            .field("font", &self.font)
            .field("visibility", &self.visibility)
            .field("printing", &self.printing)
            .field("has_measurer", &self.text_measurer.is_some())
            .finish_non_exhaustive()
    }
}

impl LayoutState {
    /// Install a shared text measurer for glyph-accurate width fitting.
    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer>) -> Self {
        self.text_measurer = Some(measurer);
        self
    }

    /// Adopt the parent's attribute state.
    ///
    /// The `has_*` usage flags are deliberately kept: they describe what
    /// this layout's own content touches, not what it inherited.
    pub fn inherit(&mut self, parent: &LayoutState) {
        self.offset = parent.offset;
        self.font = parent.font.clone();
        self.justify_x = parent.justify_x;
        self.justify_y = parent.justify_y;
        self.justify_z = parent.justify_z;
        self.margins = parent.margins;
        self.visibility = parent.visibility;
        self.line_width = parent.line_width;
        self.line_color = parent.line_color;
        self.fill_color = parent.fill_color;
        self.current_unit = parent.current_unit;
        self.textures = parent.textures.clone();
        self.light_id = parent.light_id;
        self.program_id = parent.program_id;
        self.printing = parent.printing;
        self.planar_rotation = parent.planar_rotation;
        self.planar_scale = parent.planar_scale;
        if self.text_measurer.is_none() {
            self.text_measurer = parent.text_measurer.clone();
        }
    }

    /// Reset attributes to defaults, preserving the measurer resource.
    pub fn reset(&mut self) {
        let measurer = self.text_measurer.take();
        *self = LayoutState::default();
        self.text_measurer = measurer;
    }

    /// Justification record for one axis.
    pub fn justification(&self, axis: Axis) -> &Justification {
        match axis {
            Axis::X => &self.justify_x,
            Axis::Y => &self.justify_y,
            Axis::Z => &self.justify_z,
        }
    }

    /// Mutable justification record for one axis.
    pub fn justification_mut(&mut self, axis: Axis) -> &mut Justification {
        match axis {
            Axis::X => &mut self.justify_x,
            Axis::Y => &mut self.justify_y,
            Axis::Z => &mut self.justify_z,
        }
    }

    /// Width of `text` in the current font.
    ///
    /// Uses the installed measurer when present, the heuristic glyph
    /// model otherwise.
    pub fn measure_text(&self, text: &str) -> f32 {
        match &self.text_measurer {
            Some(measurer) => measurer.measure_text_px(text, &self.font),
            None => heuristic_text_width(text, &self.font),
        }
    }

    /// Renderer state classes this layout's content touches.
    pub fn state_bits(&self) -> StateBits {
        let mut bits = StateBits::NONE;
        if self.has_pixel_blur {
            bits = bits.union(StateBits::BLUR).union(StateBits::COLOR);
        }
        if self.has_matrix {
            bits = bits.union(StateBits::TRANSFORM);
        }
        if self.has_3d {
            bits = bits.union(StateBits::DEPTH);
        }
        if self.has_attributes {
            bits = bits.union(StateBits::COLOR);
        }
        if self.has_lighting {
            bits = bits.union(StateBits::LIGHTING);
        }
        if self.has_material {
            bits = bits.union(StateBits::TEXTURES).union(StateBits::MATERIAL);
        }
        bits
    }
}

/// Width model used when no measurer is installed.
///
/// Per-glyph class widths in em, scaled by font size. Coarser than a
/// real rasterizer but stable across families and sizes.
pub(crate) fn heuristic_text_width(text: &str, font: &TextFont) -> f32 {
    let mut em_sum = 0.0f32;
    for ch in text.chars() {
        em_sum += glyph_class_em(ch);
    }
    let mut scale = 1.0;
    if font.weight >= 700 {
        scale += 0.03;
    }
    if font.italic {
        scale += 0.01;
    }
    em_sum * font.size_px * scale
}

fn glyph_class_em(ch: char) -> f32 {
    match ch {
        '\n' | '\r' | '\u{000c}' => 0.0,
        ' ' | '\u{00A0}' => 0.31,
        '\t' => 1.24,
        'i' | 'l' | 'I' | 'j' | '|' | '!' | '\'' | '.' | ',' | ':' | ';' => 0.26,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' => 0.78,
        c if c.is_ascii_digit() => 0.50,
        c if c.is_ascii_uppercase() => 0.66,
        c if c.is_ascii_lowercase() => 0.50,
        c if c.is_whitespace() => 0.31,
        c if c.is_ascii_punctuation() => 0.40,
        _ => 0.58,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherit_adopts_attributes_but_keeps_usage_flags() {
        let mut parent = LayoutState::default();
        parent.offset = Point3::new(3.0, 4.0, 0.0);
        parent.fill_color = Rgba::WHITE;
        parent.textures.insert(1, TextureId(42));

        let mut child = LayoutState::default();
        child.has_matrix = true;
        child.inherit(&parent);

        assert_eq!(child.offset, parent.offset);
        assert_eq!(child.fill_color, Rgba::WHITE);
        assert_eq!(child.textures.get(&1), Some(&TextureId(42)));
        assert!(child.has_matrix);
    }

    #[test]
    fn state_bits_follow_usage_flags() {
        let mut state = LayoutState::default();
        assert!(state.state_bits().is_empty());
        state.has_attributes = true;
        assert!(state.state_bits().contains(StateBits::COLOR));
        state.has_material = true;
        assert!(state.state_bits().contains(StateBits::TEXTURES));
        assert!(!state.state_bits().contains(StateBits::TRANSFORM));
    }

    #[test]
    fn heuristic_width_is_additive_over_concatenation() {
        let font = TextFont::default();
        let a = heuristic_text_width("hello", &font);
        let b = heuristic_text_width(" world", &font);
        let ab = heuristic_text_width("hello world", &font);
        assert!((a + b - ab).abs() < 1e-3);
    }

    #[test]
    fn reset_preserves_the_measurer() {
        struct Fixed;
        impl TextMeasurer for Fixed {
            fn measure_text_px(&self, text: &str, _font: &TextFont) -> f32 {
                text.chars().count() as f32 * 10.0
            }
        }
        let mut state = LayoutState::default().with_text_measurer(Arc::new(Fixed));
        state.fill_color = Rgba::WHITE;
        state.reset();
        assert_eq!(state.fill_color, Rgba::BLACK);
        assert_eq!(state.measure_text("abc"), 30.0);
    }
}
