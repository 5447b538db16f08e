use crate::geometry::{Box3, Point3};
use crate::state::{Rgba, StateBits, TextFont, TextureId};

/// Selection-word bit assignments shared with the renderer.
pub mod selection {
    /// Bits carrying the ordinary selection count for an id.
    pub const REGULAR_MASK: u32 = 0x0000_ffff;
    /// Set when the renderer shows the container for an id as opened.
    pub const CONTAINER_OPENED: u32 = 0x0001_0000;
}

/// Renderer facade the layout engine draws through.
///
/// The engine issues these calls but does not define their semantics;
/// state and name scopes are strictly nested, and the push/pop
/// discipline is the only mechanism keeping renderer state balanced
/// across nested layouts.
pub trait RenderSurface {
    /// Open a renderer state scope covering the given state classes.
    fn push_state(&mut self, bits: StateBits);
    /// Close the innermost state scope.
    fn pop_state(&mut self);
    /// Push an id onto the selection name stack.
    fn push_name(&mut self, id: u32);
    /// Pop the selection name stack.
    fn pop_name(&mut self);

    fn draw_text(&mut self, origin: Point3, text: &str, font: &TextFont, color: Rgba);
    fn draw_rect(&mut self, bounds: Box3, fill: Rgba, line: Rgba, line_width: f32);
    /// Draw the selection decoration for an aggregate bounding box.
    fn draw_selection_box(&mut self, bounds: Box3);
    fn bind_texture(&mut self, unit: u32, texture: TextureId);
    fn set_program(&mut self, program: u32);
    fn set_light(&mut self, light: u32);

    /// Selection word for an id; see [`selection`] for bit layout.
    fn selected(&self, id: u32) -> u32 {
        let _ = id;
        0
    }

    /// True when the renderer shows the container for `id` as opened.
    fn container_open(&self, id: u32) -> bool {
        self.selected(id) & selection::CONTAINER_OPENED != 0
    }

    /// Scale factor applied when laying out for print output.
    fn printer_scaling(&self) -> f32 {
        1.0
    }
}

/// Per-render-pass context threaded through draw traversal.
///
/// Owns the pass-scoped counters (glyph ids, polygon layers) that must
/// never live in process-wide state, plus the surface being drawn to.
pub struct RenderPass<'a> {
    pub surface: &'a mut dyn RenderSurface,
    next_char_id: u32,
    polygon_layer: i32,
}

impl<'a> RenderPass<'a> {
    pub fn new(surface: &'a mut dyn RenderSurface) -> Self {
        Self {
            surface,
            next_char_id: 0,
            polygon_layer: 0,
        }
    }

    /// Stable per-glyph selection id for this pass.
    ///
    /// Ids are allocated in traversal order, so the same tree drawn the
    /// same way yields the same ids.
    pub fn next_char_id(&mut self) -> u32 {
        self.next_char_id += 1;
        self.next_char_id
    }

    /// Next polygon offset layer for coplanar geometry.
    pub fn next_polygon_layer(&mut self) -> i32 {
        self.polygon_layer += 1;
        self.polygon_layer
    }

    /// Printer scaling queried from the surface.
    pub fn printer_scaling(&self) -> f32 {
        self.surface.printer_scaling()
    }
}
