//! Layout and justification engine for drawable scenes.
//!
//! The engine turns a tree of drawable primitives into positioned
//! 2D/3D geometry: layouts own ordered items and inherited visual
//! state, a generic justifier breaks item runs into lines and lines
//! into pages, and an event-driven refresh pass re-evaluates only the
//! subtrees whose registered conditions changed, reusing unchanged
//! sub-layouts through a content-hash-keyed cache. Rendering and body
//! evaluation stay behind the [`RenderSurface`] and [`Evaluator`]
//! traits.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod cache;
mod drawing;
mod eval;
mod event;
mod geometry;
mod justify;
mod layout;
mod page;
mod primitives;
mod state;
mod surface;

pub use cache::{content_hash, CacheKey, LayoutCache};
pub use drawing::{live_drawings, BreakAction, BreakOrder, Drawing, LiveToken};
pub use eval::{ContextId, EvalServices, Evaluator, RefreshOptions, RefreshRuntime, TreeId};
pub use event::EventKind;
pub use geometry::{Axis, Box3, Point3};
pub use justify::{Justifiable, Justifier, Place};
pub use layout::{Layout, LayoutItem, LayoutKind};
pub use page::{LayoutLine, PageFlow, PageOverflow};
pub use primitives::{
    FillColor, FontChange, HardBreak, LightChange, LineColor, MoveTo, ProgramChange, Rectangle,
    TextSpan, TextureBind, Transform2D,
};
pub use state::{
    Justification, LayoutState, Margins, Rgba, StateBits, TextFont, TextMeasurer, TextureId,
};
pub use surface::{selection, RenderPass, RenderSurface};
