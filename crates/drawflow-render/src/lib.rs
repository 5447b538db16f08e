//! Command-recording render surface for `drawflow`.
//!
//! Captures the engine's draw, selection and name-stack traffic as a
//! backend-agnostic command stream, with a versioned JSON snapshot
//! envelope for persisting streams and a deterministic fixed-advance
//! measurer for tests.

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

use std::collections::HashMap;

use drawflow::{
    selection, Box3, Point3, RenderSurface, Rgba, StateBits, TextFont, TextMeasurer, TextureId,
};
use serde::{Deserialize, Serialize};

const SNAPSHOT_SCHEMA_VERSION: u8 = 1;

/// RGBA color as a plain array, for serialization.
pub type ColorArray = [f32; 4];

fn color_array(color: Rgba) -> ColorArray {
    [color.r, color.g, color.b, color.a]
}

/// Axis-aligned box as origin plus extents, for serialization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectArea {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl From<Box3> for RectArea {
    fn from(b: Box3) -> Self {
        Self {
            x: b.lower.x,
            y: b.lower.y,
            z: b.lower.z,
            width: b.width(),
            height: b.height(),
            depth: b.depth(),
        }
    }
}

/// One recorded surface call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    PushState {
        bits: u32,
    },
    PopState,
    PushName {
        id: u32,
    },
    PopName,
    Text {
        x: f32,
        y: f32,
        z: f32,
        text: String,
        family: String,
        size_px: f32,
        color: ColorArray,
    },
    Rect {
        area: RectArea,
        fill: ColorArray,
        line: ColorArray,
        line_width: f32,
    },
    SelectionBox {
        area: RectArea,
    },
    BindTexture {
        unit: u32,
        texture: u32,
    },
    SetProgram {
        program: u32,
    },
    SetLight {
        light: u32,
    },
}

/// Versioned envelope for persisting a command stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandSnapshot {
    version: u8,
    commands: Vec<DrawCommand>,
}

impl CommandSnapshot {
    pub fn from_commands(commands: &[DrawCommand]) -> Self {
        Self {
            version: SNAPSHOT_SCHEMA_VERSION,
            commands: commands.to_vec(),
        }
    }

    /// Recover the commands; `None` on a schema version mismatch.
    pub fn into_commands(self) -> Option<Vec<DrawCommand>> {
        if self.version != SNAPSHOT_SCHEMA_VERSION {
            return None;
        }
        Some(self.commands)
    }

    /// Serialize to JSON; `None` when encoding fails.
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Parse from JSON; `None` on decode failure.
    pub fn from_json(payload: &str) -> Option<Self> {
        match serde_json::from_str(payload) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                log::debug!("command snapshot decode failed: {err}");
                None
            }
        }
    }
}

/// Render surface that records every call as a [`DrawCommand`].
///
/// Selection state is configurable so tests can drive hit-testing and
/// group open/closed behavior without a real renderer.
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
    selection: HashMap<u32, u32>,
    printer_scale: f32,
    state_depth: i32,
    name_depth: i32,
    underflowed: bool,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            selection: HashMap::new(),
            printer_scale: 1.0,
            state_depth: 0,
            name_depth: 0,
            underflowed: false,
        }
    }

    /// Set the ordinary selection count for an id.
    pub fn set_selected(&mut self, id: u32, count: u32) {
        let word = self.selection.entry(id).or_insert(0);
        *word = (*word & !selection::REGULAR_MASK) | (count & selection::REGULAR_MASK);
    }

    /// Mark a container id as opened or closed.
    pub fn set_container_open(&mut self, id: u32, open: bool) {
        let word = self.selection.entry(id).or_insert(0);
        if open {
            *word |= selection::CONTAINER_OPENED;
        } else {
            *word &= !selection::CONTAINER_OPENED;
        }
    }

    pub fn set_printer_scaling(&mut self, scale: f32) {
        self.printer_scale = scale;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        core::mem::take(&mut self.commands)
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.state_depth = 0;
        self.name_depth = 0;
        self.underflowed = false;
    }

    /// True when every state/name push was matched by a pop and no pop
    /// ever ran on an empty stack.
    pub fn balanced(&self) -> bool {
        !self.underflowed && self.state_depth == 0 && self.name_depth == 0
    }

    /// Recorded text contents, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl RenderSurface for RecordingSurface {
    fn push_state(&mut self, bits: StateBits) {
        self.state_depth += 1;
        self.commands.push(DrawCommand::PushState { bits: bits.bits() });
    }

    fn pop_state(&mut self) {
        self.state_depth -= 1;
        if self.state_depth < 0 {
            self.underflowed = true;
        }
        self.commands.push(DrawCommand::PopState);
    }

    fn push_name(&mut self, id: u32) {
        self.name_depth += 1;
        self.commands.push(DrawCommand::PushName { id });
    }

    fn pop_name(&mut self) {
        self.name_depth -= 1;
        if self.name_depth < 0 {
            self.underflowed = true;
        }
        self.commands.push(DrawCommand::PopName);
    }

    fn draw_text(&mut self, origin: Point3, text: &str, font: &TextFont, color: Rgba) {
        self.commands.push(DrawCommand::Text {
            x: origin.x,
            y: origin.y,
            z: origin.z,
            text: text.to_string(),
            family: font.family.clone(),
            size_px: font.size_px,
            color: color_array(color),
        });
    }

    fn draw_rect(&mut self, bounds: Box3, fill: Rgba, line: Rgba, line_width: f32) {
        self.commands.push(DrawCommand::Rect {
            area: bounds.into(),
            fill: color_array(fill),
            line: color_array(line),
            line_width,
        });
    }

    fn draw_selection_box(&mut self, bounds: Box3) {
        self.commands.push(DrawCommand::SelectionBox {
            area: bounds.into(),
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.commands.push(DrawCommand::BindTexture {
            unit,
            texture: texture.0,
        });
    }

    fn set_program(&mut self, program: u32) {
        self.commands.push(DrawCommand::SetProgram { program });
    }

    fn set_light(&mut self, light: u32) {
        self.commands.push(DrawCommand::SetLight { light });
    }

    fn selected(&self, id: u32) -> u32 {
        self.selection.get(&id).copied().unwrap_or(0)
    }

    fn printer_scaling(&self) -> f32 {
        self.printer_scale
    }
}

/// Deterministic measurer: every printable character advances by a
/// fixed width, control characters are zero-width.
#[derive(Clone, Copy, Debug)]
pub struct FixedMeasurer {
    pub char_px: f32,
}

impl FixedMeasurer {
    pub fn new(char_px: f32) -> Self {
        Self { char_px }
    }
}

impl TextMeasurer for FixedMeasurer {
    fn measure_text_px(&self, text: &str, _font: &TextFont) -> f32 {
        text.chars().filter(|ch| !ch.is_control()).count() as f32 * self.char_px
    }
}
