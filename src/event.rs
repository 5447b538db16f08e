/// External event kinds a layout can register refresh interest in.
///
/// `Time` events are gated by the layout's next-refresh deadline; any
/// other registered kind triggers a refresh unconditionally when it
/// fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Timer tick; refresh fires when the deadline has passed.
    Time,
    /// Keyboard input.
    Key,
    /// Pointer input (move, click, drag).
    Mouse,
    /// Viewport or page geometry change.
    Resize,
    /// Selection state change in the renderer.
    Selection,
}

impl EventKind {
    /// True for event kinds gated by a refresh deadline.
    pub fn is_time(self) -> bool {
        matches!(self, EventKind::Time)
    }
}
