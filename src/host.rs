use crate::view::ViewId;

/// Hooks into the embedding application. All methods have no-op defaults so
/// hosts only implement what they integrate with; implementations must be
/// callable from any thread.
pub trait HostShell: Send + Sync {
    /// True while a host-owned modal surface (console, system menu) is
    /// open. Focus requests are refused while this holds.
    fn is_modal_active(&self) -> bool {
        false
    }

    /// A view gained focus and should receive the host's input stream.
    fn begin_input_capture(&self, _view: ViewId) {}

    /// Focus was released. `next` is the view focus moved to, if any.
    fn end_input_capture(&self, _next: Option<ViewId>) {}

    /// Increment the host's pause refcount (focus taken with pausing).
    fn push_pause(&self) {}

    /// Decrement the host's pause refcount.
    fn pop_pause(&self) {}

    /// Current cursor position in surface pixels, for the focus overlay.
    fn cursor_position(&self) -> Option<(f32, f32)> {
        None
    }
}

/// Shell that integrates with nothing. Useful for tests and headless runs.
#[derive(Debug, Default)]
pub struct NullShell;

impl HostShell for NullShell {}
