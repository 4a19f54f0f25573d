pub mod stub;

use std::collections::HashMap;
use std::sync::Arc;

use crate::gpu::commands::{RenderTargetId, TextureId, UvRect};
use crate::gpu::GpuBridge;
use crate::view::{StagingBuffer, ViewId};

/// Error raised by script evaluation inside an engine view.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The script (or the function it called) threw an exception.
    #[error("script threw: {0}")]
    Threw(String),

    /// The named global exists but is not a callable function.
    #[error("'{0}' is not a callable function")]
    NotCallable(String),

    /// The view has no usable script context (page torn down mid-call).
    #[error("script context unavailable")]
    ContextUnavailable,
}

/// Settings forwarded to the engine when a view is constructed.
#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Render through the GPU command path rather than a CPU surface.
    pub is_accelerated: bool,
    /// Composite with a transparent background.
    pub is_transparent: bool,
    /// Device pixel ratio applied to CSS units.
    pub device_scale: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            is_accelerated: true,
            is_transparent: true,
            device_scale: 1.0,
        }
    }
}

/// Where a realized view's pixels live on the device, as reported by the
/// engine after a render pass.
#[derive(Debug, Copy, Clone)]
pub struct RenderTargetInfo {
    pub texture: TextureId,
    pub render_target: RenderTargetId,
    pub uv: UvRect,
}

/// Routes a script-to-host call to whoever owns the callback table. The
/// arguments are the originating view, the bound name, and the single
/// string argument from the page.
pub type CallbackDispatcher = Arc<dyn Fn(ViewId, &str, &str) -> Result<(), String> + Send + Sync>;

/// Page-callable function handle handed to the engine by
/// [`EngineView::bind_host_function`]. Carries only the `(view, name)` pair;
/// the actual handler is looked up at invocation time, so proxies that
/// outlive their registration fail instead of calling stale code.
pub struct ScriptProxy {
    view: ViewId,
    name: String,
    dispatcher: CallbackDispatcher,
}

impl ScriptProxy {
    pub fn new(view: ViewId, name: &str, dispatcher: CallbackDispatcher) -> Self {
        Self {
            view,
            name: name.to_string(),
            dispatcher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Called by the engine when the page invokes the proxy.
    pub fn invoke(&self, argument: &str) -> Result<(), String> {
        (self.dispatcher)(self.view, &self.name, argument)
    }
}

/// Sink for view lifecycle events raised by the engine. Implementations
/// must tolerate calls from the engine thread during `update` or `render`.
pub trait ViewEventSink: Send + Sync {
    fn on_begin_loading(&self, view: ViewId, url: &str);
    fn on_finish_loading(&self, view: ViewId, url: &str);
    fn on_fail_loading(&self, view: ViewId, url: &str, description: &str);
    fn on_dom_ready(&self, view: ViewId, url: &str);
    fn on_console_message(&self, view: ViewId, message: &str);
}

/// Services the core hands to the engine at startup.
pub struct EngineHost {
    /// Resource and command channel to the render thread.
    pub gpu: Arc<GpuBridge>,
    /// Receiver for per-view lifecycle events.
    pub events: Arc<dyn ViewEventSink>,
}

/// Constructs the engine runtime. Runs exactly once, on the engine thread,
/// when the first view is created.
pub type EngineFactory = Box<dyn FnOnce(EngineHost) -> anyhow::Result<Box<dyn EngineRuntime>> + Send>;

/// The embedded engine as a whole. Implementations are not `Send`; every
/// method runs on the engine thread.
pub trait EngineRuntime {
    /// Construct a view surface of the given size. The returned object is
    /// owned by the caller; the runtime keeps no strong reference to it.
    fn create_view(
        &mut self,
        id: ViewId,
        width: u32,
        height: u32,
        config: &ViewConfig,
    ) -> anyhow::Result<Box<dyn EngineView>>;

    /// Advance timers, pending loads, and script jobs by one tick.
    fn update(&mut self) -> anyhow::Result<()>;

    /// Recompute layout/styles for views that changed since the last pass.
    fn refresh_display(&mut self);

    /// Produce this frame's surfaces and publish the GPU command list.
    fn render(&mut self) -> anyhow::Result<()>;
}

/// One engine-side view. Like the runtime, engine-thread only.
///
/// Device resources backing the view's surface are allocated through the
/// GPU bridge and are NOT released when the view is dropped; the embedder
/// releases them after teardown, once the render thread is done with them.
pub trait EngineView {
    fn load_url(&mut self, url: &str) -> anyhow::Result<()>;

    fn focus(&mut self);
    fn unfocus(&mut self);
    fn has_focus(&self) -> bool;
    /// True when an editable element inside the page holds the caret.
    fn has_input_focus(&self) -> bool;

    /// Run a script in the page context and return its string result.
    fn evaluate_script(&mut self, script: &str) -> Result<String, ScriptError>;

    /// Call the named global function with a single string argument.
    fn call_global(&mut self, name: &str, argument: &str) -> Result<(), ScriptError>;

    /// Expose a host function on the page's global object. Must be called
    /// again after every page load; bindings do not survive navigation.
    fn bind_host_function(&mut self, name: &str, proxy: ScriptProxy) -> anyhow::Result<()>;

    /// Device location of the view's current surface, if it has rendered.
    fn render_target(&self) -> Option<RenderTargetInfo>;

    /// Copy the current surface pixels (BGRA) into `buffer`, resizing it
    /// as needed. Returns false while the view has no surface.
    fn copy_surface_into(&self, buffer: &mut StagingBuffer) -> bool;

    /// True when the surface changed since the last `render_target` call.
    fn needs_repaint(&self) -> bool;

    /// Disconnect event listeners ahead of drop, so teardown of one view
    /// cannot observe callbacks into a half-dead object.
    fn detach_listeners(&mut self);
}

/// Everything owned by the engine thread. Built lazily by the
/// [`EngineFactory`] on first use; none of it is `Send`.
pub struct EngineState {
    pub runtime: Option<Box<dyn EngineRuntime>>,
    pub views: HashMap<ViewId, Box<dyn EngineView>>,
}

impl EngineState {
    pub fn new() -> Self {
        Self {
            runtime: None,
            views: HashMap::new(),
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}
