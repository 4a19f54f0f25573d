use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::CoreConfig;
use crate::engine::{
    CallbackDispatcher, EngineFactory, EngineHost, EngineState, ScriptProxy, ViewEventSink,
};
use crate::errors::CoreError;
use crate::executor::SerialExecutor;
use crate::gpu::commands::{TextureDesc, TextureFormat, TextureId, TextureInit, UvRect};
use crate::gpu::{GpuBridge, GpuDevice};
use crate::host::HostShell;
use crate::interop::{CallbackRegistry, ScriptCallback};
use crate::queue::{InFlightGuard, ViewOperation};
use crate::ticker::Ticker;
use crate::view::{DomReadyCallback, ViewEntry, ViewId, ViewRegistry};

/// State shared between the host-facing API, the event router, and the
/// background ticker.
struct CoreShared {
    config: CoreConfig,
    executor: SerialExecutor<EngineState>,
    registry: ViewRegistry,
    callbacks: Arc<CallbackRegistry>,
    gpu: Arc<GpuBridge>,
    shell: Arc<dyn HostShell>,
    focused: Mutex<Option<ViewId>>,
    /// Destroyed views whose device resources have not been released yet.
    retiring: Mutex<Vec<Arc<ViewEntry>>>,
}

impl CoreShared {
    fn dispatcher(&self) -> CallbackDispatcher {
        let callbacks = self.callbacks.clone();
        Arc::new(move |view, name, argument| callbacks.dispatch(view, name, argument))
    }
}

enum InitState {
    Pending(EngineFactory),
    Ready,
    Failed,
}

/// Embeds a single-threaded HTML engine into a host's render loop.
///
/// All engine access is marshaled onto one dedicated thread; the host calls
/// this API from any thread and calls [`present`](Self::present) once per
/// frame from its render thread. Engine construction is deferred until the
/// first [`create_view`](Self::create_view), so a host that never opens a
/// view never pays for the engine.
pub struct HudCore {
    shared: Arc<CoreShared>,
    ticker: Mutex<Option<Ticker>>,
    init: Mutex<InitState>,
    cursor_texture: Mutex<Option<TextureId>>,
    shut_down: AtomicBool,
}

impl HudCore {
    pub fn new(config: CoreConfig, factory: EngineFactory, shell: Arc<dyn HostShell>) -> Self {
        let executor = SerialExecutor::spawn("hudkit-engine", EngineState::new);
        let shared = Arc::new(CoreShared {
            config,
            executor,
            registry: ViewRegistry::new(),
            callbacks: Arc::new(CallbackRegistry::new()),
            gpu: Arc::new(GpuBridge::new()),
            shell,
            focused: Mutex::new(None),
            retiring: Mutex::new(Vec::new()),
        });
        Self {
            shared,
            ticker: Mutex::new(None),
            init: Mutex::new(InitState::Pending(factory)),
            cursor_texture: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Run the engine factory on the engine thread, then start the update
    /// ticker. A factory failure is permanent; later calls keep failing
    /// without re-running it.
    fn ensure_initialized(&self) -> Result<(), CoreError> {
        let mut init = self.init.lock().unwrap();
        match &*init {
            InitState::Ready => return Ok(()),
            InitState::Failed => {
                return Err(CoreError::EngineInit(
                    "engine previously failed to initialize".to_string(),
                ))
            }
            InitState::Pending(_) => {}
        }
        let InitState::Pending(factory) = std::mem::replace(&mut *init, InitState::Failed) else {
            unreachable!()
        };

        let host = EngineHost {
            gpu: self.shared.gpu.clone(),
            events: Arc::new(EventRouter {
                shared: self.shared.clone(),
            }),
        };
        let outcome = self
            .shared
            .executor
            .submit(move |state: &mut EngineState| match factory(host) {
                Ok(runtime) => {
                    state.runtime = Some(runtime);
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            })
            .wait()?;
        if let Err(message) = outcome {
            log::error!("Engine initialization failed: {message}");
            return Err(CoreError::EngineInit(message));
        }

        if let Some(path) = &self.shared.config.cursor_image {
            match load_cursor_texture(&self.shared.gpu, path) {
                Ok(texture) => *self.cursor_texture.lock().unwrap() = Some(texture),
                Err(e) => log::warn!("Cursor image unavailable: {e}"),
            }
        }

        let shared = self.shared.clone();
        let ticker = Ticker::spawn(
            "hudkit-update",
            self.shared.config.update_interval,
            self.shared.config.update_backoff,
            move || {
                let handle = shared.executor.submit(|state: &mut EngineState| {
                    match state.runtime.as_mut() {
                        Some(runtime) => runtime.update().map_err(|e| e.to_string()),
                        None => Ok(()),
                    }
                });
                match handle.wait() {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(message)) => anyhow::bail!("engine update failed: {message}"),
                    Err(e) => anyhow::bail!("engine update task failed: {e}"),
                }
            },
        );
        *self.ticker.lock().unwrap() = Some(ticker);

        *init = InitState::Ready;
        log::info!("HudKit: engine initialized");
        Ok(())
    }

    fn entry(&self, id: ViewId) -> Result<Arc<ViewEntry>, CoreError> {
        self.shared.registry.get(id).ok_or(CoreError::InvalidViewId)
    }

    /// Register a view backed by `document` (a path under the configured
    /// views root). The engine-side object is realized on the next
    /// [`present`](Self::present).
    ///
    /// `on_dom_ready` runs on the engine thread each time the view's
    /// document reaches DOM-ready; it must not call blocking methods of
    /// this type.
    pub fn create_view(
        &self,
        document: &str,
        on_dom_ready: Option<DomReadyCallback>,
    ) -> Result<ViewId, CoreError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(CoreError::ShutDown);
        }
        self.ensure_initialized()?;

        let target = format!(
            "{}/{}",
            self.shared.config.views_root.trim_end_matches('/'),
            document
        );
        loop {
            let id = self.shared.registry.allocate_id();
            let entry = Arc::new(ViewEntry::new(
                id,
                target.clone(),
                self.shared.config.default_scroll_step,
                self.shared.registry.next_z_order(),
            ));
            *entry.dom_ready.lock().unwrap() = on_dom_ready.clone();
            if self.shared.registry.insert(entry) {
                log::info!("View {id}: created for '{document}'");
                return Ok(id);
            }
        }
    }

    pub fn is_valid(&self, id: ViewId) -> bool {
        self.shared.registry.contains(id)
    }

    /// True once the view is realized and its document has finished
    /// loading.
    pub fn is_ready(&self, id: ViewId) -> bool {
        self.shared
            .registry
            .get(id)
            .map(|e| e.is_realized() && e.is_loading_finished())
            .unwrap_or(false)
    }

    /// True once the view has a device surface available for compositing.
    pub fn has_surface(&self, id: ViewId) -> bool {
        self.shared
            .registry
            .get(id)
            .map(|e| e.gpu.lock().unwrap().render_target_texture.is_some())
            .unwrap_or(false)
    }

    pub fn show(&self, id: ViewId) -> Result<(), CoreError> {
        self.entry(id)?.hidden.store(false, Ordering::Release);
        Ok(())
    }

    /// Stop compositing the view. A hidden view cannot keep input focus,
    /// so hiding the focused view also releases focus (and its pause).
    pub fn hide(&self, id: ViewId) -> Result<(), CoreError> {
        self.entry(id)?.hidden.store(true, Ordering::Release);
        let focused = *self.shared.focused.lock().unwrap();
        if focused == Some(id) {
            self.unfocus(id);
        }
        Ok(())
    }

    pub fn is_hidden(&self, id: ViewId) -> Result<bool, CoreError> {
        Ok(self.entry(id)?.is_hidden())
    }

    /// Give a view keyboard/mouse focus. Refused (returning false) for
    /// unknown, unrealized, hidden, or already-focused views, and while a
    /// host modal is open. Any other view holding engine focus is unfocused
    /// first, so at most one view has focus afterwards. With `pause_host`
    /// the host's pause refcount is incremented once until focus is
    /// released.
    pub fn focus(&self, id: ViewId, pause_host: bool) -> bool {
        if self.shut_down.load(Ordering::Acquire) {
            return false;
        }
        let Some(entry) = self.shared.registry.get(id) else {
            log::error!("Focus: invalid view {id}");
            return false;
        };
        if *self.shared.focused.lock().unwrap() == Some(id) {
            log::warn!("View {id}: focus ignored, already focused");
            return false;
        }
        if !entry.is_realized() {
            log::warn!("View {id}: focus refused, view is not realized yet");
            return false;
        }
        if entry.is_hidden() {
            log::warn!("View {id}: focus refused, view is hidden");
            return false;
        }
        if self.shared.shell.is_modal_active() {
            log::warn!("View {id}: focus refused, a host modal is active");
            return false;
        }

        // Release engine focus held by any other view. Queried per view;
        // the tracked id can be stale if the engine moved focus itself.
        for other_id in self.shared.registry.ids() {
            if other_id == id {
                continue;
            }
            let Some(other) = self.shared.registry.get(other_id) else {
                continue;
            };
            if !other.is_realized() {
                continue;
            }
            let had_focus = self
                .shared
                .executor
                .submit(move |state: &mut EngineState| {
                    state
                        .views
                        .get(&other_id)
                        .map(|v| v.has_focus())
                        .unwrap_or(false)
                })
                .wait()
                .unwrap_or(false);
            if had_focus {
                self.shared.executor.submit(move |state: &mut EngineState| {
                    if let Some(view) = state.views.get_mut(&other_id) {
                        view.unfocus();
                    }
                });
                if other.paused.swap(false, Ordering::AcqRel) {
                    self.shared.shell.pop_pause();
                }
            }
        }

        self.shared.executor.submit(move |state: &mut EngineState| {
            if let Some(view) = state.views.get_mut(&id) {
                view.focus();
            }
        });

        self.shared.shell.begin_input_capture(id);
        *self.shared.focused.lock().unwrap() = Some(id);
        if pause_host && !entry.paused.swap(true, Ordering::AcqRel) {
            self.shared.shell.push_pause();
        }
        log::info!("View {id}: focused");
        true
    }

    /// Release focus from a view. A no-op (with a warning) if the view does
    /// not currently hold it.
    pub fn unfocus(&self, id: ViewId) {
        let Some(entry) = self.shared.registry.get(id) else {
            log::error!("Unfocus: invalid view {id}");
            return;
        };
        {
            let mut focused = self.shared.focused.lock().unwrap();
            if *focused != Some(id) {
                log::warn!("View {id}: unfocus ignored, view is not focused");
                return;
            }
            *focused = None;
        }
        if entry.paused.swap(false, Ordering::AcqRel) {
            self.shared.shell.pop_pause();
        }
        self.shared.shell.end_input_capture(None);
        self.shared.executor.submit(move |state: &mut EngineState| {
            if let Some(view) = state.views.get_mut(&id) {
                view.unfocus();
            }
        });
        log::info!("View {id}: unfocused");
    }

    pub fn focused_view(&self) -> Option<ViewId> {
        *self.shared.focused.lock().unwrap()
    }

    /// Engine-side focus state. Round-trips to the engine thread; any
    /// failure reads as unfocused.
    pub fn has_focus(&self, id: ViewId) -> bool {
        if !self.shared.registry.contains(id) {
            return false;
        }
        self.shared
            .executor
            .submit(move |state: &mut EngineState| {
                state.views.get(&id).map(|v| v.has_focus()).unwrap_or(false)
            })
            .wait()
            .unwrap_or(false)
    }

    /// True when an editable element inside the view's page holds the
    /// caret, so the host can suppress its own keybindings.
    pub fn has_input_focus(&self, id: ViewId) -> bool {
        if !self.shared.registry.contains(id) {
            return false;
        }
        self.shared
            .executor
            .submit(move |state: &mut EngineState| {
                state
                    .views
                    .get(&id)
                    .map(|v| v.has_input_focus())
                    .unwrap_or(false)
            })
            .wait()
            .unwrap_or(false)
    }

    /// Set the pixels scrolled per wheel line. Non-positive values fall
    /// back to 16.
    pub fn set_scroll_step(&self, id: ViewId, step: i32) {
        let Some(entry) = self.shared.registry.get(id) else {
            log::error!("SetScrollStep: invalid view {id}");
            return;
        };
        let step = if step <= 0 {
            log::warn!("View {id}: invalid scroll step {step}, using 16");
            16
        } else {
            step
        };
        entry.scroll_step.store(step, Ordering::Release);
    }

    /// Pixels scrolled per wheel line; the configured default for unknown
    /// views.
    pub fn scroll_step(&self, id: ViewId) -> i32 {
        match self.shared.registry.get(id) {
            Some(entry) => entry.scroll_step.load(Ordering::Acquire),
            None => self.shared.config.default_scroll_step,
        }
    }

    pub fn set_order(&self, id: ViewId, order: i32) {
        let Some(entry) = self.shared.registry.get(id) else {
            log::error!("SetOrder: invalid view {id}");
            return;
        };
        entry.z_order.store(order, Ordering::Release);
    }

    /// Compositing order of a view; -1 for unknown views.
    pub fn order(&self, id: ViewId) -> i32 {
        match self.shared.registry.get(id) {
            Some(entry) => entry.z_order.load(Ordering::Acquire),
            None => -1,
        }
    }

    /// Tear a view down. Safe to call twice; the second call is a no-op.
    ///
    /// Ordering matters: focus is released while the view is still
    /// registered, callbacks go next, the engine-side object is destroyed
    /// to completion on the engine thread, and only then are the view's
    /// device resources queued for release on the render thread.
    pub fn destroy(&self, id: ViewId) {
        {
            let mut focused = self.shared.focused.lock().unwrap();
            if *focused == Some(id) {
                *focused = None;
                if let Some(entry) = self.shared.registry.get(id) {
                    if entry.paused.swap(false, Ordering::AcqRel) {
                        self.shared.shell.pop_pause();
                    }
                }
                self.shared.shell.end_input_capture(None);
            }
        }

        let Some(entry) = self.shared.registry.remove(id) else {
            log::warn!("Destroy: view {id} not found (already destroyed?)");
            return;
        };

        let purged = self.shared.callbacks.remove_view(id);
        if purged > 0 {
            log::debug!("View {id}: purged {purged} script listeners");
        }
        let dropped = entry.clear_operations();
        if dropped > 0 {
            log::debug!("View {id}: dropped {dropped} queued operations");
        }
        *entry.dom_ready.lock().unwrap() = None;

        let teardown = self.shared.executor.submit(move |state: &mut EngineState| {
            if let Some(mut view) = state.views.remove(&id) {
                view.unfocus();
                view.detach_listeners();
            }
        });
        if let Err(e) = teardown.wait() {
            log::error!("View {id}: engine teardown did not complete: {e}");
        }

        entry.staging.lock().unwrap().clear();
        entry.realized.store(false, Ordering::Release);
        entry.loading_finished.store(false, Ordering::Release);

        // The render thread may still composite this frame from the view's
        // texture; the next present queues the release.
        if entry.gpu.lock().unwrap().render_target_texture.is_some() {
            entry.pending_resource_release.store(true, Ordering::Release);
            self.shared.retiring.lock().unwrap().push(entry);
        }
        log::info!("View {id}: destroyed");
    }

    /// Evaluate a script in the view's page context. `callback` runs on the
    /// engine thread with the result, exactly once; any failure (unknown
    /// view, script fault, shutdown) delivers an empty string.
    pub fn invoke<F>(&self, id: ViewId, script: &str, callback: F)
    where
        F: FnOnce(String) + Send + 'static,
    {
        if self.shut_down.load(Ordering::Acquire)
            || self.shared.executor.is_closed()
            || !self.shared.registry.contains(id)
        {
            log::error!("Invoke: invalid view {id}");
            callback(String::new());
            return;
        }
        let script = script.to_string();
        let reply = ReplyOnce::new(callback);
        self.shared.executor.submit(move |state: &mut EngineState| {
            let result = state
                .views
                .get_mut(&id)
                .and_then(|view| match view.evaluate_script(&script) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        log::error!("View {id}: script evaluation failed: {e}");
                        None
                    }
                })
                .unwrap_or_default();
            reply.fire(result);
        });
    }

    /// Call a global function in the view's page with one string argument.
    /// Fire-and-forget; failures are logged and swallowed.
    pub fn interop_call(&self, id: ViewId, function: &str, argument: &str) {
        if self.shut_down.load(Ordering::Acquire) || !self.shared.registry.contains(id) {
            log::error!("InteropCall: invalid view {id}");
            return;
        }
        let function = function.to_string();
        let argument = argument.to_string();
        self.shared.executor.submit(move |state: &mut EngineState| {
            if let Some(view) = state.views.get_mut(&id) {
                if let Err(e) = view.call_global(&function, &argument) {
                    log::error!("View {id}: interop call '{function}' failed: {e}");
                }
            }
        });
    }

    /// Expose a host callback to the view's page under `name`. Listeners
    /// registered before the page loads are bound when loading finishes;
    /// registration on a live page binds immediately.
    pub fn register_js_listener(&self, id: ViewId, name: &str, callback: ScriptCallback) {
        let Some(entry) = self.shared.registry.get(id) else {
            log::error!("RegisterJSListener: invalid view {id}");
            return;
        };
        self.shared.callbacks.register(id, name, callback);

        if entry.is_realized() && entry.is_loading_finished() {
            let name = name.to_string();
            let dispatcher = self.shared.dispatcher();
            self.shared.executor.submit(move |state: &mut EngineState| {
                if let Some(view) = state.views.get_mut(&id) {
                    if let Err(e) =
                        view.bind_host_function(&name, ScriptProxy::new(id, &name, dispatcher))
                    {
                        log::error!("View {id}: binding '{name}' failed: {e}");
                    }
                }
            });
        }
    }

    /// Snapshot the view's surface into its CPU staging buffer and return
    /// a copy of the pixels (BGRA, tightly packed). Empty until the view
    /// has rendered at least once.
    pub fn copy_surface(&self, id: ViewId) -> Result<Vec<u8>, CoreError> {
        let entry = self.entry(id)?;
        let task_entry = entry.clone();
        let copied = self
            .shared
            .executor
            .submit(move |state: &mut EngineState| {
                let Some(view) = state.views.get(&task_entry.id) else {
                    return false;
                };
                let mut staging = task_entry.staging.lock().unwrap();
                view.copy_surface_into(&mut staging)
            })
            .wait()?;
        if !copied {
            return Ok(Vec::new());
        }
        let pixels = entry.staging.lock().unwrap().pixels.clone();
        Ok(pixels)
    }

    /// Queue a deferred operation against the view's engine object.
    /// Returns false if the view is unknown or its queue is full.
    pub fn enqueue_operation(&self, id: ViewId, op: ViewOperation) -> bool {
        let Some(entry) = self.shared.registry.get(id) else {
            log::error!("EnqueueOperation: invalid view {id}");
            return false;
        };
        entry.enqueue(op, self.shared.config.operation_queue_capacity)
    }

    /// Dispatch the view's oldest queued operation to the engine thread,
    /// if the view is realized and no operation is already in flight.
    pub fn process_next_operation(&self, id: ViewId) -> bool {
        let Some(entry) = self.shared.registry.get(id) else {
            return false;
        };
        Self::dispatch_operation(&self.shared, &entry)
    }

    /// Round-robin over every view, dispatching at most one queued
    /// operation each. Called once per frame by [`present`](Self::present).
    pub fn process_all_operations(&self) {
        for entry in self.shared.registry.entries() {
            Self::dispatch_operation(&self.shared, &entry);
        }
    }

    fn dispatch_operation(shared: &CoreShared, entry: &Arc<ViewEntry>) -> bool {
        if !entry.is_realized() {
            return false;
        }
        let Some(guard) = InFlightGuard::claim(entry) else {
            return false;
        };
        let Some(op) = entry.pop_operation() else {
            return false;
        };
        let id = entry.id;
        shared.executor.submit(move |state: &mut EngineState| {
            // Guard dropped here even if the view is gone, or if the task
            // itself is dropped by a closed executor.
            let _guard = guard;
            if let Some(view) = state.views.get_mut(&id) {
                op(view.as_mut());
            }
        });
        true
    }

    pub fn queue_size(&self, id: ViewId) -> usize {
        self.shared
            .registry
            .get(id)
            .map(|e| e.queue_size())
            .unwrap_or(0)
    }

    pub fn is_processing(&self, id: ViewId) -> bool {
        self.shared
            .registry
            .get(id)
            .map(|e| e.is_processing())
            .unwrap_or(false)
    }

    pub fn clear_operations(&self, id: ViewId) -> usize {
        self.shared
            .registry
            .get(id)
            .map(|e| e.clear_operations())
            .unwrap_or(0)
    }

    /// Per-frame entry point, called from the host's render thread.
    ///
    /// Realizes pending views, runs one engine render pass, pumps view
    /// operation queues, executes queued device work, and composites
    /// visible surfaces over the host's back buffer in ascending z-order.
    pub fn present(&self, device: &mut dyn GpuDevice) {
        if self.shut_down.load(Ordering::Acquire) {
            // Resource releases queued by shutdown still need a frame on
            // the render thread to reach the device.
            self.release_retired_surfaces();
            self.shared.gpu.execute_frame(device);
            return;
        }
        if !matches!(*self.init.lock().unwrap(), InitState::Ready) {
            return;
        }

        let views: Vec<Arc<ViewEntry>> = self.shared.registry.entries();
        let config = self.shared.config.clone();
        let engine_views = views.clone();
        let engine_pass = self.shared.executor.submit(move |state: &mut EngineState| {
            for entry in &engine_views {
                if entry.is_realized() {
                    continue;
                }
                let Some(target) = entry.pending_load.lock().unwrap().take() else {
                    continue;
                };
                let Some(runtime) = state.runtime.as_mut() else {
                    return;
                };
                match runtime.create_view(
                    entry.id,
                    config.surface_width,
                    config.surface_height,
                    &config.view_config,
                ) {
                    Ok(mut view) => {
                        if let Err(e) = view.load_url(&target) {
                            log::error!("View {}: initial load failed: {e}", entry.id);
                        }
                        // New views start unfocused regardless of engine
                        // defaults.
                        view.unfocus();
                        state.views.insert(entry.id, view);
                        entry.realized.store(true, Ordering::Release);
                    }
                    Err(e) => {
                        // The load target was consumed; no retry next frame.
                        log::error!("View {}: realization failed: {e}", entry.id);
                    }
                }
            }

            let Some(runtime) = state.runtime.as_mut() else {
                return;
            };
            runtime.refresh_display();
            if let Err(e) = runtime.render() {
                log::error!("Engine render pass failed: {e}");
            }

            for entry in &engine_views {
                if !entry.is_realized() {
                    continue;
                }
                let Some(view) = state.views.get(&entry.id) else {
                    continue;
                };
                if let Some(info) = view.render_target() {
                    let mut refs = entry.gpu.lock().unwrap();
                    refs.render_target_texture = Some(info.texture);
                    refs.render_target = Some(info.render_target);
                    refs.uv = Some(info.uv);
                }
                if view.needs_repaint() {
                    entry.new_frame_ready.store(true, Ordering::Release);
                }
            }
        });
        if let Err(e) = engine_pass.wait() {
            log::error!("Present: engine pass failed: {e}");
        }

        self.process_all_operations();

        self.release_retired_surfaces();
        self.shared.gpu.execute_frame(device);

        let mut items: Vec<(i32, ViewId, TextureId, UvRect)> = Vec::new();
        for entry in &views {
            if !entry.is_realized() || entry.is_hidden() {
                continue;
            }
            let refs = entry.gpu.lock().unwrap();
            if let (Some(texture), Some(uv)) = (refs.render_target_texture, refs.uv) {
                items.push((entry.z_order.load(Ordering::Acquire), entry.id, texture, uv));
            }
        }
        items.sort_by_key(|(z, id, _, _)| (*z, *id));
        for (_, id, texture, uv) in items {
            if !self.shared.gpu.texture_exists(texture) {
                continue;
            }
            if let Err(e) = device.composite_surface(texture, &uv) {
                log::error!("View {id}: composite failed: {e}");
            }
            if let Some(entry) = self.shared.registry.get(id) {
                entry.new_frame_ready.store(false, Ordering::Release);
            }
        }

        if self.shared.focused.lock().unwrap().is_some() {
            if let Some(texture) = *self.cursor_texture.lock().unwrap() {
                if self.shared.gpu.texture_exists(texture) {
                    if let Some((x, y)) = self.shared.shell.cursor_position() {
                        if let Err(e) = device.draw_cursor_overlay(texture, x, y) {
                            log::error!("Cursor overlay failed: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Queue release of device resources held by views destroyed since the
    /// last frame, and clear their release markers.
    fn release_retired_surfaces(&self) {
        let retiring = std::mem::take(&mut *self.shared.retiring.lock().unwrap());
        for entry in retiring {
            let refs = std::mem::take(&mut *entry.gpu.lock().unwrap());
            if let Some(render_target) = refs.render_target {
                self.shared.gpu.destroy_render_target(render_target);
            }
            if let Some(texture) = refs.render_target_texture {
                self.shared.gpu.destroy_texture(texture);
            }
            entry.pending_resource_release.store(false, Ordering::Release);
        }
    }

    /// Tear everything down: stop the ticker, destroy every view, queue
    /// release of all device resources, and join the engine thread. Later
    /// API calls fail fast. Runs at most once; also invoked by drop.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("HudKit: shutting down");

        if let Some(ticker) = self.ticker.lock().unwrap().take() {
            ticker.stop();
            drop(ticker);
        }

        for id in self.shared.registry.ids() {
            self.destroy(id);
        }

        // release_all below covers every surface still awaiting the
        // per-view release path; dropping the markers avoids queueing the
        // same destroys twice.
        for entry in std::mem::take(&mut *self.shared.retiring.lock().unwrap()) {
            *entry.gpu.lock().unwrap() = Default::default();
            entry.pending_resource_release.store(false, Ordering::Release);
        }
        self.shared.gpu.release_all();
        *self.cursor_texture.lock().unwrap() = None;

        // Engine objects must drop on the engine thread.
        self.shared.executor.submit(|state: &mut EngineState| {
            state.views.clear();
            state.runtime = None;
        });
        self.shared.executor.shutdown();
    }
}

impl Drop for HudCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Delivers an invoke result exactly once. If the engine task never runs,
/// because the executor closed between the liveness check and the submit
/// or because the evaluation panicked, the drop path delivers an empty
/// string instead.
struct ReplyOnce {
    callback: Option<Box<dyn FnOnce(String) + Send>>,
}

impl ReplyOnce {
    fn new<F: FnOnce(String) + Send + 'static>(callback: F) -> Self {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    fn fire(mut self, result: String) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl Drop for ReplyOnce {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            callback(String::new());
        }
    }
}

/// Receives engine events and translates them into registry state changes
/// and queued engine-thread work. Runs on the engine thread, so it never
/// blocks on the executor.
struct EventRouter {
    shared: Arc<CoreShared>,
}

impl ViewEventSink for EventRouter {
    fn on_begin_loading(&self, view: ViewId, url: &str) {
        log::debug!("View {view}: loading '{url}'");
        if let Some(entry) = self.shared.registry.get(view) {
            entry.loading_finished.store(false, Ordering::Release);
        }
    }

    fn on_finish_loading(&self, view: ViewId, url: &str) {
        log::debug!("View {view}: finished loading '{url}'");
        let Some(entry) = self.shared.registry.get(view) else {
            return;
        };
        entry.loading_finished.store(true, Ordering::Release);

        // Page globals are fresh after every load; rebind all registered
        // host functions.
        let names = self.shared.callbacks.names_for(view);
        if names.is_empty() {
            return;
        }
        let dispatcher = self.shared.dispatcher();
        self.shared.executor.submit(move |state: &mut EngineState| {
            let Some(v) = state.views.get_mut(&view) else {
                return;
            };
            for name in names {
                if let Err(e) =
                    v.bind_host_function(&name, ScriptProxy::new(view, &name, dispatcher.clone()))
                {
                    log::error!("View {view}: binding '{name}' failed: {e}");
                }
            }
        });
    }

    fn on_fail_loading(&self, view: ViewId, url: &str, description: &str) {
        log::error!("View {view}: failed to load '{url}': {description}");
    }

    fn on_dom_ready(&self, view: ViewId, url: &str) {
        log::debug!("View {view}: DOM ready for '{url}'");
        let Some(entry) = self.shared.registry.get(view) else {
            return;
        };
        let callback = entry.dom_ready.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(view);
        }
    }

    fn on_console_message(&self, view: ViewId, message: &str) {
        log::debug!("View {view} console: {message}");
    }
}

/// Decode the cursor PNG and queue its upload. Only 8-bit RGBA images are
/// accepted; channels are swizzled to BGRA to match surface textures.
fn load_cursor_texture(gpu: &GpuBridge, path: &Path) -> anyhow::Result<TextureId> {
    let file = std::fs::File::open(path)?;
    let decoder = png::Decoder::new(std::io::BufReader::new(file));
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    if info.color_type != png::ColorType::Rgba || info.bit_depth != png::BitDepth::Eight {
        anyhow::bail!("cursor image must be 8-bit RGBA");
    }
    buf.truncate(info.buffer_size());
    for pixel in buf.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }

    let id = gpu.next_texture_id();
    gpu.create_texture(
        id,
        TextureDesc {
            width: info.width,
            height: info.height,
            format: TextureFormat::Bgra8,
            init: TextureInit::Pixels {
                data: buf,
                stride: info.width * 4,
            },
        },
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::stub::{failing_engine_factory, stub_engine_factory};
    use crate::gpu::backends::null::{DeviceEvent, NullDevice};
    use crate::host::NullShell;
    use std::io::Write as _;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[derive(Default)]
    struct CountingShell {
        pushes: AtomicUsize,
        pops: AtomicUsize,
        captures: AtomicUsize,
        releases: AtomicUsize,
    }

    impl HostShell for CountingShell {
        fn begin_input_capture(&self, _view: ViewId) {
            self.captures.fetch_add(1, Ordering::SeqCst);
        }

        fn end_input_capture(&self, _next: Option<ViewId>) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn push_pause(&self) {
            self.pushes.fetch_add(1, Ordering::SeqCst);
        }

        fn pop_pause(&self) {
            self.pops.fetch_add(1, Ordering::SeqCst);
        }

        fn cursor_position(&self) -> Option<(f32, f32)> {
            Some((12.0, 34.0))
        }
    }

    fn test_config() -> CoreConfig {
        CoreConfig {
            surface_width: 64,
            surface_height: 64,
            ..CoreConfig::default()
        }
    }

    fn stub_core() -> HudCore {
        init_logging();
        HudCore::new(test_config(), stub_engine_factory(), Arc::new(NullShell))
    }

    /// Pump frames until the condition holds or a generous deadline passes.
    fn pump_until(
        core: &HudCore,
        device: &mut NullDevice,
        what: &str,
        cond: impl Fn(&NullDevice) -> bool,
    ) {
        for _ in 0..500 {
            core.present(device);
            if cond(device) {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("timed out waiting for: {what}");
    }

    fn ready_view(core: &HudCore, device: &mut NullDevice) -> ViewId {
        let id = core.create_view("hud/index.html", None).unwrap();
        pump_until(core, device, "view ready with surface", |_| {
            core.is_ready(id) && core.has_surface(id)
        });
        id
    }

    #[test]
    fn view_realizes_loads_and_composites() {
        let core = stub_core();
        let mut device = NullDevice::new();

        let id = core.create_view("hud/index.html", None).unwrap();
        assert!(core.is_valid(id));
        assert!(!core.is_ready(id));

        pump_until(&core, &mut device, "first composite", |d| {
            d.composite_count() > 0
        });
        assert!(core.is_ready(id));
        assert!(device.draw_count() > 0);
    }

    #[test]
    fn hidden_views_are_not_composited() {
        let core = stub_core();
        let mut device = NullDevice::new();
        let id = ready_view(&core, &mut device);

        pump_until(&core, &mut device, "composite while visible", |d| {
            d.composite_count() > 0
        });

        core.hide(id).unwrap();
        assert!(core.is_hidden(id).unwrap());
        let before = device.composite_count();
        core.present(&mut device);
        core.present(&mut device);
        assert_eq!(device.composite_count(), before);

        core.show(id).unwrap();
        pump_until(&core, &mut device, "composite after show", |d| {
            d.composite_count() > before
        });
    }

    #[test]
    fn focus_is_exclusive_and_pause_refcount_balances() {
        init_logging();
        let shell = Arc::new(CountingShell::default());
        let core = HudCore::new(test_config(), stub_engine_factory(), shell.clone());
        let mut device = NullDevice::new();

        let a = ready_view(&core, &mut device);
        let b = ready_view(&core, &mut device);

        assert!(core.focus(a, true));
        assert!(core.has_focus(a));
        assert_eq!(shell.pushes.load(Ordering::SeqCst), 1);
        assert_eq!(shell.captures.load(Ordering::SeqCst), 1);

        // Focusing A again is refused and must not pause twice.
        assert!(!core.focus(a, true));
        assert!(core.has_focus(a));
        assert_eq!(shell.pushes.load(Ordering::SeqCst), 1);

        assert!(core.focus(b, true));
        assert!(core.has_focus(b));
        assert!(!core.has_focus(a));
        assert_eq!(core.focused_view(), Some(b));
        assert_eq!(shell.pushes.load(Ordering::SeqCst), 2);
        assert_eq!(shell.pops.load(Ordering::SeqCst), 1);

        core.unfocus(b);
        assert_eq!(shell.pops.load(Ordering::SeqCst), 2);
        assert_eq!(shell.releases.load(Ordering::SeqCst), 1);
        assert!(!core.has_focus(b));
        assert_eq!(core.focused_view(), None);

        // Unfocusing an unfocused view changes nothing.
        core.unfocus(b);
        assert_eq!(shell.pops.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn focus_is_refused_before_realization_and_while_hidden() {
        let core = stub_core();
        let mut device = NullDevice::new();

        let id = core.create_view("hud/index.html", None).unwrap();
        assert!(!core.focus(id, false));

        pump_until(&core, &mut device, "view ready", |_| core.is_ready(id));
        core.hide(id).unwrap();
        assert!(!core.focus(id, false));

        core.show(id).unwrap();
        assert!(core.focus(id, false));
    }

    #[test]
    fn hiding_a_focused_view_releases_focus() {
        init_logging();
        let shell = Arc::new(CountingShell::default());
        let core = HudCore::new(test_config(), stub_engine_factory(), shell.clone());
        let mut device = NullDevice::new();

        let id = ready_view(&core, &mut device);
        assert!(core.focus(id, true));

        core.hide(id).unwrap();
        assert_eq!(core.focused_view(), None);
        assert!(!core.has_focus(id));
        assert_eq!(shell.pops.load(Ordering::SeqCst), 1);
        assert_eq!(shell.releases.load(Ordering::SeqCst), 1);

        // Hiding an unfocused view touches nothing.
        core.hide(id).unwrap();
        assert_eq!(shell.releases.load(Ordering::SeqCst), 1);
    }

    struct ModalShell;

    impl HostShell for ModalShell {
        fn is_modal_active(&self) -> bool {
            true
        }
    }

    #[test]
    fn focus_is_refused_while_host_modal_is_open() {
        init_logging();
        let core = HudCore::new(test_config(), stub_engine_factory(), Arc::new(ModalShell));
        let mut device = NullDevice::new();
        let id = ready_view(&core, &mut device);
        assert!(!core.focus(id, false));
    }

    #[test]
    fn destroy_is_idempotent_and_releases_focus() {
        init_logging();
        let shell = Arc::new(CountingShell::default());
        let core = HudCore::new(test_config(), stub_engine_factory(), shell.clone());
        let mut device = NullDevice::new();

        let id = ready_view(&core, &mut device);
        assert!(core.focus(id, true));

        core.destroy(id);
        assert!(!core.is_valid(id));
        assert_eq!(core.focused_view(), None);
        assert_eq!(shell.pops.load(Ordering::SeqCst), 1);

        core.destroy(id);
        assert_eq!(shell.pops.load(Ordering::SeqCst), 1);

        // Frames after destroy run clean and release the surface.
        core.present(&mut device);
        core.present(&mut device);
        assert!(device
            .events()
            .iter()
            .any(|e| matches!(e, DeviceEvent::DestroyedRenderTarget(_))));
    }

    #[test]
    fn destroy_releases_focus_before_the_registry_entry_disappears() {
        struct OrderingShell {
            check: Mutex<Option<Box<dyn Fn() -> bool + Send>>>,
            still_registered: AtomicBool,
        }

        impl HostShell for OrderingShell {
            fn end_input_capture(&self, _next: Option<ViewId>) {
                if let Some(check) = self.check.lock().unwrap().as_ref() {
                    self.still_registered.store(check(), Ordering::SeqCst);
                }
            }
        }

        init_logging();
        let shell = Arc::new(OrderingShell {
            check: Mutex::new(None),
            still_registered: AtomicBool::new(false),
        });
        let core = Arc::new(HudCore::new(
            test_config(),
            stub_engine_factory(),
            shell.clone(),
        ));
        let mut device = NullDevice::new();
        let id = ready_view(&core, &mut device);
        {
            let core = core.clone();
            *shell.check.lock().unwrap() = Some(Box::new(move || core.is_valid(id)));
        }

        assert!(core.focus(id, false));
        core.destroy(id);
        assert!(shell.still_registered.load(Ordering::SeqCst));

        // Break the shell -> core reference cycle so drop-time shutdown
        // runs.
        *shell.check.lock().unwrap() = None;
    }

    #[test]
    fn destroyed_view_resources_are_released_on_the_next_frame() {
        let core = stub_core();
        let mut device = NullDevice::new();
        let id = ready_view(&core, &mut device);
        let entry = core.shared.registry.get(id).unwrap();
        assert_eq!(device.live_texture_count(), 1);

        core.destroy(id);
        assert!(entry.pending_resource_release.load(Ordering::Acquire));
        assert_eq!(device.live_texture_count(), 1);

        core.present(&mut device);
        assert!(!entry.pending_resource_release.load(Ordering::Acquire));
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_render_target_count(), 0);
    }

    #[test]
    fn operation_queue_is_bounded_and_drains_in_order() {
        let core = stub_core();
        let mut device = NullDevice::new();
        let id = ready_view(&core, &mut device);

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let capacity = test_config().operation_queue_capacity;
        for i in 0..capacity {
            let seen = seen.clone();
            assert!(core.enqueue_operation(id, Box::new(move |_| seen.lock().unwrap().push(i))));
        }
        assert!(!core.enqueue_operation(id, Box::new(|_| {})));
        assert_eq!(core.queue_size(id), capacity);

        pump_until(&core, &mut device, "queue drained", |_| {
            core.queue_size(id) == 0 && !core.is_processing(id)
        });
        // Settle the last in-flight operation.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(*seen.lock().unwrap(), (0..capacity).collect::<Vec<_>>());
    }

    #[test]
    fn invoke_delivers_result_and_faults_deliver_empty_string() {
        let core = stub_core();
        let mut device = NullDevice::new();
        let id = ready_view(&core, &mut device);

        let (tx, rx) = mpsc::channel();
        core.invoke(id, "1 + 1", move |result| {
            tx.send(result).unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "1 + 1");

        let (tx, rx) = mpsc::channel();
        core.invoke(id, "throw:bad script", move |result| {
            tx.send(result).unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "");

        let (tx, rx) = mpsc::channel();
        core.invoke(ViewId(0xDEAD), "1 + 1", move |result| {
            tx.send(result).unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "");
    }

    #[test]
    fn invoke_reply_fires_empty_when_the_task_never_runs() {
        let (tx, rx) = mpsc::channel();
        let reply = ReplyOnce::new(move |result| tx.send(result).unwrap());
        drop(reply);
        assert_eq!(rx.try_recv().unwrap(), "");

        let (tx, rx) = mpsc::channel();
        let reply = ReplyOnce::new(move |result| tx.send(result).unwrap());
        reply.fire("done".to_string());
        assert_eq!(rx.try_recv().unwrap(), "done");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn listener_registered_before_load_is_reachable_from_the_page() {
        let core = stub_core();
        let mut device = NullDevice::new();

        let id = core.create_view("hud/index.html", None).unwrap();
        let (tx, rx) = mpsc::channel();
        core.register_js_listener(
            id,
            "onInventoryChanged",
            Arc::new(move |argument| {
                let _ = tx.send(argument.to_string());
            }),
        );

        pump_until(&core, &mut device, "view ready", |_| core.is_ready(id));
        // Binding runs as a queued engine task after finish-loading.
        thread::sleep(Duration::from_millis(20));

        core.interop_call(id, "onInventoryChanged", "{\"slot\":3}");
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            "{\"slot\":3}"
        );

        // Calls to page-defined functions succeed, unknown names are
        // swallowed after logging.
        core.interop_call(id, "page.refresh", "");
        core.interop_call(id, "noSuchFunction", "");
        core.present(&mut device);
    }

    #[test]
    fn dom_ready_callback_fires_with_the_view_id() {
        let core = stub_core();
        let mut device = NullDevice::new();

        let (tx, rx) = mpsc::channel();
        let id = core
            .create_view(
                "hud/index.html",
                Some(Arc::new(move |view| {
                    let _ = tx.send(view);
                })),
            )
            .unwrap();

        pump_until(&core, &mut device, "view ready", |_| core.is_ready(id));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), id);
    }

    #[test]
    fn pipeline_state_survives_frames_with_draws() {
        let core = stub_core();
        let mut device = NullDevice::new();

        let before = device.pipeline_state().clone();
        let _id = ready_view(&core, &mut device);
        pump_until(&core, &mut device, "draws executed", |d| d.draw_count() > 0);

        assert_eq!(*device.pipeline_state(), before);
        assert_eq!(device.state_depth(), 0);
    }

    #[test]
    fn surface_readback_matches_the_configured_size() {
        let core = stub_core();
        let mut device = NullDevice::new();
        let id = ready_view(&core, &mut device);

        let pixels = core.copy_surface(id).unwrap();
        assert_eq!(pixels.len(), 64 * 64 * 4);

        assert!(matches!(
            core.copy_surface(ViewId(0xDEAD)),
            Err(CoreError::InvalidViewId)
        ));
        assert!(!core.has_input_focus(id));
        assert!(!core.has_input_focus(ViewId(0xDEAD)));
    }

    #[test]
    fn scroll_step_and_order_follow_fallback_rules() {
        let core = stub_core();
        let mut device = NullDevice::new();
        let id = ready_view(&core, &mut device);

        assert_eq!(core.scroll_step(id), 28);
        core.set_scroll_step(id, 40);
        assert_eq!(core.scroll_step(id), 40);
        core.set_scroll_step(id, -3);
        assert_eq!(core.scroll_step(id), 16);

        assert_eq!(core.scroll_step(ViewId(0xBEEF)), 28);
        assert_eq!(core.order(ViewId(0xBEEF)), -1);

        let second = core.create_view("hud/map.html", None).unwrap();
        assert!(core.order(second) > core.order(id));
        core.set_order(id, 50);
        assert_eq!(core.order(id), 50);
    }

    #[test]
    fn engine_init_failure_is_permanent() {
        init_logging();
        let core = HudCore::new(
            test_config(),
            failing_engine_factory("no engine library"),
            Arc::new(NullShell),
        );
        let mut device = NullDevice::new();

        match core.create_view("hud/index.html", None) {
            Err(CoreError::EngineInit(message)) => assert!(message.contains("no engine library")),
            other => panic!("expected EngineInit error, got {other:?}"),
        }
        assert!(matches!(
            core.create_view("hud/index.html", None),
            Err(CoreError::EngineInit(_))
        ));

        // Frames are no-ops without an engine.
        core.present(&mut device);
        assert!(device.events().is_empty());
    }

    #[test]
    fn cursor_overlay_draws_only_while_focused() {
        init_logging();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.png");
        write_test_png(&path, 4, 4);

        let shell = Arc::new(CountingShell::default());
        let config = CoreConfig {
            cursor_image: Some(path),
            ..test_config()
        };
        let core = HudCore::new(config, stub_engine_factory(), shell);
        let mut device = NullDevice::new();

        let id = ready_view(&core, &mut device);
        core.present(&mut device);
        let before = cursor_draws(&device);
        assert_eq!(before, 0);

        assert!(core.focus(id, false));
        core.present(&mut device);
        assert!(cursor_draws(&device) > 0);

        core.unfocus(id);
        let after_unfocus = cursor_draws(&device);
        core.present(&mut device);
        assert_eq!(cursor_draws(&device), after_unfocus);
    }

    #[test]
    fn shutdown_fails_later_calls_fast_and_is_idempotent() {
        let core = stub_core();
        let mut device = NullDevice::new();
        let id = ready_view(&core, &mut device);

        core.shutdown();
        core.shutdown();

        assert!(matches!(
            core.create_view("hud/other.html", None),
            Err(CoreError::ShutDown)
        ));
        assert!(!core.is_valid(id));
        assert!(!core.focus(id, false));

        let (tx, rx) = mpsc::channel();
        core.invoke(id, "1 + 1", move |result| {
            let _ = tx.send(result);
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "");

        // The first frame after shutdown drains the queued resource
        // releases; later frames are inert.
        core.present(&mut device);
        let events_before = device.events().len();
        core.present(&mut device);
        assert_eq!(device.events().len(), events_before);
    }

    #[test]
    fn shutdown_releases_device_resources() {
        let core = stub_core();
        let mut device = NullDevice::new();
        let _id = ready_view(&core, &mut device);
        assert!(device.live_texture_count() > 0);

        core.shutdown();
        core.present(&mut device);
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_geometry_count(), 0);
        assert_eq!(device.live_render_target_count(), 0);
    }

    #[test]
    fn concurrent_creates_yield_distinct_usable_views() {
        let core = Arc::new(stub_core());
        let mut device = NullDevice::new();
        // Initialize the engine before the racing creates.
        let first = core.create_view("hud/index.html", None).unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let core = core.clone();
            handles.push(thread::spawn(move || {
                (0..10)
                    .map(|j| core.create_view(&format!("hud/panel_{i}_{j}.html"), None).unwrap())
                    .collect::<Vec<_>>()
            }));
        }
        let mut ids = vec![first];
        for handle in handles {
            ids.extend(handle.join().unwrap());
        }

        let unique: std::collections::HashSet<_> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());

        for &id in &ids {
            assert!(core.is_valid(id));
        }
        pump_until(&core, &mut device, "all views ready", |_| {
            ids.iter().all(|&id| core.is_ready(id))
        });
    }

    fn cursor_draws(device: &NullDevice) -> usize {
        device
            .events()
            .iter()
            .filter(|e| matches!(e, DeviceEvent::CursorDrawn(_)))
            .count()
    }

    fn write_test_png(path: &std::path::Path, width: u32, height: u32) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = std::io::BufWriter::new(file);
        let mut encoder = png::Encoder::new(&mut writer, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut png_writer = encoder.write_header().unwrap();
        let data = vec![0xAB; (width * height * 4) as usize];
        png_writer.write_image_data(&data).unwrap();
        png_writer.finish().unwrap();
        writer.flush().unwrap();
    }
}
