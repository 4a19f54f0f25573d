//! In-process engine standing in for a real HTML engine. Loads complete
//! after one update tick, surfaces are allocated through the GPU bridge on
//! first render, and script calls follow the same binding rules a real
//! page would. Exists so the whole lifecycle is testable without a device
//! or an engine library.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::engine::{
    EngineFactory, EngineHost, EngineRuntime, EngineView, RenderTargetInfo, ScriptError,
    ScriptProxy, ViewConfig, ViewEventSink,
};
use crate::gpu::commands::{
    CommandList, DrawState, GeometryId, GpuCommand, IndexBuffer, RenderTargetId, TextureDesc,
    TextureFormat, TextureId, TextureInit, UvRect, VertexBuffer, VertexFormat,
};
use crate::view::ViewId;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Created,
    Loading,
    Ready,
}

struct StubViewState {
    id: ViewId,
    width: u32,
    height: u32,
    url: Option<String>,
    phase: Phase,
    focused: bool,
    input_focused: bool,
    bound: HashMap<String, ScriptProxy>,
    texture: Option<TextureId>,
    render_target: Option<RenderTargetId>,
    geometry: Option<GeometryId>,
    needs_repaint: bool,
    detached: bool,
    sink: Option<Arc<dyn ViewEventSink>>,
}

/// View handle returned by [`StubEngine::create_view`].
pub struct StubEngineView {
    state: Rc<RefCell<StubViewState>>,
}

impl StubEngineView {
    /// A free-standing view with no engine behind it, for unit tests that
    /// only need something implementing [`EngineView`].
    pub fn detached() -> Self {
        Self {
            state: Rc::new(RefCell::new(StubViewState {
                id: ViewId(0),
                width: 0,
                height: 0,
                url: None,
                phase: Phase::Ready,
                focused: false,
                input_focused: false,
                bound: HashMap::new(),
                texture: None,
                render_target: None,
                geometry: None,
                needs_repaint: false,
                detached: false,
                sink: None,
            })),
        }
    }
}

impl EngineView for StubEngineView {
    fn load_url(&mut self, url: &str) -> anyhow::Result<()> {
        let sink = {
            let mut state = self.state.borrow_mut();
            state.url = Some(url.to_string());
            state.phase = Phase::Loading;
            // Navigation clears page globals.
            state.bound.clear();
            if state.detached {
                None
            } else {
                state.sink.clone().map(|s| (s, state.id))
            }
        };
        if let Some((sink, id)) = sink {
            sink.on_begin_loading(id, url);
        }
        Ok(())
    }

    fn focus(&mut self) {
        self.state.borrow_mut().focused = true;
    }

    fn unfocus(&mut self) {
        let mut state = self.state.borrow_mut();
        state.focused = false;
        state.input_focused = false;
    }

    fn has_focus(&self) -> bool {
        self.state.borrow().focused
    }

    fn has_input_focus(&self) -> bool {
        self.state.borrow().input_focused
    }

    fn evaluate_script(&mut self, script: &str) -> Result<String, ScriptError> {
        let state = self.state.borrow();
        if state.detached {
            return Err(ScriptError::ContextUnavailable);
        }
        if let Some(message) = script.strip_prefix("throw:") {
            return Err(ScriptError::Threw(message.to_string()));
        }
        Ok(script.to_string())
    }

    fn call_global(&mut self, name: &str, argument: &str) -> Result<(), ScriptError> {
        let state = self.state.borrow();
        if state.detached {
            return Err(ScriptError::ContextUnavailable);
        }
        if let Some(proxy) = state.bound.get(name) {
            return proxy.invoke(argument).map_err(ScriptError::Threw);
        }
        // Functions the page itself defines.
        if name.starts_with("page.") {
            return Ok(());
        }
        Err(ScriptError::NotCallable(name.to_string()))
    }

    fn bind_host_function(&mut self, name: &str, proxy: ScriptProxy) -> anyhow::Result<()> {
        self.state.borrow_mut().bound.insert(name.to_string(), proxy);
        Ok(())
    }

    fn render_target(&self) -> Option<RenderTargetInfo> {
        let state = self.state.borrow();
        Some(RenderTargetInfo {
            texture: state.texture?,
            render_target: state.render_target?,
            uv: UvRect::FULL,
        })
    }

    fn copy_surface_into(&self, buffer: &mut crate::view::StagingBuffer) -> bool {
        let state = self.state.borrow();
        if state.texture.is_none() {
            return false;
        }
        buffer.width = state.width;
        buffer.height = state.height;
        buffer.stride = state.width * 4;
        buffer.pixels = vec![0; (buffer.stride * buffer.height) as usize];
        true
    }

    fn needs_repaint(&self) -> bool {
        self.state.borrow().needs_repaint
    }

    fn detach_listeners(&mut self) {
        let mut state = self.state.borrow_mut();
        state.detached = true;
        state.sink = None;
    }
}

/// Minimal [`EngineRuntime`] driving [`StubEngineView`]s.
pub struct StubEngine {
    host: EngineHost,
    views: Vec<Weak<RefCell<StubViewState>>>,
}

impl StubEngine {
    pub fn new(host: EngineHost) -> Self {
        Self {
            host,
            views: Vec::new(),
        }
    }

    fn live_views(&mut self) -> Vec<Rc<RefCell<StubViewState>>> {
        self.views.retain(|weak| weak.strong_count() > 0);
        self.views.iter().filter_map(Weak::upgrade).collect()
    }

    fn allocate_surface(&self, state: &mut StubViewState) {
        let gpu = &self.host.gpu;

        let texture = gpu.next_texture_id();
        gpu.create_texture(
            texture,
            TextureDesc {
                width: state.width,
                height: state.height,
                format: TextureFormat::Bgra8,
                init: TextureInit::Empty,
            },
        );

        let render_target = gpu.next_render_target_id();
        gpu.create_render_target(render_target, texture);

        // Full-surface quad, two triangles.
        let geometry = gpu.next_geometry_id();
        gpu.create_geometry(
            geometry,
            VertexBuffer {
                format: VertexFormat::Full,
                data: vec![0; VertexFormat::Full.stride() as usize * 4],
            },
            IndexBuffer {
                data: [0u32, 1, 2, 2, 1, 3]
                    .iter()
                    .flat_map(|i| i.to_le_bytes())
                    .collect(),
            },
        );

        state.texture = Some(texture);
        state.render_target = Some(render_target);
        state.geometry = Some(geometry);
    }
}

impl EngineRuntime for StubEngine {
    fn create_view(
        &mut self,
        id: ViewId,
        width: u32,
        height: u32,
        _config: &ViewConfig,
    ) -> anyhow::Result<Box<dyn EngineView>> {
        let state = Rc::new(RefCell::new(StubViewState {
            id,
            width,
            height,
            url: None,
            phase: Phase::Created,
            focused: false,
            input_focused: false,
            bound: HashMap::new(),
            texture: None,
            render_target: None,
            geometry: None,
            needs_repaint: false,
            detached: false,
            sink: Some(self.host.events.clone()),
        }));
        self.views.push(Rc::downgrade(&state));
        Ok(Box::new(StubEngineView { state }))
    }

    fn update(&mut self) -> anyhow::Result<()> {
        // Events fire after borrows are released; a sink may submit tasks
        // that touch the same view.
        let mut finished = Vec::new();
        for view in self.live_views() {
            let mut state = view.borrow_mut();
            if state.phase == Phase::Loading {
                state.phase = Phase::Ready;
                state.needs_repaint = true;
                if !state.detached {
                    if let (Some(sink), Some(url)) = (state.sink.clone(), state.url.clone()) {
                        finished.push((sink, state.id, url));
                    }
                }
            }
        }
        for (sink, id, url) in finished {
            sink.on_finish_loading(id, &url);
            sink.on_dom_ready(id, &url);
        }
        Ok(())
    }

    fn refresh_display(&mut self) {}

    fn render(&mut self) -> anyhow::Result<()> {
        let mut commands = Vec::new();
        for view in self.live_views() {
            let mut state = view.borrow_mut();
            if state.phase != Phase::Ready {
                continue;
            }
            if state.texture.is_none() {
                self.allocate_surface(&mut state);
            }
            let (Some(render_target), Some(geometry), Some(texture)) =
                (state.render_target, state.geometry, state.texture)
            else {
                continue;
            };

            commands.push(GpuCommand::ClearRenderTarget { render_target });
            commands.push(GpuCommand::DrawGeometry {
                geometry,
                indices_count: 6,
                indices_offset: 0,
                state: Box::new(DrawState {
                    render_target,
                    viewport_width: state.width,
                    viewport_height: state.height,
                    textures: [Some(texture), None, None],
                    ..DrawState::default()
                }),
            });
            state.needs_repaint = true;
        }

        if !commands.is_empty() {
            self.host.gpu.submit_command_list(CommandList::new(commands));
        }
        Ok(())
    }
}

/// Factory wiring [`StubEngine`] into a core instance.
pub fn stub_engine_factory() -> EngineFactory {
    Box::new(|host| Ok(Box::new(StubEngine::new(host)) as Box<dyn EngineRuntime>))
}

/// Factory whose construction fails, for initialization-error paths.
pub fn failing_engine_factory(message: &str) -> EngineFactory {
    let message = message.to_string();
    Box::new(move |_| Err(anyhow::anyhow!(message)))
}
