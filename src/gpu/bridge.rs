use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::gpu::commands::{
    CommandList, GeometryId, GpuCommand, IndexBuffer, RenderTargetId, TextureDesc, TextureId,
    VertexBuffer,
};
use crate::gpu::device::GpuDevice;

/// One buffered resource lifecycle request from the engine thread.
pub enum ResourceOp {
    CreateTexture(TextureId, TextureDesc),
    UpdateTexture(TextureId, TextureDesc),
    DestroyTexture(TextureId),
    CreateGeometry(GeometryId, VertexBuffer, IndexBuffer),
    UpdateGeometry(GeometryId, VertexBuffer, IndexBuffer),
    DestroyGeometry(GeometryId),
    CreateRenderTarget(RenderTargetId, TextureId),
    DestroyRenderTarget(RenderTargetId),
}

/// Which device resources currently exist, as the render thread sees them.
#[derive(Default)]
struct ResourceTables {
    textures: HashSet<TextureId>,
    geometries: HashSet<GeometryId>,
    render_targets: HashSet<RenderTargetId>,
}

/// Channel between the engine thread (producer) and the render thread
/// (consumer).
///
/// The engine thread allocates ids, queues resource ops, and publishes
/// command lists; `execute_frame` drains both on the render thread, inside
/// `present`. Command lists replace each other: a list published before the
/// previous one was consumed wins, and the stale list is dropped whole.
pub struct GpuBridge {
    next_texture: AtomicU32,
    next_geometry: AtomicU32,
    next_render_target: AtomicU32,
    ops: Mutex<Vec<ResourceOp>>,
    latest: Mutex<Option<CommandList>>,
    tables: Mutex<ResourceTables>,
}

impl GpuBridge {
    pub fn new() -> Self {
        Self {
            // 0 is reserved as "no resource".
            next_texture: AtomicU32::new(1),
            next_geometry: AtomicU32::new(1),
            next_render_target: AtomicU32::new(1),
            ops: Mutex::new(Vec::new()),
            latest: Mutex::new(None),
            tables: Mutex::new(ResourceTables::default()),
        }
    }

    // Producer side (engine thread).

    pub fn next_texture_id(&self) -> TextureId {
        TextureId(self.next_texture.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_geometry_id(&self) -> GeometryId {
        GeometryId(self.next_geometry.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_render_target_id(&self) -> RenderTargetId {
        RenderTargetId(self.next_render_target.fetch_add(1, Ordering::Relaxed))
    }

    pub fn create_texture(&self, id: TextureId, desc: TextureDesc) {
        self.push_op(ResourceOp::CreateTexture(id, desc));
    }

    pub fn update_texture(&self, id: TextureId, desc: TextureDesc) {
        self.push_op(ResourceOp::UpdateTexture(id, desc));
    }

    pub fn destroy_texture(&self, id: TextureId) {
        self.push_op(ResourceOp::DestroyTexture(id));
    }

    pub fn create_geometry(&self, id: GeometryId, vertices: VertexBuffer, indices: IndexBuffer) {
        self.push_op(ResourceOp::CreateGeometry(id, vertices, indices));
    }

    pub fn update_geometry(&self, id: GeometryId, vertices: VertexBuffer, indices: IndexBuffer) {
        self.push_op(ResourceOp::UpdateGeometry(id, vertices, indices));
    }

    pub fn destroy_geometry(&self, id: GeometryId) {
        self.push_op(ResourceOp::DestroyGeometry(id));
    }

    pub fn create_render_target(&self, id: RenderTargetId, texture: TextureId) {
        self.push_op(ResourceOp::CreateRenderTarget(id, texture));
    }

    pub fn destroy_render_target(&self, id: RenderTargetId) {
        self.push_op(ResourceOp::DestroyRenderTarget(id));
    }

    fn push_op(&self, op: ResourceOp) {
        self.ops.lock().unwrap().push(op);
    }

    /// Publish this tick's command list, replacing any unconsumed one.
    pub fn submit_command_list(&self, list: CommandList) {
        let mut latest = self.latest.lock().unwrap();
        if let Some(stale) = latest.replace(list) {
            log::trace!(
                "GpuBridge: replaced unconsumed command list ({} commands)",
                stale.len()
            );
        }
    }

    pub fn has_commands(&self) -> bool {
        self.latest.lock().unwrap().is_some()
    }

    pub fn pending_resource_ops(&self) -> usize {
        self.ops.lock().unwrap().len()
    }

    /// True once the render thread has created the texture. Compositing
    /// checks this so a view whose surface was just torn down is skipped.
    pub fn texture_exists(&self, id: TextureId) -> bool {
        self.tables.lock().unwrap().textures.contains(&id)
    }

    /// Queue destruction of every resource still alive. Used at shutdown.
    pub fn release_all(&self) {
        // A stale command list could only reference resources destroyed
        // below.
        self.latest.lock().unwrap().take();
        let tables = self.tables.lock().unwrap();
        let mut ops = self.ops.lock().unwrap();
        for &rt in &tables.render_targets {
            ops.push(ResourceOp::DestroyRenderTarget(rt));
        }
        for &geo in &tables.geometries {
            ops.push(ResourceOp::DestroyGeometry(geo));
        }
        for &tex in &tables.textures {
            ops.push(ResourceOp::DestroyTexture(tex));
        }
    }

    // Consumer side (render thread).

    /// Apply queued resource ops, then execute the latest command list if
    /// one is pending. Pipeline state is saved before the first command and
    /// restored after the last, including on error.
    pub fn execute_frame(&self, device: &mut dyn GpuDevice) {
        let ops = std::mem::take(&mut *self.ops.lock().unwrap());
        for op in ops {
            self.apply_resource_op(device, op);
        }

        let Some(list) = self.latest.lock().unwrap().take() else {
            return;
        };
        if list.is_empty() {
            return;
        }

        device.save_pipeline_state();
        for command in &list.commands {
            self.execute_command(device, command);
        }
        device.restore_pipeline_state();
    }

    fn apply_resource_op(&self, device: &mut dyn GpuDevice, op: ResourceOp) {
        let mut tables = self.tables.lock().unwrap();
        match op {
            ResourceOp::CreateTexture(id, desc) => {
                if !tables.textures.insert(id) {
                    log::error!("GpuBridge: duplicate create for {id}");
                    return;
                }
                if let Err(e) = device.create_texture(id, &desc) {
                    log::error!("GpuBridge: create {id} failed: {e}");
                    tables.textures.remove(&id);
                }
            }
            ResourceOp::UpdateTexture(id, desc) => {
                if !tables.textures.contains(&id) {
                    log::error!("GpuBridge: update for unknown {id}");
                    return;
                }
                if let Err(e) = device.update_texture(id, &desc) {
                    log::error!("GpuBridge: update {id} failed: {e}");
                }
            }
            ResourceOp::DestroyTexture(id) => {
                if !tables.textures.remove(&id) {
                    log::error!("GpuBridge: destroy for unknown {id}");
                    return;
                }
                if let Err(e) = device.destroy_texture(id) {
                    log::error!("GpuBridge: destroy {id} failed: {e}");
                }
            }
            ResourceOp::CreateGeometry(id, vertices, indices) => {
                if !tables.geometries.insert(id) {
                    log::error!("GpuBridge: duplicate create for {id}");
                    return;
                }
                if let Err(e) = device.create_geometry(id, &vertices, &indices) {
                    log::error!("GpuBridge: create {id} failed: {e}");
                    tables.geometries.remove(&id);
                }
            }
            ResourceOp::UpdateGeometry(id, vertices, indices) => {
                if !tables.geometries.contains(&id) {
                    log::error!("GpuBridge: update for unknown {id}");
                    return;
                }
                if let Err(e) = device.update_geometry(id, &vertices, &indices) {
                    log::error!("GpuBridge: update {id} failed: {e}");
                }
            }
            ResourceOp::DestroyGeometry(id) => {
                if !tables.geometries.remove(&id) {
                    log::error!("GpuBridge: destroy for unknown {id}");
                    return;
                }
                if let Err(e) = device.destroy_geometry(id) {
                    log::error!("GpuBridge: destroy {id} failed: {e}");
                }
            }
            ResourceOp::CreateRenderTarget(id, texture) => {
                if !tables.textures.contains(&texture) {
                    log::error!("GpuBridge: render target {id} references unknown {texture}");
                    return;
                }
                if !tables.render_targets.insert(id) {
                    log::error!("GpuBridge: duplicate create for {id}");
                    return;
                }
                if let Err(e) = device.create_render_target(id, texture) {
                    log::error!("GpuBridge: create {id} failed: {e}");
                    tables.render_targets.remove(&id);
                }
            }
            ResourceOp::DestroyRenderTarget(id) => {
                if !tables.render_targets.remove(&id) {
                    log::error!("GpuBridge: destroy for unknown {id}");
                    return;
                }
                if let Err(e) = device.destroy_render_target(id) {
                    log::error!("GpuBridge: destroy {id} failed: {e}");
                }
            }
        }
    }

    fn execute_command(&self, device: &mut dyn GpuDevice, command: &GpuCommand) {
        let tables = self.tables.lock().unwrap();
        match command {
            GpuCommand::DrawGeometry {
                geometry,
                indices_count,
                indices_offset,
                state,
            } => {
                if !tables.geometries.contains(geometry) {
                    log::warn!("GpuBridge: draw references unknown {geometry}, skipping");
                    return;
                }
                if !tables.render_targets.contains(&state.render_target) {
                    log::warn!(
                        "GpuBridge: draw references unknown {}, skipping",
                        state.render_target
                    );
                    return;
                }
                drop(tables);
                if let Err(e) =
                    device.draw_geometry(*geometry, *indices_count, *indices_offset, state)
                {
                    log::error!("GpuBridge: draw on {geometry} failed: {e}");
                }
            }
            GpuCommand::ClearRenderTarget { render_target } => {
                if !tables.render_targets.contains(render_target) {
                    log::warn!("GpuBridge: clear references unknown {render_target}, skipping");
                    return;
                }
                drop(tables);
                if let Err(e) = device.clear_render_target(*render_target) {
                    log::error!("GpuBridge: clear {render_target} failed: {e}");
                }
            }
        }
    }
}

impl Default for GpuBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::backends::null::NullDevice;
    use crate::gpu::commands::{TextureFormat, TextureInit};

    fn empty_texture(width: u32, height: u32) -> TextureDesc {
        TextureDesc {
            width,
            height,
            format: TextureFormat::Bgra8,
            init: TextureInit::Empty,
        }
    }

    #[test]
    fn ids_are_monotonic_and_namespaced() {
        let bridge = GpuBridge::new();
        let t1 = bridge.next_texture_id();
        let t2 = bridge.next_texture_id();
        let g1 = bridge.next_geometry_id();
        let r1 = bridge.next_render_target_id();

        assert!(t2 > t1);
        assert_eq!(t1, TextureId(1));
        assert_eq!(g1, GeometryId(1));
        assert_eq!(r1, RenderTargetId(1));
    }

    #[test]
    fn later_command_list_replaces_earlier_unconsumed_one() {
        let bridge = GpuBridge::new();
        let mut device = NullDevice::new();

        let tex = bridge.next_texture_id();
        let rt = bridge.next_render_target_id();
        bridge.create_texture(tex, empty_texture(64, 64));
        bridge.create_render_target(rt, tex);

        bridge.submit_command_list(CommandList::new(vec![
            GpuCommand::ClearRenderTarget { render_target: rt },
            GpuCommand::ClearRenderTarget { render_target: rt },
        ]));
        bridge.submit_command_list(CommandList::new(vec![GpuCommand::ClearRenderTarget {
            render_target: rt,
        }]));

        bridge.execute_frame(&mut device);
        assert_eq!(device.clear_count(rt), 1);
        assert!(!bridge.has_commands());
    }

    #[test]
    fn empty_command_list_touches_no_pipeline_state() {
        let bridge = GpuBridge::new();
        let mut device = NullDevice::new();

        let before = device.pipeline_state().clone();
        bridge.submit_command_list(CommandList::default());
        bridge.execute_frame(&mut device);

        assert_eq!(*device.pipeline_state(), before);
        assert_eq!(device.state_depth(), 0);
        assert!(device.events().is_empty());
    }

    #[test]
    fn commands_referencing_unknown_resources_are_skipped() {
        let bridge = GpuBridge::new();
        let mut device = NullDevice::new();

        bridge.submit_command_list(CommandList::new(vec![GpuCommand::ClearRenderTarget {
            render_target: RenderTargetId(99),
        }]));
        bridge.execute_frame(&mut device);

        assert_eq!(device.clear_count(RenderTargetId(99)), 0);
    }

    #[test]
    fn failed_create_leaves_resource_absent() {
        let bridge = GpuBridge::new();
        let mut device = NullDevice::new();
        device.fail_next_create();

        let tex = bridge.next_texture_id();
        bridge.create_texture(tex, empty_texture(8, 8));
        bridge.execute_frame(&mut device);

        assert!(!bridge.texture_exists(tex));

        // A retry under a fresh id succeeds.
        let tex2 = bridge.next_texture_id();
        bridge.create_texture(tex2, empty_texture(8, 8));
        bridge.execute_frame(&mut device);
        assert!(bridge.texture_exists(tex2));
    }

    #[test]
    fn release_all_destroys_everything_alive() {
        let bridge = GpuBridge::new();
        let mut device = NullDevice::new();

        let tex = bridge.next_texture_id();
        let rt = bridge.next_render_target_id();
        bridge.create_texture(tex, empty_texture(16, 16));
        bridge.create_render_target(rt, tex);
        bridge.execute_frame(&mut device);
        assert!(bridge.texture_exists(tex));

        bridge.submit_command_list(CommandList::new(vec![GpuCommand::ClearRenderTarget {
            render_target: rt,
        }]));
        bridge.release_all();
        assert!(!bridge.has_commands());

        bridge.execute_frame(&mut device);
        assert!(!bridge.texture_exists(tex));
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_render_target_count(), 0);
    }
}
