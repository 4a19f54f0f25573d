//! Recording device backend. Keeps resources and pipeline state in plain
//! data structures so tests can assert exactly what a frame did to the
//! device, including that pipeline state survives command execution intact.

use std::collections::HashMap;

use anyhow::anyhow;

use crate::gpu::commands::{
    DrawState, GeometryId, IndexBuffer, RenderTargetId, ScissorRect, ShaderKind, TextureDesc,
    TextureFormat, TextureId, TextureInit, UvRect, VertexBuffer, VertexFormat,
};
use crate::gpu::device::GpuDevice;

/// Snapshot of every pipeline stage the bridge's commands may touch.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub render_target: Option<RenderTargetId>,
    pub blend_enabled: bool,
    pub scissor_enabled: bool,
    pub scissor: ScissorRect,
    pub input_layout: Option<VertexFormat>,
    pub vertex_buffer: Option<GeometryId>,
    pub index_buffer: Option<GeometryId>,
    pub shader: Option<ShaderKind>,
    pub bound_textures: [Option<TextureId>; 3],
    pub viewport: (u32, u32),
    /// Bumped whenever per-draw uniforms are written.
    pub constant_generation: u64,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            render_target: None,
            blend_enabled: false,
            scissor_enabled: false,
            scissor: ScissorRect {
                left: 0,
                top: 0,
                right: 0,
                bottom: 0,
            },
            input_layout: None,
            vertex_buffer: None,
            index_buffer: None,
            shader: None,
            bound_textures: [None; 3],
            viewport: (0, 0),
            constant_generation: 0,
        }
    }
}

/// Everything the device was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    CreatedTexture(TextureId),
    UpdatedTexture(TextureId),
    DestroyedTexture(TextureId),
    CreatedGeometry(GeometryId),
    UpdatedGeometry(GeometryId),
    DestroyedGeometry(GeometryId),
    CreatedRenderTarget(RenderTargetId, TextureId),
    DestroyedRenderTarget(RenderTargetId),
    SavedState,
    RestoredState,
    Cleared(RenderTargetId),
    Drew {
        geometry: GeometryId,
        indices_count: u32,
    },
    Composited(TextureId),
    CursorDrawn(TextureId),
}

struct TextureRecord {
    width: u32,
    height: u32,
    format: TextureFormat,
    /// Tightly packed rows, width * bytes_per_pixel each.
    pixels: Vec<u8>,
}

struct GeometryRecord {
    vertex_bytes: usize,
    index_bytes: usize,
    format: VertexFormat,
}

pub struct NullDevice {
    textures: HashMap<TextureId, TextureRecord>,
    geometries: HashMap<GeometryId, GeometryRecord>,
    render_targets: HashMap<RenderTargetId, TextureId>,
    state: PipelineState,
    saved: Vec<PipelineState>,
    clears: HashMap<RenderTargetId, usize>,
    events: Vec<DeviceEvent>,
    fail_next_create: bool,
}

impl NullDevice {
    pub fn new() -> Self {
        Self {
            textures: HashMap::new(),
            geometries: HashMap::new(),
            render_targets: HashMap::new(),
            state: PipelineState::default(),
            saved: Vec::new(),
            clears: HashMap::new(),
            events: Vec::new(),
            fail_next_create: false,
        }
    }

    /// The next create_* call fails once, for DeviceFault paths.
    pub fn fail_next_create(&mut self) {
        self.fail_next_create = true;
    }

    pub fn pipeline_state(&self) -> &PipelineState {
        &self.state
    }

    /// Depth of the save stack; zero after a balanced frame.
    pub fn state_depth(&self) -> usize {
        self.saved.len()
    }

    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    pub fn clear_count(&self, render_target: RenderTargetId) -> usize {
        self.clears.get(&render_target).copied().unwrap_or(0)
    }

    pub fn draw_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::Drew { .. }))
            .count()
    }

    pub fn composite_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, DeviceEvent::Composited(_)))
            .count()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn live_render_target_count(&self) -> usize {
        self.render_targets.len()
    }

    pub fn texture_pixels(&self, id: TextureId) -> Option<&[u8]> {
        self.textures.get(&id).map(|t| t.pixels.as_slice())
    }

    fn take_injected_failure(&mut self, what: &str) -> anyhow::Result<()> {
        if self.fail_next_create {
            self.fail_next_create = false;
            return Err(anyhow!("injected {what} creation failure"));
        }
        Ok(())
    }

    fn store_pixels(record: &mut TextureRecord, desc: &TextureDesc) -> anyhow::Result<()> {
        let row_bytes = (desc.width * desc.format.bytes_per_pixel()) as usize;
        match &desc.init {
            TextureInit::Empty => {
                record.pixels = vec![0; row_bytes * desc.height as usize];
            }
            TextureInit::Pixels { data, stride } => {
                let stride = *stride as usize;
                if stride < row_bytes {
                    return Err(anyhow!(
                        "texture stride {stride} smaller than row size {row_bytes}"
                    ));
                }
                let mut pixels = Vec::with_capacity(row_bytes * desc.height as usize);
                for row in 0..desc.height as usize {
                    let start = row * stride;
                    let end = start + row_bytes;
                    let src = data
                        .get(start..end)
                        .ok_or_else(|| anyhow!("texture data shorter than stride * height"))?;
                    pixels.extend_from_slice(src);
                }
                record.pixels = pixels;
            }
        }
        Ok(())
    }
}

impl Default for NullDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for NullDevice {
    fn create_texture(&mut self, id: TextureId, desc: &TextureDesc) -> anyhow::Result<()> {
        self.take_injected_failure("texture")?;
        if self.textures.contains_key(&id) {
            return Err(anyhow!("{id} already exists"));
        }
        let mut record = TextureRecord {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            pixels: Vec::new(),
        };
        Self::store_pixels(&mut record, desc)?;
        self.textures.insert(id, record);
        self.events.push(DeviceEvent::CreatedTexture(id));
        Ok(())
    }

    fn update_texture(&mut self, id: TextureId, desc: &TextureDesc) -> anyhow::Result<()> {
        let record = self
            .textures
            .get_mut(&id)
            .ok_or_else(|| anyhow!("{id} does not exist"))?;
        record.width = desc.width;
        record.height = desc.height;
        record.format = desc.format;
        Self::store_pixels(record, desc)?;
        self.events.push(DeviceEvent::UpdatedTexture(id));
        Ok(())
    }

    fn destroy_texture(&mut self, id: TextureId) -> anyhow::Result<()> {
        self.textures
            .remove(&id)
            .ok_or_else(|| anyhow!("{id} does not exist"))?;
        self.events.push(DeviceEvent::DestroyedTexture(id));
        Ok(())
    }

    fn create_geometry(
        &mut self,
        id: GeometryId,
        vertices: &VertexBuffer,
        indices: &IndexBuffer,
    ) -> anyhow::Result<()> {
        self.take_injected_failure("geometry")?;
        if self.geometries.contains_key(&id) {
            return Err(anyhow!("{id} already exists"));
        }
        self.geometries.insert(
            id,
            GeometryRecord {
                vertex_bytes: vertices.data.len(),
                index_bytes: indices.data.len(),
                format: vertices.format,
            },
        );
        self.events.push(DeviceEvent::CreatedGeometry(id));
        Ok(())
    }

    fn update_geometry(
        &mut self,
        id: GeometryId,
        vertices: &VertexBuffer,
        indices: &IndexBuffer,
    ) -> anyhow::Result<()> {
        let record = self
            .geometries
            .get_mut(&id)
            .ok_or_else(|| anyhow!("{id} does not exist"))?;
        record.vertex_bytes = vertices.data.len();
        record.index_bytes = indices.data.len();
        record.format = vertices.format;
        self.events.push(DeviceEvent::UpdatedGeometry(id));
        Ok(())
    }

    fn destroy_geometry(&mut self, id: GeometryId) -> anyhow::Result<()> {
        self.geometries
            .remove(&id)
            .ok_or_else(|| anyhow!("{id} does not exist"))?;
        self.events.push(DeviceEvent::DestroyedGeometry(id));
        Ok(())
    }

    fn create_render_target(
        &mut self,
        id: RenderTargetId,
        texture: TextureId,
    ) -> anyhow::Result<()> {
        self.take_injected_failure("render target")?;
        if !self.textures.contains_key(&texture) {
            return Err(anyhow!("{texture} does not exist"));
        }
        if self.render_targets.contains_key(&id) {
            return Err(anyhow!("{id} already exists"));
        }
        self.render_targets.insert(id, texture);
        self.events.push(DeviceEvent::CreatedRenderTarget(id, texture));
        Ok(())
    }

    fn destroy_render_target(&mut self, id: RenderTargetId) -> anyhow::Result<()> {
        self.render_targets
            .remove(&id)
            .ok_or_else(|| anyhow!("{id} does not exist"))?;
        self.events.push(DeviceEvent::DestroyedRenderTarget(id));
        Ok(())
    }

    fn save_pipeline_state(&mut self) {
        self.saved.push(self.state.clone());
        self.events.push(DeviceEvent::SavedState);
    }

    fn restore_pipeline_state(&mut self) {
        if let Some(saved) = self.saved.pop() {
            self.state = saved;
        } else {
            log::error!("NullDevice: restore without matching save");
        }
        self.events.push(DeviceEvent::RestoredState);
    }

    fn clear_render_target(&mut self, render_target: RenderTargetId) -> anyhow::Result<()> {
        let texture = self
            .render_targets
            .get(&render_target)
            .copied()
            .ok_or_else(|| anyhow!("{render_target} does not exist"))?;
        if let Some(record) = self.textures.get_mut(&texture) {
            record.pixels.fill(0);
        }
        *self.clears.entry(render_target).or_insert(0) += 1;
        self.events.push(DeviceEvent::Cleared(render_target));
        Ok(())
    }

    fn draw_geometry(
        &mut self,
        geometry: GeometryId,
        indices_count: u32,
        _indices_offset: u32,
        state: &DrawState,
    ) -> anyhow::Result<()> {
        let record = self
            .geometries
            .get(&geometry)
            .ok_or_else(|| anyhow!("{geometry} does not exist"))?;
        if !self.render_targets.contains_key(&state.render_target) {
            return Err(anyhow!("{} does not exist", state.render_target));
        }

        // Mutate every stage a real device would touch, so a missing
        // restore shows up in state comparisons.
        self.state.render_target = Some(state.render_target);
        self.state.blend_enabled = state.enable_blend;
        self.state.scissor_enabled = state.enable_scissor;
        self.state.scissor = state.scissor;
        self.state.input_layout = Some(record.format);
        self.state.vertex_buffer = Some(geometry);
        self.state.index_buffer = Some(geometry);
        self.state.shader = Some(state.shader);
        self.state.bound_textures = state.textures;
        self.state.viewport = (state.viewport_width, state.viewport_height);
        self.state.constant_generation += 1;

        self.events.push(DeviceEvent::Drew {
            geometry,
            indices_count,
        });
        Ok(())
    }

    fn composite_surface(&mut self, texture: TextureId, _uv: &UvRect) -> anyhow::Result<()> {
        if !self.textures.contains_key(&texture) {
            return Err(anyhow!("{texture} does not exist"));
        }
        // Compositing brackets its own state changes.
        self.save_pipeline_state();
        self.state.bound_textures = [Some(texture), None, None];
        self.state.blend_enabled = true;
        self.restore_pipeline_state();
        self.events.push(DeviceEvent::Composited(texture));
        Ok(())
    }

    fn draw_cursor_overlay(&mut self, texture: TextureId, _x: f32, _y: f32) -> anyhow::Result<()> {
        if !self.textures.contains_key(&texture) {
            return Err(anyhow!("{texture} does not exist"));
        }
        self.save_pipeline_state();
        self.state.bound_textures = [Some(texture), None, None];
        self.state.blend_enabled = true;
        self.restore_pipeline_state();
        self.events.push(DeviceEvent::CursorDrawn(texture));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel_texture(width: u32, height: u32, stride: u32) -> TextureDesc {
        let mut data = vec![0u8; (stride * height) as usize];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        TextureDesc {
            width,
            height,
            format: TextureFormat::Bgra8,
            init: TextureInit::Pixels { data, stride },
        }
    }

    #[test]
    fn padded_stride_rows_are_repacked_tightly() {
        let mut device = NullDevice::new();
        // 3px wide BGRA rows are 12 bytes; stride padded to 16.
        let desc = pixel_texture(3, 2, 16);
        device.create_texture(TextureId(1), &desc).unwrap();

        let pixels = device.texture_pixels(TextureId(1)).unwrap();
        assert_eq!(pixels.len(), 24);

        let TextureInit::Pixels { data, .. } = &desc.init else {
            unreachable!()
        };
        assert_eq!(&pixels[0..12], &data[0..12]);
        assert_eq!(&pixels[12..24], &data[16..28]);
    }

    #[test]
    fn stride_shorter_than_row_is_rejected() {
        let mut device = NullDevice::new();
        let desc = pixel_texture(4, 1, 8);
        assert!(device.create_texture(TextureId(1), &desc).is_err());
        assert_eq!(device.live_texture_count(), 0);
    }

    #[test]
    fn draw_mutates_state_and_restore_reverts_it() {
        let mut device = NullDevice::new();
        device
            .create_texture(
                TextureId(1),
                &TextureDesc {
                    width: 8,
                    height: 8,
                    format: TextureFormat::Bgra8,
                    init: TextureInit::Empty,
                },
            )
            .unwrap();
        device
            .create_render_target(RenderTargetId(1), TextureId(1))
            .unwrap();
        device
            .create_geometry(
                GeometryId(1),
                &VertexBuffer {
                    format: VertexFormat::Full,
                    data: vec![0; 140 * 4],
                },
                &IndexBuffer {
                    data: vec![0; 4 * 6],
                },
            )
            .unwrap();

        let before = device.pipeline_state().clone();
        device.save_pipeline_state();

        let state = DrawState {
            render_target: RenderTargetId(1),
            viewport_width: 8,
            viewport_height: 8,
            ..DrawState::default()
        };
        device.draw_geometry(GeometryId(1), 6, 0, &state).unwrap();
        assert_ne!(*device.pipeline_state(), before);

        device.restore_pipeline_state();
        assert_eq!(*device.pipeline_state(), before);
        assert_eq!(device.state_depth(), 0);
    }
}
