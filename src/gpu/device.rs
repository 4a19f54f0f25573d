use crate::gpu::commands::{
    DrawState, GeometryId, IndexBuffer, RenderTargetId, TextureDesc, TextureId, UvRect,
    VertexBuffer,
};

/// The host's rendering device, as seen by the bridge. Every method runs on
/// the render thread, during `present`. Implementations own the real device
/// objects, keyed by the opaque ids the bridge allocates.
///
/// `save_pipeline_state` / `restore_pipeline_state` bracket command-list
/// execution; the restore must return every pipeline stage touched by the
/// other methods to its saved value, so the host's own draw state is
/// untouched by a frame that executed HUD commands.
pub trait GpuDevice {
    fn create_texture(&mut self, id: TextureId, desc: &TextureDesc) -> anyhow::Result<()>;
    fn update_texture(&mut self, id: TextureId, desc: &TextureDesc) -> anyhow::Result<()>;
    fn destroy_texture(&mut self, id: TextureId) -> anyhow::Result<()>;

    fn create_geometry(
        &mut self,
        id: GeometryId,
        vertices: &VertexBuffer,
        indices: &IndexBuffer,
    ) -> anyhow::Result<()>;
    fn update_geometry(
        &mut self,
        id: GeometryId,
        vertices: &VertexBuffer,
        indices: &IndexBuffer,
    ) -> anyhow::Result<()>;
    fn destroy_geometry(&mut self, id: GeometryId) -> anyhow::Result<()>;

    /// Bind a render target to an existing render-target-usable texture.
    fn create_render_target(
        &mut self,
        id: RenderTargetId,
        texture: TextureId,
    ) -> anyhow::Result<()>;
    fn destroy_render_target(&mut self, id: RenderTargetId) -> anyhow::Result<()>;

    fn save_pipeline_state(&mut self);
    fn restore_pipeline_state(&mut self);

    fn clear_render_target(&mut self, render_target: RenderTargetId) -> anyhow::Result<()>;
    fn draw_geometry(
        &mut self,
        geometry: GeometryId,
        indices_count: u32,
        indices_offset: u32,
        state: &DrawState,
    ) -> anyhow::Result<()>;

    /// Blend a view's surface texture over the host's back buffer.
    fn composite_surface(&mut self, texture: TextureId, uv: &UvRect) -> anyhow::Result<()>;

    /// Draw the cursor image at the given back-buffer position.
    fn draw_cursor_overlay(&mut self, texture: TextureId, x: f32, y: f32) -> anyhow::Result<()>;
}
