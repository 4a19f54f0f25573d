//! Plain-data model for the abstract GPU command stream the embedded
//! engine produces. Ids are opaque, monotonically allocated by the
//! [`GpuBridge`](crate::gpu::GpuBridge) and live in namespaces independent
//! of each other and of `ViewId`.

/// Opaque id of a device texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Opaque id of a vertex/index buffer pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u32);

/// Opaque id of a render target bound to a texture.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetId(pub u32);

impl std::fmt::Display for TextureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tex:{}", self.0)
    }
}

impl std::fmt::Display for GeometryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "geo:{}", self.0)
    }
}

impl std::fmt::Display for RenderTargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rt:{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextureFormat {
    /// 32-bit BGRA, 8 bits per channel.
    Bgra8,
    /// Single-channel alpha, used for glyph masks.
    Alpha8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Bgra8 => 4,
            TextureFormat::Alpha8 => 1,
        }
    }
}

/// Backing requested for a new texture. The engine either renders into the
/// texture (empty, render-target-usable) or hands over pixel data that is
/// uploaded once.
#[derive(Debug, Clone)]
pub enum TextureInit {
    Empty,
    Pixels { data: Vec<u8>, stride: u32 },
}

#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub init: TextureInit,
}

impl TextureDesc {
    pub fn is_render_target_usable(&self) -> bool {
        matches!(self.init, TextureInit::Empty)
    }
}

/// Vertex layout of a geometry buffer. Strides are fixed by the engine's
/// wire format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VertexFormat {
    /// position(2f) + color(4ub) + obj coords(2f)
    Slim,
    /// position(2f) + color(4ub) + tex(2f) + obj(2f) + data(28f)
    Full,
}

impl VertexFormat {
    pub fn stride(&self) -> u32 {
        match self {
            VertexFormat::Slim => 20,
            VertexFormat::Full => 140,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VertexBuffer {
    pub format: VertexFormat,
    pub data: Vec<u8>,
}

/// Index buffer, 32-bit little-endian indices.
#[derive(Debug, Clone)]
pub struct IndexBuffer {
    pub data: Vec<u8>,
}

/// Shader program selector for a draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderKind {
    Fill,
    FillPath,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Normalized source rectangle of a view surface within its texture.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl UvRect {
    pub const FULL: UvRect = UvRect {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };
}

/// Full per-draw pipeline configuration carried by each draw command.
#[derive(Debug, Clone)]
pub struct DrawState {
    pub render_target: RenderTargetId,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Row-major 4x4 transform applied before the orthographic projection.
    pub transform: [f32; 16],
    pub shader: ShaderKind,
    /// Up to three bound texture units.
    pub textures: [Option<TextureId>; 3],
    pub enable_blend: bool,
    pub enable_scissor: bool,
    pub scissor: ScissorRect,
    pub uniform_scalar: [f32; 8],
    pub uniform_vector: [[f32; 4]; 8],
    /// Active clip matrices, at most 8.
    pub clip: Vec<[f32; 16]>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            render_target: RenderTargetId(0),
            viewport_width: 0,
            viewport_height: 0,
            transform: IDENTITY_TRANSFORM,
            shader: ShaderKind::Fill,
            textures: [None; 3],
            enable_blend: true,
            enable_scissor: false,
            scissor: ScissorRect {
                left: 0,
                top: 0,
                right: 0,
                bottom: 0,
            },
            uniform_scalar: [0.0; 8],
            uniform_vector: [[0.0; 4]; 8],
            clip: Vec::new(),
        }
    }
}

pub const IDENTITY_TRANSFORM: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// One buffered instruction from the engine's per-tick command list.
#[derive(Debug, Clone)]
pub enum GpuCommand {
    DrawGeometry {
        geometry: GeometryId,
        indices_count: u32,
        indices_offset: u32,
        state: Box<DrawState>,
    },
    ClearRenderTarget {
        render_target: RenderTargetId,
    },
}

/// Ordered snapshot of one engine tick's draw/clear commands. Ownership
/// transfers from producer to consumer by replacement, never by appending.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    pub commands: Vec<GpuCommand>,
}

impl CommandList {
    pub fn new(commands: Vec<GpuCommand>) -> Self {
        Self { commands }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}
