//! Graphics driver contract
//!
//! The render core never talks to a graphics API directly. Everything it
//! needs (object creation and deletion, binding, fixed-function state, draws
//! and readback) goes through [`GraphicsDriver`]. Object names are plain
//! `u32` values owned by the driver; `0` is never a valid name.
//!
//! Attach, draw-buffer and status calls act on the currently bound
//! framebuffer, mirroring the bind-to-edit model of the underlying API.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::RenderResult;

/// Driver-side object name
pub type ObjectId = u32;

/// Pixel storage formats for textures and renderbuffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// Single 8-bit channel
    R8,
    /// Two 8-bit channels
    Rg8,
    /// Three 8-bit channels
    Rgb8,
    /// Four 8-bit channels
    Rgba8,
    /// Four 16-bit float channels
    Rgba16F,
    /// Four 32-bit float channels
    Rgba32F,
    /// Single 32-bit float channel
    R32F,
    /// 24-bit depth
    Depth24,
    /// 32-bit float depth
    Depth32F,
    /// 24-bit depth with 8-bit stencil
    Depth24Stencil8,
}

impl TextureFormat {
    /// Whether this is a depth (or depth-stencil) format
    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth24 | Self::Depth32F | Self::Depth24Stencil8)
    }

    /// Whether this format carries a stencil channel
    pub fn has_stencil(self) -> bool {
        matches!(self, Self::Depth24Stencil8)
    }

    /// Number of channels read back for this format
    pub fn channels(self) -> u32 {
        match self {
            Self::R8 | Self::R32F | Self::Depth24 | Self::Depth32F | Self::Depth24Stencil8 => 1,
            Self::Rg8 => 2,
            Self::Rgb8 => 3,
            Self::Rgba8 | Self::Rgba16F | Self::Rgba32F => 4,
        }
    }

    /// Bytes per pixel when read back with [`Self::default_pixel_type`]
    pub fn bytes_per_pixel(self) -> usize {
        self.channels() as usize * self.default_pixel_type().size()
    }

    /// Component type used when uploading or reading this format
    pub fn default_pixel_type(self) -> PixelType {
        match self {
            Self::R8 | Self::Rg8 | Self::Rgb8 | Self::Rgba8 => PixelType::UnsignedByte,
            Self::Rgba16F => PixelType::HalfFloat,
            Self::Rgba32F | Self::R32F | Self::Depth32F | Self::Depth24 => PixelType::Float,
            Self::Depth24Stencil8 => PixelType::UnsignedInt248,
        }
    }

    /// Buffers cleared by `ClearBuffers` for a depth attachment of this format
    pub fn depth_clear_mask(self) -> ClearMask {
        if self.has_stencil() {
            ClearMask::DEPTH | ClearMask::STENCIL
        } else {
            ClearMask::DEPTH
        }
    }
}

/// Component type of pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    /// 8-bit unsigned normalized
    UnsignedByte,
    /// 16-bit float
    HalfFloat,
    /// 32-bit float
    Float,
    /// 32-bit unsigned integer
    UnsignedInt,
    /// Packed 24-bit depth + 8-bit stencil
    UnsignedInt248,
}

impl PixelType {
    /// Size of one component in bytes
    pub fn size(self) -> usize {
        match self {
            Self::UnsignedByte => 1,
            Self::HalfFloat => 2,
            Self::Float | Self::UnsignedInt | Self::UnsignedInt248 => 4,
        }
    }
}

/// Texture binding targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// Plain 2D texture
    Texture2D,
    /// Six-faced cube map
    Cubemap,
}

/// Cube map faces in upload order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// +X
    PositiveX,
    /// -X
    NegativeX,
    /// +Y
    PositiveY,
    /// -Y
    NegativeY,
    /// +Z
    PositiveZ,
    /// -Z
    NegativeZ,
}

impl CubeFace {
    /// All faces in upload order
    pub const ALL: [CubeFace; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];
}

/// Texture filtering modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    /// Nearest neighbor filtering
    Nearest,
    /// Linear filtering
    Linear,
}

/// Texture wrapping modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    /// Repeat the texture
    Repeat,
    /// Mirror the texture
    MirroredRepeat,
    /// Clamp to edge
    ClampToEdge,
}

/// Storage description for a texture upload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Internal format
    pub format: TextureFormat,
    /// Component type of the uploaded data
    pub pixel_type: PixelType,
    /// Allocate and generate a mip chain
    pub mipmaps: bool,
    /// Min/mag filter
    pub filter: FilterMode,
    /// Wrap mode on both axes
    pub wrap: WrapMode,
}

impl TextureDesc {
    /// Description with the format's default component type and linear filtering
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            pixel_type: format.default_pixel_type(),
            mipmaps: false,
            filter: FilterMode::Linear,
            wrap: WrapMode::ClampToEdge,
        }
    }

    /// Expected byte length of a full upload
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels() as usize * self.pixel_type.size()
    }
}

/// Shader pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
    /// Geometry stage
    Geometry,
}

/// Primitive assembly modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveMode {
    /// Independent triangles
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Independent line segments
    Lines,
    /// Connected line strip
    LineStrip,
    /// Points
    Points,
}

/// Face culling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullMode {
    /// Culling disabled
    None,
    /// Cull back faces
    Back,
    /// Cull front faces
    Front,
    /// Cull everything
    FrontAndBack,
}

/// Depth comparison rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthFunc {
    /// Never passes
    Never,
    /// Passes if incoming < stored
    Less,
    /// Passes if equal
    Equal,
    /// Passes if incoming <= stored
    LessEqual,
    /// Passes if incoming > stored
    Greater,
    /// Passes if not equal
    NotEqual,
    /// Passes if incoming >= stored
    GreaterEqual,
    /// Always passes
    Always,
}

/// Blend factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    One,
    /// Source color
    SrcColor,
    /// 1 - source color
    OneMinusSrcColor,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination color
    DstColor,
    /// 1 - destination color
    OneMinusDstColor,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
}

/// Blend equations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendEquation {
    /// src + dst
    Add,
    /// src - dst
    Subtract,
    /// dst - src
    ReverseSubtract,
    /// min(src, dst)
    Min,
    /// max(src, dst)
    Max,
}

/// Blend function applied while blending is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendFunc {
    /// Source factor
    pub src: BlendFactor,
    /// Destination factor
    pub dst: BlendFactor,
    /// Combining equation
    pub equation: BlendEquation,
}

impl BlendFunc {
    /// Standard alpha blending
    pub const ALPHA: BlendFunc = BlendFunc {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
        equation: BlendEquation::Add,
    };
}

bitflags! {
    /// Buffers affected by clear and blit operations
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        /// Color buffers
        const COLOR = 0b001;
        /// Depth buffer
        const DEPTH = 0b010;
        /// Stencil buffer
        const STENCIL = 0b100;
    }
}

/// Framebuffer attachment points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttachmentPoint {
    /// Color attachment `n`
    Color(u32),
    /// Depth only
    Depth,
    /// Combined depth-stencil
    DepthStencil,
}

impl AttachmentPoint {
    /// Depth attachment point matching a depth format
    pub fn for_depth(format: TextureFormat) -> Self {
        if format.has_stencil() {
            Self::DepthStencil
        } else {
            Self::Depth
        }
    }
}

/// Result of a framebuffer completeness query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    /// Ready to render
    Complete,
    /// Not renderable, with the driver's reason
    Incomplete(String),
}

/// Values that can be written to a program uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// Signed integer (also used for sampler units)
    Int(i32),
    /// Scalar float
    Float(f32),
    /// 3-component vector
    Vec3([f32; 3]),
    /// 4-component vector
    Vec4([f32; 4]),
    /// Column-major 4x4 matrix
    Mat4([f32; 16]),
}

/// One float vertex attribute inside an interleaved vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader attribute location
    pub location: u32,
    /// Number of float components
    pub components: u32,
    /// Offset from the start of the vertex, in floats
    pub offset: u32,
}

/// Interleaved float vertex layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    /// Floats per vertex
    pub stride: u32,
    /// Attributes in the vertex
    pub attributes: Vec<VertexAttribute>,
}

/// Narrow contract the render core requires from a graphics API
pub trait GraphicsDriver {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Maximum number of color attachments per framebuffer
    fn max_color_attachments(&self) -> u32;

    // ---------------------------------------------------------------- textures

    /// Allocate a texture object name
    fn create_texture(&mut self, target: TextureTarget) -> RenderResult<ObjectId>;

    /// (Re)allocate 2D storage and optionally upload pixels
    fn upload_texture_2d(&mut self, texture: ObjectId, desc: &TextureDesc, data: Option<&[u8]>);

    /// Upload one cube map face
    fn upload_cubemap_face(&mut self, texture: ObjectId, face: CubeFace, desc: &TextureDesc, data: &[u8]);

    /// Generate the mip chain of a texture
    fn generate_mipmaps(&mut self, texture: ObjectId, target: TextureTarget);

    /// Bind a texture to a texture unit; `None` unbinds
    fn bind_texture(&mut self, unit: u32, target: TextureTarget, texture: Option<ObjectId>);

    /// Delete a texture object
    fn delete_texture(&mut self, texture: ObjectId);

    // ----------------------------------------------------------- renderbuffers

    /// Allocate a renderbuffer object name
    fn create_renderbuffer(&mut self) -> RenderResult<ObjectId>;

    /// Allocate renderbuffer storage
    fn renderbuffer_storage(&mut self, renderbuffer: ObjectId, format: TextureFormat, width: u32, height: u32);

    /// Delete a renderbuffer object
    fn delete_renderbuffer(&mut self, renderbuffer: ObjectId);

    // ------------------------------------------------------------ framebuffers

    /// Allocate a framebuffer object name
    fn create_framebuffer(&mut self) -> RenderResult<ObjectId>;

    /// Bind a framebuffer for drawing and editing; `None` binds the default one
    fn bind_framebuffer(&mut self, framebuffer: Option<ObjectId>);

    /// Currently bound framebuffer
    fn bound_framebuffer(&self) -> Option<ObjectId>;

    /// Attach (or detach with `None`) a texture to the bound framebuffer
    fn attach_texture(&mut self, point: AttachmentPoint, texture: Option<ObjectId>);

    /// Attach (or detach with `None`) a renderbuffer to the bound framebuffer
    fn attach_renderbuffer(&mut self, point: AttachmentPoint, renderbuffer: Option<ObjectId>);

    /// Select the color attachments written by draws on the bound framebuffer
    fn set_draw_buffers(&mut self, color_attachments: &[u32]);

    /// Completeness of the bound framebuffer
    fn framebuffer_status(&self) -> FramebufferStatus;

    /// Clear the selected buffers of the bound framebuffer
    fn clear(&mut self, mask: ClearMask, color: [f32; 4], depth: f32);

    /// GPU-side copy between two framebuffers of equal size
    ///
    /// Color blits copy `src_attachment` into `dst_attachment`; depth blits
    /// ignore the attachment indices. Leaves the default framebuffer bound.
    fn blit_framebuffer(
        &mut self,
        src: ObjectId,
        dst: ObjectId,
        src_attachment: u32,
        dst_attachment: u32,
        width: u32,
        height: u32,
        mask: ClearMask,
    );

    /// Synchronous readback of a region of one attachment
    ///
    /// Stalls until prior GPU work touching the region has completed.
    fn read_pixels(
        &mut self,
        framebuffer: ObjectId,
        point: AttachmentPoint,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Vec<u8>;

    /// Delete a framebuffer object
    fn delete_framebuffer(&mut self, framebuffer: ObjectId);

    // ---------------------------------------------------------------- geometry

    /// Allocate a vertex array object
    fn create_vertex_array(&mut self) -> RenderResult<ObjectId>;

    /// Allocate a buffer object
    fn create_buffer(&mut self) -> RenderResult<ObjectId>;

    /// Upload interleaved vertex data and configure its attributes on `vao`
    fn upload_vertex_buffer(&mut self, vao: ObjectId, buffer: ObjectId, data: &[f32], layout: &VertexLayout);

    /// Upload 32-bit indices and attach them to `vao`
    fn upload_index_buffer(&mut self, vao: ObjectId, buffer: ObjectId, indices: &[u32]);

    /// Upload per-instance model matrices, starting at attribute `first_location`
    fn upload_instance_buffer(&mut self, vao: ObjectId, buffer: ObjectId, matrices: &[f32], first_location: u32);

    /// Bind a vertex array; `None` unbinds
    fn bind_vertex_array(&mut self, vao: Option<ObjectId>);

    /// Non-indexed draw from the bound vertex array
    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32);

    /// Indexed draw from the bound vertex array
    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32);

    /// Instanced non-indexed draw
    fn draw_arrays_instanced(&mut self, mode: PrimitiveMode, first: u32, count: u32, instances: u32);

    /// Instanced indexed draw
    fn draw_elements_instanced(&mut self, mode: PrimitiveMode, count: u32, instances: u32);

    /// Delete a vertex array object
    fn delete_vertex_array(&mut self, vao: ObjectId);

    /// Delete a buffer object
    fn delete_buffer(&mut self, buffer: ObjectId);

    // ----------------------------------------------------------------- shaders

    /// Allocate a shader object
    fn create_shader(&mut self, stage: ShaderStage) -> RenderResult<ObjectId>;

    /// Compile source into a shader object; `Err` carries the info log
    fn compile_shader(&mut self, shader: ObjectId, source: &str) -> Result<(), String>;

    /// Delete a shader object
    fn delete_shader(&mut self, shader: ObjectId);

    /// Allocate a program object
    fn create_program(&mut self) -> RenderResult<ObjectId>;

    /// Attach a compiled shader to a program
    fn attach_shader(&mut self, program: ObjectId, shader: ObjectId);

    /// Detach a shader from a program
    fn detach_shader(&mut self, program: ObjectId, shader: ObjectId);

    /// Link a program; `Err` carries the info log
    fn link_program(&mut self, program: ObjectId) -> Result<(), String>;

    /// Validate a linked program against the current state
    fn validate_program(&mut self, program: ObjectId) -> Result<(), String>;

    /// Make a program current; `None` unbinds
    fn use_program(&mut self, program: Option<ObjectId>);

    /// Write a uniform of the given program; false if the uniform is inactive
    fn set_uniform(&mut self, program: ObjectId, name: &str, value: UniformValue) -> bool;

    /// Delete a program object
    fn delete_program(&mut self, program: ObjectId);

    // ------------------------------------------------------------------- state

    /// Set the viewport rectangle
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32);

    /// Set face culling
    fn set_cull_mode(&mut self, mode: CullMode);

    /// Enable blending with `func` or disable with `None`
    ///
    /// `attachment` selects a single draw buffer; `None` applies to all.
    fn set_blend(&mut self, attachment: Option<u32>, func: Option<BlendFunc>);

    /// Set depth test, depth writes and comparison rule
    fn set_depth_state(&mut self, test: bool, write: bool, func: DepthFunc);

    /// Toggle wireframe rasterization
    fn set_wireframe(&mut self, enabled: bool);

    // ------------------------------------------------------------- timer query

    /// Allocate a GPU time-elapsed query
    fn create_timer_query(&mut self) -> RenderResult<ObjectId>;

    /// Begin timing GPU work
    fn begin_timer_query(&mut self, query: ObjectId);

    /// End the active timer query
    fn end_timer_query(&mut self);

    /// Elapsed nanoseconds of a finished query, if available
    fn timer_query_result(&mut self, query: ObjectId) -> Option<u64>;

    /// Delete a query object
    fn delete_query(&mut self, query: ObjectId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_clear_mask_follows_stencil() {
        assert_eq!(TextureFormat::Depth24.depth_clear_mask(), ClearMask::DEPTH);
        assert_eq!(
            TextureFormat::Depth24Stencil8.depth_clear_mask(),
            ClearMask::DEPTH | ClearMask::STENCIL
        );
    }

    #[test]
    fn test_texture_desc_byte_len() {
        let desc = TextureDesc::new(4, 2, TextureFormat::Rgba8);
        assert_eq!(desc.byte_len(), 32);
        let float_desc = TextureDesc::new(4, 2, TextureFormat::Rgba32F);
        assert_eq!(float_desc.byte_len(), 128);
    }

    #[test]
    fn test_attachment_point_for_depth() {
        assert_eq!(AttachmentPoint::for_depth(TextureFormat::Depth32F), AttachmentPoint::Depth);
        assert_eq!(
            AttachmentPoint::for_depth(TextureFormat::Depth24Stencil8),
            AttachmentPoint::DepthStencil
        );
    }
}
