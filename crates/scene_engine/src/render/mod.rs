//! # Rendering System
//!
//! The render core: GPU resource objects, materials, framebuffers and the
//! [`RenderManager`] that sorts and dispatches draws.
//!
//! ## Architecture
//!
//! - **Driver**: [`GraphicsDriver`] is the only path to the graphics API
//! - **Resources**: each resource object owns exactly one driver object (or a
//!   small fixed group, for meshes) and releases it through `destroy`
//! - **Materials**: program pair, fixed-function state, texture levels and a
//!   unique render-order sequence number
//! - **RenderManager**: per-frame sort caches and the draw loop
//!
//! Resources do not release driver objects on `Drop` because that would need a
//! driver reference inside every resource. Destruction is explicit and is
//! driven by [`crate::assets::Assets`].

pub mod driver;
pub mod backends;
pub mod resources;
pub mod material;
pub mod render_manager;
pub mod timers;

pub use driver::{
    AttachmentPoint, BlendEquation, BlendFactor, BlendFunc, ClearMask, CubeFace, CullMode,
    DepthFunc, FilterMode, FramebufferStatus, GraphicsDriver, ObjectId, PixelType,
    PrimitiveMode, ShaderStage, TextureDesc, TextureFormat, TextureTarget, UniformValue,
    VertexAttribute, VertexLayout, WrapMode,
};
pub use backends::{GlDriver, HeadlessDriver, DriverCall};
pub use resources::{
    Cubemap, DrawCall, DrawMethod, FramebufferObject, FramebufferSize, Mesh, RenderBuffer,
    RenderTarget, RenderTexture, Shader, ShaderProgram, ShaderSource, TargetKind, Texture2D,
    Vertex,
};
pub use material::{
    GlState, Material, PassType, ProgramPair, RenderMode, SequenceId, SequenceRegistry,
    TextureLevel,
};
pub use render_manager::{FrameStats, FrameUniforms, RenderManager};
pub use timers::FrameTimers;

use thiserror::Error;

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// The driver could not allocate an object
    #[error("Driver failed to create {kind}: {reason}")]
    ObjectCreation {
        /// Object kind
        kind: &'static str,
        /// Driver message
        reason: String,
    },

    /// A framebuffer edit was attempted while another framebuffer was bound
    #[error("Framebuffer '{name}' must be bound before {operation}")]
    FramebufferNotBound {
        /// Framebuffer name
        name: String,
        /// Rejected operation
        operation: &'static str,
    },

    /// Color attachment index beyond the driver limit
    #[error("Attachment index {index} exceeds the driver limit of {max}")]
    AttachmentOutOfRange {
        /// Requested index
        index: u32,
        /// Driver maximum
        max: u32,
    },

    /// No render target at the requested color index
    #[error("Framebuffer '{name}' has no attachment at index {index}")]
    MissingAttachment {
        /// Framebuffer name
        name: String,
        /// Requested index
        index: u32,
    },

    /// Depth operation on a framebuffer without depth
    #[error("Framebuffer '{0}' has no depth attachment")]
    MissingDepth(String),

    /// Color format used where a depth format was expected, or vice versa
    #[error("Format {format:?} is not valid for {usage}")]
    InvalidFormat {
        /// Offending format
        format: TextureFormat,
        /// Intended use
        usage: &'static str,
    },

    /// Blit between attachments of different formats
    #[error("Blit format mismatch: {src:?} -> {dst:?}")]
    BlitFormatMismatch {
        /// Source format
        src: TextureFormat,
        /// Destination format
        dst: TextureFormat,
    },

    /// Blit between framebuffers of different sizes
    #[error("Blit size mismatch: {src_width}x{src_height} -> {dst_width}x{dst_height}")]
    BlitSizeMismatch {
        /// Source width
        src_width: u32,
        /// Source height
        src_height: u32,
        /// Destination width
        dst_width: u32,
        /// Destination height
        dst_height: u32,
    },

    /// Attachment whose size differs from its framebuffer
    #[error("Target is {width}x{height} but framebuffer '{name}' is {expected_width}x{expected_height}")]
    AttachmentSizeMismatch {
        /// Framebuffer name
        name: String,
        /// Target width
        width: u32,
        /// Target height
        height: u32,
        /// Framebuffer width
        expected_width: u32,
        /// Framebuffer height
        expected_height: u32,
    },

    /// Element count incompatible with the primitive mode
    #[error("Invalid draw count {count} for {mode:?}: {reason}")]
    InvalidDrawCount {
        /// Primitive mode
        mode: PrimitiveMode,
        /// Vertex or index count
        count: u32,
        /// Violated rule
        reason: &'static str,
    },

    /// Pixel upload does not match the declared storage
    #[error("Texture data is {actual} bytes, expected {expected}")]
    TextureDataSize {
        /// Expected byte count
        expected: usize,
        /// Provided byte count
        actual: usize,
    },

    /// A resource was used after its driver object was released
    #[error("{0} is not loaded")]
    NotLoaded(String),

    /// Neither the material's program nor the error material could be bound
    #[error("Error material is unusable")]
    ErrorMaterialUnavailable,

    /// Handle does not resolve to a live resource
    #[error("Unknown {0} handle")]
    InvalidHandle(&'static str),

    /// IO error while reading shader sources
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for render operations
pub type RenderResult<T> = Result<T, RenderError>;
