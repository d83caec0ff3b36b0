//! GPU resource objects
//!
//! Every type here wraps driver objects with the same lifecycle: the
//! constructor allocates and uploads immediately, `bind` makes it current,
//! resize-sensitive targets recreate their storage in place, and `destroy`
//! releases the driver object. A destroyed resource reports `is_loaded() ==
//! false` and its binds become no-ops.

pub mod texture;
pub mod render_buffer;
pub mod mesh;
pub mod shader;
pub mod framebuffer;

pub use texture::{Cubemap, RenderTexture, Texture2D};
pub use render_buffer::RenderBuffer;
pub use mesh::{DrawCall, DrawMethod, Mesh, Vertex};
pub use shader::{Shader, ShaderProgram, ShaderSource};
pub use framebuffer::{FramebufferObject, FramebufferSize, RenderTarget, TargetKind};
