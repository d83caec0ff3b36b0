//! Graphics driver implementations
//!
//! - [`HeadlessDriver`]: in-memory driver that records every call, used by the
//!   test suite and by offline tools
//! - [`GlDriver`]: OpenGL 3.3+ driver over `glow`; the GL context is supplied by
//!   the windowing layer

pub mod headless;
pub mod gl;

pub use headless::{DriverCall, HeadlessDriver};
pub use gl::GlDriver;
