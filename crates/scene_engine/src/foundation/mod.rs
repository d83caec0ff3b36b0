//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Scoped handle storage for GPU and scene resources
//! - Frame timers
//! - Logging bootstrap

pub mod math;
pub mod collections;
pub mod time;
pub mod logging;
