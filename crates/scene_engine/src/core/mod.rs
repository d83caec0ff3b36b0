//! Core engine configuration

pub mod config;

pub use config::{AssetConfig, EngineConfig, EngineSettings, RendererConfig};
