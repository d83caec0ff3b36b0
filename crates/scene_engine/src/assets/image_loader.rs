//! Image decoding for texture uploads
//!
//! Decodes PNG files (or bytes) into tightly packed RGBA8 pixels and builds
//! the procedural placeholder images bound when a material texture is missing.

use std::path::Path;

use crate::assets::AssetError;
use crate::render::driver::{TextureDesc, TextureFormat};

/// Decoded RGBA8 image ready for upload
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Raw RGBA pixel data, rows bottom to top as uploaded
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageData {
    /// Decode an image file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        log::debug!("Loading image from {:?}", path);

        let img = image::open(path)
            .map_err(|e| AssetError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::info!("Loaded image {}x{} from {:?}", width, height, path);
        Ok(Self { data: rgba.into_raw(), width, height })
    }

    /// Decode an in-memory encoded image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("image from memory: {}", e)))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self { data: rgba.into_raw(), width, height })
    }

    /// Uniformly colored image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let data = color.repeat((width * height) as usize);
        Self { data, width, height }
    }

    /// Two-color checkerboard with square cells of `cell` pixels
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = cell.max(1);
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let even = ((x / cell) + (y / cell)) % 2 == 0;
                data.extend_from_slice(if even { &a } else { &b });
            }
        }
        Self { data, width: size, height: size }
    }

    /// Texture description matching this image
    pub fn desc(&self) -> TextureDesc {
        TextureDesc::new(self.width, self.height, TextureFormat::Rgba8)
    }

    /// Pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let mut px = [0; 4];
        px.copy_from_slice(self.data.get(offset..offset + 4)?);
        Some(px)
    }

    /// Size of the pixel data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);
        assert_eq!(img.pixel(3, 3), Some([255, 0, 0, 255]));
        assert_eq!(img.pixel(4, 0), None);
    }

    #[test]
    fn test_checkerboard_alternates_cells() {
        let white = [255, 255, 255, 255];
        let magenta = [255, 0, 255, 255];
        let img = ImageData::checkerboard(8, 4, white, magenta);
        assert_eq!(img.pixel(0, 0), Some(white));
        assert_eq!(img.pixel(4, 0), Some(magenta));
        assert_eq!(img.pixel(4, 4), Some(white));
        assert_eq!(img.desc().byte_len(), img.size_bytes());
    }

    #[test]
    fn test_invalid_bytes_fail_to_decode() {
        assert!(matches!(ImageData::from_bytes(&[0, 1, 2]), Err(AssetError::LoadFailed(_))));
    }
}
