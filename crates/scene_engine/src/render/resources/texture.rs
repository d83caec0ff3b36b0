//! Sampleable textures
//!
//! - [`Texture2D`]: immutable image data uploaded at construction
//! - [`Cubemap`]: six square faces, used for environment lookups
//! - [`RenderTexture`]: storage-only texture used as a framebuffer attachment;
//!   recreated on resize because storage is immutable once allocated

use crate::render::driver::{
    CubeFace, GraphicsDriver, ObjectId, PixelType, TextureDesc, TextureFormat, TextureTarget,
};
use crate::render::{RenderError, RenderResult};

/// Immutable 2D texture
#[derive(Debug)]
pub struct Texture2D {
    name: String,
    id: ObjectId,
    desc: TextureDesc,
}

impl Texture2D {
    /// Create the texture and upload `data`, which must cover the full image
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        name: impl Into<String>,
        desc: TextureDesc,
        data: &[u8],
    ) -> RenderResult<Self> {
        if desc.format.is_depth() {
            return Err(RenderError::InvalidFormat {
                format: desc.format,
                usage: "image texture",
            });
        }
        let expected = desc.byte_len();
        if data.len() != expected {
            return Err(RenderError::TextureDataSize { expected, actual: data.len() });
        }

        let id = driver.create_texture(TextureTarget::Texture2D)?;
        driver.upload_texture_2d(id, &desc, Some(data));
        let name = name.into();
        log::debug!("Texture '{}' uploaded ({}x{} {:?})", name, desc.width, desc.height, desc.format);
        Ok(Self { name, id, desc })
    }

    /// Bind to a texture unit
    pub fn bind(&self, driver: &mut dyn GraphicsDriver, unit: u32) {
        if self.is_loaded() {
            driver.bind_texture(unit, TextureTarget::Texture2D, Some(self.id));
        }
    }

    /// Release the driver texture
    pub fn destroy(&mut self, driver: &mut dyn GraphicsDriver) {
        if self.is_loaded() {
            driver.delete_texture(self.id);
            self.id = 0;
        }
    }

    /// Whether the driver texture is alive
    pub fn is_loaded(&self) -> bool {
        self.id != 0
    }

    /// Driver name
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.desc.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Storage format
    pub fn format(&self) -> TextureFormat {
        self.desc.format
    }
}

/// Cube map built from six square faces
#[derive(Debug)]
pub struct Cubemap {
    name: String,
    id: ObjectId,
    size: u32,
    format: TextureFormat,
}

impl Cubemap {
    /// Create the cube map; faces are given in [`CubeFace::ALL`] order
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        name: impl Into<String>,
        size: u32,
        format: TextureFormat,
        faces: [&[u8]; 6],
    ) -> RenderResult<Self> {
        let desc = TextureDesc::new(size, size, format);
        let expected = desc.byte_len();
        if let Some(face) = faces.iter().find(|face| face.len() != expected) {
            return Err(RenderError::TextureDataSize { expected, actual: face.len() });
        }

        let id = driver.create_texture(TextureTarget::Cubemap)?;
        for (face, data) in CubeFace::ALL.iter().zip(faces) {
            driver.upload_cubemap_face(id, *face, &desc, data);
        }
        Ok(Self { name: name.into(), id, size, format })
    }

    /// Bind to a texture unit
    pub fn bind(&self, driver: &mut dyn GraphicsDriver, unit: u32) {
        if self.is_loaded() {
            driver.bind_texture(unit, TextureTarget::Cubemap, Some(self.id));
        }
    }

    /// Release the driver texture
    pub fn destroy(&mut self, driver: &mut dyn GraphicsDriver) {
        if self.is_loaded() {
            driver.delete_texture(self.id);
            self.id = 0;
        }
    }

    /// Whether the driver texture is alive
    pub fn is_loaded(&self) -> bool {
        self.id != 0
    }

    /// Driver name
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Edge length of every face
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Storage format
    pub fn format(&self) -> TextureFormat {
        self.format
    }
}

/// Texture used as a framebuffer attachment
#[derive(Debug)]
pub struct RenderTexture {
    name: String,
    id: ObjectId,
    desc: TextureDesc,
}

impl RenderTexture {
    /// Allocate storage without uploading data
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
        mipmaps: bool,
    ) -> RenderResult<Self> {
        let mut desc = TextureDesc::new(width, height, format);
        desc.mipmaps = mipmaps && !format.is_depth();
        let id = Self::allocate(driver, &desc)?;
        Ok(Self { name: name.into(), id, desc })
    }

    fn allocate(driver: &mut dyn GraphicsDriver, desc: &TextureDesc) -> RenderResult<ObjectId> {
        let id = driver.create_texture(TextureTarget::Texture2D)?;
        driver.upload_texture_2d(id, desc, None);
        Ok(id)
    }

    /// Destroy and reallocate storage at a new size
    ///
    /// The driver name changes; anything holding the old name must re-attach.
    pub fn recreate_storage(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        width: u32,
        height: u32,
        format: TextureFormat,
        pixel_type: Option<PixelType>,
    ) -> RenderResult<()> {
        self.destroy(driver);
        let mut desc = TextureDesc::new(width, height, format);
        desc.mipmaps = self.desc.mipmaps && !format.is_depth();
        if let Some(pixel_type) = pixel_type {
            desc.pixel_type = pixel_type;
        }
        self.id = Self::allocate(driver, &desc)?;
        self.desc = desc;
        log::trace!("Render texture '{}' recreated at {}x{}", self.name, width, height);
        Ok(())
    }

    /// Rebuild the mip chain after rendering
    pub fn generate_mipmaps(&self, driver: &mut dyn GraphicsDriver) {
        if self.is_loaded() && self.desc.mipmaps {
            driver.generate_mipmaps(self.id, TextureTarget::Texture2D);
        }
    }

    /// Bind to a texture unit
    pub fn bind(&self, driver: &mut dyn GraphicsDriver, unit: u32) {
        if self.is_loaded() {
            driver.bind_texture(unit, TextureTarget::Texture2D, Some(self.id));
        }
    }

    /// Release the driver texture
    pub fn destroy(&mut self, driver: &mut dyn GraphicsDriver) {
        if self.is_loaded() {
            driver.delete_texture(self.id);
            self.id = 0;
        }
    }

    /// Whether the driver texture is alive
    pub fn is_loaded(&self) -> bool {
        self.id != 0
    }

    /// Driver name
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.desc.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    /// Storage format
    pub fn format(&self) -> TextureFormat {
        self.desc.format
    }

    /// Whether a mip chain is allocated
    pub fn has_mipmaps(&self) -> bool {
        self.desc.mipmaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessDriver;

    #[test]
    fn test_texture_rejects_short_data() {
        let mut driver = HeadlessDriver::new();
        let desc = TextureDesc::new(2, 2, TextureFormat::Rgba8);
        let result = Texture2D::new(&mut driver, "short", desc, &[0; 4]);
        assert!(matches!(result, Err(RenderError::TextureDataSize { expected: 16, actual: 4 })));
        assert_eq!(driver.live_object_count(), 0);
    }

    #[test]
    fn test_texture_destroy_is_idempotent() {
        let mut driver = HeadlessDriver::new();
        let desc = TextureDesc::new(1, 1, TextureFormat::Rgba8);
        let mut texture = Texture2D::new(&mut driver, "white", desc, &[255; 4]).unwrap();
        assert!(texture.is_loaded());

        texture.destroy(&mut driver);
        texture.destroy(&mut driver);
        assert!(!texture.is_loaded());
        assert_eq!(driver.live_texture_count(), 0);
    }

    #[test]
    fn test_render_texture_recreate_changes_name_and_size() {
        let mut driver = HeadlessDriver::new();
        let mut target = RenderTexture::new(&mut driver, "color", 4, 4, TextureFormat::Rgba8, false).unwrap();
        let old = target.id();

        target.recreate_storage(&mut driver, 8, 2, TextureFormat::Rgba8, None).unwrap();
        assert_ne!(target.id(), old);
        assert!(!driver.texture_exists(old));
        assert_eq!((target.width(), target.height()), (8, 2));
    }

    #[test]
    fn test_cubemap_requires_six_full_faces() {
        let mut driver = HeadlessDriver::new();
        let face = [0u8; 4];
        let short = [0u8; 3];
        let faces: [&[u8]; 6] = [&face, &face, &face, &face, &face, &short];
        assert!(Cubemap::new(&mut driver, "sky", 1, TextureFormat::Rgba8, faces).is_err());

        let faces: [&[u8]; 6] = [&face; 6];
        let cubemap = Cubemap::new(&mut driver, "sky", 1, TextureFormat::Rgba8, faces).unwrap();
        assert!(cubemap.is_loaded());
    }
}
