//! Non-sampleable framebuffer storage

use crate::render::driver::{GraphicsDriver, ObjectId, TextureFormat};
use crate::render::RenderResult;

/// Renderbuffer used as a color or depth attachment
#[derive(Debug)]
pub struct RenderBuffer {
    name: String,
    id: ObjectId,
    width: u32,
    height: u32,
    format: TextureFormat,
}

impl RenderBuffer {
    /// Allocate storage
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> RenderResult<Self> {
        let id = driver.create_renderbuffer()?;
        driver.renderbuffer_storage(id, format, width, height);
        Ok(Self { name: name.into(), id, width, height, format })
    }

    /// Destroy and reallocate storage at a new size
    pub fn recreate_storage(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> RenderResult<()> {
        self.destroy(driver);
        self.id = driver.create_renderbuffer()?;
        driver.renderbuffer_storage(self.id, format, width, height);
        self.width = width;
        self.height = height;
        self.format = format;
        Ok(())
    }

    /// Release the driver renderbuffer
    pub fn destroy(&mut self, driver: &mut dyn GraphicsDriver) {
        if self.is_loaded() {
            driver.delete_renderbuffer(self.id);
            self.id = 0;
        }
    }

    /// Whether the driver renderbuffer is alive
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
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Storage format
    pub fn format(&self) -> TextureFormat {
        self.format
    }
}
