//! Framebuffer objects and their attachments
//!
//! A [`FramebufferObject`] owns up to `max_color_attachments` render targets
//! at indexed color slots plus at most one depth target. Edits (attach,
//! detach, reload) are only legal while the framebuffer is the one bound on
//! the driver; anything else is reported as
//! [`RenderError::FramebufferNotBound`].
//!
//! ## Attachment lifecycle
//!
//! ```text
//! new() -> bind -> new_attachment/set_depth -> check_status
//!       -> [clear / draw / blit / read_pixels]*
//!       -> resize (recreates every target) -> destroy
//! ```
//!
//! Storage of a render target is immutable once allocated, so a resize
//! destroys and reallocates every attachment and re-attaches the new driver
//! objects.

use std::collections::BTreeMap;

use crate::render::driver::{
    AttachmentPoint, ClearMask, FramebufferStatus, GraphicsDriver, ObjectId, TextureFormat,
};
use crate::render::resources::{RenderBuffer, RenderTexture};
use crate::render::{RenderError, RenderResult};

/// Storage kind for a new attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Sampleable render texture
    Texture,
    /// Non-sampleable renderbuffer
    Buffer,
}

/// Image attached to a framebuffer slot
#[derive(Debug)]
pub enum RenderTarget {
    /// Sampleable texture
    Texture(RenderTexture),
    /// Renderbuffer
    Buffer(RenderBuffer),
}

impl RenderTarget {
    /// Allocate a target of the given kind
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        kind: TargetKind,
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: TextureFormat,
        mipmaps: bool,
    ) -> RenderResult<Self> {
        Ok(match kind {
            TargetKind::Texture => {
                Self::Texture(RenderTexture::new(driver, name, width, height, format, mipmaps)?)
            }
            TargetKind::Buffer => Self::Buffer(RenderBuffer::new(driver, name, width, height, format)?),
        })
    }

    /// Storage kind
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Texture(_) => TargetKind::Texture,
            Self::Buffer(_) => TargetKind::Buffer,
        }
    }

    /// Driver name
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Texture(t) => t.id(),
            Self::Buffer(b) => b.id(),
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        match self {
            Self::Texture(t) => t.width(),
            Self::Buffer(b) => b.width(),
        }
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        match self {
            Self::Texture(t) => t.height(),
            Self::Buffer(b) => b.height(),
        }
    }

    /// Storage format
    pub fn format(&self) -> TextureFormat {
        match self {
            Self::Texture(t) => t.format(),
            Self::Buffer(b) => b.format(),
        }
    }

    /// The texture, when this target is sampleable
    pub fn as_texture(&self) -> Option<&RenderTexture> {
        match self {
            Self::Texture(t) => Some(t),
            Self::Buffer(_) => None,
        }
    }

    fn recreate_storage(&mut self, driver: &mut dyn GraphicsDriver, width: u32, height: u32) -> RenderResult<()> {
        match self {
            Self::Texture(t) => {
                let format = t.format();
                t.recreate_storage(driver, width, height, format, None)
            }
            Self::Buffer(b) => {
                let format = b.format();
                b.recreate_storage(driver, width, height, format)
            }
        }
    }

    fn attach(&self, driver: &mut dyn GraphicsDriver, point: AttachmentPoint) {
        match self {
            Self::Texture(t) => driver.attach_texture(point, Some(t.id())),
            Self::Buffer(b) => driver.attach_renderbuffer(point, Some(b.id())),
        }
    }

    fn detach(&self, driver: &mut dyn GraphicsDriver, point: AttachmentPoint) {
        match self {
            Self::Texture(_) => driver.attach_texture(point, None),
            Self::Buffer(_) => driver.attach_renderbuffer(point, None),
        }
    }

    /// Release the driver object
    pub fn destroy(&mut self, driver: &mut dyn GraphicsDriver) {
        match self {
            Self::Texture(t) => t.destroy(driver),
            Self::Buffer(b) => b.destroy(driver),
        }
    }
}

/// How a framebuffer is sized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferSize {
    /// Fixed dimensions
    Fixed {
        /// Width in pixels
        width: u32,
        /// Height in pixels
        height: u32,
    },
    /// Tracks the viewport
    Fullscreen,
}

/// Framebuffer with indexed color attachments and one depth attachment
#[derive(Debug)]
pub struct FramebufferObject {
    name: String,
    id: ObjectId,
    size: FramebufferSize,
    width: u32,
    height: u32,
    attachments: BTreeMap<u32, RenderTarget>,
    depth: Option<RenderTarget>,
    attachment_order: Vec<u32>,
    clear_mask: ClearMask,
}

impl FramebufferObject {
    /// Create an empty framebuffer
    ///
    /// `viewport` supplies the dimensions of a fullscreen framebuffer.
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        name: impl Into<String>,
        size: FramebufferSize,
        viewport: (u32, u32),
    ) -> RenderResult<Self> {
        let id = driver.create_framebuffer()?;
        let (width, height) = match size {
            FramebufferSize::Fixed { width, height } => (width, height),
            FramebufferSize::Fullscreen => viewport,
        };
        Ok(Self {
            name: name.into(),
            id,
            size,
            width,
            height,
            attachments: BTreeMap::new(),
            depth: None,
            attachment_order: Vec::new(),
            clear_mask: ClearMask::COLOR,
        })
    }

    /// Make this the current framebuffer
    pub fn bind(&self, driver: &mut dyn GraphicsDriver) {
        driver.bind_framebuffer(Some(self.id));
    }

    /// Restore the default framebuffer
    pub fn unbind(&self, driver: &mut dyn GraphicsDriver) {
        driver.bind_framebuffer(None);
    }

    /// Whether this framebuffer is the current one
    pub fn is_bound(&self, driver: &dyn GraphicsDriver) -> bool {
        self.id != 0 && driver.bound_framebuffer() == Some(self.id)
    }

    fn ensure_bound(&self, driver: &dyn GraphicsDriver, operation: &'static str) -> RenderResult<()> {
        if self.is_bound(driver) {
            Ok(())
        } else {
            Err(RenderError::FramebufferNotBound { name: self.name.clone(), operation })
        }
    }

    fn refresh_draw_buffers(&mut self, driver: &mut dyn GraphicsDriver) {
        self.attachment_order = self.attachments.keys().copied().collect();
        driver.set_draw_buffers(&self.attachment_order);
    }

    fn check_color_slot(&self, driver: &dyn GraphicsDriver, index: u32, format: TextureFormat) -> RenderResult<()> {
        self.ensure_bound(driver, "attaching")?;
        let max = driver.max_color_attachments();
        if index >= max {
            return Err(RenderError::AttachmentOutOfRange { index, max });
        }
        if format.is_depth() {
            return Err(RenderError::InvalidFormat { format, usage: "color attachment" });
        }
        Ok(())
    }

    fn check_target(&self, driver: &dyn GraphicsDriver, index: u32, target: &RenderTarget) -> RenderResult<()> {
        self.check_color_slot(driver, index, target.format())?;
        if (target.width(), target.height()) != (self.width, self.height) {
            return Err(RenderError::AttachmentSizeMismatch {
                name: self.name.clone(),
                width: target.width(),
                height: target.height(),
                expected_width: self.width,
                expected_height: self.height,
            });
        }
        Ok(())
    }

    /// Store a target at a color slot, replacing (and destroying) any previous one
    ///
    /// The target must match the framebuffer size. A rejected target is
    /// destroyed.
    pub fn set_attachment(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        index: u32,
        mut target: RenderTarget,
    ) -> RenderResult<()> {
        if let Err(error) = self.check_target(driver, index, &target) {
            target.destroy(driver);
            return Err(error);
        }

        target.attach(driver, AttachmentPoint::Color(index));
        if let Some(mut previous) = self.attachments.insert(index, target) {
            previous.destroy(driver);
        }
        self.refresh_draw_buffers(driver);
        Ok(())
    }

    /// Allocate a target at the framebuffer size and attach it
    pub fn new_attachment(
        &mut self,
        driver: &mut dyn GraphicsDriver,
        index: u32,
        kind: TargetKind,
        name: &str,
        format: TextureFormat,
        mipmaps: bool,
    ) -> RenderResult<()> {
        self.check_color_slot(driver, index, format)?;
        let target = RenderTarget::new(driver, kind, name, self.width, self.height, format, mipmaps)?;
        self.set_attachment(driver, index, target)
    }

    /// Detach and destroy the target at a color slot
    ///
    /// Returns whether a target was present.
    pub fn remove_attachment(&mut self, driver: &mut dyn GraphicsDriver, index: u32) -> RenderResult<bool> {
        self.ensure_bound(driver, "detaching")?;
        let Some(mut target) = self.attachments.remove(&index) else {
            return Ok(false);
        };
        target.detach(driver, AttachmentPoint::Color(index));
        target.destroy(driver);
        self.refresh_draw_buffers(driver);
        Ok(true)
    }

    /// Replace the depth attachment
    ///
    /// The clear mask follows the format: depth-stencil formats clear both.
    pub fn set_depth(&mut self, driver: &mut dyn GraphicsDriver, kind: TargetKind, format: TextureFormat) -> RenderResult<()> {
        self.ensure_bound(driver, "attaching depth")?;
        if !format.is_depth() {
            return Err(RenderError::InvalidFormat { format, usage: "depth attachment" });
        }
        self.remove_depth(driver)?;

        let name = format!("{}_depth", self.name);
        let target = RenderTarget::new(driver, kind, name, self.width, self.height, format, false)?;
        target.attach(driver, AttachmentPoint::for_depth(format));
        self.depth = Some(target);
        self.clear_mask = ClearMask::COLOR | format.depth_clear_mask();
        Ok(())
    }

    /// Detach and destroy the depth attachment
    pub fn remove_depth(&mut self, driver: &mut dyn GraphicsDriver) -> RenderResult<bool> {
        self.ensure_bound(driver, "detaching depth")?;
        let Some(mut depth) = self.depth.take() else {
            return Ok(false);
        };
        depth.detach(driver, AttachmentPoint::for_depth(depth.format()));
        depth.destroy(driver);
        self.clear_mask = ClearMask::COLOR;
        Ok(true)
    }

    /// Recreate every color target at the current size and re-attach
    pub fn reload_attachments(&mut self, driver: &mut dyn GraphicsDriver) -> RenderResult<()> {
        self.ensure_bound(driver, "reloading attachments")?;
        for (index, target) in &mut self.attachments {
            target.recreate_storage(driver, self.width, self.height)?;
            target.attach(driver, AttachmentPoint::Color(*index));
        }
        self.refresh_draw_buffers(driver);
        Ok(())
    }

    /// Recreate the depth target at the current size and re-attach
    pub fn reload_depth(&mut self, driver: &mut dyn GraphicsDriver) -> RenderResult<()> {
        self.ensure_bound(driver, "reloading depth")?;
        if let Some(depth) = &mut self.depth {
            depth.recreate_storage(driver, self.width, self.height)?;
            depth.attach(driver, AttachmentPoint::for_depth(depth.format()));
        }
        Ok(())
    }

    /// Change dimensions, rebuilding every attachment
    ///
    /// Binds the framebuffer for the rebuild and leaves the default one bound,
    /// also on failure. A failed rebuild keeps the new size with the failing
    /// target unloaded; [`Self::reload_attachments`] and
    /// [`Self::reload_depth`] retry it.
    pub fn resize(&mut self, driver: &mut dyn GraphicsDriver, width: u32, height: u32) -> RenderResult<()> {
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.width = width;
        self.height = height;
        if let FramebufferSize::Fixed { .. } = self.size {
            self.size = FramebufferSize::Fixed { width, height };
        }

        self.bind(driver);
        let rebuilt = self.reload_attachments(driver).and_then(|()| self.reload_depth(driver));
        if rebuilt.is_ok() {
            self.check_status(driver);
        }
        self.unbind(driver);
        match rebuilt {
            Ok(()) => log::debug!("Framebuffer '{}' resized to {}x{}", self.name, width, height),
            Err(ref e) => log::error!("Framebuffer '{}' resize to {}x{} failed: {}", self.name, width, height, e),
        }
        rebuilt
    }

    /// Follow a viewport change; fixed-size framebuffers ignore it
    pub fn on_viewport_resize(&mut self, driver: &mut dyn GraphicsDriver, width: u32, height: u32) -> RenderResult<()> {
        match self.size {
            FramebufferSize::Fullscreen => self.resize(driver, width, height),
            FramebufferSize::Fixed { .. } => Ok(()),
        }
    }

    /// Query completeness of the bound framebuffer; logs the reason on failure
    pub fn check_status(&self, driver: &dyn GraphicsDriver) -> bool {
        if !self.is_bound(driver) {
            log::error!("Framebuffer '{}' checked while not bound", self.name);
            return false;
        }
        match driver.framebuffer_status() {
            FramebufferStatus::Complete => true,
            FramebufferStatus::Incomplete(reason) => {
                log::error!("Framebuffer '{}' is incomplete: {}", self.name, reason);
                false
            }
        }
    }

    /// Bind and clear every buffer selected by the depth format
    pub fn clear_buffers(&self, driver: &mut dyn GraphicsDriver, color: [f32; 4]) {
        self.bind(driver);
        driver.clear(self.clear_mask, color, 1.0);
    }

    /// GPU copy of one color attachment into another framebuffer
    pub fn blit_color(
        &self,
        driver: &mut dyn GraphicsDriver,
        dest: &FramebufferObject,
        src_index: u32,
        dst_index: u32,
    ) -> RenderResult<()> {
        let src = self.attachment_or_err(src_index)?;
        let dst = dest.attachment_or_err(dst_index)?;
        Self::check_blit_compatible(src, dst)?;
        driver.blit_framebuffer(self.id, dest.id, src_index, dst_index, src.width(), src.height(), ClearMask::COLOR);
        Ok(())
    }

    /// GPU copy of the depth attachment into another framebuffer
    pub fn blit_depth(&self, driver: &mut dyn GraphicsDriver, dest: &FramebufferObject) -> RenderResult<()> {
        let src = self.depth.as_ref().ok_or_else(|| RenderError::MissingDepth(self.name.clone()))?;
        let dst = dest.depth.as_ref().ok_or_else(|| RenderError::MissingDepth(dest.name.clone()))?;
        Self::check_blit_compatible(src, dst)?;
        driver.blit_framebuffer(self.id, dest.id, 0, 0, src.width(), src.height(), src.format().depth_clear_mask());
        Ok(())
    }

    fn check_blit_compatible(src: &RenderTarget, dst: &RenderTarget) -> RenderResult<()> {
        if src.format() != dst.format() {
            return Err(RenderError::BlitFormatMismatch { src: src.format(), dst: dst.format() });
        }
        if (src.width(), src.height()) != (dst.width(), dst.height()) {
            return Err(RenderError::BlitSizeMismatch {
                src_width: src.width(),
                src_height: src.height(),
                dst_width: dst.width(),
                dst_height: dst.height(),
            });
        }
        Ok(())
    }

    fn attachment_or_err(&self, index: u32) -> RenderResult<&RenderTarget> {
        self.attachments
            .get(&index)
            .ok_or_else(|| RenderError::MissingAttachment { name: self.name.clone(), index })
    }

    fn in_bounds(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        width > 0
            && height > 0
            && x.checked_add(width).is_some_and(|end| end <= self.width)
            && y.checked_add(height).is_some_and(|end| end <= self.height)
    }

    /// Synchronous readback of a region of one color attachment
    ///
    /// Stalls until the GPU has finished writing the region, so call it at
    /// most once per frame. An out-of-range region yields an empty buffer.
    pub fn read_pixels(
        &self,
        driver: &mut dyn GraphicsDriver,
        index: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> RenderResult<Vec<u8>> {
        let target = self.attachment_or_err(index)?;
        if !self.in_bounds(x, y, width, height) {
            return Ok(Vec::new());
        }
        Ok(driver.read_pixels(self.id, AttachmentPoint::Color(index), x, y, width, height, target.format()))
    }

    /// Depth value under one pixel, `None` when out of range
    pub fn read_depth(&self, driver: &mut dyn GraphicsDriver, x: u32, y: u32) -> RenderResult<Option<f32>> {
        let depth = self.depth.as_ref().ok_or_else(|| RenderError::MissingDepth(self.name.clone()))?;
        if !self.in_bounds(x, y, 1, 1) {
            return Ok(None);
        }
        let format = depth.format();
        let bytes = driver.read_pixels(self.id, AttachmentPoint::for_depth(format), x, y, 1, 1, format);
        let Ok(raw) = <[u8; 4]>::try_from(bytes.as_slice()) else {
            return Ok(None);
        };
        let value = if format.has_stencil() {
            (u32::from_le_bytes(raw) >> 8) as f32 / 16_777_215.0
        } else {
            f32::from_le_bytes(raw)
        };
        Ok(Some(value))
    }

    /// Release every attachment and the framebuffer itself
    pub fn destroy(&mut self, driver: &mut dyn GraphicsDriver) {
        for (_, mut target) in std::mem::take(&mut self.attachments) {
            target.destroy(driver);
        }
        if let Some(mut depth) = self.depth.take() {
            depth.destroy(driver);
        }
        self.attachment_order.clear();
        if self.id != 0 {
            driver.delete_framebuffer(self.id);
            self.id = 0;
        }
    }

    /// Whether the driver framebuffer is alive
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

    /// Sizing policy
    pub fn size(&self) -> FramebufferSize {
        self.size
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Target at a color slot
    pub fn attachment(&self, index: u32) -> Option<&RenderTarget> {
        self.attachments.get(&index)
    }

    /// Number of color attachments
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// Depth target
    pub fn depth(&self) -> Option<&RenderTarget> {
        self.depth.as_ref()
    }

    /// Color slots in draw-buffer order
    pub fn attachment_order(&self) -> &[u32] {
        &self.attachment_order
    }

    /// Buffers cleared by [`Self::clear_buffers`]
    pub fn clear_mask(&self) -> ClearMask {
        self.clear_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DriverCall, HeadlessDriver};

    fn fbo(driver: &mut HeadlessDriver, width: u32, height: u32) -> FramebufferObject {
        FramebufferObject::new(driver, "test", FramebufferSize::Fixed { width, height }, (0, 0)).unwrap()
    }

    #[test]
    fn test_edit_requires_binding() {
        let mut driver = HeadlessDriver::new();
        let mut fbo = fbo(&mut driver, 4, 4);
        let result = fbo.new_attachment(&mut driver, 0, TargetKind::Texture, "color", TextureFormat::Rgba8, false);
        assert!(matches!(result, Err(RenderError::FramebufferNotBound { .. })));
    }

    #[test]
    fn test_attachment_index_bounded_by_driver() {
        let mut driver = HeadlessDriver::new().with_max_color_attachments(2);
        let mut fbo = fbo(&mut driver, 4, 4);
        fbo.bind(&mut driver);
        let result = fbo.new_attachment(&mut driver, 2, TargetKind::Texture, "color", TextureFormat::Rgba8, false);
        assert!(matches!(result, Err(RenderError::AttachmentOutOfRange { index: 2, max: 2 })));
    }

    #[test]
    fn test_attachment_order_and_draw_buffers() {
        let mut driver = HeadlessDriver::new();
        let mut fbo = fbo(&mut driver, 4, 4);
        fbo.bind(&mut driver);
        fbo.new_attachment(&mut driver, 2, TargetKind::Texture, "b", TextureFormat::Rgba8, false).unwrap();
        fbo.new_attachment(&mut driver, 0, TargetKind::Buffer, "a", TextureFormat::Rgba8, false).unwrap();
        assert_eq!(fbo.attachment_order(), &[0, 2]);
        assert_eq!(driver.calls().last(), Some(&DriverCall::DrawBuffers(vec![0, 2])));

        assert!(fbo.remove_attachment(&mut driver, 2).unwrap());
        assert!(!fbo.remove_attachment(&mut driver, 2).unwrap());
        assert_eq!(fbo.attachment_order(), &[0]);
        assert!(fbo.check_status(&driver));
    }

    #[test]
    fn test_depth_format_drives_clear_mask() {
        let mut driver = HeadlessDriver::new();
        let mut fbo = fbo(&mut driver, 4, 4);
        fbo.bind(&mut driver);
        fbo.set_depth(&mut driver, TargetKind::Buffer, TextureFormat::Depth24).unwrap();
        assert_eq!(fbo.clear_mask(), ClearMask::COLOR | ClearMask::DEPTH);

        fbo.set_depth(&mut driver, TargetKind::Buffer, TextureFormat::Depth24Stencil8).unwrap();
        assert_eq!(fbo.clear_mask(), ClearMask::all());
        assert_eq!(driver.live_object_count(), 2);

        assert!(fbo.set_depth(&mut driver, TargetKind::Buffer, TextureFormat::Rgba8).is_err());
    }

    #[test]
    fn test_blit_rejects_size_and_format_mismatch() {
        let mut driver = HeadlessDriver::new();
        let mut a = fbo(&mut driver, 4, 4);
        a.bind(&mut driver);
        a.new_attachment(&mut driver, 0, TargetKind::Texture, "a", TextureFormat::Rgba8, false).unwrap();

        let mut b = fbo(&mut driver, 8, 8);
        b.bind(&mut driver);
        b.new_attachment(&mut driver, 0, TargetKind::Texture, "b", TextureFormat::Rgba8, false).unwrap();
        b.new_attachment(&mut driver, 1, TargetKind::Texture, "c", TextureFormat::Rgba32F, false).unwrap();

        assert!(matches!(a.blit_color(&mut driver, &b, 0, 0), Err(RenderError::BlitSizeMismatch { .. })));
        b.resize(&mut driver, 4, 4).unwrap();
        assert!(matches!(a.blit_color(&mut driver, &b, 0, 1), Err(RenderError::BlitFormatMismatch { .. })));
        assert!(a.blit_color(&mut driver, &b, 0, 0).is_ok());
        assert!(matches!(a.blit_depth(&mut driver, &b), Err(RenderError::MissingDepth(_))));
    }

    #[test]
    fn test_resize_recreates_targets() {
        let mut driver = HeadlessDriver::new();
        let mut fbo = FramebufferObject::new(&mut driver, "screen", FramebufferSize::Fullscreen, (4, 4)).unwrap();
        fbo.bind(&mut driver);
        fbo.new_attachment(&mut driver, 0, TargetKind::Texture, "color", TextureFormat::Rgba8, false).unwrap();
        fbo.set_depth(&mut driver, TargetKind::Texture, TextureFormat::Depth32F).unwrap();
        let old = fbo.attachment(0).unwrap().id();

        fbo.on_viewport_resize(&mut driver, 16, 8).unwrap();
        let color = fbo.attachment(0).unwrap();
        assert_ne!(color.id(), old);
        assert_eq!((color.width(), color.height()), (16, 8));
        assert_eq!(fbo.depth().unwrap().width(), 16);
        assert_eq!(driver.bound_framebuffer(), None);
    }

    #[test]
    fn test_rejected_target_is_destroyed() {
        let mut driver = HeadlessDriver::new().with_max_color_attachments(2);
        let mut fbo = fbo(&mut driver, 4, 4);
        let before = driver.live_object_count();

        let target = RenderTarget::new(&mut driver, TargetKind::Texture, "far", 4, 4, TextureFormat::Rgba8, false).unwrap();
        let result = fbo.set_attachment(&mut driver, 0, target);
        assert!(matches!(result, Err(RenderError::FramebufferNotBound { .. })));
        assert_eq!(driver.live_object_count(), before);

        fbo.bind(&mut driver);
        let target = RenderTarget::new(&mut driver, TargetKind::Texture, "far", 4, 4, TextureFormat::Rgba8, false).unwrap();
        let result = fbo.set_attachment(&mut driver, 5, target);
        assert!(matches!(result, Err(RenderError::AttachmentOutOfRange { index: 5, max: 2 })));
        assert_eq!(driver.live_object_count(), before);

        let target = RenderTarget::new(&mut driver, TargetKind::Buffer, "depth", 4, 4, TextureFormat::Depth24, false).unwrap();
        assert!(fbo.set_attachment(&mut driver, 0, target).is_err());
        assert_eq!(driver.live_object_count(), before);
        assert!(fbo.attachment(0).is_none());
    }

    #[test]
    fn test_target_size_must_match() {
        let mut driver = HeadlessDriver::new();
        let mut fbo = fbo(&mut driver, 4, 4);
        fbo.bind(&mut driver);
        let before = driver.live_object_count();

        let target = RenderTarget::new(&mut driver, TargetKind::Texture, "big", 8, 4, TextureFormat::Rgba8, false).unwrap();
        let result = fbo.set_attachment(&mut driver, 0, target);
        assert!(matches!(
            result,
            Err(RenderError::AttachmentSizeMismatch { width: 8, height: 4, expected_width: 4, expected_height: 4, .. })
        ));
        assert_eq!(driver.live_object_count(), before);

        let target = RenderTarget::new(&mut driver, TargetKind::Texture, "fit", 4, 4, TextureFormat::Rgba8, false).unwrap();
        assert!(fbo.set_attachment(&mut driver, 0, target).is_ok());
    }

    #[test]
    fn test_failed_resize_unbinds_and_can_retry() {
        let mut driver = HeadlessDriver::new();
        let mut fbo = fbo(&mut driver, 4, 4);
        fbo.bind(&mut driver);
        fbo.new_attachment(&mut driver, 0, TargetKind::Texture, "color", TextureFormat::Rgba8, false).unwrap();
        fbo.unbind(&mut driver);

        driver.fail_next_create();
        assert!(matches!(fbo.resize(&mut driver, 8, 8), Err(RenderError::ObjectCreation { .. })));
        assert_eq!(driver.bound_framebuffer(), None);
        assert_eq!((fbo.width(), fbo.height()), (8, 8));

        fbo.bind(&mut driver);
        fbo.reload_attachments(&mut driver).unwrap();
        let color = fbo.attachment(0).unwrap();
        assert_eq!((color.width(), color.height()), (8, 8));
        assert!(driver.texture_exists(color.id()));
    }

    #[test]
    fn test_read_pixels_out_of_range_is_empty() {
        let mut driver = HeadlessDriver::new();
        let mut fbo = fbo(&mut driver, 4, 4);
        fbo.bind(&mut driver);
        fbo.new_attachment(&mut driver, 0, TargetKind::Texture, "color", TextureFormat::Rgba8, false).unwrap();
        fbo.clear_buffers(&mut driver, [0.0, 0.0, 1.0, 1.0]);

        assert_eq!(fbo.read_pixels(&mut driver, 0, 3, 3, 1, 1).unwrap(), vec![0, 0, 255, 255]);
        assert!(fbo.read_pixels(&mut driver, 0, 4, 0, 1, 1).unwrap().is_empty());
        assert!(fbo.read_pixels(&mut driver, 1, 0, 0, 1, 1).is_err());
    }

    #[test]
    fn test_read_depth_after_clear() {
        let mut driver = HeadlessDriver::new();
        let mut fbo = fbo(&mut driver, 2, 2);
        fbo.bind(&mut driver);
        fbo.new_attachment(&mut driver, 0, TargetKind::Texture, "color", TextureFormat::Rgba8, false).unwrap();
        fbo.set_depth(&mut driver, TargetKind::Texture, TextureFormat::Depth32F).unwrap();
        fbo.clear_buffers(&mut driver, [0.0; 4]);

        assert_eq!(fbo.read_depth(&mut driver, 1, 1).unwrap(), Some(1.0));
        assert_eq!(fbo.read_depth(&mut driver, 2, 0).unwrap(), None);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut driver = HeadlessDriver::new();
        let mut fbo = fbo(&mut driver, 2, 2);
        fbo.bind(&mut driver);
        fbo.new_attachment(&mut driver, 0, TargetKind::Texture, "color", TextureFormat::Rgba8, false).unwrap();
        fbo.set_depth(&mut driver, TargetKind::Buffer, TextureFormat::Depth24).unwrap();
        fbo.destroy(&mut driver);
        assert_eq!(driver.live_object_count(), 0);
        assert!(!fbo.is_loaded());
    }
}
