//! Headless recording driver
//!
//! Simulates the object model of the graphics API closely enough for the
//! render core to be exercised without a GPU:
//!
//! - object names are allocated from one counter and never reused
//! - texture and renderbuffer storage is kept as CPU byte arrays, so clears,
//!   blits and readback behave like the real thing for 8-bit and float formats
//! - a shader whose source contains `#error` fails to compile, mirroring the
//!   GLSL preprocessor directive
//! - a framebuffer is complete when it has at least one attachment and all
//!   attachments share one size
//! - draws perform flat-fill rasterization: when the current program has a
//!   `vec4` uniform named [`HeadlessDriver::FLAT_COLOR_UNIFORM`], color
//!   attachment 0 of the bound framebuffer is filled with that color inside
//!   the current viewport
//!
//! Every call is appended to a log of [`DriverCall`]s that tests inspect.

use std::collections::{BTreeMap, HashMap};

use crate::render::driver::{
    AttachmentPoint, BlendFunc, ClearMask, CubeFace, CullMode, DepthFunc, FramebufferStatus,
    GraphicsDriver, ObjectId, PrimitiveMode, ShaderStage, TextureDesc, TextureFormat,
    TextureTarget, UniformValue, VertexLayout,
};
use crate::render::{RenderError, RenderResult};

/// One recorded driver call
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    /// Object created
    Create {
        /// Object kind
        kind: &'static str,
        /// New name
        id: ObjectId,
    },
    /// Object deleted
    Delete {
        /// Object kind
        kind: &'static str,
        /// Deleted name
        id: ObjectId,
    },
    /// Texture storage (re)allocated
    TextureStorage {
        /// Texture name
        id: ObjectId,
        /// Width
        width: u32,
        /// Height
        height: u32,
        /// Format
        format: TextureFormat,
    },
    /// Texture bound to a unit
    BindTexture {
        /// Texture unit
        unit: u32,
        /// Bound name
        texture: Option<ObjectId>,
    },
    /// Framebuffer bound
    BindFramebuffer(Option<ObjectId>),
    /// Attachment changed on the bound framebuffer
    Attach {
        /// Framebuffer name
        framebuffer: ObjectId,
        /// Attachment point
        point: AttachmentPoint,
        /// Attached name, `None` for detach
        object: Option<ObjectId>,
    },
    /// Draw-buffer configuration issued
    DrawBuffers(Vec<u32>),
    /// Clear issued
    Clear {
        /// Bound framebuffer
        framebuffer: Option<ObjectId>,
        /// Cleared buffers
        mask: ClearMask,
    },
    /// Blit issued
    Blit {
        /// Source framebuffer
        src: ObjectId,
        /// Destination framebuffer
        dst: ObjectId,
        /// Copied buffers
        mask: ClearMask,
    },
    /// Pixel readback issued
    ReadPixels {
        /// Framebuffer read from
        framebuffer: ObjectId,
        /// Region width
        width: u32,
        /// Region height
        height: u32,
    },
    /// Program made current
    UseProgram(Option<ObjectId>),
    /// Uniform written
    SetUniform {
        /// Program name
        program: ObjectId,
        /// Uniform name
        name: String,
        /// Written value
        value: UniformValue,
    },
    /// Vertex array bound
    BindVertexArray(Option<ObjectId>),
    /// Draw issued
    Draw {
        /// Current program
        program: Option<ObjectId>,
        /// Bound vertex array
        vao: Option<ObjectId>,
        /// Primitive mode
        mode: PrimitiveMode,
        /// Vertex or index count
        count: u32,
        /// Instance count (1 for plain draws)
        instances: u32,
        /// Indexed draw
        indexed: bool,
    },
    /// Culling changed
    SetCullMode(CullMode),
    /// Blending changed
    SetBlend {
        /// Target draw buffer
        attachment: Option<u32>,
        /// Function, `None` disables
        func: Option<BlendFunc>,
    },
    /// Depth state changed
    SetDepthState {
        /// Depth test
        test: bool,
        /// Depth writes
        write: bool,
        /// Comparison
        func: DepthFunc,
    },
    /// Wireframe toggled
    SetWireframe(bool),
    /// Viewport changed
    SetViewport {
        /// Width
        width: u32,
        /// Height
        height: u32,
    },
}

#[derive(Debug, Default)]
struct SimTexture {
    width: u32,
    height: u32,
    format: Option<TextureFormat>,
    pixels: Vec<u8>,
}

impl SimTexture {
    fn allocate(&mut self, width: u32, height: u32, format: TextureFormat) {
        self.width = width;
        self.height = height;
        self.format = Some(format);
        self.pixels = vec![0; width as usize * height as usize * format.bytes_per_pixel()];
    }

    fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, value: &[u8]) {
        let Some(format) = self.format else { return };
        let bpp = format.bytes_per_pixel();
        if value.len() != bpp {
            return;
        }
        for y in y0.min(self.height)..y1.min(self.height) {
            for x in x0.min(self.width)..x1.min(self.width) {
                let offset = (y as usize * self.width as usize + x as usize) * bpp;
                self.pixels[offset..offset + bpp].copy_from_slice(value);
            }
        }
    }

    fn fill(&mut self, value: &[u8]) {
        let (w, h) = (self.width, self.height);
        self.fill_rect(0, 0, w, h, value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SimAttachment {
    Texture(ObjectId),
    Renderbuffer(ObjectId),
}

#[derive(Debug, Default)]
struct SimFramebuffer {
    attachments: BTreeMap<AttachmentPoint, SimAttachment>,
    draw_buffers: Vec<u32>,
}

#[derive(Debug)]
struct SimShader {
    compiled: bool,
}

#[derive(Debug, Default)]
struct SimProgram {
    shaders: Vec<ObjectId>,
    linked: bool,
    uniforms: HashMap<String, UniformValue>,
}

/// In-memory recording driver
pub struct HeadlessDriver {
    next_id: ObjectId,
    max_color_attachments: u32,
    calls: Vec<DriverCall>,

    textures: HashMap<ObjectId, SimTexture>,
    renderbuffers: HashMap<ObjectId, SimTexture>,
    framebuffers: HashMap<ObjectId, SimFramebuffer>,
    vertex_arrays: HashMap<ObjectId, Vec<ObjectId>>,
    buffers: HashMap<ObjectId, usize>,
    shaders: HashMap<ObjectId, SimShader>,
    programs: HashMap<ObjectId, SimProgram>,
    queries: HashMap<ObjectId, u64>,

    bound_framebuffer: Option<ObjectId>,
    bound_textures: HashMap<u32, ObjectId>,
    current_program: Option<ObjectId>,
    bound_vao: Option<ObjectId>,
    viewport: (u32, u32, u32, u32),
    active_query: Option<ObjectId>,
    fail_next_create: bool,
}

impl HeadlessDriver {
    /// Uniform used for flat-fill rasterization
    pub const FLAT_COLOR_UNIFORM: &'static str = "u_color_id";

    /// Create a driver advertising eight color attachments
    pub fn new() -> Self {
        Self {
            next_id: 1,
            max_color_attachments: 8,
            calls: Vec::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            queries: HashMap::new(),
            bound_framebuffer: None,
            bound_textures: HashMap::new(),
            current_program: None,
            bound_vao: None,
            viewport: (0, 0, 0, 0),
            active_query: None,
            fail_next_create: false,
        }
    }

    /// Override the advertised color attachment limit
    pub fn with_max_color_attachments(mut self, max: u32) -> Self {
        self.max_color_attachments = max;
        self
    }

    /// Make the next `create_*` call fail, as a driver out of memory would
    pub fn fail_next_create(&mut self) {
        self.fail_next_create = true;
    }

    /// Recorded calls since creation or the last [`Self::clear_calls`]
    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    /// Forget recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Texture currently bound to a unit
    pub fn bound_texture(&self, unit: u32) -> Option<ObjectId> {
        self.bound_textures.get(&unit).copied()
    }

    /// Program currently in use
    pub fn current_program(&self) -> Option<ObjectId> {
        self.current_program
    }

    /// Last value written to a program uniform
    pub fn uniform(&self, program: ObjectId, name: &str) -> Option<UniformValue> {
        self.programs.get(&program)?.uniforms.get(name).copied()
    }

    /// Draw calls recorded so far
    pub fn draw_calls(&self) -> Vec<&DriverCall> {
        self.calls
            .iter()
            .filter(|call| matches!(call, DriverCall::Draw { .. }))
            .collect()
    }

    /// Number of live driver objects of every kind
    pub fn live_object_count(&self) -> usize {
        self.textures.len()
            + self.renderbuffers.len()
            + self.framebuffers.len()
            + self.vertex_arrays.len()
            + self.buffers.len()
            + self.shaders.len()
            + self.programs.len()
            + self.queries.len()
    }

    /// Number of live textures
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Whether a texture name is live
    pub fn texture_exists(&self, texture: ObjectId) -> bool {
        self.textures.contains_key(&texture)
    }

    /// Write one RGBA8 pixel straight into a texture, bypassing draws
    pub fn poke_pixel(&mut self, texture: ObjectId, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(tex) = self.textures.get_mut(&texture) {
            tex.fill_rect(x, y, x + 1, y + 1, &rgba);
        }
    }

    fn allocate(&mut self, kind: &'static str) -> RenderResult<ObjectId> {
        if self.fail_next_create {
            self.fail_next_create = false;
            return Err(RenderError::ObjectCreation {
                kind,
                reason: "simulated allocation failure".to_string(),
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        self.calls.push(DriverCall::Create { kind, id });
        Ok(id)
    }

    fn record_delete(&mut self, kind: &'static str, id: ObjectId) {
        self.calls.push(DriverCall::Delete { kind, id });
    }

    fn storage(&self, attachment: SimAttachment) -> Option<&SimTexture> {
        match attachment {
            SimAttachment::Texture(id) => self.textures.get(&id),
            SimAttachment::Renderbuffer(id) => self.renderbuffers.get(&id),
        }
    }

    fn storage_mut(&mut self, attachment: SimAttachment) -> Option<&mut SimTexture> {
        match attachment {
            SimAttachment::Texture(id) => self.textures.get_mut(&id),
            SimAttachment::Renderbuffer(id) => self.renderbuffers.get_mut(&id),
        }
    }

    fn attachment(&self, framebuffer: ObjectId, point: AttachmentPoint) -> Option<SimAttachment> {
        self.framebuffers.get(&framebuffer)?.attachments.get(&point).copied()
    }

    fn depth_attachment(&self, framebuffer: ObjectId) -> Option<SimAttachment> {
        self.attachment(framebuffer, AttachmentPoint::Depth)
            .or_else(|| self.attachment(framebuffer, AttachmentPoint::DepthStencil))
    }

    fn record_draw(&mut self, mode: PrimitiveMode, count: u32, instances: u32, indexed: bool) {
        self.calls.push(DriverCall::Draw {
            program: self.current_program,
            vao: self.bound_vao,
            mode,
            count,
            instances,
            indexed,
        });
        self.rasterize_flat_fill();
    }

    fn rasterize_flat_fill(&mut self) {
        let Some(program) = self.current_program else { return };
        let Some(UniformValue::Vec4(color)) = self.uniform(program, Self::FLAT_COLOR_UNIFORM) else {
            return;
        };
        let Some(framebuffer) = self.bound_framebuffer else { return };
        let Some(target) = self.attachment(framebuffer, AttachmentPoint::Color(0)) else { return };
        let (x, y, w, h) = self.viewport;
        if let Some(storage) = self.storage_mut(target) {
            if let Some(format) = storage.format {
                let value = encode_color(format, color);
                storage.fill_rect(x, y, x + w, y + h, &value);
            }
        }
    }
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_color(format: TextureFormat, color: [f32; 4]) -> Vec<u8> {
    let channels = format.channels() as usize;
    match format.default_pixel_type().size() {
        1 => color[..channels]
            .iter()
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect(),
        4 => color[..channels].iter().flat_map(|c| c.to_le_bytes()).collect(),
        size => vec![0; channels * size],
    }
}

fn encode_depth(format: TextureFormat, depth: f32) -> Vec<u8> {
    if format.has_stencil() {
        let packed = ((depth.clamp(0.0, 1.0) * 16_777_215.0) as u32) << 8;
        packed.to_le_bytes().to_vec()
    } else {
        depth.to_le_bytes().to_vec()
    }
}

impl GraphicsDriver for HeadlessDriver {
    fn name(&self) -> &str {
        "headless"
    }

    fn max_color_attachments(&self) -> u32 {
        self.max_color_attachments
    }

    fn create_texture(&mut self, _target: TextureTarget) -> RenderResult<ObjectId> {
        let id = self.allocate("texture")?;
        self.textures.insert(id, SimTexture::default());
        Ok(id)
    }

    fn upload_texture_2d(&mut self, texture: ObjectId, desc: &TextureDesc, data: Option<&[u8]>) {
        if let Some(tex) = self.textures.get_mut(&texture) {
            tex.allocate(desc.width, desc.height, desc.format);
            if let Some(bytes) = data {
                if bytes.len() == tex.pixels.len() {
                    tex.pixels.copy_from_slice(bytes);
                }
            }
            self.calls.push(DriverCall::TextureStorage {
                id: texture,
                width: desc.width,
                height: desc.height,
                format: desc.format,
            });
        }
    }

    fn upload_cubemap_face(&mut self, texture: ObjectId, _face: CubeFace, desc: &TextureDesc, _data: &[u8]) {
        if let Some(tex) = self.textures.get_mut(&texture) {
            tex.width = desc.width;
            tex.height = desc.height;
            tex.format = Some(desc.format);
        }
    }

    fn generate_mipmaps(&mut self, _texture: ObjectId, _target: TextureTarget) {}

    fn bind_texture(&mut self, unit: u32, _target: TextureTarget, texture: Option<ObjectId>) {
        match texture {
            Some(id) => self.bound_textures.insert(unit, id),
            None => self.bound_textures.remove(&unit),
        };
        self.calls.push(DriverCall::BindTexture { unit, texture });
    }

    fn delete_texture(&mut self, texture: ObjectId) {
        if self.textures.remove(&texture).is_some() {
            self.bound_textures.retain(|_, id| *id != texture);
            self.record_delete("texture", texture);
        }
    }

    fn create_renderbuffer(&mut self) -> RenderResult<ObjectId> {
        let id = self.allocate("renderbuffer")?;
        self.renderbuffers.insert(id, SimTexture::default());
        Ok(id)
    }

    fn renderbuffer_storage(&mut self, renderbuffer: ObjectId, format: TextureFormat, width: u32, height: u32) {
        if let Some(rb) = self.renderbuffers.get_mut(&renderbuffer) {
            rb.allocate(width, height, format);
        }
    }

    fn delete_renderbuffer(&mut self, renderbuffer: ObjectId) {
        if self.renderbuffers.remove(&renderbuffer).is_some() {
            self.record_delete("renderbuffer", renderbuffer);
        }
    }

    fn create_framebuffer(&mut self) -> RenderResult<ObjectId> {
        let id = self.allocate("framebuffer")?;
        self.framebuffers.insert(id, SimFramebuffer::default());
        Ok(id)
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<ObjectId>) {
        self.bound_framebuffer = framebuffer;
        self.calls.push(DriverCall::BindFramebuffer(framebuffer));
    }

    fn bound_framebuffer(&self) -> Option<ObjectId> {
        self.bound_framebuffer
    }

    fn attach_texture(&mut self, point: AttachmentPoint, texture: Option<ObjectId>) {
        let Some(framebuffer) = self.bound_framebuffer else { return };
        if let Some(fbo) = self.framebuffers.get_mut(&framebuffer) {
            match texture {
                Some(id) => fbo.attachments.insert(point, SimAttachment::Texture(id)),
                None => fbo.attachments.remove(&point),
            };
        }
        self.calls.push(DriverCall::Attach { framebuffer, point, object: texture });
    }

    fn attach_renderbuffer(&mut self, point: AttachmentPoint, renderbuffer: Option<ObjectId>) {
        let Some(framebuffer) = self.bound_framebuffer else { return };
        if let Some(fbo) = self.framebuffers.get_mut(&framebuffer) {
            match renderbuffer {
                Some(id) => fbo.attachments.insert(point, SimAttachment::Renderbuffer(id)),
                None => fbo.attachments.remove(&point),
            };
        }
        self.calls.push(DriverCall::Attach { framebuffer, point, object: renderbuffer });
    }

    fn set_draw_buffers(&mut self, color_attachments: &[u32]) {
        if let Some(fbo) = self
            .bound_framebuffer
            .and_then(|id| self.framebuffers.get_mut(&id))
        {
            fbo.draw_buffers = color_attachments.to_vec();
        }
        self.calls.push(DriverCall::DrawBuffers(color_attachments.to_vec()));
    }

    fn framebuffer_status(&self) -> FramebufferStatus {
        let Some(fbo) = self.bound_framebuffer.and_then(|id| self.framebuffers.get(&id)) else {
            return FramebufferStatus::Complete;
        };
        if fbo.attachments.is_empty() {
            return FramebufferStatus::Incomplete("missing attachment".to_string());
        }
        let mut sizes = fbo
            .attachments
            .values()
            .filter_map(|attachment| self.storage(*attachment))
            .map(|storage| (storage.width, storage.height));
        let Some(first) = sizes.next() else {
            return FramebufferStatus::Incomplete("attachment without storage".to_string());
        };
        if sizes.any(|size| size != first) {
            return FramebufferStatus::Incomplete("attachment dimensions differ".to_string());
        }
        FramebufferStatus::Complete
    }

    fn clear(&mut self, mask: ClearMask, color: [f32; 4], depth: f32) {
        self.calls.push(DriverCall::Clear { framebuffer: self.bound_framebuffer, mask });
        let Some(framebuffer) = self.bound_framebuffer else { return };
        let Some(fbo) = self.framebuffers.get(&framebuffer) else { return };

        let color_targets: Vec<SimAttachment> = if mask.contains(ClearMask::COLOR) {
            fbo.draw_buffers
                .iter()
                .filter_map(|index| fbo.attachments.get(&AttachmentPoint::Color(*index)).copied())
                .collect()
        } else {
            Vec::new()
        };
        let depth_target = if mask.contains(ClearMask::DEPTH) {
            self.depth_attachment(framebuffer)
        } else {
            None
        };

        for target in color_targets {
            if let Some(storage) = self.storage_mut(target) {
                if let Some(format) = storage.format {
                    storage.fill(&encode_color(format, color));
                }
            }
        }
        if let Some(target) = depth_target {
            if let Some(storage) = self.storage_mut(target) {
                if let Some(format) = storage.format {
                    storage.fill(&encode_depth(format, depth));
                }
            }
        }
    }

    fn blit_framebuffer(
        &mut self,
        src: ObjectId,
        dst: ObjectId,
        src_attachment: u32,
        dst_attachment: u32,
        _width: u32,
        _height: u32,
        mask: ClearMask,
    ) {
        self.calls.push(DriverCall::Blit { src, dst, mask });
        let pair = if mask.contains(ClearMask::COLOR) {
            (
                self.attachment(src, AttachmentPoint::Color(src_attachment)),
                self.attachment(dst, AttachmentPoint::Color(dst_attachment)),
            )
        } else {
            (self.depth_attachment(src), self.depth_attachment(dst))
        };
        if let (Some(from), Some(to)) = pair {
            let pixels = self.storage(from).map(|s| s.pixels.clone());
            if let (Some(pixels), Some(target)) = (pixels, self.storage_mut(to)) {
                if target.pixels.len() == pixels.len() {
                    target.pixels = pixels;
                }
            }
        }
        self.bound_framebuffer = None;
    }

    fn read_pixels(
        &mut self,
        framebuffer: ObjectId,
        point: AttachmentPoint,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Vec<u8> {
        self.calls.push(DriverCall::ReadPixels { framebuffer, width, height });
        let attachment = match point {
            AttachmentPoint::Color(_) => self.attachment(framebuffer, point),
            AttachmentPoint::Depth | AttachmentPoint::DepthStencil => self.depth_attachment(framebuffer),
        };
        let Some(storage) = attachment.and_then(|a| self.storage(a)) else {
            return Vec::new();
        };
        if storage.format != Some(format) {
            return Vec::new();
        }
        let bpp = format.bytes_per_pixel();
        let mut out = Vec::with_capacity(width as usize * height as usize * bpp);
        for row in y..y + height {
            let start = (row as usize * storage.width as usize + x as usize) * bpp;
            let end = start + width as usize * bpp;
            match storage.pixels.get(start..end) {
                Some(slice) => out.extend_from_slice(slice),
                None => return Vec::new(),
            }
        }
        out
    }

    fn delete_framebuffer(&mut self, framebuffer: ObjectId) {
        if self.framebuffers.remove(&framebuffer).is_some() {
            if self.bound_framebuffer == Some(framebuffer) {
                self.bound_framebuffer = None;
            }
            self.record_delete("framebuffer", framebuffer);
        }
    }

    fn create_vertex_array(&mut self) -> RenderResult<ObjectId> {
        let id = self.allocate("vertex_array")?;
        self.vertex_arrays.insert(id, Vec::new());
        Ok(id)
    }

    fn create_buffer(&mut self) -> RenderResult<ObjectId> {
        let id = self.allocate("buffer")?;
        self.buffers.insert(id, 0);
        Ok(id)
    }

    fn upload_vertex_buffer(&mut self, vao: ObjectId, buffer: ObjectId, data: &[f32], _layout: &VertexLayout) {
        if let Some(len) = self.buffers.get_mut(&buffer) {
            *len = std::mem::size_of_val(data);
        }
        if let Some(bound) = self.vertex_arrays.get_mut(&vao) {
            bound.push(buffer);
        }
    }

    fn upload_index_buffer(&mut self, vao: ObjectId, buffer: ObjectId, indices: &[u32]) {
        if let Some(len) = self.buffers.get_mut(&buffer) {
            *len = std::mem::size_of_val(indices);
        }
        if let Some(bound) = self.vertex_arrays.get_mut(&vao) {
            bound.push(buffer);
        }
    }

    fn upload_instance_buffer(&mut self, vao: ObjectId, buffer: ObjectId, matrices: &[f32], _first_location: u32) {
        if let Some(len) = self.buffers.get_mut(&buffer) {
            *len = std::mem::size_of_val(matrices);
        }
        if let Some(bound) = self.vertex_arrays.get_mut(&vao) {
            if !bound.contains(&buffer) {
                bound.push(buffer);
            }
        }
    }

    fn bind_vertex_array(&mut self, vao: Option<ObjectId>) {
        self.bound_vao = vao;
        self.calls.push(DriverCall::BindVertexArray(vao));
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, _first: u32, count: u32) {
        self.record_draw(mode, count, 1, false);
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32) {
        self.record_draw(mode, count, 1, true);
    }

    fn draw_arrays_instanced(&mut self, mode: PrimitiveMode, _first: u32, count: u32, instances: u32) {
        self.record_draw(mode, count, instances, false);
    }

    fn draw_elements_instanced(&mut self, mode: PrimitiveMode, count: u32, instances: u32) {
        self.record_draw(mode, count, instances, true);
    }

    fn delete_vertex_array(&mut self, vao: ObjectId) {
        if self.vertex_arrays.remove(&vao).is_some() {
            self.record_delete("vertex_array", vao);
        }
    }

    fn delete_buffer(&mut self, buffer: ObjectId) {
        if self.buffers.remove(&buffer).is_some() {
            self.record_delete("buffer", buffer);
        }
    }

    fn create_shader(&mut self, _stage: ShaderStage) -> RenderResult<ObjectId> {
        let id = self.allocate("shader")?;
        self.shaders.insert(id, SimShader { compiled: false });
        Ok(id)
    }

    fn compile_shader(&mut self, shader: ObjectId, source: &str) -> Result<(), String> {
        let Some(sim) = self.shaders.get_mut(&shader) else {
            return Err(format!("shader {} does not exist", shader));
        };
        if let Some(line) = source.lines().position(|l| l.trim_start().starts_with("#error")) {
            sim.compiled = false;
            return Err(format!("0:{}: error: #error directive", line + 1));
        }
        sim.compiled = true;
        Ok(())
    }

    fn delete_shader(&mut self, shader: ObjectId) {
        if self.shaders.remove(&shader).is_some() {
            self.record_delete("shader", shader);
        }
    }

    fn create_program(&mut self) -> RenderResult<ObjectId> {
        let id = self.allocate("program")?;
        self.programs.insert(id, SimProgram::default());
        Ok(id)
    }

    fn attach_shader(&mut self, program: ObjectId, shader: ObjectId) {
        if let Some(prog) = self.programs.get_mut(&program) {
            prog.shaders.push(shader);
        }
    }

    fn detach_shader(&mut self, program: ObjectId, shader: ObjectId) {
        if let Some(prog) = self.programs.get_mut(&program) {
            prog.shaders.retain(|s| *s != shader);
        }
    }

    fn link_program(&mut self, program: ObjectId) -> Result<(), String> {
        let Some(prog) = self.programs.get(&program) else {
            return Err(format!("program {} does not exist", program));
        };
        let all_compiled = !prog.shaders.is_empty()
            && prog
                .shaders
                .iter()
                .all(|s| self.shaders.get(s).is_some_and(|sim| sim.compiled));
        let linked = all_compiled;
        if let Some(prog) = self.programs.get_mut(&program) {
            prog.linked = linked;
        }
        if linked {
            Ok(())
        } else {
            Err("one or more attached shaders failed to compile".to_string())
        }
    }

    fn validate_program(&mut self, program: ObjectId) -> Result<(), String> {
        match self.programs.get(&program) {
            Some(prog) if prog.linked => Ok(()),
            Some(_) => Err("program is not linked".to_string()),
            None => Err(format!("program {} does not exist", program)),
        }
    }

    fn use_program(&mut self, program: Option<ObjectId>) {
        self.current_program = program;
        self.calls.push(DriverCall::UseProgram(program));
    }

    fn set_uniform(&mut self, program: ObjectId, name: &str, value: UniformValue) -> bool {
        let Some(prog) = self.programs.get_mut(&program) else { return false };
        prog.uniforms.insert(name.to_string(), value);
        self.calls.push(DriverCall::SetUniform { program, name: name.to_string(), value });
        true
    }

    fn delete_program(&mut self, program: ObjectId) {
        if self.programs.remove(&program).is_some() {
            if self.current_program == Some(program) {
                self.current_program = None;
            }
            self.record_delete("program", program);
        }
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = (x.max(0) as u32, y.max(0) as u32, width, height);
        self.calls.push(DriverCall::SetViewport { width, height });
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.calls.push(DriverCall::SetCullMode(mode));
    }

    fn set_blend(&mut self, attachment: Option<u32>, func: Option<BlendFunc>) {
        self.calls.push(DriverCall::SetBlend { attachment, func });
    }

    fn set_depth_state(&mut self, test: bool, write: bool, func: DepthFunc) {
        self.calls.push(DriverCall::SetDepthState { test, write, func });
    }

    fn set_wireframe(&mut self, enabled: bool) {
        self.calls.push(DriverCall::SetWireframe(enabled));
    }

    fn create_timer_query(&mut self) -> RenderResult<ObjectId> {
        let id = self.allocate("query")?;
        self.queries.insert(id, 0);
        Ok(id)
    }

    fn begin_timer_query(&mut self, query: ObjectId) {
        self.active_query = Some(query);
    }

    fn end_timer_query(&mut self) {
        if let Some(query) = self.active_query.take() {
            if let Some(result) = self.queries.get_mut(&query) {
                *result = 1_000;
            }
        }
    }

    fn timer_query_result(&mut self, query: ObjectId) -> Option<u64> {
        self.queries.get(&query).copied()
    }

    fn delete_query(&mut self, query: ObjectId) {
        if self.queries.remove(&query).is_some() {
            self.record_delete("query", query);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_target(driver: &mut HeadlessDriver, width: u32, height: u32) -> (ObjectId, ObjectId) {
        let fbo = driver.create_framebuffer().unwrap();
        let tex = driver.create_texture(TextureTarget::Texture2D).unwrap();
        driver.upload_texture_2d(tex, &TextureDesc::new(width, height, TextureFormat::Rgba8), None);
        driver.bind_framebuffer(Some(fbo));
        driver.attach_texture(AttachmentPoint::Color(0), Some(tex));
        driver.set_draw_buffers(&[0]);
        (fbo, tex)
    }

    #[test]
    fn test_object_names_are_unique_and_nonzero() {
        let mut driver = HeadlessDriver::new();
        let a = driver.create_texture(TextureTarget::Texture2D).unwrap();
        let b = driver.create_buffer().unwrap();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_simulated_allocation_failure() {
        let mut driver = HeadlessDriver::new();
        driver.fail_next_create();
        assert!(driver.create_program().is_err());
        assert!(driver.create_program().is_ok());
    }

    #[test]
    fn test_error_directive_fails_compile_and_link() {
        let mut driver = HeadlessDriver::new();
        let shader = driver.create_shader(ShaderStage::Fragment).unwrap();
        assert!(driver.compile_shader(shader, "void main() {}\n#error broken").is_err());

        let program = driver.create_program().unwrap();
        driver.attach_shader(program, shader);
        assert!(driver.link_program(program).is_err());
    }

    #[test]
    fn test_clear_then_read_back() {
        let mut driver = HeadlessDriver::new();
        let (fbo, _) = rgba_target(&mut driver, 4, 4);
        driver.clear(ClearMask::COLOR, [1.0, 0.0, 0.0, 1.0], 1.0);

        let pixels = driver.read_pixels(fbo, AttachmentPoint::Color(0), 1, 1, 1, 1, TextureFormat::Rgba8);
        assert_eq!(pixels, vec![255, 0, 0, 255]);
    }

    #[test]
    fn test_read_outside_storage_returns_empty() {
        let mut driver = HeadlessDriver::new();
        let (fbo, _) = rgba_target(&mut driver, 4, 4);
        let pixels = driver.read_pixels(fbo, AttachmentPoint::Color(0), 3, 3, 2, 2, TextureFormat::Rgba8);
        assert!(pixels.is_empty());
    }

    #[test]
    fn test_framebuffer_incomplete_on_size_mismatch() {
        let mut driver = HeadlessDriver::new();
        let _ = rgba_target(&mut driver, 4, 4);
        let depth = driver.create_renderbuffer().unwrap();
        driver.renderbuffer_storage(depth, TextureFormat::Depth24, 8, 8);
        driver.attach_renderbuffer(AttachmentPoint::Depth, Some(depth));
        assert!(matches!(driver.framebuffer_status(), FramebufferStatus::Incomplete(_)));
    }

    #[test]
    fn test_flat_fill_rasterization() {
        let mut driver = HeadlessDriver::new();
        let (fbo, _) = rgba_target(&mut driver, 2, 2);
        driver.set_viewport(0, 0, 2, 2);
        let program = driver.create_program().unwrap();
        driver.use_program(Some(program));
        driver.set_uniform(program, HeadlessDriver::FLAT_COLOR_UNIFORM, UniformValue::Vec4([0.0, 1.0, 0.0, 1.0]));
        driver.draw_arrays(PrimitiveMode::Triangles, 0, 3);

        let pixels = driver.read_pixels(fbo, AttachmentPoint::Color(0), 0, 0, 1, 1, TextureFormat::Rgba8);
        assert_eq!(pixels, vec![0, 255, 0, 255]);
    }

    #[test]
    fn test_delete_releases_objects() {
        let mut driver = HeadlessDriver::new();
        let tex = driver.create_texture(TextureTarget::Texture2D).unwrap();
        assert_eq!(driver.live_object_count(), 1);
        driver.delete_texture(tex);
        assert_eq!(driver.live_object_count(), 0);
        assert!(!driver.texture_exists(tex));
    }
}
