//! OpenGL driver over `glow`
//!
//! Thin translation of [`GraphicsDriver`] calls into GL 3.3 core calls. The
//! context is created by the windowing layer and handed over at construction;
//! this driver never touches the window.
//!
//! Object names cross the driver boundary as raw `u32` values and are wrapped
//! back into glow's native handle types on the way in.

#![allow(unsafe_code)]

use std::num::NonZeroU32;

use glow::HasContext;

use crate::render::driver::{
    AttachmentPoint, BlendEquation, BlendFactor, BlendFunc, ClearMask, CubeFace, CullMode,
    DepthFunc, FilterMode, FramebufferStatus, GraphicsDriver, ObjectId, PixelType,
    PrimitiveMode, ShaderStage, TextureDesc, TextureFormat, TextureTarget, UniformValue,
    VertexLayout, WrapMode,
};
use crate::render::{RenderError, RenderResult};

/// OpenGL implementation of [`GraphicsDriver`]
pub struct GlDriver {
    gl: glow::Context,
    max_color_attachments: u32,
    bound_framebuffer: Option<ObjectId>,
}

impl GlDriver {
    /// Wrap a current GL context
    pub fn new(gl: glow::Context) -> Self {
        let max = unsafe { gl.get_parameter_i32(glow::MAX_COLOR_ATTACHMENTS) };
        let max_color_attachments = u32::try_from(max).unwrap_or(8).max(1);
        log::info!("OpenGL driver ready, {} color attachments", max_color_attachments);
        Self {
            gl,
            max_color_attachments,
            bound_framebuffer: None,
        }
    }

    /// Borrow the underlying context
    pub fn context(&self) -> &glow::Context {
        &self.gl
    }
}

fn nz(id: ObjectId) -> Option<NonZeroU32> {
    NonZeroU32::new(id)
}

fn texture(id: ObjectId) -> Option<glow::NativeTexture> {
    nz(id).map(glow::NativeTexture)
}

fn renderbuffer(id: ObjectId) -> Option<glow::NativeRenderbuffer> {
    nz(id).map(glow::NativeRenderbuffer)
}

fn framebuffer(id: ObjectId) -> Option<glow::NativeFramebuffer> {
    nz(id).map(glow::NativeFramebuffer)
}

fn vertex_array(id: ObjectId) -> Option<glow::NativeVertexArray> {
    nz(id).map(glow::NativeVertexArray)
}

fn buffer(id: ObjectId) -> Option<glow::NativeBuffer> {
    nz(id).map(glow::NativeBuffer)
}

fn shader(id: ObjectId) -> Option<glow::NativeShader> {
    nz(id).map(glow::NativeShader)
}

fn program(id: ObjectId) -> Option<glow::NativeProgram> {
    nz(id).map(glow::NativeProgram)
}

fn query(id: ObjectId) -> Option<glow::NativeQuery> {
    nz(id).map(glow::NativeQuery)
}

fn creation_error(kind: &'static str) -> impl FnOnce(String) -> RenderError {
    move |reason| RenderError::ObjectCreation { kind, reason }
}

/// (internal format, pixel format) pair for a storage format
fn gl_format(format: TextureFormat) -> (u32, u32) {
    match format {
        TextureFormat::R8 => (glow::R8, glow::RED),
        TextureFormat::Rg8 => (glow::RG8, glow::RG),
        TextureFormat::Rgb8 => (glow::RGB8, glow::RGB),
        TextureFormat::Rgba8 => (glow::RGBA8, glow::RGBA),
        TextureFormat::Rgba16F => (glow::RGBA16F, glow::RGBA),
        TextureFormat::Rgba32F => (glow::RGBA32F, glow::RGBA),
        TextureFormat::R32F => (glow::R32F, glow::RED),
        TextureFormat::Depth24 => (glow::DEPTH_COMPONENT24, glow::DEPTH_COMPONENT),
        TextureFormat::Depth32F => (glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT),
        TextureFormat::Depth24Stencil8 => (glow::DEPTH24_STENCIL8, glow::DEPTH_STENCIL),
    }
}

fn gl_pixel_type(pixel_type: PixelType) -> u32 {
    match pixel_type {
        PixelType::UnsignedByte => glow::UNSIGNED_BYTE,
        PixelType::HalfFloat => glow::HALF_FLOAT,
        PixelType::Float => glow::FLOAT,
        PixelType::UnsignedInt => glow::UNSIGNED_INT,
        PixelType::UnsignedInt248 => glow::UNSIGNED_INT_24_8,
    }
}

fn gl_texture_target(target: TextureTarget) -> u32 {
    match target {
        TextureTarget::Texture2D => glow::TEXTURE_2D,
        TextureTarget::Cubemap => glow::TEXTURE_CUBE_MAP,
    }
}

fn gl_cube_face(face: CubeFace) -> u32 {
    match face {
        CubeFace::PositiveX => glow::TEXTURE_CUBE_MAP_POSITIVE_X,
        CubeFace::NegativeX => glow::TEXTURE_CUBE_MAP_NEGATIVE_X,
        CubeFace::PositiveY => glow::TEXTURE_CUBE_MAP_POSITIVE_Y,
        CubeFace::NegativeY => glow::TEXTURE_CUBE_MAP_NEGATIVE_Y,
        CubeFace::PositiveZ => glow::TEXTURE_CUBE_MAP_POSITIVE_Z,
        CubeFace::NegativeZ => glow::TEXTURE_CUBE_MAP_NEGATIVE_Z,
    }
}

fn gl_attachment(point: AttachmentPoint) -> u32 {
    match point {
        AttachmentPoint::Color(index) => glow::COLOR_ATTACHMENT0 + index,
        AttachmentPoint::Depth => glow::DEPTH_ATTACHMENT,
        AttachmentPoint::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
    }
}

fn gl_clear_mask(mask: ClearMask) -> u32 {
    let mut bits = 0;
    if mask.contains(ClearMask::COLOR) {
        bits |= glow::COLOR_BUFFER_BIT;
    }
    if mask.contains(ClearMask::DEPTH) {
        bits |= glow::DEPTH_BUFFER_BIT;
    }
    if mask.contains(ClearMask::STENCIL) {
        bits |= glow::STENCIL_BUFFER_BIT;
    }
    bits
}

fn gl_primitive(mode: PrimitiveMode) -> u32 {
    match mode {
        PrimitiveMode::Triangles => glow::TRIANGLES,
        PrimitiveMode::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveMode::Lines => glow::LINES,
        PrimitiveMode::LineStrip => glow::LINE_STRIP,
        PrimitiveMode::Points => glow::POINTS,
    }
}

fn gl_depth_func(func: DepthFunc) -> u32 {
    match func {
        DepthFunc::Never => glow::NEVER,
        DepthFunc::Less => glow::LESS,
        DepthFunc::Equal => glow::EQUAL,
        DepthFunc::LessEqual => glow::LEQUAL,
        DepthFunc::Greater => glow::GREATER,
        DepthFunc::NotEqual => glow::NOTEQUAL,
        DepthFunc::GreaterEqual => glow::GEQUAL,
        DepthFunc::Always => glow::ALWAYS,
    }
}

fn gl_blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
    }
}

fn gl_blend_equation(equation: BlendEquation) -> u32 {
    match equation {
        BlendEquation::Add => glow::FUNC_ADD,
        BlendEquation::Subtract => glow::FUNC_SUBTRACT,
        BlendEquation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
        BlendEquation::Min => glow::MIN,
        BlendEquation::Max => glow::MAX,
    }
}

fn gl_shader_stage(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        ShaderStage::Geometry => glow::GEOMETRY_SHADER,
    }
}

fn gl_filter(filter: FilterMode, mipmaps: bool) -> (i32, i32) {
    match (filter, mipmaps) {
        (FilterMode::Nearest, false) => (glow::NEAREST as i32, glow::NEAREST as i32),
        (FilterMode::Nearest, true) => (glow::NEAREST_MIPMAP_NEAREST as i32, glow::NEAREST as i32),
        (FilterMode::Linear, false) => (glow::LINEAR as i32, glow::LINEAR as i32),
        (FilterMode::Linear, true) => (glow::LINEAR_MIPMAP_LINEAR as i32, glow::LINEAR as i32),
    }
}

fn gl_wrap(wrap: WrapMode) -> i32 {
    match wrap {
        WrapMode::Repeat => glow::REPEAT as i32,
        WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT as i32,
        WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE as i32,
    }
}

impl GlDriver {
    fn apply_sampler(&self, target: u32, desc: &TextureDesc) {
        let (min, mag) = gl_filter(desc.filter, desc.mipmaps);
        let wrap = gl_wrap(desc.wrap);
        unsafe {
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, min);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, mag);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap);
            self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap);
            if target == glow::TEXTURE_CUBE_MAP {
                self.gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, wrap);
            }
        }
    }
}

impl GraphicsDriver for GlDriver {
    fn name(&self) -> &str {
        "opengl"
    }

    fn max_color_attachments(&self) -> u32 {
        self.max_color_attachments
    }

    fn create_texture(&mut self, _target: TextureTarget) -> RenderResult<ObjectId> {
        let tex = unsafe { self.gl.create_texture() }.map_err(creation_error("texture"))?;
        Ok(tex.0.get())
    }

    fn upload_texture_2d(&mut self, id: ObjectId, desc: &TextureDesc, data: Option<&[u8]>) {
        let (internal, format) = gl_format(desc.format);
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_2D, texture(id));
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal as i32,
                desc.width as i32,
                desc.height as i32,
                0,
                format,
                gl_pixel_type(desc.pixel_type),
                glow::PixelUnpackData::Slice(data),
            );
            self.apply_sampler(glow::TEXTURE_2D, desc);
            if desc.mipmaps {
                self.gl.generate_mipmap(glow::TEXTURE_2D);
            }
            self.gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn upload_cubemap_face(&mut self, id: ObjectId, face: CubeFace, desc: &TextureDesc, data: &[u8]) {
        let (internal, format) = gl_format(desc.format);
        unsafe {
            self.gl.bind_texture(glow::TEXTURE_CUBE_MAP, texture(id));
            self.gl.tex_image_2d(
                gl_cube_face(face),
                0,
                internal as i32,
                desc.width as i32,
                desc.height as i32,
                0,
                format,
                gl_pixel_type(desc.pixel_type),
                glow::PixelUnpackData::Slice(Some(data)),
            );
            self.apply_sampler(glow::TEXTURE_CUBE_MAP, desc);
            self.gl.bind_texture(glow::TEXTURE_CUBE_MAP, None);
        }
    }

    fn generate_mipmaps(&mut self, id: ObjectId, target: TextureTarget) {
        let target = gl_texture_target(target);
        unsafe {
            self.gl.bind_texture(target, texture(id));
            self.gl.generate_mipmap(target);
            self.gl.bind_texture(target, None);
        }
    }

    fn bind_texture(&mut self, unit: u32, target: TextureTarget, id: Option<ObjectId>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(gl_texture_target(target), id.and_then(texture));
        }
    }

    fn delete_texture(&mut self, id: ObjectId) {
        if let Some(tex) = texture(id) {
            unsafe { self.gl.delete_texture(tex) };
        }
    }

    fn create_renderbuffer(&mut self) -> RenderResult<ObjectId> {
        let rb = unsafe { self.gl.create_renderbuffer() }.map_err(creation_error("renderbuffer"))?;
        Ok(rb.0.get())
    }

    fn renderbuffer_storage(&mut self, id: ObjectId, format: TextureFormat, width: u32, height: u32) {
        let (internal, _) = gl_format(format);
        unsafe {
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, renderbuffer(id));
            self.gl.renderbuffer_storage(glow::RENDERBUFFER, internal, width as i32, height as i32);
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
    }

    fn delete_renderbuffer(&mut self, id: ObjectId) {
        if let Some(rb) = renderbuffer(id) {
            unsafe { self.gl.delete_renderbuffer(rb) };
        }
    }

    fn create_framebuffer(&mut self) -> RenderResult<ObjectId> {
        let fbo = unsafe { self.gl.create_framebuffer() }.map_err(creation_error("framebuffer"))?;
        Ok(fbo.0.get())
    }

    fn bind_framebuffer(&mut self, id: Option<ObjectId>) {
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, id.and_then(framebuffer)) };
        self.bound_framebuffer = id;
    }

    fn bound_framebuffer(&self) -> Option<ObjectId> {
        self.bound_framebuffer
    }

    fn attach_texture(&mut self, point: AttachmentPoint, id: Option<ObjectId>) {
        unsafe {
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                gl_attachment(point),
                glow::TEXTURE_2D,
                id.and_then(texture),
                0,
            );
        }
    }

    fn attach_renderbuffer(&mut self, point: AttachmentPoint, id: Option<ObjectId>) {
        unsafe {
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                gl_attachment(point),
                glow::RENDERBUFFER,
                id.and_then(renderbuffer),
            );
        }
    }

    fn set_draw_buffers(&mut self, color_attachments: &[u32]) {
        let buffers: Vec<u32> = color_attachments
            .iter()
            .map(|index| glow::COLOR_ATTACHMENT0 + index)
            .collect();
        unsafe {
            if buffers.is_empty() {
                self.gl.draw_buffer(glow::NONE);
            } else {
                self.gl.draw_buffers(&buffers);
            }
        }
    }

    fn framebuffer_status(&self) -> FramebufferStatus {
        let status = unsafe { self.gl.check_framebuffer_status(glow::FRAMEBUFFER) };
        match status {
            glow::FRAMEBUFFER_COMPLETE => FramebufferStatus::Complete,
            glow::FRAMEBUFFER_INCOMPLETE_ATTACHMENT => {
                FramebufferStatus::Incomplete("incomplete attachment".to_string())
            }
            glow::FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT => {
                FramebufferStatus::Incomplete("missing attachment".to_string())
            }
            glow::FRAMEBUFFER_INCOMPLETE_DRAW_BUFFER => {
                FramebufferStatus::Incomplete("incomplete draw buffer".to_string())
            }
            glow::FRAMEBUFFER_INCOMPLETE_READ_BUFFER => {
                FramebufferStatus::Incomplete("incomplete read buffer".to_string())
            }
            glow::FRAMEBUFFER_UNSUPPORTED => {
                FramebufferStatus::Incomplete("unsupported format combination".to_string())
            }
            glow::FRAMEBUFFER_INCOMPLETE_MULTISAMPLE => {
                FramebufferStatus::Incomplete("multisample mismatch".to_string())
            }
            other => FramebufferStatus::Incomplete(format!("status 0x{:X}", other)),
        }
    }

    fn clear(&mut self, mask: ClearMask, color: [f32; 4], depth: f32) {
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl.clear_depth_f32(depth);
            self.gl.clear(gl_clear_mask(mask));
        }
    }

    fn blit_framebuffer(
        &mut self,
        src: ObjectId,
        dst: ObjectId,
        src_attachment: u32,
        dst_attachment: u32,
        width: u32,
        height: u32,
        mask: ClearMask,
    ) {
        let (w, h) = (width as i32, height as i32);
        unsafe {
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, framebuffer(src));
            self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, framebuffer(dst));
            if mask.contains(ClearMask::COLOR) {
                self.gl.read_buffer(glow::COLOR_ATTACHMENT0 + src_attachment);
                self.gl.draw_buffers(&[glow::COLOR_ATTACHMENT0 + dst_attachment]);
            }
            self.gl.blit_framebuffer(0, 0, w, h, 0, 0, w, h, gl_clear_mask(mask), glow::NEAREST);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        self.bound_framebuffer = None;
    }

    fn read_pixels(
        &mut self,
        id: ObjectId,
        point: AttachmentPoint,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Vec<u8> {
        let (_, pixel_format) = gl_format(format);
        let mut pixels = vec![0u8; width as usize * height as usize * format.bytes_per_pixel()];
        unsafe {
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, framebuffer(id));
            if let AttachmentPoint::Color(index) = point {
                self.gl.read_buffer(glow::COLOR_ATTACHMENT0 + index);
            }
            self.gl.read_pixels(
                x as i32,
                y as i32,
                width as i32,
                height as i32,
                pixel_format,
                gl_pixel_type(format.default_pixel_type()),
                glow::PixelPackData::Slice(Some(&mut pixels)),
            );
            self.gl.bind_framebuffer(
                glow::READ_FRAMEBUFFER,
                self.bound_framebuffer.and_then(framebuffer),
            );
        }
        pixels
    }

    fn delete_framebuffer(&mut self, id: ObjectId) {
        if let Some(fbo) = framebuffer(id) {
            unsafe { self.gl.delete_framebuffer(fbo) };
        }
        if self.bound_framebuffer == Some(id) {
            self.bound_framebuffer = None;
        }
    }

    fn create_vertex_array(&mut self) -> RenderResult<ObjectId> {
        let vao = unsafe { self.gl.create_vertex_array() }.map_err(creation_error("vertex array"))?;
        Ok(vao.0.get())
    }

    fn create_buffer(&mut self) -> RenderResult<ObjectId> {
        let buf = unsafe { self.gl.create_buffer() }.map_err(creation_error("buffer"))?;
        Ok(buf.0.get())
    }

    fn upload_vertex_buffer(&mut self, vao: ObjectId, buf: ObjectId, data: &[f32], layout: &VertexLayout) {
        let float = std::mem::size_of::<f32>() as i32;
        unsafe {
            self.gl.bind_vertex_array(vertex_array(vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, buffer(buf));
            self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(data), glow::STATIC_DRAW);
            for attribute in &layout.attributes {
                self.gl.vertex_attrib_pointer_f32(
                    attribute.location,
                    attribute.components as i32,
                    glow::FLOAT,
                    false,
                    layout.stride as i32 * float,
                    attribute.offset as i32 * float,
                );
                self.gl.enable_vertex_attrib_array(attribute.location);
            }
            self.gl.bind_vertex_array(None);
        }
    }

    fn upload_index_buffer(&mut self, vao: ObjectId, buf: ObjectId, indices: &[u32]) {
        unsafe {
            self.gl.bind_vertex_array(vertex_array(vao));
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, buffer(buf));
            self.gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(indices),
                glow::STATIC_DRAW,
            );
            self.gl.bind_vertex_array(None);
        }
    }

    fn upload_instance_buffer(&mut self, vao: ObjectId, buf: ObjectId, matrices: &[f32], first_location: u32) {
        let float = std::mem::size_of::<f32>() as i32;
        unsafe {
            self.gl.bind_vertex_array(vertex_array(vao));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, buffer(buf));
            self.gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(matrices), glow::DYNAMIC_DRAW);
            // one mat4 per instance, spread over four vec4 attributes
            for column in 0..4u32 {
                let location = first_location + column;
                self.gl.vertex_attrib_pointer_f32(location, 4, glow::FLOAT, false, 16 * float, column as i32 * 4 * float);
                self.gl.enable_vertex_attrib_array(location);
                self.gl.vertex_attrib_divisor(location, 1);
            }
            self.gl.bind_vertex_array(None);
        }
    }

    fn bind_vertex_array(&mut self, vao: Option<ObjectId>) {
        unsafe { self.gl.bind_vertex_array(vao.and_then(vertex_array)) };
    }

    fn draw_arrays(&mut self, mode: PrimitiveMode, first: u32, count: u32) {
        unsafe { self.gl.draw_arrays(gl_primitive(mode), first as i32, count as i32) };
    }

    fn draw_elements(&mut self, mode: PrimitiveMode, count: u32) {
        unsafe { self.gl.draw_elements(gl_primitive(mode), count as i32, glow::UNSIGNED_INT, 0) };
    }

    fn draw_arrays_instanced(&mut self, mode: PrimitiveMode, first: u32, count: u32, instances: u32) {
        unsafe {
            self.gl
                .draw_arrays_instanced(gl_primitive(mode), first as i32, count as i32, instances as i32);
        }
    }

    fn draw_elements_instanced(&mut self, mode: PrimitiveMode, count: u32, instances: u32) {
        unsafe {
            self.gl.draw_elements_instanced(
                gl_primitive(mode),
                count as i32,
                glow::UNSIGNED_INT,
                0,
                instances as i32,
            );
        }
    }

    fn delete_vertex_array(&mut self, vao: ObjectId) {
        if let Some(vao) = vertex_array(vao) {
            unsafe { self.gl.delete_vertex_array(vao) };
        }
    }

    fn delete_buffer(&mut self, buf: ObjectId) {
        if let Some(buf) = buffer(buf) {
            unsafe { self.gl.delete_buffer(buf) };
        }
    }

    fn create_shader(&mut self, stage: ShaderStage) -> RenderResult<ObjectId> {
        let id = unsafe { self.gl.create_shader(gl_shader_stage(stage)) }.map_err(creation_error("shader"))?;
        Ok(id.0.get())
    }

    fn compile_shader(&mut self, id: ObjectId, source: &str) -> Result<(), String> {
        let Some(handle) = shader(id) else {
            return Err("invalid shader name".to_string());
        };
        unsafe {
            self.gl.shader_source(handle, source);
            self.gl.compile_shader(handle);
            if self.gl.get_shader_compile_status(handle) {
                Ok(())
            } else {
                Err(self.gl.get_shader_info_log(handle))
            }
        }
    }

    fn delete_shader(&mut self, id: ObjectId) {
        if let Some(handle) = shader(id) {
            unsafe { self.gl.delete_shader(handle) };
        }
    }

    fn create_program(&mut self) -> RenderResult<ObjectId> {
        let id = unsafe { self.gl.create_program() }.map_err(creation_error("program"))?;
        Ok(id.0.get())
    }

    fn attach_shader(&mut self, prog: ObjectId, sh: ObjectId) {
        if let (Some(prog), Some(sh)) = (program(prog), shader(sh)) {
            unsafe { self.gl.attach_shader(prog, sh) };
        }
    }

    fn detach_shader(&mut self, prog: ObjectId, sh: ObjectId) {
        if let (Some(prog), Some(sh)) = (program(prog), shader(sh)) {
            unsafe { self.gl.detach_shader(prog, sh) };
        }
    }

    fn link_program(&mut self, id: ObjectId) -> Result<(), String> {
        let Some(handle) = program(id) else {
            return Err("invalid program name".to_string());
        };
        unsafe {
            self.gl.link_program(handle);
            if self.gl.get_program_link_status(handle) {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(handle))
            }
        }
    }

    fn validate_program(&mut self, id: ObjectId) -> Result<(), String> {
        let Some(handle) = program(id) else {
            return Err("invalid program name".to_string());
        };
        unsafe {
            if self.gl.get_program_link_status(handle) {
                Ok(())
            } else {
                Err(self.gl.get_program_info_log(handle))
            }
        }
    }

    fn use_program(&mut self, id: Option<ObjectId>) {
        unsafe { self.gl.use_program(id.and_then(program)) };
    }

    fn set_uniform(&mut self, id: ObjectId, name: &str, value: UniformValue) -> bool {
        let Some(handle) = program(id) else { return false };
        unsafe {
            let Some(location) = self.gl.get_uniform_location(handle, name) else {
                return false;
            };
            let location = Some(&location);
            match value {
                UniformValue::Int(v) => self.gl.uniform_1_i32(location, v),
                UniformValue::Float(v) => self.gl.uniform_1_f32(location, v),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32_slice(location, &v),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32_slice(location, &v),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(location, false, &m),
            }
        }
        true
    }

    fn delete_program(&mut self, id: ObjectId) {
        if let Some(handle) = program(id) {
            unsafe { self.gl.delete_program(handle) };
        }
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        unsafe { self.gl.viewport(x, y, width as i32, height as i32) };
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        unsafe {
            match mode {
                CullMode::None => self.gl.disable(glow::CULL_FACE),
                CullMode::Back => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::BACK);
                }
                CullMode::Front => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::FRONT);
                }
                CullMode::FrontAndBack => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(glow::FRONT_AND_BACK);
                }
            }
        }
    }

    fn set_blend(&mut self, attachment: Option<u32>, func: Option<BlendFunc>) {
        unsafe {
            match (attachment, func) {
                (None, None) => self.gl.disable(glow::BLEND),
                (None, Some(f)) => {
                    self.gl.enable(glow::BLEND);
                    self.gl.blend_func(gl_blend_factor(f.src), gl_blend_factor(f.dst));
                    self.gl.blend_equation(gl_blend_equation(f.equation));
                }
                (Some(index), None) => self.gl.disable_draw_buffer(glow::BLEND, index),
                (Some(index), Some(f)) => {
                    self.gl.enable_draw_buffer(glow::BLEND, index);
                    self.gl
                        .blend_func_draw_buffer(index, gl_blend_factor(f.src), gl_blend_factor(f.dst));
                    self.gl.blend_equation_draw_buffer(index, gl_blend_equation(f.equation));
                }
            }
        }
    }

    fn set_depth_state(&mut self, test: bool, write: bool, func: DepthFunc) {
        unsafe {
            if test {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
            self.gl.depth_mask(write);
            self.gl.depth_func(gl_depth_func(func));
        }
    }

    fn set_wireframe(&mut self, enabled: bool) {
        let mode = if enabled { glow::LINE } else { glow::FILL };
        unsafe { self.gl.polygon_mode(glow::FRONT_AND_BACK, mode) };
    }

    fn create_timer_query(&mut self) -> RenderResult<ObjectId> {
        let id = unsafe { self.gl.create_query() }.map_err(creation_error("query"))?;
        Ok(id.0.get())
    }

    fn begin_timer_query(&mut self, id: ObjectId) {
        if let Some(handle) = query(id) {
            unsafe { self.gl.begin_query(glow::TIME_ELAPSED, handle) };
        }
    }

    fn end_timer_query(&mut self) {
        unsafe { self.gl.end_query(glow::TIME_ELAPSED) };
    }

    fn timer_query_result(&mut self, id: ObjectId) -> Option<u64> {
        let handle = query(id)?;
        unsafe {
            let available = self.gl.get_query_parameter_u32(handle, glow::QUERY_RESULT_AVAILABLE);
            if available == 0 {
                return None;
            }
            Some(u64::from(self.gl.get_query_parameter_u32(handle, glow::QUERY_RESULT)))
        }
    }

    fn delete_query(&mut self, id: ObjectId) {
        if let Some(handle) = query(id) {
            unsafe { self.gl.delete_query(handle) };
        }
    }
}
