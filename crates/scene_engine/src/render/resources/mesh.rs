//! Mesh geometry and draw-call derivation
//!
//! A [`Mesh`] owns one vertex array with an interleaved vertex buffer, an
//! optional index buffer and an optional per-instance model-matrix buffer.
//! [`Mesh::bind`] validates the draw count against the primitive mode before
//! anything reaches the driver: a triangle list whose count is not a multiple
//! of three is rejected instead of drawing a truncated primitive.

use crate::foundation::math::{Mat4, Vec3};
use crate::render::driver::{GraphicsDriver, ObjectId, PrimitiveMode, VertexAttribute, VertexLayout};
use crate::render::{RenderError, RenderResult};
use crate::scene::Aabb;

/// Interleaved vertex: position, normal, texture coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in model space
    pub position: [f32; 3],
    /// Normal vector
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex {
    /// Floats per vertex
    pub const FLOATS: u32 = 8;

    /// First attribute location used by the instance matrix
    pub const INSTANCE_LOCATION: u32 = 3;

    /// Create a new vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }

    /// Vertex with only a position
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self::new([x, y, z], [0.0, 0.0, 1.0], [0.0, 0.0])
    }

    /// Attribute layout shared by every mesh
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: Self::FLOATS,
            attributes: vec![
                VertexAttribute { location: 0, components: 3, offset: 0 },
                VertexAttribute { location: 1, components: 3, offset: 3 },
                VertexAttribute { location: 2, components: 2, offset: 6 },
            ],
        }
    }

    fn write_to(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.position);
        out.extend_from_slice(&self.normal);
        out.extend_from_slice(&self.uv);
    }
}

/// Draw entry point selected for a bound mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMethod {
    /// Non-indexed
    Arrays,
    /// Indexed
    Elements,
    /// Non-indexed, instanced
    ArraysInstanced,
    /// Indexed, instanced
    ElementsInstanced,
}

/// Validated draw produced by [`Mesh::bind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// Entry point
    pub method: DrawMethod,
    /// Primitive mode
    pub mode: PrimitiveMode,
    /// Vertex or index count
    pub count: u32,
    /// Instances drawn
    pub instances: u32,
    /// Faces, segments or points assembled from `count`
    pub primitives: u32,
}

impl DrawCall {
    /// Number of primitives `count` assembles into under `mode`
    ///
    /// Fails when the count cannot form whole primitives.
    pub fn primitive_count(mode: PrimitiveMode, count: u32) -> RenderResult<u32> {
        let invalid = |reason| Err(RenderError::InvalidDrawCount { mode, count, reason });
        if count == 0 {
            return invalid("nothing to draw");
        }
        match mode {
            PrimitiveMode::Triangles if count % 3 != 0 => invalid("triangle lists need a multiple of 3"),
            PrimitiveMode::Triangles => Ok(count / 3),
            PrimitiveMode::Lines if count % 2 != 0 => invalid("line lists need a multiple of 2"),
            PrimitiveMode::Lines => Ok(count / 2),
            PrimitiveMode::TriangleStrip if count < 3 => invalid("triangle strips need at least 3"),
            PrimitiveMode::TriangleStrip => Ok(count - 2),
            PrimitiveMode::LineStrip if count < 2 => invalid("line strips need at least 2"),
            PrimitiveMode::LineStrip => Ok(count - 1),
            PrimitiveMode::Points => Ok(count),
        }
    }

    /// Issue the draw; the mesh's vertex array must be bound
    pub fn issue(&self, driver: &mut dyn GraphicsDriver) {
        match self.method {
            DrawMethod::Arrays => driver.draw_arrays(self.mode, 0, self.count),
            DrawMethod::Elements => driver.draw_elements(self.mode, self.count),
            DrawMethod::ArraysInstanced => {
                driver.draw_arrays_instanced(self.mode, 0, self.count, self.instances);
            }
            DrawMethod::ElementsInstanced => {
                driver.draw_elements_instanced(self.mode, self.count, self.instances);
            }
        }
    }
}

/// GPU mesh
#[derive(Debug)]
pub struct Mesh {
    name: String,
    vao: ObjectId,
    vertex_buffer: ObjectId,
    index_buffer: Option<ObjectId>,
    instance_buffer: Option<ObjectId>,
    vertex_count: u32,
    index_count: u32,
    instance_count: u32,
    mode: PrimitiveMode,
    bounds: Aabb,
}

impl Mesh {
    /// Upload vertices (and indices) into a new vertex array
    pub fn new(
        driver: &mut dyn GraphicsDriver,
        name: impl Into<String>,
        vertices: &[Vertex],
        indices: Option<&[u32]>,
        mode: PrimitiveMode,
    ) -> RenderResult<Self> {
        let name = name.into();
        let mut data = Vec::with_capacity(vertices.len() * Vertex::FLOATS as usize);
        for vertex in vertices {
            vertex.write_to(&mut data);
        }

        let vao = driver.create_vertex_array()?;
        let vertex_buffer = driver.create_buffer()?;
        driver.upload_vertex_buffer(vao, vertex_buffer, &data, &Vertex::layout());

        let index_buffer = match indices {
            Some(indices) => {
                let buffer = driver.create_buffer()?;
                driver.upload_index_buffer(vao, buffer, indices);
                Some(buffer)
            }
            None => None,
        };

        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position)));
        log::debug!(
            "Mesh '{}' uploaded: {} vertices, {} indices",
            name,
            vertices.len(),
            indices.map_or(0, <[u32]>::len)
        );

        Ok(Self {
            name,
            vao,
            vertex_buffer,
            index_buffer,
            instance_buffer: None,
            vertex_count: vertices.len() as u32,
            index_count: indices.map_or(0, |i| i.len() as u32),
            instance_count: 1,
            mode,
            bounds,
        })
    }

    /// Upload one model matrix per instance
    ///
    /// An empty slice drops back to a single, non-instanced draw.
    pub fn set_instances(&mut self, driver: &mut dyn GraphicsDriver, matrices: &[Mat4]) -> RenderResult<()> {
        if matrices.is_empty() {
            self.instance_count = 1;
            return Ok(());
        }
        let buffer = match self.instance_buffer {
            Some(buffer) => buffer,
            None => {
                let buffer = driver.create_buffer()?;
                self.instance_buffer = Some(buffer);
                buffer
            }
        };
        let data: Vec<f32> = matrices.iter().flat_map(|m| m.as_slice().to_vec()).collect();
        driver.upload_instance_buffer(self.vao, buffer, &data, Vertex::INSTANCE_LOCATION);
        self.instance_count = matrices.len() as u32;
        Ok(())
    }

    /// Bind the vertex array and derive a validated draw call
    pub fn bind(&self, driver: &mut dyn GraphicsDriver, mode: PrimitiveMode) -> RenderResult<DrawCall> {
        if !self.is_loaded() {
            return Err(RenderError::NotLoaded(self.name.clone()));
        }
        let indexed = self.index_buffer.is_some();
        let count = if indexed { self.index_count } else { self.vertex_count };
        let primitives = DrawCall::primitive_count(mode, count)?;

        let method = match (indexed, self.instance_count > 1) {
            (false, false) => DrawMethod::Arrays,
            (true, false) => DrawMethod::Elements,
            (false, true) => DrawMethod::ArraysInstanced,
            (true, true) => DrawMethod::ElementsInstanced,
        };

        driver.bind_vertex_array(Some(self.vao));
        Ok(DrawCall {
            method,
            mode,
            count,
            instances: self.instance_count,
            primitives,
        })
    }

    /// Bind with the mesh's own primitive mode and draw
    pub fn draw(&self, driver: &mut dyn GraphicsDriver) -> RenderResult<DrawCall> {
        let call = self.bind(driver, self.mode)?;
        call.issue(driver);
        Ok(call)
    }

    /// Release every driver object
    pub fn destroy(&mut self, driver: &mut dyn GraphicsDriver) {
        if !self.is_loaded() {
            return;
        }
        driver.delete_buffer(self.vertex_buffer);
        if let Some(buffer) = self.index_buffer.take() {
            driver.delete_buffer(buffer);
        }
        if let Some(buffer) = self.instance_buffer.take() {
            driver.delete_buffer(buffer);
        }
        driver.delete_vertex_array(self.vao);
        self.vao = 0;
        self.vertex_buffer = 0;
    }

    /// Whether the driver objects are alive
    pub fn is_loaded(&self) -> bool {
        self.vao != 0
    }

    /// Vertex array name
    pub fn vao(&self) -> ObjectId {
        self.vao
    }

    /// Diagnostic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default primitive mode
    pub fn mode(&self) -> PrimitiveMode {
        self.mode
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices, 0 when not indexed
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Number of instances drawn per call
    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    /// Whether draws go through the index buffer
    pub fn is_indexed(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Model-space bounds
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DriverCall, HeadlessDriver};

    fn quad() -> Vec<Vertex> {
        vec![
            Vertex::at(-1.0, -1.0, 0.0),
            Vertex::at(1.0, -1.0, 0.0),
            Vertex::at(1.0, 1.0, 0.0),
            Vertex::at(-1.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_indexed_triangles() {
        let mut driver = HeadlessDriver::new();
        let mesh = Mesh::new(&mut driver, "quad", &quad(), Some(&[0, 1, 2, 2, 3, 0]), PrimitiveMode::Triangles).unwrap();
        let call = mesh.bind(&mut driver, PrimitiveMode::Triangles).unwrap();
        assert_eq!(call.method, DrawMethod::Elements);
        assert_eq!(call.count, 6);
        assert_eq!(call.primitives, 2);
    }

    #[test]
    fn test_triangle_count_must_divide_by_three() {
        let mut driver = HeadlessDriver::new();
        let mesh = Mesh::new(&mut driver, "bad", &quad(), Some(&[0, 1, 2, 3]), PrimitiveMode::Triangles).unwrap();
        let result = mesh.bind(&mut driver, PrimitiveMode::Triangles);
        assert!(matches!(result, Err(RenderError::InvalidDrawCount { count: 4, .. })));
        assert!(driver.draw_calls().is_empty());
    }

    #[test]
    fn test_strip_and_line_counts() {
        assert_eq!(DrawCall::primitive_count(PrimitiveMode::TriangleStrip, 4).unwrap(), 2);
        assert_eq!(DrawCall::primitive_count(PrimitiveMode::LineStrip, 4).unwrap(), 3);
        assert!(DrawCall::primitive_count(PrimitiveMode::Lines, 3).is_err());
        assert!(DrawCall::primitive_count(PrimitiveMode::Points, 0).is_err());
    }

    #[test]
    fn test_multiple_instances_promote_to_instanced_draw() {
        let mut driver = HeadlessDriver::new();
        let mut mesh = Mesh::new(&mut driver, "tri", &quad()[..3], None, PrimitiveMode::Triangles).unwrap();
        mesh.set_instances(&mut driver, &[Mat4::identity(), Mat4::new_scaling(2.0)]).unwrap();

        let call = mesh.draw(&mut driver).unwrap();
        assert_eq!(call.method, DrawMethod::ArraysInstanced);
        assert!(matches!(driver.draw_calls()[0], DriverCall::Draw { instances: 2, indexed: false, .. }));
    }

    #[test]
    fn test_destroy_releases_buffers() {
        let mut driver = HeadlessDriver::new();
        let mut mesh = Mesh::new(&mut driver, "quad", &quad(), Some(&[0, 1, 2]), PrimitiveMode::Triangles).unwrap();
        mesh.destroy(&mut driver);
        assert!(!mesh.is_loaded());
        assert_eq!(driver.live_object_count(), 0);
        assert!(mesh.bind(&mut driver, PrimitiveMode::Triangles).is_err());
    }

    #[test]
    fn test_bounds_follow_vertices() {
        let mut driver = HeadlessDriver::new();
        let mesh = Mesh::new(&mut driver, "quad", &quad(), None, PrimitiveMode::TriangleStrip).unwrap();
        assert_eq!(mesh.bounds().max, Vec3::new(1.0, 1.0, 0.0));
    }
}
