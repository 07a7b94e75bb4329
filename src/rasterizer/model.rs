//! Geometry handed to the rasterizer
//!
//! Vertex and instance data are set from typed slices and stored as bytes with a
//! stride. The type is remembered so debug builds can catch a shader reading the
//! buffer as something else.

use std::any::{type_name, TypeId};
use std::mem::size_of;
use std::sync::Arc;

use bytemuck::Pod;

use super::pipeline::Pipeline;

/// Type-erased array of fixed-size records
#[derive(Debug, Clone, Default)]
pub struct VertexBuffer {
    bytes: Vec<u8>,
    stride: usize,
    element_type: Option<(TypeId, &'static str)>,
}

impl VertexBuffer {
    pub fn from_slice<T: Pod>(data: &[T]) -> Self {
        Self {
            bytes: bytemuck::cast_slice(data).to_vec(),
            stride: size_of::<T>(),
            element_type: Some((TypeId::of::<T>(), type_name::<T>())),
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.bytes.len() / self.stride
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn type_name(&self) -> Option<&'static str> {
        self.element_type.map(|(_, name)| name)
    }

    pub fn holds<T: 'static>(&self) -> bool {
        matches!(self.element_type, Some((id, _)) if id == TypeId::of::<T>())
    }

    /// Bytes of record `index`
    pub fn record(&self, index: usize) -> &[u8] {
        let start = index * self.stride;
        &self.bytes[start..start + self.stride]
    }

    /// Typed view of the whole buffer; panics if it holds another type
    pub fn as_slice<T: Pod>(&self) -> &[T] {
        assert!(self.holds::<T>(), "buffer holds {:?}, not {}", self.type_name(), type_name::<T>());
        bytemuck::cast_slice(&self.bytes)
    }
}

/// Vertex, instance, index and constant data plus the pipeline that interprets them.
///
/// The pipeline is shared so several models can be drawn with the same shaders.
#[derive(Debug, Clone)]
pub struct Model {
    pipeline: Arc<Pipeline>,
    vertices: VertexBuffer,
    instances: VertexBuffer,
    indices: Vec<u32>,
    constants: Vec<u8>,
}

impl Model {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            vertices: VertexBuffer::default(),
            instances: VertexBuffer::default(),
            indices: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn set_pipeline(&mut self, pipeline: Arc<Pipeline>) {
        self.pipeline = pipeline;
    }

    pub fn set_vertex_data<T: Pod>(&mut self, vertices: &[T]) {
        self.vertices = VertexBuffer::from_slice(vertices);
    }

    pub fn set_instance_data<T: Pod>(&mut self, instances: &[T]) {
        self.instances = VertexBuffer::from_slice(instances);
    }

    pub fn set_indices(&mut self, indices: &[u32]) {
        debug_assert!(indices.len() % 3 == 0, "index count {} is not a multiple of 3", indices.len());
        self.indices = indices.to_vec();
    }

    /// Data shared by every shader invocation of a draw
    pub fn set_constants<T: Pod>(&mut self, constants: &T) {
        self.constants = bytemuck::bytes_of(constants).to_vec();
    }

    pub fn vertices(&self) -> &VertexBuffer {
        &self.vertices
    }

    pub fn instances(&self) -> &VertexBuffer {
        &self.instances
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn constants(&self) -> &[u8] {
        &self.constants
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of instance records; 0 when the model is not instanced
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_record(&self, index: usize) -> &[u8] {
        self.vertices.record(index)
    }

    /// Instance record, or an empty slice for non-instanced models
    pub fn instance_record(&self, index: usize) -> &[u8] {
        if self.instances.is_empty() {
            &[]
        } else {
            self.instances.record(index)
        }
    }

    /// True if every index refers to an existing vertex
    pub fn indices_in_range(&self) -> bool {
        let count = self.vertex_count();
        self.indices.iter().all(|&i| (i as usize) < count)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangle_count() == 0
    }
}
