use std::collections::HashMap;

use cgmath::{Matrix, Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;

use crate::{
    light::{LightBatch, ViewLight},
    texture::TextureSettings,
    transform_stack::TransformStack,
};

pub mod material;
pub mod mesh_model;
pub mod sphere_model;

pub use mesh_model::MeshModel;
pub use sphere_model::SphereModel;

pub trait Vertex {
    fn desc<'a>() -> wgpu::VertexBufferLayout<'a>;
}

/// Vertex format shared by every model kind
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub specular: [f32; 3],
    pub shininess: f32,
    pub tex_coords: [f32; 2],
}

impl Vertex for ModelVertex {
    fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        const VEC3: wgpu::BufferAddress = mem::size_of::<[f32; 3]>() as wgpu::BufferAddress;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Normal
                wgpu::VertexAttribute {
                    offset: VEC3,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Color
                wgpu::VertexAttribute {
                    offset: VEC3 * 2,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Specular reflectance
                wgpu::VertexAttribute {
                    offset: VEC3 * 3,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Shininess
                wgpu::VertexAttribute {
                    offset: VEC3 * 4,
                    shader_location: 4,
                    format: wgpu::VertexFormat::Float32,
                },
                // Texture coordinates
                wgpu::VertexAttribute {
                    offset: VEC3 * 4 + mem::size_of::<f32>() as wgpu::BufferAddress,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

// Per draw uniform data
// Everything one model needs for one placement: transforms, the packed
// lights and the texture switch
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Locals {
    pub model_view: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_positions: [[f32; 4]; 4],
    pub light_diffuse: [[f32; 4]; 4],
    pub light_ambient: [[f32; 4]; 4],
    pub light_specular: [[f32; 4]; 4],
    pub light_on: [f32; 4],
    // x: 1.0 when a texture is bound and should be shown
    // yz: texture coordinate offset, w: texture coordinate scale
    pub options: [f32; 4],
}

impl Locals {
    pub fn new(
        model_view: Matrix4<f32>,
        projection: &Matrix4<f32>,
        lights: &LightBatch,
        show_texture: bool,
    ) -> Self {
        // Normals need the inverse transpose so non-uniform scales don't skew them
        let normal_matrix = model_view
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(model_view);

        Self {
            model_view: model_view.into(),
            normal_matrix: normal_matrix.into(),
            projection: (*projection).into(),
            light_positions: lights.positions,
            light_diffuse: lights.diffuse,
            light_ambient: lights.ambient,
            light_specular: lights.specular,
            light_on: lights.on,
            options: [if show_texture { 1.0 } else { 0.0 }, 0.0, 0.0, 1.0],
        }
    }

    /// Sample the texture at `uv * scale + offset`
    pub fn with_texture_transform(mut self, offset: [f32; 2], scale: f32) -> Self {
        self.options[1] = offset[0];
        self.options[2] = offset[1];
        self.options[3] = scale;
        self
    }
}

/// Texture controls read from the control panel each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureOptions {
    pub show: bool,
    /// Texture coordinate scale for scrolling meshes
    pub scale: f32,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            show: true,
            scale: 1.0,
        }
    }
}

/// Vertex buffer for one model's triangles
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub num_vertices: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, label: &str, vertices: &[ModelVertex]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", label)),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            vertex_buffer,
            num_vertices: vertices.len() as u32,
        }
    }
}

/// One recorded draw, replayed by the render pass in the order recorded
pub struct DrawCommand<'a> {
    pub mesh: &'a GpuMesh,
    pub material: &'a wgpu::BindGroup,
    pub locals: Locals,
    pub cull_back: bool,
}

#[derive(Default)]
pub struct DrawList<'a> {
    commands: Vec<DrawCommand<'a>>,
}

impl<'a> DrawList<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: DrawCommand<'a>) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawCommand<'a>> {
        self.commands.iter()
    }
}

/// Anything the scene can place and draw.
///
/// A model knows nothing about where it sits: the caller has already folded
/// the camera, parent orbits and placement into `stack.top()`, which is the
/// finished object-to-view transform. Implementations must not touch the
/// stack or any other argument; GPU state they need (culling, texture) is
/// carried on the recorded command, so nothing leaks into the next draw.
pub trait Model {
    fn name(&self) -> &str;

    #[allow(clippy::too_many_arguments)]
    fn redraw<'a>(
        &'a self,
        stack: &TransformStack,
        projection: &Matrix4<f32>,
        lights: &[ViewLight],
        texture: TextureOptions,
        draws: &mut DrawList<'a>,
    );

    /// Step per-frame animation. Called once per frame before drawing.
    fn advance(&mut self) {}

    /// Pick up finished background work (texture loads). Called once per
    /// frame before drawing.
    fn poll(&mut self, _device: &wgpu::Device, _queue: &wgpu::Queue) {}

    /// Apply new texture sampling options
    fn configure_texture(&mut self, _device: &wgpu::Device, _settings: TextureSettings) {}
}

/// Index of a model inside a [`ModelRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(pub usize);

/// Owns every model the scene refers to, keyed by built-in name or URL, so
/// repeated references share one set of GPU buffers.
#[derive(Default)]
pub struct ModelRegistry {
    models: Vec<Box<dyn Model>>,
    by_name: HashMap<String, ModelId>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, model: Box<dyn Model>) -> ModelId {
        let key = key.into();
        if let Some(&id) = self.by_name.get(&key) {
            log::warn!("Replacing model '{}'", key);
            self.models[id.0] = model;
            return id;
        }
        let id = ModelId(self.models.len());
        self.models.push(model);
        self.by_name.insert(key, id);
        id
    }

    pub fn id_of(&self, key: &str) -> Option<ModelId> {
        self.by_name.get(key).copied()
    }

    pub fn get(&self, id: ModelId) -> Option<&dyn Model> {
        self.models.get(id.0).map(|model| model.as_ref())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn advance(&mut self) {
        for model in &mut self.models {
            model.advance();
        }
    }

    pub fn poll(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        for model in &mut self.models {
            model.poll(device, queue);
        }
    }

    pub fn configure_textures(&mut self, device: &wgpu::Device, settings: TextureSettings) {
        for model in &mut self.models {
            model.configure_texture(device, settings);
        }
    }
}
