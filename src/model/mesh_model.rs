use std::rc::Rc;

use cgmath::Matrix4;

use crate::{
    error::LoadError,
    light::{LightBatch, ViewLight},
    resources::{self, MeshData},
    texture::TextureSettings,
    transform_stack::TransformStack,
};

use super::{
    material::Material, DrawCommand, DrawList, GpuMesh, Locals, Model, TextureOptions,
};

/// How far a scrolling texture slides along `s` and `t` each frame
pub const TEXTURE_SCROLL_STEP: f32 = 0.01;

/// A model loaded from a mesh file, either the JSON face format or OBJ
pub struct MeshModel {
    name: String,
    mesh: GpuMesh,
    material: Material,
    backface_cull: bool,
    scroll_texture: bool,
    texture_offset: [f32; 2],
}

impl MeshModel {
    pub async fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: Rc<wgpu::BindGroupLayout>,
        url: &str,
    ) -> Result<Self, LoadError> {
        let data = if url.to_ascii_lowercase().ends_with(".obj") {
            resources::load_obj_mesh(url).await?
        } else {
            resources::load_json_mesh(url).await?
        };
        log::info!("Loaded mesh '{}' ({} vertices)", url, data.vertices.len());
        Ok(Self::from_data(device, queue, material_layout, url, data))
    }

    pub fn from_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: Rc<wgpu::BindGroupLayout>,
        name: &str,
        data: MeshData,
    ) -> Self {
        let mesh = GpuMesh::new(device, name, &data.vertices);
        let material = Material::new(
            device,
            queue,
            material_layout,
            name,
            data.texture_url.as_deref(),
        );

        Self {
            name: name.to_string(),
            mesh,
            material,
            backface_cull: data.backface_cull,
            scroll_texture: data.scroll_texture,
            texture_offset: [0.0, 0.0],
        }
    }
}

impl Model for MeshModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn redraw<'a>(
        &'a self,
        stack: &TransformStack,
        projection: &Matrix4<f32>,
        lights: &[ViewLight],
        texture: TextureOptions,
        draws: &mut DrawList<'a>,
    ) {
        let batch = LightBatch::pack(lights);
        let textured = texture.show && self.material.is_textured();
        let locals = Locals::new(stack.top(), projection, &batch, textured);
        let locals = if self.scroll_texture {
            locals.with_texture_transform(self.texture_offset, texture.scale)
        } else {
            locals
        };
        draws.push(DrawCommand {
            mesh: &self.mesh,
            material: self.material.bind_group(),
            locals,
            cull_back: self.backface_cull,
        });
    }

    fn advance(&mut self) {
        if self.scroll_texture {
            self.texture_offset = advance_scroll(self.texture_offset);
        }
    }

    fn poll(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.material.poll(device, queue);
    }

    fn configure_texture(&mut self, device: &wgpu::Device, settings: TextureSettings) {
        self.material.configure(device, settings);
    }
}

/// One frame of texture scroll. Offsets wrap at 1 so they keep their
/// precision on long runs; repeat-wrapped textures look the same either way.
fn advance_scroll(offset: [f32; 2]) -> [f32; 2] {
    offset.map(|o| (o + TEXTURE_SCROLL_STEP).rem_euclid(1.0))
}
