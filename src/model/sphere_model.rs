use std::rc::Rc;

use cgmath::Matrix4;

use crate::{
    light::{LightBatch, ViewLight},
    primitives::sphere::SphereMesh,
    texture::TextureSettings,
    transform_stack::TransformStack,
};

use super::{
    material::Material, DrawCommand, DrawList, GpuMesh, Locals, Model, TextureOptions,
};

/// Built-in sphere models the scene file can name directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinSphere {
    pub name: &'static str,
    pub depth: u32,
    /// Texture file to load, relative to the asset root
    pub texture: Option<&'static str>,
}

pub const BUILTIN_SPHERES: &[BuiltinSphere] = &[
    BuiltinSphere { name: "Sphere2", depth: 2, texture: None },
    BuiltinSphere { name: "Sphere3", depth: 3, texture: None },
    BuiltinSphere { name: "Sphere4", depth: 4, texture: None },
    BuiltinSphere { name: "Moon", depth: 2, texture: Some("Moon.jpg") },
    BuiltinSphere { name: "Sun", depth: 3, texture: Some("Sun.jpg") },
    BuiltinSphere { name: "Earth", depth: 4, texture: Some("Earth.jpg") },
    BuiltinSphere { name: "mars", depth: 4, texture: Some("mars.jpg") },
    BuiltinSphere { name: "neptune", depth: 4, texture: Some("neptune.jpg") },
    BuiltinSphere { name: "saturn", depth: 4, texture: Some("saturn.jpg") },
    BuiltinSphere { name: "mercury", depth: 4, texture: Some("mercury.jpg") },
    BuiltinSphere { name: "uranus", depth: 4, texture: Some("uranus.jpg") },
    BuiltinSphere { name: "venus", depth: 4, texture: Some("venus.jpg") },
    BuiltinSphere { name: "jupiter", depth: 4, texture: Some("jupiter.jpg") },
];

pub fn builtin_sphere(name: &str) -> Option<BuiltinSphere> {
    BUILTIN_SPHERES.iter().find(|s| s.name == name).copied()
}

/// Tessellated unit sphere. Always back-face culled since it is closed.
pub struct SphereModel {
    name: String,
    mesh: GpuMesh,
    material: Material,
}

impl SphereModel {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material_layout: Rc<wgpu::BindGroupLayout>,
        builtin: BuiltinSphere,
    ) -> Self {
        let sphere = SphereMesh::generate(builtin.depth);
        log::info!(
            "Built sphere '{}' at depth {} ({} triangles)",
            builtin.name,
            builtin.depth,
            sphere.triangle_count()
        );
        let mesh = GpuMesh::new(device, builtin.name, &sphere.to_vertices());
        let material = Material::new(device, queue, material_layout, builtin.name, builtin.texture);

        Self {
            name: builtin.name.to_string(),
            mesh,
            material,
        }
    }
}

impl Model for SphereModel {
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
        draws.push(DrawCommand {
            mesh: &self.mesh,
            material: self.material.bind_group(),
            locals: Locals::new(stack.top(), projection, &batch, textured),
            cull_back: true,
        });
    }

    fn poll(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        self.material.poll(device, queue);
    }

    fn configure_texture(&mut self, device: &wgpu::Device, settings: TextureSettings) {
        self.material.configure(device, settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_plain_and_textured_spheres() {
        let plain = builtin_sphere("Sphere3").unwrap();
        assert_eq!(plain.depth, 3);
        assert!(plain.texture.is_none());

        let moon = builtin_sphere("Moon").unwrap();
        assert_eq!(moon.depth, 2);
        assert_eq!(moon.texture, Some("Moon.jpg"));

        assert!(builtin_sphere("models/cube.json").is_none());
    }
}
