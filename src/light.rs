use cgmath::{Matrix4, Point3, Vector4};
use serde::Deserialize;

/// How many lights the shader has slots for. Extra lights are dropped.
pub const MAX_LIGHTS: usize = 4;

/// A point light as written in the scene file, in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Light {
    pub location: [f32; 3],
    pub diffuse: [f32; 3],
    pub ambient: [f32; 3],
    pub specular: [f32; 3],
}

impl Light {
    /// Move the light into view space. Intensities are carried unchanged.
    pub fn to_view(&self, view: &Matrix4<f32>) -> ViewLight {
        let world = Point3::from(self.location);
        let position = *view * Vector4::new(world.x, world.y, world.z, 1.0);
        ViewLight {
            position: position.into(),
            diffuse: self.diffuse,
            ambient: self.ambient,
            specular: self.specular,
        }
    }
}

/// A light after the per-frame move into view space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewLight {
    pub position: [f32; 4],
    pub diffuse: [f32; 3],
    pub ambient: [f32; 3],
    pub specular: [f32; 3],
}

/// Fixed size light arrays as the shader expects them.
///
/// Unused slots are zero and switched off in `on`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightBatch {
    pub positions: [[f32; 4]; MAX_LIGHTS],
    pub diffuse: [[f32; 4]; MAX_LIGHTS],
    pub ambient: [[f32; 4]; MAX_LIGHTS],
    pub specular: [[f32; 4]; MAX_LIGHTS],
    pub on: [f32; MAX_LIGHTS],
}

impl LightBatch {
    pub fn pack(lights: &[ViewLight]) -> Self {
        let mut batch = Self {
            positions: [[0.0; 4]; MAX_LIGHTS],
            diffuse: [[0.0; 4]; MAX_LIGHTS],
            ambient: [[0.0; 4]; MAX_LIGHTS],
            specular: [[0.0; 4]; MAX_LIGHTS],
            on: [0.0; MAX_LIGHTS],
        };

        for (slot, light) in lights.iter().take(MAX_LIGHTS).enumerate() {
            batch.positions[slot] = light.position;
            batch.diffuse[slot] = extend(light.diffuse);
            batch.ambient[slot] = extend(light.ambient);
            batch.specular[slot] = extend(light.specular);
            batch.on[slot] = 1.0;
        }

        batch
    }

    pub fn active_count(&self) -> usize {
        self.on.iter().filter(|&&on| on != 0.0).count()
    }
}

fn extend(rgb: [f32; 3]) -> [f32; 4] {
    [rgb[0], rgb[1], rgb[2], 0.0]
}

/// Transform every scene light into view space for this frame
pub fn lights_to_view(lights: &[Light], view: &Matrix4<f32>) -> Vec<ViewLight> {
    lights.iter().map(|light| light.to_view(view)).collect()
}
