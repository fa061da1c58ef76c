use cgmath::{prelude::*, Deg, Matrix4, Point3, Vector3};
use serde::Deserialize;

// cgmath builds OpenGL style clip space (z in -1..1), wgpu wants z in 0..1
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Degrees of orbit per pixel of pointer drag
const DRAG_DEGREES_PER_PIXEL: f32 = 0.5;

/// Camera as the scene file defines it. Never modified; the live [`Camera`]
/// is a copy so it can always be reset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CameraDescription {
    pub location: [f32; 3],
    #[serde(rename = "lookAt")]
    pub look_at: [f32; 3],
    #[serde(rename = "approxUp")]
    pub approx_up: [f32; 3],
    #[serde(rename = "FOVdeg")]
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    #[serde(default = "default_perspective")]
    pub perspective: bool,
}

fn default_perspective() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
    pub perspective: bool,
}

impl Camera {
    pub fn from_description(description: &CameraDescription) -> Self {
        Self {
            eye: Point3::from(description.location),
            target: Point3::from(description.look_at),
            up: Vector3::from(description.approx_up),
            fovy: description.fov_deg,
            znear: description.near,
            zfar: description.far,
            perspective: description.perspective,
        }
    }

    pub fn look_at_distance(&self) -> f32 {
        (self.eye - self.target).magnitude()
    }

    /// Half height of the orthographic view volume. Matching the perspective
    /// frustum's half height at the look-at distance keeps objects there the
    /// same size when switching modes.
    pub fn ortho_half_height(&self) -> f32 {
        self.look_at_distance() * Deg(0.5 * self.fovy).tan()
    }

    pub fn build_projection_matrix(&self, aspect: f32) -> Matrix4<f32> {
        let proj = if self.perspective {
            cgmath::perspective(Deg(self.fovy), aspect, self.znear, self.zfar)
        } else {
            let half = self.ortho_half_height();
            cgmath::ortho(
                -aspect * half,
                aspect * half,
                -half,
                half,
                self.znear,
                self.zfar,
            )
        };
        OPENGL_TO_WGPU_MATRIX * proj
    }

    pub fn build_view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, self.up)
    }

    /// View transform with the user's drag orbit applied around the look-at
    /// point: move the look-at point to the origin, rotate, move it back.
    pub fn build_orbit_view_matrix(&self, orbit: &OrbitController) -> Matrix4<f32> {
        let distance = self.look_at_distance();
        let (rotation_x, rotation_y) = orbit.rotation();
        Matrix4::from_translation(Vector3::new(0.0, 0.0, -distance))
            * Matrix4::from_angle_x(Deg(rotation_y))
            * Matrix4::from_angle_y(Deg(rotation_x))
            * Matrix4::from_translation(Vector3::new(0.0, 0.0, distance))
            * self.build_view_matrix()
    }
}

/// Pointer drag state for orbiting the camera.
///
/// Rotation is measured from where the drag started, so each move replaces
/// the rotation rather than adding to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrbitController {
    dragging: bool,
    down_x: f32,
    down_y: f32,
    down_rotation_x: f32,
    down_rotation_y: f32,
    rotation_x: f32,
    rotation_y: f32,
}

impl OrbitController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Degrees about the view's y axis (from horizontal drag) and x axis
    /// (from vertical drag)
    pub fn rotation(&self) -> (f32, f32) {
        (self.rotation_x, self.rotation_y)
    }

    pub fn begin_drag(&mut self, x: f32, y: f32) {
        self.dragging = true;
        self.down_x = x;
        self.down_y = y;
        self.down_rotation_x = self.rotation_x;
        self.down_rotation_y = self.rotation_y;
    }

    pub fn drag_to(&mut self, x: f32, y: f32) {
        if !self.dragging {
            return;
        }
        let delta_x = self.down_x - x;
        let delta_y = self.down_y - y;
        self.rotation_x = delta_x * DRAG_DEGREES_PER_PIXEL + self.down_rotation_x;
        self.rotation_y = delta_y * DRAG_DEGREES_PER_PIXEL + self.down_rotation_y;
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
