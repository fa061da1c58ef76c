use std::f32::consts::PI;

use cgmath::{InnerSpace, Vector2, Vector3};

use crate::model::ModelVertex;

/// Specular reflectance given to every sphere vertex
pub const SPHERE_SPECULAR: [f32; 3] = [1.0, 1.0, 1.0];
/// Phong exponent given to every sphere vertex
pub const SPHERE_SHININESS: f32 = 35.0;
/// Deepest subdivision we expect to be asked for (8 * 4^7 triangles)
pub const MAX_SUBDIVISION_DEPTH: u32 = 7;

/// Octahedron approximating the unit sphere, as 8 independent triangles.
/// Each triangle winds counter-clockwise when seen from outside.
const OCTAHEDRON: [[f32; 3]; 24] = [
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 1.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [-1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, -1.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 0.0, -1.0],
    [0.0, 1.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 0.0, -1.0],
    [-1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, -1.0],
    [0.0, -1.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 0.0, -1.0],
    [1.0, 0.0, 0.0],
    [0.0, -1.0, 0.0],
];

/// Number of triangles in the base octahedron
pub const BASE_TRIANGLES: usize = OCTAHEDRON.len() / 3;

/// CPU side geometry of a tessellated unit sphere.
///
/// Vertices are not shared between triangles, so `positions[i]` belongs to
/// triangle `i / 3`. Because the sphere is centred on the origin with radius
/// 1, normals are the positions themselves.
#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
    pub specular: Vec<[f32; 3]>,
    pub shininess: Vec<f32>,
}

impl SphereMesh {
    /// Subdivide the octahedron `depth` times, pushing every new edge
    /// midpoint back out onto the unit sphere.
    pub fn generate(depth: u32) -> Self {
        debug_assert!(
            depth <= MAX_SUBDIVISION_DEPTH,
            "sphere subdivision depth {} is unreasonably deep",
            depth
        );

        let mut positions: Vec<Vector3<f32>> = OCTAHEDRON
            .iter()
            .map(|&p| Vector3::from(p))
            .collect();

        for _ in 0..depth {
            let mut next = Vec::with_capacity(positions.len() * 4);
            for triangle in positions.chunks_exact(3) {
                split_triangle(triangle[0], triangle[1], triangle[2], &mut next);
            }
            positions = next;
        }

        let tex_coords = positions
            .iter()
            .map(|p| spherical_tex_coords(*p))
            .collect();
        let count = positions.len();

        Self {
            normals: positions.clone(),
            positions,
            tex_coords,
            specular: vec![SPHERE_SPECULAR; count],
            shininess: vec![SPHERE_SHININESS; count],
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Interleave into the shared vertex format. Sphere vertices are white so
    /// the lighting (and texture, when shown) decides the final colour.
    pub fn to_vertices(&self) -> Vec<ModelVertex> {
        (0..self.positions.len())
            .map(|i| ModelVertex {
                position: self.positions[i].into(),
                normal: self.normals[i].into(),
                color: [1.0, 1.0, 1.0],
                specular: self.specular[i],
                shininess: self.shininess[i],
                tex_coords: self.tex_coords[i].into(),
            })
            .collect()
    }
}

/// Split one triangle into four: the centre triangle made of the three edge
/// midpoints, then one corner triangle per original vertex.
fn split_triangle(
    a: Vector3<f32>,
    b: Vector3<f32>,
    c: Vector3<f32>,
    out: &mut Vec<Vector3<f32>>,
) {
    let ab = ((a + b) * 0.5).normalize();
    let bc = ((b + c) * 0.5).normalize();
    let ca = ((c + a) * 0.5).normalize();

    out.extend_from_slice(&[ab, bc, ca]);
    out.extend_from_slice(&[a, ab, ca]);
    out.extend_from_slice(&[b, bc, ab]);
    out.extend_from_slice(&[c, ca, bc]);
}

/// Equirectangular mapping of a unit direction.
///
/// `t` follows latitude. `s` follows longitude and is pinned to 0 at the
/// poles, where longitude is undefined.
pub fn spherical_tex_coords(direction: Vector3<f32>) -> Vector2<f32> {
    let t = direction.z.asin() / PI + 0.5;
    let s = if direction.z > -1.0 && direction.z < 1.0 {
        (direction.y.atan2(direction.x) / PI) * 0.5 + 0.5
    } else {
        0.0
    };
    Vector2::new(s, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_count_quadruples_per_level() {
        for depth in 0..=4 {
            let mesh = SphereMesh::generate(depth);
            let expected = BASE_TRIANGLES * 4usize.pow(depth);
            assert_eq!(mesh.triangle_count(), expected, "depth {}", depth);
            assert_eq!(mesh.positions.len(), 24 * 4usize.pow(depth));
            assert_eq!(mesh.tex_coords.len(), mesh.positions.len());
            assert_eq!(mesh.specular.len(), mesh.positions.len());
            assert_eq!(mesh.shininess.len(), mesh.positions.len());
        }
    }

    #[test]
    fn every_vertex_lies_on_unit_sphere() {
        for depth in 0..=4 {
            let mesh = SphereMesh::generate(depth);
            for p in &mesh.positions {
                assert!((p.magnitude() - 1.0).abs() < 1e-5, "{:?} off sphere", p);
            }
        }
    }

    #[test]
    fn normals_match_positions() {
        let mesh = SphereMesh::generate(2);
        assert_eq!(mesh.normals, mesh.positions);
    }

    #[test]
    fn tex_coords_stay_in_unit_square() {
        for depth in 0..=4 {
            let mesh = SphereMesh::generate(depth);
            for (p, uv) in mesh.positions.iter().zip(&mesh.tex_coords) {
                assert!((0.0..=1.0).contains(&uv.y), "t {} out of range", uv.y);
                if p.z == 1.0 || p.z == -1.0 {
                    assert_eq!(uv.x, 0.0);
                } else {
                    assert!((0.0..=1.0).contains(&uv.x), "s {} out of range", uv.x);
                }
            }
        }
    }

    #[test]
    fn poles_map_to_zero_longitude() {
        let north = spherical_tex_coords(Vector3::new(0.0, 0.0, 1.0));
        let south = spherical_tex_coords(Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(north.x, 0.0);
        assert!((north.y - 1.0).abs() < 1e-6);
        assert_eq!(south.x, 0.0);
        assert!(south.y.abs() < 1e-6);
    }

    #[test]
    fn equator_longitude_follows_atan2() {
        let uv = spherical_tex_coords(Vector3::new(0.0, 1.0, 0.0));
        assert!((uv.x - 0.75).abs() < 1e-6);
        assert!((uv.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn subdivided_triangles_keep_outward_winding() {
        let mesh = SphereMesh::generate(2);
        for tri in mesh.positions.chunks_exact(3) {
            let n = (tri[1] - tri[0]).cross(tri[2] - tri[0]);
            let centre = (tri[0] + tri[1] + tri[2]) / 3.0;
            assert!(n.dot(centre) > 0.0);
        }
    }

    #[test]
    fn interleaved_vertices_carry_material_constants() {
        let vertices = SphereMesh::generate(1).to_vertices();
        assert_eq!(vertices.len(), 96);
        assert!(vertices
            .iter()
            .all(|v| v.specular == SPHERE_SPECULAR && v.shininess == SPHERE_SHININESS));
    }
}
