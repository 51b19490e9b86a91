use std::f32::consts::{PI, TAU};
use std::ops::Range;
use std::path::Path;

use glam::{Vec2, Vec3};
use log::info;

use crate::error::AssetError;
use crate::obj::load_obj_from_str as parse_obj;

/// Full vertex produced by the generators. Demos convert it into their own
/// GPU vertex format through `From<MeshVertex>`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MeshVertex {
    pub position: Vec3,
    pub uv: Vec2,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

/// Range of triangle-list vertices inside a shared vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshSlice {
    pub start: u32,
    pub count: u32,
}

impl MeshSlice {
    pub fn range(&self) -> Range<u32> {
        self.start..self.start + self.count
    }
}

/// Appends generated geometry to a single vertex array.
///
/// Every generator returns the slice it wrote so several meshes can share one
/// vertex buffer and be drawn with `draw(slice.range(), ..)`.
#[derive(Debug, Clone)]
pub struct MeshBuilder<V> {
    vertices: Vec<V>,
}

impl<V> Default for MeshBuilder<V> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
        }
    }
}

impl<V: From<MeshVertex>> MeshBuilder<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> &[V] {
        &self.vertices
    }

    pub fn into_vertices(self) -> Vec<V> {
        self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Appends already complete vertices, three per triangle.
    pub fn push_vertices(&mut self, vertices: impl IntoIterator<Item = MeshVertex>) -> MeshSlice {
        let start = self.vertices.len() as u32;
        self.vertices.extend(vertices.into_iter().map(V::from));
        MeshSlice {
            start,
            count: self.vertices.len() as u32 - start,
        }
    }

    /// Appends triangles and fills in their tangent frames.
    pub fn push_triangles(
        &mut self,
        triangles: impl IntoIterator<Item = [MeshVertex; 3]>,
    ) -> MeshSlice {
        self.push_vertices(triangles.into_iter().flat_map(|mut triangle| {
            let (tangent, bitangent) = triangle_tangents(
                [
                    triangle[0].position,
                    triangle[1].position,
                    triangle[2].position,
                ],
                [triangle[0].uv, triangle[1].uv, triangle[2].uv],
            );
            for vertex in &mut triangle {
                vertex.tangent = tangent;
                vertex.bitangent = bitangent;
            }
            triangle
        }))
    }

    /// 2x2 quad in the XY plane facing +Z.
    pub fn gen_quad(&mut self) -> MeshSlice {
        let normal = Vec3::Z;
        let corner = |x: f32, y: f32, u: f32, v: f32| MeshVertex {
            position: Vec3::new(x, y, 0.0),
            uv: Vec2::new(u, v),
            normal,
            ..Default::default()
        };
        let p1 = corner(-1.0, 1.0, 0.0, 1.0);
        let p2 = corner(-1.0, -1.0, 0.0, 0.0);
        let p3 = corner(1.0, -1.0, 1.0, 0.0);
        let p4 = corner(1.0, 1.0, 1.0, 1.0);
        self.push_triangles([[p1, p2, p3], [p1, p3, p4]])
    }

    /// Axis aligned cube centred on the origin with per-face normals.
    pub fn gen_cube(&mut self, half_extent: f32) -> MeshSlice {
        // (normal, u axis, v axis)
        const FACES: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut triangles = Vec::with_capacity(12);
        for (normal, u_axis, v_axis) in FACES {
            let corner = |u: f32, v: f32| MeshVertex {
                position: (normal + u_axis * (u * 2.0 - 1.0) + v_axis * (v * 2.0 - 1.0))
                    * half_extent,
                uv: Vec2::new(u, v),
                normal,
                ..Default::default()
            };
            let a = corner(0.0, 0.0);
            let b = corner(1.0, 0.0);
            let c = corner(1.0, 1.0);
            let d = corner(0.0, 1.0);
            triangles.push(outward([a, b, c]));
            triangles.push(outward([a, c, d]));
        }
        self.push_triangles(triangles)
    }

    /// Latitude/longitude unit sphere.
    ///
    /// Triangles that collapse at the poles are skipped, leaving
    /// `6 * lon * (lat - 1)` vertices.
    pub fn gen_uv_sphere(&mut self, lat: u32, lon: u32) -> MeshSlice {
        let lat = lat.max(2);
        let lon = lon.max(3);
        let point = |i: u32, j: u32| {
            let theta = i as f32 * PI / lat as f32;
            let phi = j as f32 * TAU / lon as f32;
            let position = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
            MeshVertex {
                position,
                uv: Vec2::new(j as f32 / lon as f32, 1.0 - i as f32 / lat as f32),
                normal: position,
                ..Default::default()
            }
        };

        let mut triangles = Vec::with_capacity((2 * lat * lon) as usize);
        for i in 0..lat {
            for j in 0..lon {
                let a = point(i, j);
                let b = point(i + 1, j);
                let c = point(i + 1, j + 1);
                let d = point(i, j + 1);
                if i + 1 != lat {
                    triangles.push([a, c, b]);
                }
                if i != 0 {
                    triangles.push([a, d, c]);
                }
            }
        }
        self.push_triangles(triangles)
    }

    /// Subdivided icosahedron projected on the unit sphere.
    pub fn gen_icosphere(&mut self, subdivisions: u32) -> MeshSlice {
        let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
        let corners = [
            Vec3::new(-1.0, t, 0.0),
            Vec3::new(1.0, t, 0.0),
            Vec3::new(-1.0, -t, 0.0),
            Vec3::new(1.0, -t, 0.0),
            Vec3::new(0.0, -1.0, t),
            Vec3::new(0.0, 1.0, t),
            Vec3::new(0.0, -1.0, -t),
            Vec3::new(0.0, 1.0, -t),
            Vec3::new(t, 0.0, -1.0),
            Vec3::new(t, 0.0, 1.0),
            Vec3::new(-t, 0.0, -1.0),
            Vec3::new(-t, 0.0, 1.0),
        ]
        .map(Vec3::normalize);
        const FACES: [[usize; 3]; 20] = [
            [0, 11, 5],
            [0, 5, 1],
            [0, 1, 7],
            [0, 7, 10],
            [0, 10, 11],
            [1, 5, 9],
            [5, 11, 4],
            [11, 10, 2],
            [10, 7, 6],
            [7, 1, 8],
            [3, 9, 4],
            [3, 4, 2],
            [3, 2, 6],
            [3, 6, 8],
            [3, 8, 9],
            [4, 9, 5],
            [2, 4, 11],
            [6, 2, 10],
            [8, 6, 7],
            [9, 8, 1],
        ];

        let mut faces: Vec<[Vec3; 3]> = FACES
            .iter()
            .map(|face| [corners[face[0]], corners[face[1]], corners[face[2]]])
            .collect();
        for _ in 0..subdivisions {
            faces = faces
                .into_iter()
                .flat_map(|[a, b, c]| {
                    let ab = ((a + b) * 0.5).normalize();
                    let bc = ((b + c) * 0.5).normalize();
                    let ca = ((c + a) * 0.5).normalize();
                    [[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]
                })
                .collect();
        }

        let vertex = |position: Vec3| MeshVertex {
            position,
            uv: spherical_uv(position),
            normal: position,
            ..Default::default()
        };
        self.push_triangles(
            faces
                .into_iter()
                .map(|[a, b, c]| outward([vertex(a), vertex(b), vertex(c)])),
        )
    }

    /// Loads an OBJ file from disk, scaling positions by `scale`.
    pub fn load_obj(
        &mut self,
        path: impl AsRef<Path>,
        scale: f32,
    ) -> Result<MeshSlice, AssetError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let slice = self
            .load_obj_from_str(&source, scale)
            .map_err(|err| match err {
                AssetError::Obj { message, .. } => AssetError::Obj {
                    path: path.to_path_buf(),
                    message,
                },
                other => other,
            })?;
        info!(
            "Load mesh '{}' ({} triangles)",
            path.display(),
            slice.count / 3
        );
        Ok(slice)
    }

    /// Parses OBJ source text, scaling positions by `scale`.
    pub fn load_obj_from_str(&mut self, source: &str, scale: f32) -> Result<MeshSlice, AssetError> {
        let mesh = parse_obj(source).map_err(|err| AssetError::Obj {
            path: "<memory>".into(),
            message: format!("{err:#}"),
        })?;
        let to_vertex = |v: crate::obj::ObjVertex| MeshVertex {
            position: v.position * scale,
            uv: v.uv,
            normal: v.normal,
            ..Default::default()
        };
        let triangles: Vec<_> = mesh.triangles().map(|t| t.map(to_vertex)).collect();
        Ok(self.push_triangles(triangles))
    }
}

/// Tangent and bitangent of a triangle from its edges and UV deltas.
///
/// When the UV mapping is degenerate an arbitrary orthonormal basis around
/// the face normal is returned instead.
pub fn triangle_tangents(positions: [Vec3; 3], uvs: [Vec2; 3]) -> (Vec3, Vec3) {
    let edge1 = positions[1] - positions[0];
    let edge2 = positions[2] - positions[0];
    let delta_uv1 = uvs[1] - uvs[0];
    let delta_uv2 = uvs[2] - uvs[0];

    let det = delta_uv1.x * delta_uv2.y - delta_uv2.x * delta_uv1.y;
    if det.abs() > 1e-8 {
        let f = 1.0 / det;
        let tangent = f * (delta_uv2.y * edge1 - delta_uv1.y * edge2);
        let bitangent = f * (-delta_uv2.x * edge1 + delta_uv1.x * edge2);
        if tangent.length_squared() > f32::EPSILON && bitangent.length_squared() > f32::EPSILON {
            return (tangent.normalize(), bitangent.normalize());
        }
    }

    let normal = edge1.cross(edge2).normalize_or_zero();
    if normal == Vec3::ZERO {
        return (Vec3::X, Vec3::Y);
    }
    let (tangent, bitangent) = normal.any_orthonormal_pair();
    (tangent, bitangent)
}

fn spherical_uv(direction: Vec3) -> Vec2 {
    Vec2::new(
        0.5 + direction.z.atan2(direction.x) / TAU,
        0.5 + direction.y.clamp(-1.0, 1.0).asin() / PI,
    )
}

/// Swaps the winding of a triangle that faces the origin.
fn outward(mut triangle: [MeshVertex; 3]) -> [MeshVertex; 3] {
    let [a, b, c] = triangle.map(|v| v.position);
    let centroid = (a + b + c) / 3.0;
    if (b - a).cross(c - a).dot(centroid) < 0.0 {
        triangle.swap(1, 2);
    }
    triangle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward(vertices: &[MeshVertex]) {
        for triangle in vertices.chunks_exact(3) {
            let [a, b, c] = [triangle[0].position, triangle[1].position, triangle[2].position];
            let centroid = (a + b + c) / 3.0;
            assert!(
                (b - a).cross(c - a).dot(centroid) > 0.0,
                "triangle {a} {b} {c} faces inward"
            );
        }
    }

    #[test]
    fn quad_has_x_tangent_and_y_bitangent() {
        let mut builder = MeshBuilder::<MeshVertex>::new();
        let slice = builder.gen_quad();
        assert_eq!(slice, MeshSlice { start: 0, count: 6 });
        for vertex in builder.vertices() {
            assert!((vertex.tangent - Vec3::X).length() < 1e-5);
            assert!((vertex.bitangent - Vec3::Y).length() < 1e-5);
            assert_eq!(vertex.normal, Vec3::Z);
        }
        for triangle in builder.vertices().chunks_exact(3) {
            let n = (triangle[1].position - triangle[0].position)
                .cross(triangle[2].position - triangle[0].position);
            assert!(n.z > 0.0);
        }
    }

    #[test]
    fn uv_sphere_skips_pole_triangles() {
        let mut builder = MeshBuilder::<MeshVertex>::new();
        let slice = builder.gen_uv_sphere(48, 64);
        assert_eq!(slice.count, 6 * 64 * 47);
        assert_outward(builder.vertices());
        for vertex in builder.vertices() {
            assert!((vertex.position.length() - 1.0).abs() < 1e-5);
            assert_eq!(vertex.normal, vertex.position);
        }
    }

    #[test]
    fn icosphere_counts_and_orientation() {
        for subdivisions in 0..3 {
            let mut builder = MeshBuilder::<MeshVertex>::new();
            let slice = builder.gen_icosphere(subdivisions);
            assert_eq!(slice.count, 60 * 4u32.pow(subdivisions));
            assert_outward(builder.vertices());
            for vertex in builder.vertices() {
                assert!((vertex.position.length() - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn cube_faces_point_outward() {
        let mut builder = MeshBuilder::<MeshVertex>::new();
        let slice = builder.gen_cube(1.0);
        assert_eq!(slice.count, 36);
        assert_outward(builder.vertices());
        for vertex in builder.vertices() {
            assert!(vertex.position.abs().max_element() <= 1.0 + 1e-6);
            assert!(vertex.position.dot(vertex.normal) > 0.0);
        }
    }

    #[test]
    fn slices_are_consecutive() {
        let mut builder = MeshBuilder::<MeshVertex>::new();
        let quad = builder.gen_quad();
        let cube = builder.gen_cube(0.5);
        assert_eq!(cube.start, quad.count);
        assert_eq!(builder.len() as u32, quad.count + cube.count);
        assert_eq!(cube.range(), 6..42);
    }

    #[test]
    fn tangent_frame_is_orthogonal_to_normal_on_sphere() {
        let mut builder = MeshBuilder::<MeshVertex>::new();
        builder.gen_uv_sphere(16, 16);
        for triangle in builder.vertices().chunks_exact(3) {
            let face_normal = (triangle[1].position - triangle[0].position)
                .cross(triangle[2].position - triangle[0].position)
                .normalize();
            let tangent = triangle[0].tangent;
            assert!((tangent.length() - 1.0).abs() < 1e-4);
            assert!(tangent.dot(face_normal).abs() < 1e-3);
        }
    }

    #[test]
    fn degenerate_uvs_fall_back_to_orthonormal_basis() {
        let (tangent, bitangent) = triangle_tangents(
            [Vec3::ZERO, Vec3::X, Vec3::Y],
            [Vec2::ZERO, Vec2::ZERO, Vec2::ZERO],
        );
        assert!(tangent.dot(Vec3::Z).abs() < 1e-5);
        assert!(bitangent.dot(Vec3::Z).abs() < 1e-5);
        assert!(tangent.dot(bitangent).abs() < 1e-5);
    }

    #[test]
    fn obj_source_is_scaled() {
        let mut builder = MeshBuilder::<MeshVertex>::new();
        let slice = builder
            .load_obj_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n", 2.0)
            .unwrap();
        assert_eq!(slice.count, 3);
        assert_eq!(builder.vertices()[1].position, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn bad_texcoord_index_is_an_obj_error() {
        let mut builder = MeshBuilder::<MeshVertex>::new();
        let err = builder
            .load_obj_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/7 2/7 3/7\n", 1.0)
            .unwrap_err();
        match err {
            AssetError::Obj { message, .. } => assert!(message.contains("texcoord index 7")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(builder.vertices().is_empty());
    }

    #[test]
    fn missing_obj_file_reports_io_error() {
        let mut builder = MeshBuilder::<MeshVertex>::new();
        let err = builder.load_obj("does/not/exist.obj", 1.0).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }
}
