use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};

/// Vertex produced by the OBJ loader.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ObjVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// Indexed triangle mesh parsed from an OBJ file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjMesh {
    pub vertices: Vec<ObjVertex>,
    pub indices: Vec<u32>,
}

impl ObjMesh {
    /// Expands the index buffer into a flat triangle list.
    pub fn triangles(&self) -> impl Iterator<Item = [ObjVertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(|triangle| {
            [
                self.vertices[triangle[0] as usize],
                self.vertices[triangle[1] as usize],
                self.vertices[triangle[2] as usize],
            ]
        })
    }
}

/// Parses an OBJ file from memory.
///
/// Polygons are triangulated as fans. Vertices sharing the same
/// position/texcoord/normal triple are merged. Missing normals are
/// reconstructed from the surrounding faces. Material statements are ignored.
pub fn load_obj_from_str(data: &str) -> Result<ObjMesh> {
    let mut positions = Vec::new();
    let mut texcoords = Vec::new();
    let mut normals = Vec::new();
    let mut faces: Vec<[FaceIndex; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vt" => texcoords.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid texcoord on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                triangulate_face(&polygon, &mut faces);
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let mut mesh = build_mesh(&positions, &texcoords, &normals, &faces)?;
    if needs_normals(&mesh.vertices) {
        compute_normals(&mut mesh);
    }
    Ok(mesh)
}

fn parse_component<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<f32> {
    Ok(parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?)
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let x = parse_component(&mut parts)?;
    let y = parse_component(&mut parts)?;
    let z = parse_component(&mut parts)?;
    Ok(Vec3::new(x, y, z))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let u = parse_component(&mut parts)?;
    // `vt u` is legal, v defaults to zero.
    let v = match parts.next() {
        Some(value) => value.parse::<f32>()?,
        None => 0.0,
    };
    Ok(Vec2::new(u, v))
}

fn parse_optional_index(segment: Option<&str>) -> Result<i32> {
    match segment {
        Some(s) if !s.is_empty() => Ok(s.parse::<i32>()?),
        _ => Ok(0),
    }
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = parse_optional_index(segments.next())?;
        let vn = parse_optional_index(segments.next())?;
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..(polygon.len() - 1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    texcoord: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

fn build_mesh(
    positions: &[Vec3],
    texcoords: &[Vec2],
    normals: &[Vec3],
    faces: &[[FaceIndex; 3]],
) -> Result<ObjMesh> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in faces {
        for idx in face {
            let position = fix_index(idx.v, positions.len())
                .ok_or_else(|| anyhow!("invalid vertex index {}", idx.v))?;
            let key = Key {
                position,
                texcoord: fix_optional_index(idx.vt, texcoords.len(), "texcoord")?,
                normal: fix_optional_index(idx.vn, normals.len(), "normal")?,
            };
            let next_index = vertices.len() as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                vertices.push(ObjVertex {
                    position: positions[key.position],
                    normal: key.normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO),
                    uv: key.texcoord.map(|i| texcoords[i]).unwrap_or(Vec2::ZERO),
                });
                next_index
            });
            indices.push(*entry);
        }
    }

    Ok(ObjMesh { vertices, indices })
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

/// Zero means the face left the attribute out.
fn fix_optional_index(index: i32, len: usize, kind: &str) -> Result<Option<usize>> {
    if index == 0 {
        return Ok(None);
    }
    fix_index(index, len)
        .map(Some)
        .ok_or_else(|| anyhow!("invalid {kind} index {index}"))
}

fn needs_normals(vertices: &[ObjVertex]) -> bool {
    vertices.iter().any(|vertex| vertex.normal == Vec3::ZERO)
}

fn compute_normals(mesh: &mut ObjMesh) {
    let mut accum = vec![Vec3::ZERO; mesh.vertices.len()];

    for triangle in mesh.indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;
        let p0 = mesh.vertices[i0].position;
        let p1 = mesh.vertices[i1].position;
        let p2 = mesh.vertices[i2].position;
        let normal = (p1 - p0).cross(p2 - p0);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    for (vertex, normal) in mesh.vertices.iter_mut().zip(accum) {
        if vertex.normal == Vec3::ZERO {
            vertex.normal = normal.normalize_or_zero();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices.len(), 3);
    }

    #[test]
    fn computes_missing_normals() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_str(obj).unwrap();
        for vertex in &mesh.vertices {
            assert!((vertex.normal - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn reads_texcoords_and_normals() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
                   vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
                   vn 0 0 1\n\
                   f 1/1/1 2/2/1 3/3/1 4/4/1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.vertices[2].uv, Vec2::new(1.0, 1.0));
        assert_eq!(mesh.triangles().count(), 2);
    }

    #[test]
    fn supports_negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert_eq!(mesh.vertices[1].position, Vec3::X);
    }

    #[test]
    fn reports_line_of_bad_face() {
        let obj = "v 0 0 0\nv 1 0 0\nf 1 2\n";
        let err = load_obj_from_str(obj).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        assert!(load_obj_from_str(obj).is_err());
    }

    #[test]
    fn rejects_out_of_range_texcoord_and_normal_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2/1 3/4\n";
        let err = load_obj_from_str(obj).unwrap_err();
        assert!(err.to_string().contains("invalid texcoord index 4"));

        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//-2\n";
        let err = load_obj_from_str(obj).unwrap_err();
        assert!(err.to_string().contains("invalid normal index -2"));
    }

    #[test]
    fn omitted_texcoords_are_not_errors() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        let mesh = load_obj_from_str(obj).unwrap();
        assert!(mesh.vertices.iter().all(|vertex| vertex.uv == Vec2::ZERO));
    }
}
