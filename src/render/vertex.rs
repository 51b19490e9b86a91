use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::mesh::{MeshSlice, MeshVertex};

/// GPU vertex with a layout matching the `@location`s of its shaders.
pub trait Vertex: Pod + From<MeshVertex> {
    fn layout() -> wgpu::VertexBufferLayout<'static>;
}

macro_rules! vertex_layout {
    ($ty:ty, $attribs:expr) => {
        impl Vertex for $ty {
            fn layout() -> wgpu::VertexBufferLayout<'static> {
                const ATTRIBUTES: &[wgpu::VertexAttribute] = &$attribs;
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<$ty>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: ATTRIBUTES,
                }
            }
        }
    };
}

/// Position only. Skybox and volume cubes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: [f32; 3],
}

impl From<MeshVertex> for PositionVertex {
    fn from(vertex: MeshVertex) -> Self {
        Self {
            position: vertex.position.to_array(),
        }
    }
}

vertex_layout!(PositionVertex, wgpu::vertex_attr_array![0 => Float32x3]);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PosUvVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

impl From<MeshVertex> for PosUvVertex {
    fn from(vertex: MeshVertex) -> Self {
        Self {
            position: vertex.position.to_array(),
            uv: vertex.uv.to_array(),
        }
    }
}

vertex_layout!(
    PosUvVertex,
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2]
);

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PosNormalVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl From<MeshVertex> for PosNormalVertex {
    fn from(vertex: MeshVertex) -> Self {
        Self {
            position: vertex.position.to_array(),
            normal: vertex.normal.to_array(),
        }
    }
}

vertex_layout!(
    PosNormalVertex,
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3]
);

/// Position, normal and texture coordinates for the PBR spheres.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PbrVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl From<MeshVertex> for PbrVertex {
    fn from(vertex: MeshVertex) -> Self {
        Self {
            position: vertex.position.to_array(),
            normal: vertex.normal.to_array(),
            uv: vertex.uv.to_array(),
        }
    }
}

vertex_layout!(
    PbrVertex,
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2]
);

/// Full tangent frame for normal mapping.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TangentVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl From<MeshVertex> for TangentVertex {
    fn from(vertex: MeshVertex) -> Self {
        Self {
            position: vertex.position.to_array(),
            uv: vertex.uv.to_array(),
            normal: vertex.normal.to_array(),
            tangent: vertex.tangent.to_array(),
            bitangent: vertex.bitangent.to_array(),
        }
    }
}

vertex_layout!(
    TangentVertex,
    wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2,
        2 => Float32x3,
        3 => Float32x3,
        4 => Float32x3
    ]
);

/// Non-indexed vertex buffer shared by every mesh of a demo.
pub struct VertexBuffer {
    buffer: wgpu::Buffer,
    len: u32,
}

impl VertexBuffer {
    pub fn new<V: Vertex>(device: &wgpu::Device, label: &str, vertices: &[V]) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self {
            buffer,
            len: vertices.len() as u32,
        }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bind<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, slot: u32) {
        pass.set_vertex_buffer(slot, self.buffer.slice(..));
    }

    pub fn draw(pass: &mut wgpu::RenderPass<'_>, mesh: MeshSlice) {
        pass.draw(mesh.range(), 0..1);
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};

    use super::*;

    #[test]
    fn strides_match_attribute_sizes() {
        assert_eq!(PositionVertex::layout().array_stride, 12);
        assert_eq!(PosUvVertex::layout().array_stride, 20);
        assert_eq!(PbrVertex::layout().array_stride, 32);
        assert_eq!(TangentVertex::layout().array_stride, 56);
        let last = TangentVertex::layout().attributes[4];
        assert_eq!(last.offset, 44);
        assert_eq!(last.shader_location, 4);
    }

    #[test]
    fn converts_mesh_vertices() {
        let vertex = MeshVertex {
            position: Vec3::new(1.0, 2.0, 3.0),
            uv: Vec2::new(0.25, 0.75),
            normal: Vec3::Z,
            tangent: Vec3::X,
            bitangent: Vec3::Y,
        };
        let pbr = PbrVertex::from(vertex);
        assert_eq!(pbr.uv, [0.25, 0.75]);
        assert_eq!(pbr.normal, [0.0, 0.0, 1.0]);
        let tangent = TangentVertex::from(vertex);
        assert_eq!(tangent.bitangent, [0.0, 1.0, 0.0]);
    }
}
