use std::marker::PhantomData;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use log::warn;
use wgpu::util::DeviceExt;

/// Uniform buffer holding a single `T`.
pub struct UniformBuffer<T> {
    buffer: wgpu::Buffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new(device: &wgpu::Device, label: &str, value: &T) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            buffer,
            _marker: PhantomData,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, value: &T) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(value));
    }

    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }

    pub const SIZE: u64 = std::mem::size_of::<T>() as u64;
}

/// Array of `T` addressed with dynamic offsets, one element per draw.
pub struct DynamicUniformBuffer<T> {
    buffer: wgpu::Buffer,
    stride: u64,
    capacity: usize,
    staging: Vec<u8>,
    _marker: PhantomData<T>,
}

impl<T: Pod> DynamicUniformBuffer<T> {
    pub fn new(device: &wgpu::Device, label: &str, capacity: usize) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = align_to(std::mem::size_of::<T>() as u64, alignment);
        let capacity = capacity.max(1);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            stride,
            capacity,
            staging: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Uploads `items`, element `i` landing at [`Self::offset`]`(i)`.
    pub fn write(&mut self, queue: &wgpu::Queue, items: &[T]) {
        let items = if items.len() > self.capacity {
            warn!(
                "Dropping {} per-draw uniforms past capacity {}",
                items.len() - self.capacity,
                self.capacity
            );
            &items[..self.capacity]
        } else {
            items
        };
        self.staging.clear();
        self.staging.resize(self.stride as usize * items.len(), 0);
        for (chunk, item) in self.staging.chunks_exact_mut(self.stride as usize).zip(items) {
            let bytes = bytemuck::bytes_of(item);
            chunk[..bytes.len()].copy_from_slice(bytes);
        }
        if !self.staging.is_empty() {
            queue.write_buffer(&self.buffer, 0, &self.staging);
        }
    }

    pub fn offset(&self, index: usize) -> u32 {
        (self.stride * index as u64) as u32
    }

    /// Binding covering one element.
    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: 0,
            size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        })
    }

    pub const SIZE: u64 = std::mem::size_of::<T>() as u64;
}

pub fn align_to(value: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// Per-frame camera block shared by the demo shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    /// Projection times the rotation-only view, for skyboxes.
    pub sky_view_proj: [[f32; 4]; 4],
    pub position: [f32; 4],
}

impl CameraUniform {
    pub fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        let rotation_only = Mat4::from_mat3(Mat3::from_mat4(view));
        Self {
            view_proj: (projection * view).to_cols_array_2d(),
            sky_view_proj: (projection * rotation_only).to_cols_array_2d(),
            position: position.extend(1.0).to_array(),
        }
    }
}

/// Model matrix with the matching normal matrix.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
}

impl ModelUniform {
    pub fn new(model: Mat4) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
        }
    }
}

/// Pads a 3x3 matrix to the column layout of WGSL's `mat3x4<f32>`.
pub fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_up_to_multiple() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
        assert_eq!(align_to(112, 0), 112);
    }

    #[test]
    fn uniform_sizes_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 144);
        assert_eq!(std::mem::size_of::<ModelUniform>(), 112);
    }

    #[test]
    fn sky_matrix_ignores_translation() {
        let view = Mat4::look_to_rh(Vec3::new(5.0, 1.0, -2.0), -Vec3::Z, Vec3::Y);
        let camera = CameraUniform::new(view, Mat4::IDENTITY, Vec3::new(5.0, 1.0, -2.0));
        let sky = Mat4::from_cols_array_2d(&camera.sky_view_proj);
        assert_eq!(sky.transform_point3(Vec3::ZERO), Vec3::ZERO);
        assert_eq!(camera.position, [5.0, 1.0, -2.0, 1.0]);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let uniform = ModelUniform::new(Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)));
        assert_eq!(uniform.normal[0], [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(uniform.normal[1], [0.0, 1.0, 0.0, 0.0]);
    }
}
