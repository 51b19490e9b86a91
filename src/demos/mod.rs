//! The demo registry and the per-frame contract every demo implements.

mod ibl;
mod mipmap;
mod normal_map;
mod pbr;
mod skybox;
mod texture_3d;

use std::fmt;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::camera::{Camera, CameraInputs};
use crate::image_data::MediaDir;
use crate::mesh::MeshSlice;
use crate::render::{
    uniform_entry, CameraUniform, DynamicUniformBuffer, GpuContext, UniformBuffer,
};
use crate::ui::UiOverlay;

pub use ibl::IblDemo;
pub use mipmap::{MipmapDemo, TextureFilter};
pub use normal_map::{DebugMode, NormalMapDemo};
pub use pbr::PbrDemo;
pub use skybox::SkyboxDemo;
pub use texture_3d::Texture3dDemo;

/// A self-contained scene. Resources live as long as the demo value.
pub trait Demo {
    fn name(&self) -> &'static str;

    /// Draws the demo's controls into `frame.ui` and records its passes.
    fn update_and_render(&mut self, frame: &mut DemoFrame<'_>);
}

/// Per-frame state handed to the active demo.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoInputs {
    pub window_size: (u32, u32),
    pub camera: CameraInputs,
    /// Seconds since start.
    pub time: f32,
    pub delta_time: f32,
}

impl DemoInputs {
    pub fn aspect(&self) -> f32 {
        self.window_size.0 as f32 / self.window_size.1.max(1) as f32
    }
}

pub struct DemoFrame<'a> {
    pub gpu: &'a GpuContext,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub target: &'a wgpu::TextureView,
    pub ui: &'a egui::Context,
    pub inputs: DemoInputs,
}

impl DemoFrame<'_> {
    /// Main pass over the window, clearing colour and depth.
    pub fn begin_pass(&mut self, label: &str, clear: wgpu::Color) -> wgpu::RenderPass<'_> {
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.gpu.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}

/// What a demo constructor gets to build its resources with.
pub struct DemoSetup<'a> {
    pub gpu: &'a GpuContext,
    pub ui: &'a mut UiOverlay,
    pub media: &'a MediaDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DemoKind {
    Mipmap,
    NormalMap,
    Pbr,
    Ibl,
    Skybox,
    Texture3d,
}

impl DemoKind {
    pub const ALL: [DemoKind; 6] = [
        DemoKind::Mipmap,
        DemoKind::NormalMap,
        DemoKind::Pbr,
        DemoKind::Ibl,
        DemoKind::Skybox,
        DemoKind::Texture3d,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            DemoKind::Mipmap => "mipmap",
            DemoKind::NormalMap => "normal-map",
            DemoKind::Pbr => "pbr",
            DemoKind::Ibl => "ibl",
            DemoKind::Skybox => "skybox",
            DemoKind::Texture3d => "texture-3d",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DemoKind::Mipmap => "Mipmap",
            DemoKind::NormalMap => "Normal map",
            DemoKind::Pbr => "PBR",
            DemoKind::Ibl => "IBL",
            DemoKind::Skybox => "Skybox & Reflection & Refraction",
            DemoKind::Texture3d => "Texture 3D",
        }
    }

    /// Accepts a slug or a display name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            kind.slug().eq_ignore_ascii_case(name) || kind.name().eq_ignore_ascii_case(name)
        })
    }

    pub fn create(self, setup: &mut DemoSetup<'_>) -> Result<Box<dyn Demo>> {
        let demo: Box<dyn Demo> = match self {
            DemoKind::Mipmap => Box::new(MipmapDemo::new(setup)?),
            DemoKind::NormalMap => Box::new(NormalMapDemo::new(setup)?),
            DemoKind::Pbr => Box::new(PbrDemo::new(setup)?),
            DemoKind::Ibl => Box::new(IblDemo::new(setup)?),
            DemoKind::Skybox => Box::new(SkyboxDemo::new(setup)?),
            DemoKind::Texture3d => Box::new(Texture3dDemo::new(setup)?),
        };
        Ok(demo)
    }

    /// Builds the demo's CPU-side meshes without touching the GPU.
    pub fn geometry_stats(self, media: &MediaDir) -> GeometryStats {
        match self {
            DemoKind::Mipmap => mipmap::geometry().stats(),
            DemoKind::NormalMap => normal_map::geometry().stats(),
            DemoKind::Pbr | DemoKind::Ibl => pbr::geometry().stats(),
            DemoKind::Skybox => skybox::geometry(media).stats(),
            DemoKind::Texture3d => texture_3d::geometry().stats(),
        }
    }
}

impl fmt::Display for DemoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named mesh slices of one demo's vertex buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeometryStats {
    pub meshes: Vec<(&'static str, MeshSlice)>,
}

impl GeometryStats {
    pub fn with(mut self, name: &'static str, slice: MeshSlice) -> Self {
        self.meshes.push((name, slice));
        self
    }

    pub fn vertex_count(&self) -> u32 {
        self.meshes.iter().map(|(_, slice)| slice.count).sum()
    }
}

/// Camera block at group 0, binding 0, shared by every demo shader.
pub(crate) struct CameraBinding {
    buffer: UniformBuffer<CameraUniform>,
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

impl CameraBinding {
    pub fn new(device: &wgpu::Device, label: &str) -> Self {
        Self::with_extra(device, label, &[], &[])
    }

    /// Camera plus extra per-frame entries starting at binding 1.
    pub fn with_extra(
        device: &wgpu::Device,
        label: &str,
        layout_entries: &[wgpu::BindGroupLayoutEntry],
        entries: &[wgpu::BindGroupEntry<'_>],
    ) -> Self {
        let buffer = UniformBuffer::new(device, label, &CameraUniform::zeroed());
        let mut all_layout_entries = vec![uniform_entry(
            0,
            wgpu::ShaderStages::VERTEX_FRAGMENT,
            false,
            UniformBuffer::<CameraUniform>::SIZE,
        )];
        all_layout_entries.extend_from_slice(layout_entries);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &all_layout_entries,
        });
        let mut all_entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.binding(),
        }];
        all_entries.extend_from_slice(entries);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layout,
            entries: &all_entries,
        });
        Self {
            buffer,
            layout,
            bind_group,
        }
    }

    pub fn update(&self, queue: &wgpu::Queue, camera: &Camera, projection: Mat4) {
        let uniform = CameraUniform::new(camera.view_matrix(), projection, camera.position);
        self.buffer.write(queue, &uniform);
    }
}

/// Per-draw uniforms bound with a dynamic offset.
pub(crate) struct DrawUniforms<T> {
    buffer: DynamicUniformBuffer<T>,
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

impl<T: Pod> DrawUniforms<T> {
    pub fn new(device: &wgpu::Device, label: &str, capacity: usize) -> Self {
        let buffer = DynamicUniformBuffer::<T>::new(device, label, capacity);
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                true,
                DynamicUniformBuffer::<T>::SIZE,
            )],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.binding(),
            }],
        });
        Self {
            buffer,
            layout,
            bind_group,
        }
    }

    pub fn write(&mut self, queue: &wgpu::Queue, draws: &[T]) {
        self.buffer.write(queue, draws);
    }

    pub fn bind<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, group: u32, index: usize) {
        pass.set_bind_group(group, &self.bind_group, &[self.buffer.offset(index)]);
    }
}

pub(crate) fn light_marker(position: Vec3, scale: f32) -> Mat4 {
    Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(scale))
}

pub(crate) fn clear_color(r: f64, g: f64, b: f64) -> wgpu::Color {
    wgpu::Color { r, g, b, a: 1.0 }
}

/// Three drag fields on one row. Returns true when any component changed.
pub(crate) fn drag_vec3(ui: &mut egui::Ui, label: &str, value: &mut Vec3, speed: f64) -> bool {
    ui.horizontal(|ui| {
        let mut changed = false;
        for component in [&mut value.x, &mut value.y, &mut value.z] {
            changed |= ui
                .add(egui::DragValue::new(component).speed(speed))
                .changed();
        }
        ui.label(label);
        changed
    })
    .inner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_and_names_resolve() {
        for kind in DemoKind::ALL {
            assert_eq!(DemoKind::from_name(kind.slug()), Some(kind));
            assert_eq!(DemoKind::from_name(&kind.name().to_uppercase()), Some(kind));
        }
        assert_eq!(DemoKind::from_name("Texture-3D"), Some(DemoKind::Texture3d));
        assert_eq!(DemoKind::from_name("raymarcher"), None);
    }

    #[test]
    fn slugs_are_unique() {
        let mut slugs: Vec<_> = DemoKind::ALL.iter().map(|kind| kind.slug()).collect();
        slugs.sort_unstable();
        slugs.dedup();
        assert_eq!(slugs.len(), DemoKind::ALL.len());
    }

    #[test]
    fn every_demo_builds_geometry_without_media() {
        let media = MediaDir::new(std::env::temp_dir().join("render-demos-no-media"));
        for kind in DemoKind::ALL {
            let stats = kind.geometry_stats(&media);
            assert!(!stats.meshes.is_empty(), "{kind}");
            assert!(stats.vertex_count() > 0, "{kind}");
            assert_eq!(stats.vertex_count() % 3, 0, "{kind}");
        }
    }

    #[test]
    fn inputs_aspect_handles_zero_height() {
        let inputs = DemoInputs {
            window_size: (800, 0),
            ..Default::default()
        };
        assert_eq!(inputs.aspect(), 800.0);
    }
}
