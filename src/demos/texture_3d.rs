//! Ray-marched ridge-noise volume inside a cube.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use log::info;

use crate::camera::Camera;
use crate::image_data::{ridge_noise_volume, ImageVolume};
use crate::mesh::{MeshBuilder, MeshSlice};
use crate::noise::RidgeParams;
use crate::render::{
    create_render_pipeline, create_shader, linear_sampler, sampler_entry, texture_entry,
    uniform_entry, DepthState, GpuContext, GpuTexture, PipelineDesc, PositionVertex,
    UniformBuffer, Vertex, VertexBuffer,
};

use super::{clear_color, CameraBinding, Demo, DemoFrame, DemoKind, DemoSetup, GeometryStats};

const SHADER: &str = include_str!("shaders/texture_3d.wgsl");

const VOLUME_WIDTH: u32 = 128;
const VOLUME_HEIGHT: u32 = 128;
const MAX_Z_RESOLUTION: u32 = 256;
const NOISE_FREQUENCY: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeSettings {
    /// Depth of the noise texture. Applied on regeneration.
    pub z_resolution: u32,
    pub alpha_threshold: f32,
    pub cube_size: f32,
    pub uv_scale: f32,
    /// Texture scroll per second along z.
    pub speed: f32,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            z_resolution: MAX_Z_RESOLUTION,
            alpha_threshold: 0.2,
            cube_size: 2.0,
            uv_scale: 0.2,
            speed: 0.2,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct VolumeUniform {
    params: [f32; 4],
}

impl VolumeUniform {
    fn new(settings: &VolumeSettings, scroll: f32) -> Self {
        Self {
            params: [
                settings.cube_size * 0.5,
                settings.alpha_threshold,
                settings.uv_scale,
                scroll,
            ],
        }
    }
}

pub(crate) fn noise_volume(z_resolution: u32) -> ImageVolume {
    let depth = z_resolution.clamp(1, MAX_Z_RESOLUTION);
    ridge_noise_volume(
        VOLUME_WIDTH,
        VOLUME_HEIGHT,
        depth,
        NOISE_FREQUENCY,
        RidgeParams::default(),
    )
}

pub(crate) struct VolumeGeometry {
    builder: MeshBuilder<PositionVertex>,
    cube: MeshSlice,
}

impl VolumeGeometry {
    pub fn stats(&self) -> GeometryStats {
        GeometryStats::default().with("cube", self.cube)
    }
}

/// Unit cube, scaled to `cube_size` in the vertex shader.
pub(crate) fn geometry() -> VolumeGeometry {
    let mut builder = MeshBuilder::new();
    let cube = builder.gen_cube(1.0);
    VolumeGeometry { builder, cube }
}

pub struct Texture3dDemo {
    vertices: VertexBuffer,
    cube: MeshSlice,
    camera_binding: CameraBinding,
    volume: UniformBuffer<VolumeUniform>,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    texture_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
    camera: Camera,
    settings: VolumeSettings,
    /// Depth of the texture currently bound.
    resolution: u32,
    scroll: f32,
}

impl Texture3dDemo {
    pub fn new(setup: &mut DemoSetup<'_>) -> Result<Self> {
        let gpu = setup.gpu;
        let device = &gpu.device;
        let settings = VolumeSettings::default();
        let geometry = geometry();

        let params = VolumeUniform::new(&settings, 0.0);
        let volume = UniformBuffer::new(device, "volume-params", &params);
        let camera_binding = CameraBinding::with_extra(
            device,
            "volume-camera",
            &[uniform_entry(
                1,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                false,
                UniformBuffer::<VolumeUniform>::SIZE,
            )],
            &[wgpu::BindGroupEntry {
                binding: 1,
                resource: volume.binding(),
            }],
        );

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("volume-texture"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D3),
                sampler_entry(1),
            ],
        });
        let sampler = linear_sampler(device, "volume", wgpu::AddressMode::Repeat);
        let texture_group =
            volume_bind_group(gpu, &texture_layout, &sampler, settings.z_resolution);

        let shader = create_shader(device, "texture-3d", SHADER)?;
        let buffers = [PositionVertex::layout()];
        let pipeline = create_render_pipeline(
            device,
            &PipelineDesc {
                buffers: &buffers,
                bind_group_layouts: &[&camera_binding.layout, &texture_layout],
                blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                cull_mode: Some(wgpu::Face::Front),
                depth: Some(DepthState {
                    write: false,
                    compare: wgpu::CompareFunction::Less,
                }),
                ..PipelineDesc::new("texture-3d", &shader, gpu.surface_format())
            },
        )?;

        Ok(Self {
            vertices: VertexBuffer::new(device, "volume-cube", geometry.builder.vertices()),
            cube: geometry.cube,
            camera_binding,
            volume,
            texture_layout,
            sampler,
            texture_group,
            pipeline,
            camera: Camera::new(Vec3::new(0.0, 0.0, 3.0)),
            resolution: settings.z_resolution,
            settings,
            scroll: 0.0,
        })
    }

    /// Returns true when the volume should be regenerated.
    fn controls(&mut self, ui: &mut egui::Ui) -> bool {
        let settings = &mut self.settings;
        let regenerate = ui
            .horizontal(|ui| {
                ui.add(
                    egui::DragValue::new(&mut settings.z_resolution).range(1..=MAX_Z_RESOLUTION),
                );
                ui.label("zResolution");
                let changed = settings.z_resolution != self.resolution;
                ui.add_enabled(changed, egui::Button::new("Regenerate")).clicked()
            })
            .inner;
        ui.add(egui::Slider::new(&mut settings.alpha_threshold, 0.0..=1.0).text("alphaThreshold"));
        ui.add(egui::Slider::new(&mut settings.cube_size, 0.1..=10.0).text("cubeSize"));
        ui.add(egui::Slider::new(&mut settings.uv_scale, 0.01..=2.0).text("uvScale"));
        ui.add(egui::Slider::new(&mut settings.speed, 0.0..=2.0).text("speed"));
        regenerate
    }
}

fn volume_bind_group(
    gpu: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    z_resolution: u32,
) -> wgpu::BindGroup {
    let volume = noise_volume(z_resolution);
    info!(
        "Generated {}x{}x{} ridge noise volume",
        volume.width, volume.height, volume.depth
    );
    let texture = GpuTexture::volume(&gpu.device, &gpu.queue, "ridge-noise", &volume);
    gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("volume-texture"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

impl Demo for Texture3dDemo {
    fn name(&self) -> &'static str {
        DemoKind::Texture3d.name()
    }

    fn update_and_render(&mut self, frame: &mut DemoFrame<'_>) {
        let regenerate = egui::Window::new(self.name())
            .show(frame.ui, |ui| self.controls(ui))
            .and_then(|response| response.inner)
            .unwrap_or(false);
        if regenerate {
            self.texture_group = volume_bind_group(
                frame.gpu,
                &self.texture_layout,
                &self.sampler,
                self.settings.z_resolution,
            );
            self.resolution = self.settings.z_resolution;
        }

        let queue = &frame.gpu.queue;
        self.scroll = (self.scroll + frame.inputs.delta_time * self.settings.speed).fract();
        self.camera.update_free_fly(&frame.inputs.camera);
        let projection = Camera::projection(frame.inputs.aspect(), 60.0, 0.1, 100.0);
        self.camera_binding.update(queue, &self.camera, projection);
        self.volume.write(queue, &VolumeUniform::new(&self.settings, self.scroll));

        let mut pass = frame.begin_pass("texture-3d", clear_color(0.1, 0.1, 0.12));
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.camera_binding.bind_group, &[]);
        pass.set_bind_group(1, &self.texture_group, &[]);
        self.vertices.bind(&mut pass, 0);
        VertexBuffer::draw(&mut pass, self.cube);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_controls() {
        let settings = VolumeSettings::default();
        assert_eq!(settings.z_resolution, 256);
        assert_eq!(settings.alpha_threshold, 0.2);
        assert_eq!(settings.cube_size, 2.0);
        assert_eq!(settings.uv_scale, 0.2);
        assert_eq!(settings.speed, 0.2);
    }

    #[test]
    fn uniform_packs_half_extent_and_scroll() {
        let uniform = VolumeUniform::new(&VolumeSettings::default(), 0.5);
        assert_eq!(uniform.params, [1.0, 0.2, 0.2, 0.5]);
    }

    #[test]
    fn volume_depth_is_clamped() {
        let volume = noise_volume(0);
        assert_eq!(volume.depth, 1);
        assert_eq!(volume.texels.len(), (VOLUME_WIDTH * VOLUME_HEIGHT * 4) as usize);
    }

    #[test]
    fn geometry_is_a_single_cube() {
        let geometry = geometry();
        assert_eq!(geometry.cube.count, 36);
        assert!(SHADER.contains("fn fs_main"));
    }
}
