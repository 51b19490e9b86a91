//! Cubemap skybox around an icosphere that reflects or refracts it.
//!
//! [`SkyRenderer`] is also used by the IBL demo to show its environment maps.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use log::error;

use crate::camera::Camera;
use crate::error::AssetError;
use crate::image_data::{load_cubemap_faces, MediaDir};
use crate::mesh::{MeshBuilder, MeshSlice};
use crate::render::{
    create_render_pipeline, create_shader, linear_sampler, sampler_entry, texture_entry,
    uniform_entry, DepthState, GpuTexture, PipelineDesc, PosNormalVertex, PositionVertex,
    UniformBuffer, Vertex, VertexBuffer,
};

use super::{clear_color, CameraBinding, Demo, DemoFrame, DemoKind, DemoSetup, GeometryStats};

const SKY_SHADER: &str = include_str!("shaders/sky.wgsl");
const OBJECT_SHADER: &str = include_str!("shaders/skybox_object.wgsl");

/// Air to glass.
const DEFAULT_REFRACTION_RATIO: f32 = 1.00 / 1.52;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub(crate) struct SkyParams {
    /// Mip level sampled from the cubemap.
    pub lod: f32,
    /// 1.0 applies Reinhard tone mapping for HDR cubemaps.
    pub tone_map: f32,
    _pad: [f32; 2],
}

impl SkyParams {
    pub fn new(lod: f32, tone_map: bool) -> Self {
        Self {
            lod,
            tone_map: if tone_map { 1.0 } else { 0.0 },
            _pad: [0.0; 2],
        }
    }
}

/// Draws a unit cube around the camera sampling one of several cubemaps.
///
/// The cube is rendered with the translation-free view matrix at the far
/// plane, so it must be drawn after the opaque geometry of the pass.
pub(crate) struct SkyRenderer {
    vertices: VertexBuffer,
    camera: CameraBinding,
    params: UniformBuffer<SkyParams>,
    texture_layout: wgpu::BindGroupLayout,
    bind_groups: Vec<wgpu::BindGroup>,
    pipeline: wgpu::RenderPipeline,
}

impl SkyRenderer {
    /// One bind group is created per entry of `views`, selected at draw time.
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        cube: &MeshBuilder<PositionVertex>,
        views: &[&wgpu::TextureView],
    ) -> Result<Self, AssetError> {
        let vertices = VertexBuffer::new(device, "sky-cube", cube.vertices());
        let camera = CameraBinding::new(device, "sky-camera");
        let params = UniformBuffer::new(device, "sky-params", &SkyParams::default());
        let sampler = linear_sampler(device, "sky", wgpu::AddressMode::ClampToEdge);

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sky-texture"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube),
                sampler_entry(1),
                uniform_entry(
                    2,
                    wgpu::ShaderStages::FRAGMENT,
                    false,
                    UniformBuffer::<SkyParams>::SIZE,
                ),
            ],
        });
        let bind_groups = views
            .iter()
            .map(|view| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("sky-texture"),
                    layout: &texture_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: params.binding(),
                        },
                    ],
                })
            })
            .collect();

        let shader = create_shader(device, "sky", SKY_SHADER)?;
        let buffers = [PositionVertex::layout()];
        let pipeline = create_render_pipeline(
            device,
            &PipelineDesc {
                buffers: &buffers,
                bind_group_layouts: &[&camera.layout, &texture_layout],
                cull_mode: None,
                depth: Some(DepthState::SKYBOX),
                ..PipelineDesc::new("sky", &shader, format)
            },
        )?;

        Ok(Self {
            vertices,
            camera,
            params,
            texture_layout,
            bind_groups,
            pipeline,
        })
    }

    /// Layout of the cubemap groups, for objects sampling the same textures.
    pub fn texture_layout(&self) -> &wgpu::BindGroupLayout {
        &self.texture_layout
    }

    pub fn bind_group(&self, index: usize) -> Option<&wgpu::BindGroup> {
        self.bind_groups.get(index)
    }

    pub fn prepare(
        &self,
        queue: &wgpu::Queue,
        camera: &Camera,
        projection: glam::Mat4,
        params: SkyParams,
    ) {
        self.camera.update(queue, camera, projection);
        self.params.write(queue, &params);
    }

    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, index: usize) {
        let Some(textures) = self.bind_groups.get(index) else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.camera.bind_group, &[]);
        pass.set_bind_group(1, textures, &[]);
        self.vertices.bind(pass, 0);
        VertexBuffer::draw(
            pass,
            MeshSlice {
                start: 0,
                count: self.vertices.len(),
            },
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceMode {
    #[default]
    Reflect,
    Refract,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SurfaceUniform {
    mode_ratio: [f32; 4],
}

impl SurfaceUniform {
    fn new(mode: SurfaceMode, ratio: f32) -> Self {
        let mode = match mode {
            SurfaceMode::Reflect => 0.0,
            SurfaceMode::Refract => 1.0,
        };
        Self {
            mode_ratio: [mode, ratio, 0.0, 0.0],
        }
    }
}

pub(crate) struct SkyboxGeometry {
    sky: MeshBuilder<PositionVertex>,
    sky_cube: MeshSlice,
    objects: MeshBuilder<PosNormalVertex>,
    sphere: MeshSlice,
}

impl SkyboxGeometry {
    pub fn stats(&self) -> GeometryStats {
        GeometryStats::default()
            .with("skybox", self.sky_cube)
            .with("sphere", self.sphere)
    }
}

/// Skybox cube from `cube.obj`, or a generated cube when it cannot be read.
pub(crate) fn geometry(media: &MediaDir) -> SkyboxGeometry {
    let mut sky = MeshBuilder::new();
    let sky_cube = sky
        .load_obj(media.path("cube.obj"), 1.0)
        .unwrap_or_else(|err| {
            error!("Failed to load skybox mesh: {err:#}");
            sky.gen_cube(1.0)
        });
    let mut objects = MeshBuilder::new();
    let sphere = objects.gen_icosphere(4);
    SkyboxGeometry {
        sky,
        sky_cube,
        objects,
        sphere,
    }
}

pub struct SkyboxDemo {
    sky: SkyRenderer,
    objects: VertexBuffer,
    sphere: MeshSlice,
    camera_binding: CameraBinding,
    surface: UniformBuffer<SurfaceUniform>,
    pipeline: wgpu::RenderPipeline,
    camera: Camera,
    mode: SurfaceMode,
    refraction_ratio: f32,
}

impl SkyboxDemo {
    pub fn new(setup: &mut DemoSetup<'_>) -> Result<Self> {
        let gpu = setup.gpu;
        let device = &gpu.device;
        let geometry = geometry(setup.media);

        let faces = load_cubemap_faces(setup.media.path("skybox"));
        let cubemap = GpuTexture::cubemap(device, &gpu.queue, "skybox", &faces);
        let sky = SkyRenderer::new(device, gpu.surface_format(), &geometry.sky, &[&cubemap.view])?;

        let surface = UniformBuffer::new(
            device,
            "skybox-surface",
            &SurfaceUniform::new(SurfaceMode::default(), DEFAULT_REFRACTION_RATIO),
        );
        let camera_binding = CameraBinding::with_extra(
            device,
            "skybox-camera",
            &[uniform_entry(
                1,
                wgpu::ShaderStages::FRAGMENT,
                false,
                UniformBuffer::<SurfaceUniform>::SIZE,
            )],
            &[wgpu::BindGroupEntry {
                binding: 1,
                resource: surface.binding(),
            }],
        );

        let shader = create_shader(device, "skybox-object", OBJECT_SHADER)?;
        let buffers = [PosNormalVertex::layout()];
        let pipeline = create_render_pipeline(
            device,
            &PipelineDesc {
                buffers: &buffers,
                bind_group_layouts: &[&camera_binding.layout, sky.texture_layout()],
                ..PipelineDesc::new("skybox-object", &shader, gpu.surface_format())
            },
        )?;

        Ok(Self {
            objects: VertexBuffer::new(device, "skybox-objects", geometry.objects.vertices()),
            sphere: geometry.sphere,
            sky,
            camera_binding,
            surface,
            pipeline,
            camera: Camera::new(Vec3::new(0.0, 0.0, 3.0)),
            mode: SurfaceMode::default(),
            refraction_ratio: DEFAULT_REFRACTION_RATIO,
        })
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.radio_value(&mut self.mode, SurfaceMode::Reflect, "Reflection");
            ui.radio_value(&mut self.mode, SurfaceMode::Refract, "Refraction");
        });
        ui.add_enabled(
            self.mode == SurfaceMode::Refract,
            egui::Slider::new(&mut self.refraction_ratio, 0.1..=1.0).text("refraction ratio"),
        );
    }
}

impl Demo for SkyboxDemo {
    fn name(&self) -> &'static str {
        DemoKind::Skybox.name()
    }

    fn update_and_render(&mut self, frame: &mut DemoFrame<'_>) {
        egui::Window::new(self.name()).show(frame.ui, |ui| self.controls(ui));

        let queue = &frame.gpu.queue;
        self.camera.update_free_fly(&frame.inputs.camera);
        let projection = Camera::projection(frame.inputs.aspect(), 60.0, 0.01, 50.0);
        self.camera_binding.update(queue, &self.camera, projection);
        self.surface
            .write(queue, &SurfaceUniform::new(self.mode, self.refraction_ratio));
        self.sky
            .prepare(queue, &self.camera, projection, SkyParams::new(0.0, false));

        let mut pass = frame.begin_pass("skybox", clear_color(0.0, 0.0, 0.0));
        if let Some(environment) = self.sky.bind_group(0) {
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.camera_binding.bind_group, &[]);
            pass.set_bind_group(1, environment, &[]);
            self.objects.bind(&mut pass, 0);
            VertexBuffer::draw(&mut pass, self.sphere);
        }
        self.sky.draw(&mut pass, 0);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn missing_cube_obj_falls_back_to_generated_cube() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = geometry(&MediaDir::new(dir.path()));
        assert_eq!(geometry.sky_cube.count, 36);
        assert_eq!(geometry.sphere.count, 60 * 4u32.pow(4));
    }

    #[test]
    fn cube_obj_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("cube.obj"),
            "v -1 -1 0\nv 1 -1 0\nv 1 1 0\nv -1 1 0\nf 1 2 3 4\n",
        )
        .unwrap();
        let geometry = geometry(&MediaDir::new(dir.path()));
        assert_eq!(geometry.sky_cube.count, 6);
        assert_eq!(geometry.sky.len(), 6);
    }

    #[test]
    fn surface_uniform_encodes_mode_and_ratio() {
        let reflect = SurfaceUniform::new(SurfaceMode::Reflect, 0.5);
        let refract = SurfaceUniform::new(SurfaceMode::Refract, DEFAULT_REFRACTION_RATIO);
        assert_eq!(reflect.mode_ratio, [0.0, 0.5, 0.0, 0.0]);
        assert_eq!(refract.mode_ratio[0], 1.0);
        assert!((refract.mode_ratio[1] - 0.6579).abs() < 1e-3);
    }

    #[test]
    fn sky_params_match_wgsl_size() {
        assert_eq!(std::mem::size_of::<SkyParams>(), 16);
        assert_eq!(SkyParams::new(2.0, true).tone_map, 1.0);
    }
}
