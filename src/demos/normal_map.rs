//! Tangent-space normal mapping on a quad and a sphere with Blinn-Phong
//! lighting and a few debug views.

use std::fmt;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::image_data::{load_image_or_placeholder, solid_color, ImageData};
use crate::mesh::{MeshBuilder, MeshSlice};
use crate::render::{
    create_render_pipeline, create_shader, linear_sampler, sampler_entry, texture_entry,
    uniform_entry, GpuTexture, ModelUniform, PipelineDesc, TangentVertex, UniformBuffer, Vertex,
    VertexBuffer,
};

use super::{
    clear_color, drag_vec3, light_marker, CameraBinding, Demo, DemoFrame, DemoKind, DemoSetup,
    DrawUniforms, GeometryStats,
};

const SHADER: &str = include_str!("shaders/normal_map.wgsl");
const ALBEDO_MAP: &str = "scpgdgca_2K_Albedo.jpg";
const NORMAL_MAP: &str = "scpgdgca_2K_Normal.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugMode {
    #[default]
    Shade,
    /// Perturbed world-space normal.
    ShowNormals,
    /// Interpolated vertex normal.
    ShowGeoNormals,
    /// Raw normal map texel.
    ShowNormalMap,
}

impl DebugMode {
    pub const ALL: [DebugMode; 4] = [
        DebugMode::Shade,
        DebugMode::ShowNormals,
        DebugMode::ShowGeoNormals,
        DebugMode::ShowNormalMap,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DebugMode::Shade => "SHADE",
            DebugMode::ShowNormals => "SHOW_NORMALS",
            DebugMode::ShowGeoNormals => "SHOW_GEO_NORMALS",
            DebugMode::ShowNormalMap => "SHOW_NORMAL_MAP",
        }
    }

    /// Value of `scene.debug.x` in the shader.
    fn shader_index(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for DebugMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SceneUniform {
    light_position: [f32; 4],
    debug: [u32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct NormalDraw {
    transform: ModelUniform,
    flags: [f32; 4],
}

impl NormalDraw {
    fn lit(model: Mat4) -> Self {
        Self {
            transform: ModelUniform::new(model),
            flags: [0.0; 4],
        }
    }

    fn unlit(model: Mat4) -> Self {
        Self {
            transform: ModelUniform::new(model),
            flags: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Quad, sphere, then the light marker.
fn draw_list(light_position: Vec3) -> [NormalDraw; 3] {
    [
        NormalDraw::lit(Mat4::from_translation(Vec3::new(-0.5, 0.0, 0.0))),
        NormalDraw::lit(
            Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0)) * Mat4::from_scale(Vec3::splat(0.5)),
        ),
        NormalDraw::unlit(light_marker(light_position, 0.05)),
    ]
}

pub(crate) struct NormalMapGeometry {
    builder: MeshBuilder<TangentVertex>,
    quad: MeshSlice,
    sphere: MeshSlice,
}

impl NormalMapGeometry {
    pub fn stats(&self) -> GeometryStats {
        GeometryStats::default()
            .with("quad", self.quad)
            .with("sphere", self.sphere)
    }
}

pub(crate) fn geometry() -> NormalMapGeometry {
    let mut builder = MeshBuilder::new();
    let quad = builder.gen_quad();
    let sphere = builder.gen_uv_sphere(48, 64);
    NormalMapGeometry {
        builder,
        quad,
        sphere,
    }
}

/// Albedo/normal pairs the demo switches between.
struct Materials {
    mapped: wgpu::BindGroup,
    flat: wgpu::BindGroup,
    marker: wgpu::BindGroup,
}

impl Materials {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        albedo: &ImageData,
        normal: &ImageData,
    ) -> Self {
        let albedo = GpuTexture::from_image(device, queue, "normal-map-albedo", albedo, true);
        let normal = GpuTexture::from_image(device, queue, "normal-map-normal", normal, false);
        let white =
            GpuTexture::from_image(device, queue, "white", &solid_color(1.0, 1.0, 1.0, 1.0), true);
        let flat = GpuTexture::from_image(
            device,
            queue,
            "flat-normal",
            &solid_color(0.5, 0.5, 1.0, 1.0),
            false,
        );
        let sampler = linear_sampler(device, "normal-map", wgpu::AddressMode::Repeat);

        let group = |label: &str, albedo: &GpuTexture, normal: &GpuTexture| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&albedo.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&normal.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            })
        };
        Self {
            mapped: group("normal-map-mapped", &albedo, &normal),
            flat: group("normal-map-flat", &albedo, &flat),
            marker: group("normal-map-marker", &white, &flat),
        }
    }
}

pub struct NormalMapDemo {
    vertices: VertexBuffer,
    quad: MeshSlice,
    sphere: MeshSlice,
    camera_binding: CameraBinding,
    scene: UniformBuffer<SceneUniform>,
    draws: DrawUniforms<NormalDraw>,
    materials: Materials,
    pipeline: wgpu::RenderPipeline,
    camera: Camera,
    light_position: Vec3,
    disable_normal_map: bool,
    debug_mode: DebugMode,
}

impl NormalMapDemo {
    pub fn new(setup: &mut DemoSetup<'_>) -> Result<Self> {
        let gpu = setup.gpu;
        let device = &gpu.device;
        let geometry = geometry();
        let light_position = Vec3::new(0.2, 0.4, 0.2);

        let scene = UniformBuffer::new(
            device,
            "normal-map-scene",
            &SceneUniform {
                light_position: light_position.extend(1.0).to_array(),
                debug: [0; 4],
            },
        );
        let camera_binding = CameraBinding::with_extra(
            device,
            "normal-map-camera",
            &[uniform_entry(
                1,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                false,
                UniformBuffer::<SceneUniform>::SIZE,
            )],
            &[wgpu::BindGroupEntry {
                binding: 1,
                resource: scene.binding(),
            }],
        );
        let draws = DrawUniforms::new(device, "normal-map-draws", 3);

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("normal-map-material"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                sampler_entry(2),
            ],
        });
        let materials = Materials::new(
            device,
            &gpu.queue,
            &material_layout,
            &load_image_or_placeholder(setup.media.path(ALBEDO_MAP), true),
            &load_image_or_placeholder(setup.media.path(NORMAL_MAP), true),
        );

        let shader = create_shader(device, "normal-map", SHADER)?;
        let buffers = [TangentVertex::layout()];
        let pipeline = create_render_pipeline(
            device,
            &PipelineDesc {
                buffers: &buffers,
                bind_group_layouts: &[&camera_binding.layout, &draws.layout, &material_layout],
                ..PipelineDesc::new("normal-map", &shader, gpu.surface_format())
            },
        )?;

        Ok(Self {
            vertices: VertexBuffer::new(device, "normal-map", geometry.builder.vertices()),
            quad: geometry.quad,
            sphere: geometry.sphere,
            camera_binding,
            scene,
            draws,
            materials,
            pipeline,
            camera: Camera::new(Vec3::new(0.0, 0.0, 2.0)),
            light_position,
            disable_normal_map: false,
            debug_mode: DebugMode::default(),
        })
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.checkbox(&mut self.disable_normal_map, "disable normal map");
        egui::ComboBox::from_label("debug mode")
            .selected_text(self.debug_mode.label())
            .show_ui(ui, |ui| {
                for mode in DebugMode::ALL {
                    ui.selectable_value(&mut self.debug_mode, mode, mode.label());
                }
            });
        drag_vec3(ui, "light pos", &mut self.light_position, 0.05);
    }
}

impl Demo for NormalMapDemo {
    fn name(&self) -> &'static str {
        DemoKind::NormalMap.name()
    }

    fn update_and_render(&mut self, frame: &mut DemoFrame<'_>) {
        egui::Window::new(self.name()).show(frame.ui, |ui| self.controls(ui));

        let queue = &frame.gpu.queue;
        self.camera.update_free_fly(&frame.inputs.camera);
        let projection = Camera::projection(frame.inputs.aspect(), 60.0, 0.1, 400.0);
        self.camera_binding.update(queue, &self.camera, projection);
        self.scene.write(
            queue,
            &SceneUniform {
                light_position: self.light_position.extend(1.0).to_array(),
                debug: [self.debug_mode.shader_index(), 0, 0, 0],
            },
        );
        self.draws.write(queue, &draw_list(self.light_position));

        let material = if self.disable_normal_map {
            &self.materials.flat
        } else {
            &self.materials.mapped
        };
        let mut pass = frame.begin_pass("normal-map", clear_color(0.2, 0.2, 0.2));
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.camera_binding.bind_group, &[]);
        self.vertices.bind(&mut pass, 0);

        pass.set_bind_group(2, material, &[]);
        self.draws.bind(&mut pass, 1, 0);
        VertexBuffer::draw(&mut pass, self.quad);
        self.draws.bind(&mut pass, 1, 1);
        VertexBuffer::draw(&mut pass, self.sphere);

        pass.set_bind_group(2, &self.materials.marker, &[]);
        self.draws.bind(&mut pass, 1, 2);
        VertexBuffer::draw(&mut pass, self.sphere);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_modes_map_to_shader_constants() {
        let indices: Vec<u32> = DebugMode::ALL.iter().map(|m| m.shader_index()).collect();
        assert_eq!(indices, [0, 1, 2, 3]);
        assert_eq!(DebugMode::ShowGeoNormals.to_string(), "SHOW_GEO_NORMALS");
        assert!(SHADER.contains("const SHOW_NORMAL_MAP: u32 = 3u;"));
    }

    #[test]
    fn only_the_light_marker_is_unlit() {
        let light = Vec3::new(0.2, 0.4, 0.2);
        let draws = draw_list(light);
        assert_eq!(draws[0].flags[0], 0.0);
        assert_eq!(draws[1].flags[0], 0.0);
        assert_eq!(draws[2].flags[0], 1.0);
        let marker = Mat4::from_cols_array_2d(&draws[2].transform.model);
        assert!((marker.transform_point3(Vec3::ZERO) - light).length() < 1e-6);
        assert!((marker.transform_vector3(Vec3::X).length() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn geometry_has_quad_then_sphere() {
        let geometry = geometry();
        assert_eq!(geometry.quad, MeshSlice { start: 0, count: 6 });
        assert_eq!(geometry.sphere.start, 6);
        assert_eq!(geometry.sphere.count, 6 * 64 * 47);
        assert_eq!(geometry.builder.len() as u32, 6 + geometry.sphere.count);
    }

    #[test]
    fn draw_uniform_matches_wgsl_struct() {
        assert_eq!(std::mem::size_of::<NormalDraw>(), 128);
        assert_eq!(std::mem::size_of::<SceneUniform>(), 32);
    }
}
