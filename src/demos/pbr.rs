//! Cook-Torrance shading of a 7x7 sphere grid lit by one point light.
//!
//! [`PbrScene`] owns the spheres, the light and the material maps. The IBL
//! demo reuses it with a different fragment program and one extra bind group.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::image_data::load_image_or_placeholder;
use crate::mesh::{MeshBuilder, MeshSlice};
use crate::render::{
    create_render_pipeline, create_shader, linear_sampler, mat3_to_3x4, sampler_entry,
    texture_entry, uniform_entry, GpuTexture, PbrVertex, PipelineDesc, UniformBuffer, Vertex,
    VertexBuffer,
};

use super::{
    clear_color, drag_vec3, light_marker, CameraBinding, Demo, DemoFrame, DemoKind, DemoSetup,
    DrawUniforms, GeometryStats,
};

const ROWS: u32 = 7;
const COLUMNS: u32 = 7;
const SPACING: f32 = 2.5;
const SPHERE_COUNT: usize = (ROWS * COLUMNS) as usize;
const PREVIEW_SIZE: f32 = 256.0;
const MAX_LIGHT_INTENSITY: f32 = 10_000.0;

const PBR_SHADER: &str = concat!(
    include_str!("shaders/pbr_common.wgsl"),
    include_str!("shaders/pbr.wgsl")
);

/// (label, file, sRGB)
const MATERIAL_MAPS: [(&str, &str, bool); 5] = [
    ("Albedo", "Mat_Albedo.jpg", true),
    ("Normal", "Mat_Normal.jpg", false),
    ("Metallic", "Mat_Metallic.jpg", false),
    ("Roughness", "Mat_Roughness.jpg", false),
    ("Ambiant Occlusion", "Mat_AO.jpg", false),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadingMode {
    /// Per-sphere constants: metallic grows with the row, roughness with the column.
    #[default]
    Basic,
    /// Every sphere samples the material maps.
    Textured,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            color: Vec3::splat(150.0),
        }
    }
}

impl PointLight {
    /// Splits the HDR colour into a 0..1 tint and the intensity scaling it.
    pub fn tint_and_intensity(&self) -> (Vec3, f32) {
        let intensity = self.color.max_element();
        if intensity > 0.0 {
            (self.color / intensity, intensity)
        } else {
            (Vec3::ONE, 0.0)
        }
    }

    pub fn set_tint_and_intensity(&mut self, tint: Vec3, intensity: f32) {
        self.color = tint.clamp(Vec3::ZERO, Vec3::ONE) * intensity.max(0.0);
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct LightUniform {
    position: [f32; 4],
    color: [f32; 4],
}

impl From<&PointLight> for LightUniform {
    fn from(light: &PointLight) -> Self {
        Self {
            position: light.position.extend(1.0).to_array(),
            color: light.color.extend(1.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct PbrDraw {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    albedo_ao: [f32; 4],
    /// metallic, roughness, unlit flag
    params: [f32; 4],
}

impl PbrDraw {
    fn new(model: Mat4, albedo: Vec3, ao: f32, metallic: f32, roughness: f32) -> Self {
        let normal = glam::Mat3::from_mat4(model).inverse().transpose();
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            albedo_ao: albedo.extend(ao).to_array(),
            params: [metallic, roughness, 0.0, 0.0],
        }
    }

    fn unlit(model: Mat4) -> Self {
        let mut draw = Self::new(model, Vec3::ONE, 1.0, 0.0, 1.0);
        draw.params[2] = 1.0;
        draw
    }

    #[cfg(test)]
    fn metallic(&self) -> f32 {
        self.params[0]
    }

    #[cfg(test)]
    fn roughness(&self) -> f32 {
        self.params[1]
    }

    #[cfg(test)]
    fn translation(&self) -> Vec3 {
        Vec3::from_slice(&self.model[3][..3])
    }
}

/// Sphere grid followed by the light marker.
pub(crate) fn projection(aspect: f32) -> Mat4 {
    Camera::projection(aspect, 60.0, 0.01, 50.0)
}

pub(crate) fn grid_draws(light: &PointLight) -> Vec<PbrDraw> {
    let mut draws = Vec::with_capacity(SPHERE_COUNT + 1);
    for row in 0..ROWS {
        let metallic = row as f32 / ROWS as f32;
        for col in 0..COLUMNS {
            let position = Vec3::new(
                (col as f32 - (COLUMNS / 2) as f32) * SPACING,
                (row as f32 - (ROWS / 2) as f32) * SPACING,
                0.0,
            );
            // Fully smooth spheres look off under a point light.
            let roughness = (col as f32 / COLUMNS as f32).clamp(0.05, 1.0);
            draws.push(PbrDraw::new(
                Mat4::from_translation(position),
                Vec3::new(0.5, 0.0, 0.0),
                1.0,
                metallic,
                roughness,
            ));
        }
    }
    draws.push(PbrDraw::unlit(light_marker(light.position, 0.5)));
    draws
}

pub(crate) struct SphereGeometry {
    builder: MeshBuilder<PbrVertex>,
    sphere: MeshSlice,
}

impl SphereGeometry {
    pub fn stats(&self) -> GeometryStats {
        GeometryStats::default().with("sphere", self.sphere)
    }
}

pub(crate) fn geometry() -> SphereGeometry {
    let mut builder = MeshBuilder::new();
    let sphere = builder.gen_uv_sphere(48, 64);
    SphereGeometry { builder, sphere }
}

/// Spheres, light and material shared by the PBR and IBL demos.
pub(crate) struct PbrScene {
    vertices: VertexBuffer,
    sphere: MeshSlice,
    camera_binding: CameraBinding,
    light_buffer: UniformBuffer<LightUniform>,
    draws: DrawUniforms<PbrDraw>,
    material: wgpu::BindGroup,
    basic_pipeline: wgpu::RenderPipeline,
    textured_pipeline: wgpu::RenderPipeline,
    previews: Vec<(&'static str, egui::TextureId)>,
    pub camera: Camera,
    pub light: PointLight,
    pub mode: ShadingMode,
}

impl PbrScene {
    /// `shader_source` provides `vs_main`, `fs_basic` and `fs_textured`.
    /// `extra_layouts` are bound from group 3 on.
    pub fn new(
        setup: &mut DemoSetup<'_>,
        label: &str,
        shader_source: &str,
        extra_layouts: &[&wgpu::BindGroupLayout],
    ) -> Result<Self> {
        let gpu = setup.gpu;
        let device = &gpu.device;
        let light = PointLight::default();

        let geometry = geometry();
        let vertices = VertexBuffer::new(device, label, geometry.builder.vertices());

        let light_buffer = UniformBuffer::new(device, "pbr-light", &LightUniform::from(&light));
        let camera_binding = CameraBinding::with_extra(
            device,
            "pbr-camera",
            &[uniform_entry(
                1,
                wgpu::ShaderStages::FRAGMENT,
                false,
                UniformBuffer::<LightUniform>::SIZE,
            )],
            &[wgpu::BindGroupEntry {
                binding: 1,
                resource: light_buffer.binding(),
            }],
        );
        let draws = DrawUniforms::new(device, "pbr-draws", SPHERE_COUNT + 1);

        let maps: Vec<GpuTexture> = MATERIAL_MAPS
            .iter()
            .map(|&(name, file, srgb)| {
                let image = load_image_or_placeholder(setup.media.path(file), true);
                GpuTexture::from_image(device, &gpu.queue, name, &image, srgb)
            })
            .collect();
        let sampler = linear_sampler(device, "pbr-material", wgpu::AddressMode::Repeat);

        let mut layout_entries: Vec<_> = (0..MATERIAL_MAPS.len() as u32)
            .map(|binding| texture_entry(binding, wgpu::TextureViewDimension::D2))
            .collect();
        layout_entries.push(sampler_entry(MATERIAL_MAPS.len() as u32));
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pbr-material"),
            entries: &layout_entries,
        });
        let mut entries: Vec<_> = maps
            .iter()
            .enumerate()
            .map(|(binding, map)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(&map.view),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: MATERIAL_MAPS.len() as u32,
            resource: wgpu::BindingResource::Sampler(&sampler),
        });
        let material = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pbr-material"),
            layout: &material_layout,
            entries: &entries,
        });

        let previews = MATERIAL_MAPS
            .iter()
            .zip(&maps)
            .map(|(&(name, ..), map)| (name, setup.ui.register_texture(device, &map.view)))
            .collect();

        let shader = create_shader(device, label, shader_source)?;
        let mut layouts = vec![
            &camera_binding.layout,
            &draws.layout,
            &material_layout,
        ];
        layouts.extend_from_slice(extra_layouts);
        let buffers = [PbrVertex::layout()];
        let basic_label = format!("{label}-basic");
        let basic_pipeline = create_render_pipeline(
            device,
            &PipelineDesc {
                fragment_entry: "fs_basic",
                buffers: &buffers,
                bind_group_layouts: &layouts,
                ..PipelineDesc::new(&basic_label, &shader, gpu.surface_format())
            },
        )?;
        let textured_label = format!("{label}-textured");
        let textured_pipeline = create_render_pipeline(
            device,
            &PipelineDesc {
                fragment_entry: "fs_textured",
                buffers: &buffers,
                bind_group_layouts: &layouts,
                ..PipelineDesc::new(&textured_label, &shader, gpu.surface_format())
            },
        )?;

        Ok(Self {
            vertices,
            sphere: geometry.sphere,
            camera_binding,
            light_buffer,
            draws,
            material,
            basic_pipeline,
            textured_pipeline,
            previews,
            camera: Camera::new(Vec3::new(0.0, 0.0, 4.0)),
            light,
            mode: ShadingMode::default(),
        })
    }

    pub fn controls(&mut self, ui: &mut egui::Ui) {
        drag_vec3(ui, "Light pos", &mut self.light.position, 0.1);
        let (tint, mut intensity) = self.light.tint_and_intensity();
        let mut rgb = tint.to_array();
        ui.horizontal(|ui| {
            let mut changed = egui::color_picker::color_edit_button_rgb(ui, &mut rgb).changed();
            changed |= ui
                .add(
                    egui::DragValue::new(&mut intensity)
                        .speed(1.0)
                        .range(0.0..=MAX_LIGHT_INTENSITY),
                )
                .changed();
            ui.label("Light color");
            if changed {
                self.light
                    .set_tint_and_intensity(Vec3::from_array(rgb), intensity);
            }
        });
        ui.horizontal(|ui| {
            ui.radio_value(&mut self.mode, ShadingMode::Basic, "Basic PBR");
            ui.radio_value(&mut self.mode, ShadingMode::Textured, "Textured PBR");
        });
        if self.mode == ShadingMode::Textured {
            ui.collapsing("Material maps", |ui| {
                for &(name, texture) in &self.previews {
                    ui.label(name);
                    ui.add(egui::Image::new(egui::load::SizedTexture::new(
                        texture,
                        [PREVIEW_SIZE, PREVIEW_SIZE],
                    )));
                }
            });
        }
    }

    /// Moves the camera and uploads this frame's uniforms.
    pub fn prepare(&mut self, frame: &DemoFrame<'_>) {
        let queue = &frame.gpu.queue;
        self.camera.update_free_fly(&frame.inputs.camera);
        self.camera_binding
            .update(queue, &self.camera, projection(frame.inputs.aspect()));
        self.light_buffer.write(queue, &LightUniform::from(&self.light));
        self.draws.write(queue, &grid_draws(&self.light));
    }

    /// Draws the spheres and the light marker. Groups past 2 must already be
    /// bound by the caller.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_bind_group(0, &self.camera_binding.bind_group, &[]);
        pass.set_bind_group(2, &self.material, &[]);
        self.vertices.bind(pass, 0);

        pass.set_pipeline(match self.mode {
            ShadingMode::Basic => &self.basic_pipeline,
            ShadingMode::Textured => &self.textured_pipeline,
        });
        for index in 0..SPHERE_COUNT {
            self.draws.bind(pass, 1, index);
            VertexBuffer::draw(pass, self.sphere);
        }

        pass.set_pipeline(&self.basic_pipeline);
        self.draws.bind(pass, 1, SPHERE_COUNT);
        VertexBuffer::draw(pass, self.sphere);
    }
}

pub struct PbrDemo {
    scene: PbrScene,
}

impl PbrDemo {
    pub fn new(setup: &mut DemoSetup<'_>) -> Result<Self> {
        Ok(Self {
            scene: PbrScene::new(setup, "pbr", PBR_SHADER, &[])?,
        })
    }
}

impl Demo for PbrDemo {
    fn name(&self) -> &'static str {
        DemoKind::Pbr.name()
    }

    fn update_and_render(&mut self, frame: &mut DemoFrame<'_>) {
        egui::Window::new(self.name()).show(frame.ui, |ui| self.scene.controls(ui));
        self.scene.prepare(frame);
        let mut pass = frame.begin_pass("pbr", clear_color(0.33, 0.33, 0.33));
        self.scene.draw(&mut pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_spans_metallic_rows_and_roughness_columns() {
        let draws = grid_draws(&PointLight::default());
        assert_eq!(draws.len(), SPHERE_COUNT + 1);

        let first = &draws[0];
        assert_eq!(first.metallic(), 0.0);
        assert_eq!(first.roughness(), 0.05);
        assert_eq!(first.translation(), Vec3::new(-7.5, -7.5, 0.0));

        let last = &draws[SPHERE_COUNT - 1];
        assert!((last.metallic() - 6.0 / 7.0).abs() < 1e-6);
        assert!((last.roughness() - 6.0 / 7.0).abs() < 1e-6);
        assert_eq!(last.translation(), Vec3::new(7.5, 7.5, 0.0));
    }

    #[test]
    fn light_marker_is_unlit_and_follows_the_light() {
        let light = PointLight {
            position: Vec3::new(1.0, 2.0, 3.0),
            ..Default::default()
        };
        let marker = grid_draws(&light)[SPHERE_COUNT];
        assert_eq!(marker.params[2], 1.0);
        assert_eq!(marker.translation(), light.position);
        assert!(grid_draws(&light)[..SPHERE_COUNT]
            .iter()
            .all(|draw| draw.params[2] == 0.0));
    }

    #[test]
    fn light_color_splits_into_tint_and_intensity() {
        let mut light = PointLight {
            color: Vec3::new(150.0, 75.0, 30.0),
            ..Default::default()
        };
        let (tint, intensity) = light.tint_and_intensity();
        assert_eq!(intensity, 150.0);
        assert!((tint - Vec3::new(1.0, 0.5, 0.2)).length() < 1e-6);

        light.set_tint_and_intensity(tint, intensity);
        assert!((light.color - Vec3::new(150.0, 75.0, 30.0)).length() < 1e-4);

        let (tint, intensity) = PointLight::default().tint_and_intensity();
        assert_eq!((tint, intensity), (Vec3::ONE, 150.0));
    }

    #[test]
    fn black_light_keeps_a_white_tint() {
        let mut light = PointLight {
            color: Vec3::ZERO,
            ..Default::default()
        };
        assert_eq!(light.tint_and_intensity(), (Vec3::ONE, 0.0));
        light.set_tint_and_intensity(Vec3::new(2.0, 0.5, -1.0), 10.0);
        assert_eq!(light.color, Vec3::new(10.0, 5.0, 0.0));
    }

    #[test]
    fn draw_uniform_matches_wgsl_struct() {
        assert_eq!(std::mem::size_of::<PbrDraw>(), 144);
        assert_eq!(std::mem::size_of::<LightUniform>(), 32);
    }

    #[test]
    fn shared_shader_declares_both_fragment_programs() {
        assert!(PBR_SHADER.contains("fn fs_basic"));
        assert!(PBR_SHADER.contains("fn fs_textured"));
        assert!(PBR_SHADER.contains("fn vs_main"));
    }
}
