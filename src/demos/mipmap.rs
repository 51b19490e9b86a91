//! A long textured corridor showing how the minification filter and the mip
//! chain behave as surfaces recede.

use std::f32::consts::FRAC_PI_2;
use std::fmt;

use anyhow::Result;
use glam::{Mat4, Vec2, Vec3};
use log::debug;

use crate::camera::Camera;
use crate::image_data::{colored_mip_chain, load_image_or_placeholder, mip_chain};
use crate::mesh::{MeshBuilder, MeshSlice, MeshVertex};
use crate::render::{
    create_render_pipeline, create_shader, sampler_entry, texture_entry, GpuTexture, PipelineDesc,
    PosUvVertex, Vertex, VertexBuffer,
};

use super::{clear_color, CameraBinding, Demo, DemoFrame, DemoKind, DemoSetup, GeometryStats};

const SHADER: &str = include_str!("shaders/mipmap.wgsl");
const WALL_TEXTURE: &str = "scpgdgca_2K_Albedo.jpg";

const CORRIDOR_WIDTH: f32 = 4.0;
const CORRIDOR_LENGTH: f32 = 200.0;
/// World units covered by one texture repeat.
const TILE_SIZE: f32 = 2.0;

/// Level 0 magenta, then red, green and blue.
const MIP_COLORS: [[u8; 4]; 4] = [
    [255, 0, 255, 255],
    [255, 0, 0, 255],
    [0, 255, 0, 255],
    [0, 0, 255, 255],
];

/// The classic OpenGL minification filters expressed as wgpu sampler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    #[default]
    LinearMipmapLinear,
}

impl TextureFilter {
    pub const ALL: [TextureFilter; 6] = [
        TextureFilter::Nearest,
        TextureFilter::Linear,
        TextureFilter::NearestMipmapNearest,
        TextureFilter::LinearMipmapNearest,
        TextureFilter::NearestMipmapLinear,
        TextureFilter::LinearMipmapLinear,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TextureFilter::Nearest => "GL_NEAREST",
            TextureFilter::Linear => "GL_LINEAR",
            TextureFilter::NearestMipmapNearest => "GL_NEAREST_MIPMAP_NEAREST",
            TextureFilter::LinearMipmapNearest => "GL_LINEAR_MIPMAP_NEAREST",
            TextureFilter::NearestMipmapLinear => "GL_NEAREST_MIPMAP_LINEAR",
            TextureFilter::LinearMipmapLinear => "GL_LINEAR_MIPMAP_LINEAR",
        }
    }

    /// Filter within a level, and between levels when mipmaps are used.
    fn filters(self) -> (wgpu::FilterMode, Option<wgpu::FilterMode>) {
        use wgpu::FilterMode::{Linear, Nearest};
        match self {
            TextureFilter::Nearest => (Nearest, None),
            TextureFilter::Linear => (Linear, None),
            TextureFilter::NearestMipmapNearest => (Nearest, Some(Nearest)),
            TextureFilter::LinearMipmapNearest => (Linear, Some(Nearest)),
            TextureFilter::NearestMipmapLinear => (Nearest, Some(Linear)),
            TextureFilter::LinearMipmapLinear => (Linear, Some(Linear)),
        }
    }

    pub fn uses_mipmaps(self) -> bool {
        self.filters().1.is_some()
    }

    /// Anisotropy is only honoured with trilinear filtering and is clamped to 1 otherwise.
    pub fn sampler_descriptor(self, anisotropy: u16) -> wgpu::SamplerDescriptor<'static> {
        let (min_filter, mipmap_filter) = self.filters();
        let trilinear = min_filter == wgpu::FilterMode::Linear
            && mipmap_filter == Some(wgpu::FilterMode::Linear);
        wgpu::SamplerDescriptor {
            label: Some(self.label()),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter,
            mipmap_filter: mipmap_filter.unwrap_or(wgpu::FilterMode::Nearest),
            lod_min_clamp: 0.0,
            // Without mipmaps only level 0 may be sampled.
            lod_max_clamp: if mipmap_filter.is_some() { 32.0 } else { 0.0 },
            anisotropy_clamp: if trilinear { anisotropy.clamp(1, 16) } else { 1 },
            ..Default::default()
        }
    }
}

impl fmt::Display for TextureFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SamplerSettings {
    filter: TextureFilter,
    anisotropy: u16,
    colored_mips: bool,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            filter: TextureFilter::default(),
            anisotropy: 1,
            colored_mips: false,
        }
    }
}

/// Just inside the corridor, looking down its length and slightly at the
/// floor.
fn start_camera() -> Camera {
    Camera::new(Vec3::new(0.0, 0.0, -1.0))
        .look_at(Vec3::new(0.0, -0.5, -10.0))
        .with_speed(5.0)
}

/// One wall of the corridor: the unit quad placed by `transform`, with UVs
/// repeated `uv_scale` times.
fn corridor_panel(transform: Mat4, uv_scale: Vec2) -> Vec<MeshVertex> {
    let mut quad = MeshBuilder::<MeshVertex>::new();
    quad.gen_quad();
    quad.into_vertices()
        .into_iter()
        .map(|mut vertex| {
            vertex.position = transform.transform_point3(vertex.position);
            vertex.normal = transform.transform_vector3(vertex.normal).normalize();
            vertex.uv *= uv_scale;
            vertex
        })
        .collect()
}

/// Floor, ceiling and both walls, running from the origin down -Z.
fn corridor_panels() -> Vec<MeshVertex> {
    let half = CORRIDOR_WIDTH / 2.0;
    let center_z = -CORRIDOR_LENGTH / 2.0;
    let across = Vec2::new(CORRIDOR_WIDTH, CORRIDOR_LENGTH) / TILE_SIZE;
    let along = Vec2::new(CORRIDOR_LENGTH, CORRIDOR_WIDTH) / TILE_SIZE;
    let floor_scale = Mat4::from_scale(Vec3::new(half, CORRIDOR_LENGTH / 2.0, 1.0));
    let wall_scale = Mat4::from_scale(Vec3::new(CORRIDOR_LENGTH / 2.0, half, 1.0));

    [
        (
            Mat4::from_translation(Vec3::new(0.0, -half, center_z))
                * Mat4::from_rotation_x(-FRAC_PI_2)
                * floor_scale,
            across,
        ),
        (
            Mat4::from_translation(Vec3::new(0.0, half, center_z))
                * Mat4::from_rotation_x(FRAC_PI_2)
                * floor_scale,
            across,
        ),
        (
            Mat4::from_translation(Vec3::new(-half, 0.0, center_z))
                * Mat4::from_rotation_y(FRAC_PI_2)
                * wall_scale,
            along,
        ),
        (
            Mat4::from_translation(Vec3::new(half, 0.0, center_z))
                * Mat4::from_rotation_y(-FRAC_PI_2)
                * wall_scale,
            along,
        ),
    ]
    .into_iter()
    .flat_map(|(transform, uv_scale)| corridor_panel(transform, uv_scale))
    .collect()
}

pub(crate) struct CorridorGeometry {
    builder: MeshBuilder<PosUvVertex>,
    corridor: MeshSlice,
}

impl CorridorGeometry {
    pub fn stats(&self) -> GeometryStats {
        GeometryStats::default().with("corridor", self.corridor)
    }
}

pub(crate) fn geometry() -> CorridorGeometry {
    let mut builder = MeshBuilder::new();
    let corridor = builder.push_vertices(corridor_panels());
    CorridorGeometry { builder, corridor }
}

pub struct MipmapDemo {
    vertices: VertexBuffer,
    corridor: MeshSlice,
    camera_binding: CameraBinding,
    texture_layout: wgpu::BindGroupLayout,
    wall: GpuTexture,
    colored: GpuTexture,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
    camera: Camera,
    settings: SamplerSettings,
    bound: SamplerSettings,
}

impl MipmapDemo {
    pub fn new(setup: &mut DemoSetup<'_>) -> Result<Self> {
        let gpu = setup.gpu;
        let device = &gpu.device;
        let geometry = geometry();

        let image = load_image_or_placeholder(setup.media.path(WALL_TEXTURE), true);
        let srgb = wgpu::TextureFormat::Rgba8UnormSrgb;
        let wall =
            GpuTexture::from_mips(device, &gpu.queue, "corridor-wall", &mip_chain(&image), srgb);
        let colored = GpuTexture::from_mips(
            device,
            &gpu.queue,
            "corridor-colored-mips",
            &colored_mip_chain(image.width, image.height, &MIP_COLORS),
            srgb,
        );

        let camera_binding = CameraBinding::new(device, "mipmap-camera");
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mipmap-texture"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                sampler_entry(1),
            ],
        });
        let settings = SamplerSettings::default();
        let bind_group = texture_bind_group(device, &texture_layout, &wall, settings);

        let shader = create_shader(device, "mipmap", SHADER)?;
        let buffers = [PosUvVertex::layout()];
        let pipeline = create_render_pipeline(
            device,
            &PipelineDesc {
                buffers: &buffers,
                bind_group_layouts: &[&camera_binding.layout, &texture_layout],
                ..PipelineDesc::new("mipmap", &shader, gpu.surface_format())
            },
        )?;

        Ok(Self {
            vertices: VertexBuffer::new(device, "corridor", geometry.builder.vertices()),
            corridor: geometry.corridor,
            camera_binding,
            texture_layout,
            wall,
            colored,
            bind_group,
            pipeline,
            camera: start_camera(),
            settings,
            bound: settings,
        })
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        egui::ComboBox::from_label("texture filter")
            .selected_text(self.settings.filter.label())
            .show_ui(ui, |ui| {
                for filter in TextureFilter::ALL {
                    ui.selectable_value(&mut self.settings.filter, filter, filter.label());
                }
            });
        ui.checkbox(&mut self.settings.colored_mips, "colored mip levels");
        ui.add_enabled(
            self.settings.filter == TextureFilter::LinearMipmapLinear,
            egui::Slider::new(&mut self.settings.anisotropy, 1..=16).text("anisotropy"),
        );
    }

    fn rebind_if_changed(&mut self, device: &wgpu::Device) {
        if self.settings == self.bound {
            return;
        }
        debug!("Rebinding corridor texture with {:?}", self.settings);
        let texture = if self.settings.colored_mips {
            &self.colored
        } else {
            &self.wall
        };
        self.bind_group = texture_bind_group(device, &self.texture_layout, texture, self.settings);
        self.bound = self.settings;
    }
}

fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &GpuTexture,
    settings: SamplerSettings,
) -> wgpu::BindGroup {
    let sampler = device.create_sampler(&settings.filter.sampler_descriptor(settings.anisotropy));
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("mipmap-texture"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    })
}

impl Demo for MipmapDemo {
    fn name(&self) -> &'static str {
        DemoKind::Mipmap.name()
    }

    fn update_and_render(&mut self, frame: &mut DemoFrame<'_>) {
        egui::Window::new(self.name()).show(frame.ui, |ui| self.controls(ui));
        self.rebind_if_changed(&frame.gpu.device);

        self.camera.update_free_fly(&frame.inputs.camera);
        let projection = Camera::projection(frame.inputs.aspect(), 60.0, 0.1, 400.0);
        self.camera_binding.update(&frame.gpu.queue, &self.camera, projection);

        let mut pass = frame.begin_pass("mipmap", clear_color(0.0, 0.0, 0.0));
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.camera_binding.bind_group, &[]);
        pass.set_bind_group(1, &self.bind_group, &[]);
        self.vertices.bind(&mut pass, 0);
        VertexBuffer::draw(&mut pass, self.corridor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_filters_sample_level_zero_only() {
        for filter in [TextureFilter::Nearest, TextureFilter::Linear] {
            let desc = filter.sampler_descriptor(16);
            assert!(!filter.uses_mipmaps());
            assert_eq!(desc.lod_max_clamp, 0.0);
            assert_eq!(desc.anisotropy_clamp, 1);
        }
        assert_eq!(
            TextureFilter::Nearest.sampler_descriptor(1).min_filter,
            wgpu::FilterMode::Nearest
        );
    }

    #[test]
    fn mipmap_filters_map_min_and_mip_modes() {
        let desc = TextureFilter::LinearMipmapNearest.sampler_descriptor(1);
        assert_eq!(desc.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(desc.mipmap_filter, wgpu::FilterMode::Nearest);
        let desc = TextureFilter::NearestMipmapLinear.sampler_descriptor(1);
        assert_eq!(desc.min_filter, wgpu::FilterMode::Nearest);
        assert_eq!(desc.mipmap_filter, wgpu::FilterMode::Linear);
        assert!(desc.lod_max_clamp > 0.0);
        for filter in TextureFilter::ALL {
            assert_eq!(filter.sampler_descriptor(1).mag_filter, wgpu::FilterMode::Linear);
        }
    }

    #[test]
    fn anisotropy_needs_trilinear_filtering() {
        assert_eq!(TextureFilter::LinearMipmapLinear.sampler_descriptor(8).anisotropy_clamp, 8);
        assert_eq!(TextureFilter::LinearMipmapLinear.sampler_descriptor(64).anisotropy_clamp, 16);
        assert_eq!(TextureFilter::LinearMipmapLinear.sampler_descriptor(0).anisotropy_clamp, 1);
        assert_eq!(TextureFilter::NearestMipmapLinear.sampler_descriptor(8).anisotropy_clamp, 1);
    }

    #[test]
    fn default_filter_is_trilinear() {
        assert_eq!(TextureFilter::default().to_string(), "GL_LINEAR_MIPMAP_LINEAR");
    }

    #[test]
    fn start_camera_looks_down_the_corridor() {
        let camera = start_camera();
        let forward = camera.forward();
        assert!(forward.z < -0.99);
        assert!(forward.y < 0.0);
        assert!(camera.view_matrix().transform_point3(Vec3::new(0.0, 0.0, -50.0)).z < 0.0);
    }

    #[test]
    fn corridor_panels_face_inward() {
        let vertices = corridor_panels();
        assert_eq!(vertices.len(), 24);
        let half = CORRIDOR_WIDTH / 2.0;
        for triangle in vertices.chunks_exact(3) {
            let [a, b, c] = [triangle[0].position, triangle[1].position, triangle[2].position];
            let face_normal = (b - a).cross(c - a).normalize();
            let centroid = (a + b + c) / 3.0;
            let axis = Vec3::new(0.0, 0.0, centroid.z);
            assert!(face_normal.dot(axis - centroid) > 0.0);
            assert!((face_normal - triangle[0].normal).length() < 1e-4);
            assert!(a.x.abs() <= half + 1e-4 && a.y.abs() <= half + 1e-4);
            assert!(a.z <= 1e-4 && a.z >= -CORRIDOR_LENGTH - 1e-4);
        }
    }

    #[test]
    fn corridor_uvs_repeat_per_tile() {
        let vertices = corridor_panels();
        let floor = &vertices[..6];
        let max_u = floor.iter().map(|v| v.uv.x).fold(0.0, f32::max);
        let max_v = floor.iter().map(|v| v.uv.y).fold(0.0, f32::max);
        assert_eq!(max_u, CORRIDOR_WIDTH / TILE_SIZE);
        assert_eq!(max_v, CORRIDOR_LENGTH / TILE_SIZE);
    }
}
