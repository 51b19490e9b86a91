//! PBR sphere grid lit by an HDR environment.
//!
//! On construction the equirectangular environment is projected onto a
//! cubemap, convolved into an irradiance map and a prefiltered specular map
//! on the GPU, and the split-sum BRDF table is integrated on the CPU.

use std::f32::consts::SQRT_2;
use std::time::Instant;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use log::{info, warn};

use crate::brdf::{brdf_lut, cube_face_direction};
use crate::image_data::{load_hdr, mip_level_count, procedural_sky, HdrImage, MediaDir};
use crate::mesh::MeshBuilder;
use crate::render::{
    create_render_pipeline, create_shader, linear_sampler, sampler_entry, texture_entry,
    unfilterable_texture_entry, uniform_entry, DynamicUniformBuffer, GpuContext, GpuTexture,
    PipelineDesc, PositionVertex, UniformBuffer,
};

use super::pbr::{self, PbrScene};
use super::skybox::{SkyParams, SkyRenderer};
use super::{clear_color, Demo, DemoFrame, DemoKind, DemoSetup};

const IBL_SHADER: &str = concat!(
    include_str!("shaders/pbr_common.wgsl"),
    include_str!("shaders/ibl.wgsl")
);
const PRECOMPUTE_SHADER: &str = include_str!("shaders/ibl_precompute.wgsl");

const ENVIRONMENT_HDR: &str = "environment.hdr";
const PROCEDURAL_SKY_SIZE: (u32, u32) = (1024, 512);

const CUBE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const ENVIRONMENT_SIZE: u32 = 512;
const IRRADIANCE_SIZE: u32 = 32;
const PREFILTER_SIZE: u32 = 128;
const PREFILTER_MIPS: u32 = 5;
const BRDF_LUT_SIZE: u32 = 64;
const BRDF_SAMPLES: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Background {
    #[default]
    Environment,
    Irradiance,
    Prefiltered,
}

impl Background {
    pub const ALL: [Background; 3] = [
        Background::Environment,
        Background::Irradiance,
        Background::Prefiltered,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Background::Environment => "environment",
            Background::Irradiance => "irradiance",
            Background::Prefiltered => "prefiltered",
        }
    }

    /// Index of the matching cubemap in the sky renderer.
    fn index(self) -> usize {
        match self {
            Background::Environment => 0,
            Background::Irradiance => 1,
            Background::Prefiltered => 2,
        }
    }

    fn max_lod(self) -> f32 {
        match self {
            Background::Environment => {
                (mip_level_count(ENVIRONMENT_SIZE, ENVIRONMENT_SIZE) - 1) as f32
            }
            Background::Irradiance => 0.0,
            Background::Prefiltered => (PREFILTER_MIPS - 1) as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IblSettings {
    pub background: Background,
    /// Mip level shown in the background.
    pub lod: f32,
    /// Scale of the image based (ambient) term.
    pub intensity: f32,
}

impl Default for IblSettings {
    fn default() -> Self {
        Self {
            background: Background::default(),
            lod: 0.0,
            intensity: 1.0,
        }
    }
}

impl IblSettings {
    fn controls(&mut self, ui: &mut egui::Ui) {
        egui::ComboBox::from_label("background")
            .selected_text(self.background.label())
            .show_ui(ui, |ui| {
                for background in Background::ALL {
                    ui.selectable_value(&mut self.background, background, background.label());
                }
            });
        let max_lod = self.background.max_lod();
        self.lod = self.lod.min(max_lod);
        ui.add_enabled(
            max_lod > 0.0,
            egui::Slider::new(&mut self.lod, 0.0..=max_lod).text("lod"),
        );
        ui.add(egui::Slider::new(&mut self.intensity, 0.0..=4.0).text("IBL intensity"));
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct EnvironmentUniform {
    params: [f32; 4],
}

impl EnvironmentUniform {
    fn new(settings: &IblSettings) -> Self {
        Self {
            params: [settings.intensity, (PREFILTER_MIPS - 1) as f32, 0.0, 0.0],
        }
    }
}

/// Frame of one cube face: `forward + a.x * u_axis + a.y * v_axis` points
/// through texel `(a + 1) / 2` before normalisation.
pub(crate) fn face_basis(face: u32) -> [Vec3; 3] {
    let forward = cube_face_direction(face, Vec2::splat(0.5));
    let u_axis = cube_face_direction(face, Vec2::new(1.0, 0.5)) * SQRT_2 - forward;
    let v_axis = cube_face_direction(face, Vec2::new(0.5, 1.0)) * SQRT_2 - forward;
    [forward, u_axis, v_axis]
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct FaceUniform {
    forward: [f32; 4],
    u_axis: [f32; 4],
    v_axis: [f32; 4],
    params: [f32; 4],
}

impl FaceUniform {
    fn new(face: u32, roughness: f32, target_size: u32) -> Self {
        let [forward, u_axis, v_axis] = face_basis(face);
        Self {
            forward: forward.extend(0.0).to_array(),
            u_axis: u_axis.extend(0.0).to_array(),
            v_axis: v_axis.extend(0.0).to_array(),
            params: [roughness, target_size as f32, ENVIRONMENT_SIZE as f32, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Environment,
    Irradiance,
    Prefilter,
}

#[derive(Debug, Clone, Copy)]
struct FacePass {
    stage: Stage,
    face: u32,
    mip: u32,
    uniform: FaceUniform,
}

/// Every face and mip level rendered by the precompute, in submission order.
fn face_passes() -> Vec<FacePass> {
    let mut passes = Vec::new();
    let mut push = |stage: Stage, mip: u32, roughness: f32, size: u32| {
        for face in 0..6 {
            passes.push(FacePass {
                stage,
                face,
                mip,
                uniform: FaceUniform::new(face, roughness, (size >> mip).max(1)),
            });
        }
    };
    for mip in 0..mip_level_count(ENVIRONMENT_SIZE, ENVIRONMENT_SIZE) {
        push(Stage::Environment, mip, 0.0, ENVIRONMENT_SIZE);
    }
    push(Stage::Irradiance, 0, 0.0, IRRADIANCE_SIZE);
    for mip in 0..PREFILTER_MIPS {
        let roughness = mip as f32 / (PREFILTER_MIPS - 1) as f32;
        push(Stage::Prefilter, mip, roughness, PREFILTER_SIZE);
    }
    passes
}

/// The HDR environment from the media directory, or the procedural sky when
/// it is missing or larger than the device allows.
fn environment_source(media: &MediaDir, max_dimension: u32) -> HdrImage {
    let path = media.path(ENVIRONMENT_HDR);
    match load_hdr(&path) {
        Ok(image) if image.width <= max_dimension && image.height <= max_dimension => {
            return image;
        }
        Ok(image) => warn!(
            "Environment map '{}' is {}x{}, over the {max_dimension} texel limit",
            path.display(),
            image.width,
            image.height
        ),
        Err(err) => warn!("Environment map unavailable: {err:#}"),
    }
    let (width, height) = PROCEDURAL_SKY_SIZE;
    info!("Using a {width}x{height} procedural sky");
    procedural_sky(width, height)
}

struct EnvironmentMaps {
    environment: GpuTexture,
    irradiance: GpuTexture,
    prefiltered: GpuTexture,
    brdf_lut: GpuTexture,
}

fn precompute(gpu: &GpuContext, source: &HdrImage) -> Result<EnvironmentMaps> {
    let start = Instant::now();
    let device = &gpu.device;
    let queue = &gpu.queue;

    let environment = GpuTexture::render_cube(
        device,
        "ibl-environment",
        ENVIRONMENT_SIZE,
        mip_level_count(ENVIRONMENT_SIZE, ENVIRONMENT_SIZE),
        CUBE_FORMAT,
    );
    let irradiance =
        GpuTexture::render_cube(device, "ibl-irradiance", IRRADIANCE_SIZE, 1, CUBE_FORMAT);
    let prefiltered = GpuTexture::render_cube(
        device,
        "ibl-prefiltered",
        PREFILTER_SIZE,
        PREFILTER_MIPS,
        CUBE_FORMAT,
    );
    let equirect = GpuTexture::hdr(device, queue, "ibl-equirect", source);

    let passes = face_passes();
    let uniforms: Vec<FaceUniform> = passes.iter().map(|pass| pass.uniform).collect();
    let mut faces = DynamicUniformBuffer::new(device, "ibl-faces", uniforms.len());
    faces.write(queue, &uniforms);

    let face_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("ibl-face"),
        entries: &[uniform_entry(
            0,
            wgpu::ShaderStages::FRAGMENT,
            true,
            DynamicUniformBuffer::<FaceUniform>::SIZE,
        )],
    });
    let face_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("ibl-face"),
        layout: &face_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: faces.binding(),
        }],
    });

    // The projection reads the equirect image while writing the environment
    // cube, the convolutions read the cube, so they get separate groups.
    let equirect_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("ibl-equirect"),
        entries: &[unfilterable_texture_entry(0)],
    });
    let equirect_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("ibl-equirect"),
        layout: &equirect_layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(&equirect.view),
        }],
    });
    let sampler = linear_sampler(device, "ibl-precompute", wgpu::AddressMode::ClampToEdge);
    let cube_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("ibl-environment"),
        entries: &[
            texture_entry(1, wgpu::TextureViewDimension::Cube),
            sampler_entry(2),
        ],
    });
    let cube_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("ibl-environment"),
        layout: &cube_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&environment.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });

    let shader = create_shader(device, "ibl-precompute", PRECOMPUTE_SHADER)?;
    let pipeline = |entry: &str, layout: &wgpu::BindGroupLayout| {
        create_render_pipeline(
            device,
            &PipelineDesc {
                vertex_entry: "vs_fullscreen",
                fragment_entry: entry,
                bind_group_layouts: &[&face_layout, layout],
                cull_mode: None,
                depth: None,
                ..PipelineDesc::new(entry, &shader, CUBE_FORMAT)
            },
        )
    };
    let equirect_pipeline = pipeline("fs_equirect", &equirect_layout)?;
    let irradiance_pipeline = pipeline("fs_irradiance", &cube_layout)?;
    let prefilter_pipeline = pipeline("fs_prefilter", &cube_layout)?;

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("ibl-precompute"),
    });
    for (index, face_pass) in passes.iter().enumerate() {
        let (target, pipeline, group) = match face_pass.stage {
            Stage::Environment => (&environment, &equirect_pipeline, &equirect_group),
            Stage::Irradiance => (&irradiance, &irradiance_pipeline, &cube_group),
            Stage::Prefilter => (&prefiltered, &prefilter_pipeline, &cube_group),
        };
        let view = target.face_view(face_pass.face, face_pass.mip);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ibl-face"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &face_group, &[faces.offset(index)]);
        pass.set_bind_group(1, group, &[]);
        pass.draw(0..3, 0..1);
    }
    queue.submit(Some(encoder.finish()));

    let lut = brdf_lut(BRDF_LUT_SIZE, BRDF_SAMPLES);
    let brdf_lut = GpuTexture::from_mips(
        device,
        queue,
        "ibl-brdf-lut",
        &[lut],
        wgpu::TextureFormat::Rgba8Unorm,
    );
    info!(
        "Precomputed IBL maps from a {}x{} environment in {:.2?}",
        source.width,
        source.height,
        start.elapsed()
    );

    Ok(EnvironmentMaps {
        environment,
        irradiance,
        prefiltered,
        brdf_lut,
    })
}

pub struct IblDemo {
    scene: PbrScene,
    sky: SkyRenderer,
    environment: UniformBuffer<EnvironmentUniform>,
    environment_group: wgpu::BindGroup,
    settings: IblSettings,
}

impl IblDemo {
    pub fn new(setup: &mut DemoSetup<'_>) -> Result<Self> {
        let gpu = setup.gpu;
        let device = &gpu.device;
        let settings = IblSettings::default();

        let source = environment_source(setup.media, device.limits().max_texture_dimension_2d);
        let maps = precompute(gpu, &source)?;

        let environment = UniformBuffer::new(
            device,
            "ibl-environment-params",
            &EnvironmentUniform::new(&settings),
        );
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ibl-lighting"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube),
                texture_entry(1, wgpu::TextureViewDimension::Cube),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                sampler_entry(3),
                uniform_entry(
                    4,
                    wgpu::ShaderStages::FRAGMENT,
                    false,
                    UniformBuffer::<EnvironmentUniform>::SIZE,
                ),
            ],
        });
        let sampler = linear_sampler(device, "ibl-lighting", wgpu::AddressMode::ClampToEdge);
        let environment_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ibl-lighting"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&maps.irradiance.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&maps.prefiltered.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&maps.brdf_lut.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: environment.binding(),
                },
            ],
        });

        let scene = PbrScene::new(setup, "ibl", IBL_SHADER, &[&layout])?;

        let mut cube = MeshBuilder::<PositionVertex>::new();
        cube.gen_cube(1.0);
        let sky = SkyRenderer::new(
            device,
            gpu.surface_format(),
            &cube,
            &[
                &maps.environment.view,
                &maps.irradiance.view,
                &maps.prefiltered.view,
            ],
        )?;

        Ok(Self {
            scene,
            sky,
            environment,
            environment_group,
            settings,
        })
    }
}

impl Demo for IblDemo {
    fn name(&self) -> &'static str {
        DemoKind::Ibl.name()
    }

    fn update_and_render(&mut self, frame: &mut DemoFrame<'_>) {
        egui::Window::new(self.name()).show(frame.ui, |ui| {
            self.scene.controls(ui);
            ui.separator();
            self.settings.controls(ui);
        });

        self.scene.prepare(frame);
        let queue = &frame.gpu.queue;
        self.sky.prepare(
            queue,
            &self.scene.camera,
            pbr::projection(frame.inputs.aspect()),
            SkyParams::new(self.settings.lod, true),
        );
        self.environment.write(queue, &EnvironmentUniform::new(&self.settings));

        let mut pass = frame.begin_pass("ibl", clear_color(0.0, 0.0, 0.0));
        pass.set_bind_group(3, &self.environment_group, &[]);
        self.scene.draw(&mut pass);
        self.sky.draw(&mut pass, self.settings.background.index());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_basis_spans_the_cube_face() {
        for face in 0..6 {
            let [forward, u_axis, v_axis] = face_basis(face);
            for uv in [Vec2::new(0.1, 0.9), Vec2::new(0.75, 0.25), Vec2::ZERO, Vec2::ONE] {
                let a = uv * 2.0 - Vec2::ONE;
                let from_basis = (forward + a.x * u_axis + a.y * v_axis).normalize();
                let expected = cube_face_direction(face, uv);
                assert!(
                    from_basis.abs_diff_eq(expected, 1e-5),
                    "face {face} at {uv}: {from_basis} != {expected}"
                );
            }
        }
    }

    #[test]
    fn passes_cover_every_face_and_level() {
        let passes = face_passes();
        let environment_mips = mip_level_count(ENVIRONMENT_SIZE, ENVIRONMENT_SIZE);
        assert_eq!(passes.len() as u32, 6 * (environment_mips + 1 + PREFILTER_MIPS));
        let count = |stage| passes.iter().filter(|pass| pass.stage == stage).count();
        assert_eq!(count(Stage::Irradiance), 6);
        assert_eq!(count(Stage::Prefilter) as u32, 6 * PREFILTER_MIPS);

        // The environment is complete before anything samples it.
        let last_environment = passes
            .iter()
            .rposition(|pass| pass.stage == Stage::Environment);
        let first_convolution = passes
            .iter()
            .position(|pass| pass.stage != Stage::Environment);
        assert!(last_environment < first_convolution);
    }

    #[test]
    fn prefilter_roughness_grows_with_mip_level() {
        let prefilter: Vec<_> = face_passes()
            .into_iter()
            .filter(|pass| pass.stage == Stage::Prefilter)
            .collect();
        let first = prefilter[0];
        let last = prefilter[prefilter.len() - 1];
        assert_eq!(first.uniform.params[0], 0.0);
        assert_eq!(first.uniform.params[1], PREFILTER_SIZE as f32);
        assert_eq!(last.mip, PREFILTER_MIPS - 1);
        assert_eq!(last.uniform.params[0], 1.0);
        assert_eq!(last.uniform.params[1], (PREFILTER_SIZE >> last.mip) as f32);
    }

    #[test]
    fn background_lod_range_follows_the_cubemap() {
        assert_eq!(Background::Environment.max_lod(), 9.0);
        assert_eq!(Background::Irradiance.max_lod(), 0.0);
        assert_eq!(Background::Prefiltered.max_lod(), 4.0);
        let indices: Vec<_> = Background::ALL.iter().map(|b| b.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn missing_hdr_falls_back_to_the_procedural_sky() {
        let dir = tempfile::tempdir().unwrap();
        let sky = environment_source(&MediaDir::new(dir.path()), 8192);
        assert_eq!((sky.width, sky.height), PROCEDURAL_SKY_SIZE);
        assert_eq!(sky.pixels.len(), (sky.width * sky.height * 4) as usize);
    }

    #[test]
    fn uniforms_match_wgsl_structs() {
        assert_eq!(std::mem::size_of::<FaceUniform>(), 64);
        assert_eq!(std::mem::size_of::<EnvironmentUniform>(), 16);
        let uniform = EnvironmentUniform::new(&IblSettings::default());
        assert_eq!(uniform.params[..2], [1.0, 4.0]);
    }

    #[test]
    fn shaders_declare_their_entry_points() {
        for entry in [
            "fn vs_main",
            "fn fs_basic",
            "fn fs_textured",
            "fn ambient_lighting",
        ] {
            assert!(IBL_SHADER.contains(entry), "{entry}");
        }
        for entry in [
            "fn vs_fullscreen",
            "fn fs_equirect",
            "fn fs_irradiance",
            "fn fs_prefilter",
        ] {
            assert!(PRECOMPUTE_SHADER.contains(entry), "{entry}");
        }
    }
}
