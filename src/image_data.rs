//! CPU side texture preparation: image loading, placeholders, mip chains,
//! cubemap faces and procedural volumes.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use glam::Vec3;
use image::imageops::FilterType;
use image::RgbaImage;
use log::{error, info};

use crate::error::AssetError;
use crate::noise::{RidgeNoise, RidgeParams};

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = (width * height) as usize;
        Self {
            width,
            height,
            pixels: rgba.repeat(count),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * self.width + x) * 4) as usize;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }

    fn from_rgba(image: RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        }
    }

    fn to_rgba(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

/// Tightly packed RGBA32F pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct HdrImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<f32>,
}

/// Cubemap face file names in layer order (+X, -X, +Y, -Y, +Z, -Z).
pub const CUBEMAP_FACES: [&str; 6] = [
    "right.jpg",
    "left.jpg",
    "top.jpg",
    "bottom.jpg",
    "back.jpg",
    "front.jpg",
];

/// Loads an image as RGBA8, optionally flipped so that row 0 is the bottom.
pub fn load_image(path: impl AsRef<Path>, flip_vertically: bool) -> Result<ImageData, AssetError> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| AssetError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Load image '{}' ({}x{} {} channels)",
        path.display(),
        image.width(),
        image.height(),
        image.color().channel_count()
    );
    let image = if flip_vertically { image.flipv() } else { image };
    Ok(ImageData::from_rgba(image.to_rgba8()))
}

/// Loads an image, logging the failure and substituting a checkerboard.
pub fn load_image_or_placeholder(path: impl AsRef<Path>, flip_vertically: bool) -> ImageData {
    let path = path.as_ref();
    load_image(path, flip_vertically).unwrap_or_else(|err| {
        error!("Failed to load image '{}': {err:#}", path.display());
        placeholder()
    })
}

/// Magenta/black checkerboard used for missing textures.
pub fn placeholder() -> ImageData {
    checkerboard(64, 8, [255, 0, 255, 255], [0, 0, 0, 255])
}

/// Single texel of the given colour.
pub fn solid_color(r: f32, g: f32, b: f32, a: f32) -> ImageData {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    ImageData::filled(1, 1, [to_byte(r), to_byte(g), to_byte(b), to_byte(a)])
}

pub fn checkerboard(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> ImageData {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let color = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
            pixels.extend_from_slice(&color);
        }
    }
    ImageData {
        width: size,
        height: size,
        pixels,
    }
}

/// Number of levels in a full mip chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Full mip chain starting with `image` itself.
pub fn mip_chain(image: &ImageData) -> Vec<ImageData> {
    let Some(base) = image.to_rgba() else {
        return vec![image.clone()];
    };
    let levels = mip_level_count(image.width, image.height);
    let mut chain = Vec::with_capacity(levels as usize);
    chain.push(image.clone());
    let mut previous = base;
    for _ in 1..levels {
        let width = (previous.width() / 2).max(1);
        let height = (previous.height() / 2).max(1);
        let next = image::imageops::resize(&previous, width, height, FilterType::Triangle);
        chain.push(ImageData::from_rgba(next.clone()));
        previous = next;
    }
    chain
}

/// Mip chain where each level is a flat colour, used to visualise which
/// level the sampler picks. Levels past `colors` repeat the last colour.
pub fn colored_mip_chain(width: u32, height: u32, colors: &[[u8; 4]]) -> Vec<ImageData> {
    let levels = mip_level_count(width, height);
    (0..levels)
        .map(|level| {
            let color = colors
                .get(level as usize)
                .or(colors.last())
                .copied()
                .unwrap_or([255, 255, 255, 255]);
            ImageData::filled((width >> level).max(1), (height >> level).max(1), color)
        })
        .collect()
}

/// Loads the six skybox faces from `dir`. Faces are not flipped.
///
/// A missing or mismatched face is replaced by a tinted placeholder so the
/// cubemap stays complete.
pub fn load_cubemap_faces(dir: impl AsRef<Path>) -> [ImageData; 6] {
    const TINTS: [[u8; 4]; 6] = [
        [200, 60, 60, 255],
        [60, 200, 200, 255],
        [60, 200, 60, 255],
        [200, 60, 200, 255],
        [60, 60, 200, 255],
        [200, 200, 60, 255],
    ];
    let dir = dir.as_ref();
    let mut faces: [Result<ImageData, AssetError>; 6] =
        std::array::from_fn(|i| load_image(dir.join(CUBEMAP_FACES[i]), false));

    let expected = faces
        .iter()
        .find_map(|face| face.as_ref().ok().map(|image| image.width))
        .unwrap_or(64);
    for (face, name) in faces.iter_mut().zip(CUBEMAP_FACES) {
        if let Ok(image) = face {
            if image.width != expected || image.height != expected {
                *face = Err(AssetError::CubemapFace {
                    path: dir.join(name),
                    width: image.width,
                    height: image.height,
                    expected,
                });
            }
        }
    }

    let mut index = 0;
    faces.map(|face| {
        let tint = TINTS[index];
        index += 1;
        face.unwrap_or_else(|err| {
            error!("Skybox face unavailable: {err:#}");
            checkerboard(expected, 8, tint, [20, 20, 20, 255])
        })
    })
}

/// Loads an HDR image as RGBA32F. Row 0 is the top of the image.
pub fn load_hdr(path: impl AsRef<Path>) -> Result<HdrImage, AssetError> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|source| AssetError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Load image '{}' ({}x{} {} channels)",
        path.display(),
        image.width(),
        image.height(),
        image.color().channel_count()
    );
    let image = image.into_rgba32f();
    Ok(HdrImage {
        width: image.width(),
        height: image.height(),
        pixels: image.into_raw(),
    })
}

/// Equirectangular sky with a horizon gradient and a bright sun, used when no
/// HDR environment is available.
pub fn procedural_sky(width: u32, height: u32) -> HdrImage {
    let sun = Vec3::new(0.4, 0.6, -0.7).normalize();
    let zenith = Vec3::new(0.15, 0.3, 0.75);
    let horizon = Vec3::new(0.9, 0.85, 0.8);
    let ground = Vec3::new(0.18, 0.16, 0.14);

    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        let v = (y as f32 + 0.5) / height as f32;
        let elevation = (0.5 - v) * PI;
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let azimuth = (u - 0.5) * 2.0 * PI;
            let direction = Vec3::new(
                elevation.cos() * azimuth.cos(),
                elevation.sin(),
                elevation.cos() * azimuth.sin(),
            );
            let mut color = if direction.y >= 0.0 {
                horizon.lerp(zenith, direction.y.sqrt())
            } else {
                horizon.lerp(ground, (-direction.y).sqrt().min(1.0))
            };
            let sun_amount = direction.dot(sun).max(0.0).powf(512.0);
            color += Vec3::splat(40.0) * sun_amount;
            pixels.extend_from_slice(&[color.x, color.y, color.z, 1.0]);
        }
    }
    HdrImage {
        width,
        height,
        pixels,
    }
}

/// Ridge noise volume stored in the red channel of RGBA8 texels, laid out
/// slice by slice. Coordinates are normalised to the volume and scaled by
/// `frequency`.
pub fn ridge_noise_volume(
    width: u32,
    height: u32,
    depth: u32,
    frequency: f32,
    params: RidgeParams,
) -> ImageVolume {
    let noise = RidgeNoise::new(params);
    let mut texels = Vec::with_capacity((width * height * depth * 4) as usize);
    let mut max = f32::EPSILON;
    let mut values = Vec::with_capacity((width * height * depth) as usize);
    for z in 0..depth {
        let nz = z as f32 / depth as f32 * frequency;
        for y in 0..height {
            let ny = y as f32 / height as f32 * frequency;
            for x in 0..width {
                let nx = x as f32 / width as f32 * frequency;
                let value = noise.sample(nx, ny, nz);
                max = max.max(value);
                values.push(value);
            }
        }
    }
    for value in values {
        let byte = (value / max * 255.0).round().clamp(0.0, 255.0) as u8;
        texels.extend_from_slice(&[byte, byte, byte, 255]);
    }
    ImageVolume {
        width,
        height,
        depth,
        texels,
    }
}

/// Tightly packed RGBA8 volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVolume {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub texels: Vec<u8>,
}

/// Resolves media file names against a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDir(PathBuf);

impl MediaDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    pub fn root(&self) -> &Path {
        &self.0
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.0.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_level_counts() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 1), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(300, 17), 9);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn mip_chain_halves_down_to_one_texel() {
        let chain = mip_chain(&checkerboard(64, 8, [255; 4], [0, 0, 0, 255]));
        assert_eq!(chain.len(), 7);
        for (level, image) in chain.iter().enumerate() {
            assert_eq!(image.width, 64 >> level);
            assert_eq!(image.pixels.len(), (image.width * image.height * 4) as usize);
        }
        let last = chain.last().unwrap().pixel(0, 0);
        assert!((100..=155).contains(&last[0]), "averaged checker is grey, got {last:?}");
    }

    #[test]
    fn colored_levels_follow_palette() {
        let colors = [[255, 0, 255, 255], [255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]];
        let chain = colored_mip_chain(32, 16, &colors);
        assert_eq!(chain.len(), 6);
        assert_eq!(chain[0].pixel(0, 0), colors[0]);
        assert_eq!(chain[2].pixel(3, 1), colors[2]);
        assert_eq!(chain[5].pixel(0, 0), colors[3]);
        assert_eq!((chain[5].width, chain[5].height), (1, 1));
        assert_eq!((chain[4].width, chain[4].height), (2, 1));
    }

    #[test]
    fn solid_color_rounds_to_bytes() {
        let image = solid_color(0.5, 0.5, 1.0, 1.0);
        assert_eq!(image.pixel(0, 0), [128, 128, 255, 255]);
    }

    #[test]
    fn missing_image_uses_placeholder() {
        let image = load_image_or_placeholder("no/such/file.jpg", true);
        assert_eq!(image, placeholder());
    }

    #[test]
    fn missing_cubemap_faces_stay_complete() {
        let dir = std::env::temp_dir().join("render-demos-missing-skybox");
        let faces = load_cubemap_faces(&dir);
        for face in &faces {
            assert_eq!(face.width, faces[0].width);
            assert_eq!(face.width, face.height);
        }
        assert_ne!(faces[0], faces[1]);
    }

    #[test]
    fn procedural_sky_is_brighter_above_horizon() {
        let sky = procedural_sky(64, 32);
        let luminance = |y: u32| {
            let offset = ((y * sky.width) * 4) as usize;
            sky.pixels[offset] + sky.pixels[offset + 1] + sky.pixels[offset + 2]
        };
        assert_eq!(sky.pixels.len(), 64 * 32 * 4);
        assert!(luminance(4) > luminance(28) * 0.5);
        assert!(sky.pixels.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn noise_volume_is_normalised() {
        let volume = ridge_noise_volume(8, 8, 4, 4.0, RidgeParams::default());
        assert_eq!(volume.texels.len(), 8 * 8 * 4 * 4);
        assert!(volume.texels.chunks_exact(4).any(|t| t[0] == 255));
    }
}
