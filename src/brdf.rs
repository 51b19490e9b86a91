//! Split-sum BRDF integration and the sampling helpers shared with the IBL
//! precompute shaders.

use std::f32::consts::PI;

use glam::{Vec2, Vec3};

use crate::image_data::ImageData;

/// Van der Corput radical inverse in base 2.
pub fn radical_inverse_vdc(bits: u32) -> f32 {
    bits.reverse_bits() as f32 * 2.328_306_4e-10
}

pub fn hammersley(i: u32, count: u32) -> Vec2 {
    Vec2::new(i as f32 / count as f32, radical_inverse_vdc(i))
}

/// GGX distributed half vector around `normal`.
pub fn importance_sample_ggx(xi: Vec2, normal: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);

    let up = if normal.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = up.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    (tangent * h.x + bitangent * h.y + normal * h.z).normalize()
}

fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    // IBL uses k = a^2 / 2 rather than the direct lighting remap.
    let k = roughness * roughness / 2.0;
    n_dot_v / (n_dot_v * (1.0 - k) + k)
}

pub fn geometry_smith_ibl(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness)
}

/// Returns the Fresnel scale and bias of the split-sum approximation.
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, samples: u32) -> Vec2 {
    let n_dot_v = n_dot_v.max(1e-4);
    let view = Vec3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);
    let normal = Vec3::Z;

    let mut a = 0.0;
    let mut b = 0.0;
    for i in 0..samples {
        let xi = hammersley(i, samples);
        let h = importance_sample_ggx(xi, normal, roughness);
        let light = (2.0 * view.dot(h) * h - view).normalize();

        let n_dot_l = light.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = view.dot(h).max(0.0);
        if n_dot_l > 0.0 && n_dot_h > 0.0 {
            let g = geometry_smith_ibl(n_dot_v, n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v);
            let fc = (1.0 - v_dot_h).powi(5);
            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }
    Vec2::new(a, b) / samples.max(1) as f32
}

/// Square lookup table indexed by `(n_dot_v, roughness)` in texture
/// coordinates. Red holds the scale, green the bias.
pub fn brdf_lut(size: u32, samples: u32) -> ImageData {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        let roughness = (y as f32 + 0.5) / size as f32;
        for x in 0..size {
            let n_dot_v = (x as f32 + 0.5) / size as f32;
            let value = integrate_brdf(n_dot_v, roughness, samples);
            let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            pixels.extend_from_slice(&[to_byte(value.x), to_byte(value.y), 0, 255]);
        }
    }
    ImageData {
        width: size,
        height: size,
        pixels,
    }
}

/// Direction through texel coordinate `uv` of cube `face`, in layer order
/// +X, -X, +Y, -Y, +Z, -Z.
pub fn cube_face_direction(face: u32, uv: Vec2) -> Vec3 {
    let a = uv * 2.0 - Vec2::ONE;
    let direction = match face {
        0 => Vec3::new(1.0, -a.y, -a.x),
        1 => Vec3::new(-1.0, -a.y, a.x),
        2 => Vec3::new(a.x, 1.0, a.y),
        3 => Vec3::new(a.x, -1.0, -a.y),
        4 => Vec3::new(a.x, -a.y, 1.0),
        _ => Vec3::new(-a.x, -a.y, -1.0),
    };
    direction.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radical_inverse_mirrors_bits() {
        assert_eq!(radical_inverse_vdc(0), 0.0);
        assert!((radical_inverse_vdc(1) - 0.5).abs() < 1e-6);
        assert!((radical_inverse_vdc(2) - 0.25).abs() < 1e-6);
        assert!((radical_inverse_vdc(3) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn smooth_surface_head_on_reflects_everything() {
        let value = integrate_brdf(1.0, 0.0, 64);
        assert!((value.x - 1.0).abs() < 1e-3, "scale was {}", value.x);
        assert!(value.y.abs() < 1e-3, "bias was {}", value.y);
    }

    #[test]
    fn grazing_rough_surface_loses_energy() {
        let head_on = integrate_brdf(0.95, 0.5, 256);
        let grazing = integrate_brdf(0.05, 0.9, 256);
        assert!(grazing.x + grazing.y < head_on.x + head_on.y);
        assert!(grazing.y > 0.0);
    }

    #[test]
    fn ggx_samples_stay_in_hemisphere() {
        let normal = Vec3::new(0.3, 0.8, -0.2).normalize();
        for i in 0..64 {
            let h = importance_sample_ggx(hammersley(i, 64), normal, 0.7);
            assert!(h.dot(normal) >= -1e-5);
            assert!((h.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn lut_has_requested_size() {
        let lut = brdf_lut(8, 16);
        assert_eq!(lut.pixels.len(), 8 * 8 * 4);
        // smooth and head on is bright red, rough and grazing is dark
        assert!(lut.pixel(7, 0)[0] > lut.pixel(0, 7)[0]);
    }

    #[test]
    fn cube_face_centres_point_along_axes() {
        let centre = Vec2::splat(0.5);
        let expected = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z];
        for (face, axis) in expected.into_iter().enumerate() {
            let direction = cube_face_direction(face as u32, centre);
            assert!((direction - axis).length() < 1e-5, "face {face}");
        }
    }

    #[test]
    fn cube_face_top_row_looks_up_on_side_faces() {
        for face in [0, 1, 4, 5] {
            let direction = cube_face_direction(face, Vec2::new(0.5, 0.0));
            assert!(direction.y > 0.5, "face {face}");
        }
    }
}
