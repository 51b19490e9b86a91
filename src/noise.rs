//! Gradient noise used to fill procedural textures.

/// Seeded 3D gradient noise in the style of Ken Perlin's improved noise.
#[derive(Clone)]
pub struct Perlin {
    perm: [u8; 512],
}

impl Perlin {
    pub fn new(seed: u32) -> Self {
        let mut table: [u8; 256] = std::array::from_fn(|i| i as u8);
        // xorshift32 driven Fisher-Yates
        let mut state = seed.wrapping_mul(0x9E37_79B9) | 1;
        for i in (1..256).rev() {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let j = (state % (i as u32 + 1)) as usize;
            table.swap(i, j);
        }
        let mut perm = [0u8; 512];
        for (i, value) in perm.iter_mut().enumerate() {
            *value = table[i & 255];
        }
        Self { perm }
    }

    /// Noise value in roughly `[-1, 1]`, zero on every lattice point.
    pub fn noise3(&self, x: f32, y: f32, z: f32) -> f32 {
        let xf = x.floor();
        let yf = y.floor();
        let zf = z.floor();
        let xi = (xf as i32 & 255) as usize;
        let yi = (yf as i32 & 255) as usize;
        let zi = (zf as i32 & 255) as usize;
        let x = x - xf;
        let y = y - yf;
        let z = z - zf;
        let u = fade(x);
        let v = fade(y);
        let w = fade(z);

        let p = &self.perm;
        let a = p[xi] as usize + yi;
        let aa = p[a] as usize + zi;
        let ab = p[a + 1] as usize + zi;
        let b = p[xi + 1] as usize + yi;
        let ba = p[b] as usize + zi;
        let bb = p[b + 1] as usize + zi;

        lerp(
            w,
            lerp(
                v,
                lerp(u, grad(p[aa], x, y, z), grad(p[ba], x - 1.0, y, z)),
                lerp(u, grad(p[ab], x, y - 1.0, z), grad(p[bb], x - 1.0, y - 1.0, z)),
            ),
            lerp(
                v,
                lerp(
                    u,
                    grad(p[aa + 1], x, y, z - 1.0),
                    grad(p[ba + 1], x - 1.0, y, z - 1.0),
                ),
                lerp(
                    u,
                    grad(p[ab + 1], x, y - 1.0, z - 1.0),
                    grad(p[bb + 1], x - 1.0, y - 1.0, z - 1.0),
                ),
            ),
        )
    }
}

/// Parameters of the ridged multifractal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RidgeParams {
    pub lacunarity: f32,
    pub gain: f32,
    pub offset: f32,
    pub octaves: u32,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self {
            lacunarity: 2.0,
            gain: 0.5,
            offset: 1.0,
            octaves: 6,
        }
    }
}

/// Ridged multifractal built from per-octave seeded gradient noise.
pub struct RidgeNoise {
    octaves: Vec<Perlin>,
    params: RidgeParams,
}

impl RidgeNoise {
    pub fn new(params: RidgeParams) -> Self {
        Self {
            octaves: (0..params.octaves).map(Perlin::new).collect(),
            params,
        }
    }

    pub fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
        let mut frequency = 1.0;
        let mut amplitude = 0.5;
        let mut prev = 1.0;
        let mut sum = 0.0;
        for octave in &self.octaves {
            let r = octave.noise3(x * frequency, y * frequency, z * frequency);
            let r = self.params.offset - r.abs();
            let r = r * r;
            sum += r * amplitude * prev;
            prev = r;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.gain;
        }
        sum
    }
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f32, y: f32, z: f32) -> f32 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    (if h & 1 == 0 { u } else { -u }) + (if h & 2 == 0 { v } else { -v })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_points_are_zero() {
        let perlin = Perlin::new(3);
        for i in -3..3 {
            assert_eq!(perlin.noise3(i as f32, 2.0, -(i as f32)), 0.0);
        }
    }

    #[test]
    fn noise_is_bounded_and_deterministic() {
        let a = Perlin::new(7);
        let b = Perlin::new(7);
        for i in 0..200 {
            let p = i as f32 * 0.173;
            let value = a.noise3(p, p * 0.5, p * 1.3);
            assert!(value.abs() <= 1.5);
            assert_eq!(value, b.noise3(p, p * 0.5, p * 1.3));
        }
    }

    #[test]
    fn seeds_change_the_permutation() {
        let a = Perlin::new(0);
        let b = Perlin::new(1);
        let differs = (0..50).any(|i| {
            let p = i as f32 * 0.37 + 0.11;
            a.noise3(p, 0.5, 0.25) != b.noise3(p, 0.5, 0.25)
        });
        assert!(differs);
    }

    #[test]
    fn ridge_noise_is_non_negative() {
        let ridge = RidgeNoise::new(RidgeParams::default());
        for i in 0..100 {
            let p = i as f32 / 100.0;
            assert!(ridge.sample(p, 1.0 - p, 0.5) >= 0.0);
        }
    }
}
