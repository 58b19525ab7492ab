//! Hemisphere sample kernel and rotation noise for ambient occlusion.
//!
//! Both tables are generated once from a seed and uploaded as-is: the kernel
//! into a uniform array of `vec4`s, the noise into a 4x4 texture that the
//! sampling shader tiles across the screen.

use glam::Vec3;
use rand::prelude::*;

/// Number of hemisphere samples taken per pixel.
pub const KERNEL_SIZE: usize = 64;
/// Edge length of the square noise tile.
pub const NOISE_DIM: u32 = 4;
/// Number of rotation vectors in the noise tile.
pub const NOISE_SIZE: usize = (NOISE_DIM * NOISE_DIM) as usize;

/// Upper bound on the length of sample `index`, the quadratic falloff that
/// clusters samples near the shaded point.
pub fn sample_scale(index: usize) -> f32 {
    let t = index as f32 / KERNEL_SIZE as f32;
    0.1 + (1.0 - 0.1) * t * t
}

/// Precomputed ambient occlusion sample tables.
#[derive(Clone, Debug, PartialEq)]
pub struct SsaoKernel {
    /// Tangent-space offsets with `z >= 0`, padded to `vec4`.
    pub samples: Vec<[f32; 4]>,
    /// Rotation vectors around the normal (`z == 0`), padded to `vec4`.
    pub noise: Vec<[f32; 4]>,
}

impl SsaoKernel {
    /// Build the kernel and noise tile from `seed`. The same seed always
    /// produces the same tables.
    pub fn generate(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let samples: Vec<[f32; 4]> = (0..KERNEL_SIZE)
            .map(|i| {
                let direction = Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(0.0..1.0),
                )
                .normalize_or_zero();
                let sample = direction * rng.gen_range(0.0f32..1.0) * sample_scale(i);
                [sample.x, sample.y, sample.z, 0.0]
            })
            .collect();

        let mut jitter = || rng.gen_range(-1.0f32..1.0);
        let noise: Vec<[f32; 4]> = (0..NOISE_SIZE)
            .map(|_| [jitter(), jitter(), 0.0, 0.0])
            .collect();

        Self { samples, noise }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magnitude(sample: &[f32; 4]) -> f32 {
        Vec3::new(sample[0], sample[1], sample[2]).length()
    }

    #[test]
    fn same_seed_same_tables() {
        assert_eq!(SsaoKernel::generate(7), SsaoKernel::generate(7));
        assert_ne!(SsaoKernel::generate(7), SsaoKernel::generate(8));
    }

    #[test]
    fn table_sizes() {
        let kernel = SsaoKernel::generate(1);
        assert_eq!(kernel.samples.len(), 64);
        assert_eq!(kernel.noise.len(), 16);
    }

    #[test]
    fn samples_lie_in_unit_hemisphere() {
        for seed in 0..8 {
            let kernel = SsaoKernel::generate(seed);
            for (i, sample) in kernel.samples.iter().enumerate() {
                let len = magnitude(sample);
                assert!((0.0..=1.0).contains(&len));
                assert!(len <= sample_scale(i) + 1e-6);
                assert!(sample[2] >= 0.0);
                assert_eq!(sample[3], 0.0);
            }
        }
    }

    #[test]
    fn samples_weighted_toward_origin() {
        for seed in 0..8 {
            let kernel = SsaoKernel::generate(seed);
            let (near, far) = kernel.samples.split_at(KERNEL_SIZE / 2);
            let near_mean: f32 = near.iter().map(magnitude).sum::<f32>() / near.len() as f32;
            let far_mean: f32 = far.iter().map(magnitude).sum::<f32>() / far.len() as f32;
            assert!(near_mean < far_mean);
        }
    }

    #[test]
    fn scale_is_monotonic() {
        for i in 0..KERNEL_SIZE - 1 {
            assert!(sample_scale(i) < sample_scale(i + 1));
        }
        assert!((sample_scale(0) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn noise_rotates_around_z() {
        let kernel = SsaoKernel::generate(3);
        for n in &kernel.noise {
            assert_eq!(n[2], 0.0);
            assert!(n[0].abs() <= 1.0 && n[1].abs() <= 1.0);
        }
    }
}
