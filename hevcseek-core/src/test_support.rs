//! Synthetic-frame generation and a simplified SSIM helper for exercising
//! the round-trip/fidelity properties in `reader`/`writer` tests.
//!
//! Test-only scaffolding, not part of the public API: a real SSIM
//! implementation is windowed (8x8 or 11x11 Gaussian) and reused across many
//! callers, but these tests only need one global number per frame pair to
//! check "close enough after lossy HEVC encode", so a single whole-image
//! SSIM computation is enough.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use crate::frame::Frame;

/// Builds a frame of uniform random noise, seeded by `seed` so repeated
/// calls with the same arguments reproduce the same bytes. Noise content is
/// the worst case for lossy compression, used by the round-trip fidelity
/// tests that only require `SSIM >= 0.8`.
pub(crate) fn synthetic_frame(width: u32, height: u32, gray: bool, seed: u64) -> Frame {
    let channels = if gray {
        1
    } else {
        3
    };
    let len = width as usize * height as usize * channels;
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    Frame::new(gray, width, height, data)
}

/// Builds a low-pass-filtered (smoothly varying) frame: a diagonal gradient
/// offset by `seed`. Compresses far better than noise, used by the
/// fidelity tests expecting `SSIM >= ~0.95`.
pub(crate) fn smooth_frame(width: u32, height: u32, gray: bool, seed: u64) -> Frame {
    let channels = if gray {
        1
    } else {
        3
    };
    let offset = (seed % 256) as u8;
    let mut data = Vec::with_capacity(width as usize * height as usize * channels);
    for row in 0..height {
        for col in 0..width {
            let value = offset.wrapping_add(((row + col) % 256) as u8);
            for _ in 0..channels {
                data.push(value);
            }
        }
    }
    Frame::new(gray, width, height, data)
}

/// Luma samples of a frame: the gray channel directly, or the average of
/// R/G/B for color frames.
fn luma_samples(frame: &Frame) -> Vec<f64> {
    match frame {
        Frame::Gray8 {
            data, ..
        } => data.iter().map(|&b| f64::from(b)).collect(),
        Frame::Rgb24 {
            data, ..
        } => data
            .chunks_exact(3)
            .map(|px| (f64::from(px[0]) + f64::from(px[1]) + f64::from(px[2])) / 3.0)
            .collect(),
    }
}

/// Whole-image SSIM between two same-sized frames, approximating the
/// windowed metric with a single global window over luma samples.
pub(crate) fn ssim(a: &Frame, b: &Frame) -> f64 {
    let xs = luma_samples(a);
    let ys = luma_samples(b);
    assert_eq!(xs.len(), ys.len(), "ssim requires equally-sized frames");

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let var_x = xs.iter().map(|&x| (x - mean_x).powi(2)).sum::<f64>() / n;
    let var_y = ys.iter().map(|&y| (y - mean_y).powi(2)).sum::<f64>() / n;
    let cov_xy = xs.iter().zip(&ys).map(|(&x, &y)| (x - mean_x) * (y - mean_y)).sum::<f64>() / n;

    let c1 = (0.01 * 255.0f64).powi(2);
    let c2 = (0.03 * 255.0f64).powi(2);

    ((2.0 * mean_x * mean_y + c1) * (2.0 * cov_xy + c2))
        / ((mean_x.powi(2) + mean_y.powi(2) + c1) * (var_x + var_y + c2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_frames_have_ssim_one() {
        let frame = synthetic_frame(16, 16, true, 7);
        assert!((ssim(&frame, &frame) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn synthetic_frame_is_deterministic_per_seed() {
        assert_eq!(synthetic_frame(8, 8, false, 42), synthetic_frame(8, 8, false, 42));
        assert_ne!(synthetic_frame(8, 8, false, 42), synthetic_frame(8, 8, false, 43));
    }
}
