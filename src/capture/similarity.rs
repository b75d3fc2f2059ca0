use image::{DynamicImage, GenericImageView};
use image_hasher::{HashAlg, HasherConfig, ImageHash};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Hash distance above which two captures are treated as different without
/// running SSIM.
pub const PHASH_CHANGE_THRESHOLD: u32 = 8;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.98;

const GAUSSIAN_RADIUS: usize = 3;
const GAUSSIAN_SIGMA: f64 = 1.5;
const DYNAMIC_RANGE: f64 = 255.0;

pub fn compute_phash(image: &DynamicImage) -> ImageHash {
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::DoubleGradient)
        .hash_size(8, 8)
        .to_hasher();

    hasher.hash_image(image)
}

pub fn compute_hamming_distance(lhs: &DynamicImage, rhs: &DynamicImage) -> u32 {
    compute_phash(lhs).dist(&compute_phash(rhs))
}

/// Decides whether two consecutive captures show the same content.
#[derive(Debug, Clone, Copy)]
pub struct ContentChangeDetector {
    threshold: f64,
    hash_gate: u32,
}

impl Default for ContentChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl ContentChangeDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            hash_gate: PHASH_CHANGE_THRESHOLD,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// True when `current` is a near-duplicate of `previous`.
    pub fn is_unchanged(&self, previous: &DynamicImage, current: &DynamicImage) -> bool {
        if previous.dimensions() != current.dimensions() {
            return false;
        }
        if compute_hamming_distance(previous, current) > self.hash_gate {
            return false;
        }

        match structural_similarity(previous, current) {
            Some(score) => {
                log_debug!("capture SSIM {score:.3} (threshold {:.3})", self.threshold);
                score >= self.threshold
            }
            None => false,
        }
    }
}

/// Mean SSIM of the greyscale versions of two equally sized images, using a
/// 7x7 Gaussian window. `None` when the sizes differ or the images are empty.
pub fn structural_similarity(lhs: &DynamicImage, rhs: &DynamicImage) -> Option<f64> {
    let (width, height) = lhs.dimensions();
    if (width, height) != rhs.dimensions() || width == 0 || height == 0 {
        return None;
    }
    let (width, height) = (width as usize, height as usize);

    let g1: Vec<f64> = lhs.to_luma8().into_raw().into_iter().map(f64::from).collect();
    let g2: Vec<f64> = rhs.to_luma8().into_raw().into_iter().map(f64::from).collect();

    let kernel = gaussian_kernel();
    let blur = |plane: &[f64]| gaussian_blur(plane, width, height, &kernel);
    let product = |a: &[f64], b: &[f64]| -> Vec<f64> { a.iter().zip(b).map(|(x, y)| x * y).collect() };

    let mu1 = blur(&g1);
    let mu2 = blur(&g2);
    let sq1 = blur(&product(&g1, &g1));
    let sq2 = blur(&product(&g2, &g2));
    let cross = blur(&product(&g1, &g2));

    let c1 = (0.01 * DYNAMIC_RANGE).powi(2);
    let c2 = (0.03 * DYNAMIC_RANGE).powi(2);

    let mut total = 0.0;
    for i in 0..g1.len() {
        let mu1_sq = mu1[i] * mu1[i];
        let mu2_sq = mu2[i] * mu2[i];
        let mu1_mu2 = mu1[i] * mu2[i];
        let sigma1_sq = sq1[i] - mu1_sq;
        let sigma2_sq = sq2[i] - mu2_sq;
        let sigma12 = cross[i] - mu1_mu2;

        total += ((2.0 * mu1_mu2 + c1) * (2.0 * sigma12 + c2))
            / ((mu1_sq + mu2_sq + c1) * (sigma1_sq + sigma2_sq + c2));
    }

    Some(total / g1.len() as f64)
}

fn gaussian_kernel() -> [f64; 2 * GAUSSIAN_RADIUS + 1] {
    let mut kernel = [0.0; 2 * GAUSSIAN_RADIUS + 1];
    let mut sum = 0.0;
    for (i, weight) in kernel.iter_mut().enumerate() {
        let offset = i as f64 - GAUSSIAN_RADIUS as f64;
        *weight = (-(offset * offset) / (2.0 * GAUSSIAN_SIGMA * GAUSSIAN_SIGMA)).exp();
        sum += *weight;
    }
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Mirror an out-of-range index back into `0..len` without repeating the edge sample.
fn reflect(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let last = len as isize - 1;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i > last {
            i = 2 * last - i;
        } else {
            return i as usize;
        }
    }
}

fn gaussian_blur(plane: &[f64], width: usize, height: usize, kernel: &[f64]) -> Vec<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut horizontal = vec![0.0; plane.len()];
    for y in 0..height {
        let row = &plane[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                acc += weight * row[reflect(x as isize + k as isize - radius, width)];
            }
            horizontal[y * width + x] = acc;
        }
    }

    let mut out = vec![0.0; plane.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = reflect(y as isize + k as isize - radius, height);
                acc += weight * horizontal[sy * width + x];
            }
            out[y * width + x] = acc;
        }
    }
    out
}
