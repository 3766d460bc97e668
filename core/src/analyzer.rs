//! Image analysis capability used by the integrity gate.
//!
//! Which implementation is available is a build decision: the `sharpness`
//! feature pulls in the `image` crate for decoding. Without it the standard
//! analyzer still hashes, and reports sharpness as unsupported.

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("image analysis not supported in this build")]
    Unsupported,
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("image too small to analyse ({width}x{height})")]
    TooSmall { width: u32, height: u32 },
}

pub trait ImageAnalyzer: Send + Sync {
    /// Stable hex digest of the raw payload.
    fn content_hash(&self, bytes: &[u8]) -> Result<String, AnalysisError>;

    /// Focus metric: variance of the Laplacian over the grayscale image.
    /// Higher is sharper.
    fn sharpness(&self, bytes: &[u8]) -> Result<f64, AnalysisError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StandardAnalyzer;

impl ImageAnalyzer for StandardAnalyzer {
    fn content_hash(&self, bytes: &[u8]) -> Result<String, AnalysisError> {
        Ok(hex::encode(Sha256::digest(bytes)))
    }

    #[cfg(feature = "sharpness")]
    fn sharpness(&self, bytes: &[u8]) -> Result<f64, AnalysisError> {
        let gray = image::load_from_memory(bytes)
            .map_err(|e| AnalysisError::Decode(e.to_string()))?
            .to_luma8();
        let (width, height) = gray.dimensions();
        laplacian_variance(gray.as_raw(), width as usize, height as usize)
            .ok_or(AnalysisError::TooSmall { width, height })
    }

    #[cfg(not(feature = "sharpness"))]
    fn sharpness(&self, _bytes: &[u8]) -> Result<f64, AnalysisError> {
        Err(AnalysisError::Unsupported)
    }
}

/// Population variance of the 4-neighbour Laplacian
/// `[0 1 0; 1 -4 1; 0 1 0]` over a row-major 8-bit grayscale buffer, with
/// reflect-101 borders (`dcb|abcd|cba`). Returns `None` when either side is
/// shorter than two pixels or the buffer does not match the dimensions.
pub fn laplacian_variance(pixels: &[u8], width: usize, height: usize) -> Option<f64> {
    if width < 2 || height < 2 || pixels.len() != width * height {
        return None;
    }

    let reflect = |i: isize, n: usize| -> usize {
        let n = n as isize;
        let r = if i < 0 {
            -i
        } else if i >= n {
            2 * n - 2 - i
        } else {
            i
        };
        r as usize
    };
    let at = |x: isize, y: isize| -> f64 {
        pixels[reflect(y, height) * width + reflect(x, width)] as f64
    };

    let count = (width * height) as f64;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..height as isize {
        for x in 0..width as isize {
            let response =
                at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y);
            sum += response;
            sum_sq += response * response;
        }
    }
    let mean = sum / count;
    Some((sum_sq / count - mean * mean).max(0.0))
}
