//! Vector arithmetic for cosine similarity.
//!
//! Stored vectors are normalized once at insertion, so cosine similarity at
//! query time is a plain dot product, computed eight lanes at a time.

use wide::f32x8;

use crate::error::{FolioError, Result};

/// Dot product of two equally long slices.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    if a.len() < 8 {
        return a.iter().zip(b).map(|(x, y)| x * y).sum();
    }

    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let remainder: f32 = chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| x * y)
        .sum();

    let mut acc = f32x8::splat(0.0);
    let mut lane_a = [0.0f32; 8];
    let mut lane_b = [0.0f32; 8];
    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        lane_a.copy_from_slice(chunk_a);
        lane_b.copy_from_slice(chunk_b);
        acc = acc + f32x8::from(lane_a) * f32x8::from(lane_b);
    }

    acc.to_array().iter().sum::<f32>() + remainder
}

/// Euclidean norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Return the unit vector of `v` and its original norm.
///
/// Fails for zero or non-finite vectors, which have no direction.
pub fn normalize(v: &[f32]) -> Result<(Vec<f32>, f32)> {
    if v.iter().any(|x| !x.is_finite()) {
        return Err(FolioError::invalid_argument("vector contains non-finite values"));
    }
    let norm = l2_norm(v);
    if norm <= f32::EPSILON || !norm.is_finite() {
        return Err(FolioError::invalid_argument("cannot normalize a zero vector"));
    }
    Ok((v.iter().map(|x| x / norm).collect(), norm))
}

/// Cosine similarity of two arbitrary vectors.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom <= f32::EPSILON {
        0.0
    } else {
        dot(a, b) / denom
    }
}
