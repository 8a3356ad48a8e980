//! Transformations between residual layouts.
//!
//! Record files store the residual motion as three separate scalar fields;
//! consumers want a single 3 x N matrix with one column per grid cell.

use nalgebra::Matrix3xX;
use rayon::prelude::*;

/// Interleave three per-axis residual buffers into a 3 x N matrix.
///
/// Column `i` of the result is `(x[i], y[i], z[i])`. All three buffers must
/// have the same length; the decoder guarantees this by checking the field
/// dimensions first.
pub fn interleave_residuals(x: &[f32], y: &[f32], z: &[f32]) -> Matrix3xX<f32> {
    debug_assert!(x.len() == y.len() && x.len() == z.len());

    Matrix3xX::from_fn(x.len(), |row, col| match row {
        0 => x[col],
        1 => y[col],
        _ => z[col],
    })
}

/// Split a 3 x N residual matrix back into per-axis buffers.
pub fn split_residuals(residuals: &Matrix3xX<f32>) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
    let n = residuals.ncols();
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut z = Vec::with_capacity(n);

    for column in residuals.column_iter() {
        x.push(column[0]);
        y.push(column[1]);
        z.push(column[2]);
    }

    (x, y, z)
}

/// Euclidean length of every residual vector. Parallelized using Rayon.
pub fn residual_magnitudes(residuals: &Matrix3xX<f32>) -> Vec<f32> {
    (0..residuals.ncols())
        .into_par_iter()
        .map(|i| residuals.column(i).norm())
        .collect()
}

/// Map magnitudes to a blue-to-red ramp, scaled by the largest magnitude.
///
/// Zero residuals map to pure blue. If every magnitude is zero (or the input
/// holds no finite values) all cells are blue.
pub fn magnitude_to_colors(magnitudes: &[f32]) -> Vec<[u8; 3]> {
    let max = magnitudes
        .iter()
        .copied()
        .filter(|m| m.is_finite())
        .fold(0.0f32, f32::max);

    magnitudes
        .par_iter()
        .map(|&m| {
            let t = if max > 0.0 && m.is_finite() {
                (m / max).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let red = (t * 255.0).round() as u8;
            [red, 0, 255 - red]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleave_and_split() {
        let x = [1.0, 2.0];
        let y = [3.0, 4.0];
        let z = [5.0, 6.0];

        let m = interleave_residuals(&x, &y, &z);
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 2);
        assert_eq!(m[(0, 1)], 2.0);
        assert_eq!(m[(1, 0)], 3.0);
        assert_eq!(m[(2, 1)], 6.0);

        let (sx, sy, sz) = split_residuals(&m);
        assert_eq!(sx, x.to_vec());
        assert_eq!(sy, y.to_vec());
        assert_eq!(sz, z.to_vec());
    }

    #[test]
    fn test_interleave_empty() {
        let m = interleave_residuals(&[], &[], &[]);
        assert_eq!(m.ncols(), 0);
    }

    #[test]
    fn test_residual_magnitudes() {
        let m = interleave_residuals(&[3.0, 0.0], &[4.0, 0.0], &[0.0, 2.0]);
        let mags = residual_magnitudes(&m);
        assert_eq!(mags, vec![5.0, 2.0]);
    }

    #[test]
    fn test_magnitude_to_colors() {
        let colors = magnitude_to_colors(&[0.0, 5.0, 10.0]);
        assert_eq!(colors[0], [0, 0, 255]);
        assert_eq!(colors[2], [255, 0, 0]);
        assert_eq!(colors[1][1], 0);
    }

    #[test]
    fn test_magnitude_to_colors_all_zero() {
        let colors = magnitude_to_colors(&[0.0, 0.0]);
        assert!(colors.iter().all(|c| *c == [0, 0, 255]));
    }
}
