//! Differential operators expressed as pointwise multiplications in
//! frequency space.

use ndarray::Zip;
use num_complex::Complex64;

use crate::field::{ScalarField, VectorField};
use crate::grid::SpectralGrid;

/// Spectral derivative along the given axis: multiply by `i * k_axis`.
pub fn derivative(grid: &SpectralGrid, f: &ScalarField, axis: usize) -> ScalarField {
    let k = grid.k_component(axis);
    Zip::from(f)
        .and(k)
        .map_collect(|&v, &k| v * Complex64::new(0.0, k))
}

/// Curl of a vector field, component-wise in frequency space.
pub fn curl(grid: &SpectralGrid, f: &VectorField) -> VectorField {
    let mut out = VectorField::zeros(grid.n);
    Zip::from(&mut out.x)
        .and(&grid.ky)
        .and(&grid.kz)
        .and(&f.z)
        .and(&f.y)
        .for_each(|o, &ky, &kz, &fz, &fy| {
            *o = (fz * ky - fy * kz) * Complex64::new(0.0, 1.0);
        });
    Zip::from(&mut out.y)
        .and(&grid.kz)
        .and(&grid.kx)
        .and(&f.x)
        .and(&f.z)
        .for_each(|o, &kz, &kx, &fx, &fz| {
            *o = (fx * kz - fz * kx) * Complex64::new(0.0, 1.0);
        });
    Zip::from(&mut out.z)
        .and(&grid.kx)
        .and(&grid.ky)
        .and(&f.y)
        .and(&f.x)
        .for_each(|o, &kx, &ky, &fy, &fx| {
            *o = (fy * kx - fx * ky) * Complex64::new(0.0, 1.0);
        });
    out
}

/// Laplacian: multiply by `-|k|^2`.
pub fn laplacian(grid: &SpectralGrid, f: &ScalarField) -> ScalarField {
    Zip::from(f)
        .and(&grid.k_squared)
        .map_collect(|&v, &ksq| v * -ksq)
}

/// Spectral divergence `i * k . f`, used to verify incompressibility.
pub fn divergence(grid: &SpectralGrid, f: &VectorField) -> ScalarField {
    let mut out = ScalarField::zeros((grid.n, grid.n, grid.n));
    Zip::from(&mut out)
        .and(&grid.kx)
        .and(&f.x)
        .for_each(|o, &k, &v| *o += v * Complex64::new(0.0, k));
    Zip::from(&mut out)
        .and(&grid.ky)
        .and(&f.y)
        .for_each(|o, &k, &v| *o += v * Complex64::new(0.0, k));
    Zip::from(&mut out)
        .and(&grid.kz)
        .and(&f.z)
        .for_each(|o, &k, &v| *o += v * Complex64::new(0.0, k));
    out
}

/// Biot-Savart inversion: recover velocity from vorticity,
/// `u_hat = i (k x w_hat) / |k|^2`.
///
/// The stored inverse norm is zero at the zero mode (the mean velocity is
/// not determined by vorticity and is fixed at zero); the explicit zeroing
/// below restates that independently of the guard.
pub fn biot_savart(grid: &SpectralGrid, w: &VectorField) -> VectorField {
    let mut u = VectorField::zeros(grid.n);
    Zip::from(&mut u.x)
        .and(&grid.ky)
        .and(&grid.kz)
        .and(&w.z)
        .and(&w.y)
        .and(&grid.inv_k_squared)
        .for_each(|o, &ky, &kz, &wz, &wy, &inv| {
            *o = (wz * ky - wy * kz) * Complex64::new(0.0, inv);
        });
    Zip::from(&mut u.y)
        .and(&grid.kz)
        .and(&grid.kx)
        .and(&w.x)
        .and(&w.z)
        .and(&grid.inv_k_squared)
        .for_each(|o, &kz, &kx, &wx, &wz, &inv| {
            *o = (wx * kz - wz * kx) * Complex64::new(0.0, inv);
        });
    Zip::from(&mut u.z)
        .and(&grid.kx)
        .and(&grid.ky)
        .and(&w.y)
        .and(&w.x)
        .and(&grid.inv_k_squared)
        .for_each(|o, &kx, &ky, &wy, &wx, &inv| {
            *o = (wy * kx - wx * ky) * Complex64::new(0.0, inv);
        });
    let zero = Complex64::new(0.0, 0.0);
    u.x[[0, 0, 0]] = zero;
    u.y[[0, 0, 0]] = zero;
    u.z[[0, 0, 0]] = zero;
    u
}
