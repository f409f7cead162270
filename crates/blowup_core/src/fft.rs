use ndarray::{Array3, Axis};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

use crate::field::ScalarField;

/// Preplanned complex 3D FFT pair for an `n^3` cube.
///
/// The 3D transform sweeps a preplanned 1D FFT along each axis in turn,
/// copying every lane through a lane-length scratch buffer allocated once
/// per axis sweep. Plans are created once at solver construction; the
/// transform is the dominant `O(N^3 log N)` cost of every other operation.
pub struct Fft3 {
    n: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl Fft3 {
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);
        Self {
            n,
            forward,
            inverse,
        }
    }

    fn transform_axis(plan: &Arc<dyn Fft<f64>>, field: &mut ScalarField, axis: Axis, n: usize) {
        let mut lane_buf = vec![Complex64::new(0.0, 0.0); n];
        for mut lane in field.lanes_mut(axis) {
            for (b, v) in lane_buf.iter_mut().zip(lane.iter()) {
                *b = *v;
            }
            plan.process(&mut lane_buf);
            for (v, b) in lane.iter_mut().zip(lane_buf.iter()) {
                *v = *b;
            }
        }
    }

    /// Unnormalized forward transform, in place.
    pub fn forward_in_place(&self, field: &mut ScalarField) {
        for axis in 0..3 {
            Self::transform_axis(&self.forward, field, Axis(axis), self.n);
        }
    }

    /// Inverse transform, in place, normalized by `1/N^3` so that it is the
    /// exact algebraic inverse of [`Fft3::forward_in_place`].
    pub fn inverse_in_place(&self, field: &mut ScalarField) {
        for axis in 0..3 {
            Self::transform_axis(&self.inverse, field, Axis(axis), self.n);
        }
        let scale = 1.0 / (self.n * self.n * self.n) as f64;
        field.mapv_inplace(|v| v * scale);
    }

    /// Forward transform of a real physical field into spectral coefficients.
    pub fn forward_real(&self, field: &Array3<f64>) -> ScalarField {
        let mut out = field.mapv(|v| Complex64::new(v, 0.0));
        self.forward_in_place(&mut out);
        out
    }

    /// Inverse transform of spectral coefficients, keeping the real part.
    ///
    /// For coefficients with Hermitian symmetry the imaginary part is pure
    /// roundoff.
    pub fn inverse_real(&self, field: &ScalarField) -> Array3<f64> {
        let mut tmp = field.clone();
        self.inverse_in_place(&mut tmp);
        tmp.mapv(|v| v.re)
    }
}
