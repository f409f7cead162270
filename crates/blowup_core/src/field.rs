use ndarray::{Array3, Zip};
use num_complex::Complex64;

/// A scalar field in spectral representation.
pub type ScalarField = Array3<Complex64>;

/// A three-component vector field in spectral representation.
///
/// Used for both vorticity (the evolved state) and velocity (derived,
/// recomputed from vorticity on demand).
#[derive(Debug, Clone)]
pub struct VectorField {
    pub x: ScalarField,
    pub y: ScalarField,
    pub z: ScalarField,
}

impl VectorField {
    pub fn zeros(n: usize) -> Self {
        Self {
            x: Array3::zeros((n, n, n)),
            y: Array3::zeros((n, n, n)),
            z: Array3::zeros((n, n, n)),
        }
    }

    pub fn components(&self) -> [&ScalarField; 3] {
        [&self.x, &self.y, &self.z]
    }

    /// `self += c * rhs`, component-wise.
    pub fn scaled_add(&mut self, c: f64, rhs: &VectorField) {
        for (dst, src) in [
            (&mut self.x, &rhs.x),
            (&mut self.y, &rhs.y),
            (&mut self.z, &rhs.z),
        ] {
            Zip::from(dst).and(src).for_each(|d, s| *d += *s * c);
        }
    }

    /// `base + c * dir` as a new field; the stage combination used by RK4.
    pub fn linear_comb(base: &VectorField, c: f64, dir: &VectorField) -> VectorField {
        let mut out = base.clone();
        out.scaled_add(c, dir);
        out
    }

    /// True when every coefficient of every component is finite.
    pub fn is_finite(&self) -> bool {
        self.components()
            .iter()
            .all(|f| f.iter().all(|v| v.re.is_finite() && v.im.is_finite()))
    }
}

/// A three-component vector field sampled on the physical grid.
#[derive(Debug, Clone)]
pub struct RealVectorField {
    pub x: Array3<f64>,
    pub y: Array3<f64>,
    pub z: Array3<f64>,
}

impl RealVectorField {
    pub fn zeros(n: usize) -> Self {
        Self {
            x: Array3::zeros((n, n, n)),
            y: Array3::zeros((n, n, n)),
            z: Array3::zeros((n, n, n)),
        }
    }

    pub fn components(&self) -> [&Array3<f64>; 3] {
        [&self.x, &self.y, &self.z]
    }

    /// Pointwise magnitude squared at one grid index.
    fn magnitude_squared(&self, idx: (usize, usize, usize)) -> f64 {
        let (x, y, z) = (self.x[idx], self.y[idx], self.z[idx]);
        x * x + y * y + z * z
    }

    /// Sup norm of the pointwise vector magnitude.
    pub fn max_norm(&self) -> f64 {
        self.max_norm_with_argmax().0
    }

    /// Sup norm together with the grid index where it is attained.
    pub fn max_norm_with_argmax(&self) -> (f64, [usize; 3]) {
        let dim = self.x.dim();
        let mut best = 0.0_f64;
        let mut arg = [0usize; 3];
        for i in 0..dim.0 {
            for j in 0..dim.1 {
                for l in 0..dim.2 {
                    let m = self.magnitude_squared((i, j, l));
                    // NaN propagates so the integrator guard can see it.
                    if m.is_nan() {
                        return (f64::NAN, [i, j, l]);
                    }
                    if m > best {
                        best = m;
                        arg = [i, j, l];
                    }
                }
            }
        }
        (best.sqrt(), arg)
    }

    /// Mean over grid points of `|v|^2`.
    pub fn mean_square(&self) -> f64 {
        let dim = self.x.dim();
        let count = (dim.0 * dim.1 * dim.2) as f64;
        let mut sum = 0.0;
        Zip::from(&self.x)
            .and(&self.y)
            .and(&self.z)
            .for_each(|&x, &y, &z| sum += x * x + y * y + z * z);
        sum / count
    }

    /// Mean over grid points of `|v|^3`.
    pub fn mean_cubed(&self) -> f64 {
        let dim = self.x.dim();
        let count = (dim.0 * dim.1 * dim.2) as f64;
        let mut sum = 0.0;
        Zip::from(&self.x)
            .and(&self.y)
            .and(&self.z)
            .for_each(|&x, &y, &z| sum += (x * x + y * y + z * z).powf(1.5));
        sum / count
    }
}
