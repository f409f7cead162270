use ndarray::Array3;
use std::f64::consts::TAU;

/// Integer FFT frequencies for a grid of size `n`.
///
/// The 0th mode sits at index 0. For even `n` the index `n/2` carries the
/// Nyquist frequency, counted negative here; for odd `n` index `(n-1)/2` is
/// the largest positive frequency. For all `i > 0`, `freq(n - i) = -freq(i)`.
///
/// Example:
///     n = 4 => m = [0, 1, -2, -1]
///     n = 5 => m = [0, 1, 2, -2, -1]
pub fn frequency_indices(n: usize) -> Vec<i64> {
    (0..n)
        .map(|i| {
            if i < (n + 1) / 2 {
                i as i64
            } else {
                i as i64 - n as i64
            }
        })
        .collect()
}

/// Wavenumber meshes and derived spectral quantities for a periodic cube.
///
/// Built once per run and shared read-only by every operator. The inverse
/// norm `1/|k|^2` stores zero at the `k = 0` mode: the mean mode is not
/// determined by vorticity, so any quantity divided by `|k|^2` is forced to
/// zero there anyway and the stored zero doubles as the division guard.
pub struct SpectralGrid {
    pub n: usize,
    pub length: f64,
    /// Component meshes of the wavenumber vector, `2*pi*m_i / L`.
    pub kx: Array3<f64>,
    pub ky: Array3<f64>,
    pub kz: Array3<f64>,
    /// `|k|^2` per mode.
    pub k_squared: Array3<f64>,
    /// Guarded `1/|k|^2`, zero at the zero mode.
    pub inv_k_squared: Array3<f64>,
    /// 2/3-rule mask: 1 where every axis frequency satisfies `|m_i| < N/3`.
    pub dealias_mask: Array3<f64>,
}

impl SpectralGrid {
    pub fn new(n: usize, length: f64) -> Self {
        let freq = frequency_indices(n);
        let step = TAU / length;
        let shape = (n, n, n);

        let mut kx = Array3::zeros(shape);
        let mut ky = Array3::zeros(shape);
        let mut kz = Array3::zeros(shape);
        let mut k_squared = Array3::zeros(shape);
        let mut inv_k_squared = Array3::zeros(shape);
        let mut dealias_mask = Array3::zeros(shape);

        let cutoff = (n / 3) as i64;

        for i in 0..n {
            for j in 0..n {
                for l in 0..n {
                    let (mi, mj, ml) = (freq[i], freq[j], freq[l]);
                    let (kxv, kyv, kzv) =
                        (mi as f64 * step, mj as f64 * step, ml as f64 * step);
                    let ksq = kxv * kxv + kyv * kyv + kzv * kzv;

                    kx[[i, j, l]] = kxv;
                    ky[[i, j, l]] = kyv;
                    kz[[i, j, l]] = kzv;
                    k_squared[[i, j, l]] = ksq;
                    inv_k_squared[[i, j, l]] = if ksq > 0.0 { 1.0 / ksq } else { 0.0 };
                    dealias_mask[[i, j, l]] =
                        if mi.abs() < cutoff && mj.abs() < cutoff && ml.abs() < cutoff {
                            1.0
                        } else {
                            0.0
                        };
                }
            }
        }

        Self {
            n,
            length,
            kx,
            ky,
            kz,
            k_squared,
            inv_k_squared,
            dealias_mask,
        }
    }

    /// Grid spacing `L / N`.
    pub fn dx(&self) -> f64 {
        self.length / self.n as f64
    }

    /// Physical coordinate of grid index `i` along any axis.
    pub fn coordinate(&self, i: usize) -> f64 {
        i as f64 * self.dx()
    }

    /// Wavenumber component mesh along the given axis (0, 1 or 2).
    pub fn k_component(&self, axis: usize) -> &Array3<f64> {
        debug_assert!(axis < 3, "axis index out of range");
        match axis {
            0 => &self.kx,
            1 => &self.ky,
            _ => &self.kz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_ordering_even_and_odd() {
        assert_eq!(frequency_indices(4), vec![0, 1, -2, -1]);
        assert_eq!(frequency_indices(5), vec![0, 1, 2, -2, -1]);
        assert_eq!(frequency_indices(1), vec![0]);
    }

    #[test]
    fn wavenumbers_scale_with_domain_size() {
        let grid = SpectralGrid::new(4, TAU);
        // With L = 2*pi the wavenumbers are the integer frequencies.
        assert!((grid.kx[[1, 0, 0]] - 1.0).abs() < 1e-14);
        assert!((grid.kx[[2, 0, 0]] + 2.0).abs() < 1e-14);
        assert!((grid.kx[[3, 0, 0]] + 1.0).abs() < 1e-14);

        let grid = SpectralGrid::new(4, 1.0);
        assert!((grid.ky[[0, 1, 0]] - TAU).abs() < 1e-12);
    }

    #[test]
    fn zero_mode_inverse_norm_is_guarded() {
        let grid = SpectralGrid::new(8, TAU);
        assert_eq!(grid.inv_k_squared[[0, 0, 0]], 0.0);
        assert!((grid.inv_k_squared[[1, 0, 0]] - 1.0).abs() < 1e-14);
        assert!((grid.inv_k_squared[[1, 1, 0]] - 0.5).abs() < 1e-14);
    }

    #[test]
    fn dealias_mask_follows_two_thirds_rule() {
        let grid = SpectralGrid::new(12, TAU);
        // cutoff = 4: frequencies -3..=3 survive on each axis.
        assert_eq!(grid.dealias_mask[[0, 0, 0]], 1.0);
        assert_eq!(grid.dealias_mask[[3, 0, 0]], 1.0);
        assert_eq!(grid.dealias_mask[[4, 0, 0]], 0.0);
        assert_eq!(grid.dealias_mask[[12 - 3, 0, 0]], 1.0);
        assert_eq!(grid.dealias_mask[[12 - 4, 0, 0]], 0.0);
        assert_eq!(grid.dealias_mask[[3, 3, 4]], 0.0);

        let kept = grid.dealias_mask.iter().filter(|&&m| m == 1.0).count();
        assert_eq!(kept, 7 * 7 * 7);
    }

    #[test]
    fn dx_and_coordinates() {
        let grid = SpectralGrid::new(16, TAU);
        assert!((grid.dx() - TAU / 16.0).abs() < 1e-15);
        assert_eq!(grid.coordinate(0), 0.0);
        assert!((grid.coordinate(8) - TAU / 2.0).abs() < 1e-14);
    }
}
