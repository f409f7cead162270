//! Vorticity-form pseudo-spectral solver: nonlinear RHS assembly, explicit
//! Euler / RK4 stepping and the adaptive run loop.

use anyhow::Result;
use log::{debug, info, warn};
use ndarray::{Array3, Zip};

use crate::config::{SolverConfig, TimeStepper};
use crate::diagnostics::{self, BlowupDetector, BlowupFlags, DiagnosticsSnapshot};
use crate::fft::Fft3;
use crate::field::{RealVectorField, ScalarField, VectorField};
use crate::grid::SpectralGrid;
use crate::operators;
use crate::traits::{StepContext, StepObserver};

/// Floor on the velocity sup norm in the advective CFL bound, so a fluid at
/// rest does not produce an infinite timestep.
const VELOCITY_FLOOR: f64 = 1e-10;

/// Outcome of a `run`: the diagnostics history plus how the loop ended.
/// Early termination is reported here, never raised.
pub struct RunReport {
    pub history: Vec<DiagnosticsSnapshot>,
    pub bkm_integral: f64,
    /// Heuristic blowup criteria evaluated on the final history.
    pub flags: BlowupFlags,
    /// The numerical-blowup guard tripped (velocity sup norm exceeded the
    /// configured threshold or became non-finite).
    pub blown_up: bool,
    /// The `max_steps` cap was hit before the time horizon.
    pub step_limit_reached: bool,
    pub final_time: f64,
    pub steps: usize,
    pub final_vorticity: VectorField,
}

pub struct Solver {
    config: SolverConfig,
    grid: SpectralGrid,
    fft: Fft3,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        let grid = SpectralGrid::new(config.resolution, config.domain_size);
        let fft = Fft3::new(config.resolution);
        Ok(Self { config, grid, fft })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn grid(&self) -> &SpectralGrid {
        &self.grid
    }

    pub fn fft(&self) -> &Fft3 {
        &self.fft
    }

    /// Recover the velocity field from vorticity via Biot-Savart. Pure; the
    /// velocity is never stored as solver state.
    pub fn velocity(&self, vorticity: &VectorField) -> VectorField {
        operators::biot_savart(&self.grid, vorticity)
    }

    /// Inverse-transform a spectral vector field to the physical grid.
    pub fn physical(&self, f: &VectorField) -> RealVectorField {
        RealVectorField {
            x: self.fft.inverse_real(&f.x),
            y: self.fft.inverse_real(&f.y),
            z: self.fft.inverse_real(&f.z),
        }
    }

    /// Assemble `d(vorticity)/dt` in spectral space.
    ///
    /// Advection `-(u.grad)w` and stretching `(w.grad)u` are formed
    /// pointwise in physical space, transformed back, dealiased, and summed
    /// with the exact spectral viscous term `-nu |k|^2 w_hat`.
    pub fn rhs(&self, w: &VectorField) -> VectorField {
        let n = self.grid.n;
        let u = operators::biot_savart(&self.grid, w);
        let up = self.physical(&u);
        let wp = self.physical(w);

        let u_comps = u.components();
        let w_comps = w.components();
        // grad[a][j] = d comp_a / dx_j on the physical grid.
        let grad_u: [[Array3<f64>; 3]; 3] = std::array::from_fn(|a| {
            std::array::from_fn(|j| {
                self.fft
                    .inverse_real(&operators::derivative(&self.grid, u_comps[a], j))
            })
        });
        let grad_w: [[Array3<f64>; 3]; 3] = std::array::from_fn(|a| {
            std::array::from_fn(|j| {
                self.fft
                    .inverse_real(&operators::derivative(&self.grid, w_comps[a], j))
            })
        });

        let up_comps = up.components();
        let wp_comps = wp.components();
        let nu = self.config.viscosity;

        let [x, y, z]: [ScalarField; 3] = std::array::from_fn(|a| {
            let mut nonlinear = Array3::<f64>::zeros((n, n, n));
            for j in 0..3 {
                Zip::from(&mut nonlinear)
                    .and(up_comps[j])
                    .and(&grad_w[a][j])
                    .for_each(|t, &uj, &g| *t -= uj * g);
                Zip::from(&mut nonlinear)
                    .and(wp_comps[j])
                    .and(&grad_u[a][j])
                    .for_each(|t, &wj, &g| *t += wj * g);
            }
            let mut rhs_a = self.fft.forward_real(&nonlinear);
            if self.config.dealias {
                Zip::from(&mut rhs_a)
                    .and(&self.grid.dealias_mask)
                    .for_each(|v, &m| *v = *v * m);
            }
            Zip::from(&mut rhs_a)
                .and(&self.grid.k_squared)
                .and(w_comps[a])
                .for_each(|v, &ksq, &wv| *v += wv * (-nu * ksq));
            rhs_a
        });

        VectorField { x, y, z }
    }

    /// Timestep from the tighter of the advective-CFL and viscous-stability
    /// bounds. The viscous bound is a heuristic scaled by the configured
    /// safety factor.
    pub fn adaptive_dt(&self, u_inf: f64) -> f64 {
        let dx = self.grid.dx();
        let advective = self.config.cfl * dx / u_inf.max(VELOCITY_FLOOR);
        let viscous = self.config.viscous_safety * dx * dx / self.config.viscosity;
        advective.min(viscous)
    }

    fn step_with_dt(&self, w: &VectorField, dt: f64) -> VectorField {
        match self.config.stepper {
            TimeStepper::Euler => {
                let k = self.rhs(w);
                VectorField::linear_comb(w, dt, &k)
            }
            TimeStepper::Rk4 => {
                let k1 = self.rhs(w);
                let k2 = self.rhs(&VectorField::linear_comb(w, 0.5 * dt, &k1));
                let k3 = self.rhs(&VectorField::linear_comb(w, 0.5 * dt, &k2));
                let k4 = self.rhs(&VectorField::linear_comb(w, dt, &k3));
                let mut out = w.clone();
                out.scaled_add(dt / 6.0, &k1);
                out.scaled_add(dt / 3.0, &k2);
                out.scaled_add(dt / 3.0, &k3);
                out.scaled_add(dt / 6.0, &k4);
                out
            }
        }
    }

    /// Advance vorticity by one step. If `dt` is omitted it is chosen
    /// adaptively from the current velocity. Returns the new vorticity and
    /// the step size used.
    pub fn step(&self, w: &VectorField, dt: Option<f64>) -> (VectorField, f64) {
        let dt = dt.unwrap_or_else(|| {
            let u = self.velocity(w);
            self.adaptive_dt(self.physical(&u).max_norm())
        });
        (self.step_with_dt(w, dt), dt)
    }

    /// Step from `t = 0` until `t_final`, invoking the observer once per
    /// step with a read view of the pre-step state. Terminates early when
    /// the numerical-blowup guard trips or the step cap is hit; both are
    /// reported on the returned [`RunReport`].
    pub fn run(
        &self,
        vorticity: VectorField,
        t_final: f64,
        mut observer: Option<&mut dyn StepObserver>,
    ) -> RunReport {
        let mut w = vorticity;
        let mut t = 0.0;
        let mut steps = 0usize;
        let mut detector = BlowupDetector::new();
        let mut blown_up = false;
        let mut step_limit_reached = false;

        while t_final - t > 1e-12 {
            if steps >= self.config.max_steps {
                warn!("step cap {} reached at t = {t:.6e}", self.config.max_steps);
                step_limit_reached = true;
                break;
            }

            let u = self.velocity(&w);
            let up = self.physical(&u);
            let u_inf = up.max_norm();
            if !u_inf.is_finite() || u_inf > self.config.blowup_threshold {
                warn!("numerical blowup at t = {t:.6e}: |u|_inf = {u_inf:.6e}");
                blown_up = true;
                break;
            }

            let wp = self.physical(&w);
            let snapshot = diagnostics::compute_snapshot(
                &self.grid,
                &self.fft,
                t,
                self.config.viscosity,
                &u,
                &w,
                &up,
                &wp,
            );
            let dt = self.adaptive_dt(u_inf).min(t_final - t);

            detector.record(snapshot.clone());
            if let Some(obs) = observer.as_mut() {
                obs.on_step(&StepContext {
                    time: t,
                    dt,
                    vorticity: &w,
                    velocity: &u,
                    diagnostics: &snapshot,
                    flags: detector.criteria(),
                });
            }
            debug!("step {steps}: t = {t:.6e}, dt = {dt:.6e}, |u|_inf = {u_inf:.6e}");

            w = self.step_with_dt(&w, dt);
            t += dt;
            steps += 1;
        }

        info!("run finished at t = {t:.6e} after {steps} steps (blown_up = {blown_up})");
        let bkm_integral = detector.bkm_integral();
        let flags = detector.criteria();
        RunReport {
            history: detector.into_history(),
            bkm_integral,
            flags,
            blown_up,
            step_limit_reached,
            final_time: t,
            steps,
            final_vorticity: w,
        }
    }
}
