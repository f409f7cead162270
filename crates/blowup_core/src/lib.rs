//! Pseudo-spectral integrator for the 3D incompressible Navier-Stokes
//! equations on a periodic cube, in vorticity form, together with the online
//! diagnostics used to detect and characterize candidate finite-time
//! singularities.
//!
//! Key components:
//! - **Grid & transforms**: periodic wavenumber meshes (`grid`) and a
//!   preplanned 3D FFT pair (`fft`).
//! - **Operators**: spectral derivative, curl, Laplacian and Biot-Savart
//!   velocity recovery (`operators`).
//! - **Solver**: nonlinear RHS assembly with 2/3-rule dealiasing, explicit
//!   Euler / RK4 stepping under a CFL-limited adaptive timestep (`solver`).
//! - **Diagnostics**: norm tracking, BKM-integral accumulation and heuristic
//!   blowup criteria (`diagnostics`), power-law rate fitting (`ratefit`) and
//!   self-similar rescaling (`rescale`).

pub mod config;
pub mod diagnostics;
pub mod fft;
pub mod field;
pub mod grid;
pub mod operators;
pub mod ratefit;
pub mod rescale;
pub mod solver;
pub mod traits;

pub use config::{SolverConfig, TimeStepper};
pub use diagnostics::{BlowupDetector, BlowupFlags, DiagnosticsSnapshot};
pub use field::{RealVectorField, ScalarField, VectorField};
pub use ratefit::{
    classify_alpha, fit_blowup_rate, fixed_tstar_fit, sliding_fits, FitStatus, RateFit,
    RateFitSettings, RateRegime, SlidingFit,
};
pub use rescale::{rescale_history, rescale_velocity, rescale_vorticity, RescaledNorms};
pub use solver::{RunReport, Solver};
pub use traits::{StepContext, StepObserver};
