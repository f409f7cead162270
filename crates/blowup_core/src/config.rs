use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Explicit step rule used to advance the vorticity field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeStepper {
    Euler,
    Rk4,
}

/// Immutable configuration of a solver run.
///
/// `viscous_safety` scales the heuristic viscous stability bound
/// `dt <= viscous_safety * dx^2 / viscosity`. It is a tunable safety factor,
/// not a proven stability threshold; the actual stability region differs
/// between Euler and RK4.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Grid resolution per axis.
    pub resolution: usize,
    /// Physical side length of the periodic cube.
    pub domain_size: f64,
    /// Kinematic viscosity, strictly positive.
    pub viscosity: f64,
    /// Advective CFL number.
    pub cfl: f64,
    /// Safety factor on the viscous timestep bound.
    pub viscous_safety: f64,
    /// Apply the 2/3-rule mask to the nonlinear term. Disabling leaves
    /// aliasing error uncontrolled.
    pub dealias: bool,
    pub stepper: TimeStepper,
    /// The run loop stops (reported, not raised) once the velocity sup-norm
    /// exceeds this threshold or becomes non-finite.
    pub blowup_threshold: f64,
    /// Hard cap on the number of steps in a single `run`.
    pub max_steps: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            resolution: 32,
            domain_size: TAU,
            viscosity: 0.01,
            cfl: 0.5,
            viscous_safety: 0.5,
            dealias: true,
            stepper: TimeStepper::Rk4,
            blowup_threshold: 1e10,
            max_steps: 100_000,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            bail!("Grid resolution must be positive.");
        }
        if self.domain_size <= 0.0 {
            bail!("Domain size must be positive, got {}.", self.domain_size);
        }
        if self.viscosity <= 0.0 {
            bail!("Viscosity must be positive, got {}.", self.viscosity);
        }
        if self.cfl <= 0.0 {
            bail!("CFL number must be positive, got {}.", self.cfl);
        }
        if self.viscous_safety <= 0.0 {
            bail!(
                "Viscous safety factor must be positive, got {}.",
                self.viscous_safety
            );
        }
        if self.blowup_threshold <= 0.0 {
            bail!("Blowup threshold must be positive.");
        }
        if self.max_steps == 0 {
            bail!("max_steps must be at least 1.");
        }
        Ok(())
    }

    /// Grid spacing `L / N`.
    pub fn dx(&self) -> f64 {
        self.domain_size / self.resolution as f64
    }
}
