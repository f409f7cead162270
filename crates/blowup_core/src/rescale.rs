//! Self-similar rescaling of fields and recorded diagnostics.
//!
//! For an assumed blowup time `T*` and rate `alpha`, velocity is scaled by
//! `(T* - t)^alpha` and vorticity by `(T* - t)^(2 alpha - 1/2)` (one extra
//! spatial derivative of amplitude scaling), against the similarity time
//! `tau = -log(T* - t)`. Under the correct rate the rescaled sup norms
//! plateau as `tau` grows; that is a diagnostic to inspect, not an enforced
//! invariant.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::diagnostics::DiagnosticsSnapshot;
use crate::field::VectorField;

fn time_to_blowup(t: f64, t_star: f64) -> Result<f64> {
    if !(t < t_star) {
        bail!("Rescale time t = {t} must lie strictly before the blowup time T* = {t_star}.");
    }
    Ok(t_star - t)
}

/// Similarity time `tau = -log(T* - t)`. Fails when `t >= T*`.
pub fn similarity_time(t: f64, t_star: f64) -> Result<f64> {
    Ok(-time_to_blowup(t, t_star)?.ln())
}

/// Amplitude factor applied to velocity at time `t`.
pub fn velocity_factor(t: f64, t_star: f64, alpha: f64) -> Result<f64> {
    Ok(time_to_blowup(t, t_star)?.powf(alpha))
}

/// Amplitude factor applied to vorticity at time `t`.
pub fn vorticity_factor(t: f64, t_star: f64, alpha: f64) -> Result<f64> {
    Ok(time_to_blowup(t, t_star)?.powf(2.0 * alpha - 0.5))
}

fn scaled(field: &VectorField, factor: f64) -> VectorField {
    let mut out = field.clone();
    for comp in [&mut out.x, &mut out.y, &mut out.z] {
        comp.mapv_inplace(|v| v * factor);
    }
    out
}

/// Velocity field in self-similar variables.
pub fn rescale_velocity(u: &VectorField, t: f64, t_star: f64, alpha: f64) -> Result<VectorField> {
    Ok(scaled(u, velocity_factor(t, t_star, alpha)?))
}

/// Vorticity field in self-similar variables.
pub fn rescale_vorticity(w: &VectorField, t: f64, t_star: f64, alpha: f64) -> Result<VectorField> {
    Ok(scaled(w, vorticity_factor(t, t_star, alpha)?))
}

/// Rescaled sup norms of one recorded step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RescaledNorms {
    pub tau: f64,
    pub u_inf: f64,
    pub omega_inf: f64,
}

/// Map a recorded diagnostics history into self-similar variables.
///
/// Snapshots at or past `T*` are a precondition violation of the same kind
/// as for field rescaling and fail the whole call.
pub fn rescale_history(
    history: &[DiagnosticsSnapshot],
    t_star: f64,
    alpha: f64,
) -> Result<Vec<RescaledNorms>> {
    history
        .iter()
        .map(|s| {
            Ok(RescaledNorms {
                tau: similarity_time(s.time, t_star)?,
                u_inf: s.u_inf * velocity_factor(s.time, t_star, alpha)?,
                omega_inf: s.omega_inf * vorticity_factor(s.time, t_star, alpha)?,
            })
        })
        .collect()
}
