//! Per-step diagnostic scalars and the heuristic blowup criteria built on
//! them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::fft::Fft3;
use crate::field::{RealVectorField, VectorField};
use crate::grid::SpectralGrid;
use crate::operators;

/// BKM time-integral threshold above which blowup is flagged.
pub const BKM_THRESHOLD: f64 = 100.0;
/// Velocity L3-norm threshold.
pub const L3_THRESHOLD: f64 = 1000.0;
/// Single-step growth factor in the velocity sup norm.
pub const GROWTH_FACTOR_THRESHOLD: f64 = 10.0;
/// Vorticity sup-norm threshold.
pub const VORTICITY_THRESHOLD: f64 = 1e6;

/// Diagnostic scalars for one retained step. Appended to a history and never
/// mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsSnapshot {
    pub time: f64,
    /// Sup norm of the velocity magnitude.
    pub u_inf: f64,
    /// Sup norm of the vorticity magnitude.
    pub omega_inf: f64,
    /// `mean(|u|^3)^(1/3)`.
    pub u_l3: f64,
    /// `0.5 * mean(|u|^2) * L^3`.
    pub energy: f64,
    /// `0.5 * mean(|w|^2) * L^3`.
    pub enstrophy: f64,
    /// `nu * mean(|grad u|^2) * L^3`, summed over all nine components.
    pub dissipation: f64,
    /// `0.5 * mean(|grad w|^2) * L^3`.
    pub palinstrophy: f64,
    /// Grid index where the vorticity magnitude attains its maximum.
    pub omega_argmax: [usize; 3],
}

/// Boolean blowup-criteria flags. Heuristic triggers for observers, not
/// physical theorems.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlowupFlags {
    pub bkm_exceeded: bool,
    pub l3_exceeded: bool,
    pub growth_exceeded: bool,
    pub vorticity_exceeded: bool,
}

impl BlowupFlags {
    pub fn any(&self) -> bool {
        self.bkm_exceeded || self.l3_exceeded || self.growth_exceeded || self.vorticity_exceeded
    }
}

/// Mean of `|grad f|^2` over the grid, summed over all nine gradient
/// components, computed via spectral derivatives.
fn mean_gradient_square(grid: &SpectralGrid, fft: &Fft3, f: &VectorField) -> f64 {
    let mut total = 0.0;
    for comp in f.components() {
        for axis in 0..3 {
            let d = fft.inverse_real(&operators::derivative(grid, comp, axis));
            total += d.iter().map(|v| v * v).sum::<f64>();
        }
    }
    let count = (grid.n * grid.n * grid.n) as f64;
    total / count
}

/// Compute the full diagnostics snapshot for one step.
///
/// `u`/`w` are the spectral velocity and vorticity, `up`/`wp` their physical
/// counterparts (already transformed by the caller, which needs them anyway).
pub fn compute_snapshot(
    grid: &SpectralGrid,
    fft: &Fft3,
    time: f64,
    viscosity: f64,
    u: &VectorField,
    w: &VectorField,
    up: &RealVectorField,
    wp: &RealVectorField,
) -> DiagnosticsSnapshot {
    let volume = grid.length.powi(3);
    let (omega_inf, omega_argmax) = wp.max_norm_with_argmax();

    DiagnosticsSnapshot {
        time,
        u_inf: up.max_norm(),
        omega_inf,
        u_l3: up.mean_cubed().cbrt(),
        energy: 0.5 * up.mean_square() * volume,
        enstrophy: 0.5 * wp.mean_square() * volume,
        dissipation: viscosity * mean_gradient_square(grid, fft, u) * volume,
        palinstrophy: 0.5 * mean_gradient_square(grid, fft, w) * volume,
        omega_argmax,
    }
}

/// Accumulates the diagnostics history of a run and the BKM integral
/// (trapezoidal area under `omega_inf` versus time).
#[derive(Debug, Default)]
pub struct BlowupDetector {
    history: Vec<DiagnosticsSnapshot>,
    bkm_integral: f64,
}

impl BlowupDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot. The first snapshot contributes zero BKM area.
    pub fn record(&mut self, snapshot: DiagnosticsSnapshot) {
        if let Some(prev) = self.history.last() {
            let dt = snapshot.time - prev.time;
            self.bkm_integral += 0.5 * (prev.omega_inf + snapshot.omega_inf) * dt;
        }
        self.history.push(snapshot);
    }

    pub fn bkm_integral(&self) -> f64 {
        self.bkm_integral
    }

    pub fn history(&self) -> &[DiagnosticsSnapshot] {
        &self.history
    }

    pub fn into_history(self) -> Vec<DiagnosticsSnapshot> {
        self.history
    }

    /// Evaluate the heuristic blowup criteria on the current history.
    pub fn criteria(&self) -> BlowupFlags {
        let last = self.history.last();
        let growth_exceeded = match (self.history.len().checked_sub(2), last) {
            (Some(i), Some(last)) => {
                let prev = &self.history[i];
                !last.u_inf.is_finite()
                    || (prev.u_inf > 0.0 && last.u_inf / prev.u_inf > GROWTH_FACTOR_THRESHOLD)
            }
            (None, Some(last)) => !last.u_inf.is_finite(),
            _ => false,
        };

        BlowupFlags {
            bkm_exceeded: self.bkm_integral > BKM_THRESHOLD,
            l3_exceeded: last.map(|s| s.u_l3 > L3_THRESHOLD).unwrap_or(false),
            growth_exceeded,
            vorticity_exceeded: last
                .map(|s| s.omega_inf > VORTICITY_THRESHOLD)
                .unwrap_or(false),
        }
    }
}

/// Serialize a diagnostics history as JSON, the export format consumed by
/// downstream plotting and analysis tooling.
pub fn export_history_json<W: Write>(history: &[DiagnosticsSnapshot], writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, history)
        .context("Failed to serialize diagnostics history to JSON.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(time: f64, u_inf: f64, omega_inf: f64) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            time,
            u_inf,
            omega_inf,
            u_l3: 0.0,
            energy: 0.0,
            enstrophy: 0.0,
            dissipation: 0.0,
            palinstrophy: 0.0,
            omega_argmax: [0, 0, 0],
        }
    }

    #[test]
    fn bkm_integral_is_trapezoidal() {
        let mut detector = BlowupDetector::new();
        detector.record(snapshot(0.0, 1.0, 2.0));
        assert_eq!(detector.bkm_integral(), 0.0);
        detector.record(snapshot(0.5, 1.0, 4.0));
        // 0.5 * (2 + 4) * 0.5 = 1.5
        assert!((detector.bkm_integral() - 1.5).abs() < 1e-14);
        detector.record(snapshot(1.0, 1.0, 6.0));
        assert!((detector.bkm_integral() - 4.0).abs() < 1e-14);
    }

    #[test]
    fn criteria_trip_on_thresholds() {
        let mut detector = BlowupDetector::new();
        detector.record(snapshot(0.0, 1.0, 1.0));
        assert!(!detector.criteria().any());

        detector.record(snapshot(0.1, 20.0, 1.0));
        let flags = detector.criteria();
        assert!(flags.growth_exceeded);
        assert!(!flags.bkm_exceeded);

        let mut detector = BlowupDetector::new();
        detector.record(snapshot(0.0, 1.0, 2e6));
        let flags = detector.criteria();
        assert!(flags.vorticity_exceeded);
        assert!(!flags.growth_exceeded);
    }

    #[test]
    fn criteria_flag_nonfinite_velocity() {
        let mut detector = BlowupDetector::new();
        detector.record(snapshot(0.0, f64::NAN, 1.0));
        assert!(detector.criteria().growth_exceeded);
    }

    #[test]
    fn l3_criterion() {
        let mut detector = BlowupDetector::new();
        let mut s = snapshot(0.0, 1.0, 1.0);
        s.u_l3 = 1500.0;
        detector.record(s);
        assert!(detector.criteria().l3_exceeded);
    }

    #[test]
    fn json_export_round_trips() {
        let history = vec![snapshot(0.0, 1.0, 2.0), snapshot(0.1, 1.5, 2.5)];
        let mut buf = Vec::new();
        export_history_json(&history, &mut buf).expect("export should succeed");
        let parsed: Vec<DiagnosticsSnapshot> =
            serde_json::from_slice(&buf).expect("export should parse back");
        assert_eq!(parsed.len(), 2);
        assert!((parsed[1].omega_inf - 2.5).abs() < 1e-14);
    }
}
