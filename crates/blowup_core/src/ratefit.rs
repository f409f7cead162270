//! Power-law blowup-rate fitting.
//!
//! Models the velocity sup norm as `u(t) ~ C * (T* - t)^(-alpha)` over the
//! most recent fraction of the recorded history and classifies the fitted
//! exponent against the known theoretical thresholds. Fitting is advisory:
//! every failure mode degrades to a defined neutral result instead of
//! raising.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Residual assigned to parameter candidates outside the admissible region
/// (`T* <= t_last`, `alpha` outside (0, 2], non-positive amplitude).
const PENALTY: f64 = 1e12;
/// Largest admissible blowup exponent.
const ALPHA_MAX: f64 = 2.0;
/// Half-width of the "approximately 0.5" band classified as Type I.
const TYPE_I_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FitStatus {
    /// The nonlinear refinement converged.
    Converged,
    /// The optimizer did not converge but the best candidate's residual is
    /// below the acceptability bound, so it is reported anyway.
    Degraded,
    /// Neutral fallback: too little usable data or no acceptable candidate.
    Default,
}

/// Blowup-rate regimes by fitted exponent. Boundaries are fixed constants:
/// subcritical below 0.5, Type I at (approximately) 0.5, Type II split at
/// 0.6 and 0.75 with the upper bound excluded from the window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RateRegime {
    Subcritical,
    TypeI,
    TypeIILow,
    TypeIIWindow,
    TypeIIHigh,
}

pub fn classify_alpha(alpha: f64) -> RateRegime {
    if (alpha - 0.5).abs() <= TYPE_I_TOLERANCE {
        RateRegime::TypeI
    } else if alpha < 0.5 {
        RateRegime::Subcritical
    } else if alpha < 0.6 {
        RateRegime::TypeIILow
    } else if alpha < 0.75 {
        RateRegime::TypeIIWindow
    } else {
        RateRegime::TypeIIHigh
    }
}

/// One power-law fit. Independent fits are appended to a history, never
/// merged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateFit {
    pub t_star: f64,
    pub alpha: f64,
    pub amplitude: f64,
    /// RMS of the log-residuals over the fit window.
    pub residual: f64,
    /// `exp(-residual)`.
    pub confidence: f64,
    /// True when `alpha` falls in the Type II window [0.6, 0.75).
    pub in_window: bool,
    pub status: FitStatus,
}

impl RateFit {
    /// Neutral result returned when fitting is not meaningful.
    pub fn neutral() -> Self {
        Self {
            t_star: f64::INFINITY,
            alpha: 0.5,
            amplitude: 0.0,
            residual: f64::INFINITY,
            confidence: 0.0,
            in_window: false,
            status: FitStatus::Default,
        }
    }

    pub fn regime(&self) -> RateRegime {
        classify_alpha(self.alpha)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateFitSettings {
    /// Fraction of the most recent history used for fitting.
    pub window_fraction: f64,
    /// Minimum number of usable (finite, positive) samples.
    pub min_samples: usize,
    pub max_iterations: usize,
    /// Convergence threshold on the RMS improvement per accepted step.
    pub step_tolerance: f64,
    /// RMS bound under which a non-converged best candidate is still
    /// reported (as `Degraded`) instead of falling back to neutral.
    pub acceptable_residual: f64,
}

impl Default for RateFitSettings {
    fn default() -> Self {
        Self {
            window_fraction: 0.3,
            min_samples: 5,
            max_iterations: 60,
            step_tolerance: 1e-12,
            acceptable_residual: 0.5,
        }
    }
}

/// Trailing window of usable samples: the most recent `window_fraction` of
/// the series (at least `min_samples` points where available), with
/// non-finite or non-positive entries dropped.
fn usable_window(times: &[f64], values: &[f64], settings: &RateFitSettings) -> Vec<(f64, f64)> {
    let len = times.len().min(values.len());
    let want = ((len as f64 * settings.window_fraction).ceil() as usize)
        .max(settings.min_samples)
        .min(len);
    let start = len - want;
    times[start..len]
        .iter()
        .zip(&values[start..len])
        .filter(|(t, v)| t.is_finite() && v.is_finite() && **v > 0.0)
        .map(|(&t, &v)| (t, v))
        .collect()
}

/// RMS log-residual of the model at the given parameters, with the penalty
/// applied outside the admissible region. Amplitude is parameterized as
/// `ln C`, so non-positive amplitudes cannot arise from the optimizer
/// itself; the check guards direct callers.
fn rms_log_residual(data: &[(f64, f64)], t_star: f64, alpha: f64, ln_c: f64) -> f64 {
    let t_last = data.last().map(|&(t, _)| t).unwrap_or(0.0);
    if !(t_star.is_finite() && alpha.is_finite() && ln_c.is_finite()) {
        return PENALTY;
    }
    if t_star <= t_last || alpha <= 0.0 || alpha > ALPHA_MAX || ln_c.exp() <= 0.0 {
        return PENALTY;
    }
    let mut sum = 0.0;
    for &(t, v) in data {
        let s = t_star - t;
        if s <= 0.0 {
            return PENALTY;
        }
        let r = ln_c - alpha * s.ln() - v.ln();
        sum += r * r;
    }
    (sum / data.len() as f64).sqrt()
}

/// Ordinary least squares of `ln v` against `ln(T* - t)` for a known `T*`.
/// Returns `(alpha, ln_c, rms)`; `None` when the regression is degenerate.
fn regress_fixed(data: &[(f64, f64)], t_star: f64) -> Option<(f64, f64, f64)> {
    let m = data.len() as f64;
    let mut sx = 0.0;
    let mut sy = 0.0;
    for &(t, v) in data {
        let s = t_star - t;
        if s <= 0.0 {
            return None;
        }
        sx += s.ln();
        sy += v.ln();
    }
    let (mx, my) = (sx / m, sy / m);
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for &(t, v) in data {
        let x = (t_star - t).ln() - mx;
        sxx += x * x;
        sxy += x * (v.ln() - my);
    }
    if sxx <= 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    let alpha = -slope;
    let ln_c = my + slope * mx;
    Some((alpha, ln_c, rms_log_residual(data, t_star, alpha, ln_c)))
}

fn build_fit(t_star: f64, alpha: f64, ln_c: f64, rms: f64, status: FitStatus) -> RateFit {
    RateFit {
        t_star,
        alpha,
        amplitude: ln_c.exp(),
        residual: rms,
        confidence: (-rms).exp(),
        in_window: classify_alpha(alpha) == RateRegime::TypeIIWindow,
        status,
    }
}

/// Fit with a known blowup time: reduces to linear regression in log-log
/// coordinates.
///
/// The regressed exponent is subject to the same admissibility check as the
/// joint fit: a slope outside `(0, ALPHA_MAX]` (a non-growing series, say)
/// yields the neutral result rather than a nonsensical rate.
pub fn fixed_tstar_fit(
    times: &[f64],
    values: &[f64],
    t_star: f64,
    settings: &RateFitSettings,
) -> RateFit {
    let data: Vec<(f64, f64)> = usable_window(times, values, settings)
        .into_iter()
        .filter(|&(t, _)| t < t_star)
        .collect();
    if data.len() < settings.min_samples {
        return RateFit::neutral();
    }
    match regress_fixed(&data, t_star) {
        Some((alpha, ln_c, rms)) if rms < PENALTY => {
            build_fit(t_star, alpha, ln_c, rms, FitStatus::Converged)
        }
        _ => RateFit::neutral(),
    }
}

/// Jointly estimate `(T*, alpha, C)` by nonlinear least squares on the
/// log-residuals.
///
/// Seeding scans candidate blowup times past the last sample, solving the
/// log-log slope regression for each; the best seed is then refined by a
/// damped Gauss-Newton iteration on `(T*, alpha, ln C)`. Candidates outside
/// the admissible region carry the penalty residual and never win.
pub fn fit_blowup_rate(times: &[f64], values: &[f64], settings: &RateFitSettings) -> RateFit {
    let data = usable_window(times, values, settings);
    if data.len() < settings.min_samples {
        return RateFit::neutral();
    }
    let t_first = data[0].0;
    let t_last = data[data.len() - 1].0;
    let span = t_last - t_first;
    if span <= 0.0 {
        return RateFit::neutral();
    }

    let mut best: Option<(f64, f64, f64, f64)> = None;
    for frac in [0.02, 0.05, 0.1, 0.2, 0.35, 0.5, 0.75, 1.0, 1.5, 2.0] {
        let ts = t_last + frac * span;
        if let Some((alpha, ln_c, rms)) = regress_fixed(&data, ts) {
            if best.map(|(_, _, _, r)| rms < r).unwrap_or(true) {
                best = Some((ts, alpha, ln_c, rms));
            }
        }
    }
    let Some((mut t_star, mut alpha, mut ln_c, mut rms)) = best else {
        return RateFit::neutral();
    };
    if rms >= PENALTY {
        return RateFit::neutral();
    }

    // Damped Gauss-Newton on (T*, alpha, ln C); residuals
    // r_i = ln C - alpha ln(T* - t_i) - ln v_i.
    let mut lambda = 1e-3;
    let mut converged = false;
    for _ in 0..settings.max_iterations {
        let mut jtj = [0.0_f64; 9];
        let mut jtr = [0.0_f64; 3];
        for &(t, v) in &data {
            let s = t_star - t;
            let r = ln_c - alpha * s.ln() - v.ln();
            let j = [-alpha / s, -s.ln(), 1.0];
            for a in 0..3 {
                for b in 0..3 {
                    jtj[a * 3 + b] += j[a] * j[b];
                }
                jtr[a] += j[a] * r;
            }
        }
        for a in 0..3 {
            jtj[a * 3 + a] += lambda;
        }
        let lhs = DMatrix::from_row_slice(3, 3, &jtj);
        let rhs = DVector::from_column_slice(&jtr);
        let Some(delta) = lhs.lu().solve(&rhs) else {
            lambda *= 10.0;
            if lambda > 1e8 {
                break;
            }
            continue;
        };

        let cand = (t_star - delta[0], alpha - delta[1], ln_c - delta[2]);
        let cand_rms = rms_log_residual(&data, cand.0, cand.1, cand.2);
        if cand_rms >= rms {
            lambda *= 10.0;
            if lambda > 1e8 {
                break;
            }
            continue;
        }

        let improvement = rms - cand_rms;
        t_star = cand.0;
        alpha = cand.1;
        ln_c = cand.2;
        rms = cand_rms;
        lambda = (lambda * 0.1).max(1e-12);
        if improvement < settings.step_tolerance {
            converged = true;
            break;
        }
    }
    // A seed already at machine-precision residual leaves nothing to improve.
    if !converged && rms < 1e-10 {
        converged = true;
    }

    if converged {
        build_fit(t_star, alpha, ln_c, rms, FitStatus::Converged)
    } else if rms <= settings.acceptable_residual {
        build_fit(t_star, alpha, ln_c, rms, FitStatus::Degraded)
    } else {
        RateFit::neutral()
    }
}

/// One entry of the sliding-window refit sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SlidingFit {
    /// Last sample time of the prefix this fit was computed over.
    pub time: f64,
    pub fit: RateFit,
}

/// Repeatedly refit over growing prefixes of the history, exposing the
/// evolution of the fitted exponent.
pub fn sliding_fits(
    times: &[f64],
    values: &[f64],
    settings: &RateFitSettings,
    min_prefix: usize,
    stride: usize,
) -> Vec<SlidingFit> {
    let len = times.len().min(values.len());
    let start = min_prefix.max(settings.min_samples).max(1);
    let mut out = Vec::new();
    let mut end = start;
    while end <= len {
        let fit = fit_blowup_rate(&times[..end], &values[..end], settings);
        out.push(SlidingFit {
            time: times[end - 1],
            fit,
        });
        end += stride.max(1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_series(
        c: f64,
        t_star: f64,
        alpha: f64,
        t_end: f64,
        dt: f64,
    ) -> (Vec<f64>, Vec<f64>) {
        let mut times = Vec::new();
        let mut values = Vec::new();
        let mut t = 0.0;
        while t <= t_end + 1e-12 {
            times.push(t);
            values.push(c * (t_star - t).powf(-alpha));
            t += dt;
        }
        (times, values)
    }

    #[test]
    fn classification_boundaries_are_exact() {
        assert_eq!(classify_alpha(0.3), RateRegime::Subcritical);
        assert_eq!(classify_alpha(0.5), RateRegime::TypeI);
        assert_eq!(classify_alpha(0.55), RateRegime::TypeIILow);
        assert_eq!(classify_alpha(0.6), RateRegime::TypeIIWindow);
        assert_eq!(classify_alpha(0.7), RateRegime::TypeIIWindow);
        assert_eq!(classify_alpha(0.75), RateRegime::TypeIIHigh);
        assert_eq!(classify_alpha(1.2), RateRegime::TypeIIHigh);
    }

    #[test]
    fn too_few_samples_returns_neutral_default() {
        let settings = RateFitSettings::default();
        let fit = fit_blowup_rate(&[0.0, 1.0, 2.0], &[1.0, 2.0, 4.0], &settings);
        assert_eq!(fit.status, FitStatus::Default);
        assert_eq!(fit.alpha, 0.5);
        assert!(fit.t_star.is_infinite());
        assert_eq!(fit.confidence, 0.0);
    }

    #[test]
    fn all_invalid_samples_return_neutral_default() {
        let settings = RateFitSettings::default();
        let times: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let values = vec![f64::NAN; 10]
            .into_iter()
            .chain(vec![-1.0; 10])
            .collect::<Vec<_>>();
        let fit = fit_blowup_rate(&times, &values, &settings);
        assert_eq!(fit.status, FitStatus::Default);
    }

    #[test]
    fn flat_series_has_no_admissible_rate() {
        // Zero log-log slope means alpha = 0, outside (0, 2]; every seed
        // carries the penalty and the fit must fall back to neutral.
        let settings = RateFitSettings::default();
        let times: Vec<f64> = (0..50).map(|i| i as f64 * 0.1).collect();
        let values = vec![3.0; 50];
        let fit = fit_blowup_rate(&times, &values, &settings);
        assert_eq!(fit.status, FitStatus::Default);
    }

    #[test]
    fn recovers_synthetic_ground_truth() {
        let (times, values) = synthetic_series(5.0, 10.0, 0.65, 9.5, 0.05);
        let settings = RateFitSettings::default();
        let fit = fit_blowup_rate(&times, &values, &settings);

        assert_ne!(fit.status, FitStatus::Default);
        assert!(
            (fit.alpha - 0.65).abs() < 0.05,
            "alpha = {} (expected 0.65)",
            fit.alpha
        );
        assert!(
            (fit.t_star - 10.0).abs() < 0.2,
            "t_star = {} (expected 10.0)",
            fit.t_star
        );
        assert!(fit.confidence > 0.8, "confidence = {}", fit.confidence);
        assert!(fit.in_window);
    }

    #[test]
    fn fixed_tstar_fit_is_exact_on_clean_data() {
        let (times, values) = synthetic_series(2.0, 4.0, 0.7, 3.5, 0.05);
        let settings = RateFitSettings::default();
        let fit = fixed_tstar_fit(&times, &values, 4.0, &settings);
        assert_eq!(fit.status, FitStatus::Converged);
        assert!((fit.alpha - 0.7).abs() < 1e-8, "alpha = {}", fit.alpha);
        assert!((fit.amplitude - 2.0).abs() < 1e-8);
        assert!(fit.residual < 1e-10);
        assert!(fit.confidence > 0.999);
    }

    #[test]
    fn non_converged_acceptable_fit_is_reported_degraded() {
        let (times, mut values) = synthetic_series(5.0, 10.0, 0.65, 9.5, 0.05);
        for (i, v) in values.iter_mut().enumerate() {
            *v *= 1.0 + 0.05 * ((i % 7) as f64 - 3.0) / 3.0;
        }
        // A zero step tolerance means every accepted refinement step counts
        // as progress, so the loop can never declare convergence on noisy
        // data; the best candidate is still under the residual bound.
        let settings = RateFitSettings {
            max_iterations: 2,
            step_tolerance: 0.0,
            acceptable_residual: 1.0,
            ..RateFitSettings::default()
        };
        let fit = fit_blowup_rate(&times, &values, &settings);
        assert_eq!(fit.status, FitStatus::Degraded);
        assert!(fit.residual <= 1.0);
        assert!(fit.confidence > 0.0);
        assert!((fit.alpha - 0.65).abs() < 0.3, "alpha = {}", fit.alpha);
    }

    #[test]
    fn fixed_tstar_fit_rejects_inadmissible_exponent() {
        // A linearly decaying series regresses to slope +1, exponent -1.
        let settings = RateFitSettings::default();
        let times: Vec<f64> = (0..30).map(|i| i as f64 * 0.1).collect();
        let values: Vec<f64> = times.iter().map(|t| 2.0 * (5.0 - t)).collect();
        let fit = fixed_tstar_fit(&times, &values, 5.0, &settings);
        assert_eq!(fit.status, FitStatus::Default);
    }

    #[test]
    fn fixed_tstar_fit_rejects_times_past_t_star() {
        let settings = RateFitSettings::default();
        // All samples at or past T*: nothing usable.
        let times: Vec<f64> = (0..20).map(|i| 5.0 + i as f64).collect();
        let values = vec![1.0; 20];
        let fit = fixed_tstar_fit(&times, &values, 5.0, &settings);
        assert_eq!(fit.status, FitStatus::Default);
    }

    #[test]
    fn sliding_fits_expose_alpha_evolution() {
        let (times, values) = synthetic_series(5.0, 10.0, 0.65, 9.5, 0.05);
        let settings = RateFitSettings::default();
        let fits = sliding_fits(&times, &values, &settings, 40, 30);
        assert!(fits.len() > 2);
        for pair in fits.windows(2) {
            assert!(pair[1].time > pair[0].time);
        }
        let last = fits.last().expect("non-empty");
        assert!((last.fit.alpha - 0.65).abs() < 0.1);
    }

    #[test]
    fn confidence_decreases_with_noise() {
        let (times, mut values) = synthetic_series(5.0, 10.0, 0.65, 9.5, 0.05);
        let settings = RateFitSettings::default();
        let clean = fit_blowup_rate(&times, &values, &settings);
        // Deterministic multiplicative perturbation.
        for (i, v) in values.iter_mut().enumerate() {
            *v *= 1.0 + 0.05 * ((i % 7) as f64 - 3.0) / 3.0;
        }
        let noisy = fit_blowup_rate(&times, &values, &settings);
        assert!(noisy.confidence < clean.confidence);
        assert!(noisy.confidence > 0.0);
    }
}
