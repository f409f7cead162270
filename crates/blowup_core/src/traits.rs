use crate::diagnostics::{BlowupFlags, DiagnosticsSnapshot};
use crate::field::VectorField;

/// Read-only view of one integrator step, handed to observers.
///
/// Fields reference the pre-step state; `dt` is the step size about to be
/// applied. `flags` are the heuristic blowup criteria evaluated on the
/// history up to and including this step.
pub struct StepContext<'a> {
    pub time: f64,
    pub dt: f64,
    pub vorticity: &'a VectorField,
    pub velocity: &'a VectorField,
    pub diagnostics: &'a DiagnosticsSnapshot,
    pub flags: BlowupFlags,
}

/// Per-step callback invoked synchronously by the run loop.
///
/// This is the sole extension point of the integrator: observers may record
/// diagnostics or perform bookkeeping, but receive only shared references
/// and cannot mutate the evolved state.
pub trait StepObserver {
    fn on_step(&mut self, ctx: &StepContext<'_>);
}
