use super::common::{POSITION_ITERATIONS, TOI_POSITION_ITERATIONS, VELOCITY_ITERATIONS};
use super::math::Vec2;

/// Per-step solver configuration. Iteration counts are fixed (no residual
/// based early exit in the velocity phase) so a step is deterministic.
#[derive(Clone, Copy, Debug)]
pub struct StepConf {
    pub dt: f32,
    pub inv_dt: f32,
    /// `dt / previous dt`, used to scale warm-start impulses when the
    /// step size changes.
    pub dt_ratio: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}

impl StepConf {
    pub fn new(dt: f32) -> Self {
        debug_assert!(dt > 0.0);
        Self {
            dt,
            inv_dt: 1.0 / dt,
            dt_ratio: 1.0,
            velocity_iterations: VELOCITY_ITERATIONS,
            position_iterations: POSITION_ITERATIONS,
            warm_starting: true,
        }
    }

    /// Configuration for a TOI sub-step: more position iterations, no
    /// warm starting (the discrete solver already applied those impulses).
    pub fn toi_sub_step(dt: f32, velocity_iterations: usize) -> Self {
        debug_assert!(dt > 0.0);
        Self {
            dt,
            inv_dt: 1.0 / dt,
            dt_ratio: 1.0,
            velocity_iterations,
            position_iterations: TOI_POSITION_ITERATIONS,
            warm_starting: false,
        }
    }
}

/// Body center-of-mass position state used by the solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct Position {
    pub c: Vec2,
    pub a: f32,
}

/// Body velocity state used by the solver.
#[derive(Clone, Copy, Debug, Default)]
pub struct Velocity {
    pub v: Vec2,
    pub w: f32,
}

/// Diagnostics from one island solve.
#[derive(Clone, Copy, Debug)]
pub struct SolverStats {
    /// Largest incremental impulse applied during the velocity phase.
    pub max_incremental_impulse: f32,
    /// Smallest signed separation seen by the final position iteration;
    /// positive infinity when no positional work was done.
    pub min_separation: f32,
    /// Position iterations actually used.
    pub position_iterations: usize,
    /// The position phase reached its separation target.
    pub positions_solved: bool,
}

impl Default for SolverStats {
    fn default() -> Self {
        Self {
            max_incremental_impulse: 0.0,
            min_separation: f32::INFINITY,
            position_iterations: 0,
            positions_solved: false,
        }
    }
}
