use super::time_step::{Position, StepConf, Velocity};

/// Solver state handed to joints, mirroring what contact constraints see.
pub struct SolverData<'a> {
    pub step: &'a StepConf,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

/// A constraint between two bodies other than a contact. Concrete joint
/// types live with the caller; the island only needs the three solver
/// hooks, invoked in the same order as for contacts.
pub trait Joint {
    fn init_velocity_constraints(&mut self, data: &mut SolverData);
    fn solve_velocity_constraints(&mut self, data: &mut SolverData);
    /// Returns true when the positional error is within tolerance.
    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool;
}
