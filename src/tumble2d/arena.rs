use super::contact_solver::{ContactPositionConstraint, ContactVelocityConstraint};
use super::time_step::{Position, Velocity};

/// Per-step scratch storage for solver temporaries, replacing a LIFO
/// stack allocator. Buffers are checked out at island-solve entry and
/// must all be home again before the entry point returns; capacity is
/// retained across islands and steps so the steady state allocates
/// nothing.
#[derive(Default)]
pub struct StepArena {
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
    position_constraints: Vec<ContactPositionConstraint>,
    velocity_constraints: Vec<ContactVelocityConstraint>,
    loans: u32,
}

impl StepArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// All buffers are home.
    pub fn is_idle(&self) -> bool {
        self.loans == 0
    }

    pub(crate) fn take_positions(&mut self) -> Vec<Position> {
        self.loans += 1;
        std::mem::take(&mut self.positions)
    }

    pub(crate) fn give_positions(&mut self, mut buf: Vec<Position>) {
        buf.clear();
        self.positions = buf;
        self.loans -= 1;
    }

    pub(crate) fn take_velocities(&mut self) -> Vec<Velocity> {
        self.loans += 1;
        std::mem::take(&mut self.velocities)
    }

    pub(crate) fn give_velocities(&mut self, mut buf: Vec<Velocity>) {
        buf.clear();
        self.velocities = buf;
        self.loans -= 1;
    }

    pub(crate) fn take_position_constraints(&mut self) -> Vec<ContactPositionConstraint> {
        self.loans += 1;
        std::mem::take(&mut self.position_constraints)
    }

    pub(crate) fn give_position_constraints(&mut self, mut buf: Vec<ContactPositionConstraint>) {
        buf.clear();
        self.position_constraints = buf;
        self.loans -= 1;
    }

    pub(crate) fn take_velocity_constraints(&mut self) -> Vec<ContactVelocityConstraint> {
        self.loans += 1;
        std::mem::take(&mut self.velocity_constraints)
    }

    pub(crate) fn give_velocity_constraints(&mut self, mut buf: Vec<ContactVelocityConstraint>) {
        buf.clear();
        self.velocity_constraints = buf;
        self.loans -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_come_back_cleared_with_capacity() {
        let mut arena = StepArena::new();
        let mut positions = arena.take_positions();
        assert!(!arena.is_idle());
        positions.reserve(64);
        positions.push(Position::default());
        let capacity = positions.capacity();
        arena.give_positions(positions);
        assert!(arena.is_idle());

        let positions = arena.take_positions();
        assert!(positions.is_empty());
        assert!(positions.capacity() >= capacity.min(64));
        arena.give_positions(positions);
    }
}
