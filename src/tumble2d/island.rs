use super::arena::StepArena;
use super::body::{Body, BodyType};
use super::common::{
    LINEAR_SLOP, MAX_ROTATION, MAX_ROTATION_SQUARED, MAX_TRANSLATION, MAX_TRANSLATION_SQUARED,
};
use super::contact::Contact;
use super::contact_solver::ContactSolver;
use super::joint::{Joint, SolverData};
use super::math::Vec2;
use super::time_step::{Position, SolverStats, StepConf, Velocity};

/// A connected component of bodies coupled by contacts and joints.
/// Islands are solved independently; within one island the constraint
/// order is the order of the contact slice, which makes a step
/// reproducible for identical inputs.
///
/// Contacts reference bodies by index into the island's body slice, and
/// every contact must be touching (have a non-empty manifold).
pub struct Island<'a> {
    pub bodies: &'a mut [Body],
    pub contacts: &'a mut [Contact],
}

impl<'a> Island<'a> {
    pub fn new(bodies: &'a mut [Body], contacts: &'a mut [Contact]) -> Self {
        Self { bodies, contacts }
    }

    /// Run one discrete step over the island: integrate velocities,
    /// iterate the velocity constraints, integrate positions, then
    /// correct residual penetration.
    pub fn solve(
        &mut self,
        arena: &mut StepArena,
        step: &StepConf,
        gravity: Vec2,
        joints: &mut [&mut dyn Joint],
    ) -> SolverStats {
        let h = step.dt;

        let mut positions = arena.take_positions();
        let mut velocities = arena.take_velocities();

        // Integrate velocities and store the state in the solver buffers.
        for body in self.bodies.iter_mut() {
            let c = body.sweep.c;
            let a = body.sweep.a;
            let mut v = body.linear_velocity;
            let mut w = body.angular_velocity;

            // Store positions for continuous collision.
            body.sweep.c0 = c;
            body.sweep.a0 = a;

            if body.body_type == BodyType::Dynamic {
                // Integrate velocities.
                v += h * body.inv_mass
                    * (body.gravity_scale * body.mass * gravity + body.force);
                w += h * body.inv_inertia * body.torque;

                // Apply damping.
                // ODE: dv/dt + c * v = 0
                // Solution: v(t) = v0 * exp(-c * t)
                // Pade approximation: v2 = v1 * 1 / (1 + c * dt)
                v *= 1.0 / (1.0 + h * body.linear_damping);
                w *= 1.0 / (1.0 + h * body.angular_damping);
            }

            positions.push(Position { c, a });
            velocities.push(Velocity { v, w });
        }

        let mut solver = ContactSolver::new(step, &mut *self.contacts, &*self.bodies, arena);
        solver.initialize_velocity_constraints(&positions, &velocities);
        if step.warm_starting {
            solver.warm_start(&mut velocities);
        }

        {
            let mut data = SolverData {
                step,
                positions: &mut positions,
                velocities: &mut velocities,
            };
            for joint in joints.iter_mut() {
                joint.init_velocity_constraints(&mut data);
            }
        }

        let mut stats = SolverStats::default();

        // Solve velocity constraints. A fixed iteration count keeps the
        // step deterministic.
        for _ in 0..step.velocity_iterations {
            {
                let mut data = SolverData {
                    step,
                    positions: &mut positions,
                    velocities: &mut velocities,
                };
                for joint in joints.iter_mut() {
                    joint.solve_velocity_constraints(&mut data);
                }
            }
            let inc = solver.solve_velocity_constraints(&mut velocities);
            stats.max_incremental_impulse = stats.max_incremental_impulse.max(inc);
        }

        // Store impulses for warm starting.
        solver.store_impulses();

        integrate_positions(&mut positions, &mut velocities, h);

        // Solve position constraints until the penetration is tolerable.
        let mut positions_solved = false;
        for i in 0..step.position_iterations {
            stats.position_iterations = i + 1;
            let min_separation = solver.solve_position_constraints(&mut positions);
            stats.min_separation = min_separation;
            let contacts_okay = min_separation >= -3.0 * LINEAR_SLOP;

            let mut joints_okay = true;
            {
                let mut data = SolverData {
                    step,
                    positions: &mut positions,
                    velocities: &mut velocities,
                };
                for joint in joints.iter_mut() {
                    joints_okay &= joint.solve_position_constraints(&mut data);
                }
            }

            if contacts_okay && joints_okay {
                // Exit early if the position errors are small.
                positions_solved = true;
                break;
            }
        }
        stats.positions_solved = positions_solved;

        // Copy state buffers back to the bodies.
        for (body, (position, velocity)) in self
            .bodies
            .iter_mut()
            .zip(positions.iter().zip(velocities.iter()))
        {
            body.sweep.c = position.c;
            body.sweep.a = position.a;
            body.linear_velocity = velocity.v;
            body.angular_velocity = velocity.w;
            body.synchronize_transform();
        }

        solver.recycle(arena);
        arena.give_positions(positions);
        arena.give_velocities(velocities);
        debug_assert!(arena.is_idle());

        stats
    }

    /// Solve the sub-step after a time-of-impact event. Only the two
    /// impact bodies may be repositioned; the rest of the island is
    /// pinned so a single TOI cannot ripple. Impulses are neither warm
    /// started nor stored: the discrete solver already applied last
    /// step's, and TOI impulses can be too large to reuse.
    pub fn solve_toi(
        &mut self,
        arena: &mut StepArena,
        sub_step: &StepConf,
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> SolverStats {
        debug_assert!(toi_index_a < self.bodies.len());
        debug_assert!(toi_index_b < self.bodies.len());

        let mut positions = arena.take_positions();
        let mut velocities = arena.take_velocities();

        for body in self.bodies.iter() {
            positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            velocities.push(Velocity {
                v: body.linear_velocity,
                w: body.angular_velocity,
            });
        }

        let mut solver = ContactSolver::new(sub_step, &mut *self.contacts, &*self.bodies, arena);

        let mut stats = SolverStats::default();

        // Push the impact pair apart to a tolerable overlap.
        for i in 0..sub_step.position_iterations {
            stats.position_iterations = i + 1;
            let min_separation =
                solver.solve_toi_position_constraints(&mut positions, toi_index_a, toi_index_b);
            stats.min_separation = min_separation;
            if min_separation >= -1.5 * LINEAR_SLOP {
                stats.positions_solved = true;
                break;
            }
        }

        // Leap of faith to the new safe state; the sweep start becomes
        // the resolved position.
        self.bodies[toi_index_a].sweep.c0 = positions[toi_index_a].c;
        self.bodies[toi_index_a].sweep.a0 = positions[toi_index_a].a;
        self.bodies[toi_index_b].sweep.c0 = positions[toi_index_b].c;
        self.bodies[toi_index_b].sweep.a0 = positions[toi_index_b].a;

        solver.initialize_velocity_constraints(&positions, &velocities);

        for _ in 0..sub_step.velocity_iterations {
            let inc = solver.solve_velocity_constraints(&mut velocities);
            stats.max_incremental_impulse = stats.max_incremental_impulse.max(inc);
        }

        integrate_positions(&mut positions, &mut velocities, sub_step.dt);

        for (body, (position, velocity)) in self
            .bodies
            .iter_mut()
            .zip(positions.iter().zip(velocities.iter()))
        {
            body.sweep.c = position.c;
            body.sweep.a = position.a;
            body.linear_velocity = velocity.v;
            body.angular_velocity = velocity.w;
            body.synchronize_transform();
        }

        solver.recycle(arena);
        arena.give_positions(positions);
        arena.give_velocities(velocities);
        debug_assert!(arena.is_idle());

        stats
    }
}

/// Integrate positions, clamping translation and rotation so one bad
/// velocity cannot blow up the step.
fn integrate_positions(positions: &mut [Position], velocities: &mut [Velocity], h: f32) {
    for (position, velocity) in positions.iter_mut().zip(velocities.iter_mut()) {
        let mut v = velocity.v;
        let mut w = velocity.w;

        // Check for large velocities.
        let translation = h * v;
        if translation.dot(translation) > MAX_TRANSLATION_SQUARED {
            let ratio = MAX_TRANSLATION / translation.length();
            v *= ratio;
        }

        let rotation = h * w;
        if rotation * rotation > MAX_ROTATION_SQUARED {
            let ratio = MAX_ROTATION / rotation.abs();
            w *= ratio;
        }

        // Integrate.
        position.c += h * v;
        position.a += h * w;
        velocity.v = v;
        velocity.w = w;
    }
}
