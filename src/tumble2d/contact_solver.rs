use tracing::debug;

use super::arena::StepArena;
use super::body::Body;
use super::common::{
    BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE,
};
use super::contact::Contact;
use super::manifold::{Manifold, WorldManifold};
use super::math::{Mat2x2, Rot, Transform, Vec2};
use super::time_step::{Position, StepConf, Velocity};

const BLOCK_SOLVE: bool = true;

/// The block solver is skipped when the effective mass matrix gets close
/// to singular; the two contact points are then nearly redundant and the
/// sequential solver handles them fine.
const MAX_CONDITION_NUMBER: f32 = 1000.0;

#[derive(Copy, Clone, Default)]
pub(crate) struct VelocityConstraintPoint {
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    pub velocity_bias: f32,
}

pub(crate) struct ContactVelocityConstraint {
    pub points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    tangent: Vec2,
    /// Block mass matrix for two-point manifolds, and its inverse.
    k: Mat2x2,
    normal_mass: Mat2x2,
    /// False when K is too ill-conditioned to invert; the normal pass
    /// then runs sequentially over both points.
    k_valid: bool,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_inertia_a: f32,
    inv_inertia_b: f32,
    friction: f32,
    restitution: f32,
    threshold: f32,
    tangent_speed: f32,
    point_count: usize,
    contact_index: usize,
}

#[derive(Clone, Copy)]
enum PositionManifoldKind {
    Circles,
    FaceA,
    FaceB,
}

pub(crate) struct ContactPositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    kind: PositionManifoldKind,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_inertia_a: f32,
    inv_inertia_b: f32,
    radius_a: f32,
    radius_b: f32,
    point_count: usize,
}

/// Contact geometry re-evaluated from candidate body positions during
/// position correction.
struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: f32,
}

impl PositionSolverManifold {
    fn new(
        pc: &ContactPositionConstraint,
        xf_a: &Transform,
        xf_b: &Transform,
        index: usize,
    ) -> Self {
        debug_assert!(pc.point_count > 0);

        match pc.kind {
            PositionManifoldKind::Circles => {
                let point_a = xf_a.mul_vec2(pc.local_point);
                let point_b = xf_b.mul_vec2(pc.local_points[0]);
                let d = point_b - point_a;
                let normal = if d.length_squared() > f32::EPSILON * f32::EPSILON {
                    d.normalize()
                } else {
                    Vec2::new(1.0, 0.0)
                };
                Self {
                    normal,
                    point: 0.5 * (point_a + point_b),
                    separation: d.dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            PositionManifoldKind::FaceA => {
                let normal = xf_a.q * pc.local_normal;
                let plane_point = xf_a.mul_vec2(pc.local_point);
                let clip_point = xf_b.mul_vec2(pc.local_points[index]);
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal)
                        - pc.radius_a
                        - pc.radius_b,
                }
            }
            PositionManifoldKind::FaceB => {
                let normal = xf_b.q * pc.local_normal;
                let plane_point = xf_b.mul_vec2(pc.local_point);
                let clip_point = xf_a.mul_vec2(pc.local_points[index]);
                Self {
                    // Ensure normal points from A to B.
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal)
                        - pc.radius_a
                        - pc.radius_b,
                }
            }
        }
    }
}

/// Solves the velocity and position constraints of an island's touching
/// contacts. Constraint buffers are rebuilt each step from the manifolds
/// and current body state; the buffers themselves come from the step
/// arena and go back to it through `recycle`.
pub struct ContactSolver<'a> {
    position_constraints: Vec<ContactPositionConstraint>,
    velocity_constraints: Vec<ContactVelocityConstraint>,
    contacts: &'a mut [Contact],
}

impl<'a> ContactSolver<'a> {
    pub fn new(
        step: &StepConf,
        contacts: &'a mut [Contact],
        bodies: &[Body],
        arena: &mut StepArena,
    ) -> Self {
        let mut position_constraints = arena.take_position_constraints();
        let mut velocity_constraints = arena.take_velocity_constraints();

        for (contact_index, contact) in contacts.iter().enumerate() {
            let manifold = contact.manifold();
            let point_count = manifold.point_count();
            debug_assert!(point_count > 0, "island contains a non-touching contact");
            if point_count == 0 {
                continue;
            }

            let body_a = &bodies[contact.body_a];
            let body_b = &bodies[contact.body_b];

            let mut vc = ContactVelocityConstraint {
                points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                normal: Vec2::ZERO,
                tangent: Vec2::ZERO,
                k: Mat2x2::ZERO,
                normal_mass: Mat2x2::ZERO,
                k_valid: false,
                index_a: contact.body_a,
                index_b: contact.body_b,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_inertia_a: body_a.inv_inertia,
                inv_inertia_b: body_b.inv_inertia,
                friction: contact.friction,
                restitution: contact.restitution,
                threshold: contact.restitution_threshold,
                tangent_speed: contact.tangent_speed,
                point_count,
                contact_index,
            };
            for (vcp, mp) in vc.points.iter_mut().zip(manifold.points()) {
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * mp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
            }
            velocity_constraints.push(vc);

            let mut pc = ContactPositionConstraint {
                local_points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
                local_normal: manifold.local_normal().as_vec2(),
                local_point: manifold.local_point(),
                kind: match manifold {
                    Manifold::Circles { .. } => PositionManifoldKind::Circles,
                    Manifold::FaceA(_) => PositionManifoldKind::FaceA,
                    Manifold::FaceB(_) => PositionManifoldKind::FaceB,
                    Manifold::Unset => unreachable!("constraint built from unset manifold"),
                },
                index_a: contact.body_a,
                index_b: contact.body_b,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                inv_inertia_a: body_a.inv_inertia,
                inv_inertia_b: body_b.inv_inertia,
                radius_a: contact.radius_a,
                radius_b: contact.radius_b,
                point_count,
            };
            for (slot, mp) in pc.local_points.iter_mut().zip(manifold.points()) {
                *slot = mp.local_point;
            }
            position_constraints.push(pc);
        }

        Self {
            position_constraints,
            velocity_constraints,
            contacts,
        }
    }

    /// Initialize the position-dependent portions of the velocity
    /// constraints.
    pub fn initialize_velocity_constraints(
        &mut self,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        for (vc, pc) in self
            .velocity_constraints
            .iter_mut()
            .zip(self.position_constraints.iter())
        {
            let manifold = self.contacts[vc.contact_index].manifold();

            let m_a = vc.inv_mass_a;
            let m_b = vc.inv_mass_b;
            let i_a = vc.inv_inertia_a;
            let i_b = vc.inv_inertia_b;

            let c_a = positions[vc.index_a].c;
            let a_a = positions[vc.index_a].a;
            let v_a = velocities[vc.index_a].v;
            let w_a = velocities[vc.index_a].w;

            let c_b = positions[vc.index_b].c;
            let a_b = positions[vc.index_b].a;
            let v_b = velocities[vc.index_b].v;
            let w_b = velocities[vc.index_b].w;

            let q_a = Rot::new(a_a);
            let xf_a = Transform {
                p: c_a - q_a * pc.local_center_a,
                q: q_a,
            };
            let q_b = Rot::new(a_b);
            let xf_b = Transform {
                p: c_b - q_b * pc.local_center_b,
                q: q_b,
            };

            let world_manifold =
                WorldManifold::new(manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

            vc.normal = world_manifold.normal;
            vc.tangent = vc.normal.cross_scalar(1.0);

            for (j, vcp) in vc.points.iter_mut().take(vc.point_count).enumerate() {
                vcp.r_a = world_manifold.points[j] - c_a;
                vcp.r_b = world_manifold.points[j] - c_b;

                let rn_a = vcp.r_a.cross(vc.normal);
                let rn_b = vcp.r_b.cross(vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = vcp.r_a.cross(vc.tangent);
                let rt_b = vcp.r_b.cross(vc.tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Velocity bias for restitution; suppressed below the
                // closing-speed threshold.
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                        - v_a
                        - Vec2::scalar_cross(w_a, vcp.r_a),
                );
                if v_rel < -vc.threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            // If we have two points, prepare the block solver.
            vc.k_valid = false;
            if vc.point_count == 2 && BLOCK_SOLVE {
                let rn1_a = vc.points[0].r_a.cross(vc.normal);
                let rn1_b = vc.points[0].r_b.cross(vc.normal);
                let rn2_a = vc.points[1].r_a.cross(vc.normal);
                let rn2_b = vc.points[1].r_b.cross(vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    // K is safe to invert.
                    vc.k = Mat2x2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.invert();
                    vc.k_valid = true;
                }
            }
        }
    }

    /// Apply the cached impulses so the iterations start from last step's
    /// solution.
    pub fn warm_start(&mut self, velocities: &mut [Velocity]) {
        for vc in self.velocity_constraints.iter() {
            let m_a = vc.inv_mass_a;
            let i_a = vc.inv_inertia_a;
            let m_b = vc.inv_mass_b;
            let i_b = vc.inv_inertia_b;

            let mut v_a = velocities[vc.index_a].v;
            let mut w_a = velocities[vc.index_a].w;
            let mut v_b = velocities[vc.index_b].v;
            let mut w_b = velocities[vc.index_b].w;

            for vcp in vc.points.iter().take(vc.point_count) {
                let p = vcp.normal_impulse * vc.normal + vcp.tangent_impulse * vc.tangent;
                w_a -= i_a * vcp.r_a.cross(p);
                v_a -= m_a * p;
                w_b += i_b * vcp.r_b.cross(p);
                v_b += m_b * p;
            }

            velocities[vc.index_a].v = v_a;
            velocities[vc.index_a].w = w_a;
            velocities[vc.index_b].v = v_b;
            velocities[vc.index_b].w = w_b;
        }
    }

    /// One velocity iteration over all constraints: the friction pass
    /// first, then non-penetration (solved last so it dominates).
    /// Returns the largest incremental impulse applied, for diagnostics.
    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) -> f32 {
        let mut max_incremental_impulse = 0.0f32;

        for vc in self.velocity_constraints.iter_mut() {
            let m_a = vc.inv_mass_a;
            let i_a = vc.inv_inertia_a;
            let m_b = vc.inv_mass_b;
            let i_b = vc.inv_inertia_b;
            let point_count = vc.point_count;

            let mut v_a = velocities[vc.index_a].v;
            let mut w_a = velocities[vc.index_a].w;
            let mut v_b = velocities[vc.index_b].v;
            let mut w_b = velocities[vc.index_b].w;

            let normal = vc.normal;
            let tangent = vc.tangent;

            debug_assert!(point_count == 1 || point_count == 2);

            // Solve tangent constraints first because non-penetration is
            // more important than friction.
            for vcp in vc.points.iter_mut().take(point_count) {
                // Relative velocity at contact.
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, vcp.r_a);

                // Compute tangent impulse.
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let mut lambda = vcp.tangent_mass * (-vt);

                // Clamp the accumulated impulse.
                let max_friction = vc.friction * vcp.normal_impulse;
                let new_impulse =
                    (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;
                max_incremental_impulse = max_incremental_impulse.max(lambda.abs());

                // Apply contact impulse.
                let p = lambda * tangent;

                v_a -= m_a * p;
                w_a -= i_a * vcp.r_a.cross(p);

                v_b += m_b * p;
                w_b += i_b * vcp.r_b.cross(p);
            }

            // Solve normal constraints.
            if point_count == 1 || !vc.k_valid || !BLOCK_SOLVE {
                for vcp in vc.points.iter_mut().take(point_count) {
                    // Relative velocity at contact.
                    let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                        - v_a
                        - Vec2::scalar_cross(w_a, vcp.r_a);

                    // Compute normal impulse.
                    let vn = dv.dot(normal);
                    let mut lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                    // Clamp the accumulated impulse.
                    let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                    lambda = new_impulse - vcp.normal_impulse;
                    vcp.normal_impulse = new_impulse;
                    max_incremental_impulse = max_incremental_impulse.max(lambda.abs());

                    // Apply contact impulse.
                    let p = lambda * normal;

                    v_a -= m_a * p;
                    w_a -= i_a * vcp.r_a.cross(p);

                    v_b += m_b * p;
                    w_b += i_b * vcp.r_b.cross(p);
                }
            } else {
                // Block solver for the coupled two-point LCP:
                //
                // vn = K * x + b', x >= 0, vn >= 0, x . vn = 0
                //
                // Solved by total enumeration: each contact point is
                // either active (vn_i = 0) or inactive (x_i = 0), giving
                // four complementary cases; the first case whose solution
                // verifies is taken. The substitution x = a + d converts
                // between total and incremental impulses so the
                // accumulated impulse (not the increment) is what stays
                // non-negative.
                let cp1 = vc.points[0];
                let cp2 = vc.points[1];

                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                // Relative velocities at each contact point.
                let dv1 = v_b + Vec2::scalar_cross(w_b, cp1.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, cp1.r_a);
                let dv2 = v_b + Vec2::scalar_cross(w_b, cp2.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, cp2.r_a);

                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                // b' = b - K * a
                let mut b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias);
                b -= vc.k * a;

                let x = 'cases: {
                    // Case 1: both points active.
                    // x = -inv(K) * b'
                    let x = -(vc.normal_mass * b);
                    if x.x >= 0.0 && x.y >= 0.0 {
                        break 'cases Some(x);
                    }

                    // Case 2: point 1 active, point 2 inactive.
                    //   0 = k11 * x1 + b1'
                    // vn2 = k21 * x1 + b2'
                    let x = Vec2::new(-cp1.normal_mass * b.x, 0.0);
                    let vn2 = vc.k.col1.y * x.x + b.y;
                    if x.x >= 0.0 && vn2 >= 0.0 {
                        break 'cases Some(x);
                    }

                    // Case 3: point 2 active, point 1 inactive.
                    // vn1 = k12 * x2 + b1'
                    //   0 = k22 * x2 + b2'
                    let x = Vec2::new(0.0, -cp2.normal_mass * b.y);
                    let vn1 = vc.k.col2.x * x.y + b.x;
                    if x.y >= 0.0 && vn1 >= 0.0 {
                        break 'cases Some(x);
                    }

                    // Case 4: neither point active.
                    if b.x >= 0.0 && b.y >= 0.0 {
                        break 'cases Some(Vec2::ZERO);
                    }

                    // No case verified. This happens with a poorly
                    // conditioned mass matrix; keep the old impulses and
                    // let the next iteration try again.
                    None
                };

                match x {
                    Some(x) => {
                        // Incremental impulse.
                        let d = x - a;

                        let p1 = d.x * normal;
                        let p2 = d.y * normal;
                        v_a -= m_a * (p1 + p2);
                        w_a -= i_a * (cp1.r_a.cross(p1) + cp2.r_a.cross(p2));

                        v_b += m_b * (p1 + p2);
                        w_b += i_b * (cp1.r_b.cross(p1) + cp2.r_b.cross(p2));

                        vc.points[0].normal_impulse = x.x;
                        vc.points[1].normal_impulse = x.y;
                        max_incremental_impulse =
                            max_incremental_impulse.max(d.x.abs()).max(d.y.abs());
                    }
                    None => {
                        debug!("block solver found no valid case; impulses unchanged");
                    }
                }
            }

            velocities[vc.index_a].v = v_a;
            velocities[vc.index_a].w = w_a;
            velocities[vc.index_b].v = v_b;
            velocities[vc.index_b].w = w_b;
        }

        max_incremental_impulse
    }

    /// Write the accumulated impulses back to the manifolds for next
    /// step's warm start.
    pub fn store_impulses(&mut self) {
        for vc in self.velocity_constraints.iter() {
            let manifold = self.contacts[vc.contact_index].manifold_mut();
            for (mp, vcp) in manifold
                .points_mut()
                .iter_mut()
                .zip(vc.points.iter().take(vc.point_count))
            {
                mp.normal_impulse = vcp.normal_impulse;
                mp.tangent_impulse = vcp.tangent_impulse;
            }
        }
    }

    /// One pseudo-velocity iteration removing residual penetration.
    /// Returns the smallest separation seen, `+inf` when every point was
    /// skipped (nothing to do).
    pub fn solve_position_constraints(&mut self, positions: &mut [Position]) -> f32 {
        self.solve_position_constraints_impl(positions, BAUMGARTE, None)
    }

    /// TOI flavor: only the two bodies named may move; everything else in
    /// the island is pinned.
    pub fn solve_toi_position_constraints(
        &mut self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> f32 {
        self.solve_position_constraints_impl(
            positions,
            TOI_BAUMGARTE,
            Some((toi_index_a, toi_index_b)),
        )
    }

    fn solve_position_constraints_impl(
        &mut self,
        positions: &mut [Position],
        resolution_rate: f32,
        toi_movers: Option<(usize, usize)>,
    ) -> f32 {
        let mut min_separation = f32::INFINITY;

        for pc in self.position_constraints.iter() {
            let index_a = pc.index_a;
            let index_b = pc.index_b;

            // In TOI mode only the impact pair moves.
            let (m_a, i_a, m_b, i_b) = match toi_movers {
                None => (pc.inv_mass_a, pc.inv_inertia_a, pc.inv_mass_b, pc.inv_inertia_b),
                Some((toi_a, toi_b)) => {
                    let move_a = index_a == toi_a || index_a == toi_b;
                    let move_b = index_b == toi_a || index_b == toi_b;
                    (
                        if move_a { pc.inv_mass_a } else { 0.0 },
                        if move_a { pc.inv_inertia_a } else { 0.0 },
                        if move_b { pc.inv_mass_b } else { 0.0 },
                        if move_b { pc.inv_inertia_b } else { 0.0 },
                    )
                }
            };

            let mut c_a = positions[index_a].c;
            let mut a_a = positions[index_a].a;
            let mut c_b = positions[index_b].c;
            let mut a_b = positions[index_b].a;

            // Resolve the deepest point first; recomputing the geometry
            // after each push avoids over-correcting the other point.
            let mut order = [0usize, 1];
            if pc.point_count == 2 {
                let make_xf = |c: Vec2, a: f32, local_center: Vec2| {
                    let q = Rot::new(a);
                    Transform {
                        p: c - q * local_center,
                        q,
                    }
                };
                let xf_a = make_xf(c_a, a_a, pc.local_center_a);
                let xf_b = make_xf(c_b, a_b, pc.local_center_b);
                let s0 = PositionSolverManifold::new(pc, &xf_a, &xf_b, 0).separation;
                let s1 = PositionSolverManifold::new(pc, &xf_a, &xf_b, 1).separation;
                if s1 < s0 {
                    order = [1, 0];
                }
            }

            for &j in order.iter().take(pc.point_count) {
                let q_a = Rot::new(a_a);
                let xf_a = Transform {
                    p: c_a - q_a * pc.local_center_a,
                    q: q_a,
                };
                let q_b = Rot::new(a_b);
                let xf_b = Transform {
                    p: c_b - q_b * pc.local_center_b,
                    q: q_b,
                };

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);
                let normal = psm.normal;
                let point = psm.point;
                let separation = psm.separation;

                // A degenerate manifold produces no usable geometry.
                if !separation.is_finite() {
                    continue;
                }

                let r_a = point - c_a;
                let r_b = point - c_b;

                // Compute the effective mass.
                let rn_a = r_a.cross(normal);
                let rn_b = r_b.cross(normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                // Both bodies immovable: nothing this point can do.
                if k <= 0.0 {
                    continue;
                }

                // Track max constraint error.
                min_separation = min_separation.min(separation);

                // Prevent large corrections and allow slop.
                let c = (resolution_rate * (separation + LINEAR_SLOP))
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);

                let impulse = -c / k;
                let p = impulse * normal;

                c_a -= m_a * p;
                a_a -= i_a * r_a.cross(p);

                c_b += m_b * p;
                a_b += i_b * r_b.cross(p);
            }

            positions[index_a].c = c_a;
            positions[index_a].a = a_a;
            positions[index_b].c = c_b;
            positions[index_b].a = a_b;
        }

        // We can't expect min_separation >= -LINEAR_SLOP because we don't
        // push the separation above -LINEAR_SLOP.
        min_separation
    }

    /// Return the constraint buffers to the arena.
    pub fn recycle(self, arena: &mut StepArena) {
        arena.give_position_constraints(self.position_constraints);
        arena.give_velocity_constraints(self.velocity_constraints);
    }
}
