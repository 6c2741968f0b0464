use tracing::debug;

use super::common::{
    LINEAR_SLOP, MAX_POLYGON_VERTICES, MAX_TOI_ITERATIONS, MAX_TOI_ROOT_ITER_COUNT,
};
use super::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use super::math::{Sweep, Vec2};

/// Input parameters for `time_of_impact`: two proxies swept over the
/// fraction range `[0, t_max]` of the current step.
#[derive(Clone, Copy, Debug)]
pub struct ToiInput<'a> {
    pub proxy_a: DistanceProxy<'a>,
    pub sweep_a: Sweep,
    pub proxy_b: DistanceProxy<'a>,
    pub sweep_b: Sweep,
    pub t_max: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToiState {
    Unknown,
    /// The proxies were already overlapping at the start of the range.
    /// The caller should disable continuous collision for this pair.
    Overlapped,
    /// The witness separation entered the target band at `t`.
    Touching,
    /// The proxies stay separated over the whole range.
    Separated,
    /// The root finder ran out of iterations. `t` is the last time known
    /// to be safe; callers treat this conservatively as touching there.
    Failed,
}

#[derive(Clone, Copy, Debug)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
}

type IndexPair = (usize, usize);

enum SeparationKind {
    /// One witness vertex on each proxy.
    Points,
    /// Two witness vertices on A: the axis is a face of A.
    FaceA,
    /// Two witness vertices on B: the axis is a face of B.
    FaceB,
}

/// An axis built from the terminating GJK simplex, along which the
/// separation of the swept proxies can be evaluated cheaply at any time.
/// The minimum over witness pairs lower-bounds the true distance, so
/// advancing to a root of this function can only underestimate the
/// impact time.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy<'a>,
    proxy_b: &'a DistanceProxy<'a>,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    /// Separation axis; local to the face owner for face kinds, world
    /// for the points kind.
    axis: Vec2,
    /// Face midpoint, local to the face owner. Unused for points.
    local_point: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy<'a>,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy<'a>,
        sweep_b: Sweep,
        t1: f32,
    ) -> Self {
        debug_assert!(cache.count >= 1 && cache.count <= 3);

        let xf_a = sweep_a.get_transform(t1);
        let xf_b = sweep_b.get_transform(t1);

        if cache.count == 1 {
            // Vertex versus vertex.
            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_a = xf_a.mul_vec2(local_point_a);
            let point_b = xf_b.mul_vec2(local_point_b);
            return Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::Points,
                axis: (point_b - point_a).normalize(),
                local_point: Vec2::ZERO,
            };
        }

        if cache.index_a[0] == cache.index_a[1] {
            // Two points on B and one on A.
            let local_point_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_point_b2 = proxy_b.vertex(cache.index_b[1] as usize);

            let mut axis = (local_point_b2 - local_point_b1).cross_scalar(1.0).normalize();
            let normal = xf_b.q * axis;

            let local_point = 0.5 * (local_point_b1 + local_point_b2);
            let point_b = xf_b.mul_vec2(local_point);

            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let point_a = xf_a.mul_vec2(local_point_a);

            if (point_a - point_b).dot(normal) < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceB,
                axis,
                local_point,
            }
        } else {
            // Two points on A and one or two points on B.
            let local_point_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_a2 = proxy_a.vertex(cache.index_a[1] as usize);

            let mut axis = (local_point_a2 - local_point_a1).cross_scalar(1.0).normalize();
            let normal = xf_a.q * axis;

            let local_point = 0.5 * (local_point_a1 + local_point_a2);
            let point_a = xf_a.mul_vec2(local_point);

            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_b = xf_b.mul_vec2(local_point_b);

            if (point_b - point_a).dot(normal) < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceA,
                axis,
                local_point,
            }
        }
    }

    /// Find the witness pair minimizing the separation at time `t`.
    fn find_min_separation(&self, t: f32) -> (IndexPair, f32) {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);

        match self.kind {
            SeparationKind::Points => {
                let index_a = self.proxy_a.support_index(xf_a.q.mul_t_vec2(self.axis));
                let index_b = self.proxy_b.support_index(xf_b.q.mul_t_vec2(-self.axis));
                let point_a = xf_a.mul_vec2(self.proxy_a.vertex(index_a));
                let point_b = xf_b.mul_vec2(self.proxy_b.vertex(index_b));
                ((index_a, index_b), (point_b - point_a).dot(self.axis))
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q * self.axis;
                let point_a = xf_a.mul_vec2(self.local_point);
                let index_b = self.proxy_b.support_index(xf_b.q.mul_t_vec2(-normal));
                let point_b = xf_b.mul_vec2(self.proxy_b.vertex(index_b));
                ((usize::MAX, index_b), (point_b - point_a).dot(normal))
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q * self.axis;
                let point_b = xf_b.mul_vec2(self.local_point);
                let index_a = self.proxy_a.support_index(xf_a.q.mul_t_vec2(-normal));
                let point_a = xf_a.mul_vec2(self.proxy_a.vertex(index_a));
                ((index_a, usize::MAX), (point_a - point_b).dot(normal))
            }
        }
    }

    /// Separation of a fixed witness pair at time `t`.
    fn evaluate(&self, index_pair: IndexPair, t: f32) -> f32 {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);

        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.mul_vec2(self.proxy_a.vertex(index_pair.0));
                let point_b = xf_b.mul_vec2(self.proxy_b.vertex(index_pair.1));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q * self.axis;
                let point_a = xf_a.mul_vec2(self.local_point);
                let point_b = xf_b.mul_vec2(self.proxy_b.vertex(index_pair.1));
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q * self.axis;
                let point_b = xf_b.mul_vec2(self.local_point);
                let point_a = xf_a.mul_vec2(self.proxy_a.vertex(index_pair.0));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Compute the upper bound on time before two swept shapes come within a
/// target separation of each other. CCD via the local separating axis
/// method: each outer iteration computes a fresh separating axis at the
/// safe time `t1` and advances it as far as the axis stays conservative.
///
/// The target band is derived from the combined skin radius so the
/// shapes end up touching but not overlapping, leaving room for the
/// position solver.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let mut output = ToiOutput {
        state: ToiState::Unknown,
        t: input.t_max,
    };

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    // Large rotations can make the root finder fail, so normalize the
    // sweep angles.
    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius() + proxy_b.radius();
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);
    let min_target = target - tolerance;
    let max_target = target + tolerance;

    let mut t1 = 0.0;
    let mut iter = 0;

    // Prepare input for distance query.
    let mut cache = SimplexCache::default();

    // The outer loop progressively attempts to compute new separating
    // axes. This loop terminates when an axis is repeated (no progress is
    // made).
    loop {
        let xf_a = sweep_a.get_transform(t1);
        let xf_b = sweep_b.get_transform(t1);

        // Get the distance between shapes. We can also use the results to
        // get a separating axis.
        let distance_output = distance(
            &mut cache,
            &DistanceInput {
                proxy_a: *proxy_a,
                transform_a: xf_a,
                proxy_b: *proxy_b,
                transform_b: xf_b,
                use_radii: false,
            },
        );

        // If the shapes are overlapped, we give up on continuous collision.
        if distance_output.distance <= 0.0 {
            // Failure!
            output = ToiOutput {
                state: ToiState::Overlapped,
                t: 0.0,
            };
            break;
        }

        if distance_output.distance < max_target {
            // Victory!
            output = ToiOutput {
                state: ToiState::Touching,
                t: t1,
            };
            break;
        }

        // Initialize the separating axis.
        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Compute the TOI on the separating axis. We do this by
        // successively resolving the deepest point. This loop is bounded
        // by the number of vertices.
        let mut done = false;
        let mut t2 = t_max;
        for _push_back_iter in 0..MAX_POLYGON_VERTICES {
            // Find the deepest point at t2. Store the witness point
            // indices.
            let (index_pair, mut s2) = fcn.find_min_separation(t2);

            // Is the final configuration separated?
            if s2 > max_target {
                // Victory!
                output = ToiOutput {
                    state: ToiState::Separated,
                    t: t2,
                };
                done = true;
                break;
            }

            // Has the separation reached tolerance?
            if s2 > min_target {
                // Advance the sweeps; a new axis is needed.
                t1 = t2;
                break;
            }

            // Compute the initial separation of the witness points.
            let mut s1 = fcn.evaluate(index_pair, t1);

            // Check for initial overlap. This might happen if the root
            // finder runs out of iterations.
            if s1 < min_target {
                output = ToiOutput {
                    state: ToiState::Failed,
                    t: t1,
                };
                done = true;
                break;
            }

            // Check for touching.
            if s1 <= max_target {
                // Victory! t1 should hold the TOI (could be 0.0).
                output = ToiOutput {
                    state: ToiState::Touching,
                    t: t1,
                };
                done = true;
                break;
            }

            // Compute 1D root of: f(t) - target = 0.
            // Odd iterations take the secant step for convergence; even
            // iterations bisect to guarantee progress.
            let mut root_iter_count = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                let t = if root_iter_count & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };
                root_iter_count += 1;

                let s = fcn.evaluate(index_pair, t);

                if (s - target).abs() < tolerance {
                    // t2 holds a tentative value for t1.
                    t2 = t;
                    break;
                }

                // Ensure we continue to bracket the root.
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iter_count >= MAX_TOI_ROOT_ITER_COUNT {
                    break;
                }
            }
        }

        iter += 1;

        if done {
            break;
        }

        if iter == MAX_TOI_ITERATIONS {
            // Root finder got stuck. Semi-victory: t1 is safe.
            debug!(
                "time_of_impact exhausted {} iterations at t1={}",
                MAX_TOI_ITERATIONS, t1
            );
            output = ToiOutput {
                state: ToiState::Failed,
                t: t1,
            };
            break;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tumble2d::shape::{CircleShape, PolygonShape};

    fn stationary_sweep(position: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: position,
            c: position,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    fn linear_sweep(from: Vec2, to: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: from,
            c: to,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    #[test]
    fn bullet_disk_hits_stationary_disk() {
        let a = CircleShape::new(0.1);
        let b = CircleShape::new(0.1);
        let out = time_of_impact(&ToiInput {
            proxy_a: a.distance_proxy(),
            sweep_a: linear_sweep(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)),
            proxy_b: b.distance_proxy(),
            sweep_b: stationary_sweep(Vec2::ZERO),
            t_max: 1.0,
        });
        assert_eq!(out.state, ToiState::Touching);
        // Centers close at 10 m per unit time from a 5 m gap; contact at
        // the target separation just inside the combined radius.
        let target = (0.2_f32 - 3.0 * LINEAR_SLOP).max(LINEAR_SLOP);
        let expected = (5.0 - target) / 10.0;
        assert!((out.t - expected).abs() < 0.25 * LINEAR_SLOP / 10.0 + 1e-4);
    }

    #[test]
    fn miss_reports_separated() {
        let a = CircleShape::new(0.1);
        let b = CircleShape::new(0.1);
        let out = time_of_impact(&ToiInput {
            proxy_a: a.distance_proxy(),
            sweep_a: linear_sweep(Vec2::new(-5.0, 2.0), Vec2::new(5.0, 2.0)),
            proxy_b: b.distance_proxy(),
            sweep_b: stationary_sweep(Vec2::ZERO),
            t_max: 1.0,
        });
        assert_eq!(out.state, ToiState::Separated);
        assert!((out.t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn initial_overlap_reports_overlapped() {
        let a = PolygonShape::new_box(0.5, 0.5);
        let b = PolygonShape::new_box(0.5, 0.5);
        let out = time_of_impact(&ToiInput {
            proxy_a: a.distance_proxy(),
            sweep_a: linear_sweep(Vec2::new(0.1, 0.0), Vec2::new(5.0, 0.0)),
            proxy_b: b.distance_proxy(),
            sweep_b: stationary_sweep(Vec2::ZERO),
            t_max: 1.0,
        });
        assert_eq!(out.state, ToiState::Overlapped);
        assert_eq!(out.t, 0.0);
    }

    #[test]
    fn deep_circle_overlap_touches_at_start() {
        // Single-vertex proxies never contain the origin, so deep circle
        // overlap reports touching at the start of the range instead.
        let a = CircleShape::new(0.5);
        let b = CircleShape::new(0.5);
        let out = time_of_impact(&ToiInput {
            proxy_a: a.distance_proxy(),
            sweep_a: linear_sweep(Vec2::new(0.1, 0.0), Vec2::new(5.0, 0.0)),
            proxy_b: b.distance_proxy(),
            sweep_b: stationary_sweep(Vec2::ZERO),
            t_max: 1.0,
        });
        assert_eq!(out.state, ToiState::Touching);
        assert_eq!(out.t, 0.0);
    }

    #[test]
    fn toi_is_monotone_in_t_max() {
        let a = PolygonShape::new_box(0.1, 0.1);
        let b = PolygonShape::new_box(0.5, 0.5);
        let sweep_a = linear_sweep(Vec2::new(-4.0, 0.0), Vec2::new(4.0, 0.0));
        let sweep_b = stationary_sweep(Vec2::ZERO);

        let full = time_of_impact(&ToiInput {
            proxy_a: a.distance_proxy(),
            sweep_a,
            proxy_b: b.distance_proxy(),
            sweep_b,
            t_max: 1.0,
        });
        assert_eq!(full.state, ToiState::Touching);

        let mut previous = 0.0;
        for i in 1..=4 {
            let t_max = 0.25 * i as f32;
            let out = time_of_impact(&ToiInput {
                proxy_a: a.distance_proxy(),
                sweep_a,
                proxy_b: b.distance_proxy(),
                sweep_b,
                t_max,
            });
            assert_ne!(out.state, ToiState::Failed);
            assert!(out.t >= previous - 1e-6);
            assert!(out.t <= full.t.max(t_max) + 1e-6);
            previous = out.t;
        }
    }

    #[test]
    fn rotating_box_catches_passing_disk() {
        // A long thin box spinning half a turn sweeps a disk passing
        // alongside; the pure linear poses never touch.
        let blade = PolygonShape::new_box(1.5, 0.05);
        let disk = CircleShape::new(0.1);
        let mut sweep_a = stationary_sweep(Vec2::ZERO);
        sweep_a.a = std::f32::consts::PI;
        let out = time_of_impact(&ToiInput {
            proxy_a: blade.distance_proxy(),
            sweep_a,
            proxy_b: disk.distance_proxy(),
            sweep_b: stationary_sweep(Vec2::new(0.0, 1.0)),
            t_max: 1.0,
        });
        assert_eq!(out.state, ToiState::Touching);
        assert!(out.t > 0.0 && out.t < 1.0);
    }
}
