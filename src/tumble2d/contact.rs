use bitflags::bitflags;

use super::collide::{collide_circles, collide_polygon_circle, collide_polygons};
use super::collide_edge::{collide_edge_circle, collide_edge_polygon};
use super::common::VELOCITY_THRESHOLD;
use super::distance::{distance, DistanceInput, DistanceOutput, DistanceProxy, SimplexCache};
use super::manifold::Manifold;
use super::math::Transform;
use super::shape::Shape;

/// Friction mixing law: geometric mean, so a frictionless surface stays
/// frictionless against anything.
pub fn mix_friction(friction1: f32, friction2: f32) -> f32 {
    (friction1 * friction2).sqrt()
}

/// Restitution mixing law: the bouncier surface wins, so a bouncy ball
/// bounces on anything.
pub fn mix_restitution(restitution1: f32, restitution2: f32) -> f32 {
    restitution1.max(restitution2)
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ContactFlags: u32 {
        const ISLAND = 0x0001;
        const TOUCHING = 0x0002;
        const ENABLED = 0x0004;
        /// A valid cached TOI is stored on the contact.
        const TOI = 0x0008;
    }
}

/// The narrow-phase record for one shape pair. The pair list owns these;
/// the solver core fills in the manifold and simplex cache and reads the
/// rest. Bodies are referenced by island index, never by owning handle.
#[derive(Clone, Debug)]
pub struct Contact {
    pub flags: ContactFlags,

    /// Island index of the first body.
    pub body_a: usize,
    /// Island index of the second body.
    pub body_b: usize,

    /// Chain child indices; zero for single-child shapes.
    pub child_a: usize,
    pub child_b: usize,

    manifold: Manifold,
    /// Warm start for the distance query on this pair.
    pub cache: SimplexCache,

    /// Combined skin radii, captured from the shapes at update time.
    pub radius_a: f32,
    pub radius_b: f32,

    pub friction: f32,
    pub restitution: f32,
    pub restitution_threshold: f32,
    /// Conveyor-belt style surface speed along the tangent.
    pub tangent_speed: f32,

    /// Number of TOI sub-steps spent on this contact this step.
    pub toi_count: u32,
    /// Cached TOI, valid while the TOI flag is set.
    pub toi: f32,
}

impl Contact {
    pub fn new(body_a: usize, body_b: usize, friction: f32, restitution: f32) -> Self {
        Self {
            flags: ContactFlags::ENABLED,
            body_a,
            body_b,
            child_a: 0,
            child_b: 0,
            manifold: Manifold::Unset,
            cache: SimplexCache::default(),
            radius_a: 0.0,
            radius_b: 0.0,
            friction,
            restitution,
            restitution_threshold: VELOCITY_THRESHOLD,
            tangent_speed: 0.0,
            toi_count: 0,
            toi: 0.0,
        }
    }

    /// Get the contact manifold. Do not modify the manifold unless you
    /// understand the internals of the solver.
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub fn manifold_mut(&mut self) -> &mut Manifold {
        &mut self.manifold
    }

    #[inline]
    pub fn is_touching(&self) -> bool {
        self.flags.contains(ContactFlags::TOUCHING)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(ContactFlags::ENABLED)
    }

    /// Generate the manifold for a shape pair at the given transforms.
    /// Pairs the narrow phase has no generator for produce `Unset`.
    pub fn evaluate(
        &self,
        shape_a: &Shape,
        xf_a: &Transform,
        shape_b: &Shape,
        xf_b: &Transform,
    ) -> Manifold {
        match (shape_a, shape_b) {
            (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
            (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_circle(a, xf_a, b, xf_b),
            (Shape::Circle(a), Shape::Polygon(b)) => {
                collide_polygon_circle(b, xf_b, a, xf_a).swapped()
            }
            (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
            (Shape::Edge(a), Shape::Circle(b)) => collide_edge_circle(a, xf_a, b, xf_b),
            (Shape::Circle(a), Shape::Edge(b)) => {
                collide_edge_circle(b, xf_b, a, xf_a).swapped()
            }
            (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_polygon(a, xf_a, b, xf_b),
            (Shape::Polygon(a), Shape::Edge(b)) => {
                collide_edge_polygon(b, xf_b, a, xf_a).swapped()
            }
            (Shape::Chain(a), b) => {
                let edge = Shape::Edge(a.child_edge(self.child_a));
                self.evaluate(&edge, xf_a, b, xf_b)
            }
            (a, Shape::Chain(b)) => {
                let edge = Shape::Edge(b.child_edge(self.child_b));
                self.evaluate(a, xf_a, &edge, xf_b)
            }
            // Edge-edge contact is not supported; edges are static
            // geometry and do not collide with each other.
            (Shape::Edge(_), Shape::Edge(_)) => Manifold::Unset,
        }
    }

    /// Surface distance between the pair at the given transforms, warm
    /// started from (and feeding) the cache this contact owns.
    pub fn distance(
        &mut self,
        proxy_a: DistanceProxy,
        xf_a: &Transform,
        proxy_b: DistanceProxy,
        xf_b: &Transform,
    ) -> DistanceOutput {
        distance(
            &mut self.cache,
            &DistanceInput {
                proxy_a,
                transform_a: *xf_a,
                proxy_b,
                transform_b: *xf_b,
                use_radii: true,
            },
        )
    }

    /// Refresh the manifold from the current transforms, carrying cached
    /// impulses over to points whose contact features persist.
    pub fn update(
        &mut self,
        shape_a: &Shape,
        xf_a: &Transform,
        shape_b: &Shape,
        xf_b: &Transform,
    ) {
        let mut new_manifold = self.evaluate(shape_a, xf_a, shape_b, xf_b);
        new_manifold.transfer_impulses(&self.manifold);
        self.manifold = new_manifold;

        self.radius_a = match shape_a {
            Shape::Chain(chain) => chain.child_edge(self.child_a).radius,
            other => other.radius(),
        };
        self.radius_b = match shape_b {
            Shape::Chain(chain) => chain.child_edge(self.child_b).radius,
            other => other.radius(),
        };

        self.flags.set(ContactFlags::TOUCHING, self.manifold.is_set());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tumble2d::math::Vec2;
    use crate::tumble2d::shape::{CircleShape, PolygonShape};

    #[test]
    fn friction_and_restitution_mixing() {
        assert_eq!(mix_friction(0.0, 1.0), 0.0);
        assert!((mix_friction(0.5, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(mix_restitution(0.2, 0.8), 0.8);
    }

    #[test]
    fn update_sets_touching_and_transfers_impulses() {
        let a = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let b = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(0.0, 1.99), 0.0);

        let mut contact = Contact::new(0, 1, 0.5, 0.0);
        contact.update(&a, &xf_a, &b, &xf_b);
        assert!(contact.is_touching());
        assert_eq!(contact.manifold().point_count(), 2);

        // Simulate a solve writing impulses, then refresh at a slightly
        // moved transform. The features persist, so the impulses do too.
        for p in contact.manifold_mut().points_mut() {
            p.normal_impulse = 1.5;
        }
        let xf_b2 = Transform::new(Vec2::new(0.001, 1.99), 0.0);
        contact.update(&a, &xf_a, &b, &xf_b2);
        assert!(contact.is_touching());
        for p in contact.manifold().points() {
            assert_eq!(p.normal_impulse, 1.5);
        }
    }

    #[test]
    fn update_clears_touching_when_separated() {
        let a = Shape::Circle(CircleShape::new(0.5));
        let b = Shape::Circle(CircleShape::new(0.5));
        let mut contact = Contact::new(0, 1, 0.5, 0.0);
        contact.update(
            &a,
            &Transform::IDENTITY,
            &b,
            &Transform::new(Vec2::new(0.9, 0.0), 0.0),
        );
        assert!(contact.is_touching());
        contact.update(
            &a,
            &Transform::IDENTITY,
            &b,
            &Transform::new(Vec2::new(3.0, 0.0), 0.0),
        );
        assert!(!contact.is_touching());
        assert_eq!(contact.manifold().point_count(), 0);
    }

    #[test]
    fn pair_distance_uses_owned_cache() {
        let a = CircleShape::new(0.5);
        let b = CircleShape::new(0.5);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(3.0, 0.0), 0.0);

        let mut contact = Contact::new(0, 1, 0.5, 0.0);
        assert_eq!(contact.cache.count, 0);
        let out = contact.distance(a.distance_proxy(), &xf_a, b.distance_proxy(), &xf_b);
        assert!((out.distance - 2.0).abs() < 1e-5);
        // The query warm-started the pair's cache for next time.
        assert!(contact.cache.count >= 1);
    }

    #[test]
    fn swapped_pair_orders_produce_mirrored_manifolds() {
        let poly = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let circle = Shape::Circle(CircleShape::new(0.5));
        let xf_p = Transform::IDENTITY;
        let xf_c = Transform::new(Vec2::new(0.0, 1.1), 0.0);

        let contact = Contact::new(0, 1, 0.5, 0.0);
        let pc = contact.evaluate(&poly, &xf_p, &circle, &xf_c);
        let cp = contact.evaluate(&circle, &xf_c, &poly, &xf_p);
        assert!(matches!(pc, Manifold::FaceA(_)));
        assert!(matches!(cp, Manifold::FaceB(_)));
        assert_eq!(pc.point_count(), cp.point_count());
    }
}
