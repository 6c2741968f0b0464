use super::common::MAX_MANIFOLD_POINTS;
use super::math::{Transform, UnitVec2, Vec2};

/// The features that intersect to form the contact point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactFeatureType {
    Vertex,
    Face,
}

/// Identifies the pair of topological elements (a vertex or face on each
/// shape) that produced a contact point. Points with equal features are
/// the same contact across frames, which is what warm starting keys on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactFeature {
    pub type_a: ContactFeatureType,
    pub type_b: ContactFeatureType,
    /// Feature index on shape A.
    pub index_a: u8,
    /// Feature index on shape B.
    pub index_b: u8,
}

impl ContactFeature {
    pub const fn vertex_vertex(index_a: u8, index_b: u8) -> Self {
        Self {
            type_a: ContactFeatureType::Vertex,
            type_b: ContactFeatureType::Vertex,
            index_a,
            index_b,
        }
    }

    pub const fn face_vertex(index_a: u8, index_b: u8) -> Self {
        Self {
            type_a: ContactFeatureType::Face,
            type_b: ContactFeatureType::Vertex,
            index_a,
            index_b,
        }
    }

    pub const fn vertex_face(index_a: u8, index_b: u8) -> Self {
        Self {
            type_a: ContactFeatureType::Vertex,
            type_b: ContactFeatureType::Face,
            index_a,
            index_b,
        }
    }

    /// The same feature with the A and B sides exchanged.
    pub const fn swapped(self) -> Self {
        Self {
            type_a: self.type_b,
            type_b: self.type_a,
            index_a: self.index_b,
            index_b: self.index_a,
        }
    }

    /// Order-independent equality: features match if equal outright or
    /// equal after exchanging sides.
    pub fn matches(&self, other: &Self) -> bool {
        *self == *other || *self == other.swapped()
    }
}

/// A contact point belonging to a contact manifold. It holds details
/// related to the geometry and dynamics of the contact points.
/// The local point usage depends on the manifold type:
/// - circles: the local center of circle B
/// - face A: the local center of circle B or the clip point of polygon B
/// - face B: the clip point of polygon A
/// This structure is stored across time steps, so we keep it small.
/// Note: the impulses are used for internal caching and may not
/// provide reliable contact forces, especially for high speed collisions.
#[derive(Clone, Copy, Debug)]
pub struct ManifoldPoint {
    /// Usage depends on manifold type.
    pub local_point: Vec2,
    /// Uniquely identifies a contact point between two shapes.
    pub feature: ContactFeature,
    /// The non-penetration impulse.
    pub normal_impulse: f32,
    /// The friction impulse.
    pub tangent_impulse: f32,
}

impl ManifoldPoint {
    pub fn new(local_point: Vec2, feature: ContactFeature) -> Self {
        Self {
            local_point,
            feature,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
        }
    }
}

/// The shared frame and point set of a face-type manifold.
#[derive(Clone, Copy, Debug)]
pub struct FaceManifold {
    /// The outward normal of the reference face, in the face owner's
    /// local frame.
    pub local_normal: UnitVec2,
    /// The center of the reference face, in the face owner's local frame.
    pub local_point: Vec2,
    points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    count: u8,
}

impl FaceManifold {
    pub fn new(local_normal: UnitVec2, local_point: Vec2) -> Self {
        const EMPTY: ManifoldPoint = ManifoldPoint {
            local_point: Vec2::INVALID,
            feature: ContactFeature::vertex_vertex(0, 0),
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
        };
        Self {
            local_normal,
            local_point,
            points: [EMPTY; MAX_MANIFOLD_POINTS],
            count: 0,
        }
    }

    pub fn with_point(local_normal: UnitVec2, local_point: Vec2, p1: ManifoldPoint) -> Self {
        let mut m = Self::new(local_normal, local_point);
        m.add_point(p1);
        m
    }

    pub fn with_points(
        local_normal: UnitVec2,
        local_point: Vec2,
        p1: ManifoldPoint,
        p2: ManifoldPoint,
    ) -> Self {
        let mut m = Self::new(local_normal, local_point);
        m.add_point(p1);
        m.add_point(p2);
        m
    }

    pub fn add_point(&mut self, point: ManifoldPoint) {
        debug_assert!((self.count as usize) < MAX_MANIFOLD_POINTS);
        self.points[self.count as usize] = point;
        self.count += 1;
    }

    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.count as usize]
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.count as usize]
    }
}

/// A manifold for two touching convex shapes, expressed as one of:
/// - point versus point with radius (circles),
/// - clip point versus plane with radius (face A or face B).
/// Contacts are stored in local coordinates so that position correction
/// can account for movement, which is critical for continuous physics.
/// All contact scenarios must be expressed in one of these types.
/// This structure is stored across time steps, so we keep it small.
#[derive(Clone, Copy, Debug, Default)]
pub enum Manifold {
    /// No contact. Point data is undefined and all other properties are
    /// invalid.
    #[default]
    Unset,
    /// Circle-to-circle like collision. The local point is the local
    /// center of "circle" A; there is exactly one contact point and no
    /// meaningful normal direction in either local frame.
    Circles {
        local_point: Vec2,
        point: ManifoldPoint,
    },
    /// The reference face is on shape A.
    FaceA(FaceManifold),
    /// The reference face is on shape B.
    FaceB(FaceManifold),
}

impl Manifold {
    /// A circles-type manifold from the two local centers and the vertex
    /// indices they correspond to.
    pub fn for_circles(local_a: Vec2, index_a: u8, local_b: Vec2, index_b: u8) -> Self {
        Manifold::Circles {
            local_point: local_a,
            point: ManifoldPoint::new(local_b, ContactFeature::vertex_vertex(index_a, index_b)),
        }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        !matches!(self, Manifold::Unset)
    }

    pub fn point_count(&self) -> usize {
        match self {
            Manifold::Unset => 0,
            Manifold::Circles { .. } => 1,
            Manifold::FaceA(f) | Manifold::FaceB(f) => f.points().len(),
        }
    }

    pub fn points(&self) -> &[ManifoldPoint] {
        match self {
            Manifold::Unset => &[],
            Manifold::Circles { point, .. } => std::slice::from_ref(point),
            Manifold::FaceA(f) | Manifold::FaceB(f) => f.points(),
        }
    }

    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        match self {
            Manifold::Unset => &mut [],
            Manifold::Circles { point, .. } => std::slice::from_mut(point),
            Manifold::FaceA(f) | Manifold::FaceB(f) => f.points_mut(),
        }
    }

    /// The reference-face normal in the face owner's frame; invalid for
    /// unset and circles manifolds.
    pub fn local_normal(&self) -> UnitVec2 {
        match self {
            Manifold::FaceA(f) | Manifold::FaceB(f) => f.local_normal,
            _ => UnitVec2::INVALID,
        }
    }

    /// Circle center of A, or reference-face center; invalid when unset.
    pub fn local_point(&self) -> Vec2 {
        match self {
            Manifold::Unset => Vec2::INVALID,
            Manifold::Circles { local_point, .. } => *local_point,
            Manifold::FaceA(f) | Manifold::FaceB(f) => f.local_point,
        }
    }

    /// The same contact described with the A and B roles exchanged:
    /// face sides relabel, every feature swaps sides. Local data does not
    /// change frames, because each datum stays with the shape owning it.
    pub fn swapped(&self) -> Manifold {
        fn swap_points(f: &FaceManifold) -> FaceManifold {
            let mut out = FaceManifold::new(f.local_normal, f.local_point);
            for p in f.points() {
                out.add_point(ManifoldPoint {
                    feature: p.feature.swapped(),
                    ..*p
                });
            }
            out
        }
        match self {
            Manifold::Unset => Manifold::Unset,
            Manifold::Circles { local_point, point } => Manifold::Circles {
                local_point: point.local_point,
                point: ManifoldPoint {
                    local_point: *local_point,
                    feature: point.feature.swapped(),
                    normal_impulse: point.normal_impulse,
                    tangent_impulse: point.tangent_impulse,
                },
            },
            Manifold::FaceA(f) => Manifold::FaceB(swap_points(f)),
            Manifold::FaceB(f) => Manifold::FaceA(swap_points(f)),
        }
    }

    /// Carry the cached impulses of `old` over to the matching points of
    /// this manifold. Points are matched by contact feature, order
    /// independent; unmatched points keep zero impulses. This is what
    /// preserves stacking stability across steps.
    pub fn transfer_impulses(&mut self, old: &Manifold) {
        for new_point in self.points_mut() {
            if let Some(old_point) = old
                .points()
                .iter()
                .find(|op| op.feature.matches(&new_point.feature))
            {
                new_point.normal_impulse = old_point.normal_impulse;
                new_point.tangent_impulse = old_point.tangent_impulse;
            }
        }
    }
}

/// A manifold evaluated at a pair of world transforms: world normal,
/// world contact points, and signed separations (negative is overlap).
#[derive(Clone, Copy, Debug)]
pub struct WorldManifold {
    /// World vector pointing from A to B.
    pub normal: Vec2,
    /// World contact points (points of intersection).
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// A negative value indicates overlap, in meters.
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    pub fn new(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f32,
        xf_b: &Transform,
        radius_b: f32,
    ) -> Self {
        let mut out = Self {
            normal: Vec2::ZERO,
            points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
            separations: [0.0; MAX_MANIFOLD_POINTS],
        };

        match manifold {
            Manifold::Unset => {}
            Manifold::Circles { local_point, point } => {
                let point_a = xf_a.mul_vec2(*local_point);
                let point_b = xf_b.mul_vec2(point.local_point);
                // Coincident centers have no direction; fall back to +X.
                let mut normal = Vec2::new(1.0, 0.0);
                if point_a.distance_squared(point_b) > f32::EPSILON * f32::EPSILON {
                    normal = (point_b - point_a).normalize();
                }
                let c_a = point_a + radius_a * normal;
                let c_b = point_b - radius_b * normal;
                out.normal = normal;
                out.points[0] = 0.5 * (c_a + c_b);
                out.separations[0] = (c_b - c_a).dot(normal);
            }
            Manifold::FaceA(f) => {
                let normal = (xf_a.q * f.local_normal).as_vec2();
                let plane_point = xf_a.mul_vec2(f.local_point);
                for (i, p) in f.points().iter().enumerate() {
                    let clip_point = xf_b.mul_vec2(p.local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(normal)) * normal;
                    let c_b = clip_point - radius_b * normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_b - c_a).dot(normal);
                }
                out.normal = normal;
            }
            Manifold::FaceB(f) => {
                let normal = (xf_b.q * f.local_normal).as_vec2();
                let plane_point = xf_b.mul_vec2(f.local_point);
                for (i, p) in f.points().iter().enumerate() {
                    let clip_point = xf_a.mul_vec2(p.local_point);
                    let c_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_a - c_b).dot(normal);
                }
                // Ensure normal points from A to B.
                out.normal = -normal;
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_matching_is_order_independent() {
        let a = ContactFeature::face_vertex(3, 0);
        let b = ContactFeature::vertex_face(0, 3);
        assert!(a.matches(&b));
        assert!(b.matches(&a));
        assert!(!a.matches(&ContactFeature::face_vertex(2, 0)));
    }

    #[test]
    fn circles_manifold_shape() {
        let m = Manifold::for_circles(Vec2::ZERO, 0, Vec2::new(1.5, 0.0), 0);
        assert_eq!(m.point_count(), 1);
        assert!(!m.local_normal().is_valid());
        assert_eq!(m.local_point(), Vec2::ZERO);
        let p = &m.points()[0];
        assert_eq!(p.feature, ContactFeature::vertex_vertex(0, 0));
    }

    #[test]
    fn unset_manifold_is_empty() {
        let m = Manifold::Unset;
        assert_eq!(m.point_count(), 0);
        assert!(!m.is_set());
        assert!(!m.local_point().is_valid());
    }

    #[test]
    fn swapped_roundtrips() {
        let m = Manifold::FaceA(FaceManifold::with_points(
            UnitVec2::UP,
            Vec2::new(0.0, 1.0),
            ManifoldPoint::new(Vec2::new(-0.5, -1.0), ContactFeature::face_vertex(2, 0)),
            ManifoldPoint::new(Vec2::new(0.5, -1.0), ContactFeature::face_vertex(2, 1)),
        ));
        let back = m.swapped().swapped();
        assert_eq!(m.point_count(), back.point_count());
        for (p, q) in m.points().iter().zip(back.points()) {
            assert_eq!(p.feature, q.feature);
            assert_eq!(p.local_point, q.local_point);
        }
        assert!(matches!(m.swapped(), Manifold::FaceB(_)));
    }

    #[test]
    fn impulse_transfer_matches_features() {
        let mut old = Manifold::FaceA(FaceManifold::with_points(
            UnitVec2::UP,
            Vec2::ZERO,
            ManifoldPoint::new(Vec2::ZERO, ContactFeature::face_vertex(1, 0)),
            ManifoldPoint::new(Vec2::ZERO, ContactFeature::face_vertex(1, 1)),
        ));
        old.points_mut()[0].normal_impulse = 2.0;
        old.points_mut()[0].tangent_impulse = 0.5;
        old.points_mut()[1].normal_impulse = 3.0;

        // New manifold keeps one feature, replaces the other.
        let mut new = Manifold::FaceA(FaceManifold::with_points(
            UnitVec2::UP,
            Vec2::ZERO,
            ManifoldPoint::new(Vec2::ZERO, ContactFeature::face_vertex(1, 1)),
            ManifoldPoint::new(Vec2::ZERO, ContactFeature::face_vertex(1, 2)),
        ));
        new.transfer_impulses(&old);
        assert_eq!(new.points()[0].normal_impulse, 3.0);
        assert_eq!(new.points()[1].normal_impulse, 0.0);

        // A swapped old manifold still matches.
        let mut swapped_new = new.swapped();
        for p in swapped_new.points_mut() {
            p.normal_impulse = 0.0;
        }
        swapped_new.transfer_impulses(&old);
        assert_eq!(swapped_new.points()[0].normal_impulse, 3.0);
    }

    #[test]
    fn world_manifold_for_circles() {
        let m = Manifold::for_circles(Vec2::ZERO, 0, Vec2::ZERO, 0);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(1.5, 0.0), 0.0);
        let wm = WorldManifold::new(&m, &xf_a, 1.0, &xf_b, 1.0);
        assert_eq!(wm.normal, Vec2::new(1.0, 0.0));
        assert!((wm.separations[0] - (-0.5)).abs() < 1e-6);
        assert!((wm.points[0].x - 0.75).abs() < 1e-6);
    }
}
