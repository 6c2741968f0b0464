use super::common::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use super::distance::DistanceProxy;
use super::math::{Rot, UnitVec2, Vec2};

/// This characterizes how forces get applied.
#[derive(Clone, Copy, Debug, Default)]
pub struct MassData {
    /// The mass, in kilograms.
    pub mass: f32,

    /// The centroid relative to the origin.
    pub center: Vec2,

    /// The rotational inertia of the shape about the local origin.
    pub inertia: f32,
}

/// A circle shape.
#[derive(Clone, Copy, Debug)]
pub struct CircleShape {
    /// Position relative to the body origin.
    pub p: Vec2,
    pub radius: f32,
}

impl CircleShape {
    pub fn new(radius: f32) -> Self {
        Self {
            p: Vec2::ZERO,
            radius,
        }
    }

    pub fn with_position(radius: f32, p: Vec2) -> Self {
        Self { p, radius }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        let mass = density * std::f32::consts::PI * self.radius * self.radius;
        MassData {
            mass,
            center: self.p,
            // Inertia about the local origin.
            inertia: mass * (0.5 * self.radius * self.radius + self.p.dot(self.p)),
        }
    }

    pub fn distance_proxy(&self) -> DistanceProxy<'_> {
        DistanceProxy::new(std::slice::from_ref(&self.p), self.radius)
    }
}

/// A solid convex polygon. The interior must lie to the left of each edge
/// (counter-clockwise winding). Polygons carry a small skin radius so
/// continuous collision has a buffer to work with.
#[derive(Clone, Copy, Debug)]
pub struct PolygonShape {
    pub centroid: Vec2,
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [UnitVec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub radius: f32,
}

impl PolygonShape {
    /// Create a convex polygon from the convex hull of the given points.
    /// Collinear and nearly-coincident points are welded away.
    pub fn new(points: &[Vec2]) -> Self {
        let mut shape = Self::default_box();
        shape.set(points);
        shape
    }

    /// Build an axis-aligned box with the given half-extents.
    pub fn new_box(half_width: f32, half_height: f32) -> Self {
        let mut shape = Self::default_box();
        shape.set_as_box(half_width, half_height);
        shape
    }

    /// Build an oriented box with the given half-extents, centered on
    /// `center` and rotated by `angle`.
    pub fn new_oriented_box(half_width: f32, half_height: f32, center: Vec2, angle: f32) -> Self {
        let mut shape = Self::new_box(half_width, half_height);
        shape.centroid = center;
        let q = Rot::new(angle);
        for i in 0..shape.count {
            shape.vertices[i] = q * shape.vertices[i] + center;
            shape.normals[i] = q * shape.normals[i];
        }
        shape
    }

    fn default_box() -> Self {
        let mut shape = Self {
            centroid: Vec2::ZERO,
            vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            normals: [UnitVec2::INVALID; MAX_POLYGON_VERTICES],
            count: 0,
            radius: POLYGON_RADIUS,
        };
        shape.set_as_box(0.5, 0.5);
        shape
    }

    pub fn set_as_box(&mut self, half_width: f32, half_height: f32) {
        self.count = 4;
        self.vertices[0] = Vec2::new(-half_width, -half_height);
        self.vertices[1] = Vec2::new(half_width, -half_height);
        self.vertices[2] = Vec2::new(half_width, half_height);
        self.vertices[3] = Vec2::new(-half_width, half_height);
        self.normals[0] = UnitVec2::DOWN;
        self.normals[1] = UnitVec2::RIGHT;
        self.normals[2] = UnitVec2::UP;
        self.normals[3] = UnitVec2::LEFT;
        self.centroid = Vec2::ZERO;
    }

    /// Compute the convex hull of the points and take it as the polygon
    /// boundary. At least 3 non-degenerate points are required.
    pub fn set(&mut self, points: &[Vec2]) {
        debug_assert!(points.len() >= 3 && points.len() <= MAX_POLYGON_VERTICES);

        // Weld nearly-coincident points.
        let weld_dist_squared = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut ps = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut n = 0;
        for &p in points.iter().take(MAX_POLYGON_VERTICES) {
            if ps[..n].iter().all(|&q| p.distance_squared(q) > weld_dist_squared) {
                ps[n] = p;
                n += 1;
            }
        }
        if n < 3 {
            debug_assert!(false, "polygon is degenerate");
            return;
        }

        // Gift wrap the hull, starting from the rightmost point.
        let mut i0 = 0;
        let mut x0 = ps[0].x;
        for (i, p) in ps[..n].iter().enumerate().skip(1) {
            if p.x > x0 || (p.x == x0 && p.y < ps[i0].y) {
                i0 = i;
                x0 = p.x;
            }
        }

        let mut hull = [0usize; MAX_POLYGON_VERTICES];
        let mut m = 0;
        let mut ih = i0;
        loop {
            hull[m] = ih;
            let mut ie = 0;
            for j in 1..n {
                if ie == ih {
                    ie = j;
                    continue;
                }
                let r = ps[ie] - ps[hull[m]];
                let v = ps[j] - ps[hull[m]];
                let c = r.cross(v);
                if c < 0.0 {
                    ie = j;
                }
                // Collinear: take the farthest point.
                if c == 0.0 && v.length_squared() > r.length_squared() {
                    ie = j;
                }
            }
            m += 1;
            ih = ie;
            if ie == i0 {
                break;
            }
        }
        if m < 3 {
            debug_assert!(false, "polygon is degenerate");
            return;
        }

        self.count = m;
        for i in 0..m {
            self.vertices[i] = ps[hull[i]];
        }

        // Edge normals point out of the counter-clockwise boundary.
        for i in 0..m {
            let i2 = if i + 1 < m { i + 1 } else { 0 };
            let edge = self.vertices[i2] - self.vertices[i];
            debug_assert!(edge.length_squared() > f32::EPSILON * f32::EPSILON);
            self.normals[i] = UnitVec2::new_or_invalid(edge.cross_scalar(1.0));
        }

        self.centroid = compute_centroid(&self.vertices[..m]);
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }

    #[inline]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    #[inline]
    pub fn normal(&self, index: usize) -> UnitVec2 {
        self.normals[index]
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        debug_assert!(self.count >= 3);

        // Integrate over triangles fanned out from a reference point near
        // the polygon, which keeps the partial sums well conditioned.
        let mut s = Vec2::ZERO;
        for v in self.vertices() {
            s += *v * (1.0 / self.count as f32);
        }

        let k_inv3 = 1.0 / 3.0;
        let mut area = 0.0;
        let mut center = Vec2::ZERO;
        let mut inertia = 0.0;
        for i in 0..self.count {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[if i + 1 < self.count { i + 1 } else { 0 }] - s;
            let d = e1.cross(e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;
            center += triangle_area * k_inv3 * (e1 + e2);

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * k_inv3 * d) * (int_x2 + int_y2);
        }

        let mass = density * area;
        debug_assert!(area > f32::EPSILON);
        center *= 1.0 / area;
        let world_center = center + s;

        // Shift the inertia from the reference point to the body origin.
        let inertia = density * inertia
            + mass * (world_center.dot(world_center) - center.dot(center));
        MassData {
            mass,
            center: world_center,
            inertia,
        }
    }

    pub fn distance_proxy(&self) -> DistanceProxy<'_> {
        DistanceProxy::new(&self.vertices[..self.count], self.radius)
    }
}

/// A line segment. Edges carry optional ghost vertices naming the
/// neighboring segment endpoints; an edge with both ghosts is one-sided
/// and only collides on the side its normal faces, with contacts in the
/// shadow of a ghost deferred to the neighboring edge.
#[derive(Clone, Copy, Debug)]
pub struct EdgeShape {
    vertices: [Vec2; 2],
    /// The vertex preceding `vertex1` on the containing chain.
    pub ghost1: Option<Vec2>,
    /// The vertex following `vertex2` on the containing chain.
    pub ghost2: Option<Vec2>,
    pub radius: f32,
}

impl EdgeShape {
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        Self {
            vertices: [v1, v2],
            ghost1: None,
            ghost2: None,
            radius: POLYGON_RADIUS,
        }
    }

    pub fn with_ghosts(v1: Vec2, v2: Vec2, ghost1: Option<Vec2>, ghost2: Option<Vec2>) -> Self {
        Self {
            vertices: [v1, v2],
            ghost1,
            ghost2,
            radius: POLYGON_RADIUS,
        }
    }

    #[inline]
    pub fn vertex1(&self) -> Vec2 {
        self.vertices[0]
    }

    #[inline]
    pub fn vertex2(&self) -> Vec2 {
        self.vertices[1]
    }

    /// One-sided edges reject contacts approaching from behind.
    #[inline]
    pub fn one_sided(&self) -> bool {
        self.ghost1.is_some() && self.ghost2.is_some()
    }

    pub fn compute_mass(&self, _density: f32) -> MassData {
        MassData {
            mass: 0.0,
            center: 0.5 * (self.vertices[0] + self.vertices[1]),
            inertia: 0.0,
        }
    }

    pub fn distance_proxy(&self) -> DistanceProxy<'_> {
        DistanceProxy::new(&self.vertices, self.radius)
    }
}

/// A chain of line segments, open or closed. Chains decompose into edge
/// children whose ghost vertices are the neighboring chain vertices, so
/// interior corners do not catch passing shapes.
#[derive(Clone, Debug)]
pub struct ChainShape {
    vertices: Vec<Vec2>,
    is_loop: bool,
    /// Ghost vertex before the first chain vertex (open chains).
    pub prev_vertex: Option<Vec2>,
    /// Ghost vertex after the last chain vertex (open chains).
    pub next_vertex: Option<Vec2>,
}

impl ChainShape {
    /// An open chain. `prev_vertex`/`next_vertex` extend the tangential
    /// continuation past the endpoints.
    pub fn new(vertices: Vec<Vec2>, prev_vertex: Option<Vec2>, next_vertex: Option<Vec2>) -> Self {
        debug_assert!(vertices.len() >= 2);
        Self {
            vertices,
            is_loop: false,
            prev_vertex,
            next_vertex,
        }
    }

    /// A closed loop. The last vertex connects back to the first.
    pub fn new_loop(vertices: Vec<Vec2>) -> Self {
        debug_assert!(vertices.len() >= 3);
        Self {
            vertices,
            is_loop: true,
            prev_vertex: None,
            next_vertex: None,
        }
    }

    pub fn child_count(&self) -> usize {
        if self.is_loop {
            self.vertices.len()
        } else {
            self.vertices.len() - 1
        }
    }

    /// The child edge with ghost vertices taken from the chain neighbors.
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        debug_assert!(index < self.child_count());
        let n = self.vertices.len();
        let at = |i: usize| self.vertices[i % n];

        let v1 = at(index);
        let v2 = at(index + 1);
        let ghost1 = if index > 0 {
            Some(self.vertices[index - 1])
        } else if self.is_loop {
            Some(at(n - 1))
        } else {
            self.prev_vertex
        };
        let ghost2 = if index + 2 < n {
            Some(self.vertices[index + 2])
        } else if self.is_loop {
            Some(at(index + 2))
        } else {
            self.next_vertex
        };
        EdgeShape::with_ghosts(v1, v2, ghost1, ghost2)
    }
}

/// The union of convex shapes known to the narrow phase. Chains are
/// containers of edge children; everything else has one child.
#[derive(Clone, Debug)]
pub enum Shape {
    Circle(CircleShape),
    Polygon(PolygonShape),
    Edge(EdgeShape),
    Chain(ChainShape),
}

impl Shape {
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(chain) => chain.child_count(),
            _ => 1,
        }
    }

    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Polygon(p) => p.radius,
            Shape::Edge(e) => e.radius,
            Shape::Chain(_) => POLYGON_RADIUS,
        }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(c) => c.compute_mass(density),
            Shape::Polygon(p) => p.compute_mass(density),
            Shape::Edge(e) => e.compute_mass(density),
            // Chains are static geometry.
            Shape::Chain(_) => MassData::default(),
        }
    }
}

fn compute_centroid(vertices: &[Vec2]) -> Vec2 {
    debug_assert!(vertices.len() >= 3);

    let mut s = Vec2::ZERO;
    for v in vertices {
        s += *v * (1.0 / vertices.len() as f32);
    }

    let k_inv3 = 1.0 / 3.0;
    let mut area = 0.0;
    let mut c = Vec2::ZERO;
    for i in 0..vertices.len() {
        let p1 = vertices[i] - s;
        let p2 = vertices[if i + 1 < vertices.len() { i + 1 } else { 0 }] - s;
        let triangle_area = 0.5 * p1.cross(p2);
        area += triangle_area;
        c += triangle_area * k_inv3 * (p1 + p2);
    }

    debug_assert!(area > f32::EPSILON);
    c * (1.0 / area) + s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_vertices_and_normals() {
        let b = PolygonShape::new_box(1.0, 2.0);
        assert_eq!(b.vertex_count(), 4);
        assert_eq!(b.vertex(0), Vec2::new(-1.0, -2.0));
        assert_eq!(b.vertex(2), Vec2::new(1.0, 2.0));
        assert_eq!(b.normal(2).as_vec2(), Vec2::new(0.0, 1.0));
        assert_eq!(b.centroid, Vec2::ZERO);
    }

    #[test]
    fn hull_discards_interior_points() {
        let p = PolygonShape::new(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.5), // interior
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ]);
        assert_eq!(p.vertex_count(), 4);
        assert!((p.centroid.x - 1.0).abs() < 1e-6);
        assert!((p.centroid.y - 1.0).abs() < 1e-6);
        // All normals unit-length and outward.
        for i in 0..p.vertex_count() {
            assert!((p.normal(i).as_vec2().length() - 1.0).abs() < 1e-6);
            assert!(p.normal(i).dot(p.vertex(i) - p.centroid) > 0.0);
        }
    }

    #[test]
    fn box_mass_properties() {
        let b = PolygonShape::new_box(0.5, 0.5);
        let md = b.compute_mass(1.0);
        assert!((md.mass - 1.0).abs() < 1e-5);
        assert!(md.center.length() < 1e-6);
        // Unit square about its center: I = m (w^2 + h^2) / 12.
        assert!((md.inertia - 1.0 / 6.0).abs() < 1e-4);
    }

    #[test]
    fn circle_mass_properties() {
        let c = CircleShape::with_position(2.0, Vec2::new(1.0, 0.0));
        let md = c.compute_mass(1.0);
        let expected_mass = std::f32::consts::PI * 4.0;
        assert!((md.mass - expected_mass).abs() < 1e-3);
        assert_eq!(md.center, Vec2::new(1.0, 0.0));
        assert!((md.inertia - expected_mass * (2.0 + 1.0)).abs() < 1e-2);
    }

    #[test]
    fn chain_children_carry_ghosts() {
        let chain = ChainShape::new(
            vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(2.0, 0.0),
                Vec2::new(3.0, 0.0),
            ],
            None,
            None,
        );
        assert_eq!(chain.child_count(), 3);

        let first = chain.child_edge(0);
        assert_eq!(first.ghost1, None);
        assert_eq!(first.ghost2, Some(Vec2::new(2.0, 0.0)));
        assert!(!first.one_sided());

        let middle = chain.child_edge(1);
        assert_eq!(middle.ghost1, Some(Vec2::new(0.0, 0.0)));
        assert_eq!(middle.ghost2, Some(Vec2::new(3.0, 0.0)));
        assert!(middle.one_sided());
    }

    #[test]
    fn loop_children_wrap() {
        let chain = ChainShape::new_loop(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.5, 1.0),
        ]);
        assert_eq!(chain.child_count(), 3);
        let last = chain.child_edge(2);
        assert_eq!(last.vertex1(), Vec2::new(0.5, 1.0));
        assert_eq!(last.vertex2(), Vec2::new(0.0, 0.0));
        assert!(last.one_sided());
    }
}
