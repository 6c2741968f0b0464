use super::math::{Transform, Vec2};

/// Hard cap on GJK refinement. In practice convergence takes a handful of
/// iterations; the cap only guards degenerate input.
const MAX_GJK_ITERATIONS: usize = 20;

/// A read-only view of a convex shape for distance queries: a vertex
/// buffer plus the skin radius. Shape variants compose into this at query
/// time, so the distance code never sees concrete shape types.
#[derive(Clone, Copy, Debug)]
pub struct DistanceProxy<'a> {
    vertices: &'a [Vec2],
    radius: f32,
}

impl<'a> DistanceProxy<'a> {
    pub fn new(vertices: &'a [Vec2], radius: f32) -> Self {
        debug_assert!(!vertices.is_empty());
        Self { vertices, radius }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Index of the vertex most extreme in direction `d` (not normalized).
    pub fn support_index(&self, d: Vec2) -> usize {
        let mut best = 0;
        let mut best_value = d.dot(self.vertices[0]);
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            let value = d.dot(*v);
            if value > best_value {
                best = i;
                best_value = value;
            }
        }
        best
    }
}

/// Used to warm start the distance query between a pair of proxies.
/// A zero count means cold; after a query the count is 1..=3.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimplexCache {
    /// Length or area metric of the cached simplex, used to detect a
    /// stale cache.
    pub metric: f32,
    pub count: u8,
    pub index_a: [u8; 3],
    pub index_b: [u8; 3],
}

/// Input for `distance`. Set `use_radii` to measure between shape
/// surfaces rather than between the polygon skeletons.
#[derive(Clone, Copy, Debug)]
pub struct DistanceInput<'a> {
    pub proxy_a: DistanceProxy<'a>,
    pub transform_a: Transform,
    pub proxy_b: DistanceProxy<'a>,
    pub transform_b: Transform,
    pub use_radii: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct DistanceOutput {
    /// Closest point on proxy A, in world coordinates.
    pub point_a: Vec2,
    /// Closest point on proxy B, in world coordinates.
    pub point_b: Vec2,
    pub distance: f32,
    pub iterations: usize,
}

#[derive(Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point on proxy A, world coordinates.
    w_a: Vec2,
    /// Support point on proxy B, world coordinates.
    w_b: Vec2,
    /// `w_b - w_a`
    w: Vec2,
    /// Barycentric weight for closest point.
    a: f32,
    index_a: usize,
    index_b: usize,
}

#[derive(Clone, Copy, Default)]
struct Simplex {
    vertices: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        transform_a: &Transform,
        proxy_b: &DistanceProxy,
        transform_b: &Transform,
    ) -> Self {
        debug_assert!(cache.count <= 3);
        let mut simplex = Simplex::default();

        // Copy data from cache.
        simplex.count = cache.count as usize;
        for i in 0..simplex.count {
            let v = &mut simplex.vertices[i];
            v.index_a = cache.index_a[i] as usize;
            v.index_b = cache.index_b[i] as usize;
            v.w_a = transform_a.mul_vec2(proxy_a.vertex(v.index_a));
            v.w_b = transform_b.mul_vec2(proxy_b.vertex(v.index_b));
            v.w = v.w_b - v.w_a;
            v.a = 0.0;
        }

        // If the cache is stale (the shapes changed too much since it was
        // written), flush it.
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.get_metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                simplex.count = 0;
            }
        }

        // A cold cache seeds from the first vertices.
        if simplex.count == 0 {
            let v = &mut simplex.vertices[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = transform_a.mul_vec2(proxy_a.vertex(0));
            v.w_b = transform_b.mul_vec2(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            v.a = 1.0;
            simplex.count = 1;
        }

        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.get_metric();
        cache.count = self.count as u8;
        for i in 0..self.count {
            cache.index_a[i] = self.vertices[i].index_a as u8;
            cache.index_b[i] = self.vertices[i].index_b as u8;
        }
    }

    fn get_search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.vertices[0].w,
            2 => {
                let e12 = self.vertices[1].w - self.vertices[0].w;
                let sgn = e12.cross(-self.vertices[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    Vec2::scalar_cross(1.0, e12)
                } else {
                    // Origin is right of e12.
                    e12.cross_scalar(1.0)
                }
            }
            _ => {
                debug_assert!(false);
                Vec2::ZERO
            }
        }
    }

    fn get_witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.vertices[0].w_a, self.vertices[0].w_b),
            2 => {
                let v0 = &self.vertices[0];
                let v1 = &self.vertices[1];
                (
                    v0.a * v0.w_a + v1.a * v1.w_a,
                    v0.a * v0.w_b + v1.a * v1.w_b,
                )
            }
            3 => {
                let v0 = &self.vertices[0];
                let v1 = &self.vertices[1];
                let v2 = &self.vertices[2];
                let p = v0.a * v0.w_a + v1.a * v1.w_a + v2.a * v2.w_a;
                (p, p)
            }
            _ => {
                debug_assert!(false);
                (Vec2::ZERO, Vec2::ZERO)
            }
        }
    }

    fn get_metric(&self) -> f32 {
        match self.count {
            1 => 0.0,
            2 => self.vertices[0].w.distance(self.vertices[1].w),
            3 => (self.vertices[1].w - self.vertices[0].w)
                .cross(self.vertices[2].w - self.vertices[0].w),
            _ => {
                debug_assert!(false);
                0.0
            }
        }
    }

    /// Solve a line segment using barycentric coordinates.
    ///
    /// p = a1 * w1 + a2 * w2 with a1 + a2 = 1. The closest point to the
    /// origin lies on the segment or at a vertex; vertex regions drop the
    /// other simplex vertex.
    fn solve2(&mut self) {
        let w1 = self.vertices[0].w;
        let w2 = self.vertices[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.vertices[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.vertices[0] = self.vertices[1];
            self.vertices[0].a = 1.0;
            self.count = 1;
            return;
        }

        // Must be in e12 region.
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.vertices[0].a = d12_1 * inv_d12;
        self.vertices[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Solve a triangle using barycentric coordinates. The origin lies in
    /// one of seven Voronoi regions; edges and vertices reduce the simplex.
    fn solve3(&mut self) {
        let w1 = self.vertices[0].w;
        let w2 = self.vertices[1].w;
        let w3 = self.vertices[2].w;

        let e12 = w2 - w1;
        let w1e12 = w1.dot(e12);
        let w2e12 = w2.dot(e12);
        let d12_1 = w2e12;
        let d12_2 = -w1e12;

        let e13 = w3 - w1;
        let w1e13 = w1.dot(e13);
        let w3e13 = w3.dot(e13);
        let d13_1 = w3e13;
        let d13_2 = -w1e13;

        let e23 = w3 - w2;
        let w2e23 = w2.dot(e23);
        let w3e23 = w3.dot(e23);
        let d23_1 = w3e23;
        let d23_2 = -w2e23;

        // Triangle123
        let n123 = e12.cross(e13);
        let d123_1 = n123 * w2.cross(w3);
        let d123_2 = n123 * w3.cross(w1);
        let d123_3 = n123 * w1.cross(w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.vertices[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.vertices[0].a = d12_1 * inv_d12;
            self.vertices[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.vertices[0].a = d13_1 * inv_d13;
            self.vertices[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.vertices[1] = self.vertices[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.vertices[0] = self.vertices[1];
            self.vertices[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.vertices[0] = self.vertices[2];
            self.vertices[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.vertices[1].a = d23_1 * inv_d23;
            self.vertices[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.vertices[0] = self.vertices[2];
            return;
        }

        // The origin is inside the triangle.
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.vertices[0].a = d123_1 * inv_d123;
        self.vertices[1].a = d123_2 * inv_d123;
        self.vertices[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

/// Compute the closest points between two transformed proxies using GJK on
/// the Minkowski difference, warm started from (and written back to) the
/// simplex cache. On overlap the returned distance is zero and both
/// witness points coincide.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let transform_a = &input.transform_a;
    let transform_b = &input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, transform_a, proxy_b, transform_b);

    let mut iter = 0;
    while iter < MAX_GJK_ITERATIONS {
        // Copy simplex so we can identify duplicates.
        let save_count = simplex.count;
        let mut save_a = [0usize; 3];
        let mut save_b = [0usize; 3];
        for i in 0..save_count {
            save_a[i] = simplex.vertices[i].index_a;
            save_b[i] = simplex.vertices[i].index_b;
        }

        match simplex.count {
            1 => {}
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => debug_assert!(false),
        }

        // If we have 3 points, then the origin is in the corresponding
        // triangle and the shapes overlap.
        if simplex.count == 3 {
            break;
        }

        // Get search direction.
        let d = simplex.get_search_direction();

        // Ensure the search direction is numerically fit.
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            // The origin is probably contained by a line segment
            // or triangle. Thus the shapes are overlapped.
            //
            // We can't return zero here even though there may be overlap.
            // In case the simplex is a point, segment, or triangle it is
            // difficult to determine if the origin is contained in the CSO
            // or very close to it.
            break;
        }

        // Compute a tentative new simplex vertex using support points.
        let vertex = &mut simplex.vertices[simplex.count];
        vertex.index_a = proxy_a.support_index(transform_a.q.mul_t_vec2(-d));
        vertex.w_a = transform_a.mul_vec2(proxy_a.vertex(vertex.index_a));
        vertex.index_b = proxy_b.support_index(transform_b.q.mul_t_vec2(d));
        vertex.w_b = transform_b.mul_vec2(proxy_b.vertex(vertex.index_b));
        vertex.w = vertex.w_b - vertex.w_a;

        iter += 1;

        // Check for duplicate support points. This is the main termination
        // criteria; repeating a vertex would cycle forever.
        let duplicate = (0..save_count)
            .any(|i| vertex.index_a == save_a[i] && vertex.index_b == save_b[i]);
        if duplicate {
            break;
        }

        // New vertex is ok and needed.
        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.get_witness_points();
    let mut dist = point_a.distance(point_b);

    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius();
        let r_b = proxy_b.radius();
        if dist > r_a + r_b && dist > f32::EPSILON {
            // Shapes are still not overlapped. Move the witness points to
            // the outer surface.
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalize();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            // Shapes are overlapped when radii are considered. Move the
            // witness points to the middle.
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tumble2d::shape::PolygonShape;

    fn query(
        proxy_a: DistanceProxy,
        xf_a: Transform,
        proxy_b: DistanceProxy,
        xf_b: Transform,
    ) -> (DistanceOutput, SimplexCache) {
        let mut cache = SimplexCache::default();
        let out = distance(
            &mut cache,
            &DistanceInput {
                proxy_a,
                transform_a: xf_a,
                proxy_b,
                transform_b: xf_b,
                use_radii: false,
            },
        );
        (out, cache)
    }

    #[test]
    fn separated_boxes() {
        let a = PolygonShape::new_box(0.5, 0.5);
        let b = PolygonShape::new_box(0.5, 0.5);
        let (out, cache) = query(
            a.distance_proxy(),
            Transform::IDENTITY,
            b.distance_proxy(),
            Transform::new(Vec2::new(3.0, 0.0), 0.0),
        );
        assert!((out.distance - 2.0).abs() < 1e-5);
        assert!((out.point_a.x - 0.5).abs() < 1e-5);
        assert!((out.point_b.x - 2.5).abs() < 1e-5);
        assert!(cache.count >= 1 && cache.count <= 3);
    }

    #[test]
    fn overlapping_boxes_report_zero() {
        let a = PolygonShape::new_box(0.5, 0.5);
        let b = PolygonShape::new_box(0.5, 0.5);
        let (out, _) = query(
            a.distance_proxy(),
            Transform::IDENTITY,
            b.distance_proxy(),
            Transform::new(Vec2::new(0.25, 0.25), 0.0),
        );
        assert!(out.distance < 1e-5);
    }

    #[test]
    fn point_to_face_witness() {
        let a = PolygonShape::new_box(0.5, 0.5);
        let b = PolygonShape::new_box(0.5, 0.5);
        // Rotate B by 45 degrees so a corner faces A's right side.
        let (out, _) = query(
            a.distance_proxy(),
            Transform::IDENTITY,
            b.distance_proxy(),
            Transform::new(Vec2::new(3.0, 0.0), std::f32::consts::FRAC_PI_4),
        );
        let corner = 3.0 - 0.5 * std::f32::consts::SQRT_2;
        assert!((out.distance - (corner - 0.5)).abs() < 1e-4);
    }

    #[test]
    fn warm_cache_converges_fast() {
        let a = PolygonShape::new_box(0.5, 0.5);
        let b = PolygonShape::new_box(0.5, 0.5);
        let mut cache = SimplexCache::default();
        let input = DistanceInput {
            proxy_a: a.distance_proxy(),
            transform_a: Transform::IDENTITY,
            proxy_b: b.distance_proxy(),
            transform_b: Transform::new(Vec2::new(3.0, 0.1), 0.0),
            use_radii: false,
        };
        let first = distance(&mut cache, &input);
        let second = distance(&mut cache, &input);
        assert_eq!(first.distance.to_bits(), second.distance.to_bits());
        assert!(second.iterations <= first.iterations);
    }

    #[test]
    fn radii_shift_witness_points() {
        let centers_a = [Vec2::ZERO];
        let centers_b = [Vec2::ZERO];
        let proxy_a = DistanceProxy::new(&centers_a, 1.0);
        let proxy_b = DistanceProxy::new(&centers_b, 1.0);
        let mut cache = SimplexCache::default();
        let out = distance(
            &mut cache,
            &DistanceInput {
                proxy_a,
                transform_a: Transform::IDENTITY,
                proxy_b,
                transform_b: Transform::new(Vec2::new(3.0, 0.0), 0.0),
                use_radii: true,
            },
        );
        assert!((out.distance - 1.0).abs() < 1e-5);
        assert!((out.point_a.x - 1.0).abs() < 1e-5);
        assert!((out.point_b.x - 2.0).abs() < 1e-5);
    }
}
