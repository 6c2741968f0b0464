use super::common::{LINEAR_SLOP, MAX_MANIFOLD_POINTS};
use super::manifold::{
    ContactFeature, ContactFeatureType, FaceManifold, Manifold, ManifoldPoint,
};
use super::math::{Transform, UnitVec2, Vec2};
use super::shape::{CircleShape, PolygonShape};

/// Reference-face hysteresis: the face on B is preferred only when its
/// separation beats A's by this relative margin plus an absolute bias.
/// Keeping the margin below one stops the reference face flipping frame
/// to frame when two candidate faces stay within tolerance of each other.
pub(crate) const RELATIVE_TOL: f32 = 0.98;
pub(crate) const ABSOLUTE_TOL: f32 = 0.001;

/// Used for computing contact manifolds.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ClipVertex {
    pub v: Vec2,
    pub feature: ContactFeature,
}

/// Sutherland-Hodgman clipping of a two-point segment against the plane
/// `dot(normal, p) - offset = 0`, keeping the negative side. A vertex
/// produced by the plane itself is tagged with `vertex_index_a`.
pub(crate) fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: u8,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = *v_in;
    let mut count = 0;

    // Calculate the distance of end points to the line.
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // If the points are behind the plane.
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // If the points are on different sides of the plane.
    if distance0 * distance1 < 0.0 {
        // Find intersection point of edge and plane.
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + interp * (v_in[1].v - v_in[0].v);

        // The new vertex comes from clipping edge `vertex_index_a` of A
        // against the incident face of B.
        v_out[count].feature = ContactFeature {
            type_a: ContactFeatureType::Vertex,
            type_b: ContactFeatureType::Face,
            index_a: vertex_index_a,
            index_b: v_in[0].feature.index_b,
        };
        count += 1;
    }

    (v_out, count)
}

/// Compute the collision manifold between two circles.
pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let p_a = xf_a.mul_vec2(circle_a.p);
    let p_b = xf_b.mul_vec2(circle_b.p);

    let d = p_b - p_a;
    let dist_squared = d.dot(d);
    let r = circle_a.radius + circle_b.radius + LINEAR_SLOP;
    if dist_squared > r * r {
        return Manifold::Unset;
    }

    Manifold::for_circles(circle_a.p, 0, circle_b.p, 0)
}

/// Compute the collision manifold between a polygon and a circle.
pub fn collide_polygon_circle(
    polygon_a: &PolygonShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    // Compute circle position in the frame of the polygon.
    let c = xf_b.mul_vec2(circle_b.p);
    let c_local = xf_a.mul_t_vec2(c);

    // Find the face with maximum separation versus the circle center.
    let total_radius = polygon_a.radius + circle_b.radius;
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    for i in 0..polygon_a.vertex_count() {
        let s = polygon_a.normal(i).dot(c_local - polygon_a.vertex(i));
        if s > total_radius {
            // Early out.
            return Manifold::Unset;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    // Vertices that subtend the reference face.
    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < polygon_a.vertex_count() {
        vert_index1 + 1
    } else {
        0
    };
    let v1 = polygon_a.vertex(vert_index1);
    let v2 = polygon_a.vertex(vert_index2);

    let feature = ContactFeature::face_vertex(normal_index as u8, 0);
    let point = ManifoldPoint::new(circle_b.p, feature);

    if separation < f32::EPSILON {
        // Center is inside the polygon.
        return Manifold::FaceA(FaceManifold::with_point(
            polygon_a.normal(normal_index),
            0.5 * (v1 + v2),
            point,
        ));
    }

    // Compute barycentric coordinates to pick the face or vertex region.
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if c_local.distance_squared(v1) > total_radius * total_radius {
            return Manifold::Unset;
        }
        Manifold::FaceA(FaceManifold::with_point(
            UnitVec2::new_or_invalid(c_local - v1),
            v1,
            point,
        ))
    } else if u2 <= 0.0 {
        if c_local.distance_squared(v2) > total_radius * total_radius {
            return Manifold::Unset;
        }
        Manifold::FaceA(FaceManifold::with_point(
            UnitVec2::new_or_invalid(c_local - v2),
            v2,
            point,
        ))
    } else {
        let face_center = 0.5 * (v1 + v2);
        let s = polygon_a.normal(vert_index1).dot(c_local - face_center);
        if s > total_radius {
            return Manifold::Unset;
        }
        Manifold::FaceA(FaceManifold::with_point(
            polygon_a.normal(vert_index1),
            face_center,
            point,
        ))
    }
}

/// Find the maximum separation of poly1's face normals against poly2, and
/// the face achieving it.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (usize, f32) {
    // Work in the frame of poly2.
    let xf = xf2.mul_t(*xf1);

    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for i in 0..poly1.vertex_count() {
        // Face normal and vertex of poly1 in poly2's frame.
        let n = (xf.q * poly1.normal(i)).as_vec2();
        let v1 = xf.mul_vec2(poly1.vertex(i));

        // Deepest poly2 vertex against this face.
        let mut si = f32::MAX;
        for j in 0..poly2.vertex_count() {
            si = si.min(n.dot(poly2.vertex(j) - v1));
        }

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (best_index, max_separation)
}

/// Find the face on poly2 most anti-parallel to the given reference face
/// of poly1, returned as a clip segment with features.
fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    debug_assert!(edge1 < poly1.vertex_count());

    // Reference normal in poly2's frame.
    let normal1 = xf2.q.mul_t_vec2((xf1.q * poly1.normal(edge1)).as_vec2());

    // Find the incident edge on poly2.
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for i in 0..poly2.vertex_count() {
        let dot = normal1.dot(poly2.normal(i).as_vec2());
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = if i1 + 1 < poly2.vertex_count() { i1 + 1 } else { 0 };

    [
        ClipVertex {
            v: xf2.mul_vec2(poly2.vertex(i1)),
            feature: ContactFeature::face_vertex(edge1 as u8, i1 as u8),
        },
        ClipVertex {
            v: xf2.mul_vec2(poly2.vertex(i2)),
            feature: ContactFeature::face_vertex(edge1 as u8, i2 as u8),
        },
    ]
}

/// Compute the collision manifold between two polygons using the
/// separating axis test with feature tracking:
/// find the axis of maximum separation over each polygon's face normals,
/// pick the reference face with hysteresis, clip the incident face
/// against the side planes of the reference face, and keep clip points
/// within the combined skin radius of the reference plane.
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return Manifold::Unset;
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return Manifold::Unset;
    }

    // On a tie within tolerance the face on A wins, for stability.
    let (poly1, poly2, xf1, xf2, edge1, flip) =
        if separation_b > RELATIVE_TOL * separation_a + ABSOLUTE_TOL {
            (poly_b, poly_a, xf_b, xf_a, edge_b, true)
        } else {
            (poly_a, poly_b, xf_a, xf_b, edge_a, false)
        };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let iv1 = edge1;
    let iv2 = if edge1 + 1 < poly1.vertex_count() {
        edge1 + 1
    } else {
        0
    };

    let mut v11 = poly1.vertex(iv1);
    let mut v12 = poly1.vertex(iv2);

    let local_tangent = (v12 - v11).normalize();
    let local_normal = UnitVec2::new_or_invalid(local_tangent.cross_scalar(1.0));
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q * local_tangent;
    let normal = tangent.cross_scalar(1.0);

    v11 = xf1.mul_vec2(v11);
    v12 = xf1.mul_vec2(v12);

    // Face offset and side planes, extended by the skin radius.
    let front_offset = normal.dot(v11);
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // Clip incident edge against the extruded side planes of edge1.
    let (clip_points1, np) =
        clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1 as u8);
    if np < 2 {
        return Manifold::Unset;
    }
    let (clip_points2, np) =
        clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2 as u8);
    if np < 2 {
        return Manifold::Unset;
    }

    // Due to roundoff, it is possible that clipping removes all points.
    let mut face = FaceManifold::new(local_normal, plane_point);
    for cp in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = normal.dot(cp.v) - front_offset;
        if separation <= total_radius {
            let feature = if flip { cp.feature.swapped() } else { cp.feature };
            face.add_point(ManifoldPoint::new(xf2.mul_t_vec2(cp.v), feature));
        }
    }

    if face.points().is_empty() {
        return Manifold::Unset;
    }
    if flip {
        Manifold::FaceB(face)
    } else {
        Manifold::FaceA(face)
    }
}
