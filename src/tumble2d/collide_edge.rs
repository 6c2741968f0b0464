use super::collide::{clip_segment_to_line, ClipVertex, ABSOLUTE_TOL, RELATIVE_TOL};
use super::common::MAX_POLYGON_VERTICES;
use super::manifold::{ContactFeature, FaceManifold, Manifold, ManifoldPoint};
use super::math::{Transform, UnitVec2, Vec2};
use super::shape::{CircleShape, EdgeShape, PolygonShape};

/// Compute the collision manifold between an edge and a circle.
///
/// The edge is a degenerate two-vertex polygon. Contacts in a vertex
/// region that lies in the shadow of a ghost vertex belong to the
/// neighboring edge and are suppressed here.
pub fn collide_edge_circle(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    // Compute circle in frame of edge.
    let q = xf_a.mul_t_vec2(xf_b.mul_vec2(circle_b.p));

    let a = edge_a.vertex1();
    let b = edge_a.vertex2();
    let e = b - a;

    // Barycentric coordinates of q along the segment.
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = edge_a.radius + circle_b.radius;

    // Region A
    if v <= 0.0 {
        let d = q - a;
        if d.dot(d) > radius * radius {
            return Manifold::Unset;
        }

        // Is there an edge connected at A? If so and q is in its shadow,
        // that edge owns this contact.
        if let Some(a1) = edge_a.ghost1 {
            let e1 = a - a1;
            if e1.dot(a - q) > 0.0 {
                return Manifold::Unset;
            }
        }

        return Manifold::for_circles(a, 0, circle_b.p, 0);
    }

    // Region B
    if u <= 0.0 {
        let d = q - b;
        if d.dot(d) > radius * radius {
            return Manifold::Unset;
        }

        if let Some(b2) = edge_a.ghost2 {
            let e2 = b2 - b;
            if e2.dot(q - b) > 0.0 {
                return Manifold::Unset;
            }
        }

        return Manifold::for_circles(b, 1, circle_b.p, 0);
    }

    // Region AB
    let den = e.dot(e);
    debug_assert!(den > 0.0);
    let p = (1.0 / den) * (u * a + v * b);
    let d = q - p;
    if d.dot(d) > radius * radius {
        return Manifold::Unset;
    }

    // Face normal on the side the circle is on.
    let mut n = Vec2::new(-e.y, e.x);
    if n.dot(q - a) < 0.0 {
        n = -n;
    }

    Manifold::FaceA(FaceManifold::with_point(
        UnitVec2::new_or_invalid(n),
        a,
        ManifoldPoint::new(circle_b.p, ContactFeature::face_vertex(0, 0)),
    ))
}

/// The polygon transformed into the frame of the edge.
struct TempPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

#[derive(Clone, Copy, PartialEq)]
enum EpAxisKind {
    EdgeA,
    PolygonB,
}

/// A potential separating axis between an edge and a polygon.
#[derive(Clone, Copy)]
struct EpAxis {
    normal: Vec2,
    kind: EpAxisKind,
    index: usize,
    separation: f32,
}

fn compute_edge_separation(polygon_b: &TempPolygon, v1: Vec2, normal1: Vec2) -> EpAxis {
    let mut axis = EpAxis {
        kind: EpAxisKind::EdgeA,
        index: 0,
        separation: f32::MIN,
        normal: Vec2::ZERO,
    };

    // The edge has two candidate normals; keep the one with least overlap.
    let axes = [normal1, -normal1];
    for (j, n) in axes.iter().enumerate() {
        let mut sj = f32::MAX;
        for i in 0..polygon_b.count {
            sj = sj.min(n.dot(polygon_b.vertices[i] - v1));
        }
        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = *n;
        }
    }

    axis
}

fn compute_polygon_separation(polygon_b: &TempPolygon, v1: Vec2, v2: Vec2) -> EpAxis {
    let mut axis = EpAxis {
        kind: EpAxisKind::PolygonB,
        index: 0,
        separation: f32::MIN,
        normal: Vec2::ZERO,
    };

    for i in 0..polygon_b.count {
        let n = -polygon_b.normals[i];
        let s1 = n.dot(polygon_b.vertices[i] - v1);
        let s2 = n.dot(polygon_b.vertices[i] - v2);
        let s = s1.min(s2);
        if s > axis.separation {
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }

    axis
}

/// Compute the collision manifold between a one- or two-sided edge and a
/// polygon. One-sided edges reject back-side approaches outright, and the
/// Gauss-map region test around each ghost vertex suppresses the axes a
/// neighboring edge is responsible for.
pub fn collide_edge_polygon(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let xf = xf_a.mul_t(*xf_b);

    let centroid_b = xf.mul_vec2(polygon_b.centroid);

    let v1 = edge_a.vertex1();
    let v2 = edge_a.vertex2();

    let edge1 = (v2 - v1).normalize();

    // Right-hand perpendicular, matching the polygon winding convention.
    let normal1 = Vec2::new(edge1.y, -edge1.x);
    let offset1 = normal1.dot(centroid_b - v1);

    let one_sided = edge_a.one_sided();
    if one_sided && offset1 < 0.0 {
        return Manifold::Unset;
    }

    // Get polygon B in frame A.
    let mut temp = TempPolygon {
        vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        count: polygon_b.vertex_count(),
    };
    for i in 0..polygon_b.vertex_count() {
        temp.vertices[i] = xf.mul_vec2(polygon_b.vertex(i));
        temp.normals[i] = (xf.q * polygon_b.normal(i)).as_vec2();
    }

    let radius = polygon_b.radius + edge_a.radius;

    let edge_axis = compute_edge_separation(&temp, v1, normal1);
    if edge_axis.separation > radius {
        return Manifold::Unset;
    }

    let polygon_axis = compute_polygon_separation(&temp, v1, v2);
    if polygon_axis.separation > radius {
        return Manifold::Unset;
    }

    // Use hysteresis for jitter reduction.
    let mut primary_axis =
        if polygon_axis.separation - radius > RELATIVE_TOL * (edge_axis.separation - radius) + ABSOLUTE_TOL {
            polygon_axis
        } else {
            edge_axis
        };

    if one_sided {
        // Smooth collision: constrain the axis to the Gauss map arc the
        // ghost vertices allow, so contacts slide over chain corners.
        let ghost1 = edge_a.ghost1.unwrap_or(v1);
        let ghost2 = edge_a.ghost2.unwrap_or(v2);

        let edge0 = (v1 - ghost1).normalize();
        let normal0 = Vec2::new(edge0.y, -edge0.x);
        let convex1 = edge0.cross(edge1) >= 0.0;

        let edge2 = (ghost2 - v2).normalize();
        let normal2 = Vec2::new(edge2.y, -edge2.x);
        let convex2 = edge1.cross(edge2) >= 0.0;

        const SIN_TOL: f32 = 0.1;
        let side1 = primary_axis.normal.dot(edge1) <= 0.0;

        if side1 {
            if convex1 {
                if primary_axis.normal.cross(normal0) > SIN_TOL {
                    // The neighboring edge owns this region.
                    return Manifold::Unset;
                }
            } else {
                primary_axis = edge_axis;
            }
        } else if convex2 {
            if normal2.cross(primary_axis.normal) > SIN_TOL {
                return Manifold::Unset;
            }
        } else {
            primary_axis = edge_axis;
        }
    }

    let mut clip_points: [ClipVertex; 2];
    let ref_i1;
    let ref_i2;
    let ref_v1;
    let ref_v2;
    let ref_normal;
    let ref_side_normal1;

    let is_edge_ref = primary_axis.kind == EpAxisKind::EdgeA;
    if is_edge_ref {
        // Search for the polygon normal that is most anti-parallel to the
        // edge normal.
        let mut best_index = 0;
        let mut best_value = primary_axis.normal.dot(temp.normals[0]);
        for i in 1..temp.count {
            let value = primary_axis.normal.dot(temp.normals[i]);
            if value < best_value {
                best_value = value;
                best_index = i;
            }
        }

        let i1 = best_index;
        let i2 = if i1 + 1 < temp.count { i1 + 1 } else { 0 };

        clip_points = [
            ClipVertex {
                v: temp.vertices[i1],
                feature: ContactFeature::face_vertex(0, i1 as u8),
            },
            ClipVertex {
                v: temp.vertices[i2],
                feature: ContactFeature::face_vertex(0, i2 as u8),
            },
        ];

        ref_i1 = 0usize;
        ref_i2 = 1usize;
        ref_v1 = v1;
        ref_v2 = v2;
        ref_normal = primary_axis.normal;
        ref_side_normal1 = -edge1;
    } else {
        clip_points = [
            ClipVertex {
                v: v2,
                feature: ContactFeature::vertex_face(1, primary_axis.index as u8),
            },
            ClipVertex {
                v: v1,
                feature: ContactFeature::vertex_face(0, primary_axis.index as u8),
            },
        ];

        let i1 = primary_axis.index;
        let i2 = if i1 + 1 < temp.count { i1 + 1 } else { 0 };
        ref_i1 = i1;
        ref_i2 = i2;
        ref_v1 = temp.vertices[i1];
        ref_v2 = temp.vertices[i2];
        ref_normal = temp.normals[i1];
        // CCW winding.
        ref_side_normal1 = Vec2::new(ref_normal.y, -ref_normal.x);
    }

    let ref_side_normal2 = -ref_side_normal1;
    let side_offset1 = ref_side_normal1.dot(ref_v1);
    let side_offset2 = ref_side_normal2.dot(ref_v2);

    // Clip incident edge against reference face side planes.
    let (clipped1, np) =
        clip_segment_to_line(&clip_points, ref_side_normal1, side_offset1, ref_i1 as u8);
    if np < 2 {
        return Manifold::Unset;
    }
    let (clipped2, np) =
        clip_segment_to_line(&clipped1, ref_side_normal2, side_offset2, ref_i2 as u8);
    if np < 2 {
        return Manifold::Unset;
    }
    clip_points = clipped2;

    let mut face = if is_edge_ref {
        FaceManifold::new(UnitVec2::new_or_invalid(ref_normal), ref_v1)
    } else {
        FaceManifold::new(
            polygon_b.normal(ref_i1),
            polygon_b.vertex(ref_i1),
        )
    };

    for cp in clip_points.iter() {
        let separation = ref_normal.dot(cp.v - ref_v1);
        if separation <= radius {
            if is_edge_ref {
                face.add_point(ManifoldPoint::new(xf.mul_t_vec2(cp.v), cp.feature));
            } else {
                face.add_point(ManifoldPoint::new(cp.v, cp.feature.swapped()));
            }
        }
    }

    if face.points().is_empty() {
        return Manifold::Unset;
    }
    if is_edge_ref {
        Manifold::FaceA(face)
    } else {
        Manifold::FaceB(face)
    }
}
