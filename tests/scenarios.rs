//! End-to-end scenarios driving the narrow phase, the island solver, and
//! the time-of-impact query together the way an engine step does.

use tumble2d::tumble2d::arena::StepArena;
use tumble2d::tumble2d::body::{Body, BodyType};
use tumble2d::tumble2d::common::{LINEAR_SLOP, VELOCITY_THRESHOLD};
use tumble2d::tumble2d::contact::Contact;
use tumble2d::tumble2d::island::Island;
use tumble2d::tumble2d::manifold::{Manifold, WorldManifold};
use tumble2d::tumble2d::math::{Sweep, Vec2};
use tumble2d::tumble2d::shape::{CircleShape, PolygonShape, Shape};
use tumble2d::tumble2d::time_of_impact::{time_of_impact, ToiInput, ToiState};
use tumble2d::tumble2d::time_step::StepConf;

/// A minimal pair-list owner: fixed bodies and contacts, no broad phase.
/// Each step refreshes every manifold from the current transforms and
/// solves the touching subset as one island.
struct TestWorld {
    bodies: Vec<Body>,
    shapes: Vec<Shape>,
    contacts: Vec<Contact>,
    arena: StepArena,
    gravity: Vec2,
}

impl TestWorld {
    fn new(gravity: Vec2) -> Self {
        Self {
            bodies: Vec::new(),
            shapes: Vec::new(),
            contacts: Vec::new(),
            arena: StepArena::new(),
            gravity,
        }
    }

    fn add_body(&mut self, body: Body, shape: Shape) -> usize {
        self.bodies.push(body);
        self.shapes.push(shape);
        self.bodies.len() - 1
    }

    fn add_pair(&mut self, a: usize, b: usize, friction: f32, restitution: f32) {
        self.contacts.push(Contact::new(a, b, friction, restitution));
    }

    fn step_with(&mut self, step: &StepConf) {
        for contact in self.contacts.iter_mut() {
            contact.update(
                &self.shapes[contact.body_a],
                &self.bodies[contact.body_a].xf,
                &self.shapes[contact.body_b],
                &self.bodies[contact.body_b].xf,
            );
        }

        let mut touching: Vec<Contact> = self
            .contacts
            .iter()
            .filter(|c| c.is_touching())
            .cloned()
            .collect();

        let mut island = Island::new(&mut self.bodies, &mut touching);
        island.solve(&mut self.arena, step, self.gravity, &mut []);

        // Persist the solved manifolds (warm-start impulses) back into
        // the pair list.
        let mut solved = touching.into_iter();
        for contact in self.contacts.iter_mut() {
            if contact.is_touching() {
                *contact = solved.next().unwrap();
            }
        }
    }

    fn step(&mut self, dt: f32) {
        self.step_with(&StepConf::new(dt));
    }

    fn separations(&self, contact_index: usize) -> Vec<f32> {
        let contact = &self.contacts[contact_index];
        let wm = WorldManifold::new(
            contact.manifold(),
            &self.bodies[contact.body_a].xf,
            contact.radius_a,
            &self.bodies[contact.body_b].xf,
            contact.radius_b,
        );
        (0..contact.manifold().point_count())
            .map(|i| wm.separations[i])
            .collect()
    }
}

fn dynamic_body(position: Vec2, shape: &Shape) -> Body {
    let mut body = Body::new(BodyType::Dynamic, position, 0.0);
    body.set_mass_data(&shape.compute_mass(1.0));
    body
}

fn unit_disk_body(position: Vec2, radius: f32, mass: f32) -> Body {
    let mut body = Body::new(BodyType::Dynamic, position, 0.0);
    body.mass = mass;
    body.inv_mass = 1.0 / mass;
    body.inertia = 0.5 * mass * radius * radius;
    body.inv_inertia = 1.0 / body.inertia;
    body
}

#[test]
fn overlapping_disks_separate() {
    // Two unit disks half a meter deep in each other, at rest.
    let disk = Shape::Circle(CircleShape::new(1.0));
    let mut world = TestWorld::new(Vec2::ZERO);
    let a = world.add_body(unit_disk_body(Vec2::ZERO, 1.0, 1.0), disk.clone());
    let b = world.add_body(unit_disk_body(Vec2::new(1.5, 0.0), 1.0, 1.0), disk);
    world.add_pair(a, b, 0.5, 0.0);

    world.contacts[0].update(
        &world.shapes[0],
        &world.bodies[0].xf,
        &world.shapes[1],
        &world.bodies[1].xf,
    );
    let manifold = world.contacts[0].manifold();
    match manifold {
        Manifold::Circles { local_point, point } => {
            assert_eq!(*local_point, Vec2::ZERO);
            assert_eq!(point.local_point, Vec2::ZERO);
        }
        other => panic!("expected circles manifold, got {other:?}"),
    }
    assert!((world.separations(0)[0] + 0.5).abs() < 1e-6);

    // One step makes progress; a few more reach the resting tolerance.
    world.step(1.0 / 60.0);
    let after_one = world.bodies[1].sweep.c.x - world.bodies[0].sweep.c.x;
    assert!(after_one > 1.5);

    for _ in 0..30 {
        world.step(1.0 / 60.0);
    }
    let gap = world.separations(0)[0];
    assert!(gap >= -3.0 * LINEAR_SLOP, "gap {gap} too deep");
    // Position correction is pseudo-velocity only: nothing got launched.
    assert!(world.bodies[0].linear_velocity.length() < 1e-3);
    assert!(world.bodies[1].linear_velocity.length() < 1e-3);
}

#[test]
fn disk_on_square_manifold() {
    let square = PolygonShape::new_box(1.0, 1.0);
    let disk = CircleShape::new(0.5);
    let m = tumble2d::tumble2d::collide::collide_polygon_circle(
        &square,
        &tumble2d::Transform::IDENTITY,
        &disk,
        &tumble2d::Transform::new(Vec2::new(0.0, 1.1), 0.0),
    );
    match &m {
        Manifold::FaceA(f) => {
            assert_eq!(f.local_normal.as_vec2(), Vec2::new(0.0, 1.0));
            assert_eq!(f.local_point, Vec2::new(0.0, 1.0));
            assert_eq!(f.points().len(), 1);
        }
        other => panic!("expected face-A manifold, got {other:?}"),
    }
    // Penetration of the shape surfaces is 0.4 (plus the polygon skin).
    let wm = WorldManifold::new(
        &m,
        &tumble2d::Transform::IDENTITY,
        square.radius,
        &tumble2d::Transform::new(Vec2::new(0.0, 1.1), 0.0),
        0.5,
    );
    assert!((wm.separations[0] + 0.4 + square.radius).abs() < 1e-6);
}

#[test]
fn bullet_disk_toi_matches_closed_form() {
    let a = CircleShape::new(0.1);
    let b = CircleShape::new(0.1);
    let sweep_a = Sweep {
        local_center: Vec2::ZERO,
        c0: Vec2::new(-5.0, 0.0),
        c: Vec2::new(5.0, 0.0),
        a0: 0.0,
        a: 0.0,
        alpha0: 0.0,
    };
    let sweep_b = Sweep {
        local_center: Vec2::ZERO,
        c0: Vec2::ZERO,
        c: Vec2::ZERO,
        a0: 0.0,
        a: 0.0,
        alpha0: 0.0,
    };
    let out = time_of_impact(&ToiInput {
        proxy_a: a.distance_proxy(),
        sweep_a,
        proxy_b: b.distance_proxy(),
        sweep_b,
        t_max: 1.0,
    });
    assert_eq!(out.state, ToiState::Touching);
    let target = (0.2_f32 - 3.0 * LINEAR_SLOP).max(LINEAR_SLOP);
    let expected = (5.0 - target) / 10.0;
    assert!(
        (out.t - expected).abs() < LINEAR_SLOP / 4.0,
        "toi {} vs expected {expected}",
        out.t
    );
}

#[test]
fn restitution_bounce_speed() {
    // Disk dropped at 5 m/s onto a static floor with restitution 0.5.
    let floor_shape = Shape::Polygon(PolygonShape::new_box(10.0, 1.0));
    let disk_shape = Shape::Circle(CircleShape::new(0.5));

    let mut world = TestWorld::new(Vec2::new(0.0, -10.0));
    let floor = world.add_body(Body::new(BodyType::Static, Vec2::new(0.0, -1.0), 0.0), floor_shape);
    let mut disk_body = dynamic_body(Vec2::new(0.0, 0.5), &disk_shape);
    disk_body.linear_velocity = Vec2::new(0.0, -5.0);
    let disk = world.add_body(disk_body, disk_shape);
    world.add_pair(floor, disk, 0.3, 0.5);

    world.step(1.0 / 60.0);

    let vy = world.bodies[disk].linear_velocity.y;
    assert!(
        (2.3..=2.6).contains(&vy),
        "bounce velocity {vy} outside [2.3, 2.6]"
    );
}

#[test]
fn stacked_boxes_settle() {
    let ground_shape = Shape::Polygon(PolygonShape::new_box(10.0, 1.0));
    let box_shape = Shape::Polygon(PolygonShape::new_box(0.5, 0.5));

    let mut world = TestWorld::new(Vec2::new(0.0, -10.0));
    let ground = world.add_body(Body::new(BodyType::Static, Vec2::new(0.0, -1.0), 0.0), ground_shape);
    let b1 = world.add_body(dynamic_body(Vec2::new(0.0, 0.5), &box_shape), box_shape.clone());
    let b2 = world.add_body(dynamic_body(Vec2::new(0.0, 1.5), &box_shape), box_shape.clone());
    let b3 = world.add_body(dynamic_body(Vec2::new(0.0, 2.5), &box_shape), box_shape.clone());
    world.add_pair(ground, b1, 0.5, 0.0);
    world.add_pair(b1, b2, 0.5, 0.0);
    world.add_pair(b2, b3, 0.5, 0.0);

    for _ in 0..120 {
        world.step(1.0 / 60.0);
    }

    for i in 0..3 {
        for separation in world.separations(i) {
            assert!(
                separation >= -3.0 * LINEAR_SLOP - 1e-4,
                "contact {i} penetration {separation}"
            );
        }
    }
    for &b in &[b1, b2, b3] {
        let v = world.bodies[b].linear_velocity.y.abs();
        assert!(v <= VELOCITY_THRESHOLD, "box {b} still moving at {v}");
    }

    // Non-penetration and impulse invariants on the cached manifolds.
    for contact in &world.contacts {
        for p in contact.manifold().points() {
            assert!(p.normal_impulse >= 0.0);
            assert!(p.tangent_impulse.abs() <= contact.friction * p.normal_impulse + 1e-5);
        }
    }
}

#[test]
fn head_on_collision_kills_relative_velocity() {
    // Equal masses, no gravity, zero restitution, closing at 2 m/s.
    let disk_shape = Shape::Circle(CircleShape::new(0.5));
    let mut world = TestWorld::new(Vec2::ZERO);
    let mut left = dynamic_body(Vec2::new(-0.5, 0.0), &disk_shape);
    left.linear_velocity = Vec2::new(1.0, 0.0);
    let mut right = dynamic_body(Vec2::new(0.5, 0.0), &disk_shape);
    right.linear_velocity = Vec2::new(-1.0, 0.0);
    let a = world.add_body(left, disk_shape.clone());
    let b = world.add_body(right, disk_shape);
    world.add_pair(a, b, 0.5, 0.0);

    world.step(1.0 / 60.0);

    let v_a = world.bodies[a].linear_velocity;
    let v_b = world.bodies[b].linear_velocity;
    // Momentum was zero and stays zero.
    assert!((v_a + v_b).length() < 1e-5);
    // Relative normal velocity ends within [-threshold, 0].
    let relative = (v_b - v_a).x;
    assert!(relative <= 1e-5 && relative >= -VELOCITY_THRESHOLD);
    // The impulse that stopped the approach is cached, non-negative.
    for p in world.contacts[0].manifold().points() {
        assert!(p.normal_impulse >= 0.0);
    }
}

#[test]
fn repeated_runs_are_bit_exact() {
    fn run() -> Vec<u32> {
        let ground_shape = Shape::Polygon(PolygonShape::new_box(10.0, 1.0));
        let box_shape = Shape::Polygon(PolygonShape::new_box(0.5, 0.5));
        let mut world = TestWorld::new(Vec2::new(0.0, -10.0));
        let ground = world.add_body(
            Body::new(BodyType::Static, Vec2::new(0.0, -1.0), 0.0),
            ground_shape,
        );
        let b1 = world.add_body(dynamic_body(Vec2::new(0.05, 0.5), &box_shape), box_shape.clone());
        let b2 = world.add_body(dynamic_body(Vec2::new(-0.03, 1.52), &box_shape), box_shape.clone());
        world.add_pair(ground, b1, 0.4, 0.1);
        world.add_pair(b1, b2, 0.4, 0.1);

        for _ in 0..45 {
            world.step(1.0 / 60.0);
        }

        world
            .bodies
            .iter()
            .flat_map(|body| {
                [
                    body.sweep.c.x.to_bits(),
                    body.sweep.c.y.to_bits(),
                    body.sweep.a.to_bits(),
                    body.linear_velocity.x.to_bits(),
                    body.linear_velocity.y.to_bits(),
                    body.angular_velocity.to_bits(),
                ]
            })
            .collect()
    }

    assert_eq!(run(), run());
}

#[test]
fn warm_start_neutral_on_zero_impulses() {
    // With no cached impulses, a warmed solve matches an unwarmed solve
    // given one extra velocity iteration, to within the slop tolerance.
    fn run(warm: bool) -> Vec2 {
        let disk_shape = Shape::Circle(CircleShape::new(0.5));
        let mut world = TestWorld::new(Vec2::ZERO);
        let mut left = dynamic_body(Vec2::new(-0.5, 0.0), &disk_shape);
        left.linear_velocity = Vec2::new(1.0, 0.0);
        let mut right = dynamic_body(Vec2::new(0.5, 0.0), &disk_shape);
        right.linear_velocity = Vec2::new(-1.0, 0.0);
        let a = world.add_body(left, disk_shape.clone());
        let _ = world.add_body(right, disk_shape);
        world.add_pair(a, a + 1, 0.5, 0.0);

        let mut step = StepConf::new(1.0 / 60.0);
        step.warm_starting = warm;
        if !warm {
            step.velocity_iterations += 1;
        }
        world.step_with(&step);
        world.bodies[a].linear_velocity
    }

    let warmed = run(true);
    let unwarmed = run(false);
    assert!((warmed - unwarmed).length() <= LINEAR_SLOP);
}

#[test]
fn narrow_phase_is_deterministic_over_random_poses() {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tumble2d::tumble2d::collide::collide_polygons;
    use tumble2d::Transform;

    fn manifold_bits(seed: u64) -> Vec<u32> {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = PolygonShape::new_box(1.0, 0.6);
        let b = PolygonShape::new_box(0.7, 0.9);
        let mut bits = Vec::new();
        for _ in 0..200 {
            let xf_a = Transform::new(
                Vec2::new(rng.gen_range(-0.5..0.5), rng.gen_range(-0.5..0.5)),
                rng.gen_range(-3.1..3.1),
            );
            let xf_b = Transform::new(
                Vec2::new(rng.gen_range(-1.5..1.5), rng.gen_range(-1.5..1.5)),
                rng.gen_range(-3.1..3.1),
            );
            let m = collide_polygons(&a, &xf_a, &b, &xf_b);
            bits.push(m.point_count() as u32);
            for p in m.points() {
                bits.push(p.local_point.x.to_bits());
                bits.push(p.local_point.y.to_bits());
            }
        }
        bits
    }

    assert_eq!(manifold_bits(0x7ab5), manifold_bits(0x7ab5));
}

#[test]
fn manifold_normals_mirror_under_swap() {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use tumble2d::tumble2d::collide::collide_polygons;
    use tumble2d::Transform;

    let mut rng = StdRng::seed_from_u64(0x51ab);
    let a = PolygonShape::new_box(1.0, 0.6);
    let b = PolygonShape::new_box(0.7, 0.9);
    let mut checked = 0;
    for _ in 0..300 {
        let xf_a = Transform::new(
            Vec2::new(rng.gen_range(-0.25..0.25), rng.gen_range(-0.25..0.25)),
            rng.gen_range(-3.1..3.1),
        );
        let xf_b = Transform::new(
            Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)),
            rng.gen_range(-3.1..3.1),
        );
        let ab = collide_polygons(&a, &xf_a, &b, &xf_b);
        let ba = collide_polygons(&b, &xf_b, &a, &xf_a);
        if ab.point_count() == 0 || ba.point_count() == 0 {
            continue;
        }
        let wm_ab = WorldManifold::new(&ab, &xf_a, a.radius, &xf_b, b.radius);
        let wm_ba = WorldManifold::new(&ba, &xf_b, b.radius, &xf_a, a.radius);
        // Skip grazing poses where the tie-break may pick either face.
        let deep = (0..ab.point_count()).any(|i| wm_ab.separations[i] < -0.02);
        if !deep {
            continue;
        }
        checked += 1;
        assert!(
            (wm_ab.normal + wm_ba.normal).length() < 0.2,
            "normals {:?} and {:?} are not mirrored",
            wm_ab.normal,
            wm_ba.normal
        );
    }
    assert!(checked > 20, "only {checked} overlapping poses sampled");
}

#[test]
fn toi_substep_stops_bullet() {
    // A bullet disk crossing a thin static wall in one step: advance both
    // bodies to the TOI, refresh the contact there, and sub-step solve.
    let wall_shape = Shape::Polygon(PolygonShape::new_box(0.05, 2.0));
    let disk_shape = Shape::Circle(CircleShape::new(0.1));

    let wall = Body::new(BodyType::Static, Vec2::ZERO, 0.0);
    let mut bullet = dynamic_body(Vec2::new(-2.0, 0.0), &disk_shape);
    bullet.linear_velocity = Vec2::new(240.0, 0.0);

    let dt = 1.0 / 60.0;
    let mut bodies = [wall, bullet];

    // Integrate free flight for the step: the endpoint is well past the
    // wall, which is the tunneling case.
    bodies[1].sweep.c0 = bodies[1].sweep.c;
    bodies[1].sweep.c += dt * bodies[1].linear_velocity;
    assert!(bodies[1].sweep.c.x > 1.0);

    let wall_proxy = match &wall_shape {
        Shape::Polygon(p) => p.distance_proxy(),
        _ => unreachable!(),
    };
    let disk_proxy = match &disk_shape {
        Shape::Circle(c) => c.distance_proxy(),
        _ => unreachable!(),
    };
    let out = time_of_impact(&ToiInput {
        proxy_a: wall_proxy,
        sweep_a: bodies[0].sweep,
        proxy_b: disk_proxy,
        sweep_b: bodies[1].sweep,
        t_max: 1.0,
    });
    assert_eq!(out.state, ToiState::Touching);

    // Advance to the impact time and rebuild the manifold there.
    bodies[1].advance(out.t);
    assert!(bodies[1].sweep.c.x < 0.0, "advance overshot the wall");

    let mut contact = Contact::new(0, 1, 0.2, 0.0);
    contact.update(&wall_shape, &bodies[0].xf, &disk_shape, &bodies[1].xf);
    assert!(contact.is_touching());

    let mut contacts = [contact];
    let mut arena = StepArena::new();
    let sub_step = StepConf::toi_sub_step((1.0 - out.t) * dt, 8);
    let mut island = Island::new(&mut bodies, &mut contacts);
    island.solve_toi(&mut arena, &sub_step, 0, 1);

    // The bullet ended the step on the near side of the wall, stopped.
    assert!(bodies[1].sweep.c.x < 0.0);
    assert!(bodies[1].linear_velocity.x <= 1e-3);
}
