use bitflags::bitflags;

use super::math::{Rot, Sweep, Transform, Vec2};
use super::shape::MassData;

/// The body type.
/// - static: zero mass, zero velocity, may be manually moved
/// - kinematic: zero mass, non-zero velocity set by user, moved by solver
/// - dynamic: positive mass, non-zero velocity determined by forces, moved
///   by solver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyType {
    Static,
    Kinematic,
    Dynamic,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BodyFlags: u16 {
        const ISLAND = 0x0001;
        /// Fast-moving body that the TOI sweep must keep from tunneling.
        const BULLET = 0x0002;
        const FIXED_ROTATION = 0x0004;
        /// Sweep has already been advanced by a TOI this step.
        const TOI = 0x0008;
    }
}

/// A rigid body as the solver core sees it: pose, sweep, velocity, and
/// mass properties. Fixture and lifecycle management live with the caller;
/// the core only reads mass data and writes velocity and position.
#[derive(Clone, Debug)]
pub struct Body {
    pub body_type: BodyType,
    pub flags: BodyFlags,

    /// Origin transform, kept in sync with the sweep endpoint.
    pub xf: Transform,
    pub sweep: Sweep,

    pub linear_velocity: Vec2,
    pub angular_velocity: f32,

    pub force: Vec2,
    pub torque: f32,

    pub mass: f32,
    pub inv_mass: f32,

    /// Rotational inertia about the center of mass.
    pub inertia: f32,
    pub inv_inertia: f32,

    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
}

impl Body {
    pub fn new(body_type: BodyType, position: Vec2, angle: f32) -> Self {
        let xf = Transform::new(position, angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: xf.p,
            c: xf.p,
            a0: angle,
            a: angle,
            alpha0: 0.0,
        };
        Self {
            body_type,
            flags: BodyFlags::empty(),
            xf,
            sweep,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
        }
    }

    /// Adopt the mass properties of a shape. Dynamic bodies with zero mass
    /// get one kilogram so they stay solvable.
    pub fn set_mass_data(&mut self, mass_data: &MassData) {
        if self.body_type != BodyType::Dynamic {
            self.mass = 0.0;
            self.inv_mass = 0.0;
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
            return;
        }

        self.mass = mass_data.mass;
        if self.mass <= 0.0 {
            self.mass = 1.0;
        }
        self.inv_mass = 1.0 / self.mass;

        if mass_data.inertia > 0.0 && !self.flags.contains(BodyFlags::FIXED_ROTATION) {
            // Inertia about the center of mass.
            self.inertia =
                mass_data.inertia - self.mass * mass_data.center.dot(mass_data.center);
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        // Move the sweep center to the new center of mass.
        let old_center = self.sweep.c;
        self.sweep.local_center = mass_data.center;
        let new_center = self.xf.mul_vec2(self.sweep.local_center);
        self.sweep.c0 = new_center;
        self.sweep.c = new_center;

        // Update center of mass velocity.
        self.linear_velocity +=
            Vec2::scalar_cross(self.angular_velocity, new_center - old_center);
    }

    #[inline]
    pub fn is_bullet(&self) -> bool {
        self.flags.contains(BodyFlags::BULLET)
    }

    /// Rebuild the origin transform from the sweep endpoint.
    pub fn synchronize_transform(&mut self) {
        let q = Rot::new(self.sweep.a);
        self.xf = Transform {
            p: self.sweep.c - q * self.sweep.local_center,
            q,
        };
    }

    /// Advance the body pose to the given sweep time, anchoring the sweep
    /// there. Used by TOI sub-stepping.
    pub fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }
}
