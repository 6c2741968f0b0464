pub use std::mem::swap;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::splat(0.0);
    pub const ONE: Self = Self::splat(1.0);

    /// Poison marker. Any arithmetic involving it stays invalid, so a
    /// sentinel that escapes a hot path is caught by `is_valid` checks
    /// downstream rather than silently producing geometry.
    pub const INVALID: Self = Self::splat(f32::NAN);

    #[inline(always)]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline(always)]
    pub const fn splat(value: f32) -> Self {
        Self { x: value, y: value }
    }

    /// Both components are finite (not NaN, not infinite).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.x.hypot(self.y)
    }

    #[inline]
    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    pub fn distance(&self, other: Self) -> f32 {
        (other - *self).length()
    }

    #[inline]
    pub fn distance_squared(&self, other: Self) -> f32 {
        (other - *self).length_squared()
    }

    #[inline]
    pub fn dot(&self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn cross(&self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// `v x s`: a clockwise perpendicular scaled by `s`.
    #[inline]
    pub fn cross_scalar(&self, scalar: f32) -> Self {
        Self {
            x: scalar * self.y,
            y: -scalar * self.x,
        }
    }

    /// `s x v`: a counter-clockwise perpendicular scaled by `s`.
    #[inline]
    pub fn scalar_cross(scalar: f32, vec: Self) -> Self {
        Self {
            x: -scalar * vec.y,
            y: scalar * vec.x,
        }
    }

    #[inline]
    pub fn normalize(&self) -> Self {
        let len = self.length();
        debug_assert!(len != 0.0);
        Self {
            x: self.x / len,
            y: self.y / len,
        }
    }

    #[inline]
    pub fn mul_scalar(&self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    #[inline]
    pub fn abs(&self) -> Self {
        Self {
            x: self.x.abs(),
            y: self.y.abs(),
        }
    }

    #[inline]
    pub fn min(&self, other: Self) -> Self {
        Self {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
        }
    }

    #[inline]
    pub fn max(&self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
        }
    }

    #[inline]
    pub fn clamp(&self, min: Self, max: Self) -> Self {
        self.max(min).min(max)
    }
}

impl Default for Vec2 {
    #[inline(always)]
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, other: f32) -> Self {
        Self {
            x: self.x * other,
            y: self.y * other,
        }
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;
    #[inline]
    fn mul(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: self * other.x,
            y: self * other.y,
        }
    }
}

impl MulAssign<f32> for Vec2 {
    #[inline]
    fn mul_assign(&mut self, other: f32) {
        self.x *= other;
        self.y *= other;
    }
}

/// A direction stored as its cosine/sine pair. Always unit length when
/// valid; the invalid sentinel means "no direction" (e.g. the local
/// normal of a circles-type manifold).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UnitVec2 {
    x: f32,
    y: f32,
}

impl UnitVec2 {
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0 };
    pub const UP: Self = Self { x: 0.0, y: 1.0 };
    pub const LEFT: Self = Self { x: -1.0, y: 0.0 };
    pub const DOWN: Self = Self { x: 0.0, y: -1.0 };
    pub const INVALID: Self = Self {
        x: f32::NAN,
        y: f32::NAN,
    };

    /// Direction at `angle` radians from the positive X-axis.
    #[inline]
    pub fn at_angle(angle: f32) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    /// Normalizes `v`, yielding the direction and the magnitude it had.
    /// Returns `None` for vectors too short to carry a direction.
    #[inline]
    pub fn try_new(v: Vec2) -> Option<(Self, f32)> {
        let len = v.length();
        if len < f32::EPSILON || !len.is_finite() {
            return None;
        }
        Some((
            Self {
                x: v.x / len,
                y: v.y / len,
            },
            len,
        ))
    }

    /// Like `try_new` but collapses the failure case into the sentinel.
    #[inline]
    pub fn new_or_invalid(v: Vec2) -> Self {
        match Self::try_new(v) {
            Some((u, _)) => u,
            None => Self::INVALID,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn as_vec2(&self) -> Vec2 {
        Vec2 {
            x: self.x,
            y: self.y,
        }
    }

    #[inline]
    pub fn dot(&self, v: Vec2) -> f32 {
        self.x * v.x + self.y * v.y
    }

    #[inline]
    pub fn cross(&self, v: Vec2) -> f32 {
        self.x * v.y - self.y * v.x
    }

    /// Clockwise perpendicular (the "forward" perpendicular).
    #[inline]
    pub fn fwd_perpendicular(&self) -> Self {
        Self {
            x: self.y,
            y: -self.x,
        }
    }

    /// Counter-clockwise perpendicular.
    #[inline]
    pub fn rev_perpendicular(&self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }
}

impl Neg for UnitVec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl Mul<f32> for UnitVec2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, other: f32) -> Vec2 {
        Vec2 {
            x: self.x * other,
            y: self.y * other,
        }
    }
}

impl Mul<UnitVec2> for f32 {
    type Output = Vec2;
    #[inline]
    fn mul(self, other: UnitVec2) -> Vec2 {
        Vec2 {
            x: self * other.x,
            y: self * other.y,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Mat2x2 {
    pub col1: Vec2,
    pub col2: Vec2,
}

impl Mat2x2 {
    pub const ZERO: Mat2x2 = Mat2x2 {
        col1: Vec2::ZERO,
        col2: Vec2::ZERO,
    };

    pub const IDENTITY: Mat2x2 = Mat2x2 {
        col1: Vec2::new(1.0, 0.0),
        col2: Vec2::new(0.0, 1.0),
    };

    #[inline(always)]
    pub const fn new(m00: f32, m01: f32, m10: f32, m11: f32) -> Self {
        Self {
            col1: Vec2::new(m00, m10),
            col2: Vec2::new(m01, m11),
        }
    }

    #[inline(always)]
    pub const fn from_cols(col1: Vec2, col2: Vec2) -> Self {
        Self { col1, col2 }
    }

    #[inline]
    pub const fn transpose(&self) -> Self {
        Self {
            col1: Vec2::new(self.col1.x, self.col2.x),
            col2: Vec2::new(self.col1.y, self.col2.y),
        }
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.col1.x * self.col2.y - self.col2.x * self.col1.y
    }

    #[inline]
    pub fn invert(&self) -> Self {
        let inv_det = {
            let det = self.determinant();
            debug_assert!(det != 0.0);
            det.recip()
        };
        Self::new(
            inv_det * self.col2.y,
            -inv_det * self.col2.x,
            -inv_det * self.col1.y,
            inv_det * self.col1.x,
        )
    }
}

impl Mul<Vec2> for Mat2x2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: self.col1.x * other.x + self.col2.x * other.y,
            y: self.col1.y * other.x + self.col2.y * other.y,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rot {
    /// Sine
    s: f32,
    /// Cosine
    c: f32,
}

impl Rot {
    /// Construct a new rotation from an angle in radians.
    #[inline(always)]
    pub fn new(angle: f32) -> Self {
        Self {
            s: angle.sin(),
            c: angle.cos(),
        }
    }

    /// Get the angle in radians.
    #[inline]
    pub fn get_angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Get the X-axis
    #[inline]
    pub fn get_x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// Get the Y-axis
    #[inline]
    pub fn get_y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Get the inverse of this rotation.
    #[inline]
    pub fn get_inverse(&self) -> Self {
        Self {
            s: -self.s,
            c: self.c,
        }
    }

    /// Inverse-rotate a vector.
    #[inline]
    pub fn mul_t_vec2(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }
}

impl Mul for Rot {
    type Output = Self;
    #[inline]
    fn mul(self, other: Self) -> Self {
        Self {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }
}

impl Mul<Vec2> for Rot {
    type Output = Vec2;
    #[inline]
    fn mul(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: self.c * other.x - self.s * other.y,
            y: self.s * other.x + self.c * other.y,
        }
    }
}

impl Mul<UnitVec2> for Rot {
    type Output = UnitVec2;
    #[inline]
    fn mul(self, other: UnitVec2) -> UnitVec2 {
        UnitVec2 {
            x: self.c * other.x - self.s * other.y,
            y: self.s * other.x + self.c * other.y,
        }
    }
}

impl Default for Rot {
    #[inline(always)]
    fn default() -> Self {
        Self { s: 0.0, c: 1.0 }
    }
}

/// A transform contains translation and rotation. It is used to represent
/// the position and orientation of rigid frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        p: Vec2::ZERO,
        q: Rot { s: 0.0, c: 1.0 },
    };

    /// Set this based on the position and angle.
    #[inline(always)]
    pub fn new(p: Vec2, angle: f32) -> Self {
        Self {
            p,
            q: Rot::new(angle),
        }
    }

    /// Get the angle in radians.
    #[inline]
    pub fn get_angle(&self) -> f32 {
        self.q.get_angle()
    }

    /// Multiply a vector by this transform.
    #[inline]
    pub fn mul_vec2(&self, v: Vec2) -> Vec2 {
        self.q * v + self.p
    }

    /// Multiply a vector by the inverse of this transform.
    #[inline]
    pub fn mul_t_vec2(&self, v: Vec2) -> Vec2 {
        self.q.mul_t_vec2(v - self.p)
    }

    /// Multiply a transform by this transform.
    #[inline]
    pub fn mul(&self, t: Self) -> Self {
        Self {
            p: self.mul_vec2(t.p),
            q: self.q * t.q,
        }
    }

    /// Multiply a transform by the inverse of this transform.
    #[inline]
    pub fn mul_t(&self, t: Self) -> Self {
        let q_inv = self.q.get_inverse();
        Self {
            p: q_inv * (t.p - self.p),
            q: q_inv * t.q,
        }
    }
}

impl Mul<Vec2> for Transform {
    type Output = Vec2;
    #[inline]
    fn mul(self, other: Vec2) -> Vec2 {
        self.mul_vec2(other)
    }
}

/// This describes the motion of a body/shape for TOI computation.
/// Shapes are defined with respect to the body origin, which may
/// not coincide with the center of mass. However, to support dynamics
/// we must interpolate the center of mass position.
#[derive(Clone, Copy, Debug)]
pub struct Sweep {
    /// Local center of mass position
    pub local_center: Vec2,

    /// Center world positions
    pub c0: Vec2,
    pub c: Vec2,

    /// World angles
    pub a0: f32,
    pub a: f32,

    /// Fraction of the current time step in the range [0,1].
    /// c0 and a0 are the positions at alpha0.
    pub alpha0: f32,
}

impl Sweep {
    /// Get the interpolated transform at a specific time.
    /// `beta` is a factor in [0,1], where 0 indicates alpha0.
    pub fn get_transform(&self, beta: f32) -> Transform {
        let c = (1.0 - beta) * self.c0 + beta * self.c;
        let a = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::new(a);
        // Shift to origin.
        Transform {
            p: c - q * self.local_center,
            q,
        }
    }

    /// Advance the sweep forward, yielding a new initial state.
    /// `alpha` is the new initial time.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Normalize the angles so the root finder sees small rotations.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * std::f32::consts::PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

impl Default for Sweep {
    #[inline(always)]
    fn default() -> Self {
        Self {
            local_center: Vec2::default(),
            c0: Vec2::default(),
            c: Vec2::default(),
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equality_with_tolerance(m1: Mat2x2, m2: Mat2x2, tolerance: f32) -> bool {
        ((m1.col1.x - m2.col1.x).abs() < tolerance)
            && ((m1.col1.y - m2.col1.y).abs() < tolerance)
            && ((m1.col2.x - m2.col2.x).abs() < tolerance)
            && ((m1.col2.y - m2.col2.y).abs() < tolerance)
    }

    #[test]
    fn test_invert() {
        let m = Mat2x2::new(1.0, 2.0, 3.0, 4.0);
        let result = m.invert();
        let expected = Mat2x2::new(-2.0, 1.0, 3.0 / 2.0, -1.0 / 2.0);
        assert!(equality_with_tolerance(result, expected, 0.0001));
    }

    #[test]
    fn invalid_sentinels_propagate() {
        assert!(!Vec2::INVALID.is_valid());
        assert!(!(Vec2::INVALID + Vec2::ONE).is_valid());
        assert!(!UnitVec2::INVALID.is_valid());
        assert!(UnitVec2::try_new(Vec2::ZERO).is_none());
    }

    #[test]
    fn unit_vec_normalizes() {
        let (u, len) = UnitVec2::try_new(Vec2::new(3.0, 4.0)).unwrap();
        assert!((len - 5.0).abs() < 1e-6);
        assert!((u.x() - 0.6).abs() < 1e-6);
        assert!((u.y() - 0.8).abs() < 1e-6);
        assert!((u.as_vec2().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sweep_interpolates_about_local_center() {
        let sweep = Sweep {
            local_center: Vec2::new(0.5, 0.0),
            c0: Vec2::new(0.0, 0.0),
            c: Vec2::new(2.0, 0.0),
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        };
        let xf = sweep.get_transform(0.5);
        // Center at (1, 0); origin is center minus rotated local center.
        assert!((xf.p.x - 0.5).abs() < 1e-6);
        assert!((xf.p.y - 0.0).abs() < 1e-6);
    }

    #[test]
    fn sweep_advance_preserves_endpoint() {
        let mut sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::new(0.0, 0.0),
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        };
        sweep.advance(0.25);
        assert!((sweep.alpha0 - 0.25).abs() < 1e-6);
        assert!((sweep.c0.x - 2.5).abs() < 1e-6);
        assert!((sweep.c.x - 10.0).abs() < 1e-6);
        // The pose at the advanced start matches the original at t=0.25.
        let xf = sweep.get_transform(0.0);
        assert!((xf.p.x - 2.5).abs() < 1e-5);
    }

    #[test]
    fn transform_roundtrip() {
        let xf = Transform::new(Vec2::new(1.0, -2.0), 0.7);
        let v = Vec2::new(3.0, 4.0);
        let back = xf.mul_t_vec2(xf.mul_vec2(v));
        assert!((back.x - v.x).abs() < 1e-5);
        assert!((back.y - v.y).abs() < 1e-5);
    }
}
