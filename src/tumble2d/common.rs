//! Global tuning constants based on meters-kilograms-seconds (MKS) units.

pub mod math;

/// Scale the solver tolerances when simulating in units other than meters.
pub const LENGTH_UNITS_PER_METER: f32 = 1.0;

/// The maximum number of contact points between two convex shapes. Do
/// not change this value.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// The maximum number of vertices on a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// A small length used as a collision and constraint tolerance. Usually it is
/// chosen to be numerically significant, but visually insignificant. In meters.
pub const LINEAR_SLOP: f32 = 0.005 * LENGTH_UNITS_PER_METER;

/// A small angle used as a collision and constraint tolerance. Usually it is
/// chosen to be numerically significant, but visually insignificant.
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// The radius of the polygon/edge shape skin. This should not be modified.
/// Making this smaller means polygons will have an insufficient buffer for
/// continuous collision. Making it larger may create artifacts for vertex
/// collision.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// The maximum linear position correction used when solving constraints.
/// This helps to prevent overshoot. Meters.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2 * LENGTH_UNITS_PER_METER;

/// The maximum angular position correction used when solving constraints.
/// This helps to prevent overshoot.
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * std::f32::consts::PI;

/// The maximum linear translation of a body per step. This limit is very
/// large and is used to prevent numerical problems. You shouldn't need to
/// adjust this. Meters.
pub const MAX_TRANSLATION: f32 = 2.0 * LENGTH_UNITS_PER_METER;
pub const MAX_TRANSLATION_SQUARED: f32 = MAX_TRANSLATION * MAX_TRANSLATION;

/// The maximum angular rotation of a body per step. This limit is very large
/// and is used to prevent numerical problems. You shouldn't need to adjust
/// this.
pub const MAX_ROTATION: f32 = 0.5 * std::f32::consts::PI;
pub const MAX_ROTATION_SQUARED: f32 = MAX_ROTATION * MAX_ROTATION;

/// A velocity threshold for elastic collisions. Any collision with a relative
/// linear velocity below this threshold will be treated as inelastic.
pub const VELOCITY_THRESHOLD: f32 = 1.0 * LENGTH_UNITS_PER_METER;

/// This scale factor controls how fast overlap is resolved. Ideally this
/// would be 1 so that overlap is removed in one time step. However using
/// values close to 1 often lead to overshoot.
pub const BAUMGARTE: f32 = 0.2;
pub const TOI_BAUMGARTE: f32 = 0.75;

/// Maximum iterations of the outer time-of-impact loop.
pub const MAX_TOI_ITERATIONS: usize = 20;

/// Maximum iterations of the 1D time-of-impact root finder.
pub const MAX_TOI_ROOT_ITER_COUNT: usize = 50;

/// Maximum number of sub-steps per contact in continuous physics simulation.
pub const MAX_SUB_STEPS: usize = 8;

/// Maximum number of contacts to be handled to solve a TOI impact.
pub const MAX_TOI_CONTACTS: usize = 32;

/// Default iteration counts for the island solver.
pub const VELOCITY_ITERATIONS: usize = 8;
pub const POSITION_ITERATIONS: usize = 3;

/// Position iterations for a TOI sub-step. The sub-step works on a pair of
/// bodies at a time, so it can afford more of them.
pub const TOI_POSITION_ITERATIONS: usize = 20;
