//! Collision and constraint solver core for 2D rigid-body physics:
//! convex narrow phase with persistent manifolds, a conservative
//! time-of-impact search for fast bodies, and an iterative
//! velocity/position contact solver with warm starting.
//!
//! Broad-phase culling, body and fixture lifecycle, and joints beyond the
//! contact constraints are the caller's business; the core consumes shape
//! proxies, body state, and an ordered pair list, and mutates only
//! manifolds, caches, velocities, and positions.
//!
//! Solves are deterministic per platform: fixed iteration counts, stable
//! constraint order, and no early exit in the velocity phase.

pub mod tumble2d;

pub use tumble2d::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
pub use tumble2d::manifold::{ContactFeature, WorldManifold};
pub use tumble2d::shape::{ChainShape, CircleShape, EdgeShape, PolygonShape, Shape};
pub use tumble2d::time_of_impact::{time_of_impact, ToiInput, ToiOutput, ToiState};
pub use tumble2d::*;
