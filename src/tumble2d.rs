pub mod arena;
pub mod body;
pub mod collide;
pub mod collide_edge;
pub mod common;
pub mod contact;
pub mod contact_solver;
pub mod distance;
pub mod island;
pub mod joint;
pub mod manifold;
pub mod shape;
pub mod time_of_impact;
pub mod time_step;

pub use self::common::math;

pub use self::arena::StepArena;
pub use self::body::{Body, BodyFlags, BodyType};
pub use self::contact::Contact;
pub use self::island::Island;
pub use self::manifold::Manifold;
pub use self::math::{Rot, Sweep, Transform, UnitVec2, Vec2};
pub use self::time_step::{SolverStats, StepConf};
