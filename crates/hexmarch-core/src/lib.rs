mod combat;
mod rng;
mod roster;
mod rules;
mod session;
mod strategist;
mod unit;
mod world;

pub use crate::combat::*;
pub use crate::rng::*;
pub use crate::roster::*;
pub use crate::rules::*;
pub use crate::session::*;
pub use crate::strategist::*;
pub use crate::unit::*;
pub use crate::world::*;
