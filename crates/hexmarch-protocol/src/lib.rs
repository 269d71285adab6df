mod event;
mod ids;
mod snapshot;
mod types;

pub use crate::event::*;
pub use crate::ids::*;
pub use crate::snapshot::*;
pub use crate::types::*;
