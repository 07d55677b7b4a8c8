mod appointment;
mod primitives;

pub use appointment::*;
pub use primitives::*;
