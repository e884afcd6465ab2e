//! Core value types for fluidb.

mod params;
mod value;

pub use params::Params;
pub use value::{Record, Value};
