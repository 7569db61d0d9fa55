//! Domain module for Dividend Distribution
//!
//! Contains core entities, the reference forest arena, round instructions,
//! controller authority and errors.

pub mod authority;
pub mod entities;
pub mod errors;
pub mod forest;
pub mod instruction;
pub mod value_objects;

pub use authority::*;
pub use entities::*;
pub use errors::*;
pub use forest::*;
pub use instruction::*;
pub use value_objects::*;
