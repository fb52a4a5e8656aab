//! Lodge Types - Pure type definitions for the lodging domain
//!
//! This crate contains only data types with no async runtime dependencies:
//! the six domain entities, the `Entity`/`EntityKind` sum types, and the
//! shared identity/timestamp/representation contract.

pub mod amenity;
pub mod city;
pub mod entity;
pub mod place;
pub mod review;
pub mod state;
pub mod user;

pub use amenity::*;
pub use city::*;
pub use entity::*;
pub use place::*;
pub use review::*;
pub use state::*;
pub use user::*;
