//! Entity layer
//!
//! Descriptors carry the static metadata for an entity type, the registry
//! resolves polymorphic type names back to descriptors, and [`Entity`] is
//! the in-memory row with dirty tracking and persistence.

pub mod descriptor;
pub mod entity;

pub use descriptor::{EntityDescriptor, EntityRegistry};
pub use entity::Entity;
