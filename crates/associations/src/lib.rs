//! # elif-associations: Association Registration for elif.rs
//!
//! Declares typed relationships between models (belongs-to, has-one,
//! has-many, belongs-to-many) and keeps the model metadata consistent while
//! doing so: unique aliases, synthesized foreign key constraints and generated
//! instance accessors that never shadow user methods.
//!
//! Everything lives on an explicit [`ModelRegistry`]; there is no global state.

pub mod associations;
pub mod config;
pub mod error;
pub mod hooks;
pub mod model;
pub mod naming;
pub mod registry;


// Re-export core types
pub use associations::*;
pub use config::*;
pub use error::*;
pub use hooks::{AssociateHook, AssociateHookPayload, HookEvent, Hooks};
pub use model::*;
pub use registry::*;
