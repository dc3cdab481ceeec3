//! Model System - metadata for the model types associations connect
//!
//! - `attribute`: attribute (column) definitions and referential actions
//! - `definition`: model definitions and registered models
//! - `methods`: per-model capability table of instance methods
//! - `instance`: in-memory instances that receive method calls

pub mod attribute;
pub mod definition;
pub mod instance;
pub mod methods;

pub use attribute::{AttributeDefinition, ReferentialAction, References};
pub use definition::{Model, ModelDefinition, ModelState};
pub use instance::ModelInstance;
pub use methods::{MethodEntry, MethodFn, MethodOrigin, MethodTable};
