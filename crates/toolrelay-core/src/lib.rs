//! # toolrelay core
//!
//! The tool registry built from discovery and the argument checks run
//! before any call leaves the process.
//!
//! ## Components
//!
//! - [`ToolRegistry`] - Immutable snapshot of every discovered tool
//! - [`validate_arguments`] - JSON Schema check of a call's arguments

pub mod error;
pub mod registry;
pub mod validation;

pub use error::{InvalidArguments, RegistryError};
pub use registry::ToolRegistry;
pub use validation::validate_arguments;
