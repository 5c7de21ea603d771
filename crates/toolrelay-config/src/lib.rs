//! # toolrelay config
//!
//! Run configuration: which tool servers to spawn, how they are sandboxed,
//! and the time budgets the client enforces.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
