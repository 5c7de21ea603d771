//! Registry and validation errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool server '{server}' advertised tool '{name}' more than once")]
    Duplicate { server: String, name: String },

    #[error("Tool '{name}' is provided by both '{first}' and '{second}'")]
    Collision {
        name: String,
        first: String,
        second: String,
    },
}

/// Arguments rejected by a tool's parameter schema.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid arguments for '{tool}': {}", .violations.join("; "))]
pub struct InvalidArguments {
    pub tool: String,
    pub violations: Vec<String>,
}
