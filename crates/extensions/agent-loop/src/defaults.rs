//! Argument defaults applied before a call is validated and sent.

use serde_json::{Map, Value};

use toolrelay_protocols::ToolDescriptor;

/// Fills arguments the oracle left out.
///
/// Implementations only add missing keys; values chosen by the oracle win.
pub trait ArgumentDefaults: Send + Sync {
    fn fill(&self, descriptor: &ToolDescriptor, arguments: &mut Map<String, Value>);
}

/// Leaves arguments untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDefaults;

impl ArgumentDefaults for NoDefaults {
    fn fill(&self, _descriptor: &ToolDescriptor, _arguments: &mut Map<String, Value>) {}
}
