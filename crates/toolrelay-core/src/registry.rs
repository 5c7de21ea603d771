//! Registry of discovered tools.

use std::collections::HashMap;

use toolrelay_protocols::ToolDescriptor;
use tracing::debug;

use crate::error::RegistryError;

/// Immutable snapshot of the tools offered by one or more servers.
///
/// Built once after discovery and shared behind an `Arc`; there is no
/// mutation API, so no locking is needed.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from one server's `tools/list` answer.
    ///
    /// Every descriptor is attributed to `server`.
    pub fn from_discovery(
        server: &str,
        descriptors: impl IntoIterator<Item = ToolDescriptor>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            let descriptor = descriptor.with_server(server);
            if registry.index.contains_key(&descriptor.name) {
                return Err(RegistryError::Duplicate {
                    server: server.to_string(),
                    name: descriptor.name,
                });
            }
            registry.push(descriptor);
        }
        debug!(server, tools = registry.len(), "Built tool registry");
        Ok(registry)
    }

    /// Combine two registries. A name offered by both is an error.
    pub fn merge(mut self, other: ToolRegistry) -> Result<Self, RegistryError> {
        for descriptor in other.tools {
            if let Some(existing) = self.lookup(&descriptor.name) {
                return Err(RegistryError::Collision {
                    name: descriptor.name.clone(),
                    first: existing.server.clone().unwrap_or_default(),
                    second: descriptor.server.unwrap_or_default(),
                });
            }
            self.push(descriptor);
        }
        Ok(self)
    }

    fn push(&mut self, descriptor: ToolDescriptor) {
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
    }

    /// Find a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Check if a tool with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Server that provides the named tool.
    pub fn server_of(&self, name: &str) -> Option<&str> {
        self.lookup(name).and_then(|d| d.server.as_deref())
    }

    /// Every descriptor, in discovery order.
    pub fn describe_all(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Tool names, in discovery order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
