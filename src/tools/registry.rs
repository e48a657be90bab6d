use std::collections::HashMap;

use tracing::info;

use super::descriptor::ToolDescriptor;
use super::tool::ToolKind;
use crate::config::ServerConfig;
use crate::error::{OcrMcpError, Result};

struct ToolEntry {
    descriptor: ToolDescriptor,
    kind: ToolKind,
}

/// Name to tool mapping, filled once at startup and shared read-only
/// afterwards (wrap it in an `Arc` and stop mutating it).
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Registry holding every built-in tool, in discovery order.
    pub fn builtin(config: &ServerConfig) -> Result<Self> {
        let mut registry = Self::new();
        for kind in ToolKind::ALL {
            registry.register(kind.descriptor(config), kind)?;
        }
        info!(
            tools = ?registry.names().collect::<Vec<_>>(),
            "registered built-in tools"
        );
        Ok(registry)
    }

    pub fn register(&mut self, descriptor: ToolDescriptor, kind: ToolKind) -> Result<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(OcrMcpError::DuplicateTool(descriptor.name));
        }
        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(ToolEntry { descriptor, kind });
        Ok(())
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> impl ExactSizeIterator<Item = &ToolDescriptor> {
        self.entries.iter().map(|entry| &entry.descriptor)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.descriptor.name.as_str())
    }

    pub fn lookup(&self, name: &str) -> Option<ToolKind> {
        self.entry(name).map(|(_, kind)| kind)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.entry(name).map(|(descriptor, _)| descriptor)
    }

    pub fn entry(&self, name: &str) -> Option<(&ToolDescriptor, ToolKind)> {
        self.index
            .get(name)
            .map(|&idx| &self.entries[idx])
            .map(|entry| (&entry.descriptor, entry.kind))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
