use std::collections::HashMap;
use std::sync::Arc;

use rmcp::model::Tool;
use tracing::debug;

use super::catalog::ToolKind;
use super::error::RegistryError;
use super::JsonObject;

/// Published metadata of one tool and the handler variant it resolves to.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Arc<JsonObject>,
    pub kind: ToolKind,
}

impl ToolDefinition {
    pub fn from_kind(kind: ToolKind) -> Self {
        Self {
            name: kind.name().to_string(),
            description: kind.description().to_string(),
            input_schema: Arc::new(kind.input_schema()),
            kind,
        }
    }

    pub fn to_tool(&self) -> Tool {
        Tool::new(
            self.name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        )
    }
}

/// Insertion-ordered tool table, immutable once serving starts.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every tool in the catalog.
    pub fn with_catalog() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for kind in ToolKind::ALL {
            registry.register(ToolDefinition::from_kind(*kind))?;
        }
        debug!(tools = registry.len(), "Tool registry initialized");
        Ok(registry)
    }

    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), RegistryError> {
        if self.by_name.contains_key(&definition.name) {
            return Err(RegistryError::Duplicate(definition.name));
        }
        self.by_name
            .insert(definition.name.clone(), self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.by_name.get(name).map(|i| &self.definitions[*i])
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.definitions.iter().map(ToolDefinition::to_tool).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
