//! Tool catalog - the static set of tools offered to the LLM
//!
//! Built once at process start and read-only afterwards. Partitioned into
//! read-only tools (execute immediately) and mutating tools (gated behind
//! user confirmation).

use tether_provider::ToolDefinition;

/// Catalog of available tool definitions
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDefinition>,
}

impl ToolCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool definition.
    ///
    /// A definition with an already-registered name replaces the old one.
    pub fn register(&mut self, tool: ToolDefinition) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name == tool.name) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Builder-style registration
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All tool definitions in registration order (for sending to the LLM)
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Tools that mutate state and require confirmation
    pub fn mutating(&self) -> Vec<&ToolDefinition> {
        self.tools
            .iter()
            .filter(|t| t.requires_confirmation)
            .collect()
    }

    /// Tools that only read and execute immediately
    pub fn read_only(&self) -> Vec<&ToolDefinition> {
        self.tools
            .iter()
            .filter(|t| !t.requires_confirmation)
            .collect()
    }

    /// Whether the named tool requires confirmation (false when unknown)
    pub fn requires_confirmation(&self, name: &str) -> bool {
        self.get(name).is_some_and(|t| t.requires_confirmation)
    }

    /// All tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> ToolCatalog {
        ToolCatalog::new()
            .with_tool(ToolDefinition::new("get_history", "Reads tracking history."))
            .with_tool(
                ToolDefinition::new("record_metric", "Records a metric.").with_confirmation(),
            )
            .with_tool(ToolDefinition::new("search_knowledge", "Searches saved knowledge."))
    }

    #[test]
    fn test_partitions() {
        let catalog = sample_catalog();

        let mutating: Vec<&str> = catalog.mutating().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(mutating, vec!["record_metric"]);

        let read_only: Vec<&str> = catalog.read_only().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(read_only, vec!["get_history", "search_knowledge"]);
    }

    #[test]
    fn test_requires_confirmation_lookup() {
        let catalog = sample_catalog();
        assert!(catalog.requires_confirmation("record_metric"));
        assert!(!catalog.requires_confirmation("get_history"));
        assert!(!catalog.requires_confirmation("unknown_tool"));
    }

    #[test]
    fn test_registration_order_preserved() {
        let catalog = sample_catalog();
        assert_eq!(
            catalog.names(),
            vec!["get_history", "record_metric", "search_knowledge"]
        );
    }

    #[test]
    fn test_reregistration_replaces() {
        let mut catalog = sample_catalog();
        catalog.register(ToolDefinition::new("get_history", "Updated description."));

        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.get("get_history").unwrap().description,
            "Updated description."
        );
    }
}
