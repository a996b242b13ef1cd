pub mod analytics;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::providers::utils::is_valid_function_name;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Execution failed: {0}")]
    ExecutionError(String),
    #[error("Tool not found: {0}")]
    NotFound(String),
}

/// A tool definition as advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub input_schema: Value,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Trait for implementing callable tools
#[async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    /// The name of the tool
    fn name(&self) -> &'static str;

    /// A description of what the tool does
    fn description(&self) -> &'static str;

    /// JSON schema describing the tool's parameters
    fn schema(&self) -> Value;

    /// Execute the tool with the given parameters
    async fn call(&self, params: Value) -> Result<Value, ToolError>;
}

/// A fixed set of tools, looked up by name
#[derive(Clone, Default)]
pub struct ToolRegistry {
    order: Vec<&'static str>,
    handlers: HashMap<&'static str, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shipped with the server
    pub fn with_builtin_tools() -> Self {
        Self::new()
            .with_tool(analytics::CalculateCtr)
            .with_tool(analytics::AggregateSearchMetrics)
    }

    /// Register a tool. A later tool with the same name replaces the earlier one.
    ///
    /// # Panics
    /// If the tool name is not a valid function name (`[a-zA-Z0-9_-]+`)
    pub fn with_tool(mut self, handler: impl ToolHandler) -> Self {
        let name = handler.name();
        assert!(is_valid_function_name(name), "invalid tool name: {name:?}");
        if self.handlers.insert(name, Arc::new(handler)).is_none() {
            self.order.push(name);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Definitions in registration order
    pub fn definitions(&self) -> Vec<Tool> {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|handler| Tool::new(handler.name(), handler.description(), handler.schema()))
            .collect()
    }

    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        handler.call(arguments).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo the arguments back"
        }

        fn schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, params: Value) -> Result<Value, ToolError> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_name() {
        let registry = ToolRegistry::new().with_tool(Echo);
        let result = registry.dispatch("echo", json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.dispatch("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "missing"));
    }

    #[test]
    fn test_definitions_keep_registration_order() {
        let registry = ToolRegistry::with_builtin_tools().with_tool(Echo).with_tool(Echo);
        let names: Vec<_> = registry.definitions().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["calculate_ctr", "aggregate_search_metrics", "echo"]
        );
        assert_eq!(registry.len(), 3);
    }
}
