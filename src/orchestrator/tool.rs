//! Tool system: async tools with runtime registration and named chains.
//!
//! Tools are the engine's interface to the outside world (retrieval, files,
//! web, model calls). Each tool implements the [`Tool`] trait and is
//! registered in a [`ToolRegistry`], which the orchestrator consumes through
//! the [`ToolManager`] trait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ToolError, ToolResult};

/// Description of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique name of the tool.
    pub name: String,
    /// What this tool does.
    pub description: String,
    /// Grouping such as "retrieval" or "file".
    pub category: String,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: category.into(),
        }
    }
}

/// A tool the engine can execute.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Describe this tool.
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool on JSON arguments.
    async fn execute(&self, args: Value) -> ToolResult<Value>;
}

/// One step of a chain: a tool plus its fixed arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStep {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

impl ChainStep {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

/// Outcome of running a chain. A failed step stops the chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainResult {
    pub success: bool,
    /// Output of every step that ran successfully.
    pub results: Vec<Value>,
    pub final_output: Option<Value>,
    pub error: Option<String>,
}

/// Per-tool execution counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ToolStats {
    pub calls: u64,
    pub failures: u64,
    pub total_time_ms: u64,
}

/// What the orchestrator needs from a tool layer.
#[async_trait]
pub trait ToolManager: Send + Sync {
    fn available_tools(&self) -> Vec<ToolDescriptor>;

    async fn execute_tool(&self, name: &str, args: Value, timeout_ms: u64) -> ToolResult<Value>;

    async fn execute_chain(
        &self,
        name: &str,
        args: Value,
        timeout_ms: u64,
    ) -> ToolResult<ChainResult>;

    fn execution_stats(&self) -> HashMap<String, ToolStats>;
}

/// Registry of available tools and named chains.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    chains: HashMap<String, Vec<ChainStep>>,
    stats: DashMap<String, ToolStats>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            chains: HashMap::new(),
            stats: DashMap::new(),
        }
    }

    /// Register a tool. If a tool with the same name exists, it is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.descriptor().name;
        self.tools.insert(name, tool);
    }

    /// Define a named chain. Each step receives the previous step's output
    /// as its `input` argument.
    pub fn define_chain(&mut self, name: impl Into<String>, steps: Vec<ChainStep>) {
        self.chains.insert(name.into(), steps);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// List all registered tool descriptors, sorted by name.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut list: Vec<ToolDescriptor> = self.tools.values().map(|t| t.descriptor()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub fn chain_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    async fn run(&self, name: &str, args: Value, timeout_ms: u64) -> ToolResult<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound { name: name.into() })?;

        let started = Instant::now();
        let outcome =
            match tokio::time::timeout(Duration::from_millis(timeout_ms), tool.execute(args)).await
            {
                Ok(result) => result,
                Err(_) => Err(ToolError::Timeout {
                    name: name.into(),
                    timeout_ms,
                }),
            };
        let elapsed = started.elapsed().as_millis() as u64;

        let mut stats = self.stats.entry(name.to_string()).or_default();
        stats.calls += 1;
        stats.total_time_ms += elapsed;
        if outcome.is_err() {
            stats.failures += 1;
        }
        drop(stats);

        match &outcome {
            Ok(_) => tracing::debug!(tool = name, elapsed_ms = elapsed, "tool finished"),
            Err(e) => tracing::warn!(tool = name, error = %e, "tool failed"),
        }
        outcome
    }
}

/// Merge `input` into a step's fixed arguments.
fn step_args(args: &Value, input: &Value) -> Value {
    match args {
        Value::Object(map) => {
            let mut map = map.clone();
            map.insert("input".into(), input.clone());
            Value::Object(map)
        }
        Value::Null => serde_json::json!({ "input": input }),
        other => serde_json::json!({ "args": other, "input": input }),
    }
}

#[async_trait]
impl ToolManager for ToolRegistry {
    fn available_tools(&self) -> Vec<ToolDescriptor> {
        self.list()
    }

    async fn execute_tool(&self, name: &str, args: Value, timeout_ms: u64) -> ToolResult<Value> {
        self.run(name, args, timeout_ms).await
    }

    async fn execute_chain(
        &self,
        name: &str,
        args: Value,
        timeout_ms: u64,
    ) -> ToolResult<ChainResult> {
        let steps = self
            .chains
            .get(name)
            .ok_or_else(|| ToolError::ChainNotFound { name: name.into() })?;

        let mut input = args;
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            match self.run(&step.tool, step_args(&step.args, &input), timeout_ms).await {
                Ok(output) => {
                    results.push(output.clone());
                    input = output;
                }
                Err(e) => {
                    return Ok(ChainResult {
                        success: false,
                        results,
                        final_output: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(ChainResult {
            success: true,
            final_output: results.last().cloned(),
            results,
            error: None,
        })
    }

    fn execution_stats(&self) -> HashMap<String, ToolStats> {
        self.stats
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("chains", &self.chains.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("upper", "Uppercase the input", "text")
        }

        async fn execute(&self, args: Value) -> ToolResult<Value> {
            let text = args["input"].as_str().ok_or_else(|| ToolError::Execution {
                name: "upper".into(),
                message: "missing input".into(),
            })?;
            Ok(Value::String(text.to_uppercase()))
        }
    }

    struct Exclaim;

    #[async_trait]
    impl Tool for Exclaim {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("exclaim", "Append an exclamation mark", "text")
        }

        async fn execute(&self, args: Value) -> ToolResult<Value> {
            let text = args["input"].as_str().unwrap_or_default();
            Ok(Value::String(format!("{text}!")))
        }
    }

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor::new("slow", "Never finishes in time", "test")
        }

        async fn execute(&self, _args: Value) -> ToolResult<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    fn registry() -> ToolRegistry {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Upper));
        reg.register(Arc::new(Exclaim));
        reg.register(Arc::new(Slow));
        reg.define_chain(
            "shout",
            vec![
                ChainStep::new("upper", Value::Null),
                ChainStep::new("exclaim", serde_json::json!({})),
            ],
        );
        reg.define_chain("broken", vec![ChainStep::new("missing", Value::Null)]);
        reg
    }

    #[test]
    fn register_and_list() {
        let reg = registry();
        assert_eq!(reg.len(), 3);
        let names: Vec<String> = reg.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["exclaim", "slow", "upper"]);
        assert_eq!(reg.chain_names(), vec!["broken", "shout"]);
    }

    #[tokio::test]
    async fn single_tool_and_missing_tool() {
        let reg = registry();
        let out = reg
            .execute_tool("upper", serde_json::json!({"input": "hi"}), 1000)
            .await
            .unwrap();
        assert_eq!(out, "HI");
        assert!(matches!(
            reg.execute_tool("nope", Value::Null, 1000).await,
            Err(ToolError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn chain_feeds_outputs_forward() {
        let reg = registry();
        let result = reg
            .execute_chain("shout", Value::String("hey".into()), 1000)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.final_output, Some(Value::String("HEY!".into())));

        let broken = reg.execute_chain("broken", Value::Null, 1000).await.unwrap();
        assert!(!broken.success);
        assert!(broken.results.is_empty());

        assert!(matches!(
            reg.execute_chain("unknown", Value::Null, 1000).await,
            Err(ToolError::ChainNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn slow_tools_time_out_and_are_counted() {
        let reg = registry();
        let err = reg.execute_tool("slow", Value::Null, 50).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_ms: 50, .. }));
        let stats = reg.execution_stats();
        assert_eq!(stats["slow"].calls, 1);
        assert_eq!(stats["slow"].failures, 1);
    }
}
