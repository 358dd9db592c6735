use super::schema::validate_arguments;
use super::traits::{Tool, ToolFuture, ToolMiddleware};
use super::types::{ToolContext, ToolPayload, ToolResult, ToolSpec};
use crate::config::ToolsConfig;
use crate::error::ToolError;
use crate::llm::ToolCall;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Deadline resolution for tool calls.
#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    pub default: Duration,
    pub overrides: HashMap<String, Duration>,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(30),
            overrides: HashMap::new(),
        }
    }
}

impl TimeoutPolicy {
    pub fn from_config(config: &ToolsConfig) -> Self {
        Self {
            default: config.default_timeout(),
            overrides: config
                .timeouts
                .keys()
                .filter_map(|name| config.timeout_override(name).map(|d| (name.clone(), d)))
                .collect(),
        }
    }

    /// Configured override, then the tool's own opinion, then the default.
    fn resolve(&self, tool: &dyn Tool, args: &Value) -> Duration {
        self.overrides
            .get(tool.name())
            .copied()
            .or_else(|| tool.call_timeout(args))
            .unwrap_or(self.default)
    }
}

/// Central registry for tool instances and middleware pipeline.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    middleware: Vec<Arc<dyn ToolMiddleware>>,
    timeouts: TimeoutPolicy,
}

impl ToolRegistry {
    pub fn new(middleware: Vec<Arc<dyn ToolMiddleware>>, timeouts: TimeoutPolicy) -> Self {
        Self {
            tools: HashMap::new(),
            middleware,
            timeouts,
        }
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Register a closure as a tool.
    pub fn register_handler<F, Fut>(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Result<(), ToolError>
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ToolPayload>> + Send + 'static,
    {
        self.register(Arc::new(FnTool {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Box::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }))
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Return sorted list of registered tool names.
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Return specs for all registered tools, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|tool| tool.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Let every tool forget the state it keeps for `session_id`.
    pub fn end_session(&self, session_id: &str) {
        for tool in self.tools.values() {
            tool.end_session(session_id);
        }
    }

    /// Execute a tool through the middleware pipeline.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        for middleware in &self.middleware {
            middleware.before_execute(name, &args, ctx).await;
        }

        let mut outcome = self.run(name, args, ctx).await;

        for middleware in &self.middleware {
            middleware.after_execute(name, &mut outcome, ctx).await;
        }
        outcome
    }

    /// Execute a model-issued call, folding every failure into an error result.
    pub async fn dispatch(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let started = Instant::now();
        let ctx = ctx.for_call(&call.id, ctx.round);
        let args = Value::Object(call.arguments.clone());
        match self.execute(&call.name, args, &ctx).await {
            Ok(result) => result,
            Err(error) => ToolResult::error(
                call.id.clone(),
                format!("{}: {error}", error.kind()),
                started.elapsed(),
            ),
        }
    }

    async fn run(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;

        let args = validate_arguments(&tool.parameters_schema(), args).map_err(|reason| {
            ToolError::InvalidArguments {
                name: name.to_string(),
                reason,
            }
        })?;

        let limit = self.timeouts.resolve(tool.as_ref(), &args);
        let started = Instant::now();
        match tokio::time::timeout(limit, tool.execute(args, ctx)).await {
            Ok(Ok(payload)) => Ok(ToolResult::ok(
                ctx.call_id.clone(),
                payload,
                started.elapsed(),
            )),
            Ok(Err(error)) => Err(ToolError::ExecutionError {
                name: name.to_string(),
                message: format!("{error:#}"),
            }),
            Err(_) => Err(ToolError::ExecutionTimeout {
                name: name.to_string(),
                after: limit,
            }),
        }
    }
}

type BoxedHandler = Box<dyn Fn(Value, ToolContext) -> ToolFuture<'static> + Send + Sync>;

struct FnTool {
    name: String,
    description: String,
    schema: Value,
    handler: BoxedHandler,
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a ToolContext) -> ToolFuture<'a> {
        (self.handler)(args, ctx.clone())
    }
}
