use super::{
    DevProgressTool, FeatureStatusTool, FileEditTool, FileReadTool, FileWriteTool, GlobTool,
    GrepTool, ShellTool, TimeoutPolicy, TodoTool, ToolRegistry, default_middleware_chain,
};
use crate::config::Config;
use crate::error::ToolError;
use crate::status::StatusReader;
use std::sync::Arc;

/// Build the registry with every built-in tool.
pub fn default_registry(config: &Config, status: StatusReader) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new(
        default_middleware_chain(config.tools.max_output_bytes),
        TimeoutPolicy::from_config(&config.tools),
    );

    registry.register(Arc::new(FileReadTool))?;
    registry.register(Arc::new(FileWriteTool))?;
    registry.register(Arc::new(FileEditTool))?;
    registry.register(Arc::new(GlobTool))?;
    registry.register(Arc::new(GrepTool))?;
    registry.register(Arc::new(ShellTool::new(config.tools.shell_timeout())))?;
    registry.register(Arc::new(TodoTool::new()))?;
    registry.register(Arc::new(DevProgressTool::new(status)))?;
    registry.register(Arc::new(FeatureStatusTool::new(&config.coordinator.manifest)))?;

    Ok(registry)
}
