pub(crate) mod common;
pub mod factory;
pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod glob;
pub mod grep;
pub mod middleware;
pub mod progress;
pub mod registry;
pub mod schema;
pub mod shell;
pub mod todo;
pub mod traits;
pub mod types;

pub use factory::default_registry;
pub use file_edit::FileEditTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use middleware::{AuditMiddleware, OutputSizeLimitMiddleware, default_middleware_chain};
pub use progress::{DevProgressTool, FeatureStatusTool};
pub use registry::{TimeoutPolicy, ToolRegistry};
pub use shell::{ShellOutput, ShellTool, run_shell};
pub use todo::TodoTool;
pub use traits::{Tool, ToolFuture, ToolMiddleware};
pub use types::{ToolContext, ToolPayload, ToolResult, ToolSpec, ToolStatus};
