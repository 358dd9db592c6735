mod backends;
mod coordinator;
pub(crate) mod core;
mod guardian;
mod tools;

pub use backends::{BackendApi, BackendConfig};
pub use coordinator::{CoordinatorConfig, DashboardConfig, StatusConfig};
pub use core::{AgentConfig, Config};
pub use guardian::{GuardedProcessConfig, GuardianConfig, ProbeConfig, RestartConfig};
pub use tools::ToolsConfig;
