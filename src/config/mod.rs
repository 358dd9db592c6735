pub mod schema;

pub use schema::{
    AgentConfig, BackendApi, BackendConfig, Config, CoordinatorConfig, DashboardConfig,
    GuardedProcessConfig, GuardianConfig, ProbeConfig, RestartConfig, StatusConfig, ToolsConfig,
};

#[cfg(test)]
pub(crate) use schema::core::test_env;
