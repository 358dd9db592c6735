use super::traits::{Tool, ToolFuture};
use super::types::{ToolContext, ToolPayload};
use crate::platform::coordinator::FeatureManifest;
use crate::status::StatusReader;
use serde_json::{Value, json};
use std::path::PathBuf;

/// Reports the latest published development progress snapshot.
pub struct DevProgressTool {
    status: StatusReader,
}

impl DevProgressTool {
    pub fn new(status: StatusReader) -> Self {
        Self { status }
    }
}

impl Tool for DevProgressTool {
    fn name(&self) -> &str {
        "dev_progress"
    }

    fn description(&self) -> &str {
        "Show autonomous development progress: features completed, run counts, success rate"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn execute<'a>(&'a self, _args: Value, _ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let snapshot = self.status.latest();
            Ok(ToolPayload::Structured(serde_json::to_value(&*snapshot)?))
        })
    }
}

/// Summarises the feature manifest by priority and state.
pub struct FeatureStatusTool {
    manifest: PathBuf,
}

impl FeatureStatusTool {
    /// `manifest` may be relative; it resolves against the workspace per call.
    pub fn new(manifest: impl Into<PathBuf>) -> Self {
        Self {
            manifest: manifest.into(),
        }
    }
}

impl Tool for FeatureStatusTool {
    fn name(&self) -> &str {
        "feature_status"
    }

    fn description(&self) -> &str {
        "Count features in the manifest by priority and development state"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn execute<'a>(&'a self, _args: Value, ctx: &'a ToolContext) -> ToolFuture<'a> {
        Box::pin(async move {
            let path = ctx.resolve(&self.manifest.to_string_lossy());
            let manifest = tokio::task::spawn_blocking(move || FeatureManifest::load(&path))
                .await??;
            Ok(ToolPayload::Structured(serde_json::to_value(
                manifest.counts(),
            )?))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{StatusFeed, StatusSnapshot};
    use tempfile::TempDir;

    #[tokio::test]
    async fn dev_progress_reads_latest_snapshot() {
        let (publisher, reader) = StatusFeed::new(StatusSnapshot::default());
        let tool = DevProgressTool::new(reader);
        publisher.publish(StatusSnapshot {
            runs_total: 4,
            runs_completed: 3,
            runs_failed: 1,
            last_success_rate: 75.0,
            ..StatusSnapshot::default()
        });

        let payload = tool
            .execute(json!({}), &ToolContext::new("/tmp"))
            .await
            .unwrap();

        let ToolPayload::Structured(value) = payload else {
            panic!("expected structured payload");
        };
        assert_eq!(value["runs_completed"], json!(3));
        assert_eq!(value["last_success_rate"], json!(75.0));
    }

    #[tokio::test]
    async fn feature_status_counts_manifest() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("features.toml"),
            "[[features]]\nname = \"a\"\npriority = \"high\"\nstatus = \"in_development\"\n",
        )
        .unwrap();
        let tool = FeatureStatusTool::new("features.toml");

        let payload = tool
            .execute(json!({}), &ToolContext::new(tmp.path()))
            .await
            .unwrap();

        let ToolPayload::Structured(value) = payload else {
            panic!("expected structured payload");
        };
        assert_eq!(value["total"], json!(1));
        assert_eq!(value["in_development"], json!(1));
        assert_eq!(value["by_priority"]["high"], json!(1));
    }

    #[tokio::test]
    async fn missing_manifest_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let tool = FeatureStatusTool::new("features.toml");
        assert!(
            tool.execute(json!({}), &ToolContext::new(tmp.path()))
                .await
                .is_err()
        );
    }
}
