use super::manifest::{Feature, FeatureManifest, Priority};
use crate::agent::TurnOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TIER_ORDER: [Priority; 4] = [
    Priority::Critical,
    Priority::High,
    Priority::Medium,
    Priority::Low,
];

/// Tier worked on in `cycle` (1-based): critical, high, medium, low, repeat.
pub fn tier_for_cycle(cycle: u64) -> Priority {
    let slot = usize::try_from(cycle.saturating_sub(1) % 4).unwrap_or(0);
    TIER_ORDER[slot]
}

/// Up to `max_parallel` unfinished features of this cycle's tier; an empty
/// tier falls back to critical.
pub fn select_batch(manifest: &FeatureManifest, cycle: u64, max_parallel: usize) -> (Priority, Vec<Feature>) {
    let tier = tier_for_cycle(cycle);
    let mut batch: Vec<Feature> = manifest
        .pending_in(tier)
        .take(max_parallel)
        .cloned()
        .collect();
    if batch.is_empty() && tier != Priority::Critical {
        tracing::debug!(%tier, "tier empty, falling back to critical");
        batch = manifest
            .pending_in(Priority::Critical)
            .take(max_parallel)
            .cloned()
            .collect();
        return (Priority::Critical, batch);
    }
    (tier, batch)
}

/// Headless instruction for one feature run.
pub fn task_prompt(feature: &Feature) -> String {
    let mut prompt = format!("Implement the feature `{}`.", feature.name);
    if !feature.description.trim().is_empty() {
        prompt.push_str(&format!("\n\n{}", feature.description.trim()));
    }
    if !feature.requirements.is_empty() {
        prompt.push_str("\n\nRequirements:");
        for requirement in &feature.requirements {
            prompt.push_str(&format!("\n- {requirement}"));
        }
    }
    if !feature.files.is_empty() {
        prompt.push_str(&format!("\n\nRelevant files: {}", feature.files.join(", ")));
    }
    prompt.push_str(
        "\n\nWork in the workspace with the available tools. \
         When the feature is done, reply with a short summary of the changes.",
    );
    prompt
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Correlates the log lines of one headless session.
    pub run_id: String,
    pub feature: String,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
    pub detail: String,
    pub rounds: u32,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl RunRecord {
    /// Only a naturally completed exchange counts as a completed run.
    pub fn from_outcome(
        run_id: &str,
        feature: &str,
        started_at: DateTime<Utc>,
        outcome: &TurnOutcome,
        rounds: u32,
        duration: Duration,
    ) -> Self {
        let (status, detail) = match outcome {
            TurnOutcome::Completed { text } => (RunStatus::Completed, first_line(text)),
            TurnOutcome::Truncated { .. } => (RunStatus::Failed, "turn budget exhausted".to_string()),
            TurnOutcome::ConnectionFailed { detail } => (RunStatus::Failed, detail.clone()),
            TurnOutcome::Cancelled { reason } => (RunStatus::Failed, reason.clone()),
        };
        Self {
            run_id: run_id.to_string(),
            feature: feature.to_string(),
            started_at,
            status,
            detail,
            rounds,
            duration,
        }
    }

    pub fn timed_out(
        run_id: &str,
        feature: &str,
        started_at: DateTime<Utc>,
        after: Duration,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            feature: feature.to_string(),
            started_at,
            status: RunStatus::Failed,
            detail: format!("timed out after {}s", after.as_secs()),
            rounds: 0,
            duration: after,
        }
    }
}

fn first_line(text: &str) -> String {
    crate::utils::truncate_with_ellipsis(text.lines().next().unwrap_or_default().trim(), 200)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub tier: Priority,
    pub runs: Vec<RunRecord>,
}

impl CycleReport {
    pub fn completed(&self) -> usize {
        self.runs
            .iter()
            .filter(|r| r.status == RunStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.completed()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
