use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeatureState {
    #[default]
    Planned,
    InDevelopment,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub status: FeatureState,
}

/// `features.toml`: the backlog the coordinator works through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureManifest {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeatureCounts {
    pub total: usize,
    pub completed: usize,
    pub in_development: usize,
    pub by_priority: BTreeMap<Priority, usize>,
}

impl FeatureManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read feature manifest {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse feature manifest {}", path.display()))
    }

    pub fn counts(&self) -> FeatureCounts {
        let mut counts = FeatureCounts {
            total: self.features.len(),
            ..FeatureCounts::default()
        };
        for feature in &self.features {
            *counts.by_priority.entry(feature.priority).or_default() += 1;
            match feature.status {
                FeatureState::Completed => counts.completed += 1,
                FeatureState::InDevelopment => counts.in_development += 1,
                FeatureState::Planned => {}
            }
        }
        counts
    }

    /// Unfinished features of one tier, in manifest order.
    pub fn pending_in(&self, priority: Priority) -> impl Iterator<Item = &Feature> {
        self.features
            .iter()
            .filter(move |f| f.priority == priority && f.status != FeatureState::Completed)
    }

    pub fn mark_completed(&mut self, name: &str) {
        if let Some(feature) = self.features.iter_mut().find(|f| f.name == name) {
            feature.status = FeatureState::Completed;
        }
    }
}
