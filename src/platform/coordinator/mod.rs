//! Autonomous-development coordinator: works a feature backlog in cycles,
//! running each feature as a headless agent exchange and publishing progress.

mod cycle;
mod manifest;
mod run_log;

pub use cycle::{CycleReport, RunRecord, RunStatus, select_batch, task_prompt, tier_for_cycle};
pub use manifest::{Feature, FeatureCounts, FeatureManifest, FeatureState, Priority};
pub use run_log::RunLog;

use crate::agent::AgentSession;
use crate::config::Config;
use crate::llm::{BackendSwitchManager, NullStreamSink};
use crate::status::{StatusFeed, StatusPublisher, StatusSnapshot, write_snapshot_atomic};
use crate::tools::{ToolRegistry, default_registry};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub struct Coordinator {
    config: Config,
    registry: Arc<ToolRegistry>,
    backends: Arc<BackendSwitchManager>,
    publisher: StatusPublisher,
    run_log: RunLog,
    manifest: FeatureManifest,
    completed: HashSet<String>,
    cycle: u64,
    runs_total: u64,
    runs_completed: u64,
    runs_failed: u64,
}

impl Coordinator {
    pub fn new(
        config: Config,
        registry: Arc<ToolRegistry>,
        backends: Arc<BackendSwitchManager>,
        publisher: StatusPublisher,
    ) -> Self {
        let run_log = RunLog::new(config.resolve_path(&config.coordinator.run_log));
        Self {
            config,
            registry,
            backends,
            publisher,
            run_log,
            manifest: FeatureManifest::default(),
            completed: HashSet::new(),
            cycle: 0,
            runs_total: 0,
            runs_completed: 0,
            runs_failed: 0,
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        let raw = PathBuf::from(shellexpand::tilde(&self.config.coordinator.manifest).into_owned());
        if raw.is_absolute() {
            raw
        } else {
            self.config.workspace_dir.join(raw)
        }
    }

    pub fn status_path(&self) -> PathBuf {
        self.config.status_path()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn run_log(&self) -> &RunLog {
        &self.run_log
    }

    /// Rebuild run counters and completed features from the run log, so a
    /// restarted coordinator carries on where the last one stopped.
    pub async fn restore(&mut self) -> Result<()> {
        let records = self.run_log.read_all().await?;
        for record in &records {
            self.count(record);
        }
        tracing::info!(
            runs = records.len(),
            completed_features = self.completed.len(),
            "restored run history"
        );
        Ok(())
    }

    fn count(&mut self, run: &RunRecord) {
        self.runs_total += 1;
        match run.status {
            RunStatus::Completed => {
                self.runs_completed += 1;
                self.completed.insert(run.feature.clone());
                self.manifest.mark_completed(&run.feature);
            }
            RunStatus::Failed => self.runs_failed += 1,
        }
    }

    /// Re-read the manifest, keeping completions recorded by earlier cycles.
    /// An unreadable manifest keeps the previous one.
    fn refresh_manifest(&mut self) {
        match FeatureManifest::load(&self.manifest_path()) {
            Ok(manifest) => self.manifest = manifest,
            Err(error) => tracing::warn!("keeping previous feature manifest: {error:#}"),
        }
        for name in &self.completed {
            self.manifest.mark_completed(name);
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let counts = self.manifest.counts();
        StatusSnapshot {
            features_completed: u32::try_from(counts.completed).unwrap_or(u32::MAX),
            features_total: u32::try_from(counts.total).unwrap_or(u32::MAX),
            runs_total: self.runs_total,
            runs_completed: self.runs_completed,
            runs_failed: self.runs_failed,
            last_success_rate: StatusSnapshot::success_rate(self.runs_completed, self.runs_total),
            cycle: self.cycle,
            updated_at: Some(Utc::now()),
        }
    }

    async fn publish(&self) {
        let snapshot = self.snapshot();
        if let Err(error) = write_snapshot_atomic(&self.status_path(), &snapshot).await {
            tracing::warn!("failed to publish status file: {error:#}");
        }
        self.publisher.publish(snapshot);
    }

    /// Run one cycle. Task and backend failures are recorded, never raised.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        self.refresh_manifest();
        // Touch the status file up front so heartbeat probes see activity
        // even when the runs take a while.
        self.publish().await;

        let (tier, batch) = select_batch(&self.manifest, self.cycle, self.config.coordinator.max_parallel.max(1));
        tracing::info!(cycle = self.cycle, %tier, tasks = batch.len(), "coordinator cycle started");

        let runs = futures_util::future::join_all(batch.iter().map(|feature| self.run_feature(feature))).await;

        for run in &runs {
            self.count(run);
            if let Err(error) = self.run_log.append(run).await {
                tracing::warn!(
                    run_id = %run.run_id,
                    path = %self.run_log.path().display(),
                    "failed to record run: {error:#}"
                );
            }
            tracing::info!(
                run_id = %run.run_id,
                feature = %run.feature,
                status = %run.status,
                rounds = run.rounds,
                "{}",
                run.detail
            );
        }

        self.publish().await;
        let report = CycleReport {
            cycle: self.cycle,
            tier,
            runs,
        };
        tracing::info!(
            cycle = report.cycle,
            completed = report.completed(),
            failed = report.failed(),
            "coordinator cycle finished"
        );
        report
    }

    async fn run_feature(&self, feature: &Feature) -> RunRecord {
        let mut session = AgentSession::from_config(
            &self.config,
            Arc::clone(&self.registry),
            Arc::clone(&self.backends),
            Arc::new(NullStreamSink),
        );
        let run_id = uuid::Uuid::new_v4().to_string();
        let timeout = self.config.coordinator.task_timeout();
        let started_at = Utc::now();
        let started = Instant::now();
        tracing::info!(run_id = %run_id, feature = %feature.name, "starting headless run");
        match tokio::time::timeout(timeout, session.submit(&task_prompt(feature))).await {
            Ok(report) => RunRecord::from_outcome(
                &run_id,
                &feature.name,
                started_at,
                &report.outcome,
                report.rounds,
                started.elapsed(),
            ),
            Err(_) => RunRecord::timed_out(&run_id, &feature.name, started_at, timeout),
        }
    }
}

/// `camel coordinator`: run cycles until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let backends = BackendSwitchManager::from_config(&config)?;
    if let Some(name) = &config.coordinator.backend {
        backends
            .switch_to(name)
            .with_context(|| format!("coordinator backend '{name}'"))?;
    }
    let (publisher, reader) = StatusFeed::new(StatusSnapshot::default());
    let registry = Arc::new(default_registry(&config, reader)?);
    let interval = config.coordinator.cycle_interval();
    let mut coordinator = Coordinator::new(config, registry, Arc::new(backends), publisher);
    if let Err(error) = coordinator.restore().await {
        tracing::warn!("starting without run history: {error:#}");
    }

    println!("◆ Coordinator working {}", coordinator.manifest_path().display());
    println!("  Ctrl+C to stop");

    loop {
        tokio::select! {
            biased;
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            report = coordinator.run_cycle() => {
                println!(
                    "cycle {} ({}): {} completed, {} failed",
                    report.cycle,
                    report.tier,
                    report.completed(),
                    report.failed()
                );
            }
        }
        tokio::select! {
            biased;
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            () = tokio::time::sleep(interval) => {}
        }
    }

    tracing::info!(cycle = coordinator.cycle(), "coordinator stopped");
    Ok(())
}
