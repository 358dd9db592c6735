use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Immutable point-in-time progress counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub features_completed: u32,
    pub features_total: u32,
    pub runs_total: u64,
    pub runs_completed: u64,
    pub runs_failed: u64,
    /// Percentage of completed runs, one decimal place.
    pub last_success_rate: f64,
    pub cycle: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn success_rate(completed: u64, total: u64) -> f64 {
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = completed as f64 * 100.0 / total as f64;
        (rate * 10.0).round() / 10.0
    }

    pub fn summary(&self) -> String {
        let updated = self
            .updated_at
            .map_or_else(|| "never".to_string(), |t| t.to_rfc3339());
        format!(
            "features {}/{} · runs {} ({} ok, {} failed) · success {:.1}% · cycle {} · updated {updated}",
            self.features_completed,
            self.features_total,
            self.runs_total,
            self.runs_completed,
            self.runs_failed,
            self.last_success_rate,
            self.cycle,
        )
    }
}

/// Latest-value cell. Create one, hand the publisher to the single writer and
/// clone readers freely.
pub struct StatusFeed;

impl StatusFeed {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(initial: StatusSnapshot) -> (StatusPublisher, StatusReader) {
        let cell = Arc::new(ArcSwap::from_pointee(initial));
        (
            StatusPublisher {
                cell: Arc::clone(&cell),
            },
            StatusReader { cell },
        )
    }
}

/// Sole writer of a feed. Deliberately not `Clone`.
#[derive(Debug)]
pub struct StatusPublisher {
    cell: Arc<ArcSwap<StatusSnapshot>>,
}

impl StatusPublisher {
    /// Replace the whole snapshot atomically.
    pub fn publish(&self, snapshot: StatusSnapshot) {
        self.cell.store(Arc::new(snapshot));
    }

    pub fn reader(&self) -> StatusReader {
        StatusReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatusReader {
    cell: Arc<ArcSwap<StatusSnapshot>>,
}

impl StatusReader {
    pub fn latest(&self) -> Arc<StatusSnapshot> {
        self.cell.load_full()
    }
}
