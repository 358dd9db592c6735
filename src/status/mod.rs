//! Progress/status feed shared between the coordinator and its readers.
//!
//! In-process the latest [`StatusSnapshot`] lives in an `ArcSwap`, so readers
//! never block the writer. Across processes the coordinator publishes the same
//! snapshot to a JSON file that readers poll.

mod feed;
mod file;

pub use feed::{StatusFeed, StatusPublisher, StatusReader, StatusSnapshot};
pub use file::{StatusFileWatcher, read_snapshot, write_snapshot_atomic};
