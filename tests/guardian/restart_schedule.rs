use camel::config::RestartConfig;
use camel::error::GuardianError;
use camel::platform::guardian::{
    AlertLog, ControlFuture, GuardedEntry, Guardian, GuardianEvent, GuardianEventKind,
    GuardianSettings, ProcessControl, ProcessState, RestartRequests, read_state_file,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Default)]
struct Counters {
    starts: AtomicUsize,
    terminates: AtomicUsize,
}

/// Health answers are replayed in order; `fallback` applies afterwards.
struct FakeProcess {
    health: VecDeque<bool>,
    fallback: bool,
    counters: Arc<Counters>,
}

impl ProcessControl for FakeProcess {
    fn start(&mut self) -> ControlFuture<'_, Result<(), GuardianError>> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn is_alive(&mut self) -> ControlFuture<'_, bool> {
        let alive = self.health.pop_front().unwrap_or(self.fallback);
        Box::pin(async move { alive })
    }

    fn terminate(&mut self) -> ControlFuture<'_, ()> {
        self.counters.terminates.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    }
}

fn restart(max_retries: u32) -> RestartConfig {
    RestartConfig {
        max_retries,
        backoff_base_secs: 2,
        backoff_cap_secs: 10,
    }
}

fn start_guardian(
    dir: &Path,
    state_file: bool,
    restart: RestartConfig,
    health: Vec<bool>,
    fallback: bool,
) -> (Guardian, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let settings = GuardianSettings {
        check_interval: Duration::from_secs(30),
        alert_file: dir.join("alerts.jsonl"),
        state_file: state_file.then(|| dir.join("guardian_state.json")),
        restart_dir: Some(dir.join("restart_requests")),
    };
    let entry = GuardedEntry {
        name: "worker".into(),
        command: "worker --serve".into(),
        restart,
        control: Box::new(FakeProcess {
            health: health.into(),
            fallback,
            counters: Arc::clone(&counters),
        }),
    };
    let guardian = Guardian::start(settings, vec![entry]).unwrap();
    (guardian, counters)
}

async fn collect_until(
    events: &mut broadcast::Receiver<GuardianEvent>,
    stop: impl Fn(&GuardianEventKind) -> bool,
) -> Vec<GuardianEventKind> {
    let mut seen = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        assert_eq!(event.process, "worker");
        let done = stop(&event.kind);
        seen.push(event.kind);
        if done {
            return seen;
        }
    }
}

fn delays(kinds: &[GuardianEventKind]) -> Vec<u64> {
    kinds
        .iter()
        .filter_map(|kind| match kind {
            GuardianEventKind::RestartScheduled { delay } => Some(delay.as_secs()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_until_cap_then_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let (guardian, counters) = start_guardian(dir.path(), false, restart(5), Vec::new(), false);
    let mut events = guardian.subscribe();

    let kinds = collect_until(&mut events, |kind| *kind == GuardianEventKind::Exhausted).await;

    assert_eq!(delays(&kinds), vec![2, 4, 8, 10, 10]);
    assert!(kinds.contains(&GuardianEventKind::Failed { failures: 6 }));
    assert_eq!(counters.starts.load(Ordering::SeqCst), 6);

    let record = guardian.board().get("worker").unwrap();
    assert_eq!(record.state, ProcessState::Failed);
    assert_eq!(record.consecutive_failures, 6);
    assert!(record.is_terminal());

    let alerts = AlertLog::new(dir.path().join("alerts.jsonl")).read_all().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].process, "worker");
    assert_eq!(alerts[0].consecutive_failures, 6);
    assert_eq!(alerts[0].max_retries, 5);

    // exhausted processes are never started again
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(counters.starts.load(Ordering::SeqCst), 6);

    guardian.shutdown().await;
    assert_eq!(counters.terminates.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn healthy_check_resets_the_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let (guardian, counters) = start_guardian(
        dir.path(),
        false,
        restart(5),
        vec![false, false, true, false],
        true,
    );
    let mut events = guardian.subscribe();

    let kinds = collect_until(&mut events, |kind| {
        *kind == GuardianEventKind::Failed { failures: 1 }
    })
    .await;
    assert_eq!(kinds[0], GuardianEventKind::Started);

    let kinds = collect_until(&mut events, |kind| *kind == GuardianEventKind::Healthy).await;
    assert_eq!(delays(&kinds), vec![2, 4]);

    let kinds = collect_until(&mut events, |kind| {
        matches!(kind, GuardianEventKind::RestartScheduled { .. })
    })
    .await;
    assert!(kinds.contains(&GuardianEventKind::Failed { failures: 1 }));
    assert_eq!(delays(&kinds), vec![2]);

    collect_until(&mut events, |kind| *kind == GuardianEventKind::Healthy).await;
    assert_eq!(counters.starts.load(Ordering::SeqCst), 4);
    assert_eq!(
        guardian.board().get("worker").unwrap().consecutive_failures,
        0
    );

    guardian.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_running_processes_and_writes_state() {
    let dir = tempfile::tempdir().unwrap();
    let (guardian, counters) = start_guardian(dir.path(), true, restart(3), Vec::new(), true);
    let mut events = guardian.subscribe();

    collect_until(&mut events, |kind| *kind == GuardianEventKind::Healthy).await;
    assert_eq!(
        guardian.board().get("worker").unwrap().state,
        ProcessState::Running
    );

    guardian.shutdown().await;

    assert_eq!(events.recv().await.unwrap().kind, GuardianEventKind::Stopped);
    assert_eq!(counters.terminates.load(Ordering::SeqCst), 1);
    let status = read_state_file(&dir.path().join("guardian_state.json"))
        .await
        .unwrap();
    assert_eq!(status.processes.len(), 1);
    assert_eq!(status.processes[0].state, ProcessState::Stopped);
    assert_eq!(status.processes[0].command, "worker --serve");
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_backoff_cancels_the_pending_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (guardian, counters) =
        start_guardian(dir.path(), true, restart(5), vec![false], true);
    let mut events = guardian.subscribe();

    let kinds = collect_until(&mut events, |kind| {
        matches!(kind, GuardianEventKind::RestartScheduled { .. })
    })
    .await;
    assert_eq!(delays(&kinds), vec![2]);
    assert_eq!(counters.starts.load(Ordering::SeqCst), 1);

    guardian.shutdown().await;
    assert_eq!(events.recv().await.unwrap().kind, GuardianEventKind::Stopped);

    // the scheduled restart never fires
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(counters.starts.load(Ordering::SeqCst), 1);

    let status = read_state_file(&dir.path().join("guardian_state.json"))
        .await
        .unwrap();
    assert_eq!(status.processes[0].state, ProcessState::Stopped);
    assert_eq!(status.processes[0].consecutive_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn requested_restart_is_not_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (guardian, counters) = start_guardian(dir.path(), false, restart(5), Vec::new(), true);
    let mut events = guardian.subscribe();
    collect_until(&mut events, |kind| *kind == GuardianEventKind::Healthy).await;

    let requests = RestartRequests::new(dir.path().join("restart_requests"));
    requests.request("worker").await.unwrap();

    collect_until(&mut events, |kind| *kind == GuardianEventKind::RestartRequested).await;
    let kinds = collect_until(&mut events, |kind| *kind == GuardianEventKind::Healthy).await;
    assert_eq!(kinds[0], GuardianEventKind::Started);
    assert!(delays(&kinds).is_empty());

    assert_eq!(counters.starts.load(Ordering::SeqCst), 2);
    assert_eq!(counters.terminates.load(Ordering::SeqCst), 1);
    assert!(!requests.is_pending("worker").await);
    let record = guardian.board().get("worker").unwrap();
    assert_eq!(record.state, ProcessState::Running);
    assert_eq!(record.consecutive_failures, 0);

    guardian.shutdown().await;
}

#[tokio::test]
async fn duplicate_process_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let entry = || GuardedEntry {
        name: "worker".into(),
        command: "worker".into(),
        restart: RestartConfig::default(),
        control: Box::new(FakeProcess {
            health: VecDeque::new(),
            fallback: true,
            counters: Arc::new(Counters::default()),
        }),
    };
    let settings = GuardianSettings {
        check_interval: Duration::from_secs(30),
        alert_file: dir.path().join("alerts.jsonl"),
        state_file: None,
        restart_dir: None,
    };

    let Err(err) = Guardian::start(settings, vec![entry(), entry()]) else {
        panic!("duplicate names should be rejected");
    };
    assert!(matches!(err, GuardianError::DuplicateProcess(name) if name == "worker"));
}
