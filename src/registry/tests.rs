use super::*;
use crate::error::WatchdeckError;
use crate::logs::NO_LOG_PLACEHOLDER;
use crate::state::{InstanceMap, MemoryStore};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashSet;
use crate::process::SysinfoProber;
use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;
use tempfile::TempDir;

/// Prober answering from a fixed set of live pids
struct FakeProber {
    alive: StdMutex<HashSet<u32>>,
}

impl FakeProber {
    fn new(alive: &[u32]) -> Self {
        Self {
            alive: StdMutex::new(alive.iter().copied().collect()),
        }
    }

    fn kill(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }
}

impl Prober for FakeProber {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }
}

/// Prober claiming every pid is alive
struct EverythingAlive;

impl Prober for EverythingAlive {
    fn is_alive(&self, _pid: u32) -> bool {
        true
    }
}

fn create_test_record(id: &str, name: &str, pid: Option<u32>, offset_secs: i64) -> InstanceRecord {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    InstanceRecord {
        id: id.to_string(),
        name: name.to_string(),
        target: format!("http://{}.example.com", name),
        process_id: pid,
        running_hint: false,
        created_at: base + ChronoDuration::seconds(offset_secs),
    }
}

fn map_of(records: Vec<InstanceRecord>) -> InstanceMap {
    records.into_iter().map(|r| (r.id.clone(), r)).collect()
}

fn test_config(log_dir: &Path) -> DashboardConfig {
    DashboardConfig {
        log_dir: log_dir.to_path_buf(),
        executable: log_dir.join("missing-monitor"),
        stop_timeout_secs: 1,
        ..DashboardConfig::default()
    }
}

fn write_log(log_dir: &Path, name: &str, lines: usize) {
    let content: String = (1..=lines).map(|i| format!("line {}\n\n", i)).collect();
    std::fs::write(log_dir.join(format!("{}.log", name)), content).unwrap();
}

fn registry_with(
    log_dir: &Path,
    records: Vec<InstanceRecord>,
    prober: Arc<dyn Prober>,
) -> (InstanceRegistry, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_instances(map_of(records)));
    let registry = InstanceRegistry::new(
        &test_config(log_dir),
        Arc::clone(&store) as Arc<dyn InstanceStore>,
        prober,
    );
    (registry, store)
}

#[tokio::test]
async fn test_sweep_keeps_only_live_records() {
    let temp_dir = TempDir::new().unwrap();
    let records = vec![
        create_test_record("1", "alive-a", Some(101), 0),
        create_test_record("2", "dead-a", Some(102), 1),
        create_test_record("3", "alive-b", Some(103), 2),
        create_test_record("4", "dead-b", Some(104), 3),
        create_test_record("5", "no-pid", None, 4),
    ];
    let (registry, store) = registry_with(
        temp_dir.path(),
        records.clone(),
        Arc::new(FakeProber::new(&[101, 103])),
    );

    let report = registry.startup_sweep().await;

    assert_eq!(report.kept, vec!["1".to_string(), "3".to_string()]);
    assert_eq!(report.dropped.len(), 3);

    let stored = store.snapshot();
    assert_eq!(stored.len(), 2);
    // Kept records are untouched by the sweep
    assert_eq!(stored["1"], records[0]);
    assert_eq!(stored["3"], records[2]);
}

#[tokio::test]
async fn test_sweep_with_nothing_alive_empties_store() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(
        temp_dir.path(),
        vec![
            create_test_record("1", "dead-a", Some(101), 0),
            create_test_record("2", "dead-b", Some(102), 1),
        ],
        Arc::new(FakeProber::new(&[])),
    );

    let report = registry.startup_sweep().await;

    assert!(report.kept.is_empty());
    assert_eq!(report.dropped.len(), 2);
    assert!(store.snapshot().is_empty());
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn test_list_refresh_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    write_log(temp_dir.path(), "alive", 10);
    let (registry, store) = registry_with(
        temp_dir.path(),
        vec![
            create_test_record("1", "alive", Some(101), 0),
            create_test_record("2", "dead", Some(102), 1),
        ],
        Arc::new(FakeProber::new(&[101])),
    );

    let first = registry.list_instances().await;
    let stored_after_first = store.snapshot();
    let second = registry.list_instances().await;

    assert_eq!(first, second);
    assert_eq!(store.snapshot(), stored_after_first);
}

#[tokio::test]
async fn test_running_hint_is_never_trusted() {
    let temp_dir = TempDir::new().unwrap();
    let mut record = create_test_record("1", "stale", Some(101), 0);
    record.running_hint = true;
    let (registry, store) =
        registry_with(temp_dir.path(), vec![record], Arc::new(FakeProber::new(&[])));

    let views = registry.list_instances().await;

    assert_eq!(views.len(), 1);
    assert!(!views[0].running);
    assert!(!store.snapshot()["1"].running_hint);
}

#[tokio::test]
async fn test_record_without_pid_is_never_running() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, _store) = registry_with(
        temp_dir.path(),
        vec![create_test_record("1", "no-pid", None, 0)],
        Arc::new(EverythingAlive),
    );

    let views = registry.list_instances().await;
    assert!(!views[0].running);
    assert!(views[0].log_lines.is_empty());

    let status = registry.status_snapshot().await;
    assert!(!status.instances["1"].running);
}

#[tokio::test]
async fn test_liveness_follows_the_process_table() {
    let temp_dir = TempDir::new().unwrap();
    let prober = Arc::new(FakeProber::new(&[101]));
    let (registry, _store) = registry_with(
        temp_dir.path(),
        vec![create_test_record("1", "probe", Some(101), 0)],
        Arc::clone(&prober) as Arc<dyn Prober>,
    );

    assert!(registry.list_instances().await[0].running);

    prober.kill(101);

    assert!(!registry.list_instances().await[0].running);
}

#[tokio::test]
async fn test_list_tails_short_log() {
    let temp_dir = TempDir::new().unwrap();
    write_log(temp_dir.path(), "probe", 10);
    let (registry, _store) = registry_with(
        temp_dir.path(),
        vec![
            create_test_record("1", "probe", Some(101), 0),
            create_test_record("2", "quiet", Some(102), 1),
        ],
        Arc::new(FakeProber::new(&[101])),
    );

    let views = registry.list_instances().await;

    assert_eq!(views[0].log_lines, vec!["line 8", "line 9", "line 10"]);
    assert_eq!(views[1].log_lines, vec![NO_LOG_PLACEHOLDER.to_string()]);
}

#[tokio::test]
async fn test_list_is_ordered_by_creation() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, _store) = registry_with(
        temp_dir.path(),
        vec![
            create_test_record("900", "late", Some(1), 50),
            create_test_record("1000", "early", Some(2), 0),
        ],
        Arc::new(FakeProber::new(&[])),
    );

    let views = registry.list_instances().await;
    let names: Vec<&str> = views.iter().map(|v| v.record.name.as_str()).collect();
    assert_eq!(names, vec!["early", "late"]);
}

#[tokio::test]
async fn test_get_instance_tails_long_log() {
    let temp_dir = TempDir::new().unwrap();
    write_log(temp_dir.path(), "probe", 80);
    let (registry, _store) = registry_with(
        temp_dir.path(),
        vec![create_test_record("1", "probe", Some(101), 0)],
        Arc::new(FakeProber::new(&[101])),
    );

    let view = registry.get_instance("1").await.unwrap();

    assert!(view.running);
    assert_eq!(view.log_lines.len(), 50);
    assert_eq!(view.log_lines.first().unwrap(), "line 31");
    assert_eq!(view.log_lines.last().unwrap(), "line 80");
}

#[tokio::test]
async fn test_get_instance_refreshes_and_persists() {
    let temp_dir = TempDir::new().unwrap();
    let mut record = create_test_record("1", "probe", Some(101), 0);
    record.running_hint = true;
    let (registry, store) =
        registry_with(temp_dir.path(), vec![record], Arc::new(FakeProber::new(&[])));

    let view = registry.get_instance("1").await.unwrap();

    assert!(!view.running);
    assert!(!store.snapshot()["1"].running_hint);
    assert_eq!(store.save_count(), 1);
}

#[tokio::test]
async fn test_get_unknown_instance() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(temp_dir.path(), vec![], Arc::new(EverythingAlive));

    assert!(registry.get_instance("nope").await.is_none());
    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn test_status_snapshot_has_no_logs() {
    let temp_dir = TempDir::new().unwrap();
    write_log(temp_dir.path(), "probe", 5);
    let (registry, _store) = registry_with(
        temp_dir.path(),
        vec![create_test_record("1", "probe", Some(101), 0)],
        Arc::new(FakeProber::new(&[101])),
    );

    let snapshot = registry.status_snapshot().await;

    assert_eq!(snapshot.status, "ok");
    assert_eq!(snapshot.instances.len(), 1);
    assert!(snapshot.instances["1"].running);
    assert!(snapshot.instances["1"].log_lines.is_empty());
}

#[tokio::test]
async fn test_stop_unknown_id_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let records = vec![create_test_record("1", "probe", Some(101), 0)];
    let (registry, store) = registry_with(
        temp_dir.path(),
        records.clone(),
        Arc::new(FakeProber::new(&[101])),
    );

    let report = registry.stop_instance("missing").await;

    assert!(!report.removed);
    assert_eq!(report.outcome, None);
    assert_eq!(store.save_count(), 0);
    assert_eq!(store.snapshot(), map_of(records));
}

#[tokio::test]
async fn test_stop_removes_record_even_if_process_already_gone() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(
        temp_dir.path(),
        vec![
            create_test_record("1", "gone", Some(4_000_001), 0),
            create_test_record("2", "other", Some(4_000_002), 1),
        ],
        Arc::new(FakeProber::new(&[])),
    );

    let report = registry.stop_instance("1").await;

    assert!(report.removed);
    assert_eq!(report.outcome, Some(TerminationOutcome::NotFound));
    let stored = store.snapshot();
    assert!(!stored.contains_key("1"));
    assert!(stored.contains_key("2"));
}

#[tokio::test]
async fn test_stop_record_without_pid() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(
        temp_dir.path(),
        vec![create_test_record("1", "no-pid", None, 0)],
        Arc::new(EverythingAlive),
    );

    let report = registry.stop_instance("1").await;

    assert!(report.removed);
    assert_eq!(report.outcome, None);
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_create_rejects_empty_fields_without_touching_store() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(temp_dir.path(), vec![], Arc::new(EverythingAlive));

    let result = registry.create_instance("", "http://example.com").await;
    assert!(matches!(result, Err(WatchdeckError::EmptyField("name"))));

    let result = registry.create_instance("probe", "  ").await;
    assert!(matches!(result, Err(WatchdeckError::EmptyField("target"))));

    assert_eq!(store.save_count(), 0);
}

#[tokio::test]
async fn test_create_with_missing_executable() {
    let temp_dir = TempDir::new().unwrap();
    let (registry, store) = registry_with(temp_dir.path(), vec![], Arc::new(EverythingAlive));

    let result = registry.create_instance("probe", "http://example.com").await;

    assert!(matches!(result, Err(WatchdeckError::ExecutableMissing(_))));
    assert_eq!(store.save_count(), 0);
    assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn test_create_spawn_failure_leaves_no_record() {
    let temp_dir = TempDir::new().unwrap();
    let not_a_program = temp_dir.path().join("plain.txt");
    std::fs::write(&not_a_program, "not a program").unwrap();

    let store = Arc::new(MemoryStore::new());
    let registry = registry_running(temp_dir.path(), &not_a_program, store.clone());

    let result = registry.create_instance("probe", "http://example.com").await;

    assert!(matches!(result, Err(WatchdeckError::SpawnFailed(_))));
    assert_eq!(store.save_count(), 0);
    assert!(store.snapshot().is_empty());
}

/// Store whose saves always fail, once `ready` exists
struct FailingStore {
    ready: PathBuf,
}

impl InstanceStore for FailingStore {
    fn load(&self) -> InstanceMap {
        InstanceMap::new()
    }

    fn save(&self, _instances: &InstanceMap) -> Result<()> {
        // Give the monitor time to record its pid before it is killed
        for _ in 0..100 {
            if self.ready.exists() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        Err(WatchdeckError::StateSaveError("disk full".to_string()))
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Registry launching `executable` and probing the real process table
fn registry_running(
    log_dir: &Path,
    executable: &Path,
    store: Arc<dyn InstanceStore>,
) -> InstanceRegistry {
    let config = DashboardConfig {
        executable: executable.to_path_buf(),
        ..test_config(log_dir)
    };
    InstanceRegistry::new(&config, store, Arc::new(SysinfoProber::new()))
}

async fn wait_until_dead(prober: &dyn Prober, pid: u32) -> bool {
    for _ in 0..50 {
        if !prober.is_alive(pid) {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_kills_monitor_when_save_fails() {
    let temp_dir = TempDir::new().unwrap();
    let pid_path = temp_dir.path().join("monitor.pid");
    let script = write_script(
        temp_dir.path(),
        "monitor.sh",
        &format!(
            "echo $$ > {p}.tmp\nmv {p}.tmp {p}\nexec sleep 30",
            p = pid_path.display()
        ),
    );

    let store = Arc::new(FailingStore {
        ready: pid_path.clone(),
    });
    let registry = registry_running(temp_dir.path(), &script, store);

    let result = registry.create_instance("probe", "http://example.com").await;
    assert!(matches!(result, Err(WatchdeckError::StateSaveError(_))));

    let pid: u32 = std::fs::read_to_string(&pid_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(wait_until_dead(&SysinfoProber::new(), pid).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_are_all_recorded() {
    let temp_dir = TempDir::new().unwrap();
    let script = write_script(temp_dir.path(), "monitor.sh", "exec sleep 30");
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(registry_running(temp_dir.path(), &script, store.clone()));

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry
                    .create_instance(&format!("probe-{}", i), "http://example.com")
                    .await
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        let view = task.await.unwrap().unwrap();
        ids.insert(view.record.id);
    }

    assert_eq!(ids.len(), 8);
    let stored = store.snapshot();
    assert_eq!(stored.len(), 8);
    assert!(ids.iter().all(|id| stored.contains_key(id)));

    for id in ids {
        registry.stop_instance(&id).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_create_during_slow_stop_is_kept() {
    let temp_dir = TempDir::new().unwrap();
    // "stubborn" ignores SIGTERM, everything else exits on it
    let script = write_script(
        temp_dir.path(),
        "monitor.sh",
        "if [ \"$2\" = stubborn ]; then\n  trap '' TERM\n  while true; do sleep 1; done\nfi\nexec sleep 30",
    );
    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(registry_running(temp_dir.path(), &script, store.clone()));

    let stubborn = registry
        .create_instance("stubborn", "http://a.example")
        .await
        .unwrap();
    let stubborn_pid = stubborn.record.process_id.unwrap();
    // Let the shell install its trap
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let stop = {
        let registry = Arc::clone(&registry);
        let id = stubborn.record.id.clone();
        tokio::spawn(async move { registry.stop_instance(&id).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let fresh = registry
        .create_instance("fresh", "http://b.example")
        .await
        .unwrap();
    // The stop is still waiting out its timeout
    assert!(!stop.is_finished());

    let report = stop.await.unwrap();
    assert!(report.removed);
    assert_eq!(report.outcome, Some(TerminationOutcome::TimedOut));

    let stored = store.snapshot();
    assert!(stored.contains_key(&fresh.record.id));
    assert!(!stored.contains_key(&stubborn.record.id));

    let _ = nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(stubborn_pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    );
    registry.stop_instance(&fresh.record.id).await;
}
