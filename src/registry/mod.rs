// Registry module - The instance registry every caller goes through

mod reconcile;

use crate::config::{DashboardConfig, ProberKind};
use crate::error::Result;
use crate::logs::LogTailer;
#[cfg(unix)]
use crate::process::SignalProber;
use crate::process::{MonitorLauncher, Prober, SysinfoProber, TerminationOutcome, Terminator};
use crate::state::{next_instance_id, InstanceMap, InstanceRecord, InstanceStore, JsonFileStore};
use reconcile::TailPlan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A record as seen by callers, with freshly derived fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceView {
    #[serde(flatten)]
    pub record: InstanceRecord,
    /// Recomputed from the process table on this read
    pub running: bool,
    #[serde(default)]
    pub log_lines: Vec<String>,
}

/// Machine-readable view of every instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: String,
    pub instances: BTreeMap<String, InstanceView>,
}

/// Result of the start-up sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub kept: Vec<String>,
    pub dropped: Vec<String>,
}

/// Result of a stop request. Stopping never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopReport {
    pub id: String,
    /// Whether a record was removed from the store
    pub removed: bool,
    /// Present when a process id was recorded and a termination was attempted
    pub outcome: Option<TerminationOutcome>,
}

/// Instance registry and reconciliation engine
///
/// Owns the store, prober, log tailer, launcher and terminator. Every read
/// refreshes liveness and log data and writes the refreshed mapping back
/// before answering. Read-modify-write cycles are serialized inside one
/// registry; other processes writing the same store are not coordinated.
pub struct InstanceRegistry {
    store: Arc<dyn InstanceStore>,
    prober: Arc<dyn Prober>,
    tailer: LogTailer,
    launcher: MonitorLauncher,
    terminator: Terminator,
    list_log_lines: usize,
    detail_log_lines: usize,
    write_gate: Mutex<()>,
}

impl InstanceRegistry {
    pub fn new(
        config: &DashboardConfig,
        store: Arc<dyn InstanceStore>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        Self {
            store,
            tailer: LogTailer::new(&config.log_dir),
            launcher: MonitorLauncher::new(&config.executable),
            terminator: Terminator::new(Arc::clone(&prober), config.stop_timeout()),
            prober,
            list_log_lines: config.list_log_lines,
            detail_log_lines: config.detail_log_lines,
            write_gate: Mutex::new(()),
        }
    }

    /// Registry backed by the configured state file and prober
    pub fn from_config(config: &DashboardConfig) -> Self {
        let prober: Arc<dyn Prober> = match config.prober {
            #[cfg(unix)]
            ProberKind::Signal => Arc::new(SignalProber),
            _ => Arc::new(SysinfoProber::new()),
        };

        Self::new(
            config,
            Arc::new(JsonFileStore::new(&config.state_path)),
            prober,
        )
    }

    /// Drop every record whose process is no longer alive
    ///
    /// Run once when the supervising service starts: recorded processes do
    /// not survive a restart of the host, the store does.
    pub async fn startup_sweep(&self) -> SweepReport {
        let _guard = self.write_gate.lock().await;

        let instances = self.store.load();
        let total = instances.len();
        let (kept, dropped) = reconcile::sweep(instances, self.prober.as_ref());

        self.persist(&kept);

        let report = SweepReport {
            kept: kept.keys().cloned().collect(),
            dropped: dropped.into_iter().map(|r| r.id).collect(),
        };

        if report.kept.is_empty() {
            tracing::info!("Startup sweep: none of {} record(s) alive, store reset", total);
        } else {
            tracing::info!(
                "Startup sweep: kept {} running instance(s), dropped {}",
                report.kept.len(),
                report.dropped.len()
            );
        }

        report
    }

    /// Every instance, refreshed, with a short log tail
    pub async fn list_instances(&self) -> Vec<InstanceView> {
        let _guard = self.write_gate.lock().await;

        let mut instances = self.store.load();
        let views = reconcile::refresh(
            &mut instances,
            self.prober.as_ref(),
            &self.tailer,
            TailPlan::All(self.list_log_lines),
        )
        .await;
        self.persist(&instances);

        views
    }

    /// One instance, refreshed, with the long log tail
    pub async fn get_instance(&self, id: &str) -> Option<InstanceView> {
        let _guard = self.write_gate.lock().await;

        let mut instances = self.store.load();
        if !instances.contains_key(id) {
            return None;
        }

        let views = reconcile::refresh(
            &mut instances,
            self.prober.as_ref(),
            &self.tailer,
            TailPlan::Only {
                id,
                lines: self.detail_log_lines,
            },
        )
        .await;
        self.persist(&instances);

        views.into_iter().find(|view| view.record.id == id)
    }

    /// Launch a monitor and record it
    pub async fn create_instance(&self, name: &str, target: &str) -> Result<InstanceView> {
        let mut launched = self.launcher.launch(name, target).await?;

        let _guard = self.write_gate.lock().await;

        let mut instances = self.store.load();
        let id = next_instance_id(&instances, chrono::Utc::now());
        let record = InstanceRecord::new(
            id.clone(),
            launched.name.clone(),
            launched.target.clone(),
            launched.pid,
        );
        instances.insert(id.clone(), record.clone());

        if let Err(e) = self.store.save(&instances) {
            tracing::error!(
                "Failed to record instance {} (PID: {}), killing it: {}",
                launched.name,
                launched.pid,
                e
            );
            if let Err(kill_err) = launched.child.start_kill() {
                tracing::warn!(
                    "Failed to kill unrecorded monitor {} (PID: {}): {}",
                    launched.name,
                    launched.pid,
                    kill_err
                );
            }
            return Err(e);
        }

        tracing::info!("Created instance {} ({})", id, record.name);

        let log_lines = self.tailer.tail(&record.name, self.list_log_lines).await;
        Ok(InstanceView {
            running: record.running_hint,
            record,
            log_lines,
        })
    }

    /// Terminate an instance's process and forget the instance
    ///
    /// Unknown ids are a no-op. A known record is removed whatever the
    /// termination outcome.
    pub async fn stop_instance(&self, id: &str) -> StopReport {
        let pid = {
            let _guard = self.write_gate.lock().await;
            match self.store.load().get(id) {
                Some(record) => record.process_id,
                None => {
                    tracing::debug!("Stop requested for unknown instance {}", id);
                    return StopReport {
                        id: id.to_string(),
                        removed: false,
                        outcome: None,
                    };
                }
            }
        };

        // Wait outside the gate; the record is re-read afterwards
        let outcome = match pid {
            Some(pid) => Some(self.terminator.terminate(pid).await),
            None => None,
        };

        let _guard = self.write_gate.lock().await;
        let mut instances = self.store.load();
        let removed = instances.remove(id).is_some();
        if removed {
            self.persist(&instances);
        }

        match outcome {
            Some(outcome) => tracing::info!("Stopped instance {} ({})", id, outcome),
            None => tracing::info!("Removed instance {} (no process recorded)", id),
        }

        StopReport {
            id: id.to_string(),
            removed,
            outcome,
        }
    }

    /// Liveness of every instance, keyed by id
    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let _guard = self.write_gate.lock().await;

        let mut instances = self.store.load();
        let views = reconcile::refresh(
            &mut instances,
            self.prober.as_ref(),
            &self.tailer,
            TailPlan::Skip,
        )
        .await;
        self.persist(&instances);

        StatusSnapshot {
            status: "ok".to_string(),
            instances: views
                .into_iter()
                .map(|view| (view.record.id.clone(), view))
                .collect(),
        }
    }

    /// Save on a read path; a failure degrades to a warning
    fn persist(&self, instances: &InstanceMap) {
        if let Err(e) = self.store.save(instances) {
            tracing::warn!("Failed to persist refreshed instances: {}", e);
        }
    }
}

#[cfg(test)]
mod tests;
