// Reconciliation of recorded instances against the process table and logs

use super::InstanceView;
use crate::logs::LogTailer;
use crate::process::Prober;
use crate::state::{InstanceMap, InstanceRecord};

/// Which records get their log re-tailed during a refresh
#[derive(Debug, Clone, Copy)]
pub(crate) enum TailPlan<'a> {
    /// Liveness only
    Skip,
    /// Every record, `n` lines each
    All(usize),
    /// A single record, `lines` lines
    Only { id: &'a str, lines: usize },
}

impl TailPlan<'_> {
    fn lines_for(&self, id: &str) -> usize {
        match *self {
            TailPlan::Skip => 0,
            TailPlan::All(n) => n,
            TailPlan::Only { id: wanted, lines } if wanted == id => lines,
            TailPlan::Only { .. } => 0,
        }
    }
}

/// Split records into those whose process is alive and those that are not
///
/// Kept records are returned untouched. A record without a process id can
/// never become live and is dropped.
pub(crate) fn sweep(
    instances: InstanceMap,
    prober: &dyn Prober,
) -> (InstanceMap, Vec<InstanceRecord>) {
    let mut kept = InstanceMap::new();
    let mut dropped = Vec::new();

    for (id, record) in instances {
        match record.process_id {
            Some(pid) if prober.is_alive(pid) => {
                kept.insert(id, record);
            }
            _ => dropped.push(record),
        }
    }

    (kept, dropped)
}

/// Recompute liveness for every record in place and build the matching views
///
/// Views come back ordered by creation time, then id.
pub(crate) async fn refresh(
    instances: &mut InstanceMap,
    prober: &dyn Prober,
    tailer: &LogTailer,
    plan: TailPlan<'_>,
) -> Vec<InstanceView> {
    let mut views = Vec::with_capacity(instances.len());

    for record in instances.values_mut() {
        let running = match record.process_id {
            Some(pid) => prober.is_alive(pid),
            None => false,
        };
        record.running_hint = running;

        let lines = plan.lines_for(&record.id);
        let log_lines = if record.process_id.is_some() && lines > 0 {
            tailer.tail(&record.name, lines).await
        } else {
            Vec::new()
        };

        views.push(InstanceView {
            record: record.clone(),
            running,
            log_lines,
        });
    }

    views.sort_by(|a, b| {
        a.record
            .created_at
            .cmp(&b.record.created_at)
            .then_with(|| a.record.id.cmp(&b.record.id))
    });

    views
}
