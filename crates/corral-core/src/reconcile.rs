//! Out-of-band reconciliation between records and live containers.
//!
//! Reads are served from the metadata store alone, so a container that dies
//! or is removed behind the coordinator's back leaves a stale record. A
//! reconciliation pass inspects every instance's container and, unless run
//! in report-only mode, drives the runtime back to what the record declares.
//! The record's `is_active` is the source of truth; `status` is rewritten
//! only from the outcome of the repairing runtime call.

use corral_common::error::{CorralError, Result};
use corral_common::types::{InstanceId, InstanceRecord, InstanceStatus};
use corral_runtime::RuntimeState;
use serde::Serialize;

use crate::coordinator::Coordinator;

const PAGE_SIZE: usize = 100;

/// Whether a pass repairs drift or only reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Detect drift without touching either store.
    ReportOnly,
    /// Detect drift and repair it.
    Repair,
}

/// Kind of divergence between a record and its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Drift {
    /// The record exists but the container does not.
    Missing,
    /// The record is active but the container is stopped.
    ShouldBeRunning,
    /// The record is inactive but the container is running.
    ShouldBeStopped,
    /// The container matches `is_active` but `status` says otherwise.
    StatusStale,
}

/// What happened to one drifted instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RepairOutcome {
    /// Drift was only reported.
    Reported,
    /// Drift was repaired.
    Repaired,
    /// The repair failed with the given cause.
    Failed(String),
}

/// One drifted instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftEntry {
    /// Instance id.
    pub id: InstanceId,
    /// Instance name.
    pub name: String,
    /// Observed container state.
    pub observed: String,
    /// Kind of drift.
    pub drift: Drift,
    /// Repair result.
    pub outcome: RepairOutcome,
}

/// Summary of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Number of records examined.
    pub checked: usize,
    /// Instances whose container diverged from the record.
    pub drifted: Vec<DriftEntry>,
    /// Instances that could not be inspected.
    pub errors: Vec<(InstanceId, String)>,
}

impl ReconcileReport {
    /// Returns `true` if nothing drifted and nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty() && self.errors.is_empty()
    }

    /// Number of successful repairs.
    #[must_use]
    pub fn repaired(&self) -> usize {
        self.drifted
            .iter()
            .filter(|d| d.outcome == RepairOutcome::Repaired)
            .count()
    }
}

/// Classifies the divergence between `record` and the observed container.
#[must_use]
pub fn classify(record: &InstanceRecord, observed: RuntimeState) -> Option<Drift> {
    match (observed, record.is_active) {
        (RuntimeState::Absent, _) => Some(Drift::Missing),
        (RuntimeState::Stopped, true) => Some(Drift::ShouldBeRunning),
        (RuntimeState::Running, false) => Some(Drift::ShouldBeStopped),
        _ if record.status != InstanceStatus::for_active(record.is_active) => {
            Some(Drift::StatusStale)
        }
        _ => None,
    }
}

impl Coordinator {
    /// Compares every record with its container and optionally repairs drift.
    ///
    /// Each instance is examined under its own locks, so the pass can run
    /// alongside regular operations. Per-instance failures are collected in
    /// the report.
    ///
    /// # Errors
    ///
    /// Returns a store error only if the record list cannot be read.
    pub fn reconcile(&self, mode: ReconcileMode) -> Result<ReconcileReport> {
        let mut ids = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.store().list(offset, PAGE_SIZE)?;
            let len = page.len();
            ids.extend(page.into_iter().map(|r| r.id));
            if len < PAGE_SIZE {
                break;
            }
            offset += len;
        }

        let mut report = ReconcileReport::default();
        for id in ids {
            match self.reconcile_one(id, mode) {
                Ok(None) => report.checked += 1,
                Ok(Some(entry)) => {
                    report.checked += 1;
                    report.drifted.push(entry);
                }
                // Deleted since the listing; nothing left to compare.
                Err(CorralError::NotFound { .. }) => {}
                Err(e) => {
                    report.checked += 1;
                    tracing::warn!(id = %id, error = %e, "reconciliation could not inspect instance");
                    report.errors.push((id, e.to_string()));
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            drifted = report.drifted.len(),
            repaired = report.repaired(),
            errors = report.errors.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    fn reconcile_one(&self, id: InstanceId, mode: ReconcileMode) -> Result<Option<DriftEntry>> {
        let (record, _guards) = self.lock_instance(id, None)?;
        let observed = self.runtime().inspect(&record.name)?;
        let Some(drift) = classify(&record, observed) else {
            return Ok(None);
        };
        tracing::warn!(id = %id, name = %record.name, %observed, ?drift, "drift detected");

        let outcome = match mode {
            ReconcileMode::ReportOnly => RepairOutcome::Reported,
            ReconcileMode::Repair => match self.repair(&record, drift) {
                Ok(()) => RepairOutcome::Repaired,
                Err(e) => {
                    tracing::error!(id = %id, name = %record.name, error = %e, "repair failed");
                    RepairOutcome::Failed(e.to_string())
                }
            },
        };

        Ok(Some(DriftEntry {
            id,
            name: record.name,
            observed: observed.to_string(),
            drift,
            outcome,
        }))
    }

    fn repair(&self, record: &InstanceRecord, drift: Drift) -> Result<()> {
        let runtime = self.runtime();
        match drift {
            Drift::Missing => {
                let _ = runtime.create(&self.container_spec(&record.name, record.limits()))?;
                if !record.is_active {
                    if let Err(e) = runtime.stop(&record.name) {
                        let _ = runtime.remove(&record.name);
                        return Err(e);
                    }
                }
            }
            Drift::ShouldBeRunning => runtime.start(&record.name)?,
            Drift::ShouldBeStopped => runtime.stop(&record.name)?,
            Drift::StatusStale => {}
        }

        let status = InstanceStatus::for_active(record.is_active);
        if record.status != status {
            let mut next = record.clone();
            next.status = status;
            let _ = self.store().update(&next)?;
        }
        tracing::info!(id = %record.id, name = %record.name, %status, ?drift, "drift repaired");
        Ok(())
    }
}
