//! `corral reconcile` — Compare records with live containers and repair drift.

use std::fmt::Write as _;

use clap::Args;
use corral_core::{ReconcileMode, ReconcileReport};

use super::Context;
use crate::output;

/// Arguments for the `reconcile` command.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Report drift without repairing it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Executes the `reconcile` command.
///
/// # Errors
///
/// Returns an error if the records cannot be read.
pub fn execute(args: &ReconcileArgs, ctx: &Context) -> anyhow::Result<()> {
    let mode = if args.dry_run {
        ReconcileMode::ReportOnly
    } else {
        ReconcileMode::Repair
    };
    let report = ctx.coordinator.reconcile(mode)?;
    output::emit(ctx.json, &report, || render(&report))
}

fn render(report: &ReconcileReport) -> String {
    let mut out = format!(
        "Checked {} instance(s): {} drifted, {} repaired, {} error(s).\n",
        report.checked,
        report.drifted.len(),
        report.repaired(),
        report.errors.len()
    );
    for d in &report.drifted {
        let _ = writeln!(
            out,
            "  {:<6} {:<24} observed={:<8} drift={:?} outcome={:?}",
            d.id, d.name, d.observed, d.drift, d.outcome
        );
    }
    for (id, err) in &report.errors {
        let _ = writeln!(out, "  {id:<6} error: {err}");
    }
    out
}
