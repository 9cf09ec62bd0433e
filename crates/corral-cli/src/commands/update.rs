//! `corral update` — Rename an instance or change its limits or activity.

use clap::Args;
use corral_common::types::{InstanceId, InstanceSpec};

use super::Context;
use crate::output;

/// Arguments for the `update` command. Omitted fields keep their values.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Instance id.
    pub id: u64,

    /// New name.
    #[arg(long)]
    pub name: Option<String>,

    /// New memory limit in MiB.
    #[arg(short, long)]
    pub memory: Option<u32>,

    /// New number of CPUs.
    #[arg(short, long)]
    pub cpus: Option<u32>,

    /// Whether the instance should be running.
    #[arg(long)]
    pub active: Option<bool>,
}

/// Executes the `update` command.
///
/// # Errors
///
/// Returns an error if the instance does not exist or the update fails.
pub fn execute(args: UpdateArgs, ctx: &Context) -> anyhow::Result<()> {
    let id = InstanceId::new(args.id);
    let current = ctx.coordinator.get(id)?;
    let spec = InstanceSpec {
        name: args.name.unwrap_or(current.name),
        memory_limit_mb: args.memory.unwrap_or(current.memory_limit_mb),
        cpu_count: args.cpus.unwrap_or(current.cpu_count),
        is_active: args.active.unwrap_or(current.is_active),
    };
    let record = ctx.coordinator.update(id, &spec)?;
    output::emit(ctx.json, &record, || output::records_table(std::slice::from_ref(&record)))
}
