//! `corral create` — Create an instance and its container.

use clap::Args;
use corral_common::types::InstanceSpec;

use super::Context;
use crate::output;

/// Arguments for the `create` command.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Instance name; also the container name.
    pub name: String,

    /// Memory limit in MiB.
    #[arg(short, long, default_value_t = 256)]
    pub memory: u32,

    /// Number of CPUs.
    #[arg(short, long, default_value_t = 1)]
    pub cpus: u32,

    /// Create the instance stopped.
    #[arg(long)]
    pub inactive: bool,
}

/// Executes the `create` command.
///
/// # Errors
///
/// Returns an error if the instance cannot be created.
pub fn execute(args: CreateArgs, ctx: &Context) -> anyhow::Result<()> {
    let record = ctx.coordinator.create(&InstanceSpec {
        name: args.name,
        memory_limit_mb: args.memory,
        cpu_count: args.cpus,
        is_active: !args.inactive,
    })?;
    output::emit(ctx.json, &record, || output::records_table(std::slice::from_ref(&record)))
}
