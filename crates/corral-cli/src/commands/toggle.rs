//! `corral toggle` — Start a stopped instance or stop a running one.

use clap::Args;
use corral_common::types::InstanceId;

use super::Context;
use crate::output;

/// Arguments for the `toggle` command.
#[derive(Args, Debug)]
pub struct ToggleArgs {
    /// Instance id.
    pub id: u64,
}

/// Executes the `toggle` command.
///
/// # Errors
///
/// Returns an error if the instance does not exist or the runtime fails.
pub fn execute(args: &ToggleArgs, ctx: &Context) -> anyhow::Result<()> {
    let record = ctx.coordinator.toggle(InstanceId::new(args.id))?;
    output::emit(ctx.json, &record, || output::records_table(std::slice::from_ref(&record)))
}
