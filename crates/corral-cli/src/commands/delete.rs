//! `corral delete` — Delete an instance and its container.

use clap::Args;
use corral_common::types::InstanceId;

use super::Context;
use crate::output;

/// Arguments for the `delete` command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Instance id.
    pub id: u64,
}

/// Executes the `delete` command.
///
/// # Errors
///
/// Returns an error if the instance does not exist or its container cannot
/// be removed.
pub fn execute(args: &DeleteArgs, ctx: &Context) -> anyhow::Result<()> {
    let record = ctx.coordinator.delete(InstanceId::new(args.id))?;
    output::emit(ctx.json, &record, || format!("Deleted instance {} ({}).\n", record.id, record.name))
}
