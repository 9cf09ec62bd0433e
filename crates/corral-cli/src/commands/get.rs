//! `corral get` — Show one instance.

use clap::Args;
use corral_common::types::InstanceId;

use super::Context;
use crate::output;

/// Arguments for the `get` command.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Instance id.
    pub id: u64,
}

/// Executes the `get` command.
///
/// # Errors
///
/// Returns an error if the instance does not exist.
pub fn execute(args: &GetArgs, ctx: &Context) -> anyhow::Result<()> {
    let record = ctx.coordinator.get(InstanceId::new(args.id))?;
    output::emit(ctx.json, &record, || output::records_table(std::slice::from_ref(&record)))
}
