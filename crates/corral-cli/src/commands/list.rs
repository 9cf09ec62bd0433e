//! `corral list` — List instances.

use clap::Args;
use corral_common::constants::DEFAULT_LIST_LIMIT;

use super::Context;
use crate::output;

/// Arguments for the `list` command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Number of records to skip.
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Maximum number of records to show.
    #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
    pub limit: usize,
}

/// Executes the `list` command.
///
/// Reads records only; container state is not queried.
///
/// # Errors
///
/// Returns an error if the records cannot be read.
pub fn execute(args: &ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let records = ctx.coordinator.list(args.offset, args.limit)?;
    output::emit(ctx.json, &records, || {
        if records.is_empty() {
            "No instances found.\n".to_string()
        } else {
            output::records_table(&records)
        }
    })
}
