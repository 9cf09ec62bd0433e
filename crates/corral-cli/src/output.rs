//! Formatted output helpers for CLI commands.

use corral_common::types::InstanceRecord;
use serde::Serialize;

/// Formats a size given in MiB (e.g. "256 MiB", "1.5 GiB").
#[must_use]
pub fn format_mib(mib: u32) -> String {
    if mib >= 1024 {
        format!("{:.1} GiB", f64::from(mib) / 1024.0)
    } else {
        format!("{mib} MiB")
    }
}

/// Renders records as an aligned table.
#[must_use]
pub fn records_table(records: &[InstanceRecord]) -> String {
    let mut out = format!(
        "{:<6} {:<24} {:<10} {:<6} {:<8} {:<8}\n",
        "ID", "NAME", "MEMORY", "CPUS", "ACTIVE", "STATUS"
    );
    for r in records {
        out.push_str(&format!(
            "{:<6} {:<24} {:<10} {:<6} {:<8} {:<8}\n",
            r.id,
            r.name,
            format_mib(r.memory_limit_mb),
            r.cpu_count,
            if r.is_active { "yes" } else { "no" },
            r.status
        ));
    }
    out
}

/// Prints `value` as pretty JSON, or falls back to `text`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text());
    }
    Ok(())
}
