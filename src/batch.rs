//! Batch audit: read file IDs, audit each, write one CSV row per file.

use futures::{StreamExt, pin_mut, stream};
use std::io::{self, Write};
use tracing::{error, info, warn};

use crate::{
    models::audit_record::{AuditRecord, CSV_HEADERS, csv_line},
    services::auditor::Auditor,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub write_errors: usize,
}

/// Parse one numeric file ID per line. Blank lines are skipped silently;
/// anything else that is not a number is skipped with a warning.
pub fn parse_file_ids(contents: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for (i, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => warn!("Ignoring input file line {}: {} is not a number", i + 1, line),
        }
    }
    ids
}

/// Audit every ID and write the CSV to `out`, in input order.
///
/// Fails only if the header cannot be written; a failed row is logged and
/// the run continues.
pub async fn run_batch<W: Write>(
    auditor: &Auditor,
    ids: &[i64],
    do_full_check_if_necessary: bool,
    concurrency: usize,
    out: &mut W,
) -> io::Result<BatchSummary> {
    writeln!(out, "{}", csv_line(&CSV_HEADERS))?;

    let mut summary = BatchSummary::default();
    let records = stream::iter(ids.iter().copied())
        .map(|id| auditor.run(id, do_full_check_if_necessary))
        .buffered(concurrency.max(1));
    pin_mut!(records);

    while let Some(record) = records.next().await {
        summary.checked += 1;
        if let Err(err) = write_row(out, &record) {
            summary.write_errors += 1;
            error!("Error writing CSV values: {}", err);
            error!("Values were: {:?}", record.csv_values());
        }
        if record.check_passed {
            summary.passed += 1;
            info!("{} passed", record.generic_file_id);
        } else {
            summary.failed += 1;
            info!("{} failed", record.generic_file_id);
        }
    }

    out.flush()?;
    Ok(summary)
}

fn write_row<W: Write>(out: &mut W, record: &AuditRecord) -> io::Result<()> {
    writeln!(out, "{}", record.csv_row())
}
