//! Human-readable batch reports.

use super::{BatchSummary, JobStatus};
use std::fmt::Write;

/// Format a byte count with binary units, e.g. `1.50 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// Signed variant of [`format_size`].
pub fn format_signed_size(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", format_size(bytes.unsigned_abs()))
    } else {
        format_size(bytes as u64)
    }
}

/// Render a summary as plain text.
pub fn render_summary(summary: &BatchSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Processed {} file(s) with {} worker(s) in {:.1}s",
        summary.total,
        summary.workers,
        summary.elapsed_ms as f64 / 1000.0
    );
    if summary.cancelled {
        let _ = writeln!(out, "Batch was cancelled before completion");
    }
    let _ = writeln!(out, "  Succeeded:    {}", summary.succeeded);
    let _ = writeln!(out, "  Failed:       {}", summary.failed);
    let _ = writeln!(out, "  Probe failed: {}", summary.probe_failed);
    let _ = writeln!(out, "  Skipped:      {}", summary.skipped);

    if summary.succeeded > 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "Initial size: {}", format_size(summary.input_bytes));
        let _ = writeln!(out, "Final size:   {}", format_size(summary.output_bytes));
        let _ = writeln!(
            out,
            "Saved:        {} ({:.1}%)",
            format_signed_size(summary.bytes_saved),
            summary.saved_percent
        );
    }

    let fallbacks: Vec<_> = summary.fallbacks().collect();
    if !fallbacks.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Audio fallback applied:");
        for result in fallbacks {
            let kept = result
                .keep
                .as_ref()
                .map(|k| format!("{:?}", k.audio))
                .unwrap_or_default();
            let _ = writeln!(out, "  {} (kept audio {})", result.path.display(), kept);
        }
    }

    let failures: Vec<_> = summary.failures().collect();
    if !failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failures:");
        for result in failures {
            let kind = match result.status {
                JobStatus::ProbeFailed => "probe",
                _ => "mux",
            };
            let _ = writeln!(
                out,
                "  [{}] {}: {}",
                kind,
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    out
}
