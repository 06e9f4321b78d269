use std::fmt::Write;

use follow_core::{RunSummary, TargetList};

pub const PREVIEW_LIMIT: usize = 30;

pub fn render_preview(targets: &TargetList, limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} account(s) selected:", targets.len());
    for (index, target) in targets.iter().take(limit).enumerate() {
        let _ = writeln!(out, "  {:>4}. @{}", index + 1, target);
    }
    if targets.len() > limit {
        let _ = writeln!(out, "  ... and {} more", targets.len() - limit);
    }
    out
}

pub fn render_summary(summary: &RunSummary, dry_run: bool) -> String {
    let mut out = String::new();
    let title = if dry_run { "Dry run summary" } else { "Run summary" };
    let mutated = if dry_run { "Would unfollow" } else { "Unfollowed" };
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "  {:<22}{}", mutated, summary.mutated);
    let _ = writeln!(out, "  {:<22}{}", "Skipped (private)", summary.skipped_private);
    let _ = writeln!(out, "  {:<22}{}", "Skipped (not followed)", summary.skipped_unrelated);
    let _ = writeln!(out, "  {:<22}{}", "Errors", summary.errors);
    if summary.resumed > 0 {
        let _ = writeln!(out, "  {:<22}{}", "Done in earlier run", summary.resumed);
    }
    if summary.interrupted {
        let _ = writeln!(out, "  {:<22}{}", "Not reached", summary.remaining);
        let _ = writeln!(out, "Interrupted. Re-run with --resume --skip-harvest to continue.");
    }
    out
}
