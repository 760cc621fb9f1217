//! End-of-run text output.

use crate::recovery::{Outcome, Recommendation, RecoveryReport};
use crate::scan::{get_scan_statistics, ScanResult, ScanStatistics, SectorMap, SectorStatus};
use console::style;
use std::fmt::Write;
use std::time::Duration;

/// Surface map with one row per cylinder and one column per sector, heads
/// side by side. `.` good, `X` bad, `?` unscanned.
pub fn render_surface_map(map: &SectorMap) -> String {
    let geometry = *map.geometry();
    let mut out = String::new();

    for track in geometry.tracks() {
        if track.head == 0 {
            let _ = write!(out, "C{:02} ", track.cylinder);
        } else {
            out.push_str(" | ");
        }
        for record in map.track_records(track) {
            let cell = match record.status {
                SectorStatus::Good => style(".").green(),
                SectorStatus::Bad => style("X").red().bold(),
                SectorStatus::Unscanned => style("?").dim(),
                _ => style("~").yellow(),
            };
            let _ = write!(out, "{}", cell);
        }
        if track.head + 1 == geometry.heads {
            out.push('\n');
        }
    }
    out
}

fn statistics_lines(out: &mut String, stats: &ScanStatistics) {
    let _ = writeln!(
        out,
        "  Good:      {} ({:.2}%)",
        style(stats.good).green(),
        stats.good_percent()
    );
    let _ = writeln!(out, "  Bad:       {}", style(stats.bad).red());
    let _ = writeln!(out, "  Unscanned: {}", stats.unscanned);
    if stats.bad > 0 {
        let _ = writeln!(out, "  Bad tracks: {}", stats.bad_tracks);
        for (kind, count) in &stats.by_kind {
            let _ = writeln!(out, "    {:<16} {}", kind.to_string(), count);
        }
    }
}

pub fn render_scan_summary(result: &ScanResult) -> String {
    let stats = get_scan_statistics(&result.map);
    let mut out = String::new();
    let _ = writeln!(out, "{}", style("Surface scan").bold().underlined());
    let _ = writeln!(out, "  Geometry:  {}", result.map.geometry());
    let _ = writeln!(out, "  Tracks:    {}", result.tracks_scanned);
    statistics_lines(&mut out, &stats);
    if let Some(reason) = &result.aborted {
        let _ = writeln!(out, "  {} {}", style("Stopped early:").yellow().bold(), reason);
    }
    out
}

pub fn render_recovery_summary(report: &RecoveryReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style("Recovery summary").bold().underlined());
    let _ = writeln!(out, "  Run:       {}", report.run_id);
    let _ = writeln!(out, "  Geometry:  {}", report.geometry);

    let outcome = match &report.outcome {
        Outcome::Recovered => style(report.outcome.to_string()).green().bold(),
        Outcome::Aborted(_) => style(report.outcome.to_string()).red().bold(),
        _ => style(report.outcome.to_string()).yellow().bold(),
    };
    let _ = writeln!(out, "  Outcome:   {}", outcome);
    let _ = writeln!(out, "  Passes:    {}", report.statistics.len());

    let elapsed = report
        .elapsed()
        .to_std()
        .map(|d| Duration::from_secs(d.as_secs()))
        .unwrap_or_default();
    let _ = writeln!(out, "  Elapsed:   {}", humantime::format_duration(elapsed));

    if let (Some(initial), Some(last)) = (
        report.statistics.initial_bad_count(),
        report.statistics.final_bad_count(),
    ) {
        let _ = writeln!(out, "  Bad:       {} -> {}", initial, last);
    }
    if let Some(partial) = &report.interrupted_pass {
        let _ = writeln!(
            out,
            "  {} pass {} stopped after {} of {} tracks; their sectors reflect that pass",
            style("Interrupted:").yellow().bold(),
            partial.pass_index,
            partial.tracks_scanned,
            partial.tracks_in_scope
        );
    }
    let recovered = report.recovered_addresses();
    if !recovered.is_empty() {
        let listed: Vec<String> = recovered.iter().take(16).map(|lba| lba.to_string()).collect();
        let more = if recovered.len() > 16 { ", ..." } else { "" };
        let _ = writeln!(
            out,
            "  Recovered: {} sectors (LBA {}{})",
            recovered.len(),
            listed.join(", "),
            more
        );
    }
    statistics_lines(&mut out, &report.summary);

    let _ = writeln!(
        out,
        "\n{} {}",
        style(report.recommendation.to_string()).bold(),
        recommendation_hint(report.recommendation)
    );
    out
}

fn recommendation_hint(recommendation: Recommendation) -> String {
    format!("- {}", recommendation.description())
}
