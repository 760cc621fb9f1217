/// Invariants checked on finished recovery reports

use anyhow::Result;
use fluxrescue::hardware::SimulatedDrive;
use fluxrescue::{Lba, RecoveryReport, SectorMap};

/// The map is settled and agrees with the summary and, for a run that
/// finished normally, with the last pass record.
pub fn assert_report_consistent(report: &RecoveryReport) -> Result<()> {
    anyhow::ensure!(report.map.is_settled(), "Map still holds in-progress sectors");
    anyhow::ensure!(
        report.summary.bad == report.map.bad_count(),
        "Summary reports {} bad sectors, map holds {}",
        report.summary.bad,
        report.map.bad_count()
    );
    anyhow::ensure!(
        report.finished_at >= report.started_at,
        "Report finished before it started"
    );
    if let Some(partial) = &report.interrupted_pass {
        anyhow::ensure!(report.outcome.is_aborted(), "Interrupted pass on a run that finished");
        anyhow::ensure!(
            partial.pass_index as usize == report.statistics.len(),
            "Interrupted pass {} does not follow {} recorded passes",
            partial.pass_index,
            report.statistics.len()
        );
        anyhow::ensure!(
            partial.tracks_scanned < partial.tracks_in_scope,
            "Interrupted pass {} covered its whole scope",
            partial.pass_index
        );
    }
    Ok(())
}

/// Each pass's delta and recovered/newly-bad sets agree with the bad counts
/// of adjacent passes.
pub fn assert_pass_history_consistent(report: &RecoveryReport) -> Result<()> {
    let passes = report.statistics.passes();

    for (index, pass) in passes.iter().enumerate() {
        anyhow::ensure!(
            pass.pass_index as usize == index,
            "Pass {} recorded at position {}",
            pass.pass_index,
            index
        );
    }

    if let Some(first) = passes.first() {
        anyhow::ensure!(first.delta_from_previous == 0, "Initial scan has a delta");
        anyhow::ensure!(first.pattern.is_none(), "Initial scan follows a pattern write");
    }

    for pair in passes.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        let expected = current.bad_count as i64 - previous.bad_count as i64;
        anyhow::ensure!(
            current.delta_from_previous == expected,
            "Pass {} delta {} but bad count moved by {}",
            current.pass_index,
            current.delta_from_previous,
            expected
        );
        anyhow::ensure!(
            expected == current.newly_bad.len() as i64 - current.recovered_addresses.len() as i64,
            "Pass {} recovered/newly-bad sets do not explain the delta",
            current.pass_index
        );
        anyhow::ensure!(
            current.recovered_addresses.is_disjoint(&current.newly_bad),
            "Pass {} lists a sector as both recovered and newly bad",
            current.pass_index
        );
    }
    Ok(())
}

/// Every sector outside `rewritten` reads back good with the contents it was
/// formatted with.
pub fn assert_original_data(map: &SectorMap, rewritten: &[Lba]) -> Result<()> {
    let geometry = *map.geometry();
    for record in map.iter().filter(|r| !rewritten.contains(&r.lba)) {
        anyhow::ensure!(
            record.error_kind.map_or(false, |kind| kind.is_success()),
            "LBA {} reads back as {:?}",
            record.lba,
            record.error_kind
        );
        anyhow::ensure!(
            record.last_read_data.as_deref() == Some(SimulatedDrive::original_data(&geometry, record.lba).as_slice()),
            "LBA {} no longer holds its original data",
            record.lba
        );
    }
    Ok(())
}
