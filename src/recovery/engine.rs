//! Recovery engine state machine.
//!
//! Idle -> Scanning -> ConvergenceCheck -> (NextPass -> PatternWrite ->
//! Rescanning -> ConvergenceCheck)* -> Terminated
//!
//! The drive motor is held for the whole run through a [`PowerGuard`], so it
//! is released on every exit path including fatal aborts.

use super::convergence::{analyze_convergence, has_converged};
use super::pattern::RestorationPattern;
use super::statistics::{PassRecord, RecoveryStatistics};
use super::{
    InterruptedPass, Outcome, ProgressEvent, RecoveryMode, RecoveryReport, RecoveryScope, RecoveryState, Termination,
};
use crate::adapter::SectorFluxAdapter;
use crate::error::BadSectorLog;
use crate::geometry::{Lba, TrackId};
use crate::hardware::{FluxCodec, FluxDevice, PowerGuard};
use crate::scan::scanner::scan_scope;
use crate::scan::{get_scan_statistics, AbortReason, ScanScope, SectorMap, SectorProgress, SectorStatus};
use crate::{CancelToken, FluxError, FluxResult, PatternScope, RecoveryConfig};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use uuid::Uuid;

pub struct RecoveryEngine<'a, D: FluxDevice, C: FluxCodec> {
    adapter: &'a mut SectorFluxAdapter<D, C>,
    config: RecoveryConfig,
    state: RecoveryState,
    /// Classification to start from instead of an all-unscanned map
    seed_map: Option<SectorMap>,
}

impl<'a, D: FluxDevice, C: FluxCodec> RecoveryEngine<'a, D, C> {
    pub fn new(adapter: &'a mut SectorFluxAdapter<D, C>, config: &RecoveryConfig) -> Self {
        Self {
            adapter,
            config: config.clone(),
            state: RecoveryState::Idle,
            seed_map: None,
        }
    }

    /// Start the next run from an existing map, typically the result of an
    /// earlier scan. Sectors outside a targeted scope keep their status.
    pub fn with_sector_map(mut self, map: SectorMap) -> Self {
        self.seed_map = Some(map);
        self
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Run a recovery to completion.
    ///
    /// Per-sector failures and fatal hardware errors are reported through
    /// the returned report's outcome together with the map accumulated so
    /// far. `Err` is only returned for an invalid mode or seed map.
    pub fn recover_disk(
        &mut self,
        mode: &RecoveryMode,
        progress: &mut dyn FnMut(&ProgressEvent),
        cancel: &CancelToken,
    ) -> FluxResult<RecoveryReport> {
        self.validate(mode)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let geometry = *self.adapter.geometry();
        let mut map = self
            .seed_map
            .take()
            .unwrap_or_else(|| SectorMap::new(geometry));
        let mut stats = RecoveryStatistics::new();
        let mut interrupted = None;

        let plan = PassPlan {
            mode,
            multiread_attempts: mode.multiread.unwrap_or(self.config.multiread_attempts),
            window: self.config.convergence_window,
            pattern_writes: self.config.pattern_writes,
            pattern_scope: self.config.pattern_scope,
        };

        tracing::info!(
            run_id = %run_id,
            mode = ?mode.termination,
            multiread = plan.multiread_attempts,
            "Recovery started"
        );

        let outcome = match PowerGuard::acquire(&mut *self.adapter) {
            Ok(mut guard) => run_passes(
                &mut *guard,
                &mut self.state,
                &mut map,
                &mut stats,
                &mut interrupted,
                &plan,
                progress,
                cancel,
            ),
            Err(e) => {
                tracing::error!(error = %e, "Could not spin up drive");
                Outcome::Aborted(AbortReason::fatal(&e, None))
            }
        };

        map.settle();
        transition(&mut self.state, RecoveryState::Terminated);

        let recommendation = analyze_convergence(&stats);
        match &outcome {
            Outcome::Aborted(reason) => tracing::error!(reason = %reason, "Recovery aborted"),
            _ => tracing::info!(
                outcome = %outcome,
                recommendation = %recommendation,
                passes = stats.len(),
                bad_count = stats.final_bad_count().unwrap_or(0),
                "Recovery finished"
            ),
        }

        if let Some(path) = &self.config.bad_sector_log {
            let log = BadSectorLog::new(format!("drive{}", self.config.drive_unit), path);
            if let Err(e) = log.append_map(&map) {
                tracing::warn!(error = %e, "Failed to write bad sector log");
            }
        }

        Ok(RecoveryReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            geometry,
            mode: mode.clone(),
            outcome,
            recommendation,
            statistics: stats,
            interrupted_pass: interrupted,
            summary: get_scan_statistics(&map),
            counters: self.adapter.counters(),
            map,
        })
    }

    /// Targeted recovery over a set of sectors already known to be bad
    pub fn retry_bad_sectors(
        &mut self,
        known_bad: &BTreeSet<Lba>,
        termination: Termination,
        progress: &mut dyn FnMut(&ProgressEvent),
        cancel: &CancelToken,
    ) -> FluxResult<RecoveryReport> {
        let mode = RecoveryMode {
            termination,
            scope: RecoveryScope::Targeted(known_bad.clone()),
            multiread: None,
        };
        self.recover_disk(&mode, progress, cancel)
    }

    fn validate(&self, mode: &RecoveryMode) -> FluxResult<()> {
        if mode.termination.pass_limit() == 0 {
            return Err(FluxError::InvalidInput("pass limit must be at least 1".to_string()));
        }

        let geometry = self.adapter.geometry();
        if let RecoveryScope::Targeted(lbas) = &mode.scope {
            if lbas.is_empty() {
                return Err(FluxError::InvalidInput("targeted recovery needs at least one sector".to_string()));
            }
            if let Some(&lba) = lbas.iter().find(|&&lba| lba >= geometry.total_sectors) {
                return Err(FluxError::OutOfRange(format!(
                    "LBA {} outside 0..{}",
                    lba, geometry.total_sectors
                )));
            }
        }

        if let Some(seed) = &self.seed_map {
            if seed.geometry() != geometry {
                return Err(FluxError::InvalidInput(format!(
                    "seed map geometry {} does not match drive geometry {}",
                    seed.geometry(),
                    geometry
                )));
            }
        }
        Ok(())
    }
}

/// Run parameters resolved from the mode and configuration
struct PassPlan<'m> {
    mode: &'m RecoveryMode,
    multiread_attempts: u32,
    window: u32,
    pattern_writes: bool,
    pattern_scope: PatternScope,
}

impl PassPlan<'_> {
    fn scope(&self) -> ScanScope<'_> {
        match &self.mode.scope {
            RecoveryScope::Full => ScanScope::Full,
            RecoveryScope::Targeted(lbas) => ScanScope::Targeted(lbas),
        }
    }
}

fn transition(state: &mut RecoveryState, next: RecoveryState) {
    if *state != next {
        tracing::debug!(from = %state, to = %next, "Recovery state change");
        *state = next;
    }
}

fn bad_in_scope(map: &SectorMap, scope: ScanScope<'_>) -> BTreeSet<Lba> {
    match scope {
        ScanScope::Full => map.bad_lbas(),
        ScanScope::Targeted(lbas) => lbas
            .iter()
            .copied()
            .filter(|&lba| map.status(lba) == Some(SectorStatus::Bad))
            .collect(),
    }
}

fn run_passes<D: FluxDevice, C: FluxCodec>(
    adapter: &mut SectorFluxAdapter<D, C>,
    state: &mut RecoveryState,
    map: &mut SectorMap,
    stats: &mut RecoveryStatistics,
    interrupted: &mut Option<InterruptedPass>,
    plan: &PassPlan<'_>,
    progress: &mut dyn FnMut(&ProgressEvent),
    cancel: &CancelToken,
) -> Outcome {
    let scope = plan.scope();
    let mut previous_bad: Option<BTreeSet<Lba>> = None;
    let mut written: Option<RestorationPattern> = None;
    let mut pass_index: u32 = 0;

    progress(&ProgressEvent::PassStarted {
        pass: 0,
        pattern: None,
        bad_count: bad_in_scope(map, scope).len(),
    });

    loop {
        transition(
            state,
            if pass_index == 0 {
                RecoveryState::Scanning
            } else {
                RecoveryState::Rescanning
            },
        );

        let started = Instant::now();
        let scan = scan_scope(
            adapter,
            map,
            scope,
            plan.multiread_attempts,
            &mut |p: &SectorProgress| progress(&ProgressEvent::Sector(*p)),
            cancel,
        );
        if let Some(reason) = scan.aborted {
            let partial = InterruptedPass {
                pass_index,
                tracks_scanned: scan.tracks_scanned,
                tracks_in_scope: scope.tracks(adapter.geometry()).len() as u32,
                pattern: written,
            };
            tracing::warn!(
                pass = partial.pass_index,
                tracks_scanned = partial.tracks_scanned,
                tracks_in_scope = partial.tracks_in_scope,
                "Pass interrupted, map mixes it with the previous pass"
            );
            *interrupted = Some(partial);
            return Outcome::Aborted(reason);
        }

        let bad = bad_in_scope(map, scope);
        let record = PassRecord::from_scan(pass_index, &bad, previous_bad.as_ref(), started.elapsed(), written);
        tracing::info!(
            pass = pass_index,
            bad_count = record.bad_count,
            delta = record.delta_from_previous,
            recovered = record.recovered_addresses.len(),
            "Pass completed"
        );
        stats.push(record.clone());
        progress(&ProgressEvent::PassCompleted(record));

        transition(state, RecoveryState::ConvergenceCheck);
        if bad.is_empty() {
            return Outcome::Recovered;
        }
        match plan.mode.termination {
            Termination::FixedPass(passes) if pass_index >= passes => return Outcome::MaxPassesReached,
            Termination::Convergence { max_passes } => {
                if has_converged(stats, plan.window) {
                    return Outcome::Converged;
                }
                if pass_index >= max_passes {
                    return Outcome::MaxPassesReached;
                }
            }
            Termination::FixedPass(_) => {}
        }
        if cancel.is_cancelled() {
            tracing::info!(pass = pass_index, "Recovery cancelled at pass boundary");
            return Outcome::Aborted(AbortReason::Cancelled);
        }

        transition(state, RecoveryState::NextPass);
        let pattern = RestorationPattern::for_pass(pass_index);
        written = plan.pattern_writes.then_some(pattern);
        progress(&ProgressEvent::PassStarted {
            pass: pass_index + 1,
            pattern: written,
            bad_count: bad.len(),
        });

        if plan.pattern_writes {
            transition(state, RecoveryState::PatternWrite);
            if let Err(reason) = write_patterns(adapter, map, &bad, pattern, plan.pattern_scope) {
                return Outcome::Aborted(reason);
            }
        }

        previous_bad = Some(bad);
        pass_index += 1;
    }
}

/// Write `pattern` over every bad sector of each affected track. Every other
/// sector keeps its data, taken from the map where the medium no longer
/// verifies it.
fn write_patterns<D: FluxDevice, C: FluxCodec>(
    adapter: &mut SectorFluxAdapter<D, C>,
    map: &mut SectorMap,
    bad: &BTreeSet<Lba>,
    pattern: RestorationPattern,
    pattern_scope: PatternScope,
) -> Result<(), AbortReason> {
    let mut by_track: BTreeMap<TrackId, Vec<(Lba, u8)>> = BTreeMap::new();
    for &lba in bad {
        if let Some(record) = map.get(lba) {
            by_track
                .entry(record.address.track())
                .or_default()
                .push((lba, record.address.sector));
        }
    }

    for (track, sectors) in by_track {
        for &(lba, _) in &sectors {
            map.mark(lba, SectorStatus::Writing);
        }

        let ids: Vec<u8> = sectors.iter().map(|&(_, id)| id).collect();
        let verified = map.verified_track_data(track);
        let result = match pattern_scope {
            PatternScope::Sector => adapter.write_pattern_to_sectors(track, &ids, pattern, &verified),
            PatternScope::Track => adapter.condition_track(track, &ids, pattern, &verified),
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                map.settle();
                return Err(AbortReason::fatal(&e, sectors.first().map(|&(lba, _)| lba)));
            }
            Err(e) => {
                tracing::warn!(
                    cylinder = track.cylinder,
                    head = track.head,
                    error = %e,
                    "Pattern write failed, leaving sectors for rescan"
                );
            }
        }

        // Awaiting confirmation by the rescan
        for &(lba, _) in &sectors {
            map.mark(lba, SectorStatus::Verifying);
        }
    }

    tracing::debug!(pattern = %pattern, sectors = bad.len(), "Restoration pattern written");
    Ok(())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod engine_tests;
