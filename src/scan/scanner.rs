//! Surface traversal.
//!
//! Tracks are visited in physical order with exactly one adapter track read
//! each. Retryable sector failures go through multiread voting before they
//! are finalized bad; all of a track's retries share one batch of captures.
//! Cancellation is honoured between tracks only.

use super::{AbortReason, SectorMap, SectorProgress, SectorStatus};
use crate::adapter::{SectorFluxAdapter, SectorReadout};
use crate::geometry::{Geometry, Lba, TrackId};
use crate::hardware::{FluxCodec, FluxDevice, PowerGuard};
use crate::{CancelToken, RecoveryConfig};
use std::collections::BTreeSet;

/// Which sectors a scan pass touches
#[derive(Debug, Clone, Copy)]
pub enum ScanScope<'a> {
    Full,
    /// Only these LBAs; every other record is left untouched
    Targeted(&'a BTreeSet<Lba>),
}

impl ScanScope<'_> {
    pub fn contains(&self, lba: Lba) -> bool {
        match self {
            ScanScope::Full => true,
            ScanScope::Targeted(lbas) => lbas.contains(&lba),
        }
    }

    /// Tracks holding at least one in-scope sector, in physical order
    pub fn tracks(&self, geometry: &Geometry) -> Vec<TrackId> {
        match self {
            ScanScope::Full => geometry.tracks().collect(),
            ScanScope::Targeted(lbas) => lbas
                .iter()
                .filter_map(|&lba| geometry.track_of(lba).ok())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }
}

/// Result of a standalone surface scan
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub map: SectorMap,
    /// Set when the scan stopped early; the map holds everything classified
    /// up to that point
    pub aborted: Option<AbortReason>,
    pub tracks_scanned: u32,
}

impl ScanResult {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

/// Outcome of one pass over a scope
#[derive(Debug, Clone, Default)]
pub(crate) struct PassScan {
    pub tracks_scanned: u32,
    pub aborted: Option<AbortReason>,
}

/// Scan every sector of the disk.
///
/// The drive motor is held on for the whole scan. `progress` is invoked
/// synchronously after each track with one entry per sector, in strictly
/// increasing LBA order.
pub fn scan_all_sectors<D: FluxDevice, C: FluxCodec>(
    adapter: &mut SectorFluxAdapter<D, C>,
    config: &RecoveryConfig,
    progress: &mut dyn FnMut(&SectorProgress),
    cancel: &CancelToken,
) -> ScanResult {
    let mut map = SectorMap::new(*adapter.geometry());

    let mut guard = match PowerGuard::acquire(adapter) {
        Ok(guard) => guard,
        Err(e) => {
            tracing::error!(error = %e, "Could not spin up drive");
            return ScanResult {
                map,
                aborted: Some(AbortReason::fatal(&e, None)),
                tracks_scanned: 0,
            };
        }
    };

    tracing::info!(
        geometry = %map.geometry(),
        multiread = config.multiread_attempts,
        "Surface scan started"
    );

    let pass = scan_scope(
        &mut *guard,
        &mut map,
        ScanScope::Full,
        config.multiread_attempts,
        progress,
        cancel,
    );

    let counts = map.counts();
    tracing::info!(
        good = counts.good,
        bad = counts.bad,
        unscanned = counts.unscanned,
        tracks = pass.tracks_scanned,
        "Surface scan finished"
    );

    ScanResult {
        map,
        aborted: pass.aborted,
        tracks_scanned: pass.tracks_scanned,
    }
}

/// One scan pass over `scope`. Clears the adapter cache first so every track
/// is captured afresh.
pub(crate) fn scan_scope<D: FluxDevice, C: FluxCodec>(
    adapter: &mut SectorFluxAdapter<D, C>,
    map: &mut SectorMap,
    scope: ScanScope<'_>,
    multiread_attempts: u32,
    progress: &mut dyn FnMut(&SectorProgress),
    cancel: &CancelToken,
) -> PassScan {
    adapter.begin_pass();
    let geometry = *adapter.geometry();
    let mut pass = PassScan::default();

    for track in scope.tracks(&geometry) {
        if cancel.is_cancelled() {
            tracing::info!(track = %track, "Scan cancelled at track boundary");
            pass.aborted = Some(AbortReason::Cancelled);
            break;
        }

        if let Err(reason) = scan_track(adapter, map, track, scope, multiread_attempts) {
            tracing::error!(track = %track, reason = %reason, "Scan aborted");
            pass.aborted = Some(reason);
            break;
        }
        pass.tracks_scanned += 1;

        for record in map.track_records(track).iter().filter(|r| scope.contains(r.lba)) {
            progress(&SectorProgress {
                sector_index: record.lba,
                total_sectors: geometry.total_sectors,
                is_good: record.status == SectorStatus::Good,
                error_kind: record.error_kind.unwrap_or(crate::ErrorKind::Unknown),
            });
        }
    }

    pass
}

/// Classify the in-scope sectors of one track from a single track read.
///
/// Returns the number of in-scope sectors left bad. A fatal error returns
/// the in-flight sectors to their previous classification and aborts.
pub fn scan_track<D: FluxDevice, C: FluxCodec>(
    adapter: &mut SectorFluxAdapter<D, C>,
    map: &mut SectorMap,
    track: TrackId,
    scope: ScanScope<'_>,
    multiread_attempts: u32,
) -> Result<usize, AbortReason> {
    let lbas: Vec<Lba> = adapter
        .geometry()
        .track_lbas(track)
        .filter(|&lba| scope.contains(lba))
        .collect();
    if lbas.is_empty() {
        return Ok(0);
    }
    for &lba in &lbas {
        map.mark(lba, SectorStatus::Reading);
    }

    let readouts = match adapter.read_track(track) {
        Ok(readouts) => readouts,
        Err(e) if e.is_fatal() => {
            map.settle();
            return Err(AbortReason::fatal(&e, lbas.first().copied()));
        }
        Err(e) => {
            // The track could not be read at all; every sector on it is bad
            tracing::warn!(
                cylinder = track.cylinder,
                head = track.head,
                kind = %e.kind(),
                error = %e,
                "Track read failed"
            );
            for &lba in &lbas {
                map.record_failure(lba, e.kind());
            }
            return Ok(lbas.len());
        }
    };

    let (mut settled, retry): (Vec<SectorReadout>, Vec<SectorReadout>) = readouts
        .into_iter()
        .filter(|r| scope.contains(r.lba))
        .partition(|r| r.is_good() || !r.kind.is_retryable() || multiread_attempts == 0);

    if !retry.is_empty() {
        for readout in &retry {
            map.mark(readout.lba, SectorStatus::Recovering);
        }
        let ids: Vec<u8> = retry.iter().map(|r| r.address.sector).collect();
        match adapter.read_track_multiread(track, &ids, multiread_attempts) {
            Ok(voted) => settled.extend(retry.iter().zip(voted).map(|(first, voted)| SectorReadout {
                attempts: first.attempts + voted.attempts,
                ..voted
            })),
            Err(e) if e.is_fatal() => {
                map.settle();
                return Err(AbortReason::fatal(&e, retry.first().map(|r| r.lba)));
            }
            Err(e) => {
                tracing::debug!(track = %track, sectors = retry.len(), error = %e, "Multiread failed");
                settled.extend(retry);
            }
        }
        settled.sort_by_key(|r| r.lba);
    }

    let mut bad = 0;
    for readout in settled {
        if !readout.is_good() {
            bad += 1;
            tracing::warn!(
                lba = readout.lba,
                chs = %readout.address,
                kind = %readout.kind,
                attempts = readout.attempts,
                "Bad sector"
            );
        }
        map.record_readout(&readout);
    }

    tracing::debug!(cylinder = track.cylinder, head = track.head, bad, "Track scanned");
    Ok(bad)
}
