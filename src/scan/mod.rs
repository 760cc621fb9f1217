//! Sector status map and surface scanning.
//!
//! The [`SectorMap`] holds exactly one [`SectorRecord`] per LBA. It is only
//! mutated by the scanner and the recovery engine; everything else sees it
//! through shared references.

pub mod scanner;

pub use scanner::{scan_all_sectors, scan_track, ScanResult, ScanScope};

use crate::adapter::{SectorReadout, VerifiedData};
use crate::error::ErrorKind;
use crate::geometry::{Geometry, Lba, SectorAddress, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectorStatus {
    Unscanned,
    Good,
    Bad,
    Recovering,
    Reading,
    Writing,
    Verifying,
}

impl SectorStatus {
    /// In-progress states that only exist while an operation is running
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SectorStatus::Recovering | SectorStatus::Reading | SectorStatus::Writing | SectorStatus::Verifying
        )
    }
}

impl fmt::Display for SectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorRecord {
    pub address: SectorAddress,
    pub lba: Lba,
    pub status: SectorStatus,
    /// Kind of the most recent classification, `None` until first read
    pub error_kind: Option<ErrorKind>,
    #[serde(skip)]
    pub last_read_data: Option<Vec<u8>>,
    /// Flux captures spent on this sector across all passes
    pub read_attempts: u32,
}

/// Sector counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub unscanned: usize,
    pub good: usize,
    pub bad: usize,
    pub in_progress: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.unscanned + self.good + self.bad + self.in_progress
    }
}

/// Status of every addressable sector of one disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorMap {
    geometry: Geometry,
    records: Vec<SectorRecord>,
}

impl SectorMap {
    /// A map with every sector `Unscanned`
    pub fn new(geometry: Geometry) -> Self {
        let records = (0..geometry.total_sectors)
            .filter_map(|lba| {
                geometry.from_lba(lba).ok().map(|address| SectorRecord {
                    address,
                    lba,
                    status: SectorStatus::Unscanned,
                    error_kind: None,
                    last_read_data: None,
                    read_attempts: 0,
                })
            })
            .collect();
        Self { geometry, records }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, lba: Lba) -> Option<&SectorRecord> {
        self.records.get(lba as usize)
    }

    pub fn status(&self, lba: Lba) -> Option<SectorStatus> {
        self.get(lba).map(|r| r.status)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectorRecord> {
        self.records.iter()
    }

    /// Records of one track in sector order
    pub fn track_records(&self, track: TrackId) -> &[SectorRecord] {
        let lbas = self.geometry.track_lbas(track);
        let end = (lbas.end as usize).min(self.records.len());
        let start = (lbas.start as usize).min(end);
        &self.records[start..end]
    }

    pub fn counts(&self) -> StatusCounts {
        self.records
            .iter()
            .fold(StatusCounts::default(), |mut counts, record| {
                match record.status {
                    SectorStatus::Unscanned => counts.unscanned += 1,
                    SectorStatus::Good => counts.good += 1,
                    SectorStatus::Bad => counts.bad += 1,
                    _ => counts.in_progress += 1,
                }
                counts
            })
    }

    pub fn good_lbas(&self) -> BTreeSet<Lba> {
        self.lbas_with(SectorStatus::Good)
    }

    pub fn bad_lbas(&self) -> BTreeSet<Lba> {
        self.lbas_with(SectorStatus::Bad)
    }

    pub fn bad_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == SectorStatus::Bad)
            .count()
    }

    /// Last data read from each `Good` sector of a track, keyed by sector id
    pub fn verified_track_data(&self, track: TrackId) -> VerifiedData {
        self.track_records(track)
            .iter()
            .filter(|r| r.status == SectorStatus::Good)
            .filter_map(|r| r.last_read_data.clone().map(|data| (r.address.sector, data)))
            .collect()
    }

    /// True once no sector is left in an in-progress state
    pub fn is_settled(&self) -> bool {
        !self.records.iter().any(|r| r.status.is_transient())
    }

    fn lbas_with(&self, status: SectorStatus) -> BTreeSet<Lba> {
        self.records
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.lba)
            .collect()
    }

    pub(crate) fn mark(&mut self, lba: Lba, status: SectorStatus) {
        if let Some(record) = self.records.get_mut(lba as usize) {
            record.status = status;
        }
    }

    /// Classify a sector from a read
    pub(crate) fn record_readout(&mut self, readout: &SectorReadout) {
        if let Some(record) = self.records.get_mut(readout.lba as usize) {
            record.status = if readout.is_good() {
                SectorStatus::Good
            } else {
                SectorStatus::Bad
            };
            record.error_kind = Some(readout.kind);
            record.last_read_data = readout.data.clone();
            record.read_attempts = record.read_attempts.saturating_add(readout.attempts);
        }
    }

    /// Mark a sector bad without a readout (whole-track failures)
    pub(crate) fn record_failure(&mut self, lba: Lba, kind: ErrorKind) {
        if let Some(record) = self.records.get_mut(lba as usize) {
            record.status = SectorStatus::Bad;
            record.error_kind = Some(kind);
            record.read_attempts = record.read_attempts.saturating_add(1);
        }
    }

    /// Return every in-progress sector to its last settled classification:
    /// `Unscanned` if it was never read, otherwise `Good` or `Bad`.
    pub(crate) fn settle(&mut self) {
        for record in self.records.iter_mut().filter(|r| r.status.is_transient()) {
            record.status = match record.error_kind {
                None => SectorStatus::Unscanned,
                Some(kind) if kind.is_success() => SectorStatus::Good,
                Some(_) => SectorStatus::Bad,
            };
        }
    }
}

/// Progress notification emitted for every sector after its track is done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectorProgress {
    /// LBA of the sector just classified
    pub sector_index: Lba,
    pub total_sectors: u64,
    pub is_good: bool,
    pub error_kind: ErrorKind,
}

/// Why an operation stopped before completing its scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    Cancelled,
    Fatal {
        kind: ErrorKind,
        message: String,
        lba: Option<Lba>,
    },
}

impl AbortReason {
    pub(crate) fn fatal(error: &crate::FluxError, lba: Option<Lba>) -> Self {
        AbortReason::Fatal {
            kind: error.kind(),
            message: error.to_string(),
            lba,
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cancelled => write!(f, "cancelled by user"),
            AbortReason::Fatal {
                kind,
                message,
                lba: Some(lba),
            } => write!(f, "{} at LBA {}: {}", kind, lba, message),
            AbortReason::Fatal { kind, message, .. } => write!(f, "{}: {}", kind, message),
        }
    }
}

/// Classification summary of one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub track: TrackId,
    pub good: usize,
    pub bad: usize,
    pub unscanned: usize,
    /// 1-based ids of the bad sectors
    pub bad_sectors: Vec<u8>,
}

impl TrackInfo {
    pub fn is_clean(&self) -> bool {
        self.bad == 0 && self.unscanned == 0
    }
}

pub fn get_track_info(map: &SectorMap, track: TrackId) -> TrackInfo {
    let mut info = TrackInfo {
        track,
        good: 0,
        bad: 0,
        unscanned: 0,
        bad_sectors: Vec::new(),
    };
    for record in map.track_records(track) {
        match record.status {
            SectorStatus::Good => info.good += 1,
            SectorStatus::Bad => {
                info.bad += 1;
                info.bad_sectors.push(record.address.sector);
            }
            _ => info.unscanned += 1,
        }
    }
    info
}

/// Whole-disk classification summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStatistics {
    pub total_sectors: u64,
    pub good: usize,
    pub bad: usize,
    pub unscanned: usize,
    /// Tracks holding at least one bad sector
    pub bad_tracks: usize,
    /// Bad sectors by their last error kind
    pub by_kind: BTreeMap<ErrorKind, usize>,
}

impl ScanStatistics {
    pub fn good_percent(&self) -> f64 {
        if self.total_sectors == 0 {
            return 0.0;
        }
        self.good as f64 * 100.0 / self.total_sectors as f64
    }
}

pub fn get_scan_statistics(map: &SectorMap) -> ScanStatistics {
    let counts = map.counts();
    let mut by_kind = BTreeMap::new();
    let mut bad_tracks = BTreeSet::new();

    for record in map.iter().filter(|r| r.status == SectorStatus::Bad) {
        let kind = record.error_kind.unwrap_or(ErrorKind::Unknown);
        *by_kind.entry(kind).or_insert(0) += 1;
        bad_tracks.insert(record.address.track());
    }

    ScanStatistics {
        total_sectors: map.geometry().total_sectors,
        good: counts.good,
        bad: counts.bad,
        unscanned: counts.unscanned + counts.in_progress,
        bad_tracks: bad_tracks.len(),
        by_kind,
    }
}
