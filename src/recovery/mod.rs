//! Multi-pass recovery: scan, write restoration patterns over bad sectors,
//! rescan, and stop once the disk is clean or stops improving.

pub mod convergence;
pub mod engine;
pub mod pattern;
pub mod statistics;

pub use convergence::{analyze_convergence, has_converged, Recommendation};
pub use engine::RecoveryEngine;
pub use pattern::RestorationPattern;
pub use statistics::{PassRecord, RecoveryStatistics};

use crate::adapter::AdapterCounters;
use crate::geometry::{Geometry, Lba};
use crate::scan::{AbortReason, ScanStatistics, SectorMap, SectorProgress};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Engine state, observable through [`RecoveryEngine::state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RecoveryState {
    Idle,
    Scanning,
    PatternWrite,
    Rescanning,
    ConvergenceCheck,
    NextPass,
    Terminated,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// When a run stops if sectors remain bad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Exactly `n` pattern-write/rescan passes after the initial scan
    FixedPass(u32),
    /// Until the bad count stops improving, at most `max_passes` passes
    Convergence { max_passes: u32 },
}

impl Termination {
    pub fn pass_limit(&self) -> u32 {
        match self {
            Termination::FixedPass(n) => *n,
            Termination::Convergence { max_passes } => *max_passes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryScope {
    Full,
    /// Only these LBAs are scanned and rewritten
    Targeted(BTreeSet<Lba>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryMode {
    pub termination: Termination,
    pub scope: RecoveryScope,
    /// Overrides the configured multiread attempt count
    pub multiread: Option<u32>,
}

impl RecoveryMode {
    pub fn fixed_passes(passes: u32) -> Self {
        Self {
            termination: Termination::FixedPass(passes),
            scope: RecoveryScope::Full,
            multiread: None,
        }
    }

    pub fn convergence(max_passes: u32) -> Self {
        Self {
            termination: Termination::Convergence { max_passes },
            scope: RecoveryScope::Full,
            multiread: None,
        }
    }

    pub fn targeted(mut self, lbas: impl IntoIterator<Item = Lba>) -> Self {
        self.scope = RecoveryScope::Targeted(lbas.into_iter().collect());
        self
    }

    pub fn with_multiread(mut self, attempts: u32) -> Self {
        self.multiread = Some(attempts);
        self
    }
}

impl Default for RecoveryMode {
    fn default() -> Self {
        Self::convergence(10)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// No bad sectors left in scope
    Recovered,
    /// Bad count stopped improving
    Converged,
    MaxPassesReached,
    Aborted(AbortReason),
}

impl Outcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Recovered => write!(f, "recovered"),
            Outcome::Converged => write!(f, "converged"),
            Outcome::MaxPassesReached => write!(f, "maximum passes reached"),
            Outcome::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}

/// Notifications delivered synchronously while a run is in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Sector(SectorProgress),
    PassStarted {
        pass: u32,
        /// Pattern written before this pass's scan, if any
        pattern: Option<RestorationPattern>,
        bad_count: usize,
    },
    PassCompleted(PassRecord),
}

/// A pass whose scan stopped before covering its scope. Sectors on the
/// tracks it reached carry this pass's classification while the pass history
/// ends with the pass before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptedPass {
    pub pass_index: u32,
    pub tracks_scanned: u32,
    pub tracks_in_scope: u32,
    /// Pattern written just before the interrupted scan
    pub pattern: Option<RestorationPattern>,
}

/// Everything a run produced. Serializes to JSON without the per-sector data.
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub geometry: Geometry,
    pub mode: RecoveryMode,
    pub outcome: Outcome,
    pub recommendation: Recommendation,
    pub statistics: RecoveryStatistics,
    /// Set when the run aborted in the middle of a scan
    pub interrupted_pass: Option<InterruptedPass>,
    pub summary: ScanStatistics,
    pub counters: AdapterCounters,
    #[serde(skip)]
    pub map: SectorMap,
}

impl RecoveryReport {
    pub fn recovered_addresses(&self) -> BTreeSet<Lba> {
        self.statistics.recovered_addresses()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
