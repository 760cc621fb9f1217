// Allow uppercase acronyms for industry-standard terms like MFM, GCR, LBA
#![allow(clippy::upper_case_acronyms)]

pub mod adapter;
pub mod error;
pub mod geometry;
pub mod hardware;
pub mod recovery;
pub mod scan;
pub mod settings;
pub mod ui;

// Re-export the main entry points for convenience
pub use adapter::{SectorFluxAdapter, SectorReadout, VerifiedData};
pub use error::{ErrorKind, Severity};
pub use geometry::{Geometry, GeometryError, Lba, SectorAddress, TrackId};
pub use hardware::{Encoding, FluxCapture, FluxCodec, FluxDevice};
pub use recovery::{
    analyze_convergence, InterruptedPass, Outcome, PassRecord, Recommendation, RecoveryEngine,
    RecoveryMode, RecoveryReport, RecoveryStatistics, RestorationPattern,
};
pub use scan::{scan_all_sectors, AbortReason, SectorMap, SectorRecord, SectorStatus};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Cooperative cancellation flag shared between the caller and a running
/// scan or recovery. Checked at track and pass boundaries only.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation (called by signal handlers or UI threads)
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for the next operation
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Failures surfaced by the hardware, codec and addressing layers.
///
/// Every variant maps onto the closed [`ErrorKind`] taxonomy through
/// [`FluxError::kind`], which is what the scanner and recovery engine use to
/// decide between retrying, recording a bad sector and aborting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FluxError {
    #[error("Invalid geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Hardware operation failed ({kind}): {message}")]
    Hardware { kind: ErrorKind, message: String },

    #[error("Codec failure ({encoding}): {message}")]
    Codec { encoding: Encoding, message: String },

    #[error("Address out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation interrupted by user")]
    Interrupted,
}

impl FluxError {
    /// Shorthand for a hardware failure of the given kind
    pub fn hardware(kind: ErrorKind, message: impl Into<String>) -> Self {
        FluxError::Hardware {
            kind,
            message: message.into(),
        }
    }

    /// Map this failure onto the sector error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            FluxError::Hardware { kind, .. } => *kind,
            FluxError::OutOfRange(_) => ErrorKind::SectorNotFound,
            FluxError::Geometry(_)
            | FluxError::Codec { .. }
            | FluxError::InvalidInput(_)
            | FluxError::Interrupted => ErrorKind::Unknown,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

impl From<std::io::Error> for FluxError {
    fn from(err: std::io::Error) -> Self {
        FluxError::Hardware {
            kind: ErrorKind::from_io_error(&err),
            message: err.to_string(),
        }
    }
}

pub type FluxResult<T> = Result<T, FluxError>;

/// How restoration patterns are laid down on a track holding bad sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternScope {
    /// Only the bad sectors receive the pattern; the rest of the track is
    /// re-encoded with its last verified contents.
    Sector,
    /// The whole track is first overwritten with a pattern-formatted track,
    /// then rewritten as for `Sector`.
    Track,
}

/// Session configuration passed explicitly into every entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub encoding: Encoding,
    /// Revolutions captured per track read
    pub revolutions: u32,
    /// Captures used by multiread voting when a sector reads inconclusive
    pub multiread_attempts: u32,
    /// Number of decoded tracks kept by the adapter
    pub track_cache_capacity: usize,
    /// Consecutive non-improving passes that count as convergence
    pub convergence_window: u32,
    /// Write restoration patterns between passes
    pub pattern_writes: bool,
    pub pattern_scope: PatternScope,
    pub drive_unit: u8,
    /// Append finalized bad sectors to this file at the end of a run
    pub bad_sector_log: Option<PathBuf>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Mfm,
            revolutions: 1,
            multiread_attempts: 5,
            track_cache_capacity: 16,
            convergence_window: 2,
            pattern_writes: true,
            pattern_scope: PatternScope::Sector,
            drive_unit: 0,
            bad_sector_log: None,
        }
    }
}

#[cfg(test)]
mod lib_tests;
