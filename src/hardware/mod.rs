//! Flux-level collaborators consumed by the sector adapter.
//!
//! `FluxDevice` is the physical transport (one head, one motor, one operation
//! in flight at a time). `FluxCodec` turns flux transitions into sectors and
//! back for a given encoding. Neither is implemented for real hardware here;
//! `simulated` provides deterministic stand-ins for tests and the CLI.

pub mod power;
pub mod simulated;

pub use power::PowerGuard;
pub use simulated::{Damage, SimulatedCodec, SimulatedDrive};

use crate::error::ErrorKind;
use crate::geometry::{Geometry, TrackId};
use crate::recovery::RestorationPattern;
use crate::FluxResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bit encoding used on the medium, selected per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Mfm,
    Fm,
    Gcr,
}

impl Encoding {
    /// Nominal bit cell width in nanoseconds
    pub fn bit_cell_ns(&self) -> u32 {
        match self {
            Encoding::Mfm => 2000,
            Encoding::Fm => 4000,
            Encoding::Gcr => 3250,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Mfm => write!(f, "MFM"),
            Encoding::Fm => write!(f, "FM"),
            Encoding::Gcr => write!(f, "GCR"),
        }
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mfm" => Ok(Encoding::Mfm),
            "fm" => Ok(Encoding::Fm),
            "gcr" => Ok(Encoding::Gcr),
            other => Err(format!("unknown encoding '{}' (expected mfm, fm or gcr)", other)),
        }
    }
}

/// Raw flux transition timing for one or more revolutions of a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxCapture {
    pub track: TrackId,
    /// Transition intervals in nanoseconds, one vector per revolution
    pub revolutions: Vec<Vec<u32>>,
}

impl FluxCapture {
    pub fn single(track: TrackId, transitions: Vec<u32>) -> Self {
        Self {
            track,
            revolutions: vec![transitions],
        }
    }

    pub fn revolution_count(&self) -> usize {
        self.revolutions.len()
    }

    pub fn transition_count(&self) -> usize {
        self.revolutions.iter().map(Vec::len).sum()
    }

    pub fn is_blank(&self) -> bool {
        self.transition_count() == 0
    }
}

/// One sector as produced by the codec from a flux capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSector {
    pub cylinder: u16,
    pub head: u8,
    /// 1-based sector ID from the ID field
    pub sector: u8,
    pub data: Vec<u8>,
    /// Checksum as read from the medium
    pub stored_checksum: u32,
    pub kind: ErrorKind,
}

/// Which checksum the codec writes after a sector's data field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadChecksum {
    /// Computed from the data; the sector reads back clean
    Computed,
    /// Rewrite the checksum exactly as it was read, so a damaged sector
    /// keeps failing verification
    Stored(u32),
    /// Guaranteed not to match the data
    Invalid,
}

/// Sector contents handed to the codec for encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorPayload {
    pub sector: u8,
    pub data: Vec<u8>,
    pub checksum: PayloadChecksum,
}

impl SectorPayload {
    pub fn new(sector: u8, data: Vec<u8>) -> Self {
        Self {
            sector,
            data,
            checksum: PayloadChecksum::Computed,
        }
    }

    /// Re-encode a damaged decode without making it verify
    pub fn unverified(sector: u8, data: Vec<u8>, stored_checksum: u32) -> Self {
        Self {
            sector,
            data,
            checksum: PayloadChecksum::Stored(stored_checksum),
        }
    }

    /// Placeholder for a sector whose contents are unknown
    pub fn unreadable(sector: u8, len: usize) -> Self {
        Self {
            sector,
            data: vec![0u8; len],
            checksum: PayloadChecksum::Invalid,
        }
    }

    pub fn is_verifiable(&self) -> bool {
        self.checksum == PayloadChecksum::Computed
    }
}

/// Physical drive transport
pub trait FluxDevice {
    fn connect(&mut self) -> FluxResult<()>;
    fn disconnect(&mut self) -> FluxResult<()>;
    fn select_drive(&mut self, unit: u8) -> FluxResult<()>;
    fn motor_on(&mut self) -> FluxResult<()>;
    fn motor_off(&mut self) -> FluxResult<()>;
    fn seek(&mut self, cylinder: u16) -> FluxResult<()>;
    fn read_track_flux(&mut self, cylinder: u16, head: u8, revolutions: u32) -> FluxResult<FluxCapture>;
    fn write_track_flux(&mut self, cylinder: u16, head: u8, flux: &FluxCapture) -> FluxResult<()>;
    fn erase_track_flux(&mut self, cylinder: u16, head: u8) -> FluxResult<()>;
}

/// Flux <-> sector codec for MFM/FM/GCR
pub trait FluxCodec {
    /// Decode every sector found in the capture. Sectors whose ID field could
    /// not be located are simply absent from the result.
    fn decode_flux_data(
        &self,
        flux: &FluxCapture,
        encoding: Encoding,
        geometry: &Geometry,
    ) -> FluxResult<Vec<DecodedSector>>;

    fn encode_sectors_to_flux(
        &self,
        track: TrackId,
        sectors: &[SectorPayload],
        encoding: Encoding,
        geometry: &Geometry,
    ) -> FluxResult<FluxCapture>;

    fn create_pattern_track(
        &self,
        track: TrackId,
        pattern: RestorationPattern,
        encoding: Encoding,
        geometry: &Geometry,
    ) -> FluxResult<FluxCapture>;

    /// Check sector data against the checksum stored on the medium
    fn verify_sector(&self, data: &[u8], stored_checksum: u32, encoding: Encoding) -> bool;
}
