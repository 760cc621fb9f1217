//! Physical disk layout and CHS <-> LBA addressing.
//!
//! Addresses are traversed cylinder-major, head-minor, sector-minor, which is
//! also the order the scanner visits tracks in. Sector numbers are 1-based as
//! they appear in the sector ID field on the medium.

pub mod formats;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use thiserror::Error;

pub use formats::{infer_format, DiskFormat, FORMATS};

/// Zero-based logical block address
pub type Lba = u64;

/// Sector sizes a sector ID size code can express (128 << n, n = 0..=6)
pub const SUPPORTED_SECTOR_SIZES: [u16; 7] = [128, 256, 512, 1024, 2048, 4096, 8192];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("{0} must be non-zero")]
    ZeroDimension(&'static str),

    #[error("declared total of {declared} sectors does not match computed {computed}")]
    TotalMismatch { declared: u64, computed: u64 },

    #[error("unsupported sector size {0} bytes")]
    UnsupportedSectorSize(u16),

    #[error("address {0} is outside the disk geometry")]
    AddressOutOfRange(SectorAddress),

    #[error("LBA {lba} is outside 0..{total}")]
    LbaOutOfRange { lba: Lba, total: u64 },
}

/// Disk layout. Immutable for the lifetime of a scan or recovery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub cylinders: u16,
    pub heads: u8,
    pub sectors_per_track: u8,
    pub bytes_per_sector: u16,
    /// Declared sector count, normally the product of the dimensions
    pub total_sectors: u64,
}

impl Geometry {
    pub const fn new(cylinders: u16, heads: u8, sectors_per_track: u8, bytes_per_sector: u16) -> Self {
        Self {
            cylinders,
            heads,
            sectors_per_track,
            bytes_per_sector,
            total_sectors: cylinders as u64 * heads as u64 * sectors_per_track as u64,
        }
    }

    /// Look up a geometry from the static format table (e.g. "1.44m")
    pub fn from_format(name: &str) -> Option<Self> {
        formats::find(name).map(|f| f.geometry)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.cylinders == 0 {
            return Err(GeometryError::ZeroDimension("cylinders"));
        }
        if self.heads == 0 {
            return Err(GeometryError::ZeroDimension("heads"));
        }
        if self.sectors_per_track == 0 {
            return Err(GeometryError::ZeroDimension("sectors_per_track"));
        }
        if self.bytes_per_sector == 0 {
            return Err(GeometryError::ZeroDimension("bytes_per_sector"));
        }
        if !SUPPORTED_SECTOR_SIZES.contains(&self.bytes_per_sector) {
            return Err(GeometryError::UnsupportedSectorSize(self.bytes_per_sector));
        }
        let computed = self.computed_total();
        if self.total_sectors != computed {
            return Err(GeometryError::TotalMismatch {
                declared: self.total_sectors,
                computed,
            });
        }
        Ok(())
    }

    fn computed_total(&self) -> u64 {
        self.cylinders as u64 * self.heads as u64 * self.sectors_per_track as u64
    }

    pub fn track_count(&self) -> u32 {
        self.cylinders as u32 * self.heads as u32
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_sectors * self.bytes_per_sector as u64
    }

    /// IBM size code `n` where bytes = 128 << n
    pub fn size_code(&self) -> u8 {
        self.bytes_per_sector.trailing_zeros().saturating_sub(7) as u8
    }

    pub fn contains(&self, address: SectorAddress) -> bool {
        address.cylinder < self.cylinders
            && address.head < self.heads
            && address.sector >= 1
            && address.sector <= self.sectors_per_track
    }

    pub fn to_lba(&self, address: SectorAddress) -> Result<Lba, GeometryError> {
        if !self.contains(address) {
            return Err(GeometryError::AddressOutOfRange(address));
        }
        let track = address.cylinder as u64 * self.heads as u64 + address.head as u64;
        Ok(track * self.sectors_per_track as u64 + (address.sector as u64 - 1))
    }

    pub fn from_lba(&self, lba: Lba) -> Result<SectorAddress, GeometryError> {
        if lba >= self.total_sectors {
            return Err(GeometryError::LbaOutOfRange {
                lba,
                total: self.total_sectors,
            });
        }
        let spt = self.sectors_per_track as u64;
        let track = lba / spt;
        Ok(SectorAddress {
            cylinder: (track / self.heads as u64) as u16,
            head: (track % self.heads as u64) as u8,
            sector: (lba % spt) as u8 + 1,
        })
    }

    pub fn track_of(&self, lba: Lba) -> Result<TrackId, GeometryError> {
        self.from_lba(lba).map(|a| a.track())
    }

    /// Zero-based position of a track in traversal order
    pub fn track_index(&self, track: TrackId) -> u32 {
        track.cylinder as u32 * self.heads as u32 + track.head as u32
    }

    /// LBAs covered by one track
    pub fn track_lbas(&self, track: TrackId) -> Range<Lba> {
        let first = self.track_index(track) as u64 * self.sectors_per_track as u64;
        first..first + self.sectors_per_track as u64
    }

    /// Every track in physical traversal order (cylinder ascending, then head)
    pub fn tracks(&self) -> impl Iterator<Item = TrackId> + '_ {
        (0..self.cylinders)
            .flat_map(move |cylinder| (0..self.heads).map(move |head| TrackId::new(cylinder, head)))
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}c/{}h/{}s x {}B ({} sectors)",
            self.cylinders, self.heads, self.sectors_per_track, self.bytes_per_sector, self.total_sectors
        )
    }
}

/// Cylinder/head/sector address. `sector` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectorAddress {
    pub cylinder: u16,
    pub head: u8,
    pub sector: u8,
}

impl SectorAddress {
    pub fn new(cylinder: u16, head: u8, sector: u8) -> Self {
        Self {
            cylinder,
            head,
            sector,
        }
    }

    pub fn track(&self) -> TrackId {
        TrackId::new(self.cylinder, self.head)
    }
}

impl fmt::Display for SectorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}/H{}/S{}", self.cylinder, self.head, self.sector)
    }
}

/// One side of one cylinder. Ordering follows physical traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId {
    pub cylinder: u16,
    pub head: u8,
}

impl TrackId {
    pub fn new(cylinder: u16, head: u8) -> Self {
        Self { cylinder, head }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}/H{}", self.cylinder, self.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hd_floppy() -> Geometry {
        Geometry::new(80, 2, 18, 512)
    }

    #[test]
    fn test_total_sectors_for_144m() {
        let geometry = hd_floppy();
        assert_eq!(geometry.total_sectors, 2880);
        assert_eq!(geometry.total_bytes(), 1_474_560);
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_dimensions() {
        let geometry = Geometry::new(0, 2, 18, 512);
        assert_eq!(
            geometry.validate(),
            Err(GeometryError::ZeroDimension("cylinders"))
        );

        let geometry = Geometry::new(80, 2, 0, 512);
        assert_eq!(
            geometry.validate(),
            Err(GeometryError::ZeroDimension("sectors_per_track"))
        );
    }

    #[test]
    fn test_validate_rejects_total_mismatch() {
        let mut geometry = hd_floppy();
        geometry.total_sectors = 2879;
        assert!(matches!(
            geometry.validate(),
            Err(GeometryError::TotalMismatch {
                declared: 2879,
                computed: 2880
            })
        ));
    }

    #[test]
    fn test_validate_rejects_odd_sector_size() {
        let geometry = Geometry::new(80, 2, 18, 500);
        assert_eq!(
            geometry.validate(),
            Err(GeometryError::UnsupportedSectorSize(500))
        );
    }

    #[test]
    fn test_size_code() {
        assert_eq!(Geometry::new(77, 1, 26, 128).size_code(), 0);
        assert_eq!(hd_floppy().size_code(), 2);
        assert_eq!(Geometry::new(80, 2, 5, 1024).size_code(), 3);
    }

    #[test]
    fn test_known_addresses() {
        let geometry = hd_floppy();
        assert_eq!(geometry.to_lba(SectorAddress::new(0, 0, 1)).unwrap(), 0);
        assert_eq!(geometry.to_lba(SectorAddress::new(0, 1, 1)).unwrap(), 18);
        assert_eq!(geometry.to_lba(SectorAddress::new(1, 0, 1)).unwrap(), 36);
        assert_eq!(geometry.from_lba(100).unwrap(), SectorAddress::new(2, 1, 11));
        assert_eq!(
            geometry.from_lba(2879).unwrap(),
            SectorAddress::new(79, 1, 18)
        );
    }

    #[test]
    fn test_out_of_range_addresses() {
        let geometry = hd_floppy();
        assert!(geometry.to_lba(SectorAddress::new(0, 0, 0)).is_err());
        assert!(geometry.to_lba(SectorAddress::new(0, 0, 19)).is_err());
        assert!(geometry.to_lba(SectorAddress::new(80, 0, 1)).is_err());
        assert!(geometry.to_lba(SectorAddress::new(0, 2, 1)).is_err());
        assert!(matches!(
            geometry.from_lba(2880),
            Err(GeometryError::LbaOutOfRange { lba: 2880, total: 2880 })
        ));
    }

    #[test]
    fn test_tracks_in_physical_order() {
        let geometry = Geometry::new(3, 2, 9, 512);
        let tracks: Vec<_> = geometry.tracks().collect();
        assert_eq!(tracks.len(), 6);
        assert_eq!(tracks[0], TrackId::new(0, 0));
        assert_eq!(tracks[1], TrackId::new(0, 1));
        assert_eq!(tracks[2], TrackId::new(1, 0));
        assert!(tracks.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(geometry.track_lbas(TrackId::new(1, 1)), 27..36);
    }

    proptest! {
        #[test]
        fn prop_lba_round_trip(lba in 0u64..2880) {
            let geometry = hd_floppy();
            let address = geometry.from_lba(lba).unwrap();
            prop_assert_eq!(geometry.to_lba(address).unwrap(), lba);
        }

        #[test]
        fn prop_address_round_trip(cylinder in 0u16..80, head in 0u8..2, sector in 1u8..=18) {
            let geometry = hd_floppy();
            let address = SectorAddress::new(cylinder, head, sector);
            let lba = geometry.to_lba(address).unwrap();
            prop_assert!(lba < geometry.total_sectors);
            prop_assert_eq!(geometry.from_lba(lba).unwrap(), address);
        }

        #[test]
        fn prop_round_trip_any_geometry(
            cylinders in 1u16..100,
            heads in 1u8..3,
            spt in 1u8..40,
            seed in any::<u64>(),
        ) {
            let geometry = Geometry::new(cylinders, heads, spt, 512);
            let lba = seed % geometry.total_sectors;
            let address = geometry.from_lba(lba).unwrap();
            prop_assert!(geometry.contains(address));
            prop_assert_eq!(geometry.to_lba(address).unwrap(), lba);
        }
    }
}
