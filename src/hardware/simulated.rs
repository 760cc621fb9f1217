//! Deterministic in-memory flux drive and codec.
//!
//! The simulated codec lays each track out as a lead-in gap followed by
//! fixed-size sector records (ID mark, C/H/S/N header, data, CRC-32, gap).
//! Bits become flux intervals of two cells (1) or three cells (0). The drive
//! stores the quantized cell counts per track and applies per-sector damage
//! at read time, so every read is a fresh, reproducible capture.

use super::{DecodedSector, Encoding, FluxCapture, FluxCodec, FluxDevice, PayloadChecksum, SectorPayload};
use crate::error::ErrorKind;
use crate::geometry::{Geometry, Lba, TrackId};
use crate::recovery::RestorationPattern;
use crate::{FluxError, FluxResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};

const GAP_BYTE: u8 = 0x4E;
const ID_MARK: u8 = 0xFE;
const LEAD_IN: usize = 16;
const HEADER_LEN: usize = 6;
const CHECKSUM_LEN: usize = 4;
const SECTOR_GAP: usize = 8;

const ONE_CELLS: u8 = 2;
const ZERO_CELLS: u8 = 3;

fn record_len(geometry: &Geometry) -> usize {
    HEADER_LEN + geometry.bytes_per_sector as usize + CHECKSUM_LEN + SECTOR_GAP
}

/// Byte offset of a sector's ID mark within the track
fn id_offset(geometry: &Geometry, sector: u8) -> usize {
    LEAD_IN + (sector as usize - 1) * record_len(geometry)
}

fn data_offset(geometry: &Geometry, sector: u8) -> usize {
    id_offset(geometry, sector) + HEADER_LEN
}

fn bytes_to_cells(bytes: &[u8]) -> Vec<u8> {
    let mut cells = Vec::with_capacity(bytes.len() * 8);
    for byte in bytes {
        for bit in (0..8).rev() {
            cells.push(if byte >> bit & 1 == 1 { ONE_CELLS } else { ZERO_CELLS });
        }
    }
    cells
}

fn cells_to_intervals(cells: &[u8], encoding: Encoding) -> Vec<u32> {
    let cell = encoding.bit_cell_ns();
    cells.iter().map(|&c| c as u32 * cell).collect()
}

fn intervals_to_cells(intervals: &[u32], encoding: Encoding) -> Vec<u8> {
    let cell = encoding.bit_cell_ns();
    intervals
        .iter()
        .map(|&ns| ((ns + cell / 2) / cell).min(u8::MAX as u32) as u8)
        .collect()
}

fn intervals_to_bytes(intervals: &[u32], encoding: Encoding) -> Vec<u8> {
    // Anything shorter than two and a half cells reads as a 1 bit
    let threshold = encoding.bit_cell_ns() * 5 / 2;
    intervals
        .chunks_exact(8)
        .map(|chunk| {
            chunk
                .iter()
                .fold(0u8, |byte, &ns| (byte << 1) | u8::from(ns < threshold))
        })
        .collect()
}

/// Codec for the simulated track layout
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedCodec;

impl SimulatedCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn checksum(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    fn layout_track(&self, track: TrackId, sectors: &[SectorPayload], geometry: &Geometry) -> FluxResult<Vec<u8>> {
        let bps = geometry.bytes_per_sector as usize;
        let mut bytes = vec![GAP_BYTE; LEAD_IN];
        bytes.reserve(geometry.sectors_per_track as usize * record_len(geometry));

        for id in 1..=geometry.sectors_per_track {
            let (data, checksum) = match sectors.iter().find(|p| p.sector == id) {
                Some(payload) if payload.data.len() != bps => {
                    return Err(FluxError::InvalidInput(format!(
                        "sector {} payload is {} bytes, expected {}",
                        id,
                        payload.data.len(),
                        bps
                    )));
                }
                Some(payload) => (payload.data.clone(), payload.checksum),
                None => (vec![0u8; bps], PayloadChecksum::Invalid),
            };
            let checksum = match checksum {
                PayloadChecksum::Computed => Self::checksum(&data),
                PayloadChecksum::Stored(stored) => stored,
                PayloadChecksum::Invalid => !Self::checksum(&data),
            };

            let cylinder = track.cylinder.to_le_bytes();
            bytes.extend_from_slice(&[
                ID_MARK,
                cylinder[0],
                cylinder[1],
                track.head,
                id,
                geometry.size_code(),
            ]);
            bytes.extend_from_slice(&data);
            bytes.extend_from_slice(&checksum.to_le_bytes());
            bytes.extend(std::iter::repeat(GAP_BYTE).take(SECTOR_GAP));
        }

        Ok(bytes)
    }

    fn parse_sector(&self, bytes: &[u8], track: TrackId, id: u8, geometry: &Geometry) -> Option<DecodedSector> {
        let bps = geometry.bytes_per_sector as usize;
        let start = id_offset(geometry, id);
        let end = start + HEADER_LEN + bps + CHECKSUM_LEN;
        if bytes.len() < end {
            return None;
        }

        let header = &bytes[start..start + HEADER_LEN];
        let cylinder = u16::from_le_bytes([header[1], header[2]]);
        if header[0] != ID_MARK || cylinder != track.cylinder || header[3] != track.head || header[4] != id {
            return None;
        }

        let data_start = start + HEADER_LEN;
        let data = bytes[data_start..data_start + bps].to_vec();
        let mut stored = [0u8; CHECKSUM_LEN];
        stored.copy_from_slice(&bytes[data_start + bps..end]);
        let stored_checksum = u32::from_le_bytes(stored);

        let kind = if Self::checksum(&data) == stored_checksum {
            ErrorKind::Success
        } else {
            ErrorKind::CrcError
        };

        Some(DecodedSector {
            cylinder,
            head: track.head,
            sector: id,
            data,
            stored_checksum,
            kind,
        })
    }
}

impl FluxCodec for SimulatedCodec {
    fn decode_flux_data(
        &self,
        flux: &FluxCapture,
        encoding: Encoding,
        geometry: &Geometry,
    ) -> FluxResult<Vec<DecodedSector>> {
        let spt = geometry.sectors_per_track as usize;
        let mut best: Vec<Option<DecodedSector>> = vec![None; spt];

        // Keep the first clean copy of each sector across revolutions,
        // otherwise the first damaged one
        for revolution in &flux.revolutions {
            let bytes = intervals_to_bytes(revolution, encoding);
            for id in 1..=geometry.sectors_per_track {
                let Some(decoded) = self.parse_sector(&bytes, flux.track, id, geometry) else {
                    continue;
                };
                let slot = &mut best[id as usize - 1];
                let replace = match slot {
                    None => true,
                    Some(existing) => !existing.kind.is_success() && decoded.kind.is_success(),
                };
                if replace {
                    *slot = Some(decoded);
                }
            }
        }

        Ok(best.into_iter().flatten().collect())
    }

    fn encode_sectors_to_flux(
        &self,
        track: TrackId,
        sectors: &[SectorPayload],
        encoding: Encoding,
        geometry: &Geometry,
    ) -> FluxResult<FluxCapture> {
        let bytes = self.layout_track(track, sectors, geometry)?;
        Ok(FluxCapture::single(
            track,
            cells_to_intervals(&bytes_to_cells(&bytes), encoding),
        ))
    }

    fn create_pattern_track(
        &self,
        track: TrackId,
        pattern: RestorationPattern,
        encoding: Encoding,
        geometry: &Geometry,
    ) -> FluxResult<FluxCapture> {
        let payloads: Vec<SectorPayload> = (1..=geometry.sectors_per_track)
            .map(|sector| SectorPayload::new(sector, pattern.fill(geometry.bytes_per_sector as usize)))
            .collect();
        self.encode_sectors_to_flux(track, &payloads, encoding, geometry)
    }

    fn verify_sector(&self, data: &[u8], stored_checksum: u32, _encoding: Encoding) -> bool {
        Self::checksum(data) == stored_checksum
    }
}

/// Per-sector damage model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Damage {
    /// Reads with a checksum error until its track has been rewritten
    /// `heals_after_writes` times
    Weak { heals_after_writes: u32 },
    /// One data bit flips per capture at a position that moves with every
    /// capture, so single reads fail but majority voting recovers it
    Marginal,
    /// ID mark destroyed; the sector is never found
    Missing,
    /// Data never reads back cleanly
    Permanent,
}

/// In-memory drive with a single head positioner and motor.
pub struct SimulatedDrive {
    geometry: Geometry,
    encoding: Encoding,
    surface: HashMap<TrackId, Vec<u8>>,
    damage: BTreeMap<Lba, Damage>,
    track_writes: HashMap<TrackId, u32>,
    connected: bool,
    selected_unit: Option<u8>,
    motor_running: bool,
    position: u16,
    write_protected: bool,
    disconnect_after: Option<u64>,
    captures: u64,
    erases: u64,
    motor_cycles: u32,
}

impl SimulatedDrive {
    /// A drive holding a freshly formatted medium whose sectors carry
    /// [`SimulatedDrive::original_data`]
    pub fn formatted(geometry: Geometry, encoding: Encoding) -> FluxResult<Self> {
        geometry.validate()?;
        let codec = SimulatedCodec::new();
        let mut surface = HashMap::with_capacity(geometry.track_count() as usize);

        for track in geometry.tracks() {
            let payloads: Vec<SectorPayload> = geometry
                .track_lbas(track)
                .zip(1..=geometry.sectors_per_track)
                .map(|(lba, sector)| SectorPayload::new(sector, Self::original_data(&geometry, lba)))
                .collect();
            let flux = codec.encode_sectors_to_flux(track, &payloads, encoding, &geometry)?;
            surface.insert(track, intervals_to_cells(&flux.revolutions[0], encoding));
        }

        Ok(Self {
            geometry,
            encoding,
            surface,
            damage: BTreeMap::new(),
            track_writes: HashMap::new(),
            connected: false,
            selected_unit: None,
            motor_running: false,
            position: 0,
            write_protected: false,
            disconnect_after: None,
            captures: 0,
            erases: 0,
            motor_cycles: 0,
        })
    }

    /// Contents written to a sector when the medium was formatted
    pub fn original_data(geometry: &Geometry, lba: Lba) -> Vec<u8> {
        (0..geometry.bytes_per_sector as usize)
            .map(|i| (lba as u8).wrapping_mul(31) ^ (i as u8))
            .collect()
    }

    pub fn with_damage(mut self, lba: Lba, damage: Damage) -> Self {
        self.damage.insert(lba, damage);
        self
    }

    pub fn with_write_protect(mut self, protected: bool) -> Self {
        self.write_protected = protected;
        self
    }

    /// Drop off the bus once `captures` track reads have completed
    pub fn disconnect_after_captures(mut self, captures: u64) -> Self {
        self.disconnect_after = Some(captures);
        self
    }

    pub fn set_damage(&mut self, lba: Lba, damage: Damage) {
        self.damage.insert(lba, damage);
    }

    /// Scatter `count` damaged sectors over the medium, reproducibly for a
    /// given seed. Returns the damaged LBAs.
    pub fn inject_random_damage(&mut self, count: usize, seed: u64) -> Vec<Lba> {
        let mut rng = StdRng::seed_from_u64(seed);
        let count = count.min(self.geometry.total_sectors as usize);
        let mut injected = Vec::with_capacity(count);

        while injected.len() < count {
            let lba = rng.gen_range(0..self.geometry.total_sectors);
            if self.damage.contains_key(&lba) {
                continue;
            }
            let damage = match rng.gen_range(0..10) {
                0..=5 => Damage::Weak {
                    heals_after_writes: rng.gen_range(1..=3),
                },
                6..=7 => Damage::Marginal,
                8 => Damage::Missing,
                _ => Damage::Permanent,
            };
            self.damage.insert(lba, damage);
            injected.push(lba);
        }

        injected.sort_unstable();
        injected
    }

    pub fn damage(&self) -> &BTreeMap<Lba, Damage> {
        &self.damage
    }

    pub fn captures(&self) -> u64 {
        self.captures
    }

    pub fn erases(&self) -> u64 {
        self.erases
    }

    pub fn track_writes(&self, track: TrackId) -> u32 {
        self.track_writes.get(&track).copied().unwrap_or(0)
    }

    pub fn total_track_writes(&self) -> u32 {
        self.track_writes.values().sum()
    }

    pub fn is_motor_on(&self) -> bool {
        self.motor_running
    }

    pub fn motor_cycles(&self) -> u32 {
        self.motor_cycles
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn ensure_selected(&self) -> FluxResult<()> {
        if !self.connected {
            return Err(FluxError::hardware(
                ErrorKind::DeviceDisconnected,
                "simulated drive is not connected",
            ));
        }
        if self.selected_unit.is_none() {
            return Err(FluxError::hardware(ErrorKind::NotReady, "no drive selected"));
        }
        Ok(())
    }

    fn ensure_spinning(&self) -> FluxResult<()> {
        self.ensure_selected()?;
        if !self.motor_running {
            return Err(FluxError::hardware(ErrorKind::NotReady, "drive motor is off"));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> FluxResult<()> {
        self.ensure_spinning()?;
        if self.write_protected {
            return Err(FluxError::hardware(
                ErrorKind::WriteProtected,
                "medium is write protected",
            ));
        }
        Ok(())
    }

    fn flip_bit(cells: &mut [u8], byte_offset: usize, bit: usize) {
        if let Some(cell) = cells.get_mut(byte_offset * 8 + bit) {
            *cell = if *cell == ONE_CELLS { ZERO_CELLS } else { ONE_CELLS };
        }
    }

    fn apply_damage(&self, track: TrackId, cells: &mut [u8], revolution: u64) {
        let lbas = self.geometry.track_lbas(track);
        let data_bits = self.geometry.bytes_per_sector as usize * 8;

        for (&lba, damage) in self.damage.range(lbas.clone()) {
            let sector = (lba - lbas.start) as u8 + 1;
            let data = data_offset(&self.geometry, sector);
            match damage {
                Damage::Weak { heals_after_writes } => {
                    if self.track_writes(track) < *heals_after_writes {
                        Self::flip_bit(cells, data, 0);
                    }
                }
                Damage::Marginal => {
                    let position = ((self.captures * 217 + revolution * 61) % data_bits as u64) as usize;
                    Self::flip_bit(cells, data + position / 8, position % 8);
                }
                Damage::Missing => {
                    Self::flip_bit(cells, id_offset(&self.geometry, sector), 0);
                }
                Damage::Permanent => {
                    Self::flip_bit(cells, data, 7);
                }
            }
        }
    }
}

impl FluxDevice for SimulatedDrive {
    fn connect(&mut self) -> FluxResult<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> FluxResult<()> {
        self.connected = false;
        self.motor_running = false;
        self.selected_unit = None;
        Ok(())
    }

    fn select_drive(&mut self, unit: u8) -> FluxResult<()> {
        if !self.connected {
            return Err(FluxError::hardware(
                ErrorKind::DeviceDisconnected,
                "simulated drive is not connected",
            ));
        }
        if unit > 3 {
            return Err(FluxError::hardware(
                ErrorKind::NotReady,
                format!("no drive at unit {}", unit),
            ));
        }
        self.selected_unit = Some(unit);
        Ok(())
    }

    fn motor_on(&mut self) -> FluxResult<()> {
        self.ensure_selected()?;
        if !self.motor_running {
            self.motor_running = true;
            self.motor_cycles += 1;
        }
        Ok(())
    }

    fn motor_off(&mut self) -> FluxResult<()> {
        if !self.connected {
            return Err(FluxError::hardware(
                ErrorKind::DeviceDisconnected,
                "simulated drive is not connected",
            ));
        }
        self.motor_running = false;
        Ok(())
    }

    fn seek(&mut self, cylinder: u16) -> FluxResult<()> {
        self.ensure_selected()?;
        if cylinder >= self.geometry.cylinders {
            return Err(FluxError::hardware(
                ErrorKind::SectorNotFound,
                format!("seek to cylinder {} beyond last cylinder", cylinder),
            ));
        }
        self.position = cylinder;
        Ok(())
    }

    fn read_track_flux(&mut self, cylinder: u16, head: u8, revolutions: u32) -> FluxResult<FluxCapture> {
        self.ensure_spinning()?;
        if let Some(limit) = self.disconnect_after {
            if self.captures >= limit {
                self.connected = false;
                self.motor_running = false;
                return Err(FluxError::hardware(
                    ErrorKind::DeviceDisconnected,
                    "simulated drive dropped off the bus",
                ));
            }
        }
        if head >= self.geometry.heads {
            return Err(FluxError::hardware(
                ErrorKind::SectorNotFound,
                format!("head {} does not exist", head),
            ));
        }

        // The head reads whatever track it is positioned over
        let track = TrackId::new(self.position, head);
        if self.position != cylinder {
            tracing::debug!(requested = cylinder, position = self.position, "Read without seek");
        }

        self.captures += 1;
        let stored = self.surface.get(&track).cloned().unwrap_or_default();
        let revolutions = (0..revolutions.max(1) as u64)
            .map(|revolution| {
                let mut cells = stored.clone();
                self.apply_damage(track, &mut cells, revolution);
                cells_to_intervals(&cells, self.encoding)
            })
            .collect();

        Ok(FluxCapture { track, revolutions })
    }

    fn write_track_flux(&mut self, cylinder: u16, head: u8, flux: &FluxCapture) -> FluxResult<()> {
        self.ensure_writable()?;
        if self.position != cylinder || head >= self.geometry.heads {
            return Err(FluxError::hardware(
                ErrorKind::Unknown,
                format!("write to C{}/H{} with head at cylinder {}", cylinder, head, self.position),
            ));
        }
        let track = TrackId::new(cylinder, head);
        let cells = flux
            .revolutions
            .first()
            .map(|rev| intervals_to_cells(rev, self.encoding))
            .unwrap_or_default();
        self.surface.insert(track, cells);
        *self.track_writes.entry(track).or_insert(0) += 1;
        Ok(())
    }

    fn erase_track_flux(&mut self, cylinder: u16, head: u8) -> FluxResult<()> {
        self.ensure_writable()?;
        if self.position != cylinder || head >= self.geometry.heads {
            return Err(FluxError::hardware(
                ErrorKind::Unknown,
                format!("erase of C{}/H{} with head at cylinder {}", cylinder, head, self.position),
            ));
        }
        self.surface.insert(TrackId::new(cylinder, head), Vec::new());
        self.erases += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Geometry {
        Geometry::new(3, 2, 4, 256)
    }

    fn ready(drive: &mut SimulatedDrive) {
        drive.connect().unwrap();
        drive.select_drive(0).unwrap();
        drive.motor_on().unwrap();
    }

    fn decode(drive: &mut SimulatedDrive, track: TrackId) -> Vec<DecodedSector> {
        drive.seek(track.cylinder).unwrap();
        let flux = drive.read_track_flux(track.cylinder, track.head, 1).unwrap();
        SimulatedCodec::new()
            .decode_flux_data(&flux, Encoding::Mfm, &small())
            .unwrap()
    }

    #[test]
    fn test_formatted_track_decodes_cleanly() {
        let geometry = small();
        let mut drive = SimulatedDrive::formatted(geometry, Encoding::Mfm).unwrap();
        ready(&mut drive);

        let sectors = decode(&mut drive, TrackId::new(1, 1));
        assert_eq!(sectors.len(), 4);
        assert!(sectors.iter().all(|s| s.kind == ErrorKind::Success));
        let first_lba = geometry.track_lbas(TrackId::new(1, 1)).start;
        assert_eq!(sectors[0].data, SimulatedDrive::original_data(&geometry, first_lba));
    }

    #[test]
    fn test_reads_require_spinning_motor() {
        let mut drive = SimulatedDrive::formatted(small(), Encoding::Mfm).unwrap();
        drive.connect().unwrap();
        drive.select_drive(0).unwrap();
        let err = drive.read_track_flux(0, 0, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
    }

    #[test]
    fn test_damage_models() {
        let geometry = small();
        let mut drive = SimulatedDrive::formatted(geometry, Encoding::Mfm)
            .unwrap()
            .with_damage(0, Damage::Weak { heals_after_writes: 1 })
            .with_damage(1, Damage::Missing)
            .with_damage(2, Damage::Permanent)
            .with_damage(3, Damage::Marginal);
        ready(&mut drive);

        let sectors = decode(&mut drive, TrackId::new(0, 0));
        assert_eq!(sectors.len(), 3, "missing sector must not decode");
        assert_eq!(sectors[0].kind, ErrorKind::CrcError);
        assert_eq!(sectors[1].sector, 3);
        assert_eq!(sectors[1].kind, ErrorKind::CrcError);
        assert_eq!(sectors[2].kind, ErrorKind::CrcError);
    }

    #[test]
    fn test_weak_sector_heals_after_write() {
        let geometry = small();
        let codec = SimulatedCodec::new();
        let mut drive = SimulatedDrive::formatted(geometry, Encoding::Mfm)
            .unwrap()
            .with_damage(0, Damage::Weak { heals_after_writes: 1 });
        ready(&mut drive);

        let track = TrackId::new(0, 0);
        let flux = codec
            .create_pattern_track(track, RestorationPattern::AllSet, Encoding::Mfm, &geometry)
            .unwrap();
        drive.seek(0).unwrap();
        drive.erase_track_flux(0, 0).unwrap();
        drive.write_track_flux(0, 0, &flux).unwrap();
        assert_eq!(drive.track_writes(track), 1);

        let sectors = decode(&mut drive, track);
        assert!(sectors.iter().all(|s| s.kind == ErrorKind::Success));
        assert!(sectors[0].data.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_payload_checksum_policies() {
        let geometry = small();
        let codec = SimulatedCodec::new();
        let data = vec![0x11u8; 256];
        let payloads = vec![
            SectorPayload::new(1, data.clone()),
            SectorPayload::unverified(2, data.clone(), SimulatedCodec::checksum(&data)),
            SectorPayload::unverified(3, data.clone(), 0xDEAD_BEEF),
            SectorPayload::unreadable(4, 256),
        ];

        let flux = codec
            .encode_sectors_to_flux(TrackId::new(0, 0), &payloads, Encoding::Mfm, &geometry)
            .unwrap();
        let sectors = codec.decode_flux_data(&flux, Encoding::Mfm, &geometry).unwrap();

        let kinds: Vec<ErrorKind> = sectors.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![ErrorKind::Success, ErrorKind::Success, ErrorKind::CrcError, ErrorKind::CrcError]
        );
        assert_eq!(sectors[2].data, data);
        assert_eq!(sectors[2].stored_checksum, 0xDEAD_BEEF);
        assert!(!payloads[3].is_verifiable());
    }

    #[test]
    fn test_erased_track_has_no_sectors() {
        let mut drive = SimulatedDrive::formatted(small(), Encoding::Mfm).unwrap();
        ready(&mut drive);
        drive.seek(2).unwrap();
        drive.erase_track_flux(2, 0).unwrap();
        assert!(decode(&mut drive, TrackId::new(2, 0)).is_empty());
    }

    #[test]
    fn test_write_protect_blocks_writes() {
        let mut drive = SimulatedDrive::formatted(small(), Encoding::Mfm)
            .unwrap()
            .with_write_protect(true);
        ready(&mut drive);
        let err = drive.erase_track_flux(0, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteProtected);
    }

    #[test]
    fn test_disconnect_after_captures() {
        let mut drive = SimulatedDrive::formatted(small(), Encoding::Mfm)
            .unwrap()
            .disconnect_after_captures(1);
        ready(&mut drive);
        assert!(drive.read_track_flux(0, 0, 1).is_ok());
        let err = drive.read_track_flux(0, 1, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceDisconnected);
        assert!(!drive.is_connected());
    }

    #[test]
    fn test_random_damage_is_reproducible() {
        let mut a = SimulatedDrive::formatted(small(), Encoding::Mfm).unwrap();
        let mut b = SimulatedDrive::formatted(small(), Encoding::Mfm).unwrap();
        let injected = a.inject_random_damage(5, 42);
        assert_eq!(injected, b.inject_random_damage(5, 42));
        assert_eq!(injected.len(), 5);
        assert_eq!(a.damage(), b.damage());
    }

    #[test]
    fn test_multiple_revolutions_prefer_clean_copy() {
        let geometry = small();
        let mut drive = SimulatedDrive::formatted(geometry, Encoding::Fm).unwrap();
        ready(&mut drive);
        let flux = drive.read_track_flux(0, 0, 3).unwrap();
        assert_eq!(flux.revolution_count(), 3);
        let sectors = SimulatedCodec::new()
            .decode_flux_data(&flux, Encoding::Fm, &geometry)
            .unwrap();
        assert_eq!(sectors.len(), 4);
        assert!(sectors.iter().all(|s| s.kind.is_success()));
    }
}
