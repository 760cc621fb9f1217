//! Sector-granularity I/O on top of flux-granularity hardware.
//!
//! Reads capture a whole track once, decode it through the codec for the
//! session encoding, and serve every sector of that track from a bounded
//! decode cache until the track is written or the next scan pass begins.
//! Writes always pre-erase the track and invalidate its cache entry.

pub mod cache;
pub mod voting;

use crate::error::ErrorKind;
use crate::geometry::{Geometry, Lba, SectorAddress, TrackId};
use crate::hardware::{DecodedSector, Encoding, FluxCapture, FluxCodec, FluxDevice, SectorPayload};
use crate::recovery::RestorationPattern;
use crate::{FluxError, FluxResult, RecoveryConfig};
use cache::{CachedTrack, TrackCache};
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of reading one sector. Every read produces one, good or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorReadout {
    pub address: SectorAddress,
    pub lba: Lba,
    /// Last decoded contents; present for CRC failures too
    pub data: Option<Vec<u8>>,
    pub kind: ErrorKind,
    /// Flux captures that contributed to this readout
    pub attempts: u32,
}

impl SectorReadout {
    pub fn new(address: SectorAddress, lba: Lba, data: Option<Vec<u8>>, kind: ErrorKind, attempts: u32) -> Self {
        Self {
            address,
            lba,
            data,
            kind,
            attempts,
        }
    }

    pub fn is_good(&self) -> bool {
        self.kind.is_success()
    }
}

/// Last verified contents of sectors on one track, keyed by 1-based sector id
pub type VerifiedData = BTreeMap<u8, Vec<u8>>;

/// A sector collecting copies during a shared multiread
struct VoteCandidate {
    address: SectorAddress,
    lba: Lba,
    copies: Vec<DecodedSector>,
    settled: Option<SectorReadout>,
}

/// Physical operation counters, cumulative since the adapter was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdapterCounters {
    /// Single track captures (cache misses)
    pub captures: u64,
    /// Extra captures issued by multiread voting
    pub multiread_captures: u64,
    pub seeks: u64,
    pub track_writes: u64,
    pub erases: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

pub struct SectorFluxAdapter<D: FluxDevice, C: FluxCodec> {
    device: D,
    codec: C,
    geometry: Geometry,
    encoding: Encoding,
    revolutions: u32,
    cache: TrackCache,
    counters: AdapterCounters,
    /// Cylinder the head was last sent to, if known
    head_cylinder: Option<u16>,
}

impl<D: FluxDevice, C: FluxCodec> SectorFluxAdapter<D, C> {
    pub fn new(device: D, codec: C, geometry: Geometry, config: &RecoveryConfig) -> FluxResult<Self> {
        geometry.validate()?;
        Ok(Self {
            device,
            codec,
            geometry,
            encoding: config.encoding,
            revolutions: config.revolutions.max(1),
            cache: TrackCache::new(config.track_cache_capacity),
            counters: AdapterCounters::default(),
            head_cylinder: None,
        })
    }

    /// Connect to the transport and select a drive unit
    pub fn open(&mut self, unit: u8) -> FluxResult<()> {
        self.device.connect()?;
        self.device.select_drive(unit)?;
        self.head_cylinder = None;
        tracing::info!(unit, geometry = %self.geometry, encoding = %self.encoding, "Drive opened");
        Ok(())
    }

    pub fn close(&mut self) -> FluxResult<()> {
        self.cache.clear();
        self.head_cylinder = None;
        self.device.disconnect()
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub(crate) fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn counters(&self) -> AdapterCounters {
        self.counters
    }

    pub fn cached_tracks(&self) -> usize {
        self.cache.len()
    }

    /// Start a scan pass: every track is captured afresh exactly once
    pub fn begin_pass(&mut self) {
        if !self.cache.is_empty() {
            tracing::debug!(tracks = self.cache.len(), "Clearing track cache for new pass");
        }
        self.cache.clear();
    }

    /// Read every sector of a track from a single capture
    pub fn read_track(&mut self, track: TrackId) -> FluxResult<Vec<SectorReadout>> {
        self.check_track(track)?;
        self.load_track(track, self.revolutions)?;

        let lbas = self.geometry.track_lbas(track);
        Ok((1..=self.geometry.sectors_per_track)
            .zip(lbas)
            .map(|(sector, lba)| self.readout_from_cache(SectorAddress::new(track.cylinder, track.head, sector), lba, 1))
            .collect())
    }

    pub fn read_sector(&mut self, address: SectorAddress, revolutions: u32) -> FluxResult<SectorReadout> {
        let lba = self.lba_of(address)?;
        self.load_track(address.track(), revolutions.max(1))?;
        Ok(self.readout_from_cache(address, lba, 1))
    }

    /// Recover a marginal sector by voting across independent captures.
    ///
    /// A previously cached damaged decode of the sector takes part in the
    /// vote. Stops early as soon as one capture decodes cleanly.
    pub fn read_sector_multiread(&mut self, address: SectorAddress, attempts: u32) -> FluxResult<SectorReadout> {
        self.read_track_multiread(address.track(), &[address.sector], attempts)?
            .pop()
            .ok_or_else(|| FluxError::OutOfRange(format!("sector {}", address)))
    }

    /// Multiread several sectors of one track from a shared batch of
    /// captures, so a track costs at most `attempts` captures however many
    /// of its sectors need voting.
    ///
    /// Each sector stops collecting copies once a capture decodes it
    /// cleanly, and capturing stops when every sector is settled. Readouts
    /// follow the order of `sectors`.
    pub fn read_track_multiread(
        &mut self,
        track: TrackId,
        sectors: &[u8],
        attempts: u32,
    ) -> FluxResult<Vec<SectorReadout>> {
        self.check_track(track)?;
        let mut candidates = Vec::with_capacity(sectors.len());
        for &sector in sectors {
            let address = SectorAddress::new(track.cylinder, track.head, sector);
            let lba = self.lba_of(address)?;
            let mut candidate = VoteCandidate {
                address,
                lba,
                copies: Vec::new(),
                settled: None,
            };
            if let Some(cached) = self.cache.peek(track).and_then(|t| t.sector(sector)) {
                if cached.kind.is_success() {
                    candidate.settled = Some(SectorReadout::new(
                        address,
                        lba,
                        Some(cached.data.clone()),
                        ErrorKind::Success,
                        1,
                    ));
                } else {
                    candidate.copies.push(cached.clone());
                }
            }
            candidates.push(candidate);
        }

        let mut captured = 0u32;
        while captured < attempts.max(1) && candidates.iter().any(|c| c.settled.is_none()) {
            let flux = self.capture(track, self.revolutions)?;
            self.counters.multiread_captures += 1;
            captured += 1;

            let decoded = self.decode(&flux)?;
            for candidate in candidates.iter_mut().filter(|c| c.settled.is_none()) {
                let Some(sector) = decoded.sector(candidate.address.sector) else {
                    continue;
                };
                if sector.kind.is_success() {
                    tracing::debug!(lba = candidate.lba, attempt = captured, "Clean capture during multiread");
                    candidate.settled = Some(SectorReadout::new(
                        candidate.address,
                        candidate.lba,
                        Some(sector.data.clone()),
                        ErrorKind::Success,
                        captured,
                    ));
                    self.remember(track, sector.clone());
                } else {
                    candidate.copies.push(sector.clone());
                }
            }
        }

        Ok(candidates
            .into_iter()
            .map(|candidate| match candidate.settled {
                Some(readout) => readout,
                None => self.vote(candidate, captured),
            })
            .collect())
    }

    /// Replace one sector's contents, re-encoding the rest of its track
    pub fn write_sector(&mut self, address: SectorAddress, data: &[u8]) -> FluxResult<()> {
        self.lba_of(address)?;
        let bps = self.geometry.bytes_per_sector as usize;
        if data.len() != bps {
            return Err(FluxError::InvalidInput(format!(
                "sector data is {} bytes, expected {}",
                data.len(),
                bps
            )));
        }

        let track = address.track();
        let mut payloads = self.preserved_payloads(track, &[address.sector], &VerifiedData::new())?;
        payloads.push(SectorPayload::new(address.sector, data.to_vec()));
        self.write_payloads(track, &payloads)
    }

    /// Lay a restoration pattern over an entire track
    pub fn write_track_pattern(&mut self, track: TrackId, pattern: RestorationPattern) -> FluxResult<()> {
        self.check_track(track)?;
        let flux = self
            .codec
            .create_pattern_track(track, pattern, self.encoding, &self.geometry)?;
        self.write_flux(track, &flux)
    }

    /// Write a restoration pattern to the given sectors of one track while
    /// preserving every other sector.
    ///
    /// A preserved sector is rewritten from its cached decode when that
    /// decode verified, otherwise from `verified`. A sector with neither is
    /// rewritten so that it still fails verification.
    pub fn write_pattern_to_sectors(
        &mut self,
        track: TrackId,
        sectors: &[u8],
        pattern: RestorationPattern,
        verified: &VerifiedData,
    ) -> FluxResult<()> {
        self.check_sector_ids(track, sectors)?;
        let mut payloads = self.preserved_payloads(track, sectors, verified)?;
        payloads.extend(self.pattern_payloads(sectors, pattern));
        self.write_payloads(track, &payloads)
    }

    /// Lay a restoration pattern over the whole track, then rewrite it with
    /// the pattern in `sectors` and every other sector preserved as by
    /// [`SectorFluxAdapter::write_pattern_to_sectors`].
    ///
    /// Preserved contents are collected before the track is overwritten.
    pub fn condition_track(
        &mut self,
        track: TrackId,
        sectors: &[u8],
        pattern: RestorationPattern,
        verified: &VerifiedData,
    ) -> FluxResult<()> {
        self.check_sector_ids(track, sectors)?;
        let mut payloads = self.preserved_payloads(track, sectors, verified)?;
        self.write_track_pattern(track, pattern)?;
        if payloads.is_empty() {
            return Ok(());
        }

        payloads.extend(self.pattern_payloads(sectors, pattern));
        if let Err(e) = self.write_payloads(track, &payloads) {
            tracing::error!(
                track = %track,
                error = %e,
                "Track holds only the pattern, preserved sectors not restored"
            );
            return Err(e);
        }
        Ok(())
    }

    /// Drop the cached decode of a track. Returns whether one was cached.
    pub fn invalidate_track_cache(&mut self, cylinder: u16, head: u8) -> bool {
        let evicted = self.cache.invalidate(TrackId::new(cylinder, head));
        if evicted {
            tracing::debug!(cylinder, head, "Track cache invalidated");
        }
        evicted
    }

    fn lba_of(&self, address: SectorAddress) -> FluxResult<Lba> {
        self.geometry
            .to_lba(address)
            .map_err(|e| FluxError::OutOfRange(e.to_string()))
    }

    fn check_track(&self, track: TrackId) -> FluxResult<()> {
        if track.cylinder >= self.geometry.cylinders || track.head >= self.geometry.heads {
            return Err(FluxError::OutOfRange(format!("track {} outside {}", track, self.geometry)));
        }
        Ok(())
    }

    fn check_sector_ids(&self, track: TrackId, sectors: &[u8]) -> FluxResult<()> {
        self.check_track(track)?;
        if let Some(&bad) = sectors
            .iter()
            .find(|&&s| s == 0 || s > self.geometry.sectors_per_track)
        {
            return Err(FluxError::OutOfRange(format!("sector {} on track {}", bad, track)));
        }
        Ok(())
    }

    fn seek_to(&mut self, cylinder: u16) -> FluxResult<()> {
        if self.head_cylinder == Some(cylinder) {
            return Ok(());
        }
        self.head_cylinder = None;
        self.device.seek(cylinder)?;
        self.counters.seeks += 1;
        self.head_cylinder = Some(cylinder);
        Ok(())
    }

    fn capture(&mut self, track: TrackId, revolutions: u32) -> FluxResult<FluxCapture> {
        self.seek_to(track.cylinder)?;
        let flux = self
            .device
            .read_track_flux(track.cylinder, track.head, revolutions)?;
        self.counters.captures += 1;
        tracing::debug!(
            cylinder = track.cylinder,
            head = track.head,
            revolutions,
            transitions = flux.transition_count(),
            "Track captured"
        );
        Ok(flux)
    }

    fn decode(&self, flux: &FluxCapture) -> FluxResult<CachedTrack> {
        let mut decoded = CachedTrack::new(self.geometry.sectors_per_track);
        for sector in self
            .codec
            .decode_flux_data(flux, self.encoding, &self.geometry)?
        {
            if sector.cylinder != flux.track.cylinder || sector.head != flux.track.head {
                tracing::debug!(
                    track = %flux.track,
                    found_cylinder = sector.cylinder,
                    found_head = sector.head,
                    "Ignoring sector header from another track"
                );
                continue;
            }
            let id = sector.sector;
            if !decoded.set(sector) {
                tracing::debug!(track = %flux.track, sector = id, "Ignoring out-of-range sector id");
            }
        }
        Ok(decoded)
    }

    fn load_track(&mut self, track: TrackId, revolutions: u32) -> FluxResult<()> {
        if self.cache.touch(track) {
            self.counters.cache_hits += 1;
            return Ok(());
        }
        self.counters.cache_misses += 1;
        let flux = self.capture(track, revolutions)?;
        let decoded = self.decode(&flux)?;
        if let Some(evicted) = self.cache.insert(track, decoded) {
            tracing::debug!(track = %evicted, "Track evicted from cache");
        }
        Ok(())
    }

    fn readout_from_cache(&self, address: SectorAddress, lba: Lba, attempts: u32) -> SectorReadout {
        match self
            .cache
            .peek(address.track())
            .and_then(|t| t.sector(address.sector))
        {
            Some(decoded) => SectorReadout::new(address, lba, Some(decoded.data.clone()), decoded.kind, attempts),
            None => SectorReadout::new(address, lba, None, ErrorKind::SectorNotFound, attempts),
        }
    }

    /// Store a verified sector in its track's cached decode. Tracks that are
    /// not cached stay uncached.
    fn remember(&mut self, track: TrackId, sector: DecodedSector) {
        if let Some(cached) = self.cache.peek_mut(track) {
            cached.set(sector);
        }
    }

    fn vote(&mut self, candidate: VoteCandidate, captured: u32) -> SectorReadout {
        let VoteCandidate { address, lba, copies, .. } = candidate;
        if copies.is_empty() {
            return SectorReadout::new(address, lba, None, ErrorKind::SectorNotFound, captured);
        }

        let (data, checksum) = voting::vote_sector(&copies);
        if self.codec.verify_sector(&data, checksum, self.encoding) {
            tracing::info!(lba, chs = %address, copies = copies.len(), "Sector recovered by multiread voting");
            self.remember(
                address.track(),
                DecodedSector {
                    cylinder: address.cylinder,
                    head: address.head,
                    sector: address.sector,
                    data: data.clone(),
                    stored_checksum: checksum,
                    kind: ErrorKind::Success,
                },
            );
            SectorReadout::new(address, lba, Some(data), ErrorKind::Success, captured)
        } else {
            tracing::debug!(lba, copies = copies.len(), "Multiread vote failed checksum");
            SectorReadout::new(address, lba, Some(data), ErrorKind::CrcError, captured)
        }
    }

    fn pattern_payloads(&self, sectors: &[u8], pattern: RestorationPattern) -> Vec<SectorPayload> {
        let fill = pattern.fill(self.geometry.bytes_per_sector as usize);
        sectors
            .iter()
            .map(|&sector| SectorPayload::new(sector, fill.clone()))
            .collect()
    }

    /// Payloads for every sector of `track` not listed in `replaced`.
    /// Captures the track first if it is not cached.
    ///
    /// Only data that verified is re-encoded with a fresh checksum. A damaged
    /// decode keeps its stored checksum and a sector that was not found is
    /// written unreadable, so neither turns into a sector that reads clean.
    fn preserved_payloads(
        &mut self,
        track: TrackId,
        replaced: &[u8],
        verified: &VerifiedData,
    ) -> FluxResult<Vec<SectorPayload>> {
        self.load_track(track, self.revolutions)?;
        let bps = self.geometry.bytes_per_sector as usize;
        let cached = self.cache.peek(track);

        Ok((1..=self.geometry.sectors_per_track)
            .filter(|id| !replaced.contains(id))
            .map(|sector| {
                let decoded = cached.and_then(|t| t.sector(sector));
                match (decoded, verified.get(&sector)) {
                    (Some(decoded), _) if decoded.kind.is_success() => {
                        SectorPayload::new(sector, decoded.data.clone())
                    }
                    (_, Some(data)) if data.len() == bps => SectorPayload::new(sector, data.clone()),
                    (Some(decoded), _) => {
                        tracing::debug!(
                            track = %track,
                            sector,
                            kind = %decoded.kind,
                            "Preserving unverified sector with its stored checksum"
                        );
                        SectorPayload::unverified(sector, decoded.data.clone(), decoded.stored_checksum)
                    }
                    (None, _) => {
                        tracing::warn!(
                            track = %track,
                            sector,
                            "No decoded data to preserve, leaving sector unreadable"
                        );
                        SectorPayload::unreadable(sector, bps)
                    }
                }
            })
            .collect())
    }

    fn write_payloads(&mut self, track: TrackId, payloads: &[SectorPayload]) -> FluxResult<()> {
        let flux = self
            .codec
            .encode_sectors_to_flux(track, payloads, self.encoding, &self.geometry)?;
        self.write_flux(track, &flux)
    }

    fn write_flux(&mut self, track: TrackId, flux: &FluxCapture) -> FluxResult<()> {
        self.seek_to(track.cylinder)?;
        // Invalidate before touching the medium so a failed write cannot
        // leave a stale decode behind
        self.invalidate_track_cache(track.cylinder, track.head);

        self.device.erase_track_flux(track.cylinder, track.head)?;
        self.counters.erases += 1;
        self.device
            .write_track_flux(track.cylinder, track.head, flux)?;
        self.counters.track_writes += 1;

        tracing::debug!(cylinder = track.cylinder, head = track.head, "Track rewritten");
        Ok(())
    }
}
