//! Bounded per-track decode cache.

use crate::geometry::TrackId;
use crate::hardware::DecodedSector;
use std::collections::{HashMap, VecDeque};

/// Decode results for one track, indexed by 1-based sector id
#[derive(Debug, Clone, Default)]
pub struct CachedTrack {
    sectors: Vec<Option<DecodedSector>>,
}

impl CachedTrack {
    pub fn new(sectors_per_track: u8) -> Self {
        Self {
            sectors: vec![None; sectors_per_track as usize],
        }
    }

    pub fn sector(&self, id: u8) -> Option<&DecodedSector> {
        id.checked_sub(1)
            .and_then(|index| self.sectors.get(index as usize))
            .and_then(Option::as_ref)
    }

    /// Store a decoded sector. Ids outside the track are ignored and
    /// reported back as `false`.
    pub fn set(&mut self, sector: DecodedSector) -> bool {
        match sector
            .sector
            .checked_sub(1)
            .and_then(|index| self.sectors.get_mut(index as usize))
        {
            Some(slot) => {
                *slot = Some(sector);
                true
            }
            None => false,
        }
    }

    pub fn decoded_count(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_some()).count()
    }
}

/// Least-recently-used cache of decoded tracks keyed by (cylinder, head).
///
/// Writes to a track must call [`TrackCache::invalidate`]; nothing else
/// evicts an entry except capacity pressure and [`TrackCache::clear`].
#[derive(Debug)]
pub struct TrackCache {
    capacity: usize,
    entries: HashMap<TrackId, CachedTrack>,
    order: VecDeque<TrackId>,
}

impl TrackCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, track: TrackId) -> bool {
        self.entries.contains_key(&track)
    }

    /// Mark a track as most recently used. Returns whether it is cached.
    pub fn touch(&mut self, track: TrackId) -> bool {
        if !self.entries.contains_key(&track) {
            return false;
        }
        self.promote(track);
        true
    }

    /// Look up a track without changing its recency
    pub fn peek(&self, track: TrackId) -> Option<&CachedTrack> {
        self.entries.get(&track)
    }

    pub fn peek_mut(&mut self, track: TrackId) -> Option<&mut CachedTrack> {
        self.entries.get_mut(&track)
    }

    /// Insert or replace a track, evicting the least recently used entry
    /// when full. Returns the evicted track, if any.
    pub fn insert(&mut self, track: TrackId, decoded: CachedTrack) -> Option<TrackId> {
        if self.entries.insert(track, decoded).is_some() {
            self.promote(track);
            return None;
        }

        self.order.push_back(track);
        if self.entries.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
                return Some(evicted);
            }
        }
        None
    }

    pub fn invalidate(&mut self, track: TrackId) -> bool {
        if self.entries.remove(&track).is_some() {
            self.order.retain(|t| *t != track);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn promote(&mut self, track: TrackId) {
        if let Some(position) = self.order.iter().position(|t| *t == track) {
            self.order.remove(position);
        }
        self.order.push_back(track);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn decoded(sector: u8) -> DecodedSector {
        DecodedSector {
            cylinder: 0,
            head: 0,
            sector,
            data: vec![sector; 4],
            stored_checksum: 0,
            kind: ErrorKind::Success,
        }
    }

    fn t(cylinder: u16) -> TrackId {
        TrackId::new(cylinder, 0)
    }

    #[test]
    fn test_cached_track_slots() {
        let mut track = CachedTrack::new(3);
        assert!(track.set(decoded(1)));
        assert!(track.set(decoded(3)));
        assert!(!track.set(decoded(0)));
        assert!(!track.set(decoded(4)));

        assert_eq!(track.decoded_count(), 2);
        assert_eq!(track.sector(3).map(|s| s.data[0]), Some(3));
        assert!(track.sector(2).is_none());
        assert!(track.sector(0).is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = TrackCache::new(2);
        assert_eq!(cache.insert(t(0), CachedTrack::new(1)), None);
        assert_eq!(cache.insert(t(1), CachedTrack::new(1)), None);

        assert!(cache.touch(t(0)));
        assert_eq!(cache.insert(t(2), CachedTrack::new(1)), Some(t(1)));

        assert!(cache.contains(t(0)));
        assert!(!cache.contains(t(1)));
        assert!(cache.contains(t(2)));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_reinsert_does_not_grow() {
        let mut cache = TrackCache::new(2);
        cache.insert(t(0), CachedTrack::new(1));
        cache.insert(t(0), CachedTrack::new(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.order.len(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache = TrackCache::new(4);
        cache.insert(t(0), CachedTrack::new(1));
        cache.insert(t(1), CachedTrack::new(1));

        assert!(cache.invalidate(t(0)));
        assert!(!cache.invalidate(t(0)));
        assert!(!cache.touch(t(0)));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_holds_one_track() {
        let mut cache = TrackCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert(t(0), CachedTrack::new(1));
        assert_eq!(cache.insert(t(1), CachedTrack::new(1)), Some(t(0)));
    }
}
