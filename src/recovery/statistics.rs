//! Per-pass recovery history.

use super::convergence::{analyze_convergence, Recommendation};
use super::pattern::RestorationPattern;
use crate::geometry::Lba;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// One scan of the recovery scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRecord {
    /// 0 for the initial scan, then one per pattern-write/rescan cycle
    pub pass_index: u32,
    pub bad_count: usize,
    /// `bad_count` minus the previous pass's; 0 for the initial scan
    pub delta_from_previous: i64,
    pub duration: Duration,
    /// Bad in the previous pass, good in this one
    pub recovered_addresses: BTreeSet<Lba>,
    /// Good or unscanned in the previous pass, bad in this one
    pub newly_bad: BTreeSet<Lba>,
    /// Pattern written just before this scan
    pub pattern: Option<RestorationPattern>,
}

impl PassRecord {
    pub fn from_scan(
        pass_index: u32,
        bad: &BTreeSet<Lba>,
        previous_bad: Option<&BTreeSet<Lba>>,
        duration: Duration,
        pattern: Option<RestorationPattern>,
    ) -> Self {
        let (delta_from_previous, recovered_addresses, newly_bad) = match previous_bad {
            Some(previous) => (
                bad.len() as i64 - previous.len() as i64,
                previous.difference(bad).copied().collect(),
                bad.difference(previous).copied().collect(),
            ),
            None => (0, BTreeSet::new(), BTreeSet::new()),
        };

        Self {
            pass_index,
            bad_count: bad.len(),
            delta_from_previous,
            duration,
            recovered_addresses,
            newly_bad,
            pattern,
        }
    }

    pub fn improved(&self) -> bool {
        self.delta_from_previous < 0
    }
}

/// Append-only pass history of one recovery run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStatistics {
    passes: Vec<PassRecord>,
}

impl RecoveryStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a history, e.g. from a saved report
    pub fn from_passes(passes: Vec<PassRecord>) -> Self {
        Self { passes }
    }

    pub(crate) fn push(&mut self, record: PassRecord) {
        self.passes.push(record);
    }

    pub fn passes(&self) -> &[PassRecord] {
        &self.passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn last(&self) -> Option<&PassRecord> {
        self.passes.last()
    }

    pub fn initial_bad_count(&self) -> Option<usize> {
        self.passes.first().map(|p| p.bad_count)
    }

    pub fn final_bad_count(&self) -> Option<usize> {
        self.passes.last().map(|p| p.bad_count)
    }

    /// Sectors recovered over the run and still good at its end
    pub fn recovered_addresses(&self) -> BTreeSet<Lba> {
        let mut recovered = BTreeSet::new();
        for pass in &self.passes {
            recovered.extend(pass.recovered_addresses.iter().copied());
            recovered.retain(|lba| !pass.newly_bad.contains(lba));
        }
        recovered
    }

    pub fn total_duration(&self) -> Duration {
        self.passes.iter().map(|p| p.duration).sum()
    }

    pub fn recommendation(&self) -> Recommendation {
        analyze_convergence(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(lbas: &[Lba]) -> BTreeSet<Lba> {
        lbas.iter().copied().collect()
    }

    #[test]
    fn test_initial_record_has_no_delta() {
        let record = PassRecord::from_scan(0, &set(&[1, 2]), None, Duration::from_millis(5), None);
        assert_eq!(record.bad_count, 2);
        assert_eq!(record.delta_from_previous, 0);
        assert!(record.recovered_addresses.is_empty());
        assert!(!record.improved());
    }

    #[test]
    fn test_delta_and_recovered_sets() {
        let previous = set(&[1, 2, 3]);
        let record = PassRecord::from_scan(
            1,
            &set(&[3, 9]),
            Some(&previous),
            Duration::ZERO,
            Some(RestorationPattern::AlternatingLow),
        );
        assert_eq!(record.delta_from_previous, -1);
        assert_eq!(record.recovered_addresses, set(&[1, 2]));
        assert_eq!(record.newly_bad, set(&[9]));
        assert!(record.improved());
    }

    #[test]
    fn test_recovered_addresses_drop_relapses() {
        let mut stats = RecoveryStatistics::new();
        let b0 = set(&[1, 2, 3]);
        let b1 = set(&[3]);
        let b2 = set(&[2]);
        stats.push(PassRecord::from_scan(0, &b0, None, Duration::from_secs(1), None));
        stats.push(PassRecord::from_scan(1, &b1, Some(&b0), Duration::from_secs(2), None));
        stats.push(PassRecord::from_scan(2, &b2, Some(&b1), Duration::from_secs(3), None));

        assert_eq!(stats.recovered_addresses(), set(&[1, 3]));
        assert_eq!(stats.initial_bad_count(), Some(3));
        assert_eq!(stats.final_bad_count(), Some(1));
        assert_eq!(stats.total_duration(), Duration::from_secs(6));
    }

    #[test]
    fn test_serde_round_trip_keeps_history() {
        let b0 = set(&[100, 1500]);
        let stats = RecoveryStatistics::from_passes(vec![
            PassRecord::from_scan(0, &b0, None, Duration::from_millis(1200), None),
            PassRecord::from_scan(1, &set(&[]), Some(&b0), Duration::from_millis(800), Some(RestorationPattern::AlternatingLow)),
        ]);
        let json = serde_json::to_string(&stats).unwrap();
        let back: RecoveryStatistics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
