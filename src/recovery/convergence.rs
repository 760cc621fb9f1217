//! Convergence detection and the final recommendation.
//!
//! Both are pure functions of the pass history.

use super::statistics::RecoveryStatistics;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    /// No bad sectors remain
    Recovered,
    /// The bad count went down at some point but did not reach zero
    PartiallyRecovered,
    /// No pass ever reduced the bad count
    Unrecoverable,
}

impl Recommendation {
    pub fn description(&self) -> &'static str {
        match self {
            Recommendation::Recovered => "All sectors readable; image the medium now",
            Recommendation::PartiallyRecovered => {
                "Some sectors recovered; image the medium and retry the remaining bad sectors"
            }
            Recommendation::Unrecoverable => "Further passes are unlikely to recover the remaining sectors",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Recovered => write!(f, "Recovered"),
            Recommendation::PartiallyRecovered => write!(f, "Partially recovered"),
            Recommendation::Unrecoverable => write!(f, "Unrecoverable"),
        }
    }
}

/// Classify a finished (or aborted) run from its history alone
pub fn analyze_convergence(stats: &RecoveryStatistics) -> Recommendation {
    match stats.final_bad_count() {
        None => Recommendation::Unrecoverable,
        Some(0) => Recommendation::Recovered,
        Some(_) if stats.passes().iter().any(|p| p.improved()) => Recommendation::PartiallyRecovered,
        Some(_) => Recommendation::Unrecoverable,
    }
}

/// True once the last `window` rescans (the initial scan does not count)
/// all failed to lower the bad count.
pub fn has_converged(stats: &RecoveryStatistics, window: u32) -> bool {
    let window = window.max(1) as usize;
    let rescans: Vec<_> = stats.passes().iter().filter(|p| p.pass_index > 0).collect();
    rescans.len() >= window
        && rescans[rescans.len() - window..]
            .iter()
            .all(|p| p.delta_from_previous >= 0)
}
