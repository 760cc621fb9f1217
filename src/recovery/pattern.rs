use serde::{Deserialize, Serialize};
use std::fmt;

/// Fill pattern written over bad sectors between passes. Rotating through
/// all five exercises stuck domains a single fixed pattern would not flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RestorationPattern {
    /// 0x55
    AlternatingLow,
    /// 0xAA
    AlternatingHigh,
    /// 0xFF
    AllSet,
    /// 0x00
    AllClear,
    /// Byte offset within the sector (0x00, 0x01, ..., wrapping)
    Sequence,
}

impl RestorationPattern {
    pub const ROTATION: [RestorationPattern; 5] = [
        RestorationPattern::AlternatingLow,
        RestorationPattern::AlternatingHigh,
        RestorationPattern::AllSet,
        RestorationPattern::AllClear,
        RestorationPattern::Sequence,
    ];

    /// Pattern for a zero-based pass index
    pub fn for_pass(pass_index: u32) -> Self {
        Self::ROTATION[pass_index as usize % Self::ROTATION.len()]
    }

    /// Constant fill byte, `None` for `Sequence`
    pub fn fill_byte(&self) -> Option<u8> {
        match self {
            RestorationPattern::AlternatingLow => Some(0x55),
            RestorationPattern::AlternatingHigh => Some(0xAA),
            RestorationPattern::AllSet => Some(0xFF),
            RestorationPattern::AllClear => Some(0x00),
            RestorationPattern::Sequence => None,
        }
    }

    pub fn fill(&self, len: usize) -> Vec<u8> {
        match self.fill_byte() {
            Some(byte) => vec![byte; len],
            None => (0..len).map(|i| i as u8).collect(),
        }
    }
}

impl fmt::Display for RestorationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.fill_byte() {
            Some(byte) => write!(f, "{:?} (0x{:02X})", self, byte),
            None => write!(f, "Sequence"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, RestorationPattern::AlternatingLow)]
    #[test_case(1, RestorationPattern::AlternatingHigh)]
    #[test_case(2, RestorationPattern::AllSet)]
    #[test_case(3, RestorationPattern::AllClear)]
    #[test_case(4, RestorationPattern::Sequence)]
    #[test_case(5, RestorationPattern::AlternatingLow)]
    #[test_case(12, RestorationPattern::AllSet)]
    fn test_rotation(pass: u32, expected: RestorationPattern) {
        assert_eq!(RestorationPattern::for_pass(pass), expected);
    }

    #[test]
    fn test_rotation_over_many_passes() {
        for n in 0..100u32 {
            assert_eq!(
                RestorationPattern::for_pass(n),
                RestorationPattern::ROTATION[(n % 5) as usize]
            );
        }
    }

    #[test_case(RestorationPattern::AlternatingLow, 0x55)]
    #[test_case(RestorationPattern::AlternatingHigh, 0xAA)]
    #[test_case(RestorationPattern::AllSet, 0xFF)]
    #[test_case(RestorationPattern::AllClear, 0x00)]
    fn test_constant_fill(pattern: RestorationPattern, byte: u8) {
        assert!(pattern.fill(512).iter().all(|&b| b == byte));
    }

    #[test]
    fn test_sequence_fill_wraps() {
        let fill = RestorationPattern::Sequence.fill(300);
        assert_eq!(fill[0], 0);
        assert_eq!(fill[255], 255);
        assert_eq!(fill[256], 0);
        assert_eq!(fill[299], 43);
    }

    #[test]
    fn test_display() {
        assert_eq!(RestorationPattern::AllSet.to_string(), "AllSet (0xFF)");
        assert_eq!(RestorationPattern::Sequence.to_string(), "Sequence");
    }
}
