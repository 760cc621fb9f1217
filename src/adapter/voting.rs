/// Bit-level majority voting across independent decodes of one sector
///
/// Each bit position takes the value held by the majority of copies. A tie
/// keeps the first copy's bit, so the oldest capture wins when the vote is
/// inconclusive. Copies shorter than the first one simply do not vote on
/// the missing positions.
use crate::hardware::DecodedSector;

pub fn majority_vote<T: AsRef<[u8]>>(copies: &[T]) -> Vec<u8> {
    let Some(first) = copies.first() else {
        return Vec::new();
    };
    let first = first.as_ref();

    first
        .iter()
        .enumerate()
        .map(|(index, &first_byte)| {
            let mut voted = 0u8;
            for bit in 0..8 {
                let mask = 1u8 << bit;
                let (mut ones, mut voters) = (0usize, 0usize);
                for copy in copies {
                    if let Some(byte) = copy.as_ref().get(index) {
                        voters += 1;
                        if byte & mask != 0 {
                            ones += 1;
                        }
                    }
                }
                let set = match (ones * 2).cmp(&voters) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => first_byte & mask != 0,
                };
                if set {
                    voted |= mask;
                }
            }
            voted
        })
        .collect()
}

/// Vote both the data field and the stored checksum of several decodes
pub fn vote_sector(copies: &[DecodedSector]) -> (Vec<u8>, u32) {
    let data: Vec<&[u8]> = copies.iter().map(|c| c.data.as_slice()).collect();
    let checksums: Vec<[u8; 4]> = copies.iter().map(|c| c.stored_checksum.to_le_bytes()).collect();

    let mut checksum = [0u8; 4];
    for (slot, byte) in checksum.iter_mut().zip(majority_vote(&checksums)) {
        *slot = byte;
    }

    (majority_vote(&data), u32::from_le_bytes(checksum))
}
