//! The 2880-byte record structure shared by headers and data units.

pub const BLOCK_SIZE: usize = 2880;
pub const CARD_SIZE: usize = 80;
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Fill for the unused tail of a header.
pub const HEADER_FILL: u8 = b' ';
/// Fill for the unused tail of a data unit.
pub const DATA_FILL: u8 = 0;

/// `len` rounded up to a whole number of blocks.
pub const fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Card slots in the blocks that hold `cards` cards plus END.
pub const fn header_capacity(cards: usize) -> usize {
    (cards + 1).div_ceil(CARDS_PER_BLOCK) * CARDS_PER_BLOCK
}

/// Append `src` to `out`, then `fill` up to the next block boundary.
pub fn pad_into(out: &mut Vec<u8>, src: &[u8], fill: u8) {
    out.extend_from_slice(src);
    out.resize(out.len() + padded_len(src.len()) - src.len(), fill);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_rounds_to_blocks() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(80), BLOCK_SIZE);
        assert_eq!(padded_len(BLOCK_SIZE + 1), 2 * BLOCK_SIZE);
    }

    #[test]
    fn end_card_needs_a_slot() {
        assert_eq!(header_capacity(0), 36);
        assert_eq!(header_capacity(35), 36);
        assert_eq!(header_capacity(36), 72);
    }

    #[test]
    fn pad_into_keeps_prefix() {
        let mut out = vec![7u8];
        pad_into(&mut out, &[1, 2, 3], DATA_FILL);
        assert_eq!(out.len(), 1 + BLOCK_SIZE);
        assert_eq!(&out[..4], &[7, 1, 2, 3]);
        assert!(out[4..].iter().all(|&b| b == DATA_FILL));

        let mut empty = Vec::new();
        pad_into(&mut empty, &[], HEADER_FILL);
        assert!(empty.is_empty());
    }
}
