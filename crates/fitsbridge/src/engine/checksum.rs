//! CHECKSUM and DATASUM keywords (ones-complement 32-bit sum of 2880-byte
//! blocks, ASCII-encoded so that a stamped HDU sums to negative zero).

use super::unit::Unit;
use crate::block::{pad_into, BLOCK_SIZE, DATA_FILL};
use crate::header::serialize_header;
use crate::value::Value;

const ZERO_CHECKSUM: &str = "0000000000000000";

/// Characters skipped by the encoding: `:;<=>?@` and ``[\]^_` ``.
const EXCLUDE: [i32; 13] = [
    0x3a, 0x3b, 0x3c, 0x3d, 0x3e, 0x3f, 0x40, 0x5b, 0x5c, 0x5d, 0x5e, 0x5f, 0x60,
];

/// Fold 16-bit carries back into a 32-bit ones-complement sum.
fn fold(mut hi: u32, mut lo: u32) -> u32 {
    let (mut hicarry, mut locarry) = (hi >> 16, lo >> 16);
    while (hicarry | locarry) != 0 {
        hi = (hi & 0xFFFF) + locarry;
        lo = (lo & 0xFFFF) + hicarry;
        hicarry = hi >> 16;
        locarry = lo >> 16;
    }
    (hi << 16) | lo
}

/// Accumulate whole blocks into a running sum.
fn accumulate(sum: u32, bytes: &[u8]) -> u32 {
    bytes.chunks_exact(BLOCK_SIZE).fold(sum, |sum, block| {
        let (mut hi, mut lo) = (sum >> 16, sum & 0xFFFF);
        for word in block.chunks_exact(4) {
            hi += u32::from(u16::from_be_bytes([word[0], word[1]]));
            lo += u32::from(u16::from_be_bytes([word[2], word[3]]));
        }
        fold(hi, lo)
    })
}

fn ones_complement_add(a: u32, b: u32) -> u32 {
    fold((a >> 16) + (b >> 16), (a & 0xFFFF) + (b & 0xFFFF))
}

/// Encode the complement of `sum` as 16 ASCII characters.
fn encode_complement(sum: u32) -> String {
    let value = !sum;
    let mut asc = [0u8; 16];
    for i in 0..4 {
        let byte = ((value >> (24 - 8 * i)) & 0xFF) as i32;
        let mut ch = [byte / 4 + 0x30; 4];
        ch[0] += byte % 4;
        loop {
            let mut adjusted = false;
            for ex in EXCLUDE {
                for j in [0, 2] {
                    if ch[j] == ex || ch[j + 1] == ex {
                        ch[j] += 1;
                        ch[j + 1] -= 1;
                        adjusted = true;
                    }
                }
            }
            if !adjusted {
                break;
            }
        }
        for (j, c) in ch.iter().enumerate() {
            asc[4 * j + i] = *c as u8;
        }
    }
    // Rotate right by one character.
    asc.rotate_right(1);
    asc.iter().map(|&b| char::from(b)).collect()
}

fn data_sum(unit: &Unit) -> u32 {
    let mut padded = Vec::with_capacity(unit.data.len() + BLOCK_SIZE);
    pad_into(&mut padded, &unit.data, DATA_FILL);
    accumulate(0, &padded)
}

/// Ones-complement sum of the serialized HDU (header and padded data).
pub fn hdu_sum(unit: &Unit) -> u32 {
    ones_complement_add(accumulate(0, &serialize_header(&unit.cards)), data_sum(unit))
}

impl Unit {
    /// Write DATASUM and CHECKSUM, updating the cards in place when present.
    pub fn stamp_checksum(&mut self) {
        let datasum = data_sum(self);
        self.set_stamp("DATASUM", datasum.to_string(), "data unit checksum updated");
        self.set_stamp("CHECKSUM", ZERO_CHECKSUM.to_string(), "HDU checksum updated");
        let encoded = encode_complement(hdu_sum(self));
        self.set_stamp("CHECKSUM", encoded, "HDU checksum updated");
    }

    fn set_stamp(&mut self, keyword: &str, text: String, comment: &str) {
        match self.position(keyword) {
            Some(i) => self.cards[i].value = Some(Value::String(text)),
            None => self
                .cards
                .push(crate::header::Card::new(keyword, Value::String(text), Some(comment))),
        }
    }

    /// Whether the CHECKSUM keyword, if any, matches the HDU contents.
    #[cfg(test)]
    pub fn checksum_ok(&self) -> bool {
        self.card("CHECKSUM").is_none() || matches!(hdu_sum(self), 0 | 0xFFFF_FFFF)
    }
}
