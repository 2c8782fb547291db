//! Header/data units held in memory.
//!
//! A [`Unit`] is one HDU: its header cards (END excluded) and its data bytes
//! without block padding. Whole files are parsed into units on open and
//! serialized back on close.

use crate::block::{pad_into, padded_len, BLOCK_SIZE, DATA_FILL};
use crate::header::{parse_header, serialize_header, Card};
use crate::native::HduType;
use crate::status::{NativeResult, Status};
use crate::value::Value;

/// One header/data unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub cards: Vec<Card>,
    pub data: Vec<u8>,
}

impl Unit {
    pub fn new(cards: Vec<Card>, data: Vec<u8>) -> Self {
        Unit { cards, data }
    }

    /// Primary HDU with no data.
    pub fn null_primary() -> Self {
        Unit::new(
            vec![
                Card::new("SIMPLE", Value::Logical(true), Some("file does conform to FITS standard")),
                Card::new("BITPIX", Value::Integer(8), Some("number of bits per data pixel")),
                Card::new("NAXIS", Value::Integer(0), Some("number of data axes")),
                Card::new("EXTEND", Value::Logical(true), Some("FITS dataset may contain extensions")),
            ],
            Vec::new(),
        )
    }

    pub fn is_primary(&self) -> bool {
        self.cards
            .first()
            .map(|c| c.keyword_str() == "SIMPLE")
            .unwrap_or(false)
    }

    /// HDU type as CFITSIO reports it. The primary array counts as an image.
    pub fn hdu_type(&self) -> HduType {
        if self.is_primary() {
            return HduType::Image;
        }
        match self.string_key("XTENSION").as_deref() {
            Some("TABLE") => HduType::AsciiTable,
            Some("BINTABLE") => HduType::BinaryTable,
            _ => HduType::Image,
        }
    }

    /// Index of the first card with the given keyword.
    pub fn position(&self, keyword: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.keyword_str() == keyword)
    }

    pub fn card(&self, keyword: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.keyword_str() == keyword)
    }

    pub fn value(&self, keyword: &str) -> Option<&Value> {
        self.card(keyword).and_then(|c| c.value.as_ref())
    }

    pub fn int_key(&self, keyword: &str) -> Option<i64> {
        match self.value(keyword)? {
            Value::Integer(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn float_key(&self, keyword: &str) -> Option<f64> {
        match self.value(keyword)? {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn string_key(&self, keyword: &str) -> Option<String> {
        match self.value(keyword)? {
            Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// Overwrite the value of an existing keyword, or insert it after the
    /// card at `after` when missing.
    pub fn set_value(&mut self, keyword: &str, value: Value, after: &str) {
        if let Some(i) = self.position(keyword) {
            self.cards[i].value = Some(value);
            return;
        }
        let at = self.position(after).map_or(self.cards.len(), |i| i + 1);
        self.cards.insert(at, Card::new(keyword, value, None));
    }

    /// Axis lengths from NAXIS and NAXISn.
    pub fn naxes(&self) -> NativeResult<Vec<i64>> {
        let naxis = self.int_key("NAXIS").ok_or(Status::BAD_NAXIS)?;
        if !(0..=999).contains(&naxis) {
            return Err(Status::BAD_NAXIS);
        }
        (1..=naxis)
            .map(|i| {
                let n = self.int_key(&format!("NAXIS{i}")).ok_or(Status::BAD_NAXES)?;
                if n < 0 {
                    return Err(Status::BAD_NAXES);
                }
                Ok(n)
            })
            .collect()
    }

    /// Data length in bytes implied by the header:
    /// `|BITPIX| / 8 * GCOUNT * (PCOUNT + NAXIS1 * ... * NAXISn)`, with
    /// NAXIS1 skipped for random groups.
    pub fn expected_data_len(&self) -> NativeResult<usize> {
        let bitpix = self.int_key("BITPIX").ok_or(Status::BAD_BITPIX)?;
        let bytes_per_value = bytes_per_pixel(bitpix)? as i64;
        let naxes = self.naxes()?;
        if naxes.is_empty() {
            return Ok(0);
        }

        let groups = self.is_primary() && naxes[0] == 0;
        let axes = if groups { &naxes[1..] } else { &naxes[..] };
        let (pcount, gcount) = if self.is_primary() && !groups {
            (0, 1)
        } else {
            let pcount = self.int_key("PCOUNT").unwrap_or(0);
            if pcount < 0 {
                return Err(Status::BAD_PCOUNT);
            }
            (pcount, self.int_key("GCOUNT").unwrap_or(1).max(1))
        };

        let total = axes
            .iter()
            .try_fold(1i64, |acc, &n| acc.checked_mul(n))
            .and_then(|product| product.checked_add(pcount))
            .and_then(|n| n.checked_mul(gcount))
            .and_then(|n| n.checked_mul(bytes_per_value))
            .ok_or(Status::BAD_NAXES)?;
        usize::try_from(total).map_err(|_| Status::BAD_NAXES)
    }
}

/// Bytes per stored value for a BITPIX code.
pub fn bytes_per_pixel(bitpix: i64) -> NativeResult<usize> {
    match bitpix {
        8 | 16 | 32 | 64 | -32 | -64 => Ok(bitpix.unsigned_abs() as usize / 8),
        _ => Err(Status::BAD_BITPIX),
    }
}

/// Parse every HDU of a file.
///
/// An empty file has no units. Bytes after the last complete HDU that do
/// not start an extension are ignored.
pub fn parse_units(bytes: &[u8]) -> NativeResult<Vec<Unit>> {
    let mut units = Vec::new();
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if units.is_empty() && !rest.starts_with(b"SIMPLE  ") {
            return Err(Status::NO_SIMPLE);
        }
        if !units.is_empty() && !rest.starts_with(b"XTENSION") {
            break;
        }
        if rest.len() < BLOCK_SIZE {
            return Err(Status::END_OF_FILE);
        }

        let (cards, header_len) = parse_header(rest)?;
        let unit = Unit::new(cards, Vec::new());
        check_required(&unit, units.is_empty())?;

        let data_len = unit.expected_data_len()?;
        let start = offset + header_len;
        let end = start.checked_add(data_len).ok_or(Status::END_OF_FILE)?;
        if end > bytes.len() {
            return Err(Status::END_OF_FILE);
        }
        units.push(Unit::new(unit.cards, bytes[start..end].to_vec()));
        offset = start + padded_len(data_len);
    }
    Ok(units)
}

fn check_required(unit: &Unit, first: bool) -> NativeResult<()> {
    let leading = unit.cards.first().map(Card::keyword_str).unwrap_or("");
    if first {
        if leading != "SIMPLE" {
            return Err(Status::NO_SIMPLE);
        }
        if unit.value("SIMPLE") != Some(&Value::Logical(true)) {
            return Err(Status::BAD_SIMPLE);
        }
    } else {
        if leading != "XTENSION" {
            return Err(Status::NO_XTENSION);
        }
        match unit.string_key("XTENSION").as_deref() {
            Some("IMAGE") | Some("TABLE") | Some("BINTABLE") => {}
            _ => return Err(Status::UNKNOWN_EXT),
        }
    }
    if unit.cards.get(1).map(Card::keyword_str) != Some("BITPIX") {
        return Err(Status::BAD_ORDER);
    }
    Ok(())
}

/// Serialize units into a complete FITS byte stream.
pub fn serialize_units(units: &[Unit]) -> Vec<u8> {
    let mut out = Vec::new();
    for unit in units {
        out.extend_from_slice(&serialize_header(&unit.cards));
        pad_into(&mut out, &unit.data, DATA_FILL);
    }
    out
}
