//! FITS header card parsing and writing.

use core::str;

use crate::block::{header_capacity, BLOCK_SIZE, CARD_SIZE, HEADER_FILL};
use crate::status::{NativeResult, Status};
use crate::value::{format_value, parse_value, Value};

/// One header record.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// Keyword, blank-padded to 8 bytes.
    pub keyword: [u8; 8],
    /// `None` for cards without the `= ` value indicator.
    pub value: Option<Value>,
    /// Comment text, or the free text of a commentary card.
    pub comment: Option<String>,
}

pub fn make_keyword(name: &str) -> [u8; 8] {
    let mut kw = [b' '; 8];
    let bytes = name.as_bytes();
    let len = bytes.len().min(8);
    kw[..len].copy_from_slice(&bytes[..len]);
    kw
}

/// Normalize a user-supplied keyword name: trim, uppercase, and validate.
pub fn normalize_keyword(name: &str) -> NativeResult<String> {
    let name = name.trim().to_ascii_uppercase();
    if name.is_empty() || name.len() > 8 {
        return Err(Status::BAD_KEYCHAR);
    }
    if !name.bytes().all(is_keyword_byte) {
        return Err(Status::BAD_KEYCHAR);
    }
    Ok(name)
}

fn is_keyword_byte(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b' ' | b'-' | b'_')
}

impl Card {
    /// A keyword card with a value and optional comment.
    pub fn new(name: &str, value: Value, comment: Option<&str>) -> Self {
        Card {
            keyword: make_keyword(name),
            value: Some(value),
            comment: comment.filter(|c| !c.is_empty()).map(String::from),
        }
    }

    /// A COMMENT, HISTORY or blank-keyword card carrying free text.
    pub fn commentary(name: &str, text: &str) -> Self {
        Card {
            keyword: make_keyword(name),
            value: None,
            comment: Some(String::from(text)),
        }
    }

    /// Keyword without its blank padding.
    pub fn keyword_str(&self) -> &str {
        let end = self
            .keyword
            .iter()
            .rposition(|&b| b != b' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        str::from_utf8(&self.keyword[..end]).unwrap_or("")
    }

    pub fn is_end(&self) -> bool {
        self.keyword_str() == "END" && self.value.is_none()
    }

    /// Returns `true` for COMMENT, HISTORY and blank-keyword cards.
    pub fn is_commentary(&self) -> bool {
        is_commentary_keyword(&self.keyword)
    }

    /// The card as an 80-character record with trailing blanks removed.
    pub fn to_record(&self) -> String {
        let raw = format_card(self);
        String::from_utf8_lossy(&raw).trim_end().to_string()
    }
}

fn is_commentary_keyword(keyword: &[u8; 8]) -> bool {
    matches!(keyword, b"COMMENT " | b"HISTORY " | b"        ")
}

fn free_text(bytes: &[u8]) -> NativeResult<Option<String>> {
    let text = str::from_utf8(bytes)
        .map_err(|_| Status::BAD_KEYCHAR)?
        .trim_end();
    Ok(if text.is_empty() {
        None
    } else {
        Some(String::from(text))
    })
}

/// Decode one record. Keywords outside `A-Z 0-9 - _` are rejected with
/// `BAD_KEYCHAR`.
pub fn parse_card(card_bytes: &[u8; CARD_SIZE]) -> NativeResult<Card> {
    let mut keyword = [b' '; 8];
    keyword.copy_from_slice(&card_bytes[..8]);
    if !keyword.iter().all(|&b| is_keyword_byte(b)) {
        return Err(Status::BAD_KEYCHAR);
    }

    if &keyword == b"END     " {
        return Ok(Card {
            keyword,
            value: None,
            comment: None,
        });
    }

    if is_commentary_keyword(&keyword) || &card_bytes[8..10] != b"= " {
        return Ok(Card {
            keyword,
            value: None,
            comment: free_text(&card_bytes[8..])?,
        });
    }

    let (value, comment) = parse_value(&card_bytes[10..]).ok_or(Status::NO_QUOTE)?;
    Ok(Card {
        keyword,
        value: Some(value),
        comment: comment.map(String::from),
    })
}

/// Parse header blocks from the start of `data` until the END card.
///
/// Returns the cards (END excluded) and the number of bytes the header
/// occupies, always a multiple of [`BLOCK_SIZE`].
pub fn parse_header(data: &[u8]) -> NativeResult<(Vec<Card>, usize)> {
    let mut cards = Vec::new();
    for (block_idx, block) in data.chunks_exact(BLOCK_SIZE).enumerate() {
        for raw in block.chunks_exact(CARD_SIZE) {
            let raw: &[u8; CARD_SIZE] = raw.try_into().map_err(|_| Status::NO_END)?;
            let card = parse_card(raw)?;
            if card.is_end() {
                return Ok((cards, (block_idx + 1) * BLOCK_SIZE));
            }
            cards.push(card);
        }
    }
    Err(Status::NO_END)
}

/// Serialize a [`Card`] into an 80-byte card image.
pub fn format_card(card: &Card) -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    buf[..8].copy_from_slice(&card.keyword);

    match &card.value {
        Some(value) => {
            buf[8] = b'=';
            buf[9] = b' ';
            let mut field = format_value(value);
            if let Some(comment) = &card.comment {
                insert_comment(&mut field, value, comment);
            }
            buf[10..].copy_from_slice(&field);
        }
        None => {
            if let Some(text) = &card.comment {
                let bytes = text.as_bytes();
                let len = bytes.len().min(72);
                buf[8..8 + len].copy_from_slice(&bytes[..len]);
            }
        }
    }
    buf
}

/// Place ` / comment` after the value inside a 70-byte field.
fn insert_comment(field: &mut [u8; 70], value: &Value, comment: &str) {
    let content_end = match value {
        Value::String(_) => {
            let mut i = 1;
            while i < 70 {
                if field[i] == b'\'' {
                    if i + 1 < 70 && field[i + 1] == b'\'' {
                        i += 2;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
            i + 1
        }
        Value::Complex(..) => field.iter().rposition(|&b| b != b' ').map_or(0, |p| p + 1),
        _ => 20,
    };

    let sep = content_end + 1;
    if sep + 3 >= 70 {
        return;
    }
    field[sep] = b'/';
    field[sep + 1] = b' ';
    let start = sep + 2;
    let bytes = comment.as_bytes();
    let len = bytes.len().min(70 - start);
    field[start..start + len].copy_from_slice(&bytes[..len]);
}

/// Serialize header cards into complete blocks, appending the END card.
///
pub fn serialize_header(cards: &[Card]) -> Vec<u8> {
    let mut buf = vec![HEADER_FILL; header_capacity(cards.len()) * CARD_SIZE];

    for (i, card) in cards.iter().enumerate() {
        let offset = i * CARD_SIZE;
        buf[offset..offset + CARD_SIZE].copy_from_slice(&format_card(card));
    }
    let end = cards.len() * CARD_SIZE;
    buf[end..end + 3].copy_from_slice(b"END");
    buf
}

/// Match a keyword against a template with `*`, `?` and `#` wildcards.
///
/// `*` matches any run of characters, `?` any single character and `#` any
/// run of decimal digits.
pub fn keyword_matches(template: &str, keyword: &str) -> bool {
    wildcard_match(
        template.trim().to_ascii_uppercase().as_bytes(),
        keyword.as_bytes(),
    )
}

pub(crate) fn wildcard_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| wildcard_match(rest, &text[skip..])),
        Some((b'#', rest)) => {
            let digits = text.iter().take_while(|b| b.is_ascii_digit()).count();
            (1..=digits).any(|take| wildcard_match(rest, &text[take..]))
        }
        Some((b'?', rest)) => !text.is_empty() && wildcard_match(rest, &text[1..]),
        Some((&c, rest)) => text.first() == Some(&c) && wildcard_match(rest, &text[1..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(s: &str) -> [u8; CARD_SIZE] {
        let mut buf = [b' '; CARD_SIZE];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf
    }

    #[test]
    fn parse_card_string_value() {
        let c = parse_card(&raw("TELESCOP= 'Hubble  '           / telescope name")).unwrap();
        assert_eq!(c.keyword_str(), "TELESCOP");
        assert_eq!(c.value, Some(Value::String(String::from("Hubble"))));
        assert_eq!(c.comment.as_deref(), Some("telescope name"));
    }

    #[test]
    fn parse_card_commentary() {
        let c = parse_card(&raw("HISTORY reduced with pipeline v2")).unwrap();
        assert!(c.is_commentary());
        assert!(c.value.is_none());
        assert_eq!(c.comment.as_deref(), Some("reduced with pipeline v2"));
    }

    #[test]
    fn parse_card_lowercase_keyword_rejected() {
        assert_eq!(
            parse_card(&raw("bitpix  =                   16")),
            Err(Status::BAD_KEYCHAR)
        );
    }

    #[test]
    fn parse_header_reports_missing_end() {
        let mut block = vec![b' '; BLOCK_SIZE];
        block[..CARD_SIZE].copy_from_slice(&raw("SIMPLE  =                    T"));
        assert_eq!(parse_header(&block), Err(Status::NO_END));
        assert_eq!(parse_header(&[]), Err(Status::NO_END));
    }

    #[test]
    fn serialize_then_parse_header() {
        let cards = vec![
            Card::new("SIMPLE", Value::Logical(true), Some("conforms to FITS")),
            Card::new("BITPIX", Value::Integer(16), None),
            Card::new("NAXIS", Value::Integer(0), None),
            Card::commentary("COMMENT", "hello"),
        ];
        let bytes = serialize_header(&cards);
        assert_eq!(bytes.len(), BLOCK_SIZE);
        let (parsed, len) = parse_header(&bytes).unwrap();
        assert_eq!(len, BLOCK_SIZE);
        assert_eq!(parsed, cards);
    }

    #[test]
    fn serialize_spills_to_second_block() {
        let cards: Vec<Card> = (0..36)
            .map(|i| Card::new(&format!("KEY{i:05}"), Value::Integer(i), None))
            .collect();
        assert_eq!(serialize_header(&cards).len(), 2 * BLOCK_SIZE);
    }

    #[test]
    fn string_comment_follows_closing_quote() {
        let card = Card::new("OBJECT", Value::String(String::from("M31")), Some("galaxy"));
        assert_eq!(card.to_record(), "OBJECT  = 'M31     ' / galaxy");
    }

    #[test]
    fn record_of_integer_card() {
        let card = Card::new("NAXIS", Value::Integer(2), Some("number of axes"));
        assert_eq!(
            card.to_record(),
            "NAXIS   =                    2 / number of axes"
        );
    }

    #[test]
    fn normalize_keyword_rules() {
        assert_eq!(normalize_keyword(" exptime ").unwrap(), "EXPTIME");
        assert_eq!(normalize_keyword("TOOLONGKEY"), Err(Status::BAD_KEYCHAR));
        assert_eq!(normalize_keyword("BAD!"), Err(Status::BAD_KEYCHAR));
    }

    #[test]
    fn wildcard_templates() {
        assert!(keyword_matches("naxis#", "NAXIS12"));
        assert!(!keyword_matches("NAXIS#", "NAXIS"));
        assert!(keyword_matches("T*", "TTYPE1"));
        assert!(keyword_matches("DATE-???", "DATE-OBS"));
        assert!(!keyword_matches("DATE", "DATE-OBS"));
    }
}
