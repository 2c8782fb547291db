//! Header keyword editing and lookup on a single unit.

use std::time::{SystemTime, UNIX_EPOCH};

use super::unit::Unit;
use crate::block::header_capacity;
use crate::header::{keyword_matches, normalize_keyword, Card};
use crate::status::{NativeResult, Status};
use crate::value::Value;

/// Text columns available to a COMMENT or HISTORY card.
const COMMENTARY_WIDTH: usize = 72;

fn has_wildcard(name: &str) -> bool {
    name.contains(['*', '?', '#'])
}

fn non_empty(comment: &str) -> Option<&str> {
    Some(comment).filter(|c| !c.is_empty())
}

impl Unit {
    /// Append a keyword at the end of the header.
    pub fn append_key(&mut self, name: &str, value: Value, comment: &str) -> NativeResult<()> {
        let name = normalize_keyword(name)?;
        self.cards.push(Card::new(&name, value, non_empty(comment)));
        Ok(())
    }

    /// Replace the value of a keyword, appending it when absent.
    ///
    /// A comment of `&` keeps the existing comment.
    pub fn update_key(&mut self, name: &str, value: Value, comment: &str) -> NativeResult<()> {
        let name = normalize_keyword(name)?;
        match self.position(&name) {
            Some(i) => {
                let card = &mut self.cards[i];
                card.value = Some(value);
                if comment != "&" {
                    card.comment = non_empty(comment).map(String::from);
                }
            }
            None => {
                let comment = if comment == "&" { "" } else { comment };
                self.cards.push(Card::new(&name, value, non_empty(comment)));
            }
        }
        Ok(())
    }

    /// Append COMMENT or HISTORY text, split over as many cards as needed.
    pub fn append_commentary(&mut self, keyword: &str, text: &str) {
        if text.is_empty() {
            self.cards.push(Card::commentary(keyword, ""));
            return;
        }
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(COMMENTARY_WIDTH) {
            let piece: String = chunk.iter().collect();
            self.cards.push(Card::commentary(keyword, &piece));
        }
    }

    /// Index of the card named `name`, searching from `from` to the end and
    /// then wrapping to the top. Names may contain `*`, `?` and `#`.
    pub fn find_key(&self, name: &str, from: usize) -> NativeResult<usize> {
        let wildcard = has_wildcard(name);
        let target = if wildcard {
            name.trim().to_ascii_uppercase()
        } else {
            normalize_keyword(name)?
        };
        let n = self.cards.len();
        let from = from.min(n);
        (from..n)
            .chain(0..from)
            .find(|&i| {
                let kw = self.cards[i].keyword_str();
                if wildcard {
                    keyword_matches(&target, kw)
                } else {
                    kw == target
                }
            })
            .ok_or(Status::KEY_NO_EXIST)
    }

    /// Index of the next card at or after `from` whose keyword matches one of
    /// `include` and none of `exclude`.
    pub fn next_matching(
        &self,
        from: usize,
        include: &[String],
        exclude: &[String],
    ) -> NativeResult<usize> {
        self.cards
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, card)| {
                let kw = card.keyword_str();
                include.iter().any(|t| keyword_matches(t, kw))
                    && !exclude.iter().any(|t| keyword_matches(t, kw))
            })
            .map(|(i, _)| i)
            .ok_or(Status::KEY_NO_EXIST)
    }

    pub fn rename_key(&mut self, old: &str, new: &str) -> NativeResult<()> {
        let new = normalize_keyword(new)?;
        let i = self.find_key(old, 0)?;
        self.cards[i].keyword = crate::header::make_keyword(&new);
        Ok(())
    }

    pub fn set_comment(&mut self, name: &str, comment: &str) -> NativeResult<()> {
        let i = self.find_key(name, 0)?;
        self.cards[i].comment = non_empty(comment).map(String::from);
        Ok(())
    }

    /// Remove the first card named `name`. Returns its former index.
    pub fn remove_key(&mut self, name: &str) -> NativeResult<usize> {
        let i = self.find_key(name, 0)?;
        self.cards.remove(i);
        Ok(i)
    }

    /// Remove the card at 1-based record number `keynum`.
    pub fn remove_record(&mut self, keynum: i32) -> NativeResult<usize> {
        let i = self.record_index(keynum)?;
        self.cards.remove(i);
        Ok(i)
    }

    /// 0-based index of a 1-based record number.
    pub fn record_index(&self, keynum: i32) -> NativeResult<usize> {
        usize::try_from(keynum)
            .ok()
            .filter(|&n| n >= 1 && n <= self.cards.len())
            .map(|n| n - 1)
            .ok_or(Status::KEY_OUT_BOUNDS)
    }

    /// Set the `[unit]` prefix of a keyword's comment.
    pub fn set_unit(&mut self, name: &str, unit: &str) -> NativeResult<()> {
        let i = self.find_key(name, 0)?;
        let card = &mut self.cards[i];
        let rest = card
            .comment
            .as_deref()
            .map(strip_unit)
            .unwrap_or("")
            .trim_start()
            .to_string();
        let comment = match (unit.is_empty(), rest.is_empty()) {
            (true, _) => rest,
            (false, true) => format!("[{unit}]"),
            (false, false) => format!("[{unit}] {rest}"),
        };
        card.comment = non_empty(&comment).map(String::from);
        Ok(())
    }

    /// The `[unit]` prefix of a keyword's comment, or an empty string.
    pub fn key_unit(&self, name: &str) -> NativeResult<String> {
        let i = self.find_key(name, 0)?;
        Ok(self.cards[i]
            .comment
            .as_deref()
            .and_then(unit_of)
            .unwrap_or_default())
    }

    /// Number of keywords and number of free card slots left in the
    /// header's last block.
    pub fn header_space(&self) -> (i32, i32) {
        let used = self.cards.len() + 1;
        (self.cards.len() as i32, (header_capacity(self.cards.len()) - used) as i32)
    }

    /// Write or update `DATE` with the given time.
    pub fn stamp_date(&mut self, now: SystemTime) -> NativeResult<()> {
        self.update_key(
            "DATE",
            Value::String(utc_timestamp(now)),
            "file creation date (YYYY-MM-DDThh:mm:ss UT)",
        )
    }
}

fn unit_of(comment: &str) -> Option<String> {
    let inner = comment.strip_prefix('[')?;
    let end = inner.find(']')?;
    Some(inner[..end].to_string())
}

fn strip_unit(comment: &str) -> &str {
    match comment.strip_prefix('[').and_then(|c| c.find(']').map(|e| &c[e + 1..])) {
        Some(rest) => rest,
        None => comment,
    }
}

/// Format a time as `YYYY-MM-DDThh:mm:ss` in UTC.
pub fn utc_timestamp(now: SystemTime) -> String {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let (days, rem) = (secs.div_euclid(86_400), secs.rem_euclid(86_400));
    let (y, m, d) = civil_from_days(days);
    format!(
        "{y:04}-{m:02}-{d:02}T{:02}:{:02}:{:02}",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Gregorian date of a day count since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unit() -> Unit {
        Unit::null_primary()
    }

    #[test]
    fn append_and_update() {
        let mut u = unit();
        u.append_key("exptime", Value::Float(30.0), "seconds").unwrap();
        u.update_key("EXPTIME", Value::Float(60.0), "&").unwrap();
        let card = u.card("EXPTIME").unwrap();
        assert_eq!(card.value, Some(Value::Float(60.0)));
        assert_eq!(card.comment.as_deref(), Some("seconds"));

        u.update_key("OBSERVER", Value::String(String::from("me")), "").unwrap();
        assert_eq!(u.cards.last().unwrap().keyword_str(), "OBSERVER");
    }

    #[test]
    fn bad_keyword_names() {
        let mut u = unit();
        assert_eq!(
            u.append_key("NINECHARS", Value::Integer(1), ""),
            Err(Status::BAD_KEYCHAR)
        );
    }

    #[test]
    fn long_commentary_splits() {
        let mut u = unit();
        let text = "x".repeat(100);
        u.append_commentary("HISTORY", &text);
        let history: Vec<_> = u.cards.iter().filter(|c| c.keyword_str() == "HISTORY").collect();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].comment.as_deref(), Some(&text[72..]));
    }

    #[test]
    fn find_wraps_and_matches_wildcards() {
        let u = unit();
        assert_eq!(u.find_key("SIMPLE", 2), Ok(0));
        assert_eq!(u.find_key("NAX*", 0), Ok(2));
        assert_eq!(u.find_key("MISSING", 0), Err(Status::KEY_NO_EXIST));
    }

    #[test]
    fn next_matching_honours_exclusions() {
        let u = unit();
        let include = vec![String::from("*")];
        let exclude = vec![String::from("SIMPLE"), String::from("BITPIX")];
        assert_eq!(u.next_matching(0, &include, &exclude), Ok(2));
        assert_eq!(u.next_matching(4, &include, &[]), Err(Status::KEY_NO_EXIST));
    }

    #[test]
    fn rename_comment_and_remove() {
        let mut u = unit();
        u.rename_key("EXTEND", "EXTENDED").unwrap();
        assert!(u.card("EXTENDED").is_some());
        u.set_comment("EXTENDED", "renamed").unwrap();
        assert_eq!(u.card("EXTENDED").unwrap().comment.as_deref(), Some("renamed"));
        assert_eq!(u.remove_key("EXTENDED"), Ok(3));
        assert_eq!(u.remove_record(4), Err(Status::KEY_OUT_BOUNDS));
        assert_eq!(u.remove_record(3), Ok(2));
        assert_eq!(u.cards.len(), 2);
    }

    #[test]
    fn units_live_in_comment_prefix() {
        let mut u = unit();
        u.append_key("EXPTIME", Value::Float(1.0), "exposure").unwrap();
        u.set_unit("EXPTIME", "s").unwrap();
        assert_eq!(u.card("EXPTIME").unwrap().comment.as_deref(), Some("[s] exposure"));
        u.set_unit("EXPTIME", "min").unwrap();
        assert_eq!(u.key_unit("EXPTIME").unwrap(), "min");
        assert_eq!(u.key_unit("BITPIX").unwrap(), "");
    }

    #[test]
    fn header_space_counts_free_slots() {
        assert_eq!(unit().header_space(), (4, 31));
    }

    #[test]
    fn timestamps() {
        assert_eq!(utc_timestamp(UNIX_EPOCH), "1970-01-01T00:00:00");
        let t = UNIX_EPOCH + Duration::from_secs(951_782_400 + 3661);
        assert_eq!(utc_timestamp(t), "2000-02-29T01:01:01");
    }

    #[test]
    fn stamp_date_updates_in_place() {
        let mut u = unit();
        u.stamp_date(UNIX_EPOCH).unwrap();
        u.stamp_date(UNIX_EPOCH + Duration::from_secs(86_400)).unwrap();
        let dates: Vec<_> = u.cards.iter().filter(|c| c.keyword_str() == "DATE").collect();
        assert_eq!(dates.len(), 1);
        assert_eq!(u.string_key("DATE").as_deref(), Some("1970-01-02T00:00:00"));
    }
}
