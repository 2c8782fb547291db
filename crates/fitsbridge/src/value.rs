use core::str;

/// Value field of a keyword record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `T` or `F`.
    Logical(bool),
    /// FITS integer value.
    Integer(i64),
    /// Real number, written in E notation.
    Float(f64),
    /// Quoted string, without the quotes and with `''` unescaped.
    String(String),
    /// FITS complex value `(real, imaginary)`.
    Complex(f64, f64),
    /// A value indicator with an empty value field.
    Undefined,
}

impl Value {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Logical(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer view of the value. Floats are truncated toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            Value::Logical(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// The value as it would be returned by a string key read.
    ///
    /// Strings come back without quotes; every other kind is rendered the
    /// way it appears in the card.
    pub fn to_key_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Logical(b) => String::from(if *b { "T" } else { "F" }),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => format_float(*f, 20),
            Value::Complex(re, im) => {
                format!("({}, {})", format_float(*re, 20), format_float(*im, 20))
            }
            Value::Undefined => String::new(),
        }
    }
}

/// Split a value field at the ` /` comment separator.
///
/// Some writers omit the space after the slash, so a bare ` /` is accepted.
fn split_comment(field: &[u8]) -> (&[u8], Option<&str>) {
    match field.windows(2).position(|w| w == b" /") {
        Some(i) => (&field[..i], comment_after(field, i + 2)),
        None => (field, None),
    }
}

fn comment_after(field: &[u8], slash_end: usize) -> Option<&str> {
    let start = if field.get(slash_end) == Some(&b' ') {
        slash_end + 1
    } else {
        slash_end
    };
    str::from_utf8(field.get(start..)?)
        .ok()
        .map(str::trim_end)
        .filter(|s| !s.is_empty())
}

/// Parse a quoted string starting at `field[0] == '\''`.
///
/// Doubled quotes inside the string are a literal quote. An unterminated
/// string is accepted as-is.
fn parse_string(field: &[u8]) -> (Value, Option<&str>) {
    let mut value = String::new();
    let mut i = 1;
    while i < field.len() {
        if field[i] == b'\'' {
            if field.get(i + 1) == Some(&b'\'') {
                value.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            break;
        }
        value.push(field[i] as char);
        i += 1;
    }

    let rest = &field[i.min(field.len())..];
    let comment = rest
        .windows(2)
        .position(|w| w == b" /")
        .and_then(|p| comment_after(rest, p + 2));
    (Value::String(value.trim_end().to_string()), comment)
}

fn parse_float_str(s: &str) -> Option<f64> {
    s.replace(['D', 'd'], "E").parse::<f64>().ok()
}

fn parse_complex(text: &str) -> Option<Value> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let (re, im) = inner.split_once(',')?;
    Some(Value::Complex(
        parse_float_str(re.trim())?,
        parse_float_str(im.trim())?,
    ))
}

/// Parse the 70-byte value field of a card (bytes 10..80).
///
/// Returns the value and the optional comment. An empty value field yields
/// [`Value::Undefined`]. `None` means the field could not be interpreted.
pub fn parse_value(field: &[u8]) -> Option<(Value, Option<&str>)> {
    let lead = field.iter().position(|&b| b != b' ').unwrap_or(field.len());
    let field_from_lead = &field[lead..];

    if field_from_lead.first() == Some(&b'\'') {
        return Some(parse_string(field_from_lead));
    }

    let (val_part, comment) = split_comment(field);
    let text = str::from_utf8(val_part).ok()?.trim();
    if text.is_empty() || text.starts_with('/') {
        let comment = comment.or_else(|| {
            text.strip_prefix('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
        });
        return Some((Value::Undefined, comment));
    }

    let value = match text {
        "T" => Value::Logical(true),
        "F" => Value::Logical(false),
        _ if text.starts_with('(') => parse_complex(text)?,
        _ if !text.contains(['.', 'E', 'e', 'D', 'd']) => match text.parse::<i64>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Float(parse_float_str(text)?),
        },
        _ => Value::Float(parse_float_str(text)?),
    };
    Some((value, comment))
}

/// Serialize a [`Value`] into a 70-byte field for bytes 10..80 of a card.
///
/// Numbers and logicals are right-justified in the first 20 bytes (card
/// columns 11-30). Strings start at byte 0 with a single quote and are
/// padded to at least eight characters.
pub fn format_value(value: &Value) -> [u8; 70] {
    let mut buf = [b' '; 70];
    match value {
        Value::Logical(b) => buf[19] = if *b { b'T' } else { b'F' },
        Value::Integer(n) => right_justify(n.to_string().as_bytes(), &mut buf[..20]),
        Value::Float(f) => right_justify(format_float(*f, 20).as_bytes(), &mut buf[..20]),
        Value::String(s) => write_string(s, &mut buf),
        Value::Complex(re, im) => {
            let s = format!("({}, {})", format_float(*re, 20), format_float(*im, 20));
            right_justify(s.as_bytes(), &mut buf[..50]);
        }
        Value::Undefined => {}
    }
    buf
}

fn right_justify(src: &[u8], dest: &mut [u8]) {
    let len = src.len().min(dest.len());
    let start = dest.len() - len;
    dest[start..].copy_from_slice(&src[..len]);
}

fn format_float(f: f64, max_len: usize) -> String {
    if f == 0.0 {
        return String::from("0.0");
    }
    let mut precision = 15usize;
    loop {
        let s = format!("{:.prec$E}", f, prec = precision);
        if s.len() <= max_len || precision == 0 {
            return s;
        }
        precision -= 1;
    }
}

fn write_string(s: &str, buf: &mut [u8; 70]) {
    buf[0] = b'\'';
    let mut pos = 1;
    for ch in s.bytes() {
        let needed = if ch == b'\'' { 2 } else { 1 };
        if pos + needed > 69 {
            break;
        }
        buf[pos] = ch;
        if ch == b'\'' {
            buf[pos + 1] = b'\'';
        }
        pos += needed;
    }
    pos = pos.max(9);
    buf[pos] = b'\'';
}
