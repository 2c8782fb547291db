//! Table HDUs: column descriptors, row/column editing and binary column I/O.
//!
//! ASCII tables can be created, navigated and described; element I/O and
//! structural edits of columns are limited to binary tables.

use super::pixel::{Scaling, Stored};
use super::unit::Unit;
use crate::header::{make_keyword, wildcard_match, Card};
use crate::native::{ColumnData, ColumnInfo, ColumnMatch, DataType, HduType, Samples};
use crate::status::{NativeResult, Status};
use crate::value::Value;

/// Element type of a table column, from the TFORMn code letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Logical,
    Bit,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Complex,
    DoubleComplex,
    Text,
    /// Variable-length descriptor (`P` or `Q`) with its element kind.
    Variable { wide: bool, element: u8 },
}

impl ColumnKind {
    fn from_letter(letter: u8) -> NativeResult<Self> {
        Ok(match letter {
            b'L' => ColumnKind::Logical,
            b'X' => ColumnKind::Bit,
            b'B' => ColumnKind::Byte,
            b'I' => ColumnKind::Short,
            b'J' => ColumnKind::Int,
            b'K' => ColumnKind::Long,
            b'E' => ColumnKind::Float,
            b'D' => ColumnKind::Double,
            b'C' => ColumnKind::Complex,
            b'M' => ColumnKind::DoubleComplex,
            b'A' => ColumnKind::Text,
            _ => return Err(Status::BAD_TFORM_DTYPE),
        })
    }

    fn letter(self) -> char {
        match self {
            ColumnKind::Logical => 'L',
            ColumnKind::Bit => 'X',
            ColumnKind::Byte => 'B',
            ColumnKind::Short => 'I',
            ColumnKind::Int => 'J',
            ColumnKind::Long => 'K',
            ColumnKind::Float => 'E',
            ColumnKind::Double => 'D',
            ColumnKind::Complex => 'C',
            ColumnKind::DoubleComplex => 'M',
            ColumnKind::Text => 'A',
            ColumnKind::Variable { wide: false, .. } => 'P',
            ColumnKind::Variable { wide: true, .. } => 'Q',
        }
    }

    /// Bytes used by one element (a bit column reports one byte).
    fn element_size(self) -> usize {
        match self {
            ColumnKind::Logical | ColumnKind::Bit | ColumnKind::Byte | ColumnKind::Text => 1,
            ColumnKind::Short => 2,
            ColumnKind::Int | ColumnKind::Float => 4,
            ColumnKind::Long | ColumnKind::Double | ColumnKind::Complex => 8,
            ColumnKind::DoubleComplex => 16,
            ColumnKind::Variable { wide, .. } => {
                if wide {
                    16
                } else {
                    8
                }
            }
        }
    }

    /// Bytes a column of `repeat` elements occupies in each row.
    fn row_bytes(self, repeat: usize) -> usize {
        match self {
            ColumnKind::Bit => repeat.div_ceil(8),
            _ => repeat * self.element_size(),
        }
    }

    fn typecode(self) -> i32 {
        match self {
            ColumnKind::Bit => 1,
            ColumnKind::Byte => 11,
            ColumnKind::Logical => 14,
            ColumnKind::Text => 16,
            ColumnKind::Short => 21,
            ColumnKind::Int => 41,
            ColumnKind::Float => 42,
            ColumnKind::Long => 81,
            ColumnKind::Double => 82,
            ColumnKind::Complex => 83,
            ColumnKind::DoubleComplex => 163,
            ColumnKind::Variable { element, .. } => ColumnKind::from_letter(element)
                .map(|k| -k.typecode())
                .unwrap_or(0),
        }
    }

    fn stored(self) -> Option<Stored> {
        match self {
            ColumnKind::Byte => Some(Stored::U8),
            ColumnKind::Short => Some(Stored::I16),
            ColumnKind::Int => Some(Stored::I32),
            ColumnKind::Long => Some(Stored::I64),
            ColumnKind::Float => Some(Stored::F32),
            ColumnKind::Double => Some(Stored::F64),
            _ => None,
        }
    }

    fn fill_byte(self) -> u8 {
        if self == ColumnKind::Text {
            b' '
        } else {
            0
        }
    }
}

/// Parse a binary-table TFORMn value such as `1J`, `20A`, `16X` or `1PE(8)`.
pub fn parse_tform(tform: &str) -> NativeResult<(usize, ColumnKind)> {
    let s = tform.trim().to_ascii_uppercase();
    let s = match s.find('(') {
        Some(paren) => &s[..paren],
        None => &s[..],
    };
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    let repeat = if digits == 0 {
        1
    } else {
        s[..digits].parse::<usize>().map_err(|_| Status::BAD_TFORM)?
    };
    let code = &s.as_bytes()[digits..];
    let kind = match code {
        [letter] => ColumnKind::from_letter(*letter)?,
        // `rAw` substring notation keeps the full width.
        [b'A', rest @ ..] if rest.iter().all(u8::is_ascii_digit) => ColumnKind::Text,
        [b'P', element, ..] | [b'Q', element, ..] => {
            ColumnKind::from_letter(*element)?;
            ColumnKind::Variable {
                wide: code[0] == b'Q',
                element: *element,
            }
        }
        [] => return Err(Status::BAD_TFORM),
        _ => return Err(Status::BAD_TFORM_DTYPE),
    };
    Ok((repeat, kind))
}

/// Parse an ASCII-table TFORMn value (`Aw`, `Iw`, `Fw.d`, `Ew.d`, `Dw.d`).
fn parse_ascii_tform(tform: &str) -> NativeResult<(ColumnKind, usize)> {
    let s = tform.trim().to_ascii_uppercase();
    let (letter, rest) = s.split_at(s.len().min(1));
    let width = rest
        .split('.')
        .next()
        .and_then(|w| w.parse::<usize>().ok())
        .filter(|&w| w > 0)
        .ok_or(Status::BAD_TFORM)?;
    let kind = match letter {
        "A" => ColumnKind::Text,
        "I" => ColumnKind::Int,
        "F" | "E" => ColumnKind::Float,
        "D" => ColumnKind::Double,
        _ => return Err(Status::BAD_TFORM_DTYPE),
    };
    Ok((kind, width))
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub repeat: usize,
    /// Byte offset of the column inside a row.
    pub offset: usize,
    /// Bytes the column occupies in a row.
    pub width: usize,
    pub scaling: Scaling,
}

impl Column {
    pub fn info(&self) -> ColumnInfo {
        let width = match self.kind {
            ColumnKind::Text => self.width,
            kind => kind.element_size(),
        };
        ColumnInfo {
            typecode: self.kind.typecode(),
            repeat: self.repeat as i64,
            width: width as i64,
        }
    }
}

/// Column layout of a table unit.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub hdu_type: HduType,
    pub naxis1: usize,
    pub naxis2: usize,
    pub columns: Vec<Column>,
}

fn required(unit: &Unit, keyword: &str, status: Status) -> NativeResult<usize> {
    unit.int_key(keyword)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or(status)
}

impl TableLayout {
    pub fn of(unit: &Unit) -> NativeResult<Self> {
        let hdu_type = unit.hdu_type();
        if hdu_type == HduType::Image {
            return Err(Status::NOT_TABLE);
        }
        let naxis1 = required(unit, "NAXIS1", Status::BAD_NAXES)?;
        let naxis2 = required(unit, "NAXIS2", Status::NEG_ROWS)?;
        let tfields = required(unit, "TFIELDS", Status::BAD_TFIELDS)?;

        let mut columns = Vec::with_capacity(tfields);
        let mut offset = 0;
        for n in 1..=tfields {
            let tform = unit
                .string_key(&format!("TFORM{n}"))
                .ok_or(Status::NO_TFORM)?;
            let scaling = Scaling {
                scale: unit.float_key(&format!("TSCAL{n}")).unwrap_or(1.0),
                zero: unit.float_key(&format!("TZERO{n}")).unwrap_or(0.0),
                blank: unit.int_key(&format!("TNULL{n}")),
            };
            let name = unit.string_key(&format!("TTYPE{n}")).unwrap_or_default();
            let column = if hdu_type == HduType::BinaryTable {
                let (repeat, kind) = parse_tform(&tform)?;
                let width = kind.row_bytes(repeat);
                let column = Column { name, kind, repeat, offset, width, scaling };
                offset += width;
                column
            } else {
                let (kind, width) = parse_ascii_tform(&tform)?;
                let tbcol = required(unit, &format!("TBCOL{n}"), Status::BAD_TFORM)?;
                let repeat = if kind == ColumnKind::Text { width } else { 1 };
                Column { name, kind, repeat, offset: tbcol.saturating_sub(1), width, scaling }
            };
            columns.push(column);
        }
        if hdu_type == HduType::BinaryTable && offset != naxis1 {
            return Err(Status::BAD_ROW_WIDTH);
        }
        Ok(TableLayout { hdu_type, naxis1, naxis2, columns })
    }

    /// Layout of a binary table; ASCII tables fail with NOT_BTABLE.
    pub fn binary(unit: &Unit) -> NativeResult<Self> {
        let layout = TableLayout::of(unit)?;
        if layout.hdu_type != HduType::BinaryTable {
            return Err(Status::NOT_BTABLE);
        }
        Ok(layout)
    }

    pub fn column(&self, colnum: i32) -> NativeResult<&Column> {
        usize::try_from(colnum)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| self.columns.get(i))
            .ok_or(Status::BAD_COL_NUM)
    }

    /// Find the column whose TTYPEn matches a template.
    pub fn lookup(&self, case_sensitive: bool, template: &str) -> NativeResult<ColumnMatch> {
        let fold = |s: &str| {
            if case_sensitive {
                s.trim().to_string()
            } else {
                s.trim().to_ascii_uppercase()
            }
        };
        let pattern = fold(template);
        let mut matches = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| wildcard_match(pattern.as_bytes(), fold(&c.name).as_bytes()));
        let (index, first) = matches.next().ok_or(Status::COL_NOT_FOUND)?;
        Ok(ColumnMatch {
            number: index as i32 + 1,
            name: first.name.clone(),
            unique: matches.next().is_none(),
        })
    }

    /// Byte position of element `k` (0-based) of `row` (0-based).
    fn position(&self, column: &Column, row: usize, k: usize) -> usize {
        row * self.naxis1 + column.offset + k * column.kind.element_size()
    }

    /// Row/element pairs of `nelem` consecutive elements. With `rows`, the
    /// span must end within that many rows; the check runs before anything
    /// is collected.
    fn elements(
        &self,
        column: &Column,
        firstrow: i64,
        firstelem: i64,
        nelem: usize,
        rows: Option<usize>,
    ) -> NativeResult<Vec<(usize, usize)>> {
        let row = usize::try_from(firstrow)
            .ok()
            .and_then(|r| r.checked_sub(1))
            .ok_or(Status::BAD_ROW_NUM)?;
        let repeat = column.repeat;
        if repeat == 0 {
            // Zero-width column: nothing to address.
            return if nelem == 0 { Ok(Vec::new()) } else { Err(Status::BAD_ELEM_NUM) };
        }
        let elem = usize::try_from(firstelem)
            .ok()
            .and_then(|e| e.checked_sub(1))
            .filter(|&e| e < repeat)
            .ok_or(Status::BAD_ELEM_NUM)?;
        let first = row
            .checked_mul(repeat)
            .and_then(|f| f.checked_add(elem))
            .ok_or(Status::BAD_ROW_NUM)?;
        let end = first.checked_add(nelem).ok_or(Status::BAD_ROW_NUM)?;
        if let Some(rows) = rows {
            if rows.checked_mul(repeat).map_or(true, |total| end > total) {
                return Err(Status::BAD_ROW_NUM);
            }
        }
        Ok((first..end).map(|e| (e / repeat, e % repeat)).collect())
    }

    pub fn read(
        &self,
        unit: &Unit,
        datatype: DataType,
        colnum: i32,
        firstrow: i64,
        firstelem: i64,
        nelem: i64,
        nulval: f64,
    ) -> NativeResult<Samples<ColumnData>> {
        let column = self.column(colnum)?;
        let nelem = usize::try_from(nelem).map_err(|_| Status::BAD_ELEM_NUM)?;

        if column.kind == ColumnKind::Text {
            if datatype != DataType::String {
                return Err(Status::BAD_DATATYPE);
            }
            let first = usize::try_from(firstrow)
                .ok()
                .and_then(|r| r.checked_sub(1))
                .ok_or(Status::BAD_ROW_NUM)?;
            if first.checked_add(nelem).map_or(true, |end| end > self.naxis2) {
                return Err(Status::BAD_ROW_NUM);
            }
            let values = (first..first + nelem)
                .map(|row| {
                    let start = self.position(column, row, 0);
                    let bytes = &unit.data[start..start + column.width];
                    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
                })
                .collect();
            return Ok(Samples { values: ColumnData::Text(values), any_null: false });
        }
        if datatype == DataType::String {
            return Err(Status::BAD_DATATYPE);
        }

        let elements = self.elements(column, firstrow, firstelem, nelem, Some(self.naxis2))?;

        if column.kind == ColumnKind::Logical {
            let flags: Vec<u8> = elements
                .iter()
                .map(|&(row, k)| unit.data[self.position(column, row, k)])
                .collect();
            let any_null = nulval != 0.0 && flags.iter().any(|&b| b == 0);
            let values = if datatype == DataType::Logical {
                ColumnData::Logical(flags.iter().map(|&b| b == b'T').collect())
            } else {
                ColumnData::Numeric(
                    flags
                        .iter()
                        .map(|&b| match b {
                            b'T' => 1.0,
                            0 if nulval != 0.0 => nulval,
                            _ => 0.0,
                        })
                        .collect(),
                )
            };
            return Ok(Samples { values, any_null });
        }
        if datatype == DataType::Logical {
            return Err(Status::NOT_LOGICAL_COL);
        }

        let stored = column.kind.stored().ok_or(Status::BAD_TFORM_DTYPE)?;
        let size = stored.size();
        let mut raw = Vec::with_capacity(elements.len() * size);
        for &(row, k) in &elements {
            let start = self.position(column, row, k);
            raw.extend_from_slice(&unit.data[start..start + size]);
        }
        let samples = column
            .scaling
            .to_physical(stored, stored.decode(&raw), datatype, nulval)?;
        Ok(Samples {
            values: ColumnData::Numeric(samples.values),
            any_null: samples.any_null,
        })
    }

    /// Write column elements, extending the table when the write runs past
    /// its last row.
    pub fn write(
        &self,
        unit: &mut Unit,
        datatype: DataType,
        colnum: i32,
        firstrow: i64,
        firstelem: i64,
        data: &ColumnData,
    ) -> NativeResult<()> {
        let column = self.column(colnum)?.clone();
        let (rows_needed, elements) = match data {
            ColumnData::Text(values) => {
                if column.kind != ColumnKind::Text {
                    return Err(Status::BAD_DATATYPE);
                }
                let first = usize::try_from(firstrow)
                    .ok()
                    .and_then(|r| r.checked_sub(1))
                    .ok_or(Status::BAD_ROW_NUM)?;
                let end = first.checked_add(values.len()).ok_or(Status::BAD_ROW_NUM)?;
                (end, (first..end).map(|r| (r, 0)).collect())
            }
            _ => {
                if column.kind == ColumnKind::Text {
                    return Err(Status::BAD_DATATYPE);
                }
                let elements = self.elements(&column, firstrow, firstelem, data.len(), None)?;
                let rows = elements.last().map_or(0, |&(row, _)| row + 1);
                (rows, elements)
            }
        };

        let mut layout = self.clone();
        if rows_needed > layout.naxis2 {
            let extra = (rows_needed - layout.naxis2) as i64;
            insert_rows(unit, layout.naxis2 as i64, extra)?;
            layout.naxis2 = rows_needed;
        }

        match data {
            ColumnData::Text(values) => {
                for (value, &(row, _)) in values.iter().zip(&elements) {
                    let start = layout.position(&column, row, 0);
                    let cell = &mut unit.data[start..start + column.width];
                    cell.fill(b' ');
                    let bytes = value.as_bytes();
                    let len = bytes.len().min(column.width);
                    cell[..len].copy_from_slice(&bytes[..len]);
                }
            }
            ColumnData::Logical(values) => {
                if column.kind != ColumnKind::Logical {
                    return Err(Status::NOT_LOGICAL_COL);
                }
                for (&v, &(row, k)) in values.iter().zip(&elements) {
                    let pos = layout.position(&column, row, k);
                    unit.data[pos] = if v { b'T' } else { b'F' };
                }
            }
            ColumnData::Numeric(values) => {
                if column.kind == ColumnKind::Logical {
                    for (&v, &(row, k)) in values.iter().zip(&elements) {
                        let pos = layout.position(&column, row, k);
                        unit.data[pos] = if v != 0.0 { b'T' } else { b'F' };
                    }
                    return Ok(());
                }
                let stored = column.kind.stored().ok_or(Status::BAD_TFORM_DTYPE)?;
                let size = stored.size();
                for (&v, &(row, k)) in values.iter().zip(&elements) {
                    let v = if v.is_nan() { v } else { datatype.convert(v)? };
                    let stored_value = column.scaling.to_stored(stored, v)?;
                    let pos = layout.position(&column, row, k);
                    stored.encode(stored_value, &mut unit.data[pos..pos + size])?;
                }
            }
        }
        Ok(())
    }
}

/// Keyword roots indexed by column number.
const COLUMN_ROOTS: [&str; 19] = [
    "TTYPE", "TFORM", "TUNIT", "TSCAL", "TZERO", "TNULL", "TDISP", "TDIM", "TBCOL", "TCTYP",
    "TCUNI", "TCRPX", "TCRVL", "TCDLT", "TCROT", "TLMIN", "TLMAX", "TDMIN", "TDMAX",
];

/// Split a column keyword such as `TFORM12` into its root and number.
fn column_keyword(keyword: &str) -> Option<(&'static str, usize)> {
    COLUMN_ROOTS.iter().find_map(|&root| {
        let digits = keyword.strip_prefix(root)?;
        if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(|n| (root, n))
    })
}

/// Shift the number of every column keyword numbered `from` or above.
fn renumber_columns(unit: &mut Unit, from: usize, up: bool) {
    for card in &mut unit.cards {
        if let Some((root, n)) = column_keyword(card.keyword_str()) {
            if n >= from {
                let n = if up { n + 1 } else { n - 1 };
                card.keyword = make_keyword(&format!("{root}{n}"));
            }
        }
    }
}

/// Rewrite every row through `f`, keeping the heap that follows the rows.
fn rebuild_rows(
    unit: &mut Unit,
    naxis1: usize,
    naxis2: usize,
    mut f: impl FnMut(&[u8], &mut Vec<u8>),
) {
    let heap = unit.data.split_off((naxis1 * naxis2).min(unit.data.len()));
    let mut data = Vec::with_capacity(unit.data.len() + heap.len());
    for r in 0..naxis2 {
        f(&unit.data[r * naxis1..(r + 1) * naxis1], &mut data);
    }
    data.extend_from_slice(&heap);
    unit.data = data;
}

fn set_count(unit: &mut Unit, keyword: &str, n: usize) {
    unit.set_value(keyword, Value::Integer(n as i64), "NAXIS");
}

/// `rows` rows of `width` bytes of `fill`, or MEMORY_ALLOCATION when that
/// cannot be had.
fn blank_rows(rows: usize, width: usize, fill: u8) -> NativeResult<Vec<u8>> {
    let len = rows.checked_mul(width).ok_or(Status::MEMORY_ALLOCATION)?;
    let mut blank = Vec::new();
    blank
        .try_reserve_exact(len)
        .map_err(|_| Status::MEMORY_ALLOCATION)?;
    blank.resize(len, fill);
    Ok(blank)
}

/// Insert `nrows` blank rows after row `firstrow` (0 inserts at the top).
pub fn insert_rows(unit: &mut Unit, firstrow: i64, nrows: i64) -> NativeResult<()> {
    let layout = TableLayout::of(unit)?;
    if nrows < 0 {
        return Err(Status::NEG_ROWS);
    }
    if firstrow < 0 || firstrow as usize > layout.naxis2 {
        return Err(Status::BAD_ROW_NUM);
    }
    let fill = if layout.hdu_type == HduType::AsciiTable { b' ' } else { 0 };
    let at = firstrow as usize * layout.naxis1;
    let added = usize::try_from(nrows).map_err(|_| Status::MEMORY_ALLOCATION)?;
    let blank = blank_rows(added, layout.naxis1, fill)?;
    unit.data
        .try_reserve(blank.len())
        .map_err(|_| Status::MEMORY_ALLOCATION)?;
    unit.data.splice(at..at, blank);
    set_count(unit, "NAXIS2", layout.naxis2 + added);
    Ok(())
}

/// Delete `nrows` rows starting at row `firstrow`.
pub fn delete_rows(unit: &mut Unit, firstrow: i64, nrows: i64) -> NativeResult<()> {
    let layout = TableLayout::of(unit)?;
    if nrows < 0 {
        return Err(Status::NEG_ROWS);
    }
    if firstrow < 1 || nrows > layout.naxis2 as i64 - (firstrow - 1) {
        return Err(Status::BAD_ROW_NUM);
    }
    let start = (firstrow as usize - 1) * layout.naxis1;
    unit.data.drain(start..start + nrows as usize * layout.naxis1);
    set_count(unit, "NAXIS2", layout.naxis2 - nrows as usize);
    Ok(())
}

/// Delete a list of rows given in ascending order.
pub fn delete_row_list(unit: &mut Unit, rows: &[i64]) -> NativeResult<()> {
    let layout = TableLayout::of(unit)?;
    let ascending = rows.windows(2).all(|w| w[0] < w[1]);
    if !ascending || rows.iter().any(|&r| r < 1 || r as usize > layout.naxis2) {
        return Err(Status::BAD_ROW_NUM);
    }
    for &row in rows.iter().rev() {
        let start = (row as usize - 1) * layout.naxis1;
        unit.data.drain(start..start + layout.naxis1);
    }
    set_count(unit, "NAXIS2", layout.naxis2 - rows.len());
    Ok(())
}

/// Insert a column at position `colnum` of a binary table.
pub fn insert_column(unit: &mut Unit, colnum: i32, ttype: &str, tform: &str) -> NativeResult<()> {
    let layout = TableLayout::binary(unit)?;
    let tfields = layout.columns.len();
    let n = usize::try_from(colnum)
        .ok()
        .filter(|&n| n >= 1 && n <= tfields + 1)
        .ok_or(Status::BAD_COL_NUM)?;
    let (repeat, kind) = parse_tform(tform)?;
    let width = kind.row_bytes(repeat);
    let offset = layout.columns.get(n - 1).map_or(layout.naxis1, |c| c.offset);

    rebuild_rows(unit, layout.naxis1, layout.naxis2, |row, out| {
        out.extend_from_slice(&row[..offset]);
        out.resize(out.len() + width, kind.fill_byte());
        out.extend_from_slice(&row[offset..]);
    });

    // New cards go after the last keyword of the preceding column.
    let anchor = unit
        .cards
        .iter()
        .rposition(|c| column_keyword(c.keyword_str()).is_some_and(|(_, k)| k == n - 1))
        .or_else(|| unit.position("TFIELDS"))
        .map_or(unit.cards.len(), |i| i + 1);
    renumber_columns(unit, n, true);
    let mut cards = Vec::new();
    if !ttype.is_empty() {
        cards.push(Card::new(&format!("TTYPE{n}"), Value::String(ttype.to_string()), Some(format!("label for field {n}").as_str())));
    }
    cards.push(Card::new(&format!("TFORM{n}"), Value::String(tform.trim().to_string()), Some(format!("data format of field {n}").as_str())));
    unit.cards.splice(anchor..anchor, cards);

    set_count(unit, "NAXIS1", layout.naxis1 + width);
    set_count(unit, "TFIELDS", tfields + 1);
    Ok(())
}

/// Delete a column of a binary table and its keywords.
pub fn delete_column(unit: &mut Unit, colnum: i32) -> NativeResult<()> {
    let layout = TableLayout::binary(unit)?;
    let column = layout.column(colnum)?.clone();
    let n = colnum as usize;

    rebuild_rows(unit, layout.naxis1, layout.naxis2, |row, out| {
        out.extend_from_slice(&row[..column.offset]);
        out.extend_from_slice(&row[column.offset + column.width..]);
    });
    unit.cards
        .retain(|c| column_keyword(c.keyword_str()).map_or(true, |(_, k)| k != n));
    renumber_columns(unit, n + 1, false);

    set_count(unit, "NAXIS1", layout.naxis1 - column.width);
    set_count(unit, "TFIELDS", layout.columns.len() - 1);
    Ok(())
}

/// Change the repeat count of a fixed-width binary column.
pub fn modify_vector_len(unit: &mut Unit, colnum: i32, newveclen: i64) -> NativeResult<()> {
    let layout = TableLayout::binary(unit)?;
    let column = layout.column(colnum)?.clone();
    if newveclen < 0 {
        return Err(Status::BAD_TFORM);
    }
    if matches!(column.kind, ColumnKind::Variable { .. }) {
        return Err(Status::BAD_TFORM_DTYPE);
    }
    let new_width = column.kind.row_bytes(newveclen as usize);
    let keep = new_width.min(column.width);

    rebuild_rows(unit, layout.naxis1, layout.naxis2, |row, out| {
        out.extend_from_slice(&row[..column.offset + keep]);
        out.resize(out.len() + (new_width - keep), column.kind.fill_byte());
        out.extend_from_slice(&row[column.offset + column.width..]);
    });

    let tform = format!("{newveclen}{}", column.kind.letter());
    unit.set_value(&format!("TFORM{colnum}"), Value::String(tform), "TFIELDS");
    set_count(unit, "NAXIS1", layout.naxis1 - column.width + new_width);
    Ok(())
}

/// Dimensions from TDIMn, or the repeat count when TDIMn is absent.
pub fn read_tdim(unit: &Unit, colnum: i32) -> NativeResult<Vec<i64>> {
    let layout = TableLayout::binary(unit)?;
    let column = layout.column(colnum)?;
    let Some(tdim) = unit.string_key(&format!("TDIM{colnum}")) else {
        return Ok(vec![column.repeat as i64]);
    };
    let inner = tdim
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or(Status::BAD_TDIM)?;
    inner
        .split(',')
        .map(|d| d.trim().parse::<i64>().map_err(|_| Status::BAD_TDIM))
        .collect()
}

/// Write TDIMn. The dimensions must multiply to the column's repeat count.
pub fn write_tdim(unit: &mut Unit, colnum: i32, naxes: &[i64]) -> NativeResult<()> {
    let layout = TableLayout::binary(unit)?;
    let column = layout.column(colnum)?;
    if naxes.is_empty() || naxes.iter().any(|&n| n < 1) {
        return Err(Status::BAD_TDIM);
    }
    if naxes.iter().product::<i64>() != column.repeat as i64 {
        return Err(Status::BAD_TDIM);
    }
    let dims: Vec<String> = naxes.iter().map(i64::to_string).collect();
    let value = Value::String(format!("({})", dims.join(",")));
    unit.set_value(&format!("TDIM{colnum}"), value, &format!("TFORM{colnum}"));
    Ok(())
}

/// Build a new table unit with `nrows` blank rows.
pub fn new_table(
    tbltype: HduType,
    nrows: i64,
    ttype: &[String],
    tform: &[String],
    tunit: &[String],
    extname: &str,
) -> NativeResult<Unit> {
    if nrows < 0 {
        return Err(Status::NEG_ROWS);
    }
    let ascii = match tbltype {
        HduType::BinaryTable => false,
        HduType::AsciiTable => true,
        _ => return Err(Status::NOT_TABLE),
    };

    // (width, TBCOL) per column.
    let mut geometry = Vec::with_capacity(tform.len());
    let mut naxis1 = 0usize;
    for form in tform {
        if ascii {
            let (_, width) = parse_ascii_tform(form)?;
            let tbcol = if naxis1 == 0 { 1 } else { naxis1 + 2 };
            naxis1 = tbcol - 1 + width;
            geometry.push((width, tbcol));
        } else {
            let (repeat, kind) = parse_tform(form)?;
            let width = kind.row_bytes(repeat);
            geometry.push((width, naxis1 + 1));
            naxis1 += width;
        }
    }

    let xtension = if ascii { "TABLE" } else { "BINTABLE" };
    let mut cards = vec![
        Card::new("XTENSION", Value::String(String::from(xtension)), Some(if ascii { "ASCII table extension" } else { "binary table extension" })),
        Card::new("BITPIX", Value::Integer(8), Some("8-bit bytes")),
        Card::new("NAXIS", Value::Integer(2), Some("2-dimensional table")),
        Card::new("NAXIS1", Value::Integer(naxis1 as i64), Some("width of table in bytes")),
        Card::new("NAXIS2", Value::Integer(nrows), Some("number of rows in table")),
        Card::new("PCOUNT", Value::Integer(0), Some("size of special data area")),
        Card::new("GCOUNT", Value::Integer(1), Some("one data group")),
        Card::new("TFIELDS", Value::Integer(tform.len() as i64), Some("number of fields in each row")),
    ];
    for (i, form) in tform.iter().enumerate() {
        let n = i + 1;
        if let Some(name) = ttype.get(i).filter(|s| !s.is_empty()) {
            cards.push(Card::new(&format!("TTYPE{n}"), Value::String(name.clone()), Some(format!("label for field {n}").as_str())));
        }
        if ascii {
            cards.push(Card::new(&format!("TBCOL{n}"), Value::Integer(geometry[i].1 as i64), Some(format!("beginning column of field {n}").as_str())));
        }
        cards.push(Card::new(&format!("TFORM{n}"), Value::String(form.trim().to_string()), Some(format!("data format of field {n}").as_str())));
        if let Some(unit) = tunit.get(i).filter(|s| !s.is_empty()) {
            cards.push(Card::new(&format!("TUNIT{n}"), Value::String(unit.clone()), Some(format!("physical unit of field {n}").as_str())));
        }
    }
    if !extname.is_empty() {
        cards.push(Card::new("EXTNAME", Value::String(extname.to_string()), Some("name of this table extension")));
    }

    let fill = if ascii { b' ' } else { 0 };
    let rows = usize::try_from(nrows).map_err(|_| Status::MEMORY_ALLOCATION)?;
    Ok(Unit::new(cards, blank_rows(rows, naxis1, fill)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Unit {
        new_table(
            HduType::BinaryTable,
            3,
            &strings(&["FLUX", "FLAG", "NAME", "FLUX_ERR"]),
            &strings(&["2E", "L", "8A", "1D"]),
            &strings(&["Jy"]),
            "EVENTS",
        )
        .unwrap()
    }

    #[test]
    fn tform_parsing() {
        assert_eq!(parse_tform("1J"), Ok((1, ColumnKind::Int)));
        assert_eq!(parse_tform("E"), Ok((1, ColumnKind::Float)));
        assert_eq!(parse_tform("20A10"), Ok((20, ColumnKind::Text)));
        assert_eq!(
            parse_tform("1PE(8)"),
            Ok((1, ColumnKind::Variable { wide: false, element: b'E' }))
        );
        assert_eq!(parse_tform("3Z"), Err(Status::BAD_TFORM_DTYPE));
        assert_eq!(parse_tform(""), Err(Status::BAD_TFORM));
    }

    #[test]
    fn layout_of_new_table() {
        let unit = sample();
        let layout = TableLayout::of(&unit).unwrap();
        assert_eq!(layout.naxis1, 8 + 1 + 8 + 8);
        assert_eq!(layout.naxis2, 3);
        assert_eq!(layout.columns[2].offset, 9);
        assert_eq!(
            layout.column(3).unwrap().info(),
            ColumnInfo { typecode: 16, repeat: 8, width: 8 }
        );
        assert_eq!(layout.column(5), Err(Status::BAD_COL_NUM));
        assert_eq!(unit.string_key("TUNIT1").as_deref(), Some("Jy"));
    }

    #[test]
    fn column_lookup_templates() {
        let layout = TableLayout::of(&sample()).unwrap();
        assert_eq!(layout.lookup(false, "flag").unwrap().number, 2);
        let flux = layout.lookup(false, "FLUX*").unwrap();
        assert_eq!((flux.number, flux.unique), (1, false));
        assert_eq!(layout.lookup(true, "flag"), Err(Status::COL_NOT_FOUND));
        assert_eq!(layout.lookup(false, "NAM?").unwrap().name, "NAME");
    }

    #[test]
    fn vector_column_round_trip() {
        let mut unit = sample();
        let layout = TableLayout::of(&unit).unwrap();
        let values = ColumnData::Numeric(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        layout.write(&mut unit, DataType::Float, 1, 1, 2, &values).unwrap();
        let got = layout.read(&unit, DataType::Double, 1, 1, 1, 6, 0.0).unwrap();
        assert_eq!(got.values, ColumnData::Numeric(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]));
    }

    #[test]
    fn strings_and_logicals() {
        let mut unit = sample();
        let layout = TableLayout::of(&unit).unwrap();
        layout
            .write(&mut unit, DataType::String, 3, 2, 1, &ColumnData::Text(strings(&["vega", "a-much-too-long-name"])))
            .unwrap();
        let names = layout.read(&unit, DataType::String, 3, 1, 1, 3, 0.0).unwrap();
        assert_eq!(names.values, ColumnData::Text(strings(&["", "vega", "a-much-t"])));

        layout
            .write(&mut unit, DataType::Logical, 2, 1, 1, &ColumnData::Logical(vec![true, false]))
            .unwrap();
        let flags = layout.read(&unit, DataType::Logical, 2, 1, 1, 3, 0.0).unwrap();
        assert_eq!(flags.values, ColumnData::Logical(vec![true, false, false]));
        let numeric = layout.read(&unit, DataType::Int, 2, 1, 1, 3, -1.0).unwrap();
        assert_eq!(numeric.values, ColumnData::Numeric(vec![1.0, 0.0, -1.0]));
        assert!(numeric.any_null);
        assert_eq!(
            layout.read(&unit, DataType::Logical, 1, 1, 1, 1, 0.0),
            Err(Status::NOT_LOGICAL_COL)
        );
    }

    #[test]
    fn writing_past_the_end_extends_rows() {
        let mut unit = sample();
        let layout = TableLayout::of(&unit).unwrap();
        layout
            .write(&mut unit, DataType::Double, 4, 5, 1, &ColumnData::Numeric(vec![9.5]))
            .unwrap();
        let grown = TableLayout::of(&unit).unwrap();
        assert_eq!(grown.naxis2, 5);
        assert_eq!(unit.data.len(), 5 * grown.naxis1);
        let got = grown.read(&unit, DataType::Double, 4, 5, 1, 1, 0.0).unwrap();
        assert_eq!(got.values, ColumnData::Numeric(vec![9.5]));
    }

    #[test]
    fn reading_past_the_end_fails() {
        let unit = sample();
        let layout = TableLayout::of(&unit).unwrap();
        assert_eq!(
            layout.read(&unit, DataType::Double, 4, 3, 1, 2, 0.0),
            Err(Status::BAD_ROW_NUM)
        );
        assert_eq!(
            layout.read(&unit, DataType::Double, 1, 1, 3, 1, 0.0),
            Err(Status::BAD_ELEM_NUM)
        );
    }

    #[test]
    fn row_editing() {
        let mut unit = sample();
        let layout = TableLayout::of(&unit).unwrap();
        layout
            .write(&mut unit, DataType::Double, 4, 1, 1, &ColumnData::Numeric(vec![1.0, 2.0, 3.0]))
            .unwrap();
        insert_rows(&mut unit, 1, 2).unwrap();
        delete_row_list(&mut unit, &[1, 5]).unwrap();
        let layout = TableLayout::of(&unit).unwrap();
        let got = layout.read(&unit, DataType::Double, 4, 1, 1, 3, 0.0).unwrap();
        assert_eq!(got.values, ColumnData::Numeric(vec![0.0, 0.0, 2.0]));
        delete_rows(&mut unit, 1, 2).unwrap();
        assert_eq!(unit.int_key("NAXIS2"), Some(1));
        assert_eq!(delete_rows(&mut unit, 1, 2), Err(Status::BAD_ROW_NUM));
        assert_eq!(delete_row_list(&mut unit, &[1, 1]), Err(Status::BAD_ROW_NUM));
        assert_eq!(insert_rows(&mut unit, 0, -1), Err(Status::NEG_ROWS));
    }

    #[test]
    fn oversized_reads_fail_before_allocating() {
        let unit = new_table(
            HduType::BinaryTable,
            2,
            &strings(&["X"]),
            &strings(&["1D"]),
            &[],
            "",
        )
        .unwrap();
        let layout = TableLayout::of(&unit).unwrap();
        assert_eq!(
            layout.read(&unit, DataType::Double, 1, 1, 1, 1 << 40, 0.0),
            Err(Status::BAD_ROW_NUM)
        );
        assert_eq!(
            layout.read(&unit, DataType::Double, 1, i64::MAX, 1, 1, 0.0),
            Err(Status::BAD_ROW_NUM)
        );
        assert_eq!(
            layout.read(&unit, DataType::Double, 1, i64::MIN, 1, 1, 0.0),
            Err(Status::BAD_ROW_NUM)
        );
    }

    #[test]
    fn zero_width_columns_hold_no_elements() {
        let mut unit = new_table(
            HduType::BinaryTable,
            2,
            &strings(&["ID", "EMPTY"]),
            &strings(&["1J", "0D"]),
            &[],
            "",
        )
        .unwrap();
        let layout = TableLayout::of(&unit).unwrap();
        assert_eq!(layout.naxis1, 4);
        assert_eq!(
            layout.read(&unit, DataType::Double, 2, 1, 1, 1, 0.0),
            Err(Status::BAD_ELEM_NUM)
        );
        let none = layout.read(&unit, DataType::Double, 2, 1, 1, 0, 0.0).unwrap();
        assert_eq!(none.values, ColumnData::Numeric(vec![]));
        assert_eq!(
            layout.write(&mut unit, DataType::Double, 2, 1, 1, &ColumnData::Numeric(vec![1.0])),
            Err(Status::BAD_ELEM_NUM)
        );
        assert_eq!(unit.int_key("NAXIS2"), Some(2));
    }

    #[test]
    fn row_counts_are_range_checked() {
        let mut unit = sample();
        assert_eq!(delete_rows(&mut unit, 2, i64::MAX), Err(Status::BAD_ROW_NUM));
        assert_eq!(delete_rows(&mut unit, i64::MAX, 1), Err(Status::BAD_ROW_NUM));
        assert_eq!(insert_rows(&mut unit, 0, i64::MAX), Err(Status::MEMORY_ALLOCATION));
        assert_eq!(insert_rows(&mut unit, 0, 1 << 45), Err(Status::MEMORY_ALLOCATION));
        assert_eq!(unit.int_key("NAXIS2"), Some(3));
        assert_eq!(unit.data.len(), 3 * TableLayout::of(&unit).unwrap().naxis1);

        let columns = strings(&["X"]);
        let forms = strings(&["1D"]);
        assert_eq!(
            new_table(HduType::BinaryTable, i64::MAX, &columns, &forms, &[], "").err(),
            Some(Status::MEMORY_ALLOCATION)
        );
    }

    #[test]
    fn column_insert_and_delete_renumber_keywords() {
        let mut unit = sample();
        let layout = TableLayout::of(&unit).unwrap();
        layout
            .write(&mut unit, DataType::Double, 4, 1, 1, &ColumnData::Numeric(vec![7.0]))
            .unwrap();

        insert_column(&mut unit, 1, "TIME", "1K").unwrap();
        assert_eq!(unit.string_key("TTYPE1").as_deref(), Some("TIME"));
        assert_eq!(unit.string_key("TTYPE2").as_deref(), Some("FLUX"));
        assert_eq!(unit.string_key("TUNIT2").as_deref(), Some("Jy"));
        assert_eq!(unit.int_key("TFIELDS"), Some(5));
        let layout = TableLayout::of(&unit).unwrap();
        let got = layout.read(&unit, DataType::Double, 5, 1, 1, 1, 0.0).unwrap();
        assert_eq!(got.values, ColumnData::Numeric(vec![7.0]));

        delete_column(&mut unit, 2).unwrap();
        assert_eq!(unit.string_key("TTYPE2").as_deref(), Some("FLAG"));
        assert!(unit.card("TUNIT1").is_none());
        let layout = TableLayout::of(&unit).unwrap();
        assert_eq!(layout.columns.len(), 4);
        let got = layout.read(&unit, DataType::Double, 4, 1, 1, 1, 0.0).unwrap();
        assert_eq!(got.values, ColumnData::Numeric(vec![7.0]));
        assert_eq!(insert_column(&mut unit, 9, "X", "1J"), Err(Status::BAD_COL_NUM));
    }

    #[test]
    fn vector_length_change() {
        let mut unit = sample();
        let layout = TableLayout::of(&unit).unwrap();
        layout
            .write(&mut unit, DataType::Float, 1, 1, 1, &ColumnData::Numeric(vec![1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        modify_vector_len(&mut unit, 1, 3).unwrap();
        assert_eq!(unit.string_key("TFORM1").as_deref(), Some("3E"));
        let layout = TableLayout::of(&unit).unwrap();
        let got = layout.read(&unit, DataType::Float, 1, 1, 1, 6, 0.0).unwrap();
        assert_eq!(got.values, ColumnData::Numeric(vec![1.0, 2.0, 0.0, 3.0, 4.0, 0.0]));
    }

    #[test]
    fn tdim_keywords() {
        let mut unit = sample();
        assert_eq!(read_tdim(&unit, 1), Ok(vec![2]));
        assert_eq!(write_tdim(&mut unit, 3, &[2, 3]), Err(Status::BAD_TDIM));
        write_tdim(&mut unit, 3, &[2, 4]).unwrap();
        assert_eq!(read_tdim(&unit, 3), Ok(vec![2, 4]));
        let tform = unit.position("TFORM3").unwrap();
        assert_eq!(unit.position("TDIM3"), Some(tform + 1));
    }

    #[test]
    fn ascii_tables_describe_but_do_not_transfer() {
        let unit = new_table(
            HduType::AsciiTable,
            2,
            &strings(&["ID", "RA"]),
            &strings(&["I6", "F10.4"]),
            &[],
            "",
        )
        .unwrap();
        assert_eq!(unit.int_key("NAXIS1"), Some(17));
        assert_eq!(unit.int_key("TBCOL2"), Some(8));
        let layout = TableLayout::of(&unit).unwrap();
        assert_eq!(layout.hdu_type, HduType::AsciiTable);
        assert_eq!(layout.column(2).unwrap().info().typecode, 42);
        assert_eq!(TableLayout::binary(&unit), Err(Status::NOT_BTABLE));
    }

    #[test]
    fn images_are_not_tables() {
        assert_eq!(TableLayout::of(&Unit::null_primary()), Err(Status::NOT_TABLE));
    }
}
