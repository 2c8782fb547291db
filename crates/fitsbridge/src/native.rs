//! The native FITS library surface.
//!
//! [`FitsLibrary`] opens and creates streams; [`FitsStream`] carries one
//! method per forwarded CFITSIO routine. Every call reports failure as a
//! [`Status`] so callers can run it through a
//! [`Propagator`](crate::status::Propagator). Both traits are object-safe:
//! handles hold a `Box<dyn FitsStream>` and never know which engine is
//! behind it.

use crate::status::{NativeResult, Status};
use crate::value::Value;

/// Longest file name accepted by the native layer (CFITSIO's `FLEN_FILENAME`).
pub const MAX_NAME_LEN: usize = 1025;

/// File access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoMode {
    ReadOnly = 0,
    ReadWrite = 1,
}

impl IoMode {
    pub fn from_code(code: i64) -> NativeResult<Self> {
        match code {
            0 => Ok(IoMode::ReadOnly),
            1 => Ok(IoMode::ReadWrite),
            _ => Err(Status::FILE_NOT_OPENED),
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// The marker used when describing a handle.
    pub fn marker(self) -> &'static str {
        match self {
            IoMode::ReadOnly => "readonly",
            IoMode::ReadWrite => "readwrite",
        }
    }
}

/// HDU kind, with CFITSIO's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduType {
    Image = 0,
    AsciiTable = 1,
    BinaryTable = 2,
    Any = -1,
}

impl HduType {
    pub fn from_code(code: i64) -> NativeResult<Self> {
        match code {
            0 => Ok(HduType::Image),
            1 => Ok(HduType::AsciiTable),
            2 => Ok(HduType::BinaryTable),
            -1 => Ok(HduType::Any),
            _ => Err(Status::NOT_TABLE),
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

/// CFITSIO datatype codes used to select the conversion of a read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Byte = 11,
    Logical = 14,
    String = 16,
    Short = 21,
    Int = 31,
    Long = 41,
    Float = 42,
    LongLong = 81,
    Double = 82,
}

impl DataType {
    pub fn from_code(code: i64) -> NativeResult<Self> {
        Ok(match code {
            11 => DataType::Byte,
            14 => DataType::Logical,
            16 => DataType::String,
            21 => DataType::Short,
            31 => DataType::Int,
            41 => DataType::Long,
            42 => DataType::Float,
            81 => DataType::LongLong,
            82 => DataType::Double,
            _ => return Err(Status::BAD_DATATYPE),
        })
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Returns `true` for the integer datatypes.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Byte | DataType::Short | DataType::Int | DataType::Long | DataType::LongLong
        )
    }

    /// Inclusive range representable by an integer datatype.
    pub fn integer_range(self) -> Option<(f64, f64)> {
        match self {
            DataType::Byte => Some((0.0, u8::MAX as f64)),
            DataType::Short => Some((i16::MIN as f64, i16::MAX as f64)),
            DataType::Int => Some((i32::MIN as f64, i32::MAX as f64)),
            DataType::Long | DataType::LongLong => Some((i64::MIN as f64, i64::MAX as f64)),
            _ => None,
        }
    }

    /// Convert a number into this datatype the way CFITSIO's read routines
    /// do: integers truncate toward zero and overflow is an error.
    pub fn convert(self, x: f64) -> NativeResult<f64> {
        match self.integer_range() {
            Some((lo, hi)) => {
                if x.is_nan() {
                    return Err(Status::NUM_OVERFLOW);
                }
                let t = x.trunc();
                if t < lo || t > hi {
                    return Err(Status::NUM_OVERFLOW);
                }
                Ok(t)
            }
            None if self == DataType::Float => Ok(x as f32 as f64),
            None => Ok(x),
        }
    }

    /// Coerce a keyword value into this datatype.
    pub fn coerce_key(self, value: &Value) -> NativeResult<Value> {
        match self {
            DataType::String => Ok(Value::String(value.to_key_string())),
            DataType::Logical => match value {
                Value::Logical(b) => Ok(Value::Logical(*b)),
                Value::Integer(n) => Ok(Value::Logical(*n != 0)),
                Value::String(s) if s == "T" || s == "F" => Ok(Value::Logical(s == "T")),
                _ => Err(Status::BAD_LOGICALKEY),
            },
            DataType::Float | DataType::Double => match value {
                Value::Complex(..) => Ok(value.clone()),
                Value::String(s) => s
                    .trim()
                    .replace(['D', 'd'], "E")
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| Status::BAD_DOUBLEKEY),
                _ => value
                    .as_f64()
                    .map(|f| Value::Float(if self == DataType::Float { f as f32 as f64 } else { f }))
                    .ok_or(Status::BAD_DOUBLEKEY),
            },
            _ => {
                let n = match value {
                    Value::String(s) => s.trim().parse::<i64>().map_err(|_| Status::BAD_INTKEY)?,
                    _ => value.as_i64().ok_or(Status::BAD_INTKEY)?,
                };
                self.convert(n as f64)?;
                Ok(Value::Integer(n))
            }
        }
    }
}

/// Column type description returned by [`FitsStream::column_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    /// CFITSIO datatype code of the column's elements (negative for
    /// variable-length descriptors).
    pub typecode: i32,
    /// Vector length of the column.
    pub repeat: i64,
    /// Width in bytes of one element (or of the whole string for `A`).
    pub width: i64,
}

/// Result of a column-name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch {
    /// 1-based number of the first matching column.
    pub number: i32,
    /// Its TTYPEn value.
    pub name: String,
    /// `false` when more than one column matched the template.
    pub unique: bool,
}

impl ColumnMatch {
    /// The status CFITSIO attaches to this lookup.
    pub fn status(&self) -> Status {
        if self.unique {
            Status::OK
        } else {
            Status::COL_NOT_UNIQUE
        }
    }
}

/// Values read from or written to a table column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Logical(Vec<bool>),
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Logical(v) => v.len(),
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output of a pixel or column read: the values and whether any of them was
/// undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct Samples<T> {
    pub values: T,
    pub any_null: bool,
}

/// Entry point of a native FITS implementation.
pub trait FitsLibrary {
    /// Open an existing file (CFITSIO `ffopen`).
    fn open(&self, name: &str, mode: IoMode) -> NativeResult<Box<dyn FitsStream>>;
    /// Create a new, empty file (`ffinit`).
    fn create(&self, name: &str) -> NativeResult<Box<dyn FitsStream>>;
    /// Whether a file exists (`ffexist`). Returns CFITSIO's code: 1 for a
    /// plain file, 0 when absent.
    fn exists(&self, name: &str) -> NativeResult<i32>;
    /// Library version number (`ffvers`).
    fn version(&self) -> f32;
    /// Pop the oldest message from the error stack (`ffgmsg`).
    fn next_message(&self) -> Option<String>;
}

/// An open FITS file. One method per forwarded CFITSIO routine.
///
/// Element, row, column, HDU and record numbers are 1-based as in CFITSIO.
pub trait FitsStream {
    // ── Files ──

    /// Name the file was opened with (`ffflnm`).
    fn file_name(&self) -> NativeResult<String>;
    /// Access protocol of the file (`ffurlt`).
    fn url_type(&self) -> NativeResult<String>;
    /// Mode the file was opened with (`ffflmd`).
    fn io_mode(&self) -> NativeResult<IoMode>;

    // ── Header writing ──

    /// Append a keyword (`ffpky`).
    fn write_key(
        &mut self,
        datatype: DataType,
        keyname: &str,
        value: &Value,
        comment: &str,
    ) -> NativeResult<()>;
    /// Append a COMMENT record (`ffpcom`).
    fn write_comment(&mut self, text: &str) -> NativeResult<()>;
    /// Set the physical unit of a keyword (`ffpunt`).
    fn write_key_unit(&mut self, keyname: &str, unit: &str) -> NativeResult<()>;
    /// Append a HISTORY record (`ffphis`).
    fn write_history(&mut self, text: &str) -> NativeResult<()>;
    /// Write or update DATE with the current UTC date (`ffpdat`).
    fn write_date(&mut self) -> NativeResult<()>;
    /// Compute and write DATASUM and CHECKSUM (`ffpcks`).
    fn write_checksum(&mut self) -> NativeResult<()>;
    /// Write the TDIMn keyword of a column (`ffptdm`).
    fn write_tdim(&mut self, colnum: i32, naxes: &[i64]) -> NativeResult<()>;

    // ── Header reading ──

    /// Number of existing keywords and of free card slots (`ffghsp`).
    fn header_space(&self) -> NativeResult<(i32, i32)>;
    /// Next card matching `include` and not `exclude` (`ffgnxk`).
    fn next_key(&mut self, include: &[String], exclude: &[String]) -> NativeResult<String>;
    /// Card at record number `nrec`; 0 rewinds the header cursor (`ffgrec`).
    fn read_record(&mut self, nrec: i32) -> NativeResult<String>;
    /// Card of a named keyword (`ffgcrd`).
    fn read_card(&mut self, keyname: &str) -> NativeResult<String>;
    /// Physical unit of a keyword, from the `[unit]` comment prefix (`ffgunt`).
    fn read_key_unit(&mut self, keyname: &str) -> NativeResult<String>;
    /// Value and comment of a keyword, converted to `datatype` (`ffgky`).
    fn read_key(&mut self, datatype: DataType, keyname: &str)
        -> NativeResult<(Value, String)>;
    /// Dimensions of a column from TDIMn, or its repeat count when TDIMn is
    /// absent (`ffgtdm`).
    fn read_tdim(&self, colnum: i32) -> NativeResult<Vec<i64>>;

    // ── Header editing ──

    /// Update a keyword or append it if absent (`ffuky`).
    fn update_key(
        &mut self,
        datatype: DataType,
        keyname: &str,
        value: &Value,
        comment: &str,
    ) -> NativeResult<()>;
    /// Update a keyword with an undefined value (`ffukyu`).
    fn update_key_null(&mut self, keyname: &str, comment: &str) -> NativeResult<()>;
    /// Rename a keyword (`ffmnam`).
    fn rename_key(&mut self, oldname: &str, newname: &str) -> NativeResult<()>;
    /// Replace the comment of a keyword (`ffmcom`).
    fn modify_comment(&mut self, keyname: &str, comment: &str) -> NativeResult<()>;
    /// Delete a keyword by name (`ffdkey`).
    fn delete_key(&mut self, keyname: &str) -> NativeResult<()>;
    /// Delete a keyword by record number (`ffdrec`).
    fn delete_record(&mut self, keynum: i32) -> NativeResult<()>;

    // ── HDUs ──

    /// Number of the current HDU (`ffghdn`). Never fails.
    fn hdu_num(&self) -> i32;
    /// Type of the current HDU (`ffghdt`).
    fn hdu_type(&self) -> NativeResult<HduType>;
    /// Delete the current HDU and return the type of the new current one
    /// (`ffdhdu`).
    fn delete_hdu(&mut self) -> NativeResult<HduType>;
    /// BITPIX of the current image (`ffgidt`).
    fn image_type(&self) -> NativeResult<i32>;
    /// NAXIS of the current image (`ffgidm`).
    fn image_dim(&self) -> NativeResult<i32>;
    /// NAXISn of the current image (`ffgisz`).
    fn image_size(&self) -> NativeResult<Vec<i64>>;
    /// Move to an absolute HDU number (`ffmahd`).
    fn move_abs_hdu(&mut self, hdunum: i32) -> NativeResult<HduType>;
    /// Move by a relative HDU offset (`ffmrhd`).
    fn move_rel_hdu(&mut self, offset: i32) -> NativeResult<HduType>;
    /// Move to the HDU whose EXTNAME (or HDUNAME) matches (`ffmnhd`).
    /// `extver` 0 matches any version.
    fn move_named_hdu(&mut self, hdutype: HduType, extname: &str, extver: i32)
        -> NativeResult<()>;
    /// Total number of HDUs (`ffthdu`).
    fn num_hdus(&self) -> NativeResult<i32>;
    /// Append an image HDU and make it current (`ffcrim`).
    fn create_image(&mut self, bitpix: i32, naxes: &[i64]) -> NativeResult<()>;
    /// Append a table HDU and make it current (`ffcrtb`).
    fn create_table(
        &mut self,
        tbltype: HduType,
        nrows: i64,
        ttype: &[String],
        tform: &[String],
        tunit: &[String],
        extname: &str,
    ) -> NativeResult<()>;

    // ── Tables ──

    /// Column matching a name template (`ffgcno` / `ffgcnn`).
    fn column_lookup(&mut self, case_sensitive: bool, template: &str)
        -> NativeResult<ColumnMatch>;
    /// Type, repeat and width of a column (`ffgtcl`).
    fn column_type(&self, colnum: i32) -> NativeResult<ColumnInfo>;
    /// Number of columns (`ffgncl`).
    fn num_cols(&self) -> NativeResult<i32>;
    /// Number of rows (`ffgnrw`).
    fn num_rows(&self) -> NativeResult<i64>;

    // ── Data ──

    /// Read `nelem` pixels starting at the pixel coordinates `firstpix`
    /// (`ffgpxv`). Undefined pixels are replaced by `nulval` unless it is 0.
    fn read_pixels(
        &self,
        datatype: DataType,
        firstpix: &[i64],
        nelem: i64,
        nulval: f64,
    ) -> NativeResult<Samples<Vec<f64>>>;
    /// Read a strided rectangular subset (`ffgsv`).
    fn read_subset(
        &self,
        datatype: DataType,
        fpixel: &[i64],
        lpixel: &[i64],
        inc: &[i64],
        nulval: f64,
    ) -> NativeResult<Samples<Vec<f64>>>;
    /// Read `nelem` pixels starting at linear element `firstelem` (`ffgpv`).
    fn read_elements(
        &self,
        datatype: DataType,
        firstelem: i64,
        nelem: i64,
        nulval: f64,
    ) -> NativeResult<Samples<Vec<f64>>>;
    /// Read `nelem` elements of a column (`ffgcv`).
    fn read_column(
        &self,
        datatype: DataType,
        colnum: i32,
        firstrow: i64,
        firstelem: i64,
        nelem: i64,
        nulval: f64,
    ) -> NativeResult<Samples<ColumnData>>;
    /// Write pixels starting at the pixel coordinates `firstpix` (`ffppx`).
    fn write_pixels(&mut self, datatype: DataType, firstpix: &[i64], values: &[f64])
        -> NativeResult<()>;
    /// Write elements of a column (`ffpcl`).
    fn write_column(
        &mut self,
        datatype: DataType,
        colnum: i32,
        firstrow: i64,
        firstelem: i64,
        data: &ColumnData,
    ) -> NativeResult<()>;
    /// Insert `nrows` blank rows after row `firstrow` (`ffirow`).
    fn insert_rows(&mut self, firstrow: i64, nrows: i64) -> NativeResult<()>;
    /// Delete `nrows` rows starting at `firstrow` (`ffdrow`).
    fn delete_rows(&mut self, firstrow: i64, nrows: i64) -> NativeResult<()>;
    /// Delete a list of rows (`ffdrws`).
    fn delete_row_list(&mut self, rows: &[i64]) -> NativeResult<()>;
    /// Insert one column at position `colnum` (`fficol`).
    fn insert_column(&mut self, colnum: i32, ttype: &str, tform: &str) -> NativeResult<()>;
    /// Insert several columns starting at position `colnum` (`fficls`).
    fn insert_columns(&mut self, colnum: i32, ttype: &[String], tform: &[String])
        -> NativeResult<()>;
    /// Change the vector length of a column (`ffmvec`).
    fn modify_vector_len(&mut self, colnum: i32, newveclen: i64) -> NativeResult<()>;
    /// Delete a column (`ffdcol`).
    fn delete_column(&mut self, colnum: i32) -> NativeResult<()>;

    // ── Release ──

    /// Flush and close (`ffclos`).
    fn close(self: Box<Self>) -> NativeResult<()>;
    /// Close and remove the file (`ffdelt`).
    fn delete(self: Box<Self>) -> NativeResult<()>;
}
