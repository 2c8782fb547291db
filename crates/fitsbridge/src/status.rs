//! CFITSIO status codes and the propagator that turns them into errors.
//!
//! Every native call yields a [`Status`]. Zero is success, a short allow-list
//! of "not found" codes is data, and everything else is fatal: the
//! [`Propagator`] converts it into an [`Error`] carrying the component name,
//! the numeric code and the library's description of it.

use core::fmt;

use crate::error::{Error, Result};

/// Integer status produced by a native FITS call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Status(pub i32);

/// Result of a native call: the value, or the non-zero status it failed with.
pub type NativeResult<T> = core::result::Result<T, Status>;

impl Status {
    pub const OK: Status = Status(0);
    pub const FILE_NOT_OPENED: Status = Status(104);
    pub const FILE_NOT_CREATED: Status = Status(105);
    pub const WRITE_ERROR: Status = Status(106);
    pub const END_OF_FILE: Status = Status(107);
    pub const READ_ERROR: Status = Status(108);
    pub const FILE_NOT_CLOSED: Status = Status(110);
    pub const READONLY_FILE: Status = Status(112);
    pub const MEMORY_ALLOCATION: Status = Status(113);
    pub const BAD_FILEPTR: Status = Status(114);
    pub const NULL_INPUT_PTR: Status = Status(115);
    pub const HEADER_NOT_EMPTY: Status = Status(201);
    pub const KEY_NO_EXIST: Status = Status(202);
    pub const KEY_OUT_BOUNDS: Status = Status(203);
    pub const VALUE_UNDEFINED: Status = Status(204);
    pub const NO_QUOTE: Status = Status(205);
    pub const BAD_KEYCHAR: Status = Status(207);
    pub const BAD_ORDER: Status = Status(208);
    pub const NOT_POS_INT: Status = Status(209);
    pub const NO_END: Status = Status(210);
    pub const BAD_BITPIX: Status = Status(211);
    pub const BAD_NAXIS: Status = Status(212);
    pub const BAD_NAXES: Status = Status(213);
    pub const BAD_PCOUNT: Status = Status(214);
    pub const BAD_GCOUNT: Status = Status(215);
    pub const BAD_TFIELDS: Status = Status(216);
    pub const NEG_ROWS: Status = Status(218);
    pub const COL_NOT_FOUND: Status = Status(219);
    pub const BAD_SIMPLE: Status = Status(220);
    pub const NO_SIMPLE: Status = Status(221);
    pub const NO_XTENSION: Status = Status(225);
    pub const NOT_BTABLE: Status = Status(227);
    pub const NO_TFORM: Status = Status(232);
    pub const NOT_IMAGE: Status = Status(233);
    pub const NOT_TABLE: Status = Status(235);
    pub const COL_NOT_UNIQUE: Status = Status(237);
    pub const BAD_ROW_WIDTH: Status = Status(241);
    pub const UNKNOWN_EXT: Status = Status(251);
    pub const UNKNOWN_REC: Status = Status(252);
    pub const BAD_TFORM: Status = Status(261);
    pub const BAD_TFORM_DTYPE: Status = Status(262);
    pub const BAD_TDIM: Status = Status(263);
    pub const BAD_HDU_NUM: Status = Status(301);
    pub const BAD_COL_NUM: Status = Status(302);
    pub const BAD_ROW_NUM: Status = Status(307);
    pub const BAD_ELEM_NUM: Status = Status(308);
    pub const NOT_LOGICAL_COL: Status = Status(310);
    pub const BAD_DIMEN: Status = Status(320);
    pub const BAD_PIX_NUM: Status = Status(321);
    pub const NEG_AXIS: Status = Status(323);
    pub const BAD_INTKEY: Status = Status(403);
    pub const BAD_LOGICALKEY: Status = Status(404);
    pub const BAD_DOUBLEKEY: Status = Status(406);
    pub const BAD_DATATYPE: Status = Status(410);
    pub const NUM_OVERFLOW: Status = Status(412);

    /// Codes that describe an expected absence rather than a failure.
    pub const BENIGN: [Status; 3] = [Self::KEY_NO_EXIST, Self::COL_NOT_FOUND, Self::COL_NOT_UNIQUE];

    /// Raw integer value.
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Returns `true` for the zero status.
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the code is on the benign allow-list.
    pub fn is_benign(self) -> bool {
        Self::BENIGN.contains(&self)
    }

    /// Returns `true` if the code must abort the calling operation.
    pub fn is_fatal(self) -> bool {
        !self.is_ok() && !self.is_benign()
    }

    /// Short description of the code, as CFITSIO's `fits_get_errstatus`
    /// reports it.
    pub fn text(self) -> &'static str {
        match self.0 {
            0 => "OK - no error",
            104 => "could not open the named file",
            105 => "couldn't create the named file",
            106 => "error writing to FITS file",
            107 => "tried to move past end of file",
            108 => "error reading from FITS file",
            110 => "could not close the file",
            112 => "Cannot write to readonly file",
            113 => "Could not allocate memory",
            114 => "invalid fitsfile pointer",
            115 => "NULL input pointer",
            201 => "header already contains keywords",
            202 => "keyword not found in header",
            203 => "keyword record number is out of bounds",
            204 => "keyword value field is blank",
            205 => "string is missing the closing quote",
            207 => "illegal character in keyword name or card",
            208 => "required keywords out of order",
            209 => "keyword value is not a positive integer",
            210 => "couldn't find END keyword",
            211 => "illegal BITPIX keyword value",
            212 => "illegal NAXIS keyword value",
            213 => "illegal NAXISn keyword value",
            214 => "illegal PCOUNT keyword value",
            215 => "illegal GCOUNT keyword value",
            216 => "illegal TFIELDS keyword value",
            218 => "negative number of rows in table",
            219 => "named column not found",
            220 => "illegal value of SIMPLE keyword",
            221 => "Primary array doesn't start with SIMPLE",
            225 => "HDU doesn't start with XTENSION keyword",
            227 => "the CHDU is not a binary table extension",
            232 => "couldn't find TFORMn keyword",
            233 => "the CHDU is not an IMAGE extension",
            235 => "the CHDU is not a table",
            237 => "more than 1 column name matches template",
            241 => "sum of column widths not = NAXIS1",
            251 => "unrecognizable FITS extension type",
            252 => "unknown record; 1st keyword not SIMPLE or XTENSION",
            261 => "illegal TFORM format code",
            262 => "unrecognizable TFORM datatype code",
            263 => "illegal TDIMn keyword value",
            301 => "illegal HDU number",
            302 => "column number < 1 or > tfields",
            307 => "illegal starting row number in table",
            308 => "illegal starting element number in vector",
            310 => "this is not a logical datatype column",
            320 => "illegal number of dimensions in array",
            321 => "first pixel number greater than last pixel",
            323 => "illegal axis length < 1",
            403 => "can't interpret keyword value as integer",
            404 => "can't interpret keyword value as logical",
            406 => "can't interpret keyword value as double",
            410 => "illegal datatype code value",
            412 => "numerical overflow during type conversion",
            _ => "unknown error status",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.0, self.text())
    }
}

/// Outcome of releasing a native stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The stream was open and has been released cleanly.
    Closed,
    /// The handle was already closed; nothing was released.
    AlreadyClosed,
    /// The stream was released but the native call reported a failure.
    /// The handle is closed regardless.
    ClosedWithError(Status),
}

/// Checks native status codes on behalf of one named component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Propagator {
    component: &'static str,
}

/// The propagator used by the FITS handle and the host builtins.
pub const FITS: Propagator = Propagator::new("fitsbridge");

impl Propagator {
    pub const fn new(component: &'static str) -> Self {
        Propagator { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Pass zero and benign codes through; raise every other code.
    pub fn check(&self, status: Status) -> Result<Status> {
        if status.is_fatal() {
            return Err(Error::Status {
                component: self.component,
                status,
            });
        }
        Ok(status)
    }

    /// [`check`](Self::check), then hand back the raw code so the caller can
    /// surface it as a value.
    pub fn check_and_return(&self, status: Status) -> Result<i32> {
        self.check(status).map(Status::code)
    }

    /// Run a native result through [`check`](Self::check).
    ///
    /// The value is `None` when the call ended with a benign code.
    pub fn settle<T>(&self, result: NativeResult<T>) -> Result<(Option<T>, Status)> {
        match result {
            Ok(value) => Ok((Some(value), Status::OK)),
            Err(status) => self.check(status).map(|s| (None, s)),
        }
    }

    /// Like [`settle`](Self::settle) for calls whose only product is the status.
    pub fn settle_unit(&self, result: NativeResult<()>) -> Result<Status> {
        self.settle(result).map(|(_, s)| s)
    }

    /// Format the warning emitted when a release call fails.
    pub fn release_warning(&self, action: &str, status: Status) -> String {
        format!("{} cannot {}\n {}", self.component, action, status)
    }

    /// Log the outcome of a release. Returns the outcome unchanged.
    pub fn report_release(&self, action: &str, outcome: Release) -> Release {
        match outcome {
            Release::Closed => log::debug!("{}: {} done", self.component, action),
            Release::AlreadyClosed => {
                log::warn!("{}: FITS handle was already closed", self.component)
            }
            Release::ClosedWithError(status) => {
                log::warn!("{}", self.release_warning(action, status))
            }
        }
        outcome
    }
}
