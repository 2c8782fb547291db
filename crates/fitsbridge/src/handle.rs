//! The owned FITS handle.
//!
//! A [`FitsHandle`] wraps one native stream. The stream is present exactly
//! while the handle is open; [`close`](FitsHandle::close),
//! [`delete`](FitsHandle::delete) and `Drop` take it out, so it is released
//! once and only once. Every operation that needs the stream goes through
//! [`access`](FitsHandle::access), which fails on a closed handle instead of
//! touching a released resource.

use core::fmt;

use crate::error::{Error, Result};
use crate::native::FitsStream;
use crate::status::{Release, FITS};

/// Host-visible wrapper that exclusively owns one native FITS stream.
pub struct FitsHandle {
    stream: Option<Box<dyn FitsStream>>,
}

impl FitsHandle {
    /// Wrap a freshly opened stream.
    pub fn new(stream: Box<dyn FitsStream>) -> Self {
        FitsHandle {
            stream: Some(stream),
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// The live stream, or [`Error::Closed`].
    pub fn access(&mut self) -> Result<&mut dyn FitsStream> {
        match self.stream.as_mut() {
            Some(stream) => Ok(stream.as_mut()),
            None => Err(Error::Closed),
        }
    }

    /// Shared view of the live stream, or [`Error::Closed`].
    pub fn access_ref(&self) -> Result<&dyn FitsStream> {
        self.stream.as_deref().ok_or(Error::Closed)
    }

    /// Close the stream.
    ///
    /// Never fails: closing twice and native close failures are reported as
    /// warnings, and the handle is closed afterwards in every case.
    pub fn close(&mut self) -> Release {
        let outcome = match self.stream.take() {
            None => Release::AlreadyClosed,
            Some(stream) => match stream.close() {
                Ok(()) => Release::Closed,
                Err(status) => Release::ClosedWithError(status),
            },
        };
        FITS.report_release("close file", outcome)
    }

    /// Close the stream and remove the underlying file. Same contract as
    /// [`close`](Self::close).
    pub fn delete(&mut self) -> Release {
        let outcome = match self.stream.take() {
            None => Release::AlreadyClosed,
            Some(stream) => match stream.delete() {
                Ok(()) => Release::Closed,
                Err(status) => Release::ClosedWithError(status),
            },
        };
        FITS.report_release("delete file", outcome)
    }

    /// Human-readable summary of the handle. Never fails.
    pub fn describe(&self) -> String {
        let Some(stream) = self.stream.as_deref() else {
            return String::from("empty FITS handle (closed FITS stream)");
        };
        let marker = stream.io_mode().map(|m| m.marker()).unwrap_or("unknown");
        let name = stream.file_name().unwrap_or_default();
        let total = stream.num_hdus().unwrap_or(0);
        format!(
            "{marker} FITS handle (FITS stream):\n{name}\n  CURRENT HDU: {} over {total}",
            stream.hdu_num()
        )
    }
}

impl fmt::Display for FitsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Debug for FitsHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FitsHandle")
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for FitsHandle {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(status) = stream.close() {
                log::warn!("{}", FITS.release_warning("close file", status));
            }
        }
    }
}
