use thiserror::Error;

use crate::native::MAX_NAME_LEN;
use crate::status::Status;

/// All errors raised by the bridge.
#[derive(Debug, Error)]
pub enum Error {
    /// A native call ended with a fatal status.
    #[error("{component}\n {status}")]
    Status {
        /// Name of the component that checked the status.
        component: &'static str,
        /// The offending code.
        status: Status,
    },
    /// A file name exceeded [`MAX_NAME_LEN`]. Raised before any native call.
    #[error("filename string too long")]
    NameTooLong(usize),
    /// The handle has already been closed or deleted.
    #[error("empty FITS handle (FITS stream closed?)")]
    Closed,
}

impl Error {
    /// The status carried by a propagated native error.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Reject names longer than the native layer accepts.
pub fn check_name(name: &str) -> Result<&str> {
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong(name.len()));
    }
    Ok(name)
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
