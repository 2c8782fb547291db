//! Owned FITS handles over a pure Rust FITS engine, with CFITSIO status
//! codes and their propagation rules.
//!
//! The [`native`] module defines the library surface as two object-safe
//! traits; [`engine::DiskLibrary`] implements them on plain files. A
//! [`FitsHandle`] owns one open stream and guarantees it is released exactly
//! once, and [`status::Propagator`] turns non-zero status codes into
//! [`Error`]s unless they are on the benign allow-list.

pub mod block;
pub mod engine;
pub mod error;
pub mod handle;
pub mod header;
pub mod native;
pub mod status;
pub mod value;

pub use block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE};
pub use engine::DiskLibrary;
pub use error::{check_name, Error, Result};
pub use handle::FitsHandle;
pub use native::{
    ColumnData, ColumnInfo, ColumnMatch, DataType, FitsLibrary, FitsStream, HduType, IoMode,
    Samples, MAX_NAME_LEN,
};
pub use status::{NativeResult, Propagator, Release, Status, FITS};
pub use value::Value;
