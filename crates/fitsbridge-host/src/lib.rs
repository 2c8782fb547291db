//! Host-interpreter boundary for `fitsbridge`.
//!
//! An [`Interp`] holds variable bindings and a registry of builtins. Each
//! builtin receives positional [`Arg`]s, checks its arity before anything
//! else, forwards to the native layer and converts the result into a host
//! [`Value`]. FITS builtins carry CFITSIO's names (`__ffopen`, `__ffgky`, ...);
//! `fftwComplex1D`, `fftwReal1D` and `yocoSystem` cover the FFT and shell
//! plugins.

pub mod cfitsio;
pub mod error;
pub mod fftw;
pub mod interp;
pub mod system;
pub mod value;

pub use error::{HostError, Result};
pub use fftw::Complex;
pub use interp::{Arg, Builtin, Call, Interp};
pub use value::Value;
