use thiserror::Error;

/// Errors raised by host builtins.
#[derive(Debug, Error)]
pub enum HostError {
    /// Wrong number of arguments. Raised before any argument is inspected.
    #[error("{name} takes exactly {expected} {}", arguments_noun(.expected, .void))]
    Arity {
        name: String,
        expected: usize,
        /// The builtin ignores its only argument.
        void: bool,
    },
    /// An argument has the wrong kind of value.
    #[error("{builtin}: argument {position} must be {expected}")]
    Type {
        builtin: &'static str,
        position: usize,
        expected: &'static str,
    },
    /// An argument has the right kind but an unusable value.
    #[error("{builtin}: {message}")]
    Argument {
        builtin: &'static str,
        message: String,
    },
    /// Error from the FITS layer: a fatal status, an over-long name or a
    /// closed handle.
    #[error(transparent)]
    Fits(#[from] fitsbridge::Error),
    #[error("unknown builtin {0}")]
    UnknownBuiltin(String),
    #[error("{0} is not defined")]
    Unbound(String),
}

fn arguments_noun(expected: &usize, void: &bool) -> &'static str {
    match (*expected, *void) {
        (1, true) => "void argument",
        (1, false) => "argument",
        _ => "arguments",
    }
}

pub type Result<T> = core::result::Result<T, HostError>;
