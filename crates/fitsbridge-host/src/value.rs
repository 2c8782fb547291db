//! Values seen by interpreted code.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use fitsbridge::FitsHandle;

use crate::fftw::Complex;

/// A host value. Handles are shared: cloning a `Handle` clones the
/// reference, never the native stream.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Int(i64),
    Real(f64),
    Str(String),
    IntArray(Vec<i64>),
    RealArray(Vec<f64>),
    StrArray(Vec<String>),
    ComplexArray(Vec<Complex>),
    Handle(Rc<RefCell<FitsHandle>>),
}

impl Value {
    /// Wrap a freshly opened handle.
    pub fn handle(handle: FitsHandle) -> Self {
        Value::Handle(Rc::new(RefCell::new(handle)))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Str(_) => "string",
            Value::IntArray(_) => "int array",
            Value::RealArray(_) => "real array",
            Value::StrArray(_) => "string array",
            Value::ComplexArray(_) => "complex array",
            Value::Handle(_) => "FITS handle",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::IntArray(a), Value::IntArray(b)) => a == b,
            (Value::RealArray(a), Value::RealArray(b)) => a == b,
            (Value::StrArray(a), Value::StrArray(b)) => a == b,
            (Value::ComplexArray(a), Value::ComplexArray(b)) => a == b,
            (Value::Handle(a), Value::Handle(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("[]"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::IntArray(v) => write!(f, "{v:?}"),
            Value::RealArray(v) => write!(f, "{v:?}"),
            Value::StrArray(v) => write!(f, "{v:?}"),
            Value::ComplexArray(v) => {
                let parts: Vec<String> = v.iter().map(|c| format!("{}{:+}i", c.re, c.im)).collect();
                write!(f, "[{}]", parts.join(","))
            }
            Value::Handle(h) => f.write_str(&h.borrow().describe()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id.fits");
        let stream = fitsbridge::FitsLibrary::create(&fitsbridge::DiskLibrary, path.to_str().unwrap()).unwrap();
        let a = Value::handle(FitsHandle::new(stream));
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.kind(), "FITS handle");
        assert!(a.to_string().starts_with("readwrite FITS handle"));
    }

    #[test]
    fn display_of_plain_values() {
        assert_eq!(Value::Nil.to_string(), "[]");
        assert_eq!(Value::Str("x".into()).to_string(), "\"x\"");
        assert_eq!(
            Value::ComplexArray(vec![Complex::new(1.0, -2.0)]).to_string(),
            "[1-2i]"
        );
    }
}
