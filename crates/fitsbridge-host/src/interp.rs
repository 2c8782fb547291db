//! Variable bindings, the builtin registry and positional argument access.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use fitsbridge::{DiskLibrary, FitsHandle, FitsLibrary};

use crate::error::{HostError, Result};
use crate::fftw::Complex;
use crate::value::Value;

/// One positional argument: a literal, or a reference to a named binding
/// (needed for output parameters and for the destruction calls).
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    Var(String),
}

impl Arg {
    pub fn var(name: &str) -> Self {
        Arg::Var(name.to_string())
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Value(Value::Int(n))
    }
}

impl From<f64> for Arg {
    fn from(x: f64) -> Self {
        Arg::Value(Value::Real(x))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Value(Value::Str(s.to_string()))
    }
}

/// A registered builtin.
#[derive(Clone, Copy)]
pub struct Builtin {
    pub arity: usize,
    /// The arguments are placeholders and are never read.
    pub void: bool,
    pub run: fn(&mut Interp, &Call<'_>) -> Result<Value>,
}

/// The arguments of one builtin invocation.
pub struct Call<'a> {
    pub name: &'static str,
    pub args: &'a [Arg],
}

/// Bindings, native library and builtins of one interpreter.
pub struct Interp {
    vars: HashMap<String, Value>,
    library: Box<dyn FitsLibrary>,
    builtins: HashMap<&'static str, Builtin>,
}

impl Interp {
    /// An interpreter with every builtin registered over `library`.
    pub fn new(library: Box<dyn FitsLibrary>) -> Self {
        let mut interp = Interp {
            vars: HashMap::new(),
            library,
            builtins: HashMap::new(),
        };
        crate::cfitsio::register(&mut interp);
        crate::fftw::register(&mut interp);
        crate::system::register(&mut interp);
        interp
    }

    /// An interpreter over files on disk.
    pub fn with_disk() -> Self {
        Interp::new(Box::new(DiskLibrary))
    }

    pub fn library(&self) -> &dyn FitsLibrary {
        self.library.as_ref()
    }

    pub fn register(&mut self, name: &'static str, arity: usize, run: fn(&mut Interp, &Call<'_>) -> Result<Value>) {
        self.builtins.insert(name, Builtin { arity, void: false, run });
    }

    /// Register a builtin whose arguments are ignored.
    pub fn register_void(&mut self, name: &'static str, arity: usize, run: fn(&mut Interp, &Call<'_>) -> Result<Value>) {
        self.builtins.insert(name, Builtin { arity, void: true, run });
    }

    /// Names of the registered builtins, sorted.
    pub fn builtin_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.builtins.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Invoke a builtin. Arity is checked before the builtin runs.
    pub fn call(&mut self, name: &str, args: &[Arg]) -> Result<Value> {
        let (&name, &builtin) = self
            .builtins
            .get_key_value(name)
            .ok_or_else(|| HostError::UnknownBuiltin(name.to_string()))?;
        if args.len() != builtin.arity {
            return Err(HostError::Arity {
                name: name.to_string(),
                expected: builtin.arity,
                void: builtin.void,
            });
        }
        log::trace!("call {name} with {} argument(s)", args.len());
        (builtin.run)(self, &Call { name, args })
    }
}

impl Call<'_> {
    fn type_error(&self, position: usize, expected: &'static str) -> HostError {
        HostError::Type {
            builtin: self.name,
            position: position + 1,
            expected,
        }
    }

    pub fn argument_error(&self, message: impl Into<String>) -> HostError {
        HostError::Argument {
            builtin: self.name,
            message: message.into(),
        }
    }

    /// The value of argument `i`, reading through variable references.
    pub fn value(&self, interp: &Interp, i: usize) -> Result<Value> {
        match &self.args[i] {
            Arg::Value(v) => Ok(v.clone()),
            Arg::Var(name) => interp
                .get(name)
                .cloned()
                .ok_or_else(|| HostError::Unbound(name.clone())),
        }
    }

    pub fn int(&self, interp: &Interp, i: usize) -> Result<i64> {
        match self.value(interp, i)? {
            Value::Int(n) => Ok(n),
            Value::Real(x) => Ok(x as i64),
            Value::IntArray(v) if v.len() == 1 => Ok(v[0]),
            _ => Err(self.type_error(i, "an integer")),
        }
    }

    pub fn int32(&self, interp: &Interp, i: usize) -> Result<i32> {
        i32::try_from(self.int(interp, i)?).map_err(|_| self.type_error(i, "a 32-bit integer"))
    }

    pub fn real(&self, interp: &Interp, i: usize) -> Result<f64> {
        match self.value(interp, i)? {
            Value::Int(n) => Ok(n as f64),
            Value::Real(x) => Ok(x),
            _ => Err(self.type_error(i, "a number")),
        }
    }

    /// A number, with 0 for nil or a string (a null value that disables
    /// null checking).
    pub fn real_or_zero(&self, interp: &Interp, i: usize) -> Result<f64> {
        match self.value(interp, i)? {
            Value::Nil | Value::Str(_) => Ok(0.0),
            _ => self.real(interp, i),
        }
    }

    pub fn string(&self, interp: &Interp, i: usize) -> Result<String> {
        match self.value(interp, i)? {
            Value::Str(s) => Ok(s),
            _ => Err(self.type_error(i, "a string")),
        }
    }

    pub fn int_array(&self, interp: &Interp, i: usize) -> Result<Vec<i64>> {
        match self.value(interp, i)? {
            Value::Nil => Ok(Vec::new()),
            Value::Int(n) => Ok(vec![n]),
            Value::IntArray(v) => Ok(v),
            Value::RealArray(v) => Ok(v.into_iter().map(|x| x as i64).collect()),
            _ => Err(self.type_error(i, "an integer array")),
        }
    }

    pub fn real_array(&self, interp: &Interp, i: usize) -> Result<Vec<f64>> {
        match self.value(interp, i)? {
            Value::Nil => Ok(Vec::new()),
            Value::Int(n) => Ok(vec![n as f64]),
            Value::Real(x) => Ok(vec![x]),
            Value::IntArray(v) => Ok(v.into_iter().map(|n| n as f64).collect()),
            Value::RealArray(v) => Ok(v),
            _ => Err(self.type_error(i, "a numeric array")),
        }
    }

    pub fn string_array(&self, interp: &Interp, i: usize) -> Result<Vec<String>> {
        match self.value(interp, i)? {
            Value::Nil => Ok(Vec::new()),
            Value::Str(s) => Ok(vec![s]),
            Value::StrArray(v) => Ok(v),
            _ => Err(self.type_error(i, "a string array")),
        }
    }

    pub fn complex_array(&self, interp: &Interp, i: usize) -> Result<Vec<Complex>> {
        match self.value(interp, i)? {
            Value::ComplexArray(v) => Ok(v),
            Value::RealArray(v) => Ok(v.into_iter().map(|re| Complex::new(re, 0.0)).collect()),
            Value::IntArray(v) => Ok(v.into_iter().map(|n| Complex::new(n as f64, 0.0)).collect()),
            _ => Err(self.type_error(i, "a complex array")),
        }
    }

    pub fn handle(&self, interp: &Interp, i: usize) -> Result<Rc<RefCell<FitsHandle>>> {
        match self.value(interp, i)? {
            Value::Handle(h) => Ok(h),
            _ => Err(self.type_error(i, "a FITS handle")),
        }
    }

    /// Write an output parameter. Literal arguments have nowhere to receive
    /// the value and are left alone.
    pub fn store(&self, interp: &mut Interp, i: usize, value: Value) {
        if let Arg::Var(name) = &self.args[i] {
            interp.set(name, value);
        }
    }
}
