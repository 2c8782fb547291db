use std::cell::Cell;
use std::rc::Rc;

use fitsbridge::{DiskLibrary, FitsLibrary, FitsStream, IoMode, NativeResult};
use fitsbridge_host::{Arg, HostError, Interp, Value};

/// Disk library that counts every native call made through it.
struct CountingLibrary {
    calls: Rc<Cell<usize>>,
}

impl CountingLibrary {
    fn bump(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl FitsLibrary for CountingLibrary {
    fn open(&self, name: &str, mode: IoMode) -> NativeResult<Box<dyn FitsStream>> {
        self.bump();
        DiskLibrary.open(name, mode)
    }

    fn create(&self, name: &str) -> NativeResult<Box<dyn FitsStream>> {
        self.bump();
        DiskLibrary.create(name)
    }

    fn exists(&self, name: &str) -> NativeResult<i32> {
        self.bump();
        DiskLibrary.exists(name)
    }

    fn version(&self) -> f32 {
        self.bump();
        DiskLibrary.version()
    }

    fn next_message(&self) -> Option<String> {
        self.bump();
        DiskLibrary.next_message()
    }
}

fn counting() -> (Interp, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let library = CountingLibrary {
        calls: Rc::clone(&calls),
    };
    (Interp::new(Box::new(library)), calls)
}

fn path_arg(dir: &tempfile::TempDir, name: &str) -> Arg {
    Arg::from(dir.path().join(name).to_str().unwrap())
}

#[test]
fn long_names_never_reach_the_library() {
    let (mut interp, calls) = counting();
    let name = "x".repeat(fitsbridge::MAX_NAME_LEN + 1);
    for builtin in ["__ffinit", "__ffexist"] {
        let err = interp.call(builtin, &[Arg::from(name.as_str())]).unwrap_err();
        assert_eq!(err.to_string(), "filename string too long");
    }
    let err = interp
        .call("__ffopen", &[Arg::from(name.as_str()), Arg::from(0i64)])
        .unwrap_err();
    assert!(matches!(err, HostError::Fits(fitsbridge::Error::NameTooLong(_))));
    assert_eq!(calls.get(), 0);
}

#[test]
fn arity_errors_come_before_any_native_call() {
    let (mut interp, calls) = counting();
    let err = interp.call("__ffopen", &[Arg::from("a.fits")]).unwrap_err();
    assert_eq!(err.to_string(), "__ffopen takes exactly 2 arguments");
    let err = interp.call("__ffvers", &[]).unwrap_err();
    assert_eq!(err.to_string(), "__ffvers takes exactly 1 void argument");
    assert_eq!(calls.get(), 0);
}

#[test]
fn arity_is_checked_before_the_handle() {
    let dir = tempfile::tempdir().unwrap();
    let mut interp = Interp::with_disk();
    let h = interp.call("__ffinit", &[path_arg(&dir, "arity.fits")]).unwrap();
    interp.set("f", h.clone());
    interp.call("__ffclos", &[Arg::var("f")]).unwrap();

    interp.set("g", h);
    let err = interp.call("__ffmahd", &[Arg::var("g")]).unwrap_err();
    assert_eq!(err.to_string(), "__ffmahd takes exactly 2 arguments");
    let err = interp
        .call("__ffmahd", &[Arg::var("g"), Arg::from(1i64)])
        .unwrap_err();
    assert_eq!(err.to_string(), "empty FITS handle (FITS stream closed?)");
}

#[test]
fn create_describe_close_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let mut interp = Interp::with_disk();
    let h = interp.call("__ffinit", &[path_arg(&dir, "out.fits")]).unwrap();
    interp.set("f", h);
    let captured = interp.get("f").cloned().unwrap();
    assert!(captured.to_string().contains("readwrite"));

    assert_eq!(interp.call("__ffclos", &[Arg::var("f")]).unwrap(), Value::Nil);
    assert_eq!(interp.get("f"), Some(&Value::Nil));

    // Closing the reset binding again is a warning, not an error.
    assert_eq!(interp.call("__ffclos", &[Arg::var("f")]).unwrap(), Value::Nil);

    interp.set("g", captured.clone());
    let err = interp.call("__ffthdu", &[Arg::var("g")]).unwrap_err();
    assert!(matches!(err, HostError::Fits(fitsbridge::Error::Closed)));
    assert_eq!(captured.to_string(), "empty FITS handle (closed FITS stream)");
}

#[test]
fn delete_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scratch.fits");
    let mut interp = Interp::with_disk();
    let h = interp.call("__ffinit", &[path_arg(&dir, "scratch.fits")]).unwrap();
    interp.set("f", h);
    interp
        .call("__ffcrim", &[Arg::var("f"), Arg::from(8i64), Arg::from(0i64), Arg::Value(Value::Nil)])
        .unwrap();
    assert_eq!(interp.call("__ffexist", &[path_arg(&dir, "scratch.fits")]).unwrap(), Value::Int(1));
    interp.call("__ffdelt", &[Arg::var("f")]).unwrap();
    assert_eq!(interp.get("f"), Some(&Value::Nil));
    assert!(!path.exists());
}

#[test]
fn open_missing_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut interp = Interp::with_disk();
    let err = interp
        .call("__ffopen", &[path_arg(&dir, "missing.fits"), Arg::from(0i64)])
        .unwrap_err();
    assert_eq!(err.to_string(), "fitsbridge\n 104 -> could not open the named file");
    let message = interp.call("__ffgmsg", &[Arg::Value(Value::Nil)]).unwrap();
    assert!(matches!(message, Value::Str(_)));
}

#[test]
fn image_round_trip_through_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let mut interp = Interp::with_disk();
    let h = interp.call("__ffinit", &[path_arg(&dir, "img.fits")]).unwrap();
    interp.set("f", h);
    let f = Arg::var("f");
    interp
        .call("__ffcrim", &[f.clone(), Arg::from(16i64), Arg::from(2i64), Arg::Value(Value::IntArray(vec![3, 2]))])
        .unwrap();
    let pixels = Value::RealArray(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    interp
        .call("__ffppx", &[f.clone(), Arg::from(31i64), Arg::Value(Value::IntArray(vec![1, 1])), Arg::from(6i64), Arg::Value(pixels)])
        .unwrap();
    interp.call("__ffclos", &[f.clone()]).unwrap();

    let h = interp
        .call("__ffopen", &[path_arg(&dir, "img.fits"), Arg::from(0i64)])
        .unwrap();
    interp.set("f", h);
    let status = interp
        .call("__ffgpv", &[f.clone(), Arg::from(31i64), Arg::from(2i64), Arg::from(4i64), Arg::from(0i64), Arg::var("arr"), Arg::var("anynul")])
        .unwrap();
    assert_eq!(status, Value::Int(0));
    assert_eq!(interp.get("arr"), Some(&Value::IntArray(vec![2, 3, 4, 5])));
    assert_eq!(interp.get("anynul"), Some(&Value::Int(0)));
    assert_eq!(interp.call("__ffflmd", &[f.clone()]).unwrap(), Value::Int(0));

    let err = interp
        .call("__ffpcom", &[f.clone(), Arg::from("read only")])
        .unwrap_err();
    assert!(err.to_string().contains("112 -> "));
    interp.call("__ffclos", &[f]).unwrap();
}

#[test]
fn table_round_trip_through_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let mut interp = Interp::with_disk();
    let h = interp.call("__ffinit", &[path_arg(&dir, "tab.fits")]).unwrap();
    interp.set("f", h);
    let f = Arg::var("f");
    let strings = |v: &[&str]| Arg::Value(Value::StrArray(v.iter().map(|s| s.to_string()).collect()));
    interp
        .call(
            "__ffcrtb",
            &[
                f.clone(),
                Arg::from(2i64),
                Arg::from(0i64),
                Arg::from(3i64),
                strings(&["ID", "NAME", "NUM"]),
                strings(&["1J", "8A", "1D"]),
                strings(&["", "", "m"]),
                Arg::from("CATALOG"),
            ],
        )
        .unwrap();
    interp
        .call("__ffpcl", &[f.clone(), Arg::from(31i64), Arg::from(1i64), Arg::from(1i64), Arg::from(1i64), Arg::from(3i64), Arg::Value(Value::IntArray(vec![7, 8, 9]))])
        .unwrap();
    interp
        .call("__ffpcl", &[f.clone(), Arg::from(16i64), Arg::from(2i64), Arg::from(1i64), Arg::from(1i64), Arg::from(2i64), strings(&["vega", "deneb"])])
        .unwrap();
    assert_eq!(interp.call("__ffgnrw", &[f.clone()]).unwrap(), Value::Int(3));
    assert_eq!(interp.call("__ffgncl", &[f.clone()]).unwrap(), Value::Int(3));

    let status = interp
        .call("__ffgcv", &[f.clone(), Arg::from(16i64), Arg::from(2i64), Arg::from(1i64), Arg::from(1i64), Arg::from(2i64), Arg::from(0i64), Arg::var("names"), Arg::var("anynul")])
        .unwrap();
    assert_eq!(status, Value::Int(0));
    assert_eq!(
        interp.get("names"),
        Some(&Value::StrArray(vec!["vega".into(), "deneb".into()]))
    );

    let status = interp
        .call("__ffgcno", &[f.clone(), Arg::from(0i64), Arg::from("name"), Arg::var("col")])
        .unwrap();
    assert_eq!((status, interp.get("col").cloned()), (Value::Int(0), Some(Value::Int(2))));

    let status = interp
        .call("__ffgcnn", &[f.clone(), Arg::from(0i64), Arg::from("N*"), Arg::var("name"), Arg::var("col")])
        .unwrap();
    assert_eq!(status, Value::Int(237));
    assert_eq!(interp.get("name"), Some(&Value::Str("NAME".into())));

    let status = interp
        .call("__ffgcno", &[f.clone(), Arg::from(0i64), Arg::from("FLUX"), Arg::var("col")])
        .unwrap();
    assert_eq!((status, interp.get("col").cloned()), (Value::Int(219), Some(Value::Int(0))));

    interp.call("__ffdrow", &[f.clone(), Arg::from(1i64), Arg::from(1i64)]).unwrap();
    assert_eq!(interp.call("__ffgnrw", &[f.clone()]).unwrap(), Value::Int(2));
    interp.call("__ffdcol", &[f.clone(), Arg::from(3i64)]).unwrap();
    assert_eq!(interp.call("__ffgncl", &[f.clone()]).unwrap(), Value::Int(2));

    let status = interp
        .call("__ffgtcl", &[f.clone(), Arg::from(1i64), Arg::var("code"), Arg::var("repeat"), Arg::var("width")])
        .unwrap();
    assert_eq!(status, Value::Int(0));
    assert_eq!(interp.get("code"), Some(&Value::Int(41)));
    interp.call("__ffclos", &[f]).unwrap();
}

#[test]
fn oversized_row_requests_are_fatal_statuses() {
    let dir = tempfile::tempdir().unwrap();
    let mut interp = Interp::with_disk();
    let h = interp.call("__ffinit", &[path_arg(&dir, "rows.fits")]).unwrap();
    interp.set("f", h);
    let f = Arg::var("f");
    let strings = |v: &[&str]| Arg::Value(Value::StrArray(v.iter().map(|s| s.to_string()).collect()));
    interp
        .call(
            "__ffcrtb",
            &[f.clone(), Arg::from(2i64), Arg::from(2i64), Arg::from(2i64), strings(&["X", "EMPTY"]), strings(&["1D", "0D"]), strings(&["", ""]), Arg::from("ROWS")],
        )
        .unwrap();

    let err = interp
        .call("__ffgcv", &[f.clone(), Arg::from(82i64), Arg::from(1i64), Arg::from(1i64), Arg::from(1i64), Arg::from(1i64 << 40), Arg::from(0i64), Arg::var("arr"), Arg::var("anynul")])
        .unwrap_err();
    assert!(err.to_string().contains("307 -> "));
    let err = interp
        .call("__ffgcv", &[f.clone(), Arg::from(82i64), Arg::from(2i64), Arg::from(1i64), Arg::from(1i64), Arg::from(1i64), Arg::from(0i64), Arg::var("arr"), Arg::var("anynul")])
        .unwrap_err();
    assert!(err.to_string().contains("308 -> "));

    let err = interp
        .call("__ffdrow", &[f.clone(), Arg::from(2i64), Arg::from(i64::MAX)])
        .unwrap_err();
    assert!(err.to_string().contains("307 -> "));
    let err = interp
        .call("__ffirow", &[f.clone(), Arg::from(0i64), Arg::from(1i64 << 45)])
        .unwrap_err();
    assert_eq!(err.to_string(), "fitsbridge\n 113 -> Could not allocate memory");
    assert_eq!(interp.call("__ffgnrw", &[f.clone()]).unwrap(), Value::Int(2));
    interp.call("__ffclos", &[f]).unwrap();
}
