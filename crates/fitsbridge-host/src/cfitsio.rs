//! CFITSIO builtins.
//!
//! Each builtin marshals its positional arguments into a typed
//! [`FitsStream`] call, runs the outcome through [`FITS`] and converts the
//! result back into a host [`Value`]. Three return conventions apply:
//! routines whose product is a status return it as `Int` (benign codes come
//! back as data), routines with a derived value return that value, and
//! routines that edit the stream in place return the handle for chaining.

use fitsbridge::{
    check_name, ColumnData, DataType, FitsStream, HduType, IoMode, NativeResult, Samples, Status,
    Value as KeyValue, FITS,
};

use crate::error::{HostError, Result};
use crate::fftw::Complex;
use crate::interp::{Call, Interp};
use crate::value::Value;

type Run = fn(&mut Interp, &Call<'_>) -> Result<Value>;

const BUILTINS: &[(&str, usize, Run)] = &[
    ("__ffopen", 2, ffopen),
    ("__ffinit", 1, ffinit),
    ("__ffclos", 1, ffclos),
    ("__ffdelt", 1, ffdelt),
    ("__ffexist", 1, ffexist),
    ("__ffurlt", 1, ffurlt),
    ("__ffflnm", 1, ffflnm),
    ("__ffflmd", 1, ffflmd),
    ("__ffgerr", 1, ffgerr),
    ("__ffpky", 5, ffpky),
    ("__ffpcom", 2, ffpcom),
    ("__ffpunt", 3, ffpunt),
    ("__ffphis", 2, ffphis),
    ("__ffpdat", 1, ffpdat),
    ("__ffpcks", 1, ffpcks),
    ("__ffptdm", 4, ffptdm),
    ("__ffghsp", 2, ffghsp),
    ("__ffgnxk", 5, ffgnxk),
    ("__ffgrec", 2, ffgrec),
    ("__ffgcrd", 2, ffgcrd),
    ("__ffgunt", 2, ffgunt),
    ("__ffgky", 5, ffgky),
    ("__ffgtdm", 5, ffgtdm),
    ("__ffuky", 5, ffuky),
    ("__ffukyu", 3, ffukyu),
    ("__ffmnam", 3, ffmnam),
    ("__ffmcom", 3, ffmcom),
    ("__ffdkey", 2, ffdkey),
    ("__ffdrec", 2, ffdrec),
    ("__ffghdn", 1, ffghdn),
    ("__ffghdt", 1, ffghdt),
    ("__ffdhdu", 1, ffdhdu),
    ("__ffgidt", 1, ffgidt),
    ("__ffgidm", 1, ffgidm),
    ("__ffgisz", 1, ffgisz),
    ("__ffmahd", 2, ffmahd),
    ("__ffmrhd", 2, ffmrhd),
    ("__ffmnhd", 3, ffmnhd),
    ("__ffthdu", 1, ffthdu),
    ("__ffcrim", 4, ffcrim),
    ("__ffcrtb", 8, ffcrtb),
    ("__ffgcno", 4, ffgcno),
    ("__ffgcnn", 5, ffgcnn),
    ("__ffgtcl", 5, ffgtcl),
    ("__ffgncl", 1, ffgncl),
    ("__ffgnrw", 1, ffgnrw),
    ("__ffgpxv", 7, ffgpxv),
    ("__ffgsv", 8, ffgsv),
    ("__ffgpv", 7, ffgpv),
    ("__ffgcv", 9, ffgcv),
    ("__ffppx", 5, ffppx),
    ("__ffpcl", 7, ffpcl),
    ("__ffirow", 3, ffirow),
    ("__ffdrow", 3, ffdrow),
    ("__ffdrws", 2, ffdrws),
    ("__fficol", 4, fficol),
    ("__fficls", 5, fficls),
    ("__ffmvec", 3, ffmvec),
    ("__ffdcol", 2, ffdcol),
];

pub(crate) fn register(interp: &mut Interp) {
    for &(name, arity, run) in BUILTINS {
        interp.register(name, arity, run);
    }
    interp.register_void("__ffvers", 1, ffvers);
    interp.register_void("__ffgmsg", 1, ffgmsg);
}

// ── Marshalling helpers ──

/// The error a fatal status turns into.
fn fatal(status: Status) -> HostError {
    fitsbridge::Error::Status {
        component: FITS.component(),
        status,
    }
    .into()
}

/// Run `op` on the stream of the handle in argument 0 and settle its status.
fn on_stream<T>(
    interp: &Interp,
    call: &Call<'_>,
    op: impl FnOnce(&mut dyn FitsStream) -> NativeResult<T>,
) -> Result<(Option<T>, Status)> {
    let handle = call.handle(interp, 0)?;
    let mut handle = handle.borrow_mut();
    let stream = handle.access()?;
    Ok(FITS.settle(op(stream))?)
}

/// Like [`on_stream`], returning the checked status as the builtin's value.
fn status_of(
    interp: &Interp,
    call: &Call<'_>,
    op: impl FnOnce(&mut dyn FitsStream) -> NativeResult<()>,
) -> Result<Value> {
    let (_, status) = on_stream(interp, call, op)?;
    Ok(status_value(status))
}

/// Like [`on_stream`], returning the handle itself.
fn chained(
    interp: &Interp,
    call: &Call<'_>,
    op: impl FnOnce(&mut dyn FitsStream) -> NativeResult<()>,
) -> Result<Value> {
    on_stream(interp, call, op)?;
    call.value(interp, 0)
}

fn status_value(status: Status) -> Value {
    Value::Int(i64::from(status.code()))
}

fn datatype(interp: &Interp, call: &Call<'_>, i: usize) -> Result<DataType> {
    DataType::from_code(call.int(interp, i)?).map_err(fatal)
}

fn hdu_type(interp: &Interp, call: &Call<'_>, i: usize) -> Result<HduType> {
    HduType::from_code(call.int(interp, i)?).map_err(fatal)
}

/// A keyword value from a host scalar.
fn key_value(interp: &Interp, call: &Call<'_>, i: usize) -> Result<KeyValue> {
    Ok(match call.value(interp, i)? {
        Value::Int(n) => KeyValue::Integer(n),
        Value::Real(x) => KeyValue::Float(x),
        Value::Str(s) => KeyValue::String(s),
        Value::ComplexArray(v) if v.len() == 1 => KeyValue::Complex(v[0].re, v[0].im),
        other => {
            return Err(call.argument_error(format!(
                "keyword value must be a scalar, not {}",
                other.kind()
            )))
        }
    })
}

fn host_key_value(value: KeyValue) -> Value {
    match value {
        KeyValue::Logical(b) => Value::Int(i64::from(b)),
        KeyValue::Integer(n) => Value::Int(n),
        KeyValue::Float(x) => Value::Real(x),
        KeyValue::String(s) => Value::Str(s),
        KeyValue::Complex(re, im) => Value::ComplexArray(vec![Complex::new(re, im)]),
        KeyValue::Undefined => Value::Nil,
    }
}

/// Pixel values as the host array matching `datatype`.
fn numeric_array(datatype: DataType, values: Vec<f64>) -> Value {
    if datatype.is_integer() || datatype == DataType::Logical {
        Value::IntArray(values.into_iter().map(|x| x as i64).collect())
    } else {
        Value::RealArray(values)
    }
}

fn column_array(datatype: DataType, data: ColumnData) -> Value {
    match data {
        ColumnData::Logical(v) => Value::IntArray(v.into_iter().map(i64::from).collect()),
        ColumnData::Numeric(v) => numeric_array(datatype, v),
        ColumnData::Text(v) => Value::StrArray(v),
    }
}

/// The first `nelem` entries of an input array.
fn take<T>(call: &Call<'_>, mut values: Vec<T>, nelem: i64) -> Result<Vec<T>> {
    let n = usize::try_from(nelem)
        .map_err(|_| call.argument_error(format!("invalid element count {nelem}")))?;
    if values.len() < n {
        return Err(call.argument_error(format!(
            "array holds {} elements, {n} requested",
            values.len()
        )));
    }
    values.truncate(n);
    Ok(values)
}

/// Store the values and null flag of a read into the last two arguments.
fn store_samples(
    interp: &mut Interp,
    call: &Call<'_>,
    samples: Option<Samples<Value>>,
    status: Status,
) -> Value {
    let last = call.args.len() - 1;
    if let Some(samples) = samples {
        call.store(interp, last - 1, samples.values);
        call.store(interp, last, Value::Int(i64::from(samples.any_null)));
    }
    status_value(status)
}

// ── Lifecycle ──

fn ffopen(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let name = call.string(interp, 0)?;
    let name = check_name(&name)?;
    let mode = IoMode::from_code(call.int(interp, 1)?).map_err(fatal)?;
    let (stream, _) = FITS.settle(interp.library().open(name, mode))?;
    log::debug!("opened {name} ({})", mode.marker());
    Ok(stream.map(|s| Value::handle(fitsbridge::FitsHandle::new(s))).unwrap_or_default())
}

fn ffinit(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let name = call.string(interp, 0)?;
    let name = check_name(&name)?;
    let (stream, _) = FITS.settle(interp.library().create(name))?;
    log::debug!("created {name}");
    Ok(stream.map(|s| Value::handle(fitsbridge::FitsHandle::new(s))).unwrap_or_default())
}

/// Shared body of `__ffclos` and `__ffdelt`: release, then reset the binding.
fn release(interp: &mut Interp, call: &Call<'_>, delete: bool) -> Result<Value> {
    match call.value(interp, 0)? {
        Value::Handle(handle) => {
            let mut handle = handle.borrow_mut();
            if delete {
                handle.delete();
            } else {
                handle.close();
            }
        }
        Value::Nil => log::warn!("{}: FITS handle was already closed", FITS.component()),
        _ => return Err(call.argument_error("argument must be a FITS handle")),
    }
    call.store(interp, 0, Value::Nil);
    Ok(Value::Nil)
}

fn ffclos(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    release(interp, call, false)
}

fn ffdelt(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    release(interp, call, true)
}

// ── Files ──

fn ffexist(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let name = call.string(interp, 0)?;
    let name = check_name(&name)?;
    let (exists, _) = FITS.settle(interp.library().exists(name))?;
    Ok(Value::Int(i64::from(exists.unwrap_or(0))))
}

fn ffurlt(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (url, _) = on_stream(interp, call, |s| s.url_type())?;
    Ok(Value::Str(url.unwrap_or_default()))
}

fn ffflnm(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (name, _) = on_stream(interp, call, |s| s.file_name())?;
    Ok(Value::Str(name.unwrap_or_default()))
}

fn ffflmd(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (mode, _) = on_stream(interp, call, |s| s.io_mode())?;
    Ok(Value::Int(mode.map_or(0, |m| i64::from(m.code()))))
}

fn ffvers(interp: &mut Interp, _call: &Call<'_>) -> Result<Value> {
    Ok(Value::Real(f64::from(interp.library().version())))
}

fn ffgerr(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let code = call.int32(interp, 0)?;
    Ok(Value::Str(Status(code).text().to_string()))
}

fn ffgmsg(interp: &mut Interp, _call: &Call<'_>) -> Result<Value> {
    Ok(interp.library().next_message().map(Value::Str).unwrap_or_default())
}

// ── Header writing ──

fn ffpky(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let datatype = datatype(interp, call, 1)?;
    let keyname = call.string(interp, 2)?;
    let value = key_value(interp, call, 3)?;
    let comment = call.string(interp, 4)?;
    chained(interp, call, |s| s.write_key(datatype, &keyname, &value, &comment))
}

fn ffpcom(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let text = call.string(interp, 1)?;
    status_of(interp, call, |s| s.write_comment(&text))
}

fn ffpunt(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let keyname = call.string(interp, 1)?;
    let unit = call.string(interp, 2)?;
    status_of(interp, call, |s| s.write_key_unit(&keyname, &unit))
}

fn ffphis(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let text = call.string(interp, 1)?;
    status_of(interp, call, |s| s.write_history(&text))
}

fn ffpdat(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    status_of(interp, call, |s| s.write_date())
}

fn ffpcks(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    status_of(interp, call, |s| s.write_checksum())
}

fn ffptdm(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let colnum = call.int32(interp, 1)?;
    let naxis = call.int(interp, 2)?;
    let naxes = take(call, call.int_array(interp, 3)?, naxis)?;
    status_of(interp, call, |s| s.write_tdim(colnum, &naxes))
}

// ── Header reading ──

fn ffghsp(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (space, _) = on_stream(interp, call, |s| s.header_space())?;
    let (existing, more) = space.unwrap_or((0, 0));
    call.store(interp, 1, Value::Int(i64::from(more)));
    Ok(Value::Int(i64::from(existing)))
}

fn ffgnxk(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let ninc = call.int(interp, 2)?;
    let include = take(call, call.string_array(interp, 1)?, ninc)?;
    let nexc = call.int(interp, 4)?;
    let exclude = take(call, call.string_array(interp, 3)?, nexc)?;
    let (card, _) = on_stream(interp, call, |s| s.next_key(&include, &exclude))?;
    Ok(Value::Str(card.unwrap_or_default()))
}

fn ffgrec(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let nrec = call.int32(interp, 1)?;
    let (card, _) = on_stream(interp, call, |s| s.read_record(nrec))?;
    Ok(Value::Str(card.unwrap_or_default()))
}

fn ffgcrd(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let keyname = call.string(interp, 1)?;
    let (card, _) = on_stream(interp, call, |s| s.read_card(&keyname))?;
    Ok(Value::Str(card.unwrap_or_default()))
}

fn ffgunt(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let keyname = call.string(interp, 1)?;
    let (unit, _) = on_stream(interp, call, |s| s.read_key_unit(&keyname))?;
    Ok(Value::Str(unit.unwrap_or_default()))
}

fn ffgky(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let datatype = datatype(interp, call, 1)?;
    let keyname = call.string(interp, 2)?;
    let (found, status) = on_stream(interp, call, |s| s.read_key(datatype, &keyname))?;
    if let Some((value, comment)) = found {
        call.store(interp, 3, host_key_value(value));
        call.store(interp, 4, Value::Str(comment));
    }
    Ok(status_value(status))
}

fn ffgtdm(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let colnum = call.int32(interp, 1)?;
    let maxdim = usize::try_from(call.int(interp, 2)?).unwrap_or(0);
    let (dims, status) = on_stream(interp, call, |s| s.read_tdim(colnum))?;
    if let Some(mut dims) = dims {
        call.store(interp, 3, Value::Int(dims.len() as i64));
        dims.truncate(maxdim);
        call.store(interp, 4, Value::IntArray(dims));
    }
    Ok(status_value(status))
}

// ── Header editing ──

fn ffuky(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let datatype = datatype(interp, call, 1)?;
    let keyname = call.string(interp, 2)?;
    let value = key_value(interp, call, 3)?;
    let comment = call.string(interp, 4)?;
    on_stream(interp, call, |s| s.update_key(datatype, &keyname, &value, &comment))?;
    Ok(Value::Nil)
}

fn ffukyu(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let keyname = call.string(interp, 1)?;
    let comment = call.string(interp, 2)?;
    on_stream(interp, call, |s| s.update_key_null(&keyname, &comment))?;
    Ok(Value::Nil)
}

fn ffmnam(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let oldname = call.string(interp, 1)?;
    let newname = call.string(interp, 2)?;
    status_of(interp, call, |s| s.rename_key(&oldname, &newname))
}

fn ffmcom(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let keyname = call.string(interp, 1)?;
    let comment = call.string(interp, 2)?;
    chained(interp, call, |s| s.modify_comment(&keyname, &comment))
}

fn ffdkey(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let keyname = call.string(interp, 1)?;
    status_of(interp, call, |s| s.delete_key(&keyname))
}

fn ffdrec(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let keynum = call.int32(interp, 1)?;
    status_of(interp, call, |s| s.delete_record(keynum))
}

// ── HDUs ──

fn ffghdn(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (n, _) = on_stream(interp, call, |s| Ok(s.hdu_num()))?;
    Ok(Value::Int(i64::from(n.unwrap_or(0))))
}

fn ffghdt(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (kind, _) = on_stream(interp, call, |s| s.hdu_type())?;
    Ok(Value::Int(i64::from(kind.map_or(-1, HduType::code))))
}

fn ffdhdu(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    status_of(interp, call, |s| s.delete_hdu().map(drop))
}

fn ffgidt(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (bitpix, _) = on_stream(interp, call, |s| s.image_type())?;
    Ok(Value::Int(i64::from(bitpix.unwrap_or(0))))
}

fn ffgidm(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (naxis, _) = on_stream(interp, call, |s| s.image_dim())?;
    Ok(Value::Int(i64::from(naxis.unwrap_or(0))))
}

/// Dimension list in the host's convention: the rank, then each length.
fn ffgisz(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (naxes, _) = on_stream(interp, call, |s| s.image_size())?;
    let naxes = naxes.unwrap_or_default();
    let mut dims = Vec::with_capacity(naxes.len() + 1);
    dims.push(naxes.len() as i64);
    dims.extend(naxes);
    Ok(Value::IntArray(dims))
}

fn ffmahd(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let hdunum = call.int32(interp, 1)?;
    chained(interp, call, |s| s.move_abs_hdu(hdunum).map(drop))
}

fn ffmrhd(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let offset = call.int32(interp, 1)?;
    chained(interp, call, |s| s.move_rel_hdu(offset).map(drop))
}

fn ffmnhd(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let hdutype = hdu_type(interp, call, 1)?;
    let extname = call.string(interp, 2)?;
    chained(interp, call, |s| s.move_named_hdu(hdutype, &extname, 0))
}

fn ffthdu(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (total, _) = on_stream(interp, call, |s| s.num_hdus())?;
    Ok(Value::Int(i64::from(total.unwrap_or(0))))
}

fn ffcrim(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let bitpix = call.int32(interp, 1)?;
    let naxis = call.int(interp, 2)?;
    let naxes = take(call, call.int_array(interp, 3)?, naxis)?;
    chained(interp, call, |s| s.create_image(bitpix, &naxes))
}

fn ffcrtb(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let tbltype = hdu_type(interp, call, 1)?;
    let naxis2 = call.int(interp, 2)?;
    let tfields = call.int(interp, 3)?;
    let ttype = take(call, call.string_array(interp, 4)?, tfields)?;
    let tform = take(call, call.string_array(interp, 5)?, tfields)?;
    let mut tunit = call.string_array(interp, 6)?;
    tunit.resize(ttype.len(), String::new());
    let extname = call.string(interp, 7)?;
    chained(interp, call, |s| {
        s.create_table(tbltype, naxis2, &ttype, &tform, &tunit, &extname)
    })
}

// ── Tables ──

fn ffgcno(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let case_sensitive = call.int(interp, 1)? != 0;
    let template = call.string(interp, 2)?;
    let (found, status) = on_stream(interp, call, |s| {
        s.column_lookup(case_sensitive, &template)
    })?;
    let status = found.as_ref().map_or(status, |m| m.status());
    call.store(interp, 3, Value::Int(found.map_or(0, |m| i64::from(m.number))));
    Ok(status_value(status))
}

fn ffgcnn(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let case_sensitive = call.int(interp, 1)? != 0;
    let template = call.string(interp, 2)?;
    let (found, status) = on_stream(interp, call, |s| {
        s.column_lookup(case_sensitive, &template)
    })?;
    let status = found.as_ref().map_or(status, |m| m.status());
    let (name, number) = found.map_or((String::new(), 0), |m| (m.name, m.number));
    call.store(interp, 3, Value::Str(name));
    call.store(interp, 4, Value::Int(i64::from(number)));
    Ok(status_value(status))
}

fn ffgtcl(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let colnum = call.int32(interp, 1)?;
    let (info, status) = on_stream(interp, call, |s| s.column_type(colnum))?;
    if let Some(info) = info {
        call.store(interp, 2, Value::Int(i64::from(info.typecode)));
        call.store(interp, 3, Value::Int(info.repeat));
        call.store(interp, 4, Value::Int(info.width));
    }
    Ok(status_value(status))
}

fn ffgncl(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (ncols, _) = on_stream(interp, call, |s| s.num_cols())?;
    Ok(Value::Int(i64::from(ncols.unwrap_or(0))))
}

fn ffgnrw(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let (nrows, _) = on_stream(interp, call, |s| s.num_rows())?;
    Ok(Value::Int(nrows.unwrap_or(0)))
}

// ── Data ──

fn ffgpxv(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let datatype = datatype(interp, call, 1)?;
    let firstpix = call.int_array(interp, 2)?;
    let nelem = call.int(interp, 3)?;
    let nulval = call.real_or_zero(interp, 4)?;
    let (samples, status) = on_stream(interp, call, |s| {
        s.read_pixels(datatype, &firstpix, nelem, nulval)
    })?;
    let samples = samples.map(|r| Samples {
        values: numeric_array(datatype, r.values),
        any_null: r.any_null,
    });
    Ok(store_samples(interp, call, samples, status))
}

fn ffgsv(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let datatype = datatype(interp, call, 1)?;
    let fpixel = call.int_array(interp, 2)?;
    let lpixel = call.int_array(interp, 3)?;
    let inc = call.int_array(interp, 4)?;
    let nulval = call.real_or_zero(interp, 5)?;
    let (samples, status) = on_stream(interp, call, |s| {
        s.read_subset(datatype, &fpixel, &lpixel, &inc, nulval)
    })?;
    let samples = samples.map(|r| Samples {
        values: numeric_array(datatype, r.values),
        any_null: r.any_null,
    });
    Ok(store_samples(interp, call, samples, status))
}

fn ffgpv(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let datatype = datatype(interp, call, 1)?;
    let firstelem = call.int(interp, 2)?;
    let nelem = call.int(interp, 3)?;
    let nulval = call.real_or_zero(interp, 4)?;
    let (samples, status) = on_stream(interp, call, |s| {
        s.read_elements(datatype, firstelem, nelem, nulval)
    })?;
    let samples = samples.map(|r| Samples {
        values: numeric_array(datatype, r.values),
        any_null: r.any_null,
    });
    Ok(store_samples(interp, call, samples, status))
}

fn ffgcv(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let datatype = datatype(interp, call, 1)?;
    let colnum = call.int32(interp, 2)?;
    let firstrow = call.int(interp, 3)?;
    let firstelem = call.int(interp, 4)?;
    let nelem = call.int(interp, 5)?;
    let nulval = call.real_or_zero(interp, 6)?;
    let (samples, status) = on_stream(interp, call, |s| {
        s.read_column(datatype, colnum, firstrow, firstelem, nelem, nulval)
    })?;
    let samples = samples.map(|r| Samples {
        values: column_array(datatype, r.values),
        any_null: r.any_null,
    });
    Ok(store_samples(interp, call, samples, status))
}

fn ffppx(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let datatype = datatype(interp, call, 1)?;
    let firstpix = call.int_array(interp, 2)?;
    let nelem = call.int(interp, 3)?;
    let values = take(call, call.real_array(interp, 4)?, nelem)?;
    chained(interp, call, |s| s.write_pixels(datatype, &firstpix, &values))
}

fn ffpcl(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let datatype = datatype(interp, call, 1)?;
    let colnum = call.int32(interp, 2)?;
    let firstrow = call.int(interp, 3)?;
    let firstelem = call.int(interp, 4)?;
    let nelem = call.int(interp, 5)?;
    let data = match datatype {
        DataType::String => ColumnData::Text(take(call, call.string_array(interp, 6)?, nelem)?),
        DataType::Logical => ColumnData::Logical(
            take(call, call.int_array(interp, 6)?, nelem)?
                .into_iter()
                .map(|n| n != 0)
                .collect(),
        ),
        _ => ColumnData::Numeric(take(call, call.real_array(interp, 6)?, nelem)?),
    };
    chained(interp, call, |s| {
        s.write_column(datatype, colnum, firstrow, firstelem, &data)
    })
}

fn ffirow(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let firstrow = call.int(interp, 1)?;
    let nrows = call.int(interp, 2)?;
    chained(interp, call, |s| s.insert_rows(firstrow, nrows))
}

fn ffdrow(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let firstrow = call.int(interp, 1)?;
    let nrows = call.int(interp, 2)?;
    chained(interp, call, |s| s.delete_rows(firstrow, nrows))
}

fn ffdrws(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let rows = call.int_array(interp, 1)?;
    chained(interp, call, |s| s.delete_row_list(&rows))
}

fn fficol(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let colnum = call.int32(interp, 1)?;
    let ttype = call.string(interp, 2)?;
    let tform = call.string(interp, 3)?;
    chained(interp, call, |s| s.insert_column(colnum, &ttype, &tform))
}

fn fficls(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let colnum = call.int32(interp, 1)?;
    let ncols = call.int(interp, 2)?;
    let ttype = take(call, call.string_array(interp, 3)?, ncols)?;
    let tform = take(call, call.string_array(interp, 4)?, ncols)?;
    chained(interp, call, |s| s.insert_columns(colnum, &ttype, &tform))
}

fn ffmvec(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let colnum = call.int32(interp, 1)?;
    let newveclen = call.int(interp, 2)?;
    status_of(interp, call, |s| s.modify_vector_len(colnum, newveclen))
}

fn ffdcol(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let colnum = call.int32(interp, 1)?;
    chained(interp, call, |s| s.delete_column(colnum))
}
