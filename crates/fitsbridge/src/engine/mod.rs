//! Disk-backed native FITS engine.
//!
//! [`DiskLibrary`] reads a whole file into memory on open, edits it there
//! and writes it back on close when it was opened read-write and changed.
//! Failing routines leave a message on a per-thread error stack that
//! [`FitsLibrary::next_message`] drains oldest first.

mod checksum;
mod image;
mod keys;
mod pixel;
mod table;
mod unit;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::native::{
    ColumnData, ColumnInfo, ColumnMatch, DataType, FitsLibrary, FitsStream, HduType, IoMode,
    Samples,
};
use crate::status::{NativeResult, Status};
use crate::value::Value;

pub use self::image::ImageLayout;
pub use self::table::{parse_tform, ColumnKind, TableLayout};
pub use self::unit::{parse_units, serialize_units, Unit};

use self::image::new_image;
use self::table::new_table;

/// Version reported by [`FitsLibrary::version`].
pub const VERSION: f32 = 4.0;

/// Messages kept on the error stack; older ones are dropped.
const MAX_MESSAGES: usize = 25;

thread_local! {
    static MESSAGES: RefCell<VecDeque<String>> = const { RefCell::new(VecDeque::new()) };
}

fn push_message(text: String) {
    log::trace!("error stack: {text}");
    MESSAGES.with(|stack| {
        let mut stack = stack.borrow_mut();
        if stack.len() == MAX_MESSAGES {
            stack.pop_front();
        }
        stack.push_back(text);
    });
}

/// Leave a message on the error stack when `result` failed.
fn traced<T>(routine: &str, result: NativeResult<T>) -> NativeResult<T> {
    if let Err(status) = &result {
        push_message(format!("{routine}: {}", status.text()));
    }
    result
}

fn local_path(name: &str) -> &str {
    name.strip_prefix("file://").unwrap_or(name)
}

/// The native library backed by plain files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskLibrary;

impl DiskLibrary {
    /// Pixels of image HDU `hdunum` of a file, as an array in C order.
    #[cfg(feature = "array")]
    pub fn image_array(&self, name: &str, hdunum: i32) -> NativeResult<ndarray::ArrayD<f64>> {
        let bytes = fs::read(local_path(name)).map_err(|_| Status::FILE_NOT_OPENED)?;
        let units = parse_units(&bytes)?;
        let unit = usize::try_from(hdunum - 1)
            .ok()
            .and_then(|i| units.get(i))
            .ok_or(Status::BAD_HDU_NUM)?;
        ImageLayout::of(unit)?.to_array(unit)
    }
}

impl FitsLibrary for DiskLibrary {
    fn open(&self, name: &str, mode: IoMode) -> NativeResult<Box<dyn FitsStream>> {
        let path = PathBuf::from(local_path(name));
        let opened = fs::read(&path)
            .map_err(|_| Status::FILE_NOT_OPENED)
            .and_then(|bytes| {
                if mode == IoMode::ReadWrite && is_readonly(&path) {
                    return Err(Status::FILE_NOT_OPENED);
                }
                parse_units(&bytes)
            });
        let units = traced("ffopen", opened)?;
        log::debug!("opened {} ({} HDUs, {})", name, units.len(), mode.marker());
        Ok(Box::new(FitsFile::new(name.to_string(), path, mode, units, false)))
    }

    fn create(&self, name: &str) -> NativeResult<Box<dyn FitsStream>> {
        let (clobber, bare) = match name.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, name),
        };
        let path = PathBuf::from(local_path(bare));
        let created = if !clobber && path.exists() {
            Err(Status::FILE_NOT_CREATED)
        } else {
            fs::write(&path, b"").map_err(|_| Status::FILE_NOT_CREATED)
        };
        traced("ffinit", created)?;
        log::debug!("created {bare}");
        Ok(Box::new(FitsFile::new(bare.to_string(), path, IoMode::ReadWrite, Vec::new(), true)))
    }

    fn exists(&self, name: &str) -> NativeResult<i32> {
        let path = Path::new(local_path(name));
        if path.is_file() {
            return Ok(1);
        }
        let compressed = PathBuf::from(format!("{}.gz", path.display()));
        Ok(if compressed.is_file() { 2 } else { 0 })
    }

    fn version(&self) -> f32 {
        VERSION
    }

    fn next_message(&self) -> Option<String> {
        MESSAGES.with(|stack| stack.borrow_mut().pop_front())
    }
}

fn is_readonly(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.permissions().readonly())
        .unwrap_or(false)
}

/// An open file: every HDU in memory plus the current-HDU and header cursors.
#[derive(Debug)]
pub struct FitsFile {
    name: String,
    path: PathBuf,
    mode: IoMode,
    units: Vec<Unit>,
    current: usize,
    /// Index of the next card for sequential header reads.
    cursor: usize,
    modified: bool,
}

impl FitsFile {
    fn new(name: String, path: PathBuf, mode: IoMode, units: Vec<Unit>, modified: bool) -> Self {
        FitsFile {
            name,
            path,
            mode,
            units,
            current: 0,
            cursor: 0,
            modified,
        }
    }

    fn unit(&self) -> NativeResult<&Unit> {
        self.units.get(self.current).ok_or(Status::END_OF_FILE)
    }

    /// The current unit for editing. Writing into an empty file first
    /// creates a null primary array.
    fn writable(&mut self) -> NativeResult<&mut Unit> {
        if self.mode == IoMode::ReadOnly {
            return Err(Status::READONLY_FILE);
        }
        if self.units.is_empty() {
            self.units.push(Unit::null_primary());
            self.current = 0;
        }
        self.modified = true;
        self.units.get_mut(self.current).ok_or(Status::END_OF_FILE)
    }

    fn inspect<T>(&self, routine: &str, f: impl FnOnce(&Unit) -> NativeResult<T>) -> NativeResult<T> {
        traced(routine, self.unit().and_then(f))
    }

    fn edit<T>(&mut self, routine: &str, f: impl FnOnce(&mut Unit) -> NativeResult<T>) -> NativeResult<T> {
        traced(routine, self.writable().and_then(f))
    }

    fn move_to(&mut self, index: usize) -> NativeResult<HduType> {
        let unit = self.units.get(index).ok_or(Status::END_OF_FILE)?;
        let hdu_type = unit.hdu_type();
        self.current = index;
        self.cursor = 0;
        Ok(hdu_type)
    }

    fn append_unit(&mut self, unit: Unit) {
        self.units.push(unit);
        self.current = self.units.len() - 1;
        self.cursor = 0;
        self.modified = true;
    }

    /// Keep the header cursor on the same card after card `removed` went away.
    fn forget_card(&mut self, removed: usize) {
        if removed < self.cursor {
            self.cursor -= 1;
        }
    }

    fn image(&self) -> NativeResult<(&Unit, ImageLayout)> {
        let unit = self.unit()?;
        Ok((unit, ImageLayout::of(unit)?))
    }
}

fn matches_extension(unit: &Unit, hdutype: HduType, extname: &str, extver: i32) -> bool {
    let kind_ok = hdutype == HduType::Any || unit.hdu_type() == hdutype;
    let name_ok = ["EXTNAME", "HDUNAME"].iter().any(|key| {
        unit.string_key(key)
            .is_some_and(|n| n.eq_ignore_ascii_case(extname.trim()))
    });
    let version_ok = extver == 0 || unit.int_key("EXTVER").unwrap_or(1) == i64::from(extver);
    kind_ok && name_ok && version_ok
}

impl FitsStream for FitsFile {
    fn file_name(&self) -> NativeResult<String> {
        Ok(self.name.clone())
    }

    fn url_type(&self) -> NativeResult<String> {
        Ok(String::from("file://"))
    }

    fn io_mode(&self) -> NativeResult<IoMode> {
        Ok(self.mode)
    }

    fn write_key(
        &mut self,
        datatype: DataType,
        keyname: &str,
        value: &Value,
        comment: &str,
    ) -> NativeResult<()> {
        self.edit("ffpky", |u| {
            let value = datatype.coerce_key(value)?;
            u.append_key(keyname, value, comment)
        })
    }

    fn write_comment(&mut self, text: &str) -> NativeResult<()> {
        self.edit("ffpcom", |u| {
            u.append_commentary("COMMENT", text);
            Ok(())
        })
    }

    fn write_key_unit(&mut self, keyname: &str, unit: &str) -> NativeResult<()> {
        self.edit("ffpunt", |u| u.set_unit(keyname, unit))
    }

    fn write_history(&mut self, text: &str) -> NativeResult<()> {
        self.edit("ffphis", |u| {
            u.append_commentary("HISTORY", text);
            Ok(())
        })
    }

    fn write_date(&mut self) -> NativeResult<()> {
        self.edit("ffpdat", |u| u.stamp_date(SystemTime::now()))
    }

    fn write_checksum(&mut self) -> NativeResult<()> {
        self.edit("ffpcks", |u| {
            u.stamp_checksum();
            Ok(())
        })
    }

    fn write_tdim(&mut self, colnum: i32, naxes: &[i64]) -> NativeResult<()> {
        self.edit("ffptdm", |u| table::write_tdim(u, colnum, naxes))
    }

    fn header_space(&self) -> NativeResult<(i32, i32)> {
        self.inspect("ffghsp", |u| Ok(u.header_space()))
    }

    fn next_key(&mut self, include: &[String], exclude: &[String]) -> NativeResult<String> {
        let cursor = self.cursor;
        let found = self.unit().and_then(|u| {
            let i = u.next_matching(cursor, include, exclude)?;
            Ok((i, u.cards[i].to_record()))
        });
        traced("ffgnxk", found).map(|(i, record)| {
            self.cursor = i + 1;
            record
        })
    }

    fn read_record(&mut self, nrec: i32) -> NativeResult<String> {
        if nrec == 0 {
            self.cursor = 0;
            return Ok(String::new());
        }
        let found = self.unit().and_then(|u| {
            let i = u.record_index(nrec)?;
            Ok((i, u.cards[i].to_record()))
        });
        traced("ffgrec", found).map(|(i, record)| {
            self.cursor = i + 1;
            record
        })
    }

    fn read_card(&mut self, keyname: &str) -> NativeResult<String> {
        let cursor = self.cursor;
        let found = self.unit().and_then(|u| {
            let i = u.find_key(keyname, cursor)?;
            Ok((i, u.cards[i].to_record()))
        });
        traced("ffgcrd", found).map(|(i, record)| {
            self.cursor = i + 1;
            record
        })
    }

    fn read_key_unit(&mut self, keyname: &str) -> NativeResult<String> {
        self.inspect("ffgunt", |u| u.key_unit(keyname))
    }

    fn read_key(&mut self, datatype: DataType, keyname: &str) -> NativeResult<(Value, String)> {
        let cursor = self.cursor;
        let found = self.unit().and_then(|u| {
            let i = u.find_key(keyname, cursor)?;
            let card = &u.cards[i];
            let value = match &card.value {
                None | Some(Value::Undefined) => return Err(Status::VALUE_UNDEFINED),
                Some(v) => datatype.coerce_key(v)?,
            };
            Ok((i, value, card.comment.clone().unwrap_or_default()))
        });
        traced("ffgky", found).map(|(i, value, comment)| {
            self.cursor = i + 1;
            (value, comment)
        })
    }

    fn read_tdim(&self, colnum: i32) -> NativeResult<Vec<i64>> {
        self.inspect("ffgtdm", |u| table::read_tdim(u, colnum))
    }

    fn update_key(
        &mut self,
        datatype: DataType,
        keyname: &str,
        value: &Value,
        comment: &str,
    ) -> NativeResult<()> {
        self.edit("ffuky", |u| {
            let value = datatype.coerce_key(value)?;
            u.update_key(keyname, value, comment)
        })
    }

    fn update_key_null(&mut self, keyname: &str, comment: &str) -> NativeResult<()> {
        self.edit("ffukyu", |u| u.update_key(keyname, Value::Undefined, comment))
    }

    fn rename_key(&mut self, oldname: &str, newname: &str) -> NativeResult<()> {
        self.edit("ffmnam", |u| u.rename_key(oldname, newname))
    }

    fn modify_comment(&mut self, keyname: &str, comment: &str) -> NativeResult<()> {
        self.edit("ffmcom", |u| u.set_comment(keyname, comment))
    }

    fn delete_key(&mut self, keyname: &str) -> NativeResult<()> {
        let removed = self.edit("ffdkey", |u| u.remove_key(keyname))?;
        self.forget_card(removed);
        Ok(())
    }

    fn delete_record(&mut self, keynum: i32) -> NativeResult<()> {
        let removed = self.edit("ffdrec", |u| u.remove_record(keynum))?;
        self.forget_card(removed);
        Ok(())
    }

    fn hdu_num(&self) -> i32 {
        self.current as i32 + 1
    }

    fn hdu_type(&self) -> NativeResult<HduType> {
        Ok(self.unit().map_or(HduType::Image, Unit::hdu_type))
    }

    fn delete_hdu(&mut self) -> NativeResult<HduType> {
        let deleted = self.writable().map(|_| ()).and_then(|()| {
            if self.current == 0 {
                // The primary HDU cannot go away; it becomes a null array.
                self.units[0] = Unit::null_primary();
                return self.move_to(0);
            }
            self.units.remove(self.current);
            let next = self.current.min(self.units.len() - 1);
            self.move_to(next)
        });
        traced("ffdhdu", deleted)
    }

    fn image_type(&self) -> NativeResult<i32> {
        traced("ffgidt", self.image().map(|(_, l)| l.bitpix as i32))
    }

    fn image_dim(&self) -> NativeResult<i32> {
        traced("ffgidm", self.image().map(|(_, l)| l.naxes.len() as i32))
    }

    fn image_size(&self) -> NativeResult<Vec<i64>> {
        traced("ffgisz", self.image().map(|(_, l)| l.naxes))
    }

    fn move_abs_hdu(&mut self, hdunum: i32) -> NativeResult<HduType> {
        let moved = if hdunum < 1 {
            Err(Status::BAD_HDU_NUM)
        } else {
            self.move_to(hdunum as usize - 1)
        };
        traced("ffmahd", moved)
    }

    fn move_rel_hdu(&mut self, offset: i32) -> NativeResult<HduType> {
        let target = self.current as i64 + i64::from(offset);
        let moved = if target < 0 {
            Err(Status::BAD_HDU_NUM)
        } else {
            self.move_to(target as usize)
        };
        traced("ffmrhd", moved)
    }

    fn move_named_hdu(&mut self, hdutype: HduType, extname: &str, extver: i32) -> NativeResult<()> {
        let found = self
            .units
            .iter()
            .position(|u| matches_extension(u, hdutype, extname, extver))
            .ok_or(Status::BAD_HDU_NUM)
            .and_then(|i| self.move_to(i))
            .map(|_| ());
        traced("ffmnhd", found)
    }

    fn num_hdus(&self) -> NativeResult<i32> {
        Ok(self.units.len() as i32)
    }

    fn create_image(&mut self, bitpix: i32, naxes: &[i64]) -> NativeResult<()> {
        let created = if self.mode == IoMode::ReadOnly {
            Err(Status::READONLY_FILE)
        } else {
            new_image(self.units.is_empty(), bitpix, naxes)
        };
        let unit = traced("ffcrim", created)?;
        self.append_unit(unit);
        Ok(())
    }

    fn create_table(
        &mut self,
        tbltype: HduType,
        nrows: i64,
        ttype: &[String],
        tform: &[String],
        tunit: &[String],
        extname: &str,
    ) -> NativeResult<()> {
        let created = if self.mode == IoMode::ReadOnly {
            Err(Status::READONLY_FILE)
        } else {
            new_table(tbltype, nrows, ttype, tform, tunit, extname)
        };
        let unit = traced("ffcrtb", created)?;
        if self.units.is_empty() {
            self.units.push(Unit::null_primary());
        }
        self.append_unit(unit);
        Ok(())
    }

    fn column_lookup(&mut self, case_sensitive: bool, template: &str) -> NativeResult<ColumnMatch> {
        self.inspect("ffgcno", |u| TableLayout::of(u)?.lookup(case_sensitive, template))
    }

    fn column_type(&self, colnum: i32) -> NativeResult<ColumnInfo> {
        self.inspect("ffgtcl", |u| Ok(TableLayout::of(u)?.column(colnum)?.info()))
    }

    fn num_cols(&self) -> NativeResult<i32> {
        self.inspect("ffgncl", |u| Ok(TableLayout::of(u)?.columns.len() as i32))
    }

    fn num_rows(&self) -> NativeResult<i64> {
        self.inspect("ffgnrw", |u| Ok(TableLayout::of(u)?.naxis2 as i64))
    }

    fn read_pixels(
        &self,
        datatype: DataType,
        firstpix: &[i64],
        nelem: i64,
        nulval: f64,
    ) -> NativeResult<Samples<Vec<f64>>> {
        let read = self.image().and_then(|(unit, layout)| {
            let start = layout.linear_index(firstpix)?;
            let nelem = usize::try_from(nelem).map_err(|_| Status::BAD_ELEM_NUM)?;
            layout.read_run(unit, datatype, start, nelem, nulval)
        });
        traced("ffgpxv", read)
    }

    fn read_subset(
        &self,
        datatype: DataType,
        fpixel: &[i64],
        lpixel: &[i64],
        inc: &[i64],
        nulval: f64,
    ) -> NativeResult<Samples<Vec<f64>>> {
        let read = self.image().and_then(|(unit, layout)| {
            let indices = layout.subset_indices(fpixel, lpixel, inc)?;
            layout.read_at(unit, datatype, &indices, nulval)
        });
        traced("ffgsv", read)
    }

    fn read_elements(
        &self,
        datatype: DataType,
        firstelem: i64,
        nelem: i64,
        nulval: f64,
    ) -> NativeResult<Samples<Vec<f64>>> {
        let read = self.image().and_then(|(unit, layout)| {
            if firstelem < 1 || nelem < 0 {
                return Err(Status::BAD_ELEM_NUM);
            }
            layout.read_run(unit, datatype, firstelem as usize - 1, nelem as usize, nulval)
        });
        traced("ffgpv", read)
    }

    fn read_column(
        &self,
        datatype: DataType,
        colnum: i32,
        firstrow: i64,
        firstelem: i64,
        nelem: i64,
        nulval: f64,
    ) -> NativeResult<Samples<ColumnData>> {
        self.inspect("ffgcv", |u| {
            TableLayout::binary(u)?.read(u, datatype, colnum, firstrow, firstelem, nelem, nulval)
        })
    }

    fn write_pixels(&mut self, datatype: DataType, firstpix: &[i64], values: &[f64]) -> NativeResult<()> {
        self.edit("ffppx", |u| {
            let layout = ImageLayout::of(u)?;
            let start = layout.linear_index(firstpix)?;
            layout.write_run(u, datatype, start, values)
        })
    }

    fn write_column(
        &mut self,
        datatype: DataType,
        colnum: i32,
        firstrow: i64,
        firstelem: i64,
        data: &ColumnData,
    ) -> NativeResult<()> {
        self.edit("ffpcl", |u| {
            TableLayout::binary(u)?.write(u, datatype, colnum, firstrow, firstelem, data)
        })
    }

    fn insert_rows(&mut self, firstrow: i64, nrows: i64) -> NativeResult<()> {
        self.edit("ffirow", |u| table::insert_rows(u, firstrow, nrows))
    }

    fn delete_rows(&mut self, firstrow: i64, nrows: i64) -> NativeResult<()> {
        self.edit("ffdrow", |u| table::delete_rows(u, firstrow, nrows))
    }

    fn delete_row_list(&mut self, rows: &[i64]) -> NativeResult<()> {
        self.edit("ffdrws", |u| table::delete_row_list(u, rows))
    }

    fn insert_column(&mut self, colnum: i32, ttype: &str, tform: &str) -> NativeResult<()> {
        self.edit("fficol", |u| table::insert_column(u, colnum, ttype, tform))
    }

    fn insert_columns(&mut self, colnum: i32, ttype: &[String], tform: &[String]) -> NativeResult<()> {
        self.edit("fficls", |u| {
            for (i, form) in tform.iter().enumerate() {
                let name = ttype.get(i).map(String::as_str).unwrap_or("");
                table::insert_column(u, colnum + i as i32, name, form)?;
            }
            Ok(())
        })
    }

    fn modify_vector_len(&mut self, colnum: i32, newveclen: i64) -> NativeResult<()> {
        self.edit("ffmvec", |u| table::modify_vector_len(u, colnum, newveclen))
    }

    fn delete_column(&mut self, colnum: i32) -> NativeResult<()> {
        self.edit("ffdcol", |u| table::delete_column(u, colnum))
    }

    fn close(self: Box<Self>) -> NativeResult<()> {
        if self.mode == IoMode::ReadOnly || !self.modified {
            log::debug!("closed {}", self.name);
            return Ok(());
        }
        let bytes = if self.units.is_empty() {
            serialize_units(&[Unit::null_primary()])
        } else {
            serialize_units(&self.units)
        };
        let written = fs::write(&self.path, bytes).map_err(|_| Status::WRITE_ERROR);
        traced("ffclos", written)?;
        log::debug!("wrote and closed {}", self.name);
        Ok(())
    }

    fn delete(self: Box<Self>) -> NativeResult<()> {
        let removed = fs::remove_file(&self.path).map_err(|_| Status::FILE_NOT_CLOSED);
        traced("ffdelt", removed)?;
        log::debug!("deleted {}", self.name);
        Ok(())
    }
}
