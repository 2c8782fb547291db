//! End-to-end tests through the disk engine and owned handles.

use fitsbridge::{
    ColumnData, DataType, DiskLibrary, FitsHandle, FitsLibrary, HduType, IoMode, Release, Status,
    Value, FITS,
};

fn path_in(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_string()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn image_with_keywords_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_in(&dir, "image.fits");

    let mut handle = FitsHandle::new(DiskLibrary.create(&path).unwrap());
    {
        let stream = handle.access().unwrap();
        stream.create_image(16, &[4, 3]).unwrap();
        stream
            .write_key(DataType::String, "OBJECT", &Value::String("M31".into()), "target")
            .unwrap();
        stream
            .update_key(DataType::Double, "BSCALE", &Value::Float(0.5), "")
            .unwrap();
        let pixels: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
        stream.write_pixels(DataType::Double, &[1, 1], &pixels).unwrap();
        stream.write_date().unwrap();
        stream.write_checksum().unwrap();
    }
    assert_eq!(handle.close(), Release::Closed);

    let mut handle = FitsHandle::new(DiskLibrary.open(&path, IoMode::ReadOnly).unwrap());
    let stream = handle.access().unwrap();
    let (object, comment) = stream.read_key(DataType::String, "OBJECT").unwrap();
    assert_eq!(object, Value::String("M31".into()));
    assert_eq!(comment, "target");
    let read = stream.read_elements(DataType::Double, 1, 12, 0.0).unwrap();
    assert_eq!(read.values[11], 5.5);
    assert!(!read.any_null);
    assert_eq!(stream.read_key(DataType::String, "DATE").unwrap().0.to_key_string().len(), 19);
}

#[test]
fn binary_table_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = path_in(&dir, "table.fits");

    let mut handle = FitsHandle::new(DiskLibrary.create(&path).unwrap());
    {
        let stream = handle.access().unwrap();
        stream
            .create_table(
                HduType::BinaryTable,
                0,
                &strings(&["TIME", "RATE", "SRC"]),
                &strings(&["1D", "4E", "6A"]),
                &strings(&["s", "count/s", ""]),
                "LIGHTCURVE",
            )
            .unwrap();
        stream
            .write_column(DataType::Double, 1, 1, 1, &ColumnData::Numeric(vec![0.0, 10.0]))
            .unwrap();
        stream
            .write_column(DataType::String, 3, 1, 1, &ColumnData::Text(strings(&["crab", "vela"])))
            .unwrap();
        stream.write_tdim(2, &[2, 2]).unwrap();
        stream.insert_column(4, "FLAG", "1L").unwrap();
    }
    handle.close();

    let mut handle = FitsHandle::new(DiskLibrary.open(&path, IoMode::ReadWrite).unwrap());
    let stream = handle.access().unwrap();
    stream.move_named_hdu(HduType::BinaryTable, "lightcurve", 0).unwrap();
    assert_eq!(stream.num_rows(), Ok(2));
    assert_eq!(stream.num_cols(), Ok(4));
    assert_eq!(stream.read_tdim(2), Ok(vec![2, 2]));
    let src = stream.read_column(DataType::String, 3, 1, 1, 2, 0.0).unwrap();
    assert_eq!(src.values, ColumnData::Text(strings(&["crab", "vela"])));

    let m = stream.column_lookup(false, "rate").unwrap();
    assert_eq!((m.number, m.unique), (2, true));
    assert_eq!(stream.column_lookup(false, "NOPE"), Err(Status::COL_NOT_FOUND));

    stream.delete_rows(1, 1).unwrap();
    let time = stream.read_column(DataType::Double, 1, 1, 1, 1, 0.0).unwrap();
    assert_eq!(time.values, ColumnData::Numeric(vec![10.0]));
    assert_eq!(handle.close(), Release::Closed);
}

#[test]
fn benign_statuses_do_not_raise() {
    let dir = tempfile::tempdir().unwrap();
    let mut stream = DiskLibrary.create(&path_in(&dir, "benign.fits")).unwrap();
    stream.create_image(8, &[]).unwrap();

    let (value, status) = FITS.settle(stream.read_key(DataType::Int, "MISSING")).unwrap();
    assert!(value.is_none());
    assert_eq!(status, Status::KEY_NO_EXIST);

    let err = FITS.settle(stream.move_abs_hdu(7)).unwrap_err();
    assert_eq!(err.status(), Some(Status::END_OF_FILE));
    assert!(err.to_string().starts_with("fitsbridge\n 107 -> "));
}

#[test]
fn failed_routines_fill_the_message_stack() {
    while DiskLibrary.next_message().is_some() {}
    let dir = tempfile::tempdir().unwrap();
    let mut stream = DiskLibrary.create(&path_in(&dir, "msg.fits")).unwrap();
    stream.create_image(8, &[2]).unwrap();
    assert_eq!(stream.num_rows(), Err(Status::NOT_TABLE));
    assert_eq!(
        DiskLibrary.next_message().as_deref(),
        Some("ffgnrw: the CHDU is not a table")
    );
    assert_eq!(DiskLibrary.next_message(), None);
}
