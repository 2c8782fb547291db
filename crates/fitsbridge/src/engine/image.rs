//! Image HDUs: creation, geometry and pixel I/O with BSCALE/BZERO/BLANK.

use super::pixel::{Scaling, Stored};
use super::unit::Unit;
use crate::header::Card;
use crate::native::{DataType, HduType, Samples};
use crate::status::{NativeResult, Status};
use crate::value::Value;

/// Build a new image unit. The primary array carries SIMPLE and EXTEND, an
/// extension carries XTENSION, PCOUNT and GCOUNT.
pub fn new_image(primary: bool, bitpix: i32, naxes: &[i64]) -> NativeResult<Unit> {
    let stored = Stored::from_bitpix(i64::from(bitpix))?;
    if naxes.len() > 999 {
        return Err(Status::BAD_NAXIS);
    }
    if naxes.iter().any(|&n| n < 0) {
        return Err(Status::NEG_AXIS);
    }

    let mut cards = Vec::with_capacity(naxes.len() + 6);
    if primary {
        cards.push(Card::new("SIMPLE", Value::Logical(true), Some("file does conform to FITS standard")));
    } else {
        cards.push(Card::new("XTENSION", Value::String(String::from("IMAGE")), Some("IMAGE extension")));
    }
    cards.push(Card::new("BITPIX", Value::Integer(i64::from(bitpix)), Some("number of bits per data pixel")));
    cards.push(Card::new("NAXIS", Value::Integer(naxes.len() as i64), Some("number of data axes")));
    for (i, &n) in naxes.iter().enumerate() {
        cards.push(Card::new(
            &format!("NAXIS{}", i + 1),
            Value::Integer(n),
            Some(format!("length of data axis {}", i + 1).as_str()),
        ));
    }
    if primary {
        cards.push(Card::new("EXTEND", Value::Logical(true), Some("FITS dataset may contain extensions")));
    } else {
        cards.push(Card::new("PCOUNT", Value::Integer(0), Some("required keyword; must = 0")));
        cards.push(Card::new("GCOUNT", Value::Integer(1), Some("required keyword; must = 1")));
    }

    let npix: i64 = if naxes.is_empty() { 0 } else { naxes.iter().product() };
    let len = usize::try_from(npix).map_err(|_| Status::BAD_NAXES)? * stored.size();
    Ok(Unit::new(cards, vec![0; len]))
}

/// Geometry and calibration of an image unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayout {
    pub bitpix: i64,
    pub naxes: Vec<i64>,
    pub stored: Stored,
    pub scaling: Scaling,
}

impl ImageLayout {
    pub fn of(unit: &Unit) -> NativeResult<Self> {
        if unit.hdu_type() != HduType::Image {
            return Err(Status::NOT_IMAGE);
        }
        let bitpix = unit.int_key("BITPIX").ok_or(Status::BAD_BITPIX)?;
        Ok(ImageLayout {
            bitpix,
            naxes: unit.naxes()?,
            stored: Stored::from_bitpix(bitpix)?,
            scaling: Scaling {
                scale: unit.float_key("BSCALE").unwrap_or(1.0),
                zero: unit.float_key("BZERO").unwrap_or(0.0),
                blank: unit.int_key("BLANK"),
            },
        })
    }

    pub fn npix(&self) -> usize {
        if self.naxes.is_empty() {
            return 0;
        }
        self.naxes.iter().map(|&n| n.max(0) as usize).product()
    }

    /// 0-based linear offset of 1-based pixel coordinates.
    pub fn linear_index(&self, pixel: &[i64]) -> NativeResult<usize> {
        if pixel.len() < self.naxes.len() || self.naxes.is_empty() {
            return Err(Status::BAD_DIMEN);
        }
        let mut index = 0usize;
        let mut stride = 1usize;
        for (&p, &n) in pixel.iter().zip(&self.naxes) {
            if p < 1 || p > n {
                return Err(Status::BAD_PIX_NUM);
            }
            index += (p - 1) as usize * stride;
            stride *= n as usize;
        }
        Ok(index)
    }

    /// Linear offsets of a strided subset, first axis varying fastest.
    pub fn subset_indices(&self, fpixel: &[i64], lpixel: &[i64], inc: &[i64]) -> NativeResult<Vec<usize>> {
        let naxis = self.naxes.len();
        if naxis == 0 || fpixel.len() < naxis || lpixel.len() < naxis || inc.len() < naxis {
            return Err(Status::BAD_DIMEN);
        }
        let mut axes = Vec::with_capacity(naxis);
        for i in 0..naxis {
            let (f, l, step) = (fpixel[i], lpixel[i], inc[i]);
            if f < 1 || l > self.naxes[i] || f > l {
                return Err(Status::BAD_PIX_NUM);
            }
            if step < 1 {
                return Err(Status::BAD_PIX_NUM);
            }
            axes.push((f..=l).step_by(step as usize).collect::<Vec<i64>>());
        }

        let mut out = Vec::new();
        let mut counter = vec![0usize; naxis];
        let mut pixel: Vec<i64> = axes.iter().map(|a| a[0]).collect();
        loop {
            out.push(self.linear_index(&pixel)?);
            let mut axis = 0;
            loop {
                if axis == naxis {
                    return Ok(out);
                }
                counter[axis] += 1;
                if counter[axis] < axes[axis].len() {
                    pixel[axis] = axes[axis][counter[axis]];
                    break;
                }
                counter[axis] = 0;
                pixel[axis] = axes[axis][0];
                axis += 1;
            }
        }
    }

    fn check_range(&self, start: usize, nelem: usize) -> NativeResult<()> {
        match start.checked_add(nelem) {
            Some(end) if end <= self.npix() => Ok(()),
            _ => Err(Status::END_OF_FILE),
        }
    }

    /// Read `nelem` consecutive pixels from linear offset `start`.
    pub fn read_run(
        &self,
        unit: &Unit,
        datatype: DataType,
        start: usize,
        nelem: usize,
        nulval: f64,
    ) -> NativeResult<Samples<Vec<f64>>> {
        self.check_range(start, nelem)?;
        let size = self.stored.size();
        let raw = unit
            .data
            .get(start * size..(start + nelem) * size)
            .ok_or(Status::END_OF_FILE)?;
        let decoded = self.stored.decode(raw);
        self.scaling.to_physical(self.stored, decoded, datatype, nulval)
    }

    /// Read scattered pixels by linear offset.
    pub fn read_at(
        &self,
        unit: &Unit,
        datatype: DataType,
        indices: &[usize],
        nulval: f64,
    ) -> NativeResult<Samples<Vec<f64>>> {
        let size = self.stored.size();
        let mut raw = Vec::with_capacity(indices.len() * size);
        for &i in indices {
            let bytes = unit
                .data
                .get(i * size..(i + 1) * size)
                .ok_or(Status::END_OF_FILE)?;
            raw.extend_from_slice(bytes);
        }
        let decoded = self.stored.decode(&raw);
        self.scaling.to_physical(self.stored, decoded, datatype, nulval)
    }

    /// Write consecutive pixels from linear offset `start`.
    pub fn write_run(
        &self,
        unit: &mut Unit,
        datatype: DataType,
        start: usize,
        values: &[f64],
    ) -> NativeResult<()> {
        self.check_range(start, values.len())?;
        let converted = values
            .iter()
            .map(|&v| if v.is_nan() { Ok(v) } else { datatype.convert(v) })
            .collect::<NativeResult<Vec<f64>>>()?;
        let size = self.stored.size();
        let end = (start + values.len()) * size;
        if unit.data.len() < self.npix() * size {
            unit.data.resize(self.npix() * size, 0);
        }
        self.scaling
            .encode_all(self.stored, &converted, &mut unit.data[start * size..end])
    }

    /// The whole image as an array in C order (last FITS axis first).
    #[cfg(feature = "array")]
    pub fn to_array(&self, unit: &Unit) -> NativeResult<ndarray::ArrayD<f64>> {
        let samples = self.read_run(unit, DataType::Double, 0, self.npix(), f64::NAN)?;
        let shape: Vec<usize> = self.naxes.iter().rev().map(|&n| n as usize).collect();
        ndarray::ArrayD::from_shape_vec(ndarray::IxDyn(&shape), samples.values)
            .map_err(|_| Status::BAD_DIMEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(unit: &Unit) -> ImageLayout {
        ImageLayout::of(unit).unwrap()
    }

    #[test]
    fn new_image_headers() {
        let primary = new_image(true, 16, &[3, 2]).unwrap();
        assert!(primary.is_primary());
        assert_eq!(primary.data.len(), 12);
        assert_eq!(primary.expected_data_len(), Ok(12));

        let ext = new_image(false, -64, &[]).unwrap();
        assert_eq!(ext.string_key("XTENSION").as_deref(), Some("IMAGE"));
        assert!(ext.data.is_empty());

        assert_eq!(new_image(true, 12, &[1]), Err(Status::BAD_BITPIX));
        assert_eq!(new_image(true, 8, &[-1]), Err(Status::NEG_AXIS));
    }

    #[test]
    fn linear_index_is_fortran_order() {
        let unit = new_image(true, 8, &[4, 3]).unwrap();
        let l = layout(&unit);
        assert_eq!(l.linear_index(&[1, 1]), Ok(0));
        assert_eq!(l.linear_index(&[2, 3]), Ok(9));
        assert_eq!(l.linear_index(&[5, 1]), Err(Status::BAD_PIX_NUM));
        assert_eq!(l.linear_index(&[1]), Err(Status::BAD_DIMEN));
    }

    #[test]
    fn write_then_read_scaled() {
        let mut unit = new_image(true, 16, &[4]).unwrap();
        unit.set_value("BSCALE", Value::Float(0.5), "NAXIS1");
        unit.set_value("BZERO", Value::Float(100.0), "BSCALE");
        let l = layout(&unit);
        l.write_run(&mut unit, DataType::Double, 0, &[100.0, 100.5, 101.0, 90.0])
            .unwrap();
        let got = l.read_run(&unit, DataType::Double, 0, 4, 0.0).unwrap();
        assert_eq!(got.values, vec![100.0, 100.5, 101.0, 90.0]);
        let ints = l.read_run(&unit, DataType::Int, 1, 1, 0.0).unwrap();
        assert_eq!(ints.values, vec![100.0]);
    }

    #[test]
    fn float_nan_is_null() {
        let mut unit = new_image(false, -32, &[3]).unwrap();
        let l = layout(&unit);
        l.write_run(&mut unit, DataType::Float, 0, &[1.0, f64::NAN, 3.0])
            .unwrap();
        let got = l.read_run(&unit, DataType::Double, 0, 3, -1.0).unwrap();
        assert_eq!(got.values, vec![1.0, -1.0, 3.0]);
        assert!(got.any_null);
    }

    #[test]
    fn reading_past_the_end_fails() {
        let unit = new_image(true, 32, &[2, 2]).unwrap();
        let l = layout(&unit);
        assert!(l.read_run(&unit, DataType::Int, 3, 2, 0.0).is_err());
    }

    #[test]
    fn strided_subset() {
        let mut unit = new_image(true, 32, &[4, 3]).unwrap();
        let l = layout(&unit);
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        l.write_run(&mut unit, DataType::Int, 0, &values).unwrap();
        let idx = l.subset_indices(&[1, 1], &[4, 3], &[2, 2]).unwrap();
        assert_eq!(idx, vec![0, 2, 8, 10]);
        let got = l.read_at(&unit, DataType::Long, &idx, 0.0).unwrap();
        assert_eq!(got.values, vec![0.0, 2.0, 8.0, 10.0]);
        assert_eq!(l.subset_indices(&[3, 1], &[2, 1], &[1, 1]), Err(Status::BAD_PIX_NUM));
    }

    #[test]
    fn tables_are_not_images() {
        let mut unit = new_image(false, 8, &[0, 0]).unwrap();
        unit.cards[0].value = Some(Value::String(String::from("BINTABLE")));
        assert_eq!(ImageLayout::of(&unit), Err(Status::NOT_IMAGE));
    }

    #[cfg(feature = "array")]
    #[test]
    fn array_view_is_c_order() {
        let mut unit = new_image(true, 8, &[3, 2]).unwrap();
        let l = layout(&unit);
        l.write_run(&mut unit, DataType::Byte, 0, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        let arr = l.to_array(&unit).unwrap();
        assert_eq!(arr.shape(), &[2, 3]);
        assert_eq!(arr[[1, 0]], 4.0);
    }
}
