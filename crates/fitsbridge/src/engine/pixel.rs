//! Big-endian element codec shared by images and table columns.

use bytemuck::pod_collect_to_vec;

use crate::native::{DataType, Samples};
use crate::status::{NativeResult, Status};

/// On-disk type of one numeric element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stored {
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl Stored {
    pub fn from_bitpix(bitpix: i64) -> NativeResult<Self> {
        Ok(match bitpix {
            8 => Stored::U8,
            16 => Stored::I16,
            32 => Stored::I32,
            64 => Stored::I64,
            -32 => Stored::F32,
            -64 => Stored::F64,
            _ => return Err(Status::BAD_BITPIX),
        })
    }

    pub fn size(self) -> usize {
        match self {
            Stored::U8 => 1,
            Stored::I16 => 2,
            Stored::I32 | Stored::F32 => 4,
            Stored::I64 | Stored::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Stored::F32 | Stored::F64)
    }

    /// Decode a run of big-endian elements.
    pub fn decode(self, raw: &[u8]) -> Vec<f64> {
        match self {
            Stored::U8 => raw.iter().map(|&b| f64::from(b)).collect(),
            Stored::I16 => {
                let values: Vec<i16> = pod_collect_to_vec(raw);
                values.into_iter().map(|v| f64::from(i16::from_be(v))).collect()
            }
            Stored::I32 => {
                let values: Vec<i32> = pod_collect_to_vec(raw);
                values.into_iter().map(|v| f64::from(i32::from_be(v))).collect()
            }
            Stored::I64 => {
                let values: Vec<i64> = pod_collect_to_vec(raw);
                values.into_iter().map(|v| i64::from_be(v) as f64).collect()
            }
            Stored::F32 => {
                let values: Vec<u32> = pod_collect_to_vec(raw);
                values
                    .into_iter()
                    .map(|v| f64::from(f32::from_bits(u32::from_be(v))))
                    .collect()
            }
            Stored::F64 => {
                let values: Vec<u64> = pod_collect_to_vec(raw);
                values
                    .into_iter()
                    .map(|v| f64::from_bits(u64::from_be(v)))
                    .collect()
            }
        }
    }

    /// Encode one stored-domain value into `out` (exactly [`size`](Self::size)
    /// bytes). Integers are rounded to nearest; out-of-range values fail with
    /// NUM_OVERFLOW.
    pub fn encode(self, value: f64, out: &mut [u8]) -> NativeResult<()> {
        match self {
            Stored::F32 => out.copy_from_slice(&(value as f32).to_be_bytes()),
            Stored::F64 => out.copy_from_slice(&value.to_be_bytes()),
            Stored::U8 => out[0] = round_into(value, 0.0, u8::MAX as f64)? as u8,
            Stored::I16 => out.copy_from_slice(
                &(round_into(value, i16::MIN as f64, i16::MAX as f64)? as i16).to_be_bytes(),
            ),
            Stored::I32 => out.copy_from_slice(
                &(round_into(value, i32::MIN as f64, i32::MAX as f64)? as i32).to_be_bytes(),
            ),
            Stored::I64 => out.copy_from_slice(
                &(round_into(value, i64::MIN as f64, i64::MAX as f64)? as i64).to_be_bytes(),
            ),
        }
        Ok(())
    }
}

fn round_into(value: f64, lo: f64, hi: f64) -> NativeResult<f64> {
    let r = libm::round(value);
    if r.is_nan() || r < lo || r > hi {
        return Err(Status::NUM_OVERFLOW);
    }
    Ok(r)
}

/// Linear calibration and null marker of an image or column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaling {
    pub scale: f64,
    pub zero: f64,
    /// Integer value marking an undefined element.
    pub blank: Option<i64>,
}

impl Default for Scaling {
    fn default() -> Self {
        Scaling {
            scale: 1.0,
            zero: 0.0,
            blank: None,
        }
    }
}

impl Scaling {
    fn is_null(&self, stored: Stored, raw: f64) -> bool {
        if stored.is_float() {
            raw.is_nan()
        } else {
            self.blank == Some(raw as i64)
        }
    }

    /// Turn decoded stored values into physical values of `datatype`.
    ///
    /// Undefined elements become `nulval`, unless `nulval` is 0, in which
    /// case no null checking is done.
    pub fn to_physical(
        &self,
        stored: Stored,
        raw: Vec<f64>,
        datatype: DataType,
        nulval: f64,
    ) -> NativeResult<Samples<Vec<f64>>> {
        let check_nulls = nulval != 0.0;
        let mut any_null = false;
        let values = raw
            .into_iter()
            .map(|r| {
                if check_nulls && self.is_null(stored, r) {
                    any_null = true;
                    return Ok(nulval);
                }
                datatype.convert(r * self.scale + self.zero)
            })
            .collect::<NativeResult<Vec<f64>>>()?;
        Ok(Samples { values, any_null })
    }

    /// Inverse calibration of one physical value. NaN maps to the null
    /// marker of integer storage.
    pub fn to_stored(&self, stored: Stored, physical: f64) -> NativeResult<f64> {
        if physical.is_nan() && !stored.is_float() {
            return self.blank.map(|b| b as f64).ok_or(Status::NUM_OVERFLOW);
        }
        Ok((physical - self.zero) / self.scale)
    }

    /// Encode physical values into consecutive elements of `out`.
    pub fn encode_all(&self, stored: Stored, values: &[f64], out: &mut [u8]) -> NativeResult<()> {
        for (v, chunk) in values.iter().zip(out.chunks_exact_mut(stored.size())) {
            stored.encode(self.to_stored(stored, *v)?, chunk)?;
        }
        Ok(())
    }
}
