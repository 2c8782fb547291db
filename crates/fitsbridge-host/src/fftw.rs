//! One-shot discrete Fourier transforms.
//!
//! Transforms follow FFTW's conventions: no normalization, a backward
//! complex transform uses `exp(+2 pi i j k / n)`, and the real transform
//! packs its result in halfcomplex order. Powers of two go through an
//! iterative radix-2 FFT; every other length through Bluestein's chirp-z
//! algorithm on top of it, so any positive size works.

use core::f64::consts::PI;
use core::ops::{Add, Mul, Sub};

use crate::error::Result;
use crate::interp::{Call, Interp};
use crate::value::Value;

/// A double-precision complex number.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }

    /// `exp(i theta)`.
    pub fn cis(theta: f64) -> Self {
        Complex::new(theta.cos(), theta.sin())
    }

    pub fn conj(self) -> Self {
        Complex::new(self.re, -self.im)
    }

    pub fn scale(self, k: f64) -> Self {
        Complex::new(self.re * k, self.im * k)
    }

    pub fn norm(self) -> f64 {
        self.re.hypot(self.im)
    }
}

impl Add for Complex {
    type Output = Complex;
    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Complex;
    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Complex;
    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

const FORWARD: f64 = -1.0;
const BACKWARD: f64 = 1.0;

/// In-place radix-2 transform. `buf.len()` must be a power of two.
fn radix2(buf: &mut [Complex], sign: f64) {
    let n = buf.len();
    if n < 2 {
        return;
    }
    let bits = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - bits);
        if i < j {
            buf.swap(i, j);
        }
    }
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let twiddles: Vec<Complex> = (0..half)
            .map(|k| Complex::cis(sign * 2.0 * PI * k as f64 / len as f64))
            .collect();
        for chunk in buf.chunks_exact_mut(len) {
            let (lo, hi) = chunk.split_at_mut(half);
            for ((a, b), w) in lo.iter_mut().zip(hi.iter_mut()).zip(&twiddles) {
                let t = *b * *w;
                *b = *a - t;
                *a = *a + t;
            }
        }
        len *= 2;
    }
}

/// Chirp `exp(sign i pi m^2 / n)`, with `m^2` reduced modulo `2n` to keep
/// the angle small.
fn chirp(m: usize, n: usize, sign: f64) -> Complex {
    let m = m as u128;
    let r = (m * m) % (2 * n as u128);
    Complex::cis(sign * PI * r as f64 / n as f64)
}

/// Arbitrary-length transform as a convolution of power-of-two size.
fn bluestein(input: &[Complex], sign: f64) -> Vec<Complex> {
    let n = input.len();
    let m = (2 * n - 1).next_power_of_two();
    let w: Vec<Complex> = (0..n).map(|k| chirp(k, n, sign)).collect();

    let mut a = vec![Complex::default(); m];
    for (slot, (x, wk)) in a.iter_mut().zip(input.iter().zip(&w)) {
        *slot = *x * *wk;
    }
    let mut b = vec![Complex::default(); m];
    b[0] = w[0].conj();
    for k in 1..n {
        b[k] = w[k].conj();
        b[m - k] = w[k].conj();
    }

    radix2(&mut a, FORWARD);
    radix2(&mut b, FORWARD);
    for (x, y) in a.iter_mut().zip(&b) {
        *x = *x * *y;
    }
    radix2(&mut a, BACKWARD);

    let inv = 1.0 / m as f64;
    w.iter()
        .zip(&a)
        .map(|(wk, c)| *wk * c.scale(inv))
        .collect()
}

fn transform(input: &[Complex], sign: f64) -> Vec<Complex> {
    if input.len() < 2 {
        return input.to_vec();
    }
    if input.len().is_power_of_two() {
        let mut buf = input.to_vec();
        radix2(&mut buf, sign);
        buf
    } else {
        bluestein(input, sign)
    }
}

/// Unnormalized backward transform of the first `n` values.
pub fn complex_1d(input: &[Complex], n: usize) -> Vec<Complex> {
    transform(&input[..n.min(input.len())], BACKWARD)
}

/// Forward real-to-complex transform of the first `n` values, in
/// halfcomplex order: `r0, r1, ..., r(n/2), i((n+1)/2-1), ..., i1`.
pub fn real_1d(input: &[f64], n: usize) -> Vec<f64> {
    let n = n.min(input.len());
    let spectrum: Vec<Complex> = input[..n].iter().map(|&x| Complex::new(x, 0.0)).collect();
    let spectrum = transform(&spectrum, FORWARD);
    let mut out = vec![0.0; n];
    for (slot, c) in out.iter_mut().zip(&spectrum).take(n / 2 + 1) {
        *slot = c.re;
    }
    for k in 1..(n + 1) / 2 {
        out[n - k] = spectrum[k].im;
    }
    out
}

pub(crate) fn register(interp: &mut Interp) {
    interp.register("fftwComplex1D", 2, fftw_complex_1d);
    interp.register("fftwReal1D", 2, fftw_real_1d);
}

/// Validate a transform size against the input length.
fn size(call: &Call<'_>, n: i64, len: usize) -> Result<usize> {
    match usize::try_from(n) {
        Ok(n) if n >= 1 && n <= len => Ok(n),
        Ok(n) if n >= 1 => Err(call.argument_error(format!(
            "input holds {len} values, transform size is {n}"
        ))),
        _ => Err(call.argument_error(format!("transform size must be positive, got {n}"))),
    }
}

fn fftw_complex_1d(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let input = call.complex_array(interp, 0)?;
    let n = size(call, call.int(interp, 1)?, input.len())?;
    log::trace!("complex backward transform of size {n}");
    Ok(Value::ComplexArray(complex_1d(&input, n)))
}

fn fftw_real_1d(interp: &mut Interp, call: &Call<'_>) -> Result<Value> {
    let input = call.real_array(interp, 0)?;
    let n = size(call, call.int(interp, 1)?, input.len())?;
    log::trace!("real forward transform of size {n}");
    Ok(Value::RealArray(real_1d(&input, n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::Arg;

    fn naive(input: &[Complex], sign: f64) -> Vec<Complex> {
        let n = input.len();
        (0..n)
            .map(|k| {
                input.iter().enumerate().fold(Complex::default(), |acc, (j, x)| {
                    let theta = sign * 2.0 * PI * ((j * k) % n) as f64 / n as f64;
                    acc + *x * Complex::cis(theta)
                })
            })
            .collect()
    }

    fn signal(n: usize) -> Vec<Complex> {
        (0..n)
            .map(|j| Complex::new((j as f64 * 0.7).sin() + 0.25, (j as f64 * 1.3).cos()))
            .collect()
    }

    fn assert_close(a: &[Complex], b: &[Complex]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((*x - *y).norm() < 1e-9, "{x:?} != {y:?}");
        }
    }

    #[test]
    fn power_of_two_matches_naive_dft() {
        let input = signal(16);
        assert_close(&complex_1d(&input, 16), &naive(&input, BACKWARD));
    }

    #[test]
    fn other_sizes_match_naive_dft() {
        for n in [1, 3, 5, 6, 7, 12, 31] {
            let input = signal(n);
            assert_close(&complex_1d(&input, n), &naive(&input, BACKWARD));
        }
    }

    #[test]
    fn backward_of_impulse_at_one() {
        let mut input = vec![Complex::default(); 4];
        input[1] = Complex::new(1.0, 0.0);
        let out = complex_1d(&input, 4);
        assert_close(
            &out,
            &[
                Complex::new(1.0, 0.0),
                Complex::new(0.0, 1.0),
                Complex::new(-1.0, 0.0),
                Complex::new(0.0, -1.0),
            ],
        );
    }

    #[test]
    fn halfcomplex_layout() {
        for n in [4, 5] {
            let reals: Vec<f64> = (0..n).map(|j| (j * j) as f64 - 1.5).collect();
            let input: Vec<Complex> = reals.iter().map(|&x| Complex::new(x, 0.0)).collect();
            let spectrum = naive(&input, FORWARD);
            let out = real_1d(&reals, n);
            assert_eq!(out.len(), n);
            for k in 0..=n / 2 {
                assert!((out[k] - spectrum[k].re).abs() < 1e-9);
            }
            for k in 1..(n + 1) / 2 {
                assert!((out[n - k] - spectrum[k].im).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn builtins_check_the_size() {
        let mut interp = Interp::with_disk();
        let input = Arg::Value(Value::RealArray(vec![1.0, 2.0, 3.0]));
        let err = interp
            .call("fftwReal1D", &[input.clone(), Arg::from(0i64)])
            .unwrap_err();
        assert_eq!(err.to_string(), "fftwReal1D: transform size must be positive, got 0");
        let err = interp
            .call("fftwReal1D", &[input.clone(), Arg::from(4i64)])
            .unwrap_err();
        assert_eq!(err.to_string(), "fftwReal1D: input holds 3 values, transform size is 4");

        let out = interp.call("fftwReal1D", &[input, Arg::from(3i64)]).unwrap();
        let Value::RealArray(out) = out else {
            panic!("expected a real array")
        };
        assert!((out[0] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn complex_builtin_uses_first_n_values() {
        let mut interp = Interp::with_disk();
        let input = Value::ComplexArray(vec![Complex::new(1.0, 0.0), Complex::new(2.0, 0.0), Complex::new(9.0, 9.0)]);
        let out = interp
            .call("fftwComplex1D", &[Arg::Value(input), Arg::from(2i64)])
            .unwrap();
        assert_eq!(
            out,
            Value::ComplexArray(vec![Complex::new(3.0, 0.0), Complex::new(-1.0, 0.0)])
        );
    }
}
