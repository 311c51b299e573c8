//! Analytic power spectrum of biquad sections
//!
//! Evaluates `|H(e^jw)|^2` on an inclusive DC-to-Nyquist grid straight from
//! the coefficients; no transform involved. The cosine tables are computed
//! once per grid and shared across evaluations, and cascade responses
//! multiply bin by bin.

use vq_core::{Sample, VqError, VqResult};

use crate::biquad::BiquadCoeffs;

/// Default grid resolution, 2^8 + 1 bins from DC to Nyquist inclusive.
pub const DEFAULT_BANDS: usize = 257;

const DENOMINATOR_FLOOR: f64 = 1e-20;

/// Squared magnitude of one section at a single normalized frequency
/// `omega` in radians per sample.
pub fn power_response(coeffs: &BiquadCoeffs, omega: f64) -> f64 {
    bin_power(coeffs, omega.cos(), (2.0 * omega).cos())
}

#[inline]
fn bin_power(c: &BiquadCoeffs, cos_w: f64, cos_2w: f64) -> f64 {
    let num = c.b0 * c.b0
        + c.b1 * c.b1
        + c.b2 * c.b2
        + 2.0 * (c.b0 * c.b1 + c.b1 * c.b2) * cos_w
        + 2.0 * c.b0 * c.b2 * cos_2w;
    let den = 1.0
        + c.a1 * c.a1
        + c.a2 * c.a2
        + 2.0 * (c.a1 + c.a1 * c.a2) * cos_w
        + 2.0 * c.a2 * cos_2w;
    // rounding can push either expansion a hair negative
    num.max(0.0) / den.max(DENOMINATOR_FLOOR)
}

/// Power spectrum evaluator over a fixed frequency grid.
///
/// Bin k sits at `omega_k = pi * k / (n_bins - 1)`, so the first bin is DC
/// and the last is Nyquist.
#[derive(Debug, Clone)]
pub struct PowerSpectrum {
    cos_w: Vec<f64>,
    cos_2w: Vec<f64>,
}

impl PowerSpectrum {
    /// Build the cosine tables for an `n_bins` grid. At least two bins are
    /// required to span DC and Nyquist.
    pub fn new(n_bins: usize) -> VqResult<Self> {
        if n_bins < 2 {
            return Err(VqError::InvalidParameter {
                name: "n_bins",
                value: n_bins as f64,
            });
        }
        Ok(Self::build(n_bins))
    }

    fn build(n_bins: usize) -> Self {
        let step = std::f64::consts::PI / (n_bins - 1) as f64;
        let cos_w = (0..n_bins).map(|k| (step * k as f64).cos()).collect();
        let cos_2w = (0..n_bins).map(|k| (2.0 * step * k as f64).cos()).collect();
        Self { cos_w, cos_2w }
    }

    #[inline]
    pub fn n_bins(&self) -> usize {
        self.cos_w.len()
    }

    /// Bin center frequencies in Hz for the given sample rate.
    pub fn frequencies(&self, sample_rate: Sample) -> Vec<f64> {
        let span = 2.0 * (self.n_bins() - 1) as f64;
        (0..self.n_bins())
            .map(|k| k as f64 * sample_rate / span)
            .collect()
    }

    /// Power of one section over the whole grid.
    pub fn evaluate(&self, coeffs: &BiquadCoeffs) -> Vec<f64> {
        let mut out = vec![0.0; self.n_bins()];
        self.fill_section(coeffs, &mut out);
        out
    }

    pub fn evaluate_into(&self, coeffs: &BiquadCoeffs, out: &mut [f64]) -> VqResult<()> {
        self.check_len(out.len())?;
        self.fill_section(coeffs, out);
        Ok(())
    }

    /// Combined power of a serial coefficient stack. An empty stack is
    /// unity at every bin.
    pub fn evaluate_cascade(&self, stack: &[BiquadCoeffs]) -> Vec<f64> {
        let mut out = vec![1.0; self.n_bins()];
        self.fill_cascade(stack, &mut out);
        out
    }

    /// As [`PowerSpectrum::evaluate_cascade`] but into a caller buffer,
    /// multiplying per bin without scratch allocation.
    pub fn evaluate_cascade_into(&self, stack: &[BiquadCoeffs], out: &mut [f64]) -> VqResult<()> {
        self.check_len(out.len())?;
        self.fill_cascade(stack, out);
        Ok(())
    }

    fn check_len(&self, actual: usize) -> VqResult<()> {
        if actual != self.n_bins() {
            return Err(VqError::SizeMismatch {
                expected: self.n_bins(),
                actual,
            });
        }
        Ok(())
    }

    fn fill_section(&self, coeffs: &BiquadCoeffs, out: &mut [f64]) {
        for (i, value) in out.iter_mut().enumerate() {
            *value = bin_power(coeffs, self.cos_w[i], self.cos_2w[i]);
        }
    }

    fn fill_cascade(&self, stack: &[BiquadCoeffs], out: &mut [f64]) {
        out.fill(1.0);
        for coeffs in stack {
            for (i, value) in out.iter_mut().enumerate() {
                *value *= bin_power(coeffs, self.cos_w[i], self.cos_2w[i]);
            }
        }
    }
}

impl Default for PowerSpectrum {
    fn default() -> Self {
        Self::build(DEFAULT_BANDS)
    }
}
