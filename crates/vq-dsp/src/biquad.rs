//! Fixed-coefficient biquad in Transposed Direct Form II
//!
//! The frozen counterpart of the state-variable core: conversions produce
//! [`BiquadCoeffs`] from section parameters and back (see [`crate::convert`]),
//! and the power spectrum evaluator consumes the same coefficient form.

use vq_core::{Sample, VqError, VqResult};

use crate::{MonoProcessor, Processor};

/// Normalized biquad coefficients (a0 = 1)
///
/// Transfer function `H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Unity gain, no filtering
    pub const fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Build from a full second-order section row, dividing through by `a0`.
    pub fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> VqResult<Self> {
        for (name, value) in [
            ("b0", b0),
            ("b1", b1),
            ("b2", b2),
            ("a0", a0),
            ("a1", a1),
            ("a2", a2),
        ] {
            if !value.is_finite() {
                return Err(VqError::InvalidParameter { name, value });
            }
        }
        if a0 == 0.0 {
            return Err(VqError::InvalidParameter {
                name: "a0",
                value: a0,
            });
        }
        Ok(Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        })
    }

    /// Both poles strictly inside the unit circle:
    /// `|a2| < 1` and `|a1| < 1 + a2`.
    pub fn is_stable(&self) -> bool {
        self.a2.abs() < 1.0 && self.a1.abs() < 1.0 + self.a2
    }
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::bypass()
    }
}

/// Transposed Direct Form II biquad filter
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl BiquadTDF2 {
    pub fn new() -> Self {
        Self {
            coeffs: BiquadCoeffs::bypass(),
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn with_coeffs(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Swap coefficients, keeping the delay state.
    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }
}

impl Default for BiquadTDF2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let output = self.coeffs.b0 * input + self.z1;
        self.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2;
        self.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }
}

/// Serial chain of TDF-II sections with an overall linear gain.
///
/// The gain scales the input before the first section, matching the
/// state-variable [`crate::cascade::Cascade`].
#[derive(Debug, Clone)]
pub struct BiquadCascade {
    sections: Vec<BiquadTDF2>,
    gain: Sample,
}

impl BiquadCascade {
    /// `n_sections` bypass sections at unity gain.
    pub fn new(n_sections: usize) -> Self {
        Self {
            sections: vec![BiquadTDF2::new(); n_sections],
            gain: 1.0,
        }
    }

    pub fn from_coeffs(stack: &[BiquadCoeffs], gain: Sample) -> VqResult<Self> {
        let mut cascade = Self::new(stack.len());
        cascade.set_filters(stack)?;
        cascade.set_gain(gain)?;
        Ok(cascade)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Replace every section's coefficients. State is kept.
    pub fn set_filters(&mut self, stack: &[BiquadCoeffs]) -> VqResult<()> {
        if stack.len() != self.sections.len() {
            return Err(VqError::SizeMismatch {
                expected: self.sections.len(),
                actual: stack.len(),
            });
        }
        for (section, &coeffs) in self.sections.iter_mut().zip(stack) {
            section.set_coeffs(coeffs);
        }
        Ok(())
    }

    /// Coefficient stack, one entry per section.
    pub fn coeffs(&self) -> Vec<BiquadCoeffs> {
        self.sections.iter().map(|s| *s.coeffs()).collect()
    }

    #[inline]
    pub fn gain(&self) -> Sample {
        self.gain
    }

    pub fn set_gain(&mut self, gain: Sample) -> VqResult<()> {
        if !gain.is_finite() {
            return Err(VqError::InvalidParameter {
                name: "gain",
                value: gain,
            });
        }
        self.gain = gain;
        Ok(())
    }
}

impl Processor for BiquadCascade {
    fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

impl MonoProcessor for BiquadCascade {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let mut acc = self.gain * input;
        for section in &mut self.sections {
            acc = section.process_sample(acc);
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::to_biquad;
    use crate::svf::{FilterParameters, FilterType};

    fn lowpass_coeffs() -> BiquadCoeffs {
        to_biquad(
            &FilterParameters::new(0.3, 1.0, std::f64::consts::SQRT_2, FilterType::LowPass)
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_bypass() {
        let mut filter = BiquadTDF2::new();

        let input = 0.5;
        let output = filter.process_sample(input);
        assert!((output - input).abs() < 1e-10);
    }

    #[test]
    fn test_lowpass_dc() {
        let mut filter = BiquadTDF2::with_coeffs(lowpass_coeffs());

        // DC signal should pass through lowpass
        for _ in 0..1000 {
            filter.process_sample(1.0);
        }
        let output = filter.process_sample(1.0);
        assert!((output - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_highpass_dc() {
        let params =
            FilterParameters::new(0.3, 1.0, std::f64::consts::SQRT_2, FilterType::HighPass)
                .unwrap();
        let mut filter = BiquadTDF2::with_coeffs(to_biquad(&params).unwrap());

        // DC signal should be blocked by highpass
        for _ in 0..1000 {
            filter.process_sample(1.0);
        }
        let output = filter.process_sample(1.0);
        assert!(output.abs() < 0.01);
    }

    #[test]
    fn test_normalized_divides_by_a0() {
        let coeffs = BiquadCoeffs::normalized(2.0, 4.0, 6.0, 2.0, 1.0, 0.5).unwrap();
        assert_eq!(coeffs.b0, 1.0);
        assert_eq!(coeffs.b1, 2.0);
        assert_eq!(coeffs.b2, 3.0);
        assert_eq!(coeffs.a1, 0.5);
        assert_eq!(coeffs.a2, 0.25);
    }

    #[test]
    fn test_normalized_rejects_bad_input() {
        assert!(matches!(
            BiquadCoeffs::normalized(1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Err(VqError::InvalidParameter { name: "a0", .. })
        ));
        assert!(matches!(
            BiquadCoeffs::normalized(f64::NAN, 0.0, 0.0, 1.0, 0.0, 0.0),
            Err(VqError::InvalidParameter { name: "b0", .. })
        ));
    }

    #[test]
    fn test_stability_triangle() {
        assert!(BiquadCoeffs::bypass().is_stable());
        assert!(lowpass_coeffs().is_stable());

        // pole on the unit circle
        let marginal = BiquadCoeffs {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: -2.0,
            a2: 1.0,
        };
        assert!(!marginal.is_stable());

        let unstable = BiquadCoeffs {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 1.5,
        };
        assert!(!unstable.is_stable());
    }

    #[test]
    fn test_reset() {
        let mut filter = BiquadTDF2::with_coeffs(lowpass_coeffs());

        // Process some samples
        for _ in 0..100 {
            filter.process_sample(1.0);
        }

        // Reset
        filter.reset();

        // State should be cleared
        assert_eq!(filter.z1, 0.0);
        assert_eq!(filter.z2, 0.0);
    }

    #[test]
    fn test_cascade_gain_scales_input() {
        let mut cascade = BiquadCascade::new(1);
        cascade.set_gain(0.5).unwrap();
        let output = cascade.process_sample(1.0);
        assert!((output - 0.5).abs() < 1e-12);

        assert!(cascade.set_gain(f64::NAN).is_err());
        assert_eq!(cascade.gain(), 0.5);
    }

    #[test]
    fn test_cascade_matches_manual_chain() {
        let coeffs = lowpass_coeffs();
        let mut cascade = BiquadCascade::from_coeffs(&[coeffs, coeffs], 1.0).unwrap();
        assert_eq!(cascade.coeffs(), vec![coeffs, coeffs]);

        let mut first = BiquadTDF2::with_coeffs(coeffs);
        let mut second = BiquadTDF2::with_coeffs(coeffs);

        for i in 0..64 {
            let x = if i == 0 { 1.0 } else { 0.0 };
            let expected = second.process_sample(first.process_sample(x));
            assert_eq!(cascade.process_sample(x), expected);
        }
    }

    #[test]
    fn test_cascade_set_filters_size_mismatch() {
        let mut cascade = BiquadCascade::new(3);
        assert_eq!(cascade.len(), 3);
        assert!(!cascade.is_empty());
        let err = cascade.set_filters(&[BiquadCoeffs::bypass()]).unwrap_err();
        assert_eq!(
            err,
            VqError::SizeMismatch {
                expected: 3,
                actual: 1
            }
        );
    }
}
