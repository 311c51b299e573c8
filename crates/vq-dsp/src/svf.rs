//! State-variable filter core
//!
//! Trapezoidally integrated two-integrator loop ("topology-preserving"
//! discretization). One state update produces the low-pass, band-pass and
//! high-pass taps simultaneously; the requested response is mixed from the
//! taps afterwards. Because the update never depends on the filter type,
//! parameters and type can change at every sample without discontinuities
//! in the integrator state.

use serde::{Deserialize, Serialize};
use std::fmt;
use vq_core::{Sample, VqError, VqResult};

use crate::{MonoProcessor, Processor};

/// Pre-warp an analog cutoff frequency to the digital prototype value,
/// `tan(pi * frequency / sample_rate)`.
///
/// `frequency` must lie in (0, sample_rate / 2) for a meaningful result.
#[inline]
pub fn prewarp(frequency: Sample, sample_rate: Sample) -> Sample {
    (std::f64::consts::PI * frequency / sample_rate).tan()
}

/// Filter response types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    BandStop,
    Peaking,
    LowShelf,
    HighShelf,
}

impl FilterType {
    /// All types in index order
    pub const ALL: [FilterType; 7] = [
        FilterType::LowPass,
        FilterType::HighPass,
        FilterType::BandPass,
        FilterType::BandStop,
        FilterType::Peaking,
        FilterType::LowShelf,
        FilterType::HighShelf,
    ];

    /// Resolve a numeric type tag (0..=6)
    pub fn from_index(index: usize) -> VqResult<Self> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or_else(|| VqError::InvalidFilterType {
                tag: index.to_string(),
            })
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterType::LowPass => "LowPass",
            FilterType::HighPass => "HighPass",
            FilterType::BandPass => "BandPass",
            FilterType::BandStop => "BandStop",
            FilterType::Peaking => "Peaking",
            FilterType::LowShelf => "LowShelf",
            FilterType::HighShelf => "HighShelf",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FilterType {
    type Err = VqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LowPass" => Ok(FilterType::LowPass),
            "HighPass" => Ok(FilterType::HighPass),
            "BandPass" => Ok(FilterType::BandPass),
            "BandStop" => Ok(FilterType::BandStop),
            "Peaking" => Ok(FilterType::Peaking),
            "LowShelf" => Ok(FilterType::LowShelf),
            "HighShelf" => Ok(FilterType::HighShelf),
            _ => Err(VqError::InvalidFilterType { tag: s.to_string() }),
        }
    }
}

/// Full parameter set of one second-order section.
///
/// `cutoff` is the pre-warped frequency `tan(pi * f / fs)` (see [`prewarp`]),
/// `gain` is linear (1.0 = unity) and `resonance` is the quality factor of
/// the section poles (0.7071 is Butterworth, larger rings more). All three
/// must be positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParameters {
    pub cutoff: Sample,
    pub gain: Sample,
    pub resonance: Sample,
    pub filter_type: FilterType,
}

impl FilterParameters {
    pub fn new(
        cutoff: Sample,
        gain: Sample,
        resonance: Sample,
        filter_type: FilterType,
    ) -> VqResult<Self> {
        let params = Self {
            cutoff,
            gain,
            resonance,
            filter_type,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> VqResult<()> {
        require_positive("cutoff", self.cutoff)?;
        require_positive("gain", self.gain)?;
        require_positive("resonance", self.resonance)?;
        Ok(())
    }
}

impl Default for FilterParameters {
    fn default() -> Self {
        Self {
            cutoff: 1.0,
            gain: 1.0,
            resonance: std::f64::consts::FRAC_1_SQRT_2,
            filter_type: FilterType::LowPass,
        }
    }
}

pub(crate) fn require_positive(name: &'static str, value: Sample) -> VqResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(VqError::InvalidParameter { name, value })
    }
}

/// Shape and positivity checks for one set of per-sample trajectories.
pub(crate) fn validate_trajectory(
    n: usize,
    cutoff: &[Sample],
    gain: &[Sample],
    resonance: &[Sample],
) -> VqResult<()> {
    for slice in [cutoff, gain, resonance] {
        if slice.len() != n {
            return Err(VqError::SizeMismatch {
                expected: n,
                actual: slice.len(),
            });
        }
    }
    for &value in cutoff {
        require_positive("cutoff", value)?;
    }
    for &value in gain {
        require_positive("gain", value)?;
    }
    for &value in resonance {
        require_positive("resonance", value)?;
    }
    Ok(())
}

/// Base mixing coefficients of the trapezoidal state-variable core.
///
/// Derived solely from (cutoff, resonance); gain never enters here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvfCoefficients {
    pub c0: Sample,
    pub c1: Sample,
    pub c2: Sample,
    pub c3: Sample,
}

impl SvfCoefficients {
    /// Solve the core coefficients:
    ///
    /// ```text
    /// c1 = cutoff / resonance
    /// c2 = cutoff * resonance
    /// c3 = c2 + 1
    /// c0 = 1 / (1 + c1 * c3)
    /// ```
    pub fn solve(cutoff: Sample, resonance: Sample) -> VqResult<Self> {
        require_positive("cutoff", cutoff)?;
        require_positive("resonance", resonance)?;
        Ok(Self::solve_unchecked(cutoff, resonance))
    }

    #[inline(always)]
    pub(crate) fn solve_unchecked(cutoff: Sample, resonance: Sample) -> Self {
        let c1 = cutoff / resonance;
        let c2 = cutoff * resonance;
        let c3 = c2 + 1.0;
        let c0 = 1.0 / (1.0 + c1 * c3);
        Self { c0, c1, c2, c3 }
    }
}

/// The three simultaneous outputs of one core step.
///
/// They satisfy `lowpass + bandpass + highpass == input` up to rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapOutputs {
    pub lowpass: Sample,
    pub bandpass: Sample,
    pub highpass: Sample,
}

impl TapOutputs {
    /// Mix the taps into the requested typed response.
    #[inline(always)]
    pub fn mix(&self, filter_type: FilterType, gain: Sample) -> Sample {
        match filter_type {
            FilterType::LowPass => gain * self.lowpass,
            FilterType::HighPass => gain * self.highpass,
            FilterType::BandPass => gain * self.bandpass,
            FilterType::BandStop => gain * (self.lowpass + self.highpass),
            FilterType::Peaking => self.lowpass + self.highpass + gain * self.bandpass,
            FilterType::LowShelf => gain * (self.bandpass + self.highpass) + self.lowpass,
            FilterType::HighShelf => gain * (self.bandpass + self.lowpass) + self.highpass,
        }
    }
}

/// Tap weights plus output scalar: `out = gain * (lp*l + bp*b + hp*h)`.
///
/// The typed responses are particular weight patterns; arbitrary weights run
/// user-defined responses recovered from biquad coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixWeights {
    pub lp: Sample,
    pub bp: Sample,
    pub hp: Sample,
    pub gain: Sample,
}

impl MixWeights {
    /// Weight pattern of a typed response.
    pub fn for_type(filter_type: FilterType, gain: Sample) -> Self {
        match filter_type {
            FilterType::LowPass => Self { lp: 1.0, bp: 0.0, hp: 0.0, gain },
            FilterType::HighPass => Self { lp: 0.0, bp: 0.0, hp: 1.0, gain },
            FilterType::BandPass => Self { lp: 0.0, bp: 1.0, hp: 0.0, gain },
            FilterType::BandStop => Self { lp: 1.0, bp: 0.0, hp: 1.0, gain },
            FilterType::Peaking => Self { lp: 1.0, bp: gain, hp: 1.0, gain: 1.0 },
            FilterType::LowShelf => Self { lp: 1.0, bp: gain, hp: gain, gain: 1.0 },
            FilterType::HighShelf => Self { lp: gain, bp: gain, hp: 1.0, gain: 1.0 },
        }
    }

    #[inline(always)]
    pub fn mix(&self, taps: &TapOutputs) -> Sample {
        self.gain * (self.lp * taps.lowpass + self.bp * taps.bandpass + self.hp * taps.highpass)
    }
}

/// One second-order state-variable section.
///
/// Owns the two integrator delays. State persists across parameter and type
/// changes and is cleared only by [`Processor::reset`].
#[derive(Debug, Clone)]
pub struct SvfSection {
    params: FilterParameters,
    z1: Sample,
    z2: Sample,
}

impl SvfSection {
    pub fn new() -> Self {
        Self {
            params: FilterParameters::default(),
            z1: 0.0,
            z2: 0.0,
        }
    }

    pub fn with_parameters(params: FilterParameters) -> VqResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            z1: 0.0,
            z2: 0.0,
        })
    }

    #[inline]
    pub fn parameters(&self) -> &FilterParameters {
        &self.params
    }

    /// Replace the whole parameter set. Validates before committing, so a
    /// rejected call leaves the previous parameters in place. State is kept.
    pub fn set_parameters(&mut self, params: FilterParameters) -> VqResult<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// Change only the response type. State and the other parameters are
    /// untouched, so this is click-free mid-stream.
    #[inline]
    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.params.filter_type = filter_type;
    }

    #[inline]
    pub fn filter_type(&self) -> FilterType {
        self.params.filter_type
    }

    /// Current integrator delays (z1, z2).
    #[inline]
    pub fn state(&self) -> (Sample, Sample) {
        (self.z1, self.z2)
    }

    /// Advance the core one step and return all three taps.
    ///
    /// Identical for every filter type; type selection happens in the mix.
    #[inline(always)]
    pub fn tick(&mut self, input: Sample, coeffs: &SvfCoefficients) -> TapOutputs {
        let highpass = coeffs.c0 * (input - self.z2 - coeffs.c3 * self.z1);
        let v1 = coeffs.c1 * highpass;
        let bandpass = v1 + self.z1;
        let v2 = coeffs.c2 * bandpass;
        let lowpass = v2 + self.z2;
        self.z1 = v1 + bandpass;
        self.z2 = v2 + lowpass;
        TapOutputs {
            lowpass,
            bandpass,
            highpass,
        }
    }

    /// Process one sample with explicit per-sample parameters, using the
    /// stored filter type. Values must already be valid (positive, finite);
    /// use [`SvfSection::process_block_varying`] for checked slices.
    #[inline]
    pub fn process_sample_with(
        &mut self,
        input: Sample,
        cutoff: Sample,
        gain: Sample,
        resonance: Sample,
    ) -> Sample {
        debug_assert!(cutoff > 0.0 && cutoff.is_finite());
        debug_assert!(gain > 0.0 && gain.is_finite());
        debug_assert!(resonance > 0.0 && resonance.is_finite());
        let coeffs = SvfCoefficients::solve_unchecked(cutoff, resonance);
        let filter_type = self.params.filter_type;
        self.tick(input, &coeffs).mix(filter_type, gain)
    }

    /// Process one sample mixing the taps with explicit weights instead of a
    /// typed response.
    #[inline]
    pub fn process_sample_weighted(
        &mut self,
        input: Sample,
        cutoff: Sample,
        resonance: Sample,
        weights: &MixWeights,
    ) -> Sample {
        debug_assert!(cutoff > 0.0 && cutoff.is_finite());
        debug_assert!(resonance > 0.0 && resonance.is_finite());
        let coeffs = SvfCoefficients::solve_unchecked(cutoff, resonance);
        let taps = self.tick(input, &coeffs);
        weights.mix(&taps)
    }

    /// Process a block in place with per-sample parameter trajectories.
    ///
    /// All slices must have the buffer's length and every value must be
    /// positive and finite; nothing is processed until the whole input has
    /// been validated.
    pub fn process_block_varying(
        &mut self,
        buffer: &mut [Sample],
        cutoff: &[Sample],
        gain: &[Sample],
        resonance: &[Sample],
    ) -> VqResult<()> {
        validate_trajectory(buffer.len(), cutoff, gain, resonance)?;
        for i in 0..buffer.len() {
            buffer[i] = self.process_sample_with(buffer[i], cutoff[i], gain[i], resonance[i]);
        }
        Ok(())
    }
}

impl Default for SvfSection {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for SvfSection {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for SvfSection {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let p = self.params;
        self.process_sample_with(input, p.cutoff, p.gain, p.resonance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic noise in [-1, 1]
    fn noise(n: usize) -> Vec<Sample> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        (0..n)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                i.hash(&mut hasher);
                (hasher.finish() as f64 / u64::MAX as f64) * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_prewarp_quarter_rate() {
        // tan(pi/4) = 1
        assert!((prewarp(4000.0, 16000.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_solver_identities() {
        for (cutoff, resonance) in [(0.1, 0.5), (1.0, std::f64::consts::SQRT_2), (3.0, 2.5)] {
            let c = SvfCoefficients::solve(cutoff, resonance).unwrap();
            assert!((c.c3 - c.c2 - 1.0).abs() < 1e-15);
            assert!((c.c0 * (1.0 + c.c1 * c.c3) - 1.0).abs() < 1e-15);
            assert!((c.c1 * c.c2 - cutoff * cutoff).abs() < 1e-12 * cutoff * cutoff);
            assert!((c.c2 / c.c1 - resonance * resonance).abs() < 1e-12 * resonance * resonance);
        }
    }

    #[test]
    fn test_solver_rejects_invalid() {
        assert!(matches!(
            SvfCoefficients::solve(0.0, 1.0),
            Err(VqError::InvalidParameter { name: "cutoff", .. })
        ));
        assert!(matches!(
            SvfCoefficients::solve(1.0, -1.0),
            Err(VqError::InvalidParameter {
                name: "resonance",
                ..
            })
        ));
        assert!(SvfCoefficients::solve(f64::NAN, 1.0).is_err());
        assert!(SvfCoefficients::solve(1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_taps_sum_to_input() {
        let coeffs = SvfCoefficients::solve(0.7, 1.1).unwrap();
        let mut section = SvfSection::new();
        for &x in &noise(256) {
            let taps = section.tick(x, &coeffs);
            let sum = taps.lowpass + taps.bandpass + taps.highpass;
            assert!((sum - x).abs() < 1e-12 * (x.abs() + 1.0));
        }
    }

    #[test]
    fn test_unity_gain_peaking_and_shelves_pass_through() {
        for filter_type in [
            FilterType::Peaking,
            FilterType::LowShelf,
            FilterType::HighShelf,
        ] {
            let params = FilterParameters::new(0.5, 1.0, 0.9, filter_type).unwrap();
            let mut section = SvfSection::with_parameters(params).unwrap();
            for &x in &noise(256) {
                let y = section.process_sample(x);
                assert!(
                    (y - x).abs() < 1e-12 * (x.abs() + 1.0),
                    "{filter_type} with unity gain must pass the input through"
                );
            }
        }
    }

    #[test]
    fn test_type_switch_keeps_state_continuous() {
        let params = FilterParameters::default();
        let mut fixed = SvfSection::with_parameters(params).unwrap();
        let mut switching = SvfSection::with_parameters(params).unwrap();

        for (i, &x) in noise(512).iter().enumerate() {
            switching.set_filter_type(FilterType::ALL[i % FilterType::ALL.len()]);
            fixed.process_sample(x);
            switching.process_sample(x);
            // the state update is independent of the mix, so the integrator
            // trajectories must agree exactly
            assert_eq!(fixed.state(), switching.state());
        }
    }

    #[test]
    fn test_weights_match_typed_mix() {
        let taps = TapOutputs {
            lowpass: 0.3,
            bandpass: -0.2,
            highpass: 0.5,
        };
        for filter_type in FilterType::ALL {
            for gain in [0.25, 1.0, 2.0] {
                let direct = taps.mix(filter_type, gain);
                let weighted = MixWeights::for_type(filter_type, gain).mix(&taps);
                assert!(
                    (direct - weighted).abs() < 1e-12,
                    "{filter_type} gain {gain}: {direct} vs {weighted}"
                );
            }
        }
    }

    #[test]
    fn test_block_varying_matches_per_sample() {
        let n = 128;
        let input = noise(n);
        let cutoff: Vec<Sample> = (0..n).map(|i| 0.1 + 0.8 * i as f64 / n as f64).collect();
        let gain = vec![0.7; n];
        let resonance: Vec<Sample> = (0..n).map(|i| 0.5 + i as f64 / n as f64).collect();

        let mut block = SvfSection::new();
        let mut reference = SvfSection::new();

        let mut buffer = input.clone();
        block
            .process_block_varying(&mut buffer, &cutoff, &gain, &resonance)
            .unwrap();

        for i in 0..n {
            let expected =
                reference.process_sample_with(input[i], cutoff[i], gain[i], resonance[i]);
            assert_eq!(buffer[i], expected);
        }
    }

    #[test]
    fn test_block_varying_validates_before_processing() {
        let mut section = SvfSection::new();
        let input = noise(8);

        let mut buffer = input.clone();
        let err = section
            .process_block_varying(&mut buffer, &[1.0; 4], &[1.0; 8], &[1.0; 8])
            .unwrap_err();
        assert_eq!(
            err,
            VqError::SizeMismatch {
                expected: 8,
                actual: 4
            }
        );
        assert_eq!(buffer, input);

        let mut bad_gain = vec![1.0; 8];
        bad_gain[5] = -2.0;
        let err = section
            .process_block_varying(&mut buffer, &[1.0; 8], &bad_gain, &[1.0; 8])
            .unwrap_err();
        assert!(matches!(err, VqError::InvalidParameter { name: "gain", .. }));
        assert_eq!(buffer, input);
        assert_eq!(section.state(), (0.0, 0.0));
    }

    #[test]
    fn test_set_parameters_is_atomic() {
        let mut section = SvfSection::new();
        let before = *section.parameters();
        let bad = FilterParameters {
            cutoff: -1.0,
            ..before
        };
        assert!(section.set_parameters(bad).is_err());
        assert_eq!(*section.parameters(), before);
    }

    #[test]
    fn test_filter_type_codecs() {
        for (i, filter_type) in FilterType::ALL.into_iter().enumerate() {
            assert_eq!(filter_type.index(), i);
            assert_eq!(FilterType::from_index(i).unwrap(), filter_type);
            let name = filter_type.to_string();
            assert_eq!(name.parse::<FilterType>().unwrap(), filter_type);
        }
        assert!(matches!(
            FilterType::from_index(7),
            Err(VqError::InvalidFilterType { .. })
        ));
        assert!(matches!(
            "Tilt".parse::<FilterType>(),
            Err(VqError::InvalidFilterType { .. })
        ));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut section = SvfSection::new();
        for &x in &noise(64) {
            section.process_sample(x);
        }
        assert_ne!(section.state(), (0.0, 0.0));
        section.reset();
        assert_eq!(section.state(), (0.0, 0.0));
        let out = section.process_sample(0.0);
        assert_eq!(out, 0.0);
    }

    #[test]
    fn test_default_parameters() {
        let params = FilterParameters::default();
        assert_eq!(params.cutoff, 1.0);
        assert_eq!(params.gain, 1.0);
        assert_eq!(params.resonance, std::f64::consts::FRAC_1_SQRT_2);
        assert_eq!(params.filter_type, FilterType::LowPass);
        assert!(params.validate().is_ok());
    }
}
