//! Serial second-order sections with shared parameter control
//!
//! A [`Cascade`] chains state-variable sections behind one overall gain;
//! a [`CascadeBank`] runs one cascade per channel off a single parameter
//! stream. Construction from a [`CascadeConfig`] mirrors the preset layer
//! that ships configurations as JSON.

use serde::{Deserialize, Serialize};
use vq_core::{Sample, VqError, VqResult};

use crate::biquad::BiquadCoeffs;
use crate::convert::{from_biquad, to_biquad};
use crate::spectrum::PowerSpectrum;
use crate::svf::{FilterParameters, FilterType, SvfSection, validate_trajectory};
use crate::{MonoProcessor, Processor};

/// Preset-level description of a filter bank.
///
/// Serialized with camelCase keys (`filterType`, `nChannels`, `nSos`);
/// missing fields fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CascadeConfig {
    pub cutoff: Sample,
    pub gain: Sample,
    pub resonance: Sample,
    pub filter_type: FilterType,
    pub n_channels: usize,
    pub n_sos: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            cutoff: 1.0,
            gain: 1.0,
            resonance: std::f64::consts::FRAC_1_SQRT_2,
            filter_type: FilterType::LowPass,
            n_channels: 2,
            n_sos: 3,
        }
    }
}

impl CascadeConfig {
    pub fn validate(&self) -> VqResult<()> {
        self.parameters().validate()?;
        if self.n_channels == 0 {
            return Err(VqError::InvalidParameter {
                name: "nChannels",
                value: 0.0,
            });
        }
        if self.n_sos == 0 {
            return Err(VqError::InvalidParameter {
                name: "nSos",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// The per-section parameter set carried by this config.
    pub fn parameters(&self) -> FilterParameters {
        FilterParameters {
            cutoff: self.cutoff,
            gain: self.gain,
            resonance: self.resonance,
            filter_type: self.filter_type,
        }
    }
}

/// Serial chain of state-variable sections with an overall linear gain.
///
/// The gain scales the input before the first section. Shared setters push
/// one parameter set to every section; per-index setters retune a single
/// section, always keeping the integrator state.
#[derive(Debug, Clone)]
pub struct Cascade {
    sections: Vec<SvfSection>,
    gain: Sample,
}

impl Cascade {
    /// `n_sos` default sections at unity gain. At least one section is
    /// required.
    pub fn new(n_sos: usize) -> VqResult<Self> {
        if n_sos == 0 {
            return Err(VqError::InvalidParameter {
                name: "n_sos",
                value: 0.0,
            });
        }
        Ok(Self {
            sections: vec![SvfSection::new(); n_sos],
            gain: 1.0,
        })
    }

    /// `n_sos` sections all tuned to `params`, at unity gain.
    pub fn from_parameters(params: FilterParameters, n_sos: usize) -> VqResult<Self> {
        params.validate()?;
        let mut cascade = Self::new(n_sos)?;
        for section in &mut cascade.sections {
            section.set_parameters(params)?;
        }
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

    pub fn parameters(&self) -> Vec<FilterParameters> {
        self.sections.iter().map(|s| *s.parameters()).collect()
    }

    /// Push the same parameter set to every section.
    pub fn set_shared_parameters(&mut self, params: FilterParameters) -> VqResult<()> {
        params.validate()?;
        for section in &mut self.sections {
            section.set_parameters(params)?;
        }
        Ok(())
    }

    /// Retune every section individually. The whole slice is validated
    /// before anything changes.
    pub fn set_parameters(&mut self, params: &[FilterParameters]) -> VqResult<()> {
        if params.len() != self.sections.len() {
            return Err(VqError::SizeMismatch {
                expected: self.sections.len(),
                actual: params.len(),
            });
        }
        for p in params {
            p.validate()?;
        }
        for (section, &p) in self.sections.iter_mut().zip(params) {
            section.set_parameters(p)?;
        }
        Ok(())
    }

    pub fn filter_types(&self) -> Vec<FilterType> {
        self.sections.iter().map(|s| s.filter_type()).collect()
    }

    pub fn set_filter_types(&mut self, types: &[FilterType]) -> VqResult<()> {
        if types.len() != self.sections.len() {
            return Err(VqError::SizeMismatch {
                expected: self.sections.len(),
                actual: types.len(),
            });
        }
        for (section, &filter_type) in self.sections.iter_mut().zip(types) {
            section.set_filter_type(filter_type);
        }
        Ok(())
    }

    pub fn filter_type(&self, index: usize) -> Option<FilterType> {
        self.sections.get(index).map(|s| s.filter_type())
    }

    /// Change one section's response type.
    pub fn set_filter_type(&mut self, index: usize, filter_type: FilterType) -> VqResult<()> {
        let expected = self.sections.len();
        match self.sections.get_mut(index) {
            Some(section) => {
                section.set_filter_type(filter_type);
                Ok(())
            }
            None => Err(VqError::SizeMismatch {
                expected,
                actual: index,
            }),
        }
    }

    #[inline]
    pub fn gain(&self) -> Sample {
        self.gain
    }

    /// Overall linear gain. Any finite value is accepted, including
    /// negative ones for polarity inversion.
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

    /// Process a block in place with per-sample trajectories, one column
    /// per section.
    ///
    /// The outer slices index sections and must match the cascade length;
    /// each column must match the buffer length. Everything is validated
    /// before any section runs.
    pub fn process_block_varying(
        &mut self,
        buffer: &mut [Sample],
        cutoff: &[&[Sample]],
        gain: &[&[Sample]],
        resonance: &[&[Sample]],
    ) -> VqResult<()> {
        self.validate_columns(buffer.len(), cutoff, gain, resonance)?;
        self.process_block_varying_unchecked(buffer, cutoff, gain, resonance);
        Ok(())
    }

    fn validate_columns(
        &self,
        n_samples: usize,
        cutoff: &[&[Sample]],
        gain: &[&[Sample]],
        resonance: &[&[Sample]],
    ) -> VqResult<()> {
        for columns in [cutoff, gain, resonance] {
            if columns.len() != self.sections.len() {
                return Err(VqError::SizeMismatch {
                    expected: self.sections.len(),
                    actual: columns.len(),
                });
            }
        }
        for s in 0..self.sections.len() {
            validate_trajectory(n_samples, cutoff[s], gain[s], resonance[s])?;
        }
        Ok(())
    }

    fn process_block_varying_unchecked(
        &mut self,
        buffer: &mut [Sample],
        cutoff: &[&[Sample]],
        gain: &[&[Sample]],
        resonance: &[&[Sample]],
    ) {
        for i in 0..buffer.len() {
            let mut acc = self.gain * buffer[i];
            for (s, section) in self.sections.iter_mut().enumerate() {
                acc = section.process_sample_with(acc, cutoff[s][i], gain[s][i], resonance[s][i]);
            }
            buffer[i] = acc;
        }
    }

    /// Freeze every section into direct-form coefficients.
    pub fn to_biquad_stack(&self) -> VqResult<Vec<BiquadCoeffs>> {
        self.sections.iter().map(|s| to_biquad(s.parameters())).collect()
    }

    /// Retune the whole cascade from a biquad stack.
    ///
    /// Every coefficient set must recover an exactly typed section;
    /// otherwise nothing changes and [`VqError::ApproximateConversion`]
    /// is returned. Integrator state is kept.
    pub fn set_from_biquads(&mut self, stack: &[BiquadCoeffs]) -> VqResult<()> {
        if stack.len() != self.sections.len() {
            return Err(VqError::SizeMismatch {
                expected: self.sections.len(),
                actual: stack.len(),
            });
        }
        let recovered = stack
            .iter()
            .map(|coeffs| from_biquad(coeffs)?.into_exact())
            .collect::<VqResult<Vec<FilterParameters>>>()?;
        for (section, params) in self.sections.iter_mut().zip(recovered) {
            section.set_parameters(params)?;
        }
        Ok(())
    }

    /// Combined power spectrum of the chain, including the squared overall
    /// gain.
    pub fn power_spectrum(&self, spectrum: &PowerSpectrum) -> VqResult<Vec<f64>> {
        let stack = self.to_biquad_stack()?;
        let mut out = spectrum.evaluate_cascade(&stack);
        let g2 = self.gain * self.gain;
        for value in &mut out {
            *value *= g2;
        }
        Ok(out)
    }
}

impl Processor for Cascade {
    fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }
}

impl MonoProcessor for Cascade {
    #[inline]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let mut acc = self.gain * input;
        for section in &mut self.sections {
            acc = section.process_sample(acc);
        }
        acc
    }
}

/// One cascade per channel, all driven by the same parameter stream.
#[derive(Debug, Clone)]
pub struct CascadeBank {
    channels: Vec<Cascade>,
}

impl CascadeBank {
    pub fn new(n_channels: usize, n_sos: usize) -> VqResult<Self> {
        if n_channels == 0 {
            return Err(VqError::InvalidParameter {
                name: "n_channels",
                value: 0.0,
            });
        }
        let channel = Cascade::new(n_sos)?;
        Ok(Self {
            channels: vec![channel; n_channels],
        })
    }

    pub fn from_config(config: &CascadeConfig) -> VqResult<Self> {
        config.validate()?;
        let channel = Cascade::from_parameters(config.parameters(), config.n_sos)?;
        Ok(Self {
            channels: vec![channel; config.n_channels],
        })
    }

    #[inline]
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn n_sections(&self) -> usize {
        self.channels.first().map(Cascade::len).unwrap_or(0)
    }

    pub fn channel(&self, index: usize) -> Option<&Cascade> {
        self.channels.get(index)
    }

    pub fn channel_mut(&mut self, index: usize) -> Option<&mut Cascade> {
        self.channels.get_mut(index)
    }

    /// Push one parameter set to every section of every channel.
    pub fn set_shared_parameters(&mut self, params: FilterParameters) -> VqResult<()> {
        params.validate()?;
        for channel in &mut self.channels {
            channel.set_shared_parameters(params)?;
        }
        Ok(())
    }

    pub fn set_gain(&mut self, gain: Sample) -> VqResult<()> {
        for channel in &mut self.channels {
            channel.set_gain(gain)?;
        }
        Ok(())
    }

    /// Process planar channel buffers in place with the stored parameters.
    /// Buffer count and lengths must agree.
    pub fn process_block(&mut self, buffers: &mut [&mut [Sample]]) -> VqResult<()> {
        self.check_buffers(buffers)?;
        for (channel, buffer) in self.channels.iter_mut().zip(buffers.iter_mut()) {
            for sample in buffer.iter_mut() {
                *sample = channel.process_sample(*sample);
            }
        }
        Ok(())
    }

    /// Process planar channel buffers with one set of per-sample
    /// trajectories, one column per section, shared by all channels.
    pub fn process_block_varying(
        &mut self,
        buffers: &mut [&mut [Sample]],
        cutoff: &[&[Sample]],
        gain: &[&[Sample]],
        resonance: &[&[Sample]],
    ) -> VqResult<()> {
        self.check_buffers(buffers)?;
        let n = buffers.first().map(|b| b.len()).unwrap_or(0);
        if let Some(first) = self.channels.first() {
            first.validate_columns(n, cutoff, gain, resonance)?;
        }
        for (channel, buffer) in self.channels.iter_mut().zip(buffers.iter_mut()) {
            channel.process_block_varying_unchecked(buffer, cutoff, gain, resonance);
        }
        Ok(())
    }

    fn check_buffers(&self, buffers: &[&mut [Sample]]) -> VqResult<()> {
        if buffers.len() != self.channels.len() {
            return Err(VqError::SizeMismatch {
                expected: self.channels.len(),
                actual: buffers.len(),
            });
        }
        if let Some(first) = buffers.first() {
            for buffer in buffers {
                if buffer.len() != first.len() {
                    return Err(VqError::SizeMismatch {
                        expected: first.len(),
                        actual: buffer.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Processor for CascadeBank {
    fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}
