//! vq-dsp: Time-varying filter processors for VariQ
//!
//! Second-order filtering on a trapezoidally integrated state-variable
//! topology. Cutoff, gain, resonance and filter type may change at every
//! sample without clicks: the integrator state is continuous and type
//! selection only affects the output mix, never the state update.
//!
//! ## Modules
//! - `svf` - State-variable filter core, parameters, tap mixing
//! - `biquad` - TDF-II biquad runtime (interchange form)
//! - `convert` - SVF design <-> biquad coefficient conversion
//! - `cascade` - Series cascades and the multi-channel bank
//! - `spectrum` - Analytic power-spectrum evaluation

pub mod biquad;
pub mod cascade;
pub mod convert;
pub mod spectrum;
pub mod svf;

use vq_core::Sample;

pub use biquad::{BiquadCascade, BiquadCoeffs, BiquadTDF2};
pub use cascade::{Cascade, CascadeBank, CascadeConfig};
pub use convert::{Conversion, SvfRecovery, from_biquad, to_biquad, to_biquad_weighted};
pub use spectrum::{DEFAULT_BANDS, PowerSpectrum, power_response};
pub use svf::{
    FilterParameters, FilterType, MixWeights, SvfCoefficients, SvfSection, TapOutputs, prewarp,
};

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples in place
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}
