//! Conversions between section parameters and biquad coefficients
//!
//! Both directions are closed form. [`to_biquad`] freezes a section's
//! response into direct-form coefficients. [`from_biquad`] recovers the
//! prewarped cutoff, resonance and tap weights from any stable biquad;
//! the raw weights reproduce the source exactly, and where the weight
//! pattern matches a typed response the recovery is classified back onto
//! that type.

use vq_core::{Sample, VqError, VqResult};

use crate::biquad::BiquadCoeffs;
use crate::svf::{FilterParameters, FilterType, MixWeights, SvfCoefficients};

/// Whether recovered typed parameters reproduce the source biquad exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Exact,
    /// The weight pattern matched no typed response; `parameters` hold the
    /// nearest typed description and only the raw weights are faithful.
    Approximate,
}

impl Conversion {
    #[inline]
    pub fn is_exact(self) -> bool {
        matches!(self, Conversion::Exact)
    }
}

/// Result of [`from_biquad`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvfRecovery {
    pub parameters: FilterParameters,
    /// Tap weights reproducing the source response, canonical for exact
    /// classifications and raw (outer gain 1) otherwise.
    pub weights: MixWeights,
    pub conversion: Conversion,
}

impl SvfRecovery {
    /// The recovered typed parameters, or [`VqError::ApproximateConversion`]
    /// when classification was inexact.
    pub fn into_exact(self) -> VqResult<FilterParameters> {
        match self.conversion {
            Conversion::Exact => Ok(self.parameters),
            Conversion::Approximate => Err(VqError::ApproximateConversion),
        }
    }
}

/// Direct-form coefficients of a typed section response.
pub fn to_biquad(params: &FilterParameters) -> VqResult<BiquadCoeffs> {
    params.validate()?;
    let core = SvfCoefficients::solve_unchecked(params.cutoff, params.resonance);
    let weights = MixWeights::for_type(params.filter_type, params.gain);
    Ok(weighted_biquad(&core, &weights))
}

/// Direct-form coefficients of an arbitrary tap-weight mix.
pub fn to_biquad_weighted(
    cutoff: Sample,
    resonance: Sample,
    weights: &MixWeights,
) -> VqResult<BiquadCoeffs> {
    let core = SvfCoefficients::solve(cutoff, resonance)?;
    for (name, value) in [
        ("weights.lp", weights.lp),
        ("weights.bp", weights.bp),
        ("weights.hp", weights.hp),
        ("weights.gain", weights.gain),
    ] {
        if !value.is_finite() {
            return Err(VqError::InvalidParameter { name, value });
        }
    }
    Ok(weighted_biquad(&core, weights))
}

/// Expand `out = gain * (lp*L + bp*B + hp*H)` of the trapezoidal core into
/// direct form. The denominator depends only on the core coefficients.
fn weighted_biquad(core: &SvfCoefficients, weights: &MixWeights) -> BiquadCoeffs {
    let c01 = core.c0 * core.c1;
    let c012 = c01 * core.c2;
    let c013 = c01 * core.c3;
    let g = weights.gain;
    BiquadCoeffs {
        b0: g * (weights.lp * c012 + weights.bp * c01 + weights.hp * core.c0),
        b1: 2.0 * g * (weights.lp * c012 - weights.hp * core.c0),
        b2: g * (weights.lp * c012 - weights.bp * c01 + weights.hp * core.c0),
        a1: 2.0 * (c012 + c013 - 1.0),
        a2: 2.0 * c012 - 2.0 * c013 + 1.0,
    }
}

/// Recover section parameters and tap weights from a stable biquad.
///
/// Rejects non-finite coefficients, poles on or outside the unit circle
/// and an all-zero numerator. For every accepted input the returned raw
/// weights with the recovered (cutoff, resonance) rebuild the source
/// coefficients; the typed `parameters` are exact only when
/// `conversion` says so.
pub fn from_biquad(coeffs: &BiquadCoeffs) -> VqResult<SvfRecovery> {
    for (name, value) in [
        ("b0", coeffs.b0),
        ("b1", coeffs.b1),
        ("b2", coeffs.b2),
        ("a1", coeffs.a1),
        ("a2", coeffs.a2),
    ] {
        if !value.is_finite() {
            return Err(VqError::InvalidParameter { name, value });
        }
    }
    if coeffs.a2.abs() >= 1.0 {
        return Err(VqError::InvalidParameter {
            name: "a2",
            value: coeffs.a2,
        });
    }
    if coeffs.a1.abs() >= 1.0 + coeffs.a2 {
        return Err(VqError::InvalidParameter {
            name: "a1",
            value: coeffs.a1,
        });
    }
    if coeffs.b0 == 0.0 && coeffs.b1 == 0.0 && coeffs.b2 == 0.0 {
        return Err(VqError::InvalidParameter {
            name: "numerator",
            value: 0.0,
        });
    }

    // Denominator evaluated at z = -1 and z = 1; both positive inside the
    // stability triangle. They equal 4*c0 and 4*c0*c1*c2 of the core.
    let at_minus_one = 1.0 - coeffs.a1 + coeffs.a2;
    let at_plus_one = 1.0 + coeffs.a1 + coeffs.a2;
    let root = (at_minus_one * at_plus_one).sqrt();
    let cutoff = root / at_minus_one;
    let resonance = root / (2.0 * (1.0 - coeffs.a2));

    let w_hp = (coeffs.b0 - coeffs.b1 + coeffs.b2) / at_minus_one;
    let w_bp = (coeffs.b2 - coeffs.b0) / (coeffs.a2 - 1.0);
    let w_lp = (coeffs.b0 + coeffs.b1 + coeffs.b2) / at_plus_one;

    let tol = 1e-6 * w_lp.abs().max(w_bp.abs()).max(w_hp.abs());
    match classify_weights(w_lp, w_bp, w_hp, tol) {
        Some((filter_type, gain)) => Ok(SvfRecovery {
            parameters: FilterParameters {
                cutoff,
                gain,
                resonance,
                filter_type,
            },
            weights: MixWeights::for_type(filter_type, gain),
            conversion: Conversion::Exact,
        }),
        None => {
            log::warn!(
                "biquad has no exact typed representation, keeping raw weights \
                 lp={w_lp:.6} bp={w_bp:.6} hp={w_hp:.6}"
            );
            let mean = (w_lp + w_bp + w_hp) / 3.0;
            let gain = if mean > 0.0 { mean } else { 1.0 };
            let filter_type = if w_bp.abs() > tol {
                FilterType::Peaking
            } else {
                FilterType::LowPass
            };
            Ok(SvfRecovery {
                parameters: FilterParameters {
                    cutoff,
                    gain,
                    resonance,
                    filter_type,
                },
                weights: MixWeights {
                    lp: w_lp,
                    bp: w_bp,
                    hp: w_hp,
                    gain: 1.0,
                },
                conversion: Conversion::Approximate,
            })
        }
    }
}

/// Match a recovered weight triple against the typed patterns. Gains must be
/// positive; peaking is checked before the shelves because the three
/// patterns coincide at unity gain.
fn classify_weights(lp: f64, bp: f64, hp: f64, tol: f64) -> Option<(FilterType, f64)> {
    let near = |x: f64, y: f64| (x - y).abs() <= tol;
    let zero = |x: f64| x.abs() <= tol;

    if zero(bp) {
        if zero(hp) && lp > tol {
            return Some((FilterType::LowPass, lp));
        }
        if zero(lp) && hp > tol {
            return Some((FilterType::HighPass, hp));
        }
        if lp > tol && near(lp, hp) {
            return Some((FilterType::BandStop, 0.5 * (lp + hp)));
        }
        return None;
    }
    if zero(lp) && zero(hp) {
        if bp > tol {
            return Some((FilterType::BandPass, bp));
        }
        return None;
    }
    if bp > tol && near(lp, 1.0) && near(hp, 1.0) {
        return Some((FilterType::Peaking, bp));
    }
    if bp > tol && near(lp, 1.0) && near(hp, bp) {
        return Some((FilterType::LowShelf, bp));
    }
    if bp > tol && near(hp, 1.0) && near(lp, bp) {
        return Some((FilterType::HighShelf, bp));
    }
    None
}
