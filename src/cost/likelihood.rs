//! Negative log-likelihood (ratio) evaluators.
//!
//! All functions return `-2 ln L`. Products of per-point likelihoods are evaluated as
//! sums of logarithms. A `NaN` result (zero or negative Gaussian width, negative
//! Poisson mean, ...) is reported as `+∞` so a minimizer can reject the candidate
//! point instead of propagating `NaN`.

use std::f64::consts::PI;

use nalgebra::DVector;
use statrs::function::gamma::ln_gamma;

use crate::error::FitError;

/// `ln N(x; mean, scale)`; `NaN` for a non-positive or non-finite scale.
pub fn gaussian_ln_pdf(x: f64, mean: f64, scale: f64) -> f64 {
    if !(scale > 0.0) || !scale.is_finite() {
        return f64::NAN;
    }
    let z = (x - mean) / scale;
    -0.5 * (2.0 * PI).ln() - scale.ln() - 0.5 * z * z
}

/// `ln Poisson(k; mu)`.
///
/// Non-integer or negative counts have probability zero (`-∞`); a negative or
/// non-finite mean yields `NaN`.
pub fn poisson_ln_pmf(k: f64, mu: f64) -> f64 {
    if !(mu >= 0.0) || !mu.is_finite() || k.is_nan() {
        return f64::NAN;
    }
    if k < 0.0 || k.fract() != 0.0 || k.is_infinite() {
        return f64::NEG_INFINITY;
    }
    if k == 0.0 {
        return -mu;
    }
    k * mu.ln() - mu - ln_gamma(k + 1.0)
}

fn check_len(what: &'static str, data: &DVector<f64>, other: &DVector<f64>) -> Result<(), FitError> {
    if data.len() != other.len() {
        return Err(FitError::shape(what, (data.len(),), (other.len(),)));
    }
    Ok(())
}

fn nan_to_inf(value: f64) -> f64 {
    if value.is_nan() { f64::INFINITY } else { value }
}

/// `ln Π m_j`, keeping track of the sign of the product (`NaN` if negative).
fn ln_marginal_likelihood(model: &DVector<f64>) -> f64 {
    let mut negative = false;
    let mut ln_abs = 0.0;
    for &m in model.iter() {
        if m < 0.0 {
            negative = !negative;
        }
        ln_abs += m.abs().ln();
    }
    if negative { f64::NAN } else { ln_abs }
}

fn gaussian_ln_likelihood(
    data: &DVector<f64>,
    model: &DVector<f64>,
    total_error: &DVector<f64>,
) -> Result<f64, FitError> {
    check_len("model", data, model)?;
    check_len("total_error", data, total_error)?;
    Ok(data
        .iter()
        .zip(model.iter())
        .zip(total_error.iter())
        .map(|((&d, &m), &s)| gaussian_ln_pdf(d, m, s))
        .sum())
}

fn poisson_ln_likelihood(data: &DVector<f64>, model: &DVector<f64>) -> Result<f64, FitError> {
    check_len("model", data, model)?;
    Ok(data
        .iter()
        .zip(model.iter())
        .map(|(&d, &m)| poisson_ln_pmf(d, m))
        .sum())
}

/// `-2 ln Π N(d_j; m_j, σ_j)`.
pub fn nll_gaussian(
    data: &DVector<f64>,
    model: &DVector<f64>,
    total_error: &DVector<f64>,
) -> Result<f64, FitError> {
    let ln_l = gaussian_ln_likelihood(data, model, total_error)?;
    Ok(nan_to_inf(-2.0 * ln_l))
}

/// `-2 ln Π Poisson(d_j; m_j)`.
pub fn nll_poisson(data: &DVector<f64>, model: &DVector<f64>) -> Result<f64, FitError> {
    let ln_l = poisson_ln_likelihood(data, model)?;
    Ok(nan_to_inf(-2.0 * ln_l))
}

/// `-2 ln (Π N(d_j; m_j, σ_j) / Π m_j)`.
pub fn nllr_gaussian(
    data: &DVector<f64>,
    model: &DVector<f64>,
    total_error: &DVector<f64>,
) -> Result<f64, FitError> {
    let ln_l = gaussian_ln_likelihood(data, model, total_error)?;
    Ok(nan_to_inf(-2.0 * (ln_l - ln_marginal_likelihood(model))))
}

/// `-2 ln (Π Poisson(d_j; m_j) / Π m_j)`.
pub fn nllr_poisson(data: &DVector<f64>, model: &DVector<f64>) -> Result<f64, FitError> {
    let ln_l = poisson_ln_likelihood(data, model)?;
    Ok(nan_to_inf(-2.0 * (ln_l - ln_marginal_likelihood(model))))
}
