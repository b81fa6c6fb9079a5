//! Confidence levels for profiles and contours.
//!
//! A confidence level is a significance `sigma` for `n` jointly profiled parameters.
//! The corresponding cumulative probability is `cl = P(χ²_n ≤ sigma²)`: 68.27 % for
//! `1σ` in one dimension, 39.35 % for `1σ` in two.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::cost::format_general;
use crate::error::FitError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceLevel {
    n_dimensions: usize,
    sigma: f64,
    cl: f64,
}

fn chi_squared(n_dimensions: usize) -> Result<ChiSquared, FitError> {
    if n_dimensions == 0 {
        return Err(FitError::InvalidConfig("confidence level needs at least one dimension".into()));
    }
    ChiSquared::new(n_dimensions as f64).map_err(|e| FitError::InvalidConfig(e.to_string()))
}

impl ConfidenceLevel {
    pub fn from_sigma(n_dimensions: usize, sigma: f64) -> Result<Self, FitError> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(FitError::InvalidConfig(format!("sigma must be finite and > 0, got {sigma}")));
        }
        let cl = chi_squared(n_dimensions)?.cdf(sigma * sigma);
        Ok(Self {
            n_dimensions,
            sigma,
            cl,
        })
    }

    pub fn from_cl(n_dimensions: usize, cl: f64) -> Result<Self, FitError> {
        if !(cl > 0.0 && cl < 1.0) {
            return Err(FitError::InvalidConfig(format!("cl must be in (0, 1), got {cl}")));
        }
        let sigma = chi_squared(n_dimensions)?.inverse_cdf(cl).sqrt();
        Ok(Self {
            n_dimensions,
            sigma,
            cl,
        })
    }

    pub fn n_dimensions(&self) -> usize {
        self.n_dimensions
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn cl(&self) -> f64 {
        self.cl
    }

    /// Cost increase above the minimum that bounds this region (`Δχ² = sigma²`).
    pub fn delta_cost(&self) -> f64 {
        self.sigma * self.sigma
    }

    /// `1-sigma`
    pub fn sigma_string(&self) -> String {
        format!("{}-sigma", format_general(self.sigma, 3))
    }

    /// `1σ`
    pub fn sigma_label(&self) -> String {
        format!("{}σ", format_general(self.sigma, 6))
    }

    pub fn sigma_latex_string(&self) -> String {
        format!("{}$\\sigma$", format_general(self.sigma, 6))
    }

    /// `39.35% CL`
    pub fn cl_string(&self) -> String {
        format!("{}% CL", format_general(self.cl * 100.0, 4))
    }

    pub fn cl_latex_string(&self) -> String {
        format!("${}\\%$ CL", format_general(self.cl * 100.0, 4))
    }
}
