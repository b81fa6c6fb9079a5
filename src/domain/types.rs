//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory while profiling
//! - handed to an external renderer as plain numbers
//! - exported to JSON

use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Which uncertainties a chi-square cost function uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorsToUse {
    /// Use the inverse of the total covariance matrix.
    Covariance,
    /// Use pointwise (uncorrelated) total errors.
    Pointwise,
    /// Ignore uncertainties: plain sum of squared residuals.
    None,
}

impl FromStr for ErrorsToUse {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "covariance" => Ok(ErrorsToUse::Covariance),
            "pointwise" => Ok(ErrorsToUse::Pointwise),
            "none" => Ok(ErrorsToUse::None),
            _ => Err(FitError::InvalidOption {
                option: "errors_to_use",
                value: s.to_string(),
                expected: "'covariance', 'pointwise', 'none'",
            }),
        }
    }
}

/// Reference array for relative pointwise errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RelativeTo {
    Data,
    Model,
}

impl RelativeTo {
    /// Parse an optional reference; `"none"` maps to absolute errors.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, FitError> {
        match s.to_lowercase().as_str() {
            "none" => Ok(None),
            _ => s.parse().map(Some),
        }
    }
}

impl FromStr for RelativeTo {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "data" => Ok(RelativeTo::Data),
            "model" => Ok(RelativeTo::Model),
            _ => Err(FitError::InvalidOption {
                option: "err_relative_to",
                value: s.to_string(),
                expected: "'data', 'model', 'none'",
            }),
        }
    }
}

/// Statistics of an individual data point around its model prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DataPointDistribution {
    Poisson,
    Gaussian,
}

impl DataPointDistribution {
    pub fn display_name(self) -> &'static str {
        match self {
            DataPointDistribution::Poisson => "Poisson",
            DataPointDistribution::Gaussian => "Gaussian",
        }
    }
}

impl FromStr for DataPointDistribution {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poisson" => Ok(DataPointDistribution::Poisson),
            "gaussian" => Ok(DataPointDistribution::Gaussian),
            _ => Err(FitError::InvalidOption {
                option: "data_point_distribution",
                value: s.to_string(),
                expected: "'gaussian', 'poisson'",
            }),
        }
    }
}

/// Label convention for contours. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NamingConvention {
    /// `1σ contour`
    Sigma,
    /// `39.35% CL contour`
    Cl,
}

impl FromStr for NamingConvention {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sigma" => Ok(NamingConvention::Sigma),
            "cl" => Ok(NamingConvention::Cl),
            _ => Err(FitError::InvalidOption {
                option: "naming_convention",
                value: s.to_string(),
                expected: "'cl', 'sigma'",
            }),
        }
    }
}

/// How a fitter traces a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContourMethod {
    /// Explicit closed polygon of points on the iso-cost boundary.
    Ellipse,
    /// Scalar field sampled on a regular grid, contoured by the renderer.
    Grid,
}

impl FromStr for ContourMethod {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ellipse" => Ok(ContourMethod::Ellipse),
            "grid" => Ok(ContourMethod::Grid),
            _ => Err(FitError::InvalidOption {
                option: "contour_method",
                value: s.to_string(),
                expected: "'ellipse', 'grid'",
            }),
        }
    }
}

/// Which panels of a profile/contour matrix a display option applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShowFor {
    All,
    Profiles,
    Contours,
}

impl ShowFor {
    /// Parse an optional panel selector; `"none"` disables the option everywhere.
    pub fn parse_optional(s: &str) -> Result<Option<Self>, FitError> {
        match s.to_lowercase().as_str() {
            "none" => Ok(None),
            _ => s.parse().map(Some),
        }
    }

    pub fn includes_profiles(spec: Option<ShowFor>) -> bool {
        matches!(spec, Some(ShowFor::All | ShowFor::Profiles))
    }

    pub fn includes_contours(spec: Option<ShowFor>) -> bool {
        matches!(spec, Some(ShowFor::All | ShowFor::Contours))
    }
}

impl FromStr for ShowFor {
    type Err = FitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ShowFor::All),
            "profiles" => Ok(ShowFor::Profiles),
            "contours" => Ok(ShowFor::Contours),
            _ => Err(FitError::InvalidOption {
                option: "show_for",
                value: s.to_string(),
                expected: "'all', 'profiles', 'contours', 'none'",
            }),
        }
    }
}

/// Options forwarded verbatim to a fitter's contour routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourOptions {
    pub method: ContourMethod,
    /// Number of polygon points (ellipse method).
    pub points: usize,
    /// Number of grid nodes per axis (grid method).
    pub grid_points: usize,
    /// Half-width of the grid, in parameter errors beyond the requested sigma.
    pub grid_margin: f64,
}

impl Default for ContourOptions {
    fn default() -> Self {
        Self {
            method: ContourMethod::Ellipse,
            points: 100,
            grid_points: 41,
            grid_margin: 1.0,
        }
    }
}

/// Profiling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Number of points at which each profile is sampled.
    pub profile_points: usize,
    /// Subtract the cost at the minimum from profile values.
    pub profile_subtract_min: bool,
    /// Sample profiles at most this far from the minimum (in parameter errors).
    pub profile_bound: f64,
    /// Evaluate contours for these confidences (in sigma), in this order.
    pub contour_sigma_values: Vec<f64>,
    /// Sigma of the wrap-around Gaussian smoothing filter (0 disables smoothing).
    pub contour_smoothing_sigma: f64,
    pub contour: ContourOptions,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            profile_points: 100,
            profile_subtract_min: false,
            profile_bound: 2.0,
            contour_sigma_values: vec![1.0, 2.0],
            contour_smoothing_sigma: 0.0,
            contour: ContourOptions::default(),
        }
    }
}

impl ProfilerConfig {
    pub fn validate(&self) -> Result<(), FitError> {
        if self.profile_points < 2 {
            return Err(FitError::InvalidConfig("profile_points must be >= 2".into()));
        }
        if !(self.profile_bound.is_finite() && self.profile_bound > 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "profile_bound must be finite and > 0, got {}",
                self.profile_bound
            )));
        }
        if let Some(bad) = self
            .contour_sigma_values
            .iter()
            .find(|s| !(s.is_finite() && **s > 0.0))
        {
            return Err(FitError::InvalidConfig(format!(
                "contour sigma values must be finite and > 0, got {bad}"
            )));
        }
        if !(self.contour_smoothing_sigma.is_finite() && self.contour_smoothing_sigma >= 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "contour_smoothing_sigma must be finite and >= 0, got {}",
                self.contour_smoothing_sigma
            )));
        }
        if self.contour.points < 3 {
            return Err(FitError::InvalidConfig("contour points must be >= 3".into()));
        }
        if self.contour.grid_points < 2 {
            return Err(FitError::InvalidConfig("contour grid points must be >= 2".into()));
        }
        Ok(())
    }
}

/// A 1D profile of the cost function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub parameter: String,
    /// Parameter values (ascending).
    pub x: Vec<f64>,
    /// Cost values; `NaN` where the re-minimization failed.
    pub y: Vec<f64>,
    pub subtract_min: bool,
}

/// Closed polygon on an iso-cost boundary. The last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourPoints {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl ContourPoints {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Scalar field for contouring.
///
/// `grid_z[(i, j)]` belongs to `(grid_x[i], grid_y[j])` and is expressed in sigma units,
/// so the contour of a given sigma level is the iso-line `grid_z == sigma`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourGrid {
    pub grid_x: Vec<f64>,
    pub grid_y: Vec<f64>,
    pub grid_z: Vec<Vec<f64>>,
}

/// Result of a single contour request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ContourShape {
    Points(ContourPoints),
    Grid(ContourGrid),
}

/// A contour for one parameter pair at one sigma level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    pub parameter_1: String,
    pub parameter_2: String,
    pub sigma: f64,
    pub shape: ContourShape,
}
