//! The fit capability consumed by the profiler.

use crate::cost::{CostFunctionFormatter, ParameterFormatter};
use crate::domain::{ContourOptions, ContourShape};
use crate::error::FitError;

/// Read access to a converged fit plus the re-minimization routines needed to
/// trace profiles and contours.
///
/// Implementations must treat every `profile`/`contour` call independently: each
/// re-minimization starts from its own copy of the parameter state.
pub trait ProfileFit {
    /// Parameter names in fit order.
    fn parameter_names(&self) -> &[String];

    /// Best-fit values, aligned with [`ProfileFit::parameter_names`].
    fn parameter_values(&self) -> &[f64];

    /// Parameter errors, aligned with [`ProfileFit::parameter_names`].
    fn parameter_errors(&self) -> &[f64];

    /// Cost function value at the minimum.
    fn cost_function_value(&self) -> f64;

    fn cost_function_formatter(&self) -> &CostFunctionFormatter;

    fn parameter_formatters(&self) -> Vec<ParameterFormatter>;

    /// Sample `bins` values of `parameter` within `bound` errors of its fit value,
    /// re-minimizing all other parameters at each sample.
    ///
    /// Samples whose re-minimization fails are returned as `NaN`.
    fn profile(
        &self,
        parameter: &str,
        bins: usize,
        bound: f64,
        subtract_min: bool,
    ) -> Result<(Vec<f64>, Vec<f64>), FitError>;

    /// Trace the `sigma` contour in the `(parameter_1, parameter_2)` plane.
    ///
    /// `Ok(None)` means the contour could not be determined.
    fn contour(
        &self,
        parameter_1: &str,
        parameter_2: &str,
        sigma: f64,
        options: &ContourOptions,
    ) -> Result<Option<ContourShape>, FitError>;

    fn parameter_index(&self, name: &str) -> Result<usize, FitError> {
        self.parameter_names()
            .iter()
            .position(|p| p == name)
            .ok_or_else(|| FitError::UnknownParameter(name.to_string()))
    }
}
