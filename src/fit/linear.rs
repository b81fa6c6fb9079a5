//! Reference fitter for models that are linear in their parameters.
//!
//! The model prediction is `m = A θ` with the `N × P` design matrix `A` of a
//! [`PolynomialModel`]. The cost is any [`CostFunction`]; it is minimized with
//! L-BFGS (`argmin`), starting from the unweighted least squares solution.
//! Cost functions that read a nuisance vector get one extra minimization parameter
//! per correlated error source; these are profiled away and never reported.
//!
//! Parameter errors come from the Hessian at the minimum: `cov = 2 H⁻¹` (a unit
//! increase of a `χ²` or `-2 ln L` cost marks one standard deviation).
//!
//! Profiles and contours re-minimize with some parameters held fixed. Every sample
//! starts from its own copy of the best-fit state, so samples run in parallel
//! (`rayon`) and are collected in request order.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::minimize::{Minimum, MinimizerOptions, minimize};
use crate::cost::{CostFunction, CostFunctionFormatter, CostInputs, ParameterFormatter};
use crate::data::{ErrorMatrices, ErrorModel, XYData};
use crate::domain::{ContourGrid, ContourMethod, ContourOptions, ContourPoints, ContourShape};
use crate::error::FitError;
use crate::math::{invert_covariance, linspace, solve_least_squares};
use crate::models::PolynomialModel;
use crate::profile::ProfileFit;

pub struct LinearFit {
    data: XYData,
    y: DVector<f64>,
    model: PolynomialModel,
    design: DMatrix<f64>,
    matrices: ErrorMatrices,
    cost: Box<dyn CostFunction>,
    options: MinimizerOptions,
    n_nuisance: usize,
    /// Best-fit parameters followed by the best-fit nuisance parameters.
    theta: DVector<f64>,
    values: Vec<f64>,
    errors: Vec<f64>,
    covariance: DMatrix<f64>,
    cost_value: f64,
    converged: bool,
}

impl std::fmt::Debug for LinearFit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearFit")
            .field("model", &self.model)
            .field("cost", &self.cost.name())
            .field("values", &self.values)
            .field("errors", &self.errors)
            .field("cost_value", &self.cost_value)
            .finish_non_exhaustive()
    }
}

impl LinearFit {
    /// Fit `model` to `data`.
    ///
    /// Relative errors are taken relative to the data.
    pub fn fit(
        data: XYData,
        model: PolynomialModel,
        errors: &ErrorModel,
        cost: Box<dyn CostFunction>,
    ) -> Result<Self, FitError> {
        Self::fit_with_options(data, model, errors, cost, MinimizerOptions::default())
    }

    pub fn fit_with_options(
        data: XYData,
        model: PolynomialModel,
        errors: &ErrorModel,
        mut cost: Box<dyn CostFunction>,
        options: MinimizerOptions,
    ) -> Result<Self, FitError> {
        let n = data.len();
        let p = model.n_parameters();
        if n < p {
            return Err(FitError::InvalidConfig(format!(
                "{n} data points cannot constrain {p} parameters"
            )));
        }
        if errors.n_points() != n {
            return Err(FitError::shape("errors", (n,), (errors.n_points(),)));
        }

        let y = data.y_vector();
        let design = model.design_matrix(&data.x);
        let matrices = errors.matrices(&y)?;
        let n_nuisance = if cost.needs_nuisance() && cost.signature().contains("nuisance_vector") {
            matrices.n_nuisance()
        } else {
            0
        };
        if n > p {
            cost.set_ndf(n - p)?;
        }

        let start = solve_least_squares(&design, &y)
            .ok_or_else(|| FitError::Computation("initial least squares solve failed".into()))?;
        let mut theta = DVector::zeros(p + n_nuisance);
        theta.rows_mut(0, p).copy_from(&start);

        let mut fit = Self {
            data,
            y,
            model,
            design,
            matrices,
            cost,
            options,
            n_nuisance,
            theta,
            values: Vec::new(),
            errors: Vec::new(),
            covariance: DMatrix::zeros(p, p),
            cost_value: f64::NAN,
            converged: false,
        };

        // Surface configuration errors (zero errors, singular matrices, ...) as such.
        fit.evaluate(&fit.theta)?;
        let minimum = minimize(|t| fit.evaluate_or_nan(t), fit.theta.clone(), &fit.options)?;
        fit.accept(minimum)?;
        info!(
            cost = fit.cost.name(),
            value = fit.cost_value,
            converged = fit.converged,
            "fit finished"
        );
        Ok(fit)
    }

    fn accept(&mut self, minimum: Minimum) -> Result<(), FitError> {
        let p = self.model.n_parameters();
        let full_covariance = invert_covariance(&(&minimum.hessian * 0.5)).ok_or_else(|| {
            FitError::Computation("cost function Hessian is not positive definite at the minimum".into())
        })?;
        if !minimum.converged {
            warn!(iterations = minimum.iterations, "minimization did not converge");
        }
        self.covariance = full_covariance.view((0, 0), (p, p)).into_owned();
        self.errors = self.covariance.diagonal().iter().map(|v| v.sqrt()).collect();
        self.values = minimum.parameters.rows(0, p).iter().copied().collect();
        self.cost_value = minimum.value;
        self.converged = minimum.converged;
        self.theta = minimum.parameters;
        Ok(())
    }

    /// Cost for the full minimization vector (parameters, then nuisance parameters).
    fn evaluate(&self, theta: &DVector<f64>) -> Result<f64, FitError> {
        let p = self.model.n_parameters();
        let model = &self.design * theta.rows(0, p);
        let nuisance = theta.rows(p, self.n_nuisance).into_owned();
        let inputs = CostInputs::new(&self.y, &model)
            .with_total_error(Some(&self.matrices.total_error))
            .with_total_cov_mat_inverse(self.matrices.total_cov_mat_inverse.as_ref())
            .with_nuisance(
                self.matrices.uncor_cov_mat_inverse.as_ref(),
                Some(&self.matrices.nuisance_cor_design_mat),
                Some(&nuisance),
            );
        self.cost.evaluate(&inputs)
    }

    fn evaluate_or_nan(&self, theta: &DVector<f64>) -> f64 {
        self.evaluate(theta).unwrap_or(f64::NAN)
    }

    /// Minimize with the given entries of the minimization vector held fixed.
    fn minimize_fixed(&self, fixed: &[(usize, f64)]) -> Result<Minimum, FitError> {
        let free: Vec<usize> = (0..self.theta.len())
            .filter(|i| fixed.iter().all(|(j, _)| j != i))
            .collect();
        let mut base = self.theta.clone();
        for &(i, v) in fixed {
            base[i] = v;
        }
        let expand = |sub: &DVector<f64>| {
            let mut full = base.clone();
            for (k, &i) in free.iter().enumerate() {
                full[i] = sub[k];
            }
            full
        };
        let start = DVector::from_iterator(free.len(), free.iter().map(|&i| self.theta[i]));
        minimize(|sub| self.evaluate_or_nan(&expand(sub)), start, &self.options)
    }

    fn profiled_cost(&self, fixed: &[(usize, f64)]) -> f64 {
        match self.minimize_fixed(fixed) {
            Ok(m) if m.converged => m.value,
            Ok(m) => {
                debug!(?fixed, iterations = m.iterations, "profile re-minimization did not converge");
                f64::NAN
            }
            Err(e) => {
                debug!(?fixed, error = %e, "profile re-minimization failed");
                f64::NAN
            }
        }
    }

    fn contour_ellipse(&self, i: usize, j: usize, sigma: f64, points: usize) -> Option<ContourShape> {
        let sub = DMatrix::from_row_slice(
            2,
            2,
            &[
                self.covariance[(i, i)],
                self.covariance[(i, j)],
                self.covariance[(j, i)],
                self.covariance[(j, j)],
            ],
        );
        let l = sub.cholesky()?.l();
        let (x, y): (Vec<f64>, Vec<f64>) = (0..points)
            .map(|k| {
                let t = 2.0 * std::f64::consts::PI * k as f64 / points as f64;
                let (c, s) = (t.cos(), t.sin());
                (
                    self.values[i] + sigma * l[(0, 0)] * c,
                    self.values[j] + sigma * (l[(1, 0)] * c + l[(1, 1)] * s),
                )
            })
            .unzip();
        Some(ContourShape::Points(ContourPoints { x, y }))
    }

    fn contour_grid(&self, i: usize, j: usize, sigma: f64, options: &ContourOptions) -> Option<ContourShape> {
        let half = |k: usize| (sigma + options.grid_margin) * self.errors[k];
        let grid_x = linspace(self.values[i] - half(i), self.values[i] + half(i), options.grid_points);
        let grid_y = linspace(self.values[j] - half(j), self.values[j] + half(j), options.grid_points);

        let grid_z: Vec<Vec<f64>> = grid_x
            .par_iter()
            .map(|&gx| {
                grid_y
                    .iter()
                    .map(|&gy| {
                        let delta = self.profiled_cost(&[(i, gx), (j, gy)]) - self.cost_value;
                        // failed cells stay NaN
                        if delta.is_nan() { delta } else { delta.max(0.0).sqrt() }
                    })
                    .collect()
            })
            .collect();

        if grid_z.iter().flatten().all(|z| z.is_nan()) {
            return None;
        }
        Some(ContourShape::Grid(ContourGrid { grid_x, grid_y, grid_z }))
    }

    pub fn data(&self) -> &XYData {
        &self.data
    }

    pub fn model(&self) -> &PolynomialModel {
        &self.model
    }

    pub fn cost_function(&self) -> &dyn CostFunction {
        self.cost.as_ref()
    }

    pub fn parameter_covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Best-fit nuisance parameters (empty unless the cost function uses them).
    pub fn nuisance_values(&self) -> Vec<f64> {
        let p = self.model.n_parameters();
        self.theta.rows(p, self.n_nuisance).iter().copied().collect()
    }

    pub fn ndf(&self) -> Option<usize> {
        self.cost.ndf()
    }

    pub fn did_converge(&self) -> bool {
        self.converged
    }

    /// Model prediction with the best-fit parameters at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        self.model.predict(x, &self.values)
    }

    /// E.g. `chi2 / ndf = 7.45 / 8 = 0.931`.
    pub fn cost_summary(&self, n_significant_digits: usize) -> String {
        self.cost
            .formatter()
            .get_formatted(Some(self.cost_value), self.ndf(), true, true, n_significant_digits, false)
    }
}

impl ProfileFit for LinearFit {
    fn parameter_names(&self) -> &[String] {
        self.model.parameter_names()
    }

    fn parameter_values(&self) -> &[f64] {
        &self.values
    }

    fn parameter_errors(&self) -> &[f64] {
        &self.errors
    }

    fn cost_function_value(&self) -> f64 {
        self.cost_value
    }

    fn cost_function_formatter(&self) -> &CostFunctionFormatter {
        self.cost.formatter()
    }

    fn parameter_formatters(&self) -> Vec<ParameterFormatter> {
        self.parameter_names()
            .iter()
            .zip(&self.values)
            .zip(&self.errors)
            .map(|((name, v), e)| ParameterFormatter::new(name.as_str(), Some(*v), Some(*e)))
            .collect()
    }

    fn profile(
        &self,
        parameter: &str,
        bins: usize,
        bound: f64,
        subtract_min: bool,
    ) -> Result<(Vec<f64>, Vec<f64>), FitError> {
        let idx = self.parameter_index(parameter)?;
        let (value, error) = (self.values[idx], self.errors[idx]);
        let x = linspace(value - bound * error, value + bound * error, bins);

        let offset = if subtract_min { self.cost_value } else { 0.0 };
        let y: Vec<f64> = x
            .par_iter()
            .map(|&xi| self.profiled_cost(&[(idx, xi)]) - offset)
            .collect();
        Ok((x, y))
    }

    fn contour(
        &self,
        parameter_1: &str,
        parameter_2: &str,
        sigma: f64,
        options: &ContourOptions,
    ) -> Result<Option<ContourShape>, FitError> {
        let i = self.parameter_index(parameter_1)?;
        let j = self.parameter_index(parameter_2)?;
        if i == j {
            return Err(FitError::InvalidConfig(format!(
                "contour needs two distinct parameters, got '{parameter_1}' twice"
            )));
        }
        Ok(match options.method {
            ContourMethod::Ellipse => self.contour_ellipse(i, j, sigma, options.points),
            ContourMethod::Grid => self.contour_grid(i, j, sigma, options),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{Chi2, Chi2Nuisance, NegLogLikelihood};
    use crate::domain::{DataPointDistribution, ErrorsToUse};
    use approx::assert_relative_eq;

    fn line_data() -> (XYData, ErrorModel) {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![1.1, 2.9, 5.2, 6.8, 9.1];
        let mut errors = ErrorModel::new(5);
        errors.add_simple("y", &[0.2], 0.0, false).unwrap();
        (XYData::new(x, y).unwrap(), errors)
    }

    fn chi2(errors_to_use: ErrorsToUse) -> Box<dyn CostFunction> {
        Box::new(Chi2::new(errors_to_use, false).unwrap())
    }

    /// Closed-form weighted least squares for comparison.
    fn wls(data: &XYData, sigma: f64) -> (DVector<f64>, DMatrix<f64>) {
        let a = PolynomialModel::line().design_matrix(&data.x) / sigma;
        let b = data.y_vector() / sigma;
        let normal = a.transpose() * &a;
        let cov = normal.clone().try_inverse().unwrap();
        (cov.clone() * a.transpose() * b, cov)
    }

    #[test]
    fn chi2_fit_matches_weighted_least_squares() {
        let (data, errors) = line_data();
        let (expected, cov) = wls(&data, 0.2);
        let fit = LinearFit::fit(data, PolynomialModel::line(), &errors, chi2(ErrorsToUse::Covariance)).unwrap();

        assert!(fit.did_converge());
        assert_relative_eq!(fit.parameter_values()[0], expected[0], epsilon = 1e-6);
        assert_relative_eq!(fit.parameter_values()[1], expected[1], epsilon = 1e-6);
        assert_relative_eq!(fit.parameter_errors()[0], cov[(0, 0)].sqrt(), max_relative = 1e-4);
        assert_relative_eq!(fit.parameter_errors()[1], cov[(1, 1)].sqrt(), max_relative = 1e-4);
        assert_eq!(fit.ndf(), Some(3));
        assert!(fit.nuisance_values().is_empty());
    }

    #[test]
    fn pointwise_and_gaussian_nll_agree_on_parameters() {
        let (data, errors) = line_data();
        let chi2_fit =
            LinearFit::fit(data.clone(), PolynomialModel::line(), &errors, chi2(ErrorsToUse::Pointwise)).unwrap();
        let nll = Box::new(NegLogLikelihood::new(DataPointDistribution::Gaussian).unwrap());
        let nll_fit = LinearFit::fit(data, PolynomialModel::line(), &errors, nll).unwrap();
        for k in 0..2 {
            assert_relative_eq!(chi2_fit.parameter_values()[k], nll_fit.parameter_values()[k], epsilon = 1e-6);
            assert_relative_eq!(
                chi2_fit.parameter_errors()[k],
                nll_fit.parameter_errors()[k],
                max_relative = 1e-4
            );
        }
    }

    #[test]
    fn profile_is_minimal_at_best_fit() {
        let (data, errors) = line_data();
        let fit = LinearFit::fit(data, PolynomialModel::line(), &errors, chi2(ErrorsToUse::Covariance)).unwrap();
        let (x, y) = fit.profile("b", 21, 2.0, false).unwrap();
        assert_eq!(x.len(), 21);
        assert_relative_eq!(x[10], fit.parameter_values()[1], epsilon = 1e-12);
        assert_relative_eq!(y[10], fit.cost_function_value(), epsilon = 1e-6);
        // quadratic cost: one error away costs exactly one unit more
        assert_relative_eq!(y[15] - y[10], 1.0, epsilon = 1e-4);
        assert_relative_eq!(y[0] - y[10], 4.0, epsilon = 1e-4);

        let (_, y0) = fit.profile("b", 21, 2.0, true).unwrap();
        assert!(y0[10].abs() < 1e-6);
    }

    #[test]
    fn unknown_parameter_in_profile() {
        let (data, errors) = line_data();
        let fit = LinearFit::fit(data, PolynomialModel::line(), &errors, chi2(ErrorsToUse::Covariance)).unwrap();
        assert_eq!(
            fit.profile("c", 5, 1.0, false).unwrap_err(),
            FitError::UnknownParameter("c".into())
        );
        assert!(fit.contour("a", "a", 1.0, &ContourOptions::default()).is_err());
    }

    #[test]
    fn ellipse_points_lie_on_the_iso_cost_line() {
        let (data, errors) = line_data();
        let fit = LinearFit::fit(data, PolynomialModel::line(), &errors, chi2(ErrorsToUse::Covariance)).unwrap();
        let options = ContourOptions {
            points: 12,
            ..Default::default()
        };
        let Some(ContourShape::Points(points)) = fit.contour("a", "b", 1.0, &options).unwrap() else {
            panic!("expected a point set");
        };
        assert_eq!(points.len(), 12);
        for (a, b) in points.x.iter().zip(&points.y) {
            let theta = DVector::from_row_slice(&[*a, *b]);
            let delta = fit.evaluate(&theta).unwrap() - fit.cost_function_value();
            assert_relative_eq!(delta, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn grid_contour_is_in_sigma_units() {
        let (data, errors) = line_data();
        let fit = LinearFit::fit(data, PolynomialModel::line(), &errors, chi2(ErrorsToUse::Covariance)).unwrap();
        let options = ContourOptions {
            method: ContourMethod::Grid,
            grid_points: 5,
            ..Default::default()
        };
        let Some(ContourShape::Grid(grid)) = fit.contour("a", "b", 1.0, &options).unwrap() else {
            panic!("expected a grid");
        };
        assert_eq!(grid.grid_x.len(), 5);
        assert_eq!(grid.grid_z.len(), 5);
        assert!(grid.grid_z.iter().all(|row| row.len() == 5));
        assert!(grid.grid_z[2][2] < 1e-3, "center of the grid is the minimum");
        assert!(grid.grid_z[0][2] > 1.0);
    }

    #[test]
    fn zero_errors_are_reported_at_fit_time() {
        let (data, _) = line_data();
        let mut errors = ErrorModel::new(5);
        errors.add_simple("y", &[0.0], 0.0, false).unwrap();
        let err = LinearFit::fit(data, PolynomialModel::line(), &errors, chi2(ErrorsToUse::Pointwise)).unwrap_err();
        assert_eq!(err, FitError::ZeroError);
    }

    #[test]
    fn nuisance_fit_matches_covariance_fit() {
        let (data, _) = line_data();
        let mut errors = ErrorModel::new(5);
        errors.add_simple("stat", &[0.2], 0.0, false).unwrap();
        errors.add_simple("offset", &[0.3], 1.0, false).unwrap();

        let cov_fit =
            LinearFit::fit(data.clone(), PolynomialModel::line(), &errors, chi2(ErrorsToUse::Covariance)).unwrap();
        let nui = Box::new(Chi2Nuisance::new(ErrorsToUse::Covariance, false).unwrap());
        let nui_fit = LinearFit::fit(data, PolynomialModel::line(), &errors, nui).unwrap();

        assert_eq!(nui_fit.nuisance_values().len(), 1);
        for k in 0..2 {
            assert_relative_eq!(cov_fit.parameter_values()[k], nui_fit.parameter_values()[k], epsilon = 1e-5);
            assert_relative_eq!(
                cov_fit.parameter_errors()[k],
                nui_fit.parameter_errors()[k],
                max_relative = 1e-3
            );
        }
        assert_relative_eq!(cov_fit.cost_function_value(), nui_fit.cost_function_value(), epsilon = 1e-5);
    }

    #[test]
    fn too_few_points() {
        let data = XYData::new(vec![1.0], vec![2.0]).unwrap();
        let errors = ErrorModel::new(1);
        assert!(LinearFit::fit(data, PolynomialModel::line(), &errors, chi2(ErrorsToUse::None)).is_err());
    }
}
