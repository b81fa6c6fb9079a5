//! Profile and contour computation on top of a [`ProfileFit`].
//!
//! The profiler holds no state besides its configuration: every call asks the fit
//! for fresh re-minimizations, and nothing is cached between calls.

use tracing::{debug, warn};

use super::confidence::ConfidenceLevel;
use super::fit::ProfileFit;
use super::view::{ContourView, LabelledContour, MatrixLayout, MatrixOptions, ProfileView, contour_label};
use crate::cost::latexify;
use crate::domain::{Contour, ContourPoints, ContourShape, NamingConvention, Profile, ProfilerConfig};
use crate::error::FitError;
use crate::math::gaussian_filter_wrap;

/// Contours are traced for two parameters at a time.
const CONTOUR_DIMENSIONS: usize = 2;

pub struct ContoursProfiler<'a, F: ProfileFit + ?Sized> {
    fit: &'a F,
    config: ProfilerConfig,
}

impl<'a, F: ProfileFit + ?Sized> ContoursProfiler<'a, F> {
    pub fn new(fit: &'a F, config: ProfilerConfig) -> Result<Self, FitError> {
        config.validate()?;
        Ok(Self { fit, config })
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Profile of the cost function along `parameter`.
    pub fn get_profile(&self, parameter: &str) -> Result<Profile, FitError> {
        debug!(
            parameter,
            points = self.config.profile_points,
            bound = self.config.profile_bound,
            "profiling"
        );
        let (x, y) = self.fit.profile(
            parameter,
            self.config.profile_points,
            self.config.profile_bound,
            self.config.profile_subtract_min,
        )?;
        if x.len() != y.len() {
            return Err(FitError::Computation(format!(
                "profile of '{parameter}' returned {} x values and {} y values",
                x.len(),
                y.len()
            )));
        }
        Ok(Profile {
            parameter: parameter.to_string(),
            x,
            y,
            subtract_min: self.config.profile_subtract_min,
        })
    }

    /// One `(confidence level, contour)` pair per configured sigma value, in
    /// configuration order. Levels the fit could not trace are kept as `None`.
    ///
    /// `smoothing_sigma` overrides the configured smoothing; `0` disables it.
    pub fn get_contours(
        &self,
        parameter_1: &str,
        parameter_2: &str,
        smoothing_sigma: Option<f64>,
    ) -> Result<Vec<(ConfidenceLevel, Option<Contour>)>, FitError> {
        let smoothing = smoothing_sigma.unwrap_or(self.config.contour_smoothing_sigma);
        if !(smoothing.is_finite() && smoothing >= 0.0) {
            return Err(FitError::InvalidConfig(format!(
                "smoothing sigma must be finite and >= 0, got {smoothing}"
            )));
        }

        let mut out = Vec::with_capacity(self.config.contour_sigma_values.len());
        for &sigma in &self.config.contour_sigma_values {
            let cl = ConfidenceLevel::from_sigma(CONTOUR_DIMENSIONS, sigma)?;
            debug!(parameter_1, parameter_2, sigma, cl = cl.cl(), "tracing contour");

            let contour = self
                .fit
                .contour(parameter_1, parameter_2, sigma, &self.config.contour)?
                .map(|shape| Contour {
                    parameter_1: parameter_1.to_string(),
                    parameter_2: parameter_2.to_string(),
                    sigma,
                    shape: smooth(shape, smoothing),
                });
            if contour.is_none() {
                warn!(parameter_1, parameter_2, sigma, "contour could not be determined");
            }
            out.push((cl, contour));
        }
        Ok(out)
    }

    /// Profile plus parabolic approximation, fit minimum and error span.
    pub fn profile_view(&self, parameter: &str) -> Result<ProfileView, FitError> {
        let idx = self.fit.parameter_index(parameter)?;
        let value = self.fit.parameter_values()[idx];
        let error = self.fit.parameter_errors()[idx];
        let profile = self.get_profile(parameter)?;

        let y_offset = if self.config.profile_subtract_min {
            0.0
        } else {
            self.fit.cost_function_value()
        };
        let quad_coeff = 1.0 / (error * error);
        let parabola = profile
            .x
            .iter()
            .map(|x| quad_coeff * (x - value).powi(2) + y_offset)
            .collect();

        let cost = self.fit.cost_function_formatter();
        Ok(ProfileView {
            profile,
            parameter_label: self.parameter_label(idx, parameter),
            cost_label: format!("profile {}", cost.name),
            parameter_latex_label: self.parameter_latex_label(idx, parameter),
            cost_latex_label: format!("profile ${}$", cost.latex_name),
            parabola,
            minimum: (value, y_offset),
            parameter_error: error,
            error_span: (value - error, value + error),
        })
    }

    /// Contours with legend labels in the requested naming convention.
    pub fn contour_view(
        &self,
        parameter_1: &str,
        parameter_2: &str,
        naming_convention: NamingConvention,
    ) -> Result<ContourView, FitError> {
        let idx_1 = self.fit.parameter_index(parameter_1)?;
        let idx_2 = self.fit.parameter_index(parameter_2)?;
        let values = self.fit.parameter_values();
        let errors = self.fit.parameter_errors();

        let contours = self
            .get_contours(parameter_1, parameter_2, None)?
            .into_iter()
            .map(|(confidence, contour)| LabelledContour {
                label: contour_label(&confidence, naming_convention),
                confidence,
                contour,
            })
            .collect();

        Ok(ContourView {
            parameter_1_label: self.parameter_label(idx_1, parameter_1),
            parameter_2_label: self.parameter_label(idx_2, parameter_2),
            parameter_1_latex_label: self.parameter_latex_label(idx_1, parameter_1),
            parameter_2_latex_label: self.parameter_latex_label(idx_2, parameter_2),
            contours,
            minimum: (values[idx_1], values[idx_2]),
            errors: (errors[idx_1], errors[idx_2]),
        })
    }

    /// Panel plan for a profile/contour matrix over `parameters` (all fit parameters
    /// when `None`).
    pub fn matrix_layout(
        &self,
        parameters: Option<&[&str]>,
        options: &MatrixOptions,
    ) -> Result<MatrixLayout, FitError> {
        let names = match parameters {
            None => self.fit.parameter_names().to_vec(),
            Some(requested) => {
                if let Some(unknown) = requested.iter().find(|p| self.fit.parameter_index(p).is_err()) {
                    return Err(FitError::UnknownParameter(unknown.to_string()));
                }
                requested.iter().map(|p| p.to_string()).collect()
            }
        };
        Ok(MatrixLayout::plan(names, options))
    }

    fn parameter_label(&self, idx: usize, fallback: &str) -> String {
        self.fit
            .parameter_formatters()
            .get(idx)
            .map(|f| f.name.clone())
            .unwrap_or_else(|| fallback.to_string())
    }

    fn parameter_latex_label(&self, idx: usize, fallback: &str) -> String {
        let latex = self
            .fit
            .parameter_formatters()
            .get(idx)
            .map(|f| f.latex_name.clone())
            .unwrap_or_else(|| latexify(fallback));
        format!("${latex}$")
    }
}

/// Point sets are smoothed coordinate-wise with wrap-around; grids are left as is.
fn smooth(shape: ContourShape, sigma: f64) -> ContourShape {
    match shape {
        ContourShape::Points(points) if sigma > 0.0 => ContourShape::Points(ContourPoints {
            x: gaussian_filter_wrap(&points.x, sigma),
            y: gaussian_filter_wrap(&points.y, sigma),
        }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::{CostFunctionFormatter, ParameterFormatter};
    use crate::domain::ContourOptions;

    /// Quadratic bowl `cost = 3 + Σ ((p_i - v_i) / e_i)²` with independent parameters.
    struct Bowl {
        names: Vec<String>,
        values: Vec<f64>,
        errors: Vec<f64>,
        formatter: CostFunctionFormatter,
        /// Sigma values for which `contour` fails.
        failing_sigmas: Vec<f64>,
    }

    impl Bowl {
        fn new() -> Self {
            Self {
                names: vec!["a".into(), "b".into()],
                values: vec![1.0, -2.0],
                errors: vec![0.5, 2.0],
                formatter: CostFunctionFormatter::new("chi2", Vec::new()),
                failing_sigmas: Vec::new(),
            }
        }
    }

    impl ProfileFit for Bowl {
        fn parameter_names(&self) -> &[String] {
            &self.names
        }

        fn parameter_values(&self) -> &[f64] {
            &self.values
        }

        fn parameter_errors(&self) -> &[f64] {
            &self.errors
        }

        fn cost_function_value(&self) -> f64 {
            3.0
        }

        fn cost_function_formatter(&self) -> &CostFunctionFormatter {
            &self.formatter
        }

        fn parameter_formatters(&self) -> Vec<ParameterFormatter> {
            self.names
                .iter()
                .zip(&self.values)
                .zip(&self.errors)
                .map(|((n, v), e)| ParameterFormatter::new(n.as_str(), Some(*v), Some(*e)))
                .collect()
        }

        fn profile(
            &self,
            parameter: &str,
            bins: usize,
            bound: f64,
            subtract_min: bool,
        ) -> Result<(Vec<f64>, Vec<f64>), FitError> {
            let i = self.parameter_index(parameter)?;
            let (v, e) = (self.values[i], self.errors[i]);
            let offset = if subtract_min { 0.0 } else { 3.0 };
            let x = crate::math::linspace(v - bound * e, v + bound * e, bins);
            let y = x.iter().map(|x| ((x - v) / e).powi(2) + offset).collect();
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
            if self.failing_sigmas.contains(&sigma) {
                return Ok(None);
            }
            let (x, y): (Vec<f64>, Vec<f64>) = (0..options.points)
                .map(|k| {
                    let t = 2.0 * std::f64::consts::PI * k as f64 / options.points as f64;
                    (
                        self.values[i] + sigma * self.errors[i] * t.cos(),
                        self.values[j] + sigma * self.errors[j] * t.sin(),
                    )
                })
                .unzip();
            Ok(Some(ContourShape::Points(ContourPoints { x, y })))
        }
    }

    #[test]
    fn profile_minimum_matches_fit() {
        let fit = Bowl::new();
        let config = ProfilerConfig {
            profile_points: 11,
            ..Default::default()
        };
        let profiler = ContoursProfiler::new(&fit, config).unwrap();
        let profile = profiler.get_profile("a").unwrap();
        assert_eq!(profile.x.len(), 11);
        assert!((profile.x[5] - 1.0).abs() < 1e-12);
        assert!((profile.y[5] - 3.0).abs() < 1e-12);
        assert!((profile.y[0] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn subtract_min_is_forwarded() {
        let fit = Bowl::new();
        let config = ProfilerConfig {
            profile_points: 5,
            profile_subtract_min: true,
            ..Default::default()
        };
        let profiler = ContoursProfiler::new(&fit, config).unwrap();
        let profile = profiler.get_profile("b").unwrap();
        assert!(profile.subtract_min);
        assert!(profile.y[2].abs() < 1e-12);
    }

    #[test]
    fn unknown_parameter_propagates() {
        let fit = Bowl::new();
        let profiler = ContoursProfiler::new(&fit, ProfilerConfig::default()).unwrap();
        assert_eq!(
            profiler.get_profile("zeta").unwrap_err(),
            FitError::UnknownParameter("zeta".into())
        );
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let fit = Bowl::new();
        let config = ProfilerConfig {
            profile_points: 1,
            ..Default::default()
        };
        assert!(ContoursProfiler::new(&fit, config).is_err());
    }

    #[test]
    fn contours_follow_request_order_and_keep_failures() {
        let mut fit = Bowl::new();
        fit.failing_sigmas = vec![2.0];
        let config = ProfilerConfig {
            contour_sigma_values: vec![3.0, 2.0, 1.0],
            ..Default::default()
        };
        let profiler = ContoursProfiler::new(&fit, config).unwrap();
        let contours = profiler.get_contours("a", "b", None).unwrap();
        let sigmas: Vec<f64> = contours.iter().map(|(cl, _)| cl.sigma()).collect();
        assert_eq!(sigmas, vec![3.0, 2.0, 1.0]);
        assert!(contours[0].1.is_some());
        assert!(contours[1].1.is_none());
        assert!(contours[2].1.is_some());
        assert!((contours[2].0.cl() - 0.393_469_340_287).abs() < 1e-7);
    }

    #[test]
    fn zero_smoothing_returns_points_verbatim() {
        let fit = Bowl::new();
        let profiler = ContoursProfiler::new(&fit, ProfilerConfig::default()).unwrap();
        let raw = fit.contour("a", "b", 1.0, &ContourOptions::default()).unwrap().unwrap();
        let contours = profiler.get_contours("a", "b", Some(0.0)).unwrap();
        assert_eq!(contours[0].1.as_ref().unwrap().shape, raw);
    }

    #[test]
    fn smoothing_keeps_point_count_and_wraps() {
        let fit = Bowl::new();
        let profiler = ContoursProfiler::new(&fit, ProfilerConfig::default()).unwrap();
        let contours = profiler.get_contours("a", "b", Some(3.0)).unwrap();
        let ContourShape::Points(points) = &contours[0].1.as_ref().unwrap().shape else {
            panic!("expected a point set");
        };
        assert_eq!(points.len(), 100);
        // The first point has wrapped neighbours on both sides, so the ellipse shrinks
        // slightly but stays centered.
        assert!((points.y[0] + 2.0).abs() < 1e-9);
        assert!(points.x[0] < 1.5 && points.x[0] > 1.48);
    }

    #[test]
    fn invalid_smoothing_override_is_rejected() {
        let fit = Bowl::new();
        let profiler = ContoursProfiler::new(&fit, ProfilerConfig::default()).unwrap();
        assert!(profiler.get_contours("a", "b", Some(-1.0)).is_err());
    }

    #[test]
    fn profile_view_parabola_and_span() {
        let fit = Bowl::new();
        let config = ProfilerConfig {
            profile_points: 21,
            ..Default::default()
        };
        let profiler = ContoursProfiler::new(&fit, config).unwrap();
        let view = profiler.profile_view("a").unwrap();
        assert_eq!(view.minimum, (1.0, 3.0));
        assert_eq!(view.error_span, (0.5, 1.5));
        assert_eq!(view.cost_label, "profile chi2");
        assert_eq!(view.parameter_label, "a");
        assert_eq!(view.cost_latex_label, "profile ${\\rm chi2}$");
        assert_eq!(view.parameter_latex_label, "$a$");
        for (p, y) in view.parabola.iter().zip(&view.profile.y) {
            assert!((p - y).abs() < 1e-9, "exact quadratic matches its parabola");
        }
    }

    #[test]
    fn naming_convention_only_changes_labels() {
        let fit = Bowl::new();
        let profiler = ContoursProfiler::new(&fit, ProfilerConfig::default()).unwrap();
        let by_sigma = profiler.contour_view("a", "b", NamingConvention::Sigma).unwrap();
        let by_cl = profiler.contour_view("a", "b", NamingConvention::Cl).unwrap();
        assert_eq!(by_sigma.contours[0].label, "1σ contour");
        assert_eq!(by_cl.contours[0].label, "39.35% CL contour");
        assert_eq!(by_cl.contours[1].label, "86.47% CL contour");
        for (s, c) in by_sigma.contours.iter().zip(&by_cl.contours) {
            assert_eq!(s.contour, c.contour);
        }
        assert_eq!(by_sigma.minimum, (1.0, -2.0));
        assert_eq!(by_sigma.errors, (0.5, 2.0));
        assert_eq!(by_sigma.parameter_1_label, "a");
        assert_eq!(by_sigma.parameter_2_latex_label, "$b$");
    }

    #[test]
    fn matrix_layout_validates_parameters() {
        let fit = Bowl::new();
        let profiler = ContoursProfiler::new(&fit, ProfilerConfig::default()).unwrap();
        let layout = profiler.matrix_layout(None, &MatrixOptions::default()).unwrap();
        assert_eq!(layout.parameters, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(layout.panels.len(), 3);

        let err = profiler
            .matrix_layout(Some(&["b", "nope"][..]), &MatrixOptions::default())
            .unwrap_err();
        assert_eq!(err, FitError::UnknownParameter("nope".into()));
    }
}
