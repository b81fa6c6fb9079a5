//! Cost function variants.
//!
//! Every cost function is an immutable configuration chosen at construction time
//! (error usage, fallback policy, data point distribution) plus metadata:
//!
//! - a validated [`FunctionSignature`] naming the inputs it reads
//! - a [`CostFunctionFormatter`] (plain name, LaTeX name, description)
//! - the number of degrees of freedom, once the fit knows it
//! - capabilities the fit must honor (e.g. providing a nuisance vector)
//!
//! Built-in variants: [`Chi2`], [`Chi2Nuisance`], [`NegLogLikelihood`],
//! [`NegLogLikelihoodRatio`]. Arbitrary closures are wrapped by [`UserCostFunction`].

use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::chi2::{Chi2Spec, generic_chi2};
use super::format::{CostFunctionFormatter, ParameterFormatter};
use super::likelihood::{nll_gaussian, nll_poisson, nllr_gaussian, nllr_poisson};
use super::nuisance::{NuisanceSpec, generic_chi2_nuisance};
use super::signature::FunctionSignature;
use crate::domain::{DataPointDistribution, ErrorsToUse};
use crate::error::FitError;

/// Everything a cost function may read. Only `data` and `model` are always present.
#[derive(Debug, Clone, Copy)]
pub struct CostInputs<'a> {
    pub data: &'a DVector<f64>,
    pub model: &'a DVector<f64>,
    pub total_error: Option<&'a DVector<f64>>,
    /// `None` when the total covariance matrix is singular or not configured.
    pub total_cov_mat_inverse: Option<&'a DMatrix<f64>>,
    pub total_uncor_cov_mat_inverse: Option<&'a DMatrix<f64>>,
    pub nuisance_cor_design_mat: Option<&'a DMatrix<f64>>,
    pub nuisance_vector: Option<&'a DVector<f64>>,
}

impl<'a> CostInputs<'a> {
    pub fn new(data: &'a DVector<f64>, model: &'a DVector<f64>) -> Self {
        Self {
            data,
            model,
            total_error: None,
            total_cov_mat_inverse: None,
            total_uncor_cov_mat_inverse: None,
            nuisance_cor_design_mat: None,
            nuisance_vector: None,
        }
    }

    pub fn with_total_error(mut self, total_error: Option<&'a DVector<f64>>) -> Self {
        self.total_error = total_error;
        self
    }

    pub fn with_total_cov_mat_inverse(mut self, inverse: Option<&'a DMatrix<f64>>) -> Self {
        self.total_cov_mat_inverse = inverse;
        self
    }

    pub fn with_nuisance(
        mut self,
        uncor_cov_mat_inverse: Option<&'a DMatrix<f64>>,
        design: Option<&'a DMatrix<f64>>,
        nuisance_vector: Option<&'a DVector<f64>>,
    ) -> Self {
        self.total_uncor_cov_mat_inverse = uncor_cov_mat_inverse;
        self.nuisance_cor_design_mat = design;
        self.nuisance_vector = nuisance_vector;
        self
    }
}

/// Auxiliary requirements a cost function places on the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The fit must create, minimize and pass a nuisance parameter vector.
    NeedsNuisance,
}

/// Metadata shared by all cost functions.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBase {
    signature: FunctionSignature,
    formatter: CostFunctionFormatter,
    ndf: Option<usize>,
    capabilities: BTreeSet<Capability>,
}

impl CostBase {
    pub fn new(signature: FunctionSignature) -> Self {
        let arg_formatters = signature
            .names()
            .map(|name| ParameterFormatter::new(name, Some(0.0), None))
            .collect();
        let formatter = CostFunctionFormatter::new(signature.name(), arg_formatters);
        Self {
            signature,
            formatter,
            ndf: None,
            capabilities: BTreeSet::new(),
        }
    }

    fn labelled(mut self, name: &str, latex_name: &str, description: String) -> Self {
        self.formatter.name = name.to_string();
        self.formatter.latex_name = latex_name.to_string();
        self.formatter.description = description;
        self
    }

    pub fn formatter_mut(&mut self) -> &mut CostFunctionFormatter {
        &mut self.formatter
    }

    pub fn set_capability(&mut self, capability: Capability) {
        self.capabilities.insert(capability);
    }
}

/// Interface of every cost function.
pub trait CostFunction: Send + Sync {
    fn base(&self) -> &CostBase;

    fn base_mut(&mut self) -> &mut CostBase;

    /// Evaluate the cost for the given inputs.
    fn evaluate(&self, inputs: &CostInputs<'_>) -> Result<f64, FitError>;

    /// Function name (an identifier, e.g. `chi2_covariance_fallback`).
    fn name(&self) -> &str {
        self.base().signature.name()
    }

    fn signature(&self) -> &FunctionSignature {
        &self.base().signature
    }

    fn formatter(&self) -> &CostFunctionFormatter {
        &self.base().formatter
    }

    fn argument_formatters(&self) -> &[ParameterFormatter] {
        &self.base().formatter.arg_formatters
    }

    fn description(&self) -> &str {
        &self.base().formatter.description
    }

    fn ndf(&self) -> Option<usize> {
        self.base().ndf
    }

    /// Set the number of degrees of freedom; must be positive.
    fn set_ndf(&mut self, ndf: usize) -> Result<(), FitError> {
        if ndf == 0 {
            return Err(FitError::InvalidNdf(ndf));
        }
        self.base_mut().ndf = Some(ndf);
        Ok(())
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.base().capabilities.contains(&capability)
    }

    fn needs_nuisance(&self) -> bool {
        self.has_capability(Capability::NeedsNuisance)
    }
}

fn signature(name: &str, args: &[&str]) -> Result<FunctionSignature, FitError> {
    FunctionSignature::from_names(name, args)
}

/// Least-squares cost function.
#[derive(Debug, Clone, PartialEq)]
pub struct Chi2 {
    base: CostBase,
    errors_to_use: ErrorsToUse,
    fallback_on_singular: bool,
}

impl Chi2 {
    /// `fallback_on_singular`: evaluate as if no errors were given when the covariance
    /// matrix is singular or a pointwise error is zero.
    pub fn new(errors_to_use: ErrorsToUse, fallback_on_singular: bool) -> Result<Self, FitError> {
        let suffix = if fallback_on_singular { "_fallback" } else { "" };
        let (sig, description) = match errors_to_use {
            ErrorsToUse::None => (
                signature("chi2_no_errors", &["data", "model"])?,
                "chi-square (no uncertainties)",
            ),
            ErrorsToUse::Covariance => (
                signature(&format!("chi2_covariance{suffix}"), &["data", "model", "total_cov_mat_inverse"])?,
                "chi-square (with covariance matrix)",
            ),
            ErrorsToUse::Pointwise => (
                signature(&format!("chi2_pointwise_errors{suffix}"), &["data", "model", "total_error"])?,
                "chi-square (with pointwise errors)",
            ),
        };
        Ok(Self {
            base: CostBase::new(sig).labelled("chi2", "\\chi^2", description.to_string()),
            errors_to_use,
            fallback_on_singular,
        })
    }

    /// Build from option strings (`"covariance"`, `"pointwise"`, `"none"`).
    pub fn from_options(errors_to_use: &str, fallback_on_singular: bool) -> Result<Self, FitError> {
        Self::new(errors_to_use.parse()?, fallback_on_singular)
    }

    pub fn errors_to_use(&self) -> ErrorsToUse {
        self.errors_to_use
    }

    pub fn fallback_on_singular(&self) -> bool {
        self.fallback_on_singular
    }
}

impl CostFunction for Chi2 {
    fn base(&self) -> &CostBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CostBase {
        &mut self.base
    }

    fn evaluate(&self, inputs: &CostInputs<'_>) -> Result<f64, FitError> {
        let spec = match self.errors_to_use {
            ErrorsToUse::None => Chi2Spec::default(),
            ErrorsToUse::Covariance => Chi2Spec {
                cov_mat_inverse: inputs.total_cov_mat_inverse,
                fail_on_no_matrix: !self.fallback_on_singular,
                ..Default::default()
            },
            ErrorsToUse::Pointwise => Chi2Spec {
                err: inputs.total_error,
                fail_on_zero_errors: !self.fallback_on_singular,
                ..Default::default()
            },
        };
        generic_chi2(inputs.data, inputs.model, &spec)
    }
}

/// Least-squares cost function with nuisance parameters for correlated errors.
///
/// Only the covariance mode uses nuisance parameters; the pointwise and
/// no-error modes delegate to a plain [`Chi2`].
#[derive(Debug, Clone, PartialEq)]
pub struct Chi2Nuisance {
    base: CostBase,
    plain: Chi2,
}

impl Chi2Nuisance {
    pub fn new(errors_to_use: ErrorsToUse, fallback_on_singular: bool) -> Result<Self, FitError> {
        let plain = Chi2::new(errors_to_use, fallback_on_singular)?;
        let sig = match errors_to_use {
            ErrorsToUse::Covariance => {
                let suffix = if fallback_on_singular { "_fallback" } else { "" };
                signature(
                    &format!("chi2_nui_cov{suffix}"),
                    &[
                        "data",
                        "model",
                        "total_uncor_cov_mat_inverse",
                        "total_nuisance_cor_design_mat",
                        "nuisance_vector",
                    ],
                )?
            }
            _ => plain.signature().clone(),
        };
        let mut base = CostBase::new(sig).labelled(
            "chi2_nui",
            "\\chi^{2}_{nui}",
            "chi-square (with nuisance parameters for correlated uncertainties)".to_string(),
        );
        base.set_capability(Capability::NeedsNuisance);
        Ok(Self { base, plain })
    }

    pub fn from_options(errors_to_use: &str, fallback_on_singular: bool) -> Result<Self, FitError> {
        Self::new(errors_to_use.parse()?, fallback_on_singular)
    }
}

impl CostFunction for Chi2Nuisance {
    fn base(&self) -> &CostBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CostBase {
        &mut self.base
    }

    fn evaluate(&self, inputs: &CostInputs<'_>) -> Result<f64, FitError> {
        if self.plain.errors_to_use() != ErrorsToUse::Covariance {
            return self.plain.evaluate(inputs);
        }
        let empty = DVector::zeros(0);
        let spec = NuisanceSpec {
            nuisance_vector: inputs.nuisance_vector.unwrap_or(&empty),
            nuisance_cor_design_mat: inputs.nuisance_cor_design_mat,
            uncor_cov_mat_inverse: inputs.total_uncor_cov_mat_inverse,
            fail_on_no_matrix: !self.plain.fallback_on_singular(),
        };
        generic_chi2_nuisance(inputs.data, inputs.model, &spec)
    }
}

/// Negative log-likelihood cost function, `-2 ln L`.
#[derive(Debug, Clone, PartialEq)]
pub struct NegLogLikelihood {
    base: CostBase,
    distribution: DataPointDistribution,
}

impl NegLogLikelihood {
    pub fn new(distribution: DataPointDistribution) -> Result<Self, FitError> {
        let sig = match distribution {
            DataPointDistribution::Gaussian => signature("nll_gaussian", &["data", "model", "total_error"])?,
            DataPointDistribution::Poisson => signature("nll_poisson", &["data", "model"])?,
        };
        let description = format!(
            "negative log-likelihood ({} uncertainties)",
            distribution.display_name()
        );
        Ok(Self {
            base: CostBase::new(sig).labelled("nll", "-2\\ln\\mathcal{L}", description),
            distribution,
        })
    }

    /// Build from an option string (`"poisson"` or `"gaussian"`).
    pub fn from_options(data_point_distribution: &str) -> Result<Self, FitError> {
        Self::new(data_point_distribution.parse()?)
    }

    pub fn distribution(&self) -> DataPointDistribution {
        self.distribution
    }
}

impl CostFunction for NegLogLikelihood {
    fn base(&self) -> &CostBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CostBase {
        &mut self.base
    }

    fn evaluate(&self, inputs: &CostInputs<'_>) -> Result<f64, FitError> {
        match self.distribution {
            DataPointDistribution::Gaussian => {
                let err = inputs.total_error.ok_or(FitError::MissingInput("total_error"))?;
                nll_gaussian(inputs.data, inputs.model, err)
            }
            DataPointDistribution::Poisson => nll_poisson(inputs.data, inputs.model),
        }
    }
}

/// Negative log-likelihood ratio against the marginal likelihood `Π m_j`.
///
/// Experimental: not validated against reference results.
#[derive(Debug, Clone, PartialEq)]
pub struct NegLogLikelihoodRatio {
    base: CostBase,
    distribution: DataPointDistribution,
}

impl NegLogLikelihoodRatio {
    pub fn new(distribution: DataPointDistribution) -> Result<Self, FitError> {
        warn!("the negative log-likelihood ratio cost function is experimental and has not been validated");
        let sig = match distribution {
            DataPointDistribution::Gaussian => signature("nllr_gaussian", &["data", "model", "total_error"])?,
            DataPointDistribution::Poisson => signature("nllr_poisson", &["data", "model"])?,
        };
        let description = format!(
            "negative log-likelihood ratio ({} uncertainties)",
            distribution.display_name()
        );
        Ok(Self {
            base: CostBase::new(sig).labelled("nllr", "-2\\ln\\mathcal{L}_{\\rm R}", description),
            distribution,
        })
    }

    pub fn from_options(data_point_distribution: &str) -> Result<Self, FitError> {
        Self::new(data_point_distribution.parse()?)
    }
}

impl CostFunction for NegLogLikelihoodRatio {
    fn base(&self) -> &CostBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CostBase {
        &mut self.base
    }

    fn evaluate(&self, inputs: &CostInputs<'_>) -> Result<f64, FitError> {
        match self.distribution {
            DataPointDistribution::Gaussian => {
                let err = inputs.total_error.ok_or(FitError::MissingInput("total_error"))?;
                nllr_gaussian(inputs.data, inputs.model, err)
            }
            DataPointDistribution::Poisson => nllr_poisson(inputs.data, inputs.model),
        }
    }
}

type CostClosure = dyn Fn(&CostInputs<'_>) -> f64 + Send + Sync;

/// A user-supplied cost function with an explicit signature.
pub struct UserCostFunction {
    base: CostBase,
    func: Box<CostClosure>,
}

impl UserCostFunction {
    pub fn new<F>(signature: FunctionSignature, func: F) -> Self
    where
        F: Fn(&CostInputs<'_>) -> f64 + Send + Sync + 'static,
    {
        Self {
            base: CostBase::new(signature),
            func: Box::new(func),
        }
    }

    pub fn formatter_mut(&mut self) -> &mut CostFunctionFormatter {
        self.base.formatter_mut()
    }
}

impl std::fmt::Debug for UserCostFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCostFunction")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl CostFunction for UserCostFunction {
    fn base(&self) -> &CostBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CostBase {
        &mut self.base
    }

    fn evaluate(&self, inputs: &CostInputs<'_>) -> Result<f64, FitError> {
        Ok((self.func)(inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f64]) -> DVector<f64> {
        DVector::from_row_slice(values)
    }

    #[test]
    fn chi2_variants_select_error_source() {
        let data = v(&[0.0, 0.0]);
        let model = v(&[1.0, 1.0]);
        let err = v(&[0.5, 0.5]);
        let inputs = CostInputs::new(&data, &model).with_total_error(Some(&err));

        let none = Chi2::new(ErrorsToUse::None, true).unwrap();
        assert!((none.evaluate(&inputs).unwrap() - 2.0).abs() < 1e-12);

        let pointwise = Chi2::new(ErrorsToUse::Pointwise, false).unwrap();
        assert!((pointwise.evaluate(&inputs).unwrap() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn chi2_covariance_strict_and_fallback() {
        let data = v(&[1.0, 2.0]);
        let model = v(&[0.0, 0.0]);
        let inputs = CostInputs::new(&data, &model).with_total_cov_mat_inverse(None);

        let strict = Chi2::new(ErrorsToUse::Covariance, false).unwrap();
        assert!(matches!(strict.evaluate(&inputs), Err(FitError::SingularMatrix(_))));

        let lenient = Chi2::new(ErrorsToUse::Covariance, true).unwrap();
        assert!((lenient.evaluate(&inputs).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn chi2_pointwise_zero_errors() {
        let data = v(&[1.0, 2.0]);
        let model = v(&[0.0, 0.0]);
        let err = v(&[0.0, 1.0]);
        let inputs = CostInputs::new(&data, &model).with_total_error(Some(&err));

        let strict = Chi2::from_options("pointwise", false).unwrap();
        assert_eq!(strict.evaluate(&inputs), Err(FitError::ZeroError));

        let lenient = Chi2::from_options("pointwise", true).unwrap();
        assert!((lenient.evaluate(&inputs).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn names_and_descriptions() {
        let chi2 = Chi2::new(ErrorsToUse::Covariance, true).unwrap();
        assert_eq!(chi2.name(), "chi2_covariance_fallback");
        assert_eq!(chi2.formatter().name, "chi2");
        assert_eq!(chi2.formatter().latex_name, "\\chi^2");
        assert_eq!(chi2.description(), "chi-square (with covariance matrix)");
        assert_eq!(
            chi2.argument_formatters().iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["data", "model", "total_cov_mat_inverse"]
        );

        let nll = NegLogLikelihood::from_options("Gaussian").unwrap();
        assert_eq!(nll.description(), "negative log-likelihood (Gaussian uncertainties)");
        assert_eq!(nll.formatter().latex_name, "-2\\ln\\mathcal{L}");

        let nllr = NegLogLikelihoodRatio::from_options("poisson").unwrap();
        assert_eq!(nllr.formatter().name, "nllr");
        assert_eq!(nllr.description(), "negative log-likelihood ratio (Poisson uncertainties)");
    }

    #[test]
    fn invalid_option_strings_fail_at_construction() {
        assert!(matches!(Chi2::from_options("diagonal", true), Err(FitError::InvalidOption { .. })));
        assert!(matches!(
            NegLogLikelihood::from_options("binomial"),
            Err(FitError::InvalidOption { option: "data_point_distribution", .. })
        ));
        assert!(NegLogLikelihoodRatio::from_options("").is_err());
    }

    #[test]
    fn ndf_must_be_positive() {
        let mut chi2 = Chi2::new(ErrorsToUse::None, true).unwrap();
        assert_eq!(chi2.ndf(), None);
        assert_eq!(chi2.set_ndf(0), Err(FitError::InvalidNdf(0)));
        chi2.set_ndf(7).unwrap();
        assert_eq!(chi2.ndf(), Some(7));
    }

    #[test]
    fn nuisance_capability_is_queryable() {
        let plain = Chi2::new(ErrorsToUse::Covariance, true).unwrap();
        assert!(!plain.needs_nuisance());
        let nui = Chi2Nuisance::new(ErrorsToUse::Covariance, true).unwrap();
        assert!(nui.needs_nuisance());
        assert!(nui.has_capability(Capability::NeedsNuisance));
        assert_eq!(nui.name(), "chi2_nui_cov_fallback");
        assert_eq!(nui.formatter().name, "chi2_nui");
    }

    #[test]
    fn nuisance_chi2_uses_nuisance_inputs() {
        let data = v(&[2.0, 3.0]);
        let model = v(&[1.0, 2.0]);
        let design = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let uncor = DMatrix::<f64>::identity(2, 2);
        let nui = v(&[1.0]);
        let inputs = CostInputs::new(&data, &model).with_nuisance(Some(&uncor), Some(&design), Some(&nui));

        let cost = Chi2Nuisance::new(ErrorsToUse::Covariance, false).unwrap();
        assert!((cost.evaluate(&inputs).unwrap() - 1.0).abs() < 1e-12);

        // Pointwise mode ignores the nuisance inputs entirely.
        let err = v(&[1.0, 1.0]);
        let inputs = inputs.with_total_error(Some(&err));
        let cost = Chi2Nuisance::new(ErrorsToUse::Pointwise, false).unwrap();
        assert!((cost.evaluate(&inputs).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn nuisance_chi2_without_nuisance_vector_is_a_configuration_error() {
        let data = v(&[2.0]);
        let model = v(&[1.0]);
        let inputs = CostInputs::new(&data, &model);
        let cost = Chi2Nuisance::new(ErrorsToUse::Covariance, true).unwrap();
        assert!(matches!(cost.evaluate(&inputs), Err(FitError::Configuration(_))));
    }

    #[test]
    fn gaussian_nll_requires_errors() {
        let data = v(&[1.0]);
        let inputs = CostInputs::new(&data, &data);
        let nll = NegLogLikelihood::new(DataPointDistribution::Gaussian).unwrap();
        assert_eq!(nll.evaluate(&inputs), Err(FitError::MissingInput("total_error")));
    }

    #[test]
    fn user_cost_function_wraps_a_closure() {
        let sig = FunctionSignature::from_names("abs_dev", &["data", "model"]).unwrap();
        let mut cost = UserCostFunction::new(sig, |inputs| (inputs.data - inputs.model).abs().sum());
        cost.formatter_mut().latex_name = "S_{1}".into();
        let data = v(&[1.0, -2.0]);
        let model = v(&[0.0, 0.0]);
        assert_eq!(cost.evaluate(&CostInputs::new(&data, &model)).unwrap(), 3.0);
        assert_eq!(cost.name(), "abs_dev");
        assert_eq!(cost.formatter().latex_name, "S_{1}");
    }
}
