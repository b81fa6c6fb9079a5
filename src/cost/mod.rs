//! Cost functions.
//!
//! This module is organized into:
//!
//! - `chi2`: generic chi-square evaluator (covariance / pointwise / no errors)
//! - `nuisance`: chi-square with nuisance parameters for correlated errors
//! - `likelihood`: negative log-likelihood (ratio) for Poisson and Gaussian data
//! - `signature`: explicit, validated argument lists
//! - `format`: plain-text and LaTeX labels
//! - `function`: the `CostFunction` trait and its built-in variants

pub mod chi2;
pub mod format;
pub mod function;
pub mod likelihood;
pub mod nuisance;
pub mod signature;

pub use chi2::{Chi2Spec, generic_chi2, residual};
pub use format::{CostFunctionFormatter, ParameterFormatter, format_general, latexify};
pub use function::{
    Capability, Chi2, Chi2Nuisance, CostBase, CostFunction, CostInputs, NegLogLikelihood,
    NegLogLikelihoodRatio, UserCostFunction,
};
pub use likelihood::{nll_gaussian, nll_poisson, nllr_gaussian, nllr_poisson};
pub use nuisance::{NuisanceSpec, generic_chi2_nuisance};
pub use signature::{FunctionSignature, RESERVED_NAMES, SignatureParameter};
