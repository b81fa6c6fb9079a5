//! Chi-square with nuisance parameters for correlated uncertainties.
//!
//! Each correlated uncertainty source `k` gets a nuisance parameter `n_k`. The design
//! matrix `C` (`K × N`) holds the correlated shift that one unit of `n_k` induces at
//! each data point, so the shifted residual is `r = d - m - Cᵀ n` and
//!
//! ```text
//! χ² = rᵀ U⁻¹ r + n · n
//! ```
//!
//! where `U⁻¹` is the inverse of the uncorrelated part of the covariance matrix. The
//! `n · n` penalty pulls each nuisance parameter towards zero.
//!
//! Shape checks and the unweighted fallback are delegated to [`super::chi2`].

use nalgebra::{DMatrix, DVector};
use tracing::warn;

use super::chi2::{Chi2Spec, generic_chi2, residual};
use crate::error::FitError;

/// Inputs of [`generic_chi2_nuisance`] besides data and model.
#[derive(Debug, Clone, Copy)]
pub struct NuisanceSpec<'a> {
    pub nuisance_vector: &'a DVector<f64>,
    /// `K × N` correlated-shift design matrix.
    pub nuisance_cor_design_mat: Option<&'a DMatrix<f64>>,
    /// Inverse of the uncorrelated covariance matrix (`None` if singular or absent).
    pub uncor_cov_mat_inverse: Option<&'a DMatrix<f64>>,
    pub fail_on_no_matrix: bool,
}

/// Evaluate the nuisance-parameter chi-square.
pub fn generic_chi2_nuisance(
    data: &DVector<f64>,
    model: &DVector<f64>,
    spec: &NuisanceSpec<'_>,
) -> Result<f64, FitError> {
    let res = residual(data, model)?;
    let n = res.len();
    let nuisance = spec.nuisance_vector;

    if let Some(uncor_inv) = spec.uncor_cov_mat_inverse {
        let shift = correlated_shift(nuisance, spec.nuisance_cor_design_mat, n)?;
        let shifted_model = model + shift;
        let chi2 = generic_chi2(
            data,
            &shifted_model,
            &Chi2Spec {
                cov_mat_inverse: Some(uncor_inv),
                ..Default::default()
            },
        )?;
        return Ok(chi2 + nuisance.norm_squared());
    }

    if nuisance.iter().all(|v| *v == 0.0) {
        return Err(FitError::Configuration(
            "chi-square with nuisance parameters is not supported for fully correlated errors only".into(),
        ));
    }

    if spec.fail_on_no_matrix {
        return Err(FitError::SingularMatrix("uncorrelated covariance matrix is singular".into()));
    }

    // TODO: confirm that dropping the nuisance terms here matches the intended fallback
    warn!("no uncorrelated covariance matrix; evaluating unweighted chi-square without nuisance terms");
    generic_chi2(data, model, &Chi2Spec::default())
}

/// `Cᵀ n`: the per-point shift induced by the nuisance parameters.
fn correlated_shift(
    nuisance: &DVector<f64>,
    design: Option<&DMatrix<f64>>,
    n_points: usize,
) -> Result<DVector<f64>, FitError> {
    let Some(design) = design else {
        if nuisance.is_empty() {
            return Ok(DVector::zeros(n_points));
        }
        return Err(FitError::MissingInput("nuisance_cor_design_mat"));
    };

    if design.shape() != (nuisance.len(), n_points) {
        return Err(FitError::shape(
            "nuisance_cor_design_mat",
            (nuisance.len(), n_points),
            design.shape(),
        ));
    }
    Ok(design.tr_mul(nuisance))
}
