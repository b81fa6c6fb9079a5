//! Generic chi-square evaluator.
//!
//! ```text
//! χ² = (d - m)ᵀ V⁻¹ (d - m)           if an inverse covariance matrix is supplied
//! χ² = Σ ((d_k - m_k) / σ_k)²         if pointwise errors are supplied
//! χ² = Σ (d_k - m_k)²                 otherwise
//! ```
//!
//! Precedence is covariance inverse > pointwise errors > none. A missing inverse
//! covariance means "singular": strict callers fail, lenient callers fall through
//! to the next error source.

use nalgebra::{DMatrix, DVector};

use crate::domain::RelativeTo;
use crate::error::FitError;

/// Error specification for [`generic_chi2`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Chi2Spec<'a> {
    /// Inverse of the total covariance matrix (`None` if singular or not configured).
    pub cov_mat_inverse: Option<&'a DMatrix<f64>>,
    /// Pointwise errors.
    pub err: Option<&'a DVector<f64>>,
    /// Interpret `err` as relative to the data or the model.
    pub err_relative_to: Option<RelativeTo>,
    /// Fail with `SingularMatrix` when `cov_mat_inverse` is `None`.
    pub fail_on_no_matrix: bool,
    /// Fail with `ZeroError` when `err` contains an exact zero.
    pub fail_on_zero_errors: bool,
}

/// `data - model`, failing on a length mismatch.
pub fn residual(data: &DVector<f64>, model: &DVector<f64>) -> Result<DVector<f64>, FitError> {
    if data.len() != model.len() {
        return Err(FitError::shape("model", (data.len(),), (model.len(),)));
    }
    Ok(data - model)
}

/// Evaluate the chi-square cost of `model` against `data`.
pub fn generic_chi2(
    data: &DVector<f64>,
    model: &DVector<f64>,
    spec: &Chi2Spec<'_>,
) -> Result<f64, FitError> {
    let mut res = residual(data, model)?;
    let n = res.len();

    if let Some(cov_inv) = spec.cov_mat_inverse {
        if cov_inv.shape() != (n, n) {
            return Err(FitError::shape("cov_mat_inverse", (n, n), cov_inv.shape()));
        }
        return Ok(res.dot(&(cov_inv * &res)));
    }

    if spec.fail_on_no_matrix {
        return Err(FitError::SingularMatrix("covariance matrix is singular".into()));
    }

    if let Some(err) = spec.err {
        if err.len() != n {
            return Err(FitError::shape("err", (n,), (err.len(),)));
        }

        let err = match spec.err_relative_to {
            Some(RelativeTo::Data) => err.component_mul(data),
            Some(RelativeTo::Model) => err.component_mul(model),
            None => err.clone(),
        };

        if err.iter().any(|e| *e == 0.0) {
            if spec.fail_on_zero_errors {
                return Err(FitError::ZeroError);
            }
            // unit errors
        } else {
            res.component_div_assign(&err);
        }
    }

    Ok(res.norm_squared())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f64]) -> DVector<f64> {
        DVector::from_row_slice(values)
    }

    #[test]
    fn no_errors_is_sum_of_squares() {
        let chi2 = generic_chi2(&v(&[1.0, 2.0, 3.0]), &v(&[0.0, 2.5, 5.0]), &Chi2Spec::default()).unwrap();
        assert!((chi2 - (1.0 + 0.25 + 4.0)).abs() < 1e-12);
    }

    #[test]
    fn identical_data_and_model_give_zero() {
        let d = v(&[1.0, 2.0, 3.0]);
        assert_eq!(generic_chi2(&d, &d, &Chi2Spec::default()).unwrap(), 0.0);
    }

    #[test]
    fn pointwise_unit_errors() {
        let err = v(&[1.0, 1.0]);
        let spec = Chi2Spec { err: Some(&err), ..Default::default() };
        let chi2 = generic_chi2(&v(&[0.0, 0.0]), &v(&[1.0, 1.0]), &spec).unwrap();
        assert!((chi2 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn pointwise_errors_scale_residuals() {
        let err = v(&[0.5, 2.0]);
        let spec = Chi2Spec { err: Some(&err), ..Default::default() };
        let chi2 = generic_chi2(&v(&[1.0, 4.0]), &v(&[0.0, 0.0]), &spec).unwrap();
        assert!((chi2 - (4.0 + 4.0)).abs() < 1e-12);
    }

    #[test]
    fn relative_errors_use_data_or_model() {
        let err = v(&[0.1, 0.1]);
        let data = v(&[10.0, 20.0]);
        let model = v(&[9.0, 22.0]);

        let spec = Chi2Spec { err: Some(&err), err_relative_to: Some(RelativeTo::Data), ..Default::default() };
        let chi2 = generic_chi2(&data, &model, &spec).unwrap();
        assert!((chi2 - (1.0 + 1.0)).abs() < 1e-12);

        let spec = Chi2Spec { err: Some(&err), err_relative_to: Some(RelativeTo::Model), ..Default::default() };
        let chi2 = generic_chi2(&data, &model, &spec).unwrap();
        let expected = (1.0_f64 / 0.9).powi(2) + (2.0_f64 / 2.2).powi(2);
        assert!((chi2 - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_error_strict_and_lenient() {
        let err = v(&[0.0, 2.0]);
        let data = v(&[1.0, 3.0]);
        let model = v(&[0.0, 1.0]);

        let strict = Chi2Spec { err: Some(&err), fail_on_zero_errors: true, ..Default::default() };
        assert_eq!(generic_chi2(&data, &model, &strict), Err(FitError::ZeroError));

        let lenient = Chi2Spec { err: Some(&err), ..Default::default() };
        let chi2 = generic_chi2(&data, &model, &lenient).unwrap();
        assert!((chi2 - (1.0 + 4.0)).abs() < 1e-12, "falls back to the unweighted sum");
    }

    #[test]
    fn identity_inverse_covariance_is_sum_of_squares() {
        let data = v(&[1.5, -2.0, 0.25, 7.0]);
        let model = v(&[0.5, 1.0, 0.0, 6.5]);
        let identity = DMatrix::<f64>::identity(4, 4);
        let spec = Chi2Spec { cov_mat_inverse: Some(&identity), ..Default::default() };
        let chi2 = generic_chi2(&data, &model, &spec).unwrap();
        let plain = generic_chi2(&data, &model, &Chi2Spec::default()).unwrap();
        assert_eq!(chi2, plain);
    }

    #[test]
    fn covariance_takes_precedence_over_pointwise_errors() {
        let cov_inv = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        let err = v(&[100.0, 100.0]);
        let spec = Chi2Spec { cov_mat_inverse: Some(&cov_inv), err: Some(&err), ..Default::default() };
        let chi2 = generic_chi2(&v(&[1.0, 1.0]), &v(&[0.0, 0.0]), &spec).unwrap();
        assert!((chi2 - 4.0).abs() < 1e-12);
    }

    #[test]
    fn missing_matrix_strict_fails() {
        let spec = Chi2Spec { fail_on_no_matrix: true, ..Default::default() };
        let err = generic_chi2(&v(&[1.0]), &v(&[0.0]), &spec).unwrap_err();
        assert!(matches!(err, FitError::SingularMatrix(_)));
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        let err = generic_chi2(&v(&[1.0, 2.0]), &v(&[1.0]), &Chi2Spec::default()).unwrap_err();
        assert!(matches!(err, FitError::ShapeMismatch { what: "model", .. }));

        let e = v(&[1.0]);
        let spec = Chi2Spec { err: Some(&e), ..Default::default() };
        let err = generic_chi2(&v(&[1.0, 2.0]), &v(&[1.0, 2.0]), &spec).unwrap_err();
        assert!(matches!(err, FitError::ShapeMismatch { what: "err", .. }));

        let m = DMatrix::<f64>::identity(3, 3);
        let spec = Chi2Spec { cov_mat_inverse: Some(&m), ..Default::default() };
        let err = generic_chi2(&v(&[1.0, 2.0]), &v(&[1.0, 2.0]), &spec).unwrap_err();
        assert!(matches!(err, FitError::ShapeMismatch { what: "cov_mat_inverse", .. }));
    }
}
