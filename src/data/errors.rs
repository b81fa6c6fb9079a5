//! Uncertainty model of a dataset.
//!
//! Uncertainties are added as named components. Each component contributes an
//! `N × N` covariance matrix; the total covariance is their sum.
//!
//! - **simple** components: per-point errors `σ_i` with a correlation coefficient `ρ`
//!   shared by all point pairs, `V_ij = ρ σ_i σ_j` (`i ≠ j`), `V_ii = σ_i²`
//! - **matrix** components: an explicit covariance matrix
//!
//! For the nuisance chi-square the total covariance is split into an uncorrelated
//! part `U` and one correlated source per simple component with `ρ > 0`:
//! `V = U + Σ_k c_k c_kᵀ` with `c_k = √ρ σ`. The rows of the design matrix are the
//! `c_k`. Matrix components are always kept in `U`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::math::invert_covariance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ErrorComponent {
    Simple {
        err: Vec<f64>,
        correlation: f64,
        /// `err` is relative to the reference values (usually the data).
        relative: bool,
    },
    Matrix(Vec<Vec<f64>>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedError {
    pub name: String,
    pub component: ErrorComponent,
}

/// Everything the cost functions may need, derived once from an [`ErrorModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMatrices {
    pub total_error: DVector<f64>,
    pub total_cov_mat: DMatrix<f64>,
    /// `None` if the total covariance matrix is singular.
    pub total_cov_mat_inverse: Option<DMatrix<f64>>,
    pub uncor_cov_mat: DMatrix<f64>,
    /// `None` if the uncorrelated covariance matrix is singular (e.g. all errors are
    /// fully correlated).
    pub uncor_cov_mat_inverse: Option<DMatrix<f64>>,
    /// `K × N`, one row per correlated source.
    pub nuisance_cor_design_mat: DMatrix<f64>,
}

impl ErrorMatrices {
    pub fn n_nuisance(&self) -> usize {
        self.nuisance_cor_design_mat.nrows()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorModel {
    n_points: usize,
    components: Vec<NamedError>,
}

impl ErrorModel {
    pub fn new(n_points: usize) -> Self {
        Self {
            n_points,
            components: Vec::new(),
        }
    }

    pub fn n_points(&self) -> usize {
        self.n_points
    }

    pub fn components(&self) -> &[NamedError] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    fn check_name(&self, name: &str) -> Result<(), FitError> {
        if self.components.iter().any(|c| c.name == name) {
            return Err(FitError::InvalidConfig(format!("error component '{name}' already exists")));
        }
        Ok(())
    }

    /// Add per-point errors. A single value is applied to every point.
    pub fn add_simple(
        &mut self,
        name: &str,
        err: &[f64],
        correlation: f64,
        relative: bool,
    ) -> Result<(), FitError> {
        self.check_name(name)?;
        let err = match err.len() {
            1 => vec![err[0]; self.n_points],
            n if n == self.n_points => err.to_vec(),
            n => return Err(FitError::shape("err", (self.n_points,), (n,))),
        };
        if err.iter().any(|e| !(e.is_finite() && *e >= 0.0)) {
            return Err(FitError::InvalidConfig(format!(
                "errors of '{name}' must be finite and >= 0"
            )));
        }
        if !(0.0..=1.0).contains(&correlation) {
            return Err(FitError::InvalidConfig(format!(
                "correlation of '{name}' must be in [0, 1], got {correlation}"
            )));
        }
        self.components.push(NamedError {
            name: name.to_string(),
            component: ErrorComponent::Simple {
                err,
                correlation,
                relative,
            },
        });
        Ok(())
    }

    /// Add an explicit covariance matrix (must be `N × N` and symmetric).
    pub fn add_matrix(&mut self, name: &str, cov: &DMatrix<f64>) -> Result<(), FitError> {
        self.check_name(name)?;
        if cov.shape() != (self.n_points, self.n_points) {
            return Err(FitError::shape("cov_mat", (self.n_points, self.n_points), cov.shape()));
        }
        if (cov - cov.transpose()).abs().max() > 1e-12 * cov.abs().max().max(1.0) {
            return Err(FitError::InvalidConfig(format!("covariance matrix '{name}' is not symmetric")));
        }
        let rows: Vec<Vec<f64>> = cov.row_iter().map(|r| r.iter().copied().collect()).collect();
        self.components.push(NamedError {
            name: name.to_string(),
            component: ErrorComponent::Matrix(rows),
        });
        Ok(())
    }

    /// Absolute per-point errors of a simple component.
    fn absolute(err: &[f64], relative: bool, reference: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            err.len(),
            err.iter()
                .zip(reference.iter())
                .map(|(e, r)| if relative { e * r.abs() } else { *e }),
        )
    }

    fn check_reference(&self, reference: &DVector<f64>) -> Result<(), FitError> {
        if reference.len() != self.n_points {
            return Err(FitError::shape("reference", (self.n_points,), (reference.len(),)));
        }
        Ok(())
    }

    /// Sum of all component covariance matrices.
    pub fn total_cov_mat(&self, reference: &DVector<f64>) -> Result<DMatrix<f64>, FitError> {
        let (uncor, design) = self.split(reference)?;
        Ok(uncor + design.tr_mul(&design))
    }

    /// Uncorrelated covariance and the `K × N` correlated design matrix.
    pub fn split(&self, reference: &DVector<f64>) -> Result<(DMatrix<f64>, DMatrix<f64>), FitError> {
        self.check_reference(reference)?;
        let n = self.n_points;
        let mut uncor = DMatrix::zeros(n, n);
        let mut rows: Vec<DVector<f64>> = Vec::new();

        for named in &self.components {
            match &named.component {
                ErrorComponent::Simple {
                    err,
                    correlation,
                    relative,
                } => {
                    let sigma = Self::absolute(err, *relative, reference);
                    for i in 0..n {
                        uncor[(i, i)] += (1.0 - correlation) * sigma[i] * sigma[i];
                    }
                    if *correlation > 0.0 {
                        rows.push(sigma * correlation.sqrt());
                    }
                }
                ErrorComponent::Matrix(m) => {
                    for (i, row) in m.iter().enumerate() {
                        for (j, v) in row.iter().enumerate() {
                            uncor[(i, j)] += v;
                        }
                    }
                }
            }
        }

        let mut design = DMatrix::zeros(rows.len(), n);
        for (k, row) in rows.iter().enumerate() {
            design.set_row(k, &row.transpose());
        }
        Ok((uncor, design))
    }

    /// `sqrt(diag(V))`
    pub fn total_error(&self, reference: &DVector<f64>) -> Result<DVector<f64>, FitError> {
        let cov = self.total_cov_mat(reference)?;
        Ok(cov.diagonal().map(f64::sqrt))
    }

    /// Assemble every matrix a cost function may read.
    pub fn matrices(&self, reference: &DVector<f64>) -> Result<ErrorMatrices, FitError> {
        let (uncor_cov_mat, nuisance_cor_design_mat) = self.split(reference)?;
        let total_cov_mat = &uncor_cov_mat + nuisance_cor_design_mat.tr_mul(&nuisance_cor_design_mat);
        Ok(ErrorMatrices {
            total_error: total_cov_mat.diagonal().map(f64::sqrt),
            total_cov_mat_inverse: invert_covariance(&total_cov_mat),
            uncor_cov_mat_inverse: invert_covariance(&uncor_cov_mat),
            total_cov_mat,
            uncor_cov_mat,
            nuisance_cor_design_mat,
        })
    }
}
