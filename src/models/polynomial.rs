//! Polynomial model `f(x) = a_0 + a_1 x + … + a_d x^d`.
//!
//! The fitter relies on two primitive operations:
//! - build a design row for a given `x` (one column per parameter)
//! - predict `f(x)` given the parameter values

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::cost::FunctionSignature;
use crate::error::FitError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialModel {
    degree: usize,
    parameter_names: Vec<String>,
}

impl PolynomialModel {
    /// Parameters are named `a_0 … a_d`.
    pub fn new(degree: usize) -> Self {
        Self {
            degree,
            parameter_names: (0..=degree).map(|k| format!("a_{k}")).collect(),
        }
    }

    /// Straight line `a + b x` with parameters `a` and `b`.
    pub fn line() -> Self {
        Self {
            degree: 1,
            parameter_names: vec!["a".into(), "b".into()],
        }
    }

    /// Use custom parameter names, one per coefficient in ascending power order.
    pub fn with_parameter_names(degree: usize, names: &[&str]) -> Result<Self, FitError> {
        if names.len() != degree + 1 {
            return Err(FitError::shape("parameter_names", (degree + 1,), (names.len(),)));
        }
        let model = Self {
            degree,
            parameter_names: names.iter().map(|n| n.to_string()).collect(),
        };
        // x plus the parameters must form a valid signature
        model.signature()?;
        Ok(model)
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn n_parameters(&self) -> usize {
        self.degree + 1
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// `poly(x, a_0, …, a_d)`
    pub fn signature(&self) -> Result<FunctionSignature, FitError> {
        let args = std::iter::once("x").chain(self.parameter_names.iter().map(String::as_str));
        FunctionSignature::new("poly", args.map(|n| (n, None)))
    }

    /// Fill `[1, x, x², …]` into `out`.
    ///
    /// # Panics
    /// Panics if `out` is shorter than `self.n_parameters()`.
    pub fn fill_design_row(&self, x: f64, out: &mut [f64]) {
        let mut power = 1.0;
        for slot in out.iter_mut().take(self.n_parameters()) {
            *slot = power;
            power *= x;
        }
    }

    /// `N × P` design matrix for the given `x` values.
    pub fn design_matrix(&self, x: &[f64]) -> DMatrix<f64> {
        let p = self.n_parameters();
        let mut design = DMatrix::zeros(x.len(), p);
        let mut row = vec![0.0; p];
        for (i, &xi) in x.iter().enumerate() {
            self.fill_design_row(xi, &mut row);
            for (j, v) in row.iter().enumerate() {
                design[(i, j)] = *v;
            }
        }
        design
    }

    /// `f(x)` by Horner's scheme.
    pub fn predict(&self, x: f64, parameters: &[f64]) -> f64 {
        parameters.iter().rev().fold(0.0, |acc, a| acc * x + a)
    }

    pub fn predict_all(&self, x: &[f64], parameters: &[f64]) -> DVector<f64> {
        DVector::from_iterator(x.len(), x.iter().map(|&xi| self.predict(xi, parameters)))
    }
}
