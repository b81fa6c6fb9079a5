//! Datasets and their uncertainties.
//!
//! - `XYData`: measured `(x, y)` pairs
//! - `errors`: uncertainty components and the matrices derived from them
//! - `sample`: seeded synthetic samples

pub mod errors;
pub mod sample;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

pub use errors::{ErrorComponent, ErrorMatrices, ErrorModel, NamedError};
pub use sample::{SampleConfig, SampleData, generate_sample};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XYData {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl XYData {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, FitError> {
        if x.len() != y.len() {
            return Err(FitError::shape("y", (x.len(),), (y.len(),)));
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(FitError::InvalidConfig("data must be finite".into()));
        }
        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn y_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.y)
    }
}
