//! Explicit function signatures.
//!
//! A cost (or model) function declares the ordered names of its arguments, with
//! optional default values, when it is registered. The signature is validated once:
//! names must be identifiers, unique, and must not use the reserved alias `cost`.

use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Names that may not appear as function arguments.
pub const RESERVED_NAMES: &[&str] = &["cost"];

/// A single declared argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureParameter {
    pub name: String,
    pub default: Option<f64>,
}

/// Ordered argument list of a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    name: String,
    parameters: Vec<SignatureParameter>,
}

impl FunctionSignature {
    /// Build and validate a signature from `(name, default)` pairs.
    pub fn new<I, S>(name: impl Into<String>, parameters: I) -> Result<Self, FitError>
    where
        I: IntoIterator<Item = (S, Option<f64>)>,
        S: Into<String>,
    {
        let signature = Self {
            name: name.into(),
            parameters: parameters
                .into_iter()
                .map(|(name, default)| SignatureParameter {
                    name: name.into(),
                    default,
                })
                .collect(),
        };
        signature.validate()?;
        Ok(signature)
    }

    /// Signature whose arguments have no defaults.
    pub fn from_names(name: impl Into<String>, names: &[&str]) -> Result<Self, FitError> {
        Self::new(name, names.iter().map(|n| (*n, None)))
    }

    fn validate(&self) -> Result<(), FitError> {
        if !is_identifier(&self.name) {
            return Err(FitError::InvalidSignature(format!(
                "function name '{}' is not a valid identifier",
                self.name
            )));
        }
        for (i, p) in self.parameters.iter().enumerate() {
            if !is_identifier(&p.name) {
                return Err(FitError::InvalidSignature(format!(
                    "argument '{}' of '{}' is not a valid identifier",
                    p.name, self.name
                )));
            }
            if RESERVED_NAMES.contains(&p.name.as_str()) {
                return Err(FitError::InvalidSignature(format!(
                    "the alias '{}' cannot be used as an argument of '{}'",
                    p.name, self.name
                )));
            }
            if self.parameters[..i].iter().any(|q| q.name == p.name) {
                return Err(FitError::InvalidSignature(format!(
                    "duplicate argument '{}' in '{}'",
                    p.name, self.name
                )));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[SignatureParameter] {
        &self.parameters
    }

    pub fn argcount(&self) -> usize {
        self.parameters.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().any(|n| n == name)
    }

    /// Default value of each argument, `0.0` where none was declared.
    pub fn default_values(&self) -> Vec<f64> {
        self.parameters.iter().map(|p| p.default.unwrap_or(0.0)).collect()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
