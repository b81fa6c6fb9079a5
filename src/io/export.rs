//! Read/write result JSON files.
//!
//! The export is the portable representation of a profiling run:
//! - cost function, its minimum value and ndf
//! - best-fit parameters with errors
//! - profile and contour views, as handed to a renderer
//!
//! Failed profile samples (`NaN`) are written as `null`.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::profile::{ContourView, ProfileFit, ProfileView};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportParameter {
    pub name: String,
    pub value: f64,
    pub error: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFile {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub cost_function: String,
    pub cost_value: f64,
    pub ndf: Option<usize>,
    pub parameters: Vec<ExportParameter>,
    #[serde(default)]
    pub profiles: Vec<ProfileView>,
    #[serde(default)]
    pub contours: Vec<ContourView>,
}

impl ExportFile {
    /// Snapshot of the fit state; profiles and contours are attached by the caller.
    pub fn from_fit<F: ProfileFit + ?Sized>(fit: &F, ndf: Option<usize>) -> Self {
        let parameters = fit
            .parameter_names()
            .iter()
            .zip(fit.parameter_values())
            .zip(fit.parameter_errors())
            .map(|((name, &value), &error)| ExportParameter {
                name: name.clone(),
                value,
                error,
            })
            .collect();

        Self {
            tool: "fitprof".to_string(),
            created_at: Utc::now(),
            cost_function: fit.cost_function_formatter().name.clone(),
            cost_value: fit.cost_function_value(),
            ndf,
            parameters,
            profiles: Vec::new(),
            contours: Vec::new(),
        }
    }
}

/// Write an export JSON file.
pub fn write_export_json(path: &Path, export: &ExportFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, export)
        .map_err(|e| AppError::new(2, format!("Failed to write export JSON: {e}")))?;

    Ok(())
}

/// Read an export JSON file.
pub fn read_export_json(path: &Path) -> Result<ExportFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open export JSON '{}': {e}", path.display())))?;
    let export: ExportFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid export JSON: {e}")))?;
    Ok(export)
}
