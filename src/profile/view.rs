//! Presentation data for profiles, contours and profile/contour matrices.
//!
//! Everything here is plain numbers and strings. A renderer decides how to draw it.

use serde::{Deserialize, Serialize};

use super::confidence::ConfidenceLevel;
use crate::domain::{Contour, NamingConvention, Profile, ShowFor};

/// A profile with the reference elements drawn alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub profile: Profile,
    pub parameter_label: String,
    pub cost_label: String,
    /// LaTeX variants of the labels, math-mode delimited, e.g. `profile $\chi^2$`.
    #[serde(default)]
    pub parameter_latex_label: String,
    #[serde(default)]
    pub cost_latex_label: String,
    /// Parabolic approximation `(x - x̂)² / σ² + y_offset`, sampled at `profile.x`.
    pub parabola: Vec<f64>,
    /// Fit minimum `(x̂, y_offset)`.
    pub minimum: (f64, f64),
    pub parameter_error: f64,
    /// `x̂ ± σ`
    pub error_span: (f64, f64),
}

/// One entry of a [`ContourView`] legend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledContour {
    pub confidence: ConfidenceLevel,
    pub label: String,
    /// `None` when the fit could not trace this level; renderers skip it.
    pub contour: Option<Contour>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourView {
    pub parameter_1_label: String,
    pub parameter_2_label: String,
    #[serde(default)]
    pub parameter_1_latex_label: String,
    #[serde(default)]
    pub parameter_2_latex_label: String,
    pub contours: Vec<LabelledContour>,
    pub minimum: (f64, f64),
    pub errors: (f64, f64),
}

pub(crate) fn contour_label(cl: &ConfidenceLevel, naming: NamingConvention) -> String {
    match naming {
        NamingConvention::Sigma => format!("{} contour", cl.sigma_label()),
        NamingConvention::Cl => format!("{} contour", cl.cl_string()),
    }
}

/// Display options of a profile/contour matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixOptions {
    pub show_grid_for: Option<ShowFor>,
    pub show_ticks_for: Option<ShowFor>,
    pub show_fit_minimum_for: Option<ShowFor>,
    pub show_parabolic_profiles: bool,
    pub show_error_span_profiles: bool,
    /// Also place contours above the diagonal.
    pub full_matrix: bool,
    pub label_ticks_in_sigma: bool,
    pub naming_convention: NamingConvention,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            show_grid_for: None,
            show_ticks_for: None,
            show_fit_minimum_for: Some(ShowFor::Contours),
            show_parabolic_profiles: true,
            show_error_span_profiles: false,
            full_matrix: false,
            label_ticks_in_sigma: true,
            naming_convention: NamingConvention::Sigma,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PanelKind {
    Profile { parameter: String },
    Contour { parameter_1: String, parameter_2: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub row: usize,
    pub col: usize,
    pub kind: PanelKind,
    pub show_grid: bool,
    pub show_ticks: bool,
    pub show_fit_minimum: bool,
    pub show_parabolic: bool,
    pub show_error_span: bool,
}

/// Panel plan of an `n × n` matrix: profiles on the diagonal, contours of
/// `(parameters[col], parameters[row])` below it (and above it for a full matrix).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixLayout {
    pub parameters: Vec<String>,
    pub panels: Vec<Panel>,
    pub label_ticks_in_sigma: bool,
    pub naming_convention: NamingConvention,
}

impl MatrixLayout {
    pub(crate) fn plan(parameters: Vec<String>, options: &MatrixOptions) -> Self {
        let n = parameters.len();
        let mut panels = Vec::with_capacity(n * n);
        for row in 0..n {
            panels.push(Panel {
                row,
                col: row,
                kind: PanelKind::Profile {
                    parameter: parameters[row].clone(),
                },
                show_grid: ShowFor::includes_profiles(options.show_grid_for),
                show_ticks: ShowFor::includes_profiles(options.show_ticks_for),
                show_fit_minimum: ShowFor::includes_profiles(options.show_fit_minimum_for),
                show_parabolic: options.show_parabolic_profiles,
                show_error_span: options.show_error_span_profiles,
            });
            let cols = (0..n).filter(|&col| col < row || (options.full_matrix && col > row));
            for col in cols {
                panels.push(Panel {
                    row,
                    col,
                    kind: PanelKind::Contour {
                        parameter_1: parameters[col].clone(),
                        parameter_2: parameters[row].clone(),
                    },
                    show_grid: ShowFor::includes_contours(options.show_grid_for),
                    show_ticks: ShowFor::includes_contours(options.show_ticks_for),
                    show_fit_minimum: ShowFor::includes_contours(options.show_fit_minimum_for),
                    show_parabolic: false,
                    show_error_span: false,
                });
            }
        }
        Self {
            parameters,
            panels,
            label_ticks_in_sigma: options.label_ticks_in_sigma,
            naming_convention: options.naming_convention,
        }
    }

    pub fn size(&self) -> usize {
        self.parameters.len()
    }

    pub fn panel(&self, row: usize, col: usize) -> Option<&Panel> {
        self.panels.iter().find(|p| p.row == row && p.col == col)
    }
}
