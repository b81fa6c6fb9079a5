//! Reporting utilities: residuals and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the cost/profile code stays clean and testable
//! - output changes are localized

use crate::domain::{ContourShape, Profile};
use crate::fit::LinearFit;
use crate::profile::{ContourView, ProfileFit, ProfileView, sigma_tick_label, sigma_ticks};

/// Fitted value and pull for one data point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointResidual {
    pub x: f64,
    pub y_obs: f64,
    pub y_fit: f64,
    pub residual: f64,
    /// Residual in units of the total error of the point.
    pub pull: f64,
}

/// Residuals of every data point against the best-fit model.
pub fn compute_residuals(fit: &LinearFit, total_error: &[f64]) -> Vec<PointResidual> {
    let data = fit.data();
    data.x
        .iter()
        .zip(&data.y)
        .zip(total_error)
        .map(|((&x, &y_obs), &err)| {
            let y_fit = fit.predict(x);
            let residual = y_obs - y_fit;
            PointResidual {
                x,
                y_obs,
                y_fit,
                residual,
                pull: if err > 0.0 { residual / err } else { f64::NAN },
            }
        })
        .collect()
}

/// Fit summary: cost function, goodness of fit and parameters.
pub fn format_fit_summary(fit: &LinearFit) -> String {
    let mut out = String::new();
    let cost = fit.cost_function();

    out.push_str("=== fitprof - cost function profiles ===\n");
    out.push_str(&format!("Cost function: {} ({})\n", cost.formatter().name, cost.description()));
    out.push_str(&format!("Points: n={} | degree={}\n", fit.data().len(), fit.model().degree()));
    out.push_str(&format!("{}\n", fit.cost_summary(4)));
    if !fit.did_converge() {
        out.push_str("WARNING: minimization did not converge\n");
    }

    out.push_str("\nParameters:\n");
    for formatter in fit.parameter_formatters() {
        out.push_str(&format!("- {}\n", formatter.get_formatted(true, true, true, 2, false)));
    }
    let nuisance = fit.nuisance_values();
    if !nuisance.is_empty() {
        out.push_str(&format!("- nuisance: {}\n", fmt_vec(&nuisance)));
    }
    out.push('\n');
    out
}

pub fn format_residuals(rows: &[PointResidual]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:>10} {:>12} {:>12} {:>12} {:>8}\n", "x", "y_obs", "y_fit", "residual", "pull"));
    out.push_str(&format!("{:-<10} {:-<12} {:-<12} {:-<12} {:-<8}\n", "", "", "", "", ""));
    for r in rows {
        out.push_str(&format!(
            "{:>10.4} {:>12.4} {:>12.4} {:>12.4} {:>8.2}\n",
            r.x, r.y_obs, r.y_fit, r.residual, r.pull
        ));
    }
    out
}

/// Profile table with the parabolic approximation and sigma-spaced ticks.
pub fn format_profile(view: &ProfileView) -> String {
    let mut out = String::new();
    let Profile { x, y, subtract_min, .. } = &view.profile;

    out.push_str(&format!(
        "Profile of {} ({}{})\n",
        view.parameter_label,
        view.cost_label,
        if *subtract_min { ", minimum subtracted" } else { "" }
    ));
    out.push_str(&format!(
        "Minimum: {} = {:.6} ± {:.6}\n",
        view.parameter_label, view.minimum.0, view.parameter_error
    ));

    let ticks = sigma_ticks(view.minimum.0, view.parameter_error, first(x), last(x));
    let labels: Vec<String> = ticks
        .iter()
        .map(|t| format!("{t:.4} ({})", sigma_tick_label(*t, view.minimum.0, view.parameter_error)))
        .collect();
    out.push_str(&format!("Ticks: {}\n", labels.join(", ")));

    out.push_str(&format!("{:>14} {:>14} {:>14}\n", "x", "profile", "parabola"));
    out.push_str(&format!("{:-<14} {:-<14} {:-<14}\n", "", "", ""));
    for ((xi, yi), pi) in x.iter().zip(y).zip(&view.parabola) {
        let y_str = if yi.is_nan() { "failed".to_string() } else { format!("{yi:.6}") };
        out.push_str(&format!("{xi:>14.6} {y_str:>14} {pi:>14.6}\n"));
    }
    out
}

/// One line per confidence level, plus the point list or grid extent.
pub fn format_contours(view: &ContourView) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Contours of {} vs {} (minimum at {:.6}, {:.6})\n",
        view.parameter_1_label, view.parameter_2_label, view.minimum.0, view.minimum.1
    ));
    for entry in &view.contours {
        let Some(contour) = &entry.contour else {
            out.push_str(&format!("{}: not available\n", entry.label));
            continue;
        };
        match &contour.shape {
            ContourShape::Points(points) => {
                let (x_lo, x_hi) = extent(&points.x);
                let (y_lo, y_hi) = extent(&points.y);
                out.push_str(&format!(
                    "{}: {} points, {} in [{x_lo:.6}, {x_hi:.6}], {} in [{y_lo:.6}, {y_hi:.6}]\n",
                    entry.label,
                    points.len(),
                    view.parameter_1_label,
                    view.parameter_2_label,
                ));
            }
            ContourShape::Grid(grid) => {
                out.push_str(&format!(
                    "{}: grid {}×{}, iso-value {}\n",
                    entry.label,
                    grid.grid_x.len(),
                    grid.grid_y.len(),
                    entry.confidence.sigma()
                ));
            }
        }
    }
    out
}

fn first(v: &[f64]) -> f64 {
    v.first().copied().unwrap_or(f64::NAN)
}

fn last(v: &[f64]) -> f64 {
    v.last().copied().unwrap_or(f64::NAN)
}

fn extent(v: &[f64]) -> (f64, f64) {
    v.iter()
        .filter(|x| x.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}
