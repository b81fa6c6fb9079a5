//! Human-readable and LaTeX labels for cost functions and their arguments.
//!
//! Formatting is presentation only: nothing here feeds back into evaluation.

use serde::{Deserialize, Serialize};

const GREEK_LETTERS: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "pi", "rho", "sigma", "tau", "upsilon", "phi", "chi", "psi",
    "omega", "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi", "Psi",
    "Omega",
];

/// Derive a LaTeX name from a plain identifier.
///
/// - greek letter names become commands (`alpha` → `\alpha`)
/// - the first underscore starts a subscript (`x_0` → `{x}_{0}`)
/// - other multi-letter names are set upright (`amp` → `{\rm amp}`)
pub fn latexify(name: &str) -> String {
    if let Some((base, sub)) = name.split_once('_') {
        if !base.is_empty() && !sub.is_empty() {
            return format!("{{{}}}_{{{}}}", latexify(base), latexify(sub));
        }
    }
    if GREEK_LETTERS.contains(&name) {
        return format!("\\{name}");
    }
    if name.chars().count() <= 1 || name.chars().all(|c| c.is_ascii_digit()) {
        return name.to_string();
    }
    format!("{{\\rm {name}}}")
}

/// Round `value` to `n_significant` digits of `reference` and return both as strings.
///
/// The number of decimals is chosen from the magnitude of `reference` (typically the
/// parameter error), so value and error share a decimal place.
pub fn round_to_reference(value: f64, reference: f64, n_significant: usize) -> (String, String) {
    let decimals = decimals_for(reference, n_significant);
    (format!("{value:.decimals$}"), format!("{reference:.decimals$}"))
}

/// Format `value` with `n_significant` significant digits.
pub fn format_significant(value: f64, n_significant: usize) -> String {
    let decimals = decimals_for(value, n_significant);
    format!("{value:.decimals$}")
}

/// `printf`-style `%g`: `precision` significant digits, trailing zeros removed,
/// exponent notation for very small or large magnitudes.
pub fn format_general(value: f64, precision: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let p = precision.max(1) as i32;
    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= p {
        let formatted = format!("{:.*e}", (p - 1) as usize, value);
        return match formatted.split_once('e') {
            Some((mantissa, exp)) => format!("{}e{exp}", strip_trailing_zeros(mantissa)),
            None => formatted,
        };
    }
    let decimals = (p - 1 - exponent).max(0) as usize;
    strip_trailing_zeros(&format!("{value:.decimals$}")).to_string()
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn decimals_for(reference: f64, n_significant: usize) -> usize {
    let n = n_significant.max(1) as i32;
    if !reference.is_finite() || reference == 0.0 {
        return (n - 1) as usize;
    }
    let magnitude = reference.abs().log10().floor() as i32;
    (n - 1 - magnitude).max(0) as usize
}

/// Formatter for a single function argument / fit parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterFormatter {
    pub name: String,
    pub latex_name: String,
    pub value: Option<f64>,
    pub error: Option<f64>,
}

impl ParameterFormatter {
    pub fn new(name: impl Into<String>, value: Option<f64>, error: Option<f64>) -> Self {
        let name = name.into();
        let latex_name = latexify(&name);
        Self {
            name,
            latex_name,
            value,
            error,
        }
    }

    pub fn with_latex_name(mut self, latex_name: impl Into<String>) -> Self {
        self.latex_name = latex_name.into();
        self
    }

    /// E.g. `a = 1.14 ± 0.05` or `$a = 1.14 \pm 0.05$`.
    pub fn get_formatted(
        &self,
        with_name: bool,
        with_value: bool,
        with_errors: bool,
        n_significant_digits: usize,
        format_as_latex: bool,
    ) -> String {
        let mut out = String::new();
        if with_name {
            out.push_str(if format_as_latex { &self.latex_name } else { &self.name });
        }

        if with_value {
            if let Some(value) = self.value {
                if with_name {
                    out.push_str(" = ");
                }
                match (self.error, with_errors) {
                    (Some(err), true) => {
                        let (v, e) = round_to_reference(value, err, n_significant_digits);
                        let pm = if format_as_latex { " \\pm " } else { " ± " };
                        out.push_str(&v);
                        out.push_str(pm);
                        out.push_str(&e);
                    }
                    _ => out.push_str(&format_significant(value, n_significant_digits)),
                }
            }
        }

        if format_as_latex { format!("${out}$") } else { out }
    }
}

/// Formatter for a cost function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostFunctionFormatter {
    pub name: String,
    pub latex_name: String,
    pub description: String,
    pub arg_formatters: Vec<ParameterFormatter>,
}

impl CostFunctionFormatter {
    pub fn new(name: impl Into<String>, arg_formatters: Vec<ParameterFormatter>) -> Self {
        let name = name.into();
        Self {
            latex_name: latexify(&name),
            description: name.clone(),
            name,
            arg_formatters,
        }
    }

    /// E.g. `chi2 / ndf = 4.2 / 7 = 0.6`.
    ///
    /// Without a value only the name is returned. The per-ndf quotient is added when
    /// requested and an `ndf` is known.
    pub fn get_formatted(
        &self,
        value: Option<f64>,
        ndf: Option<usize>,
        with_name: bool,
        with_value_per_ndf: bool,
        n_significant_digits: usize,
        format_as_latex: bool,
    ) -> String {
        let per_ndf = ndf.filter(|_| with_value_per_ndf);
        let mut out = String::new();

        if with_name {
            if format_as_latex {
                out.push_str(&self.latex_name);
                if per_ndf.is_some() {
                    out.push_str(" / {\\rm ndf}");
                }
            } else {
                out.push_str(&self.name);
                if per_ndf.is_some() {
                    out.push_str(" / ndf");
                }
            }
        }

        if let Some(value) = value {
            if with_name {
                out.push_str(" = ");
            }
            out.push_str(&format_significant(value, n_significant_digits));
            if let Some(ndf) = per_ndf {
                out.push_str(&format!(
                    " / {ndf} = {}",
                    format_significant(value / ndf as f64, n_significant_digits)
                ));
            }
        }

        if format_as_latex { format!("${out}$") } else { out }
    }
}
