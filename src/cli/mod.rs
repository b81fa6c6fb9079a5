//! Command-line parsing for the `fitprof` profiler.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the cost/profile code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::{ContourMethod, DataPointDistribution, ErrorsToUse, NamingConvention};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "fitprof", version, about = "Cost function profiles and contours of polynomial fits")]
pub struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a synthetic sample and print 1D cost function profiles.
    Profile(ProfileArgs),
    /// Fit a synthetic sample and print 2D confidence contours.
    Contour(ContourArgs),
}

/// Cost function used for the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CostKind {
    Chi2,
    /// Chi-square with one nuisance parameter per correlated error source.
    Chi2Nuisance,
    Nll,
    /// Experimental.
    Nllr,
}

/// Sample and cost options shared by all subcommands.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Number of data points.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub points: usize,

    #[arg(long, default_value_t = 1.0)]
    pub x_min: f64,

    #[arg(long, default_value_t = 10.0)]
    pub x_max: f64,

    /// True polynomial coefficients (ascending powers); sets the model degree.
    #[arg(long, value_delimiter = ',', default_value = "1.0,0.5")]
    pub truth: Vec<f64>,

    /// Uncorrelated y error of every point.
    #[arg(long, default_value_t = 0.3)]
    pub y_error: f64,

    /// Fully correlated y error shared by all points (0 disables it).
    #[arg(long, default_value_t = 0.0)]
    pub correlated_error: f64,

    /// Random seed for sample generation.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = CostKind::Chi2)]
    pub cost: CostKind,

    /// Uncertainties used by the chi-square cost functions.
    #[arg(long, value_enum, default_value_t = ErrorsToUse::Covariance)]
    pub errors: ErrorsToUse,

    /// Fall back to pointwise errors when the covariance matrix is singular.
    #[arg(long)]
    pub fallback_on_singular: bool,

    /// Data point distribution for likelihood cost functions.
    #[arg(long, value_enum, default_value_t = DataPointDistribution::Gaussian)]
    pub distribution: DataPointDistribution,

    /// Write fit, profiles and contours to a JSON file.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub fit: FitArgs,

    /// Parameter to profile (all parameters when omitted). May be repeated.
    #[arg(short = 'p', long = "parameter")]
    pub parameters: Vec<String>,

    /// Number of profile samples.
    #[arg(long, default_value_t = 100)]
    pub profile_points: usize,

    /// Profile range, in parameter errors around the minimum.
    #[arg(long, default_value_t = 2.0)]
    pub bound: f64,

    /// Subtract the cost function minimum from profile values.
    #[arg(long)]
    pub subtract_min: bool,

    /// Also print per-point residuals and pulls.
    #[arg(long)]
    pub residuals: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct ContourArgs {
    #[command(flatten)]
    pub fit: FitArgs,

    /// Parameter pair, e.g. `a_0,a_1` (every pair when omitted).
    #[arg(long, value_delimiter = ',')]
    pub pair: Vec<String>,

    /// Confidence levels, in sigma.
    #[arg(long, value_delimiter = ',', default_value = "1,2")]
    pub sigma: Vec<f64>,

    #[arg(long, value_enum, default_value_t = ContourMethod::Ellipse)]
    pub method: ContourMethod,

    /// Points per contour (ellipse method).
    #[arg(long, default_value_t = 100)]
    pub contour_points: usize,

    /// Grid nodes per axis (grid method).
    #[arg(long, default_value_t = 41)]
    pub grid_points: usize,

    /// Sigma of the wrap-around Gaussian smoothing (0 disables it).
    #[arg(long, default_value_t = 0.0)]
    pub smoothing: f64,

    /// Legend naming: `sigma` (1σ contour) or `cl` (39.35% CL contour).
    #[arg(long, value_enum, default_value_t = NamingConvention::Sigma)]
    pub naming: NamingConvention,

    /// Contours for both orderings of every pair.
    #[arg(long)]
    pub full_matrix: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_defaults() {
        let cli = Cli::try_parse_from(["fitprof", "profile"]).unwrap();
        assert_eq!(cli.log_level, tracing::Level::WARN);
        let Command::Profile(args) = cli.command else { panic!("expected profile") };
        assert_eq!(args.fit.truth, vec![1.0, 0.5]);
        assert_eq!(args.fit.cost, CostKind::Chi2);
        assert_eq!(args.profile_points, 100);
        assert!(args.parameters.is_empty());
    }

    #[test]
    fn contour_lists_and_enums() {
        let cli = Cli::try_parse_from([
            "fitprof",
            "contour",
            "--pair",
            "a_0,a_1",
            "--sigma",
            "1,2,3",
            "--method",
            "grid",
            "--naming",
            "cl",
            "--cost",
            "chi2-nuisance",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        let Command::Contour(args) = cli.command else { panic!("expected contour") };
        assert_eq!(args.pair, vec!["a_0".to_string(), "a_1".to_string()]);
        assert_eq!(args.sigma, vec![1.0, 2.0, 3.0]);
        assert_eq!(args.method, ContourMethod::Grid);
        assert_eq!(args.naming, NamingConvention::Cl);
        assert_eq!(args.fit.cost, CostKind::Chi2Nuisance);
    }
}
