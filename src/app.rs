//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and initializes logging
//! - generates a synthetic sample
//! - fits it with the requested cost function
//! - prints profiles / contours
//! - writes the optional JSON export

use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, ContourArgs, CostKind, FitArgs, ProfileArgs};
use crate::cost::{Chi2, Chi2Nuisance, CostFunction, NegLogLikelihood, NegLogLikelihoodRatio};
use crate::data::{SampleConfig, SampleData, generate_sample};
use crate::domain::{ContourOptions, ProfilerConfig};
use crate::error::{AppError, FitError};
use crate::fit::LinearFit;
use crate::io::{ExportFile, write_export_json};
use crate::profile::{ContoursProfiler, MatrixOptions, PanelKind, ProfileFit};

/// Entry point for the `fitprof` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.log_level);

    match cli.command {
        Command::Profile(args) => handle_profile(args),
        Command::Contour(args) => handle_contour(args),
    }
}

/// `--log-level` sets the default; `RUST_LOG` directives are applied on top.
fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn handle_profile(args: ProfileArgs) -> Result<(), AppError> {
    let sample = generate_sample(&sample_config_from_args(&args.fit))?;
    let total_error = sample.errors.total_error(&sample.data.y_vector())?;
    let fit = fit_sample(sample, &args.fit)?;
    println!("{}", crate::report::format_fit_summary(&fit));
    if args.residuals {
        let rows = crate::report::compute_residuals(&fit, total_error.as_slice());
        println!("{}", crate::report::format_residuals(&rows));
    }

    let profiler = ContoursProfiler::new(&fit, profile_config_from_args(&args))?;
    let parameters = if args.parameters.is_empty() {
        fit.parameter_names().to_vec()
    } else {
        args.parameters.clone()
    };

    let mut export = ExportFile::from_fit(&fit, fit.ndf());
    for parameter in &parameters {
        let view = profiler.profile_view(parameter)?;
        println!("{}", crate::report::format_profile(&view));
        export.profiles.push(view);
    }

    if let Some(path) = &args.fit.export {
        write_export_json(path, &export)?;
        info!(path = %path.display(), "wrote export");
    }
    Ok(())
}

fn handle_contour(args: ContourArgs) -> Result<(), AppError> {
    let sample = generate_sample(&sample_config_from_args(&args.fit))?;
    let fit = fit_sample(sample, &args.fit)?;
    println!("{}", crate::report::format_fit_summary(&fit));

    let profiler = ContoursProfiler::new(&fit, contour_config_from_args(&args))?;
    let pairs = match args.pair.as_slice() {
        [] => {
            let options = MatrixOptions {
                full_matrix: args.full_matrix,
                naming_convention: args.naming,
                ..MatrixOptions::default()
            };
            profiler
                .matrix_layout(None, &options)?
                .panels
                .into_iter()
                .filter_map(|panel| match panel.kind {
                    PanelKind::Contour { parameter_1, parameter_2 } => Some((parameter_1, parameter_2)),
                    PanelKind::Profile { .. } => None,
                })
                .collect()
        }
        [p1, p2] => vec![(p1.clone(), p2.clone())],
        other => {
            return Err(AppError::new(
                2,
                format!("--pair needs exactly two parameter names, got {}", other.len()),
            ));
        }
    };
    if pairs.is_empty() {
        return Err(AppError::new(2, "contours need a model with at least two parameters"));
    }

    let mut export = ExportFile::from_fit(&fit, fit.ndf());
    for (p1, p2) in &pairs {
        let view = profiler.contour_view(p1, p2, args.naming)?;
        println!("{}", crate::report::format_contours(&view));
        export.contours.push(view);
    }

    if let Some(path) = &args.fit.export {
        write_export_json(path, &export)?;
        info!(path = %path.display(), "wrote export");
    }
    Ok(())
}

fn fit_sample(sample: SampleData, args: &FitArgs) -> Result<LinearFit, AppError> {
    let cost = cost_function_from_args(args)?;
    info!(
        cost = cost.name(),
        points = sample.data.len(),
        degree = sample.model.degree(),
        "fitting sample"
    );
    Ok(LinearFit::fit(sample.data, sample.model, &sample.errors, cost)?)
}

pub fn cost_function_from_args(args: &FitArgs) -> Result<Box<dyn CostFunction>, FitError> {
    let cost: Box<dyn CostFunction> = match args.cost {
        CostKind::Chi2 => Box::new(Chi2::new(args.errors, args.fallback_on_singular)?),
        CostKind::Chi2Nuisance => Box::new(Chi2Nuisance::new(args.errors, args.fallback_on_singular)?),
        CostKind::Nll => Box::new(NegLogLikelihood::new(args.distribution)?),
        CostKind::Nllr => Box::new(NegLogLikelihoodRatio::new(args.distribution)?),
    };
    Ok(cost)
}

pub fn sample_config_from_args(args: &FitArgs) -> SampleConfig {
    SampleConfig {
        n_points: args.points,
        x_min: args.x_min,
        x_max: args.x_max,
        true_parameters: args.truth.clone(),
        y_error: args.y_error,
        correlated_error: args.correlated_error,
        seed: args.seed,
    }
}

pub fn profile_config_from_args(args: &ProfileArgs) -> ProfilerConfig {
    ProfilerConfig {
        profile_points: args.profile_points,
        profile_subtract_min: args.subtract_min,
        profile_bound: args.bound,
        ..ProfilerConfig::default()
    }
}

pub fn contour_config_from_args(args: &ContourArgs) -> ProfilerConfig {
    ProfilerConfig {
        contour_sigma_values: args.sigma.clone(),
        contour_smoothing_sigma: args.smoothing,
        contour: ContourOptions {
            method: args.method,
            points: args.contour_points,
            grid_points: args.grid_points,
            ..ContourOptions::default()
        },
        ..ProfilerConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::ContourMethod;

    fn parse(argv: &[&str]) -> Command {
        Cli::try_parse_from(argv.iter().copied()).unwrap().command
    }

    #[test]
    fn contour_args_map_onto_profiler_config() {
        let Command::Contour(args) =
            parse(&["fitprof", "contour", "--sigma", "1,3", "--method", "grid", "--smoothing", "0.5"])
        else {
            panic!("expected contour");
        };
        let config = contour_config_from_args(&args);
        assert_eq!(config.contour_sigma_values, vec![1.0, 3.0]);
        assert_eq!(config.contour.method, ContourMethod::Grid);
        assert_eq!(config.contour_smoothing_sigma, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cost_kinds_build_matching_cost_functions() {
        let Command::Profile(args) = parse(&["fitprof", "profile", "--cost", "nll", "--distribution", "poisson"])
        else {
            panic!("expected profile");
        };
        let cost = cost_function_from_args(&args.fit).unwrap();
        assert_eq!(cost.formatter().name, "nll");
        assert!(!cost.needs_nuisance());

        let Command::Profile(args) = parse(&["fitprof", "profile", "--cost", "chi2-nuisance"]) else {
            panic!("expected profile");
        };
        assert!(cost_function_from_args(&args.fit).unwrap().needs_nuisance());
    }

    #[test]
    fn profile_args_round_trip_into_configs() {
        let Command::Profile(args) =
            parse(&["fitprof", "profile", "--truth", "2,1,0.1", "--subtract-min", "--bound", "3"])
        else {
            panic!("expected profile");
        };
        let sample = sample_config_from_args(&args.fit);
        assert_eq!(sample.true_parameters, vec![2.0, 1.0, 0.1]);
        let config = profile_config_from_args(&args);
        assert!(config.profile_subtract_min);
        assert_eq!(config.profile_bound, 3.0);
    }
}
