//! `fit-profile` library crate.
//!
//! Cost functions for curve fitting (chi-square, nuisance chi-square, negative
//! log-likelihood) and the protocol that turns a fitted cost function into 1D
//! profiles and 2D confidence contours.
//!
//! The binary (`fitprof`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - any fitter implementing `profile::ProfileFit` can be profiled

pub mod app;
pub mod cli;
pub mod cost;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod profile;
pub mod report;
