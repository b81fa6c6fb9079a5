//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - configuration enums parsed from option strings (`ErrorsToUse`, `RelativeTo`,
//!   `DataPointDistribution`, `NamingConvention`, `ContourMethod`, `ShowFor`)
//! - profiling configuration (`ProfilerConfig`, `ContourOptions`)
//! - profiling outputs (`Profile`, `Contour`, `ContourShape`)

pub mod types;

pub use types::*;
