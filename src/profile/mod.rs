//! Profiles and contours of a fitted cost function.
//!
//! This module is organized into:
//!
//! - `fit`: the `ProfileFit` capability a fitter provides
//! - `confidence`: sigma ↔ confidence level conversion
//! - `profiler`: `ContoursProfiler` (`get_profile`, `get_contours`, views, matrix plan)
//! - `view`: presentation data handed to a renderer
//! - `ticks`: sigma-spaced axis ticks

pub mod confidence;
pub mod fit;
pub mod profiler;
pub mod ticks;
pub mod view;

pub use confidence::ConfidenceLevel;
pub use fit::ProfileFit;
pub use profiler::ContoursProfiler;
pub use ticks::{sigma_tick_label, sigma_ticks};
pub use view::{
    ContourView, LabelledContour, MatrixLayout, MatrixOptions, Panel, PanelKind, ProfileView,
};
