//! Input/output helpers.
//!
//! - JSON export of fit results, profiles and contours (`export`)

pub mod export;

pub use export::*;
