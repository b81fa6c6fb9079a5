//! Mathematical utilities: dense linear algebra and contour smoothing.

pub mod linalg;
pub mod smoothing;

pub use linalg::*;
pub use smoothing::*;
