//! Reference fitting.
//!
//! Responsibilities:
//!
//! - minimize an arbitrary cost function (`minimize`)
//! - fit polynomial models and answer profile/contour requests (`linear`)

pub mod linear;
pub mod minimize;

pub use linear::*;
pub use minimize::*;
