//! Model functions.
//!
//! Models are small, pure types so that fitting code can stay generic over the
//! parameter count.

pub mod polynomial;

pub use polynomial::*;
