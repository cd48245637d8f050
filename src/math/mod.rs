//! Mathematical utilities: numerical derivatives and linear least squares.

pub mod diff;
pub mod ols;

pub use diff::*;
pub use ols::*;
