//! Fitting: cleaning, the LM solver, Imax detection and the stage chain.
//!
//! - `clean`: merge records, drop incomplete rows, apply the current threshold
//! - `fitter`: Levenberg–Marquardt over any `CurveModel`
//! - `columns`: which `Icoil` column drives the loop, and who carries it
//! - `imax`: pump-speed plateau detection
//! - `chain`: pump speed → flow → pressure → outlet mean

pub mod chain;
pub mod clean;
pub mod columns;
pub mod fitter;
pub mod imax;

pub use chain::*;
pub use clean::*;
pub use columns::*;
pub use fitter::*;
pub use imax::*;
