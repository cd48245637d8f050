//! Cooling-circuit model implementations.
//!
//! Models are small structs implementing `CurveModel` so that the fitter can
//! stay generic over the three chained forms.

pub mod model;

pub use model::*;
