//! Measurement records and synthetic record generation.

pub mod record;
pub mod synthetic;

pub use record::*;
pub use synthetic::*;
