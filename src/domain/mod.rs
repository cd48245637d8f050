//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - housing vocabulary (`PartType`, `HousingId`, `Channel`, `HousingMapping`)
//! - the persisted parameter set (`FlowParameterSet`)
//! - fit outputs (`FitResult`, `PlateauCandidate`)

pub mod types;

pub use types::*;
