//! `magnet-flow-params` library crate.
//!
//! Fits the cooling-loop parameters of a magnet (pump speed law, flow and
//! pressure curves, maximum operating current) from recorded test runs.
//!
//! The binary (`flow-params`) is a thin wrapper around this library so the
//! whole pipeline is testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
