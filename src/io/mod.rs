//! Input/output helpers.
//!
//! - measurement file read/write (`records`)
//! - parameter JSON read/write (`params`)
//! - record sources and magnet metadata (`source`)
//! - scoped staging directory (`workspace`)

pub mod params;
pub mod records;
pub mod source;
pub mod workspace;

pub use params::*;
pub use records::*;
pub use source::*;
pub use workspace::*;
