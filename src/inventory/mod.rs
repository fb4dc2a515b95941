//! Inventory I/O
//!
//! Device sources (CSV export, sample data) and report sinks (per-device
//! CSV, JSON summary).

pub mod report;
pub mod source;

pub use report::*;
pub use source::*;
