//! Categorization Pipeline
//!
//! Wires a device source, the classifier, optional enrichment and report
//! sinks into a single run.

pub mod runner;
pub mod summary;

pub use runner::*;
pub use summary::*;
