//! Enrichment Module
//!
//! Optional, disabled-by-default online lookup for CPUs that the local
//! rules do not recognize.

pub mod enricher;
pub mod web_search;

pub use enricher::*;
pub use web_search::*;
