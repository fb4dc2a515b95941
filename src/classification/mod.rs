//! Classification Module
//!
//! Classifies inventory device records into categories using the CPU
//! pattern catalog and the ordered rule table.

pub mod catalog;
pub mod classifier;
pub mod rules;

pub use catalog::*;
pub use classifier::*;
pub use rules::*;
