//! Domain layer - Core types and port definitions
//!
//! This module defines the device record model, the category labels and the
//! traits (ports) that sources, sinks and lookups implement.

pub mod ports;

pub use ports::*;
