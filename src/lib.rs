//! Device Categorizer
//!
//! Rule-based categorization of inventory devices (servers, virtual
//! machines, desktops, laptops, phones, license hosts) from their hostname,
//! model, type, CPU and OS strings, plus a small weighted product ranker.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────────────┐   ┌──────────────────┐
//! │ DeviceSource │──▶│      DeviceClassifier      │──▶│    ReportSink    │
//! │  CSV/sample  │   │ RuleTable + CpuCatalog     │   │ CSV / JSON summ. │
//! └──────────────┘   └─────────────┬──────────────┘   └──────────────────┘
//!                                  │ Other
//!                          ┌───────▼────────┐
//!                          │    Enricher    │  (optional, bounded fan-out)
//!                          │   CpuLookup    │
//!                          └────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`classification`]: CPU catalogs, rule table and the classifier
//! - [`enrichment`]: Optional online lookup for unrecognized CPUs
//! - [`inventory`]: Device sources and report sinks
//! - [`pipeline`]: A full categorization run
//! - [`ranking`]: Weighted product ranking
//! - [`domain`]: Core domain types and traits
//! - [`config`]: Application configuration
//! - [`error`]: Error types and handling

pub mod classification;
pub mod config;
pub mod domain;
pub mod enrichment;
pub mod error;
pub mod inventory;
pub mod pipeline;
pub mod ranking;

// Re-export commonly used types
pub use classification::{
    Classification, CompiledRuleTable, Condition, CpuCatalog, CpuFamily, DeviceClassifier,
    RuleGroup, RuleTable,
};

pub use config::{AppConfig, EnrichmentConfig, InputConfig, OutputConfig};

pub use domain::ports::{
    CategoryGuess, CategoryLabel, ClassifiedDevice, CpuClass, CpuLookup, DeviceRecord,
    DeviceSource, Field, ReportSink,
};

pub use enrichment::{Enricher, WebSearchLookup};

pub use error::{Error, ErrorAction, Result};

pub use inventory::{CsvDeviceSource, CsvReportSink, JsonSummarySink, StaticDeviceSource};

pub use pipeline::{CategorizationReport, Pipeline, PipelineConfig};

pub use ranking::{rank_products, Product, RankedProduct, RankingWeights};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
