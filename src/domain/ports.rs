//! Domain Ports - Core types and trait definitions for the categorizer
//!
//! These traits define the boundaries between the classification core and
//! external systems. Adapters implement these traits to provide device
//! records, persist reports, or look up unknown CPUs.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

// =============================================================================
// Device Record
// =============================================================================

/// One inventory row as consumed by the classifier.
///
/// Every field is optional; absent fields match as empty strings. Both the
/// `device_*` column names of inventory tables and the short names are
/// accepted when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Row identifier, passed through to reports
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "device_hostname")]
    pub hostname: Option<String>,
    #[serde(default, alias = "device_model")]
    pub model: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default, alias = "device_cpu")]
    pub cpu: Option<String>,
    #[serde(default, alias = "operating_system")]
    pub os: Option<String>,
    /// Origin of the record (table or file name), passed through to reports
    #[serde(default, alias = "source_table")]
    pub source: Option<String>,
}

impl DeviceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    pub fn with_cpu(mut self, cpu: impl Into<String>) -> Self {
        self.cpu = Some(cpu.into());
        self
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Raw value of a matchable field, empty when absent
    pub fn field(&self, field: Field) -> &str {
        let value = match field {
            Field::Hostname => &self.hostname,
            Field::Model => &self.model,
            Field::DeviceType => &self.device_type,
            Field::Cpu => &self.cpu,
            Field::Os => &self.os,
        };
        value.as_deref().unwrap_or("")
    }

    /// True when the CPU field is missing or blank
    pub fn cpu_is_empty(&self) -> bool {
        self.field(Field::Cpu).trim().is_empty()
    }

    /// Name used for this record in reports and logs
    pub fn display_name(&self) -> &str {
        match (self.hostname.as_deref(), self.id.as_deref()) {
            (Some(h), _) if !h.is_empty() => h,
            (_, Some(id)) if !id.is_empty() => id,
            _ => "unnamed",
        }
    }
}

/// Matchable fields of a device record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Hostname,
    Model,
    DeviceType,
    Cpu,
    Os,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Hostname,
        Field::Model,
        Field::DeviceType,
        Field::Cpu,
        Field::Os,
    ];

    /// Stable position, used to index normalized field arrays
    pub fn index(self) -> usize {
        match self {
            Field::Hostname => 0,
            Field::Model => 1,
            Field::DeviceType => 2,
            Field::Cpu => 3,
            Field::Os => 4,
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Hostname => write!(f, "hostname"),
            Field::Model => write!(f, "model"),
            Field::DeviceType => write!(f, "device_type"),
            Field::Cpu => write!(f, "cpu"),
            Field::Os => write!(f, "os"),
        }
    }
}

// =============================================================================
// Category Label
// =============================================================================

/// Category assigned to every device record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CategoryLabel {
    #[serde(rename = "Server-Physical")]
    ServerPhysical,
    #[serde(rename = "Server-VM")]
    ServerVM,
    #[serde(rename = "Cell-phones-ATT")]
    CellPhoneATT,
    #[serde(rename = "Cell-phones-Verizon")]
    CellPhoneVerizon,
    #[serde(rename = "Cell-phones-Other")]
    CellPhoneOther,
    License,
    Desktop,
    Laptop,
    Other,
    Unknown,
}

impl CategoryLabel {
    /// All labels in report order
    pub const ALL: [CategoryLabel; 10] = [
        CategoryLabel::ServerPhysical,
        CategoryLabel::ServerVM,
        CategoryLabel::CellPhoneATT,
        CategoryLabel::CellPhoneVerizon,
        CategoryLabel::CellPhoneOther,
        CategoryLabel::License,
        CategoryLabel::Desktop,
        CategoryLabel::Laptop,
        CategoryLabel::Other,
        CategoryLabel::Unknown,
    ];

    /// Report key, as written to CSV and JSON reports
    pub fn key(self) -> &'static str {
        match self {
            CategoryLabel::ServerPhysical => "Server-Physical",
            CategoryLabel::ServerVM => "Server-VM",
            CategoryLabel::CellPhoneATT => "Cell-phones-ATT",
            CategoryLabel::CellPhoneVerizon => "Cell-phones-Verizon",
            CategoryLabel::CellPhoneOther => "Cell-phones-Other",
            CategoryLabel::License => "License",
            CategoryLabel::Desktop => "Desktop",
            CategoryLabel::Laptop => "Laptop",
            CategoryLabel::Other => "Other",
            CategoryLabel::Unknown => "Unknown",
        }
    }

    /// Human readable name
    pub fn display_name(self) -> &'static str {
        match self {
            CategoryLabel::ServerPhysical => "Server - Physical",
            CategoryLabel::ServerVM => "Server - VM",
            CategoryLabel::CellPhoneATT => "Cell Phones - ATT",
            CategoryLabel::CellPhoneVerizon => "Cell Phones - Verizon",
            CategoryLabel::CellPhoneOther => "Cell Phones - Other",
            CategoryLabel::License => "License",
            CategoryLabel::Desktop => "Desktop Computers",
            CategoryLabel::Laptop => "Laptops",
            CategoryLabel::Other => "Other Devices",
            CategoryLabel::Unknown => "Unknown",
        }
    }

    /// Labels that mean no rule produced an answer
    pub fn is_fallback(self) -> bool {
        matches!(self, CategoryLabel::Other | CategoryLabel::Unknown)
    }
}

impl std::fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CategoryLabel {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        CategoryLabel::ALL
            .iter()
            .copied()
            .find(|label| {
                label.key().eq_ignore_ascii_case(s) || format!("{:?}", label).eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| {
                crate::error::Error::Configuration(format!("Unknown category label: {}", s))
            })
    }
}

// =============================================================================
// CPU Class
// =============================================================================

/// Hardware class inferred from the CPU string alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuClass {
    Virtual,
    Server,
    Mobile,
    Laptop,
    Desktop,
    Unknown,
}

impl std::fmt::Display for CpuClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuClass::Virtual => write!(f, "VM"),
            CpuClass::Server => write!(f, "Server"),
            CpuClass::Mobile => write!(f, "Mobile"),
            CpuClass::Laptop => write!(f, "Laptop"),
            CpuClass::Desktop => write!(f, "Desktop"),
            CpuClass::Unknown => write!(f, "Unknown"),
        }
    }
}

// =============================================================================
// Classification Results
// =============================================================================

/// Guess returned by an enrichment lookup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryGuess {
    pub category: CategoryLabel,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl CategoryGuess {
    pub fn new(category: CategoryLabel, confidence: f64) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// A guess that carries no opinion
    pub fn none() -> Self {
        Self::new(CategoryLabel::Unknown, 0.0)
    }
}

/// A record together with its assigned category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedDevice {
    pub record: DeviceRecord,
    pub category: CategoryLabel,
    pub cpu_class: CpuClass,
    /// Name of the rule group that matched, `None` for the fallback
    pub rule: Option<String>,
    /// Whether the category came from an enrichment lookup
    pub enriched: bool,
}

// =============================================================================
// Device Source Port
// =============================================================================

/// Port for anything that produces a finite sequence of device records
#[async_trait]
pub trait DeviceSource: Send + Sync {
    /// Fetch all device records
    async fn fetch(&self) -> Result<Vec<DeviceRecord>>;

    /// Get source name for logging
    fn source_name(&self) -> &str;
}

// =============================================================================
// Report Sink Port
// =============================================================================

/// Port for materializing classified devices
pub trait ReportSink: Send + Sync {
    /// Write all classified devices
    fn write(&self, devices: &[ClassifiedDevice]) -> Result<()>;

    /// Get sink name for logging
    fn sink_name(&self) -> &str;
}

// =============================================================================
// CPU Lookup Port
// =============================================================================

/// Port for the optional online lookup of CPUs the local rules do not know
#[async_trait]
pub trait CpuLookup: Send + Sync {
    /// Guess a category for an unrecognized CPU string
    async fn lookup_unknown_cpu(&self, cpu: &str) -> Result<CategoryGuess>;

    /// Get lookup name for logging
    fn lookup_name(&self) -> &str;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type DeviceSourceRef = Arc<dyn DeviceSource>;
pub type ReportSinkRef = Arc<dyn ReportSink>;
pub type CpuLookupRef = Arc<dyn CpuLookup>;
