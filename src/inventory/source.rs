//! Device Sources
//!
//! Produce the finite list of device records to classify.

use crate::domain::ports::{DeviceRecord, DeviceSource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

// =============================================================================
// CSV Source
// =============================================================================

/// Raw CSV row. Joined inventory exports can carry both the short and the
/// `device_*` column names, so each spelling is its own column here.
#[derive(Debug, Default, Deserialize)]
struct InventoryRow {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    device_hostname: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    device_model: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    cpu: Option<String>,
    #[serde(default)]
    device_cpu: Option<String>,
    #[serde(default)]
    os: Option<String>,
    #[serde(default)]
    operating_system: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    source_table: Option<String>,
}

/// Short column first, `device_*` column when the short one is blank
fn coalesce(short: Option<String>, long: Option<String>) -> Option<String> {
    let present = |v: &String| !v.trim().is_empty();
    short.filter(present).or(long.filter(present))
}

impl From<InventoryRow> for DeviceRecord {
    fn from(row: InventoryRow) -> Self {
        Self {
            id: row.id,
            hostname: coalesce(row.hostname, row.device_hostname),
            model: coalesce(row.model, row.device_model),
            device_type: row.device_type,
            cpu: coalesce(row.cpu, row.device_cpu),
            os: coalesce(row.os, row.operating_system),
            source: coalesce(row.source, row.source_table),
        }
    }
}

/// Reads device records from a CSV export of the inventory tables
pub struct CsvDeviceSource {
    path: PathBuf,
    name: String,
}

impl CsvDeviceSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_records(&self) -> Result<Vec<DeviceRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| Error::SourceUnavailable {
                source_name: self.name.clone(),
                reason: e.to_string(),
            })?;

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (row, result) in reader.deserialize::<InventoryRow>().enumerate() {
            match result {
                Ok(raw) => {
                    let mut record = DeviceRecord::from(raw);
                    if record.source.is_none() {
                        record.source = Some(self.name.clone());
                    }
                    records.push(record);
                }
                Err(e) => {
                    skipped += 1;
                    // +2: header line and 1-based numbering
                    warn!("Skipping malformed row {} in {}: {}", row + 2, self.name, e);
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} malformed rows in {}", skipped, self.name);
            if records.is_empty() {
                return Err(Error::SourceUnavailable {
                    source_name: self.name.clone(),
                    reason: format!("all {} rows are malformed", skipped),
                });
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl DeviceSource for CsvDeviceSource {
    async fn fetch(&self) -> Result<Vec<DeviceRecord>> {
        let records = self.read_records()?;
        info!("Read {} device records from {}", records.len(), self.path.display());
        Ok(records)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// In-Memory Sources
// =============================================================================

/// Fixed list of records, used for tests and the sample data set
pub struct StaticDeviceSource {
    name: String,
    records: Vec<DeviceRecord>,
}

impl StaticDeviceSource {
    pub fn new(name: impl Into<String>, records: Vec<DeviceRecord>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }

    /// Sample inventory covering every major category
    pub fn sample() -> Self {
        let records = vec![
            DeviceRecord::new()
                .with_id("1")
                .with_hostname("srv001")
                .with_model("PowerEdge R740")
                .with_device_type("Server")
                .with_cpu("Intel Xeon Gold 6248R")
                .with_os("Windows Server 2019"),
            DeviceRecord::new()
                .with_id("2")
                .with_hostname("desktop001")
                .with_model("OptiPlex 7080")
                .with_device_type("Desktop")
                .with_cpu("Intel Core i7-10700")
                .with_os("Windows 10 Pro"),
            DeviceRecord::new()
                .with_id("3")
                .with_hostname("vm-web01")
                .with_model("VMware Virtual Platform")
                .with_device_type("Server")
                .with_cpu("Intel(R) Xeon(R) CPU E5-2670 0 @ 2.60GHz (4 vCPUs)")
                .with_os("Ubuntu 20.04 LTS"),
            DeviceRecord::new()
                .with_id("4")
                .with_hostname("laptop001")
                .with_model("ThinkPad X1")
                .with_device_type("Laptop")
                .with_cpu("Intel Core i7-1165G7")
                .with_os("Windows 11"),
            DeviceRecord::new()
                .with_id("5")
                .with_hostname("att-phone1")
                .with_model("iPhone 13")
                .with_cpu("Apple A15 Bionic")
                .with_os("iOS 15"),
            DeviceRecord::new()
                .with_id("6")
                .with_hostname("license-srv1")
                .with_model("License Server")
                .with_cpu("Intel Xeon E3-1270 v6")
                .with_os("Windows Server 2016"),
        ];

        Self::new("sample", records.into_iter().map(|r| r.with_source("sample")).collect())
    }
}

#[async_trait]
impl DeviceSource for StaticDeviceSource {
    async fn fetch(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self.records.clone())
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
