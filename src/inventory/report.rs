//! Report Sinks
//!
//! Materialize classified devices as a per-device CSV and a JSON summary.

use crate::domain::ports::{CategoryLabel, ClassifiedDevice, CpuClass, ReportSink};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

// =============================================================================
// CSV Report
// =============================================================================

/// One row of the per-device report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedRow {
    pub id: String,
    pub hostname: String,
    pub model: String,
    pub device_type: String,
    pub cpu: String,
    pub os: String,
    pub source: String,
    pub category: CategoryLabel,
    pub cpu_type: CpuClass,
    pub rule: String,
    pub enriched: bool,
}

impl From<&ClassifiedDevice> for CategorizedRow {
    fn from(device: &ClassifiedDevice) -> Self {
        let r = &device.record;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            id: text(&r.id),
            hostname: text(&r.hostname),
            model: text(&r.model),
            device_type: text(&r.device_type),
            cpu: text(&r.cpu),
            os: text(&r.os),
            source: text(&r.source),
            category: device.category,
            cpu_type: device.cpu_class,
            rule: device.rule.clone().unwrap_or_default(),
            enriched: device.enriched,
        }
    }
}

/// Writes every device with its category to a CSV file
pub struct CsvReportSink {
    path: PathBuf,
}

impl CsvReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write_rows(&self, devices: &[ClassifiedDevice]) -> Result<()> {
        ensure_parent(&self.path)?;
        let mut writer = csv::Writer::from_path(&self.path)?;
        for device in devices {
            writer.serialize(CategorizedRow::from(device))?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportSink for CsvReportSink {
    fn write(&self, devices: &[ClassifiedDevice]) -> Result<()> {
        self.write_rows(devices).map_err(|e| Error::SinkFailed {
            sink: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!("Wrote {} categorized devices to {}", devices.len(), self.path.display());
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "csv"
    }
}

// =============================================================================
// JSON Summary
// =============================================================================

/// Aggregated view of a categorization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    /// Count per label, every label present, in report order
    pub summary: IndexMap<CategoryLabel, usize>,
    /// Device names per label
    pub details: IndexMap<CategoryLabel, Vec<String>>,
    /// Lower-cased CPU string to the label it was given
    pub cpu_mapping: BTreeMap<String, CategoryLabel>,
}

impl CategorySummary {
    pub fn from_devices(devices: &[ClassifiedDevice]) -> Self {
        let mut summary: IndexMap<CategoryLabel, usize> =
            CategoryLabel::ALL.iter().map(|l| (*l, 0)).collect();
        let mut details: IndexMap<CategoryLabel, Vec<String>> =
            CategoryLabel::ALL.iter().map(|l| (*l, Vec::new())).collect();
        let mut cpu_mapping = BTreeMap::new();

        for device in devices {
            *summary.entry(device.category).or_insert(0) += 1;
            details
                .entry(device.category)
                .or_default()
                .push(device.record.display_name().to_string());

            if !device.record.cpu_is_empty() {
                let cpu = device.record.field(crate::domain::ports::Field::Cpu);
                cpu_mapping
                    .entry(cpu.trim().to_lowercase())
                    .or_insert(device.category);
            }
        }

        Self {
            generated_at: Utc::now(),
            total: devices.len(),
            summary,
            details,
            cpu_mapping,
        }
    }
}

/// Writes the `CategorySummary` of a run as pretty-printed JSON
pub struct JsonSummarySink {
    path: PathBuf,
}

impl JsonSummarySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write_summary(&self, summary: &CategorySummary) -> Result<()> {
        ensure_parent(&self.path)?;
        let writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(writer, summary)?;
        Ok(())
    }
}

impl ReportSink for JsonSummarySink {
    fn write(&self, devices: &[ClassifiedDevice]) -> Result<()> {
        let summary = CategorySummary::from_devices(devices);
        self.write_summary(&summary).map_err(|e| Error::SinkFailed {
            sink: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!("Wrote categorization summary to {}", self.path.display());
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "json-summary"
    }
}
