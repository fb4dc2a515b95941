//! Run Report
//!
//! Per-label counts and percentages of a categorization run.

use crate::domain::ports::{CategoryLabel, ClassifiedDevice, CpuClass};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counts for one label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelCount {
    pub count: usize,
    /// Share of all devices, 0-100
    pub percentage: f64,
}

/// Outcome of a categorization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationReport {
    pub source: String,
    pub total: usize,
    /// Every label, in report order
    pub categories: IndexMap<CategoryLabel, LabelCount>,
    /// Devices relabelled by enrichment
    pub enriched: usize,
    /// Sinks that failed to write
    pub failed_sinks: Vec<String>,
    /// CPU class of every device left as `Other`, for manual review
    pub unresolved: Vec<(String, CpuClass)>,
}

impl CategorizationReport {
    pub fn from_devices(source: impl Into<String>, devices: &[ClassifiedDevice]) -> Self {
        let total = devices.len();
        let mut counts: IndexMap<CategoryLabel, usize> =
            CategoryLabel::ALL.iter().map(|l| (*l, 0)).collect();
        for device in devices {
            *counts.entry(device.category).or_insert(0) += 1;
        }

        let categories = counts
            .into_iter()
            .map(|(label, count)| {
                let percentage = if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                };
                (label, LabelCount { count, percentage })
            })
            .collect();

        let unresolved = devices
            .iter()
            .filter(|d| d.category == CategoryLabel::Other)
            .map(|d| (d.record.display_name().to_string(), d.cpu_class))
            .collect();

        Self {
            source: source.into(),
            total,
            categories,
            enriched: devices.iter().filter(|d| d.enriched).count(),
            failed_sinks: Vec::new(),
            unresolved,
        }
    }

    pub fn count(&self, label: CategoryLabel) -> usize {
        self.categories.get(&label).map(|c| c.count).unwrap_or(0)
    }

    /// Log the breakdown at info level
    pub fn log_summary(&self) {
        info!("Categorization summary for {} ({} devices)", self.source, self.total);
        for (label, c) in &self.categories {
            if c.count > 0 {
                info!("  {:<22} {:>6} ({:.1}%)", label.display_name(), c.count, c.percentage);
            }
        }
        if self.enriched > 0 {
            info!("  {} devices relabelled by CPU lookup", self.enriched);
        }
        if !self.unresolved.is_empty() {
            info!("{} devices need review:", self.unresolved.len());
            for (name, class) in &self.unresolved {
                info!("  {} (cpu class: {})", name, class);
            }
        }
    }
}
