//! Pipeline Runner
//!
//! fetch -> classify -> enrich (optional) -> write every sink.

use crate::classification::DeviceClassifier;
use crate::domain::ports::{DeviceSource, ReportSink};
use crate::enrichment::Enricher;
use crate::error::Result;
use crate::inventory::StaticDeviceSource;
use crate::pipeline::summary::CategorizationReport;
use std::time::Instant;
use tracing::{error, info, warn};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Classify the built-in sample records when the source fails
    pub fallback_to_sample: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fallback_to_sample: true,
        }
    }
}

/// One categorization run over a source and a set of sinks
pub struct Pipeline {
    config: PipelineConfig,
    classifier: DeviceClassifier,
    enricher: Option<Enricher>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, classifier: DeviceClassifier) -> Self {
        Self {
            config,
            classifier,
            enricher: None,
        }
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn classifier(&self) -> &DeviceClassifier {
        &self.classifier
    }

    /// Run the pipeline.
    ///
    /// Source failures fall back to the sample set when configured, and
    /// are returned otherwise. Sink failures are logged and recorded in the
    /// report; the remaining sinks still run.
    pub async fn run(
        &self,
        source: &dyn DeviceSource,
        sinks: &[Box<dyn ReportSink>],
    ) -> Result<CategorizationReport> {
        let start = Instant::now();

        let (source_name, records) = match source.fetch().await {
            Ok(records) => (source.source_name().to_string(), records),
            Err(e) if self.config.fallback_to_sample => {
                warn!(
                    "Source {} unavailable, using sample records: {}",
                    source.source_name(),
                    e
                );
                let sample = StaticDeviceSource::sample();
                (sample.source_name().to_string(), sample.fetch().await?)
            }
            Err(e) => {
                error!("Source {} unavailable: {}", source.source_name(), e);
                return Err(e);
            }
        };

        info!("Classifying {} devices from {}", records.len(), source_name);
        let mut devices = self.classifier.classify_all(records);

        if let Some(enricher) = &self.enricher {
            enricher.enrich(&mut devices).await;
        }

        let mut report = CategorizationReport::from_devices(source_name, &devices);

        for sink in sinks {
            if let Err(e) = sink.write(&devices) {
                error!("Sink {} failed, continuing: {}", sink.sink_name(), e);
                report.failed_sinks.push(sink.sink_name().to_string());
            }
        }

        info!(
            "Categorization finished in {:?} ({} devices)",
            start.elapsed(),
            report.total
        );
        Ok(report)
    }
}
