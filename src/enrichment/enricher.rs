//! Enrichment Runner
//!
//! Consults a `CpuLookup` for devices the local rules could only label
//! `Other`. Confident local labels are never touched, and every lookup
//! failure degrades to "no opinion".

use crate::config::EnrichmentConfig;
use crate::domain::ports::{CategoryGuess, CategoryLabel, ClassifiedDevice, CpuLookupRef, Field};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Applies lookup guesses to unresolved devices
pub struct Enricher {
    lookup: CpuLookupRef,
    threshold: f64,
    max_concurrency: usize,
}

impl Enricher {
    pub fn new(lookup: CpuLookupRef, config: &EnrichmentConfig) -> Self {
        Self {
            lookup,
            threshold: config.confidence_threshold,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    /// Whether a guess is confident enough to use
    pub fn accepts(&self, guess: &CategoryGuess) -> bool {
        guess.confidence >= self.threshold && !guess.category.is_fallback()
    }

    /// Relabel devices left as `Other`; returns how many were changed
    pub async fn enrich(&self, devices: &mut [ClassifiedDevice]) -> usize {
        let mut pending: Vec<String> = Vec::new();
        for device in devices.iter() {
            if device.category != CategoryLabel::Other {
                continue;
            }
            let key = cpu_key(device);
            if !key.is_empty() && !pending.contains(&key) {
                pending.push(key);
            }
        }

        if pending.is_empty() {
            return 0;
        }

        info!(
            "Looking up {} unrecognized CPUs via {} (max {} concurrent)",
            pending.len(),
            self.lookup.lookup_name(),
            self.max_concurrency
        );

        let lookup = &self.lookup;
        let results: Vec<_> = stream::iter(pending)
            .map(|cpu| async move {
                let result = lookup.lookup_unknown_cpu(&cpu).await;
                (cpu, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut guesses: HashMap<String, CategoryLabel> = HashMap::new();
        for (cpu, result) in results {
            match result {
                Ok(guess) if self.accepts(&guess) => {
                    debug!(
                        "Lookup for '{}' guessed {} ({:.2})",
                        cpu, guess.category, guess.confidence
                    );
                    guesses.insert(cpu, guess.category);
                }
                Ok(guess) => {
                    debug!(
                        "Ignoring low-confidence guess for '{}': {} ({:.2})",
                        cpu, guess.category, guess.confidence
                    );
                }
                Err(e) => {
                    warn!("CPU lookup failed for '{}', continuing without it: {}", cpu, e);
                }
            }
        }

        let mut changed = 0;
        for device in devices.iter_mut() {
            if device.category != CategoryLabel::Other {
                continue;
            }
            if let Some(label) = guesses.get(&cpu_key(device)) {
                device.category = *label;
                device.enriched = true;
                changed += 1;
            }
        }

        info!("Enrichment relabelled {} devices", changed);
        changed
    }
}

fn cpu_key(device: &ClassifiedDevice) -> String {
    device.record.field(Field::Cpu).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{CpuClass, CpuLookup, DeviceRecord};
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedLookup {
        guess: CategoryGuess,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    impl FixedLookup {
        fn new(category: CategoryLabel, confidence: f64) -> Self {
            Self {
                guess: CategoryGuess::new(category, confidence),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl CpuLookup for FixedLookup {
        async fn lookup_unknown_cpu(&self, cpu: &str) -> Result<CategoryGuess> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_on == Some(cpu) {
                return Err(Error::EnrichmentFailed {
                    cpu: cpu.to_string(),
                    reason: "unreachable".into(),
                });
            }
            Ok(self.guess)
        }

        fn lookup_name(&self) -> &str {
            "fixed"
        }
    }

    fn device(cpu: &str, category: CategoryLabel) -> ClassifiedDevice {
        ClassifiedDevice {
            record: DeviceRecord::new().with_cpu(cpu),
            category,
            cpu_class: CpuClass::Unknown,
            rule: None,
            enriched: false,
        }
    }

    fn config(threshold: f64, max_concurrency: usize) -> EnrichmentConfig {
        EnrichmentConfig {
            enabled: true,
            confidence_threshold: threshold,
            max_concurrency,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_only_other_devices_are_relabelled() {
        let lookup = Arc::new(FixedLookup::new(CategoryLabel::Desktop, 0.9));
        let enricher = Enricher::new(lookup.clone(), &config(0.6, 3));

        let mut devices = vec![
            device("Mystery 9000", CategoryLabel::Other),
            device("Intel Xeon Gold 6248R", CategoryLabel::ServerPhysical),
            device("", CategoryLabel::Unknown),
            device("Mystery 9000", CategoryLabel::Other),
        ];

        let changed = enricher.enrich(&mut devices).await;
        assert_eq!(changed, 2);
        assert_eq!(devices[0].category, CategoryLabel::Desktop);
        assert!(devices[0].enriched);
        assert_eq!(devices[1].category, CategoryLabel::ServerPhysical);
        assert!(!devices[1].enriched);
        assert_eq!(devices[2].category, CategoryLabel::Unknown);
        // Duplicate CPU strings are looked up once
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_is_no_opinion() {
        let lookup = Arc::new(FixedLookup::new(CategoryLabel::ServerPhysical, 0.59));
        let enricher = Enricher::new(lookup, &config(0.6, 3));

        let mut devices = vec![device("Mystery 9000", CategoryLabel::Other)];
        assert_eq!(enricher.enrich(&mut devices).await, 0);
        assert_eq!(devices[0].category, CategoryLabel::Other);
        assert!(!devices[0].enriched);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let lookup = Arc::new(FixedLookup::new(CategoryLabel::Laptop, 0.6));
        let enricher = Enricher::new(lookup, &config(0.6, 3));

        let mut devices = vec![device("Mystery 9000", CategoryLabel::Other)];
        assert_eq!(enricher.enrich(&mut devices).await, 1);
        assert_eq!(devices[0].category, CategoryLabel::Laptop);
    }

    #[tokio::test]
    async fn test_failures_degrade() {
        let mut lookup = FixedLookup::new(CategoryLabel::Desktop, 1.0);
        lookup.fail_on = Some("Broken CPU");
        let enricher = Enricher::new(Arc::new(lookup), &config(0.6, 2));

        let mut devices = vec![
            device("Broken CPU", CategoryLabel::Other),
            device("Mystery 9000", CategoryLabel::Other),
        ];
        assert_eq!(enricher.enrich(&mut devices).await, 1);
        assert_eq!(devices[0].category, CategoryLabel::Other);
        assert_eq!(devices[1].category, CategoryLabel::Desktop);
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        let lookup = Arc::new(FixedLookup::new(CategoryLabel::Desktop, 1.0));
        let enricher = Enricher::new(lookup.clone(), &config(0.6, 2));

        let mut devices: Vec<_> = (0..8)
            .map(|i| device(&format!("Mystery {}", i), CategoryLabel::Other))
            .collect();
        enricher.enrich(&mut devices).await;

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 8);
        assert!(lookup.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_fallback_guesses_rejected() {
        let lookup = Arc::new(FixedLookup::new(CategoryLabel::Desktop, 1.0));
        let enricher = Enricher::new(lookup, &config(0.6, 1));
        assert!(!enricher.accepts(&CategoryGuess::new(CategoryLabel::Unknown, 1.0)));
        assert!(!enricher.accepts(&CategoryGuess::new(CategoryLabel::Other, 1.0)));
        assert!(enricher.accepts(&CategoryGuess::new(CategoryLabel::ServerVM, 0.8)));
    }
}
