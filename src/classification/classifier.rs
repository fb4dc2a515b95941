//! Device Classifier
//!
//! Assigns exactly one category label to every device record by evaluating
//! the rule table top to bottom. Classification is pure: no I/O, no shared
//! mutable state, and it never fails.

use crate::classification::rules::{CompiledRuleTable, NormalizedRecord, RuleTable};
use crate::domain::ports::{CategoryLabel, ClassifiedDevice, CpuClass, DeviceRecord, Field};
use crate::error::Result;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

static BUILTIN_TABLE: Lazy<Arc<CompiledRuleTable>> = Lazy::new(|| {
    Arc::new(
        CompiledRuleTable::compile(RuleTable::builtin())
            .expect("built-in rule table must compile"),
    )
});

// =============================================================================
// Classification Result
// =============================================================================

/// Label together with how it was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub label: CategoryLabel,
    /// Class of the CPU string alone
    pub cpu_class: CpuClass,
    /// Matching rule group, `None` when the fallback label was used
    pub rule: Option<String>,
}

// =============================================================================
// Device Classifier
// =============================================================================

/// Classifies device records into categories
#[derive(Debug, Clone)]
pub struct DeviceClassifier {
    table: Arc<CompiledRuleTable>,
}

impl DeviceClassifier {
    /// Create a classifier with the built-in rule table
    pub fn new() -> Self {
        Self {
            table: BUILTIN_TABLE.clone(),
        }
    }

    /// Create a classifier from a custom rule table
    pub fn with_table(table: RuleTable) -> Result<Self> {
        Ok(Self {
            table: Arc::new(CompiledRuleTable::compile(table)?),
        })
    }

    /// Rule table in effect
    pub fn rule_table(&self) -> &RuleTable {
        self.table.table()
    }

    /// Classify a record
    pub fn classify(&self, record: &DeviceRecord) -> CategoryLabel {
        self.explain(record).label
    }

    /// Classify a record and report which rule group decided it
    pub fn explain(&self, record: &DeviceRecord) -> Classification {
        let cpu_class = self.classify_cpu(record.field(Field::Cpu));
        let normalized = NormalizedRecord::new(Field::ALL.map(|f| record.field(f)), cpu_class);

        let classification = match self.table.evaluate(&normalized) {
            Some((rule, label)) => Classification {
                label,
                cpu_class,
                rule: Some(rule.to_string()),
            },
            None => Classification {
                label: Self::fallback_label(record),
                cpu_class,
                rule: None,
            },
        };

        trace!(
            "Classified {} as {} (rule: {:?}, cpu: {})",
            record.display_name(),
            classification.label,
            classification.rule,
            cpu_class
        );

        classification
    }

    /// Class of a CPU string alone
    pub fn classify_cpu(&self, cpu: &str) -> CpuClass {
        self.table.cpu_catalog().classify(cpu)
    }

    /// Classify a batch of records, preserving input order
    pub fn classify_all(&self, records: Vec<DeviceRecord>) -> Vec<ClassifiedDevice> {
        let devices: Vec<ClassifiedDevice> = records
            .into_iter()
            .map(|record| {
                let c = self.explain(&record);
                ClassifiedDevice {
                    record,
                    category: c.label,
                    cpu_class: c.cpu_class,
                    rule: c.rule,
                    enriched: false,
                }
            })
            .collect();

        debug!("Classified {} devices", devices.len());
        devices
    }

    /// Empty CPU means not enough input; a populated but unmatched CPU
    /// means a negative match.
    fn fallback_label(record: &DeviceRecord) -> CategoryLabel {
        if record.cpu_is_empty() {
            CategoryLabel::Unknown
        } else {
            CategoryLabel::Other
        }
    }
}

impl Default for DeviceClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::rules::{Condition, RuleGroup};

    fn record(hostname: &str, model: &str, cpu: &str, os: &str) -> DeviceRecord {
        let mut r = DeviceRecord::new().with_hostname(hostname).with_model(model).with_cpu(cpu);
        if !os.is_empty() {
            r = r.with_os(os);
        }
        r
    }

    #[test]
    fn test_physical_server() {
        let classifier = DeviceClassifier::new();
        let r = record("srv001", "PowerEdge R740", "Intel Xeon Gold 6248R", "Windows Server 2019");
        assert_eq!(classifier.classify(&r), CategoryLabel::ServerPhysical);
    }

    #[test]
    fn test_virtual_machine() {
        let classifier = DeviceClassifier::new();
        let r = record(
            "vm-web01",
            "VMware Virtual Platform",
            "Intel Xeon E5-2670 (4 vCPUs)",
            "Ubuntu 20.04",
        );
        assert_eq!(classifier.classify(&r), CategoryLabel::ServerVM);
    }

    #[test]
    fn test_desktop() {
        let classifier = DeviceClassifier::new();
        let r = record("desktop001", "OptiPlex 7080", "Intel Core i7-10700", "Windows 10 Pro");
        assert_eq!(classifier.classify(&r), CategoryLabel::Desktop);
    }

    #[test]
    fn test_laptop() {
        let classifier = DeviceClassifier::new();
        let r = record("laptop001", "ThinkPad X1", "Intel Core i7-1165G7", "Windows 11");
        assert_eq!(classifier.classify(&r), CategoryLabel::Laptop);
    }

    #[test]
    fn test_att_phone() {
        let classifier = DeviceClassifier::new();
        let r = record("att-phone1", "iPhone 13", "Apple A15 Bionic", "iOS 15");
        assert_eq!(classifier.classify(&r), CategoryLabel::CellPhoneATT);
    }

    #[test]
    fn test_carrier_subclassification() {
        let classifier = DeviceClassifier::new();

        let verizon = DeviceRecord::new().with_hostname("verizon-phone-12").with_device_type("Phone");
        assert_eq!(classifier.classify(&verizon), CategoryLabel::CellPhoneVerizon);

        let vzw = DeviceRecord::new().with_hostname("tab-07").with_model("Galaxy S21 VZW");
        assert_eq!(classifier.classify(&vzw), CategoryLabel::CellPhoneVerizon);

        let other = DeviceRecord::new().with_hostname("phone-lobby").with_device_type("Mobile");
        assert_eq!(classifier.classify(&other), CategoryLabel::CellPhoneOther);
    }

    #[test]
    fn test_license_before_server() {
        let classifier = DeviceClassifier::new();
        let r = record("license-srv1", "License Server", "Intel Xeon E3-1270 v6", "");
        let c = classifier.explain(&r);
        assert_eq!(c.label, CategoryLabel::License);
        assert_eq!(c.rule.as_deref(), Some("license"));
        assert_eq!(c.cpu_class, CpuClass::Server);
    }

    #[test]
    fn test_vm_precedence_over_server() {
        let classifier = DeviceClassifier::new();
        let r = DeviceRecord::new()
            .with_hostname("srv-db02")
            .with_model("PowerEdge R640")
            .with_device_type("Server")
            .with_cpu("Intel Xeon Silver 4214")
            .with_os("VMware ESXi 7.0");
        assert_eq!(classifier.classify(&r), CategoryLabel::ServerVM);

        let prefixed = DeviceRecord::new().with_hostname("AAMDT-0042").with_cpu("Intel Xeon Gold 6130");
        assert_eq!(classifier.classify(&prefixed), CategoryLabel::ServerVM);
    }

    #[test]
    fn test_vm_keyword_after_separators() {
        let classifier = DeviceClassifier::new();

        for hostname in ["db_vm01", "prodvm01", "web-vm01", "build.vm.local", "qemu_kvm-3"] {
            let r = DeviceRecord::new().with_hostname(hostname).with_cpu("Intel Xeon Gold 6130");
            assert_eq!(classifier.classify(&r), CategoryLabel::ServerVM, "{}", hostname);
        }

        // Letters before `vm` are part of another word
        let svm = DeviceRecord::new().with_hostname("svm-build").with_cpu("Intel Xeon Gold 6130");
        assert_eq!(classifier.classify(&svm), CategoryLabel::ServerPhysical);
    }

    #[test]
    fn test_arm_laptop_is_not_a_phone() {
        let classifier = DeviceClassifier::new();
        let laptop = DeviceRecord::new()
            .with_hostname("field-07")
            .with_model("Surface Laptop 7")
            .with_device_type("Laptop")
            .with_cpu("Snapdragon X Elite X1E-80-100");
        assert_eq!(classifier.classify(&laptop), CategoryLabel::Laptop);

        let phone = DeviceRecord::new().with_hostname("field-08").with_cpu("Snapdragon 8 Gen 3");
        assert_eq!(classifier.classify(&phone), CategoryLabel::CellPhoneOther);
    }

    #[test]
    fn test_os_fallback() {
        let classifier = DeviceClassifier::new();
        let r = DeviceRecord::new()
            .with_hostname("app-17")
            .with_cpu("Transmeta Crusoe TM5800")
            .with_os("Windows Server 2012 R2");
        let c = classifier.explain(&r);
        assert_eq!(c.label, CategoryLabel::ServerPhysical);
        assert_eq!(c.rule.as_deref(), Some("server-os"));

        let ws = DeviceRecord::new()
            .with_hostname("app-18")
            .with_cpu("Transmeta Crusoe TM5800")
            .with_os("Server Workstation Edition");
        assert_eq!(classifier.classify(&ws), CategoryLabel::Other);
    }

    #[test]
    fn test_model_indicators() {
        let classifier = DeviceClassifier::new();
        let server = DeviceRecord::new().with_model("HPE ProLiant DL380 Gen10");
        assert_eq!(classifier.classify(&server), CategoryLabel::ServerPhysical);

        let blade = DeviceRecord::new().with_model("Cisco UCS C220 M5");
        assert_eq!(classifier.classify(&blade), CategoryLabel::ServerPhysical);

        let laptop = DeviceRecord::new().with_model("Dell Latitude 5420");
        assert_eq!(classifier.classify(&laptop), CategoryLabel::Laptop);

        let desktop = DeviceRecord::new().with_model("HP EliteDesk 800 G6");
        assert_eq!(classifier.classify(&desktop), CategoryLabel::Desktop);
    }

    #[test]
    fn test_empty_cpu_unknown_vs_other() {
        let classifier = DeviceClassifier::new();

        let empty = DeviceRecord::new();
        let c = classifier.explain(&empty);
        assert_eq!(c.label, CategoryLabel::Unknown);
        assert_eq!(c.rule, None);

        let blank_cpu = DeviceRecord::new().with_hostname("kiosk-3").with_cpu("");
        assert_eq!(classifier.classify(&blank_cpu), CategoryLabel::Unknown);

        let unrecognized = DeviceRecord::new().with_hostname("kiosk-3").with_cpu("Transmeta Crusoe TM5800");
        assert_eq!(classifier.classify(&unrecognized), CategoryLabel::Other);
    }

    #[test]
    fn test_totality_and_determinism() {
        let classifier = DeviceClassifier::new();
        let samples = [
            "", "x", "vm", "srv", "lic", "phone", "Xeon", "i5-8250U", "Windows Server", "☃ ünïcödé",
        ];

        for hostname in samples {
            for cpu in samples {
                for os in samples {
                    let r = DeviceRecord::new().with_hostname(hostname).with_cpu(cpu).with_os(os);
                    let first = classifier.classify(&r);
                    assert!(CategoryLabel::ALL.contains(&first));
                    assert_eq!(first, classifier.classify(&r));
                }
            }
        }
    }

    #[test]
    fn test_classify_all_preserves_order() {
        let classifier = DeviceClassifier::new();
        let records = vec![
            record("srv001", "", "Intel Xeon Gold 6248R", ""),
            DeviceRecord::new(),
            record("laptop001", "", "Intel Core i7-1165G7", ""),
        ];

        let devices = classifier.classify_all(records);
        let labels: Vec<_> = devices.iter().map(|d| d.category).collect();
        assert_eq!(
            labels,
            vec![CategoryLabel::ServerPhysical, CategoryLabel::Unknown, CategoryLabel::Laptop]
        );
        assert_eq!(devices[0].rule.as_deref(), Some("physical-server"));
        assert!(devices.iter().all(|d| !d.enriched));
    }

    #[test]
    fn test_custom_table() {
        let table = RuleTable {
            cpu_families: vec![],
            groups: vec![RuleGroup::new(
                "kiosk",
                CategoryLabel::Desktop,
                vec![Condition::on(&[Field::Hostname]).prefix(&["kiosk"])],
            )],
        };
        let classifier = DeviceClassifier::with_table(table).unwrap();

        assert_eq!(
            classifier.classify(&DeviceRecord::new().with_hostname("KIOSK-9")),
            CategoryLabel::Desktop
        );
        assert_eq!(classifier.classify_cpu("Intel Xeon Gold 6248R"), CpuClass::Unknown);
        assert_eq!(classifier.rule_table().groups.len(), 1);
    }

    #[test]
    fn test_classifier_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DeviceClassifier>();
    }
}
