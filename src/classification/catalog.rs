//! CPU Pattern Catalog
//!
//! Identifies the hardware class of a CPU from its model string using
//! curated vendor naming patterns, without needing any other record field.

use crate::domain::ports::CpuClass;
use crate::error::{Error, Result};
use regex::{Regex, RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

// =============================================================================
// CPU Family
// =============================================================================

/// Naming patterns that identify one class of CPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuFamily {
    /// Class assigned when any pattern matches
    pub class: CpuClass,
    /// Case-insensitive regular expressions
    pub patterns: Vec<String>,
    /// Notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CpuFamily {
    pub fn new(class: CpuClass, patterns: &[&str]) -> Self {
        Self {
            class,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Built-in CPU families, in cascade order.
///
/// Order matters: laptop SKUs also satisfy the desktop model-number patterns,
/// so the laptop family has to be tried first.
pub fn builtin_cpu_families() -> Vec<CpuFamily> {
    vec![
        CpuFamily::new(
            CpuClass::Virtual,
            &[
                r"virtual",
                r"vcpu",
                r"vmware",
                r"hypervisor",
                r"\bkvm\b",
                r"qemu",
                r"\bvm\b",
            ],
        )
        .with_notes("Hypervisor-provided virtual CPUs"),
        CpuFamily::new(
            CpuClass::Server,
            &[
                r"xeon",
                r"epyc",
                r"opteron",
                r"threadripper",
                r"itanium",
                r"\be[357]-\d{4}",
                r"\b(?:gold|silver|platinum|bronze) \d{4}",
                r"\b\d{4}\s?v\d\b",
                r"\bpower\d{1,2}\b",
                r"\bw-\d{4}",
                r"graviton",
                r"\bampere\b",
                r"\bsparc\b",
            ],
        )
        .with_notes("Xeon/EPYC class parts and generation-coded server SKUs"),
        CpuFamily::new(
            CpuClass::Mobile,
            &[
                r"snapdragon",
                r"exynos",
                r"bionic",
                r"\bhelio\b",
                r"dimensity",
                r"kirin",
                r"mediatek",
                r"unisoc",
                r"\btensor g\d",
                r"\bapple a\d{1,2}\b",
            ],
        )
        .with_notes("Phone and tablet SoCs"),
        CpuFamily::new(
            CpuClass::Laptop,
            &[
                r"\bi[3579]-\d{4,5}(?:[uqmy]{1,2}|h[kqsx]?|g\d)\b",
                r"\b\d{4}u\b",
                r"\bmobile\b",
                r"\bryzen \d(?: pro)? \d{4}[uhs]{1,2}\b",
                r"\bapple m\d\b",
                r"\batom\b",
                r"\b(?:celeron|pentium(?: silver| gold)?) n\d{3,4}\b",
                r"\bcore ultra\b",
                r"\bcore m\d?\b",
            ],
        )
        .with_notes("Consumer model numbers with a mobile suffix and low-power brands"),
        CpuFamily::new(
            CpuClass::Desktop,
            &[
                r"\bi[3579]-\d{4,5}",
                r"\bcore i[3579]\b",
                r"\bcore 2\b",
                r"\bryzen \d",
                r"\bfx-\d{4}",
                r"athlon",
                r"pentium",
                r"celeron",
                r"phenom",
                r"\ba\d{1,2}-\d{4}",
                r"(?:dual|quad)[\s-]core",
            ],
        )
        .with_notes("Consumer model numbers without a mobile suffix"),
    ]
}

// =============================================================================
// Compiled Catalog
// =============================================================================

/// Compiled CPU families, evaluated as a first-match cascade
#[derive(Debug, Clone)]
pub struct CpuCatalog {
    families: Vec<(CpuClass, RegexSet)>,
}

impl CpuCatalog {
    /// Compile a list of families, reporting the first invalid pattern
    pub fn compile(families: &[CpuFamily]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(families.len());

        for family in families {
            for pattern in &family.patterns {
                Regex::new(pattern).map_err(|e| Error::InvalidPattern {
                    rule: format!("cpu:{}", family.class),
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
            }

            let set = RegexSetBuilder::new(&family.patterns)
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::InvalidPattern {
                    rule: format!("cpu:{}", family.class),
                    pattern: family.patterns.join("|"),
                    reason: e.to_string(),
                })?;

            compiled.push((family.class, set));
        }

        Ok(Self { families: compiled })
    }

    /// Classify a CPU string; empty or unrecognized strings are `Unknown`
    pub fn classify(&self, cpu: &str) -> CpuClass {
        let cpu = cpu.trim();
        if cpu.is_empty() {
            return CpuClass::Unknown;
        }

        let cpu_lower = cpu.to_lowercase();
        self.families
            .iter()
            .find(|(_, set)| set.is_match(&cpu_lower))
            .map(|(class, _)| *class)
            .unwrap_or(CpuClass::Unknown)
    }

    /// Number of compiled families
    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }
}
