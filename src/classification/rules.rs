//! Rule Table
//!
//! The ordered, data-driven table of rule groups used by the classifier.
//! The table is the single source of truth for every consumer: it can be
//! exported to YAML or JSON and loaded back, so other runtimes read the same
//! rules instead of carrying a hand-maintained copy.

use crate::classification::catalog::{builtin_cpu_families, CpuCatalog, CpuFamily};
use crate::domain::ports::{CategoryLabel, CpuClass, Field};
use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

// =============================================================================
// Rule Table Definition
// =============================================================================

/// A single test over a set of record fields.
///
/// Matches when any `contains`/`prefix`/`regex` test hits any listed field,
/// or when the record's CPU class is listed in `cpu_class`, and none of the
/// `excludes` tokens appear in the listed fields. All tests are
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefix: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regex: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excludes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cpu_class: Vec<CpuClass>,
}

impl Condition {
    pub fn on(fields: &[Field]) -> Self {
        Self {
            fields: fields.to_vec(),
            ..Default::default()
        }
    }

    /// Condition on the CPU class computed from the CPU catalog
    pub fn cpu_class(classes: &[CpuClass]) -> Self {
        Self {
            cpu_class: classes.to_vec(),
            ..Default::default()
        }
    }

    pub fn contains(mut self, tokens: &[&str]) -> Self {
        self.contains.extend(tokens.iter().map(|t| t.to_string()));
        self
    }

    pub fn prefix(mut self, tokens: &[&str]) -> Self {
        self.prefix.extend(tokens.iter().map(|t| t.to_string()));
        self
    }

    pub fn regex(mut self, patterns: &[&str]) -> Self {
        self.regex.extend(patterns.iter().map(|p| p.to_string()));
        self
    }

    pub fn excludes(mut self, tokens: &[&str]) -> Self {
        self.excludes.extend(tokens.iter().map(|t| t.to_string()));
        self
    }
}

/// Sub-rule that replaces the group's label when it matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refinement {
    pub label: CategoryLabel,
    pub when: Vec<Condition>,
}

/// Named entry of the rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    /// Label produced when the group matches and no refinement does
    pub label: CategoryLabel,
    /// Disjunction of conditions
    pub when: Vec<Condition>,
    /// Evaluated in order once the group matched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refine: Vec<Refinement>,
}

impl RuleGroup {
    pub fn new(name: impl Into<String>, label: CategoryLabel, when: Vec<Condition>) -> Self {
        Self {
            name: name.into(),
            label,
            when,
            refine: Vec::new(),
        }
    }

    pub fn refine(mut self, label: CategoryLabel, when: Vec<Condition>) -> Self {
        self.refine.push(Refinement { label, when });
        self
    }
}

/// Complete classification rules: the CPU catalog plus the ordered groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub cpu_families: Vec<CpuFamily>,
    pub groups: Vec<RuleGroup>,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleTable {
    /// Built-in table.
    ///
    /// Precedence: VM, phone, license, physical server, laptop, desktop,
    /// server OS. License is checked before server indicators, and the
    /// model-based indicators run before the OS fallback.
    pub fn builtin() -> Self {
        use CategoryLabel::*;

        let all = &Field::ALL;
        let host_type = &[Field::Hostname, Field::DeviceType];
        let host_model = &[Field::Hostname, Field::Model];

        let groups = vec![
            RuleGroup::new(
                "virtual-machine",
                ServerVM,
                vec![
                    Condition::on(all)
                        .contains(&["virtual", "vmware", "hypervisor", "vcpu", "esxi", "qemu"])
                        // `_`, `-` and digits separate hostname words
                        .regex(&[r"(?:^|[^a-z])k?vm", r"vm\d"]),
                    // Asset tags of hosted desktops
                    Condition::on(&[Field::Hostname]).prefix(&["aamdt"]),
                    Condition::cpu_class(&[CpuClass::Virtual]),
                ],
            ),
            RuleGroup::new(
                "cell-phone",
                CellPhoneOther,
                vec![
                    Condition::on(&[Field::DeviceType]).contains(&["phone", "mobile"]),
                    Condition::on(&[Field::Hostname]).contains(&["phone"]),
                    Condition::on(&[Field::Model]).contains(&["iphone", "galaxy", "pixel", "android"]),
                    // ARM laptops carry phone SoCs
                    Condition {
                        fields: vec![Field::DeviceType, Field::Model],
                        ..Condition::cpu_class(&[CpuClass::Mobile])
                    }
                    .excludes(&["laptop", "notebook"]),
                ],
            )
            .refine(CellPhoneATT, vec![Condition::on(host_model).contains(&["att", "at&t"])])
            .refine(
                CellPhoneVerizon,
                vec![Condition::on(host_model).contains(&["verizon", "vzw"])],
            ),
            RuleGroup::new(
                "license",
                License,
                vec![
                    Condition::on(host_type).contains(&["licen", "lic", "dlalion"]),
                    Condition::on(&[Field::Model]).contains(&["license"]),
                ],
            ),
            RuleGroup::new(
                "physical-server",
                ServerPhysical,
                vec![
                    Condition::cpu_class(&[CpuClass::Server]),
                    Condition::on(&[Field::DeviceType]).contains(&["server"]),
                    Condition::on(&[Field::Hostname]).contains(&["srv"]),
                    Condition::on(&[Field::Model]).contains(&[
                        "poweredge",
                        "proliant",
                        "system x",
                        "thinkserver",
                        "primergy",
                        "superserver",
                    ])
                    .regex(&[r"\bucs\b"]),
                ],
            ),
            RuleGroup::new(
                "laptop",
                Laptop,
                vec![
                    Condition::cpu_class(&[CpuClass::Laptop]),
                    Condition::on(host_type).contains(&["laptop", "notebook"]),
                    Condition::on(&[Field::Model]).contains(&[
                        "thinkpad",
                        "latitude",
                        "macbook",
                        "probook",
                        "elitebook",
                        "zbook",
                        "xps",
                    ]),
                ],
            ),
            RuleGroup::new(
                "desktop",
                Desktop,
                vec![
                    Condition::cpu_class(&[CpuClass::Desktop]),
                    Condition::on(host_type).contains(&["desktop", "workstation"]),
                    Condition::on(&[Field::Model]).contains(&[
                        "optiplex",
                        "thinkcentre",
                        "prodesk",
                        "elitedesk",
                        "imac",
                    ]),
                ],
            ),
            RuleGroup::new(
                "server-os",
                ServerPhysical,
                vec![Condition::on(&[Field::Os])
                    .contains(&["server"])
                    .excludes(&["workstation"])],
            ),
        ];

        Self {
            cpu_families: builtin_cpu_families(),
            groups,
        }
    }

    /// Load a table from a YAML or JSON file, chosen by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let table = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content)?,
            _ => Self::from_yaml(&content)?,
        };
        debug!("Loaded rule table from {:?} ({} groups)", path, table.groups.len());
        Ok(table)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check structural validity without compiling patterns
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            return Err(Error::InvalidRuleTable("rule table has no groups".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(Error::InvalidRuleTable("rule group without a name".into()));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(Error::InvalidRuleTable(format!(
                    "duplicate rule group: {}",
                    group.name
                )));
            }
            if group.when.is_empty() {
                return Err(Error::InvalidRuleTable(format!(
                    "rule group '{}' has no conditions",
                    group.name
                )));
            }
            for condition in group.when.iter().chain(group.refine.iter().flat_map(|r| &r.when)) {
                let has_text_test = !condition.contains.is_empty()
                    || !condition.prefix.is_empty()
                    || !condition.regex.is_empty();
                if has_text_test && condition.fields.is_empty() {
                    return Err(Error::InvalidRuleTable(format!(
                        "rule group '{}' has a text test without fields",
                        group.name
                    )));
                }
                if !has_text_test && condition.cpu_class.is_empty() {
                    return Err(Error::InvalidRuleTable(format!(
                        "rule group '{}' has an empty condition",
                        group.name
                    )));
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// Compiled Table
// =============================================================================

/// Lower-cased field values of one record
pub(crate) struct NormalizedRecord {
    fields: [String; 5],
    pub(crate) cpu_class: CpuClass,
}

impl NormalizedRecord {
    pub(crate) fn new(values: [&str; 5], cpu_class: CpuClass) -> Self {
        Self {
            fields: values.map(|v| v.to_lowercase()),
            cpu_class,
        }
    }

    fn get(&self, field: Field) -> &str {
        &self.fields[field.index()]
    }
}

#[derive(Debug, Clone)]
struct CompiledCondition {
    fields: Vec<Field>,
    contains: Vec<String>,
    prefix: Vec<String>,
    regex: Vec<Regex>,
    excludes: Vec<String>,
    cpu_class: Vec<CpuClass>,
}

impl CompiledCondition {
    fn compile(rule: &str, condition: &Condition) -> Result<Self> {
        let regex = condition
            .regex
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::InvalidPattern {
                        rule: rule.to_string(),
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let lower = |tokens: &[String]| -> Vec<String> {
            tokens.iter().map(|t| t.to_lowercase()).collect()
        };

        Ok(Self {
            fields: condition.fields.clone(),
            contains: lower(&condition.contains),
            prefix: lower(&condition.prefix),
            regex,
            excludes: lower(&condition.excludes),
            cpu_class: condition.cpu_class.clone(),
        })
    }

    fn matches(&self, record: &NormalizedRecord) -> bool {
        let text_hit = self.fields.iter().any(|&field| {
            let value = record.get(field);
            !value.is_empty()
                && (self.contains.iter().any(|t| value.contains(t.as_str()))
                    || self.prefix.iter().any(|t| value.starts_with(t.as_str()))
                    || self.regex.iter().any(|re| re.is_match(value)))
        });
        let class_hit = self.cpu_class.contains(&record.cpu_class);

        if !(text_hit || class_hit) {
            return false;
        }

        !self.fields.iter().any(|&field| {
            let value = record.get(field);
            self.excludes.iter().any(|t| value.contains(t.as_str()))
        })
    }
}

#[derive(Debug, Clone)]
struct CompiledGroup {
    name: String,
    label: CategoryLabel,
    when: Vec<CompiledCondition>,
    refine: Vec<(CategoryLabel, Vec<CompiledCondition>)>,
}

impl CompiledGroup {
    fn evaluate(&self, record: &NormalizedRecord) -> Option<CategoryLabel> {
        if !self.when.iter().any(|c| c.matches(record)) {
            return None;
        }

        let refined = self
            .refine
            .iter()
            .find(|(_, when)| when.iter().any(|c| c.matches(record)))
            .map(|(label, _)| *label);

        Some(refined.unwrap_or(self.label))
    }
}

/// Rule table with all patterns compiled, ready for evaluation
#[derive(Debug, Clone)]
pub struct CompiledRuleTable {
    source: RuleTable,
    cpu: CpuCatalog,
    groups: Vec<CompiledGroup>,
}

impl CompiledRuleTable {
    /// Validate and compile a rule table
    pub fn compile(table: RuleTable) -> Result<Self> {
        table.validate()?;

        let cpu = CpuCatalog::compile(&table.cpu_families)?;

        let mut groups = Vec::with_capacity(table.groups.len());
        for group in &table.groups {
            let compile_all = |conditions: &[Condition]| {
                conditions
                    .iter()
                    .map(|c| CompiledCondition::compile(&group.name, c))
                    .collect::<Result<Vec<_>>>()
            };

            let when = compile_all(&group.when)?;
            let refine = group
                .refine
                .iter()
                .map(|r| Ok((r.label, compile_all(&r.when)?)))
                .collect::<Result<Vec<_>>>()?;

            groups.push(CompiledGroup {
                name: group.name.clone(),
                label: group.label,
                when,
                refine,
            });
        }

        Ok(Self {
            source: table,
            cpu,
            groups,
        })
    }

    /// The table this was compiled from
    pub fn table(&self) -> &RuleTable {
        &self.source
    }

    pub fn cpu_catalog(&self) -> &CpuCatalog {
        &self.cpu
    }

    /// First matching group's name and label
    pub(crate) fn evaluate(&self, record: &NormalizedRecord) -> Option<(&str, CategoryLabel)> {
        self.groups
            .iter()
            .find_map(|g| g.evaluate(record).map(|label| (g.name.as_str(), label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_builtin_compiles() {
        let table = RuleTable::builtin();
        let compiled = CompiledRuleTable::compile(table.clone()).unwrap();
        assert_eq!(compiled.table().groups.len(), 7);
        assert_eq!(compiled.cpu_catalog().len(), 5);
        assert_eq!(table.groups[0].name, "virtual-machine");
    }

    #[test]
    fn test_yaml_export_roundtrip() {
        let table = RuleTable::builtin();
        let yaml = table.to_yaml().unwrap();
        assert!(yaml.contains("virtual-machine"));
        assert!(yaml.contains("Server-VM"));
        assert_eq!(RuleTable::from_yaml(&yaml).unwrap(), table);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, RuleTable::builtin().to_json().unwrap()).unwrap();

        let loaded = RuleTable::load(&path).unwrap();
        assert_eq!(loaded, RuleTable::builtin());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let mut table = RuleTable::builtin();
        table.groups[0].when.push(Condition::on(&[Field::Hostname]).regex(&["[broken"]));

        let err = CompiledRuleTable::compile(table).unwrap_err();
        assert_matches!(err, Error::InvalidPattern { ref rule, .. } if rule == "virtual-machine");
    }

    #[test]
    fn test_validate_rejects_bad_tables() {
        let empty = RuleTable {
            cpu_families: vec![],
            groups: vec![],
        };
        assert_matches!(empty.validate(), Err(Error::InvalidRuleTable(_)));

        let mut dup = RuleTable::builtin();
        dup.groups.push(dup.groups[0].clone());
        assert_matches!(dup.validate(), Err(Error::InvalidRuleTable(_)));

        let mut fieldless = RuleTable::builtin();
        fieldless.groups[2].when.push(Condition::default().contains(&["x"]));
        assert_matches!(fieldless.validate(), Err(Error::InvalidRuleTable(_)));
    }

    #[test]
    fn test_condition_excludes() {
        let condition = Condition::on(&[Field::Os])
            .contains(&["server"])
            .excludes(&["workstation"]);
        let compiled = CompiledCondition::compile("server-os", &condition).unwrap();

        let server = NormalizedRecord::new(["", "", "", "", "Windows Server 2019"], CpuClass::Unknown);
        let workstation = NormalizedRecord::new(
            ["", "", "", "", "Windows Server Workstation Edition"],
            CpuClass::Unknown,
        );
        assert!(compiled.matches(&server));
        assert!(!compiled.matches(&workstation));
    }

    #[test]
    fn test_cpu_class_condition_with_excludes() {
        let condition = Condition {
            fields: vec![Field::DeviceType, Field::Model],
            ..Condition::cpu_class(&[CpuClass::Mobile])
        }
        .excludes(&["laptop"]);
        let compiled = CompiledCondition::compile("cell-phone", &condition).unwrap();

        let phone = NormalizedRecord::new(["", "Pixel 8", "", "", ""], CpuClass::Mobile);
        let laptop = NormalizedRecord::new(["", "Surface Laptop 7", "", "", ""], CpuClass::Mobile);
        assert!(compiled.matches(&phone));
        assert!(!compiled.matches(&laptop));
        assert!(RuleTable::builtin().validate().is_ok());
    }

    #[test]
    fn test_refinement_order() {
        let group = RuleGroup::new(
            "phone",
            CategoryLabel::CellPhoneOther,
            vec![Condition::on(&[Field::Hostname]).contains(&["phone"])],
        )
        .refine(CategoryLabel::CellPhoneATT, vec![Condition::on(&[Field::Hostname]).contains(&["att"])]);
        let table = RuleTable {
            cpu_families: vec![],
            groups: vec![group],
        };
        let compiled = CompiledRuleTable::compile(table).unwrap();

        let att = NormalizedRecord::new(["ATT-Phone-7", "", "", "", ""], CpuClass::Unknown);
        let plain = NormalizedRecord::new(["phone-7", "", "", "", ""], CpuClass::Unknown);
        assert_eq!(compiled.evaluate(&att), Some(("phone", CategoryLabel::CellPhoneATT)));
        assert_eq!(compiled.evaluate(&plain), Some(("phone", CategoryLabel::CellPhoneOther)));
    }
}
