//! Dimensional modeling conventions, as guidance text and as checks.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::registry::TableRegistry;
use crate::schema::{Layer, TableType};

pub const PRIMARY_KEY: &str = "id";

pub const DESIGN_PRINCIPLES: &str = "The prefix for stage table is always 'stg_'. \
The prefix for dimension table is always 'dim_'. \
The prefix for fact table is always 'fact_'. \
The primary key is always 'id'. \
The stage table always has the same columns as the source table. \
The dimension table includes the primary key and descriptive columns. \
The KPI is always a column in a fact table. \
All foreign keys in fact tables should reference the primary key of dimension tables. \
Every source table should have a corresponding stage table.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignRule {
    EmptyName,
    EmptyColumns,
    DuplicateColumn,
    TablePrefix,
    PrimaryKey,
    ForeignKey,
    StageMirror,
}

impl DesignRule {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyName => "empty_name",
            Self::EmptyColumns => "empty_columns",
            Self::DuplicateColumn => "duplicate_column",
            Self::TablePrefix => "table_prefix",
            Self::PrimaryKey => "primary_key",
            Self::ForeignKey => "foreign_key",
            Self::StageMirror => "stage_mirror",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DesignViolation {
    pub rule: DesignRule,
    pub message: String,
}

impl DesignViolation {
    fn new(rule: DesignRule, message: impl Into<String>) -> Self {
        Self { rule, message: message.into() }
    }
}

impl fmt::Display for DesignViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule.code(), self.message)
    }
}

/// Checks `table` against the conventions in [`DESIGN_PRINCIPLES`].
/// Foreign keys and stage mirrors are resolved against `registry`.
pub fn check_table(table: &TableType, registry: &TableRegistry) -> Vec<DesignViolation> {
    let mut violations = Vec::new();
    let name = table.name.trim();

    if name.is_empty() {
        violations.push(DesignViolation::new(DesignRule::EmptyName, "table name must not be empty"));
    }

    if table.schema.is_empty() {
        violations.push(DesignViolation::new(
            DesignRule::EmptyColumns,
            format!("table `{name}` must declare at least one column"),
        ));
    }

    let mut seen = BTreeSet::new();
    for column in table.schema.column_names() {
        if !seen.insert(column) {
            violations.push(DesignViolation::new(
                DesignRule::DuplicateColumn,
                format!("column `{column}` is declared more than once in `{name}`"),
            ));
        }
    }

    if let Some(prefix) = table.layer.table_prefix() {
        if !name.is_empty() && strip_prefix_ignore_case(name, prefix).is_none() {
            violations.push(DesignViolation::new(
                DesignRule::TablePrefix,
                format!("{} table `{name}` must start with `{prefix}`", table.layer),
            ));
        }
    }

    match table.layer {
        Layer::Dimension => check_primary_key(table, &mut violations),
        Layer::Fact => check_foreign_keys(table, registry, &mut violations),
        Layer::Stage => check_stage_mirror(table, registry, &mut violations),
        Layer::Source => {}
    }

    violations
}

fn check_primary_key(table: &TableType, violations: &mut Vec<DesignViolation>) {
    if table.schema.field(PRIMARY_KEY).is_none() {
        violations.push(DesignViolation::new(
            DesignRule::PrimaryKey,
            format!("dimension table `{}` must have a `{PRIMARY_KEY}` primary key column", table.name),
        ));
    }
}

fn check_foreign_keys(
    table: &TableType,
    registry: &TableRegistry,
    violations: &mut Vec<DesignViolation>,
) {
    for column in table.schema.column_names() {
        let Some(entity) = column.strip_suffix("_id").filter(|entity| !entity.is_empty()) else {
            continue;
        };
        let dimension = format!("dim_{entity}");
        if registry.find(Layer::Dimension, &dimension).is_none() {
            violations.push(DesignViolation::new(
                DesignRule::ForeignKey,
                format!(
                    "fact column `{column}` must reference `{dimension}.{PRIMARY_KEY}`, \
                     but no `{dimension}` dimension exists"
                ),
            ));
        }
    }
}

/// Layer prefixes match like registry lookups do, so `STG_orders` is a stage name.
fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &name[prefix.len()..])
}

fn check_stage_mirror(
    table: &TableType,
    registry: &TableRegistry,
    violations: &mut Vec<DesignViolation>,
) {
    let Some(source_name) = strip_prefix_ignore_case(table.name.trim(), "stg_") else {
        return;
    };
    let Some(source) = registry.find(Layer::Source, source_name) else {
        return;
    };

    let expected = source.schema.column_names().into_iter().collect::<BTreeSet<_>>();
    let actual = table.schema.column_names().into_iter().collect::<BTreeSet<_>>();
    if expected == actual {
        return;
    }

    let missing = expected.difference(&actual).copied().collect::<Vec<_>>();
    let extra = actual.difference(&expected).copied().collect::<Vec<_>>();
    violations.push(DesignViolation::new(
        DesignRule::StageMirror,
        format!(
            "stage table `{}` must have the same columns as source `{}` (missing: [{}], unexpected: [{}])",
            table.name,
            source.name,
            missing.join(", "),
            extra.join(", ")
        ),
    ));
}
