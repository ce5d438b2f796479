//! Table and column schema model.
//!
//! A [`TableType`] is a named table living on a [`Layer`], described by a
//! [`StructType`] made of ordered [`StructField`] columns. A column whose type
//! is [`DataType::Struct`] nests another schema, so address-like sub-records
//! can be described inside a source table.
//!
//! Serialized forms are plain JSON mappings:
//!
//! - column: `{"name", "data_type", "nullable", "description", "sample_values"}`
//!   plus `"fields"` for nested structures
//! - schema: `{"fields": [...]}`
//! - table: `{"name", "layer", "description", "columns": [...]}`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Source,
    Stage,
    Dimension,
    Fact,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Stage => "stage",
            Self::Dimension => "dimension",
            Self::Fact => "fact",
        }
    }

    /// Required table-name prefix; source tables keep their upstream names.
    pub fn table_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Source => None,
            Self::Stage => Some("stg_"),
            Self::Dimension => Some("dim_"),
            Self::Fact => Some("fact_"),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Source => "Source",
            Self::Stage => "Stage",
            Self::Dimension => "Dimension",
            Self::Fact => "Fact",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "stage" => Ok(Self::Stage),
            "dimension" => Ok(Self::Dimension),
            "fact" => Ok(Self::Fact),
            _ => Err(DomainError::UnknownLayer(value.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DataType {
    String,
    Integer,
    DateTime,
    Double,
    Decimal,
    Boolean,
    Struct(StructType),
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "StringType",
            Self::Integer => "IntegerType",
            Self::DateTime => "DateTimeType",
            Self::Double => "DoubleType",
            Self::Decimal => "DecimalType",
            Self::Boolean => "BooleanType",
            Self::Struct(_) => "StructType",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses canonical names (`IntegerType`) and the short forms models tend to
/// emit (`integer`, `int`, `timestamp`, ...). `StructType` parses to an empty
/// nested schema.
impl FromStr for DataType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let short = normalized.strip_suffix("type").unwrap_or(&normalized);
        match short {
            "string" | "str" | "text" | "varchar" => Ok(Self::String),
            "integer" | "int" | "long" | "bigint" => Ok(Self::Integer),
            "datetime" | "timestamp" | "date" => Ok(Self::DateTime),
            "double" | "float" => Ok(Self::Double),
            "decimal" | "numeric" => Ok(Self::Decimal),
            "boolean" | "bool" => Ok(Self::Boolean),
            "struct" => Ok(Self::Struct(StructType::default())),
            _ => Err(DomainError::UnknownDataType(value.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "ColumnRepr", try_from = "ColumnRepr")]
pub struct StructField {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub description: String,
    pub sample_values: Vec<Value>,
}

impl StructField {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            description: String::new(),
            sample_values: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_sample_values(mut self, sample_values: Vec<Value>) -> Self {
        self.sample_values = sample_values;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nested(&self) -> Option<&StructType> {
        match &self.data_type {
            DataType::Struct(schema) => Some(schema),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ColumnRepr {
    name: String,
    data_type: String,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    sample_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<StructField>>,
}

fn default_nullable() -> bool {
    true
}

impl From<StructField> for ColumnRepr {
    fn from(field: StructField) -> Self {
        let data_type = field.data_type.name().to_string();
        let fields = match field.data_type {
            DataType::Struct(schema) => Some(schema.fields),
            _ => None,
        };
        Self {
            name: field.name,
            data_type,
            nullable: field.nullable,
            description: field.description,
            sample_values: field.sample_values,
            fields,
        }
    }
}

impl TryFrom<ColumnRepr> for StructField {
    type Error = DomainError;

    fn try_from(repr: ColumnRepr) -> Result<Self, Self::Error> {
        let data_type = match repr.data_type.parse::<DataType>()? {
            DataType::Struct(_) => {
                DataType::Struct(StructType::from_fields(repr.fields.unwrap_or_default()))
            }
            primitive => primitive,
        };
        Ok(Self {
            name: repr.name,
            data_type,
            nullable: repr.nullable,
            description: repr.description,
            sample_values: repr.sample_values,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    fields: Vec<StructField>,
}

impl StructType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Vec<StructField>) -> Self {
        Self { fields }
    }

    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        description: impl Into<String>,
        sample_values: Vec<Value>,
    ) -> &mut Self {
        self.fields.push(
            StructField::new(name, data_type)
                .with_description(description)
                .with_sample_values(sample_values),
        );
        self
    }

    pub fn add_struct(
        &mut self,
        name: impl Into<String>,
        schema: StructType,
        description: impl Into<String>,
    ) -> &mut Self {
        self.fields
            .push(StructField::new(name, DataType::Struct(schema)).with_description(description));
        self
    }

    pub fn fields(&self) -> &[StructField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Nesting depth: 1 for a flat schema, 2 when a column nests a flat schema.
    pub fn depth(&self) -> usize {
        1 + self
            .fields
            .iter()
            .filter_map(StructField::nested)
            .map(StructType::depth)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableType {
    pub name: String,
    pub layer: Layer,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "columns", with = "columns")]
    pub schema: StructType,
}

impl TableType {
    pub fn new(
        name: impl Into<String>,
        schema: StructType,
        layer: Layer,
        description: impl Into<String>,
    ) -> Self {
        Self { name: name.into(), layer, description: description.into(), schema }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

mod columns {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{StructField, StructType};

    pub fn serialize<S>(schema: &StructType, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        schema.fields().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<StructType, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<StructField>::deserialize(deserializer).map(StructType::from_fields)
    }
}
