//! Core model for dimensional data design: table schemas, the in-memory
//! table registry, design-rule checks and application configuration.

pub mod config;
pub mod design;
pub mod errors;
pub mod registry;
pub mod samples;
pub mod schema;

pub use design::{check_table, DesignRule, DesignViolation, DESIGN_PRINCIPLES};
pub use errors::DomainError;
pub use registry::TableRegistry;
pub use schema::{DataType, Layer, StructField, StructType, TableType};
