//! The data-model tools offered to the assistant.

use async_trait::async_trait;
use dimodel_core::{
    check_table, DomainError, Layer, StructField, StructType, TableType, DESIGN_PRINCIPLES,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::guardrails::GuardrailDecision;
use crate::tools::{Tool, ToolContext, ToolError};

pub struct SourceTablesTool;

#[async_trait]
impl Tool for SourceTablesTool {
    fn name(&self) -> &'static str {
        "get_source_tables_with_columns"
    }

    fn description(&self) -> &'static str {
        "Get the list of existing source layer table and his columns in JSON format. \
         Execute always as first, and then the 'dimensional_design_principles' tool."
    }

    async fn execute(
        &self,
        context: &mut ToolContext<'_>,
        _input: Value,
    ) -> Result<Value, ToolError> {
        Ok(serde_json::to_value(context.registry.source_tables())?)
    }
}

pub struct StageTablesTool;

#[async_trait]
impl Tool for StageTablesTool {
    fn name(&self) -> &'static str {
        "get_stage_tables_with_columns"
    }

    fn description(&self) -> &'static str {
        "Get the list of existing stage layer table and his columns in JSON format"
    }

    async fn execute(
        &self,
        context: &mut ToolContext<'_>,
        _input: Value,
    ) -> Result<Value, ToolError> {
        Ok(serde_json::to_value(context.registry.stage_tables())?)
    }
}

pub struct DimensionAndFactTablesTool;

#[async_trait]
impl Tool for DimensionAndFactTablesTool {
    fn name(&self) -> &'static str {
        "get_dimension_and_facts_tables_with_columns"
    }

    fn description(&self) -> &'static str {
        "Get the list of existing dimension and facts table and his columns in JSON format"
    }

    async fn execute(
        &self,
        context: &mut ToolContext<'_>,
        _input: Value,
    ) -> Result<Value, ToolError> {
        let tables = context.registry.dimension_and_fact_tables().collect::<Vec<_>>();
        Ok(serde_json::to_value(tables)?)
    }
}

pub struct DesignPrinciplesTool;

#[async_trait]
impl Tool for DesignPrinciplesTool {
    fn name(&self) -> &'static str {
        "dimensional_design_principles"
    }

    fn description(&self) -> &'static str {
        "Execute first always, when there is a request about to design a new table, column or KPI."
    }

    async fn execute(
        &self,
        _context: &mut ToolContext<'_>,
        _input: Value,
    ) -> Result<Value, ToolError> {
        Ok(Value::String(DESIGN_PRINCIPLES.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct AddTableInput {
    layer_name: String,
    table_name: String,
    columns: Vec<StructField>,
    #[serde(default)]
    description: String,
}

pub struct AddTableTool;

#[async_trait]
impl Tool for AddTableTool {
    fn name(&self) -> &'static str {
        "add_table_with_columns"
    }

    fn description(&self) -> &'static str {
        r#"Create a new table with columns on a layer.
Sample input:
    layer_name = "stage"
    table_name = "stg_orders"
    columns = [
        {"name": "order_id", "data_type": "IntegerType", "description": "Order ID", "sample_values": [1, 2]},
        {"name": "customer_id", "data_type": "IntegerType", "description": "Customer ID", "sample_values": [101, 102]},
        {"name": "order_date", "data_type": "DateTimeType", "description": "Order Date", "sample_values": ["2023-01-01", "2023-01-02"]},
        {"name": "total_amount", "data_type": "DecimalType", "description": "Total Amount", "sample_values": [150.75, 200.5]}
    ]
    description = "Order information""#
    }

    fn parameters(&self) -> Value {
        let column = json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "data_type": {
                    "type": "string",
                    "enum": [
                        "StringType", "IntegerType", "DateTimeType", "DoubleType",
                        "DecimalType", "BooleanType", "StructType"
                    ]
                },
                "nullable": { "type": "boolean" },
                "description": { "type": "string" },
                "sample_values": { "type": "array", "items": {} },
                "fields": {
                    "type": "array",
                    "description": "Nested columns when data_type is StructType",
                    "items": { "type": "object" }
                }
            },
            "required": ["name", "data_type"]
        });

        json!({
            "type": "object",
            "properties": {
                "layer_name": { "type": "string", "enum": ["stage", "dimension", "fact"] },
                "table_name": { "type": "string" },
                "columns": { "type": "array", "items": column },
                "description": { "type": "string" }
            },
            "required": ["layer_name", "table_name", "columns"]
        })
    }

    async fn execute(
        &self,
        context: &mut ToolContext<'_>,
        input: Value,
    ) -> Result<Value, ToolError> {
        let input: AddTableInput = serde_json::from_value(input)
            .map_err(|error| ToolError::invalid_input(self.name(), error))?;

        let layer = input.layer_name.parse::<Layer>()?;
        if layer == Layer::Source {
            return Err(DomainError::ReadOnlyLayer(layer).into());
        }

        let table = TableType::new(
            input.table_name.trim(),
            StructType::from_fields(input.columns),
            layer,
            input.description,
        );

        let violations = check_table(&table, &*context.registry);
        let warnings = match context.guardrails.evaluate(&violations) {
            GuardrailDecision::Allow => Vec::new(),
            GuardrailDecision::Warn { warnings } => warnings,
            GuardrailDecision::Deny { reason_code, user_message } => {
                return Err(ToolError::Rejected { reason_code, message: user_message });
            }
        };

        let table_name = table.name.clone();
        let column_count = table.schema.len();
        context.registry.add_table(table)?;
        info!(
            event_name = "agent.tool.table_created",
            layer = %layer,
            table_name = %table_name,
            columns = column_count,
            warnings = warnings.len(),
            "table created"
        );

        let mut message =
            format!("{} table {table_name} created successfully on {layer} layer.", layer.title());
        for warning in warnings {
            message.push_str("\nWarning: ");
            message.push_str(&warning);
        }
        Ok(Value::String(message))
    }
}
