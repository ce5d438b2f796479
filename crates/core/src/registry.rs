use tracing::debug;

use crate::errors::DomainError;
use crate::samples;
use crate::schema::{Layer, TableType};

/// In-memory table catalog: read-only source seed plus append-only
/// stage, dimension and fact sequences.
#[derive(Clone, Debug, Default)]
pub struct TableRegistry {
    sources: Vec<TableType>,
    stage: Vec<TableType>,
    dimensions: Vec<TableType>,
    facts: Vec<TableType>,
}

impl TableRegistry {
    pub fn new(sources: Vec<TableType>) -> Self {
        Self { sources, ..Self::default() }
    }

    pub fn seeded() -> Self {
        Self::new(samples::source_tables())
    }

    pub fn source_tables(&self) -> &[TableType] {
        &self.sources
    }

    pub fn stage_tables(&self) -> &[TableType] {
        &self.stage
    }

    pub fn dimension_tables(&self) -> &[TableType] {
        &self.dimensions
    }

    pub fn fact_tables(&self) -> &[TableType] {
        &self.facts
    }

    pub fn dimension_and_fact_tables(&self) -> impl Iterator<Item = &TableType> {
        self.dimensions.iter().chain(self.facts.iter())
    }

    pub fn tables(&self, layer: Layer) -> &[TableType] {
        match layer {
            Layer::Source => &self.sources,
            Layer::Stage => &self.stage,
            Layer::Dimension => &self.dimensions,
            Layer::Fact => &self.facts,
        }
    }

    /// First table with this name on the layer, compared case-insensitively.
    pub fn find(&self, layer: Layer, name: &str) -> Option<&TableType> {
        self.tables(layer).iter().find(|table| table.name.eq_ignore_ascii_case(name))
    }

    /// Appends `table` to the sequence of its layer. Names are not required to
    /// be unique.
    pub fn add_table(&mut self, table: TableType) -> Result<(), DomainError> {
        let target = match table.layer {
            Layer::Source => return Err(DomainError::ReadOnlyLayer(Layer::Source)),
            Layer::Stage => &mut self.stage,
            Layer::Dimension => &mut self.dimensions,
            Layer::Fact => &mut self.facts,
        };

        debug!(
            event_name = "registry.table.added",
            layer = %table.layer,
            table_name = %table.name,
            columns = table.schema.len(),
            "table appended to registry"
        );
        target.push(table);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sources.len() + self.stage.len() + self.dimensions.len() + self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::TableRegistry;
    use crate::errors::DomainError;
    use crate::samples;
    use crate::schema::{DataType, Layer, StructType, TableType};

    fn table(name: &str, layer: Layer) -> TableType {
        let mut schema = StructType::new();
        schema.add_field("id", DataType::Integer, "Primary key", vec![json!(1)]);
        TableType::new(name, schema, layer, "")
    }

    #[test]
    fn seeded_registry_has_sources_and_empty_runtime_layers() {
        let registry = TableRegistry::seeded();

        assert_eq!(registry.source_tables().len(), 4);
        assert!(registry.stage_tables().is_empty());
        assert_eq!(registry.dimension_and_fact_tables().count(), 0);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn tables_are_routed_by_layer() {
        let mut registry = TableRegistry::seeded();
        registry.add_table(table("stg_orders", Layer::Stage)).expect("add stage");
        registry.add_table(table("dim_customer", Layer::Dimension)).expect("add dimension");
        registry.add_table(table("fact_sales", Layer::Fact)).expect("add fact");

        assert_eq!(registry.stage_tables().len(), 1);
        assert_eq!(registry.dimension_tables().len(), 1);
        assert_eq!(registry.fact_tables().len(), 1);
        let names = registry.dimension_and_fact_tables().map(|t| t.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["dim_customer", "fact_sales"]);
    }

    #[test]
    fn duplicate_names_are_kept() {
        let mut registry = TableRegistry::default();
        registry.add_table(table("stg_orders", Layer::Stage)).expect("first add");
        registry.add_table(table("stg_orders", Layer::Stage)).expect("second add");

        assert_eq!(registry.stage_tables().len(), 2);
    }

    #[test]
    fn source_layer_is_read_only() {
        let mut registry = TableRegistry::seeded();
        let result = registry.add_table(table("Returns", Layer::Source));

        assert_eq!(result, Err(DomainError::ReadOnlyLayer(Layer::Source)));
        assert_eq!(registry.source_tables(), samples::source_tables().as_slice());
    }

    #[test]
    fn find_is_case_insensitive() {
        let registry = TableRegistry::seeded();

        assert!(registry.find(Layer::Source, "orders").is_some());
        assert!(registry.find(Layer::Stage, "orders").is_none());
    }
}
