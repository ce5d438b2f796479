//! Seed source tables available to every new registry.

use serde_json::json;

use crate::schema::{DataType, Layer, StructType, TableType};

pub fn customer_schema() -> StructType {
    let mut address = StructType::new();
    address
        .add_field(
            "street",
            DataType::String,
            "Street address",
            vec![json!("123 Main St"), json!("456 Elm St")],
        )
        .add_field("city", DataType::String, "City name", vec![json!("Springfield"), json!("Shelbyville")]);

    let mut customers = StructType::new();
    customers
        .add_field("name", DataType::String, "Full name", vec![json!("John Doe"), json!("Jane Smith")])
        .add_field("age", DataType::Integer, "Age in years", vec![json!(30), json!(25)])
        .add_field(
            "birthdate",
            DataType::DateTime,
            "Birthdate",
            vec![json!("1990-01-01"), json!("1995-05-15")],
        )
        .add_field("salary", DataType::Double, "Annual salary", vec![json!(50000.0), json!(60000.0)])
        .add_field("net_worth", DataType::Decimal, "Net worth", vec![json!(100000.0), json!(200000.0)])
        .add_field("is_employed", DataType::Boolean, "Employment status", vec![json!(true), json!(false)])
        .add_struct("address", address, "Address details");
    customers
}

pub fn orders_schema() -> StructType {
    let mut orders = StructType::new();
    orders
        .add_field("order_id", DataType::Integer, "Order ID", vec![json!(1), json!(2)])
        .add_field("customer_id", DataType::Integer, "Customer ID", vec![json!(101), json!(102)])
        .add_field(
            "order_date",
            DataType::DateTime,
            "Order Date",
            vec![json!("2023-01-01"), json!("2023-01-02")],
        )
        .add_field("total_amount", DataType::Decimal, "Total Amount", vec![json!(150.75), json!(200.5)]);
    orders
}

pub fn products_schema() -> StructType {
    let mut products = StructType::new();
    products
        .add_field("product_id", DataType::Integer, "Product ID", vec![json!(1001), json!(1002)])
        .add_field("name", DataType::String, "Product Name", vec![json!("Widget"), json!("Gadget")])
        .add_field("category", DataType::String, "Category", vec![json!("Tools"), json!("Electronics")])
        .add_field("price", DataType::Double, "Price", vec![json!(19.99), json!(29.99)]);
    products
}

pub fn inventory_schema() -> StructType {
    let mut inventory = StructType::new();
    inventory
        .add_field("product_id", DataType::Integer, "Product ID", vec![json!(1001), json!(1002)])
        .add_field("warehouse", DataType::String, "Warehouse Location", vec![json!("A1"), json!("B2")])
        .add_field("stock_level", DataType::Integer, "Stock Level", vec![json!(50), json!(75)]);
    inventory
}

pub fn source_tables() -> Vec<TableType> {
    vec![
        TableType::new("Customers", customer_schema(), Layer::Source, "Customer information"),
        TableType::new("Orders", orders_schema(), Layer::Source, "Order information"),
        TableType::new("Products", products_schema(), Layer::Source, "Product information"),
        TableType::new("Inventory", inventory_schema(), Layer::Source, "Inventory information"),
    ]
}

#[cfg(test)]
mod tests {
    use super::source_tables;
    use crate::schema::Layer;

    #[test]
    fn four_source_tables_are_seeded() {
        let tables = source_tables();
        let names = tables.iter().map(|table| table.name.as_str()).collect::<Vec<_>>();

        assert_eq!(names, vec!["Customers", "Orders", "Products", "Inventory"]);
        assert!(tables.iter().all(|table| table.layer == Layer::Source));
    }

    #[test]
    fn customers_address_serializes_nested_columns() {
        let tables = source_tables();
        let value = tables[0].to_json();
        let address = &value["columns"][6];

        assert_eq!(address["name"], "address");
        assert_eq!(address["data_type"], "StructType");
        assert_eq!(address["fields"][0]["name"], "street");
        assert_eq!(address["fields"][1]["sample_values"][1], "Shelbyville");
        assert_eq!(tables[0].schema.depth(), 2);
    }
}
