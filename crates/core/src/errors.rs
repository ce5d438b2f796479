use thiserror::Error;

use crate::schema::Layer;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown layer `{0}` (expected source|stage|dimension|fact)")]
    UnknownLayer(String),
    #[error("unknown data type `{0}` (expected StringType|IntegerType|DateTimeType|DoubleType|DecimalType|BooleanType|StructType)")]
    UnknownDataType(String),
    #[error("the {0} layer is read-only")]
    ReadOnlyLayer(Layer),
}

impl DomainError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::UnknownLayer(_) => "unknown_layer",
            Self::UnknownDataType(_) => "unknown_data_type",
            Self::ReadOnlyLayer(_) => "read_only_layer",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::DomainError;
    use crate::schema::Layer;

    #[test]
    fn unknown_layer_message_lists_accepted_values() {
        let error = DomainError::UnknownLayer("bronze".to_owned());

        assert_eq!(
            error.to_string(),
            "unknown layer `bronze` (expected source|stage|dimension|fact)"
        );
        assert_eq!(error.reason_code(), "unknown_layer");
    }

    #[test]
    fn read_only_layer_names_the_layer() {
        let error = DomainError::ReadOnlyLayer(Layer::Source);

        assert_eq!(error.to_string(), "the source layer is read-only");
        assert_eq!(error.reason_code(), "read_only_layer");
    }
}
