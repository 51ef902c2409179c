use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::{RecordError, RecordResult};
use super::record::Record;
use super::value::{FieldType, Value};

/// A named fixed-width field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Get the size of this field in bytes
    pub fn size(&self) -> usize {
        self.field_type.size()
    }
}

/// Ordered list of fixed-width fields describing every tuple of a relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema, rejecting empty or duplicate field lists
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> RecordResult<Self> {
        let schema = Self {
            name: name.into(),
            fields,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Build a schema from `(name, type)` string pairs such as `("age", "int")`
    pub fn from_pairs(name: impl Into<String>, pairs: &[(&str, &str)]) -> RecordResult<Self> {
        let fields = pairs
            .iter()
            .map(|(field, ty)| Ok(Field::new(*field, ty.parse()?)))
            .collect::<RecordResult<Vec<_>>>()?;
        Self::new(name, fields)
    }

    /// Decode the JSON form stored in file headers
    pub fn from_json(bytes: &[u8]) -> RecordResult<Self> {
        let schema: Schema = serde_json::from_slice(bytes)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn to_json(&self) -> RecordResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn validate(&self) -> RecordResult<()> {
        if self.fields.is_empty() {
            return Err(RecordError::InvalidSchema(format!(
                "Schema '{}' has no fields",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(RecordError::InvalidSchema(format!(
                    "Duplicate field '{}' in schema '{}'",
                    field.name, self.name
                )));
            }
            if field.size() == 0 {
                return Err(RecordError::InvalidSchema(format!(
                    "Field '{}' has zero width",
                    field.name
                )));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    /// Find field index by name
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Width of every field, in declaration order
    pub fn field_sizes(&self) -> Vec<usize> {
        self.fields.iter().map(Field::size).collect()
    }

    /// Total tuple size in bytes
    pub fn size(&self) -> usize {
        self.fields.iter().map(Field::size).sum()
    }

    /// Byte offset of a field within a packed tuple
    pub fn field_offset(&self, idx: usize) -> usize {
        self.fields[..idx].iter().map(Field::size).sum()
    }

    /// Pack a record into its fixed-width byte form
    pub fn pack(&self, record: &Record) -> RecordResult<Vec<u8>> {
        let values = record.values();
        if values.len() != self.fields.len() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} values, got {}",
                self.fields.len(),
                values.len()
            )));
        }

        let mut bytes = vec![0u8; self.size()];
        let mut offset = 0;
        for (value, field) in values.iter().zip(&self.fields) {
            let end = offset + field.size();
            field.field_type.encode(value, &mut bytes[offset..end])?;
            offset = end;
        }
        Ok(bytes)
    }

    /// Unpack a fixed-width tuple into a record
    pub fn unpack(&self, bytes: &[u8]) -> RecordResult<Record> {
        if bytes.len() != self.size() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} bytes for schema '{}', got {}",
                self.size(),
                self.name,
                bytes.len()
            )));
        }

        let mut values = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for field in &self.fields {
            let end = offset + field.size();
            values.push(field.field_type.decode(&bytes[offset..end])?);
            offset = end;
        }
        Ok(Record::new(values))
    }

    /// Decode one field from a packed tuple
    pub fn unpack_field(&self, bytes: &[u8], idx: usize) -> RecordResult<Value> {
        let field = self
            .fields
            .get(idx)
            .ok_or_else(|| RecordError::UnknownField(idx.to_string()))?;
        let start = self.field_offset(idx);
        let end = start + field.size();
        if bytes.len() < end {
            return Err(RecordError::Deserialization(format!(
                "Tuple of {} bytes is too short for field '{}'",
                bytes.len(),
                field.name
            )));
        }
        field.field_type.decode(&bytes[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_schema() -> Schema {
        Schema::from_pairs(
            "employee",
            &[("id", "int"), ("name", "char(20)"), ("salary", "float")],
        )
        .unwrap()
    }

    #[test]
    fn test_schema_creation() {
        let schema = create_test_schema();
        assert_eq!(schema.name(), "employee");
        assert_eq!(schema.field_count(), 3);
        assert_eq!(schema.size(), 4 + 20 + 8);
        assert_eq!(schema.field_sizes(), vec![4, 20, 8]);
    }

    #[test]
    fn test_field_offset() {
        let schema = create_test_schema();
        assert_eq!(schema.field_offset(0), 0);
        assert_eq!(schema.field_offset(1), 4);
        assert_eq!(schema.field_offset(2), 24);
    }

    #[test]
    fn test_field_index() {
        let schema = create_test_schema();
        assert_eq!(schema.field_index("id"), Some(0));
        assert_eq!(schema.field_index("salary"), Some(2));
        assert_eq!(schema.field_index("nonexistent"), None);
    }

    #[test]
    fn test_empty_schema_rejected() {
        let result = Schema::new("empty", vec![]);
        assert!(matches!(result, Err(RecordError::InvalidSchema(_))));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = Schema::from_pairs("dup", &[("a", "int"), ("a", "float")]);
        assert!(matches!(result, Err(RecordError::InvalidSchema(_))));
    }

    #[test]
    fn test_pack_unpack() {
        let schema = create_test_schema();
        let record = Record::new(vec![
            Value::Int(7),
            Value::Char("Alice".to_string()),
            Value::Float(1250.5),
        ]);

        let bytes = schema.pack(&record).unwrap();
        assert_eq!(bytes.len(), schema.size());
        assert_eq!(&bytes[0..4], &7i32.to_le_bytes());
        assert_eq!(schema.unpack(&bytes).unwrap(), record);
        assert_eq!(
            schema.unpack_field(&bytes, 2).unwrap(),
            Value::Float(1250.5)
        );
    }

    #[test]
    fn test_pack_wrong_arity() {
        let schema = create_test_schema();
        let result = schema.pack(&Record::new(vec![Value::Int(1)]));
        assert!(matches!(result, Err(RecordError::SchemaMismatch(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let schema = create_test_schema();
        let json = schema.to_json().unwrap();
        let text = String::from_utf8(json.clone()).unwrap();
        assert!(text.contains("\"char(20)\""));
        assert_eq!(Schema::from_json(&json).unwrap(), schema);
    }

    #[test]
    fn test_json_rejects_garbage() {
        assert!(Schema::from_json(b"not json").is_err());
        assert!(Schema::from_json(br#"{"name":"x","fields":[]}"#).is_err());
    }
}
