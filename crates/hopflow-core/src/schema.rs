//! Row schema types. Pure data, shared by reference between every row that
//! travels over one hop.
//!
//! A `RowSchema` is never mutated after it has been published on a hop. Steps
//! that change the shape of a row derive a new schema with `with_field`,
//! `without_field`, `renamed` or `merged`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Number,
    Date,
    Boolean,
    Binary,
}

impl ValueType {
    /// Parse a type name as written in graph files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" | "utf8" => Some(ValueType::String),
            "integer" | "int" | "i64" => Some(ValueType::Integer),
            "number" | "float" | "f64" => Some(ValueType::Number),
            "date" => Some(ValueType::Date),
            "boolean" | "bool" => Some(ValueType::Boolean),
            "binary" | "bytes" => Some(ValueType::Binary),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::String => "String",
            ValueType::Integer => "Integer",
            ValueType::Number => "Number",
            ValueType::Date => "Date",
            ValueType::Boolean => "Boolean",
            ValueType::Binary => "Binary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
}

impl FieldMeta {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            length: None,
            precision: None,
        }
    }

    pub fn with_length(mut self, length: u32, precision: Option<u32>) -> Self {
        self.length = Some(length);
        self.precision = precision;
        self
    }
}

/// Ordered, named, typed field descriptors. Field names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FieldMeta>", into = "Vec<FieldMeta>")]
pub struct RowSchema {
    fields: Vec<FieldMeta>,
}

impl RowSchema {
    pub fn new(fields: Vec<FieldMeta>) -> Result<Self> {
        for (i, f) in fields.iter().enumerate() {
            if f.name.trim().is_empty() {
                return Err(Error::Schema(format!("field #{i} has an empty name")));
            }
            if fields[..i].iter().any(|o| o.name == f.name) {
                return Err(Error::Schema(format!("duplicate field name '{}'", f.name)));
            }
        }
        Ok(Self { fields })
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&FieldMeta> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// New schema with `field` appended.
    pub fn with_field(&self, field: FieldMeta) -> Result<Self> {
        let mut fields = self.fields.clone();
        fields.push(field);
        Self::new(fields)
    }

    /// New schema without the named field.
    pub fn without_field(&self, name: &str) -> Result<Self> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| Error::Schema(format!("field '{name}' not found")))?;
        let mut fields = self.fields.clone();
        fields.remove(idx);
        Ok(Self { fields })
    }

    /// New schema with one field renamed.
    pub fn renamed(&self, from: &str, to: &str) -> Result<Self> {
        let idx = self
            .index_of(from)
            .ok_or_else(|| Error::Schema(format!("field '{from}' not found")))?;
        let mut fields = self.fields.clone();
        fields[idx].name = to.to_string();
        Self::new(fields)
    }

    /// New schema with `other`'s fields appended after this one's.
    pub fn merged(&self, other: &RowSchema) -> Result<Self> {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        Self::new(fields)
    }
}

impl TryFrom<Vec<FieldMeta>> for RowSchema {
    type Error = Error;

    fn try_from(fields: Vec<FieldMeta>) -> Result<Self> {
        Self::new(fields)
    }
}

impl From<RowSchema> for Vec<FieldMeta> {
    fn from(s: RowSchema) -> Self {
        s.fields
    }
}
