//! Flat, multi-valued field sets produced from nested objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::index_command::ObjectIdentity;

/// Reserved field carrying the object id.
pub const ID_FIELD: &str = "X_CHEF_id_CHEF_X";
/// Reserved field carrying the database name.
pub const DATABASE_FIELD: &str = "X_CHEF_database_CHEF_X";
/// Reserved field carrying the object type.
pub const TYPE_FIELD: &str = "X_CHEF_type_CHEF_X";

/// Reserved identity field names, in the order they are written.
pub const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, DATABASE_FIELD, TYPE_FIELD];

/// Field name to ordered, de-duplicated values.
///
/// Fields iterate in name order so documents built from the same object are
/// byte-for-byte identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlattenedDocument {
    fields: BTreeMap<String, Vec<String>>,
}

impl FlattenedDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to a field, ignoring values the field already holds.
    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let values = self.fields.entry(field.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    /// Replace a field with a single value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), vec![value.into()]);
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of distinct fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields and their values.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, values)| (field.as_str(), values.as_slice()))
    }

    /// Iterate every (field, value) pair.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().flat_map(|(field, values)| {
            values
                .iter()
                .map(move |value| (field.as_str(), value.as_str()))
        })
    }

    /// Attach the reserved identity fields, overwriting any domain field that
    /// happens to use a reserved name.
    pub fn with_identity(mut self, identity: &ObjectIdentity) -> Self {
        self.set(ID_FIELD, identity.id.clone());
        self.set(DATABASE_FIELD, identity.database.clone());
        self.set(TYPE_FIELD, identity.object_type.clone());
        self
    }

    /// Whether a field name is one of the reserved identity fields.
    pub fn is_reserved(field: &str) -> bool {
        RESERVED_FIELDS.contains(&field)
    }
}

impl FromIterator<(String, String)> for FlattenedDocument {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut document = Self::new();
        for (field, value) in iter {
            document.push(field, value);
        }
        document
    }
}
