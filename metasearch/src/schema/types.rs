use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key of the identifier field as seen by clients (filters, sorts, selected fields).
pub const ID_FIELD: &str = "id_";

/// Configured searchable classes, keyed by resource class name.
pub type SearchableClasses = HashMap<String, SearchableClass>;

/// A field key such as `study.type`, plus a user-friendly name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLabel {
    pub key: String,
    /// Empty means "derive from the key".
    #[serde(default)]
    pub name: String,
}

impl FieldLabel {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: String::new(),
        }
    }

    pub fn named(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }

    pub fn id() -> Self {
        Self::named(ID_FIELD, "ID")
    }

    pub fn is_id(&self) -> bool {
        self.key == ID_FIELD
    }

    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            derive_display_name(&self.key)
        } else {
            self.name.clone()
        }
    }
}

/// Title-cases a dotted key: `study.sample_type` becomes `Study Sample Type`.
pub fn derive_display_name(key: &str) -> String {
    key.split(['.', '_'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchableClass {
    pub description: String,
    #[serde(default)]
    pub facetable_fields: Vec<FieldLabel>,
    /// Empty means every field of the resource is returned.
    #[serde(default)]
    pub selected_fields: Vec<FieldLabel>,
}

impl SearchableClass {
    /// Fill in display names that were left empty in the configuration.
    pub fn normalize(&mut self) {
        for label in self
            .facetable_fields
            .iter_mut()
            .chain(self.selected_fields.iter_mut())
        {
            if label.name.trim().is_empty() {
                label.name = label.display_name();
            }
        }
    }
}

/// One searchable class as written in a standalone YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub class_name: String,
    #[serde(flatten)]
    pub class: SearchableClass,
}
