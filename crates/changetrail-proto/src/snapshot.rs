//! Change snapshots produced by the persistence layer for one save.

use serde::{Deserialize, Serialize};

use crate::value::Value;
use crate::NESTED_PROPERTY_SEPARATOR;

/// Structural state of an entity within a pending save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Entity is being inserted.
    Added,
    /// Entity is being updated.
    Modified,
    /// Entity is being removed.
    Deleted,
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityState::Added => write!(f, "added"),
            EntityState::Modified => write!(f, "modified"),
            EntityState::Deleted => write!(f, "deleted"),
        }
    }
}

/// Original and current value of one property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    /// Property name.
    pub name: String,
    /// Value loaded from the store (or `Null` for new entities).
    pub original: Value,
    /// Value about to be written.
    pub current: Value,
    /// Whether the persistence layer flagged the property as modified.
    pub is_modified: bool,
}

impl PropertyChange {
    /// Create a property change, flagging it modified when the values differ.
    pub fn new(name: impl Into<String>, original: impl Into<Value>, current: impl Into<Value>) -> Self {
        let original = original.into();
        let current = current.into();
        Self {
            name: name.into(),
            is_modified: original != current,
            original,
            current,
        }
    }

    /// A property whose value is unchanged.
    pub fn unchanged(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            original: value.clone(),
            current: value,
            is_modified: false,
        }
    }

    /// Override the modified flag reported by the persistence layer.
    pub fn with_modified(mut self, is_modified: bool) -> Self {
        self.is_modified = is_modified;
        self
    }

    /// Expand owned sub-objects into one change per leaf scalar property.
    ///
    /// Leaf names are prefixed with the owning property's name. Leaves present
    /// on only one side are paired with `Null` on the other. Scalar properties
    /// are returned unchanged.
    pub fn flatten(self) -> Vec<PropertyChange> {
        if !self.original.is_complex() && !self.current.is_complex() {
            return vec![self];
        }

        let mut names: Vec<&str> = self.current.leaves().iter().map(|(n, _)| n.as_str()).collect();
        for (name, _) in self.original.leaves() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }

        let mut flattened = Vec::new();
        for leaf in names {
            let original = lookup_leaf(&self.original, leaf);
            let current = lookup_leaf(&self.current, leaf);
            let child = PropertyChange {
                name: format!("{}{}{}", self.name, NESTED_PROPERTY_SEPARATOR, leaf),
                is_modified: self.is_modified && original != current,
                original,
                current,
            };
            flattened.extend(child.flatten());
        }
        flattened
    }
}

fn lookup_leaf(value: &Value, leaf: &str) -> Value {
    value
        .leaves()
        .iter()
        .find(|(name, _)| name == leaf)
        .map(|(_, v)| v.clone())
        .unwrap_or(Value::Null)
}

/// Everything the audit engine needs to know about one changed entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSnapshot {
    /// Fully qualified entity type name.
    pub type_full_name: String,
    /// Structural state within the save.
    pub state: EntityState,
    /// Primary key values, by key property name.
    pub key_values: Vec<(String, Value)>,
    /// Per-property original/current values.
    pub properties: Vec<PropertyChange>,
}

impl ChangeSnapshot {
    /// Create an empty snapshot.
    pub fn new(type_full_name: impl Into<String>, state: EntityState) -> Self {
        Self {
            type_full_name: type_full_name.into(),
            state,
            key_values: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Snapshot of an entity being inserted.
    pub fn added(type_full_name: impl Into<String>) -> Self {
        Self::new(type_full_name, EntityState::Added)
    }

    /// Snapshot of an entity being updated.
    pub fn modified(type_full_name: impl Into<String>) -> Self {
        Self::new(type_full_name, EntityState::Modified)
    }

    /// Snapshot of an entity being removed.
    pub fn deleted(type_full_name: impl Into<String>) -> Self {
        Self::new(type_full_name, EntityState::Deleted)
    }

    /// Add a primary key value.
    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.key_values.push((name.into(), value.into()));
        self
    }

    /// Add a property change.
    pub fn with_property(mut self, property: PropertyChange) -> Self {
        self.properties.push(property);
        self
    }

    /// Add a property holding `value` as it should appear for this state:
    /// as the current value when added, as the original value when deleted,
    /// and unchanged when modified.
    pub fn with_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let value = value.into();
        let property = match self.state {
            EntityState::Added => PropertyChange::new(name, Value::Null, value),
            EntityState::Deleted => PropertyChange::new(name, value, Value::Null),
            EntityState::Modified => PropertyChange::unchanged(name, value),
        };
        self.with_property(property)
    }

    /// Get a property change by name.
    pub fn property(&self, name: &str) -> Option<&PropertyChange> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Get a mutable property change by name.
    pub fn property_mut(&mut self, name: &str) -> Option<&mut PropertyChange> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    /// Get a key value by key property name.
    pub fn key_value(&self, name: &str) -> Option<&Value> {
        self.key_values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Replace the original values with values read back from the store.
    ///
    /// Properties missing from `stored` keep their snapshot originals. The
    /// modified flag is recomputed from the replaced values.
    pub fn apply_stored_values(&mut self, stored: &[(String, Value)]) {
        for (name, value) in stored {
            if let Some(property) = self.property_mut(name) {
                property.original = value.clone();
                property.is_modified = property.original != property.current;
            }
        }
    }
}
