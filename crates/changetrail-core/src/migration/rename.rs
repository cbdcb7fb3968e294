//! Rename maps for legacy audit log names.
//!
//! A [`RenameMap`] is always closed: every old name maps straight to its
//! final name, so applying it twice changes nothing the second time.

use std::collections::{BTreeMap, BTreeSet};

use super::error::MigrationError;

/// Old name to new name.
type NameTable = BTreeMap<String, String>;

/// Entity name to its property name table.
type PropertyTables = BTreeMap<String, NameTable>;

/// What a rename applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenameKind {
    /// `AuditLog::type_full_name`.
    Entity,
    /// `AuditLogDetail::property_name`.
    Property,
}

impl std::fmt::Display for RenameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenameKind::Entity => write!(f, "entity"),
            RenameKind::Property => write!(f, "property"),
        }
    }
}

/// Resolved old-name to new-name table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMap {
    versions: Vec<String>,
    entities: NameTable,
    /// Keyed by the entity's final name.
    properties: PropertyTables,
}

impl RenameMap {
    /// Start a map for one version boundary.
    pub fn builder(version: impl Into<String>) -> RenameMapBuilder {
        RenameMapBuilder::new(version)
    }

    /// A map that renames nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Version labels folded into this map, oldest first.
    pub fn versions(&self) -> &[String] {
        &self.versions
    }

    /// Final name for a stored entity type name, if it is mapped.
    pub fn resolve_entity(&self, stored: &str) -> Option<&str> {
        self.entities.get(stored).map(String::as_str)
    }

    /// Final name for a stored property name.
    ///
    /// `entity` is the owning log's type name after entity renames. Property
    /// renames declared under the stored type name are honoured as well.
    pub fn resolve_property(&self, entity: &str, stored: &str) -> Option<&str> {
        let final_entity = self.resolve_entity(entity).unwrap_or(entity);
        self.properties
            .get(final_entity)
            .and_then(|props| props.get(stored))
            .map(String::as_str)
    }

    /// Number of mapped entity names.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of mapped property names across all entities.
    pub fn property_count(&self) -> usize {
        self.properties.values().map(BTreeMap::len).sum()
    }

    /// Check if the map renames nothing.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.properties.is_empty()
    }

    /// Close the entity table and fold per-version property tables.
    ///
    /// Property tables are re-keyed by final entity name. Within one version
    /// a conflicting target is ambiguous; across versions the later wins.
    fn from_versions(
        versions: Vec<String>,
        entities: NameTable,
        version_properties: Vec<PropertyTables>,
    ) -> Result<Self, MigrationError> {
        let entities = close(RenameKind::Entity, entities)?;

        let mut merged = PropertyTables::new();
        for properties in version_properties {
            let mut rekeyed = PropertyTables::new();
            for (entity, props) in properties {
                let final_entity = entities.get(&entity).cloned().unwrap_or(entity);
                let table = rekeyed.entry(final_entity).or_default();
                for (old, new) in props {
                    insert_unambiguous(table, RenameKind::Property, old, new)?;
                }
            }

            for (entity, props) in rekeyed {
                merged.entry(entity).or_default().extend(props);
            }
        }

        let mut closed = BTreeMap::new();
        for (entity, props) in merged {
            closed.insert(entity, close(RenameKind::Property, props)?);
        }

        Ok(Self {
            versions,
            entities,
            properties: closed,
        })
    }
}

/// Builder for one version's renames.
#[derive(Debug, Clone)]
pub struct RenameMapBuilder {
    version: String,
    entities: Vec<(String, String)>,
    properties: Vec<(String, String, String)>,
}

impl RenameMapBuilder {
    /// Create a builder for a version label.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            entities: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Rename an entity type.
    pub fn rename_entity(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.entities.push((old.into(), new.into()));
        self
    }

    /// Rename a property of an entity type.
    ///
    /// `entity` may be the type's old or new name.
    pub fn rename_property(
        mut self,
        entity: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        self.properties.push((entity.into(), old.into(), new.into()));
        self
    }

    /// Validate and resolve the map.
    ///
    /// One old name with two different targets is ambiguous; chains are
    /// collapsed to their final name and cycles are rejected.
    pub fn build(self) -> Result<RenameMap, MigrationError> {
        let (entities, properties) = self.tables()?;
        RenameMap::from_versions(vec![self.version], entities, vec![properties])
    }

    fn tables(&self) -> Result<(NameTable, PropertyTables), MigrationError> {
        let mut entities = BTreeMap::new();
        for (old, new) in &self.entities {
            insert_unambiguous(&mut entities, RenameKind::Entity, old.clone(), new.clone())?;
        }

        let mut properties = PropertyTables::new();
        for (entity, old, new) in &self.properties {
            insert_unambiguous(
                properties.entry(entity.clone()).or_default(),
                RenameKind::Property,
                old.clone(),
                new.clone(),
            )?;
        }

        Ok((entities, properties))
    }
}

/// Renames accumulated across version boundaries.
///
/// Later versions override earlier ones for the same old name.
#[derive(Debug, Clone, Default)]
pub struct LegacyRenames {
    versions: Vec<RenameMapBuilder>,
}

impl LegacyRenames {
    /// Start with no versions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the renames of the next version.
    pub fn with_version(mut self, version: RenameMapBuilder) -> Self {
        self.versions.push(version);
        self
    }

    /// Fold every version into one closed map.
    pub fn resolve(&self) -> Result<RenameMap, MigrationError> {
        let mut labels = Vec::with_capacity(self.versions.len());
        let mut entities = BTreeMap::new();
        let mut properties = Vec::with_capacity(self.versions.len());

        for version in &self.versions {
            let (version_entities, version_properties) = version.tables()?;
            labels.push(version.version.clone());
            entities.extend(version_entities);
            properties.push(version_properties);
        }

        RenameMap::from_versions(labels, entities, properties)
    }
}

fn insert_unambiguous(
    table: &mut NameTable,
    kind: RenameKind,
    old: String,
    new: String,
) -> Result<(), MigrationError> {
    match table.get(&old) {
        Some(existing) if *existing != new => Err(MigrationError::AmbiguousRename {
            kind,
            candidates: vec![existing.clone(), new],
            old_name: old,
        }),
        _ => {
            table.insert(old, new);
            Ok(())
        }
    }
}

/// Collapse chains so every old name maps to its final name.
fn close(kind: RenameKind, table: NameTable) -> Result<NameTable, MigrationError> {
    let mut closed = BTreeMap::new();
    for start in table.keys() {
        let mut path = vec![start.clone()];
        let mut seen = BTreeSet::from([start.as_str()]);
        let mut current = start.as_str();

        while let Some(next) = table.get(current) {
            if next == current {
                break;
            }
            if !seen.insert(next.as_str()) {
                path.push(next.clone());
                return Err(MigrationError::CyclicRename { kind, names: path });
            }
            path.push(next.clone());
            current = next.as_str();
        }

        closed.insert(start.clone(), current.to_string());
    }
    Ok(closed)
}
