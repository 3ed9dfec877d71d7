//! Source-to-target id mapping built while entities are created.
//!
//! Keyed by the source [`EntityKey`] because ids only need to be unique
//! within a kind. On the wire the mapping is a flat list of entries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tagsync_interchange::{EntityKey, EntityKind};

/// Where one source entity ended up in the target workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedEntity {
    pub new_id: String,
    pub name: String,
}

/// One row of the serialized mapping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingEntry {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub original_id: String,
    pub new_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<MappingEntry>", into = "Vec<MappingEntry>")]
pub struct IdMapping {
    entries: BTreeMap<EntityKey, MappedEntity>,
}

impl IdMapping {
    pub fn new() -> Self {
        IdMapping::default()
    }

    /// Record a created entity. A later insert for the same source key
    /// replaces the earlier one.
    pub fn insert(
        &mut self,
        original: EntityKey,
        new_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Option<MappedEntity> {
        self.entries.insert(
            original,
            MappedEntity {
                new_id: new_id.into(),
                name: name.into(),
            },
        )
    }

    pub fn get(&self, original: &EntityKey) -> Option<&MappedEntity> {
        self.entries.get(original)
    }

    pub fn contains(&self, original: &EntityKey) -> bool {
        self.entries.contains_key(original)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by kind, then original id.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &MappedEntity)> {
        self.entries.iter()
    }
}

impl From<Vec<MappingEntry>> for IdMapping {
    fn from(rows: Vec<MappingEntry>) -> Self {
        let mut mapping = IdMapping::new();
        for row in rows {
            mapping.insert(EntityKey::new(row.kind, row.original_id), row.new_id, row.name);
        }
        mapping
    }
}

impl From<IdMapping> for Vec<MappingEntry> {
    fn from(mapping: IdMapping) -> Self {
        mapping
            .entries
            .into_iter()
            .map(|(key, mapped)| MappingEntry {
                kind: key.kind,
                original_id: key.id,
                new_id: mapped.new_id,
                name: mapped.name,
            })
            .collect()
    }
}
