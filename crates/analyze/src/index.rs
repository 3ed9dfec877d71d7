//! Lookup index over one snapshot.
//!
//! Structural references (trigger ids, tag links) are id-keyed while
//! inline references are name-keyed, so the index keeps both.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tagsync_interchange::{
    EntityKey, EntityKind, EntityRef, Snapshot, Tag, Template, Trigger, Variable,
};

pub struct SnapshotIndex<'a> {
    snapshot: &'a Snapshot,
    by_key: HashMap<EntityKey, EntityRef<'a>>,
    variables_by_name: HashMap<&'a str, &'a Variable>,
    tags_by_name: HashMap<&'a str, &'a Tag>,
    duplicate_names: BTreeMap<EntityKind, BTreeSet<String>>,
}

impl<'a> SnapshotIndex<'a> {
    /// Index a snapshot. On duplicate names the first entity wins.
    pub fn new(snapshot: &'a Snapshot) -> Self {
        let mut by_key = HashMap::with_capacity(snapshot.len());
        let mut variables_by_name = HashMap::new();
        let mut tags_by_name = HashMap::new();
        let mut seen_names: BTreeMap<EntityKind, BTreeSet<&str>> = BTreeMap::new();
        let mut duplicate_names: BTreeMap<EntityKind, BTreeSet<String>> = BTreeMap::new();

        for entity in snapshot.entities() {
            by_key.entry(entity.key()).or_insert(entity);
            if !seen_names
                .entry(entity.kind())
                .or_default()
                .insert(entity.name())
            {
                duplicate_names
                    .entry(entity.kind())
                    .or_default()
                    .insert(entity.name().to_string());
            }
            match entity {
                EntityRef::Variable(v) => {
                    variables_by_name.entry(v.name.as_str()).or_insert(v);
                }
                EntityRef::Tag(t) => {
                    tags_by_name.entry(t.name.as_str()).or_insert(t);
                }
                _ => {}
            }
        }

        SnapshotIndex {
            snapshot,
            by_key,
            variables_by_name,
            tags_by_name,
            duplicate_names,
        }
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    pub fn get(&self, key: &EntityKey) -> Option<EntityRef<'a>> {
        self.by_key.get(key).copied()
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn tag(&self, id: &str) -> Option<&'a Tag> {
        match self.get(&EntityKey::tag(id))? {
            EntityRef::Tag(t) => Some(t),
            _ => None,
        }
    }

    pub fn trigger(&self, id: &str) -> Option<&'a Trigger> {
        match self.get(&EntityKey::trigger(id))? {
            EntityRef::Trigger(t) => Some(t),
            _ => None,
        }
    }

    pub fn template(&self, id: &str) -> Option<&'a Template> {
        match self.get(&EntityKey::template(id))? {
            EntityRef::Template(t) => Some(t),
            _ => None,
        }
    }

    pub fn variable_by_name(&self, name: &str) -> Option<&'a Variable> {
        self.variables_by_name.get(name).copied()
    }

    pub fn tag_by_name(&self, name: &str) -> Option<&'a Tag> {
        self.tags_by_name.get(name).copied()
    }

    /// Names used by more than one entity of `kind`, sorted.
    pub fn duplicate_names(&self, kind: EntityKind) -> impl Iterator<Item = &str> {
        self.duplicate_names
            .get(&kind)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }
}
