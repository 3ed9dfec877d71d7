//! Typed structs representing a tag-manager workspace snapshot.
//!
//! The four replicable entity kinds (tag, trigger, variable, template)
//! share an identity, a name, a free-form type string and a parameter
//! tree. Reference-bearing fields are kept as plain ids or links; the
//! analyzer resolves them against a snapshot index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope of a snapshot: which workspace it was read from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspacePath {
    pub account_id: String,
    pub container_id: String,
    pub workspace_id: String,
}

/// The four entity kinds that can be replicated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tag,
    Trigger,
    Variable,
    Template,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Tag,
        EntityKind::Trigger,
        EntityKind::Variable,
        EntityKind::Template,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Tag => "tag",
            EntityKind::Trigger => "trigger",
            EntityKind::Variable => "variable",
            EntityKind::Template => "template",
        }
    }

    /// Parse a kind name as used on the command line and in mapping files.
    pub fn parse(s: &str) -> Option<EntityKind> {
        match s.to_ascii_lowercase().as_str() {
            "tag" | "tags" => Some(EntityKind::Tag),
            "trigger" | "triggers" => Some(EntityKind::Trigger),
            "variable" | "variables" => Some(EntityKind::Variable),
            "template" | "templates" => Some(EntityKind::Template),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Graph identity of an entity.
///
/// Entity ids are only unique within a kind (tag 7 and trigger 7 are
/// different entities), so the kind is part of the key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        EntityKey {
            kind,
            id: id.into(),
        }
    }

    pub fn tag(id: impl Into<String>) -> Self {
        EntityKey::new(EntityKind::Tag, id)
    }

    pub fn trigger(id: impl Into<String>) -> Self {
        EntityKey::new(EntityKind::Trigger, id)
    }

    pub fn variable(id: impl Into<String>) -> Self {
        EntityKey::new(EntityKind::Variable, id)
    }

    pub fn template(id: impl Into<String>) -> Self {
        EntityKey::new(EntityKind::Template, id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

// ── Parameters ──────────────────────────────────────────────────────

/// One node of a parameter tree.
///
/// List items usually carry no key; map entries and top-level
/// parameters do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// The export's parameter type string (`template`, `boolean`,
    /// `list`, `map`, `tagReference`, ...).
    #[serde(default)]
    pub value_type: String,
    pub value: ParameterValue,
}

/// Payload of a parameter node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    Scalar(String),
    List(Vec<Parameter>),
    Map(Vec<Parameter>),
}

impl Parameter {
    pub fn scalar(key: impl Into<String>, value: impl Into<String>) -> Self {
        Parameter {
            key: Some(key.into()),
            value_type: "template".to_string(),
            value: ParameterValue::Scalar(value.into()),
        }
    }

    pub fn list(key: impl Into<String>, items: Vec<Parameter>) -> Self {
        Parameter {
            key: Some(key.into()),
            value_type: "list".to_string(),
            value: ParameterValue::List(items),
        }
    }

    pub fn map(key: Option<&str>, entries: Vec<Parameter>) -> Self {
        Parameter {
            key: key.map(str::to_owned),
            value_type: "map".to_string(),
            value: ParameterValue::Map(entries),
        }
    }

    /// The scalar value, if this node is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match &self.value {
            ParameterValue::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

/// Find a top-level parameter by key and return its scalar value.
pub fn scalar_param<'a>(params: &'a [Parameter], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|p| p.key.as_deref() == Some(key))
        .and_then(Parameter::as_scalar)
}

/// A single trigger filter condition (`equals`, `contains`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    pub condition_type: String,
    pub parameters: Vec<Parameter>,
}

/// A setup or teardown link from one tag to another.
///
/// Exports normally carry only the linked tag's name; ids appear when
/// the link was produced by the API rather than the UI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
}

// ── Entities ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub tag_type: String,
    pub parameters: Vec<Parameter>,
    pub firing_trigger_ids: Vec<String>,
    pub blocking_trigger_ids: Vec<String>,
    pub setup_tags: Vec<TagLink>,
    pub teardown_tags: Vec<TagLink>,
    pub notes: Option<String>,
    pub paused: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trigger {
    pub id: String,
    pub name: String,
    pub trigger_type: String,
    pub parameters: Vec<Parameter>,
    pub filter: Vec<Condition>,
    pub auto_event_filter: Vec<Condition>,
    pub custom_event_filter: Vec<Condition>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub variable_type: String,
    pub parameters: Vec<Parameter>,
    pub notes: Option<String>,
}

/// A custom template. Tags built on it have type `cvt_<container>_<id>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    pub id: String,
    pub name: String,
    /// Opaque template source, carried for replication only.
    pub template_data: String,
}

/// Borrowed view over any one entity of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef<'a> {
    Tag(&'a Tag),
    Trigger(&'a Trigger),
    Variable(&'a Variable),
    Template(&'a Template),
}

impl<'a> EntityRef<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Tag(_) => EntityKind::Tag,
            EntityRef::Trigger(_) => EntityKind::Trigger,
            EntityRef::Variable(_) => EntityKind::Variable,
            EntityRef::Template(_) => EntityKind::Template,
        }
    }

    pub fn id(&self) -> &'a str {
        match self {
            EntityRef::Tag(t) => &t.id,
            EntityRef::Trigger(t) => &t.id,
            EntityRef::Variable(v) => &v.id,
            EntityRef::Template(t) => &t.id,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), self.id())
    }

    pub fn name(&self) -> &'a str {
        match self {
            EntityRef::Tag(t) => &t.name,
            EntityRef::Trigger(t) => &t.name,
            EntityRef::Variable(v) => &v.name,
            EntityRef::Template(t) => &t.name,
        }
    }

    /// The type discriminator. Templates have none and report `"template"`.
    pub fn entity_type(&self) -> &'a str {
        match self {
            EntityRef::Tag(t) => &t.tag_type,
            EntityRef::Trigger(t) => &t.trigger_type,
            EntityRef::Variable(v) => &v.variable_type,
            EntityRef::Template(_) => "template",
        }
    }

    pub fn parameters(&self) -> &'a [Parameter] {
        match self {
            EntityRef::Tag(t) => &t.parameters,
            EntityRef::Trigger(t) => &t.parameters,
            EntityRef::Variable(v) => &v.parameters,
            EntityRef::Template(_) => &[],
        }
    }

    pub fn notes(&self) -> Option<&'a str> {
        match self {
            EntityRef::Tag(t) => t.notes.as_deref(),
            EntityRef::Trigger(t) => t.notes.as_deref(),
            EntityRef::Variable(v) => v.notes.as_deref(),
            EntityRef::Template(_) => None,
        }
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

/// A complete, de-paginated entity snapshot of one workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub path: WorkspacePath,
    /// Opaque version marker of the workspace at fetch time.
    pub fingerprint: Option<String>,
    pub tags: Vec<Tag>,
    pub triggers: Vec<Trigger>,
    pub variables: Vec<Variable>,
    pub templates: Vec<Template>,
}

impl Snapshot {
    /// All entities, in kind order (tags, triggers, variables, templates)
    /// and input order within a kind.
    pub fn entities(&self) -> impl Iterator<Item = EntityRef<'_>> {
        self.tags
            .iter()
            .map(EntityRef::Tag)
            .chain(self.triggers.iter().map(EntityRef::Trigger))
            .chain(self.variables.iter().map(EntityRef::Variable))
            .chain(self.templates.iter().map(EntityRef::Template))
    }

    /// Entities of one kind, in input order.
    pub fn entities_of(&self, kind: EntityKind) -> Vec<EntityRef<'_>> {
        match kind {
            EntityKind::Tag => self.tags.iter().map(EntityRef::Tag).collect(),
            EntityKind::Trigger => self.triggers.iter().map(EntityRef::Trigger).collect(),
            EntityKind::Variable => self.variables.iter().map(EntityRef::Variable).collect(),
            EntityKind::Template => self.templates.iter().map(EntityRef::Template).collect(),
        }
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Tag => self.tags.len(),
            EntityKind::Trigger => self.triggers.len(),
            EntityKind::Variable => self.variables.len(),
            EntityKind::Template => self.templates.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len() + self.triggers.len() + self.variables.len() + self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
