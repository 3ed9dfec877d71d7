//! Dependency extraction for a single entity.
//!
//! Scans one entity's parameter tree, trigger filters, firing/blocking
//! trigger lists and setup/teardown links, and emits typed edges to the
//! entities it depends on. Only resolvable references become edges;
//! unresolved names are the integrity checker's concern.

use crate::config::GraphConfig;
use crate::index::SnapshotIndex;
use crate::refs::{self, ScalarVisit};
use serde::Serialize;
use std::collections::HashSet;
use tagsync_interchange::{
    scalar_param, Condition, EntityKey, EntityKind, EntityRef, Tag, TagLink, Trigger,
};

/// Why one entity depends on another.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// A variable referencing another variable inside its own definition.
    VariableReference,
    TriggerCondition,
    ParameterValue,
    InlineScript,
    LookupTableInput,
    LookupTableOutput,
    TemplateParameter,
    /// A tag built on a custom template.
    CustomTemplate,
    ConfigTag,
    SetupTag,
    TeardownTag,
    FiringTrigger,
    BlockingTrigger,
    /// Reverse edge: the target tag pushes the event the owner consumes.
    EventPusher,
}

impl DependencyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DependencyKind::VariableReference => "variable_reference",
            DependencyKind::TriggerCondition => "trigger_condition",
            DependencyKind::ParameterValue => "parameter_value",
            DependencyKind::InlineScript => "inline_script",
            DependencyKind::LookupTableInput => "lookup_table_input",
            DependencyKind::LookupTableOutput => "lookup_table_output",
            DependencyKind::TemplateParameter => "template_parameter",
            DependencyKind::CustomTemplate => "custom_template",
            DependencyKind::ConfigTag => "config_tag",
            DependencyKind::SetupTag => "setup_tag",
            DependencyKind::TeardownTag => "teardown_tag",
            DependencyKind::FiringTrigger => "firing_trigger",
            DependencyKind::BlockingTrigger => "blocking_trigger",
            DependencyKind::EventPusher => "event_pusher",
        }
    }
}

/// A typed edge from the owning entity to one of its dependencies.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DependencyEdge {
    pub target: EntityKey,
    pub target_name: String,
    pub kind: DependencyKind,
    /// Path into the owner's structure, for diagnostics only.
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Malformed entity structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("parameter tree nested deeper than {max_depth} levels at {location}")]
    TooDeep { location: String, max_depth: usize },

    #[error("{location}: tag link has neither a tag id nor a tag name")]
    EmptyLink { location: String },
}

/// Prefix of tag types built on a custom template: `cvt_<container>_<template id>`.
const CUSTOM_TEMPLATE_PREFIX: &str = "cvt_";

/// Extract every dependency edge of `entity`, deduplicated by
/// `(target, kind, location)` and kept in discovery order.
pub fn extract_dependencies(
    entity: EntityRef<'_>,
    index: &SnapshotIndex<'_>,
    config: &GraphConfig,
) -> Result<Vec<DependencyEdge>, ExtractError> {
    let mut edges = EdgeSet::default();

    match entity {
        EntityRef::Tag(tag) => extract_tag(tag, index, config, &mut edges)?,
        EntityRef::Trigger(trigger) => extract_trigger(trigger, index, config, &mut edges)?,
        EntityRef::Variable(variable) => {
            let owner = variable.name.as_str();
            scan_parameters(
                &variable.parameters,
                "parameter",
                Context::Variable { owner },
                index,
                config,
                &mut edges,
            )?;
        }
        EntityRef::Template(_) => {}
    }

    Ok(edges.into_vec())
}

#[derive(Default)]
struct EdgeSet {
    edges: Vec<DependencyEdge>,
    seen: HashSet<(EntityKey, DependencyKind, String)>,
}

impl EdgeSet {
    fn push(&mut self, edge: DependencyEdge) {
        let id = (edge.target.clone(), edge.kind, edge.location.clone());
        if self.seen.insert(id) {
            self.edges.push(edge);
        }
    }

    fn into_vec(self) -> Vec<DependencyEdge> {
        self.edges
    }
}

/// Where a parameter tree lives; decides the kind of inline edges.
#[derive(Clone, Copy)]
enum Context<'n> {
    Tag { custom_template: bool },
    Variable { owner: &'n str },
    TriggerParameters,
    TriggerFilter,
}

fn inline_kind(context: Context<'_>, visit: &ScalarVisit<'_>) -> DependencyKind {
    let top_key = visit.top_key.unwrap_or("");
    if matches!(top_key, "html" | "javascript") {
        return DependencyKind::InlineScript;
    }
    match context {
        Context::Variable { .. } => match top_key {
            "input" => DependencyKind::LookupTableInput,
            "map" if visit.in_row => DependencyKind::LookupTableOutput,
            _ => DependencyKind::VariableReference,
        },
        Context::TriggerFilter => DependencyKind::TriggerCondition,
        Context::Tag {
            custom_template: true,
        } => DependencyKind::TemplateParameter,
        Context::Tag { .. } | Context::TriggerParameters => DependencyKind::ParameterValue,
    }
}

fn scan_parameters(
    params: &[tagsync_interchange::Parameter],
    base: &str,
    context: Context<'_>,
    index: &SnapshotIndex<'_>,
    config: &GraphConfig,
    edges: &mut EdgeSet,
) -> Result<(), ExtractError> {
    let mut visit = |v: ScalarVisit<'_>| record_inline(context, &v, index, edges);
    refs::walk_scalars(params, base, config.max_parameter_depth, &mut visit)
        .map_err(|location| too_deep(location, config))
}

fn scan_conditions(
    conditions: &[Condition],
    base: &str,
    index: &SnapshotIndex<'_>,
    config: &GraphConfig,
    edges: &mut EdgeSet,
) -> Result<(), ExtractError> {
    let mut visit = |v: ScalarVisit<'_>| record_inline(Context::TriggerFilter, &v, index, edges);
    refs::walk_conditions(conditions, base, config.max_parameter_depth, &mut visit)
        .map_err(|location| too_deep(location, config))
}

/// Add an edge for every inline reference in one scalar that names a
/// variable of the universe.
fn record_inline(
    context: Context<'_>,
    visit: &ScalarVisit<'_>,
    index: &SnapshotIndex<'_>,
    edges: &mut EdgeSet,
) {
    let kind = inline_kind(context, visit);
    for name in refs::inline_references(visit.value) {
        if let Context::Variable { owner } = context {
            if owner == name {
                continue;
            }
        }
        if let Some(variable) = index.variable_by_name(name) {
            edges.push(DependencyEdge {
                target: EntityKey::variable(&variable.id),
                target_name: variable.name.clone(),
                kind,
                location: visit.location.to_string(),
                note: None,
            });
        }
    }
}

fn too_deep(location: String, config: &GraphConfig) -> ExtractError {
    ExtractError::TooDeep {
        location,
        max_depth: config.max_parameter_depth,
    }
}

// ── Tags ────────────────────────────────────────────────────────────

fn extract_tag(
    tag: &Tag,
    index: &SnapshotIndex<'_>,
    config: &GraphConfig,
    edges: &mut EdgeSet,
) -> Result<(), ExtractError> {
    let template_id = custom_template_id(&tag.tag_type);

    scan_parameters(
        &tag.parameters,
        "parameter",
        Context::Tag {
            custom_template: template_id.is_some(),
        },
        index,
        config,
        edges,
    )?;

    for (field, ids, kind) in [
        (
            "firingTriggerId",
            &tag.firing_trigger_ids,
            DependencyKind::FiringTrigger,
        ),
        (
            "blockingTriggerId",
            &tag.blocking_trigger_ids,
            DependencyKind::BlockingTrigger,
        ),
    ] {
        for (i, id) in ids.iter().enumerate() {
            if let Some(trigger) = index.trigger(id) {
                edges.push(DependencyEdge {
                    target: EntityKey::trigger(&trigger.id),
                    target_name: trigger.name.clone(),
                    kind,
                    location: format!("{}[{}]", field, i),
                    note: None,
                });
            }
        }
    }

    for (field, links, kind) in [
        ("setupTag", &tag.setup_tags, DependencyKind::SetupTag),
        ("teardownTag", &tag.teardown_tags, DependencyKind::TeardownTag),
    ] {
        for (i, link) in links.iter().enumerate() {
            let location = format!("{}[{}]", field, i);
            if let Some(linked) = resolve_link(link, index, &location)? {
                edges.push(DependencyEdge {
                    target: EntityKey::tag(&linked.id),
                    target_name: linked.name.clone(),
                    kind,
                    location,
                    note: None,
                });
            }
        }
    }

    if let Some(template_id) = template_id {
        if let Some(template) = index.template(template_id) {
            edges.push(DependencyEdge {
                target: EntityKey::template(&template.id),
                target_name: template.name.clone(),
                kind: DependencyKind::CustomTemplate,
                location: "type".to_string(),
                note: Some(tag.tag_type.clone()),
            });
        }
    }

    if config
        .config_dependent_tag_types
        .iter()
        .any(|t| *t == tag.tag_type)
    {
        for key in &config.config_reference_keys {
            let Some(reference) = scalar_param(&tag.parameters, key) else {
                continue;
            };
            if let Some(config_tag) = resolve_config_tag(reference, tag, index, config) {
                let location = tag
                    .parameters
                    .iter()
                    .position(|p| p.key.as_deref() == Some(key.as_str()))
                    .map(|i| format!("parameter[{}].value", i))
                    .unwrap_or_else(|| key.clone());
                edges.push(DependencyEdge {
                    target: EntityKey::tag(&config_tag.id),
                    target_name: config_tag.name.clone(),
                    kind: DependencyKind::ConfigTag,
                    location,
                    note: Some(format!("{} = {}", key, reference)),
                });
            }
        }
    }

    Ok(())
}

/// A setup/teardown link resolves by id when it has one, else by name.
pub(crate) fn resolve_link<'a>(
    link: &TagLink,
    index: &SnapshotIndex<'a>,
    location: &str,
) -> Result<Option<&'a Tag>, ExtractError> {
    match (&link.tag_id, &link.tag_name) {
        (Some(id), _) => Ok(index.tag(id)),
        (None, Some(name)) => Ok(index.tag_by_name(name)),
        (None, None) => Err(ExtractError::EmptyLink {
            location: location.to_string(),
        }),
    }
}

/// `cvt_12345_67` → `67`.
pub(crate) fn custom_template_id(tag_type: &str) -> Option<&str> {
    let rest = tag_type.strip_prefix(CUSTOM_TEMPLATE_PREFIX)?;
    let (_, id) = rest.rsplit_once('_')?;
    (!id.is_empty()).then_some(id)
}

/// Resolve a measurement reference: a tag id, a tag name, or the
/// measurement id configured on one of the configuration tags.
fn resolve_config_tag<'a>(
    reference: &str,
    owner: &Tag,
    index: &SnapshotIndex<'a>,
    config: &GraphConfig,
) -> Option<&'a Tag> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    let candidate = index
        .tag(reference)
        .or_else(|| index.tag_by_name(reference))
        .or_else(|| {
            index.snapshot().tags.iter().find(|t| {
                config.config_tag_types.iter().any(|ct| *ct == t.tag_type)
                    && ["tagId", "measurementId"]
                        .iter()
                        .any(|k| scalar_param(&t.parameters, k) == Some(reference))
            })
        })?;
    (candidate.id != owner.id).then_some(candidate)
}

// ── Triggers ────────────────────────────────────────────────────────

fn extract_trigger(
    trigger: &Trigger,
    index: &SnapshotIndex<'_>,
    config: &GraphConfig,
    edges: &mut EdgeSet,
) -> Result<(), ExtractError> {
    scan_parameters(
        &trigger.parameters,
        "parameter",
        Context::TriggerParameters,
        index,
        config,
        edges,
    )?;
    scan_conditions(&trigger.filter, "filter", index, config, edges)?;
    scan_conditions(
        &trigger.auto_event_filter,
        "autoEventFilter",
        index,
        config,
        edges,
    )?;
    scan_conditions(
        &trigger.custom_event_filter,
        "customEventFilter",
        index,
        config,
        edges,
    )?;

    if config.include_event_pushers {
        if let Some((i, event)) = custom_event_name(trigger) {
            for tag in &index.snapshot().tags {
                if pushes_event(tag, event) {
                    edges.push(DependencyEdge {
                        target: EntityKey::tag(&tag.id),
                        target_name: tag.name.clone(),
                        kind: DependencyKind::EventPusher,
                        location: format!("customEventFilter[{}]", i),
                        note: Some(format!("pushes event '{}'", event)),
                    });
                }
            }
        }
    }

    Ok(())
}

/// The event a custom-event trigger listens for: the `arg1` of the
/// custom event filter whose `arg0` is `{{_event}}`.
pub(crate) fn custom_event_name(trigger: &Trigger) -> Option<(usize, &str)> {
    if trigger.trigger_type != "customEvent" {
        return None;
    }
    trigger
        .custom_event_filter
        .iter()
        .enumerate()
        .find_map(|(i, condition)| {
            let arg0 = scalar_param(&condition.parameters, "arg0")?;
            if refs::inline_references(arg0).any(|name| name == "_event") {
                scalar_param(&condition.parameters, "arg1").map(|event| (i, event))
            } else {
                None
            }
        })
}

fn pushes_event(tag: &Tag, event: &str) -> bool {
    ["html", "javascript"].iter().any(|key| {
        scalar_param(&tag.parameters, key)
            .map(|script| refs::pushed_events(script).any(|e| e == event))
            .unwrap_or(false)
    })
}

/// The single entity kind an edge kind can point at.
pub fn target_kind(kind: DependencyKind) -> EntityKind {
    match kind {
        DependencyKind::VariableReference
        | DependencyKind::TriggerCondition
        | DependencyKind::ParameterValue
        | DependencyKind::InlineScript
        | DependencyKind::LookupTableInput
        | DependencyKind::LookupTableOutput
        | DependencyKind::TemplateParameter => EntityKind::Variable,
        DependencyKind::FiringTrigger | DependencyKind::BlockingTrigger => EntityKind::Trigger,
        DependencyKind::ConfigTag
        | DependencyKind::SetupTag
        | DependencyKind::TeardownTag
        | DependencyKind::EventPusher => EntityKind::Tag,
        DependencyKind::CustomTemplate => EntityKind::Template,
    }
}
