//! Checks run before anything is created in the target workspace.

use crate::config::AnalyzeConfig;
use crate::refs::{self, ScalarVisit};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tagsync_interchange::{EntityKey, EntityKind, EntityRef, Snapshot};
use tracing::warn;

/// A candidate whose name is already taken in the target.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NameConflict {
    pub kind: EntityKind,
    pub name: String,
    pub candidate: EntityKey,
    pub existing: EntityKey,
}

/// An inline reference in a candidate that neither the candidates nor
/// the target can satisfy.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnresolvedDependency {
    pub entity: EntityKey,
    pub entity_name: String,
    pub reference: String,
    pub location: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PreValidation {
    pub conflicts: Vec<NameConflict>,
    pub unresolved: Vec<UnresolvedDependency>,
}

impl PreValidation {
    pub fn is_clear(&self) -> bool {
        self.conflicts.is_empty() && self.unresolved.is_empty()
    }
}

/// Compare `candidates` (about to be created) against `existing` (the
/// target as it is now).
///
/// Only `{{name}}` references are checked for resolution; trigger ids
/// and tag links carry source ids that the creation step rewrites.
pub fn pre_validate(
    candidates: &Snapshot,
    existing: &Snapshot,
    config: &AnalyzeConfig,
) -> PreValidation {
    let mut taken: HashMap<(EntityKind, &str), EntityKey> = HashMap::new();
    for entity in existing.entities() {
        taken
            .entry((entity.kind(), entity.name()))
            .or_insert_with(|| entity.key());
    }

    let conflicts = candidates
        .entities()
        .filter_map(|candidate| {
            let existing = taken.get(&(candidate.kind(), candidate.name()))?;
            Some(NameConflict {
                kind: candidate.kind(),
                name: candidate.name().to_string(),
                candidate: candidate.key(),
                existing: existing.clone(),
            })
        })
        .collect();

    let defined: HashSet<&str> = candidates
        .variables
        .iter()
        .chain(&existing.variables)
        .map(|v| v.name.as_str())
        .chain(config.integrity.builtin_variables.iter().map(String::as_str))
        .collect();

    let max_depth = config.graph.max_parameter_depth;
    let mut unresolved = Vec::new();
    let mut seen = HashSet::new();

    for entity in candidates.entities() {
        let mut visit = |v: ScalarVisit<'_>| {
            for name in refs::inline_references(v.value) {
                if defined.contains(name) {
                    continue;
                }
                if seen.insert((entity.key(), name.to_string(), v.location.to_string())) {
                    unresolved.push(UnresolvedDependency {
                        entity: entity.key(),
                        entity_name: entity.name().to_string(),
                        reference: name.to_string(),
                        location: v.location.to_string(),
                    });
                }
            }
        };

        let mut walked =
            refs::walk_scalars(entity.parameters(), "parameter", max_depth, &mut visit);
        if let EntityRef::Trigger(trigger) = entity {
            for (field, conditions) in [
                ("filter", &trigger.filter),
                ("autoEventFilter", &trigger.auto_event_filter),
                ("customEventFilter", &trigger.custom_event_filter),
            ] {
                walked = walked.and(refs::walk_conditions(conditions, field, max_depth, &mut visit));
            }
        }
        if let Err(location) = walked {
            warn!(
                entity = %entity.key(),
                %location,
                "parameter tree too deep; deeper references not checked"
            );
        }
    }

    PreValidation {
        conflicts,
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsync_interchange::{Condition, Parameter, Tag, Trigger, Variable};

    fn existing() -> Snapshot {
        Snapshot {
            tags: vec![Tag {
                id: "500".into(),
                name: "GA4 - Purchase".into(),
                ..Default::default()
            }],
            variables: vec![Variable {
                id: "600".into(),
                name: "Currency".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn same_name_same_kind_conflicts() {
        let candidates = Snapshot {
            tags: vec![Tag {
                id: "1".into(),
                name: "GA4 - Purchase".into(),
                ..Default::default()
            }],
            // same name, different kind: no conflict
            variables: vec![Variable {
                id: "2".into(),
                name: "GA4 - Purchase".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let result = pre_validate(&candidates, &existing(), &AnalyzeConfig::default());
        assert_eq!(
            result.conflicts,
            vec![NameConflict {
                kind: EntityKind::Tag,
                name: "GA4 - Purchase".into(),
                candidate: EntityKey::tag("1"),
                existing: EntityKey::tag("500"),
            }]
        );
        assert!(!result.is_clear());
    }

    #[test]
    fn references_resolve_against_candidates_target_and_builtins() {
        let candidates = Snapshot {
            tags: vec![Tag {
                id: "1".into(),
                name: "Checkout".into(),
                parameters: vec![Parameter::scalar(
                    "html",
                    "{{Order Total}} {{Currency}} {{Page URL}}",
                )],
                ..Default::default()
            }],
            variables: vec![Variable {
                id: "2".into(),
                name: "Order Total".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let result = pre_validate(&candidates, &existing(), &AnalyzeConfig::default());
        assert!(result.is_clear());
    }

    #[test]
    fn unknown_names_are_unresolved() {
        let candidates = Snapshot {
            triggers: vec![Trigger {
                id: "3".into(),
                name: "Big order".into(),
                filter: vec![Condition {
                    condition_type: "greater".into(),
                    parameters: vec![
                        Parameter::scalar("arg0", "{{Order Total}}"),
                        Parameter::scalar("arg1", "100"),
                    ],
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let result = pre_validate(&candidates, &existing(), &AnalyzeConfig::default());
        assert_eq!(result.unresolved.len(), 1);
        assert_eq!(result.unresolved[0].entity, EntityKey::trigger("3"));
        assert_eq!(result.unresolved[0].reference, "Order Total");
        assert_eq!(result.unresolved[0].location, "filter[0].parameter[0].value");
    }
}
