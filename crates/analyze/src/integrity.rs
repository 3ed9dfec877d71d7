//! Referential integrity of one snapshot.
//!
//! Every reference an entity makes must resolve inside the same
//! snapshot: trigger ids on tags, setup/teardown links, and `{{name}}`
//! references anywhere in parameter trees and trigger filters. Names in
//! [`IntegrityConfig`] count as always defined.

use crate::config::{AnalyzeConfig, IntegrityConfig};
use crate::extract::resolve_link;
use crate::index::SnapshotIndex;
use crate::refs::{self, ScalarVisit};
use serde::Serialize;
use std::collections::HashSet;
use tagsync_interchange::{EntityKey, EntityRef, Snapshot, Tag, Trigger};
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingTrigger,
    MissingVariable,
    MissingTag,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::MissingTrigger => "missing_trigger",
            IssueKind::MissingVariable => "missing_variable",
            IssueKind::MissingTag => "missing_tag",
        }
    }
}

/// A reference that does not resolve in the checked snapshot.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BrokenReference {
    pub kind: IssueKind,
    /// The entity holding the reference.
    pub entity: EntityKey,
    pub entity_name: String,
    /// The trigger id, tag id/name or variable name that failed to resolve.
    pub reference: String,
    pub location: String,
}

/// Check every entity in `snapshot`. Issues come out in entity order
/// (tags, triggers, variables) and field order within an entity.
pub fn check_integrity(snapshot: &Snapshot, config: &AnalyzeConfig) -> Vec<BrokenReference> {
    let index = SnapshotIndex::new(snapshot);
    let mut checker = Checker {
        index: &index,
        builtins: &config.integrity,
        max_depth: config.graph.max_parameter_depth,
        issues: Vec::new(),
        seen: HashSet::new(),
    };

    for entity in snapshot.entities() {
        match entity {
            EntityRef::Tag(tag) => checker.check_tag(tag),
            EntityRef::Trigger(trigger) => checker.check_trigger(trigger),
            EntityRef::Variable(variable) => {
                checker.check_parameters(entity, &variable.parameters, "parameter")
            }
            EntityRef::Template(_) => {}
        }
    }

    checker.issues
}

struct Checker<'i, 'a> {
    index: &'i SnapshotIndex<'a>,
    builtins: &'i IntegrityConfig,
    max_depth: usize,
    issues: Vec<BrokenReference>,
    seen: HashSet<(EntityKey, IssueKind, String, String)>,
}

impl Checker<'_, '_> {
    fn report(&mut self, entity: EntityRef<'_>, kind: IssueKind, reference: &str, location: &str) {
        let id = (
            entity.key(),
            kind,
            reference.to_string(),
            location.to_string(),
        );
        if !self.seen.insert(id) {
            return;
        }
        self.issues.push(BrokenReference {
            kind,
            entity: entity.key(),
            entity_name: entity.name().to_string(),
            reference: reference.to_string(),
            location: location.to_string(),
        });
    }

    fn check_tag(&mut self, tag: &Tag) {
        let entity = EntityRef::Tag(tag);
        self.check_parameters(entity, &tag.parameters, "parameter");

        for (field, ids) in [
            ("firingTriggerId", &tag.firing_trigger_ids),
            ("blockingTriggerId", &tag.blocking_trigger_ids),
        ] {
            for (i, id) in ids.iter().enumerate() {
                let known = self.index.trigger(id).is_some()
                    || self.builtins.builtin_trigger_ids.contains(id);
                if !known {
                    self.report(
                        entity,
                        IssueKind::MissingTrigger,
                        id,
                        &format!("{}[{}]", field, i),
                    );
                }
            }
        }

        for (field, links) in [
            ("setupTag", &tag.setup_tags),
            ("teardownTag", &tag.teardown_tags),
        ] {
            for (i, link) in links.iter().enumerate() {
                let location = format!("{}[{}]", field, i);
                match resolve_link(link, self.index, &location) {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        let reference = link
                            .tag_id
                            .as_deref()
                            .or(link.tag_name.as_deref())
                            .unwrap_or_default();
                        self.report(entity, IssueKind::MissingTag, reference, &location);
                    }
                    Err(e) => {
                        warn!(entity = %entity.key(), error = %e, "skipping malformed tag link")
                    }
                }
            }
        }
    }

    fn check_trigger(&mut self, trigger: &Trigger) {
        let entity = EntityRef::Trigger(trigger);
        self.check_parameters(entity, &trigger.parameters, "parameter");
        for (field, conditions) in [
            ("filter", &trigger.filter),
            ("autoEventFilter", &trigger.auto_event_filter),
            ("customEventFilter", &trigger.custom_event_filter),
        ] {
            let mut unresolved = Vec::new();
            let walked = refs::walk_conditions(
                conditions,
                field,
                self.max_depth,
                &mut |v: ScalarVisit<'_>| self.collect_unresolved(entity, &v, &mut unresolved),
            );
            self.finish_walk(entity, walked, unresolved);
        }
    }

    fn check_parameters(
        &mut self,
        entity: EntityRef<'_>,
        params: &[tagsync_interchange::Parameter],
        base: &str,
    ) {
        let mut unresolved = Vec::new();
        let walked = refs::walk_scalars(
            params,
            base,
            self.max_depth,
            &mut |v: ScalarVisit<'_>| self.collect_unresolved(entity, &v, &mut unresolved),
        );
        self.finish_walk(entity, walked, unresolved);
    }

    /// Names in one scalar that resolve to no variable. A variable
    /// naming itself is not a broken reference.
    fn collect_unresolved(
        &self,
        entity: EntityRef<'_>,
        visit: &ScalarVisit<'_>,
        unresolved: &mut Vec<(String, String)>,
    ) {
        for name in refs::inline_references(visit.value) {
            if matches!(entity, EntityRef::Variable(v) if v.name == name) {
                continue;
            }
            if self.index.variable_by_name(name).is_none()
                && !self.builtins.builtin_variables.contains(name)
            {
                unresolved.push((name.to_string(), visit.location.to_string()));
            }
        }
    }

    fn finish_walk(
        &mut self,
        entity: EntityRef<'_>,
        walked: Result<(), String>,
        unresolved: Vec<(String, String)>,
    ) {
        for (name, location) in unresolved {
            self.report(entity, IssueKind::MissingVariable, &name, &location);
        }
        if let Err(location) = walked {
            warn!(
                entity = %entity.key(),
                %location,
                max_depth = self.max_depth,
                "parameter tree too deep; deeper references not checked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsync_interchange::{Condition, Parameter, TagLink, Variable};

    fn target() -> Snapshot {
        Snapshot {
            tags: vec![Tag {
                id: "101".into(),
                name: "T1".into(),
                tag_type: "html".into(),
                parameters: vec![Parameter::scalar("html", "<script>{{V1}} {{Page URL}}</script>")],
                firing_trigger_ids: vec!["201".into(), "2147479553".into()],
                ..Default::default()
            }],
            triggers: vec![Trigger {
                id: "201".into(),
                name: "G1".into(),
                trigger_type: "pageview".into(),
                ..Default::default()
            }],
            variables: vec![Variable {
                id: "301".into(),
                name: "V1".into(),
                variable_type: "v".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn clean_snapshot_has_no_issues() {
        assert!(check_integrity(&target(), &AnalyzeConfig::default()).is_empty());
    }

    #[test]
    fn unresolved_inline_reference_is_missing_variable() {
        let mut snapshot = target();
        snapshot.variables.clear();
        let issues = check_integrity(&snapshot, &AnalyzeConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::MissingVariable);
        assert_eq!(issues[0].entity, EntityKey::tag("101"));
        assert_eq!(issues[0].reference, "V1");
        assert_eq!(issues[0].location, "parameter[0].value");
    }

    #[test]
    fn unknown_firing_and_blocking_triggers() {
        let mut snapshot = target();
        snapshot.tags[0].firing_trigger_ids.push("999".into());
        snapshot.tags[0].blocking_trigger_ids.push("998".into());
        let issues = check_integrity(&snapshot, &AnalyzeConfig::default());
        let found: Vec<(&str, &str)> = issues
            .iter()
            .map(|i| (i.reference.as_str(), i.location.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![("999", "firingTriggerId[2]"), ("998", "blockingTriggerId[0]")]
        );
        assert!(issues.iter().all(|i| i.kind == IssueKind::MissingTrigger));
    }

    #[test]
    fn setup_link_by_name_must_resolve() {
        let mut snapshot = target();
        snapshot.tags[0].setup_tags.push(TagLink {
            tag_id: None,
            tag_name: Some("Consent".into()),
        });
        let issues = check_integrity(&snapshot, &AnalyzeConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::MissingTag);
        assert_eq!(issues[0].reference, "Consent");
        assert_eq!(issues[0].location, "setupTag[0]");
    }

    #[test]
    fn trigger_filters_are_scanned() {
        let mut snapshot = target();
        snapshot.triggers[0].filter.push(Condition {
            condition_type: "contains".into(),
            parameters: vec![
                Parameter::scalar("arg0", "{{Gone}}"),
                Parameter::scalar("arg1", "checkout"),
            ],
        });
        let issues = check_integrity(&snapshot, &AnalyzeConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].entity, EntityKey::trigger("201"));
        assert_eq!(issues[0].location, "filter[0].parameter[0].value");
    }

    #[test]
    fn event_filters_are_scanned() {
        let mut snapshot = target();
        snapshot.triggers[0].custom_event_filter.push(Condition {
            condition_type: "equals".into(),
            parameters: vec![
                Parameter::scalar("arg0", "{{_event}}"),
                Parameter::scalar("arg1", "{{X}}"),
            ],
        });
        snapshot.triggers[0].auto_event_filter.push(Condition {
            condition_type: "contains".into(),
            parameters: vec![Parameter::scalar("arg0", "{{Widget Id}}")],
        });
        let config = AnalyzeConfig::default();
        assert!(config.integrity.builtin_variables.contains("_event"));

        let issues = check_integrity(&snapshot, &config);
        let found: Vec<(&str, &str)> = issues
            .iter()
            .map(|i| (i.reference.as_str(), i.location.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("Widget Id", "autoEventFilter[0].parameter[0].value"),
                ("X", "customEventFilter[0].parameter[1].value"),
            ]
        );
        assert!(issues.iter().all(|i| i.kind == IssueKind::MissingVariable));
    }

    #[test]
    fn variable_self_reference_is_not_flagged() {
        let mut snapshot = target();
        snapshot.variables[0].parameters =
            vec![Parameter::scalar("javascript", "function(){ return {{V1}}; }")];
        assert!(check_integrity(&snapshot, &AnalyzeConfig::default()).is_empty());
    }

    #[test]
    fn repeated_reference_in_one_scalar_reports_once() {
        let mut snapshot = target();
        snapshot.tags[0].parameters = vec![Parameter::scalar("html", "{{X}} {{X}}")];
        let issues = check_integrity(&snapshot, &AnalyzeConfig::default());
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn custom_builtins_are_honoured() {
        let mut snapshot = target();
        snapshot.tags[0].parameters = vec![Parameter::scalar("html", "{{Client Name}}")];
        let mut config = AnalyzeConfig::default();
        assert_eq!(check_integrity(&snapshot, &config).len(), 1);
        config
            .integrity
            .builtin_variables
            .insert("Client Name".to_string());
        assert!(check_integrity(&snapshot, &config).is_empty());
    }
}
