//! Deserialization from tag-manager export JSON into typed structs.
//!
//! The main entry point is [`from_workspace_json`], which takes a
//! `&serde_json::Value` and produces a [`Snapshot`]. Both the container
//! export layout (`tag` / `trigger` / `variable` / `customTemplate`
//! arrays, optionally wrapped in `containerVersion`) and the plural API
//! layout (`tags` / `triggers` / `variables` / `templates`) are accepted.

use crate::types::*;
use serde_json::Value;

/// Errors during snapshot deserialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The document is not a JSON object.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// An entity array is present but is not an array.
    #[error("'{field}' must be an array")]
    NotAnArray { field: String },

    /// An entity is missing a required field.
    #[error("{kind} #{index}: missing required field '{field}'")]
    MissingField {
        kind: EntityKind,
        index: usize,
        field: String,
    },
}

/// Deserialize a workspace snapshot from export JSON.
///
/// Unknown top-level and per-entity fields are ignored.
pub fn from_workspace_json(doc: &Value) -> Result<Snapshot, SnapshotError> {
    if !doc.is_object() {
        return Err(SnapshotError::InvalidSnapshot(
            "expected a JSON object".to_string(),
        ));
    }
    let root = doc.get("containerVersion").unwrap_or(doc);

    let path = WorkspacePath {
        account_id: opt_str(root, "accountId").unwrap_or_default(),
        container_id: opt_str(root, "containerId").unwrap_or_default(),
        workspace_id: opt_str(root, "workspaceId").unwrap_or_default(),
    };
    let fingerprint = opt_str(root, "fingerprint");

    let tags = entity_array(root, &["tag", "tags"])?
        .iter()
        .enumerate()
        .map(|(i, obj)| parse_tag(i, obj))
        .collect::<Result<Vec<_>, _>>()?;
    let triggers = entity_array(root, &["trigger", "triggers"])?
        .iter()
        .enumerate()
        .map(|(i, obj)| parse_trigger(i, obj))
        .collect::<Result<Vec<_>, _>>()?;
    let variables = entity_array(root, &["variable", "variables"])?
        .iter()
        .enumerate()
        .map(|(i, obj)| parse_variable(i, obj))
        .collect::<Result<Vec<_>, _>>()?;
    let templates = entity_array(root, &["customTemplate", "templates"])?
        .iter()
        .enumerate()
        .map(|(i, obj)| parse_template(i, obj))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Snapshot {
        path,
        fingerprint,
        tags,
        triggers,
        variables,
        templates,
    })
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn entity_array<'a>(root: &'a Value, fields: &[&str]) -> Result<&'a [Value], SnapshotError> {
    for field in fields {
        match root.get(*field) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(arr)) => return Ok(arr),
            Some(_) => {
                return Err(SnapshotError::NotAnArray {
                    field: (*field).to_string(),
                })
            }
        }
    }
    Ok(&[])
}

/// Read a string field, accepting numbers and booleans as their text.
fn opt_str(obj: &Value, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_str(
    obj: &Value,
    kind: EntityKind,
    index: usize,
    fields: &[&str],
) -> Result<String, SnapshotError> {
    fields
        .iter()
        .find_map(|f| opt_str(obj, f))
        .ok_or_else(|| SnapshotError::MissingField {
            kind,
            index,
            field: fields[0].to_string(),
        })
}

fn str_list(obj: &Value, field: &str) -> Vec<String> {
    obj.get(field)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a `parameter` array. Entries that are not objects are skipped.
fn parse_parameters(value: Option<&Value>) -> Vec<Parameter> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(parse_parameter).collect())
        .unwrap_or_default()
}

fn parse_parameter(obj: &Value) -> Option<Parameter> {
    if !obj.is_object() {
        return None;
    }
    let key = opt_str(obj, "key");
    let value_type = opt_str(obj, "type").unwrap_or_default();

    let value = if let Some(list) = obj.get("list") {
        ParameterValue::List(parse_parameters(Some(list)))
    } else if let Some(map) = obj.get("map") {
        ParameterValue::Map(parse_parameters(Some(map)))
    } else {
        match value_type.as_str() {
            "list" => ParameterValue::List(Vec::new()),
            "map" => ParameterValue::Map(Vec::new()),
            _ => ParameterValue::Scalar(opt_str(obj, "value").unwrap_or_default()),
        }
    };

    Some(Parameter {
        key,
        value_type,
        value,
    })
}

fn parse_conditions(value: Option<&Value>) -> Vec<Condition> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter(|c| c.is_object())
                .map(|c| Condition {
                    condition_type: opt_str(c, "type").unwrap_or_default(),
                    parameters: parse_parameters(c.get("parameter")),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_links(value: Option<&Value>) -> Vec<TagLink> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter(|l| l.is_object())
                .map(|l| TagLink {
                    tag_id: opt_str(l, "tagId"),
                    tag_name: opt_str(l, "tagName"),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_tag(index: usize, obj: &Value) -> Result<Tag, SnapshotError> {
    let kind = EntityKind::Tag;
    Ok(Tag {
        id: required_str(obj, kind, index, &["tagId", "id"])?,
        name: required_str(obj, kind, index, &["name"])?,
        tag_type: opt_str(obj, "type").unwrap_or_default(),
        parameters: parse_parameters(obj.get("parameter")),
        firing_trigger_ids: str_list(obj, "firingTriggerId"),
        blocking_trigger_ids: str_list(obj, "blockingTriggerId"),
        setup_tags: parse_links(obj.get("setupTag")),
        teardown_tags: parse_links(obj.get("teardownTag")),
        notes: opt_str(obj, "notes"),
        paused: obj.get("paused").and_then(|v| v.as_bool()).unwrap_or(false),
    })
}

fn parse_trigger(index: usize, obj: &Value) -> Result<Trigger, SnapshotError> {
    let kind = EntityKind::Trigger;
    Ok(Trigger {
        id: required_str(obj, kind, index, &["triggerId", "id"])?,
        name: required_str(obj, kind, index, &["name"])?,
        trigger_type: opt_str(obj, "type").unwrap_or_default(),
        parameters: parse_parameters(obj.get("parameter")),
        filter: parse_conditions(obj.get("filter")),
        auto_event_filter: parse_conditions(obj.get("autoEventFilter")),
        custom_event_filter: parse_conditions(obj.get("customEventFilter")),
        notes: opt_str(obj, "notes"),
    })
}

fn parse_variable(index: usize, obj: &Value) -> Result<Variable, SnapshotError> {
    let kind = EntityKind::Variable;
    Ok(Variable {
        id: required_str(obj, kind, index, &["variableId", "id"])?,
        name: required_str(obj, kind, index, &["name"])?,
        variable_type: opt_str(obj, "type").unwrap_or_default(),
        parameters: parse_parameters(obj.get("parameter")),
        notes: opt_str(obj, "notes"),
    })
}

fn parse_template(index: usize, obj: &Value) -> Result<Template, SnapshotError> {
    let kind = EntityKind::Template;
    Ok(Template {
        id: required_str(obj, kind, index, &["templateId", "id"])?,
        name: required_str(obj, kind, index, &["name"])?,
        template_data: opt_str(obj, "templateData").unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn export() -> Value {
        json!({
            "exportFormatVersion": 2,
            "containerVersion": {
                "accountId": "100",
                "containerId": "200",
                "fingerprint": "1700000000000",
                "tag": [{
                    "tagId": "7",
                    "name": "GA4 - Purchase",
                    "type": "gaawe",
                    "parameter": [
                        {"type": "template", "key": "eventName", "value": "purchase"},
                        {"type": "list", "key": "eventParameters", "list": [
                            {"type": "map", "map": [
                                {"type": "template", "key": "name", "value": "value"},
                                {"type": "template", "key": "value", "value": "{{DLV - value}}"}
                            ]}
                        ]},
                        {"type": "boolean", "key": "sendEcommerceData", "value": false}
                    ],
                    "firingTriggerId": ["3"],
                    "setupTag": [{"tagName": "Consent Init", "stopOnSetupFailure": true}],
                    "paused": true
                }],
                "trigger": [{
                    "triggerId": 3,
                    "name": "CE - purchase",
                    "type": "customEvent",
                    "customEventFilter": [{
                        "type": "equals",
                        "parameter": [
                            {"type": "template", "key": "arg0", "value": "{{_event}}"},
                            {"type": "template", "key": "arg1", "value": "purchase"}
                        ]
                    }]
                }],
                "variable": [{
                    "variableId": "11",
                    "name": "DLV - value",
                    "type": "v",
                    "parameter": [{"type": "template", "key": "name", "value": "ecommerce.value"}]
                }],
                "customTemplate": [{"templateId": "4", "name": "Vendor Pixel", "templateData": "___INFO___"}]
            }
        })
    }

    #[test]
    fn parses_container_export() {
        let snapshot = from_workspace_json(&export()).unwrap();
        assert_eq!(snapshot.path.account_id, "100");
        assert_eq!(snapshot.fingerprint.as_deref(), Some("1700000000000"));
        assert_eq!(snapshot.tags.len(), 1);
        assert_eq!(snapshot.triggers.len(), 1);
        assert_eq!(snapshot.variables.len(), 1);
        assert_eq!(snapshot.templates.len(), 1);

        let tag = &snapshot.tags[0];
        assert_eq!(tag.firing_trigger_ids, vec!["3"]);
        assert!(tag.paused);
        assert_eq!(tag.setup_tags[0].tag_name.as_deref(), Some("Consent Init"));
        assert_eq!(tag.setup_tags[0].tag_id, None);

        // Numeric ids and boolean values become text.
        assert_eq!(snapshot.triggers[0].id, "3");
        assert_eq!(
            tag.parameters[2].value,
            ParameterValue::Scalar("false".to_string())
        );
    }

    #[test]
    fn parses_nested_parameter_tree() {
        let snapshot = from_workspace_json(&export()).unwrap();
        let list = &snapshot.tags[0].parameters[1];
        let ParameterValue::List(items) = &list.value else {
            panic!("expected list, got {:?}", list.value);
        };
        let ParameterValue::Map(entries) = &items[0].value else {
            panic!("expected map");
        };
        assert_eq!(entries[1].key.as_deref(), Some("value"));
        assert_eq!(entries[1].as_scalar(), Some("{{DLV - value}}"));
    }

    #[test]
    fn parses_trigger_filters() {
        let snapshot = from_workspace_json(&export()).unwrap();
        let trigger = &snapshot.triggers[0];
        assert_eq!(trigger.custom_event_filter.len(), 1);
        assert_eq!(trigger.custom_event_filter[0].condition_type, "equals");
        assert!(trigger.filter.is_empty());
    }

    #[test]
    fn accepts_plural_layout() {
        let doc = json!({
            "tags": [],
            "triggers": [{"id": "1", "name": "All Pages", "type": "pageview"}],
            "variables": []
        });
        let snapshot = from_workspace_json(&doc).unwrap();
        assert_eq!(snapshot.triggers[0].name, "All Pages");
        assert!(snapshot.templates.is_empty());
    }

    #[test]
    fn missing_name_is_an_error() {
        let doc = json!({"variable": [{"variableId": "1", "type": "c"}]});
        let err = from_workspace_json(&doc).unwrap_err();
        assert_eq!(
            err,
            SnapshotError::MissingField {
                kind: EntityKind::Variable,
                index: 0,
                field: "name".to_string(),
            }
        );
        assert_eq!(err.to_string(), "variable #0: missing required field 'name'");
    }

    #[test]
    fn non_array_entity_field_is_an_error() {
        let doc = json!({"tag": {"tagId": "1"}});
        assert!(matches!(
            from_workspace_json(&doc),
            Err(SnapshotError::NotAnArray { .. })
        ));
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(matches!(
            from_workspace_json(&json!([1, 2])),
            Err(SnapshotError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn list_type_without_items_is_empty_list() {
        let doc = json!({"variable": [{
            "variableId": "1",
            "name": "Lookup",
            "type": "smm",
            "parameter": [{"type": "list", "key": "map"}]
        }]});
        let snapshot = from_workspace_json(&doc).unwrap();
        assert_eq!(
            snapshot.variables[0].parameters[0].value,
            ParameterValue::List(Vec::new())
        );
    }
}
