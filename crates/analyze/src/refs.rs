//! Inline reference scanning and parameter-tree walking.
//!
//! Scalars reference variables by name with `{{name}}`. Structural
//! references (trigger ids, tag links) are handled by the callers.

use regex::Regex;
use std::sync::LazyLock;
use tagsync_interchange::{Condition, Parameter, ParameterValue};

static INLINE_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("valid inline reference regex"));

/// A dataLayer push of a named event inside inline script, e.g.
/// `dataLayer.push({event: 'signup'})` or `{"event": "signup"}`.
static EVENT_PUSH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"['"]?\bevent['"]?\s*:\s*['"]([^'"]+)['"]"#).expect("valid event push regex")
});

/// Variable names referenced inline in `text`, in order of appearance.
pub fn inline_references(text: &str) -> impl Iterator<Item = &str> {
    INLINE_REF_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Event names pushed to the data layer by an inline script.
pub fn pushed_events(script: &str) -> impl Iterator<Item = &str> {
    EVENT_PUSH_RE
        .captures_iter(script)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

/// One scalar reached while walking a parameter tree.
#[derive(Debug, Clone, Copy)]
pub struct ScalarVisit<'p> {
    /// Key of the top-level parameter this scalar lives under.
    pub top_key: Option<&'p str>,
    /// Whether the scalar sits inside a map entry of a list
    /// (lookup-table rows, event parameter rows).
    pub in_row: bool,
    pub location: &'p str,
    pub value: &'p str,
}

/// Walk every scalar in `params`, calling `visit` with its location.
///
/// `base` is the location prefix (`parameter`, `filter[0].parameter`).
/// Returns the location at which `max_depth` was exceeded, if it was;
/// scalars above that point have already been visited.
pub fn walk_scalars<F>(
    params: &[Parameter],
    base: &str,
    max_depth: usize,
    visit: &mut F,
) -> Result<(), String>
where
    F: FnMut(ScalarVisit<'_>),
{
    for (i, param) in params.iter().enumerate() {
        let location = format!("{}[{}]", base, i);
        walk_node(param, param.key.as_deref(), false, &location, 1, max_depth, visit)?;
    }
    Ok(())
}

/// Walk the parameters of each condition in a filter list.
pub fn walk_conditions<F>(
    conditions: &[Condition],
    base: &str,
    max_depth: usize,
    visit: &mut F,
) -> Result<(), String>
where
    F: FnMut(ScalarVisit<'_>),
{
    for (i, condition) in conditions.iter().enumerate() {
        let prefix = format!("{}[{}].parameter", base, i);
        walk_scalars(&condition.parameters, &prefix, max_depth, visit)?;
    }
    Ok(())
}

fn walk_node<F>(
    param: &Parameter,
    top_key: Option<&str>,
    in_row: bool,
    location: &str,
    depth: usize,
    max_depth: usize,
    visit: &mut F,
) -> Result<(), String>
where
    F: FnMut(ScalarVisit<'_>),
{
    if depth > max_depth {
        return Err(location.to_string());
    }
    match &param.value {
        ParameterValue::Scalar(value) => {
            let location = format!("{}.value", location);
            visit(ScalarVisit {
                top_key,
                in_row,
                location: &location,
                value,
            });
        }
        ParameterValue::List(items) => {
            for (i, item) in items.iter().enumerate() {
                let child = format!("{}.list[{}]", location, i);
                walk_node(item, top_key, in_row, &child, depth + 1, max_depth, visit)?;
            }
        }
        ParameterValue::Map(entries) => {
            for (i, entry) in entries.iter().enumerate() {
                let child = format!("{}.map[{}]", location, i);
                walk_node(entry, top_key, true, &child, depth + 1, max_depth, visit)?;
            }
        }
    }
    Ok(())
}
