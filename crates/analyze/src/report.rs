//! ValidationReport: the outcome of comparing a source snapshot with the
//! target produced from it, and its plain-text rendering.

use crate::integrity::BrokenReference;
use serde::Serialize;
use tagsync_interchange::{EntityKind, Snapshot};

/// Per-kind entity counts.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct EntityCounts {
    pub tags: usize,
    pub triggers: usize,
    pub variables: usize,
    pub templates: usize,
}

impl EntityCounts {
    pub fn of(snapshot: &Snapshot) -> Self {
        EntityCounts {
            tags: snapshot.count(EntityKind::Tag),
            triggers: snapshot.count(EntityKind::Trigger),
            variables: snapshot.count(EntityKind::Variable),
            templates: snapshot.count(EntityKind::Template),
        }
    }

    pub fn get(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Tag => self.tags,
            EntityKind::Trigger => self.triggers,
            EntityKind::Variable => self.variables,
            EntityKind::Template => self.templates,
        }
    }

    pub fn total(&self) -> usize {
        self.tags + self.triggers + self.variables + self.templates
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Counts in the source snapshot.
    pub expected: EntityCounts,
    /// Counts in the target snapshot.
    pub actual: EntityCounts,
    pub mapped: usize,
    pub missing: usize,
    pub broken_references: usize,
}

/// A mapped entity whose new id is absent from the target.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MissingEntity {
    pub kind: EntityKind,
    pub original_id: String,
    pub new_id: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationReport {
    /// RFC 3339.
    pub timestamp: String,
    /// True iff there are no missing entities and no broken references.
    pub success: bool,
    pub summary: ValidationSummary,
    pub missing: Vec<MissingEntity>,
    pub broken_references: Vec<BrokenReference>,
    pub warnings: Vec<String>,
}

/// Render a report as plain text.
///
/// Sections always appear, in this order: header, summary, missing
/// entities, broken references, warnings. Empty sections say `(none)`.
pub fn render_report(report: &ValidationReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    section(&mut lines, "Validation report", '=');
    lines.push(format!("Timestamp: {}", report.timestamp));
    lines.push(format!(
        "Result:    {}",
        if report.success { "PASSED" } else { "FAILED" }
    ));
    lines.push(String::new());

    let summary = &report.summary;
    section(&mut lines, "Summary", '-');
    lines.push(format!("{:<12}{:>10}{:>10}", "", "expected", "actual"));
    for kind in EntityKind::ALL {
        lines.push(format!(
            "{:<12}{:>10}{:>10}",
            plural(kind),
            summary.expected.get(kind),
            summary.actual.get(kind)
        ));
    }
    lines.push(format!(
        "{:<12}{:>10}{:>10}",
        "total",
        summary.expected.total(),
        summary.actual.total()
    ));
    lines.push(format!("Mapped:            {}", summary.mapped));
    lines.push(format!("Missing entities:  {}", summary.missing));
    lines.push(format!("Broken references: {}", summary.broken_references));
    lines.push(String::new());

    section(&mut lines, "Missing entities", '-');
    if report.missing.is_empty() {
        lines.push("(none)".to_string());
    }
    for m in &report.missing {
        lines.push(format!(
            "- {} {} \"{}\" -> {}: {}",
            m.kind, m.original_id, m.name, m.new_id, m.reason
        ));
    }
    lines.push(String::new());

    section(&mut lines, "Broken references", '-');
    if report.broken_references.is_empty() {
        lines.push("(none)".to_string());
    }
    for b in &report.broken_references {
        lines.push(format!(
            "- [{}] {} \"{}\" -> {} at {}",
            b.kind.as_str(),
            b.entity,
            b.entity_name,
            b.reference,
            b.location
        ));
    }
    lines.push(String::new());

    section(&mut lines, "Warnings", '-');
    if report.warnings.is_empty() {
        lines.push("(none)".to_string());
    }
    for w in &report.warnings {
        lines.push(format!("- {}", w));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn section(lines: &mut Vec<String>, title: &str, underline: char) {
    lines.push(title.to_string());
    lines.push(underline.to_string().repeat(title.len()));
}

pub(crate) fn plural(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Tag => "tags",
        EntityKind::Trigger => "triggers",
        EntityKind::Variable => "variables",
        EntityKind::Template => "templates",
    }
}
