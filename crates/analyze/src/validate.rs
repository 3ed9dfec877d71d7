//! Post-replication validation: did everything that was mapped arrive,
//! and does the target hold together on its own?

use crate::config::AnalyzeConfig;
use crate::index::SnapshotIndex;
use crate::integrity::check_integrity;
use crate::mapping::IdMapping;
use crate::report::{plural, EntityCounts, MissingEntity, ValidationReport, ValidationSummary};
use tagsync_interchange::{EntityKey, EntityKind, Snapshot};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

const NOT_FOUND: &str = "not found in target";

/// Validate `target` against `source` using the current time as the
/// report timestamp.
pub fn validate(
    source: &Snapshot,
    target: &Snapshot,
    mapping: &IdMapping,
    config: &AnalyzeConfig,
) -> ValidationReport {
    validate_at(source, target, mapping, config, OffsetDateTime::now_utc())
}

/// Validate with an explicit timestamp. Identical inputs give identical
/// reports.
///
/// Only mapped entities are checked for presence. Source entities that
/// were never mapped show up as warnings, not as missing.
pub fn validate_at(
    source: &Snapshot,
    target: &Snapshot,
    mapping: &IdMapping,
    config: &AnalyzeConfig,
    at: OffsetDateTime,
) -> ValidationReport {
    let source_index = SnapshotIndex::new(source);
    let target_index = SnapshotIndex::new(target);

    let missing: Vec<MissingEntity> = mapping
        .iter()
        .filter(|(original, mapped)| {
            !target_index.contains(&EntityKey::new(original.kind, mapped.new_id.as_str()))
        })
        .map(|(original, mapped)| {
            let name = if mapped.name.is_empty() {
                source_index
                    .get(original)
                    .map(|e| e.name().to_string())
                    .unwrap_or_default()
            } else {
                mapped.name.clone()
            };
            MissingEntity {
                kind: original.kind,
                original_id: original.id.clone(),
                new_id: mapped.new_id.clone(),
                name,
                reason: NOT_FOUND.to_string(),
            }
        })
        .collect();

    let broken_references = check_integrity(target, config);

    let mut warnings = Vec::new();
    for kind in EntityKind::ALL {
        let unmapped: Vec<String> = source
            .entities_of(kind)
            .into_iter()
            .filter(|e| !mapping.contains(&e.key()))
            .map(|e| format!("{} ({})", e.name(), e.id()))
            .collect();
        if !unmapped.is_empty() {
            warnings.push(format!(
                "{} source {} never mapped: {}",
                unmapped.len(),
                plural(kind),
                unmapped.join(", ")
            ));
        }
    }
    for kind in EntityKind::ALL {
        for name in target_index.duplicate_names(kind) {
            warnings.push(format!("target has more than one {} named \"{}\"", kind, name));
        }
    }

    let summary = ValidationSummary {
        expected: EntityCounts::of(source),
        actual: EntityCounts::of(target),
        mapped: mapping.len(),
        missing: missing.len(),
        broken_references: broken_references.len(),
    };
    let success = missing.is_empty() && broken_references.is_empty();
    debug!(
        success,
        missing = summary.missing,
        broken = summary.broken_references,
        "validation finished"
    );

    ValidationReport {
        timestamp: format_timestamp(at),
        success,
        summary,
        missing,
        broken_references,
        warnings,
    }
}

fn format_timestamp(at: OffsetDateTime) -> String {
    // Rfc3339 only fails for years outside 0..=9999.
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}
