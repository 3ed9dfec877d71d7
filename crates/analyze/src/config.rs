//! Analyzer configuration.
//!
//! Every section has a usable default, so an empty TOML document (or
//! no document at all) yields [`AnalyzeConfig::default()`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Errors from configuration checks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be a finite, non-negative number (got {value})")]
    InvalidThreshold { field: &'static str, value: f64 },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

/// Top-level configuration for graph building, integrity checks and matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzeConfig {
    pub graph: GraphConfig,
    pub integrity: IntegrityConfig,
    pub matching: MatchDefaults,
}

impl AnalyzeConfig {
    /// Check numeric settings. Called by front ends after loading a file.
    pub fn check(&self) -> Result<(), ConfigError> {
        check_threshold("matching.search_threshold", self.matching.search_threshold)?;
        check_threshold(
            "matching.similarity_threshold",
            self.matching.similarity_threshold,
        )?;
        if self.matching.top_k == 0 {
            return Err(ConfigError::Zero {
                field: "matching.top_k",
            });
        }
        if self.graph.max_parameter_depth == 0 {
            return Err(ConfigError::Zero {
                field: "graph.max_parameter_depth",
            });
        }
        Ok(())
    }
}

fn check_threshold(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { field, value })
    }
}

/// Dependency extraction and graph traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    /// Entity types treated as shared configuration (hub nodes): included
    /// in the graph but never expanded.
    pub hub_types: BTreeSet<String>,
    /// Tag types that depend on a measurement-configuration tag.
    pub config_dependent_tag_types: Vec<String>,
    /// Parameter keys on those tags that carry the configuration reference.
    pub config_reference_keys: Vec<String>,
    /// Tag types that are measurement-configuration tags.
    pub config_tag_types: Vec<String>,
    /// Add reverse edges from custom-event triggers to tags whose inline
    /// script pushes the event.
    pub include_event_pushers: bool,
    /// Parameter trees nested deeper than this fail extraction.
    pub max_parameter_depth: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            hub_types: ["gas"].iter().map(|s| s.to_string()).collect(),
            config_dependent_tag_types: vec!["gaawe".to_string()],
            config_reference_keys: vec![
                "measurementId".to_string(),
                "measurementIdOverride".to_string(),
            ],
            config_tag_types: vec!["gaawc".to_string(), "googtag".to_string()],
            include_event_pushers: false,
            max_parameter_depth: 64,
        }
    }
}

impl GraphConfig {
    pub fn is_hub_type(&self, entity_type: &str) -> bool {
        self.hub_types.contains(entity_type)
    }
}

/// Names and ids that always exist in a workspace without being part of
/// its entity lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntegrityConfig {
    pub builtin_variables: BTreeSet<String>,
    pub builtin_trigger_ids: BTreeSet<String>,
}

const BUILTIN_VARIABLES: &[&str] = &[
    "_event",
    "Event",
    "Page URL",
    "Page Hostname",
    "Page Path",
    "Referrer",
    "Click Element",
    "Click Classes",
    "Click ID",
    "Click Target",
    "Click URL",
    "Click Text",
    "Form Element",
    "Form Classes",
    "Form ID",
    "Form Target",
    "Form URL",
    "Form Text",
    "Container ID",
    "Container Version",
    "Debug Mode",
    "Random Number",
    "HTML ID",
    "Environment Name",
    "Scroll Depth Threshold",
    "Scroll Depth Units",
    "Scroll Direction",
    "Video Provider",
    "Video Status",
    "Video URL",
    "Video Title",
    "Video Duration",
    "Video Current Time",
    "Video Percent",
    "Video Visible",
    "Percent Visible",
    "On-Screen Duration",
    "Error Message",
    "Error URL",
    "Error Line",
    "History Source",
    "New History Fragment",
    "Old History Fragment",
    "New History State",
    "Old History State",
];

/// All Pages, Consent Initialization and Initialization.
const BUILTIN_TRIGGER_IDS: &[&str] = &["2147479553", "2147479572", "2147479573"];

impl Default for IntegrityConfig {
    fn default() -> Self {
        IntegrityConfig {
            builtin_variables: BUILTIN_VARIABLES.iter().map(|s| s.to_string()).collect(),
            builtin_trigger_ids: BUILTIN_TRIGGER_IDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Default options for the reference matcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchDefaults {
    pub search_threshold: f64,
    pub top_k: usize,
    pub similarity_threshold: f64,
}

impl Default for MatchDefaults {
    fn default() -> Self {
        MatchDefaults {
            search_threshold: 0.0,
            top_k: 10,
            similarity_threshold: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_check() {
        assert_eq!(AnalyzeConfig::default().check(), Ok(()));
    }

    #[test]
    fn analytics_settings_is_a_hub_by_default() {
        let config = GraphConfig::default();
        assert!(config.is_hub_type("gas"));
        assert!(!config.is_hub_type("v"));
    }

    #[test]
    fn rejects_negative_threshold() {
        let mut config = AnalyzeConfig::default();
        config.matching.similarity_threshold = -0.1;
        assert!(matches!(
            config.check(),
            Err(ConfigError::InvalidThreshold {
                field: "matching.similarity_threshold",
                ..
            })
        ));
    }

    #[test]
    fn rejects_zero_top_k() {
        let mut config = AnalyzeConfig::default();
        config.matching.top_k = 0;
        assert_eq!(
            config.check(),
            Err(ConfigError::Zero {
                field: "matching.top_k"
            })
        );
    }

    #[test]
    fn builtins_include_all_pages_trigger() {
        let config = IntegrityConfig::default();
        assert!(config.builtin_trigger_ids.contains("2147479553"));
        assert!(config.builtin_variables.contains("Page URL"));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let json = serde_json::json!({"graph": {"include_event_pushers": true}});
        let config: AnalyzeConfig = serde_json::from_value(json).unwrap();
        assert!(config.graph.include_event_pushers);
        assert_eq!(config.graph.max_parameter_depth, 64);
        assert_eq!(config.matching.top_k, 10);
    }
}
