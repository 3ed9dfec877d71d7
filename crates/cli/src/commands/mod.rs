pub(crate) mod graph;
pub(crate) mod group;
pub(crate) mod integrity;
pub(crate) mod prevalidate;
pub(crate) mod search;
pub(crate) mod similar;
pub(crate) mod validate;

use tagsync_analyze::{AnalyzeConfig, SimilarityOptions};

use crate::SimilarityArgs;

/// Similarity options from the command line, falling back to config.
pub(crate) fn similarity_options(
    args: &SimilarityArgs,
    config: &AnalyzeConfig,
) -> SimilarityOptions {
    SimilarityOptions {
        compare_type: !args.no_type,
        compare_name: !args.no_name,
        compare_parameters: !args.no_parameters,
        threshold: args
            .threshold
            .unwrap_or(config.matching.similarity_threshold),
    }
}
