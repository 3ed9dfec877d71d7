//! Reference matching over a fixed entity snapshot.
//!
//! Two scoring schemes:
//!
//! - name search: exact (100) or substring (50) name match, plus a token
//!   overlap bonus (up to 30) and an auxiliary-text bonus (10);
//! - attribute similarity: a weighted blend of type equality (40), name
//!   token Jaccard (30) and parameter-key Jaccard (30), normalised by the
//!   weights of the enabled dimensions.
//!
//! Grouping is greedy and seeded in input order: members are "near this
//! canonical entity", which is not a transitive equivalence.

use crate::extract;
use serde::Serialize;
use std::collections::BTreeSet;
use tagsync_interchange::{scalar_param, EntityKey, EntityKind, EntityRef, Snapshot, Tag};

const EXACT_NAME_SCORE: f64 = 100.0;
const SUBSTRING_SCORE: f64 = 50.0;
const TOKEN_BONUS: f64 = 30.0;
const EXTRA_TEXT_BONUS: f64 = 10.0;

const TYPE_WEIGHT: f64 = 40.0;
const NAME_WEIGHT: f64 = 30.0;
const PARAMETER_WEIGHT: f64 = 30.0;

/// Kinds searched when no kind filter is given.
const SEARCHABLE: [EntityKind; 3] = [EntityKind::Tag, EntityKind::Trigger, EntityKind::Variable];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("no entity snapshot has been set on the matcher")]
    NoSnapshot,

    #[error("similarity needs at least one enabled dimension (type, name or parameters)")]
    NoDimensions,
}

/// Options for [`ReferenceMatcher::search_by_name`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Restrict to these kinds; `None` searches tags, triggers and variables.
    /// Templates are only searched when asked for.
    pub kinds: Option<Vec<EntityKind>>,
    /// Restrict to one type discriminator (exact match).
    pub entity_type: Option<String>,
    /// Keep results scoring strictly above this.
    pub threshold: f64,
    pub top_k: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            kinds: None,
            entity_type: None,
            threshold: 0.0,
            top_k: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResult {
    pub key: EntityKey,
    pub name: String,
    pub entity_type: String,
    pub score: f64,
    /// Query tokens found in the name.
    pub matched_tokens: usize,
}

/// Options for similarity search and grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityOptions {
    pub compare_type: bool,
    pub compare_name: bool,
    pub compare_parameters: bool,
    /// Keep candidates scoring at or above this (0.0 to 1.0).
    pub threshold: f64,
}

impl Default for SimilarityOptions {
    fn default() -> Self {
        SimilarityOptions {
            compare_type: true,
            compare_name: true,
            compare_parameters: true,
            threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarityResult {
    pub key: EntityKey,
    pub name: String,
    pub entity_type: String,
    pub score: f64,
}

/// A greedy cluster: the seed and every entity close enough to it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SimilarityGroup {
    pub seed: EntityKey,
    /// Seed first, then members in input order.
    pub members: Vec<EntityKey>,
}

/// Name and similarity lookup over one snapshot.
///
/// Use one matcher per snapshot; [`set_entities`](Self::set_entities)
/// replaces the whole snapshot.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMatcher {
    snapshot: Option<Snapshot>,
}

impl ReferenceMatcher {
    pub fn new() -> Self {
        ReferenceMatcher::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        ReferenceMatcher {
            snapshot: Some(snapshot),
        }
    }

    pub fn set_entities(&mut self, snapshot: Snapshot) {
        self.snapshot = Some(snapshot);
    }

    /// The snapshot being searched. Borrow references from here to have
    /// them left out of their own similarity results.
    pub fn snapshot(&self) -> Result<&Snapshot, MatchError> {
        self.snapshot.as_ref().ok_or(MatchError::NoSnapshot)
    }

    /// Score every candidate's name against `query`.
    ///
    /// A blank query matches nothing.
    pub fn search_by_name(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, MatchError> {
        let snapshot = self.snapshot()?;
        let query_lower = query.trim().to_lowercase();
        if query_lower.is_empty() {
            return Ok(Vec::new());
        }
        let query_tokens = tokenize(&query_lower);

        let kinds = options.kinds.as_deref().unwrap_or(&SEARCHABLE);
        let mut results: Vec<SearchResult> = EntityKind::ALL
            .iter()
            .filter(|k| kinds.contains(k))
            .flat_map(|&k| snapshot.entities_of(k))
            .filter(|e| {
                options
                    .entity_type
                    .as_deref()
                    .map_or(true, |t| e.entity_type() == t)
            })
            .filter_map(|entity| {
                let (score, matched_tokens) = name_score(entity, &query_lower, &query_tokens);
                (score > options.threshold).then(|| SearchResult {
                    key: entity.key(),
                    name: entity.name().to_string(),
                    entity_type: entity.entity_type().to_string(),
                    score,
                    matched_tokens,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(options.top_k);
        Ok(results)
    }

    /// Tags in the snapshot similar to `reference`.
    pub fn find_similar_tags(
        &self,
        reference: &Tag,
        options: &SimilarityOptions,
    ) -> Result<Vec<SimilarityResult>, MatchError> {
        self.find_similar(EntityRef::Tag(reference), options)
    }

    /// Entities of the reference's kind similar to it, best first.
    ///
    /// When `reference` borrows from this matcher's own snapshot it is
    /// left out of the result. A reference from another snapshot is
    /// compared against everything, including an entity that happens to
    /// share its id.
    pub fn find_similar(
        &self,
        reference: EntityRef<'_>,
        options: &SimilarityOptions,
    ) -> Result<Vec<SimilarityResult>, MatchError> {
        let snapshot = self.snapshot()?;
        let mut results = Vec::new();
        for candidate in snapshot.entities_of(reference.kind()) {
            if same_entity(reference, candidate) {
                continue;
            }
            let score = similarity(reference, candidate, options)?;
            if score >= options.threshold {
                results.push(SimilarityResult {
                    key: candidate.key(),
                    name: candidate.name().to_string(),
                    entity_type: candidate.entity_type().to_string(),
                    score,
                });
            }
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }

    /// Case-sensitive exact name lookup; the first match wins.
    pub fn find_by_exact_name(
        &self,
        name: &str,
        kind: EntityKind,
    ) -> Result<Option<EntityRef<'_>>, MatchError> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .entities_of(kind)
            .into_iter()
            .find(|e| e.name() == name))
    }
}

/// Whether both views borrow the very same entity value.
fn same_entity(a: EntityRef<'_>, b: EntityRef<'_>) -> bool {
    match (a, b) {
        (EntityRef::Tag(x), EntityRef::Tag(y)) => std::ptr::eq(x, y),
        (EntityRef::Trigger(x), EntityRef::Trigger(y)) => std::ptr::eq(x, y),
        (EntityRef::Variable(x), EntityRef::Variable(y)) => std::ptr::eq(x, y),
        (EntityRef::Template(x), EntityRef::Template(y)) => std::ptr::eq(x, y),
        _ => false,
    }
}

/// Name score and the number of query tokens found in the name.
fn name_score(
    entity: EntityRef<'_>,
    query_lower: &str,
    query_tokens: &[String],
) -> (f64, usize) {
    let name_lower = entity.name().to_lowercase();

    let mut score = if name_lower == query_lower {
        EXACT_NAME_SCORE
    } else if name_lower.contains(query_lower) {
        SUBSTRING_SCORE
    } else {
        0.0
    };

    let mut matched = 0;
    if !query_tokens.is_empty() {
        let name_tokens = tokenize(&name_lower);
        matched = query_tokens
            .iter()
            .filter(|q| {
                name_tokens
                    .iter()
                    .any(|t| t.contains(q.as_str()) || q.contains(t.as_str()))
            })
            .count();
        score += TOKEN_BONUS * matched as f64 / query_tokens.len() as f64;
    }

    if auxiliary_text(entity)
        .iter()
        .any(|text| text.to_lowercase().contains(query_lower))
    {
        score += EXTRA_TEXT_BONUS;
    }

    (score, matched)
}

/// Text besides the name that a search may hit: the event name a tag
/// sends or a trigger listens for, and the notes field.
fn auxiliary_text<'a>(entity: EntityRef<'a>) -> Vec<&'a str> {
    let mut texts = Vec::new();
    match entity {
        EntityRef::Tag(tag) => {
            if let Some(event) = scalar_param(&tag.parameters, "eventName") {
                texts.push(event);
            }
        }
        EntityRef::Trigger(trigger) => {
            if let Some((_, event)) = extract::custom_event_name(trigger) {
                texts.push(event);
            }
        }
        _ => {}
    }
    if let Some(notes) = entity.notes() {
        texts.push(notes);
    }
    texts
}

/// Lowercase, split on whitespace, `-`, `_` and `.`, drop tokens of
/// length one or less. Order and duplicates are kept.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '.'))
        .filter(|t| t.chars().count() > 1)
        .map(str::to_owned)
        .collect()
}

/// Jaccard similarity of two sets; two empty sets score 0.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard similarity of the token sets of two names.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a: BTreeSet<String> = tokenize(a).into_iter().collect();
    let b: BTreeSet<String> = tokenize(b).into_iter().collect();
    jaccard(&a, &b)
}

fn parameter_keys<'a>(entity: EntityRef<'a>) -> BTreeSet<&'a str> {
    entity
        .parameters()
        .iter()
        .filter_map(|p| p.key.as_deref())
        .collect()
}

/// Weighted similarity of two entities in `[0, 1]`.
///
/// Disabled dimensions drop out of both the sum and the normaliser.
pub fn similarity(
    a: EntityRef<'_>,
    b: EntityRef<'_>,
    options: &SimilarityOptions,
) -> Result<f64, MatchError> {
    let mut total = 0.0;
    let mut weights = 0.0;

    if options.compare_type {
        weights += TYPE_WEIGHT;
        if a.entity_type() == b.entity_type() {
            total += TYPE_WEIGHT;
        }
    }
    if options.compare_name {
        weights += NAME_WEIGHT;
        total += NAME_WEIGHT * string_similarity(a.name(), b.name());
    }
    if options.compare_parameters {
        weights += PARAMETER_WEIGHT;
        total += PARAMETER_WEIGHT * jaccard(&parameter_keys(a), &parameter_keys(b));
    }

    if weights == 0.0 {
        return Err(MatchError::NoDimensions);
    }
    Ok(total / weights)
}

/// Greedy single-pass grouping.
///
/// Walks `entities` in order; each entity not yet assigned seeds a new
/// group and pulls in every later unassigned entity whose similarity to
/// the seed is at least `threshold`. Similarity to other members does
/// not count, so A~B and B~C does not put C with A.
pub fn group_similar(
    entities: &[EntityRef<'_>],
    threshold: f64,
    options: &SimilarityOptions,
) -> Result<Vec<SimilarityGroup>, MatchError> {
    let mut assigned = vec![false; entities.len()];
    let mut groups = Vec::new();

    for (i, seed) in entities.iter().enumerate() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let mut members = vec![seed.key()];
        for (j, candidate) in entities.iter().enumerate().skip(i + 1) {
            if assigned[j] {
                continue;
            }
            if similarity(*seed, *candidate, options)? >= threshold {
                assigned[j] = true;
                members.push(candidate.key());
            }
        }
        groups.push(SimilarityGroup {
            seed: seed.key(),
            members,
        });
    }

    Ok(groups)
}

/// [`group_similar`] over tags.
pub fn group_similar_tags(
    tags: &[Tag],
    threshold: f64,
    options: &SimilarityOptions,
) -> Result<Vec<SimilarityGroup>, MatchError> {
    let entities: Vec<EntityRef<'_>> = tags.iter().map(EntityRef::Tag).collect();
    group_similar(&entities, threshold, options)
}
