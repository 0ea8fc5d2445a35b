//! Merge of a candidate batch into an existing recipe set.
//!
//! Candidates are processed strictly in input order. Each one is checked
//! against the existing records *and* the candidates accepted before it, so
//! duplicates inside a single batch are caught too.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::fmt;

use crate::candidates::{CandidateBatch, CandidateFailure};
use crate::classify::{classify, ClassifierPolicy, DuplicateAxis, IdentityIndex};
use crate::error::MergeError;
use crate::identity::identity_keys;
use crate::model::Recipe;
use crate::store::RecipeStore;

/// Why a candidate failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    MissingTitle,
    NoContent,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::MissingTitle => f.write_str("missing title"),
            ValidationFailure::NoContent => f.write_str("no ingredients and no steps"),
        }
    }
}

/// Gate a candidate must pass before it enters the store
pub trait Validate: Send + Sync {
    fn validate(&self, record: &Recipe) -> Result<(), ValidationFailure>;
}

/// Requires a non-blank title and at least one ingredient or step line
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireTitleAndContent;

impl Validate for RequireTitleAndContent {
    fn validate(&self, record: &Recipe) -> Result<(), ValidationFailure> {
        if record.title.trim().is_empty() {
            return Err(ValidationFailure::MissingTitle);
        }
        if !record.has_content() {
            return Err(ValidationFailure::NoContent);
        }
        Ok(())
    }
}

/// Reason a candidate did not make it into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate {
        axis: DuplicateAxis,
        /// Label of the record it collided with
        existing: String,
    },
    Invalid(ValidationFailure),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Duplicate { axis, existing } => {
                write!(f, "duplicate by {axis} of \"{existing}\"")
            }
            SkipReason::Invalid(failure) => write!(f, "invalid: {failure}"),
        }
    }
}

/// One skipped candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Position in the candidate batch
    pub position: usize,
    pub label: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipCounts {
    pub duplicate_url: usize,
    pub duplicate_slug: usize,
    pub duplicate_title: usize,
    pub validation_failed: usize,
}

impl SkipCounts {
    pub fn duplicates(&self) -> usize {
        self.duplicate_url + self.duplicate_slug + self.duplicate_title
    }

    fn count_duplicate(&mut self, axis: DuplicateAxis) {
        match axis {
            DuplicateAxis::Url => self.duplicate_url += 1,
            DuplicateAxis::Slug => self.duplicate_slug += 1,
            DuplicateAxis::Title => self.duplicate_title += 1,
        }
    }
}

/// Result of merging one batch in memory
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub accepted: Vec<Recipe>,
    pub skipped: SkipCounts,
    pub rejections: Vec<Rejection>,
}

fn label_of(record: &Recipe, position: usize) -> String {
    record
        .label()
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{position}"))
}

/// Classify, validate and accept candidates against `existing`.
///
/// Existing records are never modified or dropped; accepted candidates are
/// returned in input order, ready to be appended.
pub fn merge_batch(
    existing: &[Recipe],
    candidates: Vec<Recipe>,
    policy: &ClassifierPolicy,
    validator: &dyn Validate,
) -> MergeOutcome {
    let existing_keys: Vec<_> = existing.iter().map(identity_keys).collect();
    let mut index = IdentityIndex::build(&existing_keys);
    let mut outcome = MergeOutcome::default();

    for (position, candidate) in candidates.into_iter().enumerate() {
        let keys = identity_keys(&candidate);
        let classification = classify(&keys, &index, policy);

        if let (Some(axis), Some(matched)) =
            (classification.matched_by, classification.matched_record)
        {
            let matched_record = if matched < existing.len() {
                &existing[matched]
            } else {
                &outcome.accepted[matched - existing.len()]
            };
            outcome.skipped.count_duplicate(axis);
            outcome.rejections.push(Rejection {
                position,
                label: label_of(&candidate, position),
                reason: SkipReason::Duplicate {
                    axis,
                    existing: label_of(matched_record, matched),
                },
            });
            continue;
        }

        if let Err(failure) = validator.validate(&candidate) {
            outcome.skipped.validation_failed += 1;
            outcome.rejections.push(Rejection {
                position,
                label: label_of(&candidate, position),
                reason: SkipReason::Invalid(failure),
            });
            continue;
        }

        index.insert(&keys, existing.len() + outcome.accepted.len());
        outcome.accepted.push(candidate);
    }

    outcome
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AxisCounts {
    pub url: usize,
    pub slug: usize,
    pub title: usize,
}

/// Machine-readable summary of a merge run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub timestamp: DateTime<Utc>,
    pub candidates_received: usize,
    pub accepted: usize,
    pub skipped_duplicate: usize,
    pub skipped_validation: usize,
    pub total_after_merge: usize,
    pub skipped_by_axis: AxisCounts,
    /// Candidates dropped before the merge (unreadable record, failed fetch)
    pub candidates_failed: usize,
    /// Token of the backup taken before writing, if anything was written
    pub backup: Option<String>,
    #[serde(skip)]
    pub rejections: Vec<Rejection>,
    #[serde(skip)]
    pub failures: Vec<CandidateFailure>,
}

/// Settings for one merge run
pub struct MergeRun<'a> {
    pub policy: ClassifierPolicy,
    pub validator: &'a dyn Validate,
}

impl Default for MergeRun<'_> {
    fn default() -> Self {
        Self {
            policy: ClassifierPolicy::default(),
            validator: &RequireTitleAndContent,
        }
    }
}

impl MergeRun<'_> {
    /// Run the whole pipeline against `store`.
    ///
    /// 1. Load the store (a malformed store aborts the run)
    /// 2. Merge the batch in memory
    /// 3. If anything was accepted, back up the pre-merge content
    /// 4. Replace the store with existing + accepted
    ///
    /// When step 3 fails nothing is written. When step 4 fails the error names
    /// the backup so the previous content can be restored by hand.
    pub fn execute<S: RecipeStore + ?Sized>(
        &self,
        store: &S,
        batch: CandidateBatch,
    ) -> Result<MergeReport, MergeError> {
        let snapshot = store.load()?;
        let candidates_received = batch.received();

        for failure in &batch.failures {
            warn!("Dropped candidate {}: {}", failure.label, failure.reason);
        }

        let outcome = merge_batch(
            &snapshot.records,
            batch.records,
            &self.policy,
            self.validator,
        );

        for rejection in &outcome.rejections {
            match rejection.reason {
                SkipReason::Duplicate { .. } => {
                    info!("Skipped \"{}\": {}", rejection.label, rejection.reason)
                }
                SkipReason::Invalid(_) => {
                    warn!("Skipped \"{}\": {}", rejection.label, rejection.reason)
                }
            }
        }

        let accepted = outcome.accepted.len();
        let mut backup = None;
        let total_after_merge = snapshot.records.len() + accepted;

        if accepted > 0 {
            let token = store.backup(&snapshot)?;
            store.replace(&snapshot, &outcome.accepted, &token)?;
            backup = Some(token);
        } else {
            info!("No new recipes; store left untouched");
        }

        let skipped = outcome.skipped;
        Ok(MergeReport {
            timestamp: Utc::now(),
            candidates_received,
            accepted,
            skipped_duplicate: skipped.duplicates(),
            skipped_validation: skipped.validation_failed,
            total_after_merge,
            skipped_by_axis: AxisCounts {
                url: skipped.duplicate_url,
                slug: skipped.duplicate_slug,
                title: skipped.duplicate_title,
            },
            candidates_failed: batch.failures.len(),
            backup,
            rejections: outcome.rejections,
            failures: batch.failures,
        })
    }
}
