use log::debug;
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::error::MergeError;
use crate::model::Recipe;
use crate::store::RECIPES_FIELD;

/// A candidate dropped before it could be classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    /// Title, URL or position identifying the candidate
    pub label: String,
    pub reason: String,
}

/// Records offered for merging, plus the ones that could not be read
#[derive(Debug, Clone, Default)]
pub struct CandidateBatch {
    pub records: Vec<Recipe>,
    pub failures: Vec<CandidateFailure>,
}

impl CandidateBatch {
    pub fn from_records(records: Vec<Recipe>) -> Self {
        Self {
            records,
            failures: Vec::new(),
        }
    }

    /// Every candidate offered, readable or not
    pub fn received(&self) -> usize {
        self.records.len() + self.failures.len()
    }
}

/// Decode a candidate batch.
///
/// The batch itself must be a JSON array (or a `{"recipes": [...]}` object);
/// individual records that do not decode are reported as failures and the rest
/// of the batch goes on.
pub fn parse_candidates(path: &Path, bytes: &[u8]) -> Result<CandidateBatch, MergeError> {
    let invalid = |reason: String| MergeError::CandidateBatch {
        path: path.to_path_buf(),
        reason,
    };

    let value: Value = serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut fields) => match fields.remove(RECIPES_FIELD) {
            Some(Value::Array(items)) => items,
            _ => return Err(invalid(format!("expected a `{RECIPES_FIELD}` array"))),
        },
        _ => return Err(invalid("expected an array of recipes".to_string())),
    };

    let mut batch = CandidateBatch::default();
    for (position, item) in items.into_iter().enumerate() {
        let label = candidate_label(&item, position);
        match serde_json::from_value::<Recipe>(item) {
            Ok(recipe) => batch.records.push(recipe),
            Err(e) => {
                debug!("Candidate {position} does not decode: {e}");
                batch.failures.push(CandidateFailure {
                    label,
                    reason: format!("unreadable record: {e}"),
                });
            }
        }
    }
    Ok(batch)
}

/// Read and decode a candidate batch file
pub fn load_candidates(path: &Path) -> Result<CandidateBatch, MergeError> {
    let bytes = fs::read(path).map_err(|source| MergeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_candidates(path, &bytes)
}

fn candidate_label(item: &Value, position: usize) -> String {
    ["title", "sourceUrl"]
        .iter()
        .filter_map(|field| item.get(field).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{position}"))
}
