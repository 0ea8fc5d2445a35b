use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::config::IdentityConfig;
use crate::identity::IdentityKeys;

/// Identity axis on which a duplicate was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateAxis {
    Url,
    Slug,
    Title,
}

impl DuplicateAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateAxis::Url => "url",
            DuplicateAxis::Slug => "slug",
            DuplicateAxis::Title => "title",
        }
    }
}

impl fmt::Display for DuplicateAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which axes are compared, and the minimum title key length for title matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierPolicy {
    pub url: bool,
    pub slug: bool,
    pub title: bool,
    pub min_title_len: usize,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            url: true,
            slug: true,
            title: true,
            min_title_len: 4,
        }
    }
}

impl From<&IdentityConfig> for ClassifierPolicy {
    fn from(config: &IdentityConfig) -> Self {
        Self {
            url: config.axes.contains(&DuplicateAxis::Url),
            slug: config.axes.contains(&DuplicateAxis::Slug),
            title: config.axes.contains(&DuplicateAxis::Title),
            min_title_len: config.min_title_len,
        }
    }
}

/// Lookup from identity keys to record positions.
///
/// Positions refer to the sequence "existing records, then records accepted in
/// this run", in that order. The index lives for one merge run only.
#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_url: HashMap<String, usize>,
    by_slug: HashMap<String, usize>,
    by_title: HashMap<String, usize>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over `keys`, where the i-th entry belongs to record i.
    pub fn build<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a IdentityKeys>,
    {
        let mut index = Self::new();
        for (position, keys) in keys.into_iter().enumerate() {
            index.insert(keys, position);
        }
        index
    }

    /// Register a record's keys. Empty keys are skipped, and an occupied slot
    /// keeps its first owner.
    pub fn insert(&mut self, keys: &IdentityKeys, position: usize) {
        for (map, key) in [
            (&mut self.by_url, &keys.url_key),
            (&mut self.by_slug, &keys.slug_key),
            (&mut self.by_title, &keys.title_key),
        ] {
            if !key.is_empty() {
                map.entry(key.clone()).or_insert(position);
            }
        }
    }

    pub fn axis_sizes(&self) -> (usize, usize, usize) {
        (self.by_url.len(), self.by_slug.len(), self.by_title.len())
    }

    fn lookup(&self, axis: DuplicateAxis, key: &str) -> Option<usize> {
        let map = match axis {
            DuplicateAxis::Url => &self.by_url,
            DuplicateAxis::Slug => &self.by_slug,
            DuplicateAxis::Title => &self.by_title,
        };
        map.get(key).copied()
    }
}

/// Outcome of classifying one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub matched_by: Option<DuplicateAxis>,
    /// Position of the record the candidate collided with
    pub matched_record: Option<usize>,
}

impl Classification {
    pub fn is_duplicate(&self) -> bool {
        self.matched_by.is_some()
    }

    fn new_record() -> Self {
        Self {
            matched_by: None,
            matched_record: None,
        }
    }
}

/// Decide whether a candidate duplicates anything in `index`.
///
/// Axes are tried url, slug, title; the first hit wins. Title matches need at
/// least `min_title_len` characters of normalized title, so a record with no
/// URL, no slug and a very short title is always new.
pub fn classify(
    candidate: &IdentityKeys,
    index: &IdentityIndex,
    policy: &ClassifierPolicy,
) -> Classification {
    let checks = [
        (DuplicateAxis::Url, policy.url, &candidate.url_key, 1),
        (DuplicateAxis::Slug, policy.slug, &candidate.slug_key, 1),
        (
            DuplicateAxis::Title,
            policy.title,
            &candidate.title_key,
            policy.min_title_len.max(1),
        ),
    ];

    for (axis, enabled, key, min_len) in checks {
        if !enabled || key.chars().count() < min_len {
            continue;
        }
        if let Some(position) = index.lookup(axis, key) {
            return Classification {
                matched_by: Some(axis),
                matched_record: Some(position),
            };
        }
    }

    Classification::new_record()
}
