use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::Path;

use super::score::{best_match, ScoringRules, VideoMatchCandidate, VideoSearchResult};
use crate::error::MergeError;
use crate::identity::normalize_text;
use crate::model::Recipe;
use crate::store::write_atomic;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMapEntry {
    pub video_id: String,
    pub confidence: f64,
}

/// Persisted mapping from recipe title key to its chosen video
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoMap {
    entries: BTreeMap<String, VideoMapEntry>,
}

impl VideoMap {
    /// Load a map file. A missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self, MergeError> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(MergeError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), MergeError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        write_atomic(path, &bytes).map_err(|source| MergeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, key: &str) -> Option<&VideoMapEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold a match into the map. An existing entry with higher confidence is
    /// kept. Returns whether the map changed.
    pub fn record(&mut self, key: &str, candidate: &VideoMatchCandidate) -> bool {
        if let Some(existing) = self.entries.get(key) {
            if existing.confidence >= candidate.score {
                return false;
            }
        }
        self.entries.insert(
            key.to_string(),
            VideoMapEntry {
                video_id: candidate.video_id.clone(),
                confidence: candidate.score,
            },
        );
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveSummary {
    pub recipes: usize,
    pub already_linked: usize,
    pub matched: usize,
    pub unmatched: usize,
}

/// Pick a video for every recipe that has search results and no video yet.
///
/// `results` is keyed by recipe title; keys are compared after
/// normalization, the same way titles are compared for duplicates.
pub fn resolve_videos(
    recipes: &[Recipe],
    results: &HashMap<String, Vec<VideoSearchResult>>,
    rules: &ScoringRules<'_>,
    threshold: f64,
    map: &mut VideoMap,
) -> ResolveSummary {
    let by_key: HashMap<String, &Vec<VideoSearchResult>> = results
        .iter()
        .map(|(title, hits)| (normalize_text(title), hits))
        .collect();

    let mut summary = ResolveSummary {
        recipes: recipes.len(),
        ..Default::default()
    };

    for recipe in recipes {
        let key = normalize_text(&recipe.title);
        if key.is_empty() {
            summary.unmatched += 1;
            continue;
        }
        if recipe.youtube_id.is_some() {
            summary.already_linked += 1;
            continue;
        }

        let hits = by_key.get(&key).map(|hits| hits.as_slice()).unwrap_or(&[]);
        match best_match(&recipe.title, hits, rules, threshold) {
            Some(candidate) => {
                info!(
                    "Matched \"{}\" to {} ({:.2}, {} tokens)",
                    recipe.title, candidate.video_id, candidate.score, candidate.matched_token_count
                );
                map.record(&key, &candidate);
                summary.matched += 1;
            }
            None => {
                debug!("No video above threshold for \"{}\"", recipe.title);
                summary.unmatched += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{ScoreWeights, ACCEPT_THRESHOLD};

    fn candidate(id: &str, score: f64) -> VideoMatchCandidate {
        VideoMatchCandidate {
            video_id: id.to_string(),
            channel_label: String::new(),
            score,
            matched_token_count: 1,
        }
    }

    fn rules() -> ScoringRules<'static> {
        ScoringRules {
            weights: ScoreWeights::default(),
            whitelist: &[],
            blocklist: &[],
            min_duration_secs: 60,
            max_duration_secs: 1800,
        }
    }

    #[test]
    fn test_record_keeps_higher_confidence() {
        let mut map = VideoMap::default();
        assert!(map.record("torta di mele", &candidate("aaaaaaaaaaa", 0.8)));
        assert!(!map.record("torta di mele", &candidate("bbbbbbbbbbb", 0.6)));
        assert_eq!(map.get("torta di mele").unwrap().video_id, "aaaaaaaaaaa");

        assert!(map.record("torta di mele", &candidate("ccccccccccc", 0.9)));
        assert_eq!(map.get("torta di mele").unwrap().video_id, "ccccccccccc");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video-map.json");

        assert!(VideoMap::load(&path).unwrap().is_empty());

        let mut map = VideoMap::default();
        map.record("risotto ai funghi", &candidate("aaaaaaaaaaa", 0.75));
        map.save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["risotto ai funghi"]["videoId"], "aaaaaaaaaaa");
        assert_eq!(VideoMap::load(&path).unwrap(), map);
    }

    #[test]
    fn test_resolve_videos() {
        let mut linked = Recipe::new("Pasta al Pesto");
        linked.youtube_id = Some("zzzzzzzzzzz".to_string());
        let recipes = vec![
            Recipe::new("Torta di Mele"),
            Recipe::new("Risotto allo Zafferano"),
            linked,
        ];

        let mut results = HashMap::new();
        results.insert(
            "torta di mele".to_string(),
            vec![VideoSearchResult {
                video_id: "aaaaaaaaaaa".to_string(),
                title: "Torta di mele soffice".to_string(),
                channel: "Chef".to_string(),
                duration_seconds: Some(400),
            }],
        );
        results.insert(
            "Risotto allo Zafferano".to_string(),
            vec![VideoSearchResult {
                video_id: "bbbbbbbbbbb".to_string(),
                title: "Pizza margherita".to_string(),
                channel: "Chef".to_string(),
                duration_seconds: Some(400),
            }],
        );

        let mut map = VideoMap::default();
        let summary = resolve_videos(&recipes, &results, &rules(), ACCEPT_THRESHOLD, &mut map);

        assert_eq!(
            summary,
            ResolveSummary {
                recipes: 3,
                already_linked: 1,
                matched: 1,
                unmatched: 1,
            }
        );
        assert_eq!(map.get("torta di mele").unwrap().video_id, "aaaaaaaaaaa");
        assert!(map.get("risotto allo zafferano").is_none());
    }
}
