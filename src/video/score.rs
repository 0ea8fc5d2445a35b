use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::is_youtube_id;
use crate::identity::normalize_text;

/// Words too common in recipe and video titles to count as evidence
const STOP_WORDS: &[&str] = &[
    "con", "alla", "alle", "allo", "agli", "ai", "al", "della", "delle", "dello", "degli", "dei",
    "del", "per", "una", "uno", "the", "and", "with", "ricetta", "ricette", "recipe", "facile",
    "veloce",
];

const MIN_TOKEN_LEN: usize = 3;

/// Relative weight of each scoring signal. The score is normalized by their
/// sum, so only the ratios matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_token_weight")]
    pub token: f64,
    #[serde(default = "default_channel_weight")]
    pub channel: f64,
    #[serde(default = "default_duration_weight")]
    pub duration: f64,
}

fn default_token_weight() -> f64 {
    0.6
}

fn default_channel_weight() -> f64 {
    0.25
}

fn default_duration_weight() -> f64 {
    0.15
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            token: default_token_weight(),
            channel: default_channel_weight(),
            duration: default_duration_weight(),
        }
    }
}

/// Everything besides the two titles that feeds the score
#[derive(Debug, Clone, Copy)]
pub struct ScoringRules<'a> {
    pub weights: ScoreWeights,
    pub whitelist: &'a [String],
    pub blocklist: &'a [String],
    pub min_duration_secs: u32,
    pub max_duration_secs: u32,
}

impl<'a> ScoringRules<'a> {
    pub fn from_config(config: &'a crate::config::VideoConfig) -> Self {
        Self {
            weights: config.weights,
            whitelist: &config.whitelist,
            blocklist: &config.blocklist,
            min_duration_secs: config.min_duration_secs,
            max_duration_secs: config.max_duration_secs,
        }
    }
}

/// One search hit for a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSearchResult {
    pub video_id: String,
    pub title: String,
    #[serde(default, alias = "channelLabel")]
    pub channel: String,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoScore {
    /// Confidence in [0, 1]
    pub score: f64,
    pub matched_tokens: usize,
}

/// A scored association between a recipe and a video
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMatchCandidate {
    pub video_id: String,
    pub channel_label: String,
    pub score: f64,
    pub matched_token_count: usize,
}

fn tokens(text: &str) -> HashSet<String> {
    normalize_text(text)
        .split(' ')
        .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

fn channel_listed(channel: &str, list: &[String]) -> bool {
    let channel = normalize_text(channel);
    !channel.is_empty() && list.iter().any(|entry| normalize_text(entry) == channel)
}

/// Score how well a video matches a recipe.
///
/// - a blocklisted channel scores 0
/// - no shared title token scores 0
/// - otherwise the weighted mean of: share of recipe tokens found in the
///   video title, channel whitelisted (1 or 0), duration inside the window
///   (1, 0.5 when unknown, 0 outside)
pub fn score_video(
    candidate_title: &str,
    recipe_title: &str,
    channel_label: &str,
    duration_seconds: Option<u32>,
    rules: &ScoringRules<'_>,
) -> VideoScore {
    let rejected = VideoScore {
        score: 0.0,
        matched_tokens: 0,
    };

    if channel_listed(channel_label, rules.blocklist) {
        return rejected;
    }

    let recipe_tokens = tokens(recipe_title);
    let video_tokens = tokens(candidate_title);
    let matched_tokens = recipe_tokens.intersection(&video_tokens).count();
    if matched_tokens == 0 {
        return rejected;
    }

    let token_signal = matched_tokens as f64 / recipe_tokens.len() as f64;
    let channel_signal = if channel_listed(channel_label, rules.whitelist) {
        1.0
    } else {
        0.0
    };
    let duration_signal = match duration_seconds {
        Some(secs) if (rules.min_duration_secs..=rules.max_duration_secs).contains(&secs) => 1.0,
        Some(_) => 0.0,
        None => 0.5,
    };

    let weights = rules.weights;
    let total = weights.token + weights.channel + weights.duration;
    if total <= 0.0 {
        return rejected;
    }
    let score = (weights.token * token_signal
        + weights.channel * channel_signal
        + weights.duration * duration_signal)
        / total;

    VideoScore {
        score: score.clamp(0.0, 1.0),
        matched_tokens,
    }
}

/// Pick the best video for a recipe among `results`.
///
/// Only results with a valid video id and a score at or above `threshold` are
/// considered. Ties go to more matched tokens, then to the earlier result.
pub fn best_match(
    recipe_title: &str,
    results: &[VideoSearchResult],
    rules: &ScoringRules<'_>,
    threshold: f64,
) -> Option<VideoMatchCandidate> {
    let mut best: Option<VideoMatchCandidate> = None;

    for result in results.iter().filter(|r| is_youtube_id(&r.video_id)) {
        let scored = score_video(
            &result.title,
            recipe_title,
            &result.channel,
            result.duration_seconds,
            rules,
        );
        if scored.score < threshold {
            continue;
        }

        let better = match &best {
            None => true,
            Some(current) => {
                scored.score > current.score
                    || (scored.score == current.score
                        && scored.matched_tokens > current.matched_token_count)
            }
        };
        if better {
            best = Some(VideoMatchCandidate {
                video_id: result.video_id.clone(),
                channel_label: result.channel.clone(),
                score: scored.score,
                matched_token_count: scored.matched_tokens,
            });
        }
    }

    best
}
