//! Matching recipes to YouTube videos.
//!
//! Search results come from outside (the video metadata API is not called
//! here). Each result is scored against the recipe title, the best one above
//! [`ACCEPT_THRESHOLD`] is kept, and the choice is folded into a persisted
//! [`VideoMap`].

mod map;
mod score;

pub use map::{resolve_videos, ResolveSummary, VideoMap, VideoMapEntry};
pub use score::{
    best_match, score_video, ScoreWeights, ScoringRules, VideoMatchCandidate, VideoScore,
    VideoSearchResult,
};

use url::Url;

/// Minimum score for a video to be linked to a recipe, shared by every caller
pub const ACCEPT_THRESHOLD: f64 = 0.5;

const YOUTUBE_ID_LEN: usize = 11;

/// Whether `id` looks like a YouTube video id (11 chars of `[A-Za-z0-9_-]`)
pub fn is_youtube_id(id: &str) -> bool {
    id.len() == YOUTUBE_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Extract the video id from the usual YouTube URL forms: `watch?v=`,
/// `youtu.be/`, `/embed/`, `/shorts/` and `/v/`.
pub fn youtube_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    let candidate = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("embed") | Some("shorts") | Some("v") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_youtube_id(&candidate).then_some(candidate)
}
