//! Turning recipe page URLs into a candidate batch.
//!
//! Pages are fetched through a small bounded pool; results keep the order of
//! the input URLs so the merge sees candidates in a predictable order. A page
//! that cannot be fetched or has no recipe data is reported and skipped.

mod extract;
mod fetcher;

pub use extract::{extract_recipe, Extractor, JsonLdExtractor, OpenGraphExtractor, ParsingContext};
pub use fetcher::{PageFetcher, RequestFetcher};

use futures::stream::{self, StreamExt};
use log::{info, warn};

use crate::candidates::{CandidateBatch, CandidateFailure};
use crate::error::FetchError;
use crate::model::Recipe;

/// Fetch one page and extract a candidate record from it
pub async fn fetch_candidate(fetcher: &dyn PageFetcher, url: &str) -> Result<Recipe, FetchError> {
    let html = fetcher.fetch(url).await?;
    extract_recipe(url, &html).ok_or_else(|| FetchError::NoRecipe(url.to_string()))
}

/// Fetch `urls` with at most `concurrency` requests in flight
pub async fn collect_candidates(
    fetcher: &dyn PageFetcher,
    urls: &[String],
    concurrency: usize,
) -> CandidateBatch {
    let results: Vec<(&String, Result<Recipe, FetchError>)> = stream::iter(urls)
        .map(|url| async move { (url, fetch_candidate(fetcher, url).await) })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut batch = CandidateBatch::default();
    for (url, result) in results {
        match result {
            Ok(recipe) => batch.records.push(recipe),
            Err(e) => {
                warn!("Skipping {}: {}", url, e);
                batch.failures.push(CandidateFailure {
                    label: url.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Collected {} candidates from {} pages ({} failed)",
        batch.records.len(),
        urls.len(),
        batch.failures.len()
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves canned pages and tracks the peak number of concurrent fetches
    struct CannedFetcher {
        pages: HashMap<String, String>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CannedFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(url, html)| (url.to_string(), html.to_string()))
                    .collect(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    fn page(name: &str) -> String {
        format!(
            r#"<html><head><script type="application/ld+json">
            {{"@type": "Recipe", "name": "{name}", "recipeIngredient": ["farina"]}}
            </script></head></html>"#
        )
    }

    #[tokio::test]
    async fn test_collect_keeps_order_and_reports_failures() {
        let pasta = page("Pasta");
        let pane = page("Pane");
        let fetcher = CannedFetcher::new(&[
            ("https://x.it/pasta", pasta.as_str()),
            ("https://x.it/vuota", "<html></html>"),
            ("https://x.it/pane", pane.as_str()),
        ]);
        let urls: Vec<String> = ["pasta", "vuota", "mancante", "pane"]
            .iter()
            .map(|p| format!("https://x.it/{p}"))
            .collect();

        let batch = collect_candidates(&fetcher, &urls, 5).await;

        let titles: Vec<_> = batch.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Pasta", "Pane"]);
        let failed: Vec<_> = batch.failures.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(failed, vec!["https://x.it/vuota", "https://x.it/mancante"]);
        assert_eq!(batch.received(), 4);
    }

    #[tokio::test]
    async fn test_collect_respects_concurrency_limit() {
        let fetcher = CannedFetcher::new(&[]);
        let urls: Vec<String> = (0..12).map(|i| format!("https://x.it/{i}")).collect();

        let batch = collect_candidates(&fetcher, &urls, 3).await;

        assert_eq!(batch.failures.len(), 12);
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 3);
    }
}
