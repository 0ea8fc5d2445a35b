pub mod builder;
pub mod candidates;
pub mod classify;
pub mod config;
pub mod error;
pub mod identity;
pub mod merge;
pub mod model;
pub mod scrape;
pub mod store;
pub mod video;

pub use builder::{CandidateSource, RecipeMerger, RecipeMergerBuilder};
pub use candidates::{CandidateBatch, CandidateFailure};
pub use classify::{classify, ClassifierPolicy, Classification, DuplicateAxis, IdentityIndex};
pub use config::MergeConfig;
pub use error::{FetchError, MergeError, StoreError};
pub use identity::{identity_keys, normalize_text, slug_from_url, IdentityKeys};
pub use merge::{
    merge_batch, MergeOutcome, MergeReport, MergeRun, RequireTitleAndContent, SkipCounts,
    SkipReason, Validate, ValidationFailure,
};
pub use model::Recipe;
pub use store::{JsonFileStore, RecipeStore};

use std::path::Path;

/// Merge a candidate batch file into a store file with default settings.
///
/// # Example
/// ```no_run
/// let report = recipe_merge::merge_files("recipes.json", "batch.json")?;
/// println!("{} new recipes", report.accepted);
/// # Ok::<(), recipe_merge::MergeError>(())
/// ```
pub fn merge_files(
    store: impl AsRef<Path>,
    batch_file: impl AsRef<Path>,
) -> Result<MergeReport, MergeError> {
    let batch = candidates::load_candidates(batch_file.as_ref())?;
    MergeRun::default().execute(&JsonFileStore::new(store.as_ref()), batch)
}

/// Fetch recipe pages and merge what they contain into a store file.
pub async fn import_urls(
    store: impl AsRef<Path>,
    urls: &[String],
) -> Result<MergeReport, MergeError> {
    RecipeMerger::builder()
        .store(store.as_ref())
        .urls(urls.iter().cloned())
        .build()
        .await
}
