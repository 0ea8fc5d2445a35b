use std::path::PathBuf;

use crate::candidates::{load_candidates, CandidateBatch};
use crate::classify::ClassifierPolicy;
use crate::config::MergeConfig;
use crate::merge::{MergeReport, MergeRun, RequireTitleAndContent, Validate};
use crate::model::Recipe;
use crate::scrape::{collect_candidates, RequestFetcher};
use crate::store::JsonFileStore;
use crate::MergeError;

/// Where the candidates of a run come from
#[derive(Debug, Clone)]
pub enum CandidateSource {
    /// A JSON file produced by a scraper or importer
    File(PathBuf),
    /// Recipe pages to fetch and extract
    Urls(Vec<String>),
    /// Records already in memory
    Records(Vec<Recipe>),
}

/// Builder for configuring and executing a merge run
#[derive(Default)]
pub struct RecipeMergerBuilder {
    store: Option<PathBuf>,
    source: Option<CandidateSource>,
    config: MergeConfig,
    validator: Option<Box<dyn Validate>>,
}

impl RecipeMergerBuilder {
    /// Set the JSON store to merge into
    ///
    /// # Example
    /// ```
    /// use recipe_merge::RecipeMerger;
    ///
    /// let builder = RecipeMerger::builder().store("data/recipes.json");
    /// ```
    pub fn store(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = Some(path.into());
        self
    }

    /// Read candidates from a JSON batch file
    pub fn candidates_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(CandidateSource::File(path.into()));
        self
    }

    /// Fetch candidates from recipe page URLs
    ///
    /// # Example
    /// ```
    /// use recipe_merge::RecipeMerger;
    ///
    /// let builder = RecipeMerger::builder()
    ///     .store("data/recipes.json")
    ///     .urls(["https://www.example.it/ricette/torta-di-mele"]);
    /// ```
    pub fn urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source = Some(CandidateSource::Urls(
            urls.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Merge records that are already in memory
    pub fn records(mut self, records: Vec<Recipe>) -> Self {
        self.source = Some(CandidateSource::Records(records));
        self
    }

    /// Replace the whole configuration (identity, store, fetch sections)
    pub fn config(mut self, config: MergeConfig) -> Self {
        self.config = config;
        self
    }

    /// Write backups to `dir` instead of next to the store
    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.store.backup_dir = Some(dir.into());
        self
    }

    /// Minimum normalized title length for title-based duplicate detection
    pub fn min_title_len(mut self, len: usize) -> Self {
        self.config.identity.min_title_len = len;
        self
    }

    /// Use a custom validation gate instead of [`RequireTitleAndContent`]
    pub fn validator(mut self, validator: impl Validate + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Build and execute the merge run
    ///
    /// # Errors
    /// Returns `MergeError` if:
    /// - No store or candidate source was specified
    /// - The store is missing, unreadable or not a recipe array
    /// - The candidate file is not a JSON array of records
    /// - The backup or the final store write fails
    ///
    /// Individual candidates that fail to fetch, decode or validate are
    /// counted in the report and never fail the run.
    pub async fn build(self) -> Result<MergeReport, MergeError> {
        let store_path = self.store.ok_or_else(|| {
            MergeError::BuilderError("No store specified. Use .store()".to_string())
        })?;
        let source = self.source.ok_or_else(|| {
            MergeError::BuilderError(
                "No candidates specified. Use .candidates_file(), .urls() or .records()"
                    .to_string(),
            )
        })?;

        let batch = match source {
            CandidateSource::File(path) => load_candidates(&path)?,
            CandidateSource::Records(records) => CandidateBatch::from_records(records),
            CandidateSource::Urls(urls) => {
                let fetcher = RequestFetcher::new(&self.config.fetch)?;
                collect_candidates(&fetcher, &urls, self.config.fetch.concurrency).await
            }
        };

        let mut store = JsonFileStore::new(store_path);
        if let Some(dir) = &self.config.store.backup_dir {
            store = store.with_backup_dir(dir);
        }

        let validator: &dyn Validate = match &self.validator {
            Some(validator) => &**validator,
            None => &RequireTitleAndContent,
        };
        let run = MergeRun {
            policy: ClassifierPolicy::from(&self.config.identity),
            validator,
        };
        run.execute(&store, batch)
    }
}

/// Main entry point for the builder API
pub struct RecipeMerger;

impl RecipeMerger {
    /// Creates a new builder for a merge run
    ///
    /// # Example
    /// ```
    /// use recipe_merge::RecipeMerger;
    ///
    /// let builder = RecipeMerger::builder();
    /// ```
    pub fn builder() -> RecipeMergerBuilder {
        RecipeMergerBuilder::default()
    }
}
