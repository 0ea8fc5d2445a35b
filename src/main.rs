use clap::{Args, Parser, Subcommand};
use log::{error, info};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use recipe_merge::config::load_config;
use recipe_merge::store::{JsonFileStore, RecipeStore};
use recipe_merge::video::{resolve_videos, ScoringRules, VideoMap, VideoSearchResult};
use recipe_merge::{MergeConfig, MergeError, RecipeMerger};

#[derive(Parser)]
#[command(name = "recipe-merge", version, about = "Merge scraped recipes into a JSON store without duplicates")]
struct Cli {
    /// Configuration file (defaults to ./recipe-merge.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge a candidate batch file into the store
    Merge {
        #[command(flatten)]
        target: StoreArgs,

        /// Candidate batch (JSON array or {"recipes": [...]})
        #[arg(long)]
        candidates: PathBuf,

        /// Minimum normalized title length for title duplicates
        #[arg(long)]
        min_title_len: Option<usize>,
    },
    /// Fetch recipe pages and merge them into the store
    Import {
        #[command(flatten)]
        target: StoreArgs,

        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Score video search results and update the video map
    Videos {
        #[arg(long)]
        store: PathBuf,

        /// Search results keyed by recipe title
        #[arg(long)]
        results: PathBuf,

        /// Video map to update
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args)]
struct StoreArgs {
    /// Recipe store to merge into
    #[arg(long)]
    store: PathBuf,

    /// Directory for backups (defaults to the store's directory)
    #[arg(long)]
    backup_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), MergeError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Merge {
            target,
            candidates,
            min_title_len,
        } => {
            let mut merger = with_store(RecipeMerger::builder().config(config), target)
                .candidates_file(candidates);
            if let Some(len) = min_title_len {
                merger = merger.min_title_len(len);
            }
            print_json(&merger.build().await?)
        }
        Command::Import { target, urls } => {
            let merger = with_store(RecipeMerger::builder().config(config), target).urls(urls);
            print_json(&merger.build().await?)
        }
        Command::Videos {
            store,
            results,
            out,
        } => run_videos(&config, &store, &results, &out),
    }
}

fn with_store(
    builder: recipe_merge::RecipeMergerBuilder,
    target: StoreArgs,
) -> recipe_merge::RecipeMergerBuilder {
    let builder = builder.store(target.store);
    match target.backup_dir {
        Some(dir) => builder.backup_dir(dir),
        None => builder,
    }
}

fn run_videos(
    config: &MergeConfig,
    store: &Path,
    results: &Path,
    out: &Path,
) -> Result<(), MergeError> {
    let snapshot = JsonFileStore::new(store).load()?;
    let raw = fs::read(results).map_err(|source| MergeError::Io {
        path: results.to_path_buf(),
        source,
    })?;
    let results: HashMap<String, Vec<VideoSearchResult>> = serde_json::from_slice(&raw)?;

    let mut map = VideoMap::load(out)?;
    let rules = ScoringRules::from_config(&config.video);
    let summary = resolve_videos(
        &snapshot.records,
        &results,
        &rules,
        config.video.threshold,
        &mut map,
    );
    map.save(out)?;
    info!("Video map {} now has {} entries", out.display(), map.len());

    print_json(&summary)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), MergeError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
