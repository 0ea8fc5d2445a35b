use recipe_merge::{merge_files, MergeError, RecipeMerger, StoreError};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    path
}

fn backups(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().contains(".backup-"))
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    found
}

fn existing_store() -> Value {
    json!([
        {
            "title": "Pasta al Pomodoro",
            "sourceUrl": "https://www.giallozafferano.it/ricette/pasta-al-pomodoro.html",
            "ingredients": ["spaghetti", "pomodoro", "basilico"],
            "steps": ["Cuocere la pasta", "Condire con il sugo"],
            "rating": 4.5
        }
    ])
}

#[test]
fn test_merge_pasta_torta_risotto_scenario() {
    let dir = TempDir::new().unwrap();
    let store = write_json(dir.path(), "recipes.json", &existing_store());
    let before = fs::read(&store).unwrap();
    let candidates = write_json(
        dir.path(),
        "batch.json",
        &json!([
            {
                "title": "Spaghetti al pomodoro fresco",
                "sourceUrl": "http://giallozafferano.it/ricette/pasta-al-pomodoro.html/",
                "ingredients": ["spaghetti"],
                "steps": ["Cuocere"]
            },
            {
                "title": "Torta Margherita",
                "sourceUrl": "https://www.cucchiaio.it/ricetta/torta-margherita/",
                "ingredients": ["farina", "uova", "zucchero"],
                "steps": ["Montare le uova", "Infornare"],
                "tags": "dolci"
            },
            {
                "title": "Risotto ai Funghi",
                "sourceUrl": "https://www.example.it/risotto-ai-funghi",
                "ingredients": [],
                "steps": []
            }
        ]),
    );

    let report = merge_files(&store, &candidates).unwrap();

    assert_eq!(report.candidates_received, 3);
    assert_eq!(report.accepted, 1);
    assert_eq!(report.skipped_duplicate, 1);
    assert_eq!(report.skipped_by_axis.url, 1);
    assert_eq!(report.skipped_validation, 1);
    assert_eq!(report.total_after_merge, 2);

    let merged: Value = serde_json::from_slice(&fs::read(&store).unwrap()).unwrap();
    let titles: Vec<&str> = merged
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Pasta al Pomodoro", "Torta Margherita"]);
    // Unknown fields on existing records survive the rewrite
    assert_eq!(merged[0]["rating"], json!(4.5));
    assert_eq!(merged[1]["tags"], json!(["dolci"]));

    let backups = backups(dir.path());
    assert_eq!(backups.len(), 1);
    assert_eq!(fs::read(&backups[0]).unwrap(), before);
    assert_eq!(report.backup.as_deref(), Some(backups[0].to_str().unwrap()));
}

#[test]
fn test_merge_empty_batch_leaves_store_untouched() {
    let dir = TempDir::new().unwrap();
    let store = write_json(dir.path(), "recipes.json", &existing_store());
    let before = fs::read(&store).unwrap();
    let candidates = write_json(dir.path(), "batch.json", &json!([]));

    let report = merge_files(&store, &candidates).unwrap();

    assert_eq!(report.accepted, 0);
    assert_eq!(report.total_after_merge, 1);
    assert!(report.backup.is_none());
    assert_eq!(fs::read(&store).unwrap(), before);
    assert!(backups(dir.path()).is_empty());
}

#[test]
fn test_merge_same_batch_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = write_json(dir.path(), "recipes.json", &existing_store());
    let candidates = write_json(
        dir.path(),
        "batch.json",
        &json!([
            {"title": "Torta di Mele", "ingredients": ["mele"], "steps": ["Infornare"]},
            {"title": "TORTA DI MELE!", "ingredients": ["mele"], "steps": ["Infornare"]}
        ]),
    );

    let first = merge_files(&store, &candidates).unwrap();
    assert_eq!(first.accepted, 1);
    assert_eq!(first.skipped_by_axis.title, 1);
    let after_first = fs::read(&store).unwrap();

    let second = merge_files(&store, &candidates).unwrap();
    assert_eq!(second.accepted, 0);
    assert_eq!(second.skipped_duplicate, 2);
    assert_eq!(fs::read(&store).unwrap(), after_first);
    assert_eq!(backups(dir.path()).len(), 1);
}

#[test]
fn test_merge_keeps_object_store_shape() {
    let dir = TempDir::new().unwrap();
    let store = write_json(
        dir.path(),
        "recipes.json",
        &json!({
            "version": 3,
            "recipes": [{"title": "Pane", "ingredients": ["farina"]}],
            "updatedBy": "scraper"
        }),
    );
    let candidates = write_json(
        dir.path(),
        "batch.json",
        &json!({"recipes": [{"title": "Focaccia", "steps": ["Stendere"]}]}),
    );

    let report = merge_files(&store, &candidates).unwrap();
    assert_eq!(report.accepted, 1);

    let merged: Value = serde_json::from_slice(&fs::read(&store).unwrap()).unwrap();
    let keys: Vec<&String> = merged.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["version", "recipes", "updatedBy"]);
    assert_eq!(merged["recipes"].as_array().unwrap().len(), 2);
    assert_eq!(merged["recipes"][1]["title"], "Focaccia");
}

#[test]
fn test_merge_corrupt_store_fails_without_writing() {
    let dir = TempDir::new().unwrap();
    let store = dir.path().join("recipes.json");
    fs::write(&store, b"{\"recipes\": [").unwrap();
    let candidates = write_json(
        dir.path(),
        "batch.json",
        &json!([{"title": "Focaccia", "steps": ["Stendere"]}]),
    );

    let err = merge_files(&store, &candidates).unwrap_err();

    assert!(matches!(err, MergeError::Store(StoreError::Shape { .. })));
    assert_eq!(fs::read(&store).unwrap(), b"{\"recipes\": [");
    assert!(backups(dir.path()).is_empty());
}

#[test]
fn test_merge_leaves_existing_records_unchanged() {
    let dir = TempDir::new().unwrap();
    let existing = json!({
        "id": "r1",
        "title": "Pasta",
        "sourceUrl": null,
        "ingredients": ["pasta", ""],
        "steps": [],
        "tags": "primi"
    });
    let store = write_json(dir.path(), "recipes.json", &json!([existing.clone()]));
    let candidates = write_json(
        dir.path(),
        "batch.json",
        &json!([{"title": "Polenta", "ingredients": ["mais"]}]),
    );

    let report = merge_files(&store, &candidates).unwrap();
    assert_eq!(report.accepted, 1);

    let merged: Value = serde_json::from_slice(&fs::read(&store).unwrap()).unwrap();
    assert_eq!(merged[0], existing);
    let keys: Vec<&String> = merged[0].as_object().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec!["id", "title", "sourceUrl", "ingredients", "steps", "tags"]
    );
    assert_eq!(merged[1]["title"], "Polenta");
}

#[test]
fn test_merge_into_store_with_structured_legacy_fields() {
    let dir = TempDir::new().unwrap();
    let legacy = json!({
        "title": "Pasta",
        "ingredients": [{"name": "pasta", "qty": "100 g"}],
        "tags": [1, 2]
    });
    let store = write_json(dir.path(), "recipes.json", &json!([legacy.clone()]));
    let candidates = write_json(
        dir.path(),
        "batch.json",
        &json!([
            {"title": "PASTA", "ingredients": ["spaghetti"]},
            {"title": "Polenta", "ingredients": ["mais"]}
        ]),
    );

    let report = merge_files(&store, &candidates).unwrap();

    assert_eq!(report.accepted, 1);
    assert_eq!(report.skipped_by_axis.title, 1);
    let merged: Value = serde_json::from_slice(&fs::read(&store).unwrap()).unwrap();
    assert_eq!(merged[0], legacy);
    assert_eq!(merged[1]["title"], "Polenta");
}

#[test]
fn test_merge_failed_store_write_keeps_backup() {
    let dir = TempDir::new().unwrap();
    let store = write_json(dir.path(), "recipes.json", &existing_store());
    let before = fs::read(&store).unwrap();
    let candidates = write_json(
        dir.path(),
        "batch.json",
        &json!([{"title": "Polenta", "ingredients": ["mais"]}]),
    );
    // the temp sibling used for the atomic write cannot be created as a file
    let blocker = dir
        .path()
        .join(format!("recipes.tmp.{}", std::process::id()));
    fs::create_dir(&blocker).unwrap();

    let err = merge_files(&store, &candidates).unwrap_err();

    let backup = match err {
        MergeError::Store(StoreError::Write { backup, .. }) => backup,
        other => panic!("expected a write error, got {other:?}"),
    };
    assert_eq!(fs::read(&backup).unwrap(), before);
    assert_eq!(backups(dir.path()), vec![PathBuf::from(&backup)]);
    assert_eq!(fs::read(&store).unwrap(), before);
}

#[test]
fn test_merge_missing_store_is_fatal() {
    let dir = TempDir::new().unwrap();
    let candidates = write_json(dir.path(), "batch.json", &json!([]));

    let err = merge_files(dir.path().join("missing.json"), &candidates).unwrap_err();

    assert!(matches!(err, MergeError::Store(StoreError::Read { .. })));
}

#[test]
fn test_merge_drops_undecodable_candidates_only() {
    let dir = TempDir::new().unwrap();
    let store = write_json(dir.path(), "recipes.json", &json!([]));
    let candidates = write_json(
        dir.path(),
        "batch.json",
        &json!([
            {"title": "Frittata", "ingredients": ["uova"]},
            {"title": "Broken", "ingredients": 42},
            "not a record"
        ]),
    );

    let report = merge_files(&store, &candidates).unwrap();

    assert_eq!(report.candidates_received, 3);
    assert_eq!(report.candidates_failed, 2);
    assert_eq!(report.accepted, 1);
}

#[tokio::test]
async fn test_builder_writes_backup_to_backup_dir() {
    let dir = TempDir::new().unwrap();
    let backup_dir = dir.path().join("backups");
    let store = write_json(dir.path(), "recipes.json", &existing_store());
    let before = fs::read(&store).unwrap();

    let report = RecipeMerger::builder()
        .store(&store)
        .backup_dir(&backup_dir)
        .records(vec![serde_json::from_value(json!({
            "title": "Tiramisù",
            "ingredients": ["mascarpone", "savoiardi"]
        }))
        .unwrap()])
        .build()
        .await
        .unwrap();

    assert_eq!(report.accepted, 1);
    assert!(backups(dir.path()).is_empty());
    let written = backups(&backup_dir);
    assert_eq!(written.len(), 1);
    assert_eq!(fs::read(&written[0]).unwrap(), before);
}

#[tokio::test]
async fn test_builder_requires_store() {
    let result = RecipeMerger::builder().records(Vec::new()).build().await;

    assert!(matches!(result, Err(MergeError::BuilderError(_))));
}

#[tokio::test]
async fn test_builder_short_titles_bypass_title_axis() {
    let dir = TempDir::new().unwrap();
    let store = write_json(
        dir.path(),
        "recipes.json",
        &json!([{"title": "Ragù", "ingredients": ["carne"]}]),
    );

    let report = RecipeMerger::builder()
        .store(&store)
        .min_title_len(5)
        .records(vec![serde_json::from_value(json!({
            "title": "ragu",
            "ingredients": ["manzo"]
        }))
        .unwrap()])
        .build()
        .await
        .unwrap();

    assert_eq!(report.accepted, 1);
    assert_eq!(report.total_after_merge, 2);
}
