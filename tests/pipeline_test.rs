use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use mongodb::bson::{doc, Document};
use patient_loader::config::{Config, InvalidRowPolicy};
use patient_loader::error::{LoaderError, TransformError};
use patient_loader::pipeline::Pipeline;
use patient_loader::storage::{DocumentStore, InMemoryStore};
use patient_loader::types::NormalizedRecord;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

const HEADER: &str = "Name;Age;Date of Admission;Hospital;Discharge Date";

fn write_csv(dir: &Path, name: &str, rows: &[&str]) -> Result<()> {
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    fs::write(dir.join(name), content)?;
    Ok(())
}

fn config_for(dir: &Path) -> Config {
    let mut config = Config::default();
    config.input.dir = dir.to_path_buf();
    config
}

fn midnight_millis(y: i32, m: u32, d: u32) -> i64 {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_time(NaiveTime::MIN)
        .and_utc()
        .timestamp_millis()
}

fn names(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .map(|d| d.get_str("Name").unwrap().to_string())
        .collect()
}

/// In-memory store that fails a chosen operation
#[derive(Default)]
struct FailingStore {
    inner: InMemoryStore,
    fail_clear: bool,
    fail_insert_call: Option<usize>,
    insert_calls: AtomicUsize,
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn clear(&self, collection: &str) -> patient_loader::error::Result<u64> {
        if self.fail_clear {
            return Err(LoaderError::StoreConnection {
                message: "connection reset by peer".to_string(),
            });
        }
        self.inner.clear(collection).await
    }

    async fn insert_batch(
        &self,
        collection: &str,
        records: &[NormalizedRecord],
    ) -> patient_loader::error::Result<u64> {
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_insert_call == Some(call) {
            return Err(LoaderError::StoreOperation {
                operation: "insert_many",
                collection: collection.to_string(),
                message: "write concern error".to_string(),
            });
        }
        self.inner.insert_batch(collection, records).await
    }
}

#[tokio::test]
async fn test_end_to_end_single_file() -> Result<()> {
    let dir = tempdir()?;
    write_csv(
        dir.path(),
        "patients.csv",
        &[
            "anna lee;30;01/02/2020;General;05/02/2020",
            "bob;45;31/12/2019;General;02/01/2020",
        ],
    )?;

    let store = Arc::new(InMemoryStore::new());
    let config = config_for(dir.path());
    let summary = Pipeline::run(store.clone(), &config).await?;

    assert_eq!(summary.inserted(), 2);
    assert_eq!(summary.deleted, 0);

    let docs = store.documents("patients")?;
    assert_eq!(docs.len(), 2);
    assert_eq!(names(&docs), vec!["Anna Lee", "Bob"]);

    assert_eq!(
        docs[0].get_datetime("Date of Admission")?.timestamp_millis(),
        midnight_millis(2020, 2, 1)
    );
    assert_eq!(
        docs[0].get_datetime("Discharge Date")?.timestamp_millis(),
        midnight_millis(2020, 2, 5)
    );
    assert_eq!(
        docs[1].get_datetime("Date of Admission")?.timestamp_millis(),
        midnight_millis(2019, 12, 31)
    );
    assert_eq!(
        docs[1].get_datetime("Discharge Date")?.timestamp_millis(),
        midnight_millis(2020, 1, 2)
    );

    // Untouched columns stay strings
    assert_eq!(docs[0].get_str("Age")?, "30");
    assert!(docs[0].get_object_id("_id").is_ok());
    Ok(())
}

#[tokio::test]
async fn test_two_files_clear_once_and_insert_union() -> Result<()> {
    let dir = tempdir()?;
    write_csv(dir.path(), "a.csv", &["anna lee;30;01/02/2020;General;05/02/2020"])?;
    write_csv(
        dir.path(),
        "b.CSV",
        &[
            "bob;45;31/12/2019;General;02/01/2020",
            "cLARA oSWALD;27;15/06/2021;North;20/06/2021",
        ],
    )?;
    fs::write(dir.path().join("readme.txt"), "not a csv")?;

    let store = Arc::new(InMemoryStore::new());
    store.seed("patients", vec![doc! { "Name": "Stale Record" }])?;

    let summary = Pipeline::run(store.clone(), &config_for(dir.path())).await?;

    assert_eq!(store.clear_calls(), 1);
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.files.len(), 2);

    let docs = store.documents("patients")?;
    assert_eq!(names(&docs), vec!["Anna Lee", "Bob", "Clara Oswald"]);
    Ok(())
}

#[tokio::test]
async fn test_bad_row_aborts_run_but_keeps_earlier_files() -> Result<()> {
    let dir = tempdir()?;
    write_csv(dir.path(), "1_good.csv", &["anna lee;30;01/02/2020;General;05/02/2020"])?;
    write_csv(
        dir.path(),
        "2_bad.csv",
        &[
            "bob;45;31/12/2019;General;02/01/2020",
            ";50;01/01/2021;General;03/01/2021",
        ],
    )?;
    write_csv(dir.path(), "3_never.csv", &["carl;50;01/01/2021;General;03/01/2021"])?;

    let store = Arc::new(InMemoryStore::new());
    let err = Pipeline::run(store.clone(), &config_for(dir.path()))
        .await
        .unwrap_err();

    match err {
        LoaderError::Transform { path, row, source } => {
            assert!(path.ends_with("2_bad.csv"));
            assert_eq!(row, 2);
            assert_eq!(source, TransformError::MissingField("Name".to_string()));
        }
        other => panic!("expected transform error, got {other:?}"),
    }

    let docs = store.documents("patients")?;
    assert_eq!(names(&docs), vec!["Anna Lee"]);
    Ok(())
}

#[tokio::test]
async fn test_skip_policy_loads_valid_rows() -> Result<()> {
    let dir = tempdir()?;
    write_csv(
        dir.path(),
        "mixed.csv",
        &[
            "anna lee;30;01/02/2020;General;05/02/2020",
            "bob;45;31/13/2019;General;02/01/2020",
        ],
    )?;

    let store = Arc::new(InMemoryStore::new());
    let mut config = config_for(dir.path());
    config.input.on_invalid_row = InvalidRowPolicy::Skip;

    let summary = Pipeline::run(store.clone(), &config).await?;
    assert_eq!(summary.rows_skipped(), 1);
    assert_eq!(names(&store.documents("patients")?), vec!["Anna Lee"]);
    Ok(())
}

#[tokio::test]
async fn test_empty_directory_still_clears() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(InMemoryStore::new());
    store.seed("patients", vec![doc! { "Name": "Stale Record" }])?;

    let summary = Pipeline::run(store.clone(), &config_for(dir.path())).await?;
    assert!(summary.files.is_empty());
    assert_eq!(summary.deleted, 1);
    assert!(store.documents("patients")?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_missing_input_dir_leaves_collection_untouched() -> Result<()> {
    let dir = tempdir()?;
    let store = Arc::new(InMemoryStore::new());
    store.seed("patients", vec![doc! { "Name": "Keep Me" }])?;

    let result = Pipeline::run(store.clone(), &config_for(&dir.path().join("missing"))).await;
    assert!(matches!(result, Err(LoaderError::Io(_))));
    assert_eq!(store.clear_calls(), 0);
    assert_eq!(store.documents("patients")?.len(), 1);
    Ok(())
}

#[test]
fn test_dry_run_touches_no_store() -> Result<()> {
    let dir = tempdir()?;
    write_csv(
        dir.path(),
        "patients.csv",
        &[
            "anna lee;30;01/02/2020;General;05/02/2020",
            "bob;45;31/12/2019;General;02/01/2020",
        ],
    )?;

    let summary = Pipeline::dry_run(&config_for(dir.path()))?;
    assert!(summary.dry_run);
    assert_eq!(summary.rows_loaded(), 2);
    assert_eq!(summary.inserted(), 0);
    Ok(())
}

#[tokio::test]
async fn test_run_on_a_second_collection_is_isolated() -> Result<()> {
    let dir = tempdir()?;
    write_csv(dir.path(), "a.csv", &["anna lee;30;01/02/2020;General;05/02/2020"])?;

    let store = Arc::new(InMemoryStore::new());
    store.seed("other", vec![doc! { "Name": "Elsewhere" }])?;

    let mut config = config_for(dir.path());
    config.store.collection = "admissions".to_string();
    Pipeline::run(store.clone(), &config).await?;

    assert_eq!(store.documents("admissions")?.len(), 1);
    assert_eq!(store.documents("other")?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_insert_failure_aborts_run_and_keeps_earlier_files() -> Result<()> {
    let dir = tempdir()?;
    write_csv(dir.path(), "1_a.csv", &["anna lee;30;01/02/2020;General;05/02/2020"])?;
    write_csv(dir.path(), "2_b.csv", &["bob;45;31/12/2019;General;02/01/2020"])?;
    write_csv(dir.path(), "3_c.csv", &["carl;50;01/01/2021;General;03/01/2021"])?;

    let store = Arc::new(FailingStore {
        fail_insert_call: Some(2),
        ..FailingStore::default()
    });
    let err = Pipeline::run(store.clone(), &config_for(dir.path()))
        .await
        .unwrap_err();

    match err {
        LoaderError::StoreOperation {
            operation,
            collection,
            ..
        } => {
            assert_eq!(operation, "insert_many");
            assert_eq!(collection, "patients");
        }
        other => panic!("expected store operation error, got {other:?}"),
    }

    assert_eq!(names(&store.inner.documents("patients")?), vec!["Anna Lee"]);
    // The third file is never handed to the store
    assert_eq!(store.insert_calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_clear_failure_inserts_nothing() -> Result<()> {
    let dir = tempdir()?;
    write_csv(dir.path(), "a.csv", &["anna lee;30;01/02/2020;General;05/02/2020"])?;

    let store = Arc::new(FailingStore {
        fail_clear: true,
        ..FailingStore::default()
    });
    let result = Pipeline::run(store.clone(), &config_for(dir.path())).await;

    assert!(matches!(result, Err(LoaderError::StoreConnection { .. })));
    assert_eq!(store.insert_calls.load(Ordering::SeqCst), 0);
    assert!(store.inner.documents("patients")?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_summary_json_is_parseable() -> Result<()> {
    let dir = tempdir()?;
    write_csv(
        dir.path(),
        "patients.csv",
        &[
            "anna lee;30;01/02/2020;General;05/02/2020",
            "bob;45;31/12/2019;General;02/01/2020",
        ],
    )?;

    let store = Arc::new(InMemoryStore::new());
    let summary = Pipeline::run(store, &config_for(dir.path())).await?;

    let value: serde_json::Value = serde_json::from_str(&summary.to_json()?)?;
    assert_eq!(value["run_id"], summary.run_id.to_string());
    assert_eq!(value["collection"], "patients");
    assert_eq!(value["dry_run"], false);
    assert_eq!(value["files"][0]["rows_loaded"], 2);
    assert_eq!(value["files"][0]["inserted"], 2);
    Ok(())
}
