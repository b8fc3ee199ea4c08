//! Round trip against a live MongoDB. Run with
//! `MONGO_TEST_URI=mongodb://localhost:27017 cargo test -- --ignored`.

use anyhow::Result;
use chrono::NaiveDate;
use patient_loader::config::StoreConfig;
use patient_loader::db::MongoStore;
use patient_loader::error::LoaderError;
use patient_loader::storage::DocumentStore;
use patient_loader::types::{FieldValue, NormalizedRecord};

fn test_config() -> Option<StoreConfig> {
    let uri = std::env::var("MONGO_TEST_URI").ok()?;
    Some(StoreConfig {
        uri,
        database: "patient_loader_test".to_string(),
        collection: format!("patients_{}", uuid::Uuid::new_v4().simple()),
        connect_timeout_secs: 5,
    })
}

fn record(name: &str, admitted: NaiveDate) -> NormalizedRecord {
    NormalizedRecord::new(vec![
        ("Name".to_string(), FieldValue::Text(name.to_string())),
        ("Date of Admission".to_string(), FieldValue::Date(admitted)),
    ])
}

#[tokio::test]
#[ignore]
async fn test_clear_and_insert_round_trip() -> Result<()> {
    let Some(config) = test_config() else {
        eprintln!("MONGO_TEST_URI not set, skipping");
        return Ok(());
    };
    let store = MongoStore::connect(&config).await?;
    let collection = config.collection.as_str();

    assert_eq!(store.clear(collection).await?, 0);
    assert_eq!(store.insert_batch(collection, &[]).await?, 0);

    let day = NaiveDate::from_ymd_opt(2020, 2, 1).unwrap();
    let inserted = store
        .insert_batch(collection, &[record("Anna Lee", day), record("Bob", day)])
        .await?;
    assert_eq!(inserted, 2);

    assert_eq!(store.clear(collection).await?, 2);
    assert_eq!(store.clear(collection).await?, 0);

    store.database().collection::<mongodb::bson::Document>(collection).drop().await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_unreachable_server_is_connection_error() {
    let config = StoreConfig {
        uri: "mongodb://127.0.0.1:1".to_string(),
        connect_timeout_secs: 1,
        ..StoreConfig::default()
    };
    let result = MongoStore::connect(&config).await;
    assert!(matches!(result, Err(LoaderError::StoreConnection { .. })));
}
