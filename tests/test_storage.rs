// Storage tests
// Author: Gabriel Demetrios Lafis

use std::fs;
use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use rust_etl_pipeline_engine::{
    data::{read_csv_records, read_json_records, record_from_json, Record, Value},
    pipeline::{Pipeline, PipelineInput, PipelineRun, RunOptions, TransformStepInput},
    processing::StepType,
    storage::{
        FileRecordStore, FilterOp, MemoryRecordStore, PipelineRepository, RecordFilter,
        RecordStore, StorageError, StoreRepository, PIPELINES_COLLECTION,
    },
};

fn record(json: serde_json::Value) -> Record {
    record_from_json(json).unwrap()
}

fn products() -> Vec<Record> {
    vec![
        record(json!({"sku": "A-1", "price": 10, "tags": ["new"]})),
        record(json!({"sku": "A-2", "price": 25.5, "tags": []})),
        record(json!({"sku": "B-1", "price": 40})),
    ]
}

/// Behaviour shared by every record store
fn exercise_store(store: &dyn RecordStore) {
    assert!(!store.has_collection("products").unwrap());

    store.create_collection("products").unwrap();
    assert!(store.has_collection("products").unwrap());
    assert!(store.find_all("products", None).unwrap().is_empty());

    assert_eq!(store.create_many("products", &products()).unwrap(), 3);
    assert_eq!(store.find_all("products", None).unwrap(), products());

    let cheap = store
        .find("products", &RecordFilter::field("price", FilterOp::Lt, 30i64))
        .unwrap();
    assert_eq!(cheap.len(), 2);

    let a_series = RecordFilter::And(vec![
        RecordFilter::field("sku", FilterOp::StartsWith, "A-"),
        RecordFilter::field("tags", FilterOp::Contains, "new"),
    ]);
    assert_eq!(store.find_all("products", Some(&a_series)).unwrap(), vec![products()[0].clone()]);

    let removed = store
        .delete_where("products", &RecordFilter::eq("sku", "B-1"))
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.find_all("products", None).unwrap().len(), 2);

    store.clear("products").unwrap();
    assert!(store.has_collection("products").unwrap());
    assert!(store.find_all("products", None).unwrap().is_empty());

    // Writing creates missing collections
    store.create_many("archive", &products()).unwrap();
    assert_eq!(
        store.list_collections().unwrap(),
        vec!["archive".to_string(), "products".to_string()]
    );

    store.drop_collection("archive").unwrap();
    assert!(!store.has_collection("archive").unwrap());
    assert!(matches!(
        store.find_all("archive", None),
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        store.drop_collection("archive"),
        Err(StorageError::NotFound(_))
    ));
    assert_eq!(store.delete_where("archive", &RecordFilter::All).unwrap(), 0);
}

#[test]
fn test_memory_store() {
    exercise_store(&MemoryRecordStore::new());
}

#[test]
fn test_memory_store_clones_share_data() {
    let store = MemoryRecordStore::new();
    let other = store.clone();

    store.create_many("products", &products()).unwrap();
    assert_eq!(other.find_all("products", None).unwrap().len(), 3);
}

#[test]
fn test_file_store() {
    let dir = tempdir().unwrap();
    let store = FileRecordStore::new(dir.path().join("data")).unwrap();

    exercise_store(&store);
    assert!(dir.path().join("data").join("products.json").exists());
}

#[test]
fn test_file_store_persists_between_instances() {
    let dir = tempdir().unwrap();

    {
        let store = FileRecordStore::new(dir.path()).unwrap();
        store.create_many("products", &products()).unwrap();
    }

    let reopened = FileRecordStore::new(dir.path()).unwrap();
    let records = reopened.find_all("products", None).unwrap();
    assert_eq!(records, products());
    assert_eq!(records[1]["price"], Value::Float(25.5));
}

#[test]
fn test_file_store_rejects_path_names() {
    let dir = tempdir().unwrap();
    let store = FileRecordStore::new(dir.path()).unwrap();

    for name in ["", "..", "../escape", "a/b", "a\\b"] {
        assert!(
            matches!(store.create_collection(name), Err(StorageError::InvalidName(_))),
            "{:?} should be rejected",
            name
        );
    }
}

#[test]
fn test_record_filter_nin_and_or() {
    let items = products();
    let filter = RecordFilter::Or(vec![
        RecordFilter::field("sku", FilterOp::Nin, Value::Array(vec!["A-1".into(), "A-2".into()])),
        RecordFilter::field("price", FilterOp::Eq, 10i64),
    ]);

    let matched: Vec<&Record> = items.iter().filter(|r| filter.matches(r)).collect();
    assert_eq!(matched.len(), 2);
    assert!(RecordFilter::default().matches(&items[0]));
}

fn sample_pipeline(name: &str) -> Pipeline {
    Pipeline::from_input(PipelineInput {
        name: name.to_string(),
        steps: vec![TransformStepInput::new(
            "top",
            StepType::Limit,
            json!({"source": "products", "output": "top_products", "limit": 2}),
        )],
        ..PipelineInput::default()
    })
    .unwrap()
}

#[test]
fn test_repository_round_trip() {
    let store = Arc::new(MemoryRecordStore::new());
    let repository = StoreRepository::new(store.clone());

    let pipeline = sample_pipeline("catalog");
    repository.save_pipeline(&pipeline).unwrap();
    assert_eq!(repository.find_pipeline(&pipeline.id).unwrap(), Some(pipeline.clone()));

    // Saving again replaces the stored copy
    let mut renamed = pipeline.clone();
    renamed.name = "catalog v2".to_string();
    repository.save_pipeline(&renamed).unwrap();
    assert_eq!(store.find_all(PIPELINES_COLLECTION, None).unwrap().len(), 1);
    assert_eq!(repository.find_pipeline(&pipeline.id).unwrap().unwrap().name, "catalog v2");

    assert!(repository.find_pipeline("unknown").unwrap().is_none());
    assert!(repository.delete_pipeline(&pipeline.id).unwrap());
    assert!(!repository.delete_pipeline(&pipeline.id).unwrap());
}

#[test]
fn test_repository_runs() {
    let store = Arc::new(MemoryRecordStore::new());
    let repository = StoreRepository::new(store);

    assert!(repository.list_runs("nothing").unwrap().is_empty());

    let pipeline = sample_pipeline("catalog");
    let other = sample_pipeline("other");

    let first = PipelineRun::new(&pipeline, &RunOptions::default());
    let second = PipelineRun::new(&pipeline, &RunOptions::default());
    let unrelated = PipelineRun::new(&other, &RunOptions::default());
    for run in [&first, &second, &unrelated] {
        repository.save_run(run).unwrap();
    }

    let runs = repository.list_runs(&pipeline.id).unwrap();
    let ids: Vec<&str> = runs.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

    assert_eq!(repository.find_run(&first.id).unwrap(), Some(first.clone()));
    assert_eq!(repository.delete_runs(&pipeline.id).unwrap(), 2);
    assert_eq!(repository.list_runs(&other.id).unwrap().len(), 1);
}

#[test]
fn test_read_csv_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.csv");
    fs::write(&path, "id,name,score,active,note\n1,Ana,9.5,true,\n2,Bo,7,false,late\n").unwrap();

    let records = read_csv_records(&path).unwrap();

    assert_eq!(
        records,
        vec![
            record(json!({"id": 1, "name": "Ana", "score": 9.5, "active": true, "note": null})),
            record(json!({"id": 2, "name": "Bo", "score": 7, "active": false, "note": "late"})),
        ]
    );
}

#[test]
fn test_read_json_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("export.json");
    fs::write(&path, r#"{"data": {"items": [{"id": 1, "meta": {"ok": true}}, {"id": 2}]}}"#).unwrap();

    let records = read_json_records(&path, Some("data.items")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["meta"], Value::Object(record(json!({"ok": true}))));

    assert!(read_json_records(&path, None).is_err());
    assert!(read_json_records(&path, Some("data.missing")).is_err());
}
