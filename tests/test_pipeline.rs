// Pipeline tests
// Author: Gabriel Demetrios Lafis

use mockall::mock;
use serde_json::json;

use rust_etl_pipeline_engine::{
    data::{record_from_json, Record, RecordSet, Value},
    pipeline::{
        dependents, resolve_order, CancellationToken, Orchestrator, Pipeline, PipelineInput,
        PipelineRun, RunOptions, RunStatus, StepNode, StepStatus, TransformStepInput,
    },
    processing::StepType,
    storage::{MemoryRecordStore, RecordFilter, RecordStore, StorageError, PIPELINES_COLLECTION},
    utils::EngineConfig,
};

mock! {
    pub Store {}

    impl RecordStore for Store {
        fn has_collection(&self, name: &str) -> Result<bool, StorageError>;
        fn create_collection(&self, name: &str) -> Result<(), StorageError>;
        fn find(&self, name: &str, filter: &RecordFilter) -> Result<RecordSet, StorageError>;
        fn create_many(&self, name: &str, records: &[Record]) -> Result<usize, StorageError>;
        fn clear(&self, name: &str) -> Result<(), StorageError>;
        fn delete_where(&self, name: &str, filter: &RecordFilter) -> Result<usize, StorageError>;
        fn drop_collection(&self, name: &str) -> Result<(), StorageError>;
        fn list_collections(&self) -> Result<Vec<String>, StorageError>;
    }
}

fn record(json: serde_json::Value) -> Record {
    record_from_json(json).unwrap()
}

fn users() -> RecordSet {
    vec![
        record(json!({"id": 1, "name": "Alice", "active": true})),
        record(json!({"id": 2, "name": "Bob", "active": false})),
        record(json!({"id": 3, "name": "Carol", "active": true})),
    ]
}

fn user_store() -> MemoryRecordStore {
    MemoryRecordStore::with_collections(vec![("users".to_string(), users())])
}

fn filter_step(id: &str, source: &str, output: &str) -> TransformStepInput {
    TransformStepInput::new(
        id,
        StepType::Filter,
        json!({
            "source": source,
            "output": output,
            "conditions": [{"field": "active", "operator": "eq", "value": true}]
        }),
    )
}

fn sort_step(id: &str, source: &str, output: &str) -> TransformStepInput {
    TransformStepInput::new(
        id,
        StepType::Sort,
        json!({"source": source, "output": output, "orderBy": [{"field": "name", "direction": "desc"}]}),
    )
}

fn pipeline(steps: Vec<TransformStepInput>) -> Pipeline {
    Pipeline::from_input(PipelineInput {
        name: "test".to_string(),
        steps,
        ..PipelineInput::default()
    })
    .unwrap()
}

fn nodes(steps: &[TransformStepInput]) -> Vec<StepNode> {
    steps.iter().enumerate().map(|(i, s)| StepNode::from_input(i, s)).collect()
}

fn run(store: &dyn RecordStore, pipeline: &Pipeline, options: RunOptions) -> PipelineRun {
    let orchestrator = Orchestrator::new(store, &EngineConfig::default());
    orchestrator.run(pipeline, &options, &CancellationToken::new())
}

#[test]
fn test_resolve_follows_data_flow() {
    // Declared in reverse order of execution
    let steps = vec![
        sort_step("c", "b_out", "c_out"),
        sort_step("b", "a_out", "b_out"),
        filter_step("a", "users", "a_out"),
    ];

    assert_eq!(resolve_order(&nodes(&steps)).unwrap(), vec![2, 1, 0]);
}

#[test]
fn test_resolve_uses_order_then_position() {
    let steps = vec![
        filter_step("late", "users", "x").with_order(5),
        filter_step("first", "users", "y").with_order(1),
        filter_step("second", "users", "z").with_order(1),
    ];

    assert_eq!(resolve_order(&nodes(&steps)).unwrap(), vec![1, 2, 0]);
}

#[test]
fn test_resolve_depends_on() {
    let steps = vec![
        filter_step("report", "users", "report").depends_on(&["load"]),
        filter_step("load", "users", "loaded").with_order(10),
    ];

    assert_eq!(resolve_order(&nodes(&steps)).unwrap(), vec![1, 0]);
}

#[test]
fn test_resolve_cycle() {
    let steps = vec![
        filter_step("entry", "users", "entry_out"),
        sort_step("a", "b_out", "a_out"),
        sort_step("b", "a_out", "b_out"),
    ];

    let err = resolve_order(&nodes(&steps)).unwrap_err();
    assert_eq!(err.step_ids, vec!["a".to_string(), "b".to_string()]);
    assert!(err.to_string().contains("Cyclic dependency"));
}

#[test]
fn test_reading_own_output_is_not_a_cycle() {
    let steps = vec![filter_step("refresh", "users", "users")];
    assert_eq!(resolve_order(&nodes(&steps)).unwrap(), vec![0]);
}

#[test]
fn test_depending_on_itself_is_a_cycle() {
    let steps = vec![
        filter_step("a", "users", "a_out").depends_on(&["a"]),
        filter_step("b", "users", "b_out"),
    ];

    let err = resolve_order(&nodes(&steps)).unwrap_err();
    assert_eq!(err.step_ids, vec!["a".to_string()]);
}

#[test]
fn test_dependents_are_transitive() {
    let steps = vec![
        filter_step("a", "users", "a_out"),
        sort_step("b", "a_out", "b_out"),
        sort_step("c", "b_out", "c_out"),
        sort_step("d", "users", "d_out"),
    ];

    let reached = dependents(&nodes(&steps), 0);
    assert_eq!(reached.len(), 2);
    assert!(reached.contains(&1) && reached.contains(&2));
}

#[test]
fn test_filter_run() {
    let store = user_store();
    let pipeline = pipeline(vec![filter_step("active", "users", "active_users")]);

    let result = run(&store, &pipeline, RunOptions::default());

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.error.is_none());
    assert!(result.started_at.is_some() && result.completed_at.is_some());

    let step = result.step_result("active").unwrap();
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.input_rows, 3);
    assert_eq!(step.output_rows, 2);

    let stored = store.find_all("active_users", None).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0]["name"], Value::from("Alice"));
}

#[test]
fn test_chained_steps_read_earlier_outputs() {
    let store = user_store();
    let pipeline = pipeline(vec![
        sort_step("sorted", "active_users", "sorted_users"),
        filter_step("active", "users", "active_users"),
    ]);

    let result = run(&store, &pipeline, RunOptions::default());
    assert_eq!(result.status, RunStatus::Completed);

    let sorted = store.find_all("sorted_users", None).unwrap();
    let names: Vec<_> = sorted.iter().map(|r| r["name"].clone()).collect();
    assert_eq!(names, vec![Value::from("Carol"), Value::from("Alice")]);
}

#[test]
fn test_rerun_replaces_output() {
    let store = user_store();
    let pipeline = pipeline(vec![filter_step("active", "users", "active_users")]);

    run(&store, &pipeline, RunOptions::default());
    run(&store, &pipeline, RunOptions::default());

    assert_eq!(store.find_all("active_users", None).unwrap().len(), 2);
}

fn failing_pipeline() -> Pipeline {
    pipeline(vec![
        filter_step("broken", "no_such_collection", "broken_out"),
        sort_step("downstream", "broken_out", "downstream_out"),
        filter_step("independent", "users", "independent_out").with_order(5),
    ])
}

#[test]
fn test_failure_halts_run() {
    let store = user_store();
    let result = run(&store, &failing_pipeline(), RunOptions::default());

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("broken"));

    let broken = result.step_result("broken").unwrap();
    assert_eq!(broken.status, StepStatus::Failed);
    assert!(broken.error.as_deref().unwrap().contains("no_such_collection"));

    assert_eq!(result.step_result("downstream").unwrap().status, StepStatus::Skipped);
    assert_eq!(result.step_result("independent").unwrap().status, StepStatus::Skipped);
    assert!(!store.has_collection("independent_out").unwrap());
}

#[test]
fn test_continue_on_error_runs_independent_steps() {
    let store = user_store();
    let options = RunOptions {
        continue_on_error: true,
        ..RunOptions::default()
    };

    let result = run(&store, &failing_pipeline(), options);

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.step_result("broken").unwrap().status, StepStatus::Failed);
    assert_eq!(result.step_result("downstream").unwrap().status, StepStatus::Skipped);
    assert_eq!(result.step_result("independent").unwrap().status, StepStatus::Completed);
    assert_eq!(store.find_all("independent_out", None).unwrap().len(), 2);
}

#[test]
fn test_step_results_follow_execution_order() {
    let store = user_store();
    // Declared in reverse order of execution
    let pipeline = pipeline(vec![
        sort_step("second", "active_users", "sorted_users"),
        filter_step("first", "users", "active_users"),
    ]);

    let pending = PipelineRun::new(&pipeline, &RunOptions::default());
    let pending_ids: Vec<&str> = pending.step_results.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(pending_ids, vec!["first", "second"]);

    let result = run(&store, &pipeline, RunOptions::default());
    let ids: Vec<&str> = result.step_results.iter().map(|r| r.step_id.as_str()).collect();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(ids, vec!["first", "second"]);
    assert_eq!(result.step_results[0].input_rows, 3);
    assert_eq!(result.step_results[0].output_rows, 2);
    assert_eq!(result.step_results[1].output_rows, 2);
}

#[test]
fn test_cycle_keeps_declared_order() {
    let store = user_store();
    let pipeline = pipeline(vec![
        sort_step("b", "a_out", "b_out"),
        sort_step("a", "b_out", "a_out"),
    ]);

    let result = run(&store, &pipeline, RunOptions::default());
    let ids: Vec<&str> = result.step_results.iter().map(|r| r.step_id.as_str()).collect();

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(ids, vec!["b", "a"]);
}

#[test]
fn test_reserved_collections_are_never_written() {
    let store = user_store();
    store
        .create_many(PIPELINES_COLLECTION, &[record(json!({"id": "keep"}))])
        .unwrap();

    let pipeline = pipeline(vec![filter_step("overwrite", "users", PIPELINES_COLLECTION)]);
    let result = run(&store, &pipeline, RunOptions::default());

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.step_results[0].status, StepStatus::Failed);
    assert!(result.step_results[0].error.as_deref().unwrap().contains("reserved"));
    assert_eq!(store.find_all(PIPELINES_COLLECTION, None).unwrap().len(), 1);
}

#[test]
fn test_cycle_fails_run_without_executing() {
    let store = user_store();
    let pipeline = pipeline(vec![
        sort_step("a", "b_out", "a_out"),
        sort_step("b", "a_out", "b_out"),
    ]);

    let result = run(&store, &pipeline, RunOptions::default());

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.error.as_deref().unwrap().contains("Cyclic dependency"));
    assert!(result.step_results.iter().all(|r| r.status == StepStatus::Skipped));
}

#[test]
fn test_dry_run_writes_nothing() {
    let store = user_store();
    let pipeline = pipeline(vec![
        filter_step("active", "users", "active_users"),
        sort_step("sorted", "active_users", "sorted_users"),
    ]);
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };

    let result = run(&store, &pipeline, options);

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.dry_run);
    assert_eq!(result.step_result("sorted").unwrap().output_rows, 2);
    assert_eq!(store.list_collections().unwrap(), vec!["users".to_string()]);
}

#[test]
fn test_cancelled_run() {
    let store = user_store();
    let pipeline = pipeline(vec![filter_step("active", "users", "active_users")]);

    let token = CancellationToken::new();
    token.cancel();

    let orchestrator = Orchestrator::new(&store, &EngineConfig::default());
    let result = orchestrator.run(&pipeline, &RunOptions::default(), &token);

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.error.as_deref(), Some("Run was cancelled"));
    assert_eq!(result.step_results[0].status, StepStatus::Skipped);
    assert!(!store.has_collection("active_users").unwrap());
}

#[test]
fn test_cleanup_removes_temporary_collections() {
    let store = user_store();
    let pipeline = pipeline(vec![
        filter_step("active", "users", "_tmp_active"),
        sort_step("sorted", "_tmp_active", "sorted_users"),
    ]);
    let options = RunOptions {
        cleanup_temp_collections: true,
        ..RunOptions::default()
    };

    let result = run(&store, &pipeline, options);

    assert_eq!(result.status, RunStatus::Completed);
    assert!(!store.has_collection("_tmp_active").unwrap());
    assert_eq!(store.find_all("sorted_users", None).unwrap().len(), 2);
}

#[test]
fn test_dry_run_never_touches_store_writes() {
    let mut store = MockStore::new();

    // Only the source collection is read
    store
        .expect_has_collection()
        .withf(|name: &str| name == "users")
        .returning(|_| Ok(true));
    store
        .expect_find()
        .withf(|name: &str, filter: &RecordFilter| name == "users" && *filter == RecordFilter::All)
        .times(1)
        .returning(|_, _| Ok(users()));
    store.expect_create_collection().never();
    store.expect_clear().never();
    store.expect_create_many().never();

    let pipeline = pipeline(vec![
        filter_step("active", "users", "active_users"),
        sort_step("sorted", "active_users", "sorted_users"),
    ]);
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::default()
    };

    let result = run(&store, &pipeline, options);
    assert_eq!(result.status, RunStatus::Completed);
}

#[test]
fn test_cleanup_drops_only_temporary_collections() {
    let mut store = MockStore::new();

    store
        .expect_has_collection()
        .returning(|name| Ok(name == "users" || name.starts_with("_tmp_")));
    store.expect_find().returning(|_, _| Ok(users()));
    store.expect_create_collection().returning(|_| Ok(()));
    store.expect_clear().returning(|_| Ok(()));
    store
        .expect_create_many()
        .returning(|_, records: &[Record]| Ok(records.len()));
    store
        .expect_drop_collection()
        .withf(|name: &str| name == "_tmp_active")
        .times(1)
        .returning(|_| Ok(()));

    let pipeline = pipeline(vec![
        filter_step("active", "users", "_tmp_active"),
        sort_step("sorted", "_tmp_active", "sorted_users"),
    ]);
    let options = RunOptions {
        cleanup_temp_collections: true,
        ..RunOptions::default()
    };

    let result = run(&store, &pipeline, options);
    assert_eq!(result.status, RunStatus::Completed);
}

#[test]
fn test_storage_failure_fails_step() {
    let mut store = MockStore::new();

    store.expect_has_collection().returning(|name| Ok(name == "users"));
    store.expect_find().returning(|_, _| Ok(users()));
    store.expect_create_collection().returning(|_| Ok(()));
    store.expect_clear().returning(|_| Ok(()));
    store
        .expect_create_many()
        .returning(|_, _| Err(StorageError::Other("disk full".to_string())));

    let pipeline = pipeline(vec![filter_step("active", "users", "active_users")]);
    let result = run(&store, &pipeline, RunOptions::default());

    assert_eq!(result.status, RunStatus::Failed);
    let step = result.step_result("active").unwrap();
    assert_eq!(step.status, StepStatus::Failed);
    assert!(step.error.as_deref().unwrap().contains("disk full"));
}
