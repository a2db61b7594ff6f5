// Simple pipeline example
// Author: Gabriel Demetrios Lafis

use std::sync::Arc;

use serde_json::json;

use rust_etl_pipeline_engine::{
    api::PipelineService,
    data::{record_from_json, Record},
    pipeline::{PipelineInput, RunOptions, TransformStepInput},
    processing::StepType,
    storage::{MemoryRecordStore, RecordStore},
    utils::{init_logging, EngineConfig},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(log::LevelFilter::Info)?;

    // Seed the record store
    let store = Arc::new(MemoryRecordStore::new());
    let orders: Vec<Record> = [
        json!({"id": 1, "customer": "alice", "region": "north", "amount": 120.0}),
        json!({"id": 2, "customer": "bob", "region": "south", "amount": 80.0}),
        json!({"id": 3, "customer": "alice", "region": "north", "amount": 45.5}),
        json!({"id": 4, "customer": "carol", "region": "south", "amount": 300.0}),
        json!({"id": 5, "customer": "dave", "region": "east", "amount": 12.0}),
    ]
    .into_iter()
    .map(record_from_json)
    .collect::<Result<_, _>>()?;
    store.create_many("orders", &orders)?;

    let service = PipelineService::new(store.clone(), EngineConfig::default());

    // Filter large orders, total them per region, then rank regions
    let input = PipelineInput {
        name: "regional revenue".to_string(),
        steps: vec![
            TransformStepInput::new(
                "large_orders",
                StepType::Filter,
                json!({
                    "source": "orders",
                    "output": "_tmp_large_orders",
                    "conditions": [{"field": "amount", "operator": "gte", "value": 40}]
                }),
            ),
            TransformStepInput::new(
                "by_region",
                StepType::Aggregate,
                json!({
                    "source": "_tmp_large_orders",
                    "output": "_tmp_region_totals",
                    "groupBy": ["region"],
                    "aggregations": [
                        {"field": "amount", "function": "sum", "as": "revenue"},
                        {"field": "*", "function": "count", "as": "orders"}
                    ]
                }),
            ),
            TransformStepInput::new(
                "ranked",
                StepType::Sort,
                json!({
                    "source": "_tmp_region_totals",
                    "output": "region_revenue",
                    "orderBy": [{"field": "revenue", "direction": "desc"}]
                }),
            ),
        ],
        ..PipelineInput::default()
    };

    let validation = service.validate_pipeline(&input);
    println!("Valid: {} ({} warning(s))", validation.valid, validation.warnings.len());

    let pipeline = service.create_pipeline(input)?;
    let options = RunOptions {
        cleanup_temp_collections: true,
        ..RunOptions::default()
    };
    let run = service.run_pipeline(&pipeline.id, options)?;

    println!("Run {} finished: {:?}", run.id, run.status);
    for result in &run.step_results {
        println!(
            "  {:<14} {:?}: {} -> {} rows",
            result.step_id, result.status, result.input_rows, result.output_rows
        );
    }

    println!("\nRegion revenue:");
    for record in store.find_all("region_revenue", None)? {
        println!("  {}", serde_json::to_string(&record)?);
    }

    println!("\nCollections: {:?}", store.list_collections()?);

    Ok(())
}
