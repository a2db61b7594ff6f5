// Rust ETL Pipeline Engine
// Author: Gabriel Demetrios Lafis

//! # Rust ETL Pipeline Engine
//!
//! An embedded ETL engine: pipelines of transformation steps over named
//! record sets, executed in dependency order.
//!
//! ## Features
//!
//! - A per-record expression language (field paths, templates, math, dates,
//!   arrays and strings, conditionals)
//! - Twelve step types: filter, map, aggregate, join, lookup, union,
//!   deduplicate, sort, limit, pivot, unpivot and flatten
//! - Dependency resolution with stable ordering and cycle detection
//! - Runs with per-step metrics, failure policy, dry runs and cancellation
//! - Static validation of pipeline definitions
//! - In-memory and JSON-file record stores
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rust_etl_pipeline_engine::{
//!     api::PipelineService,
//!     data::record_from_json,
//!     pipeline::{PipelineInput, RunOptions, RunStatus, TransformStepInput},
//!     processing::StepType,
//!     storage::{MemoryRecordStore, RecordStore},
//!     utils::EngineConfig,
//! };
//! use serde_json::json;
//!
//! let store = Arc::new(MemoryRecordStore::new());
//! let users = vec![
//!     record_from_json(json!({"name": "Ana", "active": true})).unwrap(),
//!     record_from_json(json!({"name": "Bo", "active": false})).unwrap(),
//! ];
//! store.create_many("users", &users).unwrap();
//!
//! let service = PipelineService::new(store.clone(), EngineConfig::default());
//! let pipeline = service
//!     .create_pipeline(PipelineInput {
//!         name: "active users".to_string(),
//!         steps: vec![TransformStepInput::new(
//!             "only_active",
//!             StepType::Filter,
//!             json!({
//!                 "source": "users",
//!                 "output": "active_users",
//!                 "conditions": [{"field": "active", "operator": "eq", "value": true}]
//!             }),
//!         )],
//!         ..PipelineInput::default()
//!     })
//!     .unwrap();
//!
//! let run = service.run_pipeline(&pipeline.id, RunOptions::default()).unwrap();
//! assert_eq!(run.status, RunStatus::Completed);
//! assert_eq!(store.find_all("active_users", None).unwrap().len(), 1);
//! ```

pub mod api;
pub mod data;
pub mod expression;
pub mod pipeline;
pub mod processing;
pub mod storage;
pub mod utils;

// Re-export main types
pub use api::{ApiError, PipelineService, PreviewResult};
pub use data::{Record, RecordSet, Value};
pub use expression::{evaluate, Expression};
pub use pipeline::{Orchestrator, Pipeline, PipelineInput, PipelineRun, RunOptions, TransformStepInput};
pub use processing::{StepConfig, StepType};
pub use storage::{FileRecordStore, MemoryRecordStore, RecordStore};
pub use utils::Config;
