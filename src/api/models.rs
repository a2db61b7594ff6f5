// API request and response models
// Author: Gabriel Demetrios Lafis

use serde::{Deserialize, Serialize};

use crate::data::RecordSet;

pub use crate::pipeline::{PipelineInput, RunOptions, TransformStepInput, ValidationResult};

/// Rows produced by previewing a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub data: RecordSet,
    /// Number of rows in `data`
    pub count: usize,
}

impl PreviewResult {
    pub fn new(data: RecordSet) -> Self {
        let count = data.len();
        PreviewResult { data, count }
    }
}
