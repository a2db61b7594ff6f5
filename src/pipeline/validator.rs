// Static validation of pipeline definitions
// Author: Gabriel Demetrios Lafis

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{resolve_order, PipelineInput, StepNode};
use crate::processing::StepConfig;
use crate::storage::is_reserved_collection;
use crate::utils::{missing_fields, validate_not_blank};

/// Stable code of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    EmptyName,
    NoSteps,
    MissingField,
    InvalidConfig,
    DuplicateStepId,
    UnknownDependency,
    CyclicDependency,
    ReservedName,
    UnverifiedSource,
    DuplicateOutput,
}

/// A validation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: ValidationCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

pub type ValidationError = ValidationIssue;
pub type ValidationWarning = ValidationIssue;

impl ValidationIssue {
    fn new(code: ValidationCode, message: String) -> Self {
        ValidationIssue {
            code,
            message,
            step_id: None,
            field: None,
        }
    }

    fn at_step(mut self, step_id: &str) -> Self {
        self.step_id = Some(step_id.to_string());
        self
    }

    fn at_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn has_error(&self, code: ValidationCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: ValidationCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }
}

/// Check a pipeline definition without touching any data
pub fn validate_pipeline(input: &PipelineInput) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Err(message) = validate_not_blank(&input.name, "name") {
        errors.push(ValidationIssue::new(ValidationCode::EmptyName, message).at_field("name"));
    }

    if input.steps.is_empty() {
        errors.push(ValidationIssue::new(
            ValidationCode::NoSteps,
            "Pipeline must have at least one step".to_string(),
        ));
    }

    let nodes: Vec<StepNode> = input
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| StepNode::from_input(i, step))
        .collect();

    let mut seen_ids = HashSet::new();
    for node in &nodes {
        if !seen_ids.insert(node.id.as_str()) {
            errors.push(
                ValidationIssue::new(
                    ValidationCode::DuplicateStepId,
                    format!("Step id '{}' is used more than once", node.id),
                )
                .at_step(&node.id),
            );
        }
    }

    for (step, node) in input.steps.iter().zip(&nodes) {
        let missing = missing_fields(&step.config, step.step_type.required_fields());

        for field in &missing {
            errors.push(
                ValidationIssue::new(
                    ValidationCode::MissingField,
                    format!("Step '{}' ({}) is missing '{}'", node.id, step.step_type, field),
                )
                .at_step(&node.id)
                .at_field(field),
            );
        }

        if missing.is_empty() {
            if let Err(err) = StepConfig::parse(step.step_type, &step.config) {
                errors.push(
                    ValidationIssue::new(
                        ValidationCode::InvalidConfig,
                        format!("Step '{}': {}", node.id, err),
                    )
                    .at_step(&node.id),
                );
            }
        }

        for dependency in &step.depends_on {
            if !seen_ids.contains(dependency.as_str()) {
                errors.push(
                    ValidationIssue::new(
                        ValidationCode::UnknownDependency,
                        format!("Step '{}' depends on unknown step '{}'", node.id, dependency),
                    )
                    .at_step(&node.id)
                    .at_field("dependsOn"),
                );
            }
        }
    }

    for node in &nodes {
        if let Some(output) = node.output.as_deref().filter(|o| is_reserved_collection(o)) {
            errors.push(
                ValidationIssue::new(
                    ValidationCode::ReservedName,
                    format!("Step '{}' cannot write to reserved collection '{}'", node.id, output),
                )
                .at_step(&node.id)
                .at_field("output"),
            );
        }
    }

    if let Err(err) = resolve_order(&nodes) {
        errors.push(ValidationIssue::new(ValidationCode::CyclicDependency, err.to_string()));
    }

    let mut producers: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in &nodes {
        if let Some(output) = &node.output {
            producers.entry(output.as_str()).or_default().push(node.id.as_str());
        }
    }

    for node in &nodes {
        for source in &node.sources {
            let produced = producers
                .get(source.as_str())
                .map_or(false, |ids| ids.iter().any(|id| *id != node.id));

            if !produced {
                warnings.push(
                    ValidationIssue::new(
                        ValidationCode::UnverifiedSource,
                        format!(
                            "Step '{}' reads '{}', which no step produces; it must exist in the record store",
                            node.id, source
                        ),
                    )
                    .at_step(&node.id),
                );
            }
        }
    }

    let mut duplicates: Vec<(&str, &Vec<&str>)> = producers
        .iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(output, ids)| (*output, ids))
        .collect();
    duplicates.sort();

    for (output, ids) in duplicates {
        warnings.push(ValidationIssue::new(
            ValidationCode::DuplicateOutput,
            format!("Output '{}' is written by steps {}", output, ids.join(", ")),
        ));
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
