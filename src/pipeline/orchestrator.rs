// Pipeline orchestrator: runs steps in dependency order
// Author: Gabriel Demetrios Lafis

use std::collections::HashSet;

use log::{debug, info, warn};

use super::run::pending_results;
use super::{
    dependents, resolve_order, CancellationToken, Pipeline, PipelineRun, RunOptions, RunStatus,
    Step, StepNode, Workspace,
};
use crate::data::Record;
use crate::processing::{ProcessingError, StepOutput};
use crate::storage::{is_reserved_collection, RecordStore};
use crate::utils::EngineConfig;

/// Executes pipelines against a record store.
///
/// Holds no run-scoped state: every run owns its `PipelineRun` and
/// `Workspace`, so concurrent runs do not interfere.
pub struct Orchestrator<'a> {
    store: &'a dyn RecordStore,
    temp_prefix: String,
}

impl<'a> Orchestrator<'a> {
    pub fn new(store: &'a dyn RecordStore, config: &EngineConfig) -> Self {
        Orchestrator {
            store,
            temp_prefix: config.temp_prefix.clone(),
        }
    }

    /// Run a pipeline to a terminal state
    pub fn run(&self, pipeline: &Pipeline, options: &RunOptions, token: &CancellationToken) -> PipelineRun {
        let run = PipelineRun::new(pipeline, options);
        self.execute(pipeline, run, options, token)
    }

    /// Drive an already created run to a terminal state. Never fails: step
    /// errors are recorded on the returned run.
    pub fn execute(
        &self,
        pipeline: &Pipeline,
        mut run: PipelineRun,
        options: &RunOptions,
        token: &CancellationToken,
    ) -> PipelineRun {
        if run.started_at.is_none() {
            run.start();
        }
        info!("Running pipeline '{}' (run {})", pipeline.name, run.id);

        let nodes: Vec<StepNode> = pipeline.steps.iter().map(StepNode::from_step).collect();
        let order = match resolve_order(&nodes) {
            Ok(order) => order,
            Err(err) => {
                warn!("Pipeline '{}' cannot run: {}", pipeline.name, err);
                let declared: Vec<usize> = (0..pipeline.steps.len()).collect();
                align_results(&mut run, pipeline, &declared);
                for result in &mut run.step_results {
                    result.skip();
                }
                run.error = Some(err.to_string());
                run.finish(RunStatus::Failed);
                return run;
            }
        };

        align_results(&mut run, pipeline, &order);

        let mut workspace = Workspace::new(self.store);
        let mut tainted: HashSet<usize> = HashSet::new();
        let mut halted = false;
        let mut cancelled = false;

        // Result `slot` belongs to step `order[slot]`
        for (slot, &index) in order.iter().enumerate() {
            let step = &pipeline.steps[index];

            if !cancelled && token.is_cancelled() {
                warn!("Run {} cancelled before step '{}'", run.id, step.id);
                cancelled = true;
            }

            if cancelled || halted || tainted.contains(&index) {
                run.step_results[slot].skip();
                continue;
            }

            run.step_results[slot].start();
            debug!("Step '{}' ({}) started", step.id, step.step_type());

            match self.execute_step(step, &mut workspace, options) {
                Ok((input_rows, output_rows)) => {
                    debug!(
                        "Step '{}' completed: {} rows in, {} rows out",
                        step.id, input_rows, output_rows
                    );
                    run.step_results[slot].complete(input_rows, output_rows);
                }
                Err(err) => {
                    warn!("Step '{}' failed: {}", step.id, err);
                    run.step_results[slot].fail(err.to_string());
                    if run.error.is_none() {
                        run.error = Some(format!("Step '{}' failed: {}", step.id, err));
                    }

                    tainted.extend(dependents(&nodes, index));
                    if !options.continue_on_error {
                        halted = true;
                    }
                }
            }
        }

        if options.cleanup_temp_collections {
            self.cleanup(&mut workspace);
        }

        let status = if cancelled {
            if run.error.is_none() {
                run.error = Some("Run was cancelled".to_string());
            }
            RunStatus::Cancelled
        } else if run.has_failures() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        run.finish(status);

        info!(
            "Pipeline '{}' run {} finished: {:?} in {} ms",
            pipeline.name,
            run.id,
            run.status,
            run.duration_ms.unwrap_or_default()
        );
        run
    }

    /// Run one step, store its output and return `(inputRows, outputRows)`
    fn execute_step(
        &self,
        step: &Step,
        workspace: &mut Workspace,
        options: &RunOptions,
    ) -> Result<(usize, usize), ProcessingError> {
        let StepOutput { records, input_rows } = workspace.execute(&step.config)?;
        let output_rows = records.len();

        if !options.dry_run {
            self.persist(step.output(), &records)?;
        }
        workspace.insert(step.output(), records);

        Ok((input_rows, output_rows))
    }

    /// Replace the stored collection `name` with `records`
    fn persist(&self, name: &str, records: &[Record]) -> Result<(), ProcessingError> {
        if is_reserved_collection(name) {
            return Err(ProcessingError::InvalidArgument(format!(
                "'{}' is reserved for pipeline storage",
                name
            )));
        }
        if !self.store.has_collection(name)? {
            self.store.create_collection(name)?;
        }
        self.store.clear(name)?;
        self.store.create_many(name, records)?;
        Ok(())
    }

    /// Drop temporary record sets from the workspace and the store
    fn cleanup(&self, workspace: &mut Workspace) {
        let temporary: Vec<String> = workspace
            .names()
            .filter(|name| name.starts_with(&self.temp_prefix))
            .map(str::to_string)
            .collect();

        for name in temporary {
            workspace.remove(&name);

            let dropped = self
                .store
                .has_collection(&name)
                .and_then(|exists| if exists { self.store.drop_collection(&name) } else { Ok(()) });

            match dropped {
                Ok(()) => debug!("Removed temporary collection '{}'", name),
                Err(err) => warn!("Failed to remove temporary collection '{}': {}", name, err),
            }
        }
    }
}

/// Reset `run.step_results` to pending results in `order` unless they
/// already follow it
fn align_results(run: &mut PipelineRun, pipeline: &Pipeline, order: &[usize]) {
    let aligned = run.step_results.len() == order.len()
        && order
            .iter()
            .zip(&run.step_results)
            .all(|(&i, result)| result.step_id == pipeline.steps[i].id);

    if !aligned {
        run.step_results = pending_results(pipeline, order);
    }
}
