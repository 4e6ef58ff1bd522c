use super::{JobStatus, JobStore, JobUpdate};
use crate::parser::{ParseResult, ParserRegistry, Source};
use serde_json::{json, Value};
use tracing::{info, warn};

/// One named upload in a batch
#[derive(Debug, Clone)]
pub struct ImportInput {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ImportInput {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Per-input outcomes, in input order, plus the tracking job id
#[derive(Debug)]
pub struct BatchOutcome {
    pub task_id: String,
    pub results: Vec<(String, Result<ParseResult, String>)>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Parse several inputs under one `import` job
///
/// Progress is reported after each input. The job completes when at least
/// one input parsed (or the batch is empty) and fails otherwise.
pub fn import_batch(
    store: &dyn JobStore,
    registry: &ParserRegistry,
    inputs: &[ImportInput],
) -> BatchOutcome {
    let task_id = store.create_job("import");
    store.update_job(
        &task_id,
        JobUpdate::new()
            .status(JobStatus::Running)
            .current_step(format!("Parsing {} file(s)", inputs.len())),
    );

    let total = inputs.len();
    let mut results = Vec::with_capacity(total);
    let mut summary = Vec::with_capacity(total);

    for (i, input) in inputs.iter().enumerate() {
        store.update_job(
            &task_id,
            JobUpdate::new().current_step(format!("Parsing {}", input.name)),
        );

        let outcome = registry
            .parse(Source::Bytes(&input.bytes), Some(&input.name))
            .map_err(|e| e.to_string());

        summary.push(match &outcome {
            Ok(result) => json!({
                "name": input.name,
                "format": result.provenance.format,
                "content_type": result.content_type,
                "warnings": result.warnings.len(),
            }),
            Err(error) => {
                warn!(name = %input.name, %error, "import failed");
                json!({ "name": input.name, "error": error })
            }
        });
        results.push((input.name.clone(), outcome));

        store.update_job(
            &task_id,
            JobUpdate::new().progress((i + 1) as f64 / total as f64),
        );
    }

    let outcome = BatchOutcome { task_id, results };
    let succeeded = outcome.succeeded();

    let final_update = if total > 0 && succeeded == 0 {
        let errors: Vec<&str> = outcome
            .results
            .iter()
            .filter_map(|(_, r)| r.as_ref().err().map(String::as_str))
            .collect();
        JobUpdate::new()
            .status(JobStatus::Failed)
            .current_step("Failed")
            .error(errors.join("; "))
            .result(Value::Array(summary))
    } else {
        JobUpdate::new()
            .status(JobStatus::Completed)
            .progress(1.0)
            .current_step("Completed")
            .result(json!({
                "total": total,
                "succeeded": succeeded,
                "failed": outcome.failed(),
                "files": summary,
            }))
    };
    store.update_job(&outcome.task_id, final_update);

    info!(
        task_id = %outcome.task_id,
        total,
        succeeded,
        "batch import finished"
    );
    outcome
}
