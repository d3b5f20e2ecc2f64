//! Per-item staging orchestration.
//!
//! Drives each uploaded item through upload, remote staging, and output
//! persistence, one item at a time. All state lives in the caller-owned
//! [`StatusTracker`]; the orchestrator mutates it and reports a classified
//! [`StatusLine`] per run, leaving rendering to the caller.

use crate::error::StageError;
use crate::item::{StatusLine, StatusTracker, UploadStatus};
use crate::model::{ImageFormat, InvokeOutcome, StageRequest, StagingModel, StagingModelExt};
use crate::prompt::edited_filename;
use crate::store::ObjectStore;
use std::sync::Arc;

/// Content type for all persisted staged outputs.
const OUTPUT_CONTENT_TYPE: &str = "image/png";

/// One uploaded file, identified by its filename.
#[derive(Debug, Clone)]
pub struct UploadedItem {
    /// Filename, unique within a session.
    pub filename: String,
    /// Raw input bytes.
    pub bytes: Vec<u8>,
}

impl UploadedItem {
    /// Creates an item from a filename and its bytes.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Coordinates staging runs over a model, a store, and a tracker.
pub struct Orchestrator {
    model: Arc<dyn StagingModel>,
    store: Arc<dyn ObjectStore>,
    run_id: String,
    max_retries: u32,
}

impl Orchestrator {
    /// Creates an orchestrator for one staging run.
    ///
    /// Object keys are namespaced under `run_id` so same-named files from
    /// different runs never collide in the store.
    pub fn new(
        model: Arc<dyn StagingModel>,
        store: Arc<dyn ObjectStore>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            model,
            store,
            run_id: run_id.into(),
            max_retries: 1,
        }
    }

    /// Overrides the transient-failure retry budget per remote call.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The run identifier namespacing this orchestrator's object keys.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Store key for an item's uploaded input.
    pub fn input_key(&self, filename: &str) -> String {
        format!("runs/{}/inputs/{}", self.run_id, filename)
    }

    /// Store key for an item's staged output.
    pub fn output_key(&self, filename: &str) -> String {
        format!("runs/{}/staged/{}", self.run_id, edited_filename(filename))
    }

    /// Stages a batch of items sequentially.
    ///
    /// Items are independent: a failure terminates only that item's run, and
    /// the next item starts regardless. Returns one status line per item, in
    /// input order; the same lines are recorded in the tracker.
    pub async fn stage_batch(
        &self,
        tracker: &mut StatusTracker,
        items: &[UploadedItem],
        instruction: &str,
    ) -> Vec<(String, StatusLine)> {
        let mut report = Vec::with_capacity(items.len());
        for item in items {
            let line = self.stage_item(tracker, item, instruction).await;
            report.push((item.filename.clone(), line));
        }
        report
    }

    /// Runs the staging pipeline for a single item.
    ///
    /// `Idle -> Uploading -> Uploaded -> Running -> Succeeded | Failed | Empty`,
    /// with `Failed` reachable from the upload step as well. Errors are
    /// terminal for this run; pressing the action again restarts from the
    /// upload step.
    pub async fn stage_item(
        &self,
        tracker: &mut StatusTracker,
        item: &UploadedItem,
        instruction: &str,
    ) -> StatusLine {
        let mut request = StageRequest::new(instruction);
        if self.model.requires_grounding() {
            request = request.with_reference(item.bytes.clone());
        }

        // Gate: a violated constraint leaves the item untouched and issues
        // no remote call.
        if let Err(err) = crate::model::validate_request(&request, self.model.requires_grounding())
        {
            let text = match err {
                StageError::Validation(msg) => msg,
                other => other.to_string(),
            };
            let line = StatusLine::warning(text);
            tracker.state_mut(&item.filename).set_message(line.clone());
            return line;
        }

        // The run starts here: drop any previous result before new bytes can
        // appear anywhere.
        tracker.clear_result(&item.filename);

        let line = self.run_pipeline(tracker, item, request).await;
        tracker.state_mut(&item.filename).set_message(line.clone());
        line
    }

    async fn run_pipeline(
        &self,
        tracker: &mut StatusTracker,
        item: &UploadedItem,
        request: StageRequest,
    ) -> StatusLine {
        let state = tracker.state_mut(&item.filename);
        state.set_upload(UploadStatus::Uploading);

        let input_type = ImageFormat::from_magic_bytes(&item.bytes)
            .map(|f| f.mime_type())
            .unwrap_or("application/octet-stream");

        match self
            .store
            .put(&self.input_key(&item.filename), item.bytes.clone(), input_type)
            .await
        {
            Ok(stored) => {
                tracing::debug!(key = %stored.key, size = stored.size, "input uploaded");
            }
            Err(err) => {
                let state = tracker.state_mut(&item.filename);
                state.set_upload(UploadStatus::Failed);
                return StatusLine::warning(format!("upload failed: {err}"));
            }
        }

        let state = tracker.state_mut(&item.filename);
        state.set_upload(UploadStatus::Uploaded);
        state.begin_staging();

        match self
            .model
            .invoke_with_retries(&request, self.max_retries)
            .await
        {
            Ok(InvokeOutcome::Image(image)) => {
                let model_id = image
                    .metadata
                    .model
                    .clone()
                    .unwrap_or_else(|| self.model.model_id().to_string());

                // Persistence is best-effort: the in-memory result is usable
                // even when saving the copy fails, so the item stays staged
                // and only the message is downgraded.
                let persisted = self
                    .store
                    .put(
                        &self.output_key(&item.filename),
                        image.data.clone(),
                        OUTPUT_CONTENT_TYPE,
                    )
                    .await;

                tracker.state_mut(&item.filename).mark_staged(image);

                match persisted {
                    Ok(_) => StatusLine::success(format!(
                        "staged {} with {}",
                        item.filename, model_id
                    )),
                    Err(err) => StatusLine::warning(format!(
                        "staged {} with {}, but saving the output failed: {err}",
                        item.filename, model_id
                    )),
                }
            }
            Ok(InvokeOutcome::Empty) => {
                tracker.state_mut(&item.filename).mark_empty();
                StatusLine::info(format!(
                    "no image returned by {}",
                    self.model.model_id()
                ))
            }
            Err(err) => {
                tracker.state_mut(&item.filename).mark_failed();
                StatusLine::warning(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    struct NullModel;

    #[async_trait::async_trait]
    impl StagingModel for NullModel {
        async fn invoke(&self, _request: &StageRequest) -> crate::error::Result<InvokeOutcome> {
            Ok(InvokeOutcome::Empty)
        }

        fn kind(&self) -> crate::model::StagerKind {
            crate::model::StagerKind::Gemini
        }

        fn model_id(&self) -> &str {
            "null-model"
        }

        async fn health_check(&self) -> crate::error::Result<()> {
            Ok(())
        }
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(Arc::new(NullModel), Arc::new(MemoryStore::new()), "run-1")
    }

    #[test]
    fn test_key_namespacing() {
        let orch = orchestrator();
        assert_eq!(
            orch.input_key("room.jpg"),
            "runs/run-1/inputs/room.jpg"
        );
        assert_eq!(
            orch.output_key("room.jpg"),
            "runs/run-1/staged/edited_room.png"
        );
    }

    #[test]
    fn test_default_retry_budget() {
        let orch = orchestrator();
        assert_eq!(orch.max_retries, 1);
        assert_eq!(orchestrator().with_max_retries(0).max_retries, 0);
    }
}
