//! End-to-end orchestration scenarios over a scripted model and local stores.

use async_trait::async_trait;
use roomstage::{
    ImageFormat, InvokeOutcome, MessageClass, ObjectStore, Orchestrator, Result, StageError,
    StageMetadata, StageRequest, StagedImage, StagerKind, StagingModel, StagingStatus,
    StatusTracker, StoredObject, UploadStatus, UploadedItem,
};
use roomstage::store::MemoryStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MODEL_ID: &str = "gemini-2.5-flash-image";

/// A staging model that replays a script of outcomes and counts remote calls.
struct ScriptedModel {
    outcomes: Mutex<VecDeque<Result<InvokeOutcome>>>,
    calls: AtomicUsize,
    grounding: bool,
}

impl ScriptedModel {
    fn new(outcomes: Vec<Result<InvokeOutcome>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            grounding: true,
        }
    }

    fn ungrounded(outcomes: Vec<Result<InvokeOutcome>>) -> Self {
        Self {
            grounding: false,
            ..Self::new(outcomes)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StagingModel for ScriptedModel {
    async fn invoke(&self, request: &StageRequest) -> Result<InvokeOutcome> {
        roomstage::model::validate_request(request, self.grounding)?;
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(InvokeOutcome::Empty))
    }

    fn kind(&self) -> StagerKind {
        StagerKind::Gemini
    }

    fn model_id(&self) -> &str {
        MODEL_ID
    }

    fn requires_grounding(&self) -> bool {
        self.grounding
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A store that fails `put` for keys containing a marker substring.
struct FailingStore {
    inner: MemoryStore,
    fail_keys_containing: &'static str,
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredObject> {
        if key.contains(self.fail_keys_containing) {
            return Err(StageError::Storage("connection reset".into()));
        }
        self.inner.put(key, bytes, content_type).await
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>> {
        self.inner.get(uri).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }
}

fn staged_outcome() -> Result<InvokeOutcome> {
    Ok(InvokeOutcome::Image(StagedImage::new(
        vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4],
        ImageFormat::Png,
        StagerKind::Gemini,
        StageMetadata {
            model: Some(MODEL_ID.to_string()),
            duration_ms: Some(1200),
        },
    )))
}

/// A valid 10KB JPEG payload: correct magic bytes plus padding.
fn reference_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(10 * 1024, 0);
    bytes
}

fn item(name: &str) -> UploadedItem {
    UploadedItem::new(name, reference_jpeg())
}

#[tokio::test]
async fn grounded_instruction_stages_item() {
    let model = Arc::new(ScriptedModel::new(vec![staged_outcome()]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(model.clone(), store.clone(), "run-1");
    let mut tracker = StatusTracker::new();

    let line = orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a blue armchair in [1]")
        .await;

    assert_eq!(line.class, MessageClass::Success);
    assert!(line.text.contains(MODEL_ID));
    assert_eq!(model.calls(), 1);

    let state = tracker.state("room.jpg");
    assert_eq!(state.upload_status(), UploadStatus::Uploaded);
    assert_eq!(state.staging_status(), StagingStatus::Succeeded);
    assert!(state.result().is_some());

    // Both the input and the staged output were persisted under the run.
    assert!(store.exists("runs/run-1/inputs/room.jpg").await.unwrap());
    assert!(store
        .exists("runs/run-1/staged/edited_room.png")
        .await
        .unwrap());
}

#[tokio::test]
async fn empty_instruction_short_circuits() {
    let model = Arc::new(ScriptedModel::new(vec![staged_outcome()]));
    let orchestrator = Orchestrator::new(model.clone(), Arc::new(MemoryStore::new()), "run-1");
    let mut tracker = StatusTracker::new();

    let line = orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "")
        .await;

    assert_eq!(line.class, MessageClass::Warning);
    assert_eq!(line.text, "please provide an instruction");
    assert_eq!(model.calls(), 0);

    let state = tracker.state("room.jpg");
    assert_eq!(state.upload_status(), UploadStatus::Pending);
    assert_eq!(state.staging_status(), StagingStatus::Idle);
    assert!(state.result().is_none());
}

#[tokio::test]
async fn missing_marker_short_circuits() {
    let model = Arc::new(ScriptedModel::new(vec![staged_outcome()]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(model.clone(), store.clone(), "run-1");
    let mut tracker = StatusTracker::new();

    let line = orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a blue armchair")
        .await;

    assert_eq!(line.class, MessageClass::Warning);
    assert!(line.text.contains("[1]"));
    assert_eq!(model.calls(), 0);
    // Nothing was uploaded either; the gate runs before any side effect.
    assert!(store.is_empty());
    assert_eq!(
        tracker.state("room.jpg").staging_status(),
        StagingStatus::Idle
    );
}

#[tokio::test]
async fn empty_result_is_terminal_and_informational() {
    let model = Arc::new(ScriptedModel::new(vec![Ok(InvokeOutcome::Empty)]));
    let orchestrator = Orchestrator::new(model.clone(), Arc::new(MemoryStore::new()), "run-1");
    let mut tracker = StatusTracker::new();

    let line = orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a rug in [1]")
        .await;

    assert_eq!(line.class, MessageClass::Info);
    let state = tracker.state("room.jpg");
    assert_eq!(state.staging_status(), StagingStatus::Empty);
    assert!(state.result().is_none());
}

#[tokio::test]
async fn empty_and_failure_messages_differ() {
    let model = Arc::new(ScriptedModel::new(vec![
        Ok(InvokeOutcome::Empty),
        Err(StageError::Api {
            status: 500,
            message: "internal".into(),
        }),
    ]));
    let orchestrator = Orchestrator::new(model, Arc::new(MemoryStore::new()), "run-1");
    let mut tracker = StatusTracker::new();

    let empty_line = orchestrator
        .stage_item(&mut tracker, &item("a.jpg"), "Add a rug in [1]")
        .await;
    let failure_line = orchestrator
        .stage_item(&mut tracker, &item("b.jpg"), "Add a rug in [1]")
        .await;

    assert_eq!(empty_line.class, MessageClass::Info);
    assert_eq!(failure_line.class, MessageClass::Warning);
    assert_ne!(empty_line.text, failure_line.text);
}

#[tokio::test]
async fn new_run_clears_previous_result() {
    let model = Arc::new(ScriptedModel::new(vec![
        staged_outcome(),
        Err(StageError::Api {
            status: 500,
            message: "internal".into(),
        }),
    ]));
    let orchestrator = Orchestrator::new(model, Arc::new(MemoryStore::new()), "run-1");
    let mut tracker = StatusTracker::new();

    orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a rug in [1]")
        .await;
    assert!(tracker.state("room.jpg").result().is_some());

    // The second run fails remotely; its start must already have dropped the
    // first run's output, so no stale bytes survive.
    orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a lamp in [1]")
        .await;
    let state = tracker.state("room.jpg");
    assert_eq!(state.staging_status(), StagingStatus::Failed);
    assert!(state.result().is_none());
}

#[tokio::test]
async fn upload_failure_is_terminal_for_the_run() {
    let model = Arc::new(ScriptedModel::new(vec![staged_outcome()]));
    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
        fail_keys_containing: "inputs",
    });
    let orchestrator = Orchestrator::new(model.clone(), store, "run-1");
    let mut tracker = StatusTracker::new();

    let line = orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a rug in [1]")
        .await;

    assert_eq!(line.class, MessageClass::Warning);
    assert!(line.text.contains("upload failed"));
    assert_eq!(model.calls(), 0);

    let state = tracker.state("room.jpg");
    assert_eq!(state.upload_status(), UploadStatus::Failed);
    assert_eq!(state.staging_status(), StagingStatus::Idle);
}

#[tokio::test]
async fn output_persistence_failure_downgrades_but_keeps_success() {
    let model = Arc::new(ScriptedModel::new(vec![staged_outcome()]));
    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
        fail_keys_containing: "staged",
    });
    let orchestrator = Orchestrator::new(model, store, "run-1");
    let mut tracker = StatusTracker::new();

    let line = orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a rug in [1]")
        .await;

    // Saving the copy failed, but the in-memory result is still usable.
    assert_eq!(line.class, MessageClass::Warning);
    assert!(line.text.contains("saving the output failed"));

    let state = tracker.state("room.jpg");
    assert_eq!(state.staging_status(), StagingStatus::Succeeded);
    assert!(state.result().is_some());
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let model = Arc::new(ScriptedModel::new(vec![
        Err(StageError::RateLimited {
            retry_after: Some(std::time::Duration::from_millis(1)),
        }),
        staged_outcome(),
    ]));
    let orchestrator = Orchestrator::new(model.clone(), Arc::new(MemoryStore::new()), "run-1");
    let mut tracker = StatusTracker::new();

    let line = orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a rug in [1]")
        .await;

    assert_eq!(line.class, MessageClass::Success);
    assert_eq!(model.calls(), 2);
    assert_eq!(
        tracker.state("room.jpg").staging_status(),
        StagingStatus::Succeeded
    );
}

#[tokio::test]
async fn permission_failure_is_not_retried() {
    let model = Arc::new(ScriptedModel::new(vec![
        Err(StageError::Permission("missing IAM role".into())),
        staged_outcome(),
    ]));
    let orchestrator = Orchestrator::new(model.clone(), Arc::new(MemoryStore::new()), "run-1");
    let mut tracker = StatusTracker::new();

    let line = orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a rug in [1]")
        .await;

    assert_eq!(line.class, MessageClass::Warning);
    assert!(line.text.contains("permission denied"));
    assert_eq!(model.calls(), 1);
    assert_eq!(
        tracker.state("room.jpg").staging_status(),
        StagingStatus::Failed
    );
}

#[tokio::test]
async fn reupload_same_filename_overwrites_input() {
    let model = Arc::new(ScriptedModel::ungrounded(vec![
        Ok(InvokeOutcome::Empty),
        Ok(InvokeOutcome::Empty),
    ]));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::new(model, store.clone(), "run-1");
    let mut tracker = StatusTracker::new();

    let first = UploadedItem::new("room.jpg", vec![1, 1, 1]);
    orchestrator
        .stage_item(&mut tracker, &first, "A modern living room")
        .await;

    tracker.reset("room.jpg");
    let second = UploadedItem::new("room.jpg", vec![2, 2]);
    orchestrator
        .stage_item(&mut tracker, &second, "A modern living room")
        .await;

    let newest = store.get("mem://runs/run-1/inputs/room.jpg").await.unwrap();
    assert_eq!(newest, vec![2, 2]);
}

#[tokio::test]
async fn batch_items_fail_independently() {
    let model = Arc::new(ScriptedModel::new(vec![
        staged_outcome(),
        Err(StageError::Api {
            status: 503,
            message: "unavailable".into(),
        }),
        staged_outcome(),
    ]));
    // A 503 Api error is not retryable, so the script consumes one outcome
    // per item.
    let orchestrator =
        Orchestrator::new(model, Arc::new(MemoryStore::new()), "run-1").with_max_retries(0);
    let mut tracker = StatusTracker::new();

    let items = vec![item("a.jpg"), item("b.jpg"), item("c.jpg")];
    let report = orchestrator
        .stage_batch(&mut tracker, &items, "Add a rug in [1]")
        .await;

    assert_eq!(report.len(), 3);
    assert_eq!(report[0].1.class, MessageClass::Success);
    assert_eq!(report[1].1.class, MessageClass::Warning);
    assert_eq!(report[2].1.class, MessageClass::Success);

    assert_eq!(
        tracker.state("a.jpg").staging_status(),
        StagingStatus::Succeeded
    );
    assert_eq!(
        tracker.state("b.jpg").staging_status(),
        StagingStatus::Failed
    );
    assert_eq!(
        tracker.state("c.jpg").staging_status(),
        StagingStatus::Succeeded
    );
}

#[tokio::test]
async fn messages_survive_in_tracker_for_rerender() {
    let model = Arc::new(ScriptedModel::new(vec![staged_outcome()]));
    let orchestrator = Orchestrator::new(model, Arc::new(MemoryStore::new()), "run-1");
    let mut tracker = StatusTracker::new();

    let line = orchestrator
        .stage_item(&mut tracker, &item("room.jpg"), "Add a rug in [1]")
        .await;

    let recorded = tracker.state("room.jpg").message().cloned();
    assert_eq!(recorded, Some(line));
}
