//! Per-item staging lifecycle state.
//!
//! Each uploaded file is tracked independently through upload and staging.
//! The tracker is a plain value owned by the caller; the orchestrator borrows
//! it for the duration of a run and the presentation layer reads it afterwards.

use crate::model::StagedImage;
use std::collections::BTreeMap;

/// Upload lifecycle of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadStatus {
    /// Selected but not yet sent to the object store.
    #[default]
    Pending,
    /// Upload in flight.
    Uploading,
    /// Input bytes persisted.
    Uploaded,
    /// Upload failed; retry restarts from here.
    Failed,
}

/// Staging lifecycle of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StagingStatus {
    /// No staging attempted since the last reset.
    #[default]
    Idle,
    /// Remote call in flight.
    Running,
    /// Staged output available.
    Succeeded,
    /// Remote call failed.
    Failed,
    /// Remote call succeeded but returned no image. Terminal, and distinct
    /// from both success and failure.
    Empty,
}

/// Classification of a user-visible status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Staging completed with a usable output.
    Success,
    /// Something went wrong, or the output could not be fully persisted.
    Warning,
    /// Neutral information, e.g. an empty result.
    Info,
}

/// A classified status message for one item's most recent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// Message class, driving how the line is rendered.
    pub class: MessageClass,
    /// Message text.
    pub text: String,
}

impl StatusLine {
    /// Creates a success line.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            class: MessageClass::Success,
            text: text.into(),
        }
    }

    /// Creates a warning line.
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            class: MessageClass::Warning,
            text: text.into(),
        }
    }

    /// Creates an informational line.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            class: MessageClass::Info,
            text: text.into(),
        }
    }
}

/// Tracked state of one staging item.
///
/// The result payload is only reachable through [`ItemState::mark_staged`],
/// so result bytes are present only while staging status is `Succeeded`.
#[derive(Debug, Clone, Default)]
pub struct ItemState {
    upload: UploadStatus,
    staging: StagingStatus,
    result: Option<StagedImage>,
    message: Option<StatusLine>,
}

impl ItemState {
    /// Fresh state: `Pending` upload, `Idle` staging, no result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current upload status.
    pub fn upload_status(&self) -> UploadStatus {
        self.upload
    }

    /// Current staging status.
    pub fn staging_status(&self) -> StagingStatus {
        self.staging
    }

    /// Staged output, present only when staging status is `Succeeded`.
    pub fn result(&self) -> Option<&StagedImage> {
        self.result.as_ref()
    }

    /// Status message from the most recent run, if any.
    pub fn message(&self) -> Option<&StatusLine> {
        self.message.as_ref()
    }

    /// Sets the upload status.
    pub fn set_upload(&mut self, status: UploadStatus) {
        self.upload = status;
    }

    /// Enters `Running`, dropping any previous result first so an observer
    /// never sees stale output next to an in-flight run.
    pub fn begin_staging(&mut self) {
        self.result = None;
        self.staging = StagingStatus::Running;
    }

    /// Records a successful staging with its output.
    pub fn mark_staged(&mut self, image: StagedImage) {
        self.staging = StagingStatus::Succeeded;
        self.result = Some(image);
    }

    /// Records a failed staging run.
    pub fn mark_failed(&mut self) {
        self.staging = StagingStatus::Failed;
        self.result = None;
    }

    /// Records an empty-but-valid outcome.
    pub fn mark_empty(&mut self) {
        self.staging = StagingStatus::Empty;
        self.result = None;
    }

    /// Records the status message for the current run.
    pub fn set_message(&mut self, message: StatusLine) {
        self.message = Some(message);
    }

    /// Drops the result payload and returns staging to `Idle`.
    pub fn clear_result(&mut self) {
        self.result = None;
        self.staging = StagingStatus::Idle;
    }
}

/// Mapping from item identity (filename) to lifecycle state.
///
/// Survives across orchestration runs within a session. New keys default to a
/// fresh [`ItemState`] before first access.
#[derive(Debug, Default)]
pub struct StatusTracker {
    items: BTreeMap<String, ItemState>,
}

impl StatusTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state for a key, defaulting new keys.
    pub fn state(&mut self, key: &str) -> &ItemState {
        self.items.entry(key.to_string()).or_default()
    }

    /// Returns a mutable state for a key, defaulting new keys.
    pub fn state_mut(&mut self, key: &str) -> &mut ItemState {
        self.items.entry(key.to_string()).or_default()
    }

    /// Fully replaces the state stored for a key.
    pub fn set(&mut self, key: &str, state: ItemState) {
        self.items.insert(key.to_string(), state);
    }

    /// Drops a key's result payload, returning its staging status to `Idle`.
    pub fn clear_result(&mut self, key: &str) {
        self.state_mut(key).clear_result();
    }

    /// Resets a key to fresh state. Used when a new file replaces an old one
    /// under the same name; nothing resets implicitly.
    pub fn reset(&mut self, key: &str) {
        self.items.insert(key.to_string(), ItemState::new());
    }

    /// Iterates tracked items in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ItemState)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of tracked items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the tracker holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
