#![warn(missing_docs)]
//! roomstage - virtual staging for interior photos.
//!
//! Uploads a room photo, sends it (or a generated prompt) to a hosted image
//! model, persists the result, and tracks each item's lifecycle so a batch of
//! photos can be staged independently within one session.
//!
//! # Quick Start - Editing
//!
//! ```no_run
//! use roomstage::{GeminiStager, StageRequest, StagingModel};
//!
//! #[tokio::main]
//! async fn main() -> roomstage::Result<()> {
//!     let stager = GeminiStager::builder().build()?;
//!     let photo = std::fs::read("living_room.jpg")?;
//!     let request = StageRequest::new("Add a blue armchair in [1]").with_reference(photo);
//!     if let roomstage::InvokeOutcome::Image(image) = stager.invoke(&request).await? {
//!         image.save("edited_living_room.png")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Quick Start - Batch staging
//!
//! ```no_run
//! use roomstage::{
//!     GeminiStager, MemoryStore, Orchestrator, StatusTracker, UploadedItem,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> roomstage::Result<()> {
//!     let orchestrator = Orchestrator::new(
//!         Arc::new(GeminiStager::builder().build()?),
//!         Arc::new(MemoryStore::new()),
//!         "run-1",
//!     );
//!     let mut tracker = StatusTracker::new();
//!     let items = vec![UploadedItem::new("room.jpg", std::fs::read("room.jpg")?)];
//!     let report = orchestrator
//!         .stage_batch(&mut tracker, &items, "Add a sofa in [1]")
//!         .await;
//!     for (filename, line) in report {
//!         println!("{filename}: {}", line.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Capabilities
//!
//! - [`GeminiStager`]: edits a reference photo per a grounded instruction.
//! - [`ImagenStager`]: generates a furnished room from a prompt alone.

pub mod config;
mod error;
pub mod item;
pub mod model;
pub mod orchestrator;
pub mod prompt;
pub mod store;

// Re-export error types at crate root
pub use error::{Result, StageError};

// Re-export the types most callers need
pub use config::StageConfig;
pub use item::{ItemState, MessageClass, StagingStatus, StatusLine, StatusTracker, UploadStatus};
pub use model::{
    GeminiModel, GeminiStager, GeminiStagerBuilder, ImageFormat, ImagenStager,
    ImagenStagerBuilder, InvokeOutcome, StageMetadata, StageRequest, StagedImage, StagerKind,
    StagingModel, StagingModelExt,
};
pub use orchestrator::{Orchestrator, UploadedItem};
pub use prompt::{RoomType, Style, REFERENCE_MARKER};
pub use store::{GcsStore, GcsStoreBuilder, MemoryStore, ObjectStore, StoredObject};
