//! Staging model trait and call utilities.

use crate::error::{Result, StageError};
use crate::model::types::{InvokeOutcome, StageRequest, StagerKind};
use crate::prompt::REFERENCE_MARKER;
use async_trait::async_trait;

/// Trait for hosted staging capabilities.
#[async_trait]
pub trait StagingModel: Send + Sync {
    /// Invokes the model with the given request.
    ///
    /// Implementations validate the request locally first; a validation
    /// failure returns before any network I/O happens.
    async fn invoke(&self, request: &StageRequest) -> Result<InvokeOutcome>;

    /// Returns the kind of this capability.
    fn kind(&self) -> StagerKind;

    /// Returns the model identifier used for remote calls.
    fn model_id(&self) -> &str;

    /// Whether instructions must be grounded to a reference image.
    ///
    /// Grounded capabilities require the `[1]` marker in the instruction and
    /// a reference payload in the request.
    fn requires_grounding(&self) -> bool {
        false
    }

    /// Returns the name of this capability for display.
    fn name(&self) -> &str {
        match self.kind() {
            StagerKind::Gemini => "Gemini image editing (Google)",
            StagerKind::Imagen => "Imagen generation (Google)",
        }
    }

    /// Checks if the capability is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

/// Validates a request against a capability's input constraints.
///
/// Called by every provider at the top of `invoke`, so a violated constraint
/// is a local failure and the remote endpoint never sees the request.
pub fn validate_request(request: &StageRequest, requires_grounding: bool) -> Result<()> {
    if request.instruction.trim().is_empty() {
        return Err(StageError::Validation(
            "please provide an instruction".into(),
        ));
    }

    if requires_grounding {
        if !request.instruction.contains(REFERENCE_MARKER) {
            return Err(StageError::Validation(format!(
                "instruction must reference the photo with the {} marker",
                REFERENCE_MARKER
            )));
        }
        if request.reference.is_none() {
            return Err(StageError::Validation(
                "a reference photo is required for editing".into(),
            ));
        }
    }

    Ok(())
}

/// Extension trait for staging models with retry logic.
#[async_trait]
pub trait StagingModelExt: StagingModel {
    /// Invokes with bounded retries on transient failures.
    ///
    /// Validation, auth, and permission errors fail immediately.
    async fn invoke_with_retries(
        &self,
        request: &StageRequest,
        max_retries: u32,
    ) -> Result<InvokeOutcome> {
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match self.invoke(request).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = e.retry_after().unwrap_or(std::time::Duration::from_secs(1));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries,
                        delay_ms = delay.as_millis(),
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.expect("should have error after retries"))
    }
}

impl<T: StagingModel + ?Sized> StagingModelExt for T {}
