//! Classification pipeline
//!
//! Two stages, no retries: the primary backend (normally remote) runs first
//! and the fallback (normally the heuristic) runs only if it fails. Whichever
//! succeeds wins outright. If both fail the caller still gets an outcome
//! carrying the error fields, never a raw error.

use crate::error::{Result, SoilError};
use crate::input::ImageInput;
use crate::types::{AnalysisFailure, AnalysisOutcome, SoilAnalysisResult};
use async_trait::async_trait;
use std::time::Instant;

/// One interchangeable classification strategy
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Engine name, reported as `analysisDetails.apiUsed`
    fn name(&self) -> &str;

    async fn analyze(&self, input: &ImageInput) -> Result<SoilAnalysisResult>;
}

pub struct ClassificationPipeline {
    primary: Option<Box<dyn AnalysisBackend>>,
    fallback: Box<dyn AnalysisBackend>,
}

impl ClassificationPipeline {
    pub fn new(primary: Box<dyn AnalysisBackend>, fallback: Box<dyn AnalysisBackend>) -> Self {
        Self {
            primary: Some(primary),
            fallback,
        }
    }

    /// Pipeline that only runs the fallback backend
    pub fn offline(fallback: Box<dyn AnalysisBackend>) -> Self {
        Self {
            primary: None,
            fallback,
        }
    }

    /// Run the stages; always resolves to an outcome
    pub async fn analyze(&self, input: &ImageInput) -> AnalysisOutcome {
        let mut last_error = None;

        if let Some(primary) = &self.primary {
            match run_backend(primary.as_ref(), input).await {
                Ok(result) => return AnalysisOutcome::Success(Box::new(result)),
                Err(e) => {
                    if e.is_fallback_eligible() {
                        tracing::warn!("{} failed, falling back: {}", primary.name(), e);
                    } else {
                        tracing::error!("{} misconfigured, falling back: {}", primary.name(), e);
                    }
                    last_error = Some(e);
                }
            }
        }

        match run_backend(self.fallback.as_ref(), input).await {
            Ok(result) => AnalysisOutcome::Success(Box::new(result)),
            Err(e) => {
                tracing::error!("{} failed: {}", self.fallback.name(), e);
                if let Some(previous) = last_error {
                    tracing::debug!("Earlier failure: {}", previous);
                }
                let failure =
                    SoilError::AnalysisFailed(format!("all analysis systems failed ({})", e));
                AnalysisOutcome::Failure(AnalysisFailure::new(failure.user_message()))
            }
        }
    }
}

async fn run_backend(
    backend: &dyn AnalysisBackend,
    input: &ImageInput,
) -> Result<SoilAnalysisResult> {
    tracing::info!("Analyzing '{}' with {}", input.file_name, backend.name());
    let started = Instant::now();

    let mut result = backend.analyze(input).await?;

    result.analysis_details.processing_time = format!("{:.1}", started.elapsed().as_secs_f64());
    if result.analysis_details.file_name.is_empty() {
        result.analysis_details.file_name = input.file_name.clone();
    }
    Ok(result.normalize())
}
