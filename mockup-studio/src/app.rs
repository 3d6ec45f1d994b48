// Mockup generation orchestration.
//
// Builds one request per variation prompt, issues all of them concurrently,
// and aggregates the results against a success threshold. Individual call
// failures never abort the run; they are logged, reported as events, and
// counted against the threshold.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Local};
use futures_util::future::join_all;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::llm::client::{GenerateError, LlmClient, MockupBackend};
use crate::llm::prompt::{self, VARIANT_COUNT};
use crate::media::ImageData;
use crate::protocol::{GenerationEvent, MockupRequest, ModelType};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One generated variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Mockup {
    /// Zero-based variant index.
    pub variant: usize,
    /// The variation suffix that produced this image.
    pub variation: String,
    pub image: ImageData,
}

/// The successful variants of one run, in variant order.
#[derive(Debug, Clone, PartialEq)]
pub struct MockupSet {
    pub model_type: ModelType,
    pub mockups: Vec<Mockup>,
}

impl MockupSet {
    pub fn len(&self) -> usize {
        self.mockups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mockups.is_empty()
    }
}

/// Why a single variant produced no image.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantFailure {
    pub variant: usize,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Failed to generate all mockups. Got {succeeded} out of {total}.")]
    Incomplete {
        succeeded: usize,
        required: usize,
        total: usize,
        failures: Vec<VariantFailure>,
    },
}

// ---------------------------------------------------------------------------
// MockupGenerator
// ---------------------------------------------------------------------------

/// Fans a [`MockupRequest`] out to a [`MockupBackend`] and aggregates the
/// results.
pub struct MockupGenerator {
    backend: Arc<dyn MockupBackend>,
    required_successes: usize,
    events: Option<mpsc::Sender<GenerationEvent>>,
}

impl MockupGenerator {
    /// `required_successes` is clamped to `1..=VARIANT_COUNT`.
    pub fn new(backend: Arc<dyn MockupBackend>, required_successes: usize) -> Self {
        Self {
            backend,
            required_successes: required_successes.clamp(1, VARIANT_COUNT),
            events: None,
        }
    }

    /// Build a generator backed by the Gemini client described in `config`.
    pub fn from_config(config: &Config) -> Result<Self, GenerateError> {
        let client = LlmClient::from_config(config)?;
        if !client.is_active() {
            warn!("No Gemini API key configured; every variant will fail");
        }
        Ok(Self::new(
            Arc::new(client),
            config.generation.required_successes,
        ))
    }

    /// Forward progress events to `tx`. Events are dropped rather than waited
    /// on when the channel is full or closed, so a slow reader never stalls
    /// the variant calls.
    pub fn with_events(mut self, tx: mpsc::Sender<GenerationEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn required_successes(&self) -> usize {
        self.required_successes
    }

    /// Generate all variants for `request` concurrently and aggregate them.
    pub async fn generate(&self, request: &MockupRequest) -> Result<MockupSet, GenerationError> {
        let variations = prompt::variation_prompts(request.model_type);
        info!(
            model = %request.model_type,
            background = %request.background.describe(),
            variants = variations.len(),
            "Starting mockup generation"
        );

        let calls = variations
            .iter()
            .enumerate()
            .map(|(variant, variation)| self.run_variant(request, variant, variation));
        let outcomes = join_all(calls).await;

        let result = aggregate(
            request.model_type,
            variations,
            outcomes,
            self.required_successes,
        );
        match &result {
            Ok(set) => info!("Generated {} of {} mockups", set.len(), variations.len()),
            Err(e) => warn!("Mockup generation failed: {}", e),
        }
        result
    }

    async fn run_variant(
        &self,
        request: &MockupRequest,
        variant: usize,
        variation: &str,
    ) -> Result<Option<ImageData>, GenerateError> {
        self.emit(GenerationEvent::VariantStarted { variant });
        debug!(variant, variation, "Issuing generation request");

        let parts = prompt::build_request_parts(request, variation);
        let outcome = self.backend.generate(parts).await;

        match &outcome {
            Ok(Some(img)) => debug!(variant, mime = %img.mime_type, "Variant produced an image"),
            Ok(None) => warn!(variant, "Variant returned no image"),
            Err(e) => warn!(variant, "Error generating mockup: {}", e),
        }

        let produced_image = matches!(outcome, Ok(Some(_)));
        self.emit(GenerationEvent::VariantFinished {
            variant,
            produced_image,
        });

        outcome
    }

    fn emit(&self, event: GenerationEvent) {
        let Some(tx) = &self.events else {
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(event)) = tx.try_send(event) {
            debug!("Progress channel full, dropping {:?}", event);
        }
    }
}

/// Collect per-variant outcomes into a [`MockupSet`], or fail if fewer than
/// `required` variants produced an image.
pub fn aggregate(
    model_type: ModelType,
    variations: &[&str],
    outcomes: Vec<Result<Option<ImageData>, GenerateError>>,
    required: usize,
) -> Result<MockupSet, GenerationError> {
    let total = outcomes.len();
    let mut mockups = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (variant, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(Some(image)) => mockups.push(Mockup {
                variant,
                variation: variations.get(variant).copied().unwrap_or_default().to_string(),
                image,
            }),
            Ok(None) => failures.push(VariantFailure {
                variant,
                reason: "no image in response".to_string(),
            }),
            Err(e) => failures.push(VariantFailure {
                variant,
                reason: e.to_string(),
            }),
        }
    }

    if mockups.len() < required {
        return Err(GenerationError::Incomplete {
            succeeded: mockups.len(),
            required,
            total,
            failures,
        });
    }

    Ok(MockupSet {
        model_type,
        mockups,
    })
}

// ---------------------------------------------------------------------------
// Saving results
// ---------------------------------------------------------------------------

/// Directory a run writes into: `base` itself, or a `run-YYYYMMDD-HHMMSS`
/// subdirectory of it when `timestamped` is set.
pub fn run_directory(base: &Path, timestamped: bool, now: DateTime<Local>) -> PathBuf {
    if timestamped {
        base.join(format!("run-{}", now.format("%Y%m%d-%H%M%S")))
    } else {
        base.to_path_buf()
    }
}

/// Write every mockup as `mockup-<n>.<ext>` (n is one-based) into `dir`,
/// creating it if needed. Returns the written paths in variant order.
///
/// Every payload is decoded before anything is written, so a bad variant
/// leaves no partial set on disk.
pub fn save_mockups(set: &MockupSet, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let decoded = set
        .mockups
        .iter()
        .map(|mockup| {
            mockup.image.decode().with_context(|| {
                format!("variant {} returned undecodable data", mockup.variant + 1)
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(set.len());
    for (mockup, bytes) in set.mockups.iter().zip(decoded) {
        let path = dir.join(format!(
            "mockup-{}.{}",
            mockup.variant + 1,
            mockup.image.file_extension()
        ));
        std::fs::write(&path, &bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Saved {} ({} bytes)", path.display(), bytes.len());
        written.push(path);
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
