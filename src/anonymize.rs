//! Request orchestration.
//!
//! [`anonymize`] runs one request end to end on the calling thread:
//!
//! ```text
//! expand terms ─▶ resolve input ─▶ redact ─▶ produce + deliver each format
//!                                                   │
//!                       release workspace ◀─────────┘ (every exit path)
//! ```
//!
//! Everything that can be rejected without touching the outside world (term
//! expansion, the Markdown matcher, missing storage for `url` delivery) is
//! checked first, so such failures acquire nothing. From the first staged
//! file on, all temporaries live in a [`ProcessContext`] that is released
//! when the request ends, whether it succeeded or not.
//!
//! Collaborators are injected through [`Services`]; [`anonymize_async`]
//! builds them per request with a [`ServiceFactory`] on the blocking pool.

use crate::config::AnonymizerConfig;
use crate::engine::{DocumentEngine, FillColor, PdfiumEngine};
use crate::error::{AnonymizeError, ValidationError};
use crate::fetch::{HttpFetch, ReqwestFetcher};
use crate::output::{AnonymizationResponse, FormatOutcome};
use crate::pipeline::deliver::{DeliveryRouter, DeliveryTarget, Payload};
use crate::pipeline::expand::expand_terms;
use crate::pipeline::input::{resolve_input, Sources};
use crate::pipeline::markdown::{produce_markdown, TermMasker};
use crate::pipeline::redact::apply_redactions;
use crate::pipeline::render::{produce_page_images, produce_pdf};
use crate::request::{AnonymizationRequest, DeliveryMode, OutputFormat};
use crate::resources::ProcessContext;
use crate::storage::{BlobStore, S3BlobStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Collaborators used by one request.
pub struct Services {
    pub engine: Box<dyn DocumentEngine>,
    pub store: Option<Arc<dyn BlobStore>>,
    pub fetcher: Box<dyn HttpFetch>,
}

impl Services {
    pub fn new(engine: Box<dyn DocumentEngine>, fetcher: Box<dyn HttpFetch>) -> Self {
        Self {
            engine,
            store: None,
            fetcher,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Production collaborators: pdfium, S3 storage when configured, and a
    /// blocking HTTP client.
    ///
    /// Must run off the async executor.
    pub fn from_config(config: &AnonymizerConfig) -> Result<Self, AnonymizeError> {
        let engine = PdfiumEngine::bind(config.pdfium_library_path.as_deref(), config.redaction_dpi)?;
        let fetcher = ReqwestFetcher::new(config.fetch_timeout_secs)
            .map_err(|e| AnonymizeError::unexpected("Failed to build HTTP client", e))?;

        let mut services = Self::new(Box::new(engine), Box::new(fetcher));
        if let Some(storage) = &config.storage {
            let store = S3BlobStore::new(storage, config.fetch_timeout_secs)
                .map_err(|e| AnonymizeError::unexpected("Failed to configure blob storage", e))?;
            services = services.with_store(Arc::new(store));
        }
        Ok(services)
    }
}

/// Builds [`Services`] for each request.
pub type ServiceFactory =
    Arc<dyn Fn(&AnonymizerConfig) -> Result<Services, AnonymizeError> + Send + Sync>;

/// Factory for [`Services::from_config`].
pub fn default_factory() -> ServiceFactory {
    Arc::new(Services::from_config)
}

/// Run one validated request on the calling thread.
///
/// Delivery failures do not fail the request; they appear as
/// [`FormatOutcome::Failed`] entries in the response.
pub fn anonymize(
    request: &AnonymizationRequest,
    services: &Services,
    config: &AnonymizerConfig,
) -> Result<AnonymizationResponse, AnonymizeError> {
    let terms = TermPlan::prepare(request, config)?;
    execute(request, services, config, terms)
}

fn execute(
    request: &AnonymizationRequest,
    services: &Services,
    config: &AnonymizerConfig,
    terms: TermPlan,
) -> Result<AnonymizationResponse, AnonymizeError> {
    let start = Instant::now();
    let process_id = request.process_id.as_str();
    info!(
        process_id,
        terms = request.sensitive_terms.len(),
        source = request.source.kind(),
        formats = ?request.formats,
        "Anonymization started"
    );

    let plan = Plan::resolve(terms, request, services, config)?;

    let ctx = ProcessContext::new(process_id, config.scratch_dir.as_deref())
        .map_err(|e| AnonymizeError::unexpected("Failed to create workspace", e))?;
    let result = run(request, services, config, &ctx, plan);
    if let Err(e) = ctx.close() {
        warn!(process_id, error = %e, "Failed to remove workspace");
    }

    match &result {
        Ok(response) => info!(
            process_id,
            failed_formats = response.failed_formats(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Anonymization finished"
        ),
        Err(e) => warn!(process_id, status = e.http_status(), error = %e, "Anonymization failed"),
    }
    result
}

/// Parse, validate and run a JSON request body.
pub fn anonymize_json(
    body: &serde_json::Value,
    services: &Services,
    config: &AnonymizerConfig,
) -> Result<AnonymizationResponse, AnonymizeError> {
    let request = AnonymizationRequest::from_json(body)?;
    anonymize(&request, services, config)
}

/// Run `request` on the blocking pool with collaborators from `factory`.
pub async fn anonymize_async(
    request: AnonymizationRequest,
    config: Arc<AnonymizerConfig>,
    factory: ServiceFactory,
) -> Result<AnonymizationResponse, AnonymizeError> {
    tokio::task::spawn_blocking(move || {
        // Invalid terms are rejected before any collaborator is built.
        let terms = TermPlan::prepare(&request, &config)?;
        let services = factory(&config)?;
        execute(&request, &services, &config, terms)
    })
    .await
    .map_err(|e| AnonymizeError::unexpected("Anonymization task failed", e))?
}

/// Patterns and masker derived from the request alone.
struct TermPlan {
    patterns: BTreeSet<String>,
    masker: TermMasker,
}

impl TermPlan {
    fn prepare(request: &AnonymizationRequest, config: &AnonymizerConfig) -> Result<Self, AnonymizeError> {
        if request.sensitive_terms.is_empty() {
            return Err(ValidationError::new("sensitive_content must be a non-empty list").into());
        }
        if request.formats.is_empty() {
            return Err(ValidationError::new("output_format must be a non-empty list").into());
        }

        let patterns = expand_terms(&request.sensitive_terms, config.max_variable_positions)?;
        let masker = TermMasker::new(&request.sensitive_terms)?;
        Ok(Self { patterns, masker })
    }
}

/// Everything decided before the first resource is acquired.
struct Plan<'a> {
    patterns: BTreeSet<String>,
    masker: TermMasker,
    target: DeliveryTarget<'a>,
}

impl<'a> Plan<'a> {
    fn resolve(
        terms: TermPlan,
        request: &AnonymizationRequest,
        services: &'a Services,
        config: &'a AnonymizerConfig,
    ) -> Result<Self, AnonymizeError> {
        info!(
            process_id = request.process_id.as_str(),
            patterns = terms.patterns.len(),
            "Sensitive terms expanded"
        );

        let target = match request.delivery {
            DeliveryMode::Response => DeliveryTarget::Response,
            DeliveryMode::BlobStore => DeliveryTarget::Store {
                store: services
                    .store
                    .as_deref()
                    .ok_or(AnonymizeError::StorageNotConfigured)?,
                container: &config.output_container,
            },
        };

        Ok(Self {
            patterns: terms.patterns,
            masker: terms.masker,
            target,
        })
    }
}

enum Artifact {
    Single(Payload),
    Pages(Vec<Vec<u8>>),
}

fn run(
    request: &AnonymizationRequest,
    services: &Services,
    config: &AnonymizerConfig,
    ctx: &ProcessContext,
    plan: Plan<'_>,
) -> Result<AnonymizationResponse, AnonymizeError> {
    let process_id = ctx.process_id();
    let sources = Sources {
        store: services.store.as_deref(),
        fetcher: services.fetcher.as_ref(),
    };
    let mut input = resolve_input(&request.source, ctx, services.engine.as_ref(), &sources)?;

    let summary = apply_redactions(input.document.as_mut(), &plan.patterns, FillColor::BLACK)?;
    info!(
        process_id,
        pages = summary.pages.len(),
        regions = summary.total_regions(),
        "Redaction applied"
    );

    // All artifacts are produced before the first upload.
    let doc = input.document.as_ref();
    let mut artifacts = Vec::with_capacity(request.formats.len());
    for &format in &request.formats {
        let artifact = match format {
            OutputFormat::Pdf => Artifact::Single(Payload::Binary(produce_pdf(doc, ctx)?)),
            OutputFormat::Img => Artifact::Pages(produce_page_images(doc, config.image_dpi)?),
            OutputFormat::Md => {
                Artifact::Single(Payload::Text(produce_markdown(doc, &summary, &plan.masker)?))
            }
        };
        artifacts.push((format, artifact));
    }

    let router = DeliveryRouter::new(plan.target, process_id);
    let mut response = AnonymizationResponse::new(process_id);
    for (format, artifact) in artifacts {
        let delivered = match artifact {
            Artifact::Single(payload) => router.deliver(format, payload),
            Artifact::Pages(pages) => router.deliver_pages(pages),
        };

        let outcome = delivered.unwrap_or_else(|e| {
            warn!(process_id, format = %format, error = %e, "Delivery failed");
            FormatOutcome::Failed {
                error: e.to_string(),
            }
        });
        response.outcomes.insert(format, outcome);
    }

    Ok(response)
}
