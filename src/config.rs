//! Configuration types for the anonymization pipeline.
//!
//! Every knob lives in [`AnonymizerConfig`], built via its
//! [`AnonymizerConfigBuilder`]. A config is immutable once built and is shared
//! read-only by concurrent requests; nothing in it is mutated per request.

use crate::error::ValidationError;
use crate::pipeline::expand::MAX_VARIABLE_POSITIONS;
use std::fmt;
use std::path::PathBuf;

/// Configuration for the anonymization pipeline.
///
/// Built via [`AnonymizerConfig::builder()`] or using
/// [`AnonymizerConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_anonymizer::AnonymizerConfig;
///
/// let config = AnonymizerConfig::builder()
///     .image_dpi(96)
///     .output_container("redacted")
///     .build()
///     .unwrap();
/// assert_eq!(config.image_dpi, 96);
/// ```
#[derive(Clone)]
pub struct AnonymizerConfig {
    /// Raster resolution of the per-page image output. Range: 36–600. Default: 72.
    pub image_dpi: u32,

    /// Resolution at which the pdfium engine burns redactions into a page.
    /// Range: 72–600. Default: 150.
    ///
    /// Redacted pages are replaced by a raster of themselves, so this is the
    /// resolution those pages keep in the output PDF.
    pub redaction_dpi: u32,

    /// Maximum number of case-variable positions in one sensitive term.
    /// Range: 1–20. Default: 12.
    ///
    /// A term with `k` such positions expands to `2^k` search patterns. Terms
    /// above the ceiling are rejected before any resource is acquired.
    pub max_variable_positions: u32,

    /// Optional timeout for remote fetches, in seconds. Default: none.
    pub fetch_timeout_secs: Option<u64>,

    /// Parent directory of every per-request workspace. Default: system temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Container that BlobStore delivery writes into. Default: "anonymized".
    pub output_container: String,

    /// Directory containing the pdfium shared library. Default: search.
    pub pdfium_library_path: Option<PathBuf>,

    /// S3-compatible blob storage. Default: none (BlobStore delivery and
    /// `container/key` inputs are unavailable).
    pub storage: Option<StorageConfig>,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            image_dpi: 72,
            redaction_dpi: 150,
            max_variable_positions: 12,
            fetch_timeout_secs: None,
            scratch_dir: None,
            output_container: "anonymized".to_string(),
            pdfium_library_path: None,
            storage: None,
        }
    }
}

impl fmt::Debug for AnonymizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnonymizerConfig")
            .field("image_dpi", &self.image_dpi)
            .field("redaction_dpi", &self.redaction_dpi)
            .field("max_variable_positions", &self.max_variable_positions)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("scratch_dir", &self.scratch_dir)
            .field("output_container", &self.output_container)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("storage", &self.storage)
            .finish()
    }
}

impl AnonymizerConfig {
    /// Create a new builder for `AnonymizerConfig`.
    pub fn builder() -> AnonymizerConfigBuilder {
        AnonymizerConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnonymizerConfig`].
#[derive(Debug)]
pub struct AnonymizerConfigBuilder {
    config: AnonymizerConfig,
}

impl AnonymizerConfigBuilder {
    pub fn image_dpi(mut self, dpi: u32) -> Self {
        self.config.image_dpi = dpi.clamp(36, 600);
        self
    }

    pub fn redaction_dpi(mut self, dpi: u32) -> Self {
        self.config.redaction_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_variable_positions(mut self, n: u32) -> Self {
        self.config.max_variable_positions = n;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = Some(secs);
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    pub fn output_container(mut self, container: impl Into<String>) -> Self {
        self.config.output_container = container.into();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = Some(storage);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnonymizerConfig, ValidationError> {
        let c = &self.config;
        if c.max_variable_positions == 0 || c.max_variable_positions > MAX_VARIABLE_POSITIONS {
            return Err(ValidationError::new(format!(
                "max_variable_positions must be 1-{MAX_VARIABLE_POSITIONS}, got {}",
                c.max_variable_positions
            )));
        }
        if c.output_container.is_empty() || c.output_container.contains('/') {
            return Err(ValidationError::new(format!(
                "output container must be a non-empty name without '/', got '{}'",
                c.output_container
            )));
        }
        Ok(self.config)
    }
}

/// Connection settings for an S3-compatible blob store (MinIO, AWS S3, …).
#[derive(Clone)]
pub struct StorageConfig {
    /// Host with optional scheme, e.g. `localhost:9000` or `http://minio:9000`.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// Signing region. Default: "us-east-1".
    pub region: String,
}

impl StorageConfig {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: "us-east-1".to_string(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Base URL of the endpoint.
    ///
    /// `http://` selects plain HTTP; `https://` or a bare host selects HTTPS.
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{endpoint}")
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}
