//! Request model and field validation.
//!
//! [`AnonymizationRequest::from_json`] turns an untyped JSON body into a
//! validated request. It is the only place a process identifier is generated,
//! and it never touches the filesystem or the network, so a rejected request
//! has acquired nothing that needs releasing.

use crate::error::ValidationError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Output representations a request can ask for.
///
/// The derived ordering (`Pdf < Img < Md`) is the order artifacts are
/// produced in, independent of how the request listed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Img,
    Md,
}

impl OutputFormat {
    /// Parse the wire name (`"pdf"`, `"img"`, `"md"`).
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pdf" => Some(Self::Pdf),
            "img" => Some(Self::Img),
            "md" => Some(Self::Md),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Img => "img",
            Self::Md => "md",
        }
    }

    /// File extension of the stored artifact.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Img => "png",
            Self::Md => "md",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Img => "image/png",
            Self::Md => "text/markdown; charset=utf-8",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether artifacts are returned inline or persisted to blob storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// `result_deliver = "response"` (default).
    #[default]
    Response,
    /// `result_deliver = "url"`.
    BlobStore,
}

/// Where the input document comes from. Exactly one variant per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Base64 text from `pdf_content`, decoded during resolution.
    InlinePayload(String),
    /// `pdf_file` starting with `http://` or `https://`.
    RemoteUrl(String),
    /// Any other `pdf_file`, expected to be `container/key`.
    BlobRef(String),
}

impl InputSource {
    fn from_pdf_file(value: String) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::RemoteUrl(value)
        } else {
            Self::BlobRef(value)
        }
    }

    /// Short label for logs; never includes payload bytes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InlinePayload(_) => "inline",
            Self::RemoteUrl(_) => "url",
            Self::BlobRef(_) => "blob",
        }
    }
}

/// A validated anonymization request.
#[derive(Debug, Clone)]
pub struct AnonymizationRequest {
    /// Terms that must not remain discoverable, in caller order, deduplicated.
    pub sensitive_terms: Vec<String>,
    pub source: InputSource,
    pub formats: BTreeSet<OutputFormat>,
    pub delivery: DeliveryMode,
    /// Fixed for the whole lifetime of the request.
    pub process_id: String,
}

const VALID_FORMATS_HINT: &str = "['img', 'md', 'pdf']";
const MAX_PROCESS_ID_LEN: usize = 128;

impl AnonymizationRequest {
    /// Validate a JSON request body.
    ///
    /// Field rules follow the HTTP contract: `sensitive_content` is a
    /// non-empty list of non-empty strings; exactly one of `pdf_content` /
    /// `pdf_file` (empty strings and `null` count as absent); `output_format`
    /// defaults to `["pdf"]`; `result_deliver` defaults to `"response"`;
    /// `process_id` is generated when absent.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let fields = match body.as_object() {
            Some(map) if !map.is_empty() => map,
            _ => return Err(ValidationError::new("No JSON data provided")),
        };

        let sensitive_terms = parse_terms(fields)?;
        let source = parse_source(fields)?;
        let formats = parse_formats(fields)?;
        let delivery = parse_delivery(fields)?;
        let process_id = parse_process_id(fields)?;

        Ok(Self {
            sensitive_terms,
            source,
            formats,
            delivery,
            process_id,
        })
    }

    pub fn wants(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }
}

fn parse_terms(fields: &Map<String, Value>) -> Result<Vec<String>, ValidationError> {
    let items = match fields.get("sensitive_content") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => {
            return Err(ValidationError::new(
                "sensitive_content must be a non-empty list",
            ))
        }
    };

    let mut seen = BTreeSet::new();
    let mut terms = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(term) if !term.is_empty() => {
                if seen.insert(term) {
                    terms.push(term.to_string());
                }
            }
            _ => {
                return Err(ValidationError::new(
                    "sensitive_content entries must be non-empty strings",
                ))
            }
        }
    }
    Ok(terms)
}

/// A string field where `null`, missing, and `""` all mean "not provided".
fn optional_string(
    fields: &Map<String, Value>,
    name: &str,
) -> Result<Option<String>, ValidationError> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::new(format!("{name} must be a string"))),
    }
}

fn parse_source(fields: &Map<String, Value>) -> Result<InputSource, ValidationError> {
    let content = optional_string(fields, "pdf_content")?;
    let file = optional_string(fields, "pdf_file")?;

    match (content, file) {
        (Some(content), None) => Ok(InputSource::InlinePayload(content)),
        (None, Some(file)) => Ok(InputSource::from_pdf_file(file)),
        (None, None) => Err(ValidationError::new(
            "Either pdf_content or pdf_file must be provided",
        )),
        (Some(_), Some(_)) => Err(ValidationError::new(
            "Only one of pdf_content or pdf_file may be provided",
        )),
    }
}

fn parse_formats(fields: &Map<String, Value>) -> Result<BTreeSet<OutputFormat>, ValidationError> {
    let items = match fields.get("output_format") {
        None | Some(Value::Null) => return Ok(BTreeSet::from([OutputFormat::Pdf])),
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(_) => {
            return Err(ValidationError::new(
                "output_format must be a non-empty list",
            ))
        }
    };

    items
        .iter()
        .map(|item| {
            item.as_str().and_then(OutputFormat::parse).ok_or_else(|| {
                let shown = item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string());
                ValidationError::new(format!(
                    "Invalid output format: {shown}. Must be one of {VALID_FORMATS_HINT}"
                ))
            })
        })
        .collect()
}

fn parse_delivery(fields: &Map<String, Value>) -> Result<DeliveryMode, ValidationError> {
    match fields.get("result_deliver") {
        None | Some(Value::Null) => Ok(DeliveryMode::Response),
        Some(Value::String(s)) if s == "response" => Ok(DeliveryMode::Response),
        Some(Value::String(s)) if s == "url" => Ok(DeliveryMode::BlobStore),
        Some(_) => Err(ValidationError::new(
            "result_deliver must be either 'url' or 'response'",
        )),
    }
}

fn parse_process_id(fields: &Map<String, Value>) -> Result<String, ValidationError> {
    let invalid = || {
        ValidationError::new(
            "process_id must be 1-128 characters of letters, digits, '.', '_' or '-'",
        )
    };

    match fields.get("process_id") {
        None | Some(Value::Null) => Ok(generate_process_id()),
        Some(Value::String(s)) if s.is_empty() => Ok(generate_process_id()),
        Some(Value::String(s)) => {
            let well_formed = s.len() <= MAX_PROCESS_ID_LEN
                && s != "."
                && s != ".."
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
            if well_formed {
                Ok(s.clone())
            } else {
                Err(invalid())
            }
        }
        Some(_) => Err(invalid()),
    }
}

/// Generate a fresh process identifier.
pub fn generate_process_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
