//! Response types returned by [`crate::anonymize()`].
//!
//! An [`AnonymizationResponse`] holds one [`FormatOutcome`] per requested
//! format. Outcomes are independent: a delivery failure for one format is an
//! [`FormatOutcome::Failed`] entry next to intact siblings, never a fatal error.

use crate::request::OutputFormat;
use crate::storage::BlobLocation;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

/// One delivered artifact: inline payload or a reference into blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DeliveredPayload {
    /// Base64 text for binary artifacts, raw text for Markdown.
    Inline(String),
    /// Serialised as `"container/key"`.
    Stored(BlobLocation),
}

impl DeliveredPayload {
    pub fn as_inline(&self) -> Option<&str> {
        match self {
            Self::Inline(s) => Some(s),
            Self::Stored(_) => None,
        }
    }

    pub fn as_stored(&self) -> Option<&BlobLocation> {
        match self {
            Self::Stored(loc) => Some(loc),
            Self::Inline(_) => None,
        }
    }
}

/// Result for a single requested format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormatOutcome {
    /// `pdf` and `md`.
    Single(DeliveredPayload),
    /// `img`: one entry per page, in page order.
    Pages(Vec<DeliveredPayload>),
    /// Delivery of this format failed; siblings are unaffected.
    Failed { error: String },
}

impl FormatOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Everything produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizationResponse {
    pub process_id: String,
    /// Keyed in canonical format order.
    pub outcomes: BTreeMap<OutputFormat, FormatOutcome>,
}

impl AnonymizationResponse {
    pub fn new(process_id: impl Into<String>) -> Self {
        Self {
            process_id: process_id.into(),
            outcomes: BTreeMap::new(),
        }
    }

    pub fn get(&self, format: OutputFormat) -> Option<&FormatOutcome> {
        self.outcomes.get(&format)
    }

    /// Number of formats whose delivery failed.
    pub fn failed_formats(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_failed()).count()
    }

    /// The JSON body returned over HTTP.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("Failed to serialise response: {e}") })
        })
    }
}

/// `{"pdf": ..., "img": [...], "md": ..., "process_id": ...}`.
impl Serialize for AnonymizationResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.outcomes.len() + 1))?;
        for (format, outcome) in &self.outcomes {
            map.serialize_entry(format.as_str(), outcome)?;
        }
        map.serialize_entry("process_id", &self.process_id)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialises_flat_per_format_entries() {
        let mut resp = AnonymizationResponse::new("p-1");
        resp.outcomes.insert(
            OutputFormat::Md,
            FormatOutcome::Single(DeliveredPayload::Inline("## Page 1\n\n".into())),
        );
        resp.outcomes.insert(
            OutputFormat::Img,
            FormatOutcome::Pages(vec![
                DeliveredPayload::Stored(BlobLocation::new("anonymized", "p-1/result_page_1.png")),
                DeliveredPayload::Stored(BlobLocation::new("anonymized", "p-1/result_page_2.png")),
            ]),
        );
        resp.outcomes.insert(
            OutputFormat::Pdf,
            FormatOutcome::Failed {
                error: "Failed to upload".into(),
            },
        );

        assert_eq!(
            resp.to_json(),
            json!({
                "pdf": {"error": "Failed to upload"},
                "img": ["anonymized/p-1/result_page_1.png", "anonymized/p-1/result_page_2.png"],
                "md": "## Page 1\n\n",
                "process_id": "p-1",
            })
        );
        assert_eq!(resp.failed_formats(), 1);
    }

    #[test]
    fn payload_accessors() {
        let inline = DeliveredPayload::Inline("abc".into());
        assert_eq!(inline.as_inline(), Some("abc"));
        assert!(inline.as_stored().is_none());
    }
}
