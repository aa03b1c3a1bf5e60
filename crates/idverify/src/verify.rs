//! Face verification against the remote matching service.
//!
//! [`verify`] never fails: precondition, configuration and transport problems
//! all come back as [`VerificationOutcome::Failed`] so the caller only ever
//! renders a result.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capture::CapturedImage;
use crate::config::Config;
use crate::transport::{HttpResponse, HttpTransport};

/// Service message that marks a positive match.
pub const FACE_MATCHED: &str = "Face matched";

/// Reason shown for a non-match when the service gives none.
pub const DEFAULT_NO_MATCH: &str = "No Matching Face Found";

/// Reason shown for any transport or parse failure.
pub const NETWORK_ERROR: &str = "Network error or server unavailable";

/// Reason shown when verification is attempted without a still.
pub const MISSING_CAPTURE: &str = "Please capture a photo first";

/// Placeholder for absent values.
pub const NOT_AVAILABLE: &str = "N/A";

/// License fields the service may return, with their display labels.
pub const LICENSE_FIELDS: [(&str, &str); 6] = [
    ("Name", "Name"),
    ("LicenseNumber", "License Number"),
    ("DOB", "Date of Birth"),
    ("Address", "Address"),
    ("Expiry", "Expiry Date"),
    ("Blood Group", "Blood Group"),
];

/// Format a similarity score as `NN.NN%`, or `N/A` when absent.
#[must_use]
pub fn format_similarity(similarity: Option<f64>) -> String {
    match similarity {
        Some(value) if value.is_finite() => format!("{:.2}%", (value * 100.0).round() / 100.0),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// License record attached to a match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LicenseDetails {
    fields: BTreeMap<String, String>,
}

impl LicenseDetails {
    fn from_map(map: &Map<String, Value>) -> Self {
        let fields = map
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), text))
            })
            .collect();
        Self { fields }
    }

    /// Value of a field, or `N/A` when missing or blank.
    #[must_use]
    pub fn get(&self, key: &str) -> &str {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(NOT_AVAILABLE)
    }

    /// The well-known fields as `(label, value)` rows, in display order.
    pub fn rows(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        LICENSE_FIELDS
            .iter()
            .map(move |(key, label)| (*label, self.get(key)))
    }
}

/// Why a verification produced no verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No still was held; nothing was sent.
    MissingCapture,
    /// The verification endpoint is not configured; nothing was sent.
    Configuration,
    /// The request failed or the reply could not be understood.
    Network,
}

/// Result of one verification attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// The service matched the face to a license holder.
    Matched {
        /// License record of the matched holder.
        license: LicenseDetails,
        /// Similarity score, 0-100.
        similarity: Option<f64>,
        /// Reference to the matched reference image.
        matched_image: Option<String>,
    },
    /// The service found no match.
    NotMatched {
        /// Service message, or the default.
        reason: String,
        /// Similarity score, if the service sent one anyway.
        similarity: Option<f64>,
        /// Matched image reference, if the service sent one anyway.
        matched_image: Option<String>,
    },
    /// No verdict was obtained.
    Failed {
        /// What went wrong.
        kind: FailureKind,
        /// Message to display.
        reason: String,
    },
}

impl VerificationOutcome {
    /// Outcome for an attempt made without a still.
    #[must_use]
    pub fn missing_capture() -> Self {
        Self::Failed {
            kind: FailureKind::MissingCapture,
            reason: MISSING_CAPTURE.to_string(),
        }
    }

    /// Outcome for any transport or parse failure.
    #[must_use]
    pub fn network_failure() -> Self {
        Self::Failed {
            kind: FailureKind::Network,
            reason: NETWORK_ERROR.to_string(),
        }
    }

    /// Whether this is a positive match.
    #[must_use]
    pub fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    /// Whether a request was actually issued for this outcome.
    #[must_use]
    pub fn reached_service(&self) -> bool {
        !matches!(
            self,
            Self::Failed {
                kind: FailureKind::MissingCapture | FailureKind::Configuration,
                ..
            }
        )
    }

    /// Headline message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Matched { .. } => FACE_MATCHED,
            Self::NotMatched { reason, .. } | Self::Failed { reason, .. } => reason,
        }
    }

    /// Similarity score, if any.
    #[must_use]
    pub fn similarity(&self) -> Option<f64> {
        match self {
            Self::Matched { similarity, .. } | Self::NotMatched { similarity, .. } => *similarity,
            Self::Failed { .. } => None,
        }
    }

    /// Matched image reference, if any.
    #[must_use]
    pub fn matched_image(&self) -> Option<&str> {
        match self {
            Self::Matched { matched_image, .. } | Self::NotMatched { matched_image, .. } => {
                matched_image.as_deref()
            }
            Self::Failed { .. } => None,
        }
    }

    /// License record, for matches.
    #[must_use]
    pub fn license(&self) -> Option<&LicenseDetails> {
        match self {
            Self::Matched { license, .. } => Some(license),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched { similarity, .. } => {
                write!(f, "{FACE_MATCHED} ({})", format_similarity(*similarity))
            }
            Self::NotMatched { reason, .. } | Self::Failed { reason, .. } => f.write_str(reason),
        }
    }
}

/// Errors unwrapping the service's reply envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The reply, or its unwrapped body, is not a JSON object.
    #[error("reply is not a JSON object")]
    NotAnObject,

    /// The `body` field is a string that does not hold valid JSON.
    #[error("encoded body is not valid JSON: {0}")]
    EncodedBody(#[source] serde_json::Error),

    /// The object does not have the expected field types.
    #[error("unexpected reply shape: {0}")]
    Shape(#[source] serde_json::Error),
}

/// The ways the service (or the gateway in front of it) wraps its reply.
#[derive(Debug, Clone, PartialEq)]
enum Envelope {
    /// The reply object itself.
    Direct(Map<String, Value>),
    /// `{ "body": "<JSON text>" }`
    EncodedBody(String),
    /// `{ "body": { ... } }`
    NestedBody(Map<String, Value>),
}

impl Envelope {
    fn classify(value: Value) -> Result<Self, EnvelopeError> {
        let Value::Object(mut outer) = value else {
            return Err(EnvelopeError::NotAnObject);
        };
        match outer.remove("body") {
            Some(Value::String(text)) => Ok(Self::EncodedBody(text)),
            Some(Value::Object(inner)) => Ok(Self::NestedBody(inner)),
            Some(other) => {
                // A non-envelope `body` belongs to the reply itself.
                outer.insert("body".to_string(), other);
                Ok(Self::Direct(outer))
            }
            None => Ok(Self::Direct(outer)),
        }
    }

    fn into_object(self) -> Result<Map<String, Value>, EnvelopeError> {
        match self {
            Self::Direct(map) | Self::NestedBody(map) => Ok(map),
            Self::EncodedBody(text) => {
                match serde_json::from_str(&text).map_err(EnvelopeError::EncodedBody)? {
                    Value::Object(map) => Ok(map),
                    _ => Err(EnvelopeError::NotAnObject),
                }
            }
        }
    }
}

/// Fields consumed from an unwrapped reply.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceReply {
    /// Verdict message.
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    /// Similarity score, 0-100.
    #[serde(rename = "Similarity", default, deserialize_with = "lenient_f64")]
    pub similarity: Option<f64>,
    /// License record of the matched holder.
    #[serde(rename = "LicenseData", default, deserialize_with = "lenient_object")]
    pub license_data: Option<Map<String, Value>>,
    /// Matched reference image.
    #[serde(rename = "MatchedImage", default, deserialize_with = "lenient_string")]
    pub matched_image: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_object<'de, D>(deserializer: D) -> Result<Option<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

impl ServiceReply {
    /// Unwrap whichever envelope the reply arrived in and read its fields.
    ///
    /// # Errors
    ///
    /// Returns an error if no reply object can be recovered.
    pub fn from_envelope(value: Value) -> Result<Self, EnvelopeError> {
        let envelope = Envelope::classify(value)?;
        debug!(shape = envelope.shape_name(), "reply envelope");
        let object = envelope.into_object()?;
        serde_json::from_value(Value::Object(object)).map_err(EnvelopeError::Shape)
    }

    /// Interpret the reply as a verdict.
    #[must_use]
    pub fn into_outcome(self) -> VerificationOutcome {
        if self.message.as_deref() == Some(FACE_MATCHED) {
            VerificationOutcome::Matched {
                license: self
                    .license_data
                    .as_ref()
                    .map(LicenseDetails::from_map)
                    .unwrap_or_default(),
                similarity: self.similarity,
                matched_image: self.matched_image,
            }
        } else {
            VerificationOutcome::NotMatched {
                reason: self
                    .message
                    .unwrap_or_else(|| DEFAULT_NO_MATCH.to_string()),
                similarity: self.similarity,
                matched_image: self.matched_image,
            }
        }
    }
}

impl Envelope {
    fn shape_name(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::EncodedBody(_) => "encoded_body",
            Self::NestedBody(_) => "nested_body",
        }
    }
}

/// Turn a raw service response into an outcome.
///
/// The HTTP status is not consulted; the reply body alone decides the verdict.
#[must_use]
pub fn interpret_response(response: &HttpResponse) -> VerificationOutcome {
    if !response.is_success() {
        warn!(status = response.status, "verification service returned an error status");
    }
    let value = match response.json() {
        Ok(Some(value)) => value,
        Ok(None) => {
            warn!("verification reply is empty");
            return VerificationOutcome::network_failure();
        }
        Err(e) => {
            warn!("verification reply is not JSON: {e}");
            return VerificationOutcome::network_failure();
        }
    };
    match ServiceReply::from_envelope(value) {
        Ok(reply) => reply.into_outcome(),
        Err(e) => {
            warn!("verification reply could not be read: {e}");
            VerificationOutcome::network_failure()
        }
    }
}

/// Submit a still to the verification service.
///
/// Without a still, or without a configured endpoint, no request is made.
pub async fn verify(
    transport: &dyn HttpTransport,
    config: &Config,
    image: Option<&CapturedImage>,
) -> VerificationOutcome {
    let Some(image) = image else {
        debug!("verification requested without a still");
        return VerificationOutcome::missing_capture();
    };
    let url = match config.verify_url() {
        Ok(url) => url,
        Err(e) => {
            warn!("{e}");
            return VerificationOutcome::Failed {
                kind: FailureKind::Configuration,
                reason: e.to_string(),
            };
        }
    };

    let body = json!({
        "live_image_base64": image.payload_base64(),
        "source_bucket": config.endpoints.source_bucket,
    });
    info!(bytes = image.bytes().len(), "submitting still for verification");

    let outcome = match transport.post_json(&url, &body).await {
        Ok(response) => interpret_response(&response),
        Err(e) => {
            warn!("verification request failed: {e}");
            VerificationOutcome::network_failure()
        }
    };
    info!(
        matched = outcome.is_matched(),
        similarity = %format_similarity(outcome.similarity()),
        "verification complete"
    );
    outcome
}
