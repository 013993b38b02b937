//! # Webhook Intake Module
//!
//! Signature verification and event metadata extraction for inbound
//! webhook notifications.
//!
//! Verification happens before any parsing or storage: a notification that
//! fails its source's signature check is rejected with no side effect at
//! all. Only after verification does the pipeline extract the event type
//! and external event ID and hand off to the [`WebhookDispatcher`].

use crate::{EventSource, ValidationError};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;

mod dispatcher;
mod replay;

pub use dispatcher::{DispatchError, DispatchResult, WebhookDispatcher};
pub use replay::{RetryCoordinator, RetryError, RetryOutcome};

// ============================================================================
// Header Conventions
// ============================================================================

/// Signature header carried by source-control notifications
pub const SCM_SIGNATURE_HEADER: &str = "x-scm-signature-256";

/// Event-type header carried by source-control notifications
pub const SCM_EVENT_HEADER: &str = "x-scm-event";

/// Delivery-ID header carried by source-control notifications
pub const SCM_DELIVERY_HEADER: &str = "x-scm-delivery";

/// Shared-token header carried by payment-processor notifications
pub const PAYMENT_TOKEN_HEADER: &str = "x-payment-webhook-token";

// ============================================================================
// Event Metadata
// ============================================================================

/// Event type and external event ID extracted from a verified notification
///
/// Extraction is source-specific: the SCM host carries both in headers,
/// the payment processor carries both in the JSON body (`type` / `id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    pub event_type: String,
    pub external_event_id: String,
}

impl EventMetadata {
    /// Extract metadata from a verified request
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a required header or body field is
    /// missing or unreadable. Extraction failures are boundary errors; the
    /// notification is not stored.
    pub fn extract(
        source: EventSource,
        headers: &HashMap<String, String>,
        body: &[u8],
    ) -> Result<Self, ValidationError> {
        match source {
            EventSource::Scm => {
                let event_type =
                    headers
                        .get(SCM_EVENT_HEADER)
                        .ok_or_else(|| ValidationError::Required {
                            field: SCM_EVENT_HEADER.to_string(),
                        })?;
                let external_event_id =
                    headers
                        .get(SCM_DELIVERY_HEADER)
                        .ok_or_else(|| ValidationError::Required {
                            field: SCM_DELIVERY_HEADER.to_string(),
                        })?;
                if event_type.is_empty() || external_event_id.is_empty() {
                    return Err(ValidationError::InvalidFormat {
                        field: "headers".to_string(),
                        message: "event type and delivery ID must be non-empty".to_string(),
                    });
                }
                Ok(Self {
                    event_type: event_type.clone(),
                    external_event_id: external_event_id.clone(),
                })
            }
            EventSource::Payment => {
                let payload: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
                    ValidationError::InvalidFormat {
                        field: "body".to_string(),
                        message: format!("payload is not valid JSON: {}", e),
                    }
                })?;
                let event_type = payload
                    .get("type")
                    .and_then(|t| t.as_str())
                    .ok_or_else(|| ValidationError::Required {
                        field: "type".to_string(),
                    })?
                    .to_string();
                let external_event_id = payload
                    .get("id")
                    .and_then(|i| i.as_str())
                    .ok_or_else(|| ValidationError::Required {
                        field: "id".to_string(),
                    })?
                    .to_string();
                Ok(Self {
                    event_type,
                    external_event_id,
                })
            }
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Rejection of an inbound notification at the authentication boundary
///
/// A signature failure is terminal for the delivery attempt: nothing is
/// stored and nothing is logged as a processing failure, because an
/// unauthenticated notification is not a recognized event.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing signature header '{header}'")]
    MissingSignature { header: &'static str },

    #[error("Malformed signature: {message}")]
    Malformed { message: String },

    #[error("Signature does not match")]
    Mismatch,

    #[error("No signing secret configured for source '{event_source}'")]
    NotConfigured { event_source: EventSource },
}

// ============================================================================
// Verification
// ============================================================================

/// Per-source authentication of an inbound notification
///
/// Implementations must not allocate observable timing differences based on
/// secret material; digest and token comparisons are constant-time.
pub trait SignatureVerifier: Send + Sync {
    /// Verify the notification before any parsing or storage
    fn verify(
        &self,
        headers: &HashMap<String, String>,
        body: &[u8],
    ) -> Result<(), SignatureError>;
}

/// HMAC-SHA256 verifier for the source-control host
///
/// Expects `x-scm-signature-256: sha256=<hex>` computed over the raw body.
/// The `sha256=` prefix is stripped if present; the digest comparison is
/// constant-time via `hmac::Mac::verify_slice`.
pub struct HmacSignatureVerifier {
    secret: String,
}

impl HmacSignatureVerifier {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}

impl std::fmt::Debug for HmacSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSignatureVerifier")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

impl SignatureVerifier for HmacSignatureVerifier {
    fn verify(
        &self,
        headers: &HashMap<String, String>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        type HmacSha256 = Hmac<Sha256>;

        let signature =
            headers
                .get(SCM_SIGNATURE_HEADER)
                .ok_or(SignatureError::MissingSignature {
                    header: SCM_SIGNATURE_HEADER,
                })?;

        let hex_part = signature.strip_prefix("sha256=").unwrap_or(signature);
        let sig_bytes = hex::decode(hex_part).map_err(|_| SignatureError::Malformed {
            message: "signature is not valid hex".to_string(),
        })?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|_| {
            SignatureError::Malformed {
                message: "secret cannot be used as HMAC key".to_string(),
            }
        })?;
        mac.update(body);

        mac.verify_slice(&sig_bytes)
            .map_err(|_| SignatureError::Mismatch)
    }
}

/// Shared-token verifier for the payment processor
///
/// Expects the token verbatim in `x-payment-webhook-token`, compared in
/// constant time.
pub struct TokenSignatureVerifier {
    token: String,
}

impl TokenSignatureVerifier {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

impl std::fmt::Debug for TokenSignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSignatureVerifier")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl SignatureVerifier for TokenSignatureVerifier {
    fn verify(
        &self,
        headers: &HashMap<String, String>,
        _body: &[u8],
    ) -> Result<(), SignatureError> {
        let presented =
            headers
                .get(PAYMENT_TOKEN_HEADER)
                .ok_or(SignatureError::MissingSignature {
                    header: PAYMENT_TOKEN_HEADER,
                })?;

        // ct_eq requires equal lengths; a length mismatch is already a
        // non-match and leaks nothing about the token's content.
        if presented.len() != self.token.len() {
            return Err(SignatureError::Mismatch);
        }
        if presented.as_bytes().ct_eq(self.token.as_bytes()).into() {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

// ============================================================================
// Verifier Registry
// ============================================================================

/// Registry mapping sources to their signature verifiers
///
/// Built once at service startup and used read-only during request
/// handling. A source without a verifier fails closed: its notifications
/// are rejected as unauthenticated.
#[derive(Clone, Default)]
pub struct VerifierRegistry {
    verifiers: HashMap<EventSource, Arc<dyn SignatureVerifier>>,
}

impl VerifierRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self {
            verifiers: HashMap::new(),
        }
    }

    /// Register a verifier for a source, replacing any existing one
    pub fn register(&mut self, source: EventSource, verifier: Arc<dyn SignatureVerifier>) -> &mut Self {
        self.verifiers.insert(source, verifier);
        self
    }

    /// Verify a notification for a source
    ///
    /// Fails with [`SignatureError::NotConfigured`] when the source has no
    /// registered verifier.
    pub fn verify(
        &self,
        source: EventSource,
        headers: &HashMap<String, String>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        match self.verifiers.get(&source) {
            Some(verifier) => verifier.verify(headers, body),
            None => Err(SignatureError::NotConfigured {
                event_source: source,
            }),
        }
    }

    /// Check whether a source has a verifier
    pub fn contains(&self, source: EventSource) -> bool {
        self.verifiers.contains_key(&source)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
