// fund-ledger-server/src/auth.rs
// ============================================================================
// Module: Upload Authentication
// Description: Shared-secret API key check for upload requests.
// Purpose: Reject uploads that do not present the configured key.
// Dependencies: axum, subtle, thiserror
// ============================================================================

//! ## Overview
//! Upload callers present the shared secret in the `X-API-Key` header. The
//! comparison is constant-time with respect to key content. Decisions are
//! fail-closed: a missing, oversized, or non-ASCII header is a mismatch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Maximum accepted header value size.
const MAX_API_KEY_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No `X-API-Key` header.
    #[error("missing api key")]
    Missing,
    /// Header value exceeds the size limit.
    #[error("api key header too large")]
    TooLarge,
    /// Header present but does not match.
    #[error("invalid api key")]
    Mismatch,
}

// ============================================================================
// SECTION: API Key Auth
// ============================================================================

/// Shared-secret authenticator.
#[derive(Clone)]
pub struct ApiKeyAuth {
    /// Expected key bytes.
    expected: Vec<u8>,
}

impl ApiKeyAuth {
    /// Builds an authenticator for the configured key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            expected: api_key.into().into_bytes(),
        }
    }

    /// Checks the `X-API-Key` header of a request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the header is missing or does not match.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let value = headers.get(API_KEY_HEADER).ok_or(AuthError::Missing)?;
        let presented = value.as_bytes();
        if presented.len() > MAX_API_KEY_HEADER_BYTES {
            return Err(AuthError::TooLarge);
        }
        if bool::from(presented.ct_eq(&self.expected)) { Ok(()) } else { Err(AuthError::Mismatch) }
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth").field("expected", &"<redacted>").finish()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
