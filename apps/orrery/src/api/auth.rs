//! # Access Mode Resolution
//!
//! Maps the `X-Universe-Auth` header to an access mode. Two shared
//! secrets come from the environment:
//!
//! - `ORRERY_PRIVATE_SECRET`: owner access (everything)
//! - `ORRERY_PARTNER_SECRET`: partner access (verified data plus
//!   collaboration context)
//!
//! A missing or unrecognized credential resolves to public instead of
//! an HTTP error, so probing the header cannot distinguish a wrong
//! secret from no secrets being configured. A rejected credential is
//! still logged.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use orrery_core::AccessMode;
use subtle::ConstantTimeEq;

/// Header carrying the shared secret.
pub const AUTH_HEADER: &str = "x-universe-auth";

/// Read the private-mode secret. Empty values count as unset.
pub fn private_secret_from_env() -> Option<String> {
    std::env::var("ORRERY_PRIVATE_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
}

/// Read the partner-mode secret. Empty values count as unset.
pub fn partner_secret_from_env() -> Option<String> {
    std::env::var("ORRERY_PARTNER_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
}

/// Constant-time comparison over zero-padded copies.
///
/// Padding both sides to a common length keeps the comparison itself
/// length-independent; the explicit length check afterwards still
/// rejects prefixes.
fn secrets_match(provided: &str, expected: &str) -> bool {
    let max_len = provided.len().max(expected.len());
    let mut provided_padded = provided.as_bytes().to_vec();
    let mut expected_padded = expected.as_bytes().to_vec();
    provided_padded.resize(max_len, 0);
    expected_padded.resize(max_len, 0);

    let equal: bool = provided_padded.ct_eq(&expected_padded).into();
    equal && provided.len() == expected.len()
}

/// Resolve the access mode for a presented credential.
///
/// Secrets are read from the environment per request; rotating them
/// does not require a restart.
pub fn resolve_mode(presented: Option<&str>) -> AccessMode {
    let Some(credential) = presented.filter(|c| !c.is_empty()) else {
        return AccessMode::Public;
    };

    if private_secret_from_env().is_some_and(|secret| secrets_match(credential, &secret)) {
        return AccessMode::Private;
    }
    if partner_secret_from_env().is_some_and(|secret| secrets_match(credential, &secret)) {
        return AccessMode::Partner;
    }

    tracing::warn!(
        event = "auth_failure",
        reason = "unrecognized_credential",
        "Credential presented but matched no configured secret"
    );
    AccessMode::Public
}

/// Middleware that resolves the access mode once per request and
/// stashes it in request extensions for handlers to read.
pub async fn access_mode_middleware(mut request: Request<Body>, next: Next) -> Response {
    let presented = request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok());
    let mode = resolve_mode(presented);
    request.extensions_mut().insert(mode);
    next.run(request).await
}

// =============================================================================
// TESTS
// =============================================================================
