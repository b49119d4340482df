use std::sync::Arc;

use http::{HeaderMap, header::AUTHORIZATION};
use tracing::debug;

/// Decides whether a request carries an authorized identity.
///
/// Implementations see only the request headers, so a real signature
/// verifier can replace [`AccessKeyAuthorizer`] without touching any
/// handler.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, headers: &HeaderMap) -> bool;
}

/// Access-key presence check compatible with clients that sign requests
/// with `AWS4-HMAC-SHA256 Credential=<access_key>/...`.
///
/// The request is authorized iff an `Authorization` header is present and
/// contains `Credential=<access_key>` as a substring. No signature is
/// verified.
#[derive(Clone, Debug)]
pub struct AccessKeyAuthorizer {
    credential_marker: String,
}

impl AccessKeyAuthorizer {
    pub fn new(access_key: impl Into<String>) -> Self {
        Self {
            credential_marker: format!("Credential={}", access_key.into()),
        }
    }
}

impl Authorizer for AccessKeyAuthorizer {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(auth) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
            debug!("request carried no authorization header");
            return false;
        };

        if auth.is_empty() {
            return false;
        }

        auth.contains(&self.credential_marker)
    }
}

impl Authorizer for Arc<dyn Authorizer> {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        self.as_ref().authorize(headers)
    }
}
