pub mod bucket;
pub mod multipart;
pub mod object;

use axum::response::{IntoResponse, Response};
use http::{HeaderMap, HeaderValue, StatusCode};
use kura_auth::Authorizer;
use kura_common::error::KuraError;
use serde::Serialize;

use crate::error::S3Error;
use crate::router::ApiState;

pub(crate) type S3Result = Result<Response, S3Error>;

/// Matched resource, unmatched method.
pub async fn method_not_allowed() -> S3Error {
    S3Error(KuraError::MethodNotAllowed)
}

/// Applies the credential guard. Listing and mutating operations call this
/// first; object reads stay anonymous on purpose.
pub(crate) fn require_auth(
    state: &ApiState,
    headers: &HeaderMap,
    resource: &str,
) -> Result<(), S3Error> {
    if state.auth.authorize(headers) {
        Ok(())
    } else {
        Err(S3Error(KuraError::AccessDenied(resource.to_string())))
    }
}

pub(crate) fn quoted_etag(etag: &str) -> String {
    format!("\"{etag}\"")
}

pub(crate) fn header_value(value: &str) -> Result<HeaderValue, KuraError> {
    HeaderValue::from_str(value)
        .map_err(|err| KuraError::InternalError(format!("invalid header value: {err}")))
}

pub(crate) fn xml_response<T: Serialize>(status: StatusCode, payload: &T) -> S3Result {
    let xml = quick_xml::se::to_string(payload).map_err(|err| {
        S3Error::from(KuraError::InternalError(format!(
            "failed to serialize xml response: {err}"
        )))
    })?;
    let body = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{xml}");
    Ok((status, [("Content-Type", "application/xml")], body).into_response())
}
