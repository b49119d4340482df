use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    response::IntoResponse,
};
use http::{HeaderMap, StatusCode, header::ETAG, header::HOST};
use kura_common::error::KuraError;
use serde::{Deserialize, Serialize};

use crate::handlers::object::body_reader;
use crate::handlers::{S3Result, header_value, quoted_etag, require_auth, xml_response};
use crate::router::ApiState;

#[derive(Debug, Serialize)]
#[serde(rename = "InitiateMultipartUploadResult")]
struct InitiateMultipartUploadResultXml {
    #[serde(rename = "Bucket")]
    bucket: String,
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "UploadId")]
    upload_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "CompleteMultipartUpload")]
struct CompleteMultipartUploadXml {
    #[serde(rename = "Part", default)]
    parts: Vec<CompletePartXml>,
}

#[derive(Debug, Deserialize)]
struct CompletePartXml {
    #[serde(rename = "PartNumber")]
    part_number: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename = "CompleteMultipartUploadResult")]
struct CompleteMultipartUploadResultXml {
    #[serde(rename = "Location")]
    location: String,
    #[serde(rename = "Bucket")]
    bucket: String,
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "ETag")]
    etag: String,
}

fn parse_upload_id(query: &HashMap<String, String>) -> Result<&str, KuraError> {
    query
        .get("uploadId")
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| KuraError::MalformedRequest("missing uploadId".to_string()))
}

fn parse_part_number(query: &HashMap<String, String>) -> Result<u32, KuraError> {
    query
        .get("partNumber")
        .ok_or_else(|| KuraError::MalformedRequest("missing partNumber".to_string()))?
        .parse::<u32>()
        .ok()
        .filter(|n| *n >= 1)
        .ok_or_else(|| {
            KuraError::MalformedRequest("partNumber must be a positive integer".to_string())
        })
}

pub async fn create_multipart_upload(
    State(state): State<ApiState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> S3Result {
    require_auth(&state, &headers, &format!("/{bucket}/{key}"))?;

    let upload_id = state.store.create_multipart_upload(&bucket, &key).await?;
    let payload = InitiateMultipartUploadResultXml {
        bucket,
        key,
        upload_id,
    };
    xml_response(StatusCode::OK, &payload)
}

pub async fn upload_part(
    State(state): State<ApiState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> S3Result {
    require_auth(&state, &headers, &format!("/{bucket}/{key}"))?;

    let upload_id = parse_upload_id(&query)?;
    let part_number = parse_part_number(&query)?;

    let etag = state
        .store
        .upload_part(&bucket, upload_id, part_number, body_reader(body))
        .await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(ETAG, header_value(&quoted_etag(&etag))?);
    Ok((StatusCode::OK, response_headers).into_response())
}

pub async fn complete_multipart_upload(
    State(state): State<ApiState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> S3Result {
    require_auth(&state, &headers, &format!("/{bucket}/{key}"))?;

    let upload_id = parse_upload_id(&query)?;
    // The part list is parsed before the store mutates anything.
    let body_str = std::str::from_utf8(&body)
        .map_err(|err| KuraError::MalformedXml(format!("invalid encoding: {err}")))?;
    let payload: CompleteMultipartUploadXml = quick_xml::de::from_str(body_str)
        .map_err(|err| KuraError::MalformedXml(err.to_string()))?;
    let part_numbers: Vec<u32> = payload.parts.iter().map(|part| part.part_number).collect();

    // The store assembles against the key persisted at initiation, not the
    // one in the request path.
    let info = state
        .store
        .complete_multipart_upload(&bucket, upload_id, &part_numbers)
        .await?;

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    let payload = CompleteMultipartUploadResultXml {
        location: format!("http://{host}/{bucket}/{}", info.key),
        bucket,
        key: info.key.clone(),
        etag: quoted_etag(&info.etag),
    };
    xml_response(StatusCode::OK, &payload)
}

pub async fn abort_multipart_upload(
    State(state): State<ApiState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> S3Result {
    require_auth(&state, &headers, &format!("/{bucket}/{key}"))?;

    let upload_id = parse_upload_id(&query)?;
    state.store.abort_multipart_upload(&bucket, upload_id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
