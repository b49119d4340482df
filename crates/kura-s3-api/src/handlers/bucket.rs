use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use http::{HeaderMap, StatusCode, header::LOCATION};
use kura_common::types::{BucketInfo, ObjectInfo};
use serde::Serialize;

use crate::handlers::{S3Result, header_value, quoted_etag, require_auth, xml_response};
use crate::router::ApiState;

#[derive(Debug, Serialize)]
#[serde(rename = "ListAllMyBucketsResult")]
struct ListAllMyBucketsResult {
    #[serde(rename = "Owner")]
    owner: Owner,
    #[serde(rename = "Buckets")]
    buckets: Buckets,
}

#[derive(Debug, Serialize)]
struct Owner {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "DisplayName")]
    display_name: String,
}

#[derive(Debug, Serialize)]
struct Buckets {
    #[serde(rename = "Bucket", default)]
    bucket: Vec<BucketXml>,
}

#[derive(Debug, Serialize)]
struct BucketXml {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "CreationDate")]
    creation_date: String,
}

impl From<&BucketInfo> for BucketXml {
    fn from(info: &BucketInfo) -> Self {
        Self {
            name: info.name.clone(),
            creation_date: info.created.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "ListBucketResult")]
struct ListBucketResultXml {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Prefix")]
    prefix: String,
    #[serde(rename = "Marker")]
    marker: String,
    #[serde(rename = "MaxKeys")]
    max_keys: i32,
    #[serde(rename = "IsTruncated")]
    is_truncated: bool,
    #[serde(rename = "Contents", default)]
    contents: Vec<ObjectContentXml>,
}

#[derive(Debug, Serialize)]
struct ObjectContentXml {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "LastModified")]
    last_modified: String,
    #[serde(rename = "ETag")]
    etag: String,
    #[serde(rename = "Size")]
    size: i64,
    #[serde(rename = "StorageClass")]
    storage_class: String,
}

impl From<ObjectInfo> for ObjectContentXml {
    fn from(info: ObjectInfo) -> Self {
        Self {
            key: info.key,
            last_modified: info.last_modified.to_rfc3339(),
            etag: quoted_etag(&info.etag),
            size: info.size,
            storage_class: "STANDARD".to_string(),
        }
    }
}

pub async fn list_buckets(State(state): State<ApiState>, headers: HeaderMap) -> S3Result {
    require_auth(&state, &headers, "/")?;

    let buckets = state.store.list_buckets().await?;
    let payload = ListAllMyBucketsResult {
        owner: Owner {
            id: "kura".to_string(),
            display_name: "kura".to_string(),
        },
        buckets: Buckets {
            bucket: buckets.iter().map(BucketXml::from).collect(),
        },
    };
    xml_response(StatusCode::OK, &payload)
}

pub async fn make_bucket(
    State(state): State<ApiState>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
) -> S3Result {
    require_auth(&state, &headers, &format!("/{bucket}"))?;

    state.store.make_bucket(&bucket).await?;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(LOCATION, header_value(&format!("/{bucket}"))?);
    Ok((StatusCode::OK, response_headers).into_response())
}

/// Existence is reported through the status code alone.
pub async fn head_bucket(State(state): State<ApiState>, Path(bucket): Path<String>) -> S3Result {
    if state.store.bucket_exists(&bucket).await? {
        Ok(StatusCode::OK.into_response())
    } else {
        Ok(StatusCode::NOT_FOUND.into_response())
    }
}

pub async fn list_objects(
    State(state): State<ApiState>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
) -> S3Result {
    require_auth(&state, &headers, &format!("/{bucket}"))?;

    let objects = state.store.list_objects(&bucket).await?;
    let payload = ListBucketResultXml {
        name: bucket,
        prefix: String::new(),
        marker: String::new(),
        max_keys: 1000,
        is_truncated: false,
        contents: objects.into_iter().map(ObjectContentXml::from).collect(),
    };
    xml_response(StatusCode::OK, &payload)
}
