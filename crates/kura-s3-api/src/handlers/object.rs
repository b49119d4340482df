use axum::{
    body::Body,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use http::{
    HeaderMap, StatusCode,
    header::{
        ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG,
        LAST_MODIFIED, RANGE,
    },
};
use kura_common::{error::KuraError, types::ObjectInfo};
use kura_storage::{ByteSpan, ObjectReader};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::handlers::{S3Result, header_value, quoted_etag, require_auth};
use crate::range::{parse_range_header, resolve_span};
use crate::router::ApiState;

/// Responses are streamed in chunks of this size so memory use stays flat
/// regardless of object or range size.
const STREAM_CHUNK_SIZE: usize = 8 * 1024;

/// Adapts a request body into the bounded reader the store consumes.
pub(crate) fn body_reader(body: Body) -> ObjectReader {
    Box::new(StreamReader::new(
        body.into_data_stream().map_err(std::io::Error::other),
    ))
}

fn write_object_headers(headers: &mut HeaderMap, info: &ObjectInfo) -> Result<(), KuraError> {
    headers.insert(CONTENT_TYPE, header_value(&info.content_type)?);
    headers.insert(ETAG, header_value(&quoted_etag(&info.etag))?);
    headers.insert(LAST_MODIFIED, header_value(&info.last_modified.to_rfc2822())?);
    headers.insert(ACCEPT_RANGES, header_value("bytes")?);

    let filename = info
        .key
        .rsplit('/')
        .next()
        .unwrap_or(info.key.as_str())
        .replace('"', "");
    headers.insert(
        CONTENT_DISPOSITION,
        header_value(&format!("inline; filename=\"{filename}\""))?,
    );

    Ok(())
}

pub async fn put_object(
    State(state): State<ApiState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> S3Result {
    require_auth(&state, &headers, &format!("/{bucket}/{key}"))?;

    let info = state
        .store
        .put_object(&bucket, &key, body_reader(body))
        .await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(ETAG, header_value(&quoted_etag(&info.etag))?);
    Ok((StatusCode::OK, response_headers).into_response())
}

/// Anonymous read; honors `Range` with partial-content semantics.
pub async fn get_object(
    State(state): State<ApiState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> S3Result {
    let info = state.store.stat_object(&bucket, &key).await?;
    let size = u64::try_from(info.size).unwrap_or(0);

    let span = headers
        .get(RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range_header);

    let (status, span) = match span {
        Some((start, end)) => {
            let span = resolve_span(start, end, size)?;
            (StatusCode::PARTIAL_CONTENT, Some(span))
        }
        None => (StatusCode::OK, None),
    };

    let reader = state.store.open_object(&bucket, &key, span).await?;
    let stream = ReaderStream::with_capacity(reader, STREAM_CHUNK_SIZE);

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    write_object_headers(response.headers_mut(), &info)?;

    let content_length = span.map_or(size, |span| span.byte_count());
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, header_value(&content_length.to_string())?);

    if let Some(ByteSpan { start, end }) = span {
        response.headers_mut().insert(
            CONTENT_RANGE,
            header_value(&format!("bytes {start}-{end}/{size}"))?,
        );
    }

    Ok(response)
}

pub async fn head_object(
    State(state): State<ApiState>,
    Path((bucket, key)): Path<(String, String)>,
) -> S3Result {
    let info = state.store.stat_object(&bucket, &key).await?;

    let mut response = Response::new(Body::empty());
    write_object_headers(response.headers_mut(), &info)?;
    response
        .headers_mut()
        .insert(CONTENT_LENGTH, header_value(&info.size.to_string())?);
    Ok(response)
}

pub async fn delete_object(
    State(state): State<ApiState>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> S3Result {
    require_auth(&state, &headers, &format!("/{bucket}/{key}"))?;

    state.store.delete_object(&bucket, &key).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
