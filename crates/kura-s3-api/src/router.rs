use std::{collections::HashMap, sync::Arc};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use http::HeaderMap;
use kura_auth::Authorizer;
use kura_storage::ObjectStore;

use crate::error::S3Error;
use crate::handlers;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn ObjectStore>,
    pub auth: Arc<dyn Authorizer>,
}

/// `PUT /{bucket}/{*key}`: a part upload when both multipart markers are
/// present, a plain object write otherwise.
async fn put_object_dispatch(
    State(state): State<ApiState>,
    Path(path): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, S3Error> {
    if query.contains_key("uploadId") && query.contains_key("partNumber") {
        handlers::multipart::upload_part(
            State(state),
            Path(path),
            Query(query),
            headers,
            body,
        )
        .await
    } else {
        handlers::object::put_object(State(state), Path(path), headers, body).await
    }
}

/// `POST /{bucket}/{*key}`: `?uploads` initiates, `?uploadId` completes.
async fn post_object_dispatch(
    State(state): State<ApiState>,
    Path(path): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, S3Error> {
    if query.contains_key("uploads") {
        handlers::multipart::create_multipart_upload(State(state), Path(path), headers).await
    } else if query.contains_key("uploadId") {
        handlers::multipart::complete_multipart_upload(
            State(state),
            Path(path),
            Query(query),
            headers,
            body,
        )
        .await
    } else {
        Ok(handlers::method_not_allowed().await.into_response())
    }
}

/// `DELETE /{bucket}/{*key}`: `?uploadId` aborts, otherwise object delete.
async fn delete_object_dispatch(
    State(state): State<ApiState>,
    Path(path): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, S3Error> {
    if query.contains_key("uploadId") {
        handlers::multipart::abort_multipart_upload(State(state), Path(path), Query(query), headers)
            .await
    } else {
        handlers::object::delete_object(State(state), Path(path), headers).await
    }
}

pub fn s3_router(store: Arc<dyn ObjectStore>, auth: Arc<dyn Authorizer>) -> Router {
    let state = ApiState { store, auth };

    Router::new()
        .route(
            "/",
            get(handlers::bucket::list_buckets).fallback(handlers::method_not_allowed),
        )
        .route(
            "/{bucket}",
            put(handlers::bucket::make_bucket)
                .head(handlers::bucket::head_bucket)
                .get(handlers::bucket::list_objects)
                .fallback(handlers::method_not_allowed),
        )
        .route(
            "/{bucket}/{*key}",
            put(put_object_dispatch)
                .get(handlers::object::get_object)
                .head(handlers::object::head_object)
                .post(post_object_dispatch)
                .delete(delete_object_dispatch)
                .fallback(handlers::method_not_allowed),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Router, body::Body};
    use http::{Request, StatusCode, header::AUTHORIZATION};
    use http_body_util::BodyExt;
    use kura_auth::AccessKeyAuthorizer;
    use kura_storage::FsStore;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::s3_router;

    const AUTH: &str = "AWS4-HMAC-SHA256 Credential=testkey/20260101/ap-southeast-1/s3/aws4_request, \
                        SignedHeaders=host;x-amz-date, Signature=00";

    async fn test_router() -> (TempDir, Router) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FsStore::new(dir.path().to_path_buf()).await.unwrap());
        let auth = Arc::new(AccessKeyAuthorizer::new("testkey"));
        (dir, s3_router(store, auth))
    }

    fn request(method: &str, uri: &str, authed: bool, body: impl Into<Body>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if authed {
            builder = builder.header(AUTHORIZATION, AUTH);
        }
        builder.body(body.into()).unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn extract_tag(xml: &str, tag: &str) -> String {
        let open = format!("<{tag}>");
        let close = format!("</{tag}>");
        let start = xml.find(&open).unwrap() + open.len();
        let end = xml.find(&close).unwrap();
        xml[start..end].to_string()
    }

    #[tokio::test]
    async fn put_object_then_range_read() {
        let (_dir, router) = test_router().await;

        let response = router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["location"], "/docs");

        let response = router
            .clone()
            .oneshot(request("PUT", "/docs/readme.txt", true, "hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // md5("hello")
        assert_eq!(
            response.headers()["etag"],
            "\"5d41402abc4b2a76b9719d911017c592\""
        );

        // Anonymous full read.
        let response = router
            .clone()
            .oneshot(request("GET", "/docs/readme.txt", false, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(response.headers()["accept-ranges"], "bytes");
        assert_eq!(body_string(response).await, "hello");

        // Anonymous range read.
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/docs/readme.txt")
                    .header("Range", "bytes=0-2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()["content-range"], "bytes 0-2/5");
        assert_eq!(response.headers()["content-length"], "3");
        assert_eq!(body_string(response).await, "hel");
    }

    #[tokio::test]
    async fn open_ended_range_reads_to_eof() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(request("PUT", "/docs/r.bin", true, "0123456789"))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/docs/r.bin")
                    .header("Range", "bytes=4-")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()["content-range"], "bytes 4-9/10");
        assert_eq!(body_string(response).await, "456789");
    }

    #[tokio::test]
    async fn unrecognized_range_falls_back_to_full_body() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(request("PUT", "/docs/r.bin", true, "hello"))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/docs/r.bin")
                    .header("Range", "items=0-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hello");
    }

    #[tokio::test]
    async fn out_of_bounds_range_is_416() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(request("PUT", "/docs/r.bin", true, "hello"))
            .await
            .unwrap();

        for range in ["bytes=999-", "bytes=9-2"] {
            let response = router
                .clone()
                .oneshot(
                    Request::builder()
                        .method("GET")
                        .uri("/docs/r.bin")
                        .header("Range", range)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
            assert!(body_string(response).await.contains("<Code>InvalidRange</Code>"));
        }
    }

    #[tokio::test]
    async fn mutations_require_credentials() {
        let (_dir, router) = test_router().await;

        for (method, uri) in [
            ("GET", "/"),
            ("PUT", "/docs"),
            ("GET", "/docs"),
            ("PUT", "/docs/k"),
            ("DELETE", "/docs/k"),
            ("POST", "/docs/k?uploads"),
        ] {
            let response = router
                .clone()
                .oneshot(request(method, uri, false, Body::empty()))
                .await
                .unwrap();
            assert_eq!(
                response.status(),
                StatusCode::FORBIDDEN,
                "{method} {uri} should be denied"
            );
            let body = body_string(response).await;
            assert!(body.contains("<Code>AccessDenied</Code>"));
            assert!(body.contains("<RequestId>"));
        }
    }

    #[tokio::test]
    async fn object_ops_on_missing_bucket_are_404() {
        let (_dir, router) = test_router().await;

        let response = router
            .clone()
            .oneshot(request("PUT", "/ghost/key", true, "data"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("<Code>NoSuchBucket</Code>"));

        let response = router
            .clone()
            .oneshot(request("GET", "/ghost/key", false, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_key_is_no_such_key() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(request("GET", "/docs/absent", false, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("<Code>NoSuchKey</Code>"));
    }

    #[tokio::test]
    async fn delete_reports_no_content_even_when_absent() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();

        for _ in 0..2 {
            let response = router
                .clone()
                .oneshot(request("DELETE", "/docs/never-there", true, Body::empty()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
    }

    #[tokio::test]
    async fn head_bucket_reports_existence_by_status() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(request("HEAD", "/docs", false, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(request("HEAD", "/nope", false, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listings_show_buckets_and_objects() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(request("PUT", "/media", true, Body::empty()))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(request("PUT", "/docs/a/b.txt", true, "content"))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(request("GET", "/", true, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("<Name>docs</Name>"));
        assert!(body.contains("<Name>media</Name>"));

        let response = router
            .clone()
            .oneshot(request("GET", "/docs", true, Body::empty()))
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(body.contains("<Key>a/b.txt</Key>"));
        assert!(body.contains("<Size>7</Size>"));
    }

    #[tokio::test]
    async fn multipart_flow_over_http() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(request("POST", "/docs/big.bin?uploads", true, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let upload_id = extract_tag(&body_string(response).await, "UploadId");

        // Parts arrive out of order.
        for (part, data) in [(3, "ccc"), (1, "aaa"), (2, "bbb")] {
            let uri = format!("/docs/big.bin?uploadId={upload_id}&partNumber={part}");
            let response = router
                .clone()
                .oneshot(request("PUT", &uri, true, data))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().contains_key("etag"));
        }

        let complete = "<CompleteMultipartUpload>\
             <Part><PartNumber>1</PartNumber></Part>\
             <Part><PartNumber>2</PartNumber></Part>\
             <Part><PartNumber>3</PartNumber></Part>\
             </CompleteMultipartUpload>";
        let response = router
            .clone()
            .oneshot(request(
                "POST",
                &format!("/docs/big.bin?uploadId={upload_id}"),
                true,
                complete,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        // md5("aaabbbccc")
        assert!(body.contains("d1aaf4767a3c10a473407a4e47b02da6"));
        assert!(body.contains("<Key>big.bin</Key>"));

        let response = router
            .clone()
            .oneshot(request("GET", "/docs/big.bin", false, Body::empty()))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "aaabbbccc");
    }

    #[tokio::test]
    async fn malformed_complete_body_is_rejected() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(request("POST", "/docs/k?uploads", true, Body::empty()))
            .await
            .unwrap();
        let upload_id = extract_tag(&body_string(response).await, "UploadId");

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                &format!("/docs/k?uploadId={upload_id}"),
                true,
                "<this is not xml",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("<Code>MalformedXML</Code>"));
    }

    #[tokio::test]
    async fn abort_then_complete_is_no_such_upload() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(request("POST", "/docs/k?uploads", true, Body::empty()))
            .await
            .unwrap();
        let upload_id = extract_tag(&body_string(response).await, "UploadId");

        let response = router
            .clone()
            .oneshot(request(
                "DELETE",
                &format!("/docs/k?uploadId={upload_id}"),
                true,
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .clone()
            .oneshot(request(
                "POST",
                &format!("/docs/k?uploadId={upload_id}"),
                true,
                "<CompleteMultipartUpload><Part><PartNumber>1</PartNumber></Part></CompleteMultipartUpload>",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("<Code>NoSuchUpload</Code>"));
    }

    #[tokio::test]
    async fn staging_namespace_never_lists() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();
        router
            .clone()
            .oneshot(request("POST", "/docs/wip?uploads", true, Body::empty()))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(request("GET", "/", true, Body::empty()))
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(!body.contains(".staging"));

        let response = router
            .clone()
            .oneshot(request("GET", "/docs", true, Body::empty()))
            .await
            .unwrap();
        let body = body_string(response).await;
        assert!(!body.contains("<Key>"));
    }

    #[tokio::test]
    async fn unmatched_methods_are_405() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();

        // POST on a bucket and POST on an object without multipart markers.
        for uri in ["/docs", "/docs/k"] {
            let response = router
                .clone()
                .oneshot(request("POST", uri, true, Body::empty()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "POST {uri}");
            assert!(
                body_string(response)
                    .await
                    .contains("<Code>MethodNotAllowed</Code>")
            );
        }
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected_at_the_surface() {
        let (_dir, router) = test_router().await;
        router
            .clone()
            .oneshot(request("PUT", "/docs", true, Body::empty()))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(request("PUT", "/docs/%2e%2e/escape", true, "x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
