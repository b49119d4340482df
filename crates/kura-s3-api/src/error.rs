use axum::response::{IntoResponse, Response};
use http::StatusCode;
use kura_common::error::KuraError;
use tracing::error;
use uuid::Uuid;

pub struct S3Error(pub KuraError);

impl IntoResponse for S3Error {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            KuraError::BucketNotFound(_)
            | KuraError::ObjectNotFound { .. }
            | KuraError::UploadNotFound(_) => StatusCode::NOT_FOUND,
            KuraError::AccessDenied(_) => StatusCode::FORBIDDEN,
            KuraError::MalformedXml(_)
            | KuraError::MalformedRequest(_)
            | KuraError::InvalidBucketName(_)
            | KuraError::InvalidObjectKey(_) => StatusCode::BAD_REQUEST,
            KuraError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            KuraError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            KuraError::InternalError(_) | KuraError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "request failed");
        }

        let error_code = self.0.s3_error_code();
        let message = self.0.to_string();
        let resource = self.0.resource();
        let request_id = Uuid::new_v4().simple();
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error><Code>{error_code}</Code>\
             <Message>{message}</Message><Resource>{resource}</Resource>\
             <RequestId>{request_id}</RequestId></Error>"
        );

        (status, [("Content-Type", "application/xml")], body).into_response()
    }
}

impl From<KuraError> for S3Error {
    fn from(err: KuraError) -> Self {
        S3Error(err)
    }
}
