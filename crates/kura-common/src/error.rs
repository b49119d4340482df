use thiserror::Error;

#[derive(Debug, Error)]
pub enum KuraError {
    #[error("the specified bucket does not exist: {0}")]
    BucketNotFound(String),
    #[error("the specified key does not exist: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },
    #[error("the specified upload does not exist: {0}")]
    UploadNotFound(String),
    #[error("invalid bucket name: {0}")]
    InvalidBucketName(String),
    #[error("invalid object key: {0}")]
    InvalidObjectKey(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("the XML you provided was not well-formed: {0}")]
    MalformedXml(String),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("requested range {start}-{end} cannot be satisfied for size {size}")]
    RangeNotSatisfiable { start: u64, end: u64, size: u64 },
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("internal error: {0}")]
    InternalError(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl KuraError {
    pub fn s3_error_code(&self) -> &'static str {
        match self {
            Self::BucketNotFound(_) => "NoSuchBucket",
            Self::ObjectNotFound { .. } => "NoSuchKey",
            Self::UploadNotFound(_) => "NoSuchUpload",
            Self::InvalidBucketName(_) => "InvalidBucketName",
            Self::InvalidObjectKey(_) => "InvalidObjectName",
            Self::AccessDenied(_) => "AccessDenied",
            Self::MalformedXml(_) => "MalformedXML",
            Self::MalformedRequest(_) => "MalformedRequest",
            Self::RangeNotSatisfiable { .. } => "InvalidRange",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::InternalError(_) | Self::Io(_) => "InternalError",
        }
    }

    /// Resource identifier rendered into the `<Resource>` field of error
    /// responses.
    pub fn resource(&self) -> String {
        match self {
            Self::BucketNotFound(bucket) | Self::InvalidBucketName(bucket) => {
                format!("/{bucket}")
            }
            Self::ObjectNotFound { bucket, key } => format!("/{bucket}/{key}"),
            Self::UploadNotFound(upload_id) => upload_id.clone(),
            Self::InvalidObjectKey(key) => key.clone(),
            Self::AccessDenied(resource) => resource.clone(),
            _ => String::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KuraError>;
