use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kura_common::error::{KuraError, Result};
use kura_common::types::{BucketInfo, ObjectInfo};
use md5::{Digest, Md5};
use ring::rand::{SecureRandom, SystemRandom};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::hash::{append_hashed, copy_hashed, md5_file};
use crate::mime::content_type_for;
use crate::traits::{ByteSpan, ObjectReader, ObjectStore};

/// Hidden namespace for in-progress multipart uploads. Never surfaced by
/// bucket or object listings.
const STAGING_DIR_NAME: &str = ".staging";
/// Scratch area for in-flight writes; finished files are renamed into place
/// so readers never observe a partial object.
const SCRATCH_DIR_NAME: &str = ".tmp";
const PART_FILE_SUFFIX: &str = ".part";
const KEY_SIDECAR_NAME: &str = "object-key";

/// Filesystem-backed object store. The directory tree is the single source
/// of truth: `root/{bucket}/{key}` for visible objects,
/// `root/.staging/{bucket}/{uploadId}` for uploads in flight.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(root.join(STAGING_DIR_NAME).join(SCRATCH_DIR_NAME)).await?;
        Ok(Self { root })
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_path(bucket).join(key)
    }

    fn upload_path(&self, bucket: &str, upload_id: &str) -> PathBuf {
        self.root.join(STAGING_DIR_NAME).join(bucket).join(upload_id)
    }

    fn scratch_path(&self) -> PathBuf {
        self.root
            .join(STAGING_DIR_NAME)
            .join(SCRATCH_DIR_NAME)
            .join(Uuid::new_v4().to_string())
    }

    async fn ensure_bucket_exists(&self, bucket: &str) -> Result<()> {
        if !is_existing_directory(&self.bucket_path(bucket)).await? {
            return Err(KuraError::BucketNotFound(bucket.to_string()));
        }
        Ok(())
    }

    async fn ensure_upload_exists(&self, bucket: &str, upload_id: &str) -> Result<PathBuf> {
        let upload_dir = self.upload_path(bucket, upload_id);
        if !is_existing_directory(&upload_dir).await? {
            return Err(KuraError::UploadNotFound(upload_id.to_string()));
        }
        Ok(upload_dir)
    }

    /// Streams `body` into a scratch file, hashing as it goes, then renames
    /// the result over `dest`. Concurrent writers race last-writer-wins at
    /// the rename; readers always observe a complete object.
    async fn write_via_scratch(&self, dest: &Path, mut body: ObjectReader) -> Result<(u64, String)> {
        let scratch = self.scratch_path();
        let mut file = fs::File::create(&scratch).await.map_err(|err| {
            KuraError::InternalError(format!("failed to open scratch file: {err}"))
        })?;

        let copied = copy_hashed(&mut body, &mut file).await;
        let result = match copied {
            Ok(ok) => {
                file.sync_all().await.map_err(KuraError::Io).map(|()| ok)
            }
            Err(err) => Err(KuraError::InternalError(format!(
                "failed to write object data: {err}"
            ))),
        };
        drop(file);

        match result {
            Ok((size, etag)) => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::rename(&scratch, dest).await?;
                Ok((size, etag))
            }
            Err(err) => {
                let _ = fs::remove_file(&scratch).await;
                Err(err)
            }
        }
    }

    async fn object_info(&self, bucket: &str, key: &str, path: &Path) -> Result<ObjectInfo> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|err| map_object_io_error(bucket, key, err))?;
        if !metadata.is_file() {
            return Err(object_not_found(bucket, key));
        }

        let etag = md5_file(path)
            .await
            .map_err(|err| map_object_io_error(bucket, key, err))?;
        let size = i64::try_from(metadata.len())
            .map_err(|_| KuraError::InternalError(format!("object too large: {bucket}/{key}")))?;

        Ok(ObjectInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            etag,
            content_type: content_type_for(key),
            last_modified: filetime_to_utc(metadata.modified().ok()).unwrap_or_else(Utc::now),
        })
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn make_bucket(&self, bucket: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        // Recreating an existing bucket is a success, matching retrying
        // clients' expectations.
        fs::create_dir_all(self.bucket_path(bucket)).await?;
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        if validate_bucket_name(bucket).is_err() {
            return Ok(false);
        }
        is_existing_directory(&self.bucket_path(bucket)).await
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut buckets = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }

            buckets.push(BucketInfo {
                name,
                created: filetime_to_utc(metadata.modified().ok()).unwrap_or_else(Utc::now),
            });
        }

        Ok(buckets)
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>> {
        validate_bucket_name(bucket)?;
        self.ensure_bucket_exists(bucket).await?;

        let bucket_path = self.bucket_path(bucket);
        let mut dirs = vec![bucket_path.clone()];
        let mut objects = Vec::new();

        while let Some(dir) = dirs.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    dirs.push(path);
                    continue;
                }

                let rel = match path.strip_prefix(&bucket_path) {
                    Ok(rel) => rel,
                    Err(_) => continue,
                };
                let key = rel.to_string_lossy().replace('\\', "/");

                // A file may vanish between enumeration and hashing when a
                // sweep or delete runs concurrently.
                let etag = match md5_file(&path).await {
                    Ok(etag) => etag,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => return Err(KuraError::Io(err)),
                };

                objects.push(ObjectInfo {
                    bucket: bucket.to_string(),
                    key,
                    size: i64::try_from(metadata.len()).unwrap_or(i64::MAX),
                    etag,
                    content_type: content_type_for(&path.to_string_lossy()),
                    last_modified: filetime_to_utc(metadata.modified().ok())
                        .unwrap_or_else(Utc::now),
                });
            }
        }

        Ok(objects)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: ObjectReader) -> Result<ObjectInfo> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;
        self.ensure_bucket_exists(bucket).await?;

        let dest = self.object_path(bucket, key);
        let (size, etag) = self.write_via_scratch(&dest, body).await?;
        debug!(bucket = %bucket, key = %key, size, "stored object");

        Ok(ObjectInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: i64::try_from(size)
                .map_err(|_| KuraError::InternalError(format!("object too large: {bucket}/{key}")))?,
            etag,
            content_type: content_type_for(key),
            last_modified: Utc::now(),
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;
        self.ensure_bucket_exists(bucket).await?;

        let path = self.object_path(bucket, key);
        self.object_info(bucket, key, &path).await
    }

    async fn open_object(
        &self,
        bucket: &str,
        key: &str,
        span: Option<ByteSpan>,
    ) -> Result<ObjectReader> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;
        self.ensure_bucket_exists(bucket).await?;

        let path = self.object_path(bucket, key);
        let mut file = fs::File::open(&path)
            .await
            .map_err(|err| map_object_io_error(bucket, key, err))?;

        match span {
            Some(span) => {
                file.seek(SeekFrom::Start(span.start))
                    .await
                    .map_err(KuraError::Io)?;
                Ok(Box::new(file.take(span.byte_count())))
            }
            None => Ok(Box::new(file)),
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;
        self.ensure_bucket_exists(bucket).await?;

        match fs::remove_file(self.object_path(bucket, key)).await {
            Ok(()) => Ok(()),
            // Delete is idempotent: an absent key is already the desired state.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(KuraError::Io(err)),
        }
    }

    async fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        validate_bucket_name(bucket)?;
        validate_object_key(key)?;
        self.ensure_bucket_exists(bucket).await?;

        let upload_id = generate_upload_id()?;
        let upload_dir = self.upload_path(bucket, &upload_id);
        fs::create_dir_all(&upload_dir).await?;
        // The target key is persisted with the upload; Complete trusts this
        // copy rather than whatever key the completing request carries.
        fs::write(upload_dir.join(KEY_SIDECAR_NAME), key.as_bytes()).await?;

        debug!(bucket = %bucket, key = %key, upload_id = %upload_id, "initiated multipart upload");
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        upload_id: &str,
        part_number: u32,
        mut body: ObjectReader,
    ) -> Result<String> {
        validate_bucket_name(bucket)?;
        validate_upload_id(upload_id)?;
        if part_number == 0 {
            return Err(KuraError::MalformedRequest(
                "partNumber must be a positive integer".to_string(),
            ));
        }

        let upload_dir = self.ensure_upload_exists(bucket, upload_id).await?;
        let part_path = upload_dir.join(format!("{part_number}{PART_FILE_SUFFIX}"));

        let scratch = self.scratch_path();
        let mut file = fs::File::create(&scratch).await.map_err(|err| {
            KuraError::InternalError(format!("failed to open scratch file: {err}"))
        })?;
        let copied = copy_hashed(&mut body, &mut file).await;
        drop(file);

        let (size, etag) = match copied {
            Ok(ok) => ok,
            Err(err) => {
                let _ = fs::remove_file(&scratch).await;
                return Err(KuraError::InternalError(format!(
                    "failed to write part data: {err}"
                )));
            }
        };

        match fs::rename(&scratch, &part_path).await {
            Ok(()) => {}
            // The upload directory can vanish when an abort races the write.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let _ = fs::remove_file(&scratch).await;
                return Err(KuraError::UploadNotFound(upload_id.to_string()));
            }
            Err(err) => {
                let _ = fs::remove_file(&scratch).await;
                return Err(KuraError::Io(err));
            }
        }

        debug!(bucket = %bucket, upload_id = %upload_id, part_number, size, "stored part");
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        upload_id: &str,
        part_numbers: &[u32],
    ) -> Result<ObjectInfo> {
        validate_bucket_name(bucket)?;
        validate_upload_id(upload_id)?;
        let upload_dir = self.ensure_upload_exists(bucket, upload_id).await?;

        let key_bytes = fs::read(upload_dir.join(KEY_SIDECAR_NAME)).await.map_err(|err| {
            KuraError::InternalError(format!("upload {upload_id} has no recorded key: {err}"))
        })?;
        let key = String::from_utf8(key_bytes).map_err(|_| {
            KuraError::InternalError(format!("upload {upload_id} has a non-UTF-8 recorded key"))
        })?;
        validate_object_key(&key)?;

        let scratch = self.scratch_path();
        let mut out = fs::File::create(&scratch).await.map_err(|err| {
            KuraError::InternalError(format!("failed to open scratch file: {err}"))
        })?;

        let mut hasher = Md5::new();
        let mut size = 0_u64;
        for part_number in part_numbers {
            let part_path = upload_dir.join(format!("{part_number}{PART_FILE_SUFFIX}"));
            let mut part = match fs::File::open(&part_path).await {
                Ok(part) => part,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    // Lenient by contract: a declared part that was never
                    // uploaded is skipped and assembly continues.
                    warn!(bucket = %bucket, upload_id = %upload_id, part_number, "declared part is missing, skipping");
                    continue;
                }
                Err(err) => {
                    let _ = fs::remove_file(&scratch).await;
                    return Err(KuraError::Io(err));
                }
            };

            match append_hashed(&mut part, &mut out, &mut hasher).await {
                Ok(copied) => size += copied,
                Err(err) => {
                    let _ = fs::remove_file(&scratch).await;
                    return Err(KuraError::InternalError(format!(
                        "failed to assemble object: {err}"
                    )));
                }
            }
        }

        if let Err(err) = out.sync_all().await {
            let _ = fs::remove_file(&scratch).await;
            return Err(KuraError::Io(err));
        }
        drop(out);

        let dest = self.object_path(bucket, &key);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&scratch, &dest).await?;

        if let Err(err) = fs::remove_dir_all(&upload_dir).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(upload_id = %upload_id, error = %err, "failed to remove staging directory");
            }
        }

        let etag = hex::encode(hasher.finalize());
        debug!(bucket = %bucket, key = %key, upload_id = %upload_id, size, "completed multipart upload");

        Ok(ObjectInfo {
            bucket: bucket.to_string(),
            key: key.clone(),
            size: i64::try_from(size)
                .map_err(|_| KuraError::InternalError(format!("object too large: {bucket}/{key}")))?,
            etag,
            content_type: content_type_for(&key),
            last_modified: Utc::now(),
        })
    }

    async fn abort_multipart_upload(&self, bucket: &str, upload_id: &str) -> Result<()> {
        validate_bucket_name(bucket)?;
        validate_upload_id(upload_id)?;

        match fs::remove_dir_all(self.upload_path(bucket, upload_id)).await {
            Ok(()) => Ok(()),
            // Aborting an unknown or already-aborted upload is a success.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(KuraError::Io(err)),
        }
    }
}

/// 128 bits of system randomness, hex-encoded. Upload ids gate access to
/// staging state, so they must be unguessable.
fn generate_upload_id() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0_u8; 16];
    rng.fill(&mut bytes)
        .map_err(|_| KuraError::InternalError("system randomness unavailable".to_string()))?;
    Ok(hex::encode(bytes))
}

fn validate_bucket_name(bucket: &str) -> Result<()> {
    if bucket.is_empty()
        || bucket.starts_with('.')
        || bucket.contains('/')
        || bucket.contains('\\')
    {
        return Err(KuraError::InvalidBucketName(bucket.to_string()));
    }
    Ok(())
}

/// Keys become filesystem paths, so every component must stay below the
/// bucket directory.
fn validate_object_key(key: &str) -> Result<()> {
    if key.is_empty() || key.contains('\\') {
        return Err(KuraError::InvalidObjectKey(key.to_string()));
    }

    let key_path = Path::new(key);
    if key_path.is_absolute() {
        return Err(KuraError::InvalidObjectKey(key.to_string()));
    }

    for component in key_path.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(KuraError::InvalidObjectKey(key.to_string()));
            }
        }
    }

    Ok(())
}

/// Upload ids are issued as lowercase hex; anything else never names a live
/// upload and must not reach the filesystem as a path segment.
fn validate_upload_id(upload_id: &str) -> Result<()> {
    if upload_id.is_empty() || !upload_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(KuraError::UploadNotFound(upload_id.to_string()));
    }
    Ok(())
}

fn object_not_found(bucket: &str, key: &str) -> KuraError {
    KuraError::ObjectNotFound {
        bucket: bucket.to_string(),
        key: key.to_string(),
    }
}

fn map_object_io_error(bucket: &str, key: &str, err: std::io::Error) -> KuraError {
    if err.kind() == std::io::ErrorKind::NotFound {
        object_not_found(bucket, key)
    } else {
        KuraError::Io(err)
    }
}

async fn is_existing_directory(path: &Path) -> Result<bool> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_dir()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(KuraError::Io(err)),
    }
}

fn filetime_to_utc(filetime: Option<std::time::SystemTime>) -> Option<DateTime<Utc>> {
    filetime.map(DateTime::<Utc>::from)
}
