use std::path::PathBuf;

use chrono::{DateTime, Utc};
use kura_common::error::{KuraError, Result};
use tokio::fs;
use tracing::{debug, warn};

use crate::types::{RetentionPolicy, SweepReport, SweptFile};

/// Deletes aged files from the buckets named in the retention policy.
///
/// Each run is a fresh, complete scan; the sweeper holds no state and runs
/// in its own invocation, concurrently with live uploads and reads. Only
/// files are deletion targets, directories are left in place.
#[derive(Debug, Clone)]
pub struct Sweeper {
    root: PathBuf,
    policy: RetentionPolicy,
}

impl Sweeper {
    pub fn new(root: PathBuf, policy: RetentionPolicy) -> Self {
        Self { root, policy }
    }

    pub async fn run(&self) -> Result<SweepReport> {
        self.run_at(Utc::now()).await
    }

    async fn run_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for (bucket, hours) in &self.policy {
            if bucket.is_empty() || bucket.starts_with('.') {
                warn!(bucket = %bucket, "refusing to sweep hidden or empty bucket name");
                continue;
            }

            let bucket_dir = self.root.join(bucket);
            match fs::metadata(&bucket_dir).await {
                Ok(metadata) if metadata.is_dir() => {}
                // A configured bucket that was never created is not an error.
                _ => continue,
            }

            let retention_secs = u64::from(*hours) * 3600;
            self.sweep_bucket(bucket_dir, retention_secs, now, &mut report)
                .await?;
        }

        Ok(report)
    }

    async fn sweep_bucket(
        &self,
        bucket_dir: PathBuf,
        retention_secs: u64,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<()> {
        let mut dirs = vec![bucket_dir];

        while let Some(dir) = dirs.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(KuraError::Io(err)),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => return Err(KuraError::Io(err)),
                };

                if metadata.is_dir() {
                    dirs.push(path);
                    continue;
                }

                report.scanned += 1;

                let modified = match metadata.modified() {
                    Ok(modified) => DateTime::<Utc>::from(modified),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "no modification time, skipping");
                        continue;
                    }
                };

                let age_secs = u64::try_from((now - modified).num_seconds()).unwrap_or(0);
                if age_secs <= retention_secs {
                    continue;
                }

                match fs::remove_file(&path).await {
                    Ok(()) => {
                        debug!(path = %path.display(), age_secs, "deleted expired file");
                        report.deleted += 1;
                        report.removed.push(SweptFile { path, age_secs });
                    }
                    // Vanished between observation and deletion: someone else
                    // already did the work.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                        report.deleted += 1;
                        report.removed.push(SweptFile { path, age_secs });
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to delete expired file");
                    }
                }
            }
        }

        Ok(())
    }
}
