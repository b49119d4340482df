use std::collections::HashMap;
use std::path::PathBuf;

/// Bucket name to retention window in hours. Buckets absent from the map
/// are permanent and never swept.
pub type RetentionPolicy = HashMap<String, u32>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweptFile {
    pub path: PathBuf,
    pub age_secs: u64,
}

/// Outcome of one complete sweep. No state carries over between runs.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub scanned: u64,
    pub deleted: u64,
    pub removed: Vec<SweptFile>,
}
