pub mod error;
pub mod types;

pub use error::{KuraError, Result};
pub use types::{BucketInfo, ObjectInfo};
