pub mod sweeper;
pub mod types;

pub use sweeper::Sweeper;
pub use types::{RetentionPolicy, SweepReport, SweptFile};
