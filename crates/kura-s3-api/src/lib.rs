pub mod error;
pub mod handlers;
pub mod maintenance;
pub mod router;

mod range;

pub use maintenance::maintenance_router;
pub use router::{ApiState, s3_router};
