pub mod guard;

pub use guard::{AccessKeyAuthorizer, Authorizer};
