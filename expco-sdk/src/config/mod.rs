//! Configuration types for the experiment coordinator.
//!
//! These types represent the validated runtime configuration and are shared
//! across crates. The actual config loading/parsing is handled by the CLI
//! crate.

mod credentials;
mod s3i;
mod topics;

pub use credentials::Credentials;
pub use s3i::S3iConfig;
pub use topics::EventTopics;
