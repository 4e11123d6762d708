//! faas-inspector Library
//!
//! Per-invocation telemetry for serverless function handlers. An
//! [`Inspector`] collects host and runtime facts at function entry (CPU
//! identity and tick counters, memory and page faults, container identity,
//! hosting platform, kernel version), recomputes the counters at exit, and
//! hands back one flat [`AttributeRecord`] for the handler to return.
//!
//! # Features
//!
//! - **Snapshot-once categories**: re-inspecting a category is rejected and reported
//! - **Signed deltas**: exit-minus-entry values for every CPU and page fault counter
//! - **Container reuse detection**: a persisted id tells cold starts from warm ones
//! - **Platform detection**: AWS Lambda, Google Cloud Functions, IBM Cloud Functions, Azure Functions
//! - **Memory recommendation**: sizes AWS Lambda memory from the CPU time an invocation used
//! - **Never fails the handler**: every error becomes an attribute on the record
//!
//! # Usage
//!
//! ```rust,no_run
//! use faas_inspector::{Inspector, Response};
//!
//! let mut inspector = Inspector::new();
//! inspector.inspect_all();
//!
//! // ... function body ...
//! let response = Response::new("Hello Fred!");
//!
//! inspector.inspect_all_deltas();
//! let record = inspector.finish_with(&response);
//!
//! for (key, value) in record.iter() {
//!     println!("{}: {}", key, value);
//! }
//! ```

pub mod attributes;
pub mod config;
pub mod container;
pub mod error;
pub mod inspector;
pub mod platform;
pub mod recommend;
pub mod response;
pub mod system;

// Re-export main types for convenience
pub use attributes::{AttributeRecord, AttributeValue};
pub use config::{load_config, validate_config, InspectorConfig};
pub use container::ContainerIdentity;
pub use error::{ConfigError, IdentityError, IntrospectionError, RecommendError, SourceError};
pub use inspector::{Category, InspectionState, Inspector};
pub use platform::{Environment, Platform, PlatformIdentity};
pub use recommend::Recommendation;
pub use response::{ReadableFields, Response, Serialized};
pub use system::HostSources;
