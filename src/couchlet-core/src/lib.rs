//! Couchlet Core Library
//!
//! Network-free building blocks shared by the Couchlet client:
//! - Status code classification
//! - Document id and query-string encoding
//! - Connection descriptor and client configuration
//! - Document and response models

pub mod config;
pub mod encoding;
pub mod models;
pub mod status;

// Re-export commonly used types
pub use config::{ClientConfig, ConnectionDescriptor, Credentials, DescriptorError, Scheme};
pub use encoding::{encode_component, encode_id, query_string};
pub use models::*;
pub use status::describe_status;
