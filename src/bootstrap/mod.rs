//! Bootstrap layer: modules that run before the configuration actor starts.
//!
//! - **credential**: secret arguments, optionally read from stdin.
//! - **device_id**: certificate-derived node identifier.
//! - **identity**: certificate and key load-or-generate.
//! - **logger**: tracing-subscriber initialisation.

pub mod credential;
pub mod device_id;
pub mod identity;
pub mod logger;
