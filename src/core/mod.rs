//! Core infrastructure: shared foundation used across the whole crate.
//!
//! - **error**: application-wide error enum and stage labels.
//! - **locations**: base directory and the files resolved under it.
//! - **options**: resolved options for one `generate` run.

pub mod error;
pub mod locations;
pub mod options;
