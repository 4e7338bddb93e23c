//! Core library for catalogctl, the per-tenant schema provisioning tool.
//!
//! Each tenant of the shared catalog database gets an isolated schema. This
//! crate resolves the tenant configuration into normalized records, composes
//! tenant-scoped connection strings from a base DSN, and drives the
//! sequential provisioning run against the database.
//!
//! # Architecture
//! - [`config`]: typed tenant-file parsing with validation at the boundary
//! - [`dsn`]: pure DSN composition (`options=-c search_path=…`)
//! - [`provision`]: sequential schema/seed application, one connection per
//!   tenant, fail-fast on the first error

pub mod config;
pub mod dsn;
pub mod error;
pub mod logging;
pub mod provision;

// Re-export commonly used types
pub use config::{CatalogConfig, TenantSpec};
pub use dsn::{compose_dsn, dsn_map};
pub use error::{CatalogError, Result, redact_database_url};
pub use logging::init_logging;
