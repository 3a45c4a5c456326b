//! Typed client for the Apache Superset REST API
//!
//! # Module Structure
//!
//! - [`api`] - Transport: server location, login, HTTP calls
//! - [`resource`] - Entities and collections over the REST endpoints
//! - [`error`] - Typed errors and HTTP failure translation
//! - [`config`] - Persistent CLI configuration

pub mod api;
pub mod config;
pub mod error;
pub mod resource;

pub use api::client::SupersetClient;
pub use error::{Error, Result};
pub use resource::{
    Chart, Collection, Columns, Dashboard, Database, Dataset, ExportFormat, Field, FieldKind,
    Filter, JsonDocument, JsonObject, Object, Query,
};
