//! Resource abstraction layer
//!
//! A generic object-relational layer over the Superset REST API: every
//! resource type is an [`Object`] reached through a [`Collection`].
//!
//! # Architecture
//!
//! - [`object`] - Entity contract: field declarations, wire (de)serialization,
//!   single-object operations
//! - [`collection`] - Collection contract: list, get, add, delete, export,
//!   import, connection testing
//! - [`definitions`] - The concrete resource types
//!
//! # Example
//!
//! ```ignore
//! use superset_client::{Object, Query, SupersetClient};
//!
//! async fn publish(client: &SupersetClient) -> superset_client::Result<()> {
//!     let dashboards = client.dashboards();
//!     let mut sales = dashboards.find_one(&Query::new().filter("dashboard_title", "Sales")).await?;
//!     sales.published = Some(true);
//!     sales.save(&dashboards).await
//! }
//! ```

pub mod collection;
pub mod definitions;
pub mod object;

pub use collection::{Collection, Columns, ExportFormat, Filter, Query};
pub use definitions::{Chart, Dashboard, Database, Dataset};
pub use object::{Field, FieldKind, JsonDocument, JsonObject, Object};
