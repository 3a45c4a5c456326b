//! Superset API interaction module
//!
//! # Module Structure
//!
//! - [`client`] - Main Superset client: server location and login
//! - [`http`] - HTTP utilities: buffered responses and URL joining
//!
//! # Example
//!
//! ```ignore
//! use superset_client::SupersetClient;
//!
//! async fn example() -> superset_client::Result<()> {
//!     let mut client = SupersetClient::new("http://localhost:8088")?;
//!     client.login("admin", "admin").await?;
//!     let response = client.get(&client.join_urls(&[client.base_url(), "dashboard/"]), &[]).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
