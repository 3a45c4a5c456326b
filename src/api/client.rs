//! Superset Client
//!
//! Main client for interacting with the Superset REST API, combining the
//! server location, authentication and HTTP functionality.

use serde_json::{json, Value};
use url::Url;

use super::http::{join_urls, ApiResponse, HttpClient};
use crate::error::{raise_for_status, Error, Result};

/// Path of the REST API below the server root
const API_PREFIX: &str = "api/v1";

/// Main Superset client
///
/// Cheap to clone; every [`Collection`](crate::Collection) holds its own copy.
#[derive(Clone)]
pub struct SupersetClient {
    pub http: HttpClient,
    host: String,
    base_url: String,
}

impl SupersetClient {
    /// Create a client for the Superset server at `host`
    pub fn new(host: &str) -> Result<Self> {
        let parsed =
            Url::parse(host).map_err(|e| Error::Config(format!("invalid Superset URL {host:?}: {e}")))?;
        let host = parsed.as_str().trim_end_matches('/').to_string();
        let base_url = join_urls(&[&host, API_PREFIX]);

        Ok(Self {
            http: HttpClient::new()?,
            host,
            base_url,
        })
    }

    /// Use a pre-issued access token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.http.set_token(token);
        self
    }

    /// Server root, without trailing slash
    pub fn host(&self) -> &str {
        &self.host
    }

    /// REST API root, e.g. `http://localhost:8088/api/v1`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn join_urls(&self, parts: &[&str]) -> String {
        join_urls(parts)
    }

    /// Log in with database credentials and keep the returned access token
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let url = join_urls(&[&self.base_url, "security/login"]);
        let body = json!({
            "username": username,
            "password": password,
            "provider": "db",
            "refresh": true,
        });

        let response = self.http.post(&url, &body).await?;
        raise_for_status(&response)?;

        let payload: Value = response.json()?;
        let token = payload
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or(Error::MissingEnvelope {
                key: "access_token",
                url,
            })?;
        self.http.set_token(token);

        tracing::info!("Logged in to {} as {}", self.host, username);
        Ok(())
    }

    /// Make a GET request to the Superset API
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        self.http.get(url, query).await
    }

    /// Make a POST request to the Superset API
    pub async fn post(&self, url: &str, body: &Value) -> Result<ApiResponse> {
        self.http.post(url, body).await
    }

    /// Make a PUT request to the Superset API
    pub async fn put(&self, url: &str, body: &Value) -> Result<ApiResponse> {
        self.http.put(url, body).await
    }

    /// Make a DELETE request to the Superset API
    pub async fn delete(&self, url: &str) -> Result<ApiResponse> {
        self.http.delete(url).await
    }
}
