//! HTTP utilities for Superset REST API calls

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// User agent sent with every request
const USER_AGENT: &str = concat!("superset-client/", env!("CARGO_PKG_VERSION"));

/// A fully buffered API response
///
/// The body is read eagerly so the same response can be inspected several
/// times: once for the status check, again for the error message, and once
/// more for the payload.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub method: Method,
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8 (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body decoded as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Trimmed `content-type` header, empty when absent
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or("")
    }
}

/// Join URL fragments with single slashes
///
/// Each fragment is stripped of leading and trailing slashes; a trailing
/// slash on the last fragment is preserved, since Superset distinguishes
/// `dashboard/` from `dashboard`.
pub fn join_urls(parts: &[&str]) -> String {
    let mut joined = parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if parts.last().is_some_and(|p| p.ends_with('/')) {
        joined.push('/');
    }
    joined
}

/// HTTP client wrapper for Superset API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    token: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            token: None,
        })
    }

    /// Attach a bearer token to every following request
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Make a GET request with query parameters
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<ApiResponse> {
        self.send(self.request(Method::GET, url).query(query)).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<ApiResponse> {
        self.send(self.request(Method::POST, url).json(body)).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<ApiResponse> {
        self.send(self.request(Method::PUT, url).json(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str) -> Result<ApiResponse> {
        self.send(self.request(Method::DELETE, url)).await
    }

    /// Make a multipart POST request, asking for a JSON answer
    pub async fn post_multipart(&self, url: &str, form: Form) -> Result<ApiResponse> {
        let request = self
            .request(Method::POST, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form);
        self.send(request).await
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<ApiResponse> {
        let request = request.build()?;
        let method = request.method().clone();
        let url = request.url().to_string();
        tracing::debug!("{} {}", method, url);

        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        tracing::debug!("{} {} -> {}", method, url, status);

        Ok(ApiResponse {
            method,
            url,
            status,
            headers,
            body,
        })
    }
}
