//! Collection contract
//!
//! A [`Collection`] owns the endpoint namespace of one resource type and
//! performs every collection-level operation: listing with filters and
//! pagination, single-object fetch, creation, deletion, bulk export, bulk
//! import and connection testing.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;

use super::object::Object;
use crate::api::client::SupersetClient;
use crate::api::http::ApiResponse;
use crate::error::{raise_for_status, Error, HttpFailure, Result};

/// Keys requested from the `_info` endpoint
const INFO_KEYS: &[&str] = &["add_columns", "edit_columns"];

/// Fields sent to `test_connection`, when the entity has them
const CONNECTION_COLUMNS: &[&str] = &["database_name", "sqlalchemy_uri"];

/// One equality filter of a list query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub col: String,
    pub opr: String,
    pub value: Value,
}

impl Filter {
    pub fn equals(col: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            col: col.into(),
            opr: "eq".to_string(),
            value: value.into(),
        }
    }
}

/// A single-page list query, sent JSON-encoded as the `q` parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub page_size: u32,
    pub page: u32,
    pub filters: Vec<Filter>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            page_size: 100,
            page: 0,
            filters: Vec::new(),
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Add an equality filter on `col`
    pub fn filter(mut self, col: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::equals(col, value));
        self
    }
}

/// Representation chosen by the server for a bulk export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// `application/text`: a YAML document
    Yaml,
    /// `application/zip`: an archive with one file per exported resource
    Zip,
    /// `application/json`
    Json,
}

impl ExportFormat {
    /// Classify a response content-type; anything unrecognised is an error
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let content_type = content_type.trim();
        if content_type.starts_with("application/text") {
            Ok(Self::Yaml)
        } else if content_type.starts_with("application/zip") {
            Ok(Self::Zip)
        } else if content_type.starts_with("application/json") {
            Ok(Self::Json)
        } else {
            Err(Error::UnsupportedContentType {
                content_type: content_type.to_string(),
            })
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Zip => "zip",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Infos {
    add_columns: Vec<ColumnInfo>,
    edit_columns: Vec<ColumnInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ColumnInfo {
    name: Option<String>,
}

/// Writable column names, as declared by the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    pub add: Vec<String>,
    pub edit: Vec<String>,
}

impl From<Infos> for Columns {
    fn from(infos: Infos) -> Self {
        let names = |cols: Vec<ColumnInfo>| -> Vec<String> {
            cols.into_iter().filter_map(|c| c.name).collect()
        };
        Self {
            add: names(infos.add_columns),
            edit: names(infos.edit_columns),
        }
    }
}

/// Accessor for one resource type's endpoints
pub struct Collection<T: Object> {
    client: SupersetClient,
    columns: OnceCell<Columns>,
    _object: PhantomData<fn() -> T>,
}

impl<T: Object> Collection<T> {
    pub fn new(client: SupersetClient) -> Self {
        Self {
            client,
            columns: OnceCell::new(),
            _object: PhantomData,
        }
    }

    pub fn client(&self) -> &SupersetClient {
        &self.client
    }

    /// Base url for these objects
    pub fn base_url(&self) -> String {
        self.client.join_urls(&[self.client.base_url(), T::ENDPOINT])
    }

    /// Url of a single object
    pub fn object_url(&self, id: i64) -> String {
        self.client.join_urls(&[&self.base_url(), &id.to_string()])
    }

    pub fn info_url(&self) -> String {
        self.client.join_urls(&[&self.base_url(), "_info"])
    }

    pub fn export_url(&self) -> String {
        self.client.join_urls(&[&self.base_url(), "export/"])
    }

    pub fn import_url(&self) -> String {
        self.client.join_urls(&[&self.base_url(), "import/"])
    }

    pub fn test_connection_url(&self) -> String {
        self.client.join_urls(&[&self.base_url(), "test_connection"])
    }

    /// Writable columns, fetched on first use and cached for the life of
    /// the collection
    pub async fn columns(&self) -> Result<&Columns> {
        self.columns.get_or_try_init(|| self.load_columns()).await
    }

    /// Fields accepted on create
    pub async fn add_columns(&self) -> Result<&[String]> {
        Ok(&self.columns().await?.add)
    }

    /// Fields accepted on update
    pub async fn edit_columns(&self) -> Result<&[String]> {
        Ok(&self.columns().await?.edit)
    }

    async fn load_columns(&self) -> Result<Columns> {
        let q = serde_json::to_string(&serde_json::json!({ "keys": INFO_KEYS }))?;
        let response = self.client.get(&self.info_url(), &[("q", q)]).await?;

        if response.status.as_u16() != 200 {
            tracing::error!("Unable to build object factory for {}", T::ENDPOINT);
            raise_for_status(&response)?;
            return Err(Error::Http(HttpFailure::from_response(&response)));
        }

        let infos: Infos = response.json()?;
        let columns = Columns::from(infos);
        tracing::debug!(
            "{}: {} add columns, {} edit columns",
            T::NAME,
            columns.add.len(),
            columns.edit.len()
        );
        Ok(columns)
    }

    /// Get an object by id
    pub async fn get(&self, id: i64) -> Result<T> {
        let url = self.object_url(id);
        let response = self.client.get(&url, &[]).await?;
        raise_for_status(&response)?;

        let body: Value = response.json()?;
        let Some(Value::Object(mut result)) = body.get("result").cloned() else {
            return Err(Error::MissingEnvelope { key: "result", url });
        };
        // single-object payloads may omit the id
        result.insert("id".to_string(), Value::from(id));

        T::from_json(&Value::Object(result))
    }

    /// Find objects matching `query`; a single page only
    pub async fn find(&self, query: &Query) -> Result<Vec<T>> {
        let url = self.base_url();
        let q = serde_json::to_string(query)?;
        let response = self.client.get(&url, &[("q", q)]).await?;
        raise_for_status(&response)?;

        let body: Value = response.json()?;
        let Some(Value::Array(rows)) = body.get("result") else {
            return Err(Error::MissingEnvelope { key: "result", url });
        };

        rows.iter().map(T::from_json).collect()
    }

    /// First object matching `query`, or [`Error::NotFound`]
    pub async fn find_one(&self, query: &Query) -> Result<T> {
        self.find(query)
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NotFound { object: T::NAME })
    }

    /// Count objects
    pub async fn count(&self) -> Result<u64> {
        let url = self.base_url();
        let response = self.client.get(&url, &[]).await?;
        log_failure(&response);
        raise_for_status(&response)?;

        let body: Value = response.json()?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or(Error::MissingEnvelope { key: "count", url })
    }

    /// Create `obj` on the server, storing the assigned id in place
    pub async fn add(&self, obj: &mut T) -> Result<i64> {
        let columns = self.add_columns().await?;
        let body = Value::Object(obj.to_json(columns)?);

        let url = self.base_url();
        let response = self.client.post(&url, &body).await?;
        raise_for_status(&response)?;

        let ack: Value = response.json()?;
        let id = ack
            .get("id")
            .and_then(Value::as_i64)
            .ok_or(Error::MissingEnvelope { key: "id", url })?;
        obj.set_id(id);

        tracing::info!("Created {} {}", T::NAME, id);
        Ok(id)
    }

    /// Delete an object; `true` when the server acknowledged with `OK`
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let response = self.client.delete(&self.object_url(id)).await?;
        log_failure(&response);
        raise_for_status(&response)?;

        match response.json::<Value>() {
            Ok(ack) => Ok(is_ok_message(&ack)),
            Err(e) => {
                tracing::debug!("Delete of {} {} returned no JSON: {}", T::NAME, id, e);
                Ok(false)
            }
        }
    }

    /// Export objects into an importable file at `path`
    pub async fn export(&self, ids: &[i64], path: impl AsRef<Path>) -> Result<ExportFormat> {
        let id_list = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
        let response = self
            .client
            .get(&self.export_url(), &[("q", format!("[{id_list}]"))])
            .await?;
        log_failure(&response);
        raise_for_status(&response)?;

        let format = ExportFormat::from_content_type(response.content_type())?;
        let path = path.as_ref();
        match format {
            ExportFormat::Yaml => {
                let data: serde_yaml::Value = serde_yaml::from_slice(&response.body)?;
                let file = File::create(path).map_err(|e| Error::io(path, e))?;
                let mut writer = BufWriter::new(file);
                serde_yaml::to_writer(&mut writer, &data)?;
                writer.flush().map_err(|e| Error::io(path, e))?;
            }
            ExportFormat::Zip => {
                std::fs::write(path, &response.body).map_err(|e| Error::io(path, e))?;
            }
            ExportFormat::Json => {
                let data: Value = response.json()?;
                let file = File::create(path).map_err(|e| Error::io(path, e))?;
                let mut writer = BufWriter::new(file);
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
                data.serialize(&mut serializer)?;
                writer.flush().map_err(|e| Error::io(path, e))?;
            }
        }

        tracing::info!(
            "Exported {} {}(s) to {} as {}",
            ids.len(),
            T::NAME,
            path.display(),
            format.extension()
        );
        Ok(format)
    }

    /// Import a JSON or ZIP export
    ///
    /// `passwords` maps database names to their passwords; a database
    /// stored in the archive as `databases/MyDatabase.yaml` is given as
    /// `{"MyDatabase": "secret"}`.
    pub async fn import_file(
        &self,
        file_path: impl AsRef<Path>,
        overwrite: bool,
        passwords: &BTreeMap<String, String>,
    ) -> Result<Value> {
        let path = file_path.as_ref();
        let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = match path.extension() {
            Some(ext) => format!("application/{}", ext.to_string_lossy().to_lowercase()),
            None => "application/octet-stream".to_string(),
        };

        let passwords: BTreeMap<String, &String> = passwords
            .iter()
            .map(|(db, pwd)| (format!("databases/{db}.yaml"), pwd))
            .collect();

        let form = Form::new()
            .part("formData", Part::bytes(data).file_name(file_name).mime_str(&mime)?)
            .text("passwords", serde_json::to_string(&passwords)?)
            .text("overwrite", serde_json::to_string(&overwrite)?);

        let response = self.client.http.post_multipart(&self.import_url(), form).await?;
        log_failure(&response);
        raise_for_status(&response)?;

        tracing::info!("Imported {} into {}", path.display(), T::ENDPOINT);
        response.json()
    }

    /// Ask the server whether the connection described by `obj` works
    pub async fn test_connection(&self, obj: &T) -> Result<bool> {
        let body = Value::Object(obj.to_json(CONNECTION_COLUMNS)?);
        let response = self.client.post(&self.test_connection_url(), &body).await?;

        match response.json::<Value>() {
            Ok(ack) => {
                let ok = is_ok_message(&ack);
                if !ok {
                    tracing::error!("Connection test failed: {}", response.text());
                }
                Ok(ok)
            }
            Err(e) => {
                raise_for_status(&response)?;
                Err(e)
            }
        }
    }
}

fn is_ok_message(ack: &Value) -> bool {
    ack.get("message").and_then(Value::as_str) == Some("OK")
}

/// Log non-200/201 responses with their full body
fn log_failure(response: &ApiResponse) {
    if !matches!(response.status.as_u16(), 200 | 201) {
        tracing::error!("Unable to proceed, API return {}", response.status);
        tracing::error!("Full API response is {}", response.text());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_serializes_to_q_parameter() {
        let query = Query::new().filter("dashboard_title", "Sales").filter("published", true);
        let q: Value = serde_json::from_str(&serde_json::to_string(&query).unwrap()).unwrap();
        assert_eq!(
            q,
            json!({
                "page_size": 100,
                "page": 0,
                "filters": [
                    {"col": "dashboard_title", "opr": "eq", "value": "Sales"},
                    {"col": "published", "opr": "eq", "value": true}
                ]
            })
        );
    }

    #[test]
    fn query_paging_overrides_defaults() {
        let query = Query::new().page_size(25).page(3);
        assert_eq!(query.page_size, 25);
        assert_eq!(query.page, 3);
        assert!(query.filters.is_empty());
    }

    #[test]
    fn export_format_from_content_type() {
        assert_eq!(
            ExportFormat::from_content_type("application/text; charset=utf-8").unwrap(),
            ExportFormat::Yaml
        );
        assert_eq!(ExportFormat::from_content_type(" application/zip").unwrap(), ExportFormat::Zip);
        assert_eq!(ExportFormat::from_content_type("application/json").unwrap(), ExportFormat::Json);
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        let err = ExportFormat::from_content_type("text/html").unwrap_err();
        assert!(matches!(err, Error::UnsupportedContentType { ref content_type } if content_type == "text/html"));
        assert!(ExportFormat::from_content_type("").is_err());
    }

    #[test]
    fn infos_reduce_to_column_names() {
        let infos: Infos = serde_json::from_value(json!({
            "add_columns": [{"name": "dashboard_title", "type": "String"}, {"name": "slug"}],
            "edit_columns": [{"name": "css"}, {"label": "nameless"}]
        }))
        .unwrap();
        let columns = Columns::from(infos);
        assert_eq!(columns.add, vec!["dashboard_title", "slug"]);
        assert_eq!(columns.edit, vec!["css"]);
    }

    #[test]
    fn ok_message_detection() {
        assert!(is_ok_message(&json!({"message": "OK"})));
        assert!(!is_ok_message(&json!({"message": "Forbidden"})));
        assert!(!is_ok_message(&json!({})));
    }
}
