//! Resource definitions
//!
//! Field declarations for the Superset resource types. Only fields the
//! client needs are modelled; anything else the server sends is dropped by
//! [`Object::from_json`].

use serde::{Deserialize, Serialize};

use super::collection::Collection;
use super::object::{Field, JsonDocument, Object};
use crate::api::client::SupersetClient;

macro_rules! impl_id {
    () => {
        fn id(&self) -> Option<i64> {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = Some(id);
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dashboard {
    pub id: Option<i64>,
    pub dashboard_title: String,
    pub published: Option<bool>,
    pub slug: Option<String>,
    pub css: Option<String>,
    pub certified_by: Option<String>,
    pub certification_details: Option<String>,
    pub position_json: JsonDocument,
    pub json_metadata: JsonDocument,
}

impl Object for Dashboard {
    const NAME: &'static str = "Dashboard";
    const ENDPOINT: &'static str = "dashboard/";
    const EXPORTABLE: bool = true;
    const FIELDS: &'static [Field] = &[
        Field::optional("id"),
        Field::required("dashboard_title"),
        Field::optional("published"),
        Field::optional("slug"),
        Field::optional("css"),
        Field::optional("certified_by"),
        Field::optional("certification_details"),
        Field::json("position_json"),
        Field::json("json_metadata"),
    ];

    impl_id!();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chart {
    pub id: Option<i64>,
    pub slice_name: String,
    pub description: Option<String>,
    pub viz_type: Option<String>,
    pub datasource_id: Option<i64>,
    pub datasource_type: Option<String>,
    pub cache_timeout: Option<i64>,
    pub params: JsonDocument,
}

impl Object for Chart {
    const NAME: &'static str = "Chart";
    const ENDPOINT: &'static str = "chart/";
    const EXPORTABLE: bool = true;
    const FIELDS: &'static [Field] = &[
        Field::optional("id"),
        Field::required("slice_name"),
        Field::optional("description"),
        Field::optional("viz_type"),
        Field::optional("datasource_id"),
        Field::optional("datasource_type"),
        Field::optional("cache_timeout"),
        Field::json("params"),
    ];

    impl_id!();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub id: Option<i64>,
    pub table_name: String,
    pub schema: Option<String>,
    pub sql: Option<String>,
    pub description: Option<String>,
    pub main_dttm_col: Option<String>,
    pub cache_timeout: Option<i64>,
    pub extra: JsonDocument,
}

impl Object for Dataset {
    const NAME: &'static str = "Dataset";
    const ENDPOINT: &'static str = "dataset/";
    const EXPORTABLE: bool = true;
    const FIELDS: &'static [Field] = &[
        Field::optional("id"),
        Field::required("table_name"),
        Field::optional("schema"),
        Field::optional("sql"),
        Field::optional("description"),
        Field::optional("main_dttm_col"),
        Field::optional("cache_timeout"),
        Field::json("extra"),
    ];

    impl_id!();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Database {
    pub id: Option<i64>,
    pub database_name: String,
    pub sqlalchemy_uri: Option<String>,
    pub expose_in_sqllab: Option<bool>,
    pub allow_run_async: Option<bool>,
    pub allow_dml: Option<bool>,
    pub cache_timeout: Option<i64>,
    pub extra: JsonDocument,
}

impl Object for Database {
    const NAME: &'static str = "Database";
    const ENDPOINT: &'static str = "database/";
    const EXPORTABLE: bool = true;
    const FIELDS: &'static [Field] = &[
        Field::optional("id"),
        Field::required("database_name"),
        Field::optional("sqlalchemy_uri"),
        Field::optional("expose_in_sqllab"),
        Field::optional("allow_run_async"),
        Field::optional("allow_dml"),
        Field::optional("cache_timeout"),
        Field::json("extra"),
    ];

    impl_id!();
}

impl SupersetClient {
    pub fn dashboards(&self) -> Collection<Dashboard> {
        Collection::new(self.clone())
    }

    pub fn charts(&self) -> Collection<Chart> {
        Collection::new(self.clone())
    }

    pub fn datasets(&self) -> Collection<Dataset> {
        Collection::new(self.clone())
    }

    pub fn databases(&self) -> Collection<Database> {
        Collection::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_fields_match_struct<T: Object>() {
        let serialized = serde_json::to_value(T::default()).unwrap();
        let keys: std::collections::BTreeSet<&str> = serialized
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, T::field_names(), "{} declaration drifted", T::NAME);
    }

    #[test]
    fn declarations_match_struct_fields() {
        assert_fields_match_struct::<Dashboard>();
        assert_fields_match_struct::<Chart>();
        assert_fields_match_struct::<Dataset>();
        assert_fields_match_struct::<Database>();
    }

    #[test]
    fn dashboard_from_list_row() {
        let dashboard = Dashboard::from_json(&json!({
            "id": 7,
            "dashboard_title": "Sales",
            "published": true,
            "json_metadata": "{\"color_scheme\": \"bnbColors\"}",
            "position_json": null,
            "owners": [{"id": 1, "first_name": "admin"}],
            "changed_on_utc": "2024-01-01T00:00:00"
        }))
        .unwrap();

        assert_eq!(dashboard.id, Some(7));
        assert_eq!(dashboard.published, Some(true));
        assert_eq!(dashboard.json_metadata["color_scheme"], "bnbColors");
        assert!(dashboard.position_json.is_empty());
    }

    #[test]
    fn null_and_array_documents_decode() {
        let chart = Chart::from_json(&json!({"slice_name": "c", "params": "null"})).unwrap();
        assert!(chart.params.is_empty());
        assert!(chart.params.is_object());

        let dashboard = Dashboard::from_json(&json!({
            "dashboard_title": "d",
            "position_json": "[]"
        }))
        .unwrap();
        assert!(dashboard.position_json.is_array());
        assert!(dashboard.json_metadata.is_object());
    }

    #[test]
    fn database_connection_columns() {
        let database = Database {
            database_name: "examples".to_string(),
            sqlalchemy_uri: Some("postgresql://u:XXXXXXXXXX@db/examples".to_string()),
            ..Default::default()
        };
        let body = database.to_json(&["database_name", "sqlalchemy_uri"]).unwrap();
        assert_eq!(body["database_name"], "examples");
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn collections_use_their_endpoints() {
        let client = SupersetClient::new("http://localhost:8088").unwrap();
        assert_eq!(
            client.dashboards().base_url(),
            "http://localhost:8088/api/v1/dashboard/"
        );
        assert_eq!(
            client.databases().object_url(4),
            "http://localhost:8088/api/v1/database/4"
        );
        assert_eq!(
            client.charts().export_url(),
            "http://localhost:8088/api/v1/chart/export/"
        );
        assert_eq!(
            client.datasets().import_url(),
            "http://localhost:8088/api/v1/dataset/import/"
        );
    }
}
