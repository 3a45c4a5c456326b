//! Entity contract
//!
//! An [`Object`] is the typed, in-memory mirror of one remote resource. Its
//! shape is declared once as a slice of [`Field`] descriptors; the provided
//! methods use that declaration to filter server payloads, decode
//! JSON-encoded string fields and project the entity back onto the wire.
//!
//! Network operations take the owning [`Collection`] explicitly as `parent`.
//! An entity is bound to the server once it carries an id; calling a network
//! operation on an entity without one fails with [`Error::Unbound`].

use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::collection::Collection;
use crate::error::{raise_for_status, Error, Result};

/// A JSON object, as sent and received on the wire
pub type JsonObject = serde_json::Map<String, Value>;

/// Decoded form of a JSON-encoded string field
///
/// Usually an object, but any JSON document the server stored is kept as-is.
/// Defaults to `{}`.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct JsonDocument(pub Value);

impl JsonDocument {
    /// `null`, `{}` and `[]` are empty
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl Default for JsonDocument {
    fn default() -> Self {
        Self(Value::Object(JsonObject::new()))
    }
}

impl Deref for JsonDocument {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl DerefMut for JsonDocument {
    fn deref_mut(&mut self) -> &mut Value {
        &mut self.0
    }
}

impl From<Value> for JsonDocument {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<JsonObject> for JsonDocument {
    fn from(map: JsonObject) -> Self {
        Self(Value::Object(map))
    }
}

/// How a field travels on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Sent and received as-is
    Plain,
    /// A JSON document encoded as a string on the wire, a [`JsonDocument`] in memory
    Json,
}

/// Declaration of one field of an [`Object`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl Field {
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Plain,
            required: false,
        }
    }

    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Plain,
            required: true,
        }
    }

    /// A JSON-encoded string field; never required, absent decodes to `{}`
    pub const fn json(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Json,
            required: false,
        }
    }
}

/// Decode the wire value of a JSON-encoded field
///
/// Absent, `null`, blank strings and the encoded string `"null"` all decode
/// to `{}`. Other documents, arrays included, are kept. An already decoded
/// value is passed through unchanged.
pub fn decode_json_field(raw: Option<&Value>) -> Result<Value> {
    let decoded = match raw {
        None | Some(Value::Null) => Value::Null,
        Some(Value::String(s)) if s.trim().is_empty() => Value::Null,
        Some(Value::String(s)) => serde_json::from_str(s)?,
        Some(other) => other.clone(),
    };
    Ok(match decoded {
        Value::Null => Value::Object(JsonObject::new()),
        value => value,
    })
}

/// Encode a decoded JSON field back to its string form
pub fn encode_json_field(value: &Value) -> Result<Value> {
    Ok(Value::String(serde_json::to_string(value)?))
}

/// A typed record mirroring one remote resource
///
/// Implementors derive `Serialize`, `Deserialize` and `Default` with
/// `#[serde(default)]`, keep JSON-encoded fields as [`JsonDocument`] and list
/// every serialized field in [`Object::FIELDS`].
#[allow(async_fn_in_trait)]
pub trait Object: Serialize + DeserializeOwned + Default {
    /// Type name used in error messages
    const NAME: &'static str;

    /// Endpoint path segment below the API root, e.g. `dashboard/`
    const ENDPOINT: &'static str;

    const FIELDS: &'static [Field];

    /// Whether single-object export is available for this type
    const EXPORTABLE: bool = false;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Declared field names
    fn field_names() -> BTreeSet<&'static str> {
        Self::FIELDS.iter().map(|f| f.name).collect()
    }

    /// Names of the JSON-encoded string fields
    fn json_fields() -> impl Iterator<Item = &'static str> {
        Self::FIELDS
            .iter()
            .filter(|f| f.kind == FieldKind::Json)
            .map(|f| f.name)
    }

    /// Build an entity from a server payload
    ///
    /// Keys the type does not declare are dropped, so newer servers can add
    /// fields without breaking older clients.
    fn from_json(json: &Value) -> Result<Self> {
        let empty = JsonObject::new();
        let source = json.as_object().unwrap_or(&empty);

        let mut fields = JsonObject::new();
        for field in Self::FIELDS {
            let raw = source.get(field.name);
            match field.kind {
                FieldKind::Json => {
                    fields.insert(field.name.to_string(), decode_json_field(raw)?);
                }
                FieldKind::Plain => match raw {
                    Some(value) => {
                        fields.insert(field.name.to_string(), value.clone());
                    }
                    None if field.required => {
                        return Err(Error::MissingField {
                            object: Self::NAME,
                            field: field.name,
                        });
                    }
                    None => {}
                },
            }
        }

        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Project the entity onto `columns`, re-encoding JSON fields
    ///
    /// Columns the type does not model are skipped.
    fn to_json<S: AsRef<str>>(&self, columns: &[S]) -> Result<JsonObject> {
        let mut current = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => JsonObject::new(),
        };

        let mut projected = JsonObject::new();
        for column in columns {
            let column = column.as_ref();
            let Some(value) = current.remove(column) else {
                continue;
            };
            let value = if Self::json_fields().any(|f| f == column) {
                encode_json_field(&value)?
            } else {
                value
            };
            projected.insert(column.to_string(), value);
        }
        Ok(projected)
    }

    /// Id of a bound entity, or [`Error::Unbound`]
    fn require_id(&self) -> Result<i64> {
        self.id().ok_or(Error::Unbound { object: Self::NAME })
    }

    /// Re-read this entity from the server, overwriting declared fields
    async fn fetch(&mut self, parent: &Collection<Self>) -> Result<()> {
        let url = parent.object_url(self.require_id()?);
        let response = parent.client().get(&url, &[]).await?;
        raise_for_status(&response)?;

        let body: Value = response.json()?;
        let Some(Value::Object(result)) = body.get("result") else {
            return Err(Error::MissingEnvelope { key: "result", url });
        };

        let declared = Self::field_names();
        let columns: Vec<&str> = declared.iter().copied().collect();
        let mut merged = self.to_json(&columns)?;
        for (key, value) in result {
            if declared.contains(key.as_str()) {
                merged.insert(key.clone(), value.clone());
            }
        }

        *self = Self::from_json(&Value::Object(merged))?;
        Ok(())
    }

    /// Push the editable columns of this entity to the server
    async fn save(&self, parent: &Collection<Self>) -> Result<()> {
        let url = parent.object_url(self.require_id()?);
        let columns = parent.edit_columns().await?;
        let body = Value::Object(self.to_json(&columns)?);

        let response = parent.client().put(&url, &body).await?;
        if matches!(response.status.as_u16(), 400 | 422) {
            tracing::error!("Saving {} failed: {}", Self::NAME, response.text());
        }
        raise_for_status(&response)
    }

    /// Delete this entity on the server
    async fn delete(&self, parent: &Collection<Self>) -> Result<bool> {
        parent.delete(self.require_id()?).await
    }

    /// Write the server's export of this single entity to `path`, verbatim
    async fn export(&self, parent: &Collection<Self>, path: impl AsRef<Path>) -> Result<()> {
        if !Self::EXPORTABLE {
            return Err(Error::NotExportable { object: Self::NAME });
        }
        let id = self.require_id()?;
        let url = parent.client().join_urls(&[&parent.object_url(id), "export"]);

        let response = parent.client().get(&url, &[("q", id.to_string())]).await?;
        raise_for_status(&response)?;

        let path = path.as_ref();
        std::fs::write(path, response.text()).map_err(|e| Error::io(path, e))
    }
}
