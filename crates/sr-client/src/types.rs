//! Schema types and data structures
//!
//! Wire types exchanged with a Confluent-compatible registry:
//! - [`SchemaInfo`] - a schema as returned by the registry
//! - [`SchemaReference`] - a named dependency on another subject version
//! - [`SchemaVersion`] - explicit version number or `latest`
//! - [`SchemaType`] - schema format
//! - [`CreateSchemaRequest`] - payload for registering a schema

use serde::{Deserialize, Serialize};

/// Schema format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    /// Apache Avro (registry default when `schemaType` is omitted)
    #[default]
    #[serde(alias = "avro")]
    Avro,

    /// JSON Schema
    #[serde(alias = "json")]
    Json,

    /// Protocol Buffers
    #[serde(alias = "protobuf")]
    Protobuf,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Avro => "AVRO",
            SchemaType::Json => "JSON",
            SchemaType::Protobuf => "PROTOBUF",
        }
    }
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SchemaType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "" | "AVRO" => Ok(SchemaType::Avro),
            "JSON" | "JSONSCHEMA" | "JSON_SCHEMA" => Ok(SchemaType::Json),
            "PROTOBUF" | "PROTO" => Ok(SchemaType::Protobuf),
            _ => Err(format!("Unknown schema type: {}", s)),
        }
    }
}

/// Reference to another schema within the registry
///
/// `name` is the import alias used inside the referencing schema document
/// (an Avro full name, a `.proto` import path, a JSON Schema `$ref`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaReference {
    /// Reference name (used in the schema)
    pub name: String,
    /// Subject containing the referenced schema
    pub subject: String,
    /// Version of the referenced schema
    pub version: u32,
}

impl SchemaReference {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            version,
        }
    }
}

impl std::fmt::Display for SchemaReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}@{}", self.name, self.subject, self.version)
    }
}

/// Information about a schema stored in the registry
///
/// A point-in-time snapshot of a registry entry, decoded fresh from every
/// response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    /// Global schema ID (absent from `/schemas/ids/{id}` responses)
    #[serde(default)]
    pub id: u32,
    /// Schema format as reported by the registry (empty when omitted)
    #[serde(rename = "schemaType", default)]
    pub schema_type: String,
    /// Schema document (empty when the registry omits it)
    #[serde(default)]
    pub schema: String,
    /// Schemas this schema depends on, in declaration order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub references: Vec<SchemaReference>,
}

impl SchemaInfo {
    /// Parsed schema format; an omitted `schemaType` means Avro
    pub fn kind(&self) -> Result<SchemaType, String> {
        self.schema_type.parse()
    }

    /// Check if this schema references other schemas
    pub fn has_references(&self) -> bool {
        !self.references.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<SchemaReference>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<SchemaReference>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Version selector for a subject
///
/// `Latest` is a distinct variant, so every explicit number (including
/// `u32::MAX`) addresses exactly that version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchemaVersion {
    /// Newest version registered under the subject
    #[default]
    Latest,
    /// Explicit version number
    Number(u32),
}

impl SchemaVersion {
    pub fn new(version: u32) -> Self {
        Self::Number(version)
    }

    /// Create a version that represents "latest"
    pub fn latest() -> Self {
        Self::Latest
    }

    /// Check if this represents the "latest" version
    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }

    /// Explicit version number, `None` for latest
    pub fn number(&self) -> Option<u32> {
        match self {
            Self::Latest => None,
            Self::Number(v) => Some(*v),
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Number(v) => write!(f, "{}", v),
        }
    }
}

impl From<u32> for SchemaVersion {
    fn from(v: u32) -> Self {
        Self::Number(v)
    }
}

impl From<Option<u32>> for SchemaVersion {
    fn from(v: Option<u32>) -> Self {
        v.map(Self::Number).unwrap_or_default()
    }
}

/// Registry mode response (`GET /mode`)
///
/// Confluent answers `{"mode": "READWRITE"}`; some proxies capitalize the key.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModeResponse {
    #[serde(alias = "Mode")]
    pub mode: String,
}

/// Request body for registering a schema
#[derive(Debug, Clone, Serialize)]
pub struct CreateSchemaRequest {
    pub schema: String,
    #[serde(rename = "schemaType")]
    pub schema_type: SchemaType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
}

impl CreateSchemaRequest {
    pub fn new(schema_type: SchemaType, schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            schema_type,
            references: Vec::new(),
        }
    }

    /// Add references to the request
    pub fn with_references(mut self, references: Vec<SchemaReference>) -> Self {
        self.references = references;
        self
    }

    /// Serialize into a request payload
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_info_full_payload() {
        let body = r#"{
            "id": 42,
            "schemaType": "PROTOBUF",
            "schema": "syntax = \"proto3\";",
            "references": [{"name": "money.proto", "subject": "money", "version": 1}]
        }"#;
        let info: SchemaInfo = serde_json::from_str(body).unwrap();
        assert_eq!(info.id, 42);
        assert_eq!(info.kind().unwrap(), SchemaType::Protobuf);
        assert_eq!(
            info.references,
            vec![SchemaReference::new("money.proto", "money", 1)]
        );
    }

    #[test]
    fn test_schema_info_minimal_payload() {
        // Confluent omits schemaType for Avro and references when empty
        let info: SchemaInfo = serde_json::from_str(r#"{"id": 1, "schema": "\"string\""}"#).unwrap();
        assert_eq!(info.schema_type, "");
        assert_eq!(info.kind().unwrap(), SchemaType::Avro);
        assert!(!info.has_references());
    }

    #[test]
    fn test_schema_info_null_references() {
        let info: SchemaInfo =
            serde_json::from_str(r#"{"id": 1, "schema": "{}", "references": null}"#).unwrap();
        assert!(info.references.is_empty());
    }

    #[test]
    fn test_schema_type_parse() {
        assert_eq!("avro".parse::<SchemaType>().unwrap(), SchemaType::Avro);
        assert_eq!("JSON_SCHEMA".parse::<SchemaType>().unwrap(), SchemaType::Json);
        assert_eq!("proto".parse::<SchemaType>().unwrap(), SchemaType::Protobuf);
        assert!("xml".parse::<SchemaType>().is_err());
    }

    #[test]
    fn test_schema_version_display() {
        assert_eq!(SchemaVersion::new(3).to_string(), "3");
        assert_eq!(SchemaVersion::latest().to_string(), "latest");
        assert!(SchemaVersion::from(None).is_latest());
        assert_eq!(SchemaVersion::from(Some(7)), SchemaVersion::new(7));
    }

    #[test]
    fn test_schema_version_max_is_explicit() {
        let max = SchemaVersion::new(u32::MAX);
        assert!(!max.is_latest());
        assert_eq!(max.number(), Some(u32::MAX));
        assert_eq!(max.to_string(), "4294967295");
        assert_eq!(SchemaVersion::latest().number(), None);
        assert_ne!(max, SchemaVersion::latest());
    }

    #[test]
    fn test_schema_info_without_schema_field() {
        let info: SchemaInfo = serde_json::from_str(r#"{"id": 4, "references": []}"#).unwrap();
        assert_eq!(info.id, 4);
        assert_eq!(info.schema, "");
    }

    #[test]
    fn test_reference_equality_is_structural() {
        let a = SchemaReference::new("Money", "money", 1);
        let b = SchemaReference::new("Money", "money", 1);
        assert_eq!(a, b);
        assert_ne!(a, SchemaReference::new("Money", "money", 2));
    }

    #[test]
    fn test_mode_response_key_case() {
        let lower: ModeResponse = serde_json::from_str(r#"{"mode":"READWRITE"}"#).unwrap();
        let upper: ModeResponse = serde_json::from_str(r#"{"Mode":"READONLY"}"#).unwrap();
        assert_eq!(lower.mode, "READWRITE");
        assert_eq!(upper.mode, "READONLY");
    }

    #[test]
    fn test_create_schema_request_payload() {
        let req = CreateSchemaRequest::new(SchemaType::Avro, r#"{"type":"string"}"#)
            .with_references(vec![SchemaReference::new("Money", "money", 1)]);
        let value: serde_json::Value = serde_json::from_slice(&req.to_payload().unwrap()).unwrap();
        assert_eq!(value["schemaType"], "AVRO");
        assert_eq!(value["references"][0]["subject"], "money");

        let bare = CreateSchemaRequest::new(SchemaType::Json, "{}");
        let value: serde_json::Value = serde_json::from_slice(&bare.to_payload().unwrap()).unwrap();
        assert!(value.get("references").is_none());
    }
}
